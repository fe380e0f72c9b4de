use crate::constants::pagination::MAX_PAGES;
use crate::errors::ToolError;
use crate::services::graph_client::HttpMethod;
use crate::services::logger::Logger;
use crate::services::runtime::Runtime;
use crate::services::validation::Validation;
use crate::utils::suggest::unknown_action_error;
use serde_json::Value;
use std::sync::Arc;

const GRAPH_ACTIONS: &[&str] = &["request", "fetch", "paginate"];

/// Raw Graph access without the LLM in the loop.
#[derive(Clone)]
pub struct GraphManager {
    logger: Logger,
    validation: Validation,
    runtime: Arc<Runtime>,
}

impl GraphManager {
    pub fn new(logger: Logger, validation: Validation, runtime: Arc<Runtime>) -> Self {
        Self {
            logger: logger.child("mcp_graph"),
            validation,
            runtime,
        }
    }

    pub async fn handle_action(&self, args: Value) -> Result<Value, ToolError> {
        let action = args.get("action").and_then(|v| v.as_str());
        let copilot = self.runtime.copilot();
        let graph = copilot.graph();
        match action.unwrap_or("") {
            "request" => {
                let url = self
                    .validation
                    .ensure_string(args.get("url").unwrap_or(&Value::Null), "url", true)?;
                let method = self
                    .validation
                    .ensure_optional_string(args.get("method"), "method", true)?
                    .unwrap_or_default()
                    .parse::<HttpMethod>()?;
                let body = self.validation.ensure_optional_body(args.get("body"))?;
                let response = graph.call(&url, method, body.as_ref()).await?;
                Ok(serde_json::json!({
                    "url": graph.resolve_url(&url),
                    "method": method.as_str(),
                    "response": response,
                }))
            }
            "fetch" => {
                let url = self
                    .validation
                    .ensure_string(args.get("url").unwrap_or(&Value::Null), "url", true)?;
                let result = graph.fetch(&url).await?;
                Ok(result.to_value())
            }
            "paginate" => {
                let url = self
                    .validation
                    .ensure_string(args.get("url").unwrap_or(&Value::Null), "url", true)?;
                let max_pages = self
                    .validation
                    .ensure_page_limit(args.get("max_pages"), MAX_PAGES)?;
                let paginated = graph.paginate(&url, max_pages).await?;
                Ok(serde_json::json!({
                    "count": paginated.data.len(),
                    "pages": paginated.pages,
                    "next_link": paginated.next_link,
                    "data": paginated.data,
                }))
            }
            _ => Err(unknown_action_error("mcp_graph", action, GRAPH_ACTIONS)),
        }
    }
}

#[async_trait::async_trait]
impl crate::services::tool_executor::ToolHandler for GraphManager {
    async fn handle(&self, args: Value) -> Result<Value, ToolError> {
        self.logger.debug("handle_action", args.get("action"));
        self.handle_action(args).await
    }
}
