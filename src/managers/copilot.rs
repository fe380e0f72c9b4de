use crate::errors::ToolError;
use crate::services::copilot::placeholder_title;
use crate::services::logger::Logger;
use crate::services::runtime::Runtime;
use crate::services::validation::Validation;
use crate::utils::suggest::unknown_action_error;
use serde_json::Value;
use std::sync::Arc;

const COPILOT_ACTIONS: &[&str] = &[
    "ask",
    "synthesize",
    "execute",
    "interpret",
    "interpret_url",
    "generate_title",
    "state",
];

#[derive(Clone)]
pub struct CopilotManager {
    logger: Logger,
    validation: Validation,
    runtime: Arc<Runtime>,
}

impl CopilotManager {
    pub fn new(logger: Logger, validation: Validation, runtime: Arc<Runtime>) -> Self {
        Self {
            logger: logger.child("graph_copilot"),
            validation,
            runtime,
        }
    }

    fn query(&self, args: &Value) -> Result<String, ToolError> {
        self.validation
            .ensure_string(args.get("query").unwrap_or(&Value::Null), "query", true)
    }

    pub async fn handle_action(&self, args: Value) -> Result<Value, ToolError> {
        let action = args.get("action").and_then(|v| v.as_str());
        let copilot = self.runtime.copilot();
        match action.unwrap_or("") {
            "ask" => {
                let query = self.query(&args)?;
                let mut chunks = 0usize;
                let report = copilot.ask(&query, |_| chunks += 1).await?;
                let mut payload = serde_json::to_value(&report)
                    .map_err(|err| ToolError::internal(err.to_string()))?;
                if let Value::Object(map) = &mut payload {
                    map.insert("stream_chunks".to_string(), Value::from(chunks));
                }
                Ok(payload)
            }
            "synthesize" => {
                let query = self.query(&args)?;
                let synthesized = copilot.synthesize(&query).await;
                Ok(match synthesized {
                    Some(synthesized) => serde_json::json!({
                        "url": synthesized.url,
                        "descriptor": synthesized.json,
                    }),
                    None => serde_json::json!({ "url": null, "descriptor": null }),
                })
            }
            "execute" => {
                let url = self
                    .validation
                    .ensure_string(args.get("url").unwrap_or(&Value::Null), "url", true)?;
                let outcome = copilot.execute(&url).await?;
                serde_json::to_value(&outcome).map_err(|err| ToolError::internal(err.to_string()))
            }
            "interpret" => {
                let query = self.query(&args)?;
                let answer = copilot.interpret_last(&query, |_| {}).await?;
                Ok(serde_json::json!({ "answer": answer }))
            }
            "interpret_url" => {
                let url = self
                    .validation
                    .ensure_string(args.get("url").unwrap_or(&Value::Null), "url", true)?;
                let interpretation = copilot.interpret_url(&url).await?;
                serde_json::to_value(&interpretation)
                    .map_err(|err| ToolError::internal(err.to_string()))
            }
            "generate_title" => {
                let message = self.validation.ensure_string(
                    args.get("message").unwrap_or(&Value::Null),
                    "message",
                    true,
                )?;
                let title = match copilot.generate_title(&message).await {
                    Ok(title) => title,
                    Err(err) => {
                        self.logger.warn(
                            "Title generation failed, using placeholder",
                            Some(&serde_json::json!({ "error": err.message })),
                        );
                        placeholder_title(&message)
                    }
                };
                Ok(serde_json::json!({ "title": title }))
            }
            "state" => {
                let recovery = copilot.recovery_state().await;
                Ok(serde_json::json!({
                    "state": recovery.name(),
                    "recovery": recovery,
                    "history_len": copilot.history().await.len(),
                    "has_token": copilot.graph().has_token().await,
                }))
            }
            _ => Err(unknown_action_error("graph_copilot", action, COPILOT_ACTIONS)),
        }
    }
}

#[async_trait::async_trait]
impl crate::services::tool_executor::ToolHandler for CopilotManager {
    async fn handle(&self, args: Value) -> Result<Value, ToolError> {
        self.logger.debug("handle_action", args.get("action"));
        self.handle_action(args).await
    }
}
