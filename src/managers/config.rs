use crate::constants::buffers::LOG_BUFFER_SIZE;
use crate::errors::ToolError;
use crate::services::logger::Logger;
use crate::services::runtime::Runtime;
use crate::services::validation::Validation;
use crate::utils::suggest::unknown_action_error;
use serde_json::Value;
use std::sync::Arc;

const CONFIG_ACTIONS: &[&str] = &["status", "apply_env_text", "debug_log"];

#[derive(Clone)]
pub struct ConfigManager {
    logger: Logger,
    validation: Validation,
    runtime: Arc<Runtime>,
}

impl ConfigManager {
    pub fn new(logger: Logger, validation: Validation, runtime: Arc<Runtime>) -> Self {
        Self {
            logger: logger.child("mcp_config"),
            validation,
            runtime,
        }
    }

    pub async fn handle_action(&self, args: Value) -> Result<Value, ToolError> {
        let action = args.get("action").and_then(|v| v.as_str());
        match action.unwrap_or("") {
            "status" => Ok(self.runtime.status()),
            "apply_env_text" => {
                let text = self.validation.ensure_string(
                    args.get("text").unwrap_or(&Value::Null),
                    "text",
                    false,
                )?;
                let persist = args
                    .get("persist")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(false);
                self.runtime.apply_env_text(&text, persist).await
            }
            "debug_log" => {
                let limit = self
                    .validation
                    .ensure_page_limit(args.get("limit"), LOG_BUFFER_SIZE)
                    .map_err(|_| ToolError::invalid_params("limit must be a positive integer"))?;
                let recent = self.runtime.logger().recent();
                let skip = recent.len().saturating_sub(limit);
                let lines: Vec<String> = recent.into_iter().skip(skip).collect();
                Ok(serde_json::json!({
                    "count": lines.len(),
                    "lines": lines,
                    "counters": self.runtime.logger().stats(),
                }))
            }
            _ => Err(unknown_action_error("mcp_config", action, CONFIG_ACTIONS)),
        }
    }
}

#[async_trait::async_trait]
impl crate::services::tool_executor::ToolHandler for ConfigManager {
    async fn handle(&self, args: Value) -> Result<Value, ToolError> {
        self.logger.debug("handle_action", args.get("action"));
        self.handle_action(args).await
    }
}
