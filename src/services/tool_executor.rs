use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::errors::{ToolError, ToolErrorKind};
use crate::services::logger::Logger;
use crate::utils::suggest::suggest;

use serde_json::Value;

#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn handle(&self, args: Value) -> Result<Value, ToolError>;
}

#[derive(Clone)]
pub struct ToolExecutor {
    logger: Logger,
    handlers: Arc<HashMap<String, Arc<dyn ToolHandler>>>,
}

impl ToolExecutor {
    pub fn new(logger: Logger, handlers: HashMap<String, Arc<dyn ToolHandler>>) -> Self {
        Self {
            logger: logger.child("executor"),
            handlers: Arc::new(handlers),
        }
    }

    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    fn unknown_tool(&self, tool: &str) -> ToolError {
        let names = self.tool_names();
        let candidates: Vec<&str> = names.iter().map(String::as_str).collect();
        let suggestions = suggest(tool, &candidates, 3);
        let hint = if suggestions.is_empty() {
            format!("Available tools: {}", names.join(", "))
        } else {
            format!("Did you mean: {}", suggestions.join(", "))
        };
        ToolError::invalid_params(format!("Unknown tool: {}", tool)).with_hint(hint)
    }

    /// Runs the handler and wraps its result as `{ok, result, meta}`.
    pub async fn execute(&self, tool: &str, args: Value) -> Result<Value, ToolError> {
        let started_at = chrono::Utc::now().timestamp_millis();
        let handler = self
            .handlers
            .get(tool)
            .cloned()
            .ok_or_else(|| self.unknown_tool(tool))?;
        let trace_id = args
            .get("trace_id")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let action = args.get("action").cloned().unwrap_or(Value::Null);

        self.logger.debug(
            tool,
            Some(&serde_json::json!({"action": action, "trace_id": trace_id})),
        );
        let result = match handler.handle(args).await {
            Ok(result) => result,
            Err(err) => {
                let meta = serde_json::json!({"code": err.code, "trace_id": trace_id});
                let message = format!("{} failed: {}", tool, err.message);
                if err.kind == ToolErrorKind::Internal {
                    self.logger.error(&message, Some(&meta));
                } else {
                    self.logger.warn(&message, Some(&meta));
                }
                return Err(err);
            }
        };

        Ok(serde_json::json!({
            "ok": true,
            "result": result,
            "meta": {
                "tool": tool,
                "action": action,
                "trace_id": trace_id,
                "duration_ms": chrono::Utc::now().timestamp_millis() - started_at,
            },
        }))
    }
}
