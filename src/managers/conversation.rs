use crate::errors::ToolError;
use crate::services::copilot::placeholder_title;
use crate::services::logger::Logger;
use crate::services::runtime::Runtime;
use crate::services::session::Role;
use crate::services::validation::Validation;
use crate::utils::suggest::unknown_action_error;
use serde_json::Value;
use std::sync::Arc;

const CONVERSATION_ACTIONS: &[&str] = &["history", "clear", "save", "list", "load", "delete"];

#[derive(Clone)]
pub struct ConversationManager {
    logger: Logger,
    validation: Validation,
    runtime: Arc<Runtime>,
}

impl ConversationManager {
    pub fn new(logger: Logger, validation: Validation, runtime: Arc<Runtime>) -> Self {
        Self {
            logger: logger.child("mcp_conversation"),
            validation,
            runtime,
        }
    }

    /// Explicit title, else one generated from the first user message.
    async fn resolve_title(&self, args: &Value) -> Result<String, ToolError> {
        if let Some(title) = self
            .validation
            .ensure_optional_string(args.get("title"), "title", true)?
        {
            return self.validation.ensure_title(Some(&Value::String(title)));
        }
        let copilot = self.runtime.copilot();
        let history = copilot.history().await;
        let first_user = history
            .iter()
            .find(|message| message.role == Role::User)
            .map(|message| message.content.clone())
            .ok_or_else(|| {
                ToolError::invalid_params("Nothing to save yet")
                    .with_hint("Ask a question first, or pass an explicit title.")
            })?;
        match copilot.generate_title(&first_user).await {
            Ok(title) => Ok(title),
            Err(err) => {
                self.logger.warn(
                    "Title generation failed, using placeholder",
                    Some(&serde_json::json!({ "error": err.message })),
                );
                Ok(placeholder_title(&first_user))
            }
        }
    }

    pub async fn handle_action(&self, args: Value) -> Result<Value, ToolError> {
        let action = args.get("action").and_then(|v| v.as_str());
        let store = self.runtime.store();
        match action.unwrap_or("") {
            "history" => {
                let history = self.runtime.copilot().history().await;
                Ok(serde_json::json!({ "count": history.len(), "messages": history }))
            }
            "clear" => {
                self.runtime.copilot().clear().await;
                Ok(serde_json::json!({ "cleared": true }))
            }
            "save" => {
                let title = self.resolve_title(&args).await?;
                let history = self.runtime.copilot().history().await;
                store.save(&title, &history)?;
                Ok(serde_json::json!({ "title": title, "messages": history.len() }))
            }
            "list" => {
                let titles = store.list_titles()?;
                Ok(serde_json::json!({ "count": titles.len(), "titles": titles }))
            }
            "load" => {
                let title = self.validation.ensure_title(args.get("title"))?;
                let messages = store.load(&title)?;
                if messages.is_empty() {
                    return Err(ToolError::not_found(format!(
                        "Conversation not found: {}",
                        title
                    ))
                    .with_hint("Use mcp_conversation list to see saved titles."));
                }
                let copilot = self.runtime.copilot();
                copilot.replace_history(messages).await;
                let history = copilot.history().await;
                Ok(serde_json::json!({
                    "title": title,
                    "count": history.len(),
                    "messages": history,
                }))
            }
            "delete" => {
                let title = self.validation.ensure_title(args.get("title"))?;
                let deleted = store.delete(&title)?;
                Ok(serde_json::json!({ "title": title, "deleted": deleted }))
            }
            _ => Err(unknown_action_error(
                "mcp_conversation",
                action,
                CONVERSATION_ACTIONS,
            )),
        }
    }
}

#[async_trait::async_trait]
impl crate::services::tool_executor::ToolHandler for ConversationManager {
    async fn handle(&self, args: Value) -> Result<Value, ToolError> {
        self.logger.debug("handle_action", args.get("action"));
        self.handle_action(args).await
    }
}
