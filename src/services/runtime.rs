use crate::errors::ToolError;
use crate::services::config::{parse_env_text, persist_env_vars, CopilotConfig, CONFIG_KEYS};
use crate::services::copilot::CopilotService;
use crate::services::logger::Logger;
use crate::services::session::Role;
use crate::stores::conversation_store::ConversationStore;
use crate::utils::paths::resolve_secrets_path;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

/// Process-wide state shared by the tool handlers. Reconfiguring swaps in a
/// new copilot while keeping the conversation history.
pub struct Runtime {
    logger: Logger,
    config: RwLock<CopilotConfig>,
    copilot: RwLock<Arc<CopilotService>>,
    store: ConversationStore,
    secrets_path: PathBuf,
}

impl Runtime {
    pub fn new(logger: Logger, config: CopilotConfig) -> Result<Self, ToolError> {
        let store = ConversationStore::open(&config.db_path)?;
        Self::with_store(logger, config, store, resolve_secrets_path())
    }

    pub fn with_store(
        logger: Logger,
        config: CopilotConfig,
        store: ConversationStore,
        secrets_path: PathBuf,
    ) -> Result<Self, ToolError> {
        let copilot = Arc::new(CopilotService::new(logger.clone(), &config)?);
        Ok(Self {
            logger: logger.child("runtime"),
            config: RwLock::new(config),
            copilot: RwLock::new(copilot),
            store,
            secrets_path,
        })
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    pub fn config(&self) -> CopilotConfig {
        self.config
            .read()
            .unwrap_or_else(|err| err.into_inner())
            .clone()
    }

    pub fn copilot(&self) -> Arc<CopilotService> {
        self.copilot
            .read()
            .unwrap_or_else(|err| err.into_inner())
            .clone()
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    /// Masked configuration plus where conversations are actually stored.
    pub fn status(&self) -> Value {
        let mut status = self.config().status();
        status["store"] = serde_json::json!({
            "path": self.store.path().map(|p| p.display().to_string()),
            "in_memory": self.store.path().is_none(),
        });
        status
    }

    /// Applies pasted `KEY=VALUE` text and rebuilds the copilot.
    pub async fn apply_env_text(&self, text: &str, persist: bool) -> Result<Value, ToolError> {
        let vars = parse_env_text(text)?;
        if vars.is_empty() {
            return Err(ToolError::invalid_params("No KEY=VALUE lines found"));
        }
        let ignored: Vec<String> = vars
            .keys()
            .filter(|key| !CONFIG_KEYS.contains(&key.as_str()))
            .cloned()
            .collect();
        let applied: Vec<String> = vars
            .keys()
            .filter(|key| CONFIG_KEYS.contains(&key.as_str()))
            .cloned()
            .collect();

        let next_config = self.config().with_overrides(vars.clone());
        let next = Arc::new(CopilotService::new(self.logger.clone(), &next_config)?);
        let history: Vec<_> = self
            .copilot()
            .history()
            .await
            .into_iter()
            .skip_while(|message| message.role == Role::System)
            .collect();
        next.replace_history(history).await;

        if persist {
            persist_env_vars(&self.secrets_path, &vars)?;
        }
        *self.config.write().unwrap_or_else(|err| err.into_inner()) = next_config.clone();
        *self.copilot.write().unwrap_or_else(|err| err.into_inner()) = next;

        self.logger.info(
            "Configuration updated",
            Some(&serde_json::json!({"applied": applied, "persisted": persist})),
        );
        let secrets_path = persist.then(|| self.secrets_path.display().to_string());
        Ok(serde_json::json!({
            "applied": applied,
            "ignored": ignored,
            "persisted": persist,
            "secrets_path": secrets_path,
            "status": next_config.status(),
        }))
    }
}
