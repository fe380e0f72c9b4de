use crate::errors::ToolError;
use crate::managers;
use crate::mcp::catalog::tool_catalog;
use crate::services::config::CopilotConfig;
use crate::services::logger::Logger;
use crate::services::runtime::Runtime;
use crate::services::tool_executor::{ToolExecutor, ToolHandler};
use crate::services::validation::Validation;
use std::collections::HashMap;
use std::sync::Arc;

pub struct App {
    pub logger: Logger,
    pub runtime: Arc<Runtime>,
    pub tool_executor: Arc<ToolExecutor>,
}

impl App {
    fn validate_tool_wiring(
        handlers: &HashMap<String, Arc<dyn ToolHandler>>,
    ) -> Result<(), ToolError> {
        let catalog = tool_catalog();
        let mut missing: Vec<String> = catalog
            .iter()
            .filter(|tool| !handlers.contains_key(&tool.name))
            .map(|tool| tool.name.clone())
            .collect();
        let mut unlisted: Vec<String> = handlers
            .keys()
            .filter(|name| !catalog.iter().any(|tool| &tool.name == *name))
            .cloned()
            .collect();
        if missing.is_empty() && unlisted.is_empty() {
            return Ok(());
        }
        missing.sort();
        unlisted.sort();
        Err(ToolError::internal("Tool wiring is incomplete")
            .with_hint("Every tool in tool_catalog.json must have exactly one handler.")
            .with_details(serde_json::json!({
                "missing_tools": missing,
                "unlisted_handlers": unlisted,
            })))
    }

    /// Loads configuration from the environment and the secrets file.
    pub fn initialize() -> Result<Self, ToolError> {
        let logger = Logger::new("graph-copilot");
        let config = CopilotConfig::load()?;
        let runtime = Arc::new(Runtime::new(logger.clone(), config)?);
        Self::with_runtime(logger, runtime)
    }

    pub fn with_runtime(logger: Logger, runtime: Arc<Runtime>) -> Result<Self, ToolError> {
        let validation = Validation::new();

        let mut handlers: HashMap<String, Arc<dyn ToolHandler>> = HashMap::new();
        handlers.insert(
            "graph_copilot".to_string(),
            Arc::new(managers::copilot::CopilotManager::new(
                logger.clone(),
                validation.clone(),
                runtime.clone(),
            )),
        );
        handlers.insert(
            "mcp_graph".to_string(),
            Arc::new(managers::graph::GraphManager::new(
                logger.clone(),
                validation.clone(),
                runtime.clone(),
            )),
        );
        handlers.insert(
            "mcp_conversation".to_string(),
            Arc::new(managers::conversation::ConversationManager::new(
                logger.clone(),
                validation.clone(),
                runtime.clone(),
            )),
        );
        handlers.insert(
            "mcp_config".to_string(),
            Arc::new(managers::config::ConfigManager::new(
                logger.clone(),
                validation,
                runtime.clone(),
            )),
        );
        Self::validate_tool_wiring(&handlers)?;

        let tool_executor = Arc::new(ToolExecutor::new(logger.clone(), handlers));
        Ok(Self {
            logger,
            runtime,
            tool_executor,
        })
    }
}
