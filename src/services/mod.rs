pub mod config;
pub mod copilot;
pub mod graph_client;
pub mod llm_client;
pub mod logger;
pub mod prompts;
pub mod runtime;
pub mod session;
pub mod token_provider;
pub mod tool_executor;
pub mod url_synthesizer;
pub mod validation;
