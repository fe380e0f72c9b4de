mod common;

use common::{config_for, ENV_LOCK};
use graph_copilot::errors::ToolErrorKind;
use graph_copilot::services::copilot::CopilotService;
use graph_copilot::services::logger::Logger;
use graph_copilot::services::session::Role;
use wiremock::MockServer;

const KEY: &str = "COPILOT_SYSTEM_PROMPT_PATH";

fn restore_env(key: &str, previous: Option<String>) {
    match previous {
        Some(value) => std::env::set_var(key, value),
        None => std::env::remove_var(key),
    }
}

#[tokio::test]
async fn system_prompt_file_seeds_the_history() {
    let _guard = ENV_LOCK.lock().await;
    let previous = std::env::var(KEY).ok();
    let path = std::env::temp_dir().join(format!("prompt-{}.txt", uuid::Uuid::new_v4()));
    std::fs::write(&path, "You only answer Intune questions.\n").expect("write prompt");
    std::env::set_var(KEY, &path);

    let server = MockServer::start().await;
    let copilot = CopilotService::new(Logger::silent("test"), &config_for(&server)).expect("copilot");
    let history = copilot.history().await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].role, Role::System);
    assert!(history[0].content.contains("You only answer Intune questions."));

    restore_env(KEY, previous);
    let _ = std::fs::remove_file(&path);
}

#[tokio::test]
async fn unreadable_system_prompt_is_a_config_error() {
    let _guard = ENV_LOCK.lock().await;
    let previous = std::env::var(KEY).ok();
    let missing = std::env::temp_dir().join(format!("missing-{}.txt", uuid::Uuid::new_v4()));
    std::env::set_var(KEY, &missing);

    let server = MockServer::start().await;
    let result = CopilotService::new(Logger::silent("test"), &config_for(&server));
    restore_env(KEY, previous);

    let err = result.err().expect("config error");
    assert_eq!(err.kind, ToolErrorKind::Config);
}
