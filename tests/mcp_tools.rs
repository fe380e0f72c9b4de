mod common;

use common::{chat_completion, config_for, mount_token};
use graph_copilot::app::App;
use graph_copilot::mcp::server::McpServer;
use graph_copilot::services::config::parse_env_text;
use graph_copilot::services::logger::Logger;
use graph_copilot::services::runtime::Runtime;
use graph_copilot::stores::conversation_store::ConversationStore;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn secrets_path() -> PathBuf {
    std::env::temp_dir().join(format!("graph-copilot-secrets-{}.env", uuid::Uuid::new_v4()))
}

fn server_for(mock: &MockServer, secrets: PathBuf) -> McpServer {
    let logger = Logger::silent("test");
    let runtime = Runtime::with_store(
        logger.clone(),
        config_for(mock),
        ConversationStore::open_in_memory().expect("store"),
        secrets,
    )
    .expect("runtime");
    let app = App::with_runtime(logger, Arc::new(runtime)).expect("app");
    McpServer::new(Arc::new(app))
}

async fn call(server: &McpServer, id: u64, tool: &str, args: Value) -> Value {
    let line = json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": {"name": tool, "arguments": args},
    })
    .to_string();
    let response = server.handle_line(&line).await.expect("response");
    serde_json::from_str(response.to_line().trim()).expect("json")
}

#[tokio::test]
async fn initialize_and_list_tools() {
    let mock = MockServer::start().await;
    let server = server_for(&mock, secrets_path());

    let init = server
        .handle_line(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#)
        .await
        .expect("initialize");
    let init: Value = serde_json::from_str(init.to_line().trim()).expect("json");
    assert_eq!(init["result"]["serverInfo"]["name"], json!("graph-copilot"));

    let list = server
        .handle_line(r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#)
        .await
        .expect("tools/list");
    let list: Value = serde_json::from_str(list.to_line().trim()).expect("json");
    let names: Vec<&str> = list["result"]["tools"]
        .as_array()
        .expect("tools")
        .iter()
        .filter_map(|t| t["name"].as_str())
        .collect();
    assert!(names.contains(&"graph_copilot"));
    assert!(names.contains(&"mcp_conversation"));

    assert!(server
        .handle_line(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
        .await
        .is_none());
    let unknown = server
        .handle_line(r#"{"jsonrpc":"2.0","id":3,"method":"resources/list"}"#)
        .await
        .expect("response");
    let unknown: Value = serde_json::from_str(unknown.to_line().trim()).expect("json");
    assert_eq!(unknown["error"]["code"], json!(-32601));
}

#[tokio::test]
async fn schema_errors_are_rejected_before_dispatch() {
    let mock = MockServer::start().await;
    let server = server_for(&mock, secrets_path());

    let response = call(&server, 1, "mcp_graph", json!({"action": "fech", "url": "users"})).await;
    assert_eq!(response["error"]["code"], json!(-32602));
    let message = response["error"]["message"].as_str().unwrap_or("");
    assert!(message.contains("Did you mean: fetch"), "{}", message);
}

#[tokio::test]
async fn graph_fetch_over_mcp_and_bad_requests_as_errors() {
    let mock = MockServer::start().await;
    mount_token(&mock, 1).await;
    Mock::given(method("GET"))
        .and(path("/v1.0/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{"id": "1"}],
        })))
        .mount(&mock)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1.0/groups"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"code": "BadRequest", "message": "Unsupported query"},
        })))
        .mount(&mock)
        .await;
    let server = server_for(&mock, secrets_path());

    let ok = call(&server, 1, "mcp_graph", json!({"action": "fetch", "url": "users"})).await;
    let structured = &ok["result"]["structuredContent"];
    assert_eq!(structured["ok"], json!(true));
    assert_eq!(structured["result"]["data"][0]["id"], json!("1"));
    assert_eq!(structured["meta"]["action"], json!("fetch"));

    let failed = call(&server, 2, "mcp_graph", json!({"action": "request", "url": "groups"})).await;
    assert_eq!(failed["error"]["code"], json!(-32602));
    assert_eq!(failed["error"]["data"]["kind"], json!("bad_request"));
}

#[tokio::test]
async fn conversations_round_trip_through_the_store() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock)
        .await;
    let server = server_for(&mock, secrets_path());

    let empty = call(&server, 1, "mcp_conversation", json!({"action": "save"})).await;
    assert_eq!(empty["error"]["data"]["code"], json!("INVALID_PARAMS"));

    let saved = call(
        &server,
        2,
        "mcp_conversation",
        json!({"action": "save", "title": "Intune devices"}),
    )
    .await;
    assert_eq!(saved["result"]["structuredContent"]["result"]["messages"], json!(1));

    let listed = call(&server, 3, "mcp_conversation", json!({"action": "list"})).await;
    assert_eq!(
        listed["result"]["structuredContent"]["result"]["titles"],
        json!(["Intune devices"])
    );

    let loaded = call(
        &server,
        4,
        "mcp_conversation",
        json!({"action": "load", "title": "Intune devices"}),
    )
    .await;
    assert_eq!(
        loaded["result"]["structuredContent"]["result"]["messages"][0]["role"],
        json!("system")
    );

    let missing = call(
        &server,
        5,
        "mcp_conversation",
        json!({"action": "load", "title": "nope"}),
    )
    .await;
    assert_eq!(missing["error"]["data"]["kind"], json!("not_found"));

    let deleted = call(
        &server,
        6,
        "mcp_conversation",
        json!({"action": "delete", "title": "Intune devices"}),
    )
    .await;
    assert_eq!(deleted["result"]["structuredContent"]["result"]["deleted"], json!(true));

    let title = call(
        &server,
        7,
        "graph_copilot",
        json!({"action": "generate_title", "message": "list all compliant devices now please"}),
    )
    .await;
    assert_eq!(
        title["result"]["structuredContent"]["result"]["title"],
        json!("List all compliant devices now")
    );
}

#[tokio::test]
async fn apply_env_text_rebuilds_and_persists_configuration() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion("Unused")))
        .mount(&mock)
        .await;
    let secrets = secrets_path();
    let server = server_for(&mock, secrets.clone());

    let applied = call(
        &server,
        1,
        "mcp_config",
        json!({
            "action": "apply_env_text",
            "text": "# pasted\nexport LLM_MODEL=gpt-4o-mini\nMS_GRAPH_CLIENT_SECRET=\"new secret\"\nUNRELATED=1\n",
            "persist": true,
        }),
    )
    .await;
    let result = &applied["result"]["structuredContent"]["result"];
    assert_eq!(result["applied"], json!(["LLM_MODEL", "MS_GRAPH_CLIENT_SECRET"]));
    assert_eq!(result["ignored"], json!(["UNRELATED"]));
    assert_eq!(result["status"]["llm"]["model"], json!("gpt-4o-mini"));
    let masked = result["status"]["graph"]["client_secret"].as_str().unwrap_or("");
    assert!(!masked.contains("new secret"));

    let written = parse_env_text(&std::fs::read_to_string(&secrets).expect("secrets file"))
        .expect("parse secrets");
    assert_eq!(written.get("LLM_MODEL").map(String::as_str), Some("gpt-4o-mini"));
    assert_eq!(
        written.get("MS_GRAPH_CLIENT_SECRET").map(String::as_str),
        Some("new secret")
    );
    let _ = std::fs::remove_file(&secrets);

    let status = call(&server, 2, "mcp_config", json!({"action": "status"})).await;
    assert_eq!(
        status["result"]["structuredContent"]["result"]["llm"]["model"],
        json!("gpt-4o-mini")
    );
    assert_eq!(
        status["result"]["structuredContent"]["result"]["store"]["in_memory"],
        json!(true)
    );

    let log = call(&server, 3, "mcp_config", json!({"action": "debug_log", "limit": 5})).await;
    let lines = log["result"]["structuredContent"]["result"]["lines"]
        .as_array()
        .expect("lines")
        .len();
    assert!(lines > 0 && lines <= 5);
}
