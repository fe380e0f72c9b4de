#![allow(dead_code)]

use graph_copilot::services::config::CopilotConfig;
use once_cell::sync::Lazy;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tokio::sync::Mutex;
use wiremock::matchers::{body_partial_json, body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

pub const TENANT: &str = "contoso-tenant";
pub const TOKEN: &str = "graph-token-1";

pub fn token_path() -> String {
    format!("/{}/oauth2/v2.0/token", TENANT)
}

/// Config pointing Graph, identity and the LLM at one mock server.
pub fn config_for(server: &MockServer) -> CopilotConfig {
    let mut vars = BTreeMap::new();
    vars.insert("MS_GRAPH_TENANT_ID".to_string(), TENANT.to_string());
    vars.insert("MS_GRAPH_CLIENT_ID".to_string(), "client-id".to_string());
    vars.insert("MS_GRAPH_CLIENT_SECRET".to_string(), "client-secret".to_string());
    vars.insert("MS_GRAPH_BASE_URL".to_string(), format!("{}/v1.0", server.uri()));
    vars.insert("MS_GRAPH_IDENTITY_URL".to_string(), server.uri());
    vars.insert("LLM_BASE_URL".to_string(), server.uri());
    vars.insert("LLM_API_KEY".to_string(), "llm-key".to_string());
    vars.insert("LLM_MODEL".to_string(), "test-model".to_string());
    vars.insert(
        "COPILOT_DB_PATH".to_string(),
        std::env::temp_dir()
            .join(format!("graph-copilot-{}.db", uuid::Uuid::new_v4()))
            .display()
            .to_string(),
    );
    CopilotConfig::from_vars(vars)
}

/// Token endpoint that must be hit exactly `times` times.
pub async fn mount_token(server: &MockServer, times: u64) {
    Mock::given(method("POST"))
        .and(path(token_path()))
        .and(body_string_contains("grant_type=client_credentials"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token_type": "Bearer",
            "expires_in": 3599,
            "access_token": TOKEN,
        })))
        .expect(times)
        .mount(server)
        .await;
}

pub fn chat_completion(content: &str) -> Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop",
        }],
    })
}

pub fn sse_body(chunks: &[&str]) -> String {
    let mut body = String::new();
    for chunk in chunks {
        let event = json!({"choices": [{"index": 0, "delta": {"content": chunk}}]});
        body.push_str(&format!("data: {}\n\n", event));
    }
    body.push_str("data: [DONE]\n\n");
    body
}

/// Schema-constrained completion returning `descriptor` as JSON text.
pub async fn mount_synthesis(server: &MockServer, descriptor: Value) {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"response_format": {"type": "json_schema"}})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(chat_completion(&descriptor.to_string())),
        )
        .mount(server)
        .await;
}

pub async fn mount_stream(server: &MockServer, chunks: &[&str]) {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(sse_body(chunks)),
        )
        .mount(server)
        .await;
}
