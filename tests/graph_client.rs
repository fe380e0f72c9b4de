mod common;

use common::{config_for, mount_token, token_path, TENANT, TOKEN};
use graph_copilot::errors::{GraphError, ToolError, ToolErrorKind};
use graph_copilot::services::config::Credentials;
use graph_copilot::services::graph_client::{build_http_client, GraphClient, HttpMethod};
use graph_copilot::services::logger::Logger;
use graph_copilot::services::token_provider::TokenProvider;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> GraphClient {
    GraphClient::new(Logger::silent("test"), &config_for(server)).expect("client")
}

#[tokio::test]
async fn token_is_fetched_once_and_reused() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/v1.0/users"))
        .and(header("authorization", format!("Bearer {}", TOKEN).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{"id": "1", "displayName": "Adele Vance"}],
        })))
        .expect(2)
        .mount(&server)
        .await;

    let graph = client(&server);
    let first = graph.fetch("users").await.expect("first call");
    let second = graph.fetch("/users").await.expect("second call");
    assert_eq!(first, second);
    assert_eq!(first.data.as_ref().map(Vec::len), Some(1));
    assert!(graph.has_token().await);
}

#[tokio::test]
async fn missing_credentials_never_reach_the_identity_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(token_path()))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let graph = GraphClient::with_http(
        Logger::silent("test"),
        build_http_client(None).expect("http"),
        &format!("{}/v1.0", server.uri()),
        &server.uri(),
        Credentials::new(TENANT, "client-id", ""),
    );
    let err = graph.fetch("users").await.expect_err("no secret");
    assert!(matches!(err, GraphError::MissingCredentials(ref missing) if missing == &vec!["client_secret"]));
    let tool_err: ToolError = err.into();
    assert_eq!(tool_err.kind, ToolErrorKind::Config);
}

#[tokio::test]
async fn token_errors_map_to_credential_problems() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bad-tenant/oauth2/v2.0/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_request",
            "error_description": "AADSTS90002: Tenant 'bad-tenant' not found.",
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(token_path()))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "invalid_client",
            "error_description": "AADSTS7000215: Invalid client secret provided.",
        })))
        .mount(&server)
        .await;

    let provider = TokenProvider::new(
        Logger::silent("test"),
        build_http_client(None).expect("http"),
        Some(&server.uri()),
    );
    let err = provider
        .fetch_token(&Credentials::new("bad-tenant", "client-id", "secret"))
        .await
        .expect_err("unknown tenant");
    assert!(matches!(err, GraphError::InvalidTenantOrClient { ref message } if message.contains("AADSTS90002")));

    let err = provider
        .fetch_token(&Credentials::new(TENANT, "client-id", "wrong"))
        .await
        .expect_err("bad secret");
    assert!(matches!(err, GraphError::InvalidClientSecret { .. }));
    assert!(err.hint().is_some());
}

#[tokio::test]
async fn bad_request_is_distinguished_from_other_failures() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/v1.0/users"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {"code": "BadRequest", "message": "Invalid filter clause"},
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1.0/groups"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": {"code": "Authorization_RequestDenied", "message": "Insufficient privileges"},
        })))
        .mount(&server)
        .await;

    let graph = client(&server);
    let err = graph
        .fetch("users?$filter=foo eq 'bar'")
        .await
        .expect_err("bad request");
    assert!(err.is_bad_request());
    assert_eq!(err.status(), Some(400));
    assert!(err.to_string().contains("Invalid filter clause"));

    let err = graph.fetch("groups").await.expect_err("forbidden");
    assert!(!err.is_bad_request());
    assert_eq!(err.status(), Some(403));
    assert!(matches!(err, GraphError::Http { status: 403, .. }));
}

#[tokio::test]
async fn pagination_follows_next_links_up_to_the_cap() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    for page in 1..=3 {
        let next = format!("{}/v1.0/devices?page={}", server.uri(), page + 1);
        Mock::given(method("GET"))
            .and(path("/v1.0/devices"))
            .and(query_param("page", page.to_string().as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [{"id": format!("d{}", page)}],
                "@odata.nextLink": next,
            })))
            .expect(if page <= 2 { 1 } else { 0 })
            .mount(&server)
            .await;
    }

    let graph = client(&server);
    let paginated = graph.paginate("devices?page=1", 2).await.expect("paginate");
    assert_eq!(paginated.pages, 2);
    assert_eq!(paginated.data.len(), 2);
    assert_eq!(paginated.data[1]["id"], json!("d2"));
    assert_eq!(
        paginated.next_link,
        Some(format!("{}/v1.0/devices?page=3", server.uri()))
    );
}

#[tokio::test]
async fn pagination_stops_when_no_next_link_remains() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/v1.0/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{"id": "1"}, {"id": "2"}],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let paginated = client(&server).paginate("users", 10).await.expect("paginate");
    assert_eq!(paginated.pages, 1);
    assert_eq!(paginated.data.len(), 2);
    assert_eq!(paginated.next_link, None);
}

#[tokio::test]
async fn patch_sends_the_body_and_empty_responses_are_null() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    Mock::given(method("PATCH"))
        .and(path("/v1.0/users/1"))
        .and(body_partial_json(json!({"jobTitle": "Engineer"})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let body = json!({"jobTitle": "Engineer"});
    let response = client(&server)
        .call("users/1", "patch".parse::<HttpMethod>().expect("method"), Some(&body))
        .await
        .expect("patch");
    assert!(response.is_null());
}
