use crate::constants::graph::{COLLECTION_FIELD, DEFAULT_BASE_URL, NEXT_LINK_FIELD};
use crate::constants::limits::ERROR_BODY_PREVIEW_BYTES;
use crate::constants::network::USER_AGENT;
use crate::errors::{GraphError, ToolError};
use crate::services::config::{CopilotConfig, Credentials};
use crate::services::logger::Logger;
use crate::services::token_provider::{AccessToken, TokenProvider};
use crate::utils::redact::redact_text;
use reqwest::header::{HeaderValue, ACCEPT};
use reqwest::{Client, Method};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }

    fn sends_body(self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Patch)
    }

    fn to_reqwest(self) -> Method {
        match self {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
        }
    }
}

impl FromStr for HttpMethod {
    type Err = GraphError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "" | "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            _ => Err(GraphError::UnsupportedMethod(raw.trim().to_string())),
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One Graph response split into collection items and the continuation link.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ApiResult {
    pub data: Option<Vec<Value>>,
    pub next_link: Option<String>,
    /// Raw body when the response is not a collection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<Value>,
}

impl ApiResult {
    pub fn from_body(body: Value) -> Self {
        let next_link = body
            .get(NEXT_LINK_FIELD)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());
        match body.get(COLLECTION_FIELD).and_then(|v| v.as_array()) {
            Some(items) => Self {
                data: Some(items.clone()),
                next_link,
                entity: None,
            },
            None => Self {
                data: None,
                next_link,
                entity: if body.is_null() { None } else { Some(body) },
            },
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Paginated {
    pub data: Vec<Value>,
    pub pages: usize,
    /// Continuation link left over when the page cap was reached.
    pub next_link: Option<String>,
}

/// Authenticated Graph API invoker with a session-scoped token cache.
pub struct GraphClient {
    logger: Logger,
    http: Client,
    base_url: String,
    credentials: Credentials,
    token_provider: TokenProvider,
    token: Mutex<Option<AccessToken>>,
}

pub fn build_http_client(timeout_ms: Option<u64>) -> Result<Client, ToolError> {
    let mut builder = Client::builder().user_agent(USER_AGENT);
    if let Some(timeout_ms) = timeout_ms {
        builder = builder.timeout(std::time::Duration::from_millis(timeout_ms));
    }
    builder
        .build()
        .map_err(|err| ToolError::internal(format!("Failed to build HTTP client: {}", err)))
}

impl GraphClient {
    pub fn new(logger: Logger, config: &CopilotConfig) -> Result<Self, ToolError> {
        let http = build_http_client(None)?;
        Ok(Self::with_http(
            logger,
            http,
            &config.graph_base_url,
            &config.identity_root,
            config.credentials.clone(),
        ))
    }

    pub fn with_http(
        logger: Logger,
        http: Client,
        base_url: &str,
        identity_root: &str,
        credentials: Credentials,
    ) -> Self {
        let base_url = base_url.trim().trim_end_matches('/');
        Self {
            token_provider: TokenProvider::new(logger.clone(), http.clone(), Some(identity_root)),
            logger: logger.child("graph"),
            http,
            base_url: if base_url.is_empty() {
                DEFAULT_BASE_URL.to_string()
            } else {
                base_url.to_string()
            },
            credentials,
            token: Mutex::new(None),
        }
    }

    /// Absolute URLs pass through; relative ones are joined onto the base URL.
    pub fn resolve_url(&self, url: &str) -> String {
        let trimmed = url.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            return trimmed.to_string();
        }
        format!("{}/{}", self.base_url, trimmed.trim_start_matches('/'))
    }

    async fn access_token(&self) -> Result<AccessToken, GraphError> {
        self.credentials.validate()?;
        let mut guard = self.token.lock().await;
        if let Some(token) = guard.as_ref() {
            return Ok(token.clone());
        }
        let token = self.token_provider.fetch_token(&self.credentials).await?;
        *guard = Some(token.clone());
        Ok(token)
    }

    pub async fn has_token(&self) -> bool {
        self.token.lock().await.is_some()
    }

    pub async fn clear_token(&self) {
        *self.token.lock().await = None;
    }

    /// Issues one request and returns the parsed body (`null` when empty).
    pub async fn call(
        &self,
        url: &str,
        method: HttpMethod,
        body: Option<&Value>,
    ) -> Result<Value, GraphError> {
        let url = self.resolve_url(url);
        let token = self.access_token().await?;

        self.logger.debug(
            "Calling Graph API",
            Some(&serde_json::json!({"method": method.as_str(), "url": url})),
        );
        let mut request = self
            .http
            .request(method.to_reqwest(), &url)
            .bearer_auth(token.value())
            .header(ACCEPT, HeaderValue::from_static("application/json"));
        if method.sends_body() {
            if let Some(body) = body {
                request = request.json(body);
            }
        }
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = parse_error_message(&text, ERROR_BODY_PREVIEW_BYTES);
            self.logger.warn(
                "Graph API request failed",
                Some(&serde_json::json!({
                    "status": status.as_u16(),
                    "url": url,
                    "message": message,
                })),
            );
            if status.as_u16() == 400 {
                return Err(GraphError::BadRequest { url, message });
            }
            return Err(GraphError::Http {
                url,
                status: status.as_u16(),
                message,
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|err| GraphError::Decode(err.to_string()))
    }

    /// GET `url` and split the body into `data` and `next_link`.
    pub async fn fetch(&self, url: &str) -> Result<ApiResult, GraphError> {
        let body = self.call(url, HttpMethod::Get, None).await?;
        Ok(ApiResult::from_body(body))
    }

    /// Follows continuation links until they run out or `max_pages` is reached.
    pub async fn paginate(&self, url: &str, max_pages: usize) -> Result<Paginated, GraphError> {
        let max_pages = max_pages.max(1);
        let mut out = Paginated::default();
        let mut next = Some(url.to_string());
        while let Some(current) = next.take() {
            if out.pages >= max_pages {
                out.next_link = Some(current);
                break;
            }
            let page = self.fetch(&current).await?;
            out.pages += 1;
            match page.data {
                Some(items) => out.data.extend(items),
                None => {
                    if let Some(entity) = page.entity {
                        out.data.push(entity);
                    }
                    break;
                }
            }
            next = page.next_link;
        }
        self.logger.debug(
            "Pagination finished",
            Some(&serde_json::json!({
                "pages": out.pages,
                "items": out.data.len(),
                "truncated": out.next_link.is_some(),
            })),
        );
        Ok(out)
    }
}

/// Extracts the human-readable message from a Graph or identity error body.
pub(crate) fn parse_error_message(text: &str, max_bytes: usize) -> String {
    if let Ok(parsed) = serde_json::from_str::<Value>(text) {
        if let Some(message) = parsed
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
        {
            return redact_text(message, max_bytes);
        }
        if let Some(message) = parsed.get("error_description").and_then(|m| m.as_str()) {
            return redact_text(message, max_bytes);
        }
        if let Some(code) = parsed.get("error").and_then(|m| m.as_str()) {
            return redact_text(code, max_bytes);
        }
    }
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return "empty response body".to_string();
    }
    redact_text(trimmed, max_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client() -> GraphClient {
        GraphClient::with_http(
            Logger::silent("test"),
            Client::new(),
            "https://graph.microsoft.com/v1.0/",
            "http://127.0.0.1:1",
            Credentials::default(),
        )
    }

    #[test]
    fn relative_urls_are_joined_onto_the_base() {
        let graph = client();
        assert_eq!(
            graph.resolve_url("/users"),
            "https://graph.microsoft.com/v1.0/users"
        );
        assert_eq!(
            graph.resolve_url("https://graph.microsoft.com/beta/devices"),
            "https://graph.microsoft.com/beta/devices"
        );
    }

    #[test]
    fn method_parsing_rejects_unsupported_verbs() {
        assert_eq!("patch".parse::<HttpMethod>().unwrap(), HttpMethod::Patch);
        assert_eq!("".parse::<HttpMethod>().unwrap(), HttpMethod::Get);
        assert!(matches!(
            "PUT".parse::<HttpMethod>(),
            Err(GraphError::UnsupportedMethod(method)) if method == "PUT"
        ));
    }

    #[test]
    fn api_result_splits_collections_and_entities() {
        let collection = ApiResult::from_body(json!({
            "value": [{"id": "1"}],
            "@odata.nextLink": "https://graph.microsoft.com/v1.0/users?$skiptoken=abc"
        }));
        assert_eq!(collection.data, Some(vec![json!({"id": "1"})]));
        assert!(collection.next_link.is_some());

        let entity = ApiResult::from_body(json!({"id": "me"}));
        assert_eq!(entity.data, None);
        assert_eq!(entity.entity, Some(json!({"id": "me"})));

        assert_eq!(ApiResult::from_body(Value::Null), ApiResult::default());
    }

    #[test]
    fn parse_error_message_understands_graph_and_identity_bodies() {
        assert_eq!(
            parse_error_message(
                r#"{"error":{"code":"BadRequest","message":"Invalid filter clause"}}"#,
                1024
            ),
            "Invalid filter clause"
        );
        assert_eq!(
            parse_error_message(
                r#"{"error":"invalid_client","error_description":"AADSTS7000215: Invalid client secret"}"#,
                1024
            ),
            "AADSTS7000215: Invalid client secret"
        );
        assert_eq!(parse_error_message("", 1024), "empty response body");
    }

    #[tokio::test]
    async fn missing_credentials_are_reported_before_any_request() {
        let err = client()
            .call("users", HttpMethod::Get, None)
            .await
            .expect_err("missing credentials");
        assert!(matches!(err, GraphError::MissingCredentials(fields) if fields.len() == 3));
    }
}
