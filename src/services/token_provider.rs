use crate::constants::graph::DEFAULT_SCOPE;
use crate::constants::identity::{DEFAULT_ROOT, GRANT_TYPE};
use crate::constants::limits::ERROR_BODY_PREVIEW_BYTES;
use crate::errors::GraphError;
use crate::services::config::Credentials;
use crate::services::graph_client::parse_error_message;
use crate::services::logger::Logger;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;

/// Bearer token for the Graph API.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn value(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

/// Client-credentials grant against the identity endpoint.
#[derive(Clone)]
pub struct TokenProvider {
    logger: Logger,
    http: reqwest::Client,
    identity_root: String,
}

impl TokenProvider {
    pub fn new(logger: Logger, http: reqwest::Client, identity_root: Option<&str>) -> Self {
        Self {
            logger: logger.child("token"),
            http,
            identity_root: identity_root
                .unwrap_or(DEFAULT_ROOT)
                .trim_end_matches('/')
                .to_string(),
        }
    }

    pub fn token_url(&self, tenant_id: &str) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.identity_root,
            tenant_id.trim()
        )
    }

    /// Requests a new token. Never retries; the caller owns caching.
    pub async fn fetch_token(&self, credentials: &Credentials) -> Result<AccessToken, GraphError> {
        credentials.validate()?;
        let url = self.token_url(&credentials.tenant_id);
        let mut payload = HashMap::new();
        payload.insert("client_id", credentials.client_id.trim());
        payload.insert("client_secret", credentials.client_secret.trim());
        payload.insert("scope", DEFAULT_SCOPE);
        payload.insert("grant_type", GRANT_TYPE);

        self.logger.debug(
            "Requesting Graph access token",
            Some(&serde_json::json!({
                "tenant_id": credentials.tenant_id,
                "client_id": credentials.client_id,
            })),
        );
        let response = self
            .http
            .post(&url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .form(&payload)
            .send()
            .await?;
        let status = response.status().as_u16();
        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = parse_error_message(&text, ERROR_BODY_PREVIEW_BYTES);
            self.logger.warn(
                "Token request failed",
                Some(&serde_json::json!({"status": status, "message": message})),
            );
            return Err(match status {
                400 => GraphError::InvalidTenantOrClient { message },
                401 => GraphError::InvalidClientSecret { message },
                _ => GraphError::TokenRequest { status, message },
            });
        }
        let body: TokenResponse = response
            .json()
            .await
            .map_err(|err| GraphError::Decode(format!("token response: {}", err)))?;
        let token = body
            .access_token
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| GraphError::Decode("token response has no access_token".to_string()))?;
        self.logger.info("Obtained Graph access token", None);
        Ok(AccessToken::new(token))
    }
}
