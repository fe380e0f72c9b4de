use crate::errors::GraphError;
use serde::Serialize;
use serde_json::Value;
use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    InvalidParams,
    Config,
    Denied,
    NotFound,
    BadRequest,
    Upstream,
    Timeout,
    Retryable,
    Internal,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolError {
    pub kind: ToolErrorKind,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    pub retryable: bool,
}

impl ToolError {
    pub fn new(kind: ToolErrorKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: code.into(),
            message: message.into(),
            hint: None,
            details: None,
            retryable: matches!(kind, ToolErrorKind::Timeout | ToolErrorKind::Retryable),
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::InvalidParams, "INVALID_PARAMS", message)
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Config, "CONFIG", message)
    }

    pub fn denied(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Denied, "DENIED", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::NotFound, "NOT_FOUND", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::BadRequest, "BAD_REQUEST", message)
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Upstream, "UPSTREAM", message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Timeout, "TIMEOUT", message)
    }

    pub fn retryable(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Retryable, "RETRYABLE", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::Internal, "INTERNAL", message)
    }
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for ToolError {}

impl From<std::io::Error> for ToolError {
    fn from(err: std::io::Error) -> Self {
        ToolError::internal(err.to_string())
    }
}

impl From<rusqlite::Error> for ToolError {
    fn from(err: rusqlite::Error) -> Self {
        ToolError::internal(format!("Conversation store error: {}", err))
    }
}

impl From<GraphError> for ToolError {
    fn from(err: GraphError) -> Self {
        let message = err.to_string();
        let base = match &err {
            GraphError::MissingCredentials(_) => ToolError::config(message),
            GraphError::InvalidTenantOrClient { .. }
            | GraphError::InvalidClientSecret { .. }
            | GraphError::TokenRequest { .. } => ToolError::denied(message),
            GraphError::BadRequest { .. } => ToolError::bad_request(message),
            GraphError::Http { status, .. } => match status {
                401 | 403 => ToolError::denied(message),
                404 => ToolError::not_found(message),
                429 | 500..=599 => ToolError::retryable(message),
                _ => ToolError::upstream(message),
            },
            GraphError::Network(_) => ToolError::retryable(message),
            GraphError::Decode(_) => ToolError::internal(message),
            GraphError::UnsupportedMethod(_) => ToolError::invalid_params(message),
        };
        let base = match err.hint() {
            Some(hint) => base.with_hint(hint),
            None => base,
        };
        match &err {
            GraphError::BadRequest { url, .. } | GraphError::Http { url, .. } => {
                base.with_details(serde_json::json!({
                    "status": err.status(),
                    "url": url,
                }))
            }
            _ => match err.status() {
                Some(status) => base.with_details(serde_json::json!({ "status": status })),
                None => base,
            },
        }
    }
}
