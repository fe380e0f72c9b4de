use thiserror::Error;

/// Failures raised while talking to the identity endpoint or the Graph API.
#[derive(Debug, Clone, Error)]
pub enum GraphError {
    #[error("Missing Graph credentials: {}", .0.join(", "))]
    MissingCredentials(Vec<&'static str>),

    #[error("Token request rejected (400): {message}")]
    InvalidTenantOrClient { message: String },

    #[error("Token request unauthorized (401): {message}")]
    InvalidClientSecret { message: String },

    #[error("Token request failed ({status}): {message}")]
    TokenRequest { status: u16, message: String },

    #[error("Graph API bad request (400): {message}")]
    BadRequest { url: String, message: String },

    #[error("Graph API request failed ({status}): {message}")]
    Http {
        url: String,
        status: u16,
        message: String,
    },

    #[error("Graph request failed: {0}")]
    Network(String),

    #[error("Graph response invalid: {0}")]
    Decode(String),

    #[error("Unsupported HTTP method: {0}")]
    UnsupportedMethod(String),
}

impl GraphError {
    pub fn status(&self) -> Option<u16> {
        match self {
            GraphError::InvalidTenantOrClient { .. } | GraphError::BadRequest { .. } => Some(400),
            GraphError::InvalidClientSecret { .. } => Some(401),
            GraphError::TokenRequest { status, .. } | GraphError::Http { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }

    pub fn is_bad_request(&self) -> bool {
        matches!(self, GraphError::BadRequest { .. })
    }

    pub fn hint(&self) -> Option<&'static str> {
        match self {
            GraphError::MissingCredentials(_) => Some(
                "Set MS_GRAPH_TENANT_ID, MS_GRAPH_CLIENT_ID and MS_GRAPH_CLIENT_SECRET before calling Graph.",
            ),
            GraphError::InvalidTenantOrClient { .. } => {
                Some("Check the tenant id and client id of the app registration.")
            }
            GraphError::InvalidClientSecret { .. } => {
                Some("The client secret is invalid or expired. Create a new secret and update MS_GRAPH_CLIENT_SECRET.")
            }
            GraphError::BadRequest { .. } => {
                Some("The endpoint or query parameters are likely wrong. A $top=1 sample can help correct them.")
            }
            GraphError::Http { status: 401, .. } => {
                Some("The access token was rejected. Clear the session to request a new token.")
            }
            GraphError::Http { status: 403, .. } => {
                Some("The app registration lacks the Graph permission required by this endpoint.")
            }
            _ => None,
        }
    }
}

impl From<reqwest::Error> for GraphError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return GraphError::Network("HTTP request timed out".to_string());
        }
        if err.is_decode() {
            return GraphError::Decode(err.to_string());
        }
        GraphError::Network(err.to_string())
    }
}
