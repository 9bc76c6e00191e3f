use crate::response::ResponseEnvelope;
use thiserror::Error;

/// Main error type for client construction, request building and calls
#[derive(Debug, Error)]
pub enum Error {
    /// The client was constructed without a site
    #[error("client: no site provided")]
    NoSite,

    /// The site could not be parsed as an absolute base URL
    #[error("client: invalid site {site:?}: {source}")]
    InvalidSite {
        site: String,
        #[source]
        source: url::ParseError,
    },

    /// An option was given an unusable argument
    #[error("client configuration error: {0}")]
    Config(String),

    /// Auto-renewal was requested before an OAuth2 capability was installed
    #[error("OAuth must be configured before enabling auto-renewal")]
    OAuthNotConfigured,

    /// Relative path could not be parsed or resolved against the site
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Request body could not be encoded as JSON
    #[error("failed to serialize request body: {0}")]
    Serialize(#[source] serde_json::Error),

    /// Request building error
    #[error("failed to build request: {0}")]
    RequestBuild(String),

    /// Network-level failure, no response was received
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The response body could not be read to the end
    #[error("failed to read response body: {source}")]
    Body {
        #[source]
        source: std::io::Error,
        response: Box<ResponseEnvelope>,
    },

    #[error("client: no resource found ({})", .0.endpoint)]
    NotFound(Box<ResponseEnvelope>),

    #[error("client: unauthorized ({})", .0.endpoint)]
    Unauthorized(Box<ResponseEnvelope>),

    #[error("client: internal server error ({})", .0.endpoint)]
    Internal(Box<ResponseEnvelope>),

    #[error("client: bad request ({})", .0.endpoint)]
    BadRequest(Box<ResponseEnvelope>),

    /// Any other non-2xx status
    #[error("client: invalid status code {} ({})", .0.code, .0.endpoint)]
    InvalidStatusCode(Box<ResponseEnvelope>),

    /// The call succeeded but the body did not match the expected shape
    #[error("failed to decode response body: {source}")]
    Decode {
        #[source]
        source: serde_json::Error,
        response: Box<ResponseEnvelope>,
    },

    /// Token renewal errors
    #[error("no refresh token available and access token has expired")]
    NoRefreshToken,

    #[error("token refresh failed: {0}")]
    TokenRefresh(String),

    #[error("token store error: {0}")]
    TokenStore(String),

    #[error("no issue ids or keys provided")]
    NoIssueKeys,

    #[error("no JQL query provided")]
    NoJql,

    /// JSON error outside the request/response path (token stores)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(Box::new(err))
    }
}

impl Error {
    /// Map a non-success status onto the fixed error taxonomy
    pub fn from_status(response: ResponseEnvelope) -> Self {
        let response = Box::new(response);
        match response.code.as_u16() {
            404 => Error::NotFound(response),
            401 => Error::Unauthorized(response),
            500 => Error::Internal(response),
            400 => Error::BadRequest(response),
            _ => Error::InvalidStatusCode(response),
        }
    }

    /// Envelope attached to status, decode and body errors
    pub fn response(&self) -> Option<&ResponseEnvelope> {
        match self {
            Error::NotFound(r)
            | Error::Unauthorized(r)
            | Error::Internal(r)
            | Error::BadRequest(r)
            | Error::InvalidStatusCode(r) => Some(r),
            Error::Decode { response, .. } | Error::Body { response, .. } => Some(response),
            _ => None,
        }
    }

    /// Get the HTTP status code if a response was received
    pub fn status_code(&self) -> Option<u16> {
        self.response().map(|r| r.code.as_u16())
    }

    /// Check if this error is a not found error (404)
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Check if this error is an unauthorized error (401)
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Error::Unauthorized(_))
    }

    /// True for errors raised before any client or request existed
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Error::NoSite | Error::InvalidSite { .. } | Error::Config(_) | Error::OAuthNotConfigured
        )
    }
}

/// Result type for client operations
pub type Result<T> = std::result::Result<T, Error>;
