//! Error types for the oracle gateway.

use std::time::Duration;
use thiserror::Error;

/// Additional context from provider errors for debugging.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// HTTP status code from the provider.
    pub http_status: Option<u16>,
    /// Provider-specific error code (e.g. "invalid_api_key").
    pub provider_code: Option<String>,
    /// Request ID from provider (x-request-id header).
    pub request_id: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.http_status = Some(status);
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.provider_code = Some(code.into());
        self
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }
}

/// Errors that can occur when calling the completion service.
///
/// Two families matter to callers: the service could not be reached at all
/// ([`OracleError::is_unavailable`]), or it answered with something other
/// than a usable completion.
#[derive(Debug, Error)]
pub enum OracleError {
    /// Configuration error (missing API key, bad header value, client build).
    #[error("configuration error: {0}")]
    Config(String),

    /// HTTP/network error before a response was received.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Request timed out.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// Invalid request, rejected locally before sending.
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    /// Non-2xx response from the service.
    #[error("oracle returned HTTP {status}: {message}")]
    Status {
        status: u16,
        message: String,
        context: ErrorContext,
    },

    /// The model declined to answer.
    #[error("refused: {message}")]
    Refused { message: String },

    /// 2xx response whose envelope could not be used (no choices, bad JSON, too large).
    #[error("malformed response: {message}")]
    Malformed {
        message: String,
        context: Option<ErrorContext>,
    },
}

impl OracleError {
    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an invalid request error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Create a status error.
    pub fn status(status: u16, message: impl Into<String>, context: ErrorContext) -> Self {
        Self::Status {
            status,
            message: message.into(),
            context,
        }
    }

    /// Create a refused error.
    pub fn refused(message: impl Into<String>) -> Self {
        Self::Refused {
            message: message.into(),
        }
    }

    /// Create a malformed-response error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
            context: None,
        }
    }

    /// Whether the service was unreachable (as opposed to answering badly).
    pub fn is_unavailable(&self) -> bool {
        match self {
            Self::Config(_) | Self::Http(_) | Self::Timeout(_) => true,
            Self::InvalidRequest { .. }
            | Self::Status { .. }
            | Self::Refused { .. }
            | Self::Malformed { .. } => false,
        }
    }

    /// Get a short error code for logging.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "config_error",
            Self::Http(_) => "http_error",
            Self::Timeout(_) => "timeout",
            Self::InvalidRequest { .. } => "invalid_request",
            Self::Status { status: 429, .. } => "rate_limited",
            Self::Status { .. } => "status_error",
            Self::Refused { .. } => "refused",
            Self::Malformed { .. } => "malformed_response",
        }
    }

    /// Get the error context if available.
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Self::Status { context, .. } => Some(context),
            Self::Malformed { context, .. } => context.as_ref(),
            Self::Config(_)
            | Self::Http(_)
            | Self::Timeout(_)
            | Self::InvalidRequest { .. }
            | Self::Refused { .. } => None,
        }
    }

    /// Get the request ID if available.
    pub fn request_id(&self) -> Option<&str> {
        self.context().and_then(|c| c.request_id.as_deref())
    }
}
