use thiserror::Error;

/// Failures surfaced by the package workflow backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport failure: timeout, refused connection, DNS. Already retried.
    #[error("Network error: {message}")]
    Network { message: String },

    /// HTTP 401. The credential cache has been cleared.
    #[error("Session expired, please sign in again")]
    Unauthorized,

    /// 4xx responses and `success: false` bodies.
    #[error("Request rejected ({status:?}): {}", .message.as_deref().unwrap_or("no message"))]
    Rejected {
        status: Option<u16>,
        message: Option<String>,
    },

    /// HTTP 409, e.g. a session taken concurrently by another member.
    #[error("Conflict: {}", .message.as_deref().unwrap_or("no message"))]
    Conflict { message: Option<String> },

    #[error("Server error ({status}): {}", .message.as_deref().unwrap_or("no message"))]
    Server { status: u16, message: Option<String> },

    #[error("Unexpected response: {reason}")]
    Malformed { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Connection,
    Authentication,
    Validation,
    Conflict,
    Server,
    Malformed,
}

impl ErrorCategory {
    /// Message shown when the backend did not provide one.
    pub fn fallback_message(self) -> &'static str {
        match self {
            ErrorCategory::Connection => {
                "Could not connect to the server. Check your connection and try again."
            }
            ErrorCategory::Authentication => "Your session has expired. Please sign in again.",
            ErrorCategory::Validation => "The request could not be completed.",
            ErrorCategory::Conflict => "Some sessions were taken by another member.",
            ErrorCategory::Server => "The server ran into a problem. Please try again later.",
            ErrorCategory::Malformed => "Could not load workflow information. Please try again.",
        }
    }
}

impl ApiError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ApiError::Network { .. } => ErrorCategory::Connection,
            ApiError::Unauthorized => ErrorCategory::Authentication,
            ApiError::Rejected { .. } => ErrorCategory::Validation,
            ApiError::Conflict { .. } => ErrorCategory::Conflict,
            ApiError::Server { .. } => ErrorCategory::Server,
            ApiError::Malformed { .. } => ErrorCategory::Malformed,
        }
    }

    /// Only transport failures are worth retrying; any HTTP answer is final.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Network { .. })
    }

    /// Backend message verbatim when present, otherwise the category fallback.
    pub fn user_message(&self) -> String {
        let backend_message = match self {
            ApiError::Rejected { message, .. }
            | ApiError::Conflict { message }
            | ApiError::Server { message, .. } => message.as_deref(),
            _ => None,
        };

        backend_message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| self.category().fallback_message())
            .to_string()
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, ApiError::Conflict { .. })
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        ApiError::Malformed {
            reason: reason.into(),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::malformed(err.to_string())
        } else {
            ApiError::Network {
                message: err.to_string(),
            }
        }
    }
}

impl From<reqwest_middleware::Error> for ApiError {
    fn from(err: reqwest_middleware::Error) -> Self {
        match err {
            reqwest_middleware::Error::Reqwest(inner) => inner.into(),
            reqwest_middleware::Error::Middleware(inner) => ApiError::Network {
                message: inner.to_string(),
            },
        }
    }
}
