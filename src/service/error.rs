//! Failure classification at the adapter boundary.

use reqwest::StatusCode;

/// Errors returned by the external service adapters.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Timeout, quota, overload; worth another attempt
    #[error("Transient failure: {message}")]
    Transient { message: String },

    /// The service answered, but has nothing for this input
    #[error("Not found: {what}")]
    NotFound { what: String },

    /// The service refused the request outright
    #[error("Rejected with HTTP {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("Malformed response: {message}")]
    Malformed { message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ServiceError {
    pub fn transient(message: impl Into<String>) -> Self {
        ServiceError::Transient {
            message: message.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        ServiceError::NotFound { what: what.into() }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        ServiceError::Malformed {
            message: message.into(),
        }
    }

    /// Map a non-success HTTP status into the taxonomy
    pub fn from_status(status: StatusCode, context: &str) -> Self {
        if status == StatusCode::NOT_FOUND {
            ServiceError::not_found(context)
        } else if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            ServiceError::transient(format!("HTTP {} for {}", status.as_u16(), context))
        } else {
            ServiceError::Rejected {
                status: status.as_u16(),
                message: context.to_string(),
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ServiceError::NotFound { .. })
    }

    /// Whether a retry policy may try the call again
    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::Transient { .. } | ServiceError::Malformed { .. } => true,
            ServiceError::NotFound { .. } | ServiceError::Rejected { .. } => false,
            ServiceError::Http(e) => {
                e.is_timeout() || e.is_connect() || e.is_request() || e.is_body() || e.is_decode()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(ServiceError::from_status(StatusCode::NOT_FOUND, "x").is_not_found());
        assert!(ServiceError::from_status(StatusCode::TOO_MANY_REQUESTS, "x").is_retryable());
        assert!(ServiceError::from_status(StatusCode::BAD_GATEWAY, "x").is_retryable());

        let rejected = ServiceError::from_status(StatusCode::FORBIDDEN, "x");
        assert!(!rejected.is_retryable());
        assert!(!rejected.is_not_found());
    }

    #[test]
    fn test_malformed_is_retryable() {
        assert!(ServiceError::malformed("truncated body").is_retryable());
        assert!(!ServiceError::not_found("author").is_retryable());
    }
}
