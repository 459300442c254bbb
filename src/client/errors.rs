//! Client error taxonomy and the notices shown for it.

use reqwest::StatusCode;
use thiserror::Error;

use crate::model::FieldErrors;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{message}")]
    Validation { message: String, errors: FieldErrors },

    #[error("{0}")]
    Authentication(String),

    #[error("Resource not found.")]
    NotFound,

    /// No response was received; the status is 0.
    #[error("Network error: {0}")]
    Network(String),

    #[error("The request timed out.")]
    Timeout,

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Invalid response: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Parse(err.to_string())
        } else if err.is_connect() {
            Self::Network("Failed to connect to the server".to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A user-facing message derived from a failed call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub severity: Severity,
    pub title: String,
    pub message: String,
}

impl Notice {
    fn new(severity: Severity, title: &str, message: impl Into<String>) -> Self {
        Self {
            severity,
            title: title.to_string(),
            message: message.into(),
        }
    }
}

impl ClientError {
    #[must_use]
    pub fn validation(errors: FieldErrors) -> Self {
        Self::Validation {
            message: "The given data was invalid.".to_string(),
            errors,
        }
    }

    /// HTTP status of the failure, `0` when no response was received.
    #[must_use]
    pub const fn status(&self) -> u16 {
        match self {
            Self::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY.as_u16(),
            Self::Authentication(_) => StatusCode::UNAUTHORIZED.as_u16(),
            Self::NotFound => StatusCode::NOT_FOUND.as_u16(),
            Self::Http { status, .. } => *status,
            Self::Network(_) | Self::Timeout | Self::Parse(_) => 0,
        }
    }

    /// Field errors, when the server returned any.
    #[must_use]
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            Self::Validation { errors, .. } => Some(errors),
            _ => None,
        }
    }

    #[must_use]
    pub fn notice(&self) -> Notice {
        match self {
            Self::Validation { message, errors } => Notice::new(
                Severity::Warning,
                "Validation failed",
                errors.first_message().unwrap_or(message),
            ),
            Self::Authentication(message) => {
                Notice::new(Severity::Error, "Authentication failed", message.as_str())
            }
            Self::NotFound => Notice::new(
                Severity::Warning,
                "Not found",
                "The requested record no longer exists.",
            ),
            Self::Network(_) => Notice::new(
                Severity::Error,
                "Network error",
                "Unable to reach the server. Check your connection.",
            ),
            Self::Timeout => Notice::new(
                Severity::Error,
                "Timeout",
                "The server took too long to respond.",
            ),
            Self::Http { status, message } if *status >= 500 => Notice::new(
                Severity::Error,
                "Server error",
                format!("{message} ({status})"),
            ),
            Self::Http { message, .. } => {
                Notice::new(Severity::Warning, "Request failed", message.as_str())
            }
            Self::Parse(_) => Notice::new(
                Severity::Error,
                "Unexpected response",
                "The server sent a response that could not be read.",
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_notice_shows_first_field_message() {
        let err = ClientError::validation(FieldErrors::single(
            "nom",
            "The nom field is required.",
        ));
        let notice = err.notice();
        assert_eq!(notice.severity, Severity::Warning);
        assert_eq!(notice.message, "The nom field is required.");
        assert_eq!(err.status(), 422);
        assert!(err.field_errors().is_some_and(|errors| errors.contains("nom")));
    }

    #[test]
    fn network_failures_have_status_zero() {
        assert_eq!(ClientError::Network("refused".to_string()).status(), 0);
        assert_eq!(ClientError::Timeout.status(), 0);
        assert_eq!(ClientError::Timeout.notice().severity, Severity::Error);
    }

    #[test]
    fn server_errors_are_errors_client_errors_are_warnings() {
        let server = ClientError::Http {
            status: 500,
            message: "Server error.".to_string(),
        };
        assert_eq!(server.notice().severity, Severity::Error);
        assert_eq!(server.notice().message, "Server error. (500)");

        let conflict = ClientError::Http {
            status: 409,
            message: "The request conflicts with existing data.".to_string(),
        };
        assert_eq!(conflict.notice().severity, Severity::Warning);
        assert_eq!(conflict.status(), 409);
    }
}
