//! Error types for the panlib library.

use thiserror::Error;

use crate::api::error::ErrorCatalog;

/// Main error type for panlib operations.
///
/// The type is `Clone` because the response cache shares a single failure
/// with every caller that joined the in-flight computation. Transport
/// errors are therefore carried as rendered strings rather than by
/// wrapping the non-clonable `reqwest::Error`.
#[derive(Error, Debug, Clone)]
pub enum PanError {
    /// HTTP request failed with a non-success status code.
    #[error("HTTP error: {0}")]
    Http(u16),

    /// Network transport error.
    #[error("request error: {0}")]
    Request(String),

    /// The server response did not match the expected structure or pattern.
    #[error("could not parse the response returned by the server: {0}")]
    Format(String),

    /// The server rejected the login attempt.
    #[error("login error {code}: {message}")]
    Login { code: i32, message: String },

    /// The server reported an operation error after login.
    #[error("API error {code}: {message}")]
    Api { code: i32, message: String },

    /// A listing lookup by name yielded no match.
    #[error("not found: {0}")]
    NotFound(String),
}

impl PanError {
    /// Build a login error, resolving the message via the login catalog.
    pub(crate) fn login(code: i32) -> Self {
        PanError::Login {
            code,
            message: ErrorCatalog::Login.lookup(code).to_string(),
        }
    }

    /// Build an operation error, resolving the message via the general catalog.
    pub(crate) fn api(code: i32) -> Self {
        PanError::Api {
            code,
            message: ErrorCatalog::General.lookup(code).to_string(),
        }
    }

    /// Shorthand for a format error with context.
    pub(crate) fn format(context: impl Into<String>) -> Self {
        PanError::Format(context.into())
    }

    /// The numeric error code, for the coded variants.
    pub fn code(&self) -> Option<i32> {
        match self {
            PanError::Login { code, .. } | PanError::Api { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for PanError {
    fn from(err: reqwest::Error) -> Self {
        PanError::Request(err.to_string())
    }
}

impl From<serde_json::Error> for PanError {
    fn from(err: serde_json::Error) -> Self {
        PanError::Format(err.to_string())
    }
}

/// Result type alias for panlib operations.
pub type Result<T> = std::result::Result<T, PanError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coded_errors_carry_code() {
        assert_eq!(PanError::login(257).code(), Some(257));
        assert_eq!(PanError::api(-7).code(), Some(-7));
        assert_eq!(PanError::Http(502).code(), None);
    }

    #[test]
    fn test_unknown_code_still_branchable() {
        let err = PanError::api(424242);
        assert_eq!(err.code(), Some(424242));
        assert!(err.to_string().contains("unknown error"));
    }

    #[test]
    fn test_json_error_folds_into_format() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(matches!(PanError::from(json_err), PanError::Format(_)));
    }
}
