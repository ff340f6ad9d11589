//! Completion backend errors
//!
//! This module defines `BackendError`, the single error type returned by every
//! `LLMClient` implementation. A backend error is the only failure that aborts a
//! chat invocation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Errors that can occur while talking to a completion backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BackendError {
    /// API request failed with the given message
    ApiError {
        message: String,
        status_code: Option<u16>,
    },

    /// Request timed out after the specified duration (in seconds)
    TimeoutError { seconds: u64 },

    /// Invalid or malformed response from the model server
    InvalidResponse {
        message: String,
        raw_response: Option<String>,
    },

    /// The requested model is not available on the server
    ModelNotFound { model: String },

    /// Configuration error (invalid endpoint, HTTP client setup, etc.)
    ConfigurationError { message: String },

    /// Network-related error
    NetworkError { message: String },

    /// Generic error for other cases
    Other { message: String },
}

impl BackendError {
    /// Returns true when the backend could not be reached at all
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            BackendError::NetworkError { .. } | BackendError::TimeoutError { .. }
        )
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::ApiError {
                message,
                status_code,
            } => {
                if let Some(code) = status_code {
                    write!(f, "API error ({}): {}", code, message)
                } else {
                    write!(f, "API error: {}", message)
                }
            }
            BackendError::TimeoutError { seconds } => {
                write!(f, "Request timed out after {} seconds", seconds)
            }
            BackendError::InvalidResponse { message, .. } => {
                write!(f, "Invalid response from model: {}", message)
            }
            BackendError::ModelNotFound { model } => {
                write!(
                    f,
                    "Model '{}' not found. Pull it with: ollama pull {}",
                    model, model
                )
            }
            BackendError::ConfigurationError { message } => {
                write!(f, "Configuration error: {}", message)
            }
            BackendError::NetworkError { message } => {
                write!(f, "Network error: {}", message)
            }
            BackendError::Other { message } => {
                write!(f, "Error: {}", message)
            }
        }
    }
}

impl std::error::Error for BackendError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_with_status_code() {
        let err = BackendError::ApiError {
            message: "boom".to_string(),
            status_code: Some(500),
        };
        assert_eq!(err.to_string(), "API error (500): boom");

        let err = BackendError::ApiError {
            message: "boom".to_string(),
            status_code: None,
        };
        assert_eq!(err.to_string(), "API error: boom");
    }

    #[test]
    fn test_model_not_found_hint() {
        let err = BackendError::ModelNotFound {
            model: "gemma3:12b".to_string(),
        };
        assert!(err.to_string().contains("ollama pull gemma3:12b"));
    }

    #[test]
    fn test_is_unreachable() {
        assert!(BackendError::TimeoutError { seconds: 5 }.is_unreachable());
        assert!(BackendError::NetworkError {
            message: "refused".to_string()
        }
        .is_unreachable());
        assert!(!BackendError::Other {
            message: "x".to_string()
        }
        .is_unreachable());
    }
}
