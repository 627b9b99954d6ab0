// Error handling module
// Defines the client error taxonomy and how API error bodies are read

use serde_json::Value;
use thiserror::Error;

/// Errors that can occur while talking to the admin API
#[derive(Error, Debug)]
pub enum ClientError {
    /// App config could not be loaded at startup. Nothing can proceed without it.
    #[error("Failed to load app config: {0}")]
    ConfigLoad(String),

    /// A request was attempted before the app token was bootstrapped
    #[error("App token not initialized, cannot request {route}")]
    CredentialMissing { route: String },

    /// Token refresh failed, the user has to log in again
    #[error("Session expired: {0}")]
    SessionExpired(String),

    /// Non-success response from the API
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Input rejected before anything was sent
    #[error("Validation error: {0}")]
    Validation(String),

    /// Transport-level failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Anything else
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ClientError {
    /// HTTP status carried by this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Errors the application cannot recover from without a reload
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ClientError::ConfigLoad(_) | ClientError::CredentialMissing { .. }
        )
    }

    /// Errors that should send the user back to the login entry point
    pub fn requires_login(&self) -> bool {
        matches!(self, ClientError::SessionExpired(_))
    }

    /// Build an `Api` error from a status and raw response body
    pub fn from_body(status: u16, body: &str) -> Self {
        ClientError::Api {
            status,
            message: extract_message(status, body),
        }
    }
}

/// Pull a human-readable message out of an error body.
/// Prefers `message`, then `error`, then the raw body, then the status reason.
pub fn extract_message(status: u16, body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        for key in ["message", "error"] {
            if let Some(msg) = json.get(key).and_then(|v| v.as_str()) {
                if !msg.is_empty() {
                    return msg.to_string();
                }
            }
        }
    }

    let trimmed = body.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }

    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown error")
        .to_string()
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ClientError::ConfigLoad("No result in config response".to_string());
        assert_eq!(
            err.to_string(),
            "Failed to load app config: No result in config response"
        );

        let err = ClientError::CredentialMissing {
            route: "POST /users/login-with-email".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "App token not initialized, cannot request POST /users/login-with-email"
        );

        let err = ClientError::Api {
            status: 429,
            message: "Rate limit exceeded".to_string(),
        };
        assert_eq!(err.to_string(), "API error: 429 - Rate limit exceeded");
    }

    #[test]
    fn test_internal_error_message() {
        let err = ClientError::Internal(anyhow::anyhow!("Something went wrong"));
        assert_eq!(err.to_string(), "Internal error: Something went wrong");
    }

    #[test]
    fn test_status_and_classification() {
        let err = ClientError::Api {
            status: 404,
            message: "Not found".to_string(),
        };
        assert_eq!(err.status(), Some(404));
        assert!(!err.is_fatal());

        assert!(ClientError::ConfigLoad("x".to_string()).is_fatal());
        assert!(ClientError::CredentialMissing {
            route: "GET /users/me".to_string()
        }
        .is_fatal());
        assert!(ClientError::SessionExpired("x".to_string()).requires_login());
        assert_eq!(ClientError::Validation("x".to_string()).status(), None);
    }

    #[test]
    fn test_extract_message_prefers_message_field() {
        let body = r#"{"message":"Email already taken","error":"Conflict"}"#;
        assert_eq!(extract_message(409, body), "Email already taken");
    }

    #[test]
    fn test_extract_message_falls_back_to_error_field() {
        let body = r#"{"error":"Invalid credentials"}"#;
        assert_eq!(extract_message(400, body), "Invalid credentials");
    }

    #[test]
    fn test_extract_message_plain_body_and_empty() {
        assert_eq!(extract_message(502, "Bad gateway upstream"), "Bad gateway upstream");
        assert_eq!(extract_message(404, ""), "Not Found");
        assert_eq!(extract_message(999, "  "), "Unknown error");
    }

    #[test]
    fn test_from_body() {
        let err = ClientError::from_body(403, r#"{"message":"Forbidden app"}"#);
        match err {
            ClientError::Api { status, message } => {
                assert_eq!(status, 403);
                assert_eq!(message, "Forbidden app");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
