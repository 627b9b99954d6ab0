// Authentication types

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Scheme marker every Authorization value carries
pub const TOKEN_PREFIX: &str = "JWT ";

/// Snapshot of the session credentials
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialSet {
    /// App-level token, already prefixed with `JWT `
    pub app_token: String,
    pub user_access_token: String,
    pub refresh_token: String,
    pub ws_token: String,
}

/// Response of `POST /users/login/refresh`. All three fields are required.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub token: String,
    pub refresh_token: String,
    pub ws_token: String,
}

/// Response of the login endpoints
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub ws_token: String,
    #[serde(default)]
    pub user: Value,
}

/// App-level descriptor returned by `GET /apps/get-config`.
/// Only `appToken` is interpreted; the rest passes through untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct AppDescriptor {
    pub app_token: String,
    pub raw: Value,
}

impl AppDescriptor {
    /// Display name of the app, when the server sent one
    pub fn display_name(&self) -> Option<&str> {
        self.raw.get("displayName").and_then(|v| v.as_str())
    }

    pub fn domain_name(&self) -> Option<&str> {
        self.raw.get("domainName").and_then(|v| v.as_str())
    }
}

/// Add the `JWT ` marker unless it is already there
pub fn with_token_prefix(token: &str) -> String {
    if token.starts_with(TOKEN_PREFIX) {
        token.to_string()
    } else {
        format!("{}{}", TOKEN_PREFIX, token)
    }
}

/// First few characters of a token, for logs
pub fn token_preview(token: &str) -> String {
    let preview: String = token.chars().take(12).collect();
    if preview.len() < token.len() {
        format!("{}...", preview)
    } else {
        preview
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_with_token_prefix() {
        assert_eq!(with_token_prefix("abc123"), "JWT abc123");
        assert_eq!(with_token_prefix("JWT abc123"), "JWT abc123");
        assert_eq!(with_token_prefix(&with_token_prefix("abc123")), "JWT abc123");
    }

    #[test]
    fn test_refresh_response_requires_all_fields() {
        let ok: RefreshResponse =
            serde_json::from_value(json!({"token": "t2", "refreshToken": "r2", "wsToken": "w2"}))
                .unwrap();
        assert_eq!(ok.token, "t2");
        assert_eq!(ok.refresh_token, "r2");
        assert_eq!(ok.ws_token, "w2");

        let missing = serde_json::from_value::<RefreshResponse>(json!({"token": "t2", "refreshToken": "r2"}));
        assert!(missing.is_err());
    }

    #[test]
    fn test_login_response_keeps_user_payload() {
        let resp: LoginResponse = serde_json::from_value(json!({
            "token": "t1",
            "refreshToken": "r1",
            "wsToken": "w1",
            "user": {"_id": "u1", "firstName": "Ada"}
        }))
        .unwrap();
        assert_eq!(resp.user["firstName"], "Ada");
    }

    #[test]
    fn test_token_preview() {
        assert_eq!(token_preview("short"), "short");
        assert_eq!(token_preview("JWT abcdefghijklmnop"), "JWT abcdefgh...");
    }

    #[test]
    fn test_descriptor_accessors() {
        let descriptor = AppDescriptor {
            app_token: "JWT a".to_string(),
            raw: json!({"displayName": "Acme", "domainName": "acme"}),
        };
        assert_eq!(descriptor.display_name(), Some("Acme"));
        assert_eq!(descriptor.domain_name(), Some("acme"));
    }
}
