// Config bootstrap: fetch the app descriptor and install the app token

use serde_json::Value;

use super::types::{token_preview, with_token_prefix, AppDescriptor};
use crate::error::{ClientError, Result};
use crate::http_client::{ApiClient, Payload};
use crate::routes::Route;

impl ApiClient {
    /// Fetch the app config and store its app token.
    ///
    /// Must succeed before any other request; every failure is a
    /// `ClientError::ConfigLoad`.
    pub async fn initialize_config(&self, domain_name: Option<&str>) -> Result<AppDescriptor> {
        tracing::info!(domain = domain_name.unwrap_or("none"), "Fetching app config");

        let route = Route::GetConfig {
            domain_name: domain_name.map(str::to_string),
        };

        let body = self
            .send_json(route, Payload::Empty)
            .await
            .map_err(|e| ClientError::ConfigLoad(e.to_string()))?;

        let descriptor = parse_app_descriptor(body)?;
        self.credentials().set_app_token(descriptor.app_token.clone());

        tracing::info!(
            app_token = %token_preview(&descriptor.app_token),
            "App config initialized"
        );

        Ok(descriptor)
    }
}

/// Pull `result.appToken` out of a config response, normalising its prefix
pub fn parse_app_descriptor(body: Value) -> Result<AppDescriptor> {
    let result = match body.get("result") {
        Some(result) if result.is_object() => result.clone(),
        _ => {
            return Err(ClientError::ConfigLoad(
                "No result in config response".to_string(),
            ))
        }
    };

    let app_token = result
        .get("appToken")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|t| !t.is_empty() && *t != "JWT")
        .ok_or_else(|| {
            let keys: Vec<&str> = result
                .as_object()
                .map(|o| o.keys().map(String::as_str).collect())
                .unwrap_or_default();
            ClientError::ConfigLoad(format!(
                "appToken not found in config response. Available keys: {}",
                keys.join(", ")
            ))
        })?;

    Ok(AppDescriptor {
        app_token: with_token_prefix(app_token),
        raw: result.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_keeps_existing_prefix() {
        let descriptor =
            parse_app_descriptor(json!({"result": {"appToken": "JWT abc123"}})).unwrap();
        assert_eq!(descriptor.app_token, "JWT abc123");
    }

    #[test]
    fn test_adds_missing_prefix() {
        let descriptor = parse_app_descriptor(json!({"result": {"appToken": "abc123"}})).unwrap();
        assert_eq!(descriptor.app_token, "JWT abc123");
    }

    #[test]
    fn test_missing_result() {
        let err = parse_app_descriptor(json!({"appToken": "abc123"})).unwrap_err();
        assert!(matches!(err, ClientError::ConfigLoad(ref m) if m.contains("No result")));
    }

    #[test]
    fn test_missing_app_token_lists_keys() {
        let err =
            parse_app_descriptor(json!({"result": {"displayName": "Acme", "domainName": "acme"}}))
                .unwrap_err();
        match err {
            ClientError::ConfigLoad(msg) => {
                assert!(msg.contains("appToken not found"));
                assert!(msg.contains("displayName"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_blank_app_token_rejected() {
        assert!(parse_app_descriptor(json!({"result": {"appToken": "   "}})).is_err());
        assert!(parse_app_descriptor(json!({"result": {"appToken": "JWT "}})).is_err());
        assert!(parse_app_descriptor(json!({"result": {"appToken": 42}})).is_err());
    }

    #[test]
    fn test_descriptor_keeps_raw_payload() {
        let descriptor = parse_app_descriptor(json!({
            "result": {"appToken": "abc", "displayName": "Acme", "primaryColor": "#fff"}
        }))
        .unwrap();
        assert_eq!(descriptor.display_name(), Some("Acme"));
        assert_eq!(descriptor.raw["primaryColor"], "#fff");
    }
}
