use anyhow::Context;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::auth::{self, with_token_prefix, CredentialSet, CredentialStore};
use crate::config::Config;
use crate::error::{ClientError, Result};
use crate::routes::{ApiVersion, AuthClass, Route};

/// Request body, rebuilt for every attempt so a replay never needs a body clone
#[derive(Debug, Clone, Default)]
pub enum Payload {
    #[default]
    Empty,
    Json(Value),
    Multipart(Vec<FilePart>),
}

/// One file of a multipart upload
#[derive(Debug, Clone)]
pub struct FilePart {
    pub field: String,
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl FilePart {
    pub fn new(field: &str, file_name: &str, data: Vec<u8>) -> Self {
        let content_type = mime_guess::from_path(file_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Self {
            field: field.to_string(),
            file_name: file_name.to_string(),
            content_type,
            data,
        }
    }

    /// Read a file from disk, guessing its content type from the extension
    pub fn from_path(field: &str, path: &Path) -> anyhow::Result<Self> {
        let data = std::fs::read(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .context("Path has no file name")?;
        Ok(Self::new(field, &file_name, data))
    }
}

/// HTTP client for the admin API
///
/// Every call goes through the same pipeline: classify the route, attach the
/// matching credential, dispatch, and on a 401 refresh the session once and
/// replay the request once.
pub struct ApiClient {
    /// Shared HTTP client with connection pooling
    client: Client,

    /// Session credentials
    credentials: Arc<CredentialStore>,

    base_url: String,
    v2_base_url: String,

    /// Bumped after every refresh attempt
    refresh_generation: AtomicU64,

    /// Held while a refresh is in flight; remembers why the last one failed
    refresh_gate: Mutex<Option<String>>,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(
        credentials: Arc<CredentialStore>,
        base_url: &str,
        v2_base_url: &str,
        connect_timeout: u64,
        request_timeout: u64,
    ) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout))
            .timeout(Duration::from_secs(request_timeout))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            credentials,
            base_url: base_url.trim_end_matches('/').to_string(),
            v2_base_url: v2_base_url.trim_end_matches('/').to_string(),
            refresh_generation: AtomicU64::new(0),
            refresh_gate: Mutex::new(None),
        })
    }

    pub fn from_config(config: &Config, credentials: Arc<CredentialStore>) -> Result<Self> {
        Self::new(
            credentials,
            &config.api_base_url,
            &config.api_v2_base_url,
            config.http_connect_timeout,
            config.http_request_timeout,
        )
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a request and decode the JSON body. An empty body decodes to `Null`.
    pub async fn send_json(&self, route: Route, payload: Payload) -> Result<Value> {
        let response = self.send(route, payload).await?;
        let bytes = response.bytes().await?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }

        serde_json::from_slice(&bytes)
            .context("Failed to parse response body")
            .map_err(ClientError::from)
    }

    /// Run a request through the pipeline.
    ///
    /// Returns the response for 2xx, `ClientError::Api` for other statuses.
    pub async fn send(&self, route: Route, payload: Payload) -> Result<Response> {
        let class = route.auth_class();

        if matches!(class, AuthClass::Public | AuthClass::Authenticated)
            && !self.credentials.has_app_token()
        {
            tracing::error!(route = %route, "App token not initialized, refusing to send request");
            return Err(ClientError::CredentialMissing {
                route: route.to_string(),
            });
        }

        let observed_generation = self.refresh_generation.load(Ordering::SeqCst);
        let response = self.dispatch(&route, &payload, 1).await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return into_result(response).await;
        }

        if route.is_auth_primitive() || matches!(class, AuthClass::Bootstrap | AuthClass::Refresh) {
            tracing::debug!(route = %route, "401 from auth endpoint, not refreshing");
            return into_result(response).await;
        }

        tracing::warn!(route = %route, "Received 401, refreshing session and replaying");
        drop(response);

        self.refresh_after_unauthorized(observed_generation).await?;

        // One replay, whatever it returns goes back to the caller
        let replay = self.dispatch(&route, &payload, 2).await?;
        into_result(replay).await
    }

    /// Refresh the session directly. Does not clear credentials on failure.
    pub async fn refresh(&self) -> Result<CredentialSet> {
        let mut last_failure = self.refresh_gate.lock().await;
        let result = auth::refresh_session(&self.client, &self.base_url, &self.credentials).await;
        self.refresh_generation.fetch_add(1, Ordering::SeqCst);
        *last_failure = result.as_ref().err().map(|e| e.to_string());
        result
    }

    /// Install a new session from a login response.
    ///
    /// Takes the refresh gate so requests still holding a 401 from the old
    /// session replay with the new one instead of reusing a stale failure.
    pub(crate) async fn install_session(&self, token: &str, refresh_token: &str, ws_token: &str) {
        let mut last_failure = self.refresh_gate.lock().await;
        self.credentials.set_session(token, refresh_token, ws_token);
        self.refresh_generation.fetch_add(1, Ordering::SeqCst);
        *last_failure = None;
    }

    /// Single-flight refresh for a request that saw a 401.
    ///
    /// Only the first waiter of a generation calls the refresh route; the rest
    /// reuse its outcome. A failed refresh clears the session, including one
    /// started through [`ApiClient::refresh`].
    async fn refresh_after_unauthorized(&self, observed_generation: u64) -> Result<()> {
        let mut last_failure = self.refresh_gate.lock().await;

        if self.refresh_generation.load(Ordering::SeqCst) != observed_generation {
            return match last_failure.as_ref() {
                Some(reason) => {
                    self.credentials.clear_all();
                    Err(ClientError::SessionExpired(reason.clone()))
                }
                None => {
                    tracing::debug!("Session already refreshed by another request");
                    Ok(())
                }
            };
        }

        let result = auth::refresh_session(&self.client, &self.base_url, &self.credentials).await;
        self.refresh_generation.fetch_add(1, Ordering::SeqCst);

        match result {
            Ok(_) => {
                *last_failure = None;
                Ok(())
            }
            Err(e) => {
                tracing::error!("Token refresh failed: {}", e);
                self.credentials.clear_all();
                let reason = e.to_string();
                *last_failure = Some(reason.clone());
                Err(ClientError::SessionExpired(reason))
            }
        }
    }

    /// Authorization header value for a route, or None to send without one
    fn authorization_for(&self, route: &Route) -> Option<String> {
        match route.auth_class() {
            AuthClass::Public => Some(self.credentials.app_token().trim().to_string()),
            AuthClass::Authenticated => {
                let token = self.credentials.user_access_token();
                if token.is_empty() {
                    None
                } else {
                    Some(with_token_prefix(&token))
                }
            }
            AuthClass::Refresh => Some(self.credentials.refresh_token()),
            AuthClass::Bootstrap => None,
        }
    }

    fn url_for(&self, route: &Route) -> String {
        let base = match route.version() {
            ApiVersion::V1 => &self.base_url,
            ApiVersion::V2 => &self.v2_base_url,
        };
        format!("{}{}", base, route.path())
    }

    fn build_request(&self, route: &Route, payload: &Payload) -> Result<RequestBuilder> {
        let mut builder = self.client.request(route.method(), self.url_for(route));

        if let Some(value) = self.authorization_for(route) {
            builder = builder.header(AUTHORIZATION, value);
        }

        builder = match payload {
            Payload::Empty => builder,
            Payload::Json(body) => builder.json(body),
            Payload::Multipart(files) => {
                let mut form = reqwest::multipart::Form::new();
                for file in files {
                    let part = reqwest::multipart::Part::bytes(file.data.clone())
                        .file_name(file.file_name.clone())
                        .mime_str(&file.content_type)?;
                    form = form.part(file.field.clone(), part);
                }
                builder.multipart(form)
            }
        };

        Ok(builder)
    }

    async fn dispatch(&self, route: &Route, payload: &Payload, attempt: u32) -> Result<Response> {
        let builder = self.build_request(route, payload)?;

        tracing::debug!(
            method = %route.method(),
            url = %self.url_for(route),
            attempt = attempt,
            "Sending HTTP request"
        );

        match builder.send().await {
            Ok(response) => {
                tracing::debug!(status = %response.status(), "Received HTTP response");
                Ok(response)
            }
            Err(e) => {
                let error_kind = if e.is_timeout() {
                    "timeout"
                } else if e.is_connect() {
                    "connection_failed"
                } else if e.is_request() {
                    "request_error"
                } else {
                    "unknown"
                };

                tracing::warn!(
                    error_kind = error_kind,
                    error = %e,
                    route = %route,
                    attempt = attempt,
                    "HTTP request error"
                );
                Err(ClientError::Http(e))
            }
        }
    }
}

/// Pass 2xx through, turn anything else into `ClientError::Api`
async fn into_result(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().clone();
    let body = response.text().await.unwrap_or_default();

    tracing::warn!(
        status = status.as_u16(),
        url = %url,
        "HTTP request failed with error response"
    );

    Err(ClientError::from_body(status.as_u16(), &body))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> ApiClient {
        let store = Arc::new(CredentialStore::in_memory());
        ApiClient::new(store, "https://api.test/v1/", "https://api.test/v2", 5, 10).unwrap()
    }

    #[test]
    fn test_url_for_uses_versioned_base() {
        let client = test_client();
        assert_eq!(client.url_for(&Route::Me), "https://api.test/v1/users/me");
        assert_eq!(
            client.url_for(&Route::SignUpWithEmailV2),
            "https://api.test/v2/users/sign-up-with-email"
        );
    }

    #[test]
    fn test_authorization_for_public_uses_app_token_verbatim() {
        let client = test_client();
        client.credentials().set_app_token("JWT app-token");
        assert_eq!(
            client.authorization_for(&Route::LoginWithEmail).as_deref(),
            Some("JWT app-token")
        );
    }

    #[test]
    fn test_authorization_for_authenticated_adds_prefix_once() {
        let client = test_client();
        assert_eq!(client.authorization_for(&Route::Me), None);

        client.credentials().set_user_access_token("t1");
        assert_eq!(client.authorization_for(&Route::Me).as_deref(), Some("JWT t1"));

        client.credentials().set_user_access_token("JWT t1");
        assert_eq!(client.authorization_for(&Route::Me).as_deref(), Some("JWT t1"));
    }

    #[test]
    fn test_authorization_for_special_routes() {
        let client = test_client();
        client.credentials().set_refresh_token("r1");
        assert_eq!(
            client.authorization_for(&Route::RefreshToken).as_deref(),
            Some("r1")
        );
        assert_eq!(
            client.authorization_for(&Route::GetConfig { domain_name: None }),
            None
        );
    }

    #[test]
    fn test_file_part_guesses_content_type() {
        let part = FilePart::new("files", "guide.pdf", vec![1, 2, 3]);
        assert_eq!(part.content_type, "application/pdf");

        let part = FilePart::new("files", "blob", vec![]);
        assert_eq!(part.content_type, "application/octet-stream");
    }

    #[test]
    fn test_file_part_from_path() {
        let dir = std::env::temp_dir().join(format!("agent-admin-part-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("notes.txt");
        std::fs::write(&path, "# Notes").unwrap();

        let part = FilePart::from_path("files", &path).unwrap();
        assert_eq!(part.file_name, "notes.txt");
        assert_eq!(part.content_type, "text/plain");
        assert_eq!(part.data, b"# Notes");

        assert!(FilePart::from_path("files", &dir.join("missing.txt")).is_err());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_send_without_app_token_fails_fast() {
        let client = test_client();
        let err = client.send(Route::Me, Payload::Empty).await.unwrap_err();
        assert!(matches!(err, ClientError::CredentialMissing { .. }));

        let err = client
            .send(Route::LoginWithEmail, Payload::Empty)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::CredentialMissing { .. }));
    }
}
