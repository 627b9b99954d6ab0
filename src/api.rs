// Typed endpoint wrappers over the request pipeline
//
// Business payloads are opaque JSON; only the session fields of login
// responses are interpreted.

use serde::Serialize;
use serde_json::{json, Value};

use crate::auth::{token_preview, LoginResponse};
use crate::error::{ClientError, Result};
use crate::http_client::{ApiClient, FilePart, Payload};
use crate::routes::Route;
use crate::url_input::parse_crawl_url;

/// Smallest page size the apps endpoint accepts
pub const MIN_APPS_LIMIT: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Pagination for the apps list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppsQuery {
    pub limit: u32,
    pub offset: u32,
    pub order: SortOrder,
    pub order_by: String,
}

impl Default for AppsQuery {
    fn default() -> Self {
        Self {
            limit: 10,
            offset: 0,
            order: SortOrder::Asc,
            order_by: "displayName".to_string(),
        }
    }
}

impl AppsQuery {
    /// Query string with the limit clamped to the API minimum
    pub fn to_query_string(&self) -> String {
        let order = match self.order {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        };
        format!(
            "limit={}&offset={}&order={}&orderBy={}",
            self.limit.max(MIN_APPS_LIMIT),
            self.offset,
            order,
            self.order_by
        )
    }
}

/// Fields for email sign-up
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailSignUp {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cf_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utm: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "signupPlan")]
    pub sign_up_plan: Option<String>,
}

/// Tokens from a social identity provider
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialCredentials {
    pub id_token: String,
    pub access_token: String,
    pub login_type: String,
    pub auth_token: String,
}

impl ApiClient {
    // ============ AUTH ============

    /// Log in with email and password and store the session
    pub async fn login_with_email(&self, email: &str, password: &str) -> Result<LoginResponse> {
        let body = self
            .send_json(
                Route::LoginWithEmail,
                Payload::Json(json!({ "email": email, "password": password })),
            )
            .await?;
        self.store_login(body).await
    }

    /// Log in with a social identity and store the session
    pub async fn login_social(&self, social: &SocialCredentials) -> Result<LoginResponse> {
        let body = self
            .send_json(Route::LoginSocial, Payload::Json(to_json(social)?))
            .await?;
        self.store_login(body).await
    }

    pub async fn register_social(
        &self,
        social: &SocialCredentials,
        sign_up_plan: Option<&str>,
        utm: Option<&str>,
    ) -> Result<Value> {
        let mut body = to_json(social)?;
        if let Some(plan) = sign_up_plan {
            body["signupPlan"] = json!(plan);
        }
        if let Some(utm) = utm {
            body["utm"] = json!(utm);
        }
        self.send_json(Route::RegisterSocial, Payload::Json(body)).await
    }

    pub async fn register_with_email(&self, sign_up: &EmailSignUp) -> Result<Value> {
        self.send_json(Route::SignUpWithEmail, Payload::Json(to_json(sign_up)?))
            .await
    }

    /// Password sign-up on the v2 API
    pub async fn register_with_email_v2(&self, sign_up: &EmailSignUp) -> Result<Value> {
        if sign_up.password.as_deref().unwrap_or_default().is_empty() {
            return Err(ClientError::Validation(
                "Password is required for sign-up".to_string(),
            ));
        }
        self.send_json(Route::SignUpWithEmailV2, Payload::Json(to_json(sign_up)?))
            .await
    }

    pub async fn check_email(&self, email: &str) -> Result<Value> {
        self.send_json(
            Route::CheckEmail {
                email: email.to_string(),
            },
            Payload::Empty,
        )
        .await
    }

    pub async fn resend_verification(&self, email: &str) -> Result<Value> {
        self.send_json(
            Route::ResendVerification,
            Payload::Json(json!({ "email": email })),
        )
        .await
    }

    pub async fn forgot_password(&self, email: &str) -> Result<Value> {
        self.send_json(Route::ForgotPassword, Payload::Json(json!({ "email": email })))
            .await
    }

    pub async fn reset_password(&self, token: &str, password: &str) -> Result<Value> {
        self.send_json(
            Route::ResetPassword,
            Payload::Json(json!({ "token": token, "password": password })),
        )
        .await
    }

    /// End the session on the server, then locally regardless of the outcome
    pub async fn logout(&self) -> Result<()> {
        let result = self.send_json(Route::Logout, Payload::Empty).await;
        self.credentials().clear_all();

        match result {
            Ok(_) => Ok(()),
            Err(ClientError::SessionExpired(_)) => Ok(()),
            Err(e) => {
                tracing::warn!("Server-side logout failed: {}", e);
                Err(e)
            }
        }
    }

    async fn store_login(&self, body: Value) -> Result<LoginResponse> {
        let login: LoginResponse = serde_json::from_value(body)
            .map_err(|e| ClientError::Internal(anyhow::anyhow!("Malformed login response: {}", e)))?;

        self.install_session(&login.token, &login.refresh_token, &login.ws_token)
            .await;

        tracing::info!(token = %token_preview(&login.token), "Logged in");
        Ok(login)
    }

    // ============ USER ============

    pub async fn me(&self) -> Result<Value> {
        self.send_json(Route::Me, Payload::Empty).await
    }

    pub async fn update_me(&self, fields: Value) -> Result<Value> {
        self.send_json(Route::UpdateMe, Payload::Json(fields)).await
    }

    /// Aggregated usage across all of the user's agents
    pub async fn user_stats(&self) -> Result<Value> {
        self.send_json(Route::UserStats, Payload::Empty).await
    }

    /// Plan limits, quotas and feature restrictions
    pub async fn user_restrictions(&self) -> Result<Value> {
        self.send_json(Route::UserRestrictions, Payload::Empty).await
    }

    // ============ APPS ============

    pub async fn create_app(&self, display_name: &str) -> Result<Value> {
        self.send_json(
            Route::CreateApp,
            Payload::Json(json!({ "displayName": display_name })),
        )
        .await
    }

    pub async fn list_apps(&self, query: &AppsQuery) -> Result<Value> {
        self.send_json(
            Route::ListApps {
                query: query.to_query_string(),
            },
            Payload::Empty,
        )
        .await
    }

    pub async fn get_app(&self, app_id: &str) -> Result<Value> {
        self.send_json(
            Route::GetApp {
                app_id: app_id.to_string(),
            },
            Payload::Empty,
        )
        .await
    }

    pub async fn update_app(&self, app_id: &str, options: Value) -> Result<Value> {
        self.send_json(
            Route::UpdateApp {
                app_id: app_id.to_string(),
            },
            Payload::Json(options),
        )
        .await
    }

    pub async fn delete_app(&self, app_id: &str) -> Result<Value> {
        self.send_json(
            Route::DeleteApp {
                app_id: app_id.to_string(),
            },
            Payload::Empty,
        )
        .await
    }

    pub async fn create_app_chat(&self, app_id: &str, title: &str, pinned: bool) -> Result<Value> {
        self.send_json(
            Route::CreateAppChat {
                app_id: app_id.to_string(),
            },
            Payload::Json(json!({ "title": title, "pinned": pinned })),
        )
        .await
    }

    pub async fn default_rooms(&self, app_id: &str) -> Result<Value> {
        self.send_json(
            Route::DefaultRooms {
                app_id: app_id.to_string(),
            },
            Payload::Empty,
        )
        .await
    }

    // ============ SOURCES ============

    /// Add a website crawl target. The URL is normalised and validated first.
    pub async fn add_site_crawl(&self, app_id: &str, url: &str, follow_link: bool) -> Result<Value> {
        let url = parse_crawl_url(url)?;
        self.send_json(
            Route::SiteCrawl {
                app_id: app_id.to_string(),
            },
            Payload::Json(json!({ "url": url.as_str(), "followLink": follow_link })),
        )
        .await
    }

    pub async fn reindex_site_crawl(&self, app_id: &str, url_id: &str) -> Result<Value> {
        self.send_json(
            Route::SiteCrawlReindex {
                app_id: app_id.to_string(),
            },
            Payload::Json(json!({ "urlId": url_id })),
        )
        .await
    }

    pub async fn delete_site_crawl_urls(&self, app_id: &str, urls: &[String]) -> Result<Value> {
        self.send_json(
            Route::DeleteSiteCrawlUrls {
                app_id: app_id.to_string(),
            },
            Payload::Json(json!({ "urls": urls })),
        )
        .await
    }

    /// Upload documents as knowledge for an agent, all under the `files` field
    pub async fn upload_source_documents(&self, app_id: &str, files: Vec<FilePart>) -> Result<Value> {
        if files.is_empty() {
            return Err(ClientError::Validation("No files to upload".to_string()));
        }
        let files = files
            .into_iter()
            .map(|f| FilePart {
                field: "files".to_string(),
                ..f
            })
            .collect();

        self.send_json(
            Route::UploadSourceDocs {
                app_id: app_id.to_string(),
            },
            Payload::Multipart(files),
        )
        .await
    }

    pub async fn delete_source_document(&self, app_id: &str, file_id: &str) -> Result<Value> {
        self.send_json(
            Route::DeleteSourceDoc {
                app_id: app_id.to_string(),
                file_id: file_id.to_string(),
            },
            Payload::Empty,
        )
        .await
    }

    // ============ DOCUMENTS ============

    pub async fn upload_file(&self, file: FilePart) -> Result<Value> {
        let file = FilePart {
            field: "files".to_string(),
            ..file
        };
        self.send_json(Route::UploadFile, Payload::Multipart(vec![file]))
            .await
    }

    pub async fn list_documents(&self, wallet: &str) -> Result<Value> {
        self.send_json(
            Route::ListDocuments {
                wallet: wallet.to_string(),
            },
            Payload::Empty,
        )
        .await
    }

    /// Upload a file, then register it as a named document
    pub async fn create_document(&self, document_name: &str, file: FilePart) -> Result<Value> {
        let uploaded = self.upload_file(file).await?;
        let location = uploaded
            .pointer("/results/0/location")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                ClientError::Internal(anyhow::anyhow!(
                    "File upload response has no results[0].location"
                ))
            })?
            .to_string();

        self.send_json(
            Route::CreateDocument,
            Payload::Json(json!({ "documentName": document_name, "files": [location] })),
        )
        .await
    }

    pub async fn delete_document(&self, id: &str) -> Result<Value> {
        self.send_json(
            Route::DeleteDocument { id: id.to_string() },
            Payload::Empty,
        )
        .await
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value)
        .map_err(|e| ClientError::Internal(anyhow::anyhow!("Failed to encode request: {}", e)))
}
