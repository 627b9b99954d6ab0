// Token refresh logic

use anyhow::Context;
use reqwest::header::AUTHORIZATION;
use reqwest::Client;

use super::store::CredentialStore;
use super::types::{token_preview, CredentialSet, RefreshResponse};
use crate::error::{ClientError, Result};
use crate::routes::Route;

/// Exchange the stored refresh token for a new session.
///
/// Sends the refresh token as stored, with no prefix added. On success the
/// returned token, refresh token and ws token overwrite the store. On failure
/// nothing is retried and nothing is cleared.
pub async fn refresh_session(
    client: &Client,
    base_url: &str,
    store: &CredentialStore,
) -> Result<CredentialSet> {
    tracing::info!("Refreshing user session...");

    let route = Route::RefreshToken;
    let url = format!("{}{}", base_url, route.path());

    let response = client
        .request(route.method(), &url)
        .header(AUTHORIZATION, store.refresh_token())
        .send()
        .await
        .context("Failed to send refresh request")?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        tracing::error!(
            status = status.as_u16(),
            body = %error_text,
            "Session refresh rejected"
        );
        return Err(ClientError::from_body(status.as_u16(), &error_text));
    }

    let data: RefreshResponse = response
        .json()
        .await
        .context("Failed to parse refresh response")?;

    if data.token.is_empty() {
        return Err(ClientError::Internal(anyhow::anyhow!(
            "Refresh response does not contain a token"
        )));
    }

    store.set_session(&data.token, &data.refresh_token, &data.ws_token);

    tracing::info!(token = %token_preview(&data.token), "Session refreshed");

    Ok(store.snapshot())
}
