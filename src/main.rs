use anyhow::{Context, Result};
use dialoguer::Password;
use serde_json::Value;
use std::sync::Arc;

use agent_admin_client::api::AppsQuery;
use agent_admin_client::config::{Command, Config};
use agent_admin_client::storage::FileStorage;
use agent_admin_client::{ApiClient, ClientError, CredentialStore, Payload, Route};

#[tokio::main]
async fn main() -> Result<()> {
    let (config, command) = Config::load()?;
    config.validate()?;

    // Initialize logging with a configured level
    let log_level = config.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::debug!(api = %config.api_base_url, session = %config.session_file.display(), "Starting");

    let storage = FileStorage::open(&config.session_file);
    let credentials = Arc::new(CredentialStore::new(Arc::new(storage)));
    let client = ApiClient::from_config(&config, credentials)?;

    // Nothing works without the app token - fail fast
    if let Err(e) = client.initialize_config(config.domain_name.as_deref()).await {
        tracing::error!("❌ {}", e);
        tracing::error!("🔧 Check that API_BASE_URL ({}) is reachable", config.api_base_url);
        if let Some(domain) = &config.domain_name {
            tracing::error!("🔧 Check that APP_DOMAIN_NAME ({}) is a known app", domain);
        }
        anyhow::bail!("Startup failed: unable to load app config, try again once the API is reachable");
    }

    match run(&client, command).await {
        Ok(()) => Ok(()),
        Err(ClientError::SessionExpired(reason)) => {
            tracing::debug!("Session expired: {}", reason);
            anyhow::bail!("Session expired, log in again with `agent-admin login`")
        }
        Err(e) => Err(e.into()),
    }
}

async fn run(client: &ApiClient, command: Command) -> agent_admin_client::Result<()> {
    match command {
        Command::Login { email, password } => {
            let password = match password {
                Some(p) => p,
                None => Password::new()
                    .with_prompt("Password")
                    .interact()
                    .context("Failed to read password")?,
            };

            let login = client.login_with_email(&email, &password).await?;
            let name = login.user.get("firstName").and_then(|v| v.as_str()).unwrap_or(email.as_str());
            println!("✅ Logged in as {}", name);
        }

        Command::Logout => {
            client.logout().await?;
            println!("👋 Logged out");
        }

        Command::Whoami => {
            if !client.credentials().is_logged_in() {
                return Err(ClientError::SessionExpired("not logged in".to_string()));
            }
            print_json(&client.me().await?);
        }

        Command::Apps { limit, offset } => {
            let query = AppsQuery {
                limit,
                offset,
                ..Default::default()
            };
            print_json(&client.list_apps(&query).await?);
        }

        Command::Stats => {
            let (stats, restrictions) = tokio::join!(client.user_stats(), client.user_restrictions());
            print_json(&serde_json::json!({
                "stats": stats?,
                "restrictions": restrictions?,
            }));
        }

        Command::Request { method, path, body } => {
            let method = method
                .to_uppercase()
                .parse::<reqwest::Method>()
                .map_err(|e| ClientError::Validation(format!("Invalid method: {}", e)))?;
            let payload = match body {
                Some(raw) => Payload::Json(
                    serde_json::from_str(&raw)
                        .map_err(|e| ClientError::Validation(format!("Invalid JSON body: {}", e)))?,
                ),
                None => Payload::Empty,
            };

            let route = Route::parse(method, &path);
            tracing::debug!(route = %route, class = ?route.auth_class(), "Raw request");
            print_json(&client.send_json(route, payload).await?);
        }
    }

    Ok(())
}

fn print_json(value: &Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
    );
}
