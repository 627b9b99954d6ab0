use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Agent admin - command line client for the agent administration API
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Base URL of the v1 API
    #[arg(long, env = "API_BASE_URL", default_value = "https://api.ethoradev.com/v1")]
    pub api_base: String,

    /// Base URL of the v2 API
    #[arg(long, env = "API_V2_BASE_URL", default_value = "https://api.ethoradev.com/v2")]
    pub api_v2_base: String,

    /// Domain name used to pick the app config
    #[arg(short = 'D', long, env = "APP_DOMAIN_NAME")]
    pub domain: Option<String>,

    /// File the session tokens are persisted to
    #[arg(short = 's', long, env = "SESSION_FILE")]
    pub session_file: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    /// HTTP request timeout in seconds
    #[arg(long, env = "HTTP_REQUEST_TIMEOUT", default_value = "60")]
    pub http_timeout: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Log in with email and password
    Login {
        #[arg(short, long)]
        email: String,
        /// Prompted for when omitted
        #[arg(short, long)]
        password: Option<String>,
    },
    /// End the current session
    Logout,
    /// Show the logged-in user
    Whoami,
    /// List agents
    Apps {
        #[arg(long, default_value = "10")]
        limit: u32,
        #[arg(long, default_value = "0")]
        offset: u32,
    },
    /// Show usage statistics and plan restrictions
    Stats,
    /// Send a raw request through the authenticated pipeline
    Request {
        method: String,
        path: String,
        /// JSON body
        #[arg(long)]
        body: Option<String>,
    },
}

#[derive(Clone, Debug)]
pub struct Config {
    // API
    pub api_base_url: String,
    pub api_v2_base_url: String,
    pub domain_name: Option<String>,

    // Session persistence
    pub session_file: PathBuf,

    // HTTP client
    pub http_connect_timeout: u64,
    pub http_request_timeout: u64,

    pub log_level: String,
}

impl Config {
    /// Load configuration from all sources with priority: CLI > ENV > defaults
    pub fn load() -> Result<(Self, Command)> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let args = CliArgs::parse();
        let command = args.command.clone();
        Ok((Self::from_args(args), command))
    }

    pub fn from_args(args: CliArgs) -> Self {
        Config {
            api_base_url: args.api_base,
            api_v2_base_url: args.api_v2_base,
            domain_name: args.domain.filter(|d| !d.trim().is_empty()),

            session_file: args
                .session_file
                .map(|s| expand_tilde(&s))
                .unwrap_or_else(default_session_file),

            http_connect_timeout: std::env::var("HTTP_CONNECT_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),

            http_request_timeout: args.http_timeout,

            log_level: args.log_level,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("API_BASE_URL", &self.api_base_url),
            ("API_V2_BASE_URL", &self.api_v2_base_url),
        ] {
            let url = url::Url::parse(value)
                .with_context(|| format!("{} is not a valid URL: {}", name, value))?;
            if !matches!(url.scheme(), "http" | "https") {
                anyhow::bail!("{} must be an http(s) URL: {}", name, value);
            }
        }

        if self.http_request_timeout == 0 {
            anyhow::bail!("HTTP_REQUEST_TIMEOUT must be greater than zero");
        }

        Ok(())
    }
}

/// Default session file under the user's config directory
fn default_session_file() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("agent-admin")
        .join("session.json")
}

/// Expand tilde (~) in file paths to user's home directory
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
