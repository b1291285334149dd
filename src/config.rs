//! Application configuration loaded from environment variables.
//!
//! A `.env` file is honored for local development.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default upstream OAuth token endpoint.
pub const DEFAULT_TOKEN_URL: &str = "https://developer.setmore.com/api/v1/o/oauth2/token";

/// Default upstream API base used by the proxy route.
pub const DEFAULT_API_BASE: &str = "https://developer.setmore.com";

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port for the proxy
    pub port: u16,
    /// Setmore API base URL (proxy target)
    pub setmore_api_base: String,
    /// Setmore OAuth token endpoint (refresh target)
    pub token_url: String,
    /// Proxy URL the data fetcher talks to
    pub proxy_url: String,
    /// Where the credential store is persisted
    pub credentials_path: PathBuf,
    /// Attempts per resource retrieval
    pub fetch_retries: u32,
    /// Base of the linear retry backoff (`attempt × base`)
    pub retry_backoff: Duration,
    /// Dashboard data older than this is reloaded by the auto-refresh loop
    pub data_refresh_interval: Duration,
    /// Refresh token to install at startup, if any
    pub bootstrap_refresh_token: Option<String>,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            port: 3000,
            setmore_api_base: DEFAULT_API_BASE.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            proxy_url: "http://127.0.0.1:3000/api/setmore".to_string(),
            credentials_path: PathBuf::from("data/credentials.json"),
            fetch_retries: 3,
            retry_backoff: Duration::from_millis(1000),
            data_refresh_interval: Duration::from_secs(30 * 60),
            bootstrap_refresh_token: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let port: u16 = parse_var("PORT", 3000)?;
        let proxy_url = env::var("PROXY_URL")
            .unwrap_or_else(|_| format!("http://127.0.0.1:{}/api/setmore", port));

        let fetch_retries: u32 = parse_var("FETCH_RETRIES", 3)?;
        if fetch_retries == 0 {
            return Err(ConfigError::Invalid {
                name: "FETCH_RETRIES",
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            port,
            setmore_api_base: env::var("SETMORE_API_BASE")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
            token_url: env::var("SETMORE_TOKEN_URL")
                .unwrap_or_else(|_| DEFAULT_TOKEN_URL.to_string()),
            proxy_url,
            credentials_path: env::var("CREDENTIALS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data/credentials.json")),
            fetch_retries,
            retry_backoff: Duration::from_millis(parse_var("RETRY_BACKOFF_MS", 1000)?),
            data_refresh_interval: minutes(
                "DATA_REFRESH_MINUTES",
                parse_var("DATA_REFRESH_MINUTES", 30)?,
            )?,
            bootstrap_refresh_token: env::var("SETMORE_REFRESH_TOKEN")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
        })
    }
}

/// Read an optional numeric variable, falling back to `default` when unset.
fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

/// Convert a minute count to a `Duration`, rejecting values that overflow.
fn minutes(name: &'static str, count: u64) -> Result<Duration, ConfigError> {
    count
        .checked_mul(60)
        .map(Duration::from_secs)
        .ok_or_else(|| ConfigError::Invalid {
            name,
            reason: format!("{} minutes is out of range", count),
        })
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}
