//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub log_level: Level,
    pub cors_origin: String,

    // --- Forum API ---
    pub reddit_client_id: String,
    pub reddit_client_secret: String,
    pub reddit_user_agent: String,
    pub reddit_token_url: String,
    pub reddit_api_base: String,
    pub forum_web_base: String,

    // --- Generation ---
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub allowed_models: Vec<String>,

    // --- Limits ---
    pub http_timeout: Duration,
    pub generation_timeout: Duration,
    pub request_deadline: Duration,
    /// Questions per caller per UTC day; zero disables the quota.
    pub daily_question_limit: u32,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingVar(key.to_string()))
        };

        // --- Server Settings ---
        let bind_address = parse_var("BIND_ADDRESS", &var("BIND_ADDRESS", "0.0.0.0:3000"))?;

        let log_level_str = var("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;
        let cors_origin = var("CORS_ORIGIN", "http://localhost:3000");

        // --- Forum API Settings ---
        let reddit_client_id = required("REDDIT_CLIENT_ID")?;
        let reddit_client_secret = required("REDDIT_CLIENT_SECRET")?;
        let reddit_user_agent = var("REDDIT_USER_AGENT", "forum-answers/0.1");
        let reddit_token_url = var(
            "REDDIT_TOKEN_URL",
            "https://www.reddit.com/api/v1/access_token",
        );
        let reddit_api_base = var("REDDIT_API_BASE", "https://oauth.reddit.com");
        let forum_web_base = var("FORUM_WEB_BASE", "https://www.reddit.com");

        // --- Generation Settings (API key is optional here, the binary insists on it) ---
        let openai_api_key = lookup("OPENAI_API_KEY");
        let openai_base_url = lookup("OPENAI_BASE_URL");
        let allowed_models: Vec<String> = var("ALLOWED_MODELS", "gpt-4o-mini,gpt-4o")
            .split(',')
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .collect();
        if allowed_models.is_empty() {
            return Err(ConfigError::InvalidValue(
                "ALLOWED_MODELS".to_string(),
                "at least one model is required".to_string(),
            ));
        }

        // --- Limits ---
        let http_timeout = Duration::from_secs(parse_var(
            "HTTP_TIMEOUT_SECS",
            &var("HTTP_TIMEOUT_SECS", "10"),
        )?);
        let generation_timeout = Duration::from_secs(parse_var(
            "GENERATION_TIMEOUT_SECS",
            &var("GENERATION_TIMEOUT_SECS", "60"),
        )?);
        let request_deadline = Duration::from_secs(parse_var(
            "REQUEST_DEADLINE_SECS",
            &var("REQUEST_DEADLINE_SECS", "90"),
        )?);
        let daily_question_limit =
            parse_var("DAILY_QUESTION_LIMIT", &var("DAILY_QUESTION_LIMIT", "10"))?;

        Ok(Self {
            bind_address,
            log_level,
            cors_origin,
            reddit_client_id,
            reddit_client_secret,
            reddit_user_agent,
            reddit_token_url,
            reddit_api_base,
            forum_web_base,
            openai_api_key,
            openai_base_url,
            allowed_models,
            http_timeout,
            generation_timeout,
            request_deadline,
            daily_question_limit,
        })
    }
}

fn parse_var<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string()))
}
