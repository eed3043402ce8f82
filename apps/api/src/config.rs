use std::time::Duration;

use anyhow::{Context, Result};

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Application configuration loaded from environment variables.
/// Startup fails if a required variable is missing or a number does not parse.
#[derive(Debug, Clone)]
pub struct Config {
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_api_base: String,
    /// Upper bound on a single chat completion round trip.
    pub chat_timeout: Duration,
    /// Artificial delay of the mock recommendation flow.
    pub analysis_delay: Duration,
    /// Sessions without a request for this long are evicted.
    pub session_idle_ttl: Duration,
    pub session_sweep_interval: Duration,
    pub max_sessions: usize,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            gemini_api_key: require_env("GEMINI_API_KEY")?,
            gemini_model: optional_env("GEMINI_MODEL", DEFAULT_GEMINI_MODEL),
            gemini_api_base: optional_env("GEMINI_API_BASE", DEFAULT_GEMINI_API_BASE),
            chat_timeout: Duration::from_secs(
                optional_env("CHAT_TIMEOUT_SECS", "60")
                    .parse::<u64>()
                    .context("CHAT_TIMEOUT_SECS must be a whole number of seconds")?,
            ),
            analysis_delay: Duration::from_millis(
                optional_env("ANALYSIS_DELAY_MS", "2000")
                    .parse::<u64>()
                    .context("ANALYSIS_DELAY_MS must be a whole number of milliseconds")?,
            ),
            session_idle_ttl: Duration::from_secs(
                optional_env("SESSION_IDLE_TTL_SECS", "1800")
                    .parse::<u64>()
                    .context("SESSION_IDLE_TTL_SECS must be a whole number of seconds")?,
            ),
            session_sweep_interval: Duration::from_secs(
                optional_env("SESSION_SWEEP_SECS", "60")
                    .parse::<u64>()
                    .ok()
                    .filter(|secs| *secs > 0)
                    .context("SESSION_SWEEP_SECS must be a positive number of seconds")?,
            ),
            max_sessions: optional_env("MAX_SESSIONS", "1000")
                .parse::<usize>()
                .context("MAX_SESSIONS must be a whole number")?,
            port: optional_env("PORT", "8080")
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: optional_env("RUST_LOG", "info"),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
