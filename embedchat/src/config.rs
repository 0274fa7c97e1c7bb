//! Server configuration resolved from the environment.

use crate::limiter::{DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW_MS};

/// Default listen port.
pub const DEFAULT_PORT: u16 = 3000;

/// Resolved runtime configuration. Built once at startup and owned by
/// the server state.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Gemini API key. Absent means fallback-only mode.
    pub api_key: Option<String>,
    /// Listen port.
    pub port: u16,
    /// Rate-limit window in milliseconds.
    pub rate_limit_window_ms: i64,
    /// Requests admitted per client per window.
    pub rate_limit_max_requests: u32,
    /// Deployment environment name; anything but "production" exposes
    /// error detail in last-resort responses.
    pub env: String,
}

impl ServerConfig {
    /// Resolve configuration from environment variables. Malformed
    /// numeric values fall back to defaults with a warning rather than
    /// aborting startup.
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var("GEMINI_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
            port: parse_var("PORT", DEFAULT_PORT),
            rate_limit_window_ms: parse_var("RATE_LIMIT_WINDOW_MS", DEFAULT_WINDOW_MS),
            rate_limit_max_requests: parse_var("RATE_LIMIT_MAX_REQUESTS", DEFAULT_MAX_REQUESTS),
            env: std::env::var("EMBEDCHAT_ENV").unwrap_or_else(|_| "development".to_string()),
        }
    }

    pub fn is_production(&self) -> bool {
        self.env == "production"
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            port: DEFAULT_PORT,
            rate_limit_window_ms: DEFAULT_WINDOW_MS,
            rate_limit_max_requests: DEFAULT_MAX_REQUESTS,
            env: "development".to_string(),
        }
    }
}

fn parse_var<T: std::str::FromStr + Copy>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(var = name, value = %raw, "ignoring malformed value, using default");
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 3000);
        assert_eq!(config.rate_limit_window_ms, 900_000);
        assert_eq!(config.rate_limit_max_requests, 100);
        assert!(config.api_key.is_none());
        assert!(!config.is_production());
    }
}
