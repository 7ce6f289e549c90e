//! Configuration module for the catalogue console.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::time::Duration;

use crate::errors::ConfigError;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the catalogue REST API
    pub api_base_url: String,
    /// Session token sent with every request (no header when absent)
    pub api_token: Option<String>,
    /// Scheme prefixed to the token in the `Authorization` header
    pub auth_scheme: String,
    /// Transport timeout applied to every request
    pub request_timeout: Duration,
    /// Quiescence period before a search term is sent
    pub search_debounce: Duration,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8000".to_string(),
            api_token: None,
            auth_scheme: "Token".to_string(),
            request_timeout: Duration::from_secs(30),
            search_debounce: Duration::from_millis(500),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let api_base_url = env::var("CATALOGUE_API_BASE_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or(defaults.api_base_url);

        let api_token = env::var("CATALOGUE_API_TOKEN")
            .ok()
            .filter(|token| !token.trim().is_empty());

        let auth_scheme = env::var("CATALOGUE_AUTH_SCHEME").unwrap_or(defaults.auth_scheme);

        let request_timeout = match env::var("CATALOGUE_REQUEST_TIMEOUT_SECS") {
            Ok(raw) => Duration::from_secs(parse_number("CATALOGUE_REQUEST_TIMEOUT_SECS", &raw)?),
            Err(_) => defaults.request_timeout,
        };

        let search_debounce = match env::var("CATALOGUE_SEARCH_DEBOUNCE_MS") {
            Ok(raw) => Duration::from_millis(parse_number("CATALOGUE_SEARCH_DEBOUNCE_MS", &raw)?),
            Err(_) => defaults.search_debounce,
        };

        let log_level = env::var("CATALOGUE_LOG_LEVEL").unwrap_or(defaults.log_level);

        Ok(Self {
            api_base_url,
            api_token,
            auth_scheme,
            request_timeout,
            search_debounce,
            log_level,
        })
    }
}

fn parse_number(variable: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        variable,
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const VARIABLES: [&str; 6] = [
        "CATALOGUE_API_BASE_URL",
        "CATALOGUE_API_TOKEN",
        "CATALOGUE_AUTH_SCHEME",
        "CATALOGUE_REQUEST_TIMEOUT_SECS",
        "CATALOGUE_SEARCH_DEBOUNCE_MS",
        "CATALOGUE_LOG_LEVEL",
    ];

    // Both cases live in one test so they never race on the process environment.
    #[test]
    fn test_config_from_env() {
        for variable in VARIABLES {
            env::remove_var(variable);
        }

        let config = Config::from_env().unwrap();

        assert_eq!(config.api_base_url, "http://127.0.0.1:8000");
        assert!(config.api_token.is_none());
        assert_eq!(config.auth_scheme, "Token");
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.search_debounce, Duration::from_millis(500));
        assert_eq!(config.log_level, "info");

        env::set_var("CATALOGUE_API_BASE_URL", "https://catalogue.example.com/");
        env::set_var("CATALOGUE_SEARCH_DEBOUNCE_MS", "not-a-number");

        let err = Config::from_env().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                variable: "CATALOGUE_SEARCH_DEBOUNCE_MS",
                ..
            }
        ));

        env::set_var("CATALOGUE_SEARCH_DEBOUNCE_MS", "250");
        let config = Config::from_env().unwrap();
        assert_eq!(config.api_base_url, "https://catalogue.example.com");
        assert_eq!(config.search_debounce, Duration::from_millis(250));

        for variable in VARIABLES {
            env::remove_var(variable);
        }
    }
}
