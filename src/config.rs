//! Dashboard configuration
//!
//! Loads configuration from environment variables with sensible defaults.

use std::env;
use std::time::Duration;

/// Dashboard configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Backend origin; the client appends `/api`
    pub api_url: String,
    /// Supabase project URL. When absent the dashboard runs against the
    /// local auth provider and without realtime notifications.
    pub supabase_url: Option<String>,
    /// Supabase anonymous key, sent as `apikey`
    pub supabase_anon_key: Option<String>,
    /// Credentials for remote sign-in
    pub email: Option<String>,
    pub password: Option<String>,
    /// Pre-issued bearer token (skips password sign-in)
    pub token: Option<String>,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Polling intervals for pages without realtime coverage
    pub poll: PollIntervals,
    /// Environment (development/production)
    pub environment: Environment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollIntervals {
    pub dashboard: Duration,
    pub calls: Duration,
    pub conversations: Duration,
}

impl Default for PollIntervals {
    fn default() -> Self {
        Self {
            dashboard: Duration::from_secs(30),
            calls: Duration::from_secs(15),
            conversations: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Development,
    Production,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let environment = match var("ENVIRONMENT")
            .unwrap_or_else(|| "development".to_string())
            .to_lowercase()
            .as_str()
        {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        };

        let supabase_url = var("SUPABASE_URL").map(|u| u.trim_end_matches('/').to_string());
        let supabase_anon_key = var("SUPABASE_ANON_KEY");
        if supabase_url.is_some() && supabase_anon_key.is_none() {
            return Err(ConfigError::Missing(
                "SUPABASE_ANON_KEY is required when SUPABASE_URL is set".to_string(),
            ));
        }

        let seconds = |key: &str, default: u64| -> Result<Duration, ConfigError> {
            match var(key) {
                None => Ok(Duration::from_secs(default)),
                Some(raw) => match raw.trim().parse::<u64>() {
                    Ok(0) | Err(_) => Err(ConfigError::Invalid(format!(
                        "{} must be a positive number of seconds, got '{}'",
                        key, raw
                    ))),
                    Ok(n) => Ok(Duration::from_secs(n)),
                },
            }
        };

        let defaults = PollIntervals::default();

        Ok(Config {
            api_url: var("API_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(|| "http://localhost:8000".to_string()),
            supabase_url,
            supabase_anon_key,
            email: var("DASHBOARD_EMAIL"),
            password: var("DASHBOARD_PASSWORD"),
            token: var("DASHBOARD_TOKEN"),
            request_timeout: seconds("REQUEST_TIMEOUT_SECS", 15)?,
            poll: PollIntervals {
                dashboard: seconds("POLL_DASHBOARD_SECS", defaults.dashboard.as_secs())?,
                calls: seconds("POLL_CALLS_SECS", defaults.calls.as_secs())?,
                conversations: seconds(
                    "POLL_CONVERSATIONS_SECS",
                    defaults.conversations.as_secs(),
                )?,
            },
            environment,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Whether a remote backend for auth and realtime is configured
    pub fn has_supabase(&self) -> bool {
        self.supabase_url.is_some()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration: {0}")]
    Missing(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_env() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.api_url, "http://localhost:8000");
        assert!(!config.has_supabase());
        assert_eq!(config.request_timeout, Duration::from_secs(15));
        assert_eq!(config.poll, PollIntervals::default());
        assert_eq!(config.environment, Environment::Development);
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let config = Config::from_lookup(lookup(&[
            ("API_URL", "https://api.callhook.test/"),
            ("SUPABASE_URL", "https://proj.supabase.co/"),
            ("SUPABASE_ANON_KEY", "anon"),
        ]))
        .unwrap();
        assert_eq!(config.api_url, "https://api.callhook.test");
        assert_eq!(
            config.supabase_url.as_deref(),
            Some("https://proj.supabase.co")
        );
    }

    #[test]
    fn test_supabase_requires_anon_key() {
        let result = Config::from_lookup(lookup(&[("SUPABASE_URL", "https://proj.supabase.co")]));
        assert!(matches!(result, Err(ConfigError::Missing(_))));
    }

    #[test]
    fn test_invalid_poll_interval() {
        let result = Config::from_lookup(lookup(&[("POLL_CALLS_SECS", "soon")]));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));

        let result = Config::from_lookup(lookup(&[("POLL_CALLS_SECS", "0")]));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_production_environment() {
        let config = Config::from_lookup(lookup(&[("ENVIRONMENT", "PROD")])).unwrap();
        assert!(config.is_production());
    }

    #[test]
    fn test_blank_values_ignored() {
        let config = Config::from_lookup(lookup(&[("DASHBOARD_TOKEN", "  ")])).unwrap();
        assert!(config.token.is_none());
    }
}
