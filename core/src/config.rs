//! Client configuration.
//!
//! The endpoint defaults to the vendor's public base URL when empty. The API
//! key is held as a secret so it never shows up in `Debug` output or logs.

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

/// Base URL of the vendor's Sesame 2 web API.
pub const DEFAULT_ENDPOINT: &str = "https://app.candyhouse.co/api/sesame2";

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "SESAME_API_KEY";

/// Environment variable overriding the endpoint.
pub const ENDPOINT_ENV: &str = "SESAME_ENDPOINT";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {0} is not set")]
    MissingVar(&'static str),
}

/// Immutable per-client settings.
#[derive(Debug)]
pub struct ClientConfig {
    endpoint: String,
    api_key: SecretString,
}

impl ClientConfig {
    /// An empty `endpoint` selects `DEFAULT_ENDPOINT`. Trailing slashes are
    /// stripped so paths join cleanly.
    pub fn new(endpoint: &str, api_key: impl Into<String>) -> Self {
        let endpoint = endpoint.trim();
        let endpoint = if endpoint.is_empty() {
            DEFAULT_ENDPOINT
        } else {
            endpoint.trim_end_matches('/')
        };
        Self {
            endpoint: endpoint.to_string(),
            api_key: SecretString::from(api_key.into()),
        }
    }

    /// Read `SESAME_API_KEY` (required) and `SESAME_ENDPOINT` (optional).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup(API_KEY_ENV).ok_or(ConfigError::MissingVar(API_KEY_ENV))?;
        let endpoint = lookup(ENDPOINT_ENV).unwrap_or_default();
        Ok(Self::new(&endpoint, api_key))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub(crate) fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_endpoint_uses_default() {
        let config = ClientConfig::new("", "key");
        assert_eq!(config.endpoint(), DEFAULT_ENDPOINT);
        let config = ClientConfig::new("   ", "key");
        assert_eq!(config.endpoint(), DEFAULT_ENDPOINT);
    }

    #[test]
    fn trailing_slash_is_stripped() {
        let config = ClientConfig::new("http://localhost:3000/", "key");
        assert_eq!(config.endpoint(), "http://localhost:3000");
    }

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let pairs: Vec<(String, String)> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| {
            pairs
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
        }
    }

    #[test]
    fn lookup_without_api_key_is_missing_var() {
        let err = ClientConfig::from_lookup(vars(&[(ENDPOINT_ENV, "http://localhost:3000")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(API_KEY_ENV)));
        assert_eq!(err.to_string(), "environment variable SESAME_API_KEY is not set");
    }

    #[test]
    fn lookup_without_endpoint_uses_default() {
        let config = ClientConfig::from_lookup(vars(&[(API_KEY_ENV, "key")])).unwrap();
        assert_eq!(config.endpoint(), DEFAULT_ENDPOINT);
        assert_eq!(config.api_key(), "key");
    }

    #[test]
    fn lookup_with_endpoint_overrides_default() {
        let config = ClientConfig::from_lookup(vars(&[
            (API_KEY_ENV, "key"),
            (ENDPOINT_ENV, "http://localhost:3000/"),
        ]))
        .unwrap();
        assert_eq!(config.endpoint(), "http://localhost:3000");
    }

    // The only test in this crate that touches the process environment.
    #[test]
    fn from_env_reads_process_environment() {
        std::env::remove_var(API_KEY_ENV);
        std::env::remove_var(ENDPOINT_ENV);
        assert!(matches!(
            ClientConfig::from_env(),
            Err(ConfigError::MissingVar(API_KEY_ENV))
        ));

        std::env::set_var(API_KEY_ENV, "env-key");
        let config = ClientConfig::from_env().unwrap();
        assert_eq!(config.endpoint(), DEFAULT_ENDPOINT);
        assert_eq!(config.api_key(), "env-key");

        std::env::set_var(ENDPOINT_ENV, "http://127.0.0.1:3000");
        let config = ClientConfig::from_env().unwrap();
        assert_eq!(config.endpoint(), "http://127.0.0.1:3000");

        std::env::remove_var(API_KEY_ENV);
        std::env::remove_var(ENDPOINT_ENV);
    }

    #[test]
    fn debug_output_hides_api_key() {
        let config = ClientConfig::new("", "super-secret-key");
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret-key"));
        assert_eq!(config.api_key(), "super-secret-key");
    }
}
