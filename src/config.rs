//! Provider configuration.
//!
//! Explicit configuration wins; `FASTLY_API_KEY` and `FASTLY_API_URL` fill
//! whatever is left unset.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::schema::{Attribute, Diagnostic, Schema};

/// Environment variable holding the API token.
pub const API_KEY_ENV: &str = "FASTLY_API_KEY";

/// Environment variable overriding the API endpoint.
pub const API_URL_ENV: &str = "FASTLY_API_URL";

/// Public Fastly API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.fastly.com";

/// Resolved provider configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    /// API token. Required unless `no_auth` is set.
    #[serde(default)]
    pub api_key: Option<String>,
    /// API endpoint.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Skip the token requirement (tests and mock servers).
    #[serde(default)]
    pub no_auth: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: Some(DEFAULT_BASE_URL.to_string()),
            no_auth: false,
        }
    }
}

impl Config {
    /// Schema of the provider block.
    pub fn schema() -> Schema {
        Schema::v0()
            .with_attribute(
                "api_key",
                Attribute::optional_string()
                    .sensitive()
                    .with_description("Fastly API token; falls back to FASTLY_API_KEY"),
            )
            .with_attribute(
                "base_url",
                Attribute::optional_string()
                    .with_description("Fastly API URL; falls back to FASTLY_API_URL"),
            )
            .with_attribute(
                "no_auth",
                Attribute::optional_bool()
                    .with_default(json!(false))
                    .with_description("Do not require an API token"),
            )
    }

    /// Parse the provider block, filling unset fields from the environment.
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        Self::from_value_with_env(value, |name| std::env::var(name).ok())
    }

    /// [`from_value`](Self::from_value) with an injectable environment lookup.
    pub fn from_value_with_env<F>(value: &Value, env: F) -> Result<Self, serde_json::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = if value.is_null() { json!({}) } else { value.clone() };
        let mut config: Config = serde_json::from_value(value)?;

        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        config.api_key = non_empty(config.api_key).or_else(|| non_empty(env(API_KEY_ENV)));
        config.base_url = non_empty(config.base_url)
            .or_else(|| non_empty(env(API_URL_ENV)))
            .or_else(|| Some(DEFAULT_BASE_URL.to_string()));
        Ok(config)
    }

    /// The endpoint to talk to.
    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    /// Check the resolved configuration.
    pub fn validate(&self) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        if self.api_key.is_none() && !self.no_auth {
            diagnostics.push(
                Diagnostic::error("Missing API key")
                    .with_detail(format!(
                        "Set api_key in the provider block or the {} environment variable",
                        API_KEY_ENV
                    ))
                    .with_attribute("api_key"),
            );
        }
        let url = self.base_url();
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            diagnostics.push(
                Diagnostic::error("Invalid base URL")
                    .with_detail(format!("{:?} is not an http(s) URL", url))
                    .with_attribute("base_url"),
            );
        }
        diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_value_with_env(&Value::Null, no_env).unwrap();
        assert_eq!(config.base_url(), DEFAULT_BASE_URL);
        assert!(config.api_key.is_none());
        assert_eq!(config.validate().len(), 1);
    }

    #[test]
    fn test_environment_fallback() {
        let env = |name: &str| match name {
            API_KEY_ENV => Some("token-from-env".to_string()),
            API_URL_ENV => Some("http://localhost:8080".to_string()),
            _ => None,
        };
        let config = Config::from_value_with_env(&json!({"api_key": ""}), env).unwrap();
        assert_eq!(config.api_key.as_deref(), Some("token-from-env"));
        assert_eq!(config.base_url(), "http://localhost:8080");
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_explicit_values_win() {
        let env = |_: &str| Some("from-env".to_string());
        let config =
            Config::from_value_with_env(&json!({"api_key": "explicit"}), env).unwrap();
        assert_eq!(config.api_key.as_deref(), Some("explicit"));
    }

    #[test]
    fn test_no_auth_skips_key() {
        let config = Config::from_value_with_env(&json!({"no_auth": true}), no_env).unwrap();
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_bad_url() {
        let config = Config::from_value_with_env(
            &json!({"api_key": "k", "base_url": "ftp://example"}),
            no_env,
        )
        .unwrap();
        let diagnostics = config.validate();
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("base_url"));
    }
}
