//! Configuration for a REST API tool source.
//!
//! Config files are camelCase JSON/YAML. Everything except `baseUrl` and `auth` has a default,
//! so a minimal source is just:
//!
//! ```yaml
//! baseUrl: https://api.example.com/v1
//! auth:
//!   type: bearer
//!   token: secret
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::format::{CHARACTER_LIMIT, StructuredTruncation};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing configuration: {0}")]
    Missing(String),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration for one upstream REST API.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestApiConfig {
    /// Base URL every endpoint is appended to.
    pub base_url: String,

    /// Credential injected into every request.
    #[serde(default)]
    pub auth: Option<AuthConfig>,

    /// Per-request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum accepted response body size (bytes). `None` = unlimited.
    #[serde(default)]
    pub max_response_bytes: Option<usize>,

    /// Headers sent with every request.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub pagination: PaginationConfig,
}

/// How the credential is attached to outbound requests.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AuthConfig {
    Bearer { token: String },
    Header { name: String, value: String },
    Basic { username: String, password: String },
    Query { name: String, value: String },
}

impl AuthConfig {
    fn secret(&self) -> &str {
        match self {
            AuthConfig::Bearer { token } => token,
            AuthConfig::Header { value, .. } | AuthConfig::Query { value, .. } => value,
            AuthConfig::Basic { password, .. } => password,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputConfig {
    /// Maximum number of characters a tool response may contain.
    #[serde(default = "default_character_limit")]
    pub character_limit: usize,

    /// What to do when a `json` rendering exceeds the limit.
    #[serde(default)]
    pub structured_truncation: StructuredTruncation,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            character_limit: default_character_limit(),
            structured_truncation: StructuredTruncation::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationConfig {
    #[serde(default = "default_limit")]
    pub default_limit: usize,

    #[serde(default = "default_max_limit")]
    pub max_limit: usize,

    /// Upstream query parameter carrying the page size.
    #[serde(default = "default_limit_param")]
    pub limit_param: String,

    /// Upstream query parameter carrying the page offset.
    #[serde(default = "default_offset_param")]
    pub offset_param: String,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
            limit_param: default_limit_param(),
            offset_param: default_offset_param(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_character_limit() -> usize {
    CHARACTER_LIMIT
}

fn default_limit() -> usize {
    20
}

fn default_max_limit() -> usize {
    100
}

fn default_limit_param() -> String {
    "limit".to_string()
}

fn default_offset_param() -> String {
    "offset".to_string()
}

impl RestApiConfig {
    /// Minimal config with a bearer credential and defaults for everything else.
    #[must_use]
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            auth: Some(AuthConfig::Bearer {
                token: token.into(),
            }),
            timeout_ms: default_timeout_ms(),
            max_response_bytes: None,
            headers: BTreeMap::new(),
            output: OutputConfig::default(),
            pagination: PaginationConfig::default(),
        }
    }

    /// Load a config from `<PREFIX>_BASE_URL`, `<PREFIX>_API_TOKEN` and the optional
    /// `<PREFIX>_TIMEOUT_MS`.
    ///
    /// This is the only place the environment is read; the result is handed to the transport
    /// at construction time.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or the result fails [`Self::validate`].
    pub fn from_env(prefix: &str) -> Result<Self, ConfigError> {
        Self::from_lookup(prefix, |key| std::env::var(key).ok())
    }

    fn from_lookup(
        prefix: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let key = |suffix: &str| format!("{prefix}_{suffix}");

        let base_url = lookup(&key("BASE_URL"))
            .ok_or_else(|| ConfigError::Missing(format!("{} is not set", key("BASE_URL"))))?;
        let token = lookup(&key("API_TOKEN")).ok_or_else(|| {
            ConfigError::Missing(format!(
                "{} is not set; an API token is required to call the upstream API",
                key("API_TOKEN")
            ))
        })?;

        let mut cfg = Self::new(base_url, token);
        if let Some(raw) = lookup(&key("TIMEOUT_MS")) {
            cfg.timeout_ms = raw.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!(
                    "{} must be an integer (milliseconds), got '{raw}'",
                    key("TIMEOUT_MS")
                ))
            })?;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Check the config before any request is made.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is not an absolute `http(s)` URL, the credential is
    /// missing or empty, or the pagination limits are inconsistent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.parsed_base_url()?;

        let Some(auth) = &self.auth else {
            return Err(ConfigError::Missing(
                "auth is not configured; an API credential is required".to_string(),
            ));
        };
        if auth.secret().trim().is_empty() {
            return Err(ConfigError::Missing(
                "auth credential is empty".to_string(),
            ));
        }

        if self.pagination.max_limit == 0 {
            return Err(ConfigError::Invalid(
                "pagination.maxLimit must be at least 1".to_string(),
            ));
        }
        if self.output.character_limit == 0 {
            return Err(ConfigError::Invalid(
                "output.characterLimit must be at least 1".to_string(),
            ));
        }

        Ok(())
    }

    pub(crate) fn parsed_base_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.base_url).map_err(|e| {
            ConfigError::Invalid(format!("Invalid baseUrl '{}': {e}", self.base_url))
        })?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(ConfigError::Invalid(format!(
                "Invalid baseUrl '{}': unsupported scheme '{other}'",
                self.base_url
            ))),
        }
    }

    /// `None` when `timeoutMs` is 0.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn yaml_config_fills_defaults() {
        let cfg: RestApiConfig = serde_yaml::from_str(
            r"
baseUrl: https://api.example.com/v1
auth:
  type: bearer
  token: secret
",
        )
        .expect("parse");

        assert_eq!(
            cfg.auth,
            Some(AuthConfig::Bearer {
                token: "secret".to_string()
            })
        );
        assert_eq!(cfg.timeout_ms, 30_000);
        assert_eq!(cfg.output.character_limit, 25_000);
        assert_eq!(cfg.output.structured_truncation, StructuredTruncation::Raw);
        assert_eq!(cfg.pagination.default_limit, 20);
        assert_eq!(cfg.pagination.max_limit, 100);
        assert_eq!(cfg.pagination.limit_param, "limit");
        cfg.validate().expect("valid");
    }

    #[test]
    fn validate_rejects_missing_credential() {
        let mut cfg = RestApiConfig::new("https://api.example.com", "t");
        cfg.auth = None;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("credential"));

        let cfg = RestApiConfig::new("https://api.example.com", "  ");
        assert!(matches!(cfg.validate(), Err(ConfigError::Missing(_))));
    }

    #[test]
    fn validate_rejects_non_http_base_url() {
        let cfg = RestApiConfig::new("ftp://api.example.com", "t");
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));

        let cfg = RestApiConfig::new("not a url", "t");
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn env_lookup_reads_prefixed_variables() {
        let vars = HashMap::from([
            ("ACME_BASE_URL", "https://acme.test/api"),
            ("ACME_API_TOKEN", "tok"),
            ("ACME_TIMEOUT_MS", "1500"),
        ]);
        let cfg = RestApiConfig::from_lookup("ACME", |k| vars.get(k).map(|v| (*v).to_string()))
            .expect("config");
        assert_eq!(cfg.base_url, "https://acme.test/api");
        assert_eq!(cfg.timeout(), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn env_lookup_fails_fast_without_token() {
        let vars = HashMap::from([("ACME_BASE_URL", "https://acme.test/api")]);
        let err = RestApiConfig::from_lookup("ACME", |k| vars.get(k).map(|v| (*v).to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("ACME_API_TOKEN"));
    }

    #[test]
    fn zero_timeout_disables_it() {
        let mut cfg = RestApiConfig::new("https://api.example.com", "t");
        cfg.timeout_ms = 0;
        assert_eq!(cfg.timeout(), None);
    }
}
