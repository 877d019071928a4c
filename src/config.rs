//! Configuration file support
//!
//! Client settings can be kept in YAML and overlaid with environment
//! variables for the credentials:
//!
//! ```yaml
//! base_url: https://api.crowdstrike.com
//! credentials:
//!   client_id: abc123
//!   client_secret: keep-me-out-of-git
//! retry:
//!   max_attempts: 5
//!   initial_delay_secs: 30
//!   timeout_secs: 180
//!   backoff_factor: 2
//! rate_limit:
//!   reserve_limit: 10
//!   cooldown_secs: 60
//! throttle:
//!   requests_per_second: 100
//! ```

use crate::auth::Credentials;
use crate::error::{Error, Result};
use crate::http::{
    AttemptPolicy, ClientConfig, RateLimitConfig, ThrottleConfig, DEFAULT_BASE_URL,
};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Environment variable overriding `credentials.client_id`
pub const ENV_CLIENT_ID: &str = "FALCON_CLIENT_ID";
/// Environment variable overriding `credentials.client_secret`
pub const ENV_CLIENT_SECRET: &str = "FALCON_CLIENT_SECRET";
/// Environment variable overriding `base_url`
pub const ENV_BASE_URL: &str = "FALCON_BASE_URL";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Client configuration as written in YAML
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    /// Base URL for API requests
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// OAuth2 client credentials
    #[serde(default)]
    pub credentials: Credentials,

    /// Retry settings
    #[serde(default)]
    pub retry: RetryDef,

    /// Rate limit recovery settings
    #[serde(default)]
    pub rate_limit: RateLimitDef,

    /// Optional client-side pacing
    #[serde(default)]
    pub throttle: Option<ThrottleDef>,

    /// User agent override
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            credentials: Credentials::default(),
            retry: RetryDef::default(),
            rate_limit: RateLimitDef::default(),
            throttle: None,
            user_agent: None,
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

// ============================================================================
// Retry / Rate Limit / Throttle
// ============================================================================

/// Retry settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryDef {
    /// Total attempts per request
    pub max_attempts: u32,
    /// Delay before the first retry, in seconds
    pub initial_delay_secs: u64,
    /// Per-attempt timeout, in seconds
    pub timeout_secs: u64,
    /// Backoff multiplier
    pub backoff_factor: u32,
}

impl Default for RetryDef {
    fn default() -> Self {
        let policy = AttemptPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            initial_delay_secs: policy.initial_delay.as_secs(),
            timeout_secs: policy.per_attempt_timeout.as_secs(),
            backoff_factor: policy.backoff_factor,
        }
    }
}

impl From<&RetryDef> for AttemptPolicy {
    fn from(def: &RetryDef) -> Self {
        AttemptPolicy {
            max_attempts: def.max_attempts,
            initial_delay: Duration::from_secs(def.initial_delay_secs),
            per_attempt_timeout: Duration::from_secs(def.timeout_secs),
            backoff_factor: def.backoff_factor,
        }
    }
}

/// Rate limit recovery settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitDef {
    /// Remaining-quota level that triggers the extra cooldown
    pub reserve_limit: u64,
    /// Extra cooldown, in seconds
    pub cooldown_secs: u64,
    /// Margin added to the server's retry-after, in seconds
    pub retry_after_margin_secs: u64,
}

impl Default for RateLimitDef {
    fn default() -> Self {
        let config = RateLimitConfig::default();
        Self {
            reserve_limit: config.reserve_limit,
            cooldown_secs: config.cooldown_period.as_secs(),
            retry_after_margin_secs: config.retry_after_margin.as_secs(),
        }
    }
}

impl From<&RateLimitDef> for RateLimitConfig {
    fn from(def: &RateLimitDef) -> Self {
        RateLimitConfig::new(def.reserve_limit, Duration::from_secs(def.cooldown_secs))
            .with_retry_after_margin(Duration::from_secs(def.retry_after_margin_secs))
    }
}

/// Client-side pacing settings
#[derive(Debug, Clone, Deserialize)]
pub struct ThrottleDef {
    /// Requests per second
    pub requests_per_second: u32,
    /// Burst size; defaults to the per-second rate
    #[serde(default)]
    pub burst_size: Option<u32>,
}

impl From<&ThrottleDef> for ThrottleConfig {
    fn from(def: &ThrottleDef) -> Self {
        ThrottleConfig::new(
            def.requests_per_second,
            def.burst_size.unwrap_or(def.requests_per_second),
        )
    }
}

// ============================================================================
// Loading
// ============================================================================

impl ConfigFile {
    /// Parse a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Read and parse a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("Failed to read {}: {e}", path.display())))?;
        Self::from_yaml_str(&contents)
    }

    /// Overlay credentials and base URL from the process environment
    #[must_use]
    pub fn apply_env(self) -> Self {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    /// Overlay values from an arbitrary lookup; empty values are ignored
    #[must_use]
    pub fn apply_vars(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.is_empty());
        if let Some(id) = var(ENV_CLIENT_ID) {
            self.credentials.client_id = id;
        }
        if let Some(secret) = var(ENV_CLIENT_SECRET) {
            self.credentials.client_secret = secret;
        }
        if let Some(url) = var(ENV_BASE_URL) {
            self.base_url = url;
        }
        self
    }

    /// Reject configurations the client cannot run with
    pub fn validate(&self) -> Result<()> {
        if !self.credentials.is_complete() {
            let field = if self.credentials.client_id.is_empty() {
                "credentials.client_id"
            } else {
                "credentials.client_secret"
            };
            return Err(Error::missing_field(field));
        }
        Url::parse(&self.base_url)
            .map_err(|e| Error::config(format!("Invalid base_url '{}': {e}", self.base_url)))?;
        if self.retry.max_attempts == 0 {
            return Err(Error::config("retry.max_attempts must be at least 1"));
        }
        Ok(())
    }

    /// Validate and convert into the runtime client config
    pub fn into_client_config(self) -> Result<ClientConfig> {
        self.validate()?;

        let mut builder = ClientConfig::builder(&self.base_url, self.credentials.clone())
            .attempt_policy(AttemptPolicy::from(&self.retry))
            .rate_limit(RateLimitConfig::from(&self.rate_limit));
        if let Some(ref throttle) = self.throttle {
            builder = builder.throttle(ThrottleConfig::from(throttle));
        }
        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }
        Ok(builder.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    const FULL: &str = r"
base_url: https://api.eu-1.example.com
credentials:
  client_id: id-123
  client_secret: secret-456
retry:
  max_attempts: 3
  initial_delay_secs: 1
  timeout_secs: 20
  backoff_factor: 3
rate_limit:
  reserve_limit: 25
  cooldown_secs: 15
throttle:
  requests_per_second: 50
user_agent: sync-job/2.0
";

    #[test]
    fn test_parse_full_config() {
        let file = ConfigFile::from_yaml_str(FULL).unwrap();
        let config = file.into_client_config().unwrap();

        assert_eq!(config.base_url, "https://api.eu-1.example.com");
        assert_eq!(config.credentials, Credentials::new("id-123", "secret-456"));
        assert_eq!(
            config.attempt_policy,
            AttemptPolicy {
                max_attempts: 3,
                initial_delay: Duration::from_secs(1),
                per_attempt_timeout: Duration::from_secs(20),
                backoff_factor: 3,
            }
        );
        assert_eq!(config.rate_limit.reserve_limit, 25);
        assert_eq!(config.rate_limit.cooldown_period, Duration::from_secs(15));
        assert_eq!(config.rate_limit.retry_after_margin, Duration::from_secs(60));
        assert_eq!(config.throttle, Some(ThrottleConfig::new(50, 50)));
        assert_eq!(config.user_agent, "sync-job/2.0");
    }

    #[test]
    fn test_defaults_fill_missing_sections() {
        let file = ConfigFile::from_yaml_str("credentials: {client_id: a, client_secret: b}")
            .unwrap();
        let config = file.into_client_config().unwrap();

        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.attempt_policy, AttemptPolicy::default());
        assert_eq!(config.rate_limit, RateLimitConfig::default());
        assert!(config.throttle.is_none());
    }

    #[test]
    fn test_env_overrides_credentials() {
        let file = ConfigFile::from_yaml_str(FULL).unwrap().apply_vars(|key| match key {
            ENV_CLIENT_SECRET => Some("from-env".to_string()),
            ENV_BASE_URL => Some(String::new()),
            _ => None,
        });

        assert_eq!(file.credentials.client_id, "id-123");
        assert_eq!(file.credentials.client_secret, "from-env");
        assert_eq!(file.base_url, "https://api.eu-1.example.com");
    }

    #[test]
    fn test_validate_rejects_missing_credentials() {
        let err = ConfigFile::default().validate().unwrap_err();
        assert!(matches!(err, Error::MissingConfigField { ref field } if field == "credentials.client_id"));

        let mut file = ConfigFile::from_yaml_str(FULL).unwrap();
        file.credentials.client_secret.clear();
        let err = file.validate().unwrap_err();
        assert!(matches!(err, Error::MissingConfigField { ref field } if field == "credentials.client_secret"));
    }

    #[test]
    fn test_validate_rejects_bad_url_and_zero_attempts() {
        let mut file = ConfigFile::from_yaml_str(FULL).unwrap();
        file.base_url = "not a url".to_string();
        assert!(matches!(file.validate(), Err(Error::Config { .. })));

        let mut file = ConfigFile::from_yaml_str(FULL).unwrap();
        file.retry.max_attempts = 0;
        assert!(matches!(file.validate(), Err(Error::Config { .. })));
    }

    #[test]
    fn test_from_file() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(FULL.as_bytes()).unwrap();

        let file = ConfigFile::from_file(tmp.path()).unwrap();
        assert_eq!(file.credentials.client_id, "id-123");

        let missing = ConfigFile::from_file("/definitely/not/here.yaml");
        assert!(matches!(missing, Err(Error::Config { .. })));
    }
}
