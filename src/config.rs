//! Provider configuration.
//!
//! The host delivers the provider block as JSON. Credentials may also come
//! from the environment so they never have to be written into configuration
//! files: `INSTANA_API_TOKEN` and `INSTANA_ENDPOINT` fill `api_token` and
//! `host` when the block leaves them out.

use std::time::Duration;

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ProviderError;
use crate::restapi::ClientConfig;
use crate::schema::{Attribute, Diagnostic, Schema};

/// Environment variable consulted when `api_token` is not configured.
pub const ENV_API_TOKEN: &str = "INSTANA_API_TOKEN";

/// Environment variable consulted when `host` is not configured.
pub const ENV_ENDPOINT: &str = "INSTANA_ENDPOINT";

/// Default write throttle in requests per second.
pub const DEFAULT_WRITES_PER_SECOND: u32 = 5;

/// Default capacity of the write queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

/// Default per-waiter deadline in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 30;

/// Provider-level settings parsed from the host's provider configuration.
///
/// Unknown keys are rejected so a misspelled option never silently falls
/// back to its default.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// API token used in the `Authorization: apiToken <token>` header.
    #[serde(default)]
    pub api_token: Option<String>,
    /// Instana tenant host name (optionally with scheme).
    #[serde(default)]
    pub host: Option<String>,
    /// Disable TLS certificate verification.
    #[serde(default)]
    pub tls_insecure_skip_verify: bool,
    /// Maximum number of write requests emitted per second.
    #[serde(default = "default_writes_per_second")]
    pub throttle_rate_writes_per_second: u32,
    /// Maximum number of queued writes before callers are backpressured.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Deadline for a single throttled write. Accepts a duration string
    /// (`"30s"`, `"100ms"`) or a number of milliseconds.
    #[serde(
        default = "default_request_timeout",
        deserialize_with = "deserialize_timeout",
        serialize_with = "humantime_serde::serialize"
    )]
    pub request_timeout: Duration,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .field("host", &self.host)
            .field("tls_insecure_skip_verify", &self.tls_insecure_skip_verify)
            .field("throttle_rate_writes_per_second", &self.throttle_rate_writes_per_second)
            .field("queue_capacity", &self.queue_capacity)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

fn default_writes_per_second() -> u32 {
    DEFAULT_WRITES_PER_SECOND
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECONDS)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TimeoutValue {
    Millis(u64),
    Text(String),
}

fn deserialize_timeout<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    match TimeoutValue::deserialize(deserializer)? {
        TimeoutValue::Millis(millis) => Ok(Duration::from_millis(millis)),
        TimeoutValue::Text(text) => humantime::parse_duration(text.trim()).map_err(|e| {
            serde::de::Error::custom(format!("invalid request_timeout '{}': {}", text, e))
        }),
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_token: None,
            host: None,
            tls_insecure_skip_verify: false,
            throttle_rate_writes_per_second: DEFAULT_WRITES_PER_SECOND,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            request_timeout: default_request_timeout(),
        }
    }
}

impl ProviderConfig {
    /// Parse the provider configuration, falling back to the process
    /// environment for credentials.
    pub fn from_value(config: serde_json::Value) -> Result<Self, ProviderError> {
        Self::from_value_with_env(config, |key| std::env::var(key).ok())
    }

    /// Parse the provider configuration with an explicit environment lookup.
    pub fn from_value_with_env<F>(config: serde_json::Value, env: F) -> Result<Self, ProviderError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Unset attributes arrive as explicit nulls.
        let config = match config {
            serde_json::Value::Null => serde_json::Value::Object(Default::default()),
            serde_json::Value::Object(map) => serde_json::Value::Object(
                map.into_iter().filter(|(_, value)| !value.is_null()).collect(),
            ),
            other => other,
        };
        let mut parsed: ProviderConfig = serde_json::from_value(config)
            .map_err(|e| ProviderError::Configuration(e.to_string()))?;

        if is_blank(parsed.api_token.as_deref()) {
            parsed.api_token = env(ENV_API_TOKEN).filter(|v| !v.trim().is_empty());
        }
        if is_blank(parsed.host.as_deref()) {
            parsed.host = env(ENV_ENDPOINT).filter(|v| !v.trim().is_empty());
        }
        Ok(parsed)
    }

    /// Check the configuration for missing credentials and out-of-range values.
    pub fn validate(&self) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();

        if is_blank(self.api_token.as_deref()) {
            diagnostics.push(
                Diagnostic::error("Missing API token")
                    .with_detail(format!(
                        "Set api_token in the provider configuration or the {} environment variable",
                        ENV_API_TOKEN
                    ))
                    .with_attribute("api_token"),
            );
        }
        if is_blank(self.host.as_deref()) {
            diagnostics.push(
                Diagnostic::error("Missing Instana host")
                    .with_detail(format!(
                        "Set host in the provider configuration or the {} environment variable",
                        ENV_ENDPOINT
                    ))
                    .with_attribute("host"),
            );
        }
        if self.throttle_rate_writes_per_second == 0 {
            diagnostics.push(
                Diagnostic::error("Invalid throttle rate")
                    .with_detail("throttle_rate_writes_per_second must be a positive integer")
                    .with_attribute("throttle_rate_writes_per_second"),
            );
        }
        if self.queue_capacity == 0 {
            diagnostics.push(
                Diagnostic::error("Invalid queue capacity")
                    .with_detail("queue_capacity must be a positive integer")
                    .with_attribute("queue_capacity"),
            );
        }
        if self.request_timeout.is_zero() {
            diagnostics.push(
                Diagnostic::error("Invalid request timeout")
                    .with_detail("request_timeout must be a positive duration")
                    .with_attribute("request_timeout"),
            );
        }
        if self.tls_insecure_skip_verify {
            diagnostics.push(
                Diagnostic::warning("TLS verification disabled")
                    .with_detail("Certificates presented by the Instana host are not verified")
                    .with_attribute("tls_insecure_skip_verify"),
            );
        }

        diagnostics
    }

    /// Build the immutable REST client settings.
    pub fn to_client_config(&self) -> Result<ClientConfig, ProviderError> {
        let token = self
            .api_token
            .clone()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ProviderError::Configuration("api_token is required".to_string()))?;
        let host = self
            .host
            .clone()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ProviderError::Configuration("host is required".to_string()))?;
        if self.throttle_rate_writes_per_second == 0
            || self.queue_capacity == 0
            || self.request_timeout.is_zero()
        {
            return Err(ProviderError::Configuration(
                "throttle rate, queue capacity and request timeout must be positive".to_string(),
            ));
        }

        Ok(ClientConfig::new(token, host)
            .with_tls_insecure_skip_verify(self.tls_insecure_skip_verify)
            .with_rate(self.throttle_rate_writes_per_second)
            .with_queue_capacity(self.queue_capacity)
            .with_request_timeout(self.request_timeout))
    }

    /// The provider configuration schema advertised to the host.
    pub fn schema() -> Schema {
        Schema::v0()
            .with_description("Connection settings for the Instana REST API")
            .with_attribute(
                "api_token",
                Attribute::optional_string()
                    .sensitive()
                    .with_description("API token of the Instana tenant"),
            )
            .with_attribute(
                "host",
                Attribute::optional_string()
                    .with_description("Host name of the Instana tenant unit"),
            )
            .with_attribute(
                "tls_insecure_skip_verify",
                Attribute::optional_bool()
                    .with_default(serde_json::json!(false))
                    .with_description("Skip verification of the server certificate"),
            )
            .with_attribute(
                "throttle_rate_writes_per_second",
                Attribute::optional_int64()
                    .with_default(serde_json::json!(DEFAULT_WRITES_PER_SECOND))
                    .with_description("Maximum number of write requests per second"),
            )
            .with_attribute(
                "queue_capacity",
                Attribute::optional_int64()
                    .with_default(serde_json::json!(DEFAULT_QUEUE_CAPACITY))
                    .with_description("Maximum number of queued write requests"),
            )
            .with_attribute(
                "request_timeout",
                Attribute::optional_string()
                    .with_default(serde_json::json!(format!("{}s", DEFAULT_REQUEST_TIMEOUT_SECONDS)))
                    .with_description("Deadline of a single write request, such as 30s or 500ms"),
            )
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DiagnosticSeverity;
    use serde_json::json;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults() {
        let config = ProviderConfig::from_value_with_env(
            json!({"api_token": "secret", "host": "tenant.instana.io"}),
            no_env,
        )
        .unwrap();

        assert_eq!(config.throttle_rate_writes_per_second, 5);
        assert_eq!(config.queue_capacity, 1000);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert!(!config.tls_insecure_skip_verify);
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_env_fallback() {
        let env = |key: &str| match key {
            ENV_API_TOKEN => Some("from-env".to_string()),
            ENV_ENDPOINT => Some("env.instana.io".to_string()),
            _ => None,
        };

        let config = ProviderConfig::from_value_with_env(json!({}), env).unwrap();
        assert_eq!(config.api_token.as_deref(), Some("from-env"));
        assert_eq!(config.host.as_deref(), Some("env.instana.io"));

        // Explicit configuration wins over the environment
        let config =
            ProviderConfig::from_value_with_env(json!({"host": "explicit.instana.io"}), env)
                .unwrap();
        assert_eq!(config.host.as_deref(), Some("explicit.instana.io"));
    }

    #[test]
    fn test_null_config_is_empty() {
        let config = ProviderConfig::from_value_with_env(serde_json::Value::Null, no_env).unwrap();
        assert_eq!(config, ProviderConfig::default());
    }

    #[test]
    fn test_invalid_types_rejected() {
        let err = ProviderConfig::from_value_with_env(json!({"queue_capacity": "many"}), no_env)
            .unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }

    #[test]
    fn test_validate_reports_missing_and_zero_values() {
        let config = ProviderConfig {
            throttle_rate_writes_per_second: 0,
            queue_capacity: 0,
            request_timeout: Duration::ZERO,
            ..Default::default()
        };

        let diagnostics = config.validate();
        let attributes: Vec<_> = diagnostics
            .iter()
            .filter_map(|d| d.attribute.as_deref())
            .collect();
        assert_eq!(
            attributes,
            vec![
                "api_token",
                "host",
                "throttle_rate_writes_per_second",
                "queue_capacity",
                "request_timeout"
            ]
        );
    }

    #[test]
    fn test_validate_warns_on_insecure_tls() {
        let config = ProviderConfig {
            api_token: Some("secret".to_string()),
            host: Some("tenant.instana.io".to_string()),
            tls_insecure_skip_verify: true,
            ..Default::default()
        };

        let diagnostics = config.validate();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].severity, DiagnosticSeverity::Warning);
    }

    #[test]
    fn test_to_client_config() {
        let config = ProviderConfig {
            api_token: Some("secret".to_string()),
            host: Some("tenant.instana.io".to_string()),
            throttle_rate_writes_per_second: 10,
            request_timeout: Duration::from_secs(5),
            ..Default::default()
        };

        let client_config = config.to_client_config().unwrap();
        assert_eq!(client_config.base_url(), "https://tenant.instana.io");
        assert_eq!(client_config.rate, 10);
        assert_eq!(client_config.request_timeout, Duration::from_secs(5));

        let missing = ProviderConfig::default().to_client_config();
        assert!(matches!(missing, Err(ProviderError::Configuration(_))));
    }

    #[test]
    fn test_request_timeout_forms() {
        let parse = |timeout: serde_json::Value| {
            ProviderConfig::from_value_with_env(json!({"request_timeout": timeout}), no_env)
        };
        assert_eq!(parse(json!(5000)).unwrap().request_timeout, Duration::from_secs(5));
        assert_eq!(parse(json!("100ms")).unwrap().request_timeout, Duration::from_millis(100));
        assert_eq!(parse(json!("2m")).unwrap().request_timeout, Duration::from_secs(120));
        assert!(matches!(parse(json!("soon")), Err(ProviderError::Configuration(_))));

        let config = ProviderConfig::from_value_with_env(
            json!({"api_token": "t", "host": "h", "request_timeout": "5s"}),
            no_env,
        )
        .unwrap();
        assert_eq!(
            config.to_client_config().unwrap().request_timeout,
            Duration::from_secs(5)
        );
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let err = ProviderConfig::from_value_with_env(
            json!({"api_token": "t", "request_timeout_seconds": 5}),
            no_env,
        )
        .unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(msg) if msg.contains("request_timeout_seconds")));
    }

    #[test]
    fn test_null_attributes_use_defaults() {
        let config = ProviderConfig::from_value_with_env(
            json!({"api_token": "t", "host": "h", "tls_insecure_skip_verify": null, "queue_capacity": null}),
            no_env,
        )
        .unwrap();
        assert!(!config.tls_insecure_skip_verify);
        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = ProviderConfig {
            api_token: Some("super-secret".to_string()),
            ..Default::default()
        };
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_schema_marks_token_sensitive() {
        let schema = ProviderConfig::schema();
        assert!(schema.block.attributes["api_token"].flags.sensitive);
        assert!(schema.block.attributes.contains_key("queue_capacity"));
    }
}
