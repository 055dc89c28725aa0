//! Core configuration types and loading.

use super::env::resolve_env_vars;
use super::runtime::{CompiledRelay, RuntimeConfig};
use super::secret::SecretString;
use super::validation::{
    validate_base_url, validate_jinja_template, validate_listen_addr, validate_template_render,
};
use crate::error::ConfigError;
use crate::partition::DEFAULT_MAX_MESSAGE_BYTES;
use crate::relay::DEFAULT_BASE_URL;
use chrono_tz::Tz;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/g2ww/config.yaml";

/// Environment variable used as robot key when `relay.default_key` is unset.
pub const ENV_ROBOT_KEY: &str = "WECOM_ROBOT_KEY";

/// Smallest accepted `relay.max_message_bytes`. Below this a header and a
/// single short alert no longer fit in one message.
pub const MIN_MESSAGE_BYTES: usize = 256;

/// Main configuration structure for g2ww.
///
/// Every section is optional; an empty mapping is a valid configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Inbound HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Robot endpoint settings.
    #[serde(default)]
    pub relay: RelayConfig,
    /// Daily counter settings.
    #[serde(default)]
    pub counter: CounterConfig,
    /// Optional message template overrides.
    #[serde(default)]
    pub templates: TemplatesConfig,
    /// Metrics exposition configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
    /// Robot key from the environment (not from YAML).
    #[serde(skip)]
    pub env_robot_key: Option<SecretString>,
}

/// Inbound HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Socket address to listen on (default: 0.0.0.0:8080).
    #[serde(default = "default_listen")]
    pub listen: String,
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

/// Robot endpoint configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// API root; parts are posted to `{base_url}/send?key=...`.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Robot key used when the request has no `?key=`.
    /// Supports `${VAR}` substitution.
    #[serde(default)]
    pub default_key: Option<SecretString>,
    /// Per-request timeout for the robot endpoint.
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
    /// Upper bound on one message envelope, in bytes.
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_max_message_bytes() -> usize {
    DEFAULT_MAX_MESSAGE_BYTES
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            default_key: None,
            timeout: default_timeout(),
            max_message_bytes: default_max_message_bytes(),
        }
    }
}

/// Daily counter configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CounterConfig {
    /// Timezone whose midnight starts each window (e.g. "Asia/Shanghai").
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

fn default_timezone() -> String {
    "UTC".to_string()
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
        }
    }
}

/// Message template overrides. `None` keeps the built-in layout.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TemplatesConfig {
    /// Part header. Variables: color, count, alerts, part.
    #[serde(default)]
    pub header: Option<String>,
    /// Per-alert fragment. Variables: color, summary_color, name, summary, status, labels,
    /// annotations, value_string, generator_url, starts_at.
    #[serde(default)]
    pub alert: Option<String>,
}

/// Metrics exposition configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Whether metrics exposition is enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Port to expose metrics on (default: 9090).
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

fn default_true() -> bool {
    true
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 9090,
        }
    }
}

impl Config {
    /// Load configuration from a file path.
    ///
    /// # Errors
    /// Returns [`ConfigError::LoadError`] if the file cannot be read.
    /// Returns [`ConfigError::ValidationError`] if the YAML is invalid.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadError(format!("{}: {}", path.display(), e)))?;

        let mut config = Self::from_yaml(&content)?;
        config.env_robot_key = std::env::var(ENV_ROBOT_KEY)
            .ok()
            .filter(|key| !key.is_empty())
            .map(SecretString::new);

        Ok(config)
    }

    /// Parse configuration from YAML text, without consulting the environment.
    ///
    /// # Errors
    /// Returns [`ConfigError::ValidationError`] if the YAML is invalid.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }

    /// Validate every setting, collecting all errors instead of stopping at
    /// the first one.
    ///
    /// # Errors
    /// Returns a `Vec<ConfigError>` containing all validation errors found.
    pub fn validate(&self) -> Result<(), Vec<ConfigError>> {
        let mut errors = Vec::new();

        if let Err(e) = validate_listen_addr(&self.server.listen) {
            errors.push(ConfigError::ValidationError(format!("server.listen: {}", e)));
        }

        if let Err(e) = validate_base_url(&self.relay.base_url) {
            errors.push(ConfigError::ValidationError(format!("relay.base_url: {}", e)));
        }

        if let Some(key) = &self.relay.default_key
            && let Err(e) = resolve_env_vars(key.expose())
        {
            errors.push(ConfigError::ValidationError(format!(
                "relay.default_key: {}",
                e
            )));
        }

        if self.relay.timeout.is_zero() {
            errors.push(ConfigError::ValidationError(
                "relay.timeout must be greater than zero".to_string(),
            ));
        }

        if self.relay.max_message_bytes < MIN_MESSAGE_BYTES {
            errors.push(ConfigError::ValidationError(format!(
                "relay.max_message_bytes {} is below the minimum of {}",
                self.relay.max_message_bytes, MIN_MESSAGE_BYTES
            )));
        }

        if self.counter.timezone.parse::<Tz>().is_err() {
            errors.push(ConfigError::ValidationError(format!(
                "counter.timezone '{}' is not a valid timezone",
                self.counter.timezone
            )));
        }

        let templates = [
            ("header", &self.templates.header),
            ("alert", &self.templates.alert),
        ];
        for (name, source) in templates {
            let Some(source) = source else { continue };
            if let Err(e) = validate_jinja_template(source) {
                errors.push(ConfigError::InvalidTemplate {
                    name: name.to_string(),
                    message: e,
                });
            } else if let Err(e) = validate_template_render(source) {
                errors.push(ConfigError::InvalidTemplate {
                    name: name.to_string(),
                    message: format!("render: {}", e),
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Compile configuration for runtime: parse addresses and timezones and
    /// resolve secrets.
    ///
    /// # Errors
    /// Returns the first [`ConfigError`] hit. Call [`Config::validate`] first
    /// to get the full list.
    pub fn compile(self) -> Result<RuntimeConfig, ConfigError> {
        let listen: SocketAddr = self.server.listen.parse().map_err(|e| {
            ConfigError::ValidationError(format!("server.listen '{}': {}", self.server.listen, e))
        })?;

        let timezone: Tz = self.counter.timezone.parse().map_err(|_| {
            ConfigError::ValidationError(format!(
                "counter.timezone '{}' is not a valid timezone",
                self.counter.timezone
            ))
        })?;

        let default_key = match &self.relay.default_key {
            Some(raw) => Some(SecretString::new(resolve_env_vars(raw.expose())?)),
            None => self.env_robot_key,
        }
        .filter(|key| !key.is_empty());

        Ok(RuntimeConfig {
            listen,
            relay: CompiledRelay {
                base_url: self.relay.base_url,
                default_key,
                timeout: self.relay.timeout,
                max_message_bytes: self.relay.max_message_bytes,
            },
            timezone,
            templates: self.templates,
            metrics: self.metrics,
        })
    }
}
