//! Runtime configuration with parsed addresses and resolved secrets.

use super::secret::SecretString;
use super::types::{MetricsConfig, TemplatesConfig};
use chrono_tz::Tz;
use std::net::SocketAddr;
use std::time::Duration;

/// Configuration as the running process uses it.
#[derive(Debug)]
pub struct RuntimeConfig {
    pub listen: SocketAddr,
    pub relay: CompiledRelay,
    pub timezone: Tz,
    pub templates: TemplatesConfig,
    pub metrics: MetricsConfig,
}

/// Robot endpoint settings with the default key resolved.
#[derive(Debug, Clone)]
pub struct CompiledRelay {
    pub base_url: String,
    /// Used when a request carries no `?key=`.
    pub default_key: Option<SecretString>,
    pub timeout: Duration,
    pub max_message_bytes: usize,
}

impl CompiledRelay {
    /// Pick the request's key, falling back to the configured one.
    ///
    /// Empty request keys count as absent.
    pub fn key_for(&self, requested: Option<&str>) -> Option<SecretString> {
        match requested.filter(|key| !key.is_empty()) {
            Some(key) => Some(SecretString::new(key.to_string())),
            None => self.default_key.clone(),
        }
    }
}
