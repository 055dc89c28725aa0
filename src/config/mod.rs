//! Configuration loading and validation for g2ww.
//!
//! This module handles loading the YAML configuration file,
//! validation, and resolving robot keys from the environment.

mod env;
mod runtime;
mod secret;
mod types;
mod validation;

// Re-exports publics
pub use env::resolve_env_vars;
pub use runtime::{CompiledRelay, RuntimeConfig};
pub use secret::SecretString;
pub use types::{
    Config, CounterConfig, DEFAULT_CONFIG_PATH, ENV_ROBOT_KEY, MIN_MESSAGE_BYTES, MetricsConfig,
    RelayConfig, ServerConfig, TemplatesConfig,
};
pub use validation::validate_template_render;

#[cfg(test)]
mod tests;
