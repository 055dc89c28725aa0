//! Integration tests for Config loading, validation, and compilation.

use super::*;
use crate::error::ConfigError;
use serial_test::serial;
use std::path::PathBuf;
use std::time::Duration;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

// ============================================================
// Config Loading Tests
// ============================================================

#[test]
fn load_valid_config() {
    let config = Config::load(&fixture_path("config_valid.yaml")).unwrap();

    assert_eq!(config.server.listen, "127.0.0.1:8080");
    assert_eq!(
        config.relay.base_url,
        "https://qyapi.weixin.qq.com/cgi-bin/webhook"
    );
    assert_eq!(
        config.relay.default_key.as_ref().map(SecretString::expose),
        Some("fixture-robot-key")
    );
    assert_eq!(config.relay.timeout, Duration::from_secs(5));
    assert_eq!(config.relay.max_message_bytes, 4096);
    assert_eq!(config.counter.timezone, "Asia/Shanghai");
    assert!(config.templates.header.as_deref().unwrap().ends_with("</font>\n"));
    assert!(config.templates.alert.is_some());
    assert!(!config.metrics.enabled);
    assert_eq!(config.metrics.port, 9191);
}

#[test]
fn load_minimal_config_uses_defaults() {
    let config = Config::load(&fixture_path("config_minimal.yaml")).unwrap();

    assert_eq!(config.server.listen, "0.0.0.0:8080");
    assert_eq!(config.relay.base_url, crate::relay::DEFAULT_BASE_URL);
    assert!(config.relay.default_key.is_none());
    assert_eq!(config.relay.timeout, Duration::from_secs(10));
    assert_eq!(config.relay.max_message_bytes, 4096);
    assert_eq!(config.counter.timezone, "UTC");
    assert!(config.templates.header.is_none());
    assert!(config.metrics.enabled);
    assert_eq!(config.metrics.port, 9090);
    assert!(config.validate().is_ok());
}

#[test]
fn load_nonexistent_file_returns_load_error() {
    let result = Config::load(std::path::Path::new("/nonexistent/path/config.yaml"));
    match result.unwrap_err() {
        ConfigError::LoadError(msg) => {
            assert!(msg.contains("/nonexistent/path/config.yaml"));
        }
        e => panic!("Expected LoadError, got {:?}", e),
    }
}

#[test]
fn load_invalid_yaml_returns_validation_error() {
    let result = Config::load(&fixture_path("config_invalid_yaml.yaml"));
    match result.unwrap_err() {
        ConfigError::ValidationError(_) => {}
        e => panic!("Expected ValidationError, got {:?}", e),
    }
}

#[test]
fn unknown_duration_format_is_rejected() {
    let result = Config::from_yaml("relay:\n  timeout: soon\n");
    assert!(matches!(result, Err(ConfigError::ValidationError(_))));
}

#[test]
fn config_debug_redacts_default_key() {
    let config = Config::load(&fixture_path("config_valid.yaml")).unwrap();
    let debug = format!("{:?}", config);
    assert!(!debug.contains("fixture-robot-key"));
    assert!(debug.contains("[REDACTED]"));
}

// ============================================================
// Validation Tests
// ============================================================

#[test]
fn validate_valid_config() {
    let config = Config::load(&fixture_path("config_valid.yaml")).unwrap();
    assert!(config.validate().is_ok());
}

#[test]
fn validate_collects_all_errors() {
    let config = Config::load(&fixture_path("config_invalid_values.yaml")).unwrap();
    let errors = config.validate().unwrap_err();

    let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
    assert_eq!(errors.len(), 7, "errors: {:#?}", messages);

    assert!(messages.iter().any(|m| m.contains("server.listen")));
    assert!(messages.iter().any(|m| m.contains("relay.base_url")));
    assert!(messages.iter().any(|m| m.contains("relay.timeout")));
    assert!(messages.iter().any(|m| m.contains("max_message_bytes 100")));
    assert!(messages.iter().any(|m| m.contains("Mars/Olympus_Mons")));
    assert!(errors.iter().any(|e| matches!(
        e,
        ConfigError::InvalidTemplate { name, .. } if name == "header"
    )));
    assert!(errors.iter().any(|e| matches!(
        e,
        ConfigError::InvalidTemplate { name, message } if name == "alert" && message.starts_with("render:")
    )));
}

#[test]
fn validate_minimum_message_bytes_boundary() {
    let at_min = Config::from_yaml(&format!(
        "relay:\n  max_message_bytes: {}\n",
        MIN_MESSAGE_BYTES
    ))
    .unwrap();
    assert!(at_min.validate().is_ok());

    let below = Config::from_yaml(&format!(
        "relay:\n  max_message_bytes: {}\n",
        MIN_MESSAGE_BYTES - 1
    ))
    .unwrap();
    assert!(below.validate().is_err());
}

#[test]
#[serial]
fn validate_reports_undefined_key_variable() {
    // SAFETY: Test marked #[serial] to prevent parallel execution with other env var tests
    unsafe { std::env::remove_var("G2WW_FIXTURE_ROBOT_KEY") };

    let config = Config::load(&fixture_path("config_env_key.yaml")).unwrap();
    let errors = config.validate().unwrap_err();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].to_string().contains("G2WW_FIXTURE_ROBOT_KEY"));
}

// ============================================================
// Compilation Tests
// ============================================================

#[test]
fn compile_valid_config() {
    let config = Config::load(&fixture_path("config_valid.yaml")).unwrap();
    let runtime = config.compile().unwrap();

    assert_eq!(
        runtime.listen,
        "127.0.0.1:8080".parse::<std::net::SocketAddr>().unwrap()
    );
    assert_eq!(runtime.timezone, chrono_tz::Asia::Shanghai);
    assert_eq!(runtime.relay.timeout, Duration::from_secs(5));
    assert_eq!(
        runtime.relay.default_key.as_ref().map(SecretString::expose),
        Some("fixture-robot-key")
    );
}

#[test]
#[serial]
fn compile_resolves_key_from_variable() {
    // SAFETY: Test marked #[serial] to prevent parallel execution with other env var tests
    unsafe { std::env::set_var("G2WW_FIXTURE_ROBOT_KEY", "from-env") };

    let config = Config::load(&fixture_path("config_env_key.yaml")).unwrap();
    assert!(config.validate().is_ok());
    let runtime = config.compile().unwrap();
    assert_eq!(
        runtime.relay.default_key.as_ref().map(SecretString::expose),
        Some("from-env")
    );

    unsafe { std::env::remove_var("G2WW_FIXTURE_ROBOT_KEY") };
}

#[test]
#[serial]
fn compile_falls_back_to_robot_key_env() {
    // SAFETY: Test marked #[serial] to prevent parallel execution with other env var tests
    unsafe { std::env::set_var(ENV_ROBOT_KEY, "env-fallback") };

    let config = Config::load(&fixture_path("config_minimal.yaml")).unwrap();
    let runtime = config.compile().unwrap();
    assert_eq!(
        runtime.relay.default_key.as_ref().map(SecretString::expose),
        Some("env-fallback")
    );

    unsafe { std::env::remove_var(ENV_ROBOT_KEY) };
}

#[test]
#[serial]
fn configured_key_wins_over_env() {
    // SAFETY: Test marked #[serial] to prevent parallel execution with other env var tests
    unsafe { std::env::set_var(ENV_ROBOT_KEY, "env-fallback") };

    let config = Config::load(&fixture_path("config_valid.yaml")).unwrap();
    let runtime = config.compile().unwrap();
    assert_eq!(
        runtime.relay.default_key.as_ref().map(SecretString::expose),
        Some("fixture-robot-key")
    );

    unsafe { std::env::remove_var(ENV_ROBOT_KEY) };
}

#[test]
fn key_for_prefers_request_key() {
    let relay = CompiledRelay {
        base_url: "http://robot".to_string(),
        default_key: Some(SecretString::new("default".to_string())),
        timeout: Duration::from_secs(1),
        max_message_bytes: 4096,
    };

    assert_eq!(relay.key_for(Some("req")).unwrap().expose(), "req");
    assert_eq!(relay.key_for(None).unwrap().expose(), "default");
    assert_eq!(relay.key_for(Some("")).unwrap().expose(), "default");

    let no_default = CompiledRelay {
        default_key: None,
        ..relay
    };
    assert!(no_default.key_for(None).is_none());
}
