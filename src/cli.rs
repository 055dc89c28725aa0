//! Command-line interface for g2ww.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::config::DEFAULT_CONFIG_PATH;

/// Log output format.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum LogFormat {
    /// Human-readable text format for journalctl (default).
    #[default]
    Text,
    /// Structured JSON format for log aggregation.
    Json,
}

/// Relay Grafana alert webhooks to WeCom group robots.
#[derive(Parser, Debug)]
#[command(name = "g2ww")]
#[command(version)]
#[command(about = "Relay Grafana alert webhooks to WeCom group robots")]
pub struct Cli {
    /// Path to configuration file.
    #[arg(short = 'c', long = "config", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Validate configuration (including templates) and exit.
    #[arg(long = "validate")]
    pub validate: bool,

    /// Log format: text or json.
    #[arg(long = "log-format", value_enum, default_value_t = LogFormat::Text, env = "LOG_FORMAT")]
    pub log_format: LogFormat,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("g2ww").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn bare_invocation_serves_with_packaged_config() {
        let cli = parse(&[]);
        assert_eq!(cli.config, PathBuf::from("/etc/g2ww/config.yaml"));
        assert!(!cli.validate);
        assert!(matches!(cli.log_format, LogFormat::Text));
    }

    #[test]
    fn deployment_check_before_reload() {
        // The form used in a systemd ExecStartPre or a CI lint step.
        let cli = parse(&["--validate", "-c", "/srv/g2ww/staging.yaml", "--log-format", "json"]);
        assert!(cli.validate);
        assert_eq!(cli.config, PathBuf::from("/srv/g2ww/staging.yaml"));
        assert!(matches!(cli.log_format, LogFormat::Json));
    }

    #[test]
    fn flags_are_order_independent() {
        let cli = parse(&["--log-format", "json", "--config", "relay.yaml", "--validate"]);
        assert!(cli.validate);
        assert_eq!(cli.config, PathBuf::from("relay.yaml"));
    }

    #[test]
    fn settings_belong_in_the_config_file() {
        for args in [
            ["g2ww", "--listen", "0.0.0.0:8080"],
            ["g2ww", "--key", "693a91f6"],
            ["g2ww", "--timezone", "Asia/Shanghai"],
        ] {
            assert!(Cli::try_parse_from(args).is_err(), "{:?} should be rejected", args);
        }
    }

    #[test]
    fn unknown_log_format_rejected() {
        assert!(Cli::try_parse_from(["g2ww", "--log-format", "logfmt"]).is_err());
        assert!(Cli::try_parse_from(["g2ww", "-c"]).is_err());
    }

    #[test]
    #[serial]
    fn container_env_selects_json_logs() {
        // SAFETY: Test marked #[serial] to prevent parallel execution with other env var tests
        unsafe { std::env::set_var("LOG_FORMAT", "json") };

        let served = parse(&["-c", "/config/g2ww.yaml"]);
        let overridden = parse(&["--log-format", "text"]);

        unsafe { std::env::remove_var("LOG_FORMAT") };

        assert!(matches!(served.log_format, LogFormat::Json));
        assert!(matches!(overridden.log_format, LogFormat::Text));
    }
}
