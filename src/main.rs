//! g2ww - Relay Grafana alert webhooks to WeCom group robots.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use g2ww::cli::{Cli, LogFormat};
use g2ww::config::{Config, RuntimeConfig};
use g2ww::{
    AppState, DailyCounter, MessageRenderer, MetricsServer, Partitioner, Pipeline, WeComRelay,
};

/// Initialize the tracing subscriber with the specified log format.
fn init_logging(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());

    match format {
        LogFormat::Text => {
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .with_env_filter(filter)
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::fmt()
                .with_writer(std::io::stderr)
                .json()
                .with_current_span(true)
                .with_span_list(false)
                .flatten_event(true)
                .with_env_filter(filter)
                .init();
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.log_format);

    info!(config_path = %cli.config.display(), "Loading configuration");

    let config = match Config::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, path = %cli.config.display(), "Failed to load configuration");
            std::process::exit(1);
        }
    };

    info!("Validating configuration");
    if let Err(errors) = config.validate() {
        for e in &errors {
            error!(error = %e, "Configuration validation error");
        }
        error!(
            error_count = errors.len(),
            "Configuration validation failed"
        );
        std::process::exit(1);
    }

    if cli.validate {
        println!("Configuration is valid: {}", cli.config.display());
        println!("  Listen: {}", config.server.listen);
        println!("  Robot endpoint: {}", config.relay.base_url);
        println!(
            "  Default key: {}",
            if config.relay.default_key.is_some() || config.env_robot_key.is_some() {
                "set"
            } else {
                "none (requests must carry ?key=)"
            }
        );
        println!(
            "  Message limit: {} bytes",
            config.relay.max_message_bytes
        );
        println!("  Counter timezone: {}", config.counter.timezone);
        println!(
            "  Templates: header {}, alert {}",
            if config.templates.header.is_some() { "custom" } else { "default" },
            if config.templates.alert.is_some() { "custom" } else { "default" }
        );
        println!(
            "  Metrics: {} (port {})",
            if config.metrics.enabled {
                "enabled"
            } else {
                "disabled"
            },
            config.metrics.port
        );
        return Ok(());
    }

    let runtime_config = config.compile()?;

    info!(config_path = %cli.config.display(), "g2ww starting");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(run(runtime_config))
}

/// Main async entry point.
async fn run(runtime_config: RuntimeConfig) -> Result<()> {
    let RuntimeConfig {
        listen,
        relay,
        timezone,
        templates,
        metrics,
    } = runtime_config;

    // One pooled client for every part sent to the robot endpoint.
    let http_client = reqwest::Client::builder().timeout(relay.timeout).build()?;

    let pipeline = Pipeline::new(
        Arc::new(DailyCounter::new(timezone)),
        MessageRenderer::new(templates.header.as_deref(), templates.alert.as_deref()),
        Partitioner::new(relay.max_message_bytes),
        Arc::new(WeComRelay::new(relay.base_url.clone(), http_client)),
    );
    let state = Arc::new(AppState { pipeline, relay });

    let cancel = CancellationToken::new();

    let metrics_handle = if metrics.enabled {
        let server = MetricsServer::new(metrics.port);
        let cancel_metrics = cancel.clone();
        info!(port = metrics.port, "Starting metrics server");
        Some(tokio::spawn(async move {
            if let Err(e) = server.run(cancel_metrics).await {
                error!(error = %e, "Metrics server error");
            }
        }))
    } else {
        info!("Metrics server disabled");
        None
    };

    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for ctrl-c signal");
            return;
        }
        info!("Received shutdown signal, initiating graceful shutdown");
        cancel_clone.cancel();
    });

    let listener = TcpListener::bind(listen)
        .await
        .with_context(|| format!("Failed to bind {}", listen))?;
    info!(%listen, %timezone, "Listening for Grafana webhooks");

    let serve_result = g2ww::serve(listener, g2ww::router(state), cancel.clone()).await;

    // Stop the metrics server too if the listener died on its own.
    cancel.cancel();
    if let Some(handle) = metrics_handle {
        let _ = tokio::time::timeout(Duration::from_secs(2), handle).await;
    }

    match serve_result {
        Ok(()) => {
            info!("g2ww shutdown complete");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Server error");
            Err(anyhow::anyhow!("Server error: {}", e))
        }
    }
}
