//! Prometheus metrics exposition server.
//!
//! Installs the global `metrics` recorder and serves it over HTTP on a
//! dedicated port, separate from the inbound webhook listener.

use anyhow::Result;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Register all metric descriptions for Prometheus.
///
/// Descriptions provide HELP text in the Prometheus output.
pub fn register_metric_descriptions() {
    use metrics::{describe_counter, describe_gauge};

    describe_counter!(
        "g2ww_batches_received_total",
        "Total number of alert batches that entered the pipeline"
    );
    describe_counter!(
        "g2ww_batches_rejected_total",
        "Total number of inbound requests rejected before the pipeline (bad JSON, no key)"
    );
    describe_counter!(
        "g2ww_parts_sent_total",
        "Total number of message parts accepted by the robot endpoint"
    );
    describe_counter!(
        "g2ww_parts_oversized_total",
        "Total number of parts holding a single alert larger than the size limit"
    );
    describe_counter!(
        "g2ww_ack_rejected_total",
        "Total number of parts the robot endpoint answered with a non-zero errcode"
    );
    describe_counter!(
        "g2ww_delivery_errors_total",
        "Total number of parts that could not be delivered (unreachable, malformed ack)"
    );

    describe_gauge!(
        "g2ww_daily_count",
        "Batches relayed in the current daily window"
    );
    describe_gauge!(
        "g2ww_build_info",
        "Build information with version label (always 1)"
    );
}

/// Initialize known metrics so they show up in `/metrics` before any
/// batch arrives.
pub fn initialize_metrics() {
    use metrics::{counter, gauge};

    gauge!("g2ww_build_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);
    gauge!("g2ww_daily_count").set(0.0);

    counter!("g2ww_batches_received_total").absolute(0);
    counter!("g2ww_parts_sent_total").absolute(0);
    counter!("g2ww_parts_oversized_total").absolute(0);
    for kind in ["unreachable", "malformed_ack"] {
        counter!("g2ww_delivery_errors_total", "kind" => kind).absolute(0);
    }
}

/// Metrics server for Prometheus exposition.
pub struct MetricsServer {
    port: u16,
}

impl MetricsServer {
    /// Create a new metrics server bound to the given port.
    ///
    /// Use port 0 to let the OS assign an available port.
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Install the recorder, start the exporter listener, and wait until
    /// `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns an error if the recorder is already installed or the port
    /// cannot be bound.
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let addr: SocketAddr = ([0, 0, 0, 0], self.port).into();

        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .map_err(|e| anyhow::anyhow!("Failed to install Prometheus exporter: {}", e))?;

        register_metric_descriptions();
        initialize_metrics();

        info!(port = self.port, "Metrics server started on /metrics");

        cancel.cancelled().await;

        info!("Metrics server shutting down");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::OnceLock;
    use std::time::Duration;

    static TEST_PORT: OnceLock<u16> = OnceLock::new();

    fn get_test_port() -> u16 {
        *TEST_PORT.get_or_init(|| {
            let port = portpicker::pick_unused_port().expect("No free port");

            let cancel = CancellationToken::new();
            let server = MetricsServer::new(port);

            std::thread::spawn(move || {
                let rt = tokio::runtime::Runtime::new().unwrap();
                rt.block_on(async {
                    let _ = server.run(cancel).await;
                });
            });

            // Wait for server to be ready
            std::thread::sleep(Duration::from_millis(500));

            port
        })
    }

    async fn scrape(port: u16) -> String {
        reqwest::Client::new()
            .get(format!("http://127.0.0.1:{}/metrics", port))
            .send()
            .await
            .expect("Request should succeed")
            .text()
            .await
            .expect("Should have body")
    }

    #[tokio::test]
    async fn metrics_are_initialized_at_startup() {
        let body = scrape(get_test_port()).await;

        assert!(body.contains("g2ww_build_info"), "Body: {}", body);
        assert!(body.contains("g2ww_parts_sent_total"), "Body: {}", body);
    }

    #[tokio::test]
    async fn incremented_counters_appear_in_output() {
        let port = get_test_port();

        metrics::counter!("g2ww_ack_rejected_total", "errcode" => "40058").increment(2);

        let body = scrape(port).await;
        assert!(body.contains("g2ww_ack_rejected_total"), "Body: {}", body);
        assert!(body.contains("40058"), "Body: {}", body);
    }

    #[tokio::test]
    async fn output_is_prometheus_text() {
        let body = scrape(get_test_port()).await;

        for line in body.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let first_char = line.chars().next().unwrap_or(' ');
            assert!(
                first_char == '#' || first_char.is_alphabetic() || first_char == '_',
                "Invalid Prometheus line: {}",
                line
            );
        }
    }

    #[test]
    fn new_creates_server_with_port() {
        assert_eq!(MetricsServer::new(9090).port(), 9090);
        assert_eq!(MetricsServer::new(0).port(), 0);
    }
}
