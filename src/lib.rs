//! g2ww - Relay Grafana alert webhooks to WeCom group robots.

pub mod alert;
pub mod cli;
pub mod config;
pub mod counter;
pub mod error;
pub mod metrics;
pub mod partition;
pub mod pipeline;
pub mod relay;
pub mod render;
pub mod server;

// Re-export commonly used types
pub use alert::{AlertBatch, AlertRecord};
pub use cli::LogFormat;
pub use counter::{CounterSnapshot, CounterStatus, DailyCounter};
pub use metrics::{MetricsServer, register_metric_descriptions};
pub use partition::{MessagePart, Partitioner};
pub use pipeline::{BatchReport, PartOutcome, Pipeline};
pub use relay::{Delivery, Relay, RelayAck, WeComRelay};
pub use render::{AlertColor, MessageRenderer};
pub use server::{AppState, router, serve};
