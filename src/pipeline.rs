//! Batch pipeline: counter, render, partition, relay.
//!
//! One `handle` call processes one inbound batch. Parts are sent strictly
//! one after another so part N reaches the chat before part N+1; a part that
//! fails to deliver does not stop the ones after it.

use std::sync::Arc;

use tracing::Instrument;

use crate::alert::AlertBatch;
use crate::config::SecretString;
use crate::counter::DailyCounter;
use crate::error::{DeliveryError, PipelineError};
use crate::partition::Partitioner;
use crate::relay::{Delivery, Relay};
use crate::render::{AlertColor, MessageRenderer};

/// Result of sending one part.
#[derive(Debug)]
pub struct PartOutcome {
    pub sequence_index: usize,
    pub result: Result<Delivery, DeliveryError>,
}

impl PartOutcome {
    /// Delivered, but the endpoint answered with a non-zero `errcode`.
    pub fn is_rejected(&self) -> bool {
        matches!(&self.result, Ok(delivery) if !delivery.ack.is_accepted())
    }
}

/// Everything that happened to one batch.
#[derive(Debug)]
pub struct BatchReport {
    /// Daily count assigned to this batch.
    pub count: u64,
    pub color: AlertColor,
    /// One entry per part, in send order.
    pub parts: Vec<PartOutcome>,
}

impl BatchReport {
    /// Raw response bodies concatenated in send order.
    ///
    /// Parts that failed to deliver contribute nothing. Rejected parts still
    /// contribute their body.
    pub fn body(&self) -> String {
        self.parts
            .iter()
            .filter_map(|outcome| outcome.result.as_ref().ok())
            .map(|delivery| delivery.raw_body.as_str())
            .collect()
    }

    pub fn failed(&self) -> usize {
        self.parts.iter().filter(|o| o.result.is_err()).count()
    }

    pub fn rejected(&self) -> usize {
        self.parts.iter().filter(|o| o.is_rejected()).count()
    }
}

/// Shared, per-process pipeline. Cheap to call concurrently.
pub struct Pipeline {
    counter: Arc<DailyCounter>,
    renderer: MessageRenderer,
    partitioner: Partitioner,
    relay: Arc<dyn Relay>,
}

impl Pipeline {
    pub fn new(
        counter: Arc<DailyCounter>,
        renderer: MessageRenderer,
        partitioner: Partitioner,
        relay: Arc<dyn Relay>,
    ) -> Self {
        Self {
            counter,
            renderer,
            partitioner,
            relay,
        }
    }

    pub fn counter(&self) -> &DailyCounter {
        &self.counter
    }

    /// Relay one batch to the robot identified by `key`.
    ///
    /// # Errors
    /// Returns [`PipelineError::Render`] if a template fails to render; in
    /// that case nothing is sent. Delivery failures are reported per part in
    /// the returned [`BatchReport`].
    pub async fn handle(
        &self,
        batch: &AlertBatch,
        key: &SecretString,
    ) -> Result<BatchReport, PipelineError> {
        let span = tracing::info_span!(
            "handle_batch",
            title = %batch.title,
            alerts = batch.alerts.len()
        );

        async {
            metrics::counter!("g2ww_batches_received_total").increment(1);

            let snapshot = self.counter.observe(batch.alerts.len());
            let color = AlertColor::classify(&batch.title);
            tracing::debug!(count = snapshot.count, color = %color, "Batch counted");

            let fragments = self.renderer.render_batch(batch, color)?;
            let parts = self.partitioner.partition(&fragments, |part| {
                self.renderer.render_header(&snapshot, color, part)
            })?;

            let mut outcomes = Vec::with_capacity(parts.len());
            for part in &parts {
                let result = self.relay.send(key, part).await;
                outcomes.push(PartOutcome {
                    sequence_index: part.sequence_index,
                    result,
                });
            }

            let report = BatchReport {
                count: snapshot.count,
                color,
                parts: outcomes,
            };
            tracing::info!(
                count = report.count,
                parts = report.parts.len(),
                failed = report.failed(),
                rejected = report.rejected(),
                relay = self.relay.name(),
                "Batch relayed"
            );
            Ok(report)
        }
        .instrument(span)
        .await
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("counter", &self.counter)
            .field("renderer", &self.renderer)
            .field("partitioner", &self.partitioner)
            .field("relay", &self.relay)
            .finish()
    }
}
