//! WeCom group robot client.
//!
//! Implements the `Relay` trait for posting one markdown message part to the
//! robot `send?key=` endpoint and parsing its `{errcode, errmsg}`
//! acknowledgement. Parts are sent exactly once: there is no retry loop.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::Instrument;

use crate::config::SecretString;
use crate::error::DeliveryError;
use crate::partition::MessagePart;

/// Public WeCom robot API root.
pub const DEFAULT_BASE_URL: &str = "https://qyapi.weixin.qq.com/cgi-bin/webhook";

/// Wire envelope for a markdown robot message.
#[derive(Debug, Clone, Serialize)]
pub struct MarkdownEnvelope<'a> {
    msgtype: &'static str,
    markdown: MarkdownContent<'a>,
}

#[derive(Debug, Clone, Serialize)]
struct MarkdownContent<'a> {
    content: &'a str,
}

impl<'a> MarkdownEnvelope<'a> {
    pub fn new(content: &'a str) -> Self {
        Self {
            msgtype: "markdown",
            markdown: MarkdownContent { content },
        }
    }
}

/// Bytes the envelope adds around an empty content string.
pub fn envelope_overhead() -> usize {
    serde_json::to_vec(&MarkdownEnvelope::new("")).map_or(0, |body| body.len())
}

/// Byte length of `text` once escaped as a JSON string, quotes excluded.
///
/// Escaping is per character, so the escaped length of a concatenation is
/// the sum of the escaped lengths of its pieces.
pub fn escaped_len(text: &str) -> usize {
    serde_json::to_string(text).map_or(text.len(), |quoted| quoted.len() - 2)
}

/// Acknowledgement returned by the robot endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RelayAck {
    pub errcode: i64,
    #[serde(default)]
    pub errmsg: String,
}

impl RelayAck {
    /// `errcode == 0`.
    pub fn is_accepted(&self) -> bool {
        self.errcode == 0
    }
}

/// A part that reached the endpoint, with the raw body and parsed ack.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub raw_body: String,
    pub ack: RelayAck,
}

/// Abstract relay for sending message parts downstream.
///
/// Implementations must be `Send + Sync` to be shared by request tasks.
#[async_trait]
pub trait Relay: Send + Sync {
    /// Short name for logs, e.g. "wecom".
    fn name(&self) -> &str;

    /// Send one part to the robot identified by `key`.
    ///
    /// # Returns
    ///
    /// * `Ok(Delivery)` - The endpoint answered with a parseable ack, accepted or not
    /// * `Err(DeliveryError)` - Network failure or unparseable answer
    async fn send(&self, key: &SecretString, part: &MessagePart)
    -> Result<Delivery, DeliveryError>;
}

impl std::fmt::Debug for dyn Relay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relay").field("name", &self.name()).finish()
    }
}

/// WeCom robot relay over a shared `reqwest::Client`.
pub struct WeComRelay {
    /// API root, without the trailing `/send`.
    base_url: String,
    /// HTTP client (shared, connection pooling).
    client: reqwest::Client,
}

impl WeComRelay {
    /// Create a relay posting to `{base_url}/send`.
    pub fn new(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into(),
            client,
        }
    }

    fn send_url(&self) -> String {
        format!("{}/send", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl Relay for WeComRelay {
    fn name(&self) -> &str {
        "wecom"
    }

    async fn send(
        &self,
        key: &SecretString,
        part: &MessagePart,
    ) -> Result<Delivery, DeliveryError> {
        let span = tracing::info_span!(
            "send_part",
            part = part.sequence_index,
            fragments = part.fragment_count,
            envelope_bytes = part.envelope_bytes
        );

        async {
            let response = self
                .client
                .post(self.send_url())
                .query(&[("key", key.expose())])
                .json(&MarkdownEnvelope::new(&part.text))
                .send()
                .await
                .map_err(|e| record_failure(DeliveryError::Unreachable(e.without_url().to_string())))?;

            let status = response.status();
            let raw_body = response
                .text()
                .await
                .map_err(|e| record_failure(DeliveryError::Unreachable(e.without_url().to_string())))?;
            tracing::debug!(status = %status, body = %raw_body, "Robot endpoint answered");

            let ack: RelayAck = serde_json::from_str(&raw_body).map_err(|e| {
                record_failure(DeliveryError::MalformedAck {
                    message: e.to_string(),
                    raw_body: raw_body.clone(),
                })
            })?;

            if ack.is_accepted() {
                tracing::debug!("Part accepted");
                metrics::counter!("g2ww_parts_sent_total").increment(1);
            } else {
                tracing::warn!(
                    errcode = ack.errcode,
                    errmsg = %ack.errmsg,
                    "Robot endpoint rejected part"
                );
                metrics::counter!(
                    "g2ww_ack_rejected_total",
                    "errcode" => ack.errcode.to_string()
                )
                .increment(1);
            }

            Ok(Delivery { raw_body, ack })
        }
        .instrument(span)
        .await
    }
}

fn record_failure(err: DeliveryError) -> DeliveryError {
    tracing::error!(error = %err, kind = err.kind(), "Failed to deliver part");
    metrics::counter!("g2ww_delivery_errors_total", "kind" => err.kind()).increment(1);
    err
}

impl std::fmt::Debug for WeComRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeComRelay")
            .field("base_url", &self.base_url)
            .finish()
    }
}
