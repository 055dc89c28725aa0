//! Inbound Grafana webhook payload.
//!
//! Mirrors the unified-alerting webhook contact point body. Every field is
//! optional on input: Grafana versions disagree on which ones they send, and
//! the relay only needs `title` and each alert's `alertname`/`summary`.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

use crate::error::InputError;

/// Label key holding the alert name.
pub const LABEL_ALERTNAME: &str = "alertname";

/// Annotation key holding the alert summary.
pub const ANNOTATION_SUMMARY: &str = "summary";

/// One inbound submission: a group of alerts sharing a notification.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AlertBatch {
    pub receiver: String,
    pub status: String,
    pub org_id: i64,
    /// Alerts in the order Grafana sent them. Render and part order follow it.
    #[serde(deserialize_with = "null_as_default")]
    pub alerts: Vec<AlertRecord>,
    #[serde(deserialize_with = "null_as_default")]
    pub group_labels: HashMap<String, String>,
    #[serde(deserialize_with = "null_as_default")]
    pub common_labels: HashMap<String, String>,
    #[serde(deserialize_with = "null_as_default")]
    pub common_annotations: HashMap<String, String>,
    #[serde(rename = "externalURL")]
    pub external_url: String,
    pub version: String,
    pub group_key: String,
    pub truncated_alerts: i64,
    /// Notification title, e.g. `[FIRING:2] ...` or `[OK] ...`.
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    pub state: String,
    pub message: String,
    #[serde(rename = "ruleUrl")]
    pub rule_url: String,
}

impl AlertBatch {
    /// Parse a raw request body.
    ///
    /// # Errors
    /// Returns [`InputError::InvalidJson`] if the body is not a JSON object
    /// matching the webhook shape.
    pub fn from_slice(body: &[u8]) -> Result<Self, InputError> {
        serde_json::from_slice(body).map_err(|e| InputError::InvalidJson(e.to_string()))
    }
}

/// Grafana sends `null` for empty collections; read it as the empty value.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// A single alert within a batch.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AlertRecord {
    pub status: String,
    #[serde(deserialize_with = "null_as_default")]
    pub labels: HashMap<String, String>,
    #[serde(deserialize_with = "null_as_default")]
    pub annotations: HashMap<String, String>,
    pub starts_at: String,
    pub ends_at: String,
    pub value_string: String,
    #[serde(rename = "generatorURL")]
    pub generator_url: String,
    pub fingerprint: String,
    #[serde(rename = "silenceURL")]
    pub silence_url: String,
    #[serde(rename = "dashboardURL")]
    pub dashboard_url: String,
    #[serde(rename = "panelURL")]
    pub panel_url: String,
}

impl AlertRecord {
    /// Build a record carrying only a name and a summary.
    pub fn new(name: &str, summary: &str) -> Self {
        let mut record = Self::default();
        record
            .labels
            .insert(LABEL_ALERTNAME.to_string(), name.to_string());
        record
            .annotations
            .insert(ANNOTATION_SUMMARY.to_string(), summary.to_string());
        record
    }

    /// `labels.alertname`, or empty when absent.
    pub fn name(&self) -> &str {
        self.labels
            .get(LABEL_ALERTNAME)
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// `annotations.summary`, or empty when absent.
    pub fn summary(&self) -> &str {
        self.annotations
            .get(ANNOTATION_SUMMARY)
            .map(String::as_str)
            .unwrap_or_default()
    }
}
