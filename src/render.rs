//! Markdown rendering for WeCom robot messages.
//!
//! Turns each alert into a colored fragment and renders the per-part
//! counter header. Both are minijinja templates so deployments can reword
//! them; the built-in defaults match the stock WeCom layout.
//!
//! ```text
//! counter.rs -> render.rs -> partition.rs -> relay.rs
//! ```

use minijinja::{Environment, UndefinedBehavior, context};

use crate::alert::{AlertBatch, AlertRecord};
use crate::counter::CounterSnapshot;
use crate::error::TemplateError;

/// Substring of a batch title that marks a recovered batch.
pub const RECOVERED_MARKER: &str = "OK";

/// Default per-part header. `part` is filled in by the partitioner.
pub const DEFAULT_HEADER_TEMPLATE: &str = "<font color=\"{{ color }}\">today's alert count: {{ count }}, this batch: {{ alerts }}, Part{{ part }}</font>\n";

/// Default per-alert fragment.
pub const DEFAULT_ALERT_TEMPLATE: &str = "<font color=\"{{ color }}\">{{ name }}</font>\n<font color=\"{{ summary_color }}\">{{ summary }}</font>\n";

/// WeCom markdown font colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertColor {
    /// Green. Used when the whole batch has recovered.
    Info,
    /// Red. Used for anything still firing.
    Warning,
    /// Gray. Used for alert summaries.
    Comment,
}

impl AlertColor {
    /// Pick the batch-wide color from the notification title.
    pub fn classify(title: &str) -> Self {
        if title.contains(RECOVERED_MARKER) {
            AlertColor::Info
        } else {
            AlertColor::Warning
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AlertColor::Info => "info",
            AlertColor::Warning => "warning",
            AlertColor::Comment => "comment",
        }
    }
}

impl std::fmt::Display for AlertColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Renders alert fragments and part headers.
///
/// Holds one pre-built minijinja environment with lenient undefined
/// behavior, so templates referencing missing labels render empty strings.
/// Safe to share across request tasks.
pub struct MessageRenderer {
    env: Environment<'static>,
    header_template: String,
    alert_template: String,
}

impl MessageRenderer {
    /// Create a renderer. `None` selects the built-in template.
    pub fn new(header_template: Option<&str>, alert_template: Option<&str>) -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Lenient);
        // Fragments end in a line break; minijinja strips it otherwise.
        env.set_keep_trailing_newline(true);

        Self {
            env,
            header_template: header_template
                .unwrap_or(DEFAULT_HEADER_TEMPLATE)
                .to_string(),
            alert_template: alert_template.unwrap_or(DEFAULT_ALERT_TEMPLATE).to_string(),
        }
    }

    /// Render one alert. Same record and color always give the same bytes.
    pub fn render_alert(
        &self,
        record: &AlertRecord,
        color: AlertColor,
    ) -> Result<String, TemplateError> {
        self.env
            .render_str(
                &self.alert_template,
                context! {
                    color => color.as_str(),
                    summary_color => AlertColor::Comment.as_str(),
                    name => record.name(),
                    summary => record.summary(),
                    status => &record.status,
                    labels => &record.labels,
                    annotations => &record.annotations,
                    value_string => &record.value_string,
                    generator_url => &record.generator_url,
                    starts_at => &record.starts_at,
                },
            )
            .map_err(|e| TemplateError::RenderFailed {
                message: format!("alert: {}", e),
            })
    }

    /// Render every alert of a batch in order.
    pub fn render_batch(
        &self,
        batch: &AlertBatch,
        color: AlertColor,
    ) -> Result<Vec<String>, TemplateError> {
        batch
            .alerts
            .iter()
            .map(|record| self.render_alert(record, color))
            .collect()
    }

    /// Render the counter header for part number `part` (1-based).
    pub fn render_header(
        &self,
        snapshot: &CounterSnapshot,
        color: AlertColor,
        part: usize,
    ) -> Result<String, TemplateError> {
        self.env
            .render_str(
                &self.header_template,
                context! {
                    color => color.as_str(),
                    count => snapshot.count,
                    alerts => snapshot.alerts,
                    part => part,
                },
            )
            .map_err(|e| TemplateError::RenderFailed {
                message: format!("header: {}", e),
            })
    }
}

impl Default for MessageRenderer {
    fn default() -> Self {
        Self::new(None, None)
    }
}

impl std::fmt::Debug for MessageRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageRenderer")
            .field(
                "custom_header",
                &(self.header_template != DEFAULT_HEADER_TEMPLATE),
            )
            .field(
                "custom_alert",
                &(self.alert_template != DEFAULT_ALERT_TEMPLATE),
            )
            .finish()
    }
}
