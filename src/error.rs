//! Centralized error types for g2ww using thiserror.
//!
//! Everything below the binary edge returns one of these; `anyhow` is only
//! used in `main.rs`.

use thiserror::Error;

/// Errors related to configuration loading and validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load config file: {0}")]
    LoadError(String),
    #[error("invalid configuration: {0}")]
    ValidationError(String),
    #[error("invalid template '{name}': {message}")]
    InvalidTemplate { name: String, message: String },
}

/// The inbound request could not be turned into an alert batch.
///
/// Raised before the pipeline starts, so the daily counter is never touched.
#[derive(Error, Debug)]
pub enum InputError {
    #[error("invalid alert batch JSON: {0}")]
    InvalidJson(String),
    #[error("missing robot key: pass ?key= or configure relay.default_key")]
    MissingKey,
}

/// Errors raised while delivering one message part to the robot endpoint.
///
/// A non-zero `errcode` in the acknowledgement is not an error: the part
/// was transmitted and the caller still gets the raw body.
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("robot endpoint unreachable: {0}")]
    Unreachable(String),
    #[error("malformed acknowledgement: {message}")]
    MalformedAck { message: String, raw_body: String },
}

impl DeliveryError {
    /// Short label used for the `kind` metric label and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            DeliveryError::Unreachable(_) => "unreachable",
            DeliveryError::MalformedAck { .. } => "malformed_ack",
        }
    }
}

/// Errors related to message rendering.
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("template render failed: {message}")]
    RenderFailed { message: String },
}

/// Errors that abort a whole batch before any part is sent.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("render error: {0}")]
    Render(#[from] TemplateError),
}
