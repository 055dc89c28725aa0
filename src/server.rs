//! Inbound HTTP surface.
//!
//! `POST /send?key=...` takes a Grafana webhook body and relays it;
//! `GET /` reports the daily counter.

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{DefaultBodyLimit, Query, State};
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::alert::AlertBatch;
use crate::config::CompiledRelay;
use crate::error::{InputError, PipelineError};
use crate::pipeline::Pipeline;

/// Body returned when the inbound payload is not a webhook document.
pub const INPUT_FORMAT_ERROR_BODY: &str = "Error on JSON format";

/// State shared by all handlers.
#[derive(Debug)]
pub struct AppState {
    pub pipeline: Pipeline,
    pub relay: CompiledRelay,
}

#[derive(Debug, Deserialize)]
struct SendQuery {
    key: Option<String>,
}

/// Reasons a request fails before or during the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Input(InputError::InvalidJson(_)) => {
                (StatusCode::BAD_REQUEST, INPUT_FORMAT_ERROR_BODY).into_response()
            }
            ApiError::Input(inner @ InputError::MissingKey) => {
                (StatusCode::BAD_REQUEST, inner.to_string()).into_response()
            }
            ApiError::Pipeline(inner) => {
                (StatusCode::INTERNAL_SERVER_ERROR, inner.to_string()).into_response()
            }
        }
    }
}

/// Build the relay's router.
pub fn router(state: Arc<AppState>) -> Router {
    // The query string carries the robot key, so only the path is traced.
    let trace = TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
        tracing::info_span!(
            "http_request",
            method = %req.method(),
            path = %req.uri().path()
        )
    });

    // Batches of any size are accepted; the partitioner bounds what goes out.
    Router::new()
        .route("/", get(status))
        .route("/send", post(send_alerts))
        .with_state(state)
        .layer(DefaultBodyLimit::disable())
        .layer(trace)
}

/// Serve `app` on `listener` until `cancel` fires.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
}

async fn status(State(state): State<Arc<AppState>>) -> String {
    let status = state.pipeline.counter().status();
    format!(
        "g2ww is running! Relayed {} alert batches to WeCom since {}.",
        status.count,
        status.window_start.format("%Y-%m-%d %H:%M %Z")
    )
}

async fn send_alerts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SendQuery>,
    body: Bytes,
) -> Result<String, ApiError> {
    let batch = AlertBatch::from_slice(&body).inspect_err(|e| {
        tracing::warn!(error = %e, body_len = body.len(), "Rejected inbound batch");
        metrics::counter!("g2ww_batches_rejected_total", "reason" => "invalid_json").increment(1);
    })?;

    let key = state
        .relay
        .key_for(query.key.as_deref())
        .ok_or(InputError::MissingKey)
        .inspect_err(|_| {
            tracing::warn!("Rejected inbound batch without robot key");
            metrics::counter!("g2ww_batches_rejected_total", "reason" => "missing_key")
                .increment(1);
        })?;

    let report = state.pipeline.handle(&batch, &key).await?;
    Ok(report.body())
}
