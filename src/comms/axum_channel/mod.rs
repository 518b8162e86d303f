//! Axum HTTP channel. JSON API under `/api/`.
//!
//! ```text
//! GET  /api/health
//! POST /api/datasets              multipart: file, request?
//! GET  /api/datasets/{id}
//! POST /api/analyze               { dataset_id, request }
//! POST /api/visualize             { dataset_id, request }
//! POST /api/report                { dataset_id?, request, title?, chart_ids? }
//! POST /api/message               { message, dataset_id?, title? }
//! GET  /api/visualizations/{id}   image/svg+xml
//! GET  /api/reports/{id}          application/pdf
//! ```
//!
//! The shutdown token drives axum's graceful shutdown.

mod api;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::state::CommsState;
use super::{Channel, ChannelFuture};
use crate::config::HttpConfig;
use crate::error::AppError;

/// Router state injected into every handler. Cheap to clone.
#[derive(Clone)]
pub struct AxumState {
    pub channel_id: Arc<str>,
    pub comms: Arc<CommsState>,
    /// Upper bound for handlers that call the model.
    pub request_timeout: Duration,
}

pub struct AxumChannel {
    channel_id: String,
    bind_addr: String,
    max_upload_bytes: usize,
    request_timeout: Duration,
    state: Arc<CommsState>,
}

impl AxumChannel {
    pub fn new(channel_id: impl Into<String>, config: &HttpConfig, state: Arc<CommsState>) -> Self {
        Self {
            channel_id: channel_id.into(),
            bind_addr: config.bind.clone(),
            max_upload_bytes: config.max_upload_bytes,
            request_timeout: Duration::from_secs(config.request_timeout_seconds),
            state,
        }
    }
}

impl Channel for AxumChannel {
    fn id(&self) -> &str {
        &self.channel_id
    }

    fn run(self: Box<Self>, shutdown: CancellationToken) -> ChannelFuture {
        Box::pin(run_axum(*self, shutdown))
    }
}

async fn run_axum(channel: AxumChannel, shutdown: CancellationToken) -> Result<(), AppError> {
    let AxumChannel { channel_id, bind_addr, max_upload_bytes, request_timeout, state } = channel;
    let router = build_router(
        AxumState { channel_id: Arc::from(channel_id.as_str()), comms: state, request_timeout },
        max_upload_bytes,
    );

    let listener = TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| AppError::Comms(format!("http bind failed on {bind_addr}: {e}")))?;

    info!(%channel_id, %bind_addr, "http channel listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| AppError::Comms(format!("http server error: {e}")))?;

    info!(%channel_id, "http channel shut down");
    Ok(())
}

pub fn build_router(state: AxumState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/api/health",               get(api::health))
        .route("/api/datasets",             post(api::upload_dataset))
        .route("/api/datasets/{id}",        get(api::dataset))
        .route("/api/analyze",              post(api::analyze))
        .route("/api/visualize",            post(api::visualize))
        .route("/api/report",               post(api::report))
        .route("/api/message",              post(api::message))
        .route("/api/visualizations/{id}",  get(api::chart_svg))
        .route("/api/reports/{id}",         get(api::report_pdf))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}
