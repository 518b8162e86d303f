//! Handlers for `/api/*` routes.
//!
//! Model-backed handlers run under the configured request timeout; expiry
//! maps to 504. Errors are JSON `{ "error": code, "message": text }`.

use std::future::Future;

use axum::Json;
use axum::extract::{Multipart, Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use super::AxumState;
use crate::agents::{AgentRequest, AnalysisResult, ReportRequest};
use crate::dataset::DatasetSummary;
use crate::error::AppError;

// ── Request types ─────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub(super) struct DatasetRequest {
    dataset_id: String,
    request: String,
}

#[derive(Deserialize)]
pub(super) struct ReportBody {
    #[serde(default)]
    dataset_id: Option<String>,
    request: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    chart_ids: Vec<String>,
}

#[derive(Deserialize)]
pub(super) struct MessageRequest {
    message: String,
    #[serde(default)]
    dataset_id: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

#[derive(Serialize)]
struct UploadResponse {
    dataset: DatasetSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    analysis: Option<AnalysisResult>,
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn json_error(code: &str, msg: impl std::fmt::Display) -> Json<serde_json::Value> {
    Json(json!({ "error": code, "message": format!("{msg}") }))
}

fn error_response(state: &AxumState, e: AppError) -> Response {
    let (status, code) = match &e {
        AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        AppError::BadRequest(_) | AppError::Dataset(_) => (StatusCode::BAD_REQUEST, "bad_request"),
        AppError::Chart(_) => (StatusCode::BAD_GATEWAY, "invalid_model_output"),
        AppError::Llm(_) => (StatusCode::BAD_GATEWAY, "llm_error"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
    };
    if status.is_server_error() {
        warn!(channel_id = %state.channel_id, error = %e, "request failed");
    }
    (status, json_error(code, e)).into_response()
}

/// Run a model-backed call under the request timeout and serialize its result.
async fn timed<T, F>(state: &AxumState, fut: F) -> Response
where
    T: Serialize,
    F: Future<Output = Result<T, AppError>>,
{
    match tokio::time::timeout(state.request_timeout, fut).await {
        Ok(Ok(body)) => (StatusCode::OK, Json(body)).into_response(),
        Ok(Err(e)) => error_response(state, e),
        Err(_) => {
            warn!(channel_id = %state.channel_id, "request timed out");
            (StatusCode::GATEWAY_TIMEOUT, json_error("timeout", "LLM request timed out")).into_response()
        }
    }
}

fn require(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::BadRequest(format!("'{field}' must not be empty")));
    }
    Ok(())
}

// ── Handlers ──────────────────────────────────────────────────────────────────

/// GET /api/health
pub(super) async fn health(State(state): State<AxumState>) -> Response {
    let body = json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "llm_provider": state.comms.agents().provider_name(),
    });
    (StatusCode::OK, Json(body)).into_response()
}

/// POST /api/datasets (multipart upload); `request` also runs an analysis.
pub(super) async fn upload_dataset(State(state): State<AxumState>, mut multipart: Multipart) -> Response {
    let mut file: Option<Vec<u8>> = None;
    let mut request: Option<String> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return (StatusCode::BAD_REQUEST, json_error("bad_request", e)).into_response(),
        };
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("file") => match field.bytes().await {
                Ok(bytes) => file = Some(bytes.to_vec()),
                Err(e) => return (StatusCode::BAD_REQUEST, json_error("bad_request", e)).into_response(),
            },
            Some("request") => match field.text().await {
                Ok(text) => request = Some(text).filter(|t| !t.trim().is_empty()),
                Err(e) => return (StatusCode::BAD_REQUEST, json_error("bad_request", e)).into_response(),
            },
            _ => {}
        }
    }

    let Some(bytes) = file else {
        return (StatusCode::BAD_REQUEST, json_error("bad_request", "missing multipart field 'file'")).into_response();
    };

    let dataset = match state.comms.import_dataset(&state.channel_id, &bytes) {
        Ok(summary) => summary,
        Err(e) => return error_response(&state, e),
    };

    let Some(request) = request else {
        return (StatusCode::OK, Json(UploadResponse { dataset, analysis: None })).into_response();
    };

    let comms = state.comms.clone();
    timed(&state, async move {
        let analysis = comms.analyze(&dataset.dataset_id, &request).await?;
        Ok(UploadResponse { dataset, analysis: Some(analysis) })
    })
    .await
}

/// GET /api/datasets/{id}
pub(super) async fn dataset(State(state): State<AxumState>, Path(id): Path<String>) -> Response {
    match state.comms.dataset_summary(&id) {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(e) => error_response(&state, e),
    }
}

/// POST /api/analyze
pub(super) async fn analyze(State(state): State<AxumState>, Json(req): Json<DatasetRequest>) -> Response {
    let comms = state.comms.clone();
    timed(&state, async move {
        require("request", &req.request)?;
        comms.analyze(&req.dataset_id, &req.request).await
    })
    .await
}

/// POST /api/visualize
pub(super) async fn visualize(State(state): State<AxumState>, Json(req): Json<DatasetRequest>) -> Response {
    let comms = state.comms.clone();
    timed(&state, async move {
        require("request", &req.request)?;
        let chart = comms.visualize(&req.dataset_id, &req.request).await?;
        let url = format!("/api/visualizations/{}", chart.artifact.id);
        let mut body = serde_json::to_value(&chart).map_err(|e| AppError::Comms(e.to_string()))?;
        body["url"] = json!(url);
        Ok(body)
    })
    .await
}

/// POST /api/report
pub(super) async fn report(State(state): State<AxumState>, Json(req): Json<ReportBody>) -> Response {
    let comms = state.comms.clone();
    timed(&state, async move {
        require("request", &req.request)?;
        let dataset_id = req.dataset_id.as_deref().map(str::trim).filter(|id| !id.is_empty());
        let request = ReportRequest { request: req.request.clone(), title: req.title, analysis: None, chart_ids: req.chart_ids };
        let report = comms.report(dataset_id, request).await?;
        let url = format!("/api/reports/{}", report.artifact.id);
        let mut body = serde_json::to_value(&report).map_err(|e| AppError::Comms(e.to_string()))?;
        body["url"] = json!(url);
        Ok(body)
    })
    .await
}

/// POST /api/message, intent-routed. Always 200 unless the call times out;
/// failures are reported in the body with `ok: false`.
pub(super) async fn message(State(state): State<AxumState>, Json(req): Json<MessageRequest>) -> Response {
    let comms = state.comms.clone();
    let channel_id = state.channel_id.clone();
    timed(&state, async move {
        let request = AgentRequest { text: req.message, dataset_id: req.dataset_id, title: req.title };
        Ok(comms.send_message(&channel_id, request).await)
    })
    .await
}

/// GET /api/visualizations/{id}
pub(super) async fn chart_svg(State(state): State<AxumState>, Path(id): Path<String>) -> Response {
    match state.comms.chart_svg(&id) {
        Ok(svg) => (StatusCode::OK, [(header::CONTENT_TYPE, "image/svg+xml")], svg).into_response(),
        Err(e) => error_response(&state, e),
    }
}

/// GET /api/reports/{id}
pub(super) async fn report_pdf(State(state): State<AxumState>, Path(id): Path<String>) -> Response {
    match state.comms.report_pdf(&id) {
        Ok(pdf) => {
            let disposition = format!("attachment; filename=\"{id}.pdf\"");
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "application/pdf".to_string()), (header::CONTENT_DISPOSITION, disposition)],
                pdf,
            )
                .into_response()
        }
        Err(e) => error_response(&state, e),
    }
}
