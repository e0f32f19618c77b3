use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use crate::error::PipelineError;
use crate::feedback::{parse_label, FeedbackRecord};
use crate::history::{HistoryEntry, HistoryStore, NewHistoryEntry};
use crate::logging::anon_hash;
use crate::pipeline::{Evaluator, Prediction};
use crate::stats::{dashboard_stats, DashboardStats};
use crate::verdict::{Label, Verdict};

#[derive(Clone)]
pub struct AppState {
    pub evaluator: Evaluator,
    pub history: Arc<dyn HistoryStore>,
    /// Upper bound for `/history` listings.
    pub history_cap: usize,
    pub admin_routes: bool,
}

pub fn router(state: AppState) -> Router {
    let mut r = Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/evaluate", post(evaluate))
        .route("/api/predict", post(api_predict))
        .route("/feedback", post(submit_feedback))
        .route("/history", get(list_history).delete(clear_history))
        .route("/history/{id}", delete(delete_history))
        .route("/stats", get(stats));

    if state.admin_routes {
        r = r
            .route("/admin/queue", get(admin_queue))
            .route("/admin/verify", post(admin_verify))
            .route("/admin/feedback/{id}", delete(admin_delete_feedback));
    }

    r.layer(CorsLayer::very_permissive()).with_state(state)
}

/// JSON error body: `{"error": "...", "code": "SPAM-xxxx"}`.
pub struct ApiError(PipelineError);

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_input_error() {
            StatusCode::BAD_REQUEST
        } else {
            error!(target: "api", code = self.0.code(), error = %self.0, "request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        };
        let msg = match &self.0 {
            PipelineError::EmptyMessage => "No message provided".to_string(),
            other => other.to_string(),
        };
        (status, Json(json!({ "error": msg, "code": self.0.code() }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Deserialize)]
struct EvaluateReq {
    #[serde(default)]
    message: String,
    /// Channel the message arrived on ("SMS", "Email", ...).
    #[serde(default)]
    source: Option<String>,
}

#[derive(Serialize)]
struct EvaluateResp {
    #[serde(flatten)]
    verdict: Verdict,
    confidence_text: String,
    history_id: i64,
}

async fn evaluate(
    State(state): State<AppState>,
    Json(body): Json<EvaluateReq>,
) -> ApiResult<Json<EvaluateResp>> {
    let verdict = state.evaluator.evaluate(&body.message)?;
    let entry = state.history.append(NewHistoryEntry::from_verdict(
        &body.message,
        body.source.as_deref(),
        &verdict,
    ))?;
    info!(
        target: "api",
        id = %anon_hash(&body.message),
        label = %verdict.label,
        source = verdict.source.as_str(),
        "evaluated"
    );
    Ok(Json(EvaluateResp {
        confidence_text: verdict.confidence_text(),
        verdict,
        history_id: entry.id,
    }))
}

#[derive(Deserialize)]
struct PredictReq {
    #[serde(default)]
    message: String,
}

async fn api_predict(
    State(state): State<AppState>,
    Json(body): Json<PredictReq>,
) -> ApiResult<Json<Prediction>> {
    Ok(Json(state.evaluator.predict(&body.message)?))
}

#[derive(Deserialize)]
struct FeedbackReq {
    #[serde(default)]
    message: String,
    /// `"SPAM"` or `"NOT SPAM"`. Admin labels are not accepted here.
    #[serde(default, alias = "user_label")]
    label: String,
}

impl FeedbackReq {
    fn parts(&self) -> Result<(&str, Label), PipelineError> {
        if self.message.trim().is_empty() {
            return Err(PipelineError::EmptyMessage);
        }
        let label = parse_label(&self.label).ok_or_else(|| PipelineError::InvalidLabel {
            label: self.label.clone(),
        })?;
        Ok((self.message.as_str(), label))
    }
}

async fn submit_feedback(
    State(state): State<AppState>,
    Json(body): Json<FeedbackReq>,
) -> ApiResult<(StatusCode, Json<FeedbackRecord>)> {
    let (message, label) = body.parts()?;
    let rec = state.evaluator.feedback().record_feedback(message, label)?;
    counter!("spam_feedback_total", "provenance" => rec.provenance.as_str()).increment(1);
    info!(target: "api", id = %anon_hash(message), label = %label, "feedback recorded");
    Ok((StatusCode::CREATED, Json(rec)))
}

#[derive(Deserialize)]
struct HistoryQuery {
    limit: Option<usize>,
}

async fn list_history(
    State(state): State<AppState>,
    Query(q): Query<HistoryQuery>,
) -> ApiResult<Json<Vec<HistoryEntry>>> {
    let limit = q.limit.unwrap_or(state.history_cap).min(state.history_cap);
    Ok(Json(state.history.list(Some(limit))?))
}

async fn delete_history(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<StatusCode> {
    Ok(if state.history.delete(id)? {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    })
}

async fn clear_history(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    let removed = state.history.clear()?;
    warn!(target: "api", removed, "history cleared");
    Ok(Json(json!({ "removed": removed })))
}

async fn stats(State(state): State<AppState>) -> ApiResult<Json<DashboardStats>> {
    let rows = state.history.list(None)?;
    Ok(Json(dashboard_stats(&rows)))
}

async fn admin_queue(State(state): State<AppState>) -> ApiResult<Json<Vec<FeedbackRecord>>> {
    Ok(Json(state.evaluator.feedback().pending_feedback()?))
}

async fn admin_verify(
    State(state): State<AppState>,
    Json(body): Json<FeedbackReq>,
) -> ApiResult<Json<FeedbackRecord>> {
    let (message, label) = body.parts()?;
    let rec = state.evaluator.feedback().verify(message, label)?;
    counter!("spam_feedback_total", "provenance" => rec.provenance.as_str()).increment(1);
    info!(target: "api", id = %anon_hash(message), label = %label, "admin verified");
    Ok(Json(rec))
}

async fn admin_delete_feedback(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    Ok(if state.evaluator.feedback().delete_feedback(id)? {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    })
}
