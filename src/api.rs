//! HTTP entry points
//!
//! JSON and form submissions run through the same pipeline. Scoring and the
//! SQLite append are blocking, so evaluation runs on the blocking pool.

use crate::error::{DecisionError, LoggingError, ValidationError};
use crate::metrics::MetricsSnapshot;
use crate::pipeline::DecisionPipeline;
use crate::storage::SqliteDecisionLog;
use crate::types::decision::{Decision, StoredDecision};
use crate::types::transaction::TransactionInput;
use axum::extract::rejection::{FormRejection, JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tower_http::trace::TraceLayer;

const DEFAULT_RECENT_LIMIT: usize = 20;
const MAX_RECENT_LIMIT: usize = 200;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<DecisionPipeline>,
    pub store: Arc<SqliteDecisionLog>,
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Decision(#[from] DecisionError),

    #[error("bad query: {0}")]
    BadQuery(String),

    #[error("decision log: {0}")]
    Storage(#[from] LoggingError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Decision(DecisionError::Validation(e)) => {
                (StatusCode::BAD_REQUEST, e.to_string())
            }
            ApiError::BadQuery(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::Decision(DecisionError::Scoring(e)) => {
                tracing::error!("Scoring error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, format!("scoring failed: {}", e))
            }
            ApiError::Storage(e) => {
                tracing::error!("Storage error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "decision log unavailable".to_string(),
                )
            }
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/health", get(health))
        .route("/predict", post(predict))
        .route("/predict_form", post(predict_form))
        .route("/ui/predict", post(predict_form))
        .route("/decisions", get(recent_decisions))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn home() -> Json<serde_json::Value> {
    Json(json!({ "message": "Fraud Detection API is running!" }))
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    timestamp: i64,
    threshold: f64,
    metrics: MetricsSnapshot,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().timestamp(),
        threshold: state.pipeline.threshold().value(),
        metrics: state.pipeline.metrics().snapshot(),
    })
}

/// JSON endpoint for programmatic use
async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<TransactionInput>, JsonRejection>,
) -> ApiResult<Json<Decision>> {
    let input = match payload {
        Ok(Json(input)) => input,
        Err(rejection) => return Err(malformed(&state, rejection.body_text())),
    };
    evaluate(state, input).await
}

/// Form endpoint, same pipeline as `/predict`
async fn predict_form(
    State(state): State<AppState>,
    payload: Result<Form<TransactionInput>, FormRejection>,
) -> ApiResult<Json<Decision>> {
    let input = match payload {
        Ok(Form(input)) => input,
        Err(rejection) => return Err(malformed(&state, rejection.body_text())),
    };
    evaluate(state, input).await
}

fn malformed(state: &AppState, reason: String) -> ApiError {
    state.pipeline.metrics().record_validation_failure();
    ApiError::Decision(ValidationError::Malformed(reason).into())
}

async fn evaluate(state: AppState, input: TransactionInput) -> ApiResult<Json<Decision>> {
    let pipeline = state.pipeline.clone();
    let decision = tokio::task::spawn_blocking(move || pipeline.evaluate_input(input))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;
    Ok(Json(decision))
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    limit: Option<usize>,
}

async fn recent_decisions(
    State(state): State<AppState>,
    query: Result<Query<RecentQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<StoredDecision>>> {
    let Query(query) = query.map_err(|rejection| ApiError::BadQuery(rejection.body_text()))?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_RECENT_LIMIT)
        .clamp(1, MAX_RECENT_LIMIT);
    let store = state.store.clone();
    let rows = tokio::task::spawn_blocking(move || store.recent(limit))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;
    Ok(Json(rows))
}
