// HTTP route handlers for the codejudge API

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use codejudge_common::types::{Problem, SubmissionOutcome, SubmitRequest};
use codejudge_engine::{metrics as engine_metrics, JudgeError};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

use crate::AppState;

/// GET /problems - every problem
pub async fn get_problems(State(state): State<Arc<AppState>>) -> Response {
    problems_response(state.gateway.get_all_problems().await)
}

/// GET /problems/:id - one problem
pub async fn get_problem(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    problem_response(&id, state.gateway.get_problem(&id).await)
}

/// POST /submit - compile and judge a submission synchronously
pub async fn submit(State(state): State<Arc<AppState>>, Json(payload): Json<SubmitRequest>) -> Response {
    info!(
        problem_id = %payload.problem_id,
        language = %payload.language,
        source_size = payload.code.len(),
        "Submission received"
    );
    submission_response(&payload.problem_id, state.executor.submit(&payload).await)
}

/// GET /status - health check
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /metrics - Prometheus scrape endpoint
pub async fn metrics() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        engine_metrics::render(),
    )
}

fn problems_response(result: Result<Vec<Problem>, JudgeError>) -> Response {
    match result {
        Ok(problems) => (
            StatusCode::OK,
            Json(json!({
                "status": "success",
                "problems": problems,
            })),
        )
            .into_response(),
        Err(JudgeError::NotFound(_)) => {
            (StatusCode::NOT_FOUND, Json(json!({ "error": "No Questions Found" }))).into_response()
        }
        Err(e) => {
            error!(error = %e, "Failed to list problems");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "Database Error" }))).into_response()
        }
    }
}

fn problem_response(id: &str, result: Result<Problem, JudgeError>) -> Response {
    match result {
        Ok(problem) => (StatusCode::OK, Json(problem)).into_response(),
        Err(JudgeError::NotFound(_)) => {
            (StatusCode::NOT_FOUND, Json(json!({ "error": "Problem not found" }))).into_response()
        }
        Err(e) => {
            error!(problem_id = %id, error = %e, "Failed to fetch problem");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "Database Error" }))).into_response()
        }
    }
}

fn submission_response(problem_id: &str, result: Result<SubmissionOutcome, JudgeError>) -> Response {
    match result {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(JudgeError::NotFound(_)) => {
            (StatusCode::NOT_FOUND, Json(json!({ "error": "Problem not found" }))).into_response()
        }
        Err(e) => {
            // Internal details stay in the server log
            error!(problem_id = %problem_id, error = %e, "Submission aborted");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "Internal Server Error" }))).into_response()
        }
    }
}
