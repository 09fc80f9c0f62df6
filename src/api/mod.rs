//! HTTP interface
//!
//! Thin glue over the SessionManager: start a session, submit identifiers
//! (as a list or as raw pasted text), poll results, close, and clean up.
//! All engine errors map to JSON error responses via the error type.

use crate::app::AppContext;
use crate::error::{PricebatchError, Result};
use crate::parse;
use crate::session::Progress;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};

/// Build the API router
pub fn router(ctx: AppContext) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/sessions", post(start_session))
        .route("/api/sessions/{session_id}/identifiers", post(submit_identifiers))
        .route("/api/sessions/{session_id}/results", get(get_results))
        .route("/api/sessions/{session_id}/close", post(close_session))
        .route("/api/sessions/{session_id}", delete(remove_session))
        .with_state(ctx)
}

#[derive(Debug, Deserialize)]
pub struct StartSessionRequest {
    pub auth_token: String,
}

#[derive(Debug, Serialize)]
pub struct StartSessionResponse {
    pub session_id: String,
}

/// Identifiers may arrive as an explicit list or as raw pasted text
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    #[serde(default)]
    pub identifiers: Option<Vec<String>>,
    #[serde(default)]
    pub raw: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub chunk_ids: Vec<u64>,
    pub accepted: usize,
    pub duplicate_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contains_article_codes: Option<bool>,
}

async fn health(State(ctx): State<AppContext>) -> impl IntoResponse {
    if ctx.store.is_healthy() {
        (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "status": "degraded" })),
        )
    }
}

async fn start_session(
    State(ctx): State<AppContext>,
    Json(req): Json<StartSessionRequest>,
) -> Result<impl IntoResponse> {
    let session_id = ctx.sessions.create_session(&req.auth_token).await?;
    Ok((StatusCode::CREATED, Json(StartSessionResponse { session_id })))
}

async fn submit_identifiers(
    State(ctx): State<AppContext>,
    Path(session_id): Path<String>,
    Json(req): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>> {
    let (identifiers, contains_article_codes) = match (req.identifiers, req.raw) {
        (Some(identifiers), _) => (identifiers, None),
        (None, Some(raw)) => {
            let parsed = parse::parse_identifiers(&raw);
            (parsed.identifiers, Some(parsed.contains_article_codes))
        }
        (None, None) => {
            return Err(PricebatchError::bad_request(
                "provide either identifiers or raw",
            ));
        }
    };

    let receipt = ctx.sessions.submit(&session_id, identifiers).await?;

    Ok(Json(SubmitResponse {
        chunk_ids: receipt.chunk_ids,
        accepted: receipt.accepted,
        duplicate_count: receipt.duplicate_count,
        contains_article_codes,
    }))
}

async fn get_results(
    State(ctx): State<AppContext>,
    Path(session_id): Path<String>,
) -> Result<Json<Progress>> {
    let progress = ctx.sessions.progress(&session_id).await?;
    Ok(Json(progress))
}

async fn close_session(
    State(ctx): State<AppContext>,
    Path(session_id): Path<String>,
) -> Result<StatusCode> {
    ctx.sessions.close(&session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn remove_session(
    State(ctx): State<AppContext>,
    Path(session_id): Path<String>,
) -> StatusCode {
    ctx.sessions.remove(&session_id).await;
    StatusCode::NO_CONTENT
}
