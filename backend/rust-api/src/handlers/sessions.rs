use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use super::ApiError;
use crate::{models::api::SessionListResponse, services::AppState};

/// GET /api/v1/sessions/{id}
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let record = state
        .stores
        .sessions
        .get_session(&session_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("session {} not found", session_id)))?;

    Ok(Json(record))
}

/// GET /api/v1/users/{user_id}/sessions
///
/// Completed sessions only, newest first.
pub async fn list_user_sessions(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let sessions = state
        .stores
        .sessions
        .list_completed_sessions(&user_id)
        .await?;
    let total = sessions.len();

    Ok(Json(SessionListResponse { sessions, total }))
}
