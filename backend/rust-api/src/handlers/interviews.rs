use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

use super::ApiError;
use crate::{
    extractors::AppJson,
    models::{
        api::{CreateInterviewRequest, SubmitTurnRequest},
        CategoryRequest,
    },
    services::AppState,
};

/// POST /api/v1/interviews
pub async fn create_interview(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<CreateInterviewRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;
    let request = match req.category.as_deref() {
        None => CategoryRequest::Random,
        Some(raw) => raw.parse::<CategoryRequest>().map_err(ApiError::bad_request)?,
    };
    tracing::info!(user_id = %req.user_id, ?request, "Creating interview");

    let controller = state.registry.create(&req.user_id).await?;
    if let Err(e) = controller.load_question(request).await {
        state.registry.discard(controller.interview_id()).await;
        return Err(e.into());
    }

    Ok((StatusCode::CREATED, Json(controller.snapshot().await)))
}

/// GET /api/v1/interviews/{id}
pub async fn get_interview(
    State(state): State<Arc<AppState>>,
    Path(interview_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let controller = state.registry.get(&interview_id).await?;
    Ok(Json(controller.snapshot().await))
}

/// POST /api/v1/interviews/{id}/start
pub async fn start_interview(
    State(state): State<Arc<AppState>>,
    Path(interview_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let controller = state.registry.get(&interview_id).await?;
    let snapshot = controller.start().await?;
    Ok(Json(snapshot))
}

/// POST /api/v1/interviews/{id}/turns
pub async fn submit_turn(
    State(state): State<Arc<AppState>>,
    Path(interview_id): Path<String>,
    AppJson(req): AppJson<SubmitTurnRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;
    let controller = state.registry.get(&interview_id).await?;

    let reply = controller.submit_candidate_turn(&req.message).await?;
    let snapshot = controller.snapshot().await;
    Ok(Json(json!({
        "reply": reply,
        "interview": snapshot,
    })))
}

/// POST /api/v1/interviews/{id}/end
///
/// Also used to retry a finalization that failed.
pub async fn end_interview(
    State(state): State<Arc<AppState>>,
    Path(interview_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let controller = state.registry.get(&interview_id).await?;
    tracing::info!(%interview_id, "Ending interview");

    let outcome = controller.end().await?;
    Ok(Json(outcome))
}
