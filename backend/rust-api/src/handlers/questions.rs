use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use super::ApiError;
use crate::{
    models::{
        api::{QuestionListResponse, QuestionQuery},
        CategoryRequest,
    },
    services::AppState,
};

/// GET /api/v1/questions?category=design
///
/// A missing category or `random` lists the whole pool.
pub async fn list_questions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<QuestionQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let request = match query.category.as_deref() {
        None => CategoryRequest::Random,
        Some(raw) => raw.parse::<CategoryRequest>().map_err(ApiError::bad_request)?,
    };

    let questions = state
        .stores
        .questions
        .list_questions(request.category())
        .await?;
    let total = questions.len();

    Ok(Json(QuestionListResponse { questions, total }))
}
