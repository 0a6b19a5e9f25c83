use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use chrono::Datelike;
use std::sync::Arc;
use validator::Validate;

use super::ApiError;
use crate::{models::api::CalendarQuery, services::AppState};

/// GET /api/v1/users/{user_id}/stats
///
/// Users without completed sessions get zeroed stats rather than a 404.
pub async fn get_user_stats(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let stats = state.stats.get(&user_id).await?;
    Ok(Json(stats))
}

/// GET /api/v1/users/{user_id}/calendar?year=2024&month=3
pub async fn get_calendar(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(query): Query<CalendarQuery>,
) -> Result<impl IntoResponse, ApiError> {
    query.validate()?;
    let today = state.stats.today();
    let year = query.year.unwrap_or_else(|| today.year());
    let month = query.month.unwrap_or_else(|| today.month());

    let calendar = state
        .stats
        .calendar(&user_id, year, month)
        .await?
        .ok_or_else(|| ApiError::bad_request(format!("invalid month {}-{:02}", year, month)))?;

    Ok(Json(calendar))
}
