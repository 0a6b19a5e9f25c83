use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{Question, SessionRecord};

pub const MAX_MESSAGE_CHARS: u64 = 4000;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateInterviewRequest {
    #[validate(length(min = 1, max = 128, message = "user_id must be 1-128 characters"))]
    pub user_id: String,

    /// `design`, `improvement`, `rca`, `guesstimate` or `random`.
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitTurnRequest {
    #[validate(length(max = 4000, message = "message must be at most 4000 characters"))]
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct QuestionQuery {
    pub category: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CalendarQuery {
    #[validate(range(min = 1970, max = 9999, message = "year out of range"))]
    pub year: Option<i32>,
    #[validate(range(min = 1, max = 12, message = "month must be 1-12"))]
    pub month: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct QuestionListResponse {
    pub questions: Vec<Question>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionRecord>,
    pub total: usize,
}
