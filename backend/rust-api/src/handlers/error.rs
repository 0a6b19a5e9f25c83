use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::error::CoreError;

#[derive(Debug)]
pub enum ApiError {
    Core(CoreError),
    BadRequest(String),
    NotFound(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ApiError::Core(err)
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError::BadRequest(format!("Validation error: {}", err))
    }
}

pub fn status_for(err: &CoreError) -> StatusCode {
    match err {
        CoreError::EmptyInput => StatusCode::BAD_REQUEST,
        CoreError::QuestionUnavailable(_)
        | CoreError::InterviewNotFound(_)
        | CoreError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        CoreError::NotReady(_)
        | CoreError::SessionClosed(_)
        | CoreError::ActiveInterviewExists(_) => StatusCode::CONFLICT,
        CoreError::InsufficientInput => StatusCode::UNPROCESSABLE_ENTITY,
        CoreError::GenerationFailure(_) | CoreError::EvaluationContractViolation(_) => {
            StatusCode::BAD_GATEWAY
        }
        CoreError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::Core(err) => {
                let status = status_for(&err);
                if status.is_server_error() {
                    tracing::error!(code = err.code(), "{}", err);
                }
                (status, err.code(), err.to_string())
            }
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, "bad_request", message),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, "not_found", message),
        };
        let json_response = serde_json::json!({
            "message": message,
            "code": code,
        });
        (status, Json(json_response)).into_response()
    }
}
