use thiserror::Error;

use crate::models::{Category, SessionState};

pub type CoreResult<T> = std::result::Result<T, CoreError>;

/// Failures of the interview engine. Every variant is scoped to a single
/// interview and reported to the caller, which decides whether to retry.
#[derive(Debug, Error)]
pub enum CoreError {
    /// No question exists for the requested category.
    #[error("no question available for category {}", .0.as_ref().map(Category::as_str).unwrap_or("random"))]
    QuestionUnavailable(Option<Category>),

    #[error("interview is not ready: {0}")]
    NotReady(String),

    #[error("message must not be empty")]
    EmptyInput,

    /// The session ended without a single candidate turn. It is aborted and
    /// never evaluated.
    #[error("no candidate input to evaluate")]
    InsufficientInput,

    /// The interviewer turn could not be generated. The candidate turn that
    /// triggered it stays in the log.
    #[error("interviewer turn generation failed: {0}")]
    GenerationFailure(String),

    /// The grading response did not satisfy the declared schema. The session
    /// stays in `Finalizing`.
    #[error("evaluation response violated its contract: {0}")]
    EvaluationContractViolation(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("interview no longer accepts turns (state: {0})")]
    SessionClosed(SessionState),

    #[error("session record not found: {0}")]
    SessionNotFound(String),

    #[error("interview not found: {0}")]
    InterviewNotFound(String),

    #[error("user {0} already has an interview in progress")]
    ActiveInterviewExists(String),
}

impl CoreError {
    pub fn store(err: impl std::fmt::Display) -> Self {
        CoreError::StoreUnavailable(err.to_string())
    }

    /// Stable machine-readable code used in API responses and metric labels.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::QuestionUnavailable(_) => "question_unavailable",
            CoreError::NotReady(_) => "not_ready",
            CoreError::EmptyInput => "empty_input",
            CoreError::InsufficientInput => "insufficient_input",
            CoreError::GenerationFailure(_) => "generation_failure",
            CoreError::EvaluationContractViolation(_) => "evaluation_contract_violation",
            CoreError::StoreUnavailable(_) => "store_unavailable",
            CoreError::SessionClosed(_) => "session_closed",
            CoreError::SessionNotFound(_) => "session_not_found",
            CoreError::InterviewNotFound(_) => "interview_not_found",
            CoreError::ActiveInterviewExists(_) => "active_interview_exists",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_unavailable_names_category() {
        let err = CoreError::QuestionUnavailable(Some(Category::Rca));
        assert_eq!(err.to_string(), "no question available for category rca");

        let err = CoreError::QuestionUnavailable(None);
        assert_eq!(err.to_string(), "no question available for category random");
    }

    #[test]
    fn codes_are_snake_case() {
        assert_eq!(CoreError::EmptyInput.code(), "empty_input");
        assert_eq!(
            CoreError::SessionClosed(SessionState::Completed).code(),
            "session_closed"
        );
    }
}
