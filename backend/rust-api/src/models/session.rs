use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{Category, ConversationLog, DimensionScores, Evaluation, Feedback};

/// Lifecycle of a live interview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Ready,
    Active,
    Finalizing,
    Completed,
    Aborted,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Ready => "ready",
            SessionState::Active => "active",
            SessionState::Finalizing => "finalizing",
            SessionState::Completed => "completed",
            SessionState::Aborted => "aborted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Aborted)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted unit of interview history.
///
/// `composite_score` and `dimension_scores` are present if and only if
/// `completed` is true.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub question_id: String,
    #[serde(alias = "question_type")]
    pub category: Category,
    #[serde(default)]
    pub conversation: ConversationLog,
    #[serde(default)]
    pub duration_minutes: Option<f64>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    pub created_date: DateTime<Utc>,
    #[serde(default)]
    pub composite_score: Option<f64>,
    #[serde(default)]
    pub dimension_scores: Option<DimensionScores>,
    #[serde(default)]
    pub feedback: Option<Feedback>,
}

impl SessionRecord {
    pub fn new(
        id: impl Into<String>,
        user_id: impl Into<String>,
        question_id: impl Into<String>,
        category: Category,
        created_date: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            question_id: question_id.into(),
            category,
            conversation: ConversationLog::new(),
            duration_minutes: None,
            completed: false,
            date: None,
            created_date,
            composite_score: None,
            dimension_scores: None,
            feedback: None,
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.completed == self.composite_score.is_some()
            && self.completed == self.dimension_scores.is_some()
    }

    pub fn apply(&mut self, patch: SessionPatch) {
        self.conversation = patch.conversation;
        self.duration_minutes = Some(patch.duration_minutes);
        self.composite_score = Some(patch.composite_score);
        self.dimension_scores = Some(patch.dimension_scores);
        self.feedback = Some(patch.feedback);
        self.completed = patch.completed;
        self.date = Some(patch.date);
    }
}

/// The single update applied to a session record at termination.
///
/// Only [`SessionPatch::completion`] builds one, so a record can never be
/// marked completed without a validated evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionPatch {
    pub conversation: ConversationLog,
    pub duration_minutes: f64,
    pub composite_score: f64,
    pub dimension_scores: DimensionScores,
    pub feedback: Feedback,
    pub completed: bool,
    pub date: NaiveDate,
}

impl SessionPatch {
    pub fn completion(
        conversation: ConversationLog,
        duration_minutes: f64,
        evaluation: Evaluation,
        date: NaiveDate,
    ) -> Self {
        Self {
            conversation,
            duration_minutes,
            composite_score: evaluation.composite_score,
            dimension_scores: evaluation.dimension_scores,
            feedback: evaluation.feedback,
            completed: true,
            date,
        }
    }
}
