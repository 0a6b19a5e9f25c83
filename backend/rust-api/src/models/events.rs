use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{SessionState, Speaker};

/// Observable interview events, streamed to clients over SSE.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SessionEvent {
    TimerTick(TimerTick),
    TimeExpired(TimeExpired),
    StateChanged(StateChanged),
    TurnAppended(TurnAppended),
    FinalizationFailed(FinalizationFailed),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TimerTick {
    pub interview_id: String,
    pub remaining_seconds: u32,
    pub elapsed_seconds: u32,
    pub total_seconds: u32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TimeExpired {
    pub interview_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StateChanged {
    pub interview_id: String,
    pub state: SessionState,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TurnAppended {
    pub interview_id: String,
    pub speaker: Speaker,
    pub turn_index: usize,
    pub timestamp: DateTime<Utc>,
}

/// Finalization stopped at a failing step; the interview stays finalizing
/// until `end` is called again or the interview is abandoned.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct FinalizationFailed {
    pub interview_id: String,
    pub code: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl SessionEvent {
    pub fn to_sse_data(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            SessionEvent::TimerTick(_) => "timer-tick",
            SessionEvent::TimeExpired(_) => "time-expired",
            SessionEvent::StateChanged(_) => "state-changed",
            SessionEvent::TurnAppended(_) => "turn-appended",
            SessionEvent::FinalizationFailed(_) => "finalization-failed",
        }
    }

    /// Terminal state changes end the stream.
    pub fn is_final(&self) -> bool {
        matches!(self, SessionEvent::StateChanged(change) if change.state.is_terminal())
    }
}
