use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    #[serde(alias = "assistant")]
    Interviewer,
    #[serde(alias = "user")]
    Candidate,
}

impl Speaker {
    pub fn as_str(&self) -> &'static str {
        match self {
            Speaker::Interviewer => "interviewer",
            Speaker::Candidate => "candidate",
        }
    }

    fn transcript_label(&self) -> &'static str {
        match self {
            Speaker::Interviewer => "Interviewer",
            Speaker::Candidate => "Candidate",
        }
    }
}

/// One message of an interview. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    #[serde(rename = "role")]
    pub speaker: Speaker,
    pub message: String,
    #[serde(rename = "timestamp")]
    pub created_at: DateTime<Utc>,
}

impl Turn {
    pub fn new(speaker: Speaker, message: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            speaker,
            message: message.into(),
            created_at,
        }
    }
}

/// Ordered, append-only sequence of turns owned by one interview.
///
/// The log is mutable only until [`ConversationLog::freeze`] is called;
/// afterwards appends are refused. The frozen flag is runtime-only state and
/// is not persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Turn>", into = "Vec<Turn>")]
pub struct ConversationLog {
    turns: Vec<Turn>,
    frozen: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogFrozen;

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, turn: Turn) -> Result<(), LogFrozen> {
        if self.frozen {
            return Err(LogFrozen);
        }
        self.turns.push(turn);
        Ok(())
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn candidate_turns(&self) -> usize {
        self.turns
            .iter()
            .filter(|turn| turn.speaker == Speaker::Candidate)
            .count()
    }

    /// Plain-text transcript, one `Speaker: message` line per turn.
    pub fn transcript(&self) -> String {
        self.turns
            .iter()
            .map(|turn| format!("{}: {}", turn.speaker.transcript_label(), turn.message))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl From<Vec<Turn>> for ConversationLog {
    fn from(turns: Vec<Turn>) -> Self {
        Self {
            turns,
            frozen: false,
        }
    }
}

impl From<ConversationLog> for Vec<Turn> {
    fn from(log: ConversationLog) -> Self {
        log.turns
    }
}
