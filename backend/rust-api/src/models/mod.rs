use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub mod api;
pub mod conversation;
pub mod evaluation;
pub mod events;
pub mod session;
pub mod stats;

pub use conversation::{ConversationLog, Speaker, Turn};
pub use evaluation::{DimensionScores, Evaluation, Feedback, Rubric};
pub use events::SessionEvent;
pub use session::{SessionPatch, SessionRecord, SessionState};
pub use stats::{ActivityCalendar, ActivityDay, CalendarDay, UserStats};

/// Closed set of interview question categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Design,
    Improvement,
    Rca,
    Guesstimate,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Design,
        Category::Improvement,
        Category::Rca,
        Category::Guesstimate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Design => "design",
            Category::Improvement => "improvement",
            Category::Rca => "rca",
            Category::Guesstimate => "guesstimate",
        }
    }

    /// Human readable label used in prompts.
    pub fn label(&self) -> &'static str {
        match self {
            Category::Design => "product design",
            Category::Improvement => "product improvement",
            Category::Rca => "root cause analysis",
            Category::Guesstimate => "guesstimate",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "design" => Ok(Category::Design),
            "improvement" => Ok(Category::Improvement),
            "rca" => Ok(Category::Rca),
            "guesstimate" => Ok(Category::Guesstimate),
            other => Err(format!("unknown category: {}", other)),
        }
    }
}

/// Category requested when loading a question: a specific one, or any
/// question from the full pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryRequest {
    Specific(Category),
    Random,
}

impl CategoryRequest {
    pub fn category(&self) -> Option<Category> {
        match self {
            CategoryRequest::Specific(category) => Some(*category),
            CategoryRequest::Random => None,
        }
    }
}

impl FromStr for CategoryRequest {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.trim().eq_ignore_ascii_case("random") {
            return Ok(CategoryRequest::Random);
        }
        value.parse().map(CategoryRequest::Specific)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Beginner,
    #[default]
    Intermediate,
    Advanced,
}

/// Interview question. Created by seed data and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    #[serde(rename = "_id")]
    pub id: String,
    pub question_text: String,
    #[serde(alias = "type_label")]
    pub category: Category,
    #[serde(default)]
    pub difficulty: Difficulty,
}
