//! Persistence contracts consumed by the interview engine.
//!
//! The engine only talks to these traits. [`MongoStore`] backs production
//! deployments, [`MemoryStore`] backs tests and the `memory` storage backend.

mod memory;
mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::CoreResult;
use crate::models::{Category, Question, SessionPatch, SessionRecord, UserStats};

#[async_trait]
pub trait QuestionStore: Send + Sync {
    /// All questions, or those of one category.
    async fn list_questions(&self, category: Option<Category>) -> CoreResult<Vec<Question>>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Creates an incomplete session record with no score fields.
    async fn create_session(
        &self,
        user_id: &str,
        question_id: &str,
        category: Category,
        created_date: DateTime<Utc>,
    ) -> CoreResult<SessionRecord>;

    async fn update_session(&self, id: &str, patch: SessionPatch) -> CoreResult<()>;

    async fn get_session(&self, id: &str) -> CoreResult<Option<SessionRecord>>;

    /// Completed sessions of a user, newest first.
    async fn list_completed_sessions(&self, user_id: &str) -> CoreResult<Vec<SessionRecord>>;

    async fn list_users_with_completed_sessions(&self) -> CoreResult<Vec<String>>;
}

#[async_trait]
pub trait StatsStore: Send + Sync {
    /// Replaces the stored stats of a user wholesale, unless the stored
    /// document was computed from a longer history. History only grows, so
    /// a smaller `total_solved` means `stats` came from an older read.
    ///
    /// Returns whether the write was applied.
    async fn upsert_user_stats(&self, user_id: &str, stats: &UserStats) -> CoreResult<bool>;

    async fn get_user_stats(&self, user_id: &str) -> CoreResult<Option<UserStats>>;
}

/// The three collaborators bundled for wiring.
#[derive(Clone)]
pub struct Stores {
    pub questions: Arc<dyn QuestionStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub stats: Arc<dyn StatsStore>,
}

impl Stores {
    pub fn memory(store: Arc<MemoryStore>) -> Self {
        Self {
            questions: store.clone(),
            sessions: store.clone(),
            stats: store,
        }
    }

    pub fn mongo(store: Arc<MongoStore>) -> Self {
        Self {
            questions: store.clone(),
            sessions: store.clone(),
            stats: store,
        }
    }
}
