use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{QuestionStore, SessionStore, StatsStore};
use crate::error::{CoreError, CoreResult};
use crate::models::{Category, Question, SessionPatch, SessionRecord, UserStats};

/// Process-local store. Data lives for the lifetime of the process.
#[derive(Default)]
pub struct MemoryStore {
    questions: RwLock<Vec<Question>>,
    sessions: RwLock<HashMap<String, SessionRecord>>,
    stats: RwLock<HashMap<String, UserStats>>,
    unavailable: AtomicBool,
    session_updates: AtomicUsize,
    stats_upserts: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_questions(questions: Vec<Question>) -> Self {
        Self {
            questions: RwLock::new(questions),
            ..Self::default()
        }
    }

    /// Simulates an outage: every call fails with `StoreUnavailable` while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn session_updates(&self) -> usize {
        self.session_updates.load(Ordering::SeqCst)
    }

    pub fn stats_upserts(&self) -> usize {
        self.stats_upserts.load(Ordering::SeqCst)
    }

    /// Inserts a record as-is, e.g. history imported from elsewhere.
    pub async fn insert_session(&self, record: SessionRecord) {
        self.sessions.write().await.insert(record.id.clone(), record);
    }

    fn check_available(&self) -> CoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CoreError::StoreUnavailable(
                "memory store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl QuestionStore for MemoryStore {
    async fn list_questions(&self, category: Option<Category>) -> CoreResult<Vec<Question>> {
        self.check_available()?;
        let questions = self.questions.read().await;
        Ok(questions
            .iter()
            .filter(|q| category.map_or(true, |c| q.category == c))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create_session(
        &self,
        user_id: &str,
        question_id: &str,
        category: Category,
        created_date: DateTime<Utc>,
    ) -> CoreResult<SessionRecord> {
        self.check_available()?;
        let record = SessionRecord::new(
            Uuid::new_v4().to_string(),
            user_id,
            question_id,
            category,
            created_date,
        );
        self.sessions
            .write()
            .await
            .insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn update_session(&self, id: &str, patch: SessionPatch) -> CoreResult<()> {
        self.check_available()?;
        let mut sessions = self.sessions.write().await;
        let record = sessions
            .get_mut(id)
            .ok_or_else(|| CoreError::SessionNotFound(id.to_string()))?;
        record.apply(patch);
        self.session_updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get_session(&self, id: &str) -> CoreResult<Option<SessionRecord>> {
        self.check_available()?;
        Ok(self.sessions.read().await.get(id).cloned())
    }

    async fn list_completed_sessions(&self, user_id: &str) -> CoreResult<Vec<SessionRecord>> {
        self.check_available()?;
        let mut records: Vec<SessionRecord> = self
            .sessions
            .read()
            .await
            .values()
            .filter(|r| r.user_id == user_id && r.completed)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_date.cmp(&a.created_date));
        Ok(records)
    }

    async fn list_users_with_completed_sessions(&self) -> CoreResult<Vec<String>> {
        self.check_available()?;
        let mut users: Vec<String> = self
            .sessions
            .read()
            .await
            .values()
            .filter(|r| r.completed)
            .map(|r| r.user_id.clone())
            .collect();
        users.sort();
        users.dedup();
        Ok(users)
    }
}

#[async_trait]
impl StatsStore for MemoryStore {
    async fn upsert_user_stats(&self, user_id: &str, stats: &UserStats) -> CoreResult<bool> {
        self.check_available()?;
        let mut all = self.stats.write().await;
        if all
            .get(user_id)
            .is_some_and(|stored| stored.total_solved > stats.total_solved)
        {
            return Ok(false);
        }
        all.insert(user_id.to_string(), stats.clone());
        self.stats_upserts.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }

    async fn get_user_stats(&self, user_id: &str) -> CoreResult<Option<UserStats>> {
        self.check_available()?;
        Ok(self.stats.read().await.get(user_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Difficulty;

    fn question(id: &str, category: Category) -> Question {
        Question {
            id: id.to_string(),
            question_text: format!("question {}", id),
            category,
            difficulty: Difficulty::Beginner,
        }
    }

    #[tokio::test]
    async fn filters_questions_by_category() {
        let store = MemoryStore::with_questions(vec![
            question("a", Category::Design),
            question("b", Category::Rca),
        ]);

        let rca = store.list_questions(Some(Category::Rca)).await.unwrap();
        assert_eq!(rca.len(), 1);
        assert_eq!(rca[0].id, "b");
        assert_eq!(store.list_questions(None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn stats_from_shorter_history_do_not_overwrite() {
        let store = MemoryStore::new();
        let mut newer = UserStats::empty("u1");
        newer.total_solved = 3;
        let mut older = UserStats::empty("u1");
        older.total_solved = 2;

        assert!(store.upsert_user_stats("u1", &newer).await.unwrap());
        assert!(!store.upsert_user_stats("u1", &older).await.unwrap());
        assert_eq!(store.stats_upserts(), 1);

        let stored = store.get_user_stats("u1").await.unwrap().unwrap();
        assert_eq!(stored.total_solved, 3);

        // Same history, later day: streak decay still lands.
        newer.current_streak = 0;
        assert!(store.upsert_user_stats("u1", &newer).await.unwrap());
    }

    #[tokio::test]
    async fn unknown_session_update_is_not_found() {
        let store = MemoryStore::new();
        let record = store
            .create_session("u1", "q1", Category::Design, Utc::now())
            .await
            .unwrap();
        assert!(!record.completed);

        let completed = store.list_completed_sessions("u1").await.unwrap();
        assert!(completed.is_empty());

        let patch = SessionPatch::completion(
            Default::default(),
            1.0,
            crate::models::Evaluation {
                composite_score: 2.0,
                dimension_scores: Default::default(),
                feedback: Default::default(),
            },
            Utc::now().date_naive(),
        );
        assert!(matches!(
            store.update_session("missing", patch).await,
            Err(CoreError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn outage_fails_every_call() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        assert!(matches!(
            store.list_questions(None).await,
            Err(CoreError::StoreUnavailable(_))
        ));
        store.set_unavailable(false);
        assert!(store.list_questions(None).await.is_ok());
    }
}
