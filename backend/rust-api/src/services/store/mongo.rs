
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use futures::TryStreamExt;
use mongodb::bson::{self, doc, Bson, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::ReplaceOptions;
use mongodb::{Collection, Database};
use serde::Deserialize;
use uuid::Uuid;

use super::{QuestionStore, SessionStore, StatsStore};
use crate::error::{CoreError, CoreResult};
use crate::metrics::track_store_operation;
use crate::models::{
    Category, ConversationLog, DimensionScores, Feedback, Question, SessionPatch, SessionRecord,
    UserStats,
};
use crate::utils::retry::{retry_async_with_config, RetryConfig};
use crate::utils::time::{normalize_date_key, CalendarZone};

const QUESTIONS: &str = "questions";
const SESSIONS: &str = "interview_sessions";
const USER_STATS: &str = "user_stats";
const DUPLICATE_KEY_CODE: i32 = 11000;
const STORE_LABEL: &str = "mongo";

/// MongoDB-backed store for questions, session history and user stats.
#[derive(Clone)]
pub struct MongoStore {
    db: Database,
    zone: CalendarZone,
}

impl MongoStore {
    pub fn new(db: Database, zone: CalendarZone) -> Self {
        Self { db, zone }
    }

    fn questions(&self) -> Collection<Question> {
        self.db.collection(QUESTIONS)
    }

    fn sessions(&self) -> Collection<Document> {
        self.db.collection(SESSIONS)
    }

    fn user_stats(&self) -> Collection<UserStats> {
        self.db.collection(USER_STATS)
    }

    pub async fn count_questions(&self) -> CoreResult<u64> {
        track_store_operation("count_questions", STORE_LABEL, async {
            self.questions()
                .count_documents(doc! {})
                .await
                .context("Failed to count questions")
        })
        .await
        .map_err(CoreError::store)
    }

    pub async fn insert_questions(&self, questions: &[Question]) -> CoreResult<()> {
        if questions.is_empty() {
            return Ok(());
        }
        track_store_operation("insert_questions", STORE_LABEL, async {
            self.questions()
                .insert_many(questions)
                .await
                .map(|_| ())
                .context("Failed to insert questions")
        })
        .await
        .map_err(CoreError::store)
    }

    async fn read_session_documents(&self, filter: Document) -> anyhow::Result<Vec<Document>> {
        retry_async_with_config(RetryConfig::default(), || async {
            let cursor = self
                .sessions()
                .find(filter.clone())
                .sort(doc! { "created_date": -1 })
                .await?;
            cursor.try_collect::<Vec<Document>>().await
        })
        .await
        .context("Failed to query interview sessions")
    }

    fn decode_session(&self, document: Document) -> anyhow::Result<SessionRecord> {
        let raw: SessionDocument =
            bson::from_document(document).context("Failed to deserialize interview session")?;
        raw.into_record(self.zone)
    }
}

/// Stored shape of a session, tolerant of how older writers encoded dates.
#[derive(Debug, Deserialize)]
struct SessionDocument {
    #[serde(rename = "_id")]
    id: String,
    user_id: String,
    question_id: String,
    #[serde(alias = "question_type")]
    category: Category,
    #[serde(default)]
    conversation: ConversationLog,
    #[serde(default)]
    duration_minutes: Option<f64>,
    #[serde(default)]
    completed: bool,
    #[serde(default)]
    date: Option<Bson>,
    created_date: Bson,
    #[serde(default)]
    composite_score: Option<f64>,
    #[serde(default)]
    dimension_scores: Option<DimensionScores>,
    #[serde(default)]
    feedback: Option<Feedback>,
}

impl SessionDocument {
    fn into_record(self, zone: CalendarZone) -> anyhow::Result<SessionRecord> {
        let created_date = instant_from_bson(&self.created_date)
            .with_context(|| format!("Session {} has an unreadable created_date", self.id))?;
        let date = self
            .date
            .as_ref()
            .and_then(|value| date_key_from_bson(value, zone));

        Ok(SessionRecord {
            id: self.id,
            user_id: self.user_id,
            question_id: self.question_id,
            category: self.category,
            conversation: self.conversation,
            duration_minutes: self.duration_minutes,
            completed: self.completed,
            date,
            created_date,
            composite_score: self.composite_score,
            dimension_scores: self.dimension_scores,
            feedback: self.feedback,
        })
    }
}

fn is_duplicate_key(error: &mongodb::error::Error) -> bool {
    match error.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY_CODE,
        ErrorKind::Command(e) => e.code == DUPLICATE_KEY_CODE,
        _ => false,
    }
}

fn instant_from_bson(value: &Bson) -> Option<DateTime<Utc>> {
    match value {
        Bson::DateTime(dt) => DateTime::<Utc>::from_timestamp_millis(dt.timestamp_millis()),
        Bson::String(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
                    .ok()
                    .map(|naive| naive.and_utc())
            }),
        _ => None,
    }
}

fn date_key_from_bson(value: &Bson, zone: CalendarZone) -> Option<NaiveDate> {
    match value {
        Bson::String(raw) => normalize_date_key(raw, zone),
        Bson::DateTime(_) => instant_from_bson(value).map(|instant| zone.date_of(instant)),
        _ => None,
    }
}

#[async_trait]
impl QuestionStore for MongoStore {
    async fn list_questions(&self, category: Option<Category>) -> CoreResult<Vec<Question>> {
        let filter = match category {
            Some(category) => doc! {
                "$or": [
                    { "category": category.as_str() },
                    { "type_label": category.as_str() },
                ]
            },
            None => doc! {},
        };

        track_store_operation("list_questions", STORE_LABEL, async {
            retry_async_with_config(RetryConfig::default(), || async {
                let cursor = self.questions().find(filter.clone()).await?;
                cursor.try_collect::<Vec<Question>>().await
            })
            .await
            .context("Failed to query questions")
        })
        .await
        .map_err(CoreError::store)
    }
}

#[async_trait]
impl SessionStore for MongoStore {
    async fn create_session(
        &self,
        user_id: &str,
        question_id: &str,
        category: Category,
        created_date: DateTime<Utc>,
    ) -> CoreResult<SessionRecord> {
        let record = SessionRecord::new(
            Uuid::new_v4().to_string(),
            user_id,
            question_id,
            category,
            created_date,
        );

        track_store_operation("create_session", STORE_LABEL, async {
            let document =
                bson::to_document(&record).context("Failed to serialize interview session")?;
            self.sessions()
                .insert_one(document)
                .await
                .context("Failed to insert interview session")?;
            Ok(())
        })
        .await
        .map_err(CoreError::store)?;

        tracing::debug!(session_id = %record.id, user_id, "Session record created");
        Ok(record)
    }

    async fn update_session(&self, id: &str, patch: SessionPatch) -> CoreResult<()> {
        let set = bson::to_document(&patch)
            .map_err(|e| CoreError::StoreUnavailable(format!("serialize session patch: {}", e)))?;

        let matched = track_store_operation("update_session", STORE_LABEL, async {
            retry_async_with_config(RetryConfig::default(), || async {
                self.sessions()
                    .update_one(doc! { "_id": id }, doc! { "$set": set.clone() })
                    .await
            })
            .await
            .map(|result| result.matched_count)
            .context("Failed to update interview session")
        })
        .await
        .map_err(CoreError::store)?;

        if matched == 0 {
            return Err(CoreError::SessionNotFound(id.to_string()));
        }
        Ok(())
    }

    async fn get_session(&self, id: &str) -> CoreResult<Option<SessionRecord>> {
        track_store_operation("get_session", STORE_LABEL, async {
            let found = retry_async_with_config(RetryConfig::default(), || async {
                self.sessions().find_one(doc! { "_id": id }).await
            })
            .await
            .context("Failed to fetch interview session")?;
            found.map(|document| self.decode_session(document)).transpose()
        })
        .await
        .map_err(CoreError::store)
    }

    async fn list_completed_sessions(&self, user_id: &str) -> CoreResult<Vec<SessionRecord>> {
        track_store_operation("list_completed_sessions", STORE_LABEL, async {
            let documents = self
                .read_session_documents(doc! { "user_id": user_id, "completed": true })
                .await?;

            let mut records = Vec::with_capacity(documents.len());
            for document in documents {
                match self.decode_session(document) {
                    Ok(record) => records.push(record),
                    Err(e) => tracing::warn!(user_id, "Skipping unreadable session: {:#}", e),
                }
            }
            Ok(records)
        })
        .await
        .map_err(CoreError::store)
    }

    async fn list_users_with_completed_sessions(&self) -> CoreResult<Vec<String>> {
        track_store_operation("list_users", STORE_LABEL, async {
            let values = retry_async_with_config(RetryConfig::default(), || async {
                self.sessions()
                    .distinct("user_id", doc! { "completed": true })
                    .await
            })
            .await
            .context("Failed to list users with completed sessions")?;

            let mut users: Vec<String> = values
                .into_iter()
                .filter_map(|value| match value {
                    Bson::String(user_id) => Some(user_id),
                    _ => None,
                })
                .collect();
            users.sort();
            Ok(users)
        })
        .await
        .map_err(CoreError::store)
    }
}

#[async_trait]
impl StatsStore for MongoStore {
    async fn upsert_user_stats(&self, user_id: &str, stats: &UserStats) -> CoreResult<bool> {
        // A stored document with a larger total fails the filter; the upsert
        // then collides on _id and the write is skipped.
        let filter = doc! {
            "_id": user_id,
            "total_solved": { "$lte": i64::from(stats.total_solved) },
        };

        track_store_operation("upsert_user_stats", STORE_LABEL, async {
            retry_async_with_config(RetryConfig::default(), || async {
                let outcome = self
                    .user_stats()
                    .replace_one(filter.clone(), stats)
                    .with_options(ReplaceOptions::builder().upsert(true).build())
                    .await;
                match outcome {
                    Ok(_) => Ok(true),
                    Err(e) if is_duplicate_key(&e) => Ok(false),
                    Err(e) => Err(e),
                }
            })
            .await
            .context("Failed to upsert user stats")
        })
        .await
        .map_err(CoreError::store)
    }

    async fn get_user_stats(&self, user_id: &str) -> CoreResult<Option<UserStats>> {
        track_store_operation("get_user_stats", STORE_LABEL, async {
            retry_async_with_config(RetryConfig::default(), || async {
                self.user_stats().find_one(doc! { "_id": user_id }).await
            })
            .await
            .context("Failed to fetch user stats")
        })
        .await
        .map_err(CoreError::store)
    }
}
