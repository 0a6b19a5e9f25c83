#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use axum::Router;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};

use mockinterview_api::{
    config::Config,
    create_router,
    models::{Category, Difficulty, Question, SessionRecord},
    services::{
        clock::{ClockSource, FixedClock},
        llm::{Generated, TextGenerator},
        store::{MemoryStore, SessionStore, Stores},
        AppState,
    },
    utils::time::CalendarZone,
};

/// Text generator with canned output.
///
/// Calls without a schema are interviewer turns, calls with one are
/// evaluations. An empty evaluation queue answers with a valid evaluation
/// built from the requested schema.
#[derive(Default)]
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<String>>,
    evaluations: Mutex<VecDeque<Generated>>,
    reply_calls: AtomicUsize,
    evaluation_calls: AtomicUsize,
    fail_replies: AtomicBool,
    fail_evaluations: AtomicBool,
    evaluation_delay: Mutex<Duration>,
}

impl ScriptedGenerator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_reply(&self, reply: &str) {
        self.replies.lock().unwrap().push_back(reply.to_string());
    }

    pub fn push_evaluation(&self, response: Generated) {
        self.evaluations.lock().unwrap().push_back(response);
    }

    pub fn fail_replies(&self, fail: bool) {
        self.fail_replies.store(fail, Ordering::SeqCst);
    }

    pub fn fail_evaluations(&self, fail: bool) {
        self.fail_evaluations.store(fail, Ordering::SeqCst);
    }

    pub fn delay_evaluations(&self, delay: Duration) {
        *self.evaluation_delay.lock().unwrap() = delay;
    }

    pub fn reply_calls(&self) -> usize {
        self.reply_calls.load(Ordering::SeqCst)
    }

    pub fn evaluation_calls(&self) -> usize {
        self.evaluation_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, _prompt: &str, schema: Option<&Value>) -> anyhow::Result<Generated> {
        match schema {
            None => {
                self.reply_calls.fetch_add(1, Ordering::SeqCst);
                if self.fail_replies.load(Ordering::SeqCst) {
                    return Err(anyhow!("scripted interviewer outage"));
                }
                let reply = self
                    .replies
                    .lock()
                    .unwrap()
                    .pop_front()
                    .unwrap_or_else(|| "Interesting. Who is the primary user here?".to_string());
                Ok(Generated::Text(reply))
            }
            Some(schema) => {
                self.evaluation_calls.fetch_add(1, Ordering::SeqCst);
                let delay = *self.evaluation_delay.lock().unwrap();
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                if self.fail_evaluations.load(Ordering::SeqCst) {
                    return Err(anyhow!("scripted grader outage"));
                }
                let scripted = self.evaluations.lock().unwrap().pop_front();
                Ok(scripted.unwrap_or_else(|| Generated::Json(valid_evaluation_for(schema, 6.0))))
            }
        }
    }
}

/// A valid evaluation for the rubric declared in `schema`, every criterion
/// scored `score`.
pub fn valid_evaluation_for(schema: &Value, score: f64) -> Value {
    let criteria = schema["properties"]["dimension_scores"]["required"]
        .as_array()
        .cloned()
        .unwrap_or_default();
    let dimensions: serde_json::Map<String, Value> = criteria
        .iter()
        .filter_map(|c| c.as_str())
        .map(|c| (c.to_string(), json!(score)))
        .collect();
    json!({
        "composite_score": score,
        "dimension_scores": dimensions,
        "what_worked_well": "Clear structure and a named target user.",
        "areas_to_improve": "Define success metrics before proposing features."
    })
}

pub fn question(id: &str, category: Category, text: &str) -> Question {
    Question {
        id: id.to_string(),
        question_text: text.to_string(),
        category,
        difficulty: Difficulty::Intermediate,
    }
}

pub fn test_questions() -> Vec<Question> {
    vec![
        question("q-design", Category::Design, "Design a smart fridge for a family of four."),
        question("q-rca", Category::Rca, "Checkout conversion dropped 12% last week. Why?"),
    ]
}

pub fn test_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap()
}

pub struct TestApp {
    pub state: Arc<AppState>,
    pub store: Arc<MemoryStore>,
    pub generator: Arc<ScriptedGenerator>,
    pub clock: Arc<FixedClock>,
}

impl TestApp {
    pub fn router(&self) -> Router {
        create_router(self.state.clone())
    }
}

pub fn test_config() -> Config {
    let mut config = Config::for_tests();
    config.interview.duration_seconds = 1800;
    config.interview.tick_interval_ms = 1000;
    config
}

/// Memory-backed application with a scripted generator and a fixed clock.
pub fn create_test_app(config: Config) -> TestApp {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let store = Arc::new(MemoryStore::with_questions(test_questions()));
    let generator = ScriptedGenerator::new();
    let clock = Arc::new(FixedClock::new(
        test_now(),
        CalendarZone::from_offset_minutes(Some(0)),
    ));

    let state = Arc::new(AppState::new(
        config,
        Stores::memory(store.clone()),
        generator.clone(),
        clock.clone() as Arc<dyn ClockSource>,
    ));

    TestApp {
        state,
        store,
        generator,
        clock,
    }
}

/// Persisted record of a session that must exist.
pub async fn session_record(app: &TestApp, session_id: &str) -> SessionRecord {
    app.store
        .get_session(session_id)
        .await
        .expect("store should be available")
        .expect("session record should exist")
}
