//! Live interview state machine.
//!
//! `Idle -> Ready -> Active -> Finalizing -> Completed | Aborted`
//!
//! The state lives behind a mutex that is only held for short critical
//! sections, never across a text-generation or store call. Candidate
//! submissions are serialized by a separate turn lock. Finalization is a
//! single check-and-set out of `Active` plus an in-flight guard, so a
//! timeout racing an explicit end runs the evaluation exactly once.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::seq::IndexedRandom;
use serde::Serialize;
use tokio::sync::{broadcast, Mutex};

use crate::config::InterviewConfig;
use crate::error::{CoreError, CoreResult};
use crate::metrics::{CANDIDATE_TURNS_TOTAL, INTERVIEWS_TOTAL};
use crate::models::events::{
    FinalizationFailed, StateChanged, TimeExpired, TimerTick, TurnAppended,
};
use crate::models::{
    CategoryRequest, ConversationLog, Evaluation, Question, SessionEvent, SessionPatch,
    SessionState, Speaker, Turn,
};
use crate::services::clock::ClockSource;
use crate::services::countdown::{Countdown, CountdownHandle, CountdownObserver};
use crate::services::evaluation_service::EvaluationGateway;
use crate::services::interviewer::{opening_message, Interviewer};
use crate::services::stats_service::StatsService;
use crate::services::store::{QuestionStore, SessionStore};

const EVENT_BUFFER: usize = 64;

/// Collaborators shared by every interview.
#[derive(Clone)]
pub struct SessionDeps {
    pub questions: Arc<dyn QuestionStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub interviewer: Interviewer,
    pub gateway: EvaluationGateway,
    pub stats: StatsService,
    pub clock: Arc<dyn ClockSource>,
    pub settings: InterviewConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeTrigger {
    Explicit,
    Timeout,
}

impl FinalizeTrigger {
    fn as_str(&self) -> &'static str {
        match self {
            FinalizeTrigger::Explicit => "explicit",
            FinalizeTrigger::Timeout => "timeout",
        }
    }
}

/// Result of a finalization trigger.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FinalizeOutcome {
    Completed { evaluation: Evaluation },
    /// Another trigger is already evaluating this interview.
    InProgress,
    Aborted,
}

/// Why the last finalization attempt stopped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinalizationError {
    pub code: String,
    pub message: String,
}

impl From<&CoreError> for FinalizationError {
    fn from(error: &CoreError) -> Self {
        Self {
            code: error.code().to_string(),
            message: error.to_string(),
        }
    }
}

/// Point-in-time view of an interview.
#[derive(Debug, Clone, Serialize)]
pub struct InterviewSnapshot {
    pub interview_id: String,
    pub user_id: String,
    pub state: SessionState,
    pub question: Option<Question>,
    pub session_id: Option<String>,
    pub conversation: Vec<Turn>,
    pub total_seconds: u64,
    pub elapsed_seconds: u64,
    pub remaining_seconds: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<Evaluation>,
    pub evaluation_in_flight: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<FinalizationError>,
}

struct Machine {
    state: SessionState,
    question: Option<Question>,
    session_id: Option<String>,
    log: ConversationLog,
    started_at: Option<DateTime<Utc>>,
    elapsed_seconds: u64,
    countdown: Option<CountdownHandle>,
    evaluation: Option<Evaluation>,
    record_persisted: bool,
    evaluation_in_flight: bool,
    last_error: Option<FinalizationError>,
    finished_at: Option<DateTime<Utc>>,
}

impl Machine {
    fn new() -> Self {
        Self {
            state: SessionState::Idle,
            question: None,
            session_id: None,
            log: ConversationLog::new(),
            started_at: None,
            elapsed_seconds: 0,
            countdown: None,
            evaluation: None,
            record_persisted: false,
            evaluation_in_flight: false,
            last_error: None,
            finished_at: None,
        }
    }
}

/// Everything the finalization pipeline needs, copied out of the machine.
struct FinalizeJob {
    question: Question,
    session_id: String,
    log: ConversationLog,
    elapsed_seconds: u64,
    cached: Option<Evaluation>,
    record_persisted: bool,
}

struct Inner {
    interview_id: String,
    user_id: String,
    deps: SessionDeps,
    machine: Mutex<Machine>,
    turn_lock: Mutex<()>,
    events: broadcast::Sender<SessionEvent>,
}

/// Cloneable handle to one live interview.
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("interview_id", &self.inner.interview_id)
            .field("user_id", &self.inner.user_id)
            .finish_non_exhaustive()
    }
}

impl SessionController {
    pub fn new(interview_id: impl Into<String>, user_id: impl Into<String>, deps: SessionDeps) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            inner: Arc::new(Inner {
                interview_id: interview_id.into(),
                user_id: user_id.into(),
                deps,
                machine: Mutex::new(Machine::new()),
                turn_lock: Mutex::new(()),
                events,
            }),
        }
    }

    pub fn interview_id(&self) -> &str {
        &self.inner.interview_id
    }

    pub fn user_id(&self) -> &str {
        &self.inner.user_id
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    pub async fn state(&self) -> SessionState {
        self.inner.machine.lock().await.state
    }

    /// When the interview reached a terminal state, if it has.
    pub async fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.inner.machine.lock().await.finished_at
    }

    pub async fn snapshot(&self) -> InterviewSnapshot {
        let total = self.inner.deps.settings.duration_seconds;
        let machine = self.inner.machine.lock().await;
        InterviewSnapshot {
            interview_id: self.inner.interview_id.clone(),
            user_id: self.inner.user_id.clone(),
            state: machine.state,
            question: machine.question.clone(),
            session_id: machine.session_id.clone(),
            conversation: machine.log.turns().to_vec(),
            total_seconds: total,
            elapsed_seconds: machine.elapsed_seconds,
            remaining_seconds: total.saturating_sub(machine.elapsed_seconds),
            evaluation: machine.evaluation.clone(),
            evaluation_in_flight: machine.evaluation_in_flight,
            last_error: machine.last_error.clone(),
        }
    }

    /// Finalizing with nothing in flight after a failed attempt. Only an
    /// explicit `end` moves it further.
    pub async fn is_stalled(&self) -> bool {
        let machine = self.inner.machine.lock().await;
        machine.state == SessionState::Finalizing
            && !machine.evaluation_in_flight
            && machine.last_error.is_some()
    }

    /// `Idle|Ready -> Ready`: loads a question of the requested category, or
    /// one picked uniformly from the whole pool.
    pub async fn load_question(&self, request: CategoryRequest) -> CoreResult<Question> {
        let _turn = self.inner.turn_lock.lock().await;
        {
            let machine = self.inner.machine.lock().await;
            if !matches!(machine.state, SessionState::Idle | SessionState::Ready) {
                return Err(CoreError::NotReady(format!(
                    "question is locked once the interview is {}",
                    machine.state
                )));
            }
        }

        let category = request.category();
        let pool = self.inner.deps.questions.list_questions(category).await?;
        let question = pool
            .choose(&mut rand::rng())
            .cloned()
            .ok_or(CoreError::QuestionUnavailable(category))?;

        {
            let mut machine = self.inner.machine.lock().await;
            machine.question = Some(question.clone());
            machine.state = SessionState::Ready;
        }
        tracing::info!(
            interview_id = %self.inner.interview_id,
            question_id = %question.id,
            category = %question.category,
            "Question loaded"
        );
        self.emit_state(SessionState::Ready);
        Ok(question)
    }

    /// `Ready -> Active`: creates the session record, opens the log with the
    /// interviewer's introduction and starts the countdown.
    pub async fn start(&self) -> CoreResult<InterviewSnapshot> {
        let _turn = self.inner.turn_lock.lock().await;
        let question = {
            let machine = self.inner.machine.lock().await;
            match (&machine.state, &machine.question) {
                (SessionState::Ready, Some(question)) => question.clone(),
                (SessionState::Idle, _) | (SessionState::Ready, None) => {
                    return Err(CoreError::NotReady("no question loaded".to_string()))
                }
                (state, _) => {
                    return Err(CoreError::NotReady(format!("interview is already {}", state)))
                }
            }
        };

        let deps = &self.inner.deps;
        let now = deps.clock.now();
        let record = deps
            .sessions
            .create_session(&self.inner.user_id, &question.id, question.category, now)
            .await?;

        let opening = Turn::new(
            Speaker::Interviewer,
            opening_message(&question, deps.settings.duration_seconds),
            now,
        );
        let countdown = Countdown::new(deps.settings.duration_seconds, deps.settings.tick_interval());

        {
            let mut machine = self.inner.machine.lock().await;
            machine.log = ConversationLog::from(vec![opening]);
            machine.session_id = Some(record.id.clone());
            machine.started_at = Some(now);
            machine.elapsed_seconds = 0;
            machine.state = SessionState::Active;
            machine.countdown = Some(countdown.spawn(Arc::new(self.clone())));
        }

        INTERVIEWS_TOTAL.with_label_values(&["started"]).inc();
        tracing::info!(
            interview_id = %self.inner.interview_id,
            session_id = %record.id,
            user_id = %self.inner.user_id,
            "Interview started"
        );
        self.emit_state(SessionState::Active);
        self.emit_turn(Speaker::Interviewer, 0);
        Ok(self.snapshot().await)
    }

    /// `Active -> Active`: appends the candidate turn, then the generated
    /// interviewer reply.
    ///
    /// On `GenerationFailure` the candidate turn stays in the log. A reply
    /// that arrives after the interview left `Active` is discarded.
    pub async fn submit_candidate_turn(&self, text: &str) -> CoreResult<Turn> {
        let _turn = self.inner.turn_lock.lock().await;
        let deps = &self.inner.deps;

        let (question, log, index) = {
            let mut machine = self.inner.machine.lock().await;
            match machine.state {
                SessionState::Active => {}
                SessionState::Idle | SessionState::Ready => {
                    return Err(CoreError::NotReady("interview has not started".to_string()))
                }
                state => return Err(CoreError::SessionClosed(state)),
            }
            if text.trim().is_empty() {
                return Err(CoreError::EmptyInput);
            }
            let question = machine
                .question
                .clone()
                .ok_or_else(|| CoreError::NotReady("no question loaded".to_string()))?;

            machine
                .log
                .append(Turn::new(Speaker::Candidate, text, deps.clock.now()))
                .map_err(|_| CoreError::SessionClosed(machine.state))?;
            (question, machine.log.clone(), machine.log.len() - 1)
        };
        CANDIDATE_TURNS_TOTAL.inc();
        self.emit_turn(Speaker::Candidate, index);

        let reply = match deps.interviewer.next_turn(&question, &log).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(
                    interview_id = %self.inner.interview_id,
                    "Interviewer turn failed, candidate turn kept: {}",
                    e
                );
                return Err(e);
            }
        };

        let (turn, index) = {
            let mut machine = self.inner.machine.lock().await;
            if machine.state != SessionState::Active {
                tracing::info!(
                    interview_id = %self.inner.interview_id,
                    state = %machine.state,
                    "Discarding interviewer reply for closed interview"
                );
                return Err(CoreError::SessionClosed(machine.state));
            }
            let turn = Turn::new(Speaker::Interviewer, reply, deps.clock.now());
            machine
                .log
                .append(turn.clone())
                .map_err(|_| CoreError::SessionClosed(machine.state))?;
            (turn, machine.log.len() - 1)
        };
        self.emit_turn(Speaker::Interviewer, index);
        Ok(turn)
    }

    /// Explicit end. Safe to call repeatedly; also resumes a finalization
    /// that failed earlier.
    pub async fn end(&self) -> CoreResult<FinalizeOutcome> {
        self.finalize(FinalizeTrigger::Explicit).await
    }

    async fn finalize(&self, trigger: FinalizeTrigger) -> CoreResult<FinalizeOutcome> {
        let job = {
            let mut machine = self.inner.machine.lock().await;
            match machine.state {
                SessionState::Idle | SessionState::Ready => {
                    return Err(CoreError::NotReady("interview has not started".to_string()))
                }
                SessionState::Completed => {
                    return Ok(match machine.evaluation.clone() {
                        Some(evaluation) => FinalizeOutcome::Completed { evaluation },
                        None => FinalizeOutcome::InProgress,
                    })
                }
                SessionState::Aborted => return Ok(FinalizeOutcome::Aborted),
                SessionState::Finalizing if machine.evaluation_in_flight => {
                    return Ok(FinalizeOutcome::InProgress)
                }
                SessionState::Finalizing => {}
                SessionState::Active => {
                    machine.state = SessionState::Finalizing;
                    if let Some(countdown) = machine.countdown.take() {
                        countdown.cancel();
                    }
                    let elapsed = self.elapsed_seconds(&machine);
                    machine.elapsed_seconds = elapsed;
                    machine.log.freeze();
                    tracing::info!(
                        interview_id = %self.inner.interview_id,
                        trigger = trigger.as_str(),
                        elapsed_seconds = machine.elapsed_seconds,
                        "Interview finalizing"
                    );
                    self.emit_state(SessionState::Finalizing);
                }
            }

            if machine.log.candidate_turns() == 0 {
                machine.state = SessionState::Aborted;
                machine.finished_at = Some(self.inner.deps.clock.now());
                INTERVIEWS_TOTAL.with_label_values(&["aborted"]).inc();
                tracing::info!(
                    interview_id = %self.inner.interview_id,
                    "Interview aborted without candidate input"
                );
                self.emit_state(SessionState::Aborted);
                return Err(CoreError::InsufficientInput);
            }

            let (question, session_id) = match (&machine.question, &machine.session_id) {
                (Some(question), Some(session_id)) => (question.clone(), session_id.clone()),
                _ => return Err(CoreError::NotReady("interview has no session record".to_string())),
            };

            machine.evaluation_in_flight = true;
            machine.last_error = None;
            FinalizeJob {
                question,
                session_id,
                log: machine.log.clone(),
                elapsed_seconds: machine.elapsed_seconds,
                cached: machine.evaluation.clone(),
                record_persisted: machine.record_persisted,
            }
        };

        // Detached so a caller walking away cannot strand the in-flight guard.
        let controller = self.clone();
        tokio::spawn(async move { controller.run_finalization(job, trigger).await })
            .await
            .unwrap_or_else(|e| {
                Err(CoreError::GenerationFailure(format!(
                    "finalization task failed: {}",
                    e
                )))
            })
    }

    async fn run_finalization(
        &self,
        job: FinalizeJob,
        trigger: FinalizeTrigger,
    ) -> CoreResult<FinalizeOutcome> {
        let result = self.finalization_steps(job).await;

        let mut machine = self.inner.machine.lock().await;
        machine.evaluation_in_flight = false;
        match result {
            Ok(evaluation) => {
                machine.state = SessionState::Completed;
                machine.finished_at = Some(self.inner.deps.clock.now());
                drop(machine);

                INTERVIEWS_TOTAL.with_label_values(&["completed"]).inc();
                tracing::info!(
                    interview_id = %self.inner.interview_id,
                    composite_score = evaluation.composite_score,
                    "Interview completed"
                );
                self.emit_state(SessionState::Completed);
                Ok(FinalizeOutcome::Completed { evaluation })
            }
            Err(e) => {
                let failure = FinalizationError::from(&e);
                machine.last_error = Some(failure.clone());
                drop(machine);

                tracing::warn!(
                    interview_id = %self.inner.interview_id,
                    trigger = trigger.as_str(),
                    code = e.code(),
                    "Finalization failed, interview stays finalizing: {}",
                    e
                );
                self.emit(SessionEvent::FinalizationFailed(FinalizationFailed {
                    interview_id: self.inner.interview_id.clone(),
                    code: failure.code,
                    message: failure.message,
                    timestamp: self.inner.deps.clock.now(),
                }));
                Err(e)
            }
        }
    }

    /// Evaluate, persist the record, recompute stats. Each completed step is
    /// recorded on the machine so a retry resumes at the failed one.
    async fn finalization_steps(&self, job: FinalizeJob) -> CoreResult<Evaluation> {
        let deps = &self.inner.deps;

        let evaluation = match job.cached {
            Some(evaluation) => evaluation,
            None => {
                let evaluation = deps.gateway.evaluate(&job.question, &job.log).await?;
                self.inner.machine.lock().await.evaluation = Some(evaluation.clone());
                evaluation
            }
        };

        if !job.record_persisted {
            let patch = SessionPatch::completion(
                job.log,
                job.elapsed_seconds as f64 / 60.0,
                evaluation.clone(),
                deps.clock.today(),
            );
            deps.sessions.update_session(&job.session_id, patch).await?;
            self.inner.machine.lock().await.record_persisted = true;
        }

        deps.stats.recompute(&self.inner.user_id).await?;
        Ok(evaluation)
    }

    fn elapsed_seconds(&self, machine: &Machine) -> u64 {
        let total = self.inner.deps.settings.duration_seconds;
        let by_clock = machine
            .started_at
            .map(|started| (self.inner.deps.clock.now() - started).num_seconds().max(0) as u64)
            .unwrap_or(0);
        machine.elapsed_seconds.max(by_clock).min(total)
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }

    fn emit_state(&self, state: SessionState) {
        self.emit(SessionEvent::StateChanged(StateChanged {
            interview_id: self.inner.interview_id.clone(),
            state,
            timestamp: self.inner.deps.clock.now(),
        }));
    }

    fn emit_turn(&self, speaker: Speaker, turn_index: usize) {
        self.emit(SessionEvent::TurnAppended(TurnAppended {
            interview_id: self.inner.interview_id.clone(),
            speaker,
            turn_index,
            timestamp: self.inner.deps.clock.now(),
        }));
    }
}

#[async_trait]
impl CountdownObserver for SessionController {
    async fn tick(&self, elapsed_seconds: u64, remaining_seconds: u64) -> bool {
        {
            let mut machine = self.inner.machine.lock().await;
            if machine.state != SessionState::Active {
                return false;
            }
            machine.elapsed_seconds = elapsed_seconds;
        }
        self.emit(SessionEvent::TimerTick(TimerTick {
            interview_id: self.inner.interview_id.clone(),
            remaining_seconds: remaining_seconds as u32,
            elapsed_seconds: elapsed_seconds as u32,
            total_seconds: self.inner.deps.settings.duration_seconds as u32,
            timestamp: self.inner.deps.clock.now(),
        }));
        true
    }

    async fn expired(&self) {
        // An explicit end may have won the race since the last tick.
        if self.state().await != SessionState::Active {
            return;
        }
        self.emit(SessionEvent::TimeExpired(TimeExpired {
            interview_id: self.inner.interview_id.clone(),
            timestamp: self.inner.deps.clock.now(),
        }));
        if let Err(e) = self.finalize(FinalizeTrigger::Timeout).await {
            tracing::warn!(
                interview_id = %self.inner.interview_id,
                code = e.code(),
                "Timed-out interview did not complete: {}",
                e
            );
        }
    }
}
