use std::collections::HashMap;

use chrono::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::metrics::INTERVIEWS_TOTAL;
use crate::models::SessionState;
use crate::services::session_controller::{SessionController, SessionDeps};

/// Live interviews keyed by interview id.
///
/// At most one non-terminal interview exists per user. Terminal interviews
/// stay queryable for the retention window and are pruned afterwards.
pub struct InterviewRegistry {
    deps: SessionDeps,
    interviews: RwLock<HashMap<String, SessionController>>,
}

impl InterviewRegistry {
    pub fn new(deps: SessionDeps) -> Self {
        Self {
            deps,
            interviews: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a new `Idle` interview for `user_id`.
    ///
    /// A previous interview of the user that never started is replaced; one
    /// that is running or finalizing is a conflict.
    pub async fn create(&self, user_id: &str) -> CoreResult<SessionController> {
        self.prune().await;

        let mut interviews = self.interviews.write().await;
        let mut replaced = Vec::new();
        for (interview_id, controller) in interviews.iter() {
            if controller.user_id() != user_id {
                continue;
            }
            match controller.state().await {
                SessionState::Idle | SessionState::Ready => replaced.push(interview_id.clone()),
                SessionState::Finalizing if controller.is_stalled().await => {
                    tracing::info!(%interview_id, user_id, "Abandoning stalled interview");
                    replaced.push(interview_id.clone());
                }
                SessionState::Active | SessionState::Finalizing => {
                    return Err(CoreError::ActiveInterviewExists(user_id.to_string()))
                }
                SessionState::Completed | SessionState::Aborted => {}
            }
        }
        for interview_id in &replaced {
            interviews.remove(interview_id);
            tracing::debug!(%interview_id, user_id, "Replacing interview");
        }

        let interview_id = Uuid::new_v4().to_string();
        let controller = SessionController::new(interview_id.clone(), user_id, self.deps.clone());
        interviews.insert(interview_id.clone(), controller.clone());

        INTERVIEWS_TOTAL.with_label_values(&["created"]).inc();
        tracing::info!(%interview_id, user_id, "Interview created");
        Ok(controller)
    }

    pub async fn get(&self, interview_id: &str) -> CoreResult<SessionController> {
        self.interviews
            .read()
            .await
            .get(interview_id)
            .cloned()
            .ok_or_else(|| CoreError::InterviewNotFound(interview_id.to_string()))
    }

    /// Drops an interview that never started, e.g. when no question could be
    /// loaded for it.
    pub async fn discard(&self, interview_id: &str) {
        self.interviews.write().await.remove(interview_id);
    }

    /// Removes terminal interviews older than the retention window.
    /// Returns how many were removed.
    pub async fn prune(&self) -> usize {
        let retention = Duration::seconds(self.deps.settings.retention_seconds as i64);
        let now = self.deps.clock.now();

        let mut interviews = self.interviews.write().await;
        let mut expired = Vec::new();
        for (interview_id, controller) in interviews.iter() {
            if let Some(finished_at) = controller.finished_at().await {
                if now - finished_at >= retention {
                    expired.push(interview_id.clone());
                }
            }
        }
        for interview_id in &expired {
            interviews.remove(interview_id);
        }

        if !expired.is_empty() {
            tracing::debug!(count = expired.len(), "Pruned finished interviews");
        }
        expired.len()
    }

    pub async fn len(&self) -> usize {
        self.interviews.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.interviews.read().await.is_empty()
    }
}
