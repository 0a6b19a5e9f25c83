use std::sync::Arc;

use crate::config::Config;
use crate::services::clock::ClockSource;
use crate::services::evaluation_service::EvaluationGateway;
use crate::services::interview_registry::InterviewRegistry;
use crate::services::interviewer::Interviewer;
use crate::services::llm::TextGenerator;
use crate::services::session_controller::SessionDeps;
use crate::services::stats_service::StatsService;
use crate::services::store::Stores;

pub struct AppState {
    pub config: Config,
    pub stores: Stores,
    pub registry: InterviewRegistry,
    pub stats: StatsService,
    pub clock: Arc<dyn ClockSource>,
}

impl AppState {
    pub fn new(
        config: Config,
        stores: Stores,
        generator: Arc<dyn TextGenerator>,
        clock: Arc<dyn ClockSource>,
    ) -> Self {
        let stats = StatsService::new(stores.sessions.clone(), stores.stats.clone(), clock.clone());

        let deps = SessionDeps {
            questions: stores.questions.clone(),
            sessions: stores.sessions.clone(),
            interviewer: Interviewer::new(generator.clone()),
            gateway: EvaluationGateway::new(generator),
            stats: stats.clone(),
            clock: clock.clone(),
            settings: config.interview.clone(),
        };

        tracing::info!(
            duration_seconds = config.interview.duration_seconds,
            backend = ?config.storage_backend,
            "Interview engine initialized"
        );

        Self {
            registry: InterviewRegistry::new(deps),
            config,
            stores,
            stats,
            clock,
        }
    }
}

pub mod clock;
pub mod countdown;
pub mod evaluation_service;
pub mod interview_registry;
pub mod interviewer;
pub mod llm;
pub mod question_seed;
pub mod session_controller;
pub mod stats_service;
pub mod stats_worker;
pub mod store;
