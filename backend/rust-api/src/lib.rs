use axum::{
    http::{header, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use services::AppState;

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .allow_origin(tower_http::cors::Any);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_handler))
        .route("/api/v1/questions", get(handlers::questions::list_questions))
        .route(
            "/api/v1/interviews",
            post(handlers::interviews::create_interview),
        )
        .nest("/api/v1/interviews", interview_routes())
        .route(
            "/api/v1/sessions/{id}",
            get(handlers::sessions::get_session),
        )
        .nest("/api/v1/users", user_routes())
        .with_state(app_state)
        .layer(cors)
        .layer(middleware::from_fn(
            middlewares::trace::trace_context_middleware,
        ))
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}

fn interview_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/{id}", get(handlers::interviews::get_interview))
        .route("/{id}/start", post(handlers::interviews::start_interview))
        .route("/{id}/turns", post(handlers::interviews::submit_turn))
        .route("/{id}/end", post(handlers::interviews::end_interview))
        .route("/{id}/stream", get(handlers::sse::interview_stream))
}

fn user_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/{user_id}/sessions",
            get(handlers::sessions::list_user_sessions),
        )
        .route("/{user_id}/stats", get(handlers::stats::get_user_stats))
        .route("/{user_id}/calendar", get(handlers::stats::get_calendar))
}
