use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use serial_test::serial;
use tower::ServiceExt;

mod common;

use common::{create_test_app, test_config};

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

async fn create_interview(app: &Router, user_id: &str, category: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/api/v1/interviews",
        Some(json!({ "user_id": user_id, "category": category })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "body {}", body);
    body["interview_id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_full_interview_flow() {
    let app = create_test_app(test_config());
    let router = app.router();

    let interview_id = create_interview(&router, "alice", "design").await;

    let (status, body) = send(&router, "GET", &format!("/api/v1/interviews/{}", interview_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "ready");
    assert_eq!(body["question"]["category"], "design");
    assert_eq!(body["question"]["_id"], "q-design");

    let (status, body) = send(
        &router,
        "POST",
        &format!("/api/v1/interviews/{}/start", interview_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "active");
    assert_eq!(body["remaining_seconds"], 1800);
    let session_id = body["session_id"].as_str().unwrap().to_string();

    app.generator.push_reply("Who is the primary user?");
    let (status, body) = send(
        &router,
        "POST",
        &format!("/api/v1/interviews/{}/turns", interview_id),
        Some(json!({ "message": "I'd start by clarifying the goal." })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reply"]["message"], "Who is the primary user?");
    assert_eq!(body["reply"]["role"], "interviewer");
    assert_eq!(body["interview"]["conversation"].as_array().unwrap().len(), 3);

    let (status, body) = send(
        &router,
        "POST",
        &format!("/api/v1/interviews/{}/end", interview_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "completed");
    assert_eq!(body["evaluation"]["composite_score"], 6.0);

    let (status, body) = send(&router, "GET", &format!("/api/v1/sessions/{}", session_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["completed"], true);
    assert_eq!(body["user_id"], "alice");
    assert_eq!(body["date"], "2024-03-15");

    let (status, body) = send(&router, "GET", "/api/v1/users/alice/sessions", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);

    let (status, body) = send(&router, "GET", "/api/v1/users/alice/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_solved"], 1);
    assert_eq!(body["current_streak"], 1);

    let (status, body) = send(
        &router,
        "GET",
        "/api/v1/users/alice/calendar?year=2024&month=3",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["active_days"], 1);
    assert_eq!(body["days"].as_array().unwrap().len(), 31);
    assert_eq!(body["days"][14]["count"], 1);
    assert_eq!(body["days"][14]["level"], 1);
}

#[tokio::test]
async fn test_calendar_defaults_to_current_month() {
    let app = create_test_app(test_config());
    let (status, body) = send(&app.router(), "GET", "/api/v1/users/nobody/calendar", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["year"], 2024);
    assert_eq!(body["month"], 3);
    assert_eq!(body["active_days"], 0);
}

#[tokio::test]
async fn test_calendar_rejects_invalid_month() {
    let app = create_test_app(test_config());
    let (status, body) = send(
        &app.router(),
        "GET",
        "/api/v1/users/alice/calendar?year=2024&month=13",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "bad_request");
}

#[tokio::test]
async fn test_stats_default_to_zero_for_new_user() {
    let app = create_test_app(test_config());
    let (status, body) = send(&app.router(), "GET", "/api/v1/users/newcomer/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_solved"], 0);
    assert_eq!(body["current_streak"], 0);
}

#[tokio::test]
async fn test_list_questions_by_category() {
    let app = create_test_app(test_config());
    let router = app.router();

    let (status, body) = send(&router, "GET", "/api/v1/questions?category=rca", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["questions"][0]["category"], "rca");

    let (_, body) = send(&router, "GET", "/api/v1/questions", None).await;
    assert_eq!(body["total"], 2);

    let (status, _) = send(&router, "GET", "/api/v1/questions?category=astrology", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_empty_message_is_rejected() {
    let app = create_test_app(test_config());
    let router = app.router();
    let interview_id = create_interview(&router, "alice", "random").await;
    send(
        &router,
        "POST",
        &format!("/api/v1/interviews/{}/start", interview_id),
        None,
    )
    .await;

    let (status, body) = send(
        &router,
        "POST",
        &format!("/api/v1/interviews/{}/turns", interview_id),
        Some(json!({ "message": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "empty_input");
}

#[tokio::test]
async fn test_turn_before_start_is_conflict() {
    let app = create_test_app(test_config());
    let router = app.router();
    let interview_id = create_interview(&router, "alice", "rca").await;

    let (status, body) = send(
        &router,
        "POST",
        &format!("/api/v1/interviews/{}/turns", interview_id),
        Some(json!({ "message": "hello" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "not_ready");
}

#[tokio::test]
async fn test_end_without_input_is_unprocessable() {
    let app = create_test_app(test_config());
    let router = app.router();
    let interview_id = create_interview(&router, "alice", "design").await;
    send(
        &router,
        "POST",
        &format!("/api/v1/interviews/{}/start", interview_id),
        None,
    )
    .await;

    let (status, body) = send(
        &router,
        "POST",
        &format!("/api/v1/interviews/{}/end", interview_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "insufficient_input");

    let (_, body) = send(&router, "GET", &format!("/api/v1/interviews/{}", interview_id), None).await;
    assert_eq!(body["state"], "aborted");
}

#[tokio::test]
async fn test_second_running_interview_is_conflict() {
    let app = create_test_app(test_config());
    let router = app.router();
    let interview_id = create_interview(&router, "alice", "design").await;
    send(
        &router,
        "POST",
        &format!("/api/v1/interviews/{}/start", interview_id),
        None,
    )
    .await;

    let (status, body) = send(
        &router,
        "POST",
        "/api/v1/interviews",
        Some(json!({ "user_id": "alice", "category": "rca" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "active_interview_exists");
}

#[tokio::test]
async fn test_create_interview_validation() {
    let app = create_test_app(test_config());
    let router = app.router();

    let (status, _) = send(
        &router,
        "POST",
        "/api/v1/interviews",
        Some(json!({ "user_id": "", "category": "design" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &router,
        "POST",
        "/api/v1/interviews",
        Some(json!({ "user_id": "alice", "category": "astrology" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "bad_request");

    // No guesstimate questions are loaded.
    let (status, body) = send(
        &router,
        "POST",
        "/api/v1/interviews",
        Some(json!({ "user_id": "alice", "category": "guesstimate" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "question_unavailable");
}

#[tokio::test]
async fn test_malformed_json_is_rejected() {
    let app = create_test_app(test_config());
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/interviews")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let response = app.router().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["code"], "invalid_json");
}

#[tokio::test]
async fn test_unknown_ids_are_not_found() {
    let app = create_test_app(test_config());
    let router = app.router();

    let (status, body) = send(&router, "GET", "/api/v1/interviews/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "interview_not_found");

    let (status, body) = send(&router, "GET", "/api/v1/sessions/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn test_store_outage_is_service_unavailable() {
    let app = create_test_app(test_config());
    app.store.set_unavailable(true);

    let (status, body) = send(&app.router(), "GET", "/api/v1/users/alice/stats", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "store_unavailable");

    let (status, body) = send(&app.router(), "GET", "/health", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "degraded");
}

#[tokio::test]
async fn test_health_reports_memory_backend() {
    let app = create_test_app(test_config());
    let (status, body) = send(&app.router(), "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["dependencies"]["store"]["backend"], "memory");
    assert_eq!(body["dependencies"]["store"]["questions"], 2);
}

#[tokio::test]
async fn test_responses_carry_trace_id() {
    let app = create_test_app(test_config());
    let request = Request::builder()
        .uri("/health")
        .header("x-trace-id", "trace-123")
        .body(Body::empty())
        .unwrap();

    let response = app.router().oneshot(request).await.unwrap();
    assert_eq!(response.headers()["x-trace-id"], "trace-123");
}

#[tokio::test]
#[serial]
async fn test_metrics_endpoint_exposes_interview_counters() {
    let app = create_test_app(test_config());
    let router = app.router();
    create_interview(&router, "metrics-user", "design").await;

    let response = router
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("interviews_total"));
    assert!(text.contains("http_requests_total"));
}
