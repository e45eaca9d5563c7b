//! Facade route tests over in-memory backends.

use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use herald_bus::{MemoryBus, WorkerConfig};
use herald_common::RetryStrategy;
use herald_http::router;
use herald_notify::MultiNotifier;
use herald_scheduler::Scheduler;
use herald_store::{CachedStore, MemoryCache, MemoryStore};
use serde_json::{Value, json};
use tower::ServiceExt;

fn test_router() -> Router {
    let store = Arc::new(CachedStore::new(
        Arc::new(MemoryStore::new()),
        Arc::new(MemoryCache::new(Duration::from_secs(60))),
    ));
    let bus = Arc::new(MemoryBus::new(WorkerConfig::default()));
    let notifier = Arc::new(MultiNotifier::new(None, None));
    let scheduler = Arc::new(Scheduler::new(
        store,
        bus,
        notifier,
        RetryStrategy::default(),
        Duration::from_secs(60),
    ));
    router(scheduler)
}

async fn send_json(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = match body {
        Some(body) => Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request"),
        None => Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .expect("request"),
    };

    let response = router.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, value)
}

fn create_body(send_at: &str) -> Value {
    json!({
        "user_id": "person@example.com",
        "channel": "email",
        "message": "hello",
        "send_at": send_at,
    })
}

#[tokio::test]
async fn create_returns_201_with_the_full_record() {
    let router = test_router();

    let (status, body) =
        send_json(&router, "POST", "/api/v1/notify", Some(create_body("2040-01-02T03:04:05Z"))).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user_id"], "person@example.com");
    assert_eq!(body["channel"], "email");
    assert_eq!(body["status"], "pending");
    assert_eq!(body["retries"], 0);
    assert!(body["id"].as_str().is_some());
}

#[tokio::test]
async fn create_rejects_past_send_at() {
    let router = test_router();

    let (status, body) =
        send_json(&router, "POST", "/api/v1/notify", Some(create_body("2001-01-01T00:00:00Z"))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "send_at must be in the future");
}

#[tokio::test]
async fn create_rejects_unknown_channels() {
    let router = test_router();
    let mut body = create_body("2040-01-02T03:04:05Z");
    body["channel"] = json!("sms");

    let (status, body) = send_json(&router, "POST", "/api/v1/notify", Some(body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(
        body["error"]
            .as_str()
            .expect("error message")
            .contains("unknown notification channel")
    );
}

#[tokio::test]
async fn create_rejects_malformed_timestamps() {
    let router = test_router();
    let mut body = create_body("2040-01-02T03:04:05Z");
    body["send_at"] = json!("next tuesday");

    let (status, _) = send_json(&router, "POST", "/api/v1/notify", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn status_cancel_round_trip() {
    let router = test_router();

    let (_, created) =
        send_json(&router, "POST", "/api/v1/notify", Some(create_body("2040-01-02T03:04:05Z"))).await;
    let id = created["id"].as_str().expect("id").to_string();

    let (status, body) = send_json(&router, "GET", &format!("/api/v1/notify/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id.as_str());
    assert_eq!(body["status"], "pending");

    let (status, body) = send_json(&router, "DELETE", &format!("/api/v1/notify/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "notification cancelled successfully");

    let (status, body) = send_json(&router, "GET", &format!("/api/v1/notify/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");

    // A second cancel is a conflict, not a repeatable success.
    let (status, _) = send_json(&router, "DELETE", &format!("/api/v1/notify/{id}"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_and_malformed_ids_are_404() {
    let router = test_router();

    let (status, _) = send_json(
        &router,
        "GET",
        "/api/v1/notify/9f3b1c2a-0000-4000-8000-000000000000",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send_json(&router, "GET", "/api/v1/notify/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn list_returns_newest_first() {
    let router = test_router();

    for minute in 1..=3 {
        let (status, _) = send_json(
            &router,
            "POST",
            "/api/v1/notify",
            Some(create_body(&format!("2040-01-02T03:{minute:02}:00Z"))),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = send_json(&router, "GET", "/api/v1/notifications", None).await;
    assert_eq!(status, StatusCode::OK);
    let records = body.as_array().expect("array body");
    assert_eq!(records.len(), 3);
    for record in records {
        assert_eq!(record["status"], "pending");
    }
}
