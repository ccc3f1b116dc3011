//! HTTP API integration tests
//!
//! Exercise the router through `tower::ServiceExt::oneshot` with in-memory
//! stores and fake registry/notifier implementations.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use stars_expiry_notifier::auth::{hash_api_key, ApiKeyStore, MemoryApiKeyStore};
use stars_expiry_notifier::error::AppError;
use stars_expiry_notifier::server::{create_app, AppState};

use common::{date, record, test_settings, Harness};

const API_KEY: &str = "test-api-key-0123456789";

async fn app(harness: &Harness) -> Router {
    let api_keys = Arc::new(MemoryApiKeyStore::new());
    api_keys
        .upsert_user("scheduler", &hash_api_key(API_KEY))
        .await
        .unwrap();

    create_app(AppState::new(test_settings(), harness.workflow(), api_keys))
}

fn request(method: Method, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("X-API-Key", API_KEY);
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn harness() -> Harness {
    Harness::new(vec![
        record(1, "R:1", date(2024, 1, 20)),
        record(2, "R:2", date(2024, 2, 5)),
    ])
}

#[tokio::test]
async fn test_health_needs_no_key() {
    let harness = harness();
    let app = app(&harness).await;

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_readiness_reports_checks() {
    let harness = harness();
    let app = app(&harness).await;

    let response = app
        .oneshot(Request::builder().uri("/health/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ready");
    assert_eq!(body["checks"]["notification_store"]["backend"], "memory");
}

#[tokio::test]
async fn test_missing_key_is_unauthorized() {
    let harness = harness();
    let app = app(&harness).await;

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/auths/notify-auth-expiry")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "API-Key");
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
    assert_eq!(harness.notifier.sent_count(), 0);
}

#[tokio::test]
async fn test_wrong_key_is_unauthorized() {
    let harness = harness();
    let app = app(&harness).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/auths/expiring")
                .header("X-API-Key", "not-the-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(harness.registry.fetch_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_root_requires_key_and_lists_endpoints() {
    let harness = harness();
    let app = app(&harness).await;

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.oneshot(request(Method::GET, "/", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["service"], "stars-expiry-notifier");
    assert!(body["endpoints"].as_array().unwrap().len() >= 6);
}

#[tokio::test]
async fn test_batch_with_empty_body_uses_defaults() {
    let harness = harness();
    let app = app(&harness).await;

    let response = app
        .oneshot(request(Method::POST, "/auths/notify-auth-expiry", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["sent"], 1);
    assert_eq!(body["failed"], 0);
    assert_eq!(body["skipped_duplicate"], 0);
    assert_eq!(body["summary"]["total_expiring_auths"], 1);
}

#[tokio::test]
async fn test_batch_endpoint_twice_sends_once() {
    let harness = harness();
    let app = app(&harness).await;

    let payload = json!({ "unit_id": "206749", "warning_days": 30 });
    app.clone()
        .oneshot(request(Method::POST, "/auths/notify-auth-expiry", Some(payload.clone())))
        .await
        .unwrap();
    let response = app
        .oneshot(request(Method::POST, "/auths/notify-auth-expiry", Some(payload)))
        .await
        .unwrap();

    let body = json_body(response).await;
    assert_eq!(body["sent"], 0);
    assert_eq!(body["skipped_duplicate"], 1);
    assert_eq!(harness.notifier.sent_count(), 1);
}

#[tokio::test]
async fn test_negative_warning_days_is_bad_request() {
    let harness = harness();
    let app = app(&harness).await;

    let response = app
        .oneshot(request(
            Method::POST,
            "/auths/notify-auth-expiry",
            Some(json!({ "warning_days": -5 })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(harness.registry.fetch_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_non_integer_warning_days_query_is_bad_request() {
    let harness = harness();
    let app = app(&harness).await;

    let response = app
        .oneshot(request(Method::GET, "/auths/expiring?warning_days=soon", None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_registry_failure_is_service_error() {
    let harness = harness();
    harness.registry.fail_fetch.store(true, Ordering::SeqCst);
    let app = app(&harness).await;

    let response = app
        .oneshot(request(Method::POST, "/auths/notify-auth-expiry", Some(json!({}))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "REGISTRY_UNAVAILABLE");
    assert_eq!(harness.notifier.sent_count(), 0);
}

#[tokio::test]
async fn test_expiring_list() {
    let harness = harness();
    let app = app(&harness).await;

    let response = app
        .oneshot(request(
            Method::GET,
            "/auths/expiring?unit_id=206749&warning_days=30",
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["unit_id"], "206749");
    assert_eq!(body["expiry_date"], "2024-01-31");
    assert_eq!(body["count"], 1);
    assert_eq!(body["auths"][0]["resourceId"], "R:1");
    assert_eq!(harness.notifier.sent_count(), 0);
}

#[tokio::test]
async fn test_user_endpoint_sends_every_time() {
    let harness = harness();
    let app = app(&harness).await;

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(request(
                Method::POST,
                "/auths/notify-auth-expiry/user",
                Some(json!({ "resource_id": "R:1" })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["sent"], 1);
    }

    assert_eq!(harness.notifier.sent_count(), 2);
    assert!(harness.store.is_empty());
}

#[tokio::test]
async fn test_user_endpoint_requires_resource_id() {
    let harness = harness();
    let app = app(&harness).await;

    let response = app
        .oneshot(request(
            Method::POST,
            "/auths/notify-auth-expiry/user",
            Some(json!({ "unit_id": "206749" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_test_email_endpoint() {
    let harness = harness();
    let app = app(&harness).await;

    let response = app
        .oneshot(request(
            Method::POST,
            "/auths/test-email",
            Some(json!({ "email": "ops@example.com", "resource_id": "R:125129" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let sent = harness.notifier.sent.lock().unwrap();
    assert_eq!(sent[0].0, "ops@example.com");
    assert_eq!(sent[0].1.items[0].auth_name, "TEST01 Test Authorisation");
    assert_eq!(sent[0].1.subject, "STARS Authorisations Expiring Soon - Test Email");
    assert!(harness.store.is_empty());
}

#[tokio::test]
async fn test_test_email_provider_failure_is_bad_gateway() {
    let harness = harness();
    harness.notifier.fail_for("ops@example.com");
    let app = app(&harness).await;

    let response = app
        .oneshot(request(
            Method::POST,
            "/auths/test-email",
            Some(json!({ "email": "ops@example.com", "resource_id": "R:1" })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let harness = harness();
    let app = app(&harness).await;

    app.clone()
        .oneshot(request(Method::POST, "/auths/notify-auth-expiry", None))
        .await
        .unwrap();
    let response = app.oneshot(request(Method::GET, "/metrics", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("stars_notifications_sent_total"));
}

#[tokio::test]
async fn test_state_from_settings_accepts_configured_key() {
    let mut settings = test_settings();
    settings.auth.api_keys = vec![format!("scheduler:{}", hash_api_key(API_KEY))];

    let state = AppState::from_settings(settings, None).await.unwrap();
    assert_eq!(state.workflow.store().backend_type(), "memory");
    let app = create_app(state);

    let response = app.clone().oneshot(request(Method::GET, "/", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/")
                .header("X-API-Key", "not-the-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_state_from_settings_without_users_fails() {
    let result = AppState::from_settings(test_settings(), None).await;

    assert!(matches!(result, Err(AppError::Config(_))));
}

#[tokio::test]
async fn test_state_from_settings_rejects_malformed_entry() {
    let mut settings = test_settings();
    settings.auth.api_keys = vec!["scheduler:not-a-hash".to_string()];

    let result = AppState::from_settings(settings, None).await;

    assert!(matches!(result, Err(AppError::Config(_))));
}
