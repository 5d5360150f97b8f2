//! Integration tests for the HTTP API.
//!
//! These drive the full router in-process with `tower::ServiceExt::oneshot`:
//! - Webhook ingest, token issue and listener delivery in either order
//! - Listener timeout and credential retention
//! - Rejections (bad ingest, unauthorized listeners, duplicate tokens)
//! - Health and metrics endpoints

use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use tower::ServiceExt;
use webhook_proxy::server::{MetricsAuth, TokenResponse};
use webhook_proxy::service::{ProxyService, ServiceConfig};

// =============================================================================
// Test Helpers
// =============================================================================

fn service_with(config: ServiceConfig) -> ProxyService {
    ProxyService::with_metrics_auth(config, MetricsAuth::Open).unwrap()
}

fn default_service() -> ProxyService {
    service_with(
        ServiceConfig::builder()
            .timeout(Duration::from_secs(5))
            .keepalive_interval(Duration::from_secs(60))
            .build(),
    )
}

fn webhook_request(request_id: &str, signature: Option<&str>, body: &str) -> Request<Body> {
    let payload = format!(r#"{{"request_id":"{}","result":{}}}"#, request_id, body);
    let mut builder = Request::post("/webhook").header(header::CONTENT_TYPE, "application/json");
    if let Some(signature) = signature {
        builder = builder.header("X-BASETEN-SIGNATURE", signature);
    }
    builder.body(Body::from(payload)).unwrap()
}

fn token_request(body: &str) -> Request<Body> {
    Request::post("/token")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn listen_request(request_id: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::get(format!("/listen/{}", request_id));
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

async fn body_string(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn issue_token(app: &Router, request_id: &str) -> String {
    let response = app
        .clone()
        .oneshot(token_request(&format!(r#"{{"request_id":"{}"}}"#, request_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let token: TokenResponse = serde_json::from_slice(&bytes).unwrap();
    token.token
}

/// Polls the metrics report until it contains `needle`.
async fn wait_for_metric(service: &ProxyService, needle: &str) {
    for _ in 0..100 {
        if service.metrics_text().contains(needle) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("metric '{}' never appeared in:\n{}", needle, service.metrics_text());
}

// =============================================================================
// Delivery
// =============================================================================

#[tokio::test]
async fn test_webhook_before_listener_is_delivered() {
    let service = default_service();
    let app = service.router();

    let payload = r#"{"request_id":"r1","result":"X"}"#;
    let response = app
        .clone()
        .oneshot(
            Request::post("/webhook")
                .header("X-BASETEN-SIGNATURE", "sig")
                .body(Body::from(payload))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(service.store().contains("r1"));

    let token = issue_token(&app, "r1").await;
    let response = app
        .clone()
        .oneshot(listen_request("r1", Some(&token)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/event-stream"
    );
    assert_eq!(
        response.headers().get(header::CACHE_CONTROL).unwrap(),
        "no-cache"
    );

    let body = body_string(response).await;
    assert_eq!(
        body,
        format!("data: {}\n\ndata: signature=sig\n\ndata: eot\n\n", payload)
    );
    assert!(!service.store().contains("r1"));
    assert!(service.credentials().lookup("r1").is_none());
}

#[tokio::test]
async fn test_listener_before_webhook_is_delivered() {
    let service = default_service();
    let app = service.router();

    let token = issue_token(&app, "r2").await;
    let response = app
        .clone()
        .oneshot(listen_request("r2", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let reader = tokio::spawn(body_string(response));
    tokio::time::sleep(Duration::from_millis(500)).await;

    let response = app
        .clone()
        .oneshot(webhook_request("r2", Some("sig-2"), r#""late""#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = tokio::time::timeout(Duration::from_secs(5), reader)
        .await
        .expect("delivery within the stream timeout")
        .unwrap();
    assert!(body.starts_with("data: {\"request_id\":\"r2\""));
    assert!(body.ends_with("data: signature=sig-2\n\ndata: eot\n\n"));
    assert!(!body.contains("server gone"));

    assert!(!service.store().contains("r2"));
    assert!(service.credentials().lookup("r2").is_none());
}

#[tokio::test]
async fn test_large_webhook_is_stored_and_delivered() {
    let service = default_service();
    let app = service.router();

    // Larger than axum's default 2 MiB request limit.
    let filler = "a".repeat(3 * 1024 * 1024);
    let payload = format!(r#"{{"request_id":"big","result":"{}"}}"#, filler);

    let response = app
        .clone()
        .oneshot(
            Request::post("/webhook")
                .header("X-BASETEN-SIGNATURE", "sig-big")
                .body(Body::from(payload.clone()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(service.store().get("big").unwrap().content().len(), payload.len());

    let token = issue_token(&app, "big").await;
    let response = app
        .oneshot(listen_request("big", Some(&token)))
        .await
        .unwrap();

    let body = body_string(response).await;
    assert_eq!(
        body,
        format!("data: {}\n\ndata: signature=sig-big\n\ndata: eot\n\n", payload)
    );
    assert!(!service.store().contains("big"));
}

#[tokio::test]
async fn test_keepalives_sent_while_waiting() {
    let service = service_with(
        ServiceConfig::builder()
            .timeout(Duration::from_millis(350))
            .keepalive_interval(Duration::from_millis(100))
            .build(),
    );
    let app = service.router();

    let token = issue_token(&app, "slow").await;
    let response = app
        .oneshot(listen_request("slow", Some(&token)))
        .await
        .unwrap();

    let body = body_string(response).await;
    assert!(body.starts_with("data: keep-alive\n\n"));
    assert!(body.ends_with("data: server gone\n\n"));
    assert!(body.matches("keep-alive").count() >= 2);
}

// =============================================================================
// Timeout
// =============================================================================

#[tokio::test]
async fn test_zero_timeout_closes_immediately_and_keeps_token() {
    let service = service_with(ServiceConfig::builder().timeout(Duration::ZERO).build());
    let app = service.router();

    let token = issue_token(&app, "r3").await;
    let response = app
        .clone()
        .oneshot(listen_request("r3", Some(&token)))
        .await
        .unwrap();

    let body = tokio::time::timeout(Duration::from_secs(2), body_string(response))
        .await
        .unwrap();
    assert_eq!(body, "data: server gone\n\n");

    // Left for the sweeper.
    assert!(service.credentials().lookup("r3").is_some());
    wait_for_metric(&service, "webhook_proxy_timed_out_clients_total 1").await;
}

// =============================================================================
// Rejections
// =============================================================================

#[tokio::test]
async fn test_webhook_without_signature_rejected() {
    let service = default_service();
    let app = service.router();

    let response = app
        .oneshot(webhook_request("r4", None, "1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(!service.store().contains("r4"));
    assert!(service.store().is_empty());
}

#[tokio::test]
async fn test_webhook_malformed_bodies_rejected() {
    let service = default_service();
    let app = service.router();

    for body in ["not json", r#"{"result":1}"#, r#"{"request_id":7}"#] {
        let response = app
            .clone()
            .oneshot(
                Request::post("/webhook")
                    .header("X-BASETEN-SIGNATURE", "sig")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {}", body);
    }
    assert!(service.store().is_empty());
}

#[tokio::test]
async fn test_custom_signature_header() {
    let service = service_with(
        ServiceConfig::builder()
            .signature_header("X-Signature")
            .build(),
    );
    let app = service.router();

    let response = app
        .clone()
        .oneshot(webhook_request("r5", Some("sig"), "1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(
            Request::post("/webhook")
                .header("X-Signature", "sig")
                .body(Body::from(r#"{"request_id":"r5"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(service.store().get("r5").unwrap().signature(), "sig");
}

#[tokio::test]
async fn test_second_token_conflicts() {
    let service = default_service();
    let app = service.router();

    let first = issue_token(&app, "r6").await;
    let response = app
        .clone()
        .oneshot(token_request(r#"{"request_id":"r6"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_string(response).await, "token already exists");
    assert!(service.credentials().verify("r6", Some(&first)).is_ok());
}

#[tokio::test]
async fn test_token_request_validation() {
    let service = default_service();
    let app = service.router();

    for body in ["", "{}", r#"{"request_id":""}"#, r#"{"request_id":5}"#] {
        let response = app.clone().oneshot(token_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {:?}", body);
        assert_eq!(
            body_string(response).await,
            "Bad request. Field `request_id` (string) is required."
        );
    }
    assert!(service.credentials().is_empty());
}

#[tokio::test]
async fn test_token_response_shape() {
    let service = default_service();
    let app = service.router();

    let response = app
        .oneshot(token_request(r#"{"request_id":"shape"}"#))
        .await
        .unwrap();
    let body = body_string(response).await;
    let value: serde_json::Value = serde_json::from_str(&body).unwrap();

    let token = value["token"].as_str().unwrap();
    assert_eq!(token.len(), 32);
    let expires_at: i64 = value["expires_at"].as_str().unwrap().parse().unwrap();
    assert_eq!(
        expires_at,
        service.credentials().lookup("shape").unwrap().expires_at_unix()
    );
}

#[tokio::test]
async fn test_listener_authorization() {
    let service = default_service();
    let app = service.router();

    // Unknown request
    let response = app
        .clone()
        .oneshot(listen_request("nobody", Some("t")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_string(response).await, "unauthorized");

    let token = issue_token(&app, "r7").await;

    // Missing token
    let response = app
        .clone()
        .oneshot(listen_request("r7", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Wrong token
    let response = app
        .clone()
        .oneshot(listen_request("r7", Some("wrong")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // A raw token without the Bearer prefix is accepted
    let response = app
        .clone()
        .oneshot(
            Request::get("/listen/r7")
                .header(header::AUTHORIZATION, token.as_str())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(service.credentials().len(), 1);
}

// =============================================================================
// Health and metrics
// =============================================================================

#[tokio::test]
async fn test_health() {
    let service = default_service();
    let response = service
        .router()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let value: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(value, serde_json::json!({ "status": "ok" }));
}

#[tokio::test]
async fn test_metrics_require_bearer_token() {
    let service = ProxyService::with_metrics_auth(
        ServiceConfig::default(),
        MetricsAuth::Bearer("metrics-secret".to_string()),
    )
    .unwrap();
    let app = service.router();

    let response = app
        .clone()
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_string(response).await, "Unauthorized");

    let response = app
        .clone()
        .oneshot(
            Request::get("/metrics")
                .header(header::AUTHORIZATION, "metrics-secret")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(
            Request::get("/metrics")
                .header(header::AUTHORIZATION, "Bearer metrics-secret")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .get(header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/plain"));
    assert!(body_string(response)
        .await
        .contains("# TYPE webhook_proxy_webhooks_received_total counter"));
}

#[tokio::test]
async fn test_metrics_track_traffic() {
    let service = default_service();
    let app = service.router();

    app.clone()
        .oneshot(webhook_request("m1", Some("s"), "1"))
        .await
        .unwrap();
    let token = issue_token(&app, "m1").await;
    let response = app
        .clone()
        .oneshot(listen_request("m1", Some(&token)))
        .await
        .unwrap();
    body_string(response).await;

    wait_for_metric(&service, "webhook_proxy_webhooks_received_total 1").await;
    wait_for_metric(&service, "webhook_proxy_client_connections_total 1").await;
    wait_for_metric(&service, "webhook_proxy_open_client_connections 0").await;
    wait_for_metric(&service, "webhook_proxy_active_tokens 0").await;

    let response = app
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let text = body_string(response).await;
    assert!(text.contains("webhook_proxy_webhooks_received_total 1"));
}
