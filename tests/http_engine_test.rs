//! Tests for [`HttpEngine`] against a wiremock backend.

#![cfg(feature = "http")]

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use muninn::{
    Capability, EngineAdapter, EngineError, EngineMode, EngineSettings, HttpEngine, Muninn, Query,
    QueryContext, RetryConfig,
};

const TIMEOUT: Duration = Duration::from_secs(5);

fn engine_for(server: &MockServer) -> HttpEngine {
    HttpEngine::new("cloud-ai", &format!("{}/answer", server.uri()))
        .unwrap()
        .capabilities([Capability::Cloud])
}

async fn respond(template: ResponseTemplate) -> (MockServer, HttpEngine) {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/answer"))
        .respond_with(template)
        .mount(&server)
        .await;
    let engine = engine_for(&server);
    (server, engine)
}

fn query() -> Query {
    Query::new("disk usage on node-3").unwrap()
}

// ============================================================================
// Successful calls
// ============================================================================

#[tokio::test]
async fn posts_query_and_reads_answer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/answer"))
        .and(header("Authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "query": "disk usage on node-3",
            "mode": "cloud",
            "context": { "user_intent": "capacity review" },
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "content": "node-3 is at 81% disk usage",
            "confidence": 0.82,
            "metadata": { "model": "large" },
        })))
        .expect(1)
        .mount(&server)
        .await;

    let engine = engine_for(&server).api_key("test-key");
    let query = query()
        .mode(EngineMode::Cloud)
        .with_context(QueryContext::new().user_intent("capacity review"));

    let response = engine.invoke(&query, TIMEOUT).await.unwrap();

    assert!(response.success);
    assert_eq!(response.engine_id, "cloud-ai");
    assert_eq!(response.content, "node-3 is at 81% disk usage");
    assert_eq!(response.confidence, 0.82);
    assert_eq!(response.metadata.extra["model"], "large");
}

#[tokio::test]
async fn missing_fields_take_defaults() {
    let (_server, engine) =
        respond(ResponseTemplate::new(200).set_body_json(json!({ "content": "ok" }))).await;

    let response = engine.invoke(&query(), TIMEOUT).await.unwrap();
    assert!(response.success);
    assert_eq!(response.confidence, 0.5);
}

#[tokio::test]
async fn unsuccessful_body_becomes_error() {
    let (_server, engine) = respond(ResponseTemplate::new(200).set_body_json(json!({
        "success": false,
        "content": "",
        "error": "vector index not loaded",
    })))
    .await;

    let err = engine.invoke(&query(), TIMEOUT).await.unwrap_err();
    assert_eq!(
        err,
        EngineError::Unsuccessful("vector index not loaded".into())
    );
}

#[tokio::test]
async fn garbage_body_is_unclassified() {
    let (_server, engine) =
        respond(ResponseTemplate::new(200).set_body_string("<html>oops</html>")).await;

    let err = engine.invoke(&query(), TIMEOUT).await.unwrap_err();
    assert!(matches!(err, EngineError::Other(_)));
}

// ============================================================================
// Status mapping
// ============================================================================

#[tokio::test]
async fn too_many_requests_carries_retry_after() {
    let (_server, engine) =
        respond(ResponseTemplate::new(429).insert_header("Retry-After", "7")).await;

    let err = engine.invoke(&query(), TIMEOUT).await.unwrap_err();
    assert_eq!(
        err,
        EngineError::RateLimited {
            retry_after: Some(Duration::from_secs(7))
        }
    );
    assert!(err.is_transient());
}

#[tokio::test]
async fn server_errors_are_unavailable() {
    let (_server, engine) = respond(ResponseTemplate::new(503)).await;
    let err = engine.invoke(&query(), TIMEOUT).await.unwrap_err();
    assert!(matches!(err, EngineError::Unavailable(_)));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn gateway_timeout_is_a_timeout() {
    let (_server, engine) = respond(ResponseTemplate::new(504)).await;
    let err = engine.invoke(&query(), TIMEOUT).await.unwrap_err();
    assert_eq!(err, EngineError::Timeout(TIMEOUT));
}

#[tokio::test]
async fn client_errors_are_unclassified() {
    let (_server, engine) = respond(ResponseTemplate::new(404)).await;
    let err = engine.invoke(&query(), TIMEOUT).await.unwrap_err();
    assert!(matches!(err, EngineError::Other(msg) if msg.contains("404")));
}

// ============================================================================
// Transport failures
// ============================================================================

#[tokio::test]
async fn slow_backend_times_out() {
    let (_server, engine) = respond(
        ResponseTemplate::new(200)
            .set_body_json(json!({ "content": "late" }))
            .set_delay(Duration::from_millis(500)),
    )
    .await;

    let timeout = Duration::from_millis(50);
    let err = engine.invoke(&query(), timeout).await.unwrap_err();
    assert_eq!(err, EngineError::Timeout(timeout));
}

#[tokio::test]
async fn refused_connection_is_a_network_error() {
    let engine = HttpEngine::new("local-rag", "http://127.0.0.1:1/query").unwrap();
    let err = engine.invoke(&query(), TIMEOUT).await.unwrap_err();
    assert!(matches!(err, EngineError::Network(_)), "{err:?}");
}

// ============================================================================
// Health checks
// ============================================================================

#[tokio::test]
async fn health_check_probes_configured_path() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/healthz"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let healthy = engine_for(&server)
        .health_path("/healthz")
        .unwrap();
    assert!(healthy.health_check().await);

    let broken = engine_for(&server)
        .health_path("/missing")
        .unwrap();
    assert!(!broken.health_check().await);
}

#[tokio::test]
async fn health_check_without_path_assumes_healthy() {
    let engine = HttpEngine::new("local-rag", "http://127.0.0.1:1/query").unwrap();
    assert!(engine.health_check().await);
}

// ============================================================================
// Routed through the router
// ============================================================================

#[tokio::test]
async fn router_advances_past_failing_http_engine() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/local"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/cloud"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": "answered by cloud",
            "confidence": 0.7,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let local = HttpEngine::new("local-rag", &format!("{}/local", server.uri()))
        .unwrap()
        .capabilities([Capability::Local]);
    let cloud = HttpEngine::new("cloud-ai", &format!("{}/cloud", server.uri()))
        .unwrap()
        .capabilities([Capability::Cloud]);

    let router = Muninn::builder()
        .retry(RetryConfig::disabled())
        .engine(local, EngineSettings::new().priority(10))
        .engine(cloud, EngineSettings::new().priority(20))
        .build()
        .unwrap();

    let response = router.route(&Query::new("서버 상태 확인").unwrap()).await;

    assert_eq!(response.engine_id, "cloud-ai");
    assert_eq!(response.content, "answered by cloud");
    assert_eq!(response.metadata.fallbacks_used, 1);
}
