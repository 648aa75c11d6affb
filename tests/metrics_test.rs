//! Tests for metrics integration.
//!
//! Uses `metrics_util::debugging::DebuggingRecorder` to capture and assert
//! on emitted metrics without needing a real exporter.

use std::time::Duration;

use async_trait::async_trait;
use metrics_util::MetricKind;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};

use muninn::telemetry;
use muninn::{
    Capability, EngineAdapter, EngineError, EngineResponse, EngineRouter, EngineSettings, Muninn,
    Query, RetryConfig,
};

// ============================================================================
// Mock engines
// ============================================================================

struct AnsweringEngine;

#[async_trait]
impl EngineAdapter for AnsweringEngine {
    fn id(&self) -> &str {
        "local-rag"
    }

    fn capabilities(&self) -> &[Capability] {
        &[Capability::Local]
    }

    async fn invoke(&self, _query: &Query, _timeout: Duration) -> Result<EngineResponse, EngineError> {
        Ok(EngineResponse::success("local-rag", "ok", 0.9))
    }
}

struct FlakyEngine;

#[async_trait]
impl EngineAdapter for FlakyEngine {
    fn id(&self) -> &str {
        "flaky"
    }

    fn capabilities(&self) -> &[Capability] {
        &[Capability::Local]
    }

    async fn invoke(&self, _query: &Query, _timeout: Duration) -> Result<EngineResponse, EngineError> {
        Err(EngineError::Network("connection reset".into()))
    }
}

// ============================================================================
// Snapshot type alias for readability
// ============================================================================

type SnapshotVec = Vec<(
    metrics_util::CompositeKey,
    Option<metrics::Unit>,
    Option<metrics::SharedString>,
    DebugValue,
)>;

// ============================================================================
// Helpers
// ============================================================================

/// Sum all counter values matching a given metric name.
fn counter_total(snapshot: &SnapshotVec, name: &str) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| key.kind() == MetricKind::Counter && key.key().name() == name)
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(v) => *v,
            _ => 0,
        })
        .sum()
}

/// Sum counter values for `name` carrying label `label=value`.
fn labelled_total(snapshot: &SnapshotVec, name: &str, label: &str, value: &str) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| {
            key.kind() == MetricKind::Counter
                && key.key().name() == name
                && key
                    .key()
                    .labels()
                    .any(|l| l.key() == label && l.value() == value)
        })
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(v) => *v,
            _ => 0,
        })
        .sum()
}

/// Check if any histogram entries exist for a given metric name.
fn has_histogram(snapshot: &SnapshotVec, name: &str) -> bool {
    snapshot
        .iter()
        .any(|(key, _, _, _)| key.kind() == MetricKind::Histogram && key.key().name() == name)
}

/// Route `queries` in order inside a local recorder scope and return the
/// snapshot.
///
/// `block_in_place` ensures the sync `with_local_recorder` closure stays
/// on the current thread while `block_on` drives the inner async work.
fn route_recorded(router: &EngineRouter, queries: &[&str]) -> SnapshotVec {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async {
                for text in queries {
                    router.route(&Query::new(*text).unwrap()).await;
                }
            })
        })
    });

    snapshotter.snapshot().into_vec()
}

fn fast_retry() -> RetryConfig {
    RetryConfig::new()
        .max_attempts(3)
        .initial_delay(Duration::from_millis(1))
        .max_delay(Duration::from_millis(5))
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn successful_route_records_request_and_score() {
    let router = Muninn::builder()
        .engine(AnsweringEngine, EngineSettings::new())
        .build()
        .unwrap();

    let snapshot = route_recorded(&router, &["서버 상태 확인"]);

    assert_eq!(counter_total(&snapshot, telemetry::REQUESTS_TOTAL), 1);
    assert_eq!(
        labelled_total(&snapshot, telemetry::REQUESTS_TOTAL, "status", "ok"),
        1
    );
    assert!(has_histogram(&snapshot, telemetry::REQUEST_DURATION_SECONDS));
    assert!(has_histogram(&snapshot, telemetry::COMPLEXITY_SCORE));
    assert_eq!(counter_total(&snapshot, telemetry::FALLBACKS_TOTAL), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn cache_hits_and_misses_are_counted_by_namespace() {
    let router = Muninn::builder()
        .engine(AnsweringEngine, EngineSettings::new())
        .build()
        .unwrap();

    let snapshot = route_recorded(&router, &["서버 상태 확인", "서버 상태 확인"]);

    assert_eq!(
        labelled_total(&snapshot, telemetry::CACHE_MISSES_TOTAL, "namespace", "queries"),
        1
    );
    assert_eq!(
        labelled_total(&snapshot, telemetry::CACHE_HITS_TOTAL, "namespace", "queries"),
        1
    );
    assert_eq!(counter_total(&snapshot, telemetry::REQUESTS_TOTAL), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn retries_and_fallback_are_counted() {
    let router = Muninn::builder()
        .retry(fast_retry())
        .engine(FlakyEngine, EngineSettings::new())
        .build()
        .unwrap();

    let snapshot = route_recorded(&router, &["서버 상태 확인"]);

    assert_eq!(counter_total(&snapshot, telemetry::RETRIES_TOTAL), 2);
    assert_eq!(
        labelled_total(&snapshot, telemetry::REQUESTS_TOTAL, "status", "error"),
        3
    );
    assert_eq!(counter_total(&snapshot, telemetry::FALLBACKS_TOTAL), 1);
    assert_eq!(
        labelled_total(&snapshot, telemetry::FALLBACKS_TOTAL, "category", "network-timeout"),
        1
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn evictions_are_counted() {
    let router = Muninn::builder()
        .cache_config(muninn::CacheConfig::new().max_size(1))
        .engine(AnsweringEngine, EngineSettings::new())
        .build()
        .unwrap();

    let snapshot = route_recorded(&router, &["cpu usage", "disk usage", "memory usage"]);

    assert_eq!(counter_total(&snapshot, telemetry::CACHE_EVICTIONS_TOTAL), 2);
}

#[tokio::test]
async fn no_recorder_is_a_no_op() {
    let router = Muninn::builder()
        .engine(AnsweringEngine, EngineSettings::new())
        .build()
        .unwrap();
    let response = router.route(&Query::new("ping").unwrap()).await;
    assert!(response.success);
}
