//! Emergency responses for exhausted chains.
//!
//! When no engine could answer, the router asks [`FallbackHandler`] for a
//! degraded response instead of returning an error. The response is always
//! `success = true`, carries a mode-dependent confidence below 0.5, and
//! explains what failed, what was affected and what to do about it.
//!
//! Every response produced here is recorded in [`FallbackMetrics`].

mod message;
mod stats;

pub use stats::{FallbackMetrics, FallbackRecord};

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};

use tracing::warn;

use crate::telemetry;
use crate::types::{EngineMode, EngineResponse, FailureCategory, FallbackInfo};

/// What the handler echoes back about the failed request.
#[derive(Debug, Clone, Default)]
pub struct RequestEcho {
    pub query: String,
    /// Time spent before falling back.
    pub elapsed: Duration,
}

impl RequestEcho {
    pub fn new(query: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            query: query.into(),
            elapsed,
        }
    }
}

/// Builds degraded responses and keeps fallback metrics.
#[derive(Debug, Default)]
pub struct FallbackHandler {
    metrics: Mutex<FallbackMetrics>,
}

impl FallbackHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Confidence reported for a degraded response in `mode`.
    pub fn confidence(mode: EngineMode) -> f64 {
        match mode {
            EngineMode::Local => 0.35,
            EngineMode::Cloud => 0.30,
            EngineMode::Hybrid => 0.25,
        }
    }

    /// Build a degraded response, classifying `reason` into the taxonomy.
    pub fn build(&self, mode: EngineMode, reason: &str, echo: &RequestEcho) -> EngineResponse {
        self.build_with_category(mode, FailureCategory::classify(reason), reason, echo)
    }

    /// Build a degraded response for an already classified failure.
    pub fn build_with_category(
        &self,
        mode: EngineMode,
        category: FailureCategory,
        reason: &str,
        echo: &RequestEcho,
    ) -> EngineResponse {
        warn!(
            mode = mode.as_str(),
            category = category.as_str(),
            reason,
            elapsed_ms = echo.elapsed.as_millis() as u64,
            "serving fallback response"
        );
        metrics::counter!(telemetry::FALLBACKS_TOTAL,
            "mode" => mode.as_str(),
            "category" => category.as_str(),
        )
        .increment(1);

        self.lock().apply(&FallbackRecord {
            mode,
            category,
            reason: reason.to_owned(),
            timestamp: SystemTime::now(),
            processing_time: echo.elapsed,
        });

        let content = message::render(mode, category, &echo.query, echo.elapsed);
        let mut response =
            EngineResponse::success(format!("fallback-{mode}"), content, Self::confidence(mode))
                .processing_time_ms(echo.elapsed.as_millis() as u64);
        response.metadata.fallback = Some(FallbackInfo {
            mode,
            category,
            reason: reason.to_owned(),
        });
        response.metadata.extra.insert(
            "affected_subsystems".to_owned(),
            serde_json::json!(message::subsystems(mode)),
        );
        response
    }

    /// Snapshot of the counters.
    pub fn metrics(&self) -> FallbackMetrics {
        self.lock().clone()
    }

    pub fn reset_metrics(&self) {
        *self.lock() = FallbackMetrics::default();
    }

    fn lock(&self) -> MutexGuard<'_, FallbackMetrics> {
        self.metrics.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
