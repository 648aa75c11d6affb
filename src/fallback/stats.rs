//! Fallback bookkeeping.

use std::collections::BTreeMap;
use std::time::{Duration, SystemTime};

use serde::Serialize;

use crate::types::{EngineMode, FailureCategory};

/// One degraded-response event.
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackRecord {
    pub mode: EngineMode,
    pub category: FailureCategory,
    pub reason: String,
    pub timestamp: SystemTime,
    pub processing_time: Duration,
}

/// Aggregated fallback counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FallbackMetrics {
    pub total_fallbacks: u64,
    pub fallbacks_by_mode: BTreeMap<EngineMode, u64>,
    pub fallbacks_by_reason: BTreeMap<FailureCategory, u64>,
    /// Running mean of `processing_time` over all records.
    pub average_fallback_time_ms: f64,
    pub last_fallback_time: Option<SystemTime>,
}

impl FallbackMetrics {
    pub(crate) fn apply(&mut self, record: &FallbackRecord) {
        self.total_fallbacks += 1;
        *self.fallbacks_by_mode.entry(record.mode).or_default() += 1;
        *self.fallbacks_by_reason.entry(record.category).or_default() += 1;
        let ms = record.processing_time.as_secs_f64() * 1000.0;
        self.average_fallback_time_ms +=
            (ms - self.average_fallback_time_ms) / self.total_fallbacks as f64;
        self.last_fallback_time = Some(record.timestamp);
    }
}
