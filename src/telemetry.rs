//! Telemetry metric name constants.
//!
//! Centralised metric names for muninn operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `muninn_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `engine`: engine id (e.g. "local-rag", "cloud-ai")
//! - `status`: outcome: "ok" or "error"
//! - `namespace`: cache namespace
//! - `mode` / `category`: fallback mode and failure category

/// Total engine attempts dispatched by the router.
///
/// Labels: `engine`, `status` ("ok" | "error").
pub const REQUESTS_TOTAL: &str = "muninn_requests_total";

/// Engine attempt duration in seconds.
///
/// Labels: `engine`.
pub const REQUEST_DURATION_SECONDS: &str = "muninn_request_duration_seconds";

/// Total retry attempts (not counting the initial attempt).
///
/// Labels: `engine`.
pub const RETRIES_TOTAL: &str = "muninn_retries_total";

/// Total cache hits.
///
/// Labels: `namespace`.
pub const CACHE_HITS_TOTAL: &str = "muninn_cache_hits_total";

/// Total cache misses (including expired entries).
///
/// Labels: `namespace`.
pub const CACHE_MISSES_TOTAL: &str = "muninn_cache_misses_total";

/// Total entries evicted under capacity pressure.
pub const CACHE_EVICTIONS_TOTAL: &str = "muninn_cache_evictions_total";

/// Total degraded responses produced by the fallback handler.
///
/// Labels: `mode`, `category`.
pub const FALLBACKS_TOTAL: &str = "muninn_fallbacks_total";

/// Distribution of overall complexity scores (0 to 100).
///
/// Labels: `recommendation`.
pub const COMPLEXITY_SCORE: &str = "muninn_complexity_score";
