//! Per-engine latency tracking.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Lock-free exponentially weighted moving average of attempt durations.
///
/// Observability only: the router records every attempt, callers read it
/// through [`EngineRegistry::latency`](super::EngineRegistry::latency).
pub struct EngineLatency {
    /// EWMA in microseconds, stored as f64 bits. 0 = no data yet.
    ewma_micros: AtomicU64,
    alpha: f64,
    count: AtomicU64,
}

impl EngineLatency {
    /// Smoothing factor `alpha` is clamped to `0.0..=1.0`.
    pub fn new(alpha: f64) -> Self {
        Self {
            ewma_micros: AtomicU64::new(0_f64.to_bits()),
            alpha: alpha.clamp(0.0, 1.0),
            count: AtomicU64::new(0),
        }
    }

    /// Record one observation.
    ///
    /// Two threads racing on the very first observation may both seed the
    /// average; it converges after a few more samples.
    pub fn record(&self, duration: Duration) {
        let micros = duration.as_micros() as f64;
        loop {
            let current_bits = self.ewma_micros.load(Ordering::Relaxed);
            let current = f64::from_bits(current_bits);
            let new = if self.count.load(Ordering::Relaxed) == 0 {
                micros
            } else {
                self.alpha * micros + (1.0 - self.alpha) * current
            };
            if self
                .ewma_micros
                .compare_exchange_weak(
                    current_bits,
                    new.to_bits(),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                )
                .is_ok()
            {
                self.count.fetch_add(1, Ordering::Relaxed);
                break;
            }
        }
    }

    /// Current estimate, or `None` before the first observation.
    pub fn average(&self) -> Option<Duration> {
        if self.count.load(Ordering::Relaxed) == 0 {
            return None;
        }
        let micros = f64::from_bits(self.ewma_micros.load(Ordering::Relaxed));
        Some(Duration::from_micros(micros as u64))
    }

    pub fn observation_count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

impl Default for EngineLatency {
    fn default() -> Self {
        Self::new(0.2)
    }
}

impl std::fmt::Debug for EngineLatency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineLatency")
            .field("average", &self.average())
            .field("count", &self.observation_count())
            .finish()
    }
}
