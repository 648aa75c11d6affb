//! Engines: the adapter trait, the registry and their settings.
//!
//! - [`EngineAdapter`]: implemented by every backend.
//! - [`EngineRegistry`]: registered engines with priority, timeout, retry
//!   override, runtime enabled flag and latency tracking.
//! - [`RetryConfig`]: backoff policy for transient failures.
//! - [`HttpEngine`]: ready-made JSON-over-HTTP adapter (feature `http`).

#[cfg(feature = "http")]
pub mod http;
pub mod latency;
pub mod registry;
pub mod retry;
pub mod traits;

#[cfg(feature = "http")]
pub use http::HttpEngine;
pub use latency::EngineLatency;
pub use registry::{
    EngineDescriptor, EngineHealth, EngineRegistry, EngineSettings, RegisteredEngine,
};
pub use retry::RetryConfig;
pub use traits::EngineAdapter;
