//! The backend seam.
//!
//! Every answer source (local retrieval engine, cloud AI API, anything
//! else) implements [`EngineAdapter`]. The router only sees this trait; how
//! an engine produces its answer is its own business.
//!
//! # Failure semantics
//!
//! Adapters report expected failures as [`EngineError`] values instead of
//! panicking. The router retries transient errors
//! ([`EngineError::is_transient`]) and advances to the next candidate on
//! everything else. An adapter may also return a response with
//! `success = false`; the router treats it as [`EngineError::Unsuccessful`].
//!
//! # Example
//!
//! ```ignore
//! struct Echo;
//!
//! #[async_trait]
//! impl EngineAdapter for Echo {
//!     fn id(&self) -> &str { "echo" }
//!     fn capabilities(&self) -> &[Capability] { &[Capability::Local] }
//!     async fn invoke(&self, query: &Query, _timeout: Duration) -> Result<EngineResponse, EngineError> {
//!         Ok(EngineResponse::success("echo", query.text(), 0.9))
//!     }
//! }
//! ```

use std::time::Duration;

use async_trait::async_trait;

use crate::error::EngineError;
use crate::types::{Capability, EngineMode, EngineResponse, Query};

/// An answer backend.
#[async_trait]
pub trait EngineAdapter: Send + Sync {
    /// Stable identifier, unique within a registry.
    fn id(&self) -> &str;

    /// Capability tags. `Local` and `Cloud` decide chain affinity and
    /// mode conflicts.
    fn capabilities(&self) -> &[Capability];

    /// Answer `query`. `timeout` is the budget the router will enforce
    /// for this attempt; adapters may pass it on to their transport.
    async fn invoke(
        &self,
        query: &Query,
        timeout: Duration,
    ) -> std::result::Result<EngineResponse, EngineError>;

    /// Cheap liveness probe. Default: always healthy.
    async fn health_check(&self) -> bool {
        true
    }
}

/// Whether a capability set is compatible with a requested mode.
///
/// Engines tagged only `cloud` conflict with `local` and vice versa.
/// Untagged and dual-tagged engines conflict with nothing.
pub(crate) fn conflicts_with(capabilities: &[Capability], mode: EngineMode) -> bool {
    let local = capabilities.contains(&Capability::Local);
    let cloud = capabilities.contains(&Capability::Cloud);
    match mode {
        EngineMode::Local => cloud && !local,
        EngineMode::Cloud => local && !cloud,
        EngineMode::Hybrid => false,
    }
}

/// How well a capability set matches a recommendation; lower is better.
pub(crate) fn affinity(capabilities: &[Capability], mode: EngineMode) -> u8 {
    let local = capabilities.contains(&Capability::Local);
    let cloud = capabilities.contains(&Capability::Cloud);
    let preferred = match mode {
        EngineMode::Local => local,
        EngineMode::Cloud => cloud,
        EngineMode::Hybrid => local && cloud,
    };
    if preferred { 0 } else { 1 }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOCAL: &[Capability] = &[Capability::Local, Capability::DomainContext];
    const CLOUD: &[Capability] = &[Capability::Cloud];
    const BOTH: &[Capability] = &[Capability::Local, Capability::Cloud];
    const NONE: &[Capability] = &[];

    #[test]
    fn mode_conflicts() {
        assert!(conflicts_with(CLOUD, EngineMode::Local));
        assert!(conflicts_with(LOCAL, EngineMode::Cloud));
        assert!(!conflicts_with(LOCAL, EngineMode::Local));
        assert!(!conflicts_with(BOTH, EngineMode::Local));
        assert!(!conflicts_with(NONE, EngineMode::Cloud));
        assert!(!conflicts_with(CLOUD, EngineMode::Hybrid));
    }

    #[test]
    fn affinity_ranks() {
        assert_eq!(affinity(LOCAL, EngineMode::Local), 0);
        assert_eq!(affinity(CLOUD, EngineMode::Local), 1);
        assert_eq!(affinity(CLOUD, EngineMode::Cloud), 0);
        assert_eq!(affinity(BOTH, EngineMode::Hybrid), 0);
        assert_eq!(affinity(LOCAL, EngineMode::Hybrid), 1);
    }
}
