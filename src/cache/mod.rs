//! Response cache with pattern learning.
//!
//! [`CacheLayer`] is a namespaced key/value store sitting in front of the
//! engine chain. Values are stored as JSON so any `Serialize` type can be
//! cached; entries carry a TTL and a hit counter. When the store is full,
//! expired entries are purged first, then the entry with the fewest hits
//! (oldest first on ties) is evicted.
//!
//! Expiry is checked lazily on read and swept by [`CacheLayer::cleanup`],
//! which [`CacheLayer::spawn_sweeper`] runs on a tokio interval.
//!
//! Sets that carry a `pattern` tag also feed a [`PatternTracker`], a
//! moka-backed frequency table of normalized query shapes with a running
//! average of their response times. What to do with the top patterns
//! (pre-warming, engine bias) is left to the caller.

mod layer;
mod patterns;

pub use layer::{CacheConfig, CacheLayer, CacheStats, DEFAULT_NAMESPACE, SetOptions};
pub use patterns::{PatternStat, PatternTracker, normalize_pattern};
