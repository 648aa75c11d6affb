//! Muninn - complexity-aware query routing for AI engines
//!
//! Muninn sits in front of a set of answer engines (typically a local
//! retrieval engine and a cloud AI service). For each query it:
//!
//! - scores how hard the query is and recommends local, cloud or hybrid
//!   handling ([`ComplexityAnalyzer`]),
//! - serves repeated questions from a TTL cache ([`CacheLayer`]),
//! - tries engines in recommended order with retries ([`EngineRouter`]),
//! - and, when nothing answers, returns an explanatory degraded response
//!   instead of an error ([`FallbackHandler`]).
//!
//! # Example
//!
//! ```rust,no_run
//! use muninn::{EngineSettings, HttpEngine, Muninn, Query, Capability};
//!
//! #[tokio::main]
//! async fn main() -> muninn::Result<()> {
//!     let router = Muninn::builder()
//!         .engine(
//!             HttpEngine::new("local-rag", "http://127.0.0.1:8100/query")?
//!                 .capabilities([Capability::Local]),
//!             EngineSettings::new().priority(10),
//!         )
//!         .engine(
//!             HttpEngine::new("cloud-ai", "https://ai.example.com/v1/answer")?
//!                 .capabilities([Capability::Cloud]),
//!             EngineSettings::new().priority(20),
//!         )
//!         .build()?;
//!
//!     let response = router.route(&Query::new("서버 상태 확인")?).await;
//!     println!("[{}] {}", response.engine_id, response.content);
//!     Ok(())
//! }
//! ```

pub mod analyzer;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod fallback;
pub mod router;
pub mod telemetry;
pub mod types;

// Re-export main types at crate root
pub use analyzer::{AnalyzerConfig, ComplexityAnalyzer};
pub use cache::{CacheConfig, CacheLayer, CacheStats, SetOptions};
pub use config::{Config, EngineConfig};
#[cfg(feature = "http")]
pub use engine::HttpEngine;
pub use engine::{EngineAdapter, EngineRegistry, EngineSettings, RetryConfig};
pub use error::{EngineError, MuninnError, Result};
pub use fallback::{FallbackHandler, FallbackMetrics};
pub use router::{EngineRouter, Muninn, MuninnBuilder};
pub use types::{
    Capability, ComplexityFactors, ComplexityScore, EngineMode, EngineResponse, FailureCategory,
    FallbackInfo, Query, QueryContext, ResponseMetadata, RouteOptions,
};
