//! Public types for the Muninn API.

mod complexity;
mod mode;
mod query;
mod response;

pub use complexity::{ComplexityFactors, ComplexityScore};
pub use mode::{Capability, EngineMode, FailureCategory};
pub use query::{Query, QueryContext, RouteOptions};
pub use response::{EngineResponse, FallbackInfo, ResponseMetadata};
