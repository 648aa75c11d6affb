//! Engine response types

use serde::{Deserialize, Serialize};

use super::{ComplexityScore, EngineMode, FailureCategory};

/// Result of one engine call, or of the router as a whole.
///
/// Responses with `success = false` are produced by adapters only; the
/// router never hands one to its caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineResponse {
    pub success: bool,
    pub content: String,
    /// Engine's confidence in the answer, in `0.0..=1.0`.
    pub confidence: f64,
    pub engine_id: String,
    pub processing_time_ms: u64,
    #[serde(default)]
    pub metadata: ResponseMetadata,
}

impl EngineResponse {
    /// Successful response. Confidence is clamped to `0.0..=1.0`.
    pub fn success(engine_id: impl Into<String>, content: impl Into<String>, confidence: f64) -> Self {
        Self {
            success: true,
            content: content.into(),
            confidence: confidence.clamp(0.0, 1.0),
            engine_id: engine_id.into(),
            processing_time_ms: 0,
            metadata: ResponseMetadata::default(),
        }
    }

    /// Unsuccessful response carrying the reason as content.
    pub fn failure(engine_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            success: false,
            content: reason.into(),
            confidence: 0.0,
            engine_id: engine_id.into(),
            processing_time_ms: 0,
            metadata: ResponseMetadata::default(),
        }
    }

    pub fn processing_time_ms(mut self, ms: u64) -> Self {
        self.processing_time_ms = ms;
        self
    }

    /// Attach an engine-specific metadata field.
    pub fn extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.extra.insert(key.into(), value);
        self
    }

    /// Whether this response came from the fallback handler.
    pub fn is_degraded(&self) -> bool {
        self.metadata.fallback.is_some()
    }
}

/// Routing metadata attached by the router.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    #[serde(default)]
    pub cache_hit: bool,
    /// Failed candidates (plus the emergency fallback itself, when used).
    #[serde(default)]
    pub fallbacks_used: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complexity: Option<ComplexityScore>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<FallbackInfo>,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Why a response is degraded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackInfo {
    pub mode: EngineMode,
    pub category: FailureCategory,
    pub reason: String,
}
