//! Complexity assessment types

use serde::{Deserialize, Serialize};

use super::EngineMode;

/// Per-factor scores, each in `0..=100`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplexityFactors {
    pub length: u8,
    pub keyword: u8,
    pub pattern: u8,
    pub context: u8,
    pub language: u8,
}

impl ComplexityFactors {
    /// Factors in a fixed order: length, keyword, pattern, context, language.
    pub fn as_array(&self) -> [u8; 5] {
        [
            self.length,
            self.keyword,
            self.pattern,
            self.context,
            self.language,
        ]
    }
}

/// Difficulty assessment for one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexityScore {
    /// Weighted sum of the factors, rounded, in `0..=100`.
    pub score: u8,
    pub factors: ComplexityFactors,
    pub recommendation: EngineMode,
    /// Agreement between factors, in `0.5..=0.95`.
    pub confidence: f64,
}
