//! Scoring tables and weights for the complexity analyzer.
//!
//! Every term list, regex and coefficient the analyzer uses lives here so
//! that deployments can localize or retune scoring without code changes.
//! The defaults were tuned empirically against Korean/English operations
//! queries; treat them as a starting point.
//!
//! ```toml
//! [analyzer]
//! complex_keywords = ["분석", "예측", "analysis"]
//! simple_keywords = ["상태", "status"]
//!
//! [analyzer.weights]
//! length = 0.15
//! keyword = 0.25
//! pattern = 0.25
//! context = 0.20
//! language = 0.15
//! ```

use serde::Deserialize;

use crate::{MuninnError, Result};

/// Relative weight of each factor in the overall score. Must sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct FactorWeights {
    pub length: f64,
    pub keyword: f64,
    pub pattern: f64,
    pub context: f64,
    pub language: f64,
}

impl Default for FactorWeights {
    fn default() -> Self {
        Self {
            length: 0.15,
            keyword: 0.25,
            pattern: 0.25,
            context: 0.20,
            language: 0.15,
        }
    }
}

impl FactorWeights {
    fn as_array(&self) -> [f64; 5] {
        [
            self.length,
            self.keyword,
            self.pattern,
            self.context,
            self.language,
        ]
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let weights = self.as_array();
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(MuninnError::Configuration(
                "factor weights must be finite and non-negative".to_string(),
            ));
        }
        let sum: f64 = weights.iter().sum();
        if (sum - 1.0).abs() > 1e-6 {
            return Err(MuninnError::Configuration(format!(
                "factor weights must sum to 1.0 (got {sum:.4})"
            )));
        }
        Ok(())
    }
}

/// Score boundaries for the recommendation rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RecommendationThresholds {
    /// Pattern factor at or below which the local engine is preferred
    /// (together with `local_context_max`).
    pub local_pattern_max: u8,
    pub local_context_max: u8,
    /// Overall score at or above which the cloud engine is preferred.
    pub cloud_min: u8,
    /// Overall score at or above which either family may answer.
    pub hybrid_min: u8,
    /// Short plain queries stay local below `hybrid_min` when the length
    /// and keyword factors are at or below these and context is at or
    /// below `local_context_max`.
    pub short_length_max: u8,
    pub short_keyword_max: u8,
}

impl Default for RecommendationThresholds {
    fn default() -> Self {
        Self {
            local_pattern_max: 30,
            local_context_max: 30,
            cloud_min: 70,
            hybrid_min: 40,
            short_length_max: 10,
            short_keyword_max: 30,
        }
    }
}

/// Full analyzer configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub weights: FactorWeights,
    /// Terms that signal a demanding query (+15 each).
    pub complex_keywords: Vec<String>,
    /// Terms that signal a lookup-style query (−10 each, and cap the
    /// keyword factor at its neutral base).
    pub simple_keywords: Vec<String>,
    /// Regex groups for domain-technical vocabulary. Each group counts
    /// once, however many times it matches.
    pub technical_patterns: Vec<String>,
    /// Question words counted alongside `?` as interrogative markers.
    pub interrogatives: Vec<String>,
    pub thresholds: RecommendationThresholds,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            weights: FactorWeights::default(),
            complex_keywords: strings(&[
                "분석",
                "예측",
                "비교",
                "최적화",
                "추론",
                "상관관계",
                "원인",
                "패턴",
                "추세",
                "전략",
                "시뮬레이션",
                "analysis",
                "analyze",
                "predict",
                "forecast",
                "compare",
                "comparison",
                "optimize",
                "optimization",
                "reasoning",
                "correlation",
                "root cause",
                "trend",
                "strategy",
            ]),
            simple_keywords: strings(&[
                "상태", "목록", "개수", "현재", "조회", "status", "list", "count", "current", "show",
            ]),
            technical_patterns: strings(&[
                r"(?i)(?:^|[^a-z0-9])(cpu|memory|ram|disk|network|bandwidth|latency|throughput|uptime|iops)(?:$|[^a-z0-9])|메모리|디스크|네트워크|트래픽|사용률|응답\s*시간",
                r"(?i)(?:^|[^a-z0-9])(servers?|hosts?|nodes?|cluster|database|db|containers?|pods?|kubernetes|k8s|nginx|redis)(?:$|[^a-z0-9])|서버|호스트|노드|클러스터|데이터베이스|컨테이너",
                r"(?i)(?:^|[^a-z0-9])(status|health|alerts?|alarms?|incidents?|outages?)(?:$|[^a-z0-9])|상태|장애|알림|경고",
            ]),
            interrogatives: strings(&[
                "why", "how", "what", "which", "when", "왜", "어떻게", "무엇", "어떤", "언제", "어디",
            ]),
            thresholds: RecommendationThresholds::default(),
        }
    }
}

impl AnalyzerConfig {
    /// Create a config with the default tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the factor weights.
    pub fn weights(mut self, weights: FactorWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Replace the complex keyword list.
    pub fn complex_keywords<I, S>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.complex_keywords = terms.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the simple keyword list.
    pub fn simple_keywords<I, S>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.simple_keywords = terms.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the technical regex groups.
    pub fn technical_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.technical_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the interrogative word list.
    pub fn interrogatives<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.interrogatives = words.into_iter().map(Into::into).collect();
        self
    }

    pub fn thresholds(mut self, thresholds: RecommendationThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Check weights and thresholds. Regexes are checked when compiled.
    pub fn validate(&self) -> Result<()> {
        self.weights.validate()?;
        let t = &self.thresholds;
        if t.cloud_min > 100 || t.hybrid_min > t.cloud_min {
            return Err(MuninnError::Configuration(format!(
                "recommendation thresholds out of order: hybrid_min={} cloud_min={}",
                t.hybrid_min, t.cloud_min
            )));
        }
        if self
            .complex_keywords
            .iter()
            .chain(&self.simple_keywords)
            .chain(&self.interrogatives)
            .any(|term| term.trim().is_empty())
        {
            return Err(MuninnError::Configuration(
                "keyword lists must not contain empty terms".to_string(),
            ));
        }
        Ok(())
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_weights_are_valid() {
        assert!(AnalyzerConfig::default().validate().is_ok());
    }

    #[test]
    fn weights_must_sum_to_one() {
        let config = AnalyzerConfig::new().weights(FactorWeights {
            length: 0.5,
            ..FactorWeights::default()
        });
        assert!(matches!(
            config.validate(),
            Err(MuninnError::Configuration(_))
        ));
    }

    #[test]
    fn negative_weight_rejected() {
        let weights = FactorWeights {
            length: -0.15,
            keyword: 0.55,
            ..FactorWeights::default()
        };
        assert!(weights.validate().is_err());
    }

    #[test]
    fn thresholds_out_of_order_rejected() {
        let config = AnalyzerConfig::new().thresholds(RecommendationThresholds {
            hybrid_min: 80,
            cloud_min: 70,
            ..RecommendationThresholds::default()
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: AnalyzerConfig = toml::from_str(
            r#"
            simple_keywords = ["ping"]

            [weights]
            length = 0.2
            keyword = 0.2
        "#,
        )
        .unwrap();
        assert_eq!(config.simple_keywords, vec!["ping"]);
        assert_eq!(config.weights.pattern, 0.25);
        assert!(!config.complex_keywords.is_empty());
        assert!(config.validate().is_ok());
    }
}
