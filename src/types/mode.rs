//! Engine modes, capability tags and the failure taxonomy

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which backend family should answer a query.
///
/// Used both as the analyzer's recommendation and as a caller-requested mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineMode {
    /// Local retrieval engine with domain context.
    Local,
    /// Cloud AI API.
    Cloud,
    /// Either family; priority decides.
    Hybrid,
}

impl EngineMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineMode::Local => "local",
            EngineMode::Cloud => "cloud",
            EngineMode::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for EngineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability tags an engine declares at registration.
///
/// `Local` and `Cloud` identify the backend family and drive chain
/// ordering and mode conflicts. An engine may carry both (a hybrid
/// backend). The remaining tags are descriptive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum Capability {
    /// Runs in-process or on-premise, no external API.
    Local,
    /// Calls an external AI API.
    Cloud,
    /// Has access to infrastructure/domain knowledge.
    DomainContext,
    /// Handles mixed-language input well.
    Multilingual,
    /// Suited to multi-step reasoning.
    Reasoning,
}

/// Failure taxonomy used to choose remediation text and aggregate metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureCategory {
    /// Backend unreachable within the deadline.
    NetworkTimeout,
    /// Backend quota hit.
    RateLimitExceeded,
    /// Backend reports a hard outage.
    BackendUnavailable,
    /// Local backend internal error.
    LocalEngineFailure,
    /// Supporting-context retrieval failed.
    ContextCollectionFailure,
    Unknown,
}

impl FailureCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureCategory::NetworkTimeout => "network-timeout",
            FailureCategory::RateLimitExceeded => "rate-limit-exceeded",
            FailureCategory::BackendUnavailable => "backend-unavailable",
            FailureCategory::LocalEngineFailure => "local-engine-failure",
            FailureCategory::ContextCollectionFailure => "context-collection-failure",
            FailureCategory::Unknown => "unknown",
        }
    }

    /// Classify a free-form failure reason.
    ///
    /// Checks are ordered from most to least specific; anything that does
    /// not match a known marker is `Unknown`.
    pub fn classify(reason: &str) -> Self {
        let msg = reason.to_lowercase();
        let has = |markers: &[&str]| markers.iter().any(|m| msg.contains(m));
        let has_word = |word: &str| {
            msg.split(|c: char| !c.is_alphanumeric())
                .any(|token| token == word)
        };

        if has(&["rate limit", "rate-limit", "429", "quota", "too many requests"]) {
            FailureCategory::RateLimitExceeded
        } else if has(&["context"]) {
            FailureCategory::ContextCollectionFailure
        } else if has(&["local", "vector", "embedding"]) || has_word("rag") {
            FailureCategory::LocalEngineFailure
        } else if has(&["unavailable", "outage", "503", "502", "maintenance"]) {
            FailureCategory::BackendUnavailable
        } else if has(&["timeout", "timed out", "deadline", "network", "connection", "econn"]) {
            FailureCategory::NetworkTimeout
        } else {
            FailureCategory::Unknown
        }
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_known_reasons() {
        assert_eq!(
            FailureCategory::classify("HTTP 429 Too Many Requests"),
            FailureCategory::RateLimitExceeded
        );
        assert_eq!(
            FailureCategory::classify("request timed out after 5s"),
            FailureCategory::NetworkTimeout
        );
        assert_eq!(
            FailureCategory::classify("Service Unavailable (503)"),
            FailureCategory::BackendUnavailable
        );
        assert_eq!(
            FailureCategory::classify("RAG index corrupted"),
            FailureCategory::LocalEngineFailure
        );
        assert_eq!(
            FailureCategory::classify("failed to collect server context"),
            FailureCategory::ContextCollectionFailure
        );
        assert_eq!(
            FailureCategory::classify("storage node stopped"),
            FailureCategory::Unknown
        );
        assert_eq!(
            FailureCategory::classify("¯\\_(ツ)_/¯"),
            FailureCategory::Unknown
        );
    }

    #[test]
    fn serde_names_match_display() {
        let json = serde_json::to_string(&FailureCategory::RateLimitExceeded).unwrap();
        assert_eq!(json, "\"rate-limit-exceeded\"");
        assert_eq!(EngineMode::Hybrid.to_string(), "hybrid");
    }
}
