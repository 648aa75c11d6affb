//! Degraded-response text.
//!
//! Text is assembled from per-mode and per-category tables. Only the
//! subsystem labels name a backend family, so a local-mode message cannot
//! mention the cloud service and a cloud-mode message cannot mention the
//! local engine.

use std::fmt::Write as _;
use std::time::Duration;

use crate::types::{EngineMode, FailureCategory};

/// Longest query echo, in characters.
const ECHO_MAX_CHARS: usize = 200;

pub(super) fn subsystems(mode: EngineMode) -> &'static [&'static str] {
    match mode {
        EngineMode::Local => &["local retrieval engine", "domain context index"],
        EngineMode::Cloud => &["cloud AI service", "external API gateway"],
        EngineMode::Hybrid => &["local retrieval engine", "cloud AI service"],
    }
}

fn primary_subsystem(mode: EngineMode) -> &'static str {
    match mode {
        EngineMode::Local => "local retrieval engine",
        EngineMode::Cloud => "cloud AI service",
        EngineMode::Hybrid => "answer engines",
    }
}

fn title(category: FailureCategory) -> &'static str {
    match category {
        FailureCategory::NetworkTimeout => "network timeout",
        FailureCategory::RateLimitExceeded => "rate limit exceeded",
        FailureCategory::BackendUnavailable => "backend unavailable",
        FailureCategory::LocalEngineFailure => "engine internal failure",
        FailureCategory::ContextCollectionFailure => "context collection failure",
        FailureCategory::Unknown => "unexpected error",
    }
}

fn remediation(category: FailureCategory, subsystem: &str) -> [String; 3] {
    match category {
        FailureCategory::NetworkTimeout => [
            format!("Check network connectivity to the {subsystem}."),
            "Retry the request in a few seconds.".to_string(),
            "Raise the engine timeout if the backend is known to be slow.".to_string(),
        ],
        FailureCategory::RateLimitExceeded => [
            format!("Wait before retrying; the {subsystem} quota is exhausted."),
            "Reduce request volume or raise the quota.".to_string(),
            "Repeated questions are served from cache once answered.".to_string(),
        ],
        FailureCategory::BackendUnavailable => [
            format!("Check the status of the {subsystem}."),
            "Confirm that at least one engine is enabled for this mode.".to_string(),
            "Retry once the service has recovered.".to_string(),
        ],
        FailureCategory::LocalEngineFailure => [
            format!("Inspect the {subsystem} logs for internal errors."),
            "Verify that its index and embeddings are loaded.".to_string(),
            "Restart the engine process if the error persists.".to_string(),
        ],
        FailureCategory::ContextCollectionFailure => [
            "Check the data sources that supply query context.".to_string(),
            "Retry the query without attached context.".to_string(),
            "Verify credentials for the metric and log collectors.".to_string(),
        ],
        FailureCategory::Unknown => [
            "Retry the request.".to_string(),
            "Check the router logs for the underlying error.".to_string(),
            "Contact the operator if the problem persists.".to_string(),
        ],
    }
}

pub(super) fn render(
    mode: EngineMode,
    category: FailureCategory,
    query: &str,
    elapsed: Duration,
) -> String {
    let subsystem = primary_subsystem(mode);
    let mut out = String::new();
    // Writing to a String cannot fail.
    let _ = writeln!(
        out,
        "Degraded answer: the {subsystem} could not complete this request."
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "Failure: {}", title(category));
    let _ = writeln!(out, "Affected: {}", subsystems(mode).join(", "));
    let _ = writeln!(out);
    let _ = writeln!(out, "Suggested steps:");
    for (i, step) in remediation(category, subsystem).iter().enumerate() {
        let _ = writeln!(out, "{}. {step}", i + 1);
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "Query: \"{}\"", echo(query));
    let _ = write!(out, "Elapsed: {} ms", elapsed.as_millis());
    out
}

fn echo(query: &str) -> String {
    let trimmed = query.trim();
    if trimmed.chars().count() <= ECHO_MAX_CHARS {
        return trimmed.to_string();
    }
    let mut cut: String = trimmed.chars().take(ECHO_MAX_CHARS).collect();
    cut.push('…');
    cut
}
