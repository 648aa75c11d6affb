//! The engine router.
//!
//! [`EngineRouter::route`] takes a [`Query`] all the way to an answer:
//!
//! 1. Score the query with the [`ComplexityAnalyzer`].
//! 2. Look the normalized query up in the cache; a hit returns at once.
//! 3. Plan a chain of enabled engines (see [`chain::plan_chain`]).
//! 4. Try candidates one at a time, retrying transient failures with
//!    exponential backoff, until one answers.
//! 5. Cache the answer and return it with `fallbacks_used` set to the
//!    number of candidates that failed before it.
//! 6. If every candidate failed, return the [`FallbackHandler`]'s degraded
//!    response instead.
//!
//! `route` never returns an error. Callers tell a degraded answer apart by
//! its confidence, `fallbacks_used` and [`EngineResponse::is_degraded`].
//!
//! A forced engine (`RouteOptions::force_engine`) skips scoring and the
//! cache and runs a one-candidate chain.

mod builder;
pub mod chain;

pub use builder::{Muninn, MuninnBuilder};

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use self::chain::{ChainEvent, ChainLimits, ChainState, plan_chain};
use crate::analyzer::ComplexityAnalyzer;
use crate::cache::{CacheLayer, SetOptions};
use crate::engine::{EngineRegistry, RegisteredEngine, RetryConfig};
use crate::error::EngineError;
use crate::fallback::{FallbackHandler, RequestEcho};
use crate::telemetry;
use crate::types::{Capability, EngineMode, EngineResponse, FailureCategory, Query};

/// Cache namespace holding routed answers.
pub const QUERY_NAMESPACE: &str = "queries";

/// Routes queries across registered engines. Build one with
/// [`Muninn::builder`].
pub struct EngineRouter {
    analyzer: ComplexityAnalyzer,
    cache: Arc<CacheLayer>,
    registry: EngineRegistry,
    fallback: Arc<FallbackHandler>,
    retry: RetryConfig,
}

impl EngineRouter {
    pub fn builder() -> MuninnBuilder {
        MuninnBuilder::new()
    }

    pub fn analyzer(&self) -> &ComplexityAnalyzer {
        &self.analyzer
    }

    pub fn cache(&self) -> &Arc<CacheLayer> {
        &self.cache
    }

    /// The registry, for runtime toggles and descriptors.
    pub fn registry(&self) -> &EngineRegistry {
        &self.registry
    }

    pub fn fallback(&self) -> &Arc<FallbackHandler> {
        &self.fallback
    }

    /// Answer `query`. Never fails.
    #[instrument(
        name = "route",
        skip_all,
        fields(
            chars = query.text().chars().count(),
            forced = query.options().force_engine.is_some(),
        )
    )]
    pub async fn route(&self, query: &Query) -> EngineResponse {
        let started = Instant::now();
        let options = query.options();
        let deadline = options.deadline.map(|budget| Deadline {
            at: started + budget,
            budget,
        });

        if let Some(id) = options.force_engine.as_deref() {
            return self.route_forced(query, id, started, deadline).await;
        }

        let score = self.analyzer.analyze_query(query);
        metrics::histogram!(telemetry::COMPLEXITY_SCORE,
            "recommendation" => score.recommendation.as_str(),
        )
        .record(f64::from(score.score));
        debug!(
            score = score.score,
            recommendation = %score.recommendation,
            confidence = score.confidence,
            "scored query"
        );

        let use_cache = !options.bypass_cache;
        let key = cache_key(query);
        if use_cache
            && let Some(mut cached) = self.cache.get::<EngineResponse>(&key, Some(QUERY_NAMESPACE))
        {
            cached.metadata.cache_hit = true;
            cached.metadata.fallbacks_used = 0;
            cached.metadata.complexity = Some(score);
            return cached;
        }

        let engines: Vec<&RegisteredEngine> = self.registry.iter().collect();
        let chain: Vec<&RegisteredEngine> =
            plan_chain(&self.registry.descriptors(), score.recommendation, options.mode)
                .into_iter()
                .filter_map(|i| engines.get(i).copied())
                .collect();
        debug!(
            chain = ?chain.iter().map(|e| e.id()).collect::<Vec<_>>(),
            "planned chain"
        );

        let mode = fallback_mode(options.mode, &chain, score.recommendation);
        let mut response = self
            .run_chain(query, &chain, mode, started, deadline, None)
            .await;

        if use_cache && !response.is_degraded() {
            let options = SetOptions::new()
                .namespace(QUERY_NAMESPACE)
                .pattern(query.text())
                .response_time(started.elapsed());
            if let Err(e) = self.cache.set(&key, &response, options) {
                warn!(error = %e, "failed to cache response");
            }
        }
        response.metadata.complexity = Some(score);
        response
    }

    async fn route_forced(
        &self,
        query: &Query,
        id: &str,
        started: Instant,
        deadline: Option<Deadline>,
    ) -> EngineResponse {
        let engine = self.registry.get(id);
        let chain: Vec<&RegisteredEngine> = engine.filter(|e| e.is_enabled()).into_iter().collect();
        let unavailable = match engine {
            None => Some(format!("engine {id} is not registered")),
            Some(e) if !e.is_enabled() => Some(format!("engine {id} is disabled")),
            Some(_) => None,
        };
        let mode = fallback_mode(query.options().mode, &chain, EngineMode::Hybrid);
        self.run_chain(query, &chain, mode, started, deadline, unavailable)
            .await
    }

    /// Walk `chain` until a candidate answers or the chain is exhausted.
    async fn run_chain(
        &self,
        query: &Query,
        chain: &[&RegisteredEngine],
        mode: EngineMode,
        started: Instant,
        deadline: Option<Deadline>,
        empty_reason: Option<String>,
    ) -> EngineResponse {
        let mut state = ChainState::start(chain.len());
        let mut failed: u32 = 0;
        let mut last_error: Option<EngineError> = None;
        let mut answer: Option<EngineResponse> = None;
        let mut degraded: Option<EngineResponse> = None;

        while !state.is_terminal() {
            let engine = state.candidate().and_then(|i| chain.get(i).copied());
            let retry = engine.map_or(&self.retry, |e| self.retry_for(e));
            let limits = ChainLimits {
                candidates: chain.len(),
                max_attempts: retry.max_attempts.max(1),
            };

            state = match state.clone() {
                ChainState::Pending { .. } | ChainState::Retrying { .. } => {
                    let Some(engine) = engine else {
                        // Candidate index outside the chain; treat as exhausted.
                        state = ChainState::Exhausted {
                            last_error: last_error.clone(),
                        };
                        continue;
                    };

                    if let ChainState::Retrying { failures, .. } = state {
                        let delay = retry.effective_delay(
                            failures.saturating_sub(1),
                            last_error.as_ref().and_then(EngineError::retry_after),
                        );
                        if let Some(d) = deadline
                            && Instant::now() + delay >= d.at
                        {
                            state = state.next(ChainEvent::DeadlineExpired(d.budget), limits);
                            continue;
                        }
                        metrics::counter!(telemetry::RETRIES_TOTAL,
                            "engine" => engine.id().to_owned(),
                        )
                        .increment(1);
                        warn!(
                            engine = engine.id(),
                            attempt = failures + 1,
                            max_attempts = limits.max_attempts,
                            delay_ms = delay.as_millis() as u64,
                            error = ?last_error,
                            "retrying after transient error"
                        );
                        tokio::time::sleep(delay).await;
                    }

                    let mut timeout = engine.settings().timeout;
                    if let Some(d) = deadline {
                        let remaining = d.at.saturating_duration_since(Instant::now());
                        if remaining.is_zero() {
                            state = state.next(ChainEvent::DeadlineExpired(d.budget), limits);
                            continue;
                        }
                        timeout = timeout.min(remaining);
                    }

                    match self.attempt(engine, query, timeout).await {
                        Ok(response) => {
                            answer = Some(response);
                            state.next(ChainEvent::Succeeded, limits)
                        }
                        Err(error) => {
                            debug!(engine = engine.id(), error = %error, "attempt failed");
                            last_error = Some(error.clone());
                            state.next(ChainEvent::AttemptFailed(error), limits)
                        }
                    }
                }
                ChainState::Failed { candidate, error } => {
                    failed += 1;
                    warn!(
                        engine = chain.get(candidate).map(|e| e.id()),
                        category = error.category().as_str(),
                        error = %error,
                        "engine failed, advancing chain"
                    );
                    state.next(ChainEvent::Advance, limits)
                }
                ChainState::Exhausted { last_error } => {
                    let echo = RequestEcho::new(query.text(), started.elapsed());
                    let mut response = match (&last_error, &empty_reason) {
                        (Some(error), _) => self.fallback.build_with_category(
                            mode,
                            error.category(),
                            &error.to_string(),
                            &echo,
                        ),
                        (None, reason) => self.fallback.build_with_category(
                            mode,
                            FailureCategory::BackendUnavailable,
                            reason
                                .as_deref()
                                .unwrap_or("no enabled engine is available for this request"),
                            &echo,
                        ),
                    };
                    // The emergency response counts as a fallback of its own.
                    response.metadata.fallbacks_used = failed + 1;
                    degraded = Some(response);
                    state.next(ChainEvent::FallbackIssued, limits)
                }
                ChainState::Done { .. } | ChainState::Fallback => break,
            };
        }

        match (answer, degraded) {
            (Some(mut response), _) => {
                response.metadata.fallbacks_used = failed;
                response.metadata.cache_hit = false;
                response
            }
            (None, Some(response)) => response,
            (None, None) => {
                // Unreachable through valid transitions; still answer.
                let echo = RequestEcho::new(query.text(), started.elapsed());
                let mut response = self.fallback.build(mode, "routing ended without an answer", &echo);
                response.metadata.fallbacks_used = failed + 1;
                response
            }
        }
    }

    /// One attempt on one engine under `timeout`.
    async fn attempt(
        &self,
        engine: &RegisteredEngine,
        query: &Query,
        timeout: Duration,
    ) -> std::result::Result<EngineResponse, EngineError> {
        let start = Instant::now();
        let result = match tokio::time::timeout(timeout, engine.adapter().invoke(query, timeout)).await
        {
            Ok(result) => result,
            Err(_) => Err(EngineError::Timeout(timeout)),
        };
        let result = result.and_then(|response| {
            if response.success {
                Ok(response)
            } else {
                Err(EngineError::Unsuccessful(response.content))
            }
        });

        let elapsed = start.elapsed();
        engine.latency().record(elapsed);
        record_attempt(engine.id(), elapsed, result.is_ok());

        result.map(|mut response| {
            if response.processing_time_ms == 0 {
                response.processing_time_ms = elapsed.as_millis() as u64;
            }
            if response.engine_id.is_empty() {
                response.engine_id = engine.id().to_owned();
            }
            response
        })
    }

    fn retry_for<'a>(&'a self, engine: &'a RegisteredEngine) -> &'a RetryConfig {
        engine.settings().retry.as_ref().unwrap_or(&self.retry)
    }
}

#[derive(Debug, Clone, Copy)]
struct Deadline {
    at: Instant,
    budget: Duration,
}

/// Mode reported by a degraded response: the requested one, else the
/// family of the engines that were planned, else `otherwise`.
fn fallback_mode(
    requested: Option<EngineMode>,
    chain: &[&RegisteredEngine],
    otherwise: EngineMode,
) -> EngineMode {
    if let Some(mode) = requested {
        return mode;
    }
    let local = chain
        .iter()
        .any(|e| e.capabilities().contains(&Capability::Local));
    let cloud = chain
        .iter()
        .any(|e| e.capabilities().contains(&Capability::Cloud));
    match (local, cloud) {
        (true, false) => EngineMode::Local,
        (false, true) => EngineMode::Cloud,
        (true, true) => EngineMode::Hybrid,
        (false, false) => otherwise,
    }
}

fn record_attempt(engine: &str, elapsed: Duration, ok: bool) {
    let status = if ok { "ok" } else { "error" };
    metrics::counter!(telemetry::REQUESTS_TOTAL,
        "engine" => engine.to_owned(),
        "status" => status,
    )
    .increment(1);
    metrics::histogram!(telemetry::REQUEST_DURATION_SECONDS,
        "engine" => engine.to_owned(),
    )
    .record(elapsed.as_secs_f64());
}

/// Cache key over normalized text, context and requested mode.
///
/// Case and whitespace runs in the text do not change the key.
pub fn cache_key(query: &Query) -> String {
    let mut hasher = DefaultHasher::new();
    let text = query.text().to_lowercase();
    for word in text.split_whitespace() {
        word.hash(&mut hasher);
    }
    if let Some(context) = query.context() {
        // serde_json maps are ordered, so equal contexts hash equally.
        serde_json::to_string(context)
            .unwrap_or_default()
            .hash(&mut hasher);
    }
    query.options().mode.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}
