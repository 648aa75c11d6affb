//! Chain planning and the per-request state machine.
//!
//! Both halves are pure so they can be tested without any backend:
//! [`plan_chain`] orders candidates, [`ChainState::next`] decides what
//! happens after each attempt.
//!
//! ```text
//! Pending(i) ──ok──────────────────────────────▶ Done(i)
//!    │ err (transient, attempts left)
//!    ▼
//! Retrying(i, n) ──ok──▶ Done(i)
//!    │ err (permanent, or attempts spent)
//!    ▼
//! Failed(i) ──advance──▶ Pending(i + 1)
//!    │ no candidates left
//!    ▼
//! Exhausted ──fallback issued──▶ Fallback
//! ```
//!
//! A spent deadline moves any running state straight to `Exhausted`.

use std::time::Duration;

use crate::engine::EngineDescriptor;
use crate::engine::traits::{affinity, conflicts_with};
use crate::error::EngineError;
use crate::types::EngineMode;

/// Order candidate engines for one request.
///
/// Disabled engines and engines conflicting with the `requested` mode are
/// dropped. The rest are ordered by affinity to `recommendation`, then by
/// ascending priority, then by registration order. Returns indices into
/// `engines`.
pub fn plan_chain(
    engines: &[EngineDescriptor],
    recommendation: EngineMode,
    requested: Option<EngineMode>,
) -> Vec<usize> {
    let mut chain: Vec<usize> = engines
        .iter()
        .enumerate()
        .filter(|(_, e)| e.enabled)
        .filter(|(_, e)| !requested.is_some_and(|mode| conflicts_with(&e.capabilities, mode)))
        .map(|(i, _)| i)
        .collect();
    chain.sort_by_key(|&i| {
        let e = &engines[i];
        (affinity(&e.capabilities, recommendation), e.priority, i)
    });
    chain
}

/// Where a request stands in its chain.
#[derive(Debug, Clone, PartialEq)]
pub enum ChainState {
    /// About to make the first attempt on `candidate`.
    Pending { candidate: usize },
    /// About to retry `candidate` after `failures` failed attempts.
    Retrying { candidate: usize, failures: u32 },
    /// `candidate` is out of attempts.
    Failed { candidate: usize, error: EngineError },
    /// No candidate succeeded. `last_error` is `None` for an empty chain.
    Exhausted { last_error: Option<EngineError> },
    /// A degraded response was issued.
    Fallback,
    /// `candidate` answered.
    Done { candidate: usize },
}

/// Input to [`ChainState::next`].
#[derive(Debug, Clone, PartialEq)]
pub enum ChainEvent {
    Succeeded,
    AttemptFailed(EngineError),
    /// Move past a failed candidate.
    Advance,
    /// The caller's overall deadline ran out.
    DeadlineExpired(Duration),
    FallbackIssued,
}

/// Bounds that shape transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainLimits {
    pub candidates: usize,
    /// Attempt budget of the current candidate.
    pub max_attempts: u32,
}

impl ChainState {
    /// Initial state for a chain of `candidates` engines.
    pub fn start(candidates: usize) -> Self {
        if candidates == 0 {
            ChainState::Exhausted { last_error: None }
        } else {
            ChainState::Pending { candidate: 0 }
        }
    }

    /// The candidate an attempt should be made on, if any.
    pub fn candidate(&self) -> Option<usize> {
        match self {
            ChainState::Pending { candidate } | ChainState::Retrying { candidate, .. } => {
                Some(*candidate)
            }
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ChainState::Done { .. } | ChainState::Fallback)
    }

    /// Apply `event`. Events that make no sense in the current state leave
    /// it unchanged.
    pub fn next(self, event: ChainEvent, limits: ChainLimits) -> ChainState {
        use ChainState::*;

        match (self, event) {
            (Pending { candidate } | Retrying { candidate, .. }, ChainEvent::Succeeded) => {
                Done { candidate }
            }
            (Pending { candidate }, ChainEvent::AttemptFailed(error)) => {
                after_failure(candidate, 1, error, limits)
            }
            (Retrying { candidate, failures }, ChainEvent::AttemptFailed(error)) => {
                after_failure(candidate, failures + 1, error, limits)
            }
            (Failed { candidate, error }, ChainEvent::Advance) => {
                if candidate + 1 < limits.candidates {
                    Pending {
                        candidate: candidate + 1,
                    }
                } else {
                    Exhausted {
                        last_error: Some(error),
                    }
                }
            }
            (
                Pending { .. } | Retrying { .. } | Failed { .. },
                ChainEvent::DeadlineExpired(budget),
            ) => Exhausted {
                last_error: Some(EngineError::Timeout(budget)),
            },
            (Exhausted { .. }, ChainEvent::FallbackIssued) => Fallback,
            (state, _) => state,
        }
    }
}

fn after_failure(
    candidate: usize,
    failures: u32,
    error: EngineError,
    limits: ChainLimits,
) -> ChainState {
    if error.is_transient() && failures < limits.max_attempts {
        ChainState::Retrying {
            candidate,
            failures,
        }
    } else {
        ChainState::Failed { candidate, error }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Capability;

    fn descriptor(id: &str, priority: u32, enabled: bool, caps: &[Capability]) -> EngineDescriptor {
        EngineDescriptor {
            id: id.to_owned(),
            priority,
            enabled,
            capabilities: caps.to_vec(),
            average_latency_ms: None,
        }
    }

    fn engines() -> Vec<EngineDescriptor> {
        vec![
            descriptor("cloud-ai", 10, true, &[Capability::Cloud]),
            descriptor("local-rag", 20, true, &[Capability::Local]),
            descriptor("local-backup", 20, true, &[Capability::Local]),
            descriptor("disabled", 1, false, &[Capability::Local]),
        ]
    }

    const LIMITS: ChainLimits = ChainLimits {
        candidates: 2,
        max_attempts: 3,
    };

    // ========================================================================
    // Planning
    // ========================================================================

    #[test]
    fn affinity_beats_priority() {
        assert_eq!(plan_chain(&engines(), EngineMode::Local, None), [1, 2, 0]);
        assert_eq!(plan_chain(&engines(), EngineMode::Cloud, None), [0, 1, 2]);
    }

    #[test]
    fn hybrid_falls_back_to_priority_then_registration() {
        assert_eq!(plan_chain(&engines(), EngineMode::Hybrid, None), [0, 1, 2]);
    }

    #[test]
    fn requested_mode_excludes_conflicting_engines() {
        assert_eq!(
            plan_chain(&engines(), EngineMode::Cloud, Some(EngineMode::Local)),
            [1, 2]
        );
        assert_eq!(
            plan_chain(&engines(), EngineMode::Local, Some(EngineMode::Cloud)),
            [0]
        );
    }

    #[test]
    fn disabled_engines_never_planned() {
        let all_off: Vec<_> = engines()
            .into_iter()
            .map(|mut e| {
                e.enabled = false;
                e
            })
            .collect();
        assert!(plan_chain(&all_off, EngineMode::Local, None).is_empty());
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    #[test]
    fn empty_chain_starts_exhausted() {
        assert_eq!(ChainState::start(0), ChainState::Exhausted { last_error: None });
        assert_eq!(ChainState::start(2), ChainState::Pending { candidate: 0 });
    }

    #[test]
    fn success_short_circuits() {
        let state = ChainState::start(2).next(ChainEvent::Succeeded, LIMITS);
        assert_eq!(state, ChainState::Done { candidate: 0 });
        assert!(state.is_terminal());
    }

    #[test]
    fn transient_failures_retry_until_budget_spent() {
        let timeout = EngineError::Timeout(Duration::from_secs(1));
        let mut state = ChainState::start(2);

        state = state.next(ChainEvent::AttemptFailed(timeout.clone()), LIMITS);
        assert_eq!(
            state,
            ChainState::Retrying {
                candidate: 0,
                failures: 1
            }
        );
        state = state.next(ChainEvent::AttemptFailed(timeout.clone()), LIMITS);
        assert_eq!(
            state,
            ChainState::Retrying {
                candidate: 0,
                failures: 2
            }
        );
        state = state.next(ChainEvent::AttemptFailed(timeout.clone()), LIMITS);
        assert_eq!(
            state,
            ChainState::Failed {
                candidate: 0,
                error: timeout
            }
        );
    }

    #[test]
    fn permanent_failure_skips_retry() {
        let error = EngineError::Unavailable("HTTP 503".into());
        let state = ChainState::start(2).next(ChainEvent::AttemptFailed(error.clone()), LIMITS);
        assert_eq!(state, ChainState::Failed { candidate: 0, error });
    }

    #[test]
    fn advance_moves_on_then_exhausts() {
        let error = EngineError::LocalEngine("index missing".into());
        let failed = ChainState::Failed {
            candidate: 0,
            error: error.clone(),
        };
        assert_eq!(
            failed.next(ChainEvent::Advance, LIMITS),
            ChainState::Pending { candidate: 1 }
        );

        let last = ChainState::Failed {
            candidate: 1,
            error: error.clone(),
        };
        let exhausted = last.next(ChainEvent::Advance, LIMITS);
        assert_eq!(
            exhausted,
            ChainState::Exhausted {
                last_error: Some(error)
            }
        );
        assert_eq!(
            exhausted.next(ChainEvent::FallbackIssued, LIMITS),
            ChainState::Fallback
        );
    }

    #[test]
    fn deadline_exhausts_immediately() {
        let budget = Duration::from_millis(250);
        let state = ChainState::Retrying {
            candidate: 0,
            failures: 1,
        }
        .next(ChainEvent::DeadlineExpired(budget), LIMITS);
        assert_eq!(
            state,
            ChainState::Exhausted {
                last_error: Some(EngineError::Timeout(budget))
            }
        );
    }

    #[test]
    fn single_attempt_budget_never_retries() {
        let limits = ChainLimits {
            candidates: 1,
            max_attempts: 1,
        };
        let state = ChainState::start(1).next(
            ChainEvent::AttemptFailed(EngineError::Network("reset".into())),
            limits,
        );
        assert!(matches!(state, ChainState::Failed { .. }));
    }

    #[test]
    fn nonsense_events_are_ignored() {
        let done = ChainState::Done { candidate: 0 };
        assert_eq!(done.clone().next(ChainEvent::Advance, LIMITS), done);
        assert_eq!(
            ChainState::Fallback.next(ChainEvent::Succeeded, LIMITS),
            ChainState::Fallback
        );
    }
}
