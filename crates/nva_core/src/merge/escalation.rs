//! Escalation along a fallback chain.
//!
//! [`transition`] is the pure state machine; [`drive`] runs it against a
//! chain, asking the caller to execute one attempt per `Attempting` state.
//! The same machine serves merge strategies and overlay methods.

use serde::{Deserialize, Serialize};

use super::guard::ExecutionAttempt;
use crate::models::AttemptStatus;

/// Why escalation stopped without success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FatalReason {
    /// The engine was killed from outside; retrying would not help.
    Cancelled,
    /// Every strategy in the chain failed.
    Exhausted,
    EmptyChain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum EscalationState {
    Selecting,
    Attempting { index: usize },
    Succeeded { index: usize },
    Fatal {
        /// Chain position of the last attempt, if any ran.
        index: Option<usize>,
        reason: FatalReason,
    },
}

impl EscalationState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EscalationState::Succeeded { .. } | EscalationState::Fatal { .. }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationEvent {
    /// The chain is ready; start with its first entry.
    Begin,
    AttemptSucceeded,
    /// The current attempt ended with a non-success terminal status.
    AttemptFailed { status: AttemptStatus },
}

/// Advance the machine by one event.
///
/// Events that make no sense in the current state leave it unchanged;
/// terminal states absorb everything.
pub fn transition(
    state: EscalationState,
    event: EscalationEvent,
    chain_len: usize,
) -> EscalationState {
    use EscalationEvent as Ev;
    use EscalationState as St;

    match (state, event) {
        (St::Selecting, Ev::Begin) => {
            if chain_len == 0 {
                St::Fatal {
                    index: None,
                    reason: FatalReason::EmptyChain,
                }
            } else {
                St::Attempting { index: 0 }
            }
        }
        (St::Attempting { index }, Ev::AttemptSucceeded) => St::Succeeded { index },
        (St::Attempting { index }, Ev::AttemptFailed { status }) => {
            if status == AttemptStatus::Cancelled {
                St::Fatal {
                    index: Some(index),
                    reason: FatalReason::Cancelled,
                }
            } else if index + 1 < chain_len {
                St::Attempting { index: index + 1 }
            } else {
                St::Fatal {
                    index: Some(index),
                    reason: FatalReason::Exhausted,
                }
            }
        }
        (state, _) => state,
    }
}

/// Record of one escalation run.
#[derive(Debug, Clone)]
pub struct EscalationRun<S> {
    pub attempts: Vec<ExecutionAttempt<S>>,
    pub state: EscalationState,
}

impl<S: Copy> EscalationRun<S> {
    /// Strategy of the successful attempt.
    pub fn succeeded_with(&self) -> Option<S> {
        match self.state {
            EscalationState::Succeeded { .. } => self.attempts.last().map(|a| a.strategy),
            _ => None,
        }
    }

    pub fn last_attempt(&self) -> Option<&ExecutionAttempt<S>> {
        self.attempts.last()
    }

    pub fn fatal_reason(&self) -> Option<FatalReason> {
        match self.state {
            EscalationState::Fatal { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

/// Run `chain` left to right until an attempt succeeds or escalation turns
/// fatal. Errors from `run_attempt` (the engine could not be started at
/// all) abort immediately.
pub fn drive<S, E, F>(chain: &[S], mut run_attempt: F) -> Result<EscalationRun<S>, E>
where
    S: Copy,
    F: FnMut(S) -> Result<ExecutionAttempt<S>, E>,
{
    let mut attempts = Vec::with_capacity(chain.len());
    let mut state = transition(EscalationState::Selecting, EscalationEvent::Begin, chain.len());

    while let EscalationState::Attempting { index } = state {
        let attempt = run_attempt(chain[index])?;
        let event = if attempt.status == AttemptStatus::Succeeded {
            EscalationEvent::AttemptSucceeded
        } else {
            EscalationEvent::AttemptFailed {
                status: attempt.status,
            }
        };
        attempts.push(attempt);
        state = transition(state, event, chain.len());
    }

    Ok(EscalationRun { attempts, state })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ErrorClass, MergeStrategy};
    use proptest::prelude::*;
    use std::time::Duration;

    fn attempt(strategy: MergeStrategy, status: AttemptStatus) -> ExecutionAttempt<MergeStrategy> {
        ExecutionAttempt {
            strategy,
            budget: Duration::from_secs(60),
            status,
            error_class: (status != AttemptStatus::Succeeded).then_some(ErrorClass::Codec),
            message: None,
            elapsed: Duration::from_millis(5),
        }
    }

    const CHAIN: [MergeStrategy; 3] = [
        MergeStrategy::StreamCopy,
        MergeStrategy::Reencode,
        MergeStrategy::NormalizeConcat,
    ];

    #[test]
    fn begin_on_empty_chain_is_fatal() {
        let state = transition(EscalationState::Selecting, EscalationEvent::Begin, 0);
        assert_eq!(
            state,
            EscalationState::Fatal {
                index: None,
                reason: FatalReason::EmptyChain
            }
        );
    }

    #[test]
    fn failure_advances_to_next_strategy() {
        let state = transition(
            EscalationState::Attempting { index: 0 },
            EscalationEvent::AttemptFailed {
                status: AttemptStatus::TimedOut,
            },
            3,
        );
        assert_eq!(state, EscalationState::Attempting { index: 1 });
    }

    #[test]
    fn cancellation_is_fatal_immediately() {
        let state = transition(
            EscalationState::Attempting { index: 0 },
            EscalationEvent::AttemptFailed {
                status: AttemptStatus::Cancelled,
            },
            3,
        );
        assert_eq!(
            state,
            EscalationState::Fatal {
                index: Some(0),
                reason: FatalReason::Cancelled
            }
        );
    }

    #[test]
    fn terminal_states_absorb_events() {
        let done = EscalationState::Succeeded { index: 1 };
        assert_eq!(transition(done, EscalationEvent::Begin, 3), done);
        assert_eq!(
            transition(done, EscalationEvent::AttemptSucceeded, 3),
            done
        );
        assert!(done.is_terminal());
        assert!(!EscalationState::Selecting.is_terminal());
    }

    #[test]
    fn drive_stops_at_first_success() {
        let run: EscalationRun<MergeStrategy> = drive(&CHAIN, |s| {
            let status = if s == MergeStrategy::Reencode {
                AttemptStatus::Succeeded
            } else {
                AttemptStatus::Failed
            };
            Ok::<_, ()>(attempt(s, status))
        })
        .unwrap();

        assert_eq!(run.attempts.len(), 2);
        assert_eq!(run.succeeded_with(), Some(MergeStrategy::Reencode));
        assert_eq!(run.state, EscalationState::Succeeded { index: 1 });
    }

    #[test]
    fn drive_stops_on_cancellation() {
        let run = drive(&CHAIN, |s| Ok::<_, ()>(attempt(s, AttemptStatus::Cancelled))).unwrap();
        assert_eq!(run.attempts.len(), 1);
        assert_eq!(run.fatal_reason(), Some(FatalReason::Cancelled));
    }

    #[test]
    fn drive_propagates_start_errors() {
        let result: Result<EscalationRun<MergeStrategy>, &str> =
            drive(&CHAIN, |_| Err("ffmpeg not found"));
        assert_eq!(result.unwrap_err(), "ffmpeg not found");
    }

    proptest! {
        #[test]
        fn k_failures_exhaust_chain(k in 1usize..8) {
            let chain = vec![MergeStrategy::Reencode; k];
            let run = drive(&chain, |s| Ok::<_, ()>(attempt(s, AttemptStatus::Failed))).unwrap();
            prop_assert_eq!(run.attempts.len(), k);
            prop_assert_eq!(
                run.state,
                EscalationState::Fatal { index: Some(k - 1), reason: FatalReason::Exhausted }
            );
        }

        #[test]
        fn success_after_k_minus_one_failures(k in 1usize..8) {
            let chain = vec![MergeStrategy::Reencode; k];
            let mut runs = 0;
            let run = drive(&chain, |s| {
                runs += 1;
                let status = if runs == k { AttemptStatus::Succeeded } else { AttemptStatus::TimedOut };
                Ok::<_, ()>(attempt(s, status))
            })
            .unwrap();
            prop_assert_eq!(run.attempts.len(), k);
            prop_assert_eq!(run.state, EscalationState::Succeeded { index: k - 1 });
        }
    }
}
