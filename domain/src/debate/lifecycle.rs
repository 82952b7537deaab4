//! Debate lifecycle state machine.
//!
//! ```text
//! configuring ─START─▶ initializing ─READY─▶ awaiting_opening
//!                                                 │ RESPONSES_RECEIVED
//!                                                 ▼
//!          ┌──────── CONTINUE ──────────── running_round
//!          │                                      │ ROUND_COMPLETE
//!          ▼                                      ▼
//!     running_round ◀─────────────────── evaluating_round ─STOP─▶ judging_final
//!                                                                      │ VERDICT_READY
//!                                                                      ▼
//!                                                                  completed
//! ```
//!
//! `paused` is reachable from every active state and resumes to the state
//! it was paused from. Round progress that finishes while paused advances
//! that resume target. `error` is terminal unless a retry is allowed.

use super::config::DebateConfiguration;
use super::guards::StopReason;
use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum number of retries out of `error`.
pub const MAX_RETRIES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebateState {
    Configuring,
    Initializing,
    AwaitingOpening,
    RunningRound,
    EvaluatingRound,
    JudgingFinal,
    Completed,
    Paused,
    Error,
}

impl DebateState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DebateState::Configuring => "configuring",
            DebateState::Initializing => "initializing",
            DebateState::AwaitingOpening => "awaiting_opening",
            DebateState::RunningRound => "running_round",
            DebateState::EvaluatingRound => "evaluating_round",
            DebateState::JudgingFinal => "judging_final",
            DebateState::Completed => "completed",
            DebateState::Paused => "paused",
            DebateState::Error => "error",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(
            self,
            DebateState::Initializing
                | DebateState::AwaitingOpening
                | DebateState::RunningRound
                | DebateState::EvaluatingRound
                | DebateState::JudgingFinal
        )
    }

    /// No further progress without an external action.
    pub fn is_terminal(&self) -> bool {
        matches!(self, DebateState::Completed | DebateState::Error)
    }
}

impl std::fmt::Display for DebateState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    Start,
    Ready,
    ResponsesReceived,
    RoundComplete,
    Continue,
    Stop(StopReason),
    VerdictReady,
    Pause,
    Resume,
    FatalError { message: String, retryable: bool },
    Retry,
}

impl LifecycleEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::Start => "START",
            LifecycleEvent::Ready => "READY",
            LifecycleEvent::ResponsesReceived => "RESPONSES_RECEIVED",
            LifecycleEvent::RoundComplete => "ROUND_COMPLETE",
            LifecycleEvent::Continue => "CONTINUE",
            LifecycleEvent::Stop(_) => "STOP",
            LifecycleEvent::VerdictReady => "VERDICT_READY",
            LifecycleEvent::Pause => "PAUSE",
            LifecycleEvent::Resume => "RESUME",
            LifecycleEvent::FatalError { .. } => "FATAL_ERROR",
            LifecycleEvent::Retry => "RETRY",
        }
    }

    /// Events produced by the debate's own progress rather than a control call.
    fn is_progress(&self) -> bool {
        matches!(
            self,
            LifecycleEvent::ResponsesReceived
                | LifecycleEvent::RoundComplete
                | LifecycleEvent::Continue
                | LifecycleEvent::Stop(_)
                | LifecycleEvent::VerdictReady
        )
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransitionError {
    #[error("{event} is not valid from state {state}")]
    InvalidTransition {
        state: DebateState,
        event: &'static str,
    },

    #[error("Retry not allowed: {0}")]
    RetryNotAllowed(String),

    #[error("Invalid configuration: {0}")]
    Validation(#[from] DomainError),
}

/// The error that put the debate into `error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleError {
    pub message: String,
    pub retryable: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DebateLifecycle {
    state: DebateState,
    resume_to: Option<DebateState>,
    retry_count: u32,
    last_error: Option<LifecycleError>,
    stop_reason: Option<StopReason>,
    stop_requested: bool,
}

impl Default for DebateLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl DebateLifecycle {
    pub fn new() -> Self {
        Self {
            state: DebateState::Configuring,
            resume_to: None,
            retry_count: 0,
            last_error: None,
            stop_reason: None,
            stop_requested: false,
        }
    }

    /// A debate reloaded from storage with its verdict already delivered.
    pub fn restored_completed(stop_reason: StopReason) -> Self {
        Self {
            state: DebateState::Completed,
            stop_reason: Some(stop_reason),
            ..Self::new()
        }
    }

    pub fn state(&self) -> DebateState {
        self.state
    }

    /// State the debate resumes to; `None` unless paused.
    pub fn resume_to(&self) -> Option<DebateState> {
        self.resume_to
    }

    /// The state the debate is effectively in, looking through a pause.
    pub fn effective_state(&self) -> DebateState {
        self.resume_to.unwrap_or(self.state)
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn last_error(&self) -> Option<&LifecycleError> {
        self.last_error.as_ref()
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested
    }

    pub fn is_paused(&self) -> bool {
        self.state == DebateState::Paused
    }

    /// START with validation. An invalid configuration moves to `error`
    /// with a non-retryable error.
    pub fn start(&mut self, config: &DebateConfiguration) -> Result<DebateState, TransitionError> {
        if self.state != DebateState::Configuring {
            return Err(self.invalid(&LifecycleEvent::Start));
        }
        if let Err(e) = config.validate() {
            self.state = DebateState::Error;
            self.last_error = Some(LifecycleError {
                message: e.to_string(),
                retryable: false,
            });
            return Err(TransitionError::Validation(e));
        }
        self.apply(LifecycleEvent::Start)
    }

    /// Lazy stop: from `paused` go straight to final judging, otherwise
    /// remember the request for the guards after the in-flight round.
    pub fn request_stop(&mut self) -> Result<DebateState, TransitionError> {
        match self.state {
            DebateState::Paused => self.apply(LifecycleEvent::Stop(StopReason::UserRequested)),
            s if s.is_active() => {
                self.stop_requested = true;
                Ok(s)
            }
            s => Err(TransitionError::InvalidTransition {
                state: s,
                event: "STOP",
            }),
        }
    }

    pub fn apply(&mut self, event: LifecycleEvent) -> Result<DebateState, TransitionError> {
        use DebateState as S;
        use LifecycleEvent as E;

        match (self.state, &event) {
            (S::Paused, E::Resume) => {
                self.state = self.resume_to.take().unwrap_or(S::Initializing);
            }
            (S::Paused, E::Stop(StopReason::UserRequested)) => {
                self.resume_to = None;
                self.stop_reason = Some(StopReason::UserRequested);
                self.state = S::JudgingFinal;
            }
            (S::Paused, E::VerdictReady) => {
                self.resume_to = None;
                self.state = S::Completed;
            }
            (S::Paused, e) if e.is_progress() => {
                let from = self.resume_to.unwrap_or(S::Initializing);
                let next = Self::next_state(from, e).ok_or(TransitionError::InvalidTransition {
                    state: from,
                    event: e.name(),
                })?;
                if let E::Stop(reason) = e {
                    self.stop_reason = Some(*reason);
                }
                self.resume_to = Some(next);
            }
            (S::Paused, E::Ready) => {
                self.resume_to = Some(S::AwaitingOpening);
            }
            (s, E::Pause) if s.is_active() => {
                self.resume_to = Some(s);
                self.state = S::Paused;
            }
            (S::Completed, E::FatalError { .. }) => return Err(self.invalid(&event)),
            (_, E::FatalError { message, retryable }) => {
                self.resume_to = None;
                self.last_error = Some(LifecycleError {
                    message: message.clone(),
                    retryable: *retryable,
                });
                self.state = S::Error;
            }
            (S::Error, E::Retry) => {
                let retryable = self.last_error.as_ref().is_some_and(|e| e.retryable);
                if !retryable {
                    return Err(TransitionError::RetryNotAllowed(
                        "the last error is not retryable".into(),
                    ));
                }
                if self.retry_count >= MAX_RETRIES {
                    return Err(TransitionError::RetryNotAllowed(format!(
                        "retry limit of {} reached",
                        MAX_RETRIES
                    )));
                }
                self.retry_count += 1;
                self.last_error = None;
                self.state = S::Initializing;
            }
            // Round progress after a forced stop is absorbed.
            (S::JudgingFinal, e)
                if self.stop_reason.is_some() && e.is_progress() && *e != E::VerdictReady =>
            {
                return Ok(self.state);
            }
            (s, e) => {
                let next = Self::next_state(s, e).ok_or_else(|| self.invalid(e))?;
                if let E::Stop(reason) = e {
                    self.stop_reason = Some(*reason);
                }
                self.state = next;
            }
        }
        Ok(self.state)
    }

    fn next_state(from: DebateState, event: &LifecycleEvent) -> Option<DebateState> {
        use DebateState as S;
        use LifecycleEvent as E;

        match (from, event) {
            (S::Configuring, E::Start) => Some(S::Initializing),
            (S::Initializing, E::Ready) => Some(S::AwaitingOpening),
            (S::AwaitingOpening, E::ResponsesReceived) => Some(S::RunningRound),
            (S::RunningRound, E::RoundComplete) => Some(S::EvaluatingRound),
            (S::EvaluatingRound, E::Continue) => Some(S::RunningRound),
            (S::AwaitingOpening | S::RunningRound | S::EvaluatingRound, E::Stop(_)) => {
                Some(S::JudgingFinal)
            }
            (S::JudgingFinal, E::VerdictReady) => Some(S::Completed),
            _ => None,
        }
    }

    fn invalid(&self, event: &LifecycleEvent) -> TransitionError {
        TransitionError::InvalidTransition {
            state: self.state,
            event: event.name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debate::config::{JudgeSpec, ParticipantSpec};

    fn config() -> DebateConfiguration {
        DebateConfiguration::new(
            "Topic",
            vec![
                ParticipantSpec::new("a", "m1", "For"),
                ParticipantSpec::new("b", "m2", "Against"),
            ],
            JudgeSpec::new("judge"),
        )
    }

    fn running() -> DebateLifecycle {
        let mut lc = DebateLifecycle::new();
        lc.start(&config()).unwrap();
        lc.apply(LifecycleEvent::Ready).unwrap();
        lc.apply(LifecycleEvent::ResponsesReceived).unwrap();
        lc
    }

    #[test]
    fn test_happy_path() {
        let mut lc = running();
        assert_eq!(lc.state(), DebateState::RunningRound);
        assert_eq!(
            lc.apply(LifecycleEvent::RoundComplete),
            Ok(DebateState::EvaluatingRound)
        );
        assert_eq!(lc.apply(LifecycleEvent::Continue), Ok(DebateState::RunningRound));
        lc.apply(LifecycleEvent::RoundComplete).unwrap();
        assert_eq!(
            lc.apply(LifecycleEvent::Stop(StopReason::RoundLimit)),
            Ok(DebateState::JudgingFinal)
        );
        assert_eq!(lc.apply(LifecycleEvent::VerdictReady), Ok(DebateState::Completed));
        assert_eq!(lc.stop_reason(), Some(StopReason::RoundLimit));
        assert!(lc.state().is_terminal());
    }

    #[test]
    fn test_invalid_config_goes_to_error() {
        let mut lc = DebateLifecycle::new();
        let mut bad = config();
        bad.participants.truncate(1);
        assert!(matches!(lc.start(&bad), Err(TransitionError::Validation(_))));
        assert_eq!(lc.state(), DebateState::Error);
        assert!(matches!(
            lc.apply(LifecycleEvent::Retry),
            Err(TransitionError::RetryNotAllowed(_))
        ));
    }

    #[test]
    fn test_invalid_transition() {
        let mut lc = DebateLifecycle::new();
        assert_eq!(
            lc.apply(LifecycleEvent::Continue),
            Err(TransitionError::InvalidTransition {
                state: DebateState::Configuring,
                event: "CONTINUE"
            })
        );
        assert!(lc.apply(LifecycleEvent::Pause).is_err());
    }

    #[test]
    fn test_pause_resume_returns_to_origin() {
        let mut lc = running();
        lc.apply(LifecycleEvent::Pause).unwrap();
        assert_eq!(lc.state(), DebateState::Paused);
        assert_eq!(lc.apply(LifecycleEvent::Resume), Ok(DebateState::RunningRound));
    }

    #[test]
    fn test_progress_while_paused_advances_resume_target() {
        let mut lc = running();
        lc.apply(LifecycleEvent::Pause).unwrap();
        lc.apply(LifecycleEvent::RoundComplete).unwrap();
        lc.apply(LifecycleEvent::Continue).unwrap();
        assert_eq!(lc.state(), DebateState::Paused);
        assert_eq!(lc.resume_to(), Some(DebateState::RunningRound));
        assert_eq!(lc.effective_state(), DebateState::RunningRound);
        assert_eq!(lc.apply(LifecycleEvent::Resume), Ok(DebateState::RunningRound));
    }

    #[test]
    fn test_stop_while_paused_goes_to_judging() {
        let mut lc = running();
        lc.apply(LifecycleEvent::Pause).unwrap();
        assert_eq!(lc.request_stop(), Ok(DebateState::JudgingFinal));
        assert_eq!(lc.stop_reason(), Some(StopReason::UserRequested));
        // The in-flight round finishing afterwards is absorbed
        assert_eq!(lc.apply(LifecycleEvent::RoundComplete), Ok(DebateState::JudgingFinal));
        assert_eq!(lc.apply(LifecycleEvent::VerdictReady), Ok(DebateState::Completed));
    }

    #[test]
    fn test_guard_stop_while_paused_stays_paused() {
        let mut lc = running();
        lc.apply(LifecycleEvent::Pause).unwrap();
        lc.apply(LifecycleEvent::RoundComplete).unwrap();
        assert_eq!(
            lc.apply(LifecycleEvent::Stop(StopReason::RoundLimit)),
            Ok(DebateState::Paused)
        );
        assert_eq!(lc.resume_to(), Some(DebateState::JudgingFinal));
        assert_eq!(lc.stop_reason(), Some(StopReason::RoundLimit));
        assert_eq!(lc.apply(LifecycleEvent::Resume), Ok(DebateState::JudgingFinal));
    }

    #[test]
    fn test_restored_completed() {
        let lc = DebateLifecycle::restored_completed(StopReason::Convergence);
        assert_eq!(lc.state(), DebateState::Completed);
        assert_eq!(lc.stop_reason(), Some(StopReason::Convergence));
    }

    #[test]
    fn test_stop_request_is_lazy_when_active() {
        let mut lc = running();
        assert_eq!(lc.request_stop(), Ok(DebateState::RunningRound));
        assert!(lc.stop_requested());
    }

    #[test]
    fn test_retry_limit() {
        let mut lc = running();
        for _ in 0..MAX_RETRIES {
            lc.apply(LifecycleEvent::FatalError {
                message: "rate limited".into(),
                retryable: true,
            })
            .unwrap();
            assert_eq!(lc.apply(LifecycleEvent::Retry), Ok(DebateState::Initializing));
        }
        lc.apply(LifecycleEvent::FatalError {
            message: "again".into(),
            retryable: true,
        })
        .unwrap();
        assert!(matches!(
            lc.apply(LifecycleEvent::Retry),
            Err(TransitionError::RetryNotAllowed(_))
        ));
        assert_eq!(lc.retry_count(), MAX_RETRIES);
    }

    #[test]
    fn test_fatal_error_overrides_pause() {
        let mut lc = running();
        lc.apply(LifecycleEvent::Pause).unwrap();
        lc.apply(LifecycleEvent::FatalError {
            message: "auth".into(),
            retryable: false,
        })
        .unwrap();
        assert_eq!(lc.state(), DebateState::Error);
        assert_eq!(lc.resume_to(), None);
    }
}
