//! Debate domain.
//!
//! - [`config::DebateConfiguration`]: immutable debate setup and validation
//! - [`history::DebateHistory`]: append-only round record
//! - [`assessment`]: judge assessments and the final verdict
//! - [`lifecycle::DebateLifecycle`]: the state machine
//! - [`guards::evaluate_stop_guards`]: stop conditions in precedence order

pub mod assessment;
pub mod config;
pub mod guards;
pub mod history;
pub mod id;
pub mod lifecycle;

pub use assessment::{
    AssessmentFlags, FinalVerdict, JudgeAssessment, ParticipantScore, VerdictOutcome,
    cumulative_scores,
};
pub use config::{
    Criterion, DebateConfiguration, DebateFormat, DebateLimits, DebatePhase, ExecutionMode,
    JudgeSpec, ParticipantSpec, Rubric, SpeakingOrder, StopSensitivity,
};
pub use guards::{GuardContext, StopReason, evaluate_stop_guards};
pub use history::{
    DebateHistory, HistoryError, ParticipantResponse, ResponseStatus, Round, SUMMARY_AUTHOR,
};
pub use id::DebateId;
pub use lifecycle::{
    DebateLifecycle, DebateState, LifecycleError, LifecycleEvent, MAX_RETRIES, TransitionError,
};
