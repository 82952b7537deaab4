//! Domain layer for quorum-debate
//!
//! This crate contains the core business logic, entities, and value objects.
//! It has no dependencies on infrastructure or presentation concerns, and no
//! async runtime.
//!
//! # Core Concepts
//!
//! ## Debate
//!
//! Several LLM-backed participants argue a topic in rounds. After every
//! round a judge model scores each participant against a weighted rubric and
//! raises stop flags (repetition, drift, convergence, diminishing returns).
//! Stop guards decide whether another round runs; at the end the judge
//! delivers a [`FinalVerdict`].
//!
//! ## Lifecycle
//!
//! [`DebateLifecycle`] is the state machine:
//! `configuring → initializing → awaiting_opening → running_round ⇄
//! evaluating_round → judging_final → completed`, with `paused` and `error`
//! side states.
//!
//! ## Budgets
//!
//! - **Context**: [`prepare_context`] fits history into a token budget
//! - **Cost**: [`CostAccountant`] prices usage and fires tiered warnings

pub mod config;
pub mod context;
pub mod core;
pub mod cost;
pub mod debate;
pub mod event;
pub mod export;
pub mod judge;
pub mod prompt;
pub mod session;
pub mod util;

// Re-export commonly used types
pub use config::{ConfigIssue, ConfigIssueCode, Severity};
pub use context::{
    CompressionStrategy, ContextSettings, PreparedContext, estimate_tokens, prepare_context,
    summarization_split,
};
pub use core::{error::DomainError, model::ModelId};
pub use cost::{
    CostAccountant, CostLedger, CostRecord, CostSnapshot, CostThresholds, CostTier, CostWarning,
    ModelPricing, PricingTable,
};
pub use debate::{
    AssessmentFlags, Criterion, DebateConfiguration, DebateFormat, DebateHistory, DebateId,
    DebateLifecycle, DebateLimits, DebatePhase, DebateState, ExecutionMode, FinalVerdict,
    GuardContext, HistoryError, JudgeAssessment, JudgeSpec, LifecycleError, LifecycleEvent,
    MAX_RETRIES, ParticipantResponse, ParticipantScore, ParticipantSpec, ResponseStatus, Round,
    Rubric, SUMMARY_AUTHOR, SpeakingOrder, StopReason, StopSensitivity, TransitionError,
    VerdictOutcome, cumulative_scores, evaluate_stop_guards,
};
pub use event::{ErrorKind, EventKind, ProgressEvent};
pub use export::{DebateTranscript, ExportFormat};
pub use judge::{JudgeSchemaError, VerdictDraft, parse_final_verdict, parse_round_assessment};
pub use prompt::DebatePromptTemplate;
pub use session::{
    entities::{GenerationParams, Message, ResponseFormat, Role},
    stream::{Completion, StreamEvent},
    usage::TokenUsage,
};
