//! Domain error types

use thiserror::Error;

/// Domain-level errors
///
/// Every variant except [`DomainError::Cancelled`] is a configuration
/// validation failure: fatal and never retryable.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Debate topic cannot be empty")]
    EmptyTopic,

    #[error("At least 2 participants are required, got {0}")]
    TooFewParticipants(usize),

    #[error("Duplicate participant id: {0}")]
    DuplicateParticipant(String),

    #[error("Participant {0} has no model configured")]
    MissingParticipantModel(String),

    #[error("No judge model configured")]
    MissingJudge,

    #[error("Judge rubric has no criteria")]
    EmptyRubric,

    #[error("Rubric weights must sum to 1.0 (got {0:.3})")]
    RubricWeights(f64),

    #[error("Free-form debates need at least one stop condition (round limit, cost limit or judge stop detection)")]
    NoStopCondition,

    #[error("Invalid limit: {0}")]
    InvalidLimit(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl DomainError {
    /// Check if this error represents a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DomainError::Cancelled)
    }

    /// Validation errors are never retryable.
    pub fn is_retryable(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancelled_error_display() {
        let error = DomainError::Cancelled;
        assert_eq!(error.to_string(), "Operation cancelled");
    }

    #[test]
    fn test_is_cancelled_check() {
        assert!(DomainError::Cancelled.is_cancelled());
        assert!(!DomainError::MissingJudge.is_cancelled());
        assert!(!DomainError::TooFewParticipants(1).is_cancelled());
    }

    #[test]
    fn test_rubric_weights_message() {
        let error = DomainError::RubricWeights(0.9);
        assert_eq!(error.to_string(), "Rubric weights must sum to 1.0 (got 0.900)");
        assert!(!error.is_retryable());
    }
}
