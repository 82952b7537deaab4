//! Issues found while turning file configuration into a debate setup.
//!
//! Loading never fails on a bad value; it collects [`ConfigIssue`]s so the
//! caller can print every problem at once and decide whether to continue.

/// Severity level of a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Fatal: the configuration cannot work at all.
    Error,
    /// Non-fatal: a value was ignored or replaced by its default.
    Warning,
}

/// Identifies a specific configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigIssueCode {
    /// A `[[participants]]` entry is incomplete or malformed.
    InvalidParticipant,
    /// `[judge]` has no model.
    MissingJudge,
    /// An enum-valued key (format, mode, strategy, ...) has an unknown value.
    UnknownValue,
    /// A numeric key is out of range.
    InvalidNumber,
    /// A `[pricing.<model>]` entry has negative prices.
    InvalidPricing,
    /// The assembled debate fails [`DebateConfiguration::validate`].
    ///
    /// [`DebateConfiguration::validate`]: crate::DebateConfiguration::validate
    InvalidDebate,
}

/// A detected issue in the configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigIssue {
    pub severity: Severity,
    pub code: ConfigIssueCode,
    pub message: String,
}

impl ConfigIssue {
    pub fn error(code: ConfigIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
        }
    }

    pub fn warning(code: ConfigIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {}", label, self.message)
    }
}
