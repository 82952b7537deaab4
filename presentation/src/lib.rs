//! Presentation layer for quorum-debate
//!
//! This crate contains CLI definitions, the verdict formatter and the
//! progress reporters that render a debate's event stream.

pub mod cli;
pub mod output;
pub mod progress;

// Re-export commonly used types
pub use cli::commands::{Cli, ParticipantArg};
pub use output::console::ConsoleFormatter;
pub use progress::reporter::{
    Followed, ProgressRenderer, ProgressReporter, SimpleProgress, follow,
};
