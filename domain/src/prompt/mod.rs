//! Prompt domain
//!
//! Templates for generating prompts at each stage of a debate.

mod template;

pub use template::DebatePromptTemplate;
