//! Judge output schema.

pub mod parsing;

pub use parsing::{
    JudgeSchemaError, VerdictDraft, extract_json, parse_final_verdict, parse_round_assessment,
};
