//! Terminal progress for running debates

pub mod reporter;
