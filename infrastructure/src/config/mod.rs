//! Configuration file loading for quorum-debate
//!
//! This module handles file I/O and merging of configuration from multiple sources.
//! The priority order (highest to lowest):
//!
//! 1. `QUORUM_*` environment variables
//! 2. `--config <path>` specified file
//! 3. Project root: `./quorum.toml` or `./.quorum.toml`
//! 4. Global: `$XDG_CONFIG_HOME/quorum-debate/config.toml`
//! 5. Default values

mod file_config;
mod loader;

pub use file_config::{
    FileConfig, FileContextConfig, FileDebateConfig, FileJudgeConfig, FileLimitsConfig,
    FileOutputConfig, FileParticipantConfig, FileProviderConfig,
};
pub use loader::ConfigLoader;
