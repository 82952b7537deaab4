//! Output configuration from TOML (`[output]` section)

use quorum_domain::ExportFormat;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw output configuration from TOML
///
/// ```toml
/// [output]
/// export = "markdown"
/// export_path = "debate.md"
/// event_log = "debate.events.jsonl"
/// data_dir = ".quorum/debates"
/// color = true
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileOutputConfig {
    /// Transcript export format written after the debate
    pub export: Option<ExportFormat>,
    pub export_path: Option<PathBuf>,
    /// JSONL file receiving every progress event
    pub event_log: Option<PathBuf>,
    /// Directory of the JSONL debate repository; unset keeps debates in memory
    pub data_dir: Option<PathBuf>,
    /// Enable colored terminal output
    pub color: bool,
}

impl Default for FileOutputConfig {
    fn default() -> Self {
        Self {
            export: None,
            export_path: None,
            event_log: None,
            data_dir: None,
            color: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_format_deserialize() {
        let toml_str = r#"
[output]
export = "json"
event_log = "events.jsonl"
"#;
        let config: super::super::FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.output.export, Some(ExportFormat::Json));
        assert_eq!(config.output.event_log, Some(PathBuf::from("events.jsonl")));
        assert!(config.output.color);
    }
}
