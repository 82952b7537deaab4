//! JSONL file writer for progress events.
//!
//! Each [`ProgressEvent`] is serialized as a single JSON line carrying its
//! `type`, `sequence` and `timestamp`, appended via a buffered writer.

use quorum_application::ports::event_sink::EventSink;
use quorum_domain::ProgressEvent;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

/// JSONL event log that writes one JSON object per line.
///
/// Thread-safe via `Mutex<BufWriter<File>>`. Flushes on `Drop`.
pub struct JsonlEventLog {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
    /// Streaming chunks are skipped unless enabled; they dwarf everything else.
    include_chunks: bool,
}

impl JsonlEventLog {
    /// Create a new log writing to the given path.
    ///
    /// Creates the file (and parent directories) if they don't exist.
    /// Returns `None` if the file cannot be created.
    pub fn new(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            warn!(
                "Could not create event log directory {}: {}",
                parent.display(),
                e
            );
            return None;
        }

        let file = match File::create(path) {
            Ok(f) => f,
            Err(e) => {
                warn!("Could not create event log file {}: {}", path.display(), e);
                return None;
            }
        };

        Some(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path: path.to_path_buf(),
            include_chunks: false,
        })
    }

    pub fn with_chunks(mut self, include: bool) -> Self {
        self.include_chunks = include;
        self
    }

    /// Get the path to the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventSink for JsonlEventLog {
    fn record(&self, event: &ProgressEvent) {
        if !self.include_chunks && event.kind.type_name() == "participant_chunk" {
            return;
        }

        let line = match serde_json::to_string(event) {
            Ok(line) => line,
            Err(e) => {
                warn!("Could not serialize event {}: {}", event.sequence, e);
                return;
            }
        };

        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer, "{}", line);
            // JSONL is append-only; flush per record for crash safety
            let _ = writer.flush();
        }
    }
}

impl Drop for JsonlEventLog {
    fn drop(&mut self) {
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writer.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorum_domain::{CostSnapshot, DebateId, DebateState, ErrorKind, EventKind};

    fn read_lines(path: &Path) -> Vec<serde_json::Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn test_event_log_writes_valid_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("debate.events.jsonl");
        let log = JsonlEventLog::new(&path).unwrap();
        let id = DebateId::new();

        log.record(&ProgressEvent::new(
            1,
            id,
            EventKind::StateChanged {
                state: DebateState::Initializing,
                round: 0,
                latest_responses: vec![],
                cost: CostSnapshot::default(),
                stop_reason: None,
            },
        ));
        log.record(&ProgressEvent::new(
            2,
            id,
            EventKind::error(ErrorKind::Persistence, "disk full", true),
        ));
        drop(log);

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 2);
        for line in &lines {
            assert!(line.get("type").is_some());
            assert!(line.get("timestamp").is_some());
        }
        assert_eq!(lines[0]["type"], "state_changed");
        assert_eq!(lines[0]["state"], "initializing");
        assert_eq!(lines[1]["type"], "error");
        assert_eq!(lines[1]["sequence"], 2);
        assert_eq!(lines[1]["retryable"], true);
    }

    #[test]
    fn test_chunks_skipped_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let chunk = ProgressEvent::new(
            1,
            DebateId::new(),
            EventKind::ParticipantChunk {
                round: 1,
                participant_id: "pro".into(),
                chunk: "Cars ".into(),
                done: false,
            },
        );

        let log = JsonlEventLog::new(&path).unwrap();
        log.record(&chunk);
        drop(log);
        assert!(read_lines(&path).is_empty());

        let log = JsonlEventLog::new(&path).unwrap().with_chunks(true);
        log.record(&chunk);
        drop(log);
        assert_eq!(read_lines(&path)[0]["chunk"], "Cars ");
    }
}
