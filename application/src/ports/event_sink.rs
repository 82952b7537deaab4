//! Port for recording progress events outside the live subscription.
//!
//! This is separate from `tracing`-based operation logs: tracing handles
//! human-readable diagnostics, while a sink keeps the machine-readable
//! event record (e.g. a JSONL file).

use quorum_domain::ProgressEvent;

/// Implementations write each event as a single record.
/// `record` is synchronous and non-fallible; sink failures never disturb
/// the debate.
pub trait EventSink: Send + Sync {
    fn record(&self, event: &ProgressEvent);
}

/// No-op implementation for tests and when event recording is disabled.
pub struct NoEventSink;

impl EventSink for NoEventSink {
    fn record(&self, _event: &ProgressEvent) {}
}
