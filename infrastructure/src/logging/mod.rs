//! Logging infrastructure: structured progress event logging.
//!
//! Provides [`JsonlEventLog`], a JSONL file writer that implements the
//! [`EventSink`](quorum_application::EventSink) port.

mod jsonl_event_log;

pub use jsonl_event_log::JsonlEventLog;
