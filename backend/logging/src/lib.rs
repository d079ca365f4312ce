//! Telemetry and structured logging for fullshot.
//!
//! Subscriber setup (console plus optional rolling NDJSON), the capture lifecycle
//! event log, and redaction of page addresses before they reach any log line.

pub mod event_logger;
pub mod logger;
pub mod redact;

pub use event_logger::{CaptureEvent, CaptureEventLogger, EventLogEntry};
pub use logger::{init_logger, LogOptions};
pub use redact::{redact_address, redact_text};
