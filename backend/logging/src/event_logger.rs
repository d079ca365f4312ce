//! Capture Event Logger
//!
//! One structured record per capture lifecycle event, under the `capture_events` target.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::redact::{redact_address, redact_text};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum CaptureEvent {
    Started { address: Option<String>, full_page: bool },
    StepFailed { step: String, error: String },
    CleanupFailed { step: String, error: String },
    Warning { message: String },
    Delivered { bytes: usize, clipboard: bool },
    Superseded,
    Failed { error: String },
}

impl CaptureEvent {
    fn redacted(self) -> Self {
        match self {
            CaptureEvent::Started { address, full_page } => CaptureEvent::Started {
                address: address.as_deref().map(redact_address),
                full_page,
            },
            CaptureEvent::StepFailed { step, error } => {
                CaptureEvent::StepFailed { step, error: redact_text(&error) }
            }
            CaptureEvent::CleanupFailed { step, error } => {
                CaptureEvent::CleanupFailed { step, error: redact_text(&error) }
            }
            CaptureEvent::Failed { error } => CaptureEvent::Failed { error: redact_text(&error) },
            other => other,
        }
    }

    fn is_problem(&self) -> bool {
        matches!(
            self,
            CaptureEvent::StepFailed { .. } | CaptureEvent::CleanupFailed { .. } | CaptureEvent::Failed { .. }
        )
    }
}

#[derive(Debug, Serialize)]
pub struct EventLogEntry {
    pub target: String,
    pub generation: u64,
    pub timestamp: DateTime<Utc>,
    pub event: CaptureEvent,
}

pub struct CaptureEventLogger;

impl CaptureEventLogger {
    pub fn entry(target: &str, generation: u64, event: CaptureEvent) -> EventLogEntry {
        EventLogEntry {
            target: target.to_string(),
            generation,
            timestamp: Utc::now(),
            event: event.redacted(),
        }
    }

    /// Redact and emit `event`. Failures go out at WARN, everything else at INFO.
    pub fn log_event(target: &str, generation: u64, event: CaptureEvent) {
        let entry = Self::entry(target, generation, event);
        let record = serde_json::to_string(&entry).unwrap_or_else(|_| format!("{entry:?}"));
        if entry.event.is_problem() {
            warn!(target: "capture_events", event = %record, "Capture event");
        } else {
            info!(target: "capture_events", event = %record, "Capture event");
        }
    }
}
