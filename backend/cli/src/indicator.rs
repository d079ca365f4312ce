//! Console status indicator: prints each badge state as a terminal note.

use fullshot_core::{CaptureStatus, StatusIndicator, TargetId};

use crate::terminal_output::{note_error, note_info, note_success, note_warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Info,
    Success,
    Warn,
    Error,
}

/// Text printed for a status; `None` for states with nothing to say.
pub fn status_line(target: &TargetId, status: &CaptureStatus) -> Option<(Tone, String)> {
    match status {
        CaptureStatus::Capturing => Some((Tone::Info, format!("Capturing {target}…"))),
        CaptureStatus::Succeeded { warning: None } => Some((Tone::Success, "Capture complete".to_string())),
        CaptureStatus::Succeeded { warning: Some(warning) } => {
            Some((Tone::Warn, format!("Capture complete. {warning}")))
        }
        // No artifact outlives the run, so a persistent failure needs a new capture.
        CaptureStatus::Failed { persistent: true, .. } => Some((
            Tone::Error,
            format!("Capture of {target} was interrupted. Nothing was copied; keep the tab focused and run the capture again."),
        )),
        CaptureStatus::Failed { message, persistent: false } => Some((Tone::Error, message.clone())),
        CaptureStatus::Cleared => None,
    }
}

pub struct ConsoleIndicator;

impl StatusIndicator for ConsoleIndicator {
    fn show(&self, target: &TargetId, status: CaptureStatus) {
        tracing::debug!(target = %target, ?status, "Status changed");
        match status_line(target, &status) {
            Some((Tone::Info, line)) => note_info(&line),
            Some((Tone::Success, line)) => note_success(&line),
            Some((Tone::Warn, line)) => note_warn(&line),
            Some((Tone::Error, line)) => note_error(&line),
            None => {}
        }
    }
}
