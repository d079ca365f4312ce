use thiserror::Error;

/// Error taxonomy shared by the orchestrator, the delivery surface and host implementations.
///
/// Superseded captures are not errors; they surface as values
/// (`ClipboardOutcome::Stale`, `CaptureOutcome::Superseded`).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CaptureError {
    #[error("target cannot be captured: {0}")]
    RejectedTarget(String),

    #[error("another debugger is already attached to target {0}")]
    DebuggerAttached(String),

    #[error("{step} failed: {description}{}", position_suffix(.line, .column))]
    Script {
        step: String,
        description: String,
        line: Option<u32>,
        column: Option<u32>,
    },

    #[error("{step} returned an unexpected result: {detail}")]
    InvalidResult { step: String, detail: String },

    #[error("the page lost input focus")]
    FocusLost,

    #[error("target {0} is no longer accessible")]
    TargetGone(String),

    #[error("host error: {0}")]
    Host(String),
}

fn position_suffix(line: &Option<u32>, column: &Option<u32>) -> String {
    match (*line, *column) {
        (Some(line), Some(column)) => format!(" (line {line}, column {column})"),
        (Some(line), None) => format!(" (line {line})"),
        _ => String::new(),
    }
}

impl CaptureError {
    /// Focus-loss class failures: the user can fix them by returning to the tab.
    pub fn is_focus_loss(&self) -> bool {
        matches!(self, CaptureError::FocusLost | CaptureError::TargetGone(_))
    }

    /// Message shown to the user. Actionable classes get a specific explanation
    /// instead of the raw protocol text.
    pub fn user_message(&self) -> String {
        match self {
            CaptureError::RejectedTarget(_) => {
                "This page can't be captured (browser-internal or store page).".to_string()
            }
            CaptureError::DebuggerAttached(_) => {
                "Another debugger (for example DevTools) is attached to this tab. Close it and try again."
                    .to_string()
            }
            CaptureError::FocusLost | CaptureError::TargetGone(_) => {
                "Stay on this tab during capture, then retry.".to_string()
            }
            other => format!("Capture failed: {other}"),
        }
    }
}
