use thiserror::Error;

use fullshot_core::{CaptureError, TargetId};

/// JSON-RPC code Chrome returns for unknown methods.
pub const METHOD_NOT_FOUND: i64 = -32601;

#[derive(Debug, Error)]
pub enum CdpError {
    #[error("CDP error {code}: {message}")]
    Protocol { code: i64, message: String },

    #[error("CDP command {method} timed out after {timeout_ms}ms")]
    Timeout { method: String, timeout_ms: u64 },

    #[error("CDP connection closed")]
    ConnectionClosed,

    #[error("WebSocket transport error: {0}")]
    Transport(String),

    #[error("malformed CDP message: {0}")]
    Malformed(String),

    #[error("endpoint discovery failed: {0}")]
    Discovery(String),
}

impl CdpError {
    pub fn is_method_not_found(&self) -> bool {
        matches!(self, CdpError::Protocol { code, .. } if *code == METHOD_NOT_FOUND)
    }

    /// Another client already holds the target.
    pub fn is_already_attached(&self) -> bool {
        self.message_contains(&["already attached", "another debugger"])
    }

    /// The target or session disappeared (tab closed, navigated away, crashed).
    pub fn is_target_gone(&self) -> bool {
        matches!(self, CdpError::ConnectionClosed)
            || self.message_contains(&["no target with given id", "no session with given id", "target closed"])
    }

    fn message_contains(&self, needles: &[&str]) -> bool {
        match self {
            CdpError::Protocol { message, .. } => {
                let lower = message.to_ascii_lowercase();
                needles.iter().any(|n| lower.contains(n))
            }
            _ => false,
        }
    }

    /// Map into the capture taxonomy for operations on `target`.
    pub fn into_capture_error(self, target: &TargetId) -> CaptureError {
        if self.is_already_attached() {
            CaptureError::DebuggerAttached(target.to_string())
        } else if self.is_target_gone() {
            CaptureError::TargetGone(target.to_string())
        } else {
            CaptureError::Host(self.to_string())
        }
    }
}
