pub mod error;
pub mod generation;
pub mod traits;
pub mod types;
pub mod url_gate;

pub use error::CaptureError;
pub use generation::CaptureTracker;
pub use traits::{CaptureHost, ClipboardSink, PreviewSurface, StatusIndicator};
pub use types::{
    CaptureArtifact, CaptureRequest, CaptureStatus, CaptureWarning, ClipRect, ClipboardOutcome,
    DebugHandle, Generation, LayoutMetrics, PageDimensions, ScriptException, ScriptOutcome,
    TargetId, TargetInfo, ViewportOverride,
};
pub use url_gate::is_capturable;
