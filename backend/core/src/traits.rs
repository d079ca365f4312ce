use async_trait::async_trait;

use crate::error::CaptureError;
use crate::types::{
    CaptureArtifact, CaptureStatus, ClipRect, DebugHandle, LayoutMetrics, ScriptOutcome, TargetId,
    TargetInfo, ViewportOverride,
};

/// Remote-control surface of the host browser.
///
/// Every call may suspend; none can be cancelled once issued.
#[async_trait]
pub trait CaptureHost: Send + Sync {
    /// The page a capture should target when none is named.
    async fn active_target(&self) -> Result<TargetInfo, CaptureError>;

    async fn target_info(&self, target: &TargetId) -> Result<TargetInfo, CaptureError>;

    /// Bitmap of the currently rendered viewport at native resolution. Never mutates the page.
    async fn capture_visible_region(&self, target: &TargetId) -> Result<Vec<u8>, CaptureError>;

    /// Acquire exclusive remote-debug control.
    ///
    /// Fails with [`CaptureError::DebuggerAttached`] when another controller holds the target.
    async fn attach_debug_control(&self, target: &TargetId) -> Result<DebugHandle, CaptureError>;

    async fn detach_debug_control(&self, handle: &DebugHandle) -> Result<(), CaptureError>;

    async fn evaluate_script(
        &self,
        handle: &DebugHandle,
        source: &str,
    ) -> Result<ScriptOutcome, CaptureError>;

    async fn layout_metrics(&self, handle: &DebugHandle) -> Result<LayoutMetrics, CaptureError>;

    async fn override_viewport(
        &self,
        handle: &DebugHandle,
        viewport: ViewportOverride,
    ) -> Result<(), CaptureError>;

    async fn clear_viewport_override(&self, handle: &DebugHandle) -> Result<(), CaptureError>;

    async fn capture_clipped_region(
        &self,
        handle: &DebugHandle,
        clip: ClipRect,
    ) -> Result<Vec<u8>, CaptureError>;

    /// Hide the host's own "W x H" overlay while the viewport is overridden.
    /// Returns `Ok(false)` when the host has no such capability.
    async fn suppress_viewport_size_indicator(
        &self,
        handle: &DebugHandle,
    ) -> Result<bool, CaptureError>;

    /// Run a script in the page without taking debug control (preview overlay, clipboard).
    async fn run_page_script(
        &self,
        target: &TargetId,
        source: &str,
    ) -> Result<serde_json::Value, CaptureError>;
}

/// Destination for captured images. Writes require the surface to hold input focus.
#[async_trait]
pub trait ClipboardSink: Send + Sync {
    async fn has_focus(&self, target: &TargetId) -> Result<bool, CaptureError>;

    /// Write image bytes. Must never move focus to make the write succeed.
    async fn write_image(&self, target: &TargetId, image: &[u8]) -> Result<(), CaptureError>;
}

/// Badge-style per-target status.
pub trait StatusIndicator: Send + Sync {
    fn show(&self, target: &TargetId, status: CaptureStatus);
}

/// In-page preview/flash overlay.
#[async_trait]
pub trait PreviewSurface: Send + Sync {
    async fn show_capture(
        &self,
        target: &TargetId,
        artifact: &CaptureArtifact,
    ) -> Result<(), CaptureError>;

    /// Update the overlay's message. `persistent` messages do not auto-dismiss.
    async fn show_message(
        &self,
        target: &TargetId,
        message: &str,
        persistent: bool,
    ) -> Result<(), CaptureError>;

    /// Remove any overlay. Idempotent.
    async fn remove(&self, target: &TargetId) -> Result<(), CaptureError>;
}
