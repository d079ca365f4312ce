//! Result Delivery Surface
//!
//! Hands a finished capture to the preview overlay and the clipboard. Every
//! user-visible step re-checks that the capture is still current for its target.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

use fullshot_core::{
    CaptureArtifact, CaptureError, CaptureTracker, ClipboardOutcome, ClipboardSink, Generation,
    PreviewSurface, TargetId,
};

pub struct ResultDelivery {
    tracker: Arc<CaptureTracker>,
    clipboard: Arc<dyn ClipboardSink>,
    preview: Arc<dyn PreviewSurface>,
    last: Mutex<HashMap<TargetId, CaptureArtifact>>,
}

impl ResultDelivery {
    pub fn new(
        tracker: Arc<CaptureTracker>,
        clipboard: Arc<dyn ClipboardSink>,
        preview: Arc<dyn PreviewSurface>,
    ) -> Self {
        Self {
            tracker,
            clipboard,
            preview,
            last: Mutex::new(HashMap::new()),
        }
    }

    pub fn preview(&self) -> &Arc<dyn PreviewSurface> {
        &self.preview
    }

    /// The artifact `retry` would re-deliver for `target`.
    pub fn cached(&self, target: &TargetId) -> Option<CaptureArtifact> {
        self.cache().get(target).cloned()
    }

    pub async fn deliver(
        &self,
        target: &TargetId,
        artifact: &CaptureArtifact,
        generation: Generation,
    ) -> ClipboardOutcome {
        if !self.tracker.is_current(target, generation) {
            return ClipboardOutcome::Stale;
        }
        self.cache().insert(target.clone(), artifact.clone());

        if let Err(e) = self.preview.show_capture(target, artifact).await {
            warn!(target = %target, error = %e, "Failed to show capture preview");
        }

        self.write(target, artifact, generation).await
    }

    /// Re-deliver the last artifact for `target` to the clipboard without capturing
    /// again. `None` when nothing has been delivered for the target yet.
    pub async fn retry(&self, target: &TargetId, generation: Generation) -> Option<ClipboardOutcome> {
        let artifact = self.cached(target)?;
        debug!(target = %target, %generation, "Retrying clipboard write");
        Some(self.write(target, &artifact, generation).await)
    }

    async fn write(
        &self,
        target: &TargetId,
        artifact: &CaptureArtifact,
        generation: Generation,
    ) -> ClipboardOutcome {
        if !self.tracker.is_current(target, generation) {
            return ClipboardOutcome::Stale;
        }
        // Never focus the page to make the write succeed.
        match self.clipboard.has_focus(target).await {
            Ok(true) => {}
            Ok(false) => return self.failed(target, generation, CaptureError::FocusLost),
            Err(e) => return self.failed(target, generation, e),
        }

        if !self.tracker.is_current(target, generation) {
            return ClipboardOutcome::Stale;
        }
        let written = self.clipboard.write_image(target, &artifact.pixel_data).await;

        if !self.tracker.is_current(target, generation) {
            return ClipboardOutcome::Stale;
        }
        match written {
            Ok(()) => ClipboardOutcome::Written,
            Err(e) => ClipboardOutcome::Failed(e),
        }
    }

    fn failed(&self, target: &TargetId, generation: Generation, error: CaptureError) -> ClipboardOutcome {
        if self.tracker.is_current(target, generation) {
            ClipboardOutcome::Failed(error)
        } else {
            ClipboardOutcome::Stale
        }
    }

    fn cache(&self) -> MutexGuard<'_, HashMap<TargetId, CaptureArtifact>> {
        self.last.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
