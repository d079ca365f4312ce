//! Capture service: request → generation → orchestrator → delivery → status.

use std::sync::Arc;

use tracing::{debug, warn};

use fullshot_core::{
    CaptureArtifact, CaptureError, CaptureHost, CaptureRequest, CaptureStatus, CaptureTracker,
    ClipboardOutcome, ClipboardSink, Generation, PreviewSurface, StatusIndicator, TargetId,
};
use fullshot_logging::{CaptureEvent, CaptureEventLogger};

use crate::delivery::ResultDelivery;
use crate::orchestrator::{CaptureLimits, Orchestrator};

#[derive(Debug, Clone, PartialEq)]
pub enum CaptureOutcome {
    /// Captured and handed to the clipboard; `clipboard` says how that went.
    Delivered { artifact: CaptureArtifact, clipboard: ClipboardOutcome },
    /// Captured with no clipboard configured.
    Captured { artifact: CaptureArtifact },
    /// A newer request for the same target took over. Not a failure.
    Superseded,
}

impl CaptureOutcome {
    pub fn artifact(&self) -> Option<&CaptureArtifact> {
        match self {
            CaptureOutcome::Delivered { artifact, .. } | CaptureOutcome::Captured { artifact } => Some(artifact),
            CaptureOutcome::Superseded => None,
        }
    }
}

pub struct CaptureService {
    tracker: Arc<CaptureTracker>,
    orchestrator: Orchestrator,
    indicator: Arc<dyn StatusIndicator>,
    delivery: Option<ResultDelivery>,
}

impl CaptureService {
    pub fn new(host: Arc<dyn CaptureHost>, limits: CaptureLimits, indicator: Arc<dyn StatusIndicator>) -> Self {
        Self {
            tracker: Arc::new(CaptureTracker::new()),
            orchestrator: Orchestrator::new(host, limits),
            indicator,
            delivery: None,
        }
    }

    /// Deliver successful captures to `clipboard`, previewing them on `preview`.
    pub fn with_delivery(mut self, clipboard: Arc<dyn ClipboardSink>, preview: Arc<dyn PreviewSurface>) -> Self {
        self.delivery = Some(ResultDelivery::new(self.tracker.clone(), clipboard, preview));
        self
    }

    pub fn tracker(&self) -> &Arc<CaptureTracker> {
        &self.tracker
    }

    pub async fn capture(&self, request: CaptureRequest) -> Result<CaptureOutcome, CaptureError> {
        let target = request.target_id.clone();
        let generation = self.tracker.begin(&target);
        self.indicator.show(&target, CaptureStatus::Capturing);

        // A leftover card from the previous capture must not end up in this one.
        if let Some(delivery) = &self.delivery {
            if let Err(e) = delivery.preview().remove(&target).await {
                debug!(target = %target, error = %e, "No overlay removed");
            }
        }

        let result = self.orchestrator.capture(&request, generation).await;
        let outcome = match result {
            Ok(artifact) => Ok(self.finish(&target, generation, artifact).await),
            Err(e) if !self.tracker.is_current(&target, generation) => {
                debug!(target = %target, %generation, error = %e, "Superseded capture failed");
                self.superseded(&target, generation);
                Ok(CaptureOutcome::Superseded)
            }
            Err(e) => {
                self.fail(&target, generation, &e).await;
                Err(e)
            }
        };

        self.tracker.end(&target, generation);
        outcome
    }

    /// Write the last capture of `target` to the clipboard again.
    pub async fn retry_clipboard(&self, target: &TargetId) -> Result<ClipboardOutcome, CaptureError> {
        let Some(delivery) = &self.delivery else {
            return Err(CaptureError::Host("no clipboard configured".into()));
        };
        let generation = self.tracker.begin(target);
        let outcome = match delivery.retry(target, generation).await {
            Some(outcome) => {
                self.report_clipboard(target, generation, &outcome, None).await;
                Ok(outcome)
            }
            None => Err(CaptureError::InvalidResult {
                step: "retry clipboard".into(),
                detail: "no capture to retry for this target".into(),
            }),
        };
        self.tracker.end(target, generation);
        outcome
    }

    /// Clear the status and any overlay for `target`, e.g. once the user has seen a
    /// persistent message. Returns `false` without touching anything while a capture
    /// for the target is still running.
    pub async fn dismiss(&self, target: &TargetId) -> bool {
        if self.tracker.current(target).is_some() {
            return false;
        }
        if let Some(delivery) = &self.delivery {
            if let Err(e) = delivery.preview().remove(target).await {
                debug!(target = %target, error = %e, "No overlay removed");
            }
        }
        self.indicator.show(target, CaptureStatus::Cleared);
        true
    }

    async fn finish(&self, target: &TargetId, generation: Generation, artifact: CaptureArtifact) -> CaptureOutcome {
        if let Some(warning) = artifact.warning {
            CaptureEventLogger::log_event(
                target.as_str(),
                generation.0,
                CaptureEvent::Warning { message: warning.to_string() },
            );
        }

        let Some(delivery) = &self.delivery else {
            if !self.tracker.is_current(target, generation) {
                self.superseded(target, generation);
                return CaptureOutcome::Superseded;
            }
            self.indicator.show(target, CaptureStatus::Succeeded { warning: artifact.warning });
            CaptureEventLogger::log_event(
                target.as_str(),
                generation.0,
                CaptureEvent::Delivered { bytes: artifact.pixel_data.len(), clipboard: false },
            );
            return CaptureOutcome::Captured { artifact };
        };

        let clipboard = delivery.deliver(target, &artifact, generation).await;
        if matches!(clipboard, ClipboardOutcome::Stale) || !self.tracker.is_current(target, generation) {
            self.superseded(target, generation);
            return CaptureOutcome::Superseded;
        }
        self.report_clipboard(target, generation, &clipboard, Some(&artifact)).await;
        CaptureOutcome::Delivered { artifact, clipboard }
    }

    async fn report_clipboard(
        &self,
        target: &TargetId,
        generation: Generation,
        outcome: &ClipboardOutcome,
        artifact: Option<&CaptureArtifact>,
    ) {
        match outcome {
            ClipboardOutcome::Written => {
                if !self.tracker.is_current(target, generation) {
                    return;
                }
                self.indicator.show(target, CaptureStatus::Succeeded { warning: artifact.and_then(|a| a.warning) });
                CaptureEventLogger::log_event(
                    target.as_str(),
                    generation.0,
                    CaptureEvent::Delivered { bytes: artifact.map_or(0, |a| a.pixel_data.len()), clipboard: true },
                );
            }
            ClipboardOutcome::Failed(e) => self.fail(target, generation, e).await,
            ClipboardOutcome::Stale => self.superseded(target, generation),
        }
    }

    /// Failure UI. Focus-loss failures get a persistent explanation; everything else
    /// clears the overlay and shows a fading failure status.
    async fn fail(&self, target: &TargetId, generation: Generation, error: &CaptureError) {
        CaptureEventLogger::log_event(
            target.as_str(),
            generation.0,
            CaptureEvent::Failed { error: error.to_string() },
        );
        let message = error.user_message();
        let persistent = error.is_focus_loss();

        if let Some(delivery) = &self.delivery {
            if !self.tracker.is_current(target, generation) {
                return;
            }
            let preview = delivery.preview();
            let shown = if persistent {
                preview.show_message(target, &message, true).await
            } else {
                preview.remove(target).await
            };
            if let Err(e) = shown {
                warn!(target = %target, error = %e, "Failed to update overlay after failure");
            }
        }

        if !self.tracker.is_current(target, generation) {
            return;
        }
        self.indicator.show(target, CaptureStatus::Failed { message, persistent });
    }

    fn superseded(&self, target: &TargetId, generation: Generation) {
        CaptureEventLogger::log_event(target.as_str(), generation.0, CaptureEvent::Superseded);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MockClipboard, MockHost, RecordingIndicator, RecordingPreview};
    use fullshot_core::CaptureWarning;

    struct Harness {
        host: Arc<MockHost>,
        clipboard: Arc<MockClipboard>,
        indicator: Arc<RecordingIndicator>,
        preview: Arc<RecordingPreview>,
        service: CaptureService,
    }

    fn harness(host: MockHost, clipboard: MockClipboard) -> Harness {
        let host = Arc::new(host);
        let clipboard = Arc::new(clipboard);
        let indicator = Arc::new(RecordingIndicator::default());
        let preview = Arc::new(RecordingPreview::default());
        let service = CaptureService::new(host.clone(), CaptureLimits::default(), indicator.clone())
            .with_delivery(clipboard.clone(), preview.clone());
        Harness { host, clipboard, indicator, preview, service }
    }

    #[tokio::test]
    async fn successful_capture_shows_success_with_warning() {
        let h = harness(
            MockHost::new("https://example.com/").with_document(1280.0, 9000.0).with_pixel_ratio(2.0),
            MockClipboard::new(),
        );
        let outcome = h.service.capture(CaptureRequest::full_page(h.host.target())).await.unwrap();

        assert!(matches!(outcome, CaptureOutcome::Delivered { clipboard: ClipboardOutcome::Written, .. }));
        assert_eq!(
            h.indicator.shown(),
            vec![
                CaptureStatus::Capturing,
                CaptureStatus::Succeeded { warning: Some(CaptureWarning::ReducedResolution) },
            ]
        );
        assert_eq!(h.clipboard.writes().len(), 1);
        assert_eq!(h.service.tracker().current(&h.host.target()), None);
    }

    #[tokio::test]
    async fn rejected_target_fails_without_capture_calls() {
        let h = harness(MockHost::new("chrome-extension://abc/popup.html"), MockClipboard::new());
        let err = h.service.capture(CaptureRequest::full_page(h.host.target())).await.unwrap_err();
        assert!(matches!(err, CaptureError::RejectedTarget(_)));
        assert_eq!(h.host.calls(), vec!["target_info"]);
        assert!(matches!(
            h.indicator.shown().last(),
            Some(CaptureStatus::Failed { persistent: false, .. })
        ));
        assert_eq!(h.preview.events(), vec!["remove", "remove"]);
    }

    #[tokio::test]
    async fn focus_loss_is_persistent_and_retryable() {
        let h = harness(MockHost::new("https://example.com/"), MockClipboard::new());
        h.clipboard.set_focused(false);
        let tab = h.host.target();

        let outcome = h.service.capture(CaptureRequest::visible(tab.clone())).await.unwrap();
        assert!(matches!(
            outcome,
            CaptureOutcome::Delivered { clipboard: ClipboardOutcome::Failed(CaptureError::FocusLost), .. }
        ));
        assert_eq!(
            h.indicator.shown().last(),
            Some(&CaptureStatus::Failed {
                message: "Stay on this tab during capture, then retry.".into(),
                persistent: true,
            })
        );
        assert_eq!(
            h.preview.events().last().map(String::as_str),
            Some("message:persistent:Stay on this tab during capture, then retry.")
        );

        h.clipboard.set_focused(true);
        let retried = h.service.retry_clipboard(&tab).await.unwrap();
        assert_eq!(retried, ClipboardOutcome::Written);
        assert_eq!(h.clipboard.writes(), vec![b"visible".to_vec()]);
        assert!(matches!(h.indicator.shown().last(), Some(CaptureStatus::Succeeded { .. })));
        // Retry never re-ran the capture.
        assert_eq!(h.host.calls().iter().filter(|c| *c == "capture_visible_region").count(), 1);
    }

    #[tokio::test]
    async fn debugger_conflict_surfaces_actionable_message() {
        let h = harness(MockHost::new("https://example.com/").with_foreign_debugger(), MockClipboard::new());
        let err = h.service.capture(CaptureRequest::full_page(h.host.target())).await.unwrap_err();
        assert!(matches!(err, CaptureError::DebuggerAttached(_)));
        match h.indicator.shown().last() {
            Some(CaptureStatus::Failed { message, persistent }) => {
                assert!(message.contains("Another debugger"));
                assert!(!persistent);
            }
            other => panic!("unexpected status {other:?}"),
        }
        assert_eq!(h.preview.events().last().map(String::as_str), Some("remove"));
    }

    #[tokio::test]
    async fn overlapping_captures_show_one_success_for_the_newest() {
        let h = harness(
            MockHost::new("https://example.com/").with_document(1280.0, 2400.0),
            MockClipboard::holding_first_write(),
        );
        let tab = h.host.target();

        let first = h.service.capture(CaptureRequest::full_page(tab.clone()));
        let second = async {
            h.clipboard.entered.notified().await;
            let outcome = h.service.capture(CaptureRequest::full_page(tab.clone())).await;
            h.clipboard.release.notify_one();
            outcome
        };
        let (a, b) = tokio::join!(first, second);

        assert_eq!(a.unwrap(), CaptureOutcome::Superseded);
        assert!(matches!(b.unwrap(), CaptureOutcome::Delivered { clipboard: ClipboardOutcome::Written, .. }));
        assert_eq!(h.indicator.successes(), 1);
        assert_eq!(
            h.indicator.shown(),
            vec![
                CaptureStatus::Capturing,
                CaptureStatus::Capturing,
                CaptureStatus::Succeeded { warning: None },
            ]
        );
        assert_eq!(h.service.tracker().current(&tab), None);
    }

    #[tokio::test]
    async fn superseded_failure_shows_nothing() {
        let h = harness(MockHost::new("https://example.com/"), MockClipboard::holding_first_write());
        h.clipboard.fail_held_write(CaptureError::Host("denied".into()));
        let tab = h.host.target();

        let first = h.service.capture(CaptureRequest::visible(tab.clone()));
        let second = async {
            h.clipboard.entered.notified().await;
            let outcome = h.service.capture(CaptureRequest::visible(tab.clone())).await;
            h.clipboard.release.notify_one();
            outcome
        };
        let (a, b) = tokio::join!(first, second);

        assert_eq!(a.unwrap(), CaptureOutcome::Superseded);
        assert!(b.is_ok());
        assert_eq!(h.indicator.successes(), 1);
        assert!(!h.indicator.shown().iter().any(|s| matches!(s, CaptureStatus::Failed { .. })));
    }

    #[tokio::test]
    async fn dismiss_clears_persistent_failure() {
        let h = harness(MockHost::new("https://example.com/"), MockClipboard::new());
        h.clipboard.set_focused(false);
        let tab = h.host.target();
        h.service.capture(CaptureRequest::visible(tab.clone())).await.unwrap();

        assert!(h.service.dismiss(&tab).await);
        assert_eq!(h.indicator.shown().last(), Some(&CaptureStatus::Cleared));
        assert_eq!(h.preview.events().last().map(String::as_str), Some("remove"));
    }

    #[tokio::test]
    async fn dismiss_waits_for_running_capture() {
        let h = harness(MockHost::new("https://example.com/"), MockClipboard::new());
        let tab = h.host.target();
        let generation = h.service.tracker().begin(&tab);

        assert!(!h.service.dismiss(&tab).await);
        assert!(h.indicator.shown().is_empty());
        assert!(h.preview.events().is_empty());
        h.service.tracker().end(&tab, generation);
    }

    #[tokio::test]
    async fn capture_without_clipboard_returns_artifact() {
        let host = Arc::new(MockHost::new("https://example.com/"));
        let indicator = Arc::new(RecordingIndicator::default());
        let service = CaptureService::new(host.clone(), CaptureLimits::default(), indicator.clone());
        let outcome = service.capture(CaptureRequest::visible(host.target())).await.unwrap();
        assert_eq!(outcome.artifact().map(|a| a.pixel_data.clone()), Some(b"visible".to_vec()));
        assert_eq!(indicator.successes(), 1);
    }
}
