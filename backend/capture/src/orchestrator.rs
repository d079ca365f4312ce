//! Capture Orchestrator
//!
//! Drives one capture request through the gate and either the visible-area path or the
//! full-page path (attach, measure, resize, capture, cleanup, detach).

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use fullshot_core::{
    is_capturable, CaptureArtifact, CaptureError, CaptureHost, CaptureRequest, ClipRect,
    DebugHandle, Generation, TargetId, ViewportOverride,
};
use fullshot_logging::{redact_address, CaptureEvent, CaptureEventLogger};

use crate::normalizer::Normalizer;
use crate::page_agent::ScriptedDom;
use crate::page_scripts::{
    DEVICE_PIXEL_RATIO_JS, HIDE_SCROLLBARS_JS, INSTALL_RESIZE_GUARD_JS, REMOVE_RESIZE_GUARD_JS,
    REMOVE_SCROLLBAR_STYLE_JS,
};
use crate::resolution::{choose_resolution, clamp_capture_width};

/// Constants with externally visible effect on full-page captures.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureLimits {
    /// Upper bound on the capture width, in CSS pixels.
    pub max_capture_width: u32,
    /// Largest physical pixel height the compositor renders in one texture.
    pub texture_ceiling: u32,
    /// Scroll extent must exceed client extent by more than this to count as a nested scroller.
    pub scroll_slack_px: f64,
}

impl Default for CaptureLimits {
    fn default() -> Self {
        Self {
            max_capture_width: 4096,
            texture_ceiling: 16384,
            scroll_slack_px: 5.0,
        }
    }
}

pub struct Orchestrator {
    host: Arc<dyn CaptureHost>,
    limits: CaptureLimits,
}

impl Orchestrator {
    pub fn new(host: Arc<dyn CaptureHost>, limits: CaptureLimits) -> Self {
        Self { host, limits }
    }

    pub fn host(&self) -> &Arc<dyn CaptureHost> {
        &self.host
    }

    pub fn limits(&self) -> CaptureLimits {
        self.limits
    }

    pub async fn capture(
        &self,
        request: &CaptureRequest,
        generation: Generation,
    ) -> Result<CaptureArtifact, CaptureError> {
        let target = &request.target_id;
        let info = self.host.target_info(target).await?;

        CaptureEventLogger::log_event(
            target.as_str(),
            generation.0,
            CaptureEvent::Started { address: info.url.clone(), full_page: request.full_page },
        );

        if !is_capturable(info.url.as_deref()) {
            let address = info.url.as_deref().map(redact_address).unwrap_or_default();
            info!(target = %target, %generation, address = %address, "Target rejected");
            return Err(CaptureError::RejectedTarget(address));
        }

        if request.full_page {
            self.capture_full_page(target, generation).await
        } else {
            self.capture_visible(target).await
        }
    }

    async fn capture_visible(&self, target: &TargetId) -> Result<CaptureArtifact, CaptureError> {
        let pixel_data = self.host.capture_visible_region(target).await?;
        if pixel_data.is_empty() {
            return Err(CaptureError::InvalidResult {
                step: "capture visible region".into(),
                detail: "empty image".into(),
            });
        }
        Ok(CaptureArtifact { pixel_data, warning: None })
    }

    async fn capture_full_page(
        &self,
        target: &TargetId,
        generation: Generation,
    ) -> Result<CaptureArtifact, CaptureError> {
        let handle = self.host.attach_debug_control(target).await?;
        debug!(target = %target, %generation, session = %handle.session_id, "Attached");

        let dom = ScriptedDom::new(self.host.as_ref(), &handle);
        let result = self.run_attached(&handle, &dom).await;

        if let Err(e) = &result {
            CaptureEventLogger::log_event(
                target.as_str(),
                generation.0,
                CaptureEvent::StepFailed { step: failed_step(e), error: e.to_string() },
            );
        }

        self.cleanup(&handle, &dom, generation).await;

        if let Err(e) = self.host.detach_debug_control(&handle).await {
            self.cleanup_failed(&handle, generation, "detach debug control", &e);
        }

        result
    }

    async fn run_attached(
        &self,
        handle: &DebugHandle,
        dom: &ScriptedDom<'_>,
    ) -> Result<CaptureArtifact, CaptureError> {
        let metrics = self.host.layout_metrics(handle).await?;

        if dom.ensure_installed().await? {
            debug!(target = %handle.target, "Installed page agent");
        }
        let normalizer = Normalizer::new(dom, self.limits.scroll_slack_px);
        let measurement = normalizer.measure().await?;
        let complex = normalizer.has_expansion().await?;

        let native_ratio = self.read_pixel_ratio(handle).await?;
        let width = clamp_capture_width(metrics.viewport_width, self.limits.max_capture_width);
        let height = measurement.dimensions.height_px();
        let plan = choose_resolution(
            measurement.dimensions.height,
            native_ratio,
            complex,
            self.limits.texture_ceiling,
        );

        info!(
            target = %handle.target,
            width,
            height,
            native_ratio,
            complex,
            pixel_ratio = ?plan.pixel_ratio,
            "Resizing for full-page capture"
        );

        self.evaluate(handle, "hide scrollbars", HIDE_SCROLLBARS_JS).await?;
        match self.host.suppress_viewport_size_indicator(handle).await {
            Ok(true) => {}
            Ok(false) => debug!(target = %handle.target, "Viewport size indicator cannot be suppressed"),
            Err(e) => warn!(target = %handle.target, error = %e, "Failed to suppress viewport size indicator"),
        }
        self.evaluate(handle, "install resize guard", INSTALL_RESIZE_GUARD_JS).await?;

        self.host
            .override_viewport(
                handle,
                ViewportOverride { width, height, pixel_ratio: plan.pixel_ratio },
            )
            .await?;

        let pixel_data = self
            .host
            .capture_clipped_region(handle, ClipRect::from_origin(width, height))
            .await?;
        if pixel_data.is_empty() {
            return Err(CaptureError::InvalidResult {
                step: "capture clipped region".into(),
                detail: "empty image".into(),
            });
        }

        Ok(CaptureArtifact { pixel_data, warning: plan.warning })
    }

    /// Every sub-step runs regardless of the others; failures are logged only.
    async fn cleanup(&self, handle: &DebugHandle, dom: &ScriptedDom<'_>, generation: Generation) {
        if let Err(e) = self.host.clear_viewport_override(handle).await {
            self.cleanup_failed(handle, generation, "clear viewport override", &e);
        }
        if let Err(e) = self.evaluate(handle, "remove resize guard", REMOVE_RESIZE_GUARD_JS).await {
            self.cleanup_failed(handle, generation, "remove resize guard", &e);
        }
        if let Err(e) = self.evaluate(handle, "remove scrollbar style", REMOVE_SCROLLBAR_STYLE_JS).await {
            self.cleanup_failed(handle, generation, "remove scrollbar style", &e);
        }
        match Normalizer::new(dom, self.limits.scroll_slack_px).restore().await {
            Ok(restored) => debug!(target = %handle.target, restored, "Page restored"),
            Err(e) => self.cleanup_failed(handle, generation, "restore page styles", &e),
        }
    }

    fn cleanup_failed(&self, handle: &DebugHandle, generation: Generation, step: &str, error: &CaptureError) {
        CaptureEventLogger::log_event(
            handle.target.as_str(),
            generation.0,
            CaptureEvent::CleanupFailed { step: step.to_string(), error: error.to_string() },
        );
    }

    async fn evaluate(&self, handle: &DebugHandle, step: &str, source: &str) -> Result<Value, CaptureError> {
        self.host.evaluate_script(handle, source).await?.into_result(step)
    }

    async fn read_pixel_ratio(&self, handle: &DebugHandle) -> Result<f64, CaptureError> {
        let step = "read device pixel ratio";
        let value = self.evaluate(handle, step, DEVICE_PIXEL_RATIO_JS).await?;
        value.as_f64().ok_or_else(|| CaptureError::InvalidResult {
            step: step.into(),
            detail: format!("expected a number, got {value}"),
        })
    }
}

fn failed_step(error: &CaptureError) -> String {
    match error {
        CaptureError::Script { step, .. } | CaptureError::InvalidResult { step, .. } => step.clone(),
        CaptureError::DebuggerAttached(_) => "attach debug control".into(),
        _ => "full-page capture".into(),
    }
}
