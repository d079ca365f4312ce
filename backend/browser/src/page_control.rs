//! CDP implementation of the capture host.
//!
//! Debug control is an exclusive flattened session per target. Page scripts that run
//! without debug control (preview overlay, clipboard) use short-lived sessions.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use fullshot_core::{
    CaptureError, CaptureHost, ClipRect, DebugHandle, LayoutMetrics, ScriptException,
    ScriptOutcome, TargetId, TargetInfo, ViewportOverride,
};

use crate::cdp_client::CdpClient;
use crate::discovery::discover_endpoint;
use crate::error::CdpError;
use crate::screenshot::{clip_params, decode_screenshot, viewport_params};

/// Session id stored while an attach is in flight.
const RESERVED: &str = "";

pub struct CdpHost {
    client: CdpClient,
    attached: Mutex<HashMap<TargetId, String>>,
}

impl CdpHost {
    pub fn new(client: CdpClient) -> Self {
        Self { client, attached: Mutex::new(HashMap::new()) }
    }

    pub async fn connect(ws_endpoint: &str, timeout: Duration) -> Result<Self, CdpError> {
        Ok(Self::new(CdpClient::connect(ws_endpoint, timeout).await?))
    }

    pub async fn discover(host: &str, port: u16, timeout: Duration) -> Result<Self, CdpError> {
        let endpoint = discover_endpoint(host, port).await?;
        Self::connect(&endpoint, timeout).await
    }

    fn attached(&self) -> MutexGuard<'_, HashMap<TargetId, String>> {
        self.attached.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// All page targets, most recently focused first.
    pub async fn list_targets(&self) -> Result<Vec<TargetInfo>, CaptureError> {
        let result = self
            .client
            .send_command("Target.getTargets", json!({}))
            .await
            .map_err(|e| CaptureError::Host(e.to_string()))?;
        let infos = result
            .get("targetInfos")
            .and_then(Value::as_array)
            .ok_or_else(|| CaptureError::InvalidResult {
                step: "list targets".into(),
                detail: "missing `targetInfos`".into(),
            })?;
        Ok(infos
            .iter()
            .filter(|t| t.get("type").and_then(Value::as_str) == Some("page"))
            .filter_map(|t| {
                Some(TargetInfo {
                    id: TargetId::new(t.get("targetId")?.as_str()?),
                    url: t.get("url").and_then(Value::as_str).map(str::to_string),
                    title: t.get("title").and_then(Value::as_str).unwrap_or_default().to_string(),
                })
            })
            .collect())
    }

    /// Open `url` in a new tab and wait until it has loaded.
    pub async fn open_page(&self, url: &str, load_timeout: Duration) -> Result<TargetId, CaptureError> {
        let result = self
            .client
            .send_command("Target.createTarget", json!({ "url": url }))
            .await
            .map_err(|e| CaptureError::Host(e.to_string()))?;
        let target = result
            .get("targetId")
            .and_then(Value::as_str)
            .map(TargetId::new)
            .ok_or_else(|| CaptureError::InvalidResult {
                step: "open page".into(),
                detail: "missing `targetId`".into(),
            })?;
        info!(target = %target, "Opened page");

        let deadline = Instant::now() + load_timeout;
        loop {
            let state = self.run_page_script(&target, "document.readyState").await?;
            if state.as_str() == Some("complete") {
                return Ok(target);
            }
            if Instant::now() >= deadline {
                return Err(CaptureError::Host(format!("page {target} did not finish loading")));
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    pub async fn close_page(&self, target: &TargetId) -> Result<(), CaptureError> {
        self.client
            .send_command("Target.closeTarget", json!({ "targetId": target.as_str() }))
            .await
            .map_err(|e| e.into_capture_error(target))?;
        Ok(())
    }

    async fn open_session(&self, target: &TargetId) -> Result<String, CaptureError> {
        let result = self
            .client
            .send_command(
                "Target.attachToTarget",
                json!({ "targetId": target.as_str(), "flatten": true }),
            )
            .await
            .map_err(|e| e.into_capture_error(target))?;
        result
            .get("sessionId")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| CaptureError::InvalidResult {
                step: "attach to target".into(),
                detail: "missing `sessionId`".into(),
            })
    }

    async fn close_session(&self, target: &TargetId, session_id: &str) {
        if let Err(e) = self
            .client
            .send_command("Target.detachFromTarget", json!({ "sessionId": session_id }))
            .await
        {
            warn!(target = %target, error = %e, "Failed to close transient session");
        }
    }

    async fn session_command(
        &self,
        handle: &DebugHandle,
        method: &str,
        params: Value,
    ) -> Result<Value, CaptureError> {
        self.client
            .send_session_command(&handle.session_id, method, params)
            .await
            .map_err(|e| e.into_capture_error(&handle.target))
    }

    async fn evaluate(
        &self,
        target: &TargetId,
        session_id: &str,
        source: &str,
        user_gesture: bool,
    ) -> Result<ScriptOutcome, CaptureError> {
        let result = self
            .client
            .send_session_command(
                session_id,
                "Runtime.evaluate",
                json!({
                    "expression": source,
                    "returnByValue": true,
                    "awaitPromise": true,
                    "userGesture": user_gesture,
                }),
            )
            .await
            .map_err(|e| e.into_capture_error(target))?;
        Ok(script_outcome(&result))
    }
}

/// Convert a `Runtime.evaluate` result, keeping exception text and 1-based position.
pub fn script_outcome(result: &Value) -> ScriptOutcome {
    if let Some(details) = result.get("exceptionDetails") {
        let description = details
            .get("exception")
            .and_then(|e| e.get("description"))
            .or_else(|| details.get("text"))
            .and_then(Value::as_str)
            .unwrap_or("JavaScript exception")
            .to_string();
        let position = |key: &str| details.get(key).and_then(Value::as_u64).map(|n| n as u32 + 1);
        return ScriptOutcome {
            value: Value::Null,
            exception: Some(ScriptException {
                description,
                line: position("lineNumber"),
                column: position("columnNumber"),
            }),
        };
    }
    let value = result
        .get("result")
        .and_then(|r| r.get("value"))
        .cloned()
        .unwrap_or(Value::Null);
    ScriptOutcome::value(value)
}

#[async_trait]
impl CaptureHost for CdpHost {
    async fn active_target(&self) -> Result<TargetInfo, CaptureError> {
        self.list_targets()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| CaptureError::Host("no page targets are open".into()))
    }

    async fn target_info(&self, target: &TargetId) -> Result<TargetInfo, CaptureError> {
        self.list_targets()
            .await?
            .into_iter()
            .find(|t| &t.id == target)
            .ok_or_else(|| CaptureError::TargetGone(target.to_string()))
    }

    async fn capture_visible_region(&self, target: &TargetId) -> Result<Vec<u8>, CaptureError> {
        let session_id = self.open_session(target).await?;
        let result = self
            .client
            .send_session_command(&session_id, "Page.captureScreenshot", viewport_params())
            .await
            .map_err(|e| e.into_capture_error(target));
        self.close_session(target, &session_id).await;
        decode_screenshot(&result?)
    }

    async fn attach_debug_control(&self, target: &TargetId) -> Result<DebugHandle, CaptureError> {
        {
            let mut attached = self.attached();
            if attached.contains_key(target) {
                return Err(CaptureError::DebuggerAttached(target.to_string()));
            }
            attached.insert(target.clone(), RESERVED.to_string());
        }

        match self.open_session(target).await {
            Ok(session_id) => {
                self.attached().insert(target.clone(), session_id.clone());
                debug!(target = %target, session = %session_id, "Debug control acquired");
                Ok(DebugHandle { target: target.clone(), session_id })
            }
            Err(e) => {
                self.attached().remove(target);
                Err(e)
            }
        }
    }

    async fn detach_debug_control(&self, handle: &DebugHandle) -> Result<(), CaptureError> {
        self.attached().remove(&handle.target);
        self.client
            .send_command("Target.detachFromTarget", json!({ "sessionId": handle.session_id }))
            .await
            .map_err(|e| e.into_capture_error(&handle.target))?;
        Ok(())
    }

    async fn evaluate_script(&self, handle: &DebugHandle, source: &str) -> Result<ScriptOutcome, CaptureError> {
        self.evaluate(&handle.target, &handle.session_id, source, false).await
    }

    async fn layout_metrics(&self, handle: &DebugHandle) -> Result<LayoutMetrics, CaptureError> {
        let result = self.session_command(handle, "Page.getLayoutMetrics", json!({})).await?;
        let viewport_width = ["cssLayoutViewport", "layoutViewport"]
            .iter()
            .find_map(|key| result.get(*key)?.get("clientWidth")?.as_f64())
            .ok_or_else(|| CaptureError::InvalidResult {
                step: "read layout metrics".into(),
                detail: "missing viewport clientWidth".into(),
            })?;
        Ok(LayoutMetrics { viewport_width })
    }

    async fn override_viewport(&self, handle: &DebugHandle, viewport: ViewportOverride) -> Result<(), CaptureError> {
        self.session_command(
            handle,
            "Emulation.setDeviceMetricsOverride",
            json!({
                "width": viewport.width,
                "height": viewport.height,
                // 0 keeps the device's own ratio.
                "deviceScaleFactor": viewport.pixel_ratio.unwrap_or(0.0),
                "mobile": false,
            }),
        )
        .await?;
        Ok(())
    }

    async fn clear_viewport_override(&self, handle: &DebugHandle) -> Result<(), CaptureError> {
        self.session_command(handle, "Emulation.clearDeviceMetricsOverride", json!({})).await?;
        Ok(())
    }

    async fn capture_clipped_region(&self, handle: &DebugHandle, clip: ClipRect) -> Result<Vec<u8>, CaptureError> {
        let result = self.session_command(handle, "Page.captureScreenshot", clip_params(clip)).await?;
        decode_screenshot(&result)
    }

    async fn suppress_viewport_size_indicator(&self, handle: &DebugHandle) -> Result<bool, CaptureError> {
        match self
            .client
            .send_session_command(
                &handle.session_id,
                "Overlay.setShowViewportSizeOnResize",
                json!({ "show": false }),
            )
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.is_method_not_found() => Ok(false),
            Err(e) => Err(e.into_capture_error(&handle.target)),
        }
    }

    async fn run_page_script(&self, target: &TargetId, source: &str) -> Result<Value, CaptureError> {
        let session_id = self.open_session(target).await?;
        let outcome = self.evaluate(target, &session_id, source, true).await;
        self.close_session(target, &session_id).await;
        outcome?.into_result("page script")
    }
}
