//! In-page clipboard sink and preview overlay, driven through the host's page scripts.

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use serde_json::Value;

use fullshot_core::{CaptureArtifact, CaptureError, CaptureHost, ClipboardSink, PreviewSurface, TargetId};

use crate::page_scripts::HAS_FOCUS_JS;

pub const OVERLAY_ID: &str = "fullshot-overlay";

/// How long a non-persistent overlay stays up.
pub const OVERLAY_DISMISS_MS: u64 = 4000;

const CLIPBOARD_WRITE_JS: &str = r#"(async () => {
  if (!document.hasFocus()) return 'unfocused';
  const binary = atob(__DATA__);
  const bytes = new Uint8Array(binary.length);
  for (let i = 0; i < binary.length; i++) bytes[i] = binary.charCodeAt(i);
  try {
    const blob = new Blob([bytes], { type: 'image/png' });
    await navigator.clipboard.write([new ClipboardItem({ 'image/png': blob })]);
    return 'written';
  } catch (e) {
    if (!document.hasFocus()) return 'unfocused';
    return 'error: ' + ((e && e.message) || String(e));
  }
})()"#;

const OVERLAY_JS: &str = r#"(() => {
  const content = __CONTENT__;
  const old = document.getElementById('fullshot-overlay');
  if (old) old.remove();
  const root = document.createElement('div');
  root.id = 'fullshot-overlay';
  const token = String(Date.now()) + Math.random();
  root.dataset.token = token;
  root.style.cssText = 'position:fixed;top:16px;right:16px;z-index:2147483647;max-width:320px;' +
    'padding:10px;border-radius:8px;background:rgba(32,33,36,0.92);color:#fff;' +
    'font:13px/1.4 system-ui,sans-serif;box-shadow:0 4px 16px rgba(0,0,0,0.3);';
  if (content.flash) {
    const flash = document.createElement('div');
    flash.style.cssText = 'position:fixed;inset:0;background:#fff;opacity:0.6;pointer-events:none;' +
      'transition:opacity 300ms ease-out;z-index:2147483646;';
    document.documentElement.appendChild(flash);
    requestAnimationFrame(() => { flash.style.opacity = '0'; });
    setTimeout(() => flash.remove(), 350);
  }
  if (content.thumbnail) {
    const img = document.createElement('img');
    img.src = content.thumbnail;
    img.style.cssText = 'display:block;max-width:300px;max-height:200px;object-fit:contain;' +
      'object-position:top;margin-bottom:6px;border-radius:4px;';
    root.appendChild(img);
  }
  if (content.message) {
    const text = document.createElement('div');
    text.textContent = content.message;
    root.appendChild(text);
  }
  document.documentElement.appendChild(root);
  if (!content.persistent) {
    setTimeout(() => {
      const current = document.getElementById('fullshot-overlay');
      if (current && current.dataset.token === token) current.remove();
    }, content.dismissMs);
  }
  return true;
})()"#;

const REMOVE_OVERLAY_JS: &str = r#"(() => {
  const el = document.getElementById('fullshot-overlay');
  if (el) el.remove();
  return !!el;
})()"#;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OverlayContent<'a> {
    flash: bool,
    thumbnail: Option<String>,
    message: Option<&'a str>,
    persistent: bool,
    dismiss_ms: u64,
}

fn overlay_source(content: &OverlayContent<'_>) -> Result<String, CaptureError> {
    let json = serde_json::to_string(content).map_err(|e| CaptureError::InvalidResult {
        step: "render overlay".into(),
        detail: e.to_string(),
    })?;
    Ok(OVERLAY_JS.replace("__CONTENT__", &json))
}

fn clipboard_source(image: &[u8]) -> String {
    // Base64 never contains quotes or backslashes.
    let literal = format!("'{}'", STANDARD.encode(image));
    CLIPBOARD_WRITE_JS.replace("__DATA__", &literal)
}

/// Clipboard sink that writes through the target page's async clipboard API.
pub struct PageClipboard {
    host: Arc<dyn CaptureHost>,
}

impl PageClipboard {
    pub fn new(host: Arc<dyn CaptureHost>) -> Self {
        Self { host }
    }
}

#[async_trait]
impl ClipboardSink for PageClipboard {
    async fn has_focus(&self, target: &TargetId) -> Result<bool, CaptureError> {
        let value = self.host.run_page_script(target, HAS_FOCUS_JS).await?;
        value.as_bool().ok_or_else(|| CaptureError::InvalidResult {
            step: "check page focus".into(),
            detail: format!("expected a boolean, got {value}"),
        })
    }

    async fn write_image(&self, target: &TargetId, image: &[u8]) -> Result<(), CaptureError> {
        let value = self.host.run_page_script(target, &clipboard_source(image)).await?;
        match value.as_str() {
            Some("written") => Ok(()),
            Some("unfocused") => Err(CaptureError::FocusLost),
            Some(other) => {
                let message = other.strip_prefix("error: ").unwrap_or(other);
                if message.to_ascii_lowercase().contains("not focused") {
                    Err(CaptureError::FocusLost)
                } else {
                    Err(CaptureError::Host(format!("clipboard write rejected: {message}")))
                }
            }
            None => Err(CaptureError::InvalidResult {
                step: "write clipboard".into(),
                detail: format!("expected a status string, got {value}"),
            }),
        }
    }
}

/// Flash plus thumbnail/status card rendered inside the captured page.
pub struct PageOverlay {
    host: Arc<dyn CaptureHost>,
}

impl PageOverlay {
    pub fn new(host: Arc<dyn CaptureHost>) -> Self {
        Self { host }
    }

    async fn render(&self, target: &TargetId, content: &OverlayContent<'_>) -> Result<(), CaptureError> {
        let source = overlay_source(content)?;
        match self.host.run_page_script(target, &source).await? {
            Value::Bool(true) => Ok(()),
            other => Err(CaptureError::InvalidResult {
                step: "render overlay".into(),
                detail: format!("expected true, got {other}"),
            }),
        }
    }
}

#[async_trait]
impl PreviewSurface for PageOverlay {
    async fn show_capture(&self, target: &TargetId, artifact: &CaptureArtifact) -> Result<(), CaptureError> {
        let thumbnail = format!("data:image/png;base64,{}", STANDARD.encode(&artifact.pixel_data));
        let message = artifact.warning.map(|w| w.to_string());
        self.render(
            target,
            &OverlayContent {
                flash: true,
                thumbnail: Some(thumbnail),
                message: message.as_deref(),
                persistent: false,
                dismiss_ms: OVERLAY_DISMISS_MS,
            },
        )
        .await
    }

    async fn show_message(&self, target: &TargetId, message: &str, persistent: bool) -> Result<(), CaptureError> {
        self.render(
            target,
            &OverlayContent {
                flash: false,
                thumbnail: None,
                message: Some(message),
                persistent,
                dismiss_ms: OVERLAY_DISMISS_MS,
            },
        )
        .await
    }

    async fn remove(&self, target: &TargetId) -> Result<(), CaptureError> {
        self.host.run_page_script(target, REMOVE_OVERLAY_JS).await?;
        Ok(())
    }
}
