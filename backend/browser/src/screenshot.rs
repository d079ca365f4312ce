//! Screenshot parameters and decoding.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{json, Value};

use fullshot_core::{CaptureError, ClipRect};

/// `Page.captureScreenshot` params for the current viewport.
pub fn viewport_params() -> Value {
    json!({ "format": "png" })
}

/// `Page.captureScreenshot` params for `clip` at scale 1, which keeps whatever
/// device scale factor the emulation override set.
pub fn clip_params(clip: ClipRect) -> Value {
    json!({
        "format": "png",
        "clip": {
            "x": clip.x,
            "y": clip.y,
            "width": clip.width,
            "height": clip.height,
            "scale": 1,
        },
    })
}

/// PNG bytes from a `Page.captureScreenshot` result.
pub fn decode_screenshot(result: &Value) -> Result<Vec<u8>, CaptureError> {
    let data = result.get("data").and_then(Value::as_str).ok_or_else(|| CaptureError::InvalidResult {
        step: "capture screenshot".into(),
        detail: "missing `data`".into(),
    })?;
    STANDARD.decode(data).map_err(|e| CaptureError::InvalidResult {
        step: "capture screenshot".into(),
        detail: format!("invalid base64: {e}"),
    })
}
