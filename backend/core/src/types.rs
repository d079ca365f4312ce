use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CaptureError;

/// Opaque identifier of a browser tab/page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(String);

impl TargetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TargetId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// What the host knows about a target at the time of the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetInfo {
    pub id: TargetId,
    pub url: Option<String>,
    #[serde(default)]
    pub title: String,
}

/// A user or programmatic trigger. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRequest {
    pub target_id: TargetId,
    pub full_page: bool,
}

impl CaptureRequest {
    pub fn visible(target_id: TargetId) -> Self {
        Self { target_id, full_page: false }
    }

    pub fn full_page(target_id: TargetId) -> Self {
        Self { target_id, full_page: true }
    }
}

/// Process-wide, strictly increasing capture id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Generation(pub u64);

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Measured extent of the authoritative content region, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageDimensions {
    pub width: f64,
    pub height: f64,
}

impl PageDimensions {
    /// Width is floored at 0 and height at 1; non-finite input counts as the floor.
    pub fn new(width: f64, height: f64) -> Self {
        let width = if width.is_finite() { width.max(0.0) } else { 0.0 };
        let height = if height.is_finite() { height.max(1.0) } else { 1.0 };
        Self { width, height }
    }

    /// Height in whole CSS pixels, as handed to the viewport override.
    pub fn height_px(&self) -> u32 {
        self.height.ceil().min(u32::MAX as f64) as u32
    }
}

/// Quality caveat attached to an otherwise successful capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureWarning {
    /// Captured at device-pixel-ratio 1 because native resolution would exceed the texture ceiling.
    ReducedResolution,
    /// Even at ratio 1 the page is taller than the texture ceiling; the compositor may tile.
    TilingRisk,
}

impl fmt::Display for CaptureWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureWarning::ReducedResolution => {
                f.write_str("Page is very tall; captured at reduced resolution.")
            }
            CaptureWarning::TilingRisk => f.write_str(
                "Page exceeds the maximum texture height; the image may contain tiling artifacts.",
            ),
        }
    }
}

/// Result of one successful capture. Consumed by delivery, never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureArtifact {
    /// Encoded image bytes (PNG from the CDP host).
    pub pixel_data: Vec<u8>,
    pub warning: Option<CaptureWarning>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutMetrics {
    pub viewport_width: f64,
}

/// Device metrics override. `pixel_ratio: None` leaves the ratio to the host (native).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportOverride {
    pub width: u32,
    pub height: u32,
    pub pixel_ratio: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ClipRect {
    pub fn from_origin(width: u32, height: u32) -> Self {
        Self { x: 0.0, y: 0.0, width: width as f64, height: height as f64 }
    }
}

/// Exclusive remote-debug control over one target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DebugHandle {
    pub target: TargetId,
    pub session_id: String,
}

/// Exception reported by the page while evaluating a script.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptException {
    pub description: String,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

/// Raw evaluation result; `value` is untyped JSON and must be shape-checked by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptOutcome {
    pub value: serde_json::Value,
    pub exception: Option<ScriptException>,
}

impl ScriptOutcome {
    pub fn value(value: serde_json::Value) -> Self {
        Self { value, exception: None }
    }

    /// Turns a reported exception into a step-tagged error.
    pub fn into_result(self, step: &str) -> Result<serde_json::Value, CaptureError> {
        match self.exception {
            Some(exception) => Err(CaptureError::Script {
                step: step.to_string(),
                description: exception.description,
                line: exception.line,
                column: exception.column,
            }),
            None => Ok(self.value),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClipboardOutcome {
    Written,
    /// A newer capture for the same target took over; nothing user-visible happened.
    Stale,
    Failed(CaptureError),
}

/// Badge-level status of a target.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureStatus {
    Capturing,
    Succeeded { warning: Option<CaptureWarning> },
    /// `persistent` failures stay until the next capture instead of fading.
    Failed { message: String, persistent: bool },
    Cleared,
}
