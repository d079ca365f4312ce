//! Output resolution choice for full-page captures.

use fullshot_core::CaptureWarning;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolutionPlan {
    /// `None` keeps the device's native ratio; `Some(1.0)` forces CSS-pixel output.
    pub pixel_ratio: Option<f64>,
    pub warning: Option<CaptureWarning>,
}

/// Pick the pixel ratio for a capture `height` CSS pixels tall.
///
/// Native resolution is dropped to 1 when the page needed expansion (`complex`) or
/// when `height * ratio` would exceed `ceiling`. A page taller than the ceiling even at
/// ratio 1 is still attempted, with a tiling warning. The reduced-resolution warning
/// is only raised when height alone forced the drop.
pub fn choose_resolution(height: f64, native_ratio: f64, complex: bool, ceiling: u32) -> ResolutionPlan {
    let ratio = if native_ratio.is_finite() && native_ratio > 0.0 { native_ratio } else { 1.0 };
    let ceiling = f64::from(ceiling);
    let physical = height * ratio;

    let over_ceiling = physical > ceiling;
    let force_unit_ratio = complex || over_ceiling;

    let warning = if height > ceiling {
        Some(CaptureWarning::TilingRisk)
    } else if over_ceiling && ratio > 1.0 && !complex {
        Some(CaptureWarning::ReducedResolution)
    } else {
        None
    };

    ResolutionPlan {
        pixel_ratio: force_unit_ratio.then_some(1.0),
        warning,
    }
}

/// Viewport width for the capture, never wider than `max`.
pub fn clamp_capture_width(viewport_width: f64, max: u32) -> u32 {
    if !viewport_width.is_finite() || viewport_width <= 0.0 {
        return 1;
    }
    let width = viewport_width.floor().max(1.0);
    if width >= f64::from(max) {
        max
    } else {
        width as u32
    }
}
