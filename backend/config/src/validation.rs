//! Config validation: range checks with user-friendly error messages.

use crate::schema::FullshotConfig;
use thiserror::Error;

/// Ceilings below this are legal but make tiling warnings likely.
const SMALL_TEXTURE_CEILING: u32 = 4096;

/// A config validation error with field path and message.
#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// A collection of validation errors found in one pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

/// Validate the config and return a report of all errors and warnings.
pub fn validate(config: &FullshotConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_capture(config, &mut report);
    validate_browser(config, &mut report);
    validate_logging(config, &mut report);
    report
}

fn validate_capture(config: &FullshotConfig, report: &mut ValidationReport) {
    let Some(capture) = &config.capture else { return };

    if capture.max_capture_width == Some(0) {
        report.error("capture.maxCaptureWidth", "maxCaptureWidth must be > 0");
    }
    match capture.texture_ceiling {
        Some(0) => report.error("capture.textureCeiling", "textureCeiling must be > 0"),
        Some(ceiling) if ceiling < SMALL_TEXTURE_CEILING => report.warn(
            "capture.textureCeiling",
            format!("textureCeiling {ceiling} is unusually small; tall pages will be captured at reduced resolution"),
        ),
        _ => {}
    }
    if let (Some(width), Some(ceiling)) = (capture.max_capture_width, capture.texture_ceiling) {
        if ceiling > 0 && width > ceiling {
            report.error(
                "capture.maxCaptureWidth",
                format!("maxCaptureWidth {width} exceeds textureCeiling {ceiling}"),
            );
        }
    }
    if let Some(slack) = capture.scroll_slack_px {
        if !slack.is_finite() || slack <= 0.0 {
            report.error("capture.scrollSlackPx", "scrollSlackPx must be a positive number");
        }
    }
}

fn validate_browser(config: &FullshotConfig, report: &mut ValidationReport) {
    let Some(browser) = &config.browser else { return };

    if browser.port == Some(0) {
        report.error("browser.port", "port must be > 0");
    }
    if browser.command_timeout_ms == Some(0) {
        report.error("browser.commandTimeoutMs", "commandTimeoutMs must be > 0");
    }
    if browser.host.as_deref().is_some_and(|h| h.trim().is_empty()) {
        report.error("browser.host", "host cannot be empty");
    }
    if let Some(endpoint) = &browser.endpoint {
        if !(endpoint.starts_with("ws://") || endpoint.starts_with("wss://")) {
            report.error(
                "browser.endpoint",
                format!("endpoint '{endpoint}' must be a ws:// or wss:// URL"),
            );
        }
    }
}

fn validate_logging(config: &FullshotConfig, report: &mut ValidationReport) {
    let Some(logging) = &config.logging else { return };
    if let Some(level) = &logging.level {
        if level.trim().is_empty() {
            report.error("logging.level", "level cannot be empty");
        }
    }
}
