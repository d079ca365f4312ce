//! Config defaults: fills every unset field after loading.

use crate::schema::{BrowserConfig, CaptureConfig, FullshotConfig, LoggingConfig};

/// Widest capture in CSS pixels.
pub const DEFAULT_MAX_CAPTURE_WIDTH: u32 = 4096;

/// Texture ceiling in physical pixels.
pub const DEFAULT_TEXTURE_CEILING: u32 = 16384;

/// Extra scroll height a container needs before it counts as scrollable.
pub const DEFAULT_SCROLL_SLACK_PX: f64 = 5.0;

pub const DEFAULT_BROWSER_HOST: &str = "127.0.0.1";

/// Chrome's conventional remote-debugging port.
pub const DEFAULT_BROWSER_PORT: u16 = 9222;

pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 30_000;

pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Apply all defaults to a freshly loaded config.
pub fn apply_all_defaults(config: FullshotConfig) -> FullshotConfig {
    let config = apply_capture_defaults(config);
    let config = apply_browser_defaults(config);
    apply_logging_defaults(config)
}

fn apply_capture_defaults(mut config: FullshotConfig) -> FullshotConfig {
    let capture = config.capture.get_or_insert_with(CaptureConfig::default);
    capture.max_capture_width.get_or_insert(DEFAULT_MAX_CAPTURE_WIDTH);
    capture.texture_ceiling.get_or_insert(DEFAULT_TEXTURE_CEILING);
    capture.scroll_slack_px.get_or_insert(DEFAULT_SCROLL_SLACK_PX);
    config
}

/// `endpoint` stays unset so the CLI discovers it from host and port.
fn apply_browser_defaults(mut config: FullshotConfig) -> FullshotConfig {
    let browser = config.browser.get_or_insert_with(BrowserConfig::default);
    browser.host.get_or_insert_with(|| DEFAULT_BROWSER_HOST.to_string());
    browser.port.get_or_insert(DEFAULT_BROWSER_PORT);
    browser.command_timeout_ms.get_or_insert(DEFAULT_COMMAND_TIMEOUT_MS);
    config
}

fn apply_logging_defaults(mut config: FullshotConfig) -> FullshotConfig {
    let logging = config.logging.get_or_insert_with(LoggingConfig::default);
    logging.level.get_or_insert_with(|| DEFAULT_LOG_LEVEL.to_string());
    logging.json.get_or_insert(false);
    config
}
