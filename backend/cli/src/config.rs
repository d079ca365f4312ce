use std::time::Duration;

use fullshot_capture::CaptureLimits;
use fullshot_config::defaults::{
    DEFAULT_BROWSER_HOST, DEFAULT_BROWSER_PORT, DEFAULT_COMMAND_TIMEOUT_MS, DEFAULT_LOG_LEVEL,
    DEFAULT_MAX_CAPTURE_WIDTH, DEFAULT_SCROLL_SLACK_PX, DEFAULT_TEXTURE_CEILING,
};
use fullshot_config::{expand_home, FullshotConfig};
use fullshot_logging::LogOptions;

/// Where the browser's DevTools socket lives.
#[derive(Debug, Clone, PartialEq)]
pub enum BrowserTarget {
    Endpoint(String),
    Discover { host: String, port: u16 },
}

/// Command-line values that win over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub endpoint: Option<String>,
    pub port: Option<u16>,
}

/// Fullshot runtime settings, resolved from the config file and command line.
#[derive(Debug, Clone)]
pub struct Settings {
    pub limits: CaptureLimits,
    pub browser: BrowserTarget,
    pub command_timeout: Duration,
    pub log: LogOptions,
}

impl Settings {
    pub fn resolve(config: &FullshotConfig, overrides: &Overrides) -> Self {
        let capture = config.capture.clone().unwrap_or_default();
        let browser = config.browser.clone().unwrap_or_default();
        let logging = config.logging.clone().unwrap_or_default();

        // An explicit port means "discover on this port", even if the file names an endpoint.
        let target = match (&overrides.endpoint, overrides.port, browser.endpoint) {
            (Some(endpoint), _, _) => BrowserTarget::Endpoint(endpoint.clone()),
            (None, None, Some(endpoint)) => BrowserTarget::Endpoint(endpoint),
            (None, port, _) => BrowserTarget::Discover {
                host: browser.host.unwrap_or_else(|| DEFAULT_BROWSER_HOST.to_string()),
                port: port.or(browser.port).unwrap_or(DEFAULT_BROWSER_PORT),
            },
        };

        Self {
            limits: CaptureLimits {
                max_capture_width: capture.max_capture_width.unwrap_or(DEFAULT_MAX_CAPTURE_WIDTH),
                texture_ceiling: capture.texture_ceiling.unwrap_or(DEFAULT_TEXTURE_CEILING),
                scroll_slack_px: capture.scroll_slack_px.unwrap_or(DEFAULT_SCROLL_SLACK_PX),
            },
            browser: target,
            command_timeout: Duration::from_millis(
                browser.command_timeout_ms.unwrap_or(DEFAULT_COMMAND_TIMEOUT_MS),
            ),
            log: LogOptions {
                level: logging.level.unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
                dir: logging.dir.as_deref().map(expand_home),
                json: logging.json.unwrap_or(false),
            },
        }
    }
}
