//! Structured Logger
//!
//! Wraps `tracing` with environment-based level control, a console layer and an
//! optional daily-rolling NDJSON file.

use std::path::PathBuf;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Debug, Clone)]
pub struct LogOptions {
    /// Default filter directive; `RUST_LOG` wins when set.
    pub level: String,
    /// Directory for `fullshot.log.YYYY-MM-DD`; `None` disables the file layer.
    pub dir: Option<PathBuf>,
    /// Emit console output as JSON lines instead of human-readable text.
    pub json: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self { level: "info".into(), dir: None, json: false }
    }
}

/// Initialize the global subscriber. Safe to call more than once; later calls are ignored.
pub fn init_logger(options: &LogOptions) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&options.level));

    let console_layer = if options.json {
        fmt::layer().json().with_writer(std::io::stderr).boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_ansi(true)
            .boxed()
    };

    let file_layer = options.dir.as_ref().map(|dir| {
        let appender = RollingFileAppender::new(Rotation::DAILY, dir, "fullshot.log");
        fmt::layer().json().with_writer(appender).with_ansi(false)
    });

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();
}
