//! Config file location and reading.

use anyhow::{Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Default config file name within the config directory.
const CONFIG_FILE_NAME: &str = "config.yaml";

/// Resolve the Fullshot config directory.
/// Priority: `FULLSHOT_CONFIG_DIR` env > `~/.fullshot/`
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("FULLSHOT_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    match dirs::home_dir() {
        Some(home) => home.join(".fullshot"),
        None => PathBuf::from(".fullshot"),
    }
}

/// Resolve the full path to the main config file.
pub fn config_file_path(config_dir: &Path) -> PathBuf {
    config_dir.join(CONFIG_FILE_NAME)
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest.trim_start_matches('/'),
        _ => return PathBuf::from(path),
    };
    match dirs::home_dir() {
        Some(home) if rest.is_empty() => home,
        Some(home) => home.join(rest),
        None => PathBuf::from(path),
    }
}

/// Read the config file as an untyped tree, before env substitution.
///
/// Returns an empty object if the file doesn't exist (first run).
pub async fn load_config(path: &Path) -> Result<Value> {
    if !fs::try_exists(path).await.unwrap_or(false) {
        debug!(path = %path.display(), "Config file does not exist; using defaults");
        return Ok(Value::Object(Default::default()));
    }

    let raw = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let value: Value = if raw.trim().is_empty() {
        Value::Null
    } else {
        serde_yaml::from_str(&raw)
            .with_context(|| format!("Failed to parse config YAML at: {}", path.display()))?
    };

    info!(path = %path.display(), "Loaded config");
    // Empty and comment-only files are null.
    Ok(match value {
        Value::Null => Value::Object(Default::default()),
        other => other,
    })
}
