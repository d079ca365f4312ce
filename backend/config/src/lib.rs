//! `fullshot-config`: runtime configuration for Fullshot.
//!
//! Provides:
//! - Typed config schema (capture limits, browser endpoint, logging)
//! - YAML loading with `${ENV_VAR}` substitution
//! - Default value application
//! - Validation with errors and warnings

pub mod defaults;
pub mod env;
pub mod io;
pub mod schema;
pub mod validation;

pub use defaults::apply_all_defaults;
pub use env::{resolve_env_vars, resolve_env_vars_with, MissingEnvVarError};
pub use io::{config_dir, config_file_path, expand_home, load_config};
pub use schema::{BrowserConfig, CaptureConfig, FullshotConfig, LoggingConfig};
pub use validation::{validate, ConfigValidationError, ValidationReport};

use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

/// Load a config file, substitute env vars, apply defaults and validate.
///
/// This is the main entry point for loading a config at runtime. Validation
/// errors abort; warnings are logged.
pub async fn load_and_prepare(path: &Path) -> Result<FullshotConfig> {
    let raw = load_config(path).await?;
    let value = resolve_env_vars(&raw).context("Failed to resolve env vars in config")?;
    prepare(value)
}

/// [`load_and_prepare`] for an in-memory YAML document and an explicit environment.
pub fn parse_and_prepare(yaml: &str, env: &HashMap<String, String>) -> Result<FullshotConfig> {
    let raw: Value = if yaml.trim().is_empty() {
        Value::Null
    } else {
        serde_yaml::from_str(yaml).context("Failed to parse config YAML")?
    };
    let raw = if raw.is_null() { Value::Object(Default::default()) } else { raw };
    let value = resolve_env_vars_with(&raw, env).context("Failed to resolve env vars in config")?;
    prepare(value)
}

fn prepare(value: Value) -> Result<FullshotConfig> {
    let config: FullshotConfig =
        serde_json::from_value(value).context("Failed to deserialize config")?;
    let config = apply_all_defaults(config);

    let report = validate(&config);
    for warning in &report.warnings {
        tracing::warn!(path = %warning.path, message = %warning.message, "Config warning");
    }
    if let Some(first) = report.errors.first() {
        for error in &report.errors {
            tracing::error!(path = %error.path, message = %error.message, "Config error");
        }
        bail!("{first} ({} error(s) in total)", report.errors.len());
    }

    Ok(config)
}
