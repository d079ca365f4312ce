//! `fullshot visible` / `fullshot full`.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use tracing::{info, warn};

use fullshot_browser::CdpHost;
use fullshot_capture::{CaptureLimits, CaptureOutcome, CaptureService, PageClipboard, PageOverlay};
use fullshot_core::{CaptureArtifact, CaptureHost, CaptureRequest, ClipboardOutcome, TargetId};

use crate::indicator::ConsoleIndicator;
use crate::terminal_output::{note_info, note_success};

/// How long `--url` waits for the new tab to finish loading.
const PAGE_LOAD_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Default)]
pub struct CaptureOptions {
    pub full_page: bool,
    pub target: Option<String>,
    pub url: Option<String>,
    pub output: Option<PathBuf>,
    pub clipboard: bool,
}

pub async fn run(host: Arc<CdpHost>, limits: CaptureLimits, options: CaptureOptions) -> Result<ExitCode> {
    let (target, opened) = match (&options.url, &options.target) {
        (Some(url), _) => {
            let target = host.open_page(url, PAGE_LOAD_TIMEOUT).await?;
            (target.clone(), Some(target))
        }
        (None, Some(id)) => (TargetId::new(id.as_str()), None),
        (None, None) => (host.active_target().await?.id, None),
    };

    let mut service = CaptureService::new(host.clone(), limits, Arc::new(ConsoleIndicator));
    if options.clipboard {
        service = service.with_delivery(
            Arc::new(PageClipboard::new(host.clone())),
            Arc::new(PageOverlay::new(host.clone())),
        );
    }

    let request = if options.full_page {
        CaptureRequest::full_page(target.clone())
    } else {
        CaptureRequest::visible(target.clone())
    };
    let result = service.capture(request).await;

    if let Some(opened) = opened {
        if let Err(e) = host.close_page(&opened).await {
            warn!(target = %opened, error = %e, "Failed to close page opened for capture");
        }
    }

    // Failures were already reported by the indicator.
    let outcome = match result {
        Ok(outcome) => outcome,
        Err(_) => return Ok(ExitCode::FAILURE),
    };

    let clipboard_ok = match &outcome {
        CaptureOutcome::Delivered { clipboard: ClipboardOutcome::Written, .. } => {
            note_success("Copied to clipboard");
            true
        }
        CaptureOutcome::Delivered { .. } => false,
        CaptureOutcome::Captured { .. } => true,
        CaptureOutcome::Superseded => {
            note_info("A newer capture of this tab took over");
            return Ok(ExitCode::SUCCESS);
        }
    };

    if let Some(artifact) = outcome.artifact() {
        // With --clipboard the file is only written when asked for.
        if options.output.is_some() || !options.clipboard {
            let path = options.output.clone().unwrap_or_else(|| default_output(Local::now()));
            save(&path, artifact).await?;
        }
    }

    Ok(if clipboard_ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn default_output(now: DateTime<Local>) -> PathBuf {
    PathBuf::from(format!("fullshot-{}.png", now.format("%Y%m%d-%H%M%S")))
}

async fn save(path: &Path, artifact: &CaptureArtifact) -> Result<()> {
    tokio::fs::write(path, &artifact.pixel_data)
        .await
        .with_context(|| format!("Failed to write capture to {}", path.display()))?;
    info!(path = %path.display(), bytes = artifact.pixel_data.len(), "Saved capture");
    note_success(&format!("Saved {}", path.display()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn default_output_is_timestamped_png() {
        let now = Local.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        assert_eq!(default_output(now), PathBuf::from("fullshot-20260304-050607.png"));
    }

    #[tokio::test]
    async fn save_writes_artifact_bytes() {
        let path = std::env::temp_dir().join(format!("fullshot-save-{}.png", std::process::id()));
        let artifact = CaptureArtifact { pixel_data: vec![0x89, b'P', b'N', b'G'], warning: None };
        save(&path, &artifact).await.unwrap();
        assert_eq!(tokio::fs::read(&path).await.unwrap(), artifact.pixel_data);
        tokio::fs::remove_file(&path).await.unwrap();
    }
}
