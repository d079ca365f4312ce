//! `fullshot targets`: list open pages and whether each can be captured.

use anyhow::Result;

use fullshot_browser::CdpHost;
use fullshot_core::{is_capturable, TargetInfo};
use fullshot_logging::redact_address;

use crate::terminal_output::{note_info, render_table, Column};

const URL_WIDTH: usize = 60;
const TITLE_WIDTH: usize = 40;

pub async fn run(host: &CdpHost) -> Result<()> {
    let targets = host.list_targets().await?;
    if targets.is_empty() {
        note_info("No page targets are open.");
        return Ok(());
    }
    print!("{}", render_targets(&targets));
    Ok(())
}

fn render_targets(targets: &[TargetInfo]) -> String {
    let columns = [
        Column::left("Target"),
        Column::left("Capturable"),
        Column::truncated("Title", TITLE_WIDTH),
        Column::truncated("Url", URL_WIDTH),
    ];
    let rows: Vec<Vec<String>> = targets
        .iter()
        .map(|t| {
            let capturable = if is_capturable(t.url.as_deref()) { "yes" } else { "no" };
            vec![
                t.id.to_string(),
                capturable.to_string(),
                t.title.clone(),
                redact_address(t.url.as_deref().unwrap_or_default()),
            ]
        })
        .collect();
    render_table(&columns, &rows)
}
