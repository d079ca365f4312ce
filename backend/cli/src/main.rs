mod capture_cmd;
mod config;
mod indicator;
mod targets_cmd;
mod terminal_output;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use fullshot_browser::CdpHost;
use fullshot_config::{config_dir, config_file_path, load_and_prepare};
use fullshot_logging::init_logger;

use capture_cmd::CaptureOptions;
use config::{BrowserTarget, Overrides, Settings};
use terminal_output::note_error;

#[derive(Parser)]
#[command(name = "fullshot")]
#[command(about = "Capture the visible area or the full length of a browser tab")]
#[command(version)]
struct Cli {
    /// Config file (default: $FULLSHOT_CONFIG_DIR/config.yaml or ~/.fullshot/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Browser DevTools websocket (ws://host:port/devtools/browser/<id>)
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Remote-debugging port to discover the endpoint on
    #[arg(long, global = true)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture the visible area of a tab
    Visible(CaptureArgs),
    /// Capture the full length of a tab
    Full(CaptureArgs),
    /// List open page targets
    Targets,
}

#[derive(Args)]
struct CaptureArgs {
    /// Target id (default: the most recently focused page)
    #[arg(long, conflicts_with = "url")]
    target: Option<String>,

    /// Open this address in a new tab, capture it, then close the tab
    #[arg(long)]
    url: Option<String>,

    /// PNG file to write (default: fullshot-<timestamp>.png)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Copy the capture to the page's clipboard and show the preview overlay
    #[arg(long)]
    clipboard: bool,
}

impl CaptureArgs {
    fn into_options(self, full_page: bool) -> CaptureOptions {
        CaptureOptions {
            full_page,
            target: self.target,
            url: self.url,
            output: self.output,
            clipboard: self.clipboard,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            note_error(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let path = cli
        .config
        .clone()
        .unwrap_or_else(|| config_file_path(&config_dir()));
    let config = load_and_prepare(&path).await?;
    let overrides = Overrides { endpoint: cli.endpoint.clone(), port: cli.port };
    let settings = Settings::resolve(&config, &overrides);

    init_logger(&settings.log);
    info!(config = %path.display(), "Starting fullshot");

    let host = Arc::new(connect(&settings).await?);

    match cli.command {
        Commands::Visible(args) => capture_cmd::run(host, settings.limits, args.into_options(false)).await,
        Commands::Full(args) => capture_cmd::run(host, settings.limits, args.into_options(true)).await,
        Commands::Targets => {
            targets_cmd::run(&host).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn connect(settings: &Settings) -> Result<CdpHost> {
    match &settings.browser {
        BrowserTarget::Endpoint(endpoint) => CdpHost::connect(endpoint, settings.command_timeout)
            .await
            .with_context(|| format!("Failed to connect to {endpoint}")),
        BrowserTarget::Discover { host, port } => CdpHost::discover(host, *port, settings.command_timeout)
            .await
            .with_context(|| {
                format!("No browser found at {host}:{port}; start it with --remote-debugging-port={port}")
            }),
    }
}
