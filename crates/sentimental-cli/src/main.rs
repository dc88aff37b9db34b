use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use sentimental_core::config::BackendKind;

mod bootstrap;
mod command;
mod logging;
mod render;
mod repl;

#[derive(Parser, Debug)]
#[command(name = "sentimental")]
#[command(about = "Sentimental - talk it through, keep it as a story", long_about = None)]
pub struct Cli {
    /// Path to config.toml (defaults to the platform config dir)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Storage backend: memory or rest
    #[arg(long)]
    backend: Option<BackendKind>,

    /// Backend base url when --backend rest
    #[arg(long)]
    backend_url: Option<String>,

    /// tracing filter directive, e.g. "debug" or "sentimental_application=trace"
    #[arg(long)]
    log_level: Option<String>,

    /// Root directory for config, data and logs (mainly for testing)
    #[arg(long)]
    home: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let app = bootstrap::bootstrap(&cli)?;
    let result = repl::run(&app.controller).await;

    tracing::info!("Sentimental exiting");
    drop(app);
    result
}
