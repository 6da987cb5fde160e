// ABOUTME: Entry point for toolgate — serves the approval gate over stdio JSON-RPC.
// ABOUTME: Parses CLI args, installs logging, loads config, and launches the app.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use toolgate::app::App;
use toolgate::config::Config;

#[derive(Debug, Parser)]
#[command(name = "toolgate", version, about = "Proposal and approval gate for downstream tools")]
struct Cli {
    /// Config file (defaults to ~/.toolgate/config.toml).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Report writes instead of proposing them.
    #[arg(long)]
    dry_run: bool,

    /// Persist pending proposals to this file.
    #[arg(long)]
    state_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries responses; logs go to stderr.
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    App::new(config)
        .with_overrides(cli.dry_run, cli.state_file)
        .run()
        .await
}
