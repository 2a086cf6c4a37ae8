//! CLI entry point for the assetgrab tool.

use anyhow::Result;
use clap::Parser;

use assetgrab::{Dispatcher, FailureLedger};
use tracing::info;

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Determine log level based on verbose/quiet flags
    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(url = %args.url, out_dir = %args.out_dir.display(), "assetgrab starting");

    let ledger = FailureLedger::new(&args.ledger);
    let dispatcher = Dispatcher::with_native_client(&args.out_dir, ledger)
        .with_max_retries(u32::from(args.max_retries));

    let summary = dispatcher.process(&args.url).await?;

    info!(
        downloaded = summary.downloaded,
        failed = summary.failed,
        skipped = summary.skipped,
        ledger = %args.ledger.display(),
        "done"
    );

    Ok(())
}
