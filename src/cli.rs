//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use assetgrab::DEFAULT_MAX_RETRIES;

/// Download page-linked assets from Google Drive, Dropbox, and direct file links.
///
/// Given a web page, downloads every Google Drive, Dropbox, and direct-file
/// link it references; given a provider link, downloads it directly.
/// Results land under the output directory, mirroring source structure
/// where feasible; permanent failures are appended to the failure ledger.
#[derive(Parser, Debug)]
#[command(name = "assetgrab")]
#[command(author, version, about)]
pub struct Args {
    /// Starting URL: a web page to scan, or a direct Drive/Dropbox link
    pub url: String,

    /// Output directory for downloaded assets
    #[arg(short = 'o', long, default_value = "data")]
    pub out_dir: PathBuf,

    /// Failure ledger file (tab-separated, append-only)
    #[arg(long, default_value = "failed_downloads.tsv")]
    pub ledger: PathBuf,

    /// Maximum folder-transfer attempts for transient failures (1-10)
    #[arg(short = 'r', long, default_value_t = DEFAULT_MAX_RETRIES as u8, value_parser = clap::value_parser!(u8).range(1..=10))]
    pub max_retries: u8,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}
