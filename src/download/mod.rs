//! Streaming HTTP fetchers for generic files and Dropbox shared links.
//!
//! # Features
//!
//! - Streaming downloads (memory-efficient for large files)
//! - Filename extraction from Content-Disposition headers
//! - Per-strategy read timeouts (120 s generic, 300 s shared links)
//! - Structured error types with full context
//!
//! # Example
//!
//! ```no_run
//! use assetgrab::download::GenericFetcher;
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = GenericFetcher::new();
//! let path = fetcher
//!     .fetch("https://example.com/docs/report.pdf", Path::new("data"))
//!     .await?;
//! println!("Downloaded: {}", path.display());
//! # Ok(())
//! # }
//! ```

mod client;
pub mod constants;
mod dropbox;
mod error;
pub mod filename;
mod generic;

pub use client::{HttpClient, stream_to_path};
pub use dropbox::DropboxFetcher;
pub use error::DownloadError;
pub use generic::GenericFetcher;
