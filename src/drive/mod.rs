//! Google Drive acquisition subsystem.
//!
//! The native transfer capability lives behind the [`BulkTransfer`] trait;
//! the [`DriveFetcher`] orchestrates it, mining recovery information out of
//! its diagnostic text and falling back to unmediated direct transfers when
//! the native path is blocked.
//!
//! # Architecture
//!
//! - [`BulkTransfer`] / [`TransferError`] - the collaborator boundary
//! - [`DriveClient`] - anonymous Drive implementation of the boundary
//! - [`DriveFetcher`] - retry/fallback state machine
//! - [`FallbackFetcher`] - unmediated direct transfer with anomaly sniffing
//! - `diagnostic` - regex extraction from opaque failure messages

mod diagnostic;
mod fallback;
mod native;
mod orchestrator;
mod transfer;

pub use diagnostic::{extract_destination_path, extract_recovery_url};
pub use fallback::{FALLBACK_SUBDIR, FallbackError, FallbackFetcher};
pub use native::DriveClient;
pub use orchestrator::{DEFAULT_MAX_RETRIES, DriveError, DriveFetcher};
pub use transfer::{BulkTransfer, FolderOptions, TransferError};
