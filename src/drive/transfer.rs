//! Boundary contract for the native bulk-transfer capability.
//!
//! The orchestrator never talks to Google Drive directly; it drives an
//! implementation of [`BulkTransfer`] and reacts to its typed failures. The
//! failure variants form a closed set so the orchestration state machine can
//! match exhaustively, but the only recovery signal inside a variant is its
//! free-text message: the provider is not a clean API, and text is all it
//! gives back.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

/// Typed failures raised by the native transfer capability.
#[derive(Debug, Error)]
pub enum TransferError {
    /// A file's download URL could not be retrieved (permissions, quota,
    /// interstitial page). The message may embed a recoverable `uc?...id=...`
    /// URL that the diagnostic extractor can mine.
    #[error("cannot retrieve file URL: {message}")]
    FileUrlRetrieval {
        /// Free-text diagnostic from the provider interaction.
        message: String,
    },

    /// The folder holds more entries than the provider lists in one page.
    /// Structural: retrying cannot help.
    #[error("folder contents exceed provider limit: {message}")]
    FolderContentsLimit {
        /// Free-text diagnostic naming the folder and the limit.
        message: String,
    },

    /// The provider returned unparsable or empty folder metadata, typically
    /// under throttling. Transient: worth a bounded retry.
    #[error("malformed folder listing: {message}")]
    MalformedResponse {
        /// Description of what failed to parse.
        message: String,
    },

    /// Anything else: transport failures, filesystem failures, unexpected
    /// provider behavior. Assumed non-transient.
    #[error("{message}")]
    Other {
        /// Description of the failure.
        message: String,
    },
}

impl TransferError {
    /// Creates a file-URL-retrieval failure.
    pub fn file_url_retrieval(message: impl Into<String>) -> Self {
        Self::FileUrlRetrieval {
            message: message.into(),
        }
    }

    /// Creates a folder-limit failure.
    pub fn folder_contents_limit(message: impl Into<String>) -> Self {
        Self::FolderContentsLimit {
            message: message.into(),
        }
    }

    /// Creates a malformed-response failure.
    pub fn malformed_response(message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            message: message.into(),
        }
    }

    /// Creates an unclassified failure.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}

/// Options for folder transfers.
#[derive(Debug, Clone, Copy)]
pub struct FolderOptions {
    /// Proceed with a truncated listing instead of raising
    /// [`TransferError::FolderContentsLimit`].
    pub allow_partial_listing: bool,
    /// Skip files that already exist on disk, so a retried folder call
    /// resumes where the previous one stopped.
    pub skip_existing: bool,
}

impl Default for FolderOptions {
    fn default() -> Self {
        Self {
            allow_partial_listing: true,
            skip_existing: true,
        }
    }
}

/// Native file/folder transfer capability.
///
/// # Object Safety
///
/// This trait uses `async_trait` to support dynamic dispatch via
/// `Arc<dyn BulkTransfer>`. Rust 2024 native async traits are not
/// object-safe, so `async_trait` is required here.
#[async_trait]
pub trait BulkTransfer: Send + Sync {
    /// Transfers a single file into `out_dir`, returning the written path.
    async fn transfer_file(&self, url: &str, out_dir: &Path) -> Result<PathBuf, TransferError>;

    /// Transfers a folder tree into `out_dir`, returning the written paths.
    async fn transfer_folder(
        &self,
        url: &str,
        out_dir: &Path,
        options: &FolderOptions,
    ) -> Result<Vec<PathBuf>, TransferError>;
}
