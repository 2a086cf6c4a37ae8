//! Dispatch loop: routes a starting URL to the right fetcher, scraping
//! pages for provider links when the URL is not itself a provider link.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info, instrument};
use url::Url;

use crate::classify::{ProviderKind, classify};
use crate::download::{DownloadError, DropboxFetcher, GenericFetcher};
use crate::drive::{BulkTransfer, DriveClient, DriveError, DriveFetcher};
use crate::ledger::{FailureLedger, LedgerError};
use crate::page::PageLinkFetcher;

/// Extensions treated as "looks like a direct file" during page scrapes.
const DIRECT_FILE_EXTENSIONS: [&str; 8] = [
    ".pdf", ".doc", ".docx", ".xls", ".xlsx", ".csv", ".zip", ".txt",
];

/// Per-batch counters for the final console report.
///
/// `downloaded` counts links whose handler ran to completion; Drive items
/// that ended in a ledger record count here too. The ledger, not this
/// summary, is the source of truth for permanent failures.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    /// Links fully handled by a fetcher.
    pub downloaded: usize,
    /// Links whose handler failed (reported on the console, not the ledger).
    pub failed: usize,
    /// Links skipped as neither provider links nor direct files.
    pub skipped: usize,
}

/// Errors aborting a whole batch.
///
/// Per-link download failures never abort a batch; only a failed root page
/// fetch or a broken ledger environment do.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The root operation (page fetch, output dir creation) failed.
    #[error(transparent)]
    Download(#[from] DownloadError),
    /// The failure ledger could not be written.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Routes URLs to provider-specific fetchers.
pub struct Dispatcher {
    out_dir: PathBuf,
    ledger: FailureLedger,
    page: PageLinkFetcher,
    generic: GenericFetcher,
    dropbox: DropboxFetcher,
    drive: DriveFetcher,
}

impl Dispatcher {
    /// Creates a dispatcher over an explicit native transfer capability.
    #[must_use]
    pub fn new(
        out_dir: impl Into<PathBuf>,
        ledger: FailureLedger,
        transfer: Arc<dyn BulkTransfer>,
    ) -> Self {
        Self {
            out_dir: out_dir.into(),
            ledger,
            page: PageLinkFetcher::new(),
            generic: GenericFetcher::new(),
            dropbox: DropboxFetcher::new(),
            drive: DriveFetcher::new(transfer),
        }
    }

    /// Creates a dispatcher backed by the anonymous [`DriveClient`].
    #[must_use]
    pub fn with_native_client(out_dir: impl Into<PathBuf>, ledger: FailureLedger) -> Self {
        Self::new(out_dir, ledger, Arc::new(DriveClient::new()))
    }

    /// Overrides the folder retry budget of the Drive orchestrator.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.drive = self.drive.with_max_retries(max_retries);
        self
    }

    /// Processes one starting URL.
    ///
    /// A Drive or Dropbox URL is fetched directly, no scraping. Anything
    /// else is treated as an HTML page: its links are scraped, deduplicated
    /// by exact URL string (first appearance wins), and dispatched one at a
    /// time, sequentially. One failing link never aborts the iteration.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Download`] if the root page fetch or output
    /// directory creation fails, [`DispatchError::Ledger`] if the failure
    /// ledger cannot be written.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn process(&self, url: &str) -> Result<BatchSummary, DispatchError> {
        tokio::fs::create_dir_all(&self.out_dir)
            .await
            .map_err(|e| DownloadError::io(self.out_dir.clone(), e))?;

        let mut summary = BatchSummary::default();

        let kind = classify(url);
        if kind != ProviderKind::Generic {
            self.handle_link(kind, url, &mut summary).await?;
            return Ok(summary);
        }

        let links = self.page.links(url).await?;
        let mut seen = HashSet::new();

        for link in links {
            if !seen.insert(link.clone()) {
                continue;
            }

            let kind = classify(&link);
            if kind == ProviderKind::Generic && !looks_like_direct_file(&link) {
                summary.skipped += 1;
                continue;
            }

            self.handle_link(kind, &link, &mut summary).await?;
        }

        info!(
            downloaded = summary.downloaded,
            failed = summary.failed,
            skipped = summary.skipped,
            "batch complete"
        );
        Ok(summary)
    }

    /// Dispatches one link, isolating its failures.
    async fn handle_link(
        &self,
        kind: ProviderKind,
        url: &str,
        summary: &mut BatchSummary,
    ) -> Result<(), DispatchError> {
        let outcome: Result<(), String> = match kind {
            ProviderKind::DriveFile => {
                match self.drive.fetch_file(url, &self.out_dir, &self.ledger).await {
                    Ok(()) => Ok(()),
                    Err(DriveError::Ledger(e)) => return Err(e.into()),
                    Err(DriveError::Transfer(e)) => Err(e.to_string()),
                }
            }
            ProviderKind::DriveFolder => {
                self.drive
                    .fetch_folder(url, &self.out_dir, &self.ledger)
                    .await?;
                Ok(())
            }
            ProviderKind::Dropbox => self
                .dropbox
                .fetch(url, &self.out_dir)
                .await
                .map(|_| ())
                .map_err(|e| e.to_string()),
            ProviderKind::Generic => self
                .generic
                .fetch(url, &self.out_dir)
                .await
                .map(|_| ())
                .map_err(|e| e.to_string()),
        };

        match outcome {
            Ok(()) => summary.downloaded += 1,
            Err(message) => {
                error!(tag = kind.tag(), url = %url, error = %message, "failed on link");
                summary.failed += 1;
            }
        }
        Ok(())
    }

    /// Returns the output root this dispatcher writes under.
    #[must_use]
    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }
}

/// Heuristic: URLs whose path ends in a common document extension are
/// worth fetching directly; everything else on a scraped page is skipped.
#[must_use]
pub fn looks_like_direct_file(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    let path = parsed.path().to_lowercase();
    DIRECT_FILE_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}
