//! Orchestration of native Drive transfers with fallback recovery.
//!
//! The native capability is opaque and its only recovery signal is
//! unstructured diagnostic text. The orchestrator's job is defensive text
//! mining plus a hard ceiling on retries, so a single stuck item can never
//! spin indefinitely or silently stall a batch.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::ledger::{FailureLedger, LedgerError};

use super::diagnostic::{extract_destination_path, extract_recovery_url};
use super::fallback::{FallbackError, FallbackFetcher};
use super::transfer::{BulkTransfer, FolderOptions, TransferError};

/// Maximum native folder-transfer attempts per folder URL.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Base delay before retrying a transient folder failure.
const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

/// Maximum jitter added to retry delays.
const MAX_JITTER_MS: u64 = 500;

/// Errors escaping the orchestrator.
///
/// Recoverable provider failures are handled internally and land in the
/// failure ledger; only unclassified single-file failures (for the dispatch
/// loop to isolate) and ledger environment errors escape.
#[derive(Debug, Error)]
pub enum DriveError {
    /// An unclassified native failure on the single-file path.
    #[error(transparent)]
    Transfer(#[from] TransferError),
    /// The failure ledger itself could not be written.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Drives the native bulk-transfer capability, recovering blocked items via
/// the direct-transfer fallback and recording terminal failures.
pub struct DriveFetcher {
    transfer: Arc<dyn BulkTransfer>,
    fallback: FallbackFetcher,
    max_retries: u32,
}

impl DriveFetcher {
    /// Creates an orchestrator over the given native capability.
    #[must_use]
    pub fn new(transfer: Arc<dyn BulkTransfer>) -> Self {
        Self {
            transfer,
            fallback: FallbackFetcher::new(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Overrides the folder retry budget.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Downloads a single Drive file.
    ///
    /// One native attempt. A file-URL-retrieval failure triggers the
    /// diagnostic extractor and, when a recoverable URL is found, one
    /// direct-transfer fallback; every terminal outcome on that path is
    /// recorded in the ledger and the call returns `Ok`.
    ///
    /// # Errors
    ///
    /// Unclassified native failures propagate as
    /// [`DriveError::Transfer`] for the caller to isolate per link; ledger
    /// write failures propagate as [`DriveError::Ledger`].
    #[instrument(skip(self, out_dir, ledger), fields(url = %url))]
    pub async fn fetch_file(
        &self,
        url: &str,
        out_dir: &Path,
        ledger: &FailureLedger,
    ) -> Result<(), DriveError> {
        info!(url = %url, "[gdrive] downloading file");

        match self.transfer.transfer_file(url, out_dir).await {
            Ok(path) => {
                info!(path = %path.display(), "[gdrive] file complete");
                Ok(())
            }
            Err(TransferError::FileUrlRetrieval { message }) => {
                warn!(error = %message, "[gdrive] native transfer blocked, trying fallback");
                match extract_recovery_url(&message) {
                    Some(direct) => match self.fallback.fetch_guess_name(&direct, out_dir, ledger).await {
                        Ok(path) => {
                            info!(path = %path.display(), "[gdrive] fallback complete");
                            Ok(())
                        }
                        Err(FallbackError::Ledger(e)) => Err(e.into()),
                        Err(FallbackError::Download(e)) => {
                            ledger.record(Some(&direct), None, &e.to_string())?;
                            Ok(())
                        }
                    },
                    None => {
                        ledger.record(
                            Some(url),
                            None,
                            &format!("no recoverable URL in diagnostic: {message}"),
                        )?;
                        Ok(())
                    }
                }
            }
            Err(other) => Err(other.into()),
        }
    }

    /// Downloads a Drive folder with bounded retry.
    ///
    /// The native capability is configured to tolerate incomplete listings
    /// and skip files already on disk, so a retried call resumes rather
    /// than restarting. A blocked item consumes the whole budget: after one
    /// fallback attempt (success or failure) the folder operation
    /// terminates, since resuming the native loop would hit the same item
    /// again immediately.
    ///
    /// # Errors
    ///
    /// Only ledger write failures escape; every download-level outcome is
    /// either success or a ledger record, so sibling folder downloads are
    /// unaffected.
    #[instrument(skip(self, out_dir, ledger), fields(url = %url))]
    pub async fn fetch_folder(
        &self,
        url: &str,
        out_dir: &Path,
        ledger: &FailureLedger,
    ) -> Result<(), LedgerError> {
        let options = FolderOptions::default();
        let mut attempt: u32 = 1;

        loop {
            info!(url = %url, attempt, "[gdrive] downloading folder");

            match self.transfer.transfer_folder(url, out_dir, &options).await {
                Ok(paths) => {
                    info!(files = paths.len(), "[gdrive] folder complete");
                    return Ok(());
                }
                Err(TransferError::FolderContentsLimit { message }) => {
                    // Structural: the folder is bigger than the provider will
                    // list, so retrying cannot help.
                    ledger.record(Some(url), None, &message)?;
                    return Ok(());
                }
                Err(TransferError::FileUrlRetrieval { message }) => {
                    warn!(error = %message, "[gdrive] folder blocked on one item, trying fallback");
                    return self.recover_blocked_item(url, &message, out_dir, ledger).await;
                }
                Err(TransferError::MalformedResponse { message }) => {
                    if attempt >= self.max_retries {
                        ledger.record(
                            Some(url),
                            None,
                            &format!(
                                "folder listing still malformed after {attempt} attempts: {message}"
                            ),
                        )?;
                        return Ok(());
                    }
                    warn!(attempt, error = %message, "[gdrive] malformed folder listing, retrying");
                    tokio::time::sleep(retry_delay(attempt)).await;
                    attempt += 1;
                }
                Err(other) => {
                    // Unclassified failures are assumed non-transient.
                    ledger.record(Some(url), None, &other.to_string())?;
                    return Ok(());
                }
            }
        }
    }

    /// One fallback attempt for the item that blocked a folder transfer.
    ///
    /// The older diagnostic format names the exact destination path; when
    /// present the file goes there, otherwise the name is guessed under the
    /// fallback subdirectory.
    async fn recover_blocked_item(
        &self,
        folder_url: &str,
        message: &str,
        out_dir: &Path,
        ledger: &FailureLedger,
    ) -> Result<(), LedgerError> {
        let Some(direct) = extract_recovery_url(message) else {
            ledger.record(
                Some(folder_url),
                None,
                &format!("no recoverable URL in diagnostic: {message}"),
            )?;
            return Ok(());
        };

        let destination = extract_destination_path(message);
        let result = match destination.as_deref() {
            Some(dest) => {
                self.fallback
                    .fetch_to_path(&direct, Path::new(dest), ledger)
                    .await
            }
            None => self.fallback.fetch_guess_name(&direct, out_dir, ledger).await,
        };

        match result {
            Ok(path) => {
                info!(path = %path.display(), "[gdrive] fallback complete");
                Ok(())
            }
            Err(FallbackError::Ledger(e)) => Err(e),
            Err(FallbackError::Download(e)) => {
                ledger.record(
                    Some(&direct),
                    destination.as_deref().map(Path::new),
                    &e.to_string(),
                )?;
                Ok(())
            }
        }
    }
}

/// Exponential backoff with jitter: 1s, 2s, 4s (capped) plus up to 500 ms.
fn retry_delay(attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(3);
    let base = RETRY_BASE_DELAY * 2u32.pow(exp);
    let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..MAX_JITTER_MS));
    base + jitter
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::VecDeque;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::*;

    /// Scripted native capability: pops one pre-seeded result per call.
    #[derive(Default)]
    struct ScriptedTransfer {
        file_results: Mutex<VecDeque<Result<PathBuf, TransferError>>>,
        folder_results: Mutex<VecDeque<Result<Vec<PathBuf>, TransferError>>>,
        file_calls: AtomicU32,
        folder_calls: AtomicU32,
    }

    impl ScriptedTransfer {
        fn with_folder_results(
            results: impl IntoIterator<Item = Result<Vec<PathBuf>, TransferError>>,
        ) -> Self {
            Self {
                folder_results: Mutex::new(results.into_iter().collect()),
                ..Self::default()
            }
        }

        fn with_file_results(
            results: impl IntoIterator<Item = Result<PathBuf, TransferError>>,
        ) -> Self {
            Self {
                file_results: Mutex::new(results.into_iter().collect()),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl BulkTransfer for ScriptedTransfer {
        async fn transfer_file(
            &self,
            _url: &str,
            _out_dir: &Path,
        ) -> Result<PathBuf, TransferError> {
            self.file_calls.fetch_add(1, Ordering::SeqCst);
            self.file_results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TransferError::other("script exhausted")))
        }

        async fn transfer_folder(
            &self,
            _url: &str,
            _out_dir: &Path,
            _options: &FolderOptions,
        ) -> Result<Vec<PathBuf>, TransferError> {
            self.folder_calls.fetch_add(1, Ordering::SeqCst);
            self.folder_results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TransferError::other("script exhausted")))
        }
    }

    fn test_ledger(dir: &TempDir) -> FailureLedger {
        FailureLedger::new(dir.path().join("failed.tsv"))
    }

    fn ledger_lines(ledger: &FailureLedger) -> Vec<String> {
        std::fs::read_to_string(ledger.path())
            .map(|s| s.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    const FOLDER_URL: &str = "https://drive.google.com/drive/folders/1AbC";
    const FILE_URL: &str = "https://drive.google.com/uc?id=ABC123";

    #[tokio::test]
    async fn test_folder_success_first_attempt() {
        let dir = TempDir::new().unwrap();
        let ledger = test_ledger(&dir);
        let transfer = Arc::new(ScriptedTransfer::with_folder_results([Ok(vec![
            PathBuf::from("a.pdf"),
        ])]));
        let fetcher = DriveFetcher::new(transfer.clone());

        fetcher
            .fetch_folder(FOLDER_URL, dir.path(), &ledger)
            .await
            .unwrap();

        assert_eq!(transfer.folder_calls.load(Ordering::SeqCst), 1);
        assert!(ledger_lines(&ledger).is_empty());
    }

    #[tokio::test]
    async fn test_folder_structural_limit_no_retry_one_record() {
        let dir = TempDir::new().unwrap();
        let ledger = test_ledger(&dir);
        let transfer = Arc::new(ScriptedTransfer::with_folder_results([Err(
            TransferError::folder_contents_limit("folder has at least 50 files"),
        )]));
        let fetcher = DriveFetcher::new(transfer.clone());

        fetcher
            .fetch_folder(FOLDER_URL, dir.path(), &ledger)
            .await
            .unwrap();

        assert_eq!(transfer.folder_calls.load(Ordering::SeqCst), 1, "no retry");
        let lines = ledger_lines(&ledger);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("50 files"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_folder_transient_exhausts_budget_one_record() {
        let dir = TempDir::new().unwrap();
        let ledger = test_ledger(&dir);
        let transfer = Arc::new(ScriptedTransfer::with_folder_results([
            Err(TransferError::malformed_response("empty body")),
            Err(TransferError::malformed_response("empty body")),
            Err(TransferError::malformed_response("empty body")),
        ]));
        let fetcher = DriveFetcher::new(transfer.clone());

        fetcher
            .fetch_folder(FOLDER_URL, dir.path(), &ledger)
            .await
            .unwrap();

        assert_eq!(
            transfer.folder_calls.load(Ordering::SeqCst),
            DEFAULT_MAX_RETRIES,
            "no more than max_retries invocations"
        );
        let lines = ledger_lines(&ledger);
        assert_eq!(lines.len(), 1, "exactly one record after the final attempt");
        assert!(lines[0].contains("3 attempts"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_folder_transient_then_success_no_record() {
        let dir = TempDir::new().unwrap();
        let ledger = test_ledger(&dir);
        let transfer = Arc::new(ScriptedTransfer::with_folder_results([
            Err(TransferError::malformed_response("throttled")),
            Ok(vec![]),
        ]));
        let fetcher = DriveFetcher::new(transfer.clone());

        fetcher
            .fetch_folder(FOLDER_URL, dir.path(), &ledger)
            .await
            .unwrap();

        assert_eq!(transfer.folder_calls.load(Ordering::SeqCst), 2);
        assert!(ledger_lines(&ledger).is_empty());
    }

    #[tokio::test]
    async fn test_folder_unknown_failure_terminal_one_record() {
        let dir = TempDir::new().unwrap();
        let ledger = test_ledger(&dir);
        let transfer = Arc::new(ScriptedTransfer::with_folder_results([Err(
            TransferError::other("disk full while writing segment"),
        )]));
        let fetcher = DriveFetcher::new(transfer.clone());

        fetcher
            .fetch_folder(FOLDER_URL, dir.path(), &ledger)
            .await
            .unwrap();

        assert_eq!(transfer.folder_calls.load(Ordering::SeqCst), 1);
        let lines = ledger_lines(&ledger);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("disk full"));
    }

    #[tokio::test]
    async fn test_folder_blocked_item_without_recoverable_url_records_parse_failure() {
        let dir = TempDir::new().unwrap();
        let ledger = test_ledger(&dir);
        let transfer = Arc::new(ScriptedTransfer::with_folder_results([Err(
            TransferError::file_url_retrieval("permission denied, no link available"),
        )]));
        let fetcher = DriveFetcher::new(transfer.clone());

        fetcher
            .fetch_folder(FOLDER_URL, dir.path(), &ledger)
            .await
            .unwrap();

        // Budget consumed: the native loop is not resumed after the blocked item.
        assert_eq!(transfer.folder_calls.load(Ordering::SeqCst), 1);
        let lines = ledger_lines(&ledger);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("no recoverable URL"));
    }

    #[tokio::test]
    async fn test_file_success_leaves_ledger_untouched() {
        let dir = TempDir::new().unwrap();
        let ledger = test_ledger(&dir);
        let transfer = Arc::new(ScriptedTransfer::with_file_results([Ok(PathBuf::from(
            "a.pdf",
        ))]));
        let fetcher = DriveFetcher::new(transfer.clone());

        fetcher
            .fetch_file(FILE_URL, dir.path(), &ledger)
            .await
            .unwrap();

        assert_eq!(transfer.file_calls.load(Ordering::SeqCst), 1);
        assert!(ledger_lines(&ledger).is_empty());
    }

    #[tokio::test]
    async fn test_file_unknown_failure_propagates() {
        let dir = TempDir::new().unwrap();
        let ledger = test_ledger(&dir);
        let transfer = Arc::new(ScriptedTransfer::with_file_results([Err(
            TransferError::other("TLS handshake failed"),
        )]));
        let fetcher = DriveFetcher::new(transfer);

        let result = fetcher.fetch_file(FILE_URL, dir.path(), &ledger).await;

        assert!(matches!(
            result,
            Err(DriveError::Transfer(TransferError::Other { .. }))
        ));
        assert!(ledger_lines(&ledger).is_empty(), "propagated, not ledgered");
    }

    #[tokio::test]
    async fn test_file_blocked_without_recoverable_url_records_parse_failure() {
        let dir = TempDir::new().unwrap();
        let ledger = test_ledger(&dir);
        let transfer = Arc::new(ScriptedTransfer::with_file_results([Err(
            TransferError::file_url_retrieval("access denied, nothing embedded"),
        )]));
        let fetcher = DriveFetcher::new(transfer);

        fetcher
            .fetch_file(FILE_URL, dir.path(), &ledger)
            .await
            .unwrap();

        let lines = ledger_lines(&ledger);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("no recoverable URL"));
    }

    #[test]
    fn test_retry_delay_grows_with_attempt() {
        let first = retry_delay(1);
        let third = retry_delay(3);
        assert!(first >= RETRY_BASE_DELAY);
        assert!(third >= RETRY_BASE_DELAY * 4);
        assert!(third < RETRY_BASE_DELAY * 4 + Duration::from_millis(MAX_JITTER_MS));
    }
}
