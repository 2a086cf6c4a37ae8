//! Direct-transfer fallback for single Drive files.
//!
//! When the native capability cannot complete a transfer, the orchestrator
//! falls back to an unmediated streaming GET of the recovered `uc` URL.
//! The provider degrades to HTML interstitials instead of failing cleanly,
//! so the fallback sniffs the response content-type: HTML where file bytes
//! were expected is recorded in the failure ledger, but the body is written
//! to disk regardless. Wrong content is still evidence, and discarding it
//! would hide what the provider actually returned.

use std::path::{Path, PathBuf};

use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use thiserror::Error;
use tracing::{info, instrument, warn};
use url::Url;

use crate::download::constants::SHARED_LINK_TIMEOUT_SECS;
use crate::download::filename::{
    extension_for_content_type, parse_content_disposition, sanitize_filename,
};
use crate::download::{DownloadError, HttpClient, stream_to_path};
use crate::ledger::{FailureLedger, LedgerError};

/// Subdirectory of the output root receiving guessed-name fallback files.
pub const FALLBACK_SUBDIR: &str = "gdrive_fallback";

/// Filename used when neither headers nor the URL identify the file.
const DEFAULT_FILENAME: &str = "download";

/// Errors from a fallback transfer.
///
/// Ledger failures are kept apart from download failures: a download
/// failure is recoverable bookkeeping for the orchestrator, a ledger
/// failure is an environment error that must propagate.
#[derive(Debug, Error)]
pub enum FallbackError {
    /// The transfer itself failed.
    #[error(transparent)]
    Download(#[from] DownloadError),
    /// The anomaly record could not be appended.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Performs unmediated direct transfers of single Drive files.
#[derive(Debug, Clone)]
pub struct FallbackFetcher {
    client: HttpClient,
}

impl Default for FallbackFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl FallbackFetcher {
    /// Creates a fetcher with the long read timeout (300 s).
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: HttpClient::with_read_timeout(SHARED_LINK_TIMEOUT_SECS),
        }
    }

    /// Streams `url` to an explicit target path recovered from provider
    /// diagnostics.
    ///
    /// # Errors
    ///
    /// Returns [`FallbackError::Download`] on transport/status/IO failure
    /// and [`FallbackError::Ledger`] if an anomaly record cannot be written.
    #[instrument(skip(self, ledger), fields(url = %url, path = %exact_path.display()))]
    pub async fn fetch_to_path(
        &self,
        url: &str,
        exact_path: &Path,
        ledger: &FailureLedger,
    ) -> Result<PathBuf, FallbackError> {
        let direct = ensure_export_download(url)?;
        info!(url = %direct, path = %exact_path.display(), "[gdrive] direct fallback");

        let response = self.client.get_checked(&direct).await?;
        self.write_with_anomaly_check(url, response, exact_path.to_path_buf(), ledger)
            .await
    }

    /// Streams `url` under `out_dir/gdrive_fallback/`, guessing a filename.
    ///
    /// Name resolution: Content-Disposition header, else the provider's
    /// `id` query parameter plus a content-type-derived extension, else a
    /// fixed default.
    ///
    /// # Errors
    ///
    /// Returns [`FallbackError::Download`] on transport/status/IO failure
    /// and [`FallbackError::Ledger`] if an anomaly record cannot be written.
    #[instrument(skip(self, out_dir, ledger), fields(url = %url))]
    pub async fn fetch_guess_name(
        &self,
        url: &str,
        out_dir: &Path,
        ledger: &FailureLedger,
    ) -> Result<PathBuf, FallbackError> {
        let direct = ensure_export_download(url)?;
        info!(url = %direct, "[gdrive] direct fallback (guessing name)");

        let response = self.client.get_checked(&direct).await?;

        let header_name = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_disposition);
        let content_type = response_content_type(&response);

        let filename = match header_name {
            Some(name) => sanitize_filename(&name),
            None => guessed_filename(&direct, content_type.as_deref()),
        };

        let path = out_dir.join(FALLBACK_SUBDIR).join(filename);
        self.write_with_anomaly_check(url, response, path, ledger)
            .await
    }

    /// Shared tail: sniff the content-type, record the anomaly if the body
    /// is HTML, then write the bytes either way.
    async fn write_with_anomaly_check(
        &self,
        source_url: &str,
        response: reqwest::Response,
        path: PathBuf,
        ledger: &FailureLedger,
    ) -> Result<PathBuf, FallbackError> {
        if let Some(content_type) = response_content_type(&response)
            && content_type.contains("text/html")
        {
            warn!(
                content_type = %content_type,
                path = %path.display(),
                "provider returned an HTML page where file bytes were expected"
            );
            ledger.record(
                Some(source_url),
                Some(&path),
                &format!(
                    "expected file bytes but received {content_type} (written to {} for inspection)",
                    path.display()
                ),
            )?;
        }

        stream_to_path(response, &path).await?;
        Ok(path)
    }
}

/// Returns the response's Content-Type header as a lowercase string.
fn response_content_type(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_lowercase)
}

/// Appends `export=download` to the URL's query unless already present.
///
/// Existing query parameters are preserved untouched.
fn ensure_export_download(url: &str) -> Result<String, DownloadError> {
    let mut parsed = Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;

    let already_set = parsed
        .query_pairs()
        .any(|(k, v)| k == "export" && v == "download");
    if !already_set {
        parsed
            .query_pairs_mut()
            .append_pair("export", "download");
    }

    Ok(parsed.into())
}

/// Builds a filename from the `id` query parameter and content-type.
fn guessed_filename(direct_url: &str, content_type: Option<&str>) -> String {
    let id = Url::parse(direct_url).ok().and_then(|u| {
        u.query_pairs()
            .find(|(k, _)| k == "id")
            .map(|(_, v)| v.into_owned())
    });

    let stem = match id {
        Some(id) if !id.is_empty() => sanitize_filename(&id),
        _ => DEFAULT_FILENAME.to_string(),
    };

    let extension = content_type.and_then(extension_for_content_type).unwrap_or("");
    format!("{stem}{extension}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_export_download_appends_when_absent() {
        let out = ensure_export_download("https://drive.google.com/uc?id=ABC").unwrap();
        assert_eq!(out, "https://drive.google.com/uc?id=ABC&export=download");
    }

    #[test]
    fn test_ensure_export_download_idempotent() {
        let once = ensure_export_download("https://drive.google.com/uc?id=ABC").unwrap();
        let twice = ensure_export_download(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_ensure_export_download_preserves_existing_params() {
        let out =
            ensure_export_download("https://drive.google.com/uc?id=ABC&confirm=t").unwrap();
        let parsed = Url::parse(&out).unwrap();
        assert!(parsed.query_pairs().any(|(k, v)| k == "id" && v == "ABC"));
        assert!(parsed.query_pairs().any(|(k, v)| k == "confirm" && v == "t"));
        assert!(
            parsed
                .query_pairs()
                .any(|(k, v)| k == "export" && v == "download")
        );
    }

    #[test]
    fn test_guessed_filename_uses_id_and_content_type() {
        assert_eq!(
            guessed_filename("https://drive.google.com/uc?id=ABC123", Some("image/png")),
            "ABC123.png"
        );
    }

    #[test]
    fn test_guessed_filename_unknown_content_type_has_no_extension() {
        assert_eq!(
            guessed_filename(
                "https://drive.google.com/uc?id=ABC123",
                Some("application/octet-stream")
            ),
            "ABC123"
        );
    }

    #[test]
    fn test_guessed_filename_without_id_uses_default() {
        assert_eq!(
            guessed_filename("https://drive.google.com/uc?export=download", Some("application/pdf")),
            "download.pdf"
        );
    }
}
