//! Shared-link fetcher for Dropbox URLs.
//!
//! Dropbox share links render an HTML preview page by default; setting the
//! `dl=1` query parameter forces the raw file bytes instead.

use std::path::{Path, PathBuf};

use reqwest::header::CONTENT_DISPOSITION;
use tracing::{info, instrument};
use url::Url;

use super::client::{HttpClient, stream_to_path};
use super::constants::SHARED_LINK_TIMEOUT_SECS;
use super::error::DownloadError;
use super::filename::{last_url_segment, parse_content_disposition, sanitize_filename};

/// Filename used when neither the response headers nor the URL name the file.
const DEFAULT_FILENAME: &str = "dropbox_download";

/// Downloads Dropbox shared links as direct files.
#[derive(Debug, Clone)]
pub struct DropboxFetcher {
    client: HttpClient,
}

impl Default for DropboxFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl DropboxFetcher {
    /// Creates a fetcher with the shared-link read timeout (300 s).
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: HttpClient::with_read_timeout(SHARED_LINK_TIMEOUT_SECS),
        }
    }

    /// Downloads a shared link into `out_dir` (flat, no nested mirroring).
    ///
    /// The filename is resolved from the Content-Disposition header, then
    /// from the last path segment of the original URL, then from a fixed
    /// default.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::InvalidUrl`] for unparseable URLs and the
    /// usual transport/status/IO variants.
    #[instrument(skip(self, out_dir), fields(url = %url))]
    pub async fn fetch(&self, url: &str, out_dir: &Path) -> Result<PathBuf, DownloadError> {
        let direct_url = force_direct_download(url)?;
        info!(url = %direct_url, "[dropbox] downloading");

        let response = self.client.get_checked(&direct_url).await?;

        let header_name = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_disposition);

        let filename = header_name
            .or_else(|| last_url_segment(url))
            .unwrap_or_else(|| DEFAULT_FILENAME.to_string());
        let filename = sanitize_filename(&filename);

        let local_path = out_dir.join(filename);
        info!(path = %local_path.display(), "[dropbox] saving");
        stream_to_path(response, &local_path).await?;

        Ok(local_path)
    }
}

/// Rewrites a share URL to its forced-direct-download variant.
///
/// Sets `dl=1`, replacing any existing `dl` value; every other query
/// parameter is preserved in its original order.
fn force_direct_download(url: &str) -> Result<String, DownloadError> {
    let mut parsed = Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;

    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(k, _)| k != "dl")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    {
        let mut pairs = parsed.query_pairs_mut();
        pairs.clear();
        for (k, v) in &kept {
            pairs.append_pair(k, v);
        }
        pairs.append_pair("dl", "1");
    }

    Ok(parsed.into())
}
