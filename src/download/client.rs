//! HTTP client wrapper for streaming downloads.
//!
//! One [`HttpClient`] is built per fetcher so each strategy carries its own
//! read timeout; the underlying reqwest client pools connections across all
//! requests made through it.

use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::{Client, ClientBuilder, Response};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::debug;

use super::constants::{CONNECT_TIMEOUT_SECS, GENERIC_TIMEOUT_SECS, USER_AGENT};
use super::error::DownloadError;

/// Thin wrapper over [`reqwest::Client`] with status checking and
/// stream-to-disk support.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Creates a client with the default (generic-fetch) read timeout.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    pub fn new() -> Self {
        Self::with_read_timeout(GENERIC_TIMEOUT_SECS)
    }

    /// Creates a client with an explicit read timeout in seconds.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails with the supplied
    /// configuration. This should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn with_read_timeout(read_timeout_secs: u64) -> Self {
        let client = ClientBuilder::new()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(read_timeout_secs))
            .gzip(true)
            .build()
            .expect("failed to build HTTP client with static configuration");
        Self { client }
    }

    /// Sends a GET request and checks the response status.
    ///
    /// Redirects are followed; the returned response carries the final URL.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Timeout`] or [`DownloadError::Network`] on
    /// transport failure, [`DownloadError::HttpStatus`] on any non-2xx
    /// response status.
    pub async fn get_checked(&self, url: &str) -> Result<Response, DownloadError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DownloadError::from_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::http_status(url, status.as_u16()));
        }

        Ok(response)
    }

    /// Returns a reference to the underlying reqwest client.
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

/// Streams a response body to `path`, creating parent directories first.
///
/// The file is created (truncating any existing content) and every chunk is
/// flushed before the byte count is returned, so a returned `Ok` means the
/// bytes are on disk.
///
/// # Errors
///
/// Returns [`DownloadError::Io`] on any filesystem failure and
/// [`DownloadError::Network`]/[`DownloadError::Timeout`] if the body stream
/// breaks mid-transfer.
pub async fn stream_to_path(response: Response, path: &Path) -> Result<u64, DownloadError> {
    let url = response.url().to_string();

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| DownloadError::io(parent, e))?;
    }

    let file = File::create(path)
        .await
        .map_err(|e| DownloadError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::from_reqwest(&url, e))?;
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(path, e))?;
        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(path, e))?;

    debug!(path = %path.display(), bytes = bytes_written, "wrote response body");
    Ok(bytes_written)
}
