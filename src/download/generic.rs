//! Generic fetcher: streams an arbitrary URL to a path mirroring its
//! domain and path structure.

use std::path::{Path, PathBuf};

use tracing::{info, instrument};
use url::Url;

use super::client::{HttpClient, stream_to_path};
use super::constants::GENERIC_TIMEOUT_SECS;
use super::error::DownloadError;

/// Leaf name appended when a URL path is empty or ends in a separator.
const DEFAULT_LEAF: &str = "index";

/// Downloads arbitrary (non-provider) URLs, mirroring `host/path` under a
/// base directory.
#[derive(Debug, Clone)]
pub struct GenericFetcher {
    client: HttpClient,
}

impl Default for GenericFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl GenericFetcher {
    /// Creates a fetcher with the generic read timeout (120 s).
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: HttpClient::with_read_timeout(GENERIC_TIMEOUT_SECS),
        }
    }

    /// Streams `url` to `base_dir/<host>/<path>`, overwriting any existing
    /// file at the target path.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::InvalidUrl`] for unparseable or host-less
    /// URLs, [`DownloadError::HttpStatus`] on non-2xx responses, and the
    /// usual transport/IO variants.
    #[instrument(skip(self, base_dir), fields(url = %url))]
    pub async fn fetch(&self, url: &str, base_dir: &Path) -> Result<PathBuf, DownloadError> {
        let local_path = local_path_for(url, base_dir)?;
        info!(url = %url, path = %local_path.display(), "[generic] downloading");

        let response = self.client.get_checked(url).await?;
        stream_to_path(response, &local_path).await?;

        Ok(local_path)
    }
}

/// Derives the mirrored local path for a generic URL.
///
/// `https://example.com:8080/docs/a/b.pdf` → `base/example.com_8080/docs/a/b.pdf`.
/// The host's port separator becomes an underscore (a colon is not a valid
/// path character everywhere); an empty path or one ending in `/` gets the
/// `index` leaf so the result never names a directory.
fn local_path_for(url: &str, base_dir: &Path) -> Result<PathBuf, DownloadError> {
    let parsed = Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| DownloadError::invalid_url(url))?;

    let mut dir_name = host.to_string();
    if let Some(port) = parsed.port() {
        dir_name.push('_');
        dir_name.push_str(&port.to_string());
    }

    let mut local = base_dir.join(dir_name);
    let path = parsed.path();
    let mut had_segment = false;
    for segment in path.split('/') {
        // Skip empties and dot segments so the mirror can never escape base_dir.
        if segment.is_empty() || segment == "." || segment == ".." {
            continue;
        }
        local.push(segment);
        had_segment = true;
    }

    if !had_segment || path.ends_with('/') {
        local.push(DEFAULT_LEAF);
    }

    Ok(local)
}
