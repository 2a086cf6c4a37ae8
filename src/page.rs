//! Page scraping: fetches an HTML page and yields its outbound links.

use scraper::{Html, Selector};
use tracing::{debug, info, instrument};
use url::Url;

use crate::download::constants::GENERIC_TIMEOUT_SECS;
use crate::download::{DownloadError, HttpClient};

/// Fetches a page and extracts its anchor links as absolute URLs.
#[derive(Debug, Clone)]
pub struct PageLinkFetcher {
    client: HttpClient,
}

impl Default for PageLinkFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl PageLinkFetcher {
    /// Creates a fetcher with the page read timeout (120 s).
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: HttpClient::with_read_timeout(GENERIC_TIMEOUT_SECS),
        }
    }

    /// Fetches `url` and returns every `<a href>` as an absolute URL, in
    /// document order.
    ///
    /// Relative hrefs are resolved against the FINAL response URL, so pages
    /// reached through redirects resolve correctly. Only http/https results
    /// are kept.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::HttpStatus`] on non-2xx responses and the
    /// usual transport variants.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn links(&self, url: &str) -> Result<Vec<String>, DownloadError> {
        info!(url = %url, "[page] fetching");

        let response = self.client.get_checked(url).await?;
        let base = response.url().clone();
        let body = response
            .text()
            .await
            .map_err(|e| DownloadError::from_reqwest(url, e))?;

        let links = extract_links(&body, &base);
        debug!(count = links.len(), "extracted links");
        Ok(links)
    }
}

/// Pulls absolute http/https links out of an HTML document.
#[allow(clippy::expect_used)]
fn extract_links(html: &str, base: &Url) -> Vec<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("a[href]").expect("anchor selector is valid");

    document
        .select(&selector)
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| base.join(href).ok())
        .filter(|resolved| matches!(resolved.scheme(), "http" | "https"))
        .map(String::from)
        .collect()
}
