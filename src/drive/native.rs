//! Anonymous Google Drive client implementing [`BulkTransfer`].
//!
//! Drive has no clean anonymous API: single files are served through the
//! `uc?export=download` endpoint, which interposes a confirm form for
//! files it will not stream directly, and folder listings are shipped as a
//! hex-escaped JSON blob embedded in the folder page's HTML. This adapter
//! deals with both and converts every failure into the closed
//! [`TransferError`] set the orchestrator matches on.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use regex::Regex;
use reqwest::header::CONTENT_DISPOSITION;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::{debug, info};
use url::Url;

use crate::download::constants::SHARED_LINK_TIMEOUT_SECS;
use crate::download::filename::{parse_content_disposition, sanitize_filename};
use crate::download::{HttpClient, stream_to_path};

use super::transfer::{BulkTransfer, FolderOptions, TransferError};

/// Entries per folder page; listings this long are truncated by the provider.
const FOLDER_PAGE_LIMIT: usize = 50;

/// MIME type marking a listing entry as a subfolder.
const FOLDER_MIME: &str = "application/vnd.google-apps.folder";

#[allow(clippy::expect_used)]
static LISTING_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"window\['_DRIVE_ivd'\]\s*=\s*'((?:[^'\\]|\\.)*)'")
        .expect("listing regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static FILE_D_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/file/d/([\w-]+)").expect("file id regex is valid")
});

#[allow(clippy::expect_used)]
static FORM_ACTION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<form[^>]*id="download-form"[^>]*action="([^"]+)""#)
        .expect("form action regex is valid")
});

#[allow(clippy::expect_used)]
static HIDDEN_INPUT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<input[^>]*type="hidden"[^>]*name="([^"]+)"[^>]*value="([^"]*)""#)
        .expect("hidden input regex is valid")
});

#[allow(clippy::expect_used)]
static TITLE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<title>([^<]*)</title>").expect("title regex is valid"));

/// One entry of a decoded folder listing.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FolderEntry {
    id: String,
    name: String,
    mime: String,
}

impl FolderEntry {
    fn is_folder(&self) -> bool {
        self.mime == FOLDER_MIME
    }
}

/// Anonymous (cookie-less) Drive transfer client.
pub struct DriveClient {
    client: HttpClient,
}

impl Default for DriveClient {
    fn default() -> Self {
        Self::new()
    }
}

impl DriveClient {
    /// Creates a client with the long read timeout (300 s).
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: HttpClient::with_read_timeout(SHARED_LINK_TIMEOUT_SECS),
        }
    }

    /// Downloads one file by id into `dir`, returning the written path.
    ///
    /// Failures that smell like provider refusal (non-2xx on the `uc`
    /// endpoint, HTML served after the confirm hop) surface as
    /// `FileUrlRetrieval` with the `uc` URL embedded in the message so the
    /// diagnostic extractor downstream has something to work with.
    async fn download_file_by_id(
        &self,
        id: &str,
        dir: &Path,
        preferred_name: Option<&str>,
    ) -> Result<PathBuf, TransferError> {
        let uc_url = uc_download_url(id);
        debug!(url = %uc_url, "requesting file");

        let response = match self.client.get_checked(&uc_url).await {
            Ok(r) => r,
            Err(e) => {
                return Err(TransferError::file_url_retrieval(format!(
                    "cannot retrieve {uc_url}: {e}; the file may require authorization \
                     or has exceeded its download quota"
                )));
            }
        };

        let response = if is_html(&response) {
            // Interstitial page: re-submit the embedded confirm form once.
            let body = response
                .text()
                .await
                .map_err(|e| TransferError::other(format!("reading interstitial page: {e}")))?;
            let confirm_url = confirm_url_from_form(&body).ok_or_else(|| {
                let hint = if body.to_lowercase().contains("quota") {
                    "download quota exceeded for"
                } else {
                    "no confirm form on interstitial page for"
                };
                TransferError::file_url_retrieval(format!("{hint} {uc_url}"))
            })?;
            debug!(url = %confirm_url, "following confirm form");
            let confirmed = self.client.get_checked(&confirm_url).await.map_err(|e| {
                TransferError::file_url_retrieval(format!("confirm hop failed for {uc_url}: {e}"))
            })?;
            if is_html(&confirmed) {
                return Err(TransferError::file_url_retrieval(format!(
                    "still served HTML after confirm hop for {uc_url}"
                )));
            }
            confirmed
        } else {
            response
        };

        let header_name = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_disposition);
        let name = preferred_name
            .map(str::to_string)
            .or(header_name)
            .unwrap_or_else(|| id.to_string());
        let path = dir.join(sanitize_filename(&name));

        info!(path = %path.display(), "[gdrive] saving file");
        stream_to_path(response, &path)
            .await
            .map_err(|e| TransferError::other(e.to_string()))?;
        Ok(path)
    }

    /// Recursive folder mirror; boxed because async recursion needs an
    /// indirection for the future type.
    fn download_folder_into<'a>(
        &'a self,
        folder_id: &'a str,
        dir: PathBuf,
        options: &'a FolderOptions,
    ) -> BoxFuture<'a, Result<Vec<PathBuf>, TransferError>> {
        Box::pin(async move {
            let folder_url = format!("https://drive.google.com/drive/folders/{folder_id}");
            let response = self
                .client
                .get_checked(&folder_url)
                .await
                .map_err(|e| TransferError::other(e.to_string()))?;
            let body = response
                .text()
                .await
                .map_err(|e| TransferError::malformed_response(format!("reading folder page: {e}")))?;

            let entries = parse_folder_listing(&body)
                .map_err(TransferError::malformed_response)?;

            if entries.len() >= FOLDER_PAGE_LIMIT && !options.allow_partial_listing {
                return Err(TransferError::folder_contents_limit(format!(
                    "folder {folder_url} has at least {FOLDER_PAGE_LIMIT} entries; the \
                     provider does not list more than this in one page"
                )));
            }

            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|e| TransferError::other(format!("creating {}: {e}", dir.display())))?;

            let mut written = Vec::new();
            for entry in entries {
                let child_name = sanitize_filename(&entry.name);
                if entry.is_folder() {
                    let sub = self
                        .download_folder_into(&entry.id, dir.join(child_name), options)
                        .await?;
                    written.extend(sub);
                    continue;
                }

                let target = dir.join(&child_name);
                if options.skip_existing && target.exists() {
                    debug!(path = %target.display(), "skipping existing file");
                    written.push(target);
                    continue;
                }

                let path = self
                    .download_file_by_id(&entry.id, &dir, Some(&child_name))
                    .await
                    .map_err(|e| {
                        // Surface the blocked child with its recoverable URL.
                        TransferError::file_url_retrieval(format!(
                            "failed to download '{}' from {}: {e}",
                            entry.name,
                            uc_download_url(&entry.id)
                        ))
                    })?;
                written.push(path);
            }

            Ok(written)
        })
    }
}

#[async_trait]
impl BulkTransfer for DriveClient {
    async fn transfer_file(&self, url: &str, out_dir: &Path) -> Result<PathBuf, TransferError> {
        let id = file_id_from_url(url)
            .ok_or_else(|| TransferError::other(format!("unrecognized Drive file URL: {url}")))?;
        self.download_file_by_id(&id, out_dir, None).await
    }

    async fn transfer_folder(
        &self,
        url: &str,
        out_dir: &Path,
        options: &FolderOptions,
    ) -> Result<Vec<PathBuf>, TransferError> {
        let id = folder_id_from_url(url)
            .ok_or_else(|| TransferError::other(format!("unrecognized Drive folder URL: {url}")))?;

        // Mirror under the folder's display name when the page reveals it.
        let folder_url = format!("https://drive.google.com/drive/folders/{id}");
        let name = match self.client.get_checked(&folder_url).await {
            Ok(response) => response
                .text()
                .await
                .ok()
                .and_then(|body| folder_title(&body))
                .unwrap_or_else(|| id.clone()),
            Err(e) => return Err(TransferError::other(e.to_string())),
        };

        self.download_folder_into(&id, out_dir.join(sanitize_filename(&name)), options)
            .await
    }
}

/// Canonical direct-download URL for a file id.
fn uc_download_url(id: &str) -> String {
    format!("https://drive.google.com/uc?id={id}&export=download")
}

/// Extracts the file id from any of the common Drive file URL shapes.
fn file_id_from_url(url: &str) -> Option<String> {
    if let Some(caps) = FILE_D_PATTERN.captures(url) {
        return Some(caps[1].to_string());
    }
    let parsed = Url::parse(url).ok()?;
    parsed
        .query_pairs()
        .find(|(k, _)| k == "id")
        .map(|(_, v)| v.into_owned())
        .filter(|id| !id.is_empty())
}

/// Extracts the folder id: the path segment following `folders`.
fn folder_id_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let mut segments = parsed.path_segments()?;
    segments
        .by_ref()
        .find(|s| *s == "folders")
        .and_then(|_| segments.next())
        .map(str::to_string)
        .filter(|id| !id.is_empty())
}

/// True when the response announces an HTML body.
fn is_html(response: &reqwest::Response) -> bool {
    response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.to_lowercase().contains("text/html"))
}

/// Rebuilds the confirm-form URL from an interstitial page.
fn confirm_url_from_form(body: &str) -> Option<String> {
    let action = FORM_ACTION_PATTERN.captures(body)?[1].replace("&amp;", "&");
    let mut url = Url::parse(&action).ok()?;
    {
        let mut pairs = url.query_pairs_mut();
        for caps in HIDDEN_INPUT_PATTERN.captures_iter(body) {
            pairs.append_pair(&caps[1], &caps[2]);
        }
    }
    Some(url.into())
}

/// Folder display name from the page title, shorn of the provider suffix.
fn folder_title(body: &str) -> Option<String> {
    let title = TITLE_PATTERN.captures(body)?[1].trim().to_string();
    let name = title
        .strip_suffix(" - Google Drive")
        .unwrap_or(&title)
        .trim()
        .to_string();
    (!name.is_empty()).then_some(name)
}

/// Decodes the `_DRIVE_ivd` payload embedded in a folder page.
///
/// The payload is a JS single-quoted string of hex-escaped JSON. An absent
/// marker, an undecodable string, or non-JSON content all count as a
/// malformed response (the provider serves exactly that under throttling).
fn parse_folder_listing(body: &str) -> Result<Vec<FolderEntry>, String> {
    let raw = LISTING_PATTERN
        .captures(body)
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| "folder page carries no listing payload".to_string())?;

    let decoded = unescape_js_string(&raw)?;
    let value: Value = serde_json::from_str(&decoded)
        .map_err(|e| format!("listing payload is not valid JSON: {e}"))?;

    let Some(items) = value.get(0) else {
        return Err("listing payload has no entry array".to_string());
    };
    if items.is_null() {
        // An empty folder legitimately encodes its entry list as null.
        return Ok(Vec::new());
    }
    let items = items
        .as_array()
        .ok_or_else(|| "listing entry array has unexpected shape".to_string())?;

    let mut entries = Vec::with_capacity(items.len());
    for item in items {
        let entry = item.as_array().and_then(|fields| {
            Some(FolderEntry {
                id: fields.first()?.as_str()?.to_string(),
                name: fields.get(2)?.as_str()?.to_string(),
                mime: fields.get(3)?.as_str()?.to_string(),
            })
        });
        match entry {
            Some(entry) => entries.push(entry),
            None => return Err("listing entry has unexpected shape".to_string()),
        }
    }
    Ok(entries)
}

/// Undoes JS string escaping (`\xNN`, `\uNNNN`, and simple backslash pairs).
fn unescape_js_string(raw: &str) -> Result<String, String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('x') => {
                let hex: String = chars.by_ref().take(2).collect();
                let code = u8::from_str_radix(&hex, 16)
                    .map_err(|_| format!("bad \\x escape: {hex}"))?;
                out.push(code as char);
            }
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                let code = u32::from_str_radix(&hex, 16)
                    .map_err(|_| format!("bad \\u escape: {hex}"))?;
                out.push(char::from_u32(code).ok_or_else(|| format!("bad codepoint: {code}"))?);
            }
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => return Err("trailing backslash in listing payload".to_string()),
        }
    }
    Ok(out)
}
