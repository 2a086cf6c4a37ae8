//! URL classification into provider categories.
//!
//! Classification is a pure function of the URL's host and path: it decides
//! which download strategy handles a link before any network traffic happens.

use url::Url;

/// Provider category assigned to a URL.
///
/// Every URL falls into exactly one category; anything not recognized as a
/// Google Drive or Dropbox link is [`ProviderKind::Generic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// A single Google Drive file (any of the `/file/d/`, `uc?id=`, `open?id=` forms).
    DriveFile,
    /// A Google Drive folder (`/folders/` or `/drive/folders/` path segment).
    DriveFolder,
    /// A Dropbox shared link.
    Dropbox,
    /// Any other URL, handled by the generic fetcher.
    Generic,
}

impl ProviderKind {
    /// Short tag used in log lines (`[gdrive]`, `[dropbox]`, `[generic]`).
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Self::DriveFile | Self::DriveFolder => "gdrive",
            Self::Dropbox => "dropbox",
            Self::Generic => "generic",
        }
    }
}

/// Classifies a URL by host and path shape.
///
/// Host matching is a substring check so regional and www-prefixed hosts
/// (`www.dropbox.com`, `drive.google.com`) all match. Drive URLs whose path
/// contains a `/folders/` segment (which also covers `/drive/folders/`)
/// classify as folders, everything else on the Drive host as a single file.
///
/// There are no error cases: unparseable input classifies as
/// [`ProviderKind::Generic`].
#[must_use]
pub fn classify(url: &str) -> ProviderKind {
    let Ok(parsed) = Url::parse(url) else {
        return ProviderKind::Generic;
    };
    let Some(host) = parsed.host_str() else {
        return ProviderKind::Generic;
    };

    if host.contains("drive.google.com") {
        if parsed.path().contains("/folders/") {
            return ProviderKind::DriveFolder;
        }
        return ProviderKind::DriveFile;
    }

    if host.contains("dropbox.com") {
        return ProviderKind::Dropbox;
    }

    ProviderKind::Generic
}
