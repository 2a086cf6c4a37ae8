//! Text mining of provider diagnostic messages.
//!
//! The native transfer capability reports blocked items only through
//! free-text error messages. This module isolates the fragile part: regex
//! extraction of a recoverable download URL and, for the older diagnostic
//! format, an explicit destination path. When the provider's message format
//! drifts, this is the one file that changes.

use std::sync::LazyLock;

use regex::Regex;

/// Matches a direct-download (`uc?...id=...`) URL embedded in diagnostic text.
#[allow(clippy::expect_used)]
static RECOVERY_URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https?://[^\s<>"']+/uc\?[^\s<>"']*id=[^\s<>"']+"#)
        .expect("recovery URL regex is valid") // Static pattern, safe to panic
});

/// Matches the `To: /some/path` destination hint of the older format.
#[allow(clippy::expect_used)]
static DESTINATION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^To:\s+(.+?)\s*$").expect("destination regex is valid")
});

/// Extracts a recoverable direct-download URL from failure text.
///
/// Best effort: returns the first `uc?...id=...` URL found, with trailing
/// punctuation stripped, or `None` when the message carries nothing usable.
#[must_use]
pub fn extract_recovery_url(message: &str) -> Option<String> {
    let found = RECOVERY_URL_PATTERN.find(message)?;
    let url = found.as_str().trim_end_matches(['.', ',', ';', ')']);
    Some(url.to_string())
}

/// Extracts the explicit destination path hint, if the message uses the
/// older `From: <url>` / `To: <path>` diagnostic format.
#[must_use]
pub fn extract_destination_path(message: &str) -> Option<String> {
    DESTINATION_PATTERN
        .captures(message)
        .map(|caps| caps[1].to_string())
}
