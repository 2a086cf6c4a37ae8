//! Constants for the download module (timeouts, user agent).

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Read timeout for page scrapes and generic file fetches (2 minutes).
pub const GENERIC_TIMEOUT_SECS: u64 = 120;

/// Read timeout for shared-link fetches (5 minutes, payloads tend to be larger).
pub const SHARED_LINK_TIMEOUT_SECS: u64 = 300;

/// Browser-like User-Agent sent on every request.
///
/// Both providers serve different (interstitial or degraded) responses to
/// clients that identify as scripts, so the client presents as a browser.
pub const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/129.0 Safari/537.36";
