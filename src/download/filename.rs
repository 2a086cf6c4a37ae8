//! Filename derivation from response headers, content types, and URLs.

use url::Url;

/// Parses a Content-Disposition header to extract the filename.
///
/// Handles the three forms seen in the wild:
/// - `attachment; filename="example.pdf"`
/// - `attachment; filename=example.pdf`
/// - `attachment; filename*=UTF-8''example.pdf` (RFC 5987)
#[must_use]
pub fn parse_content_disposition(header: &str) -> Option<String> {
    // Try filename*= first (RFC 5987 encoded form takes precedence).
    if let Some(pos) = header.find("filename*=") {
        let value = header[pos + 10..].trim();
        // Format: charset'language'encoded_value
        if let Some(quote_pos) = value.find("''") {
            let encoded = &value[quote_pos + 2..];
            let end = encoded.find(';').unwrap_or(encoded.len());
            let encoded_name = encoded[..end].trim();
            if let Ok(decoded) = urlencoding::decode(encoded_name) {
                let decoded = decoded.into_owned();
                if !decoded.is_empty() {
                    return Some(decoded);
                }
            }
        }
    }

    if let Some(pos) = header.find("filename=") {
        let value = header[pos + 9..].trim();

        if let Some(stripped) = value.strip_prefix('"') {
            if let Some(end) = stripped.find('"') {
                let name = &stripped[..end];
                if !name.is_empty() {
                    return Some(name.to_string());
                }
            }
        } else {
            let end = value.find(';').unwrap_or(value.len());
            let name = value[..end].trim();
            if !name.is_empty() {
                return Some(name.to_string());
            }
        }
    }

    None
}

/// Maps a Content-Type header value to a filename extension.
///
/// Only the handful of types the providers actually serve for public assets
/// are mapped; anything else gets no extension rather than a wrong one.
#[must_use]
pub fn extension_for_content_type(content_type: &str) -> Option<&'static str> {
    let mime = content_type.split(';').next().unwrap_or("").trim();

    match mime {
        "image/jpeg" => Some(".jpg"),
        "image/png" => Some(".png"),
        "image/gif" => Some(".gif"),
        "application/pdf" => Some(".pdf"),
        "text/plain" => Some(".txt"),
        _ => None,
    }
}

/// Returns the last non-empty path segment of a URL, if any.
#[must_use]
pub fn last_url_segment(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let segment = parsed
        .path_segments()?
        .filter(|s| !s.is_empty())
        .next_back()?;
    (!segment.is_empty()).then(|| segment.to_string())
}

/// Sanitizes a filename for filesystem safety.
///
/// Replaces path separators, characters invalid on common filesystems, and
/// control characters with underscores.
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.trim_matches(['_', '.']).is_empty() {
        return "_".to_string();
    }

    sanitized
}
