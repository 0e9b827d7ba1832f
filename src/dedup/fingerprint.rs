use sha2::{Digest, Sha256};

/// Picks the body text that goes into the fingerprint: the full content when
/// present, otherwise the summary.
pub fn fingerprint_body<'a>(content: &'a str, summary: Option<&'a str>) -> &'a str {
    if content.trim().is_empty() {
        summary.unwrap_or("")
    } else {
        content
    }
}

/// Text the fingerprint is computed over, in its fixed field order.
pub fn fingerprint_input(title: &str, content: &str, summary: Option<&str>) -> String {
    format!("{}\n{}", title, fingerprint_body(content, summary))
}

/// Hex-encoded SHA-256 over title and body, used only for exact-duplicate
/// detection.
pub fn content_fingerprint(title: &str, content: &str, summary: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(fingerprint_input(title, content, summary).as_bytes());
    format!("{:x}", hasher.finalize())
}
