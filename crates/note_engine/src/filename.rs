use sha2::{Digest, Sha256};
use url::Url;

const MAX_NAME_LEN: usize = 80;

/// Content-addressed asset id: hex SHA-256 of the bytes.
pub fn content_asset_id(bytes: &[u8]) -> String {
    hex_digest(bytes, usize::MAX)
}

/// File name recorded with a stored asset: the URL's last path segment,
/// sanitized, or `image` when the URL has none.
pub fn asset_file_name(url: &Url) -> String {
    let segment = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();
    sanitize(segment).unwrap_or_else(|| "image".to_string())
}

/// Name for an inline `data:` payload, derived from its digest and MIME type.
pub fn data_asset_file_name(bytes: &[u8], mime_type: &str) -> String {
    let extension = mime_type
        .split_once('/')
        .map(|(_, sub)| sub.split('+').next().unwrap_or(sub))
        .filter(|ext| !ext.is_empty())
        .unwrap_or("bin");
    format!("inline-{}.{extension}", hex_digest(bytes, 8))
}

fn sanitize(input: &str) -> Option<String> {
    let cleaned: String = input
        .chars()
        .map(|c| if is_forbidden(c) { '_' } else { c })
        .collect();
    let mut name = cleaned.trim_matches(&['_', ' ', '.'][..]).to_string();
    if name.is_empty() {
        return None;
    }
    if name.len() > MAX_NAME_LEN {
        let mut end = MAX_NAME_LEN;
        while !name.is_char_boundary(end) {
            end -= 1;
        }
        name.truncate(end);
    }
    Some(name)
}

fn is_forbidden(c: char) -> bool {
    matches!(c,
        '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0'..='\u{1F}'
    )
}

fn hex_digest(input: &[u8], max_bytes: usize) -> String {
    use std::fmt::Write;

    let digest = Sha256::digest(input);
    let mut hex = String::with_capacity(64);
    for byte in digest.iter().take(max_bytes) {
        let _ = write!(&mut hex, "{byte:02x}");
    }
    hex
}
