use url::Url;

/// Resolves an `href`/`src` value against the page URL.
///
/// Absolute URLs with a host win, anything else is joined onto `base`
/// (which also gives scheme-relative `//host/path` references the page's
/// scheme). Only URLs with a host, or `file:` URLs, are accepted.
pub fn resolve_url(reference: &str, base: &Url) -> Option<Url> {
    let trimmed = reference.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(url) = Url::parse(trimmed) {
        if is_addressable(&url) {
            return Some(url);
        }
    }
    base.join(trimmed).ok().filter(is_addressable)
}

fn is_addressable(url: &Url) -> bool {
    url.host().is_some() || url.scheme() == "file"
}

/// A decoded `data:` URI payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Parses `data:<mime>;base64,<payload>`; non-base64 payloads are rejected.
pub fn parse_data_uri(src: &str) -> Option<DataUri> {
    use base64::{engine::general_purpose, Engine};

    let rest = src.trim().strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    let mime_type = header.strip_suffix(";base64")?;
    let bytes = general_purpose::STANDARD
        .decode(payload.trim())
        .ok()
        .filter(|bytes| !bytes.is_empty())?;
    let mime_type = if mime_type.is_empty() {
        "application/octet-stream".to_string()
    } else {
        mime_type.to_ascii_lowercase()
    };
    Some(DataUri { mime_type, bytes })
}

#[cfg(test)]
mod tests {
    use super::{parse_data_uri, resolve_url};
    use url::Url;

    fn base() -> Url {
        Url::parse("https://news.example.com/section/page.html").unwrap()
    }

    #[test]
    fn absolute_urls_are_kept() {
        let url = resolve_url("https://cdn.example.org/a.png", &base()).unwrap();
        assert_eq!(url.as_str(), "https://cdn.example.org/a.png");
    }

    #[test]
    fn relative_urls_join_the_base() {
        let url = resolve_url("../img/a.png", &base()).unwrap();
        assert_eq!(url.as_str(), "https://news.example.com/img/a.png");
    }

    #[test]
    fn scheme_relative_urls_borrow_the_page_scheme() {
        let url = resolve_url("//i.imgur.com/someImage.png", &base()).unwrap();
        assert_eq!(url.as_str(), "https://i.imgur.com/someImage.png");
    }

    #[test]
    fn file_urls_are_accepted_without_host() {
        let file_base = Url::parse("file:///tmp/page.html").unwrap();
        let url = resolve_url("file:///tmp/logo.png", &file_base).unwrap();
        assert_eq!(url.scheme(), "file");
    }

    #[test]
    fn hostless_urls_are_rejected() {
        assert_eq!(resolve_url("mailto:someone@example.com", &base()), None);
        assert_eq!(resolve_url("   ", &base()), None);
    }

    #[test]
    fn base64_data_uris_decode() {
        let uri = parse_data_uri("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(uri.mime_type, "image/png");
        assert_eq!(uri.bytes, b"hello");
    }

    #[test]
    fn non_base64_data_uris_are_rejected() {
        assert_eq!(parse_data_uri("data:text/plain,hello"), None);
        assert_eq!(parse_data_uri("https://example.com/a.png"), None);
    }
}
