use std::time::Duration;

use bytes::BytesMut;
use futures_util::StreamExt;
use reqwest::header::{CONTENT_TYPE, REFERER};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::assets::{AssetFetcher, FetchedAsset};
use crate::{FailureKind, FetchError};

const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub redirect_limit: usize,
    pub max_bytes: u64,
    /// Accepted MIME types; an entry ending in `/*` matches the whole family.
    pub allowed_content_types: Vec<String>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            redirect_limit: 5,
            max_bytes: 10 * 1024 * 1024,
            allowed_content_types: vec!["image/*".to_string()],
        }
    }
}

/// Downloads image bytes over HTTP(S).
#[derive(Debug, Clone)]
pub struct ReqwestAssetFetcher {
    settings: FetchSettings,
    client: reqwest::Client,
}

impl ReqwestAssetFetcher {
    pub fn new(settings: FetchSettings) -> Result<Self, FetchError> {
        let redirect_limit = settings.redirect_limit;
        let policy = reqwest::redirect::Policy::custom(move |attempt| {
            if attempt.previous().len() >= redirect_limit {
                attempt.error("redirect limit exceeded")
            } else {
                attempt.follow()
            }
        });

        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .redirect(policy)
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self { settings, client })
    }

    fn is_content_type_allowed(&self, content_type: &str) -> bool {
        let ct = mime_essence(content_type);
        self.settings.allowed_content_types.iter().any(|allowed| {
            match allowed.strip_suffix("/*") {
                Some(family) => ct
                    .split_once('/')
                    .is_some_and(|(top, _)| top.eq_ignore_ascii_case(family)),
                None => allowed.eq_ignore_ascii_case(ct),
            }
        })
    }
}

#[async_trait::async_trait]
impl AssetFetcher for ReqwestAssetFetcher {
    async fn fetch(&self, url: &Url, page_url: &Url) -> Result<FetchedAsset, FetchError> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FetchError::new(
                FailureKind::InvalidUrl,
                format!("unsupported scheme {}", url.scheme()),
            ));
        }

        let response = self
            .client
            .get(url.as_str())
            .header(REFERER, page_url.as_str())
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        if let Some(content_len) = response.content_length() {
            if content_len > self.settings.max_bytes {
                return Err(FetchError::new(
                    FailureKind::TooLarge {
                        max_bytes: self.settings.max_bytes,
                        actual: Some(content_len),
                    },
                    "response too large",
                ));
            }
        }

        let mime_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| mime_essence(value).to_ascii_lowercase())
            .unwrap_or_else(|| FALLBACK_MIME_TYPE.to_string());

        if !self.is_content_type_allowed(&mime_type) {
            return Err(FetchError::new(
                FailureKind::UnsupportedContentType {
                    content_type: mime_type,
                },
                "unsupported content type",
            ));
        }

        let mut buffer = BytesMut::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = buffer.len() as u64 + chunk.len() as u64;
            if next_len > self.settings.max_bytes {
                return Err(FetchError::new(
                    FailureKind::TooLarge {
                        max_bytes: self.settings.max_bytes,
                        actual: Some(next_len),
                    },
                    "response too large",
                ));
            }
            buffer.extend_from_slice(&chunk);
        }

        Ok(FetchedAsset {
            bytes: buffer.freeze(),
            mime_type,
        })
    }
}

fn mime_essence(content_type: &str) -> &str {
    content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_redirect() {
        return FetchError::new(FailureKind::RedirectLimitExceeded, err.to_string());
    }
    FetchError::new(FailureKind::Network, err.to_string())
}
