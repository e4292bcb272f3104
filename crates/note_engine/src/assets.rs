use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use engine_logging::{engine_debug, engine_warn};
use futures_util::future::join_all;
use url::Url;

use crate::filename::content_asset_id;
use crate::node::{AssetOrigin, DisplayInfo, NodeArena, NodeId, NodeKind};
use crate::text::TextAttribute;
use crate::types::FetchError;

pub const SVG_MIME_TYPE: &str = "image/svg+xml";

/// Bytes returned by an [`AssetFetcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedAsset {
    pub bytes: Bytes,
    pub mime_type: String,
}

#[async_trait::async_trait]
pub trait AssetFetcher: Send + Sync {
    /// Downloads `url`, referenced from `page_url`.
    async fn fetch(&self, url: &Url, page_url: &Url) -> Result<FetchedAsset, FetchError>;
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AssetStoreError {
    #[error("asset store rejected {name}: {message}")]
    Rejected { name: String, message: String },
}

pub trait AssetStore: Send + Sync {
    /// Persists the bytes and returns the id the node should reference.
    fn store(&self, name: &str, bytes: &[u8], mime_type: &str) -> Result<String, AssetStoreError>;
}

pub trait ImageSizer: Send + Sync {
    /// Pixel dimensions of an encoded raster image.
    fn pixel_size(&self, bytes: &[u8], mime_type: &str) -> Option<(u32, u32)>;
}

pub trait EmbedEligibility: Send + Sync {
    fn can_embed(&self, url: &str) -> bool;
}

/// The optional capabilities a conversion may use. Missing capabilities
/// degrade the output (pending images, no embeds) instead of failing.
#[derive(Clone, Default)]
pub struct Collaborators {
    pub fetcher: Option<Arc<dyn AssetFetcher>>,
    pub store: Option<Arc<dyn AssetStore>>,
    pub sizer: Option<Arc<dyn ImageSizer>>,
    pub embeds: Option<Arc<dyn EmbedEligibility>>,
}

impl Collaborators {
    pub fn can_download(&self) -> bool {
        self.fetcher.is_some() && self.store.is_some()
    }

    pub(crate) fn can_embed(&self, url: &str) -> bool {
        self.embeds
            .as_ref()
            .map(|embeds| embeds.can_embed(url))
            .unwrap_or(false)
    }
}

/// A remote image whose bytes are fetched after the tree walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRequest {
    pub target: NodeId,
    pub url: Url,
    pub file_name: String,
    pub declared: DisplayInfo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResolutionReport {
    pub resolved: usize,
    pub failed: usize,
}

/// Stores `bytes` and computes the display size for an image node.
///
/// SVG keeps the size declared in the HTML; raster types are measured when
/// a sizer is available.
pub(crate) fn store_image(
    collaborators: &Collaborators,
    store: &dyn AssetStore,
    name: &str,
    bytes: &[u8],
    mime_type: &str,
    declared: DisplayInfo,
) -> Option<(String, DisplayInfo)> {
    let asset_id = match store.store(name, bytes, mime_type) {
        Ok(id) => id,
        Err(err) => {
            engine_warn!("failed to store image {name}: {err}");
            return None;
        }
    };
    let display = if mime_type.eq_ignore_ascii_case(SVG_MIME_TYPE) {
        declared
    } else {
        collaborators
            .sizer
            .as_ref()
            .and_then(|sizer| sizer.pixel_size(bytes, mime_type))
            .map(|(w, h)| DisplayInfo::sized(w, h))
            .unwrap_or(declared)
    };
    Some((asset_id, display))
}

/// Fetches every request concurrently and rewrites its target node.
///
/// On success the node becomes a resolved image whose text is the page URL;
/// on failure the node becomes a plain bullet that links to the image URL.
pub async fn resolve_assets(
    arena: &mut NodeArena,
    requests: Vec<AssetRequest>,
    page_url: &Url,
    collaborators: &Collaborators,
) -> ResolutionReport {
    let mut report = ResolutionReport::default();
    if requests.is_empty() {
        return report;
    }
    let (Some(fetcher), Some(store)) = (&collaborators.fetcher, &collaborators.store) else {
        return report;
    };

    let fetcher = fetcher.as_ref();
    let results = join_all(
        requests
            .iter()
            .map(|request| fetcher.fetch(&request.url, page_url)),
    )
    .await;

    for (request, result) in requests.into_iter().zip(results) {
        let stored = match result {
            Ok(asset) => store_image(
                collaborators,
                store.as_ref(),
                &request.file_name,
                &asset.bytes,
                &asset.mime_type,
                request.declared,
            ),
            Err(err) => {
                engine_warn!("image download failed for {}: {err}", request.url);
                None
            }
        };
        let Some(node) = arena.get_mut(request.target) else {
            continue;
        };
        match stored {
            Some((asset_id, display)) => {
                engine_debug!("resolved image {} as {asset_id}", request.url);
                node.kind = NodeKind::Image {
                    asset_id,
                    origin: AssetOrigin::Remote {
                        page_url: page_url.to_string(),
                    },
                    display,
                };
                node.text = page_url.as_str().into();
                report.resolved += 1;
            }
            None => {
                node.kind = NodeKind::Bullet;
                node.text
                    .add_attributes(&[TextAttribute::Link(request.url.to_string())]);
                report.failed += 1;
            }
        }
    }
    report
}

/// In-memory store keyed by content digest.
#[derive(Debug, Default)]
pub struct MemoryAssetStore {
    assets: Mutex<HashMap<String, StoredAsset>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAsset {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl MemoryAssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, asset_id: &str) -> Option<StoredAsset> {
        self.assets
            .lock()
            .ok()
            .and_then(|assets| assets.get(asset_id).cloned())
    }

    pub fn len(&self) -> usize {
        self.assets.lock().map(|assets| assets.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AssetStore for MemoryAssetStore {
    fn store(&self, name: &str, bytes: &[u8], mime_type: &str) -> Result<String, AssetStoreError> {
        let asset_id = content_asset_id(bytes);
        let mut assets = self.assets.lock().map_err(|_| AssetStoreError::Rejected {
            name: name.to_string(),
            message: "store lock poisoned".into(),
        })?;
        assets.insert(
            asset_id.clone(),
            StoredAsset {
                name: name.to_string(),
                mime_type: mime_type.to_string(),
                bytes: bytes.to_vec(),
            },
        );
        Ok(asset_id)
    }
}

/// Reads dimensions from PNG, GIF and JPEG headers without decoding pixels.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeaderImageSizer;

impl ImageSizer for HeaderImageSizer {
    fn pixel_size(&self, bytes: &[u8], _mime_type: &str) -> Option<(u32, u32)> {
        png_size(bytes)
            .or_else(|| gif_size(bytes))
            .or_else(|| jpeg_size(bytes))
    }
}

fn png_size(bytes: &[u8]) -> Option<(u32, u32)> {
    const SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";
    if bytes.len() < 24 || !bytes.starts_with(SIGNATURE) || &bytes[12..16] != b"IHDR" {
        return None;
    }
    let width = u32::from_be_bytes(bytes[16..20].try_into().ok()?);
    let height = u32::from_be_bytes(bytes[20..24].try_into().ok()?);
    Some((width, height))
}

fn gif_size(bytes: &[u8]) -> Option<(u32, u32)> {
    if bytes.len() < 10 || !(bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a")) {
        return None;
    }
    let width = u16::from_le_bytes([bytes[6], bytes[7]]);
    let height = u16::from_le_bytes([bytes[8], bytes[9]]);
    Some((width.into(), height.into()))
}

fn jpeg_size(bytes: &[u8]) -> Option<(u32, u32)> {
    if !bytes.starts_with(&[0xFF, 0xD8]) {
        return None;
    }
    let mut pos = 2;
    while pos + 4 <= bytes.len() {
        if bytes[pos] != 0xFF {
            return None;
        }
        let marker = bytes[pos + 1];
        // Standalone markers carry no length.
        if marker == 0x01 || (0xD0..=0xD7).contains(&marker) {
            pos += 2;
            continue;
        }
        let len = u16::from_be_bytes([bytes[pos + 2], bytes[pos + 3]]) as usize;
        let is_frame_header =
            (0xC0..=0xCF).contains(&marker) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_frame_header {
            let frame = bytes.get(pos + 5..pos + 9)?;
            let height = u16::from_be_bytes([frame[0], frame[1]]);
            let width = u16::from_be_bytes([frame[2], frame[3]]);
            return Some((width.into(), height.into()));
        }
        pos += 2 + len;
    }
    None
}

/// Accepts URLs whose host is, or is a subdomain of, a configured host.
#[derive(Debug, Clone)]
pub struct KnownHostsEmbedChecker {
    hosts: Vec<String>,
}

impl KnownHostsEmbedChecker {
    pub fn new(hosts: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            hosts: hosts
                .into_iter()
                .map(|h| h.into().to_ascii_lowercase())
                .collect(),
        }
    }
}

impl Default for KnownHostsEmbedChecker {
    fn default() -> Self {
        Self::new([
            "youtube.com",
            "youtu.be",
            "vimeo.com",
            "twitter.com",
            "x.com",
            "soundcloud.com",
            "open.spotify.com",
        ])
    }
}

impl EmbedEligibility for KnownHostsEmbedChecker {
    fn can_embed(&self, url: &str) -> bool {
        let Some(host) = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
        else {
            return false;
        };
        self.hosts
            .iter()
            .any(|known| host == *known || host.ends_with(&format!(".{known}")))
    }
}
