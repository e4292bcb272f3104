use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use note_engine::{
    content_asset_id, join_and_split, AssetFetcher, AssetOrigin, AssetStore, AssetStoreError,
    DisplayInfo, FailureKind, FetchError, FetchedAsset, HeaderImageSizer, HtmlNoteAdapter,
    MemoryAssetStore, NodeArena, NodeKind, NoteNode, TextAttribute, SVG_MIME_TYPE,
};
use pretty_assertions::assert_eq;
use url::Url;

const PAGE: &str = "https://site.test/page";

/// Serves canned bodies by URL; everything else is a 404.
#[derive(Default)]
struct StaticFetcher {
    assets: HashMap<String, (Vec<u8>, String)>,
    calls: AtomicUsize,
}

impl StaticFetcher {
    fn with(mut self, url: &str, bytes: Vec<u8>, mime_type: &str) -> Self {
        self.assets
            .insert(url.to_string(), (bytes, mime_type.to_string()));
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl AssetFetcher for StaticFetcher {
    async fn fetch(&self, url: &Url, page_url: &Url) -> Result<FetchedAsset, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(page_url.as_str(), PAGE);
        match self.assets.get(url.as_str()) {
            Some((bytes, mime_type)) => Ok(FetchedAsset {
                bytes: Bytes::from(bytes.clone()),
                mime_type: mime_type.clone(),
            }),
            None => Err(FetchError::new(FailureKind::HttpStatus(404), "not found")),
        }
    }
}

struct RejectingStore;

impl AssetStore for RejectingStore {
    fn store(&self, name: &str, _bytes: &[u8], _mime_type: &str) -> Result<String, AssetStoreError> {
        Err(AssetStoreError::Rejected {
            name: name.to_string(),
            message: "disk full".to_string(),
        })
    }
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR".to_vec();
    bytes.extend_from_slice(&width.to_be_bytes());
    bytes.extend_from_slice(&height.to_be_bytes());
    bytes
}

fn page() -> Url {
    Url::parse(PAGE).unwrap()
}

fn remote_image(asset_id: &str, display: DisplayInfo) -> NodeKind {
    NodeKind::Image {
        asset_id: asset_id.to_string(),
        origin: AssetOrigin::Remote {
            page_url: PAGE.to_string(),
        },
        display,
    }
}

#[tokio::test]
async fn downloaded_image_replaces_pending_node() {
    engine_logging::initialize_for_tests();
    let bytes = png(5, 7);
    let fetcher = Arc::new(StaticFetcher::default().with(
        "https://site.test/a.png",
        bytes.clone(),
        "image/png",
    ));
    let store = Arc::new(MemoryAssetStore::new());
    let adapter = HtmlNoteAdapter::new(page())
        .with_fetcher(fetcher.clone())
        .with_store(store.clone())
        .with_sizer(Arc::new(HeaderImageSizer));

    let html = r#"<p>Intro</p><img src="/a.png" width="10" height="20"><p>Outro</p>"#;
    let prepared = adapter.prepare(html).unwrap();
    assert_eq!(prepared.pending_fetches().len(), 1);
    let before = prepared.nodes();
    assert_eq!(before[1].plain_text(), "https://site.test/a.png");

    let (nodes, report) = prepared.finish(&adapter).await;
    assert_eq!(report.resolved, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(fetcher.calls(), 1);

    assert_eq!(nodes.len(), 3);
    assert_eq!(nodes[0].plain_text(), "Intro");
    assert_eq!(nodes[2].plain_text(), "Outro");
    assert_eq!(
        nodes[1].kind,
        remote_image(&content_asset_id(&bytes), DisplayInfo::sized(5, 7))
    );
    assert_eq!(nodes[1].plain_text(), PAGE);
    assert_eq!(store.get(&content_asset_id(&bytes)).unwrap().name, "a.png");
}

#[tokio::test]
async fn failed_download_leaves_a_link() {
    engine_logging::initialize_for_tests();
    let fetcher = Arc::new(StaticFetcher::default());
    let adapter = HtmlNoteAdapter::new(page())
        .with_fetcher(fetcher.clone())
        .with_store(Arc::new(MemoryAssetStore::new()));

    let prepared = adapter
        .prepare(r#"<img src="https://cdn.test/gone.png">"#)
        .unwrap();
    let (nodes, report) = prepared.finish(&adapter).await;

    assert_eq!(report.failed, 1);
    assert_eq!(nodes.len(), 1);
    assert!(nodes[0].kind.is_bullet());
    assert_eq!(nodes[0].plain_text(), "https://cdn.test/gone.png");
    assert_eq!(
        nodes[0].attributes(),
        vec![TextAttribute::Link("https://cdn.test/gone.png".to_string())]
    );
}

#[tokio::test]
async fn store_rejection_counts_as_failure() {
    let fetcher = Arc::new(StaticFetcher::default().with(
        "https://site.test/a.png",
        png(1, 1),
        "image/png",
    ));
    let adapter = HtmlNoteAdapter::new(page())
        .with_fetcher(fetcher)
        .with_store(Arc::new(RejectingStore));

    let (nodes, report) = adapter
        .prepare(r#"<img src="a.png">"#)
        .unwrap()
        .finish(&adapter)
        .await;
    assert_eq!(report.failed, 1);
    assert!(nodes[0].kind.is_bullet());
}

#[tokio::test]
async fn svg_keeps_declared_size() {
    let svg = b"<svg xmlns=\"http://www.w3.org/2000/svg\"/>".to_vec();
    let fetcher = Arc::new(StaticFetcher::default().with(
        "https://site.test/logo.svg",
        svg.clone(),
        SVG_MIME_TYPE,
    ));
    let adapter = HtmlNoteAdapter::new(page())
        .with_fetcher(fetcher)
        .with_store(Arc::new(MemoryAssetStore::new()))
        .with_sizer(Arc::new(HeaderImageSizer));

    let nodes = adapter
        .convert(r#"<img src="logo.svg" width="120px" height="40">"#)
        .await;
    assert_eq!(
        nodes[0].kind,
        remote_image(&content_asset_id(&svg), DisplayInfo::sized(120, 40))
    );
}

#[tokio::test]
async fn every_image_is_fetched_before_convert_returns() {
    let fetcher = Arc::new(
        StaticFetcher::default()
            .with("https://site.test/1.png", png(1, 1), "image/png")
            .with("https://site.test/2.png", png(2, 2), "image/png"),
    );
    let adapter = HtmlNoteAdapter::new(page())
        .with_fetcher(fetcher.clone())
        .with_store(Arc::new(MemoryAssetStore::new()))
        .with_sizer(Arc::new(HeaderImageSizer));

    let html = r#"<p>a</p><img src="1.png"><p>b</p><img src="2.png"><img src="3.png">"#;
    let nodes = adapter.convert(html).await;

    assert_eq!(fetcher.calls(), 3);
    let kinds: Vec<&str> = nodes
        .iter()
        .map(|node| match node.kind {
            NodeKind::Bullet => "bullet",
            NodeKind::Image { .. } => "image",
            NodeKind::Embed { .. } => "embed",
        })
        .collect();
    assert_eq!(kinds, vec!["bullet", "image", "bullet", "image", "bullet"]);
    assert_eq!(nodes[4].plain_text(), "https://site.test/3.png");
}

#[tokio::test]
async fn without_a_store_nothing_is_fetched() {
    let fetcher = Arc::new(StaticFetcher::default());
    let adapter = HtmlNoteAdapter::new(page()).with_fetcher(fetcher.clone());

    let prepared = adapter.prepare(r#"<img src="a.png">"#).unwrap();
    assert!(prepared.pending_fetches().is_empty());
    let (nodes, _) = prepared.finish(&adapter).await;

    assert_eq!(fetcher.calls(), 0);
    assert_eq!(
        nodes[0].kind,
        remote_image("https://site.test/a.png", DisplayInfo::default())
    );
}

#[test]
fn join_and_split_never_move_image_nodes() {
    let mut arena = NodeArena::new();
    let image = arena.insert(NoteNode::with_kind(
        "https://site.test/x.png",
        remote_image("https://site.test/x.png", DisplayInfo::default()),
    ));
    let roots = vec![
        arena.insert(NoteNode::bullet("first ")),
        arena.insert(NoteNode::bullet("line\nsecond")),
        image,
        arena.insert(NoteNode::bullet("\nthird\n")),
    ];

    let out = join_and_split(&mut arena, &roots);

    assert_eq!(out.len(), 4);
    assert_eq!(out[2], image);
    let texts: Vec<String> = arena.collect(&out).iter().map(NoteNode::plain_text).collect();
    assert_eq!(
        texts,
        vec!["first line", "second", "https://site.test/x.png", "third"]
    );
}
