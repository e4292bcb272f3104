use std::sync::Arc;
use std::time::Duration;

use note_engine::{
    content_asset_id, AssetFetcher, DisplayInfo, FailureKind, FetchSettings, HeaderImageSizer,
    HtmlNoteAdapter, MemoryAssetStore, NodeKind, ReqwestAssetFetcher,
};
use pretty_assertions::assert_eq;
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// Signature plus IHDR chunk; enough for header-based sizing.
fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    bytes.extend_from_slice(&13u32.to_be_bytes());
    bytes.extend_from_slice(b"IHDR");
    bytes.extend_from_slice(&width.to_be_bytes());
    bytes.extend_from_slice(&height.to_be_bytes());
    bytes.extend_from_slice(&[8, 6, 0, 0, 0]);
    bytes.extend_from_slice(&[0, 0, 0, 0]);
    bytes
}

fn page(server: &MockServer) -> Url {
    Url::parse(&format!("{}/article", server.uri())).unwrap()
}

#[tokio::test]
async fn fetcher_returns_image_bytes_and_sends_referer() {
    engine_logging::initialize_for_tests();
    let server = MockServer::start().await;
    let body = png_bytes(3, 2);
    Mock::given(method("GET"))
        .and(path("/img.png"))
        .and(header("referer", format!("{}/article", server.uri()).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body.clone(), "image/png"))
        .mount(&server)
        .await;

    let fetcher = ReqwestAssetFetcher::new(FetchSettings::default()).unwrap();
    let url = Url::parse(&format!("{}/img.png", server.uri())).unwrap();

    let asset = fetcher.fetch(&url, &page(&server)).await.expect("fetch ok");
    assert_eq!(asset.mime_type, "image/png");
    assert_eq!(asset.bytes.as_ref(), body.as_slice());
}

#[tokio::test]
async fn fetcher_fails_on_http_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing.png"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let fetcher = ReqwestAssetFetcher::new(FetchSettings::default()).unwrap();
    let url = Url::parse(&format!("{}/missing.png", server.uri())).unwrap();

    let err = fetcher.fetch(&url, &page(&server)).await.unwrap_err();
    assert_eq!(err.kind, FailureKind::HttpStatus(404));
}

#[tokio::test]
async fn fetcher_rejects_non_image_content() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("<html></html>", "text/html; charset=utf-8"),
        )
        .mount(&server)
        .await;

    let fetcher = ReqwestAssetFetcher::new(FetchSettings::default()).unwrap();
    let url = Url::parse(&format!("{}/login", server.uri())).unwrap();

    let err = fetcher.fetch(&url, &page(&server)).await.unwrap_err();
    assert_eq!(
        err.kind,
        FailureKind::UnsupportedContentType {
            content_type: "text/html".to_string()
        }
    );
}

#[tokio::test]
async fn fetcher_times_out_on_slow_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(250))
                .set_body_raw(png_bytes(1, 1), "image/png"),
        )
        .mount(&server)
        .await;

    let settings = FetchSettings {
        request_timeout: Duration::from_millis(50),
        ..FetchSettings::default()
    };
    let fetcher = ReqwestAssetFetcher::new(settings).unwrap();
    let url = Url::parse(&format!("{}/slow.png", server.uri())).unwrap();

    let err = fetcher.fetch(&url, &page(&server)).await.unwrap_err();
    assert_eq!(err.kind, FailureKind::Timeout);
}

#[tokio::test]
async fn fetcher_rejects_too_large_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/large.png"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("01234567890", "image/png"))
        .mount(&server)
        .await;

    let settings = FetchSettings {
        max_bytes: 10,
        ..FetchSettings::default()
    };
    let fetcher = ReqwestAssetFetcher::new(settings).unwrap();
    let url = Url::parse(&format!("{}/large.png", server.uri())).unwrap();

    let err = fetcher.fetch(&url, &page(&server)).await.unwrap_err();
    assert_eq!(
        err.kind,
        FailureKind::TooLarge {
            max_bytes: 10,
            actual: Some(11)
        }
    );
}

#[tokio::test]
async fn fetcher_refuses_non_http_schemes() {
    let fetcher = ReqwestAssetFetcher::new(FetchSettings::default()).unwrap();
    let url = Url::parse("file:///tmp/a.png").unwrap();
    let referer = Url::parse("https://example.com/").unwrap();

    let err = fetcher.fetch(&url, &referer).await.unwrap_err();
    assert_eq!(err.kind, FailureKind::InvalidUrl);
}

#[tokio::test]
async fn adapter_downloads_and_sizes_remote_images() {
    engine_logging::initialize_for_tests();
    let server = MockServer::start().await;
    let body = png_bytes(3, 2);
    Mock::given(method("GET"))
        .and(path("/pics/cat.png"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body.clone(), "image/png"))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryAssetStore::new());
    let fetcher = ReqwestAssetFetcher::new(FetchSettings::default()).unwrap();
    let adapter = HtmlNoteAdapter::new(page(&server))
        .with_fetcher(Arc::new(fetcher))
        .with_store(store.clone())
        .with_sizer(Arc::new(HeaderImageSizer));

    let nodes = adapter
        .convert(r#"<p>Look</p><img src="/pics/cat.png" width="30" height="20">"#)
        .await;

    assert_eq!(nodes.len(), 2);
    assert_eq!(nodes[0].plain_text(), "Look");
    let asset_id = content_asset_id(&body);
    match &nodes[1].kind {
        NodeKind::Image {
            asset_id: id,
            display,
            ..
        } => {
            assert_eq!(id, &asset_id);
            assert_eq!(*display, DisplayInfo::sized(3, 2));
        }
        other => panic!("expected an image, got {other:?}"),
    }
    assert_eq!(nodes[1].plain_text(), page(&server).as_str());

    let stored = store.get(&asset_id).expect("asset stored");
    assert_eq!(stored.name, "cat.png");
    assert_eq!(stored.mime_type, "image/png");
}
