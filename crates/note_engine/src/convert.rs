use std::sync::Arc;

use engine_logging::{engine_debug, engine_warn};
use scraper::Html;
use url::Url;

use crate::assets::{
    resolve_assets, AssetFetcher, AssetRequest, AssetStore, Collaborators, EmbedEligibility,
    ImageSizer, ResolutionReport,
};
use crate::config::ConverterOptions;
use crate::decode::decode_bytes_lossy;
use crate::extract::extract_paragraphs;
use crate::node::{NodeArena, NodeId, NoteNode};
use crate::paragraphs::join_and_split;
use crate::visitor::HtmlVisitor;

/// Converts HTML captured from a page into note nodes.
///
/// Conversion is best-effort: input that can't be parsed yields empty
/// output rather than an error.
#[derive(Clone)]
pub struct HtmlNoteAdapter {
    base_url: Url,
    options: ConverterOptions,
    collaborators: Collaborators,
}

impl HtmlNoteAdapter {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            options: ConverterOptions::default(),
            collaborators: Collaborators::default(),
        }
    }

    pub fn with_options(mut self, options: ConverterOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_collaborators(mut self, collaborators: Collaborators) -> Self {
        self.collaborators = collaborators;
        self
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn AssetFetcher>) -> Self {
        self.collaborators.fetcher = Some(fetcher);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn AssetStore>) -> Self {
        self.collaborators.store = Some(store);
        self
    }

    pub fn with_sizer(mut self, sizer: Arc<dyn ImageSizer>) -> Self {
        self.collaborators.sizer = Some(sizer);
        self
    }

    pub fn with_embed_checker(mut self, embeds: Arc<dyn EmbedEligibility>) -> Self {
        self.collaborators.embeds = Some(embeds);
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Runs the synchronous half of a conversion: parse, visit, join/split.
    ///
    /// Returns `None` when the HTML has no content to parse.
    pub fn prepare(&self, html: &str) -> Option<PreparedConversion> {
        if html.trim().is_empty() {
            engine_warn!("html conversion for {} skipped: empty document", self.base_url);
            return None;
        }
        let document = Html::parse_document(html);
        if !document.errors.is_empty() {
            engine_debug!(
                "html for {} parsed with {} recoverable errors",
                self.base_url,
                document.errors.len()
            );
        }
        let visited =
            HtmlVisitor::new(&self.base_url, &self.options, &self.collaborators).parse(&document);
        let mut arena = visited.arena;
        let roots = join_and_split(&mut arena, &visited.roots);
        Some(PreparedConversion {
            arena,
            roots,
            requests: visited.requests,
        })
    }

    /// Converts to top-level nodes, waiting for every image download to
    /// resolve or fail first.
    pub async fn convert(&self, html: &str) -> Vec<NoteNode> {
        match self.prepare(html) {
            Some(prepared) => prepared.finish(self).await.0,
            None => Vec::new(),
        }
    }

    /// Same as [`convert`](Self::convert), wrapped in one root node.
    pub async fn convert_to_node(&self, html: &str) -> NoteNode {
        NoteNode {
            children: self.convert(html).await,
            ..NoteNode::default()
        }
    }

    /// Plain text of the converted nodes, one line per node.
    pub async fn convert_to_text(&self, html: &str) -> String {
        self.convert(html)
            .await
            .iter()
            .map(NoteNode::plain_text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Decodes raw page bytes before converting them. Malformed byte
    /// sequences become U+FFFD instead of failing the page.
    pub async fn convert_bytes(&self, bytes: &[u8], content_type: Option<&str>) -> Vec<NoteNode> {
        let decoded = decode_bytes_lossy(bytes, content_type);
        self.convert(&decoded.text).await
    }

    /// Verbatim text of every `<p>`, deduplicated in document order, for
    /// text-similarity analysis rather than note authoring. The result has
    /// one paragraph per line, joined with `'\n'`.
    pub fn convert_for_clustering(&self, html: &str) -> String {
        if html.trim().is_empty() {
            return String::new();
        }
        extract_paragraphs(html).join("\n")
    }
}

/// A conversion whose node list is final but whose images may still be
/// waiting for their bytes.
#[derive(Debug)]
pub struct PreparedConversion {
    arena: NodeArena,
    roots: Vec<NodeId>,
    requests: Vec<AssetRequest>,
}

impl PreparedConversion {
    pub fn pending_fetches(&self) -> &[AssetRequest] {
        &self.requests
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Snapshot of the nodes as they are now.
    pub fn nodes(&self) -> Vec<NoteNode> {
        self.arena.collect(&self.roots)
    }

    /// Resolves the pending images and hands back the final nodes.
    pub async fn finish(mut self, adapter: &HtmlNoteAdapter) -> (Vec<NoteNode>, ResolutionReport) {
        let report = resolve_assets(
            &mut self.arena,
            std::mem::take(&mut self.requests),
            &adapter.base_url,
            &adapter.collaborators,
        )
        .await;
        if report.failed > 0 {
            engine_warn!(
                "{} of {} images on {} kept as links",
                report.failed,
                report.failed + report.resolved,
                adapter.base_url
            );
        }
        (self.arena.collect(&self.roots), report)
    }
}
