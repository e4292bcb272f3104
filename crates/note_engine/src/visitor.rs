use ego_tree::NodeRef;
use engine_logging::engine_trace;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::assets::{store_image, AssetRequest, Collaborators};
use crate::config::ConverterOptions;
use crate::filename::{asset_file_name, data_asset_file_name};
use crate::node::{AssetOrigin, DisplayInfo, NodeArena, NodeId, NodeKind, NoteNode};
use crate::resolve::{parse_data_uri, resolve_url};
use crate::text::TextAttribute;

/// Elements that end a paragraph, after the MDN list of block-level elements.
const BLOCK_LEVEL_TAGS: &[&str] = &[
    "address",
    "article",
    "aside",
    "blockquote",
    "details",
    "dialog",
    "dd",
    "div",
    "dl",
    "dt",
    "fieldset",
    "figcaption",
    "figure",
    "footer",
    "form",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "header",
    "hgroup",
    "hr",
    "li",
    "main",
    "nav",
    "ol",
    "p",
    "pre",
    "section",
    "table",
    "ul",
];

pub fn is_block_level(tag: &str) -> bool {
    BLOCK_LEVEL_TAGS.contains(&tag)
}

/// Handler selected for an element by its tag name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ElementKind {
    Anchor,
    Transparent,
    Emphasis,
    Strong,
    Image,
    Iframe,
    Video,
    Container,
}

impl ElementKind {
    fn from_tag(tag: &str) -> Self {
        match tag {
            "a" => ElementKind::Anchor,
            "span" => ElementKind::Transparent,
            "i" | "em" => ElementKind::Emphasis,
            "b" | "strong" => ElementKind::Strong,
            "img" => ElementKind::Image,
            "iframe" => ElementKind::Iframe,
            "video" => ElementKind::Video,
            _ => ElementKind::Container,
        }
    }
}

/// Result of one tree walk: the nodes in document order plus the images
/// still waiting for their bytes.
#[derive(Debug, Default)]
pub struct VisitOutput {
    pub arena: NodeArena,
    pub roots: Vec<NodeId>,
    pub requests: Vec<AssetRequest>,
}

/// Converts a parsed HTML tree into a flat list of [`NoteNode`]s.
pub struct HtmlVisitor<'a> {
    base_url: &'a Url,
    options: &'a ConverterOptions,
    collaborators: &'a Collaborators,
    arena: NodeArena,
    requests: Vec<AssetRequest>,
}

impl<'a> HtmlVisitor<'a> {
    pub fn new(
        base_url: &'a Url,
        options: &'a ConverterOptions,
        collaborators: &'a Collaborators,
    ) -> Self {
        Self {
            base_url,
            options,
            collaborators,
            arena: NodeArena::new(),
            requests: Vec::new(),
        }
    }

    /// Walks the document body (or the whole document when it has none).
    pub fn parse(mut self, document: &Html) -> VisitOutput {
        let body = Selector::parse("body")
            .ok()
            .and_then(|sel| document.select(&sel).next())
            .unwrap_or_else(|| document.root_element());
        let roots = self.visit_children(*body);
        engine_trace!(
            "visited document: {} nodes, {} pending images",
            self.arena.len(),
            self.requests.len()
        );
        VisitOutput {
            arena: self.arena,
            roots,
            requests: self.requests,
        }
    }

    fn visit_node(&mut self, node: NodeRef<'_, Node>) -> Vec<NodeId> {
        match node.value() {
            Node::Text(text) => {
                let mut ids = Vec::new();
                let cleaned = clean_text(text);
                if !cleaned.is_empty() {
                    ids.push(self.arena.insert(NoteNode::bullet(cleaned.as_str())));
                }
                ids.extend(self.visit_children(node));
                ids
            }
            Node::Element(_) => match ElementRef::wrap(node) {
                Some(element) => self.visit_element(element),
                None => Vec::new(),
            },
            Node::Comment(_) | Node::ProcessingInstruction(_) | Node::Doctype(_) => Vec::new(),
            _ => self.visit_children(node),
        }
    }

    fn visit_children(&mut self, node: NodeRef<'_, Node>) -> Vec<NodeId> {
        let mut ids = Vec::new();
        for child in node.children() {
            ids.extend(self.visit_node(child));
        }
        ids
    }

    fn visit_element(&mut self, element: ElementRef<'_>) -> Vec<NodeId> {
        let tag = element.value().name().to_ascii_lowercase();
        if self.options.skipped_tags.iter().any(|t| t.eq_ignore_ascii_case(&tag)) {
            return Vec::new();
        }
        match ElementKind::from_tag(&tag) {
            ElementKind::Anchor => self.visit_anchor(element),
            ElementKind::Transparent => self.visit_children(*element),
            ElementKind::Emphasis => self.visit_styled(element, TextAttribute::Emphasis),
            ElementKind::Strong => self.visit_styled(element, TextAttribute::Strong),
            ElementKind::Image => self.visit_image(element),
            ElementKind::Iframe => self.visit_iframe(element),
            ElementKind::Video => self.visit_video(element),
            ElementKind::Container => {
                let mut ids = self.visit_children(*element);
                if is_block_level(&tag) {
                    ids.push(self.arena.insert(NoteNode::bullet("\n")));
                }
                ids
            }
        }
    }

    fn visit_anchor(&mut self, element: ElementRef<'_>) -> Vec<NodeId> {
        let ids = self.visit_children(*element);
        let link = element
            .value()
            .attr("href")
            .map(str::trim)
            .filter(|href| !href.is_empty())
            .map(|href| match resolve_url(href, self.base_url) {
                Some(url) => url.to_string(),
                None => href.to_string(),
            });

        for id in &ids {
            let Some(node) = self.arena.get_mut(*id) else {
                continue;
            };
            node.text = std::mem::take(&mut node.text).trimmed();
            if let Some(url) = &link {
                node.text.add_attributes(&[TextAttribute::Link(url.clone())]);
                self.try_embed(*id);
            }
        }
        ids
    }

    fn visit_styled(&mut self, element: ElementRef<'_>, attribute: TextAttribute) -> Vec<NodeId> {
        let ids = self.visit_children(*element);
        for id in &ids {
            if let Some(node) = self.arena.get_mut(*id) {
                node.text.add_attributes(std::slice::from_ref(&attribute));
            }
        }
        ids
    }

    fn visit_image(&mut self, element: ElementRef<'_>) -> Vec<NodeId> {
        let Some(src) = element.value().attr("src") else {
            return Vec::new();
        };
        let declared = DisplayInfo {
            width: parse_dimension(element.value().attr("width")),
            height: parse_dimension(element.value().attr("height")),
        };

        if let Some(data) = parse_data_uri(src) {
            let Some(store) = self.collaborators.store.as_ref() else {
                return Vec::new();
            };
            let name = data_asset_file_name(&data.bytes, &data.mime_type);
            let Some((asset_id, display)) = store_image(
                self.collaborators,
                store.as_ref(),
                &name,
                &data.bytes,
                &data.mime_type,
                declared,
            ) else {
                return Vec::new();
            };
            let kind = NodeKind::Image {
                asset_id,
                origin: self.origin(),
                display,
            };
            return vec![self.arena.insert(NoteNode::with_kind("", kind))];
        }

        let Some(url) = resolve_url(src, self.base_url) else {
            return Vec::new();
        };
        let kind = NodeKind::Image {
            asset_id: url.to_string(),
            origin: self.origin(),
            display: DisplayInfo::default(),
        };
        let id = self.arena.insert(NoteNode::with_kind(url.as_str(), kind));
        if self.collaborators.can_download() {
            self.requests.push(AssetRequest {
                target: id,
                file_name: asset_file_name(&url),
                url,
                declared,
            });
        }
        vec![id]
    }

    fn visit_iframe(&mut self, element: ElementRef<'_>) -> Vec<NodeId> {
        let Some(url) = element
            .value()
            .attr("src")
            .and_then(|src| resolve_url(src, self.base_url))
        else {
            return Vec::new();
        };
        vec![self.link_node(url.as_str(), &url)]
    }

    fn visit_video(&mut self, element: ElementRef<'_>) -> Vec<NodeId> {
        let Some(src) = self.video_source(element) else {
            return Vec::new();
        };
        let Some(url) = resolve_url(&src, self.base_url) else {
            return Vec::new();
        };
        vec![self.link_node(&src, &url)]
    }

    /// Prefers the element's own `src`, then a descendant `.mp4` source,
    /// then any descendant source. `blob:` URLs can't be fetched on their
    /// own and are replaced by the page URL.
    fn video_source(&self, element: ElementRef<'_>) -> Option<String> {
        let normalize = |src: &str| -> Option<String> {
            let src = src.trim();
            if src.is_empty() {
                None
            } else if src.starts_with("blob:") {
                Some(self.base_url.to_string())
            } else {
                Some(src.to_string())
            }
        };

        if let Some(src) = element.value().attr("src").and_then(normalize) {
            return Some(src);
        }

        let sources: Vec<String> = element
            .descendants()
            .skip(1)
            .filter_map(ElementRef::wrap)
            .filter_map(|child| child.value().attr("src"))
            .filter_map(normalize)
            .collect();
        sources
            .iter()
            .find(|src| src.contains(".mp4"))
            .or_else(|| sources.first())
            .cloned()
    }

    fn link_node(&mut self, text: &str, url: &Url) -> NodeId {
        let mut node = NoteNode::bullet(text);
        node.text
            .add_attributes(&[TextAttribute::Link(url.to_string())]);
        let id = self.arena.insert(node);
        self.try_embed(id);
        id
    }

    fn try_embed(&mut self, id: NodeId) {
        if !self.options.allow_embed {
            return;
        }
        let collaborators = self.collaborators;
        let page_url = self.base_url;
        if let Some(node) = self.arena.get_mut(id) {
            if node.kind.is_bullet() {
                node.convert_to_embed(page_url.as_str(), |url| collaborators.can_embed(url));
            }
        }
    }

    fn origin(&self) -> AssetOrigin {
        AssetOrigin::Remote {
            page_url: self.base_url.to_string(),
        }
    }
}

/// Drops control characters (line breaks and tabs included); every other
/// character, spaces too, is kept as written.
fn clean_text(raw: &str) -> String {
    raw.chars().filter(|ch| !ch.is_control()).collect()
}

fn parse_dimension(value: Option<&str>) -> Option<u32> {
    value.and_then(|v| v.trim().trim_end_matches("px").parse().ok())
}

#[cfg(test)]
mod tests {
    use super::{clean_text, is_block_level, parse_dimension};

    #[test]
    fn text_cleanup_strips_only_control_characters() {
        assert_eq!(clean_text("foo\nbar\tbaz   qux\u{7}"), "foobarbaz   qux");
        assert_eq!(clean_text("a  b"), "a  b");
        assert_eq!(clean_text("\r\n\t"), "");
        assert_eq!(clean_text("a\u{a0}b"), "a\u{a0}b");
    }

    #[test]
    fn block_level_lookup() {
        assert!(is_block_level("p"));
        assert!(is_block_level("h6"));
        assert!(!is_block_level("span"));
        assert!(!is_block_level("br"));
    }

    #[test]
    fn dimensions_accept_pixel_suffix() {
        assert_eq!(parse_dimension(Some("575")), Some(575));
        assert_eq!(parse_dimension(Some("300px")), Some(300));
        assert_eq!(parse_dimension(Some("auto")), None);
        assert_eq!(parse_dimension(None), None);
    }
}
