use serde::{Deserialize, Serialize};

use crate::text::{RichText, TextAttribute};

/// Stable handle of a node inside a [`NodeArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetOrigin {
    /// Fetched from the web, referenced from the given page URL.
    Remote { page_url: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DisplayInfo {
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl DisplayInfo {
    pub fn sized(width: u32, height: u32) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NodeKind {
    /// Plain paragraph-level text.
    #[default]
    Bullet,
    Image {
        asset_id: String,
        origin: AssetOrigin,
        display: DisplayInfo,
    },
    Embed {
        url: String,
        origin: AssetOrigin,
        display: DisplayInfo,
    },
}

impl NodeKind {
    pub fn is_bullet(&self) -> bool {
        matches!(self, NodeKind::Bullet)
    }
}

/// One unit of converted content: a styled text, its semantics and children.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NoteNode {
    pub text: RichText,
    pub kind: NodeKind,
    pub children: Vec<NoteNode>,
}

impl NoteNode {
    pub fn bullet(text: impl Into<RichText>) -> Self {
        Self {
            text: text.into(),
            kind: NodeKind::Bullet,
            children: Vec::new(),
        }
    }

    pub fn with_kind(text: impl Into<RichText>, kind: NodeKind) -> Self {
        Self {
            text: text.into(),
            kind,
            children: Vec::new(),
        }
    }

    pub fn plain_text(&self) -> String {
        self.text.text()
    }

    pub fn attributes(&self) -> Vec<TextAttribute> {
        self.text.attributes()
    }

    /// Replaces the kind with an embed when the text links to exactly one
    /// URL that `can_embed` accepts.
    pub fn convert_to_embed(&mut self, page_url: &str, can_embed: impl Fn(&str) -> bool) -> bool {
        let links = self.text.links();
        let [url] = links.as_slice() else {
            return false;
        };
        if !can_embed(url) {
            return false;
        }
        self.kind = NodeKind::Embed {
            url: url.clone(),
            origin: AssetOrigin::Remote {
                page_url: page_url.to_string(),
            },
            display: DisplayInfo::default(),
        };
        true
    }
}

/// Owns every node built during one conversion; nodes are addressed by
/// [`NodeId`] and never move, so ids stay valid while the document is
/// reshaped around them.
#[derive(Debug, Default)]
pub struct NodeArena {
    nodes: Vec<NoteNode>,
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, node: NoteNode) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    pub fn get(&self, id: NodeId) -> Option<&NoteNode> {
        self.nodes.get(id.0)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut NoteNode> {
        self.nodes.get_mut(id.0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Clones the listed nodes out of the arena, in order.
    pub fn collect(&self, ids: &[NodeId]) -> Vec<NoteNode> {
        ids.iter().filter_map(|id| self.get(*id).cloned()).collect()
    }
}
