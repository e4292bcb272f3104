//! Reshapes the visitor's flat node list into one node per line.
//!
//! Consecutive bullet nodes are merged, then split again on line breaks.
//! Image and embed nodes are never touched: they keep their [`NodeId`], so
//! pending asset resolution still finds them afterwards.

use crate::node::{NodeArena, NodeId, NoteNode};
use crate::text::RichText;

/// Joins bullet runs and splits them into trimmed, non-empty lines.
pub fn join_and_split(arena: &mut NodeArena, roots: &[NodeId]) -> Vec<NodeId> {
    let joined = join_bullets(arena, roots);
    split_lines(arena, &joined)
}

/// Merges each run of consecutive bullet nodes into a single new node.
pub fn join_bullets(arena: &mut NodeArena, roots: &[NodeId]) -> Vec<NodeId> {
    let mut out = Vec::with_capacity(roots.len());
    let mut pending: Option<NoteNode> = None;

    for id in roots {
        let Some(node) = arena.get(*id) else {
            continue;
        };
        if node.kind.is_bullet() {
            let merged = pending.get_or_insert_with(NoteNode::default);
            merged.text.append(node.text.clone());
            merged.children.extend(node.children.iter().cloned());
        } else {
            if let Some(merged) = pending.take() {
                out.push(arena.insert(merged));
            }
            out.push(*id);
        }
    }
    if let Some(merged) = pending.take() {
        out.push(arena.insert(merged));
    }
    out
}

/// Splits bullet nodes on `'\n'`; empty lines are dropped.
pub fn split_lines(arena: &mut NodeArena, roots: &[NodeId]) -> Vec<NodeId> {
    let mut out = Vec::with_capacity(roots.len());
    for id in roots {
        let Some(node) = arena.get(*id) else {
            continue;
        };
        if !node.kind.is_bullet() {
            out.push(*id);
            continue;
        }

        let mut children = Some(node.children.clone());
        let lines: Vec<RichText> = node
            .text
            .split_lines()
            .into_iter()
            .map(RichText::trimmed)
            .filter(|line| !line.is_empty())
            .collect();
        for line in lines {
            let mut piece = NoteNode::bullet(line);
            // Children stay with the first line of their paragraph.
            if let Some(children) = children.take() {
                piece.children = children;
            }
            out.push(arena.insert(piece));
        }
    }
    out
}
