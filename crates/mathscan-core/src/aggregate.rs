//! Merges a text node and its text/break siblings into one buffer.
//!
//! Math is often split across adjacent text nodes (streamed output, editor
//! fragments, one node per line), so scanning a single node would miss
//! expressions whose open and close delimiters land in different nodes.
//! The aggregator walks back, then forward, through immediate siblings
//! while they are text or break units, and concatenates them in document
//! order. Each break contributes exactly one `\n`, and text is copied
//! verbatim, so a backslash that ends a line stays next to its `\n`.

use crate::document::{Document, UnitKind};
use std::ops::Range;

/// One contributing node and the buffer bytes it produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferUnit<N> {
    pub node: N,
    pub kind: UnitKind,
    pub range: Range<usize>,
}

/// The logical text of a sibling run, with a map back to its nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBuffer<N> {
    text: String,
    units: Vec<BufferUnit<N>>,
}

impl<N: Copy> TextBuffer<N> {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn units(&self) -> &[BufferUnit<N>] {
        &self.units
    }

    /// Contributing nodes in document order.
    pub fn nodes(&self) -> impl Iterator<Item = N> + '_ {
        self.units.iter().map(|u| u.node)
    }

    /// The unit that produced the byte at `offset`.
    pub fn unit_at(&self, offset: usize) -> Option<&BufferUnit<N>> {
        if offset >= self.text.len() {
            return None;
        }
        let idx = self.units.partition_point(|u| u.range.end <= offset);
        self.units.get(idx)
    }

    fn push(&mut self, node: N, kind: UnitKind, content: &str) {
        let start = self.text.len();
        self.text.push_str(content);
        self.units.push(BufferUnit {
            node,
            kind,
            range: start..self.text.len(),
        });
    }
}

/// Builds the buffer for the sibling run around `start`.
///
/// Returns `None` if `start` is not a text node.
pub fn aggregate<D: Document>(doc: &D, start: D::Node) -> Option<TextBuffer<D::Node>> {
    if doc.unit_kind(start) != UnitKind::Text {
        return None;
    }

    let mut first = start;
    while let Some(prev) = doc.previous_sibling(first) {
        if is_unit(doc, prev) {
            first = prev;
        } else {
            break;
        }
    }

    let mut buffer = TextBuffer {
        text: String::new(),
        units: Vec::new(),
    };
    let mut current = Some(first);
    while let Some(node) = current {
        match doc.unit_kind(node) {
            UnitKind::Text => buffer.push(node, UnitKind::Text, doc.text(node).unwrap_or_default()),
            UnitKind::Break => buffer.push(node, UnitKind::Break, "\n"),
            UnitKind::Other => break,
        }
        current = doc.next_sibling(node);
    }
    Some(buffer)
}

fn is_unit<D: Document>(doc: &D, node: D::Node) -> bool {
    matches!(doc.unit_kind(node), UnitKind::Text | UnitKind::Break)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{ElementKind, Tree};

    fn paragraph(parts: &[Option<&str>]) -> (Tree, Vec<crate::document::NodeId>) {
        let mut tree = Tree::new();
        let para = tree.append_element(tree.root(), ElementKind::Paragraph).unwrap();
        let nodes = parts
            .iter()
            .map(|part| match part {
                Some(text) => tree.append_text(para, *text).unwrap(),
                None => tree.append_break(para).unwrap(),
            })
            .collect();
        (tree, nodes)
    }

    #[test]
    fn test_merges_adjacent_fragments() {
        let (tree, nodes) = paragraph(&[Some("$x^2"), Some("+y$ done")]);
        let buffer = aggregate(&tree, nodes[1]).unwrap();
        assert_eq!(buffer.as_str(), "$x^2+y$ done");
        assert_eq!(buffer.nodes().collect::<Vec<_>>(), nodes);
    }

    #[test]
    fn test_breaks_contribute_one_newline() {
        let (tree, nodes) = paragraph(&[Some(r"\["), None, Some("x"), None, Some(r"\]")]);
        let buffer = aggregate(&tree, nodes[2]).unwrap();
        assert_eq!(buffer.as_str(), "\\[\nx\n\\]");

        let total: usize = buffer.units().iter().map(|u| u.range.len()).sum();
        assert_eq!(total, buffer.len());
        assert!(buffer
            .units()
            .iter()
            .filter(|u| u.kind == UnitKind::Break)
            .all(|u| u.range.len() == 1));
    }

    #[test]
    fn test_trailing_backslash_is_kept() {
        let (tree, nodes) = paragraph(&[Some(r"a \\"), None, Some("b")]);
        let buffer = aggregate(&tree, nodes[0]).unwrap();
        assert_eq!(buffer.as_str(), "a \\\\\nb");
    }

    #[test]
    fn test_stops_at_other_siblings() {
        let mut tree = Tree::new();
        let para = tree.append_element(tree.root(), ElementKind::Paragraph).unwrap();
        let before = tree.append_text(para, "$a").unwrap();
        tree.append_element(para, ElementKind::Span).unwrap();
        let middle = tree.append_text(para, "b$").unwrap();
        let brk = tree.append_break(para).unwrap();
        let after = tree.append_text(para, "c").unwrap();
        tree.append_element(para, ElementKind::InlineCode).unwrap();
        tree.append_text(para, "d").unwrap();

        let buffer = aggregate(&tree, middle).unwrap();
        assert_eq!(buffer.as_str(), "b$\nc");
        assert_eq!(buffer.nodes().collect::<Vec<_>>(), vec![middle, brk, after]);

        let other = aggregate(&tree, before).unwrap();
        assert_eq!(other.as_str(), "$a");
    }

    #[test]
    fn test_unit_at_maps_offsets() {
        let (tree, nodes) = paragraph(&[Some("ab"), None, Some("cd")]);
        let buffer = aggregate(&tree, nodes[0]).unwrap();
        assert_eq!(buffer.unit_at(0).map(|u| u.node), Some(nodes[0]));
        assert_eq!(buffer.unit_at(1).map(|u| u.node), Some(nodes[0]));
        assert_eq!(buffer.unit_at(2).map(|u| u.node), Some(nodes[1]));
        assert_eq!(buffer.unit_at(3).map(|u| u.node), Some(nodes[2]));
        assert_eq!(buffer.unit_at(5), None);
    }

    #[test]
    fn test_non_text_start() {
        let (tree, nodes) = paragraph(&[Some("a"), None]);
        assert!(aggregate(&tree, nodes[1]).is_none());
    }
}
