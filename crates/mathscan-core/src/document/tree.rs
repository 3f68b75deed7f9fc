use super::{Document, NewNode, RenderedMath, UnitKind};
use crate::error::DocumentError;
use crate::render::escape_html;

/// Handle to a node in a [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Root,
    Paragraph,
    /// A fenced code block. Verbatim.
    CodeBlock,
    /// A backtick code span. Verbatim.
    InlineCode,
    /// A generic inline container.
    Span,
}

impl ElementKind {
    pub fn is_verbatim(self) -> bool {
        matches!(self, ElementKind::CodeBlock | ElementKind::InlineCode)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NodeData {
    Element(ElementKind),
    Text(String),
    Break,
    Math(RenderedMath),
}

#[derive(Debug, Clone)]
struct Slot {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    processed: bool,
}

/// An arena-backed document tree.
///
/// Removed nodes stay in the arena (handles never dangle) but are detached
/// from their parent, so [`Document::is_attached`] reports them as gone.
///
/// ```
/// use mathscan_core::document::{Document, Tree, UnitKind};
///
/// let tree = Tree::from_text("first line\nsecond line\n\n```\n$code$\n```");
/// let texts = tree.discover(tree.root());
///
/// // The code block is verbatim and never discovered.
/// assert_eq!(texts.len(), 2);
/// assert_eq!(tree.next_sibling(texts[0]).map(|n| tree.unit_kind(n)), Some(UnitKind::Break));
/// ```
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Slot>,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    /// Creates a tree holding only the root element.
    pub fn new() -> Self {
        Self {
            nodes: vec![Slot {
                data: NodeData::Element(ElementKind::Root),
                parent: None,
                children: Vec::new(),
                processed: false,
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Builds a tree from plain text.
    ///
    /// Blank lines separate paragraphs, lines inside a paragraph become text
    /// nodes separated by breaks, fenced blocks (```` ``` ````) and backtick
    /// spans become verbatim elements.
    pub fn from_text(text: &str) -> Self {
        let mut tree = Tree::new();
        let root = tree.root();
        let mut paragraph: Option<NodeId> = None;
        let mut fence: Option<Vec<&str>> = None;

        for line in text.lines() {
            let is_fence = line.trim_start().starts_with("```");
            if let Some(lines) = fence.as_mut() {
                if is_fence {
                    let code = tree.push(root, NodeData::Element(ElementKind::CodeBlock));
                    tree.push(code, NodeData::Text(lines.join("\n")));
                    fence = None;
                } else {
                    lines.push(line);
                }
                continue;
            }
            if is_fence {
                paragraph = None;
                fence = Some(Vec::new());
                continue;
            }
            if line.trim().is_empty() {
                paragraph = None;
                continue;
            }

            let para = match paragraph {
                Some(para) => {
                    tree.push(para, NodeData::Break);
                    para
                }
                None => {
                    let para = tree.push(root, NodeData::Element(ElementKind::Paragraph));
                    paragraph = Some(para);
                    para
                }
            };
            tree.push_inline(para, line);
        }

        // An unterminated fence runs to the end of the input.
        if let Some(lines) = fence {
            let code = tree.push(root, NodeData::Element(ElementKind::CodeBlock));
            tree.push(code, NodeData::Text(lines.join("\n")));
        }
        tree
    }

    /// Splits a line on backtick code spans.
    fn push_inline(&mut self, parent: NodeId, line: &str) {
        let mut rest = line;
        while let Some(open) = rest.find('`') {
            let after = &rest[open + 1..];
            let Some(close) = after.find('`') else {
                break;
            };
            if open > 0 {
                self.push(parent, NodeData::Text(rest[..open].to_string()));
            }
            let code = self.push(parent, NodeData::Element(ElementKind::InlineCode));
            self.push(code, NodeData::Text(after[..close].to_string()));
            rest = &after[close + 1..];
        }
        if !rest.is_empty() {
            self.push(parent, NodeData::Text(rest.to_string()));
        }
    }

    /// Appends without checks; `parent` must be a live element.
    fn push(&mut self, parent: NodeId, data: NodeData) -> NodeId {
        let id = self.alloc(data, Some(parent));
        self.nodes[parent.0].children.push(id);
        id
    }

    fn alloc(&mut self, data: NodeData, parent: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Slot {
            data,
            parent,
            children: Vec::new(),
            processed: false,
        });
        id
    }

    fn slot(&self, node: NodeId) -> Option<&Slot> {
        self.nodes.get(node.0)
    }

    fn element(&self, node: NodeId) -> Result<ElementKind, DocumentError> {
        match self.slot(node).map(|s| &s.data) {
            Some(NodeData::Element(kind)) => Ok(*kind),
            Some(_) => Err(DocumentError::NotAContainer(format!("{:?}", node))),
            None => Err(DocumentError::missing(node)),
        }
    }

    pub fn append_element(
        &mut self,
        parent: NodeId,
        kind: ElementKind,
    ) -> Result<NodeId, DocumentError> {
        self.element(parent)?;
        Ok(self.push(parent, NodeData::Element(kind)))
    }

    pub fn append_text(
        &mut self,
        parent: NodeId,
        text: impl Into<String>,
    ) -> Result<NodeId, DocumentError> {
        self.element(parent)?;
        Ok(self.push(parent, NodeData::Text(text.into())))
    }

    pub fn append_break(&mut self, parent: NodeId) -> Result<NodeId, DocumentError> {
        self.element(parent)?;
        Ok(self.push(parent, NodeData::Break))
    }

    /// Replaces the content of a text node.
    pub fn set_text(&mut self, node: NodeId, text: impl Into<String>) -> Result<(), DocumentError> {
        match self.nodes.get_mut(node.0).map(|s| &mut s.data) {
            Some(NodeData::Text(content)) => {
                *content = text.into();
                Ok(())
            }
            Some(_) => Err(DocumentError::NotAContainer(format!("{:?}", node))),
            None => Err(DocumentError::missing(node)),
        }
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.slot(node)?.parent
    }

    pub fn element_kind(&self, node: NodeId) -> Option<ElementKind> {
        match self.slot(node)?.data {
            NodeData::Element(kind) => Some(kind),
            _ => None,
        }
    }

    /// The rendered expression held by a math node.
    pub fn math(&self, node: NodeId) -> Option<&RenderedMath> {
        match &self.slot(node)?.data {
            NodeData::Math(math) => Some(math),
            _ => None,
        }
    }

    /// All attached math nodes under `root`, in document order.
    pub fn math_nodes(&self, root: NodeId) -> Vec<NodeId> {
        let mut found = Vec::new();
        self.walk(root, &mut |id| {
            if self.math(id).is_some() {
                found.push(id);
            }
        });
        found
    }

    fn walk(&self, node: NodeId, visit: &mut impl FnMut(NodeId)) {
        visit(node);
        if let Some(slot) = self.slot(node) {
            for &child in &slot.children {
                self.walk(child, visit);
            }
        }
    }

    /// The text a reader would see: breaks as `\n`, math as written.
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.walk(node, &mut |id| match &self.nodes[id.0].data {
            NodeData::Text(text) => out.push_str(text),
            NodeData::Break => out.push('\n'),
            NodeData::Math(math) => out.push_str(&math.raw),
            NodeData::Element(_) => {}
        });
        out
    }

    /// Serializes the attached tree as an HTML fragment.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(self.root(), &mut out);
        out
    }

    fn write_children(&self, node: NodeId, out: &mut String) {
        for &child in &self.nodes[node.0].children {
            self.write_html(child, out);
        }
    }

    fn write_html(&self, node: NodeId, out: &mut String) {
        match &self.nodes[node.0].data {
            NodeData::Element(ElementKind::Root) => self.write_children(node, out),
            NodeData::Element(ElementKind::Paragraph) => {
                out.push_str("<p>");
                self.write_children(node, out);
                out.push_str("</p>\n");
            }
            NodeData::Element(ElementKind::CodeBlock) => {
                out.push_str("<pre><code>");
                out.push_str(&escape_html(&self.text_content(node)));
                out.push_str("</code></pre>\n");
            }
            NodeData::Element(ElementKind::InlineCode) => {
                out.push_str("<code>");
                out.push_str(&escape_html(&self.text_content(node)));
                out.push_str("</code>");
            }
            NodeData::Element(ElementKind::Span) => {
                out.push_str("<span>");
                self.write_children(node, out);
                out.push_str("</span>");
            }
            NodeData::Text(text) => out.push_str(&escape_html(text)),
            NodeData::Break => out.push_str("<br>"),
            NodeData::Math(math) => match &math.markup {
                Some(markup) => {
                    out.push_str(r#"<span class="math-container math-processed""#);
                    if math.display {
                        out.push_str(r#" data-display="block""#);
                    }
                    out.push('>');
                    out.push_str(markup);
                    out.push_str("</span>");
                }
                None => {
                    out.push_str(r#"<span class="math-processed">"#);
                    out.push_str(&escape_html(&math.raw));
                    out.push_str("</span>");
                }
            },
        }
    }

    /// Parent and position of an attached node.
    fn position(&self, node: NodeId) -> Option<(NodeId, usize)> {
        let parent = self.parent(node)?;
        let index = self.nodes[parent.0]
            .children
            .iter()
            .position(|&c| c == node)?;
        Some((parent, index))
    }
}

impl Document for Tree {
    type Node = NodeId;

    fn root(&self) -> NodeId {
        Tree::root(self)
    }

    fn is_attached(&self, node: NodeId) -> bool {
        let mut current = node;
        loop {
            if current == self.root() {
                return true;
            }
            match self.parent(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    fn unit_kind(&self, node: NodeId) -> UnitKind {
        match self.slot(node).map(|s| &s.data) {
            Some(NodeData::Text(_)) => UnitKind::Text,
            Some(NodeData::Break) => UnitKind::Break,
            _ => UnitKind::Other,
        }
    }

    fn text(&self, node: NodeId) -> Option<&str> {
        match &self.slot(node)?.data {
            NodeData::Text(text) => Some(text),
            _ => None,
        }
    }

    fn previous_sibling(&self, node: NodeId) -> Option<NodeId> {
        let (parent, index) = self.position(node)?;
        index
            .checked_sub(1)
            .map(|i| self.nodes[parent.0].children[i])
    }

    fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        let (parent, index) = self.position(node)?;
        self.nodes[parent.0].children.get(index + 1).copied()
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.slot(node).map(|s| s.children.clone()).unwrap_or_default()
    }

    fn insert_before(&mut self, reference: NodeId, new: NewNode) -> Result<NodeId, DocumentError> {
        if !self.is_attached(reference) {
            return Err(DocumentError::detached(reference));
        }
        let (parent, index) = self
            .position(reference)
            .ok_or_else(|| DocumentError::detached(reference))?;
        let data = match new {
            NewNode::Text(text) => NodeData::Text(text),
            NewNode::Break => NodeData::Break,
            NewNode::Math(math) => NodeData::Math(math),
        };
        let id = self.alloc(data, Some(parent));
        self.nodes[parent.0].children.insert(index, id);
        Ok(id)
    }

    fn remove(&mut self, node: NodeId) -> Result<(), DocumentError> {
        if self.slot(node).is_none() {
            return Err(DocumentError::missing(node));
        }
        let (parent, index) = self
            .position(node)
            .ok_or_else(|| DocumentError::detached(node))?;
        self.nodes[parent.0].children.remove(index);
        self.nodes[node.0].parent = None;
        Ok(())
    }

    fn mark_processed(&mut self, node: NodeId) -> Result<(), DocumentError> {
        let slot = self
            .nodes
            .get_mut(node.0)
            .ok_or_else(|| DocumentError::missing(node))?;
        slot.processed = true;
        Ok(())
    }

    fn is_processed(&self, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            match self.slot(id) {
                Some(slot) if slot.processed => return true,
                Some(slot) => current = slot.parent,
                None => return false,
            }
        }
        false
    }

    fn is_verbatim(&self, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if self.element_kind(id).is_some_and(ElementKind::is_verbatim) {
                return true;
            }
            current = self.parent(id);
        }
        false
    }
}
