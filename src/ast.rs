/// AST node types for GitHub-flavored Markdown documents
///
/// The tree lives in a single arena (`Document`) and nodes refer to each
/// other by `NodeId`. Structural edits only relink indices, so a node can be
/// reinterpreted in place (a paragraph becoming a table) without moving it.
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::extensions::Extension;

/// Index of a node inside its `Document`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListType {
    Bullet,
    Ordered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListDelimiter {
    Period,
    Paren,
}

/// Shared by `List` and `Item` nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListData {
    pub list_type: ListType,
    /// Columns of indentation before the marker.
    pub marker_offset: usize,
    /// Columns from the marker start to the item content.
    pub padding: usize,
    pub start: usize,
    pub delimiter: ListDelimiter,
    pub bullet_char: u8,
    pub tight: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeBlockData {
    pub fenced: bool,
    pub fence_char: u8,
    pub fence_length: usize,
    pub fence_offset: usize,
    pub info: String,
    pub literal: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HtmlBlockData {
    /// Start condition 1 through 7.
    pub block_type: u8,
    pub literal: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadingData {
    pub level: u8,
    pub setext: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkData {
    pub url: String,
    pub title: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Alignment {
    None,
    Left,
    Right,
    Center,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeValue {
    Document,
    // Block-level nodes
    BlockQuote,
    List(ListData),
    Item(ListData),
    CodeBlock(CodeBlockData),
    HtmlBlock(HtmlBlockData),
    Paragraph,
    Heading(HeadingData),
    ThematicBreak,
    // Table extension
    Table(Vec<Alignment>),
    TableRow { header: bool },
    TableCell,
    // Inline nodes
    Text(String),
    SoftBreak,
    LineBreak,
    Code(String),
    HtmlInline(String),
    Emphasis,
    Strong,
    Strikethrough,
    Link(LinkData),
    Image(LinkData),
    /// A link recognised by the autolink extension in plain text.
    Autolink(LinkData),
}

impl NodeValue {
    pub fn is_block(&self) -> bool {
        matches!(
            self,
            NodeValue::Document
                | NodeValue::BlockQuote
                | NodeValue::List(..)
                | NodeValue::Item(..)
                | NodeValue::CodeBlock(..)
                | NodeValue::HtmlBlock(..)
                | NodeValue::Paragraph
                | NodeValue::Heading(..)
                | NodeValue::ThematicBreak
                | NodeValue::Table(..)
                | NodeValue::TableRow { .. }
                | NodeValue::TableCell
        )
    }

    /// Short name of the node kind, for logs and tree dumps.
    pub fn kind(&self) -> &'static str {
        match self {
            NodeValue::Document => "document",
            NodeValue::BlockQuote => "block_quote",
            NodeValue::List(..) => "list",
            NodeValue::Item(..) => "item",
            NodeValue::CodeBlock(..) => "code_block",
            NodeValue::HtmlBlock(..) => "html_block",
            NodeValue::Paragraph => "paragraph",
            NodeValue::Heading(..) => "heading",
            NodeValue::ThematicBreak => "thematic_break",
            NodeValue::Table(..) => "table",
            NodeValue::TableRow { .. } => "table_row",
            NodeValue::TableCell => "table_cell",
            NodeValue::Text(..) => "text",
            NodeValue::SoftBreak => "softbreak",
            NodeValue::LineBreak => "linebreak",
            NodeValue::Code(..) => "code",
            NodeValue::HtmlInline(..) => "html_inline",
            NodeValue::Emphasis => "emph",
            NodeValue::Strong => "strong",
            NodeValue::Strikethrough => "strikethrough",
            NodeValue::Link(..) => "link",
            NodeValue::Image(..) => "image",
            NodeValue::Autolink(..) => "autolink",
        }
    }

    /// The extension that introduced this kind of node, if any.
    pub fn owner(&self) -> Option<Extension> {
        match self {
            NodeValue::Table(..) | NodeValue::TableRow { .. } | NodeValue::TableCell => {
                Some(Extension::Table)
            }
            NodeValue::Strikethrough => Some(Extension::Strikethrough),
            NodeValue::Autolink(..) => Some(Extension::Autolink),
            _ => None,
        }
    }

    /// Literal of a `Text` node.
    pub fn text(&self) -> Option<&str> {
        match self {
            NodeValue::Text(t) => Some(t),
            _ => None,
        }
    }

    pub(crate) fn text_mut(&mut self) -> Option<&mut String> {
        match self {
            NodeValue::Text(t) => Some(t),
            _ => None,
        }
    }

    pub(crate) fn accepts_lines(&self) -> bool {
        matches!(
            self,
            NodeValue::Paragraph
                | NodeValue::Heading(..)
                | NodeValue::CodeBlock(..)
                | NodeValue::HtmlBlock(..)
        )
    }

    pub(crate) fn contains_inlines(&self) -> bool {
        matches!(
            self,
            NodeValue::Paragraph | NodeValue::Heading(..) | NodeValue::TableCell
        )
    }

    pub(crate) fn can_contain(&self, child: &NodeValue) -> bool {
        if matches!(child, NodeValue::Document) {
            return false;
        }
        match self {
            NodeValue::Document | NodeValue::BlockQuote | NodeValue::Item(..) => {
                child.is_block()
                    && !matches!(
                        child,
                        NodeValue::Item(..) | NodeValue::TableRow { .. } | NodeValue::TableCell
                    )
            }
            NodeValue::List(..) => matches!(child, NodeValue::Item(..)),
            NodeValue::Table(..) => matches!(child, NodeValue::TableRow { .. }),
            NodeValue::TableRow { .. } => matches!(child, NodeValue::TableCell),
            NodeValue::Paragraph
            | NodeValue::Heading(..)
            | NodeValue::TableCell
            | NodeValue::Emphasis
            | NodeValue::Strong
            | NodeValue::Strikethrough
            | NodeValue::Link(..)
            | NodeValue::Image(..)
            | NodeValue::Autolink(..) => !child.is_block(),
            _ => false,
        }
    }
}

/// A node together with its tree links.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub value: NodeValue,
    parent: Option<NodeId>,
    first_child: Option<NodeId>,
    last_child: Option<NodeId>,
    prev: Option<NodeId>,
    next: Option<NodeId>,
    // Block parser bookkeeping, meaningless once parsing finishes.
    #[serde(skip)]
    pub(crate) open: bool,
    #[serde(skip)]
    pub(crate) last_line_blank: bool,
    #[serde(skip)]
    pub(crate) content: String,
    #[serde(skip)]
    pub(crate) start_line: usize,
}

impl Node {
    fn new(value: NodeValue) -> Self {
        Node {
            value,
            parent: None,
            first_child: None,
            last_child: None,
            prev: None,
            next: None,
            open: false,
            last_line_blank: false,
            content: String::new(),
            start_line: 0,
        }
    }
}

/// A parsed document: the node arena and its root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Document {
            nodes: vec![Node::new(NodeValue::Document)],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Number of nodes ever allocated, detached ones included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Allocates a detached node.
    pub fn alloc(&mut self, value: NodeValue) -> Result<NodeId, Error> {
        self.nodes.try_reserve(1)?;
        self.nodes.push(Node::new(value));
        Ok(NodeId(self.nodes.len() - 1))
    }

    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    pub fn value(&self, id: NodeId) -> &NodeValue {
        &self.nodes[id.0].value
    }

    pub fn value_mut(&mut self, id: NodeId) -> &mut NodeValue {
        &mut self.nodes[id.0].value
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].first_child
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].last_child
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].next
    }

    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].prev
    }

    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children {
            doc: self,
            next: self.first_child(id),
        }
    }

    /// Pre-order walk over `id` and everything below it.
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        Descendants {
            doc: self,
            start: id,
            next: Some(id),
        }
    }

    /// Unlinks `id` from its parent and siblings. Its own children stay.
    pub fn detach(&mut self, id: NodeId) {
        let (parent, prev, next) = {
            let node = &self.nodes[id.0];
            (node.parent, node.prev, node.next)
        };
        match prev {
            Some(p) => self.nodes[p.0].next = next,
            None => {
                if let Some(parent) = parent {
                    self.nodes[parent.0].first_child = next;
                }
            }
        }
        match next {
            Some(n) => self.nodes[n.0].prev = prev,
            None => {
                if let Some(parent) = parent {
                    self.nodes[parent.0].last_child = prev;
                }
            }
        }
        let node = &mut self.nodes[id.0];
        node.parent = None;
        node.prev = None;
        node.next = None;
    }

    /// Moves `child` to the end of `parent`'s children.
    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        let last = self.nodes[parent.0].last_child;
        {
            let node = &mut self.nodes[child.0];
            node.parent = Some(parent);
            node.prev = last;
        }
        match last {
            Some(l) => self.nodes[l.0].next = Some(child),
            None => self.nodes[parent.0].first_child = Some(child),
        }
        self.nodes[parent.0].last_child = Some(child);
    }

    /// Moves `new` right after `sibling`.
    pub fn insert_after(&mut self, sibling: NodeId, new: NodeId) {
        self.detach(new);
        let (parent, next) = {
            let s = &self.nodes[sibling.0];
            (s.parent, s.next)
        };
        {
            let node = &mut self.nodes[new.0];
            node.parent = parent;
            node.prev = Some(sibling);
            node.next = next;
        }
        self.nodes[sibling.0].next = Some(new);
        match next {
            Some(n) => self.nodes[n.0].prev = Some(new),
            None => {
                if let Some(parent) = parent {
                    self.nodes[parent.0].last_child = Some(new);
                }
            }
        }
    }

    /// Moves `new` right before `sibling`.
    pub fn insert_before(&mut self, sibling: NodeId, new: NodeId) {
        self.detach(new);
        let (parent, prev) = {
            let s = &self.nodes[sibling.0];
            (s.parent, s.prev)
        };
        {
            let node = &mut self.nodes[new.0];
            node.parent = parent;
            node.prev = prev;
            node.next = Some(sibling);
        }
        self.nodes[sibling.0].prev = Some(new);
        match prev {
            Some(p) => self.nodes[p.0].next = Some(new),
            None => {
                if let Some(parent) = parent {
                    self.nodes[parent.0].first_child = Some(new);
                }
            }
        }
    }

    /// Concatenated literal text below `id`, breaks folded to spaces.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        for node in self.descendants(id) {
            match self.value(node) {
                NodeValue::Text(t) | NodeValue::Code(t) | NodeValue::HtmlInline(t) => {
                    out.push_str(t)
                }
                NodeValue::SoftBreak | NodeValue::LineBreak => out.push(' '),
                NodeValue::CodeBlock(cb) => out.push_str(&cb.literal),
                NodeValue::HtmlBlock(hb) => out.push_str(&hb.literal),
                _ => {}
            }
        }
        out
    }

    /// Checks the link structure reachable from the root: consistent
    /// parent, sibling and first/last pointers, no node reached twice.
    pub fn is_well_formed(&self) -> bool {
        if self.root.0 >= self.nodes.len() || self.nodes[self.root.0].parent.is_some() {
            return false;
        }
        let mut seen = vec![false; self.nodes.len()];
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            if seen[id.0] {
                return false;
            }
            seen[id.0] = true;
            let node = &self.nodes[id.0];
            let mut prev: Option<NodeId> = None;
            let mut cursor = node.first_child;
            let mut steps = 0;
            while let Some(child) = cursor {
                steps += 1;
                if child.0 >= self.nodes.len() || steps > self.nodes.len() {
                    return false;
                }
                let c = &self.nodes[child.0];
                if c.parent != Some(id) || c.prev != prev || seen[child.0] {
                    return false;
                }
                stack.push(child);
                prev = Some(child);
                cursor = c.next;
            }
            if node.last_child != prev {
                return false;
            }
        }
        true
    }
}

pub struct Children<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.doc.next_sibling(current);
        Some(current)
    }
}

pub struct Descendants<'a> {
    doc: &'a Document,
    start: NodeId,
    next: Option<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = if let Some(child) = self.doc.first_child(current) {
            Some(child)
        } else {
            let mut node = current;
            loop {
                if node == self.start {
                    break None;
                }
                if let Some(sibling) = self.doc.next_sibling(node) {
                    break Some(sibling);
                }
                match self.doc.parent(node) {
                    Some(parent) => node = parent,
                    None => break None,
                }
            }
        };
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(doc: &mut Document, s: &str) -> NodeId {
        doc.alloc(NodeValue::Text(s.to_string())).unwrap()
    }

    #[test]
    fn append_links_siblings_in_order() {
        let mut doc = Document::new();
        let root = doc.root();
        let para = doc.alloc(NodeValue::Paragraph).unwrap();
        doc.append(root, para);
        let a = text(&mut doc, "a");
        let b = text(&mut doc, "b");
        doc.append(para, a);
        doc.append(para, b);
        assert_eq!(doc.children(para).collect::<Vec<_>>(), vec![a, b]);
        assert_eq!(doc.previous_sibling(b), Some(a));
        assert_eq!(doc.parent(b), Some(para));
        assert!(doc.is_well_formed());
    }

    #[test]
    fn insert_before_and_after_relink_neighbours() {
        let mut doc = Document::new();
        let root = doc.root();
        let a = text(&mut doc, "a");
        let c = text(&mut doc, "c");
        doc.append(root, a);
        doc.append(root, c);
        let b = text(&mut doc, "b");
        doc.insert_after(a, b);
        let z = text(&mut doc, "z");
        doc.insert_before(a, z);
        assert_eq!(doc.children(root).collect::<Vec<_>>(), vec![z, a, b, c]);
        assert_eq!(doc.first_child(root), Some(z));
        assert_eq!(doc.last_child(root), Some(c));
        assert!(doc.is_well_formed());
    }

    #[test]
    fn detach_removes_node_but_keeps_its_subtree() {
        let mut doc = Document::new();
        let root = doc.root();
        let emph = doc.alloc(NodeValue::Emphasis).unwrap();
        let inner = text(&mut doc, "x");
        let after = text(&mut doc, "y");
        doc.append(root, emph);
        doc.append(emph, inner);
        doc.append(root, after);
        doc.detach(emph);
        assert_eq!(doc.children(root).collect::<Vec<_>>(), vec![after]);
        assert_eq!(doc.parent(inner), Some(emph));
        assert!(doc.is_well_formed());
    }

    #[test]
    fn moving_a_node_between_parents_keeps_tree_well_formed() {
        let mut doc = Document::new();
        let root = doc.root();
        let first = doc.alloc(NodeValue::Paragraph).unwrap();
        let second = doc.alloc(NodeValue::Paragraph).unwrap();
        doc.append(root, first);
        doc.append(root, second);
        let t = text(&mut doc, "moved");
        doc.append(first, t);
        doc.append(second, t);
        assert_eq!(doc.first_child(first), None);
        assert_eq!(doc.first_child(second), Some(t));
        assert!(doc.is_well_formed());
    }

    #[test]
    fn broken_links_are_detected() {
        let mut doc = Document::new();
        let root = doc.root();
        let a = text(&mut doc, "a");
        doc.append(root, a);
        doc.nodes[a.0].parent = None;
        assert!(!doc.is_well_formed());
    }

    #[test]
    fn descendants_walk_in_document_order() {
        let mut doc = Document::new();
        let root = doc.root();
        let para = doc.alloc(NodeValue::Paragraph).unwrap();
        let strong = doc.alloc(NodeValue::Strong).unwrap();
        let a = text(&mut doc, "a");
        let b = text(&mut doc, "b");
        doc.append(root, para);
        doc.append(para, strong);
        doc.append(strong, a);
        doc.append(para, b);
        assert_eq!(
            doc.descendants(root).collect::<Vec<_>>(),
            vec![root, para, strong, a, b]
        );
        assert_eq!(doc.descendants(strong).collect::<Vec<_>>(), vec![strong, a]);
        assert_eq!(doc.text_content(para), "ab");
    }

    #[test]
    fn extension_kinds_report_their_owner() {
        assert_eq!(NodeValue::TableCell.owner(), Some(Extension::Table));
        assert_eq!(NodeValue::Strikethrough.owner(), Some(Extension::Strikethrough));
        assert_eq!(NodeValue::Paragraph.owner(), None);
    }

    #[test]
    fn containment_rules() {
        let item = NodeValue::Item(ListData {
            list_type: ListType::Bullet,
            marker_offset: 0,
            padding: 2,
            start: 1,
            delimiter: ListDelimiter::Period,
            bullet_char: b'-',
            tight: true,
        });
        assert!(!NodeValue::Document.can_contain(&item));
        assert!(NodeValue::Document.can_contain(&NodeValue::Table(vec![])));
        assert!(!NodeValue::Document.can_contain(&NodeValue::TableRow { header: false }));
        assert!(NodeValue::TableCell.can_contain(&NodeValue::Emphasis));
        assert!(!NodeValue::Paragraph.can_contain(&NodeValue::Paragraph));
    }
}
