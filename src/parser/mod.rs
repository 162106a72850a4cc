//! Block-level parsing: lines in, a tree of blocks out
//!
//! The parser keeps the chain of open blocks from the root down to the
//! innermost open container. Each line first walks that chain to see which
//! blocks it continues, then opens any new blocks it starts, and finally adds
//! its remaining text to the innermost block that accepts lines. Inline
//! content is parsed once all blocks are closed.

pub mod inlines;

use std::borrow::Cow;
use std::collections::HashMap;

use tracing::trace;

use crate::ast::{
    CodeBlockData, Document, HeadingData, HtmlBlockData, ListData, ListDelimiter, ListType,
    NodeId, NodeValue,
};
use crate::entity;
use crate::error::Error;
use crate::extensions::Extension;
use crate::options::Options;
use crate::scanners;
use crate::strings::{self, is_line_end, is_space_or_tab};

pub(crate) const TAB_STOP: usize = 4;
pub(crate) const CODE_INDENT: usize = 4;
const MAX_LIST_DEPTH: usize = 100;

/// How a line relates to an open code block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Continuation {
    Matched,
    Unmatched,
    /// The line was the closing fence and nothing is left of it.
    Consumed,
}

/// Target of a link reference definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Reference {
    pub url: String,
    pub title: String,
}

/// Normalized label to definition. The first definition of a label wins.
#[derive(Debug, Default)]
pub(crate) struct RefMap {
    map: HashMap<String, Reference>,
}

impl RefMap {
    pub(crate) fn insert(&mut self, label: &str, reference: Reference) {
        let key = strings::normalize_label(label);
        if key.is_empty() {
            return;
        }
        self.map.entry(key).or_insert(reference);
    }

    pub(crate) fn lookup(&self, label: &str) -> Option<&Reference> {
        let key = strings::normalize_label(label);
        if key.is_empty() {
            return None;
        }
        self.map.get(&key)
    }
}

pub(crate) struct BlockParser<'e> {
    pub(crate) doc: Document,
    pub(crate) options: Options,
    extensions: &'e [Extension],
    pub(crate) refmap: RefMap,
    root: NodeId,
    current: NodeId,
    line_number: usize,
    pub(crate) offset: usize,
    column: usize,
    pub(crate) first_nonspace: usize,
    first_nonspace_column: usize,
    indent: usize,
    pub(crate) blank: bool,
    partially_consumed_tab: bool,
}

impl<'e> BlockParser<'e> {
    pub(crate) fn new(options: Options, extensions: &'e [Extension]) -> Self {
        let mut doc = Document::new();
        let root = doc.root();
        doc.get_mut(root).open = true;
        BlockParser {
            doc,
            options,
            extensions,
            refmap: RefMap::default(),
            root,
            current: root,
            line_number: 0,
            offset: 0,
            column: 0,
            first_nonspace: 0,
            first_nonspace_column: 0,
            indent: 0,
            blank: false,
            partially_consumed_tab: false,
        }
    }

    /// Splits `input` into lines and runs each through the block parser.
    /// Invalid UTF-8 and NUL bytes become U+FFFD.
    pub(crate) fn feed(&mut self, input: &[u8]) -> Result<(), Error> {
        let text = String::from_utf8_lossy(input);
        let text: Cow<'_, str> = if text.contains('\0') {
            Cow::Owned(text.replace('\0', "\u{FFFD}"))
        } else {
            text
        };

        let bytes = text.as_bytes();
        let mut line = String::new();
        let mut start = 0;
        while start < bytes.len() {
            let mut end = start;
            while end < bytes.len() && !is_line_end(bytes[end]) {
                end += 1;
            }
            let content_end = end;
            if end < bytes.len() {
                end += if bytes[end] == b'\r' && bytes.get(end + 1) == Some(&b'\n') {
                    2
                } else {
                    1
                };
            }

            line.clear();
            line.try_reserve(content_end - start + 1)?;
            line.push_str(&text[start..content_end]);
            line.push('\n');
            self.process_line(&line)?;
            start = end;
        }
        Ok(())
    }

    /// Closes every open block, parses inline content and runs extension
    /// post-processing.
    pub(crate) fn finish(mut self) -> Result<Document, Error> {
        self.finalize_document();
        self.process_inlines()?;
        for &ext in self.extensions {
            ext.postprocess(&mut self.doc)?;
        }
        Ok(self.doc)
    }

    fn process_line(&mut self, line: &str) -> Result<(), Error> {
        self.offset = 0;
        self.column = 0;
        self.first_nonspace = 0;
        self.first_nonspace_column = 0;
        self.indent = 0;
        self.blank = false;
        self.partially_consumed_tab = false;

        if self.line_number == 0 && line.starts_with('\u{feff}') {
            self.offset += '\u{feff}'.len_utf8();
        }
        self.line_number += 1;

        let Some((last_matched_container, all_matched)) = self.check_open_blocks(line) else {
            return Ok(());
        };

        let mut container = last_matched_container;
        let current = self.current;
        self.open_new_blocks(&mut container, line, all_matched)?;

        if current == self.current {
            self.add_text_to_container(container, last_matched_container, line)?;
        }
        Ok(())
    }

    /// Walks the open blocks and returns the deepest one `line` continues,
    /// plus whether every open block matched. `None` means the line was
    /// consumed entirely (a closing code fence).
    fn check_open_blocks(&mut self, line: &str) -> Option<(NodeId, bool)> {
        let mut all_matched = false;
        let mut container = self.root;

        loop {
            let Some(last) = self.doc.last_child(container) else {
                all_matched = true;
                break;
            };
            if !self.doc.get(last).open {
                all_matched = true;
                break;
            }
            container = last;
            self.find_first_nonspace(line);

            let matched = match self.doc.value(container).clone() {
                NodeValue::BlockQuote => self.parse_block_quote_prefix(line),
                NodeValue::Item(ref data) => self.parse_item_prefix(line, container, data),
                NodeValue::CodeBlock(ref data) => {
                    match self.parse_code_block_prefix(line, container, data) {
                        Continuation::Matched => true,
                        Continuation::Unmatched => false,
                        Continuation::Consumed => return None,
                    }
                }
                NodeValue::HtmlBlock(ref data) => match data.block_type {
                    1..=5 => true,
                    _ => !self.blank,
                },
                NodeValue::Paragraph => !self.blank,
                NodeValue::Heading(..) | NodeValue::TableRow { .. } | NodeValue::TableCell => false,
                ref value => match value.owner() {
                    Some(ext) => ext.continues_block(self, container, line),
                    None => true,
                },
            };

            if !matched {
                break;
            }
        }

        if !all_matched {
            container = self.doc.parent(container).unwrap_or(self.root);
        }
        Some((container, all_matched))
    }

    fn open_new_blocks(
        &mut self,
        container: &mut NodeId,
        line: &str,
        all_matched: bool,
    ) -> Result<(), Error> {
        let mut maybe_lazy = matches!(self.doc.value(self.current), NodeValue::Paragraph);
        let mut depth = 0;

        while !matches!(
            self.doc.value(*container),
            NodeValue::CodeBlock(..) | NodeValue::HtmlBlock(..)
        ) {
            depth += 1;
            self.find_first_nonspace(line);
            let indented = self.indent >= CODE_INDENT;

            let opened = if !indented && self.handle_blockquote(container, line)? {
                true
            } else if !indented && self.handle_atx_heading(container, line)? {
                true
            } else if !indented && self.handle_code_fence(container, line)? {
                true
            } else if !indented && self.handle_html_block(container, line)? {
                true
            } else if !indented && self.handle_setext_heading(container, line) {
                true
            } else if !indented && self.handle_thematic_break(container, line, all_matched)? {
                true
            } else if self.handle_list_item(container, line, indented, depth)? {
                true
            } else if indented && !maybe_lazy && !self.blank {
                self.advance_offset(line, CODE_INDENT, true);
                let code = NodeValue::CodeBlock(CodeBlockData {
                    fenced: false,
                    fence_char: 0,
                    fence_length: 0,
                    fence_offset: 0,
                    info: String::new(),
                    literal: String::new(),
                });
                *container = self.add_child(*container, code)?;
                true
            } else {
                self.handle_extension_blocks(container, line, indented)?
            };

            if !opened {
                break;
            }
            if self.doc.value(*container).accepts_lines() {
                break;
            }
            maybe_lazy = false;
        }
        Ok(())
    }

    fn handle_blockquote(&mut self, container: &mut NodeId, line: &str) -> Result<bool, Error> {
        if peek_at(line, self.first_nonspace) != b'>' {
            return Ok(false);
        }
        let count = self.first_nonspace + 1 - self.offset;
        self.advance_offset(line, count, false);
        if is_space_or_tab(peek_at(line, self.offset)) {
            self.advance_offset(line, 1, true);
        }
        *container = self.add_child(*container, NodeValue::BlockQuote)?;
        Ok(true)
    }

    fn handle_atx_heading(&mut self, container: &mut NodeId, line: &str) -> Result<bool, Error> {
        let rest = &line.as_bytes()[self.first_nonspace..];
        let Some(matched) = scanners::atx_heading_start(rest) else {
            return Ok(false);
        };
        let level = rest.iter().take_while(|&&b| b == b'#').count() as u8;
        let count = self.first_nonspace + matched - self.offset;
        self.advance_offset(line, count, false);
        let heading = NodeValue::Heading(HeadingData {
            level,
            setext: false,
        });
        *container = self.add_child(*container, heading)?;
        Ok(true)
    }

    fn handle_code_fence(&mut self, container: &mut NodeId, line: &str) -> Result<bool, Error> {
        let rest = &line.as_bytes()[self.first_nonspace..];
        let Some(fence_length) = scanners::open_code_fence(rest) else {
            return Ok(false);
        };
        let code = NodeValue::CodeBlock(CodeBlockData {
            fenced: true,
            fence_char: rest[0],
            fence_length,
            fence_offset: self.first_nonspace - self.offset,
            info: String::new(),
            literal: String::new(),
        });
        *container = self.add_child(*container, code)?;
        let count = self.first_nonspace + fence_length - self.offset;
        self.advance_offset(line, count, false);
        Ok(true)
    }

    fn handle_html_block(&mut self, container: &mut NodeId, line: &str) -> Result<bool, Error> {
        let rest = &line.as_bytes()[self.first_nonspace..];
        let block_type = scanners::html_block_start(rest).or_else(|| {
            if matches!(self.doc.value(*container), NodeValue::Paragraph) {
                None
            } else {
                scanners::html_block_start_7(rest)
            }
        });
        let Some(block_type) = block_type else {
            return Ok(false);
        };
        let html = NodeValue::HtmlBlock(HtmlBlockData {
            block_type,
            literal: String::new(),
        });
        *container = self.add_child(*container, html)?;
        Ok(true)
    }

    fn handle_setext_heading(&mut self, container: &mut NodeId, line: &str) -> bool {
        if !matches!(self.doc.value(*container), NodeValue::Paragraph) {
            return false;
        }
        let Some(level) = scanners::setext_heading_line(&line.as_bytes()[self.first_nonspace..])
        else {
            return false;
        };
        if self.resolve_reference_definitions(*container) {
            *self.doc.value_mut(*container) = NodeValue::Heading(HeadingData { level, setext: true });
            let count = line.len() - 1 - self.offset;
            self.advance_offset(line, count, false);
        }
        true
    }

    fn handle_thematic_break(
        &mut self,
        container: &mut NodeId,
        line: &str,
        all_matched: bool,
    ) -> Result<bool, Error> {
        if matches!(self.doc.value(*container), NodeValue::Paragraph) && !all_matched {
            return Ok(false);
        }
        if !scanners::thematic_break(&line.as_bytes()[self.first_nonspace..]) {
            return Ok(false);
        }
        *container = self.add_child(*container, NodeValue::ThematicBreak)?;
        let count = line.len() - 1 - self.offset;
        self.advance_offset(line, count, false);
        Ok(true)
    }

    fn handle_list_item(
        &mut self,
        container: &mut NodeId,
        line: &str,
        indented: bool,
        depth: usize,
    ) -> Result<bool, Error> {
        let in_list = matches!(self.doc.value(*container), NodeValue::List(..));
        if (indented && !in_list) || self.indent >= CODE_INDENT || depth >= MAX_LIST_DEPTH {
            return Ok(false);
        }
        let interrupts_paragraph = matches!(self.doc.value(*container), NodeValue::Paragraph);
        let Some((matched, mut data)) =
            parse_list_marker(line, self.first_nonspace, interrupts_paragraph)
        else {
            return Ok(false);
        };

        let count = self.first_nonspace + matched - self.offset;
        self.advance_offset(line, count, false);

        let save_partially_consumed_tab = self.partially_consumed_tab;
        let save_offset = self.offset;
        let save_column = self.column;

        while self.column - save_column <= 5 && is_space_or_tab(peek_at(line, self.offset)) {
            self.advance_offset(line, 1, true);
        }

        let spaces = self.column - save_column;
        if !(1..5).contains(&spaces) || is_line_end(peek_at(line, self.offset)) {
            data.padding = matched + 1;
            self.offset = save_offset;
            self.column = save_column;
            self.partially_consumed_tab = save_partially_consumed_tab;
            if spaces > 0 {
                self.advance_offset(line, 1, true);
            }
        } else {
            data.padding = matched + spaces;
        }

        data.marker_offset = self.indent;

        let same_list = match self.doc.value(*container) {
            NodeValue::List(existing) => lists_match(&data, existing),
            _ => false,
        };
        if !same_list {
            *container = self.add_child(*container, NodeValue::List(data))?;
        }
        *container = self.add_child(*container, NodeValue::Item(data))?;
        Ok(true)
    }

    fn handle_extension_blocks(
        &mut self,
        container: &mut NodeId,
        line: &str,
        indented: bool,
    ) -> Result<bool, Error> {
        for &ext in self.extensions {
            if let Some(new_container) = ext.try_open_block(self, *container, line, indented)? {
                *container = new_container;
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub(crate) fn find_first_nonspace(&mut self, line: &str) {
        let bytes = line.as_bytes();
        let mut chars_to_tab = TAB_STOP - (self.column % TAB_STOP);

        if self.first_nonspace <= self.offset {
            self.first_nonspace = self.offset;
            self.first_nonspace_column = self.column;

            loop {
                match bytes.get(self.first_nonspace) {
                    Some(b' ') => {
                        self.first_nonspace += 1;
                        self.first_nonspace_column += 1;
                        chars_to_tab -= 1;
                        if chars_to_tab == 0 {
                            chars_to_tab = TAB_STOP;
                        }
                    }
                    Some(b'\t') => {
                        self.first_nonspace += 1;
                        self.first_nonspace_column += chars_to_tab;
                        chars_to_tab = TAB_STOP;
                    }
                    _ => break,
                }
            }
        }

        self.indent = self.first_nonspace_column - self.column;
        self.blank = bytes
            .get(self.first_nonspace)
            .is_some_and(|&b| is_line_end(b));
    }

    /// Moves `offset` forward by `count` bytes, or by `count` columns when
    /// `columns` is set, splitting tabs as needed.
    pub(crate) fn advance_offset(&mut self, line: &str, mut count: usize, columns: bool) {
        let bytes = line.as_bytes();
        while count > 0 {
            match bytes.get(self.offset) {
                Some(b'\t') => {
                    let chars_to_tab = TAB_STOP - (self.column % TAB_STOP);
                    if columns {
                        self.partially_consumed_tab = chars_to_tab > count;
                        let chars_to_advance = chars_to_tab.min(count);
                        self.column += chars_to_advance;
                        if !self.partially_consumed_tab {
                            self.offset += 1;
                        }
                        count -= chars_to_advance;
                    } else {
                        self.partially_consumed_tab = false;
                        self.column += chars_to_tab;
                        self.offset += 1;
                        count -= 1;
                    }
                }
                Some(_) => {
                    self.partially_consumed_tab = false;
                    self.offset += 1;
                    self.column += 1;
                    count -= 1;
                }
                None => break,
            }
        }
    }

    /// Skips the rest of the line except its line ending.
    pub(crate) fn advance_to_line_end(&mut self, line: &str) {
        let count = line.len().saturating_sub(1 + self.offset);
        self.advance_offset(line, count, false);
    }

    fn parse_block_quote_prefix(&mut self, line: &str) -> bool {
        if self.indent <= 3 && peek_at(line, self.first_nonspace) == b'>' {
            self.advance_offset(line, self.indent + 1, true);
            if is_space_or_tab(peek_at(line, self.offset)) {
                self.advance_offset(line, 1, true);
            }
            return true;
        }
        false
    }

    fn parse_item_prefix(&mut self, line: &str, container: NodeId, data: &ListData) -> bool {
        if self.indent >= data.marker_offset + data.padding {
            self.advance_offset(line, data.marker_offset + data.padding, true);
            true
        } else if self.blank && self.doc.first_child(container).is_some() {
            let count = self.first_nonspace - self.offset;
            self.advance_offset(line, count, false);
            true
        } else {
            false
        }
    }

    fn parse_code_block_prefix(
        &mut self,
        line: &str,
        container: NodeId,
        data: &CodeBlockData,
    ) -> Continuation {
        if !data.fenced {
            if self.indent >= CODE_INDENT {
                self.advance_offset(line, CODE_INDENT, true);
            } else if self.blank {
                let count = self.first_nonspace - self.offset;
                self.advance_offset(line, count, false);
            } else {
                return Continuation::Unmatched;
            }
            return Continuation::Matched;
        }

        let closes = self.indent <= 3
            && scanners::close_code_fence(&line.as_bytes()[self.first_nonspace..], data.fence_char)
                .is_some_and(|len| len >= data.fence_length);
        if closes {
            self.advance_to_line_end(line);
            self.current = self.finalize(container);
            return Continuation::Consumed;
        }

        let mut i = data.fence_offset;
        while i > 0 && is_space_or_tab(peek_at(line, self.offset)) {
            self.advance_offset(line, 1, true);
            i -= 1;
        }
        Continuation::Matched
    }

    /// Appends a new open block, closing containers that cannot hold it.
    pub(crate) fn add_child(&mut self, mut parent: NodeId, value: NodeValue) -> Result<NodeId, Error> {
        while parent != self.root && !self.doc.value(parent).can_contain(&value) {
            parent = self.finalize(parent);
        }

        trace!(line = self.line_number, kind = value.kind(), "open block");
        let child = self.doc.alloc(value)?;
        {
            let node = self.doc.get_mut(child);
            node.open = true;
            node.start_line = self.line_number;
        }
        self.doc.append(parent, child);
        Ok(child)
    }

    fn add_text_to_container(
        &mut self,
        mut container: NodeId,
        last_matched_container: NodeId,
        line: &str,
    ) -> Result<(), Error> {
        self.find_first_nonspace(line);

        if self.blank
            && let Some(last_child) = self.doc.last_child(container)
        {
            self.doc.get_mut(last_child).last_line_blank = true;
        }

        let last_line_blank = self.blank
            && match self.doc.value(container) {
                NodeValue::BlockQuote
                | NodeValue::Heading(..)
                | NodeValue::ThematicBreak
                | NodeValue::Table(..)
                | NodeValue::TableRow { .. } => false,
                NodeValue::CodeBlock(data) => !data.fenced,
                NodeValue::Item(..) => {
                    self.doc.first_child(container).is_some()
                        || self.doc.get(container).start_line != self.line_number
                }
                _ => true,
            };
        self.doc.get_mut(container).last_line_blank = last_line_blank;

        let mut tmp = container;
        while let Some(parent) = self.doc.parent(tmp) {
            self.doc.get_mut(parent).last_line_blank = false;
            tmp = parent;
        }

        let lazy_paragraph = self.current != last_matched_container
            && container == last_matched_container
            && !self.blank
            && matches!(self.doc.value(self.current), NodeValue::Paragraph);

        if lazy_paragraph {
            self.add_line(self.current, line)?;
            return Ok(());
        }

        while self.current != last_matched_container {
            self.current = self.finalize(self.current);
        }

        let block_type = match self.doc.value(container) {
            NodeValue::CodeBlock(..) => {
                self.add_line(container, line)?;
                self.current = container;
                return Ok(());
            }
            NodeValue::HtmlBlock(data) => data.block_type,
            _ => 0,
        };

        if block_type != 0 {
            self.add_line(container, line)?;
            let rest = line.as_bytes().get(self.first_nonspace..).unwrap_or_default();
            if scanners::html_block_end(block_type, rest) {
                container = self.finalize(container);
            }
        } else if self.blank {
            // blank lines only matter through last_line_blank
        } else if self.doc.value(container).accepts_lines() {
            let text_line = match self.doc.value(container) {
                NodeValue::Heading(data) if !data.setext => strings::chop_trailing_hashes(line),
                _ => line,
            };
            let count = self.first_nonspace - self.offset;
            self.advance_offset(line, count, false);
            self.add_line(container, text_line)?;
        } else {
            container = self.add_child(container, NodeValue::Paragraph)?;
            let count = self.first_nonspace - self.offset;
            self.advance_offset(line, count, false);
            self.add_line(container, line)?;
        }

        self.current = container;
        Ok(())
    }

    fn add_line(&mut self, node: NodeId, line: &str) -> Result<(), Error> {
        let partially_consumed_tab = self.partially_consumed_tab;
        if partially_consumed_tab {
            self.offset += 1;
        }
        let padding = if partially_consumed_tab {
            TAB_STOP - (self.column % TAB_STOP)
        } else {
            0
        };
        let start = strings::ceil_char_boundary(line, self.offset);
        let text = &line[start..];

        let content = &mut self.doc.get_mut(node).content;
        content.try_reserve(padding + text.len())?;
        content.extend(std::iter::repeat_n(' ', padding));
        content.push_str(text);
        Ok(())
    }

    fn finalize_document(&mut self) {
        while self.current != self.root {
            self.current = self.finalize(self.current);
        }
        self.finalize(self.root);
    }

    /// Closes `node` and returns its parent.
    pub(crate) fn finalize(&mut self, node: NodeId) -> NodeId {
        let parent = self.doc.parent(node).unwrap_or(self.root);
        if !self.doc.get(node).open {
            return parent;
        }
        self.doc.get_mut(node).open = false;

        match self.doc.value(node) {
            NodeValue::Paragraph => {
                if !self.resolve_reference_definitions(node) {
                    self.doc.detach(node);
                }
            }
            NodeValue::CodeBlock(..) => {
                let content = std::mem::take(&mut self.doc.get_mut(node).content);
                let NodeValue::CodeBlock(data) = self.doc.value_mut(node) else {
                    return parent;
                };
                if data.fenced {
                    let (first, rest) = match content.find('\n') {
                        Some(eol) => (&content[..eol], &content[eol + 1..]),
                        None => (content.as_str(), ""),
                    };
                    data.info = strings::unescape(&entity::unescape_html(strings::trim(first)));
                    data.literal = rest.to_string();
                } else {
                    let mut literal = content;
                    strings::remove_trailing_blank_lines(&mut literal);
                    literal.push('\n');
                    data.literal = literal;
                }
            }
            NodeValue::HtmlBlock(..) => {
                let content = std::mem::take(&mut self.doc.get_mut(node).content);
                if let NodeValue::HtmlBlock(data) = self.doc.value_mut(node) {
                    data.literal = content;
                }
            }
            NodeValue::List(..) => {
                let tight = self.determine_list_tight(node);
                if let NodeValue::List(data) = self.doc.value_mut(node) {
                    data.tight = tight;
                }
            }
            _ => {}
        }
        parent
    }

    /// A list is loose when a blank line separates two of its items or two
    /// blocks inside one of its items.
    fn determine_list_tight(&self, list: NodeId) -> bool {
        let mut item = self.doc.first_child(list);
        while let Some(it) = item {
            let next_item = self.doc.next_sibling(it);
            if self.doc.get(it).last_line_blank && next_item.is_some() {
                return false;
            }
            let mut sub = self.doc.first_child(it);
            while let Some(s) = sub {
                let next_sub = self.doc.next_sibling(s);
                if (next_item.is_some() || next_sub.is_some()) && self.ends_with_blank_line(s) {
                    return false;
                }
                sub = next_sub;
            }
            item = next_item;
        }
        true
    }

    fn ends_with_blank_line(&self, node: NodeId) -> bool {
        let mut cursor = Some(node);
        while let Some(n) = cursor {
            if self.doc.get(n).last_line_blank {
                return true;
            }
            cursor = match self.doc.value(n) {
                NodeValue::List(..) | NodeValue::Item(..) => self.doc.last_child(n),
                _ => None,
            };
        }
        false
    }

    /// Strips link reference definitions from the front of a paragraph.
    /// Returns whether any content is left.
    pub(crate) fn resolve_reference_definitions(&mut self, node: NodeId) -> bool {
        let content = std::mem::take(&mut self.doc.get_mut(node).content);
        let mut seeked = 0;
        while content.as_bytes().get(seeked) == Some(&b'[') {
            match inlines::parse_reference_definition(&content[seeked..], &mut self.refmap) {
                Some(consumed) => seeked += consumed,
                None => break,
            }
        }
        let rest = if seeked == 0 {
            content
        } else {
            content[seeked..].to_string()
        };
        let has_content = !strings::is_blank(&rest);
        self.doc.get_mut(node).content = rest;
        has_content
    }

    fn process_inlines(&mut self) -> Result<(), Error> {
        let leaves: Vec<NodeId> = self
            .doc
            .descendants(self.root)
            .filter(|&n| self.doc.value(n).contains_inlines())
            .collect();

        for node in leaves {
            let mut content = std::mem::take(&mut self.doc.get_mut(node).content);
            strings::rtrim(&mut content);
            let mut subject = inlines::Subject::new(
                &mut self.doc,
                self.options,
                self.extensions,
                &content,
                &self.refmap,
            );
            while subject.parse_inline(node)? {}
            subject.process_emphasis(0)?;
        }
        Ok(())
    }
}

/// Byte at `i`, or 0 past the end.
pub(crate) fn peek_at(line: &str, i: usize) -> u8 {
    line.as_bytes().get(i).copied().unwrap_or(0)
}

/// Recognizes a bullet (`-`, `+`, `*`) or ordered (`1.`, `1)`) list marker
/// at `pos`. Returns the marker length and the list data (padding and
/// marker offset are filled in by the caller).
fn parse_list_marker(line: &str, pos: usize, interrupts_paragraph: bool) -> Option<(usize, ListData)> {
    let bytes = line.as_bytes();
    let c = *bytes.get(pos)?;
    let start_pos = pos;

    if c == b'*' || c == b'-' || c == b'+' {
        let next = peek_at(line, pos + 1);
        if !strings::is_space(next) {
            return None;
        }
        if interrupts_paragraph && strings::is_blank(&line[pos + 1..]) {
            return None;
        }
        return Some((
            1,
            ListData {
                list_type: ListType::Bullet,
                marker_offset: 0,
                padding: 0,
                start: 1,
                delimiter: ListDelimiter::Period,
                bullet_char: c,
                tight: false,
            },
        ));
    }

    if c.is_ascii_digit() {
        let digits = bytes[pos..].iter().take_while(|b| b.is_ascii_digit()).count();
        if digits >= 10 {
            return None;
        }
        let start: usize = line[pos..pos + digits].parse().ok()?;
        let end = pos + digits;
        let delimiter = match peek_at(line, end) {
            b'.' => ListDelimiter::Period,
            b')' => ListDelimiter::Paren,
            _ => return None,
        };
        let after = end + 1;
        if !strings::is_space(peek_at(line, after)) {
            return None;
        }
        if interrupts_paragraph && (start != 1 || strings::is_blank(&line[after..])) {
            return None;
        }
        return Some((
            after - start_pos,
            ListData {
                list_type: ListType::Ordered,
                marker_offset: 0,
                padding: 0,
                start,
                delimiter,
                bullet_char: 0,
                tight: false,
            },
        ));
    }

    None
}

fn lists_match(a: &ListData, b: &ListData) -> bool {
    a.list_type == b.list_type && a.delimiter == b.delimiter && a.bullet_char == b.bullet_char
}
