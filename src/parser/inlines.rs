//! Inline parsing: turns the text of one leaf block into inline nodes.
//!
//! Emphasis-like runs go on a delimiter stack and `[`/`![` on a bracket
//! stack; both are resolved as closers show up and discarded when the leaf
//! is done.

use crate::ast::{Document, LinkData, NodeId, NodeValue};
use crate::entity;
use crate::error::Error;
use crate::extensions::{Extension, strikethrough};
use crate::options::Options;
use crate::parser::{RefMap, Reference};
use crate::scanners;
use crate::strings::{self, is_ascii_punctuation, is_line_end, is_punctuation, is_whitespace};

const MAXBACKTICKS: usize = 80;
const MAX_LINK_LABEL_LENGTH: usize = 1000;
const MAX_LINK_PARENS: usize = 32;

/// A run of `*`, `_` or `~` that may open or close.
#[derive(Debug)]
pub(crate) struct Delimiter {
    pub(crate) inl: NodeId,
    /// Input position right after the run.
    pub(crate) position: usize,
    /// Run length when pushed; used by the multiple-of-3 rule.
    pub(crate) length: usize,
    pub(crate) delim_char: u8,
    pub(crate) can_open: bool,
    pub(crate) can_close: bool,
    pub(crate) prev: Option<usize>,
    pub(crate) next: Option<usize>,
}

#[derive(Debug)]
struct Bracket {
    inl_text: NodeId,
    /// Input position right after `[`.
    position: usize,
    image: bool,
    active: bool,
    bracket_after: bool,
}

/// Result of scanning a delimiter run.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DelimRun {
    pub(crate) count: usize,
    pub(crate) left_flanking: bool,
    pub(crate) right_flanking: bool,
    pub(crate) before: char,
    pub(crate) after: char,
}

pub(crate) struct Subject<'a> {
    pub(crate) doc: &'a mut Document,
    options: Options,
    extensions: &'a [Extension],
    pub(crate) input: &'a str,
    pub(crate) pos: usize,
    refmap: &'a RefMap,
    /// Delimiters live in a vector but are chained through `prev`/`next`
    /// so removal keeps indices stable.
    pub(crate) delimiters: Vec<Delimiter>,
    last_delimiter: Option<usize>,
    brackets: Vec<Bracket>,
    backticks: [usize; MAXBACKTICKS + 1],
    scanned_for_backticks: bool,
    special_chars: [bool; 256],
    skip_chars: [bool; 256],
}

impl<'a> Subject<'a> {
    pub(crate) fn new(
        doc: &'a mut Document,
        options: Options,
        extensions: &'a [Extension],
        input: &'a str,
        refmap: &'a RefMap,
    ) -> Self {
        let mut special_chars = [false; 256];
        for &b in b"\n\r_*`\\&<[]!" {
            special_chars[b as usize] = true;
        }
        let mut skip_chars = [false; 256];
        for &ext in extensions {
            for &b in ext.special_chars() {
                special_chars[b as usize] = true;
            }
            if ext == Extension::Strikethrough {
                skip_chars[b'~' as usize] = true;
            }
        }

        Subject {
            doc,
            options,
            extensions,
            input,
            pos: 0,
            refmap,
            delimiters: Vec::new(),
            last_delimiter: None,
            brackets: Vec::new(),
            backticks: [0; MAXBACKTICKS + 1],
            scanned_for_backticks: false,
            special_chars,
            skip_chars,
        }
    }

    pub(crate) fn options(&self) -> Options {
        self.options
    }

    pub(crate) fn bytes(&self) -> &'a [u8] {
        self.input.as_bytes()
    }

    pub(crate) fn peek(&self) -> Option<u8> {
        self.bytes().get(self.pos).copied()
    }

    /// Whether a `[` or `![` is waiting for its `]`.
    pub(crate) fn brackets_open(&self) -> bool {
        !self.brackets.is_empty()
    }

    pub(crate) fn make(&mut self, value: NodeValue) -> Result<NodeId, Error> {
        self.doc.alloc(value)
    }

    pub(crate) fn make_text(&mut self, text: &str) -> Result<NodeId, Error> {
        let mut owned = String::new();
        owned.try_reserve(text.len())?;
        owned.push_str(text);
        self.doc.alloc(NodeValue::Text(owned))
    }

    pub(crate) fn text_len(&self, node: NodeId) -> usize {
        self.doc.value(node).text().map_or(0, str::len)
    }

    /// Parses the next inline at `pos` and appends it to `parent`.
    /// Returns false at the end of input.
    pub(crate) fn parse_inline(&mut self, parent: NodeId) -> Result<bool, Error> {
        let Some(c) = self.peek() else {
            return Ok(false);
        };

        let new_inl = match c {
            b'\r' | b'\n' => Some(self.handle_newline()?),
            b'`' => Some(self.handle_backticks()?),
            b'\\' => Some(self.handle_backslash()?),
            b'&' => Some(self.handle_entity()?),
            b'<' => Some(self.handle_pointy_brace()?),
            b'*' | b'_' => Some(self.handle_delim(c)?),
            b'[' => {
                self.pos += 1;
                let inl = self.make_text("[")?;
                self.push_bracket(false, inl);
                Some(inl)
            }
            b']' => self.handle_close_bracket()?,
            b'!' => {
                self.pos += 1;
                if self.peek() == Some(b'[') {
                    self.pos += 1;
                    let inl = self.make_text("![")?;
                    self.push_bracket(true, inl);
                    Some(inl)
                } else {
                    Some(self.make_text("!")?)
                }
            }
            _ => {
                let extensions = self.extensions;
                let mut inl = None;
                for &ext in extensions {
                    if let Some(node) = ext.try_parse_inline(self, parent, c)? {
                        inl = Some(node);
                        break;
                    }
                }
                match inl {
                    Some(node) => Some(node),
                    None => Some(self.handle_text()?),
                }
            }
        };

        if let Some(inl) = new_inl {
            self.doc.append(parent, inl);
        }
        Ok(true)
    }

    /// Position of the next special character at or after `from`.
    pub(crate) fn find_special_char(&self, from: usize) -> usize {
        let bytes = self.bytes();
        (from..bytes.len())
            .find(|&i| self.special_chars[bytes[i] as usize])
            .unwrap_or(bytes.len())
    }

    /// Plain text up to the next special character. Always consumes at
    /// least one byte.
    pub(crate) fn handle_text(&mut self) -> Result<NodeId, Error> {
        let start = self.pos;
        let end = self.find_special_char(start + 1);
        self.pos = end;
        let mut text = self.input[start..end].to_string();
        if self.peek().is_some_and(is_line_end) {
            strings::rtrim(&mut text);
        }
        self.doc.alloc(NodeValue::Text(text))
    }

    fn skip_spaces(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t')) {
            self.pos += 1;
        }
    }

    fn handle_newline(&mut self) -> Result<NodeId, Error> {
        let nlpos = self.pos;
        if self.peek() == Some(b'\r') {
            self.pos += 1;
        }
        if self.peek() == Some(b'\n') {
            self.pos += 1;
        }
        self.skip_spaces();
        let bytes = self.bytes();
        let hard = nlpos > 1 && bytes[nlpos - 1] == b' ' && bytes[nlpos - 2] == b' ';
        self.make(if hard {
            NodeValue::LineBreak
        } else {
            NodeValue::SoftBreak
        })
    }

    fn take_while(&mut self, c: u8) -> usize {
        let start = self.pos;
        while self.peek() == Some(c) {
            self.pos += 1;
        }
        self.pos - start
    }

    /// Finds a closing run of exactly `openticks` backticks. The positions
    /// of runs seen on the way are remembered so a later failing search
    /// does not rescan the input.
    fn scan_to_closing_backticks(&mut self, openticks: usize) -> Option<usize> {
        if openticks > MAXBACKTICKS {
            return None;
        }
        if self.scanned_for_backticks && self.backticks[openticks] <= self.pos {
            return None;
        }
        loop {
            while self.peek().is_some_and(|c| c != b'`') {
                self.pos += 1;
            }
            if self.pos >= self.input.len() {
                self.scanned_for_backticks = true;
                return None;
            }
            let numticks = self.take_while(b'`');
            if numticks <= MAXBACKTICKS {
                self.backticks[numticks] = self.pos - numticks;
            }
            if numticks == openticks {
                return Some(self.pos);
            }
        }
    }

    fn handle_backticks(&mut self) -> Result<NodeId, Error> {
        let openticks = self.take_while(b'`');
        let startpos = self.pos;
        match self.scan_to_closing_backticks(openticks) {
            Some(endpos) => {
                let code = strings::normalize_code(&self.input[startpos..endpos - openticks]);
                self.make(NodeValue::Code(code))
            }
            None => {
                self.pos = startpos;
                let ticks = "`".repeat(openticks);
                self.make(NodeValue::Text(ticks))
            }
        }
    }

    fn handle_backslash(&mut self) -> Result<NodeId, Error> {
        self.pos += 1;
        match self.peek() {
            Some(c) if is_ascii_punctuation(c) => {
                self.pos += 1;
                self.make(NodeValue::Text((c as char).to_string()))
            }
            Some(c) if is_line_end(c) => {
                self.pos += 1;
                self.skip_spaces();
                self.make(NodeValue::LineBreak)
            }
            _ => self.make_text("\\"),
        }
    }

    fn handle_entity(&mut self) -> Result<NodeId, Error> {
        self.pos += 1;
        match entity::unescape(&self.bytes()[self.pos..]) {
            Some((decoded, len)) => {
                self.pos += len;
                self.make(NodeValue::Text(decoded))
            }
            None => self.make_text("&"),
        }
    }

    fn handle_pointy_brace(&mut self) -> Result<NodeId, Error> {
        let start = self.pos;
        self.pos += 1;
        let rest = &self.bytes()[self.pos..];

        if let Some(len) = scanners::autolink_uri(rest) {
            let url = &self.input[self.pos..self.pos + len - 1];
            self.pos += len;
            return self.make_autolink(url, false);
        }
        if let Some(len) = scanners::autolink_email(rest) {
            let url = &self.input[self.pos..self.pos + len - 1];
            self.pos += len;
            return self.make_autolink(url, true);
        }
        if let Some(len) = scanners::html_inline(&self.bytes()[start..]) {
            let html = self.input[start..start + len].to_string();
            self.pos = start + len;
            return self.make(NodeValue::HtmlInline(html));
        }
        self.make_text("<")
    }

    fn make_autolink(&mut self, url: &str, email: bool) -> Result<NodeId, Error> {
        let link = self.make(NodeValue::Link(LinkData {
            url: strings::clean_autolink(url, email),
            title: String::new(),
        }))?;
        let text = self.make(NodeValue::Text(entity::unescape_html(url)))?;
        self.doc.append(link, text);
        Ok(link)
    }

    /// Scans a run of `c` (at most `max` long) at `pos` and classifies its
    /// flanking. Characters registered as skippable count as whitespace on
    /// the right and are looked through on the left.
    pub(crate) fn scan_delims(&mut self, c: u8, max: usize) -> DelimRun {
        let bytes = self.bytes();
        let before = if self.pos == 0 {
            '\n'
        } else {
            let mut before_pos = self.pos - 1;
            while before_pos > 0
                && (bytes[before_pos] >> 6 == 2 || self.skip_chars[bytes[before_pos] as usize])
            {
                before_pos -= 1;
            }
            match self.input.get(before_pos..).and_then(|s| s.chars().next()) {
                Some(ch) if ch.is_ascii() && self.skip_chars[ch as usize] => '\n',
                Some(ch) => ch,
                None => '\n',
            }
        };

        let mut count = 0;
        while count < max && self.peek() == Some(c) {
            count += 1;
            self.pos += 1;
        }

        let after = match self.input[self.pos..].chars().next() {
            Some(ch) if ch.is_ascii() && self.skip_chars[ch as usize] => '\n',
            Some(ch) => ch,
            None => '\n',
        };

        let left_flanking = count > 0
            && !is_whitespace(after)
            && (!is_punctuation(after) || is_whitespace(before) || is_punctuation(before));
        let right_flanking = count > 0
            && !is_whitespace(before)
            && (!is_punctuation(before) || is_whitespace(after) || is_punctuation(after));

        DelimRun {
            count,
            left_flanking,
            right_flanking,
            before,
            after,
        }
    }

    fn handle_delim(&mut self, c: u8) -> Result<NodeId, Error> {
        let run = self.scan_delims(c, usize::MAX);
        let (can_open, can_close) = if c == b'_' {
            (
                run.left_flanking && (!run.right_flanking || is_punctuation(run.before)),
                run.right_flanking && (!run.left_flanking || is_punctuation(run.after)),
            )
        } else {
            (run.left_flanking, run.right_flanking)
        };

        let inl = self.make_text(&self.input[self.pos - run.count..self.pos])?;
        if can_open || can_close {
            self.push_delimiter(c, can_open, can_close, inl);
        }
        Ok(inl)
    }

    pub(crate) fn push_delimiter(&mut self, c: u8, can_open: bool, can_close: bool, inl: NodeId) {
        let idx = self.delimiters.len();
        let length = self.text_len(inl);
        self.delimiters.push(Delimiter {
            inl,
            position: self.pos,
            length,
            delim_char: c,
            can_open,
            can_close,
            prev: self.last_delimiter,
            next: None,
        });
        if let Some(last) = self.last_delimiter {
            self.delimiters[last].next = Some(idx);
        }
        self.last_delimiter = Some(idx);
    }

    pub(crate) fn remove_delimiter(&mut self, idx: usize) {
        let (prev, next) = (self.delimiters[idx].prev, self.delimiters[idx].next);
        match next {
            Some(n) => self.delimiters[n].prev = prev,
            None => self.last_delimiter = prev,
        }
        if let Some(p) = prev {
            self.delimiters[p].next = next;
        }
    }

    /// Matches closers with openers for every delimiter at or above
    /// `stack_bottom`, then drops those delimiters.
    pub(crate) fn process_emphasis(&mut self, stack_bottom: usize) -> Result<(), Error> {
        // Per closer kind, the position below which no opener exists.
        let mut openers_bottom: [Option<usize>; 13] = [None; 13];

        let mut closer = None;
        let mut candidate = self.last_delimiter;
        while let Some(c) = candidate {
            if self.delimiters[c].position < stack_bottom {
                break;
            }
            closer = Some(c);
            candidate = self.delimiters[c].prev;
        }

        while let Some(c) = closer {
            if !self.delimiters[c].can_close {
                closer = self.delimiters[c].next;
                continue;
            }

            let ix = openers_bottom_index(&self.delimiters[c]);
            let (closer_char, closer_len, closer_can_open) = {
                let d = &self.delimiters[c];
                (d.delim_char, d.length, d.can_open)
            };

            let mut opener = self.delimiters[c].prev;
            let mut opener_found = None;
            let mut mod_three_rule_invoked = false;
            while let Some(o) = opener {
                let od = &self.delimiters[o];
                if od.position < stack_bottom || openers_bottom[ix].is_some_and(|b| od.position < b) {
                    break;
                }
                if od.can_open && od.delim_char == closer_char {
                    let odd_match = (closer_can_open || od.can_close)
                        && (od.length + closer_len) % 3 == 0
                        && !(od.length % 3 == 0 && closer_len % 3 == 0);
                    if !odd_match {
                        opener_found = Some(o);
                        break;
                    }
                    mod_three_rule_invoked = true;
                }
                opener = od.prev;
            }

            match opener_found {
                Some(o) => {
                    closer = if closer_char == b'~' {
                        strikethrough::insert(self, o, c)?
                    } else {
                        self.insert_emph(o, c)?
                    };
                }
                None => {
                    closer = self.delimiters[c].next;
                    if !mod_three_rule_invoked {
                        openers_bottom[ix] = Some(self.delimiters[c].position);
                    }
                    if !closer_can_open {
                        self.remove_delimiter(c);
                    }
                }
            }
        }

        while let Some(last) = self.last_delimiter {
            if self.delimiters[last].position < stack_bottom {
                break;
            }
            self.remove_delimiter(last);
        }
        Ok(())
    }

    /// Wraps the nodes between `opener` and `closer` in Emphasis or Strong,
    /// consuming two delimiter characters when both runs have them. Returns
    /// the delimiter to continue from.
    fn insert_emph(&mut self, opener: usize, closer: usize) -> Result<Option<usize>, Error> {
        let opener_inl = self.delimiters[opener].inl;
        let closer_inl = self.delimiters[closer].inl;
        let mut opener_num_chars = self.text_len(opener_inl);
        let mut closer_num_chars = self.text_len(closer_inl);
        let use_delims = if closer_num_chars >= 2 && opener_num_chars >= 2 {
            2
        } else {
            1
        };

        opener_num_chars -= use_delims;
        closer_num_chars -= use_delims;
        if let Some(t) = self.doc.value_mut(opener_inl).text_mut() {
            t.truncate(opener_num_chars);
        }
        if let Some(t) = self.doc.value_mut(closer_inl).text_mut() {
            t.truncate(closer_num_chars);
        }

        let mut delim = self.delimiters[closer].prev;
        while let Some(d) = delim {
            if d == opener {
                break;
            }
            delim = self.delimiters[d].prev;
            self.remove_delimiter(d);
        }

        let emph = self.make(if use_delims == 1 {
            NodeValue::Emphasis
        } else {
            NodeValue::Strong
        })?;
        let mut tmp = self.doc.next_sibling(opener_inl);
        while let Some(t) = tmp {
            if t == closer_inl {
                break;
            }
            tmp = self.doc.next_sibling(t);
            self.doc.append(emph, t);
        }
        self.doc.insert_after(opener_inl, emph);

        if opener_num_chars == 0 {
            self.doc.detach(opener_inl);
            self.remove_delimiter(opener);
        }

        if closer_num_chars == 0 {
            let next = self.delimiters[closer].next;
            self.doc.detach(closer_inl);
            self.remove_delimiter(closer);
            Ok(next)
        } else {
            Ok(Some(closer))
        }
    }

    fn push_bracket(&mut self, image: bool, inl_text: NodeId) {
        if let Some(last) = self.brackets.last_mut() {
            last.bracket_after = true;
        }
        self.brackets.push(Bracket {
            inl_text,
            position: self.pos,
            image,
            active: true,
            bracket_after: false,
        });
    }

    /// Handles `]`: either turns the bracketed nodes into a link or image
    /// (inserted into the tree directly, so `None` is returned) or yields a
    /// literal `]`.
    fn handle_close_bracket(&mut self) -> Result<Option<NodeId>, Error> {
        self.pos += 1;
        let initial_pos = self.pos;

        let Some(bracket) = self.brackets.last() else {
            return Ok(Some(self.make_text("]")?));
        };
        if !bracket.active {
            self.brackets.pop();
            return Ok(Some(self.make_text("]")?));
        }
        let is_image = bracket.image;
        let opener_text = bracket.inl_text;
        let opener_position = bracket.position;
        let bracket_after = bracket.bracket_after;

        let mut target = self.inline_link_target();

        if target.is_none() {
            self.pos = initial_pos;
            let mut label = match link_label(self.bytes(), self.pos) {
                Some((start, end, next)) => {
                    self.pos = next;
                    Some(strings::trim(&self.input[start..end]))
                }
                None => None,
            };
            if label.is_none_or(str::is_empty) && !bracket_after {
                label = Some(&self.input[opener_position..initial_pos - 1]);
            }
            target = label
                .and_then(|l| self.refmap.lookup(l))
                .map(|r| LinkData {
                    url: r.url.clone(),
                    title: r.title.clone(),
                });
        }

        let Some(target) = target else {
            self.brackets.pop();
            self.pos = initial_pos;
            return Ok(Some(self.make_text("]")?));
        };

        let inl = self.make(if is_image {
            NodeValue::Image(target)
        } else {
            NodeValue::Link(target)
        })?;
        self.doc.insert_before(opener_text, inl);
        let mut tmp = self.doc.next_sibling(opener_text);
        while let Some(t) = tmp {
            tmp = self.doc.next_sibling(t);
            self.doc.append(inl, t);
        }
        self.doc.detach(opener_text);

        self.process_emphasis(opener_position)?;
        self.brackets.pop();

        // Links may not contain other links.
        if !is_image {
            for b in self.brackets.iter_mut().rev() {
                if !b.image {
                    if !b.active {
                        break;
                    }
                    b.active = false;
                }
            }
        }
        Ok(None)
    }

    /// `(destination "title")` right after the `]`. Advances past it on
    /// success.
    fn inline_link_target(&mut self) -> Option<LinkData> {
        let bytes = self.bytes();
        if self.peek() != Some(b'(') {
            return None;
        }
        let start = self.pos + 1;
        let url_start = start + scanners::spacechars(&bytes[start..]);
        let (url, url_len) = manual_scan_link_url(self.input, url_start)?;
        let end_url = url_start + url_len;
        let start_title = end_url + scanners::spacechars(&bytes[end_url..]);
        let end_title = if start_title == end_url {
            start_title
        } else {
            start_title + scanners::link_title(&bytes[start_title..]).unwrap_or(0)
        };
        let end_all = end_title + scanners::spacechars(&bytes[end_title..]);
        if bytes.get(end_all) != Some(&b')') {
            return None;
        }
        self.pos = end_all + 1;
        Some(LinkData {
            url: strings::clean_url(url),
            title: strings::clean_title(&self.input[start_title..end_title]),
        })
    }
}

/// Which `openers_bottom` slot a closer uses: one for `~`, and for `_` and
/// `*` one per can-open flag and run length modulo 3.
fn openers_bottom_index(d: &Delimiter) -> usize {
    let base = match d.delim_char {
        b'~' => return 0,
        b'_' => 1,
        _ => 7,
    };
    base + usize::from(d.can_open) * 3 + d.length % 3
}

/// `[label]` at `pos`. Returns the untrimmed label range and the position
/// after the closing bracket.
pub(crate) fn link_label(bytes: &[u8], pos: usize) -> Option<(usize, usize, usize)> {
    if bytes.get(pos) != Some(&b'[') {
        return None;
    }
    let start = pos + 1;
    let mut i = start;
    loop {
        match bytes.get(i) {
            None | Some(b'[') => return None,
            Some(b']') => return Some((start, i, i + 1)),
            Some(b'\\') => {
                i += 1;
                if bytes.get(i).is_some_and(|&b| is_ascii_punctuation(b)) {
                    i += 1;
                }
            }
            Some(_) => i += 1,
        }
        if i - start > MAX_LINK_LABEL_LENGTH {
            return None;
        }
    }
}

/// Link destination at `start`: `<…>` or a run without spaces and with
/// balanced parentheses. Returns the destination text (brackets excluded)
/// and the number of bytes consumed.
pub(crate) fn manual_scan_link_url(input: &str, start: usize) -> Option<(&str, usize)> {
    let bytes = input.as_bytes();
    if bytes.get(start) == Some(&b'<') {
        let mut i = start + 1;
        while i < bytes.len() {
            match bytes[i] {
                b'>' => return Some((&input[start + 1..i], i + 1 - start)),
                b'\\' => i += 2,
                b'\n' | b'<' => return None,
                _ => i += 1,
            }
        }
        return None;
    }

    let mut i = start;
    let mut nb_p = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'\\' && bytes.get(i + 1).is_some_and(|&n| is_ascii_punctuation(n)) {
            i += 2;
        } else if b == b'(' {
            nb_p += 1;
            if nb_p > MAX_LINK_PARENS {
                return None;
            }
            i += 1;
        } else if b == b')' {
            if nb_p == 0 {
                break;
            }
            nb_p -= 1;
            i += 1;
        } else if strings::is_space(b) || b.is_ascii_control() {
            if i == start {
                return None;
            }
            break;
        } else {
            i += 1;
        }
    }

    if i >= bytes.len() || nb_p != 0 {
        return None;
    }
    Some((&input[start..i], i - start))
}

fn skip_spaces(bytes: &[u8], mut pos: usize) -> usize {
    while matches!(bytes.get(pos), Some(b' ' | b'\t')) {
        pos += 1;
    }
    pos
}

/// Spaces, at most one line ending, spaces.
fn spnl(bytes: &[u8], pos: usize) -> usize {
    let mut pos = skip_spaces(bytes, pos);
    if bytes.get(pos) == Some(&b'\r') {
        pos += 1;
    }
    if bytes.get(pos) == Some(&b'\n') {
        pos += 1;
    }
    skip_spaces(bytes, pos)
}

/// Consumes a line ending; true also at the end of input.
fn skip_line_end(bytes: &[u8], pos: &mut usize) -> bool {
    let mut seen = false;
    if bytes.get(*pos) == Some(&b'\r') {
        *pos += 1;
        seen = true;
    }
    if bytes.get(*pos) == Some(&b'\n') {
        *pos += 1;
        seen = true;
    }
    seen || *pos >= bytes.len()
}

/// Parses one `[label]: destination "title"` definition at the start of
/// `input` and records it. Returns the number of bytes consumed.
pub(crate) fn parse_reference_definition(input: &str, refmap: &mut RefMap) -> Option<usize> {
    let bytes = input.as_bytes();
    let (label_start, label_end, mut pos) = link_label(bytes, 0)?;
    let label = strings::trim(&input[label_start..label_end]);
    if label.is_empty() {
        return None;
    }

    if bytes.get(pos) != Some(&b':') {
        return None;
    }
    pos += 1;

    pos = spnl(bytes, pos);
    let (url, url_len) = manual_scan_link_url(input, pos)?;
    pos += url_len;

    let before_title = pos;
    pos = spnl(bytes, pos);
    let title_len = if pos == before_title {
        0
    } else {
        scanners::link_title(&bytes[pos..]).unwrap_or(0)
    };
    let mut title = "";
    if title_len > 0 {
        title = &input[pos..pos + title_len];
        pos += title_len;
    } else {
        pos = before_title;
    }

    pos = skip_spaces(bytes, pos);
    if !skip_line_end(bytes, &mut pos) {
        if title_len == 0 {
            return None;
        }
        // The title must end its line; otherwise the definition ends
        // before it and the title line is ordinary text.
        title = "";
        pos = skip_spaces(bytes, before_title);
        if !skip_line_end(bytes, &mut pos) {
            return None;
        }
    }

    refmap.insert(
        label,
        Reference {
            url: strings::clean_url(url),
            title: strings::clean_title(title),
        },
    );
    Some(pos)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition(input: &str) -> (Option<usize>, RefMap) {
        let mut refmap = RefMap::default();
        let consumed = parse_reference_definition(input, &mut refmap);
        (consumed, refmap)
    }

    #[test]
    fn link_labels_stop_at_brackets() {
        assert_eq!(link_label(b"[foo] x", 0), Some((1, 4, 5)));
        assert_eq!(link_label(b"[a\\]b]", 0), Some((1, 5, 6)));
        assert_eq!(link_label(b"[a[b]", 0), None);
        assert_eq!(link_label(b"[open", 0), None);
    }

    #[test]
    fn overlong_labels_are_rejected() {
        let long = format!("[{}]", "a".repeat(MAX_LINK_LABEL_LENGTH + 1));
        assert_eq!(link_label(long.as_bytes(), 0), None);
    }

    #[test]
    fn destinations() {
        assert_eq!(manual_scan_link_url("<a b>)", 0), Some(("a b", 5)));
        assert_eq!(manual_scan_link_url("a(b)c)", 0), Some(("a(b)c", 5)));
        assert_eq!(manual_scan_link_url(")", 0), Some(("", 0)));
        assert_eq!(manual_scan_link_url("a(b", 0), None);
        assert_eq!(manual_scan_link_url("<a\nb>", 0), None);
    }

    #[test]
    fn definition_with_title() {
        let (consumed, refmap) = definition("[Foo]: /url \"the title\"\nrest\n");
        assert_eq!(consumed, Some(24));
        let r = refmap.lookup("foo").unwrap();
        assert_eq!(r.url, "/url");
        assert_eq!(r.title, "the title");
    }

    #[test]
    fn title_followed_by_text_is_not_part_of_definition() {
        let (consumed, refmap) = definition("[foo]: /url\n\"title\" ok\n");
        assert_eq!(consumed, Some(12));
        assert_eq!(refmap.lookup("foo").unwrap().title, "");
    }

    #[test]
    fn definitions_need_a_destination_and_a_label() {
        assert_eq!(definition("[foo]:\n").0, None);
        assert_eq!(definition("[ ]: /url\n").0, None);
        assert_eq!(definition("[foo] /url\n").0, None);
    }

    #[test]
    fn definition_may_span_lines() {
        let (consumed, refmap) = definition("[foo]:\n/url\n'title'\n");
        assert_eq!(consumed, Some(20));
        assert_eq!(refmap.lookup("FOO").unwrap().title, "title");
    }
}
