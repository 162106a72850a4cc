//! Recognizers for the fixed block and inline patterns.
//!
//! Every scanner takes the bytes starting at the candidate position and
//! returns the length of the match (or the matched kind), `None` otherwise.

use crate::strings::{is_ascii_punctuation, is_line_end, is_space, is_space_or_tab};

const BLOCK_TAGS: &[&str] = &[
    "address",
    "article",
    "aside",
    "base",
    "basefont",
    "blockquote",
    "body",
    "caption",
    "center",
    "col",
    "colgroup",
    "dd",
    "details",
    "dialog",
    "dir",
    "div",
    "dl",
    "dt",
    "fieldset",
    "figcaption",
    "figure",
    "footer",
    "form",
    "frame",
    "frameset",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "head",
    "header",
    "hr",
    "html",
    "iframe",
    "legend",
    "li",
    "link",
    "main",
    "menu",
    "menuitem",
    "nav",
    "noframes",
    "ol",
    "optgroup",
    "option",
    "p",
    "param",
    "search",
    "section",
    "summary",
    "table",
    "tbody",
    "td",
    "tfoot",
    "th",
    "thead",
    "title",
    "tr",
    "track",
    "ul",
];

const RAW_TEXT_TAGS: &[&str] = &["pre", "script", "style", "textarea"];

fn run_of(s: &[u8], c: u8) -> usize {
    s.iter().take_while(|&&b| b == c).count()
}

fn spaces_or_tabs(s: &[u8]) -> usize {
    s.iter().take_while(|&&b| is_space_or_tab(b)).count()
}

/// True when `s` is empty or starts with a line ending.
fn at_line_end(s: &[u8]) -> bool {
    s.first().is_none_or(|&b| is_line_end(b))
}

fn starts_with_ignore_case(s: &[u8], prefix: &[u8]) -> bool {
    s.len() >= prefix.len() && s[..prefix.len()].eq_ignore_ascii_case(prefix)
}

/// `#{1,6}` followed by spaces or the end of the line. Returns the length of
/// the hashes plus the spaces after them.
pub(crate) fn atx_heading_start(s: &[u8]) -> Option<usize> {
    let hashes = run_of(s, b'#');
    if hashes == 0 || hashes > 6 {
        return None;
    }
    let rest = &s[hashes..];
    if at_line_end(rest) {
        Some(hashes)
    } else if is_space_or_tab(rest[0]) {
        Some(hashes + spaces_or_tabs(rest))
    } else {
        None
    }
}

/// Opening code fence: three or more backticks or tildes. A backtick fence's
/// info string may not contain backticks. Returns the fence length.
pub(crate) fn open_code_fence(s: &[u8]) -> Option<usize> {
    let c = *s.first()?;
    if c != b'`' && c != b'~' {
        return None;
    }
    let n = run_of(s, c);
    if n < 3 {
        return None;
    }
    let rest = &s[n..];
    let info_end = rest.iter().position(|&b| is_line_end(b)).unwrap_or(rest.len());
    if c == b'`' && rest[..info_end].contains(&b'`') {
        return None;
    }
    Some(n)
}

/// Closing code fence: a run of `c` followed only by spaces. Returns the
/// fence length.
pub(crate) fn close_code_fence(s: &[u8], c: u8) -> Option<usize> {
    let n = run_of(s, c);
    if n < 3 || !at_line_end(&s[n + spaces_or_tabs(&s[n..])..]) {
        return None;
    }
    Some(n)
}

/// Setext underline: 1 for `=`, 2 for `-`.
pub(crate) fn setext_heading_line(s: &[u8]) -> Option<u8> {
    let c = *s.first()?;
    let level = match c {
        b'=' => 1,
        b'-' => 2,
        _ => return None,
    };
    let n = run_of(s, c);
    if at_line_end(&s[n + spaces_or_tabs(&s[n..])..]) {
        Some(level)
    } else {
        None
    }
}

/// Three or more `*`, `-` or `_`, optionally separated by spaces or tabs.
pub(crate) fn thematic_break(s: &[u8]) -> bool {
    let Some(&c) = s.first() else {
        return false;
    };
    if c != b'*' && c != b'-' && c != b'_' {
        return false;
    }
    let mut count = 0;
    for &b in s {
        if b == c {
            count += 1;
        } else if is_line_end(b) {
            break;
        } else if !is_space_or_tab(b) {
            return false;
        }
    }
    count >= 3
}

/// HTML block start conditions 1 through 6.
pub(crate) fn html_block_start(s: &[u8]) -> Option<u8> {
    if s.first() != Some(&b'<') {
        return None;
    }
    let rest = &s[1..];

    for tag in RAW_TEXT_TAGS {
        if starts_with_ignore_case(rest, tag.as_bytes()) {
            let after = &rest[tag.len()..];
            if at_line_end(after) || after[0] == b'>' || is_space_or_tab(after[0]) {
                return Some(1);
            }
        }
    }

    if rest.starts_with(b"!--") {
        return Some(2);
    }
    if rest.starts_with(b"?") {
        return Some(3);
    }
    if rest.starts_with(b"![CDATA[") {
        return Some(5);
    }
    if rest.len() >= 2 && rest[0] == b'!' && rest[1].is_ascii_alphabetic() {
        return Some(4);
    }

    let name = rest.strip_prefix(b"/").unwrap_or(rest);
    let name_len = name.iter().take_while(|b| b.is_ascii_alphanumeric()).count();
    if name_len == 0 {
        return None;
    }
    let tag = &name[..name_len];
    if !BLOCK_TAGS.iter().any(|t| t.as_bytes().eq_ignore_ascii_case(tag)) {
        return None;
    }
    let after = &name[name_len..];
    if at_line_end(after)
        || is_space_or_tab(after[0])
        || after[0] == b'>'
        || after.starts_with(b"/>")
    {
        Some(6)
    } else {
        None
    }
}

/// HTML block start condition 7: a complete open or closing tag alone on
/// its line.
pub(crate) fn html_block_start_7(s: &[u8]) -> Option<u8> {
    let len = html_open_tag(s).or_else(|| html_closing_tag(s))?;
    if at_line_end(&s[len + spaces_or_tabs(&s[len..])..]) {
        Some(7)
    } else {
        None
    }
}

/// Whether `line` satisfies the end condition of HTML block `block_type`.
pub(crate) fn html_block_end(block_type: u8, line: &[u8]) -> bool {
    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }
    match block_type {
        1 => {
            let lower = line.to_ascii_lowercase();
            RAW_TEXT_TAGS
                .iter()
                .any(|tag| contains(&lower, format!("</{}>", tag).as_bytes()))
        }
        2 => contains(line, b"-->"),
        3 => contains(line, b"?>"),
        4 => line.contains(&b'>'),
        5 => contains(line, b"]]>"),
        _ => false,
    }
}

fn tag_name(s: &[u8]) -> usize {
    match s.first() {
        Some(b) if b.is_ascii_alphabetic() => {
            1 + s[1..]
                .iter()
                .take_while(|&&b| b.is_ascii_alphanumeric() || b == b'-')
                .count()
        }
        _ => 0,
    }
}

fn whitespace(s: &[u8]) -> usize {
    s.iter().take_while(|&&b| is_space(b)).count()
}

/// One ` name` or ` name = value` attribute, leading whitespace included.
fn attribute(s: &[u8]) -> Option<usize> {
    let mut i = whitespace(s);
    if i == 0 {
        return None;
    }
    match s.get(i) {
        Some(&b) if b.is_ascii_alphabetic() || b == b'_' || b == b':' => i += 1,
        _ => return None,
    }
    i += s[i..]
        .iter()
        .take_while(|&&b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b':' | b'-'))
        .count();

    let before_value = i;
    i += whitespace(&s[i..]);
    if s.get(i) != Some(&b'=') {
        return Some(before_value);
    }
    i += 1;
    i += whitespace(&s[i..]);
    match s.get(i) {
        Some(&q) if q == b'"' || q == b'\'' => {
            let close = s[i + 1..].iter().position(|&b| b == q)?;
            Some(i + 1 + close + 1)
        }
        Some(_) => {
            let n = s[i..]
                .iter()
                .take_while(|&&b| !is_space(b) && !matches!(b, b'"' | b'\'' | b'=' | b'<' | b'>' | b'`'))
                .count();
            if n == 0 { None } else { Some(i + n) }
        }
        None => None,
    }
}

/// `<name attr…>` or `<name attr…/>`.
pub(crate) fn html_open_tag(s: &[u8]) -> Option<usize> {
    if s.first() != Some(&b'<') {
        return None;
    }
    let name = tag_name(&s[1..]);
    if name == 0 {
        return None;
    }
    let mut i = 1 + name;
    while let Some(len) = attribute(&s[i..]) {
        i += len;
    }
    i += whitespace(&s[i..]);
    if s.get(i) == Some(&b'/') {
        i += 1;
    }
    if s.get(i) == Some(&b'>') {
        Some(i + 1)
    } else {
        None
    }
}

/// `</name>`.
pub(crate) fn html_closing_tag(s: &[u8]) -> Option<usize> {
    if !s.starts_with(b"</") {
        return None;
    }
    let name = tag_name(&s[2..]);
    if name == 0 {
        return None;
    }
    let mut i = 2 + name;
    i += whitespace(&s[i..]);
    if s.get(i) == Some(&b'>') {
        Some(i + 1)
    } else {
        None
    }
}

fn find(s: &[u8], needle: &[u8]) -> Option<usize> {
    s.windows(needle.len()).position(|w| w == needle)
}

/// Any raw inline HTML construct starting at `<`: tags, comments,
/// processing instructions, declarations and CDATA sections.
pub(crate) fn html_inline(s: &[u8]) -> Option<usize> {
    if s.first() != Some(&b'<') {
        return None;
    }
    if s.starts_with(b"<!-->") {
        return Some(5);
    }
    if s.starts_with(b"<!--->") {
        return Some(6);
    }
    if s.starts_with(b"<!--") {
        return find(&s[4..], b"-->").map(|end| 4 + end + 3);
    }
    if s.starts_with(b"<?") {
        return find(&s[2..], b"?>").map(|end| 2 + end + 2);
    }
    if s.starts_with(b"<![CDATA[") {
        return find(&s[9..], b"]]>").map(|end| 9 + end + 3);
    }
    if s.len() > 2 && s[1] == b'!' && s[2].is_ascii_alphabetic() {
        return s[3..].iter().position(|&b| b == b'>').map(|end| 3 + end + 1);
    }
    html_open_tag(s).or_else(|| html_closing_tag(s))
}

/// `<scheme:…>` with a 2 to 32 character scheme. `s` starts after the `<`;
/// the length includes the closing `>`.
pub(crate) fn autolink_uri(s: &[u8]) -> Option<usize> {
    match s.first() {
        Some(b) if b.is_ascii_alphabetic() => {}
        _ => return None,
    }
    let scheme = 1 + s[1..]
        .iter()
        .take_while(|&&b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'.' | b'-'))
        .count();
    if !(2..=32).contains(&scheme) || s.get(scheme) != Some(&b':') {
        return None;
    }
    let mut i = scheme + 1;
    while let Some(&b) = s.get(i) {
        match b {
            b'>' => return Some(i + 1),
            b'<' => return None,
            b if b <= 0x20 => return None,
            _ => i += 1,
        }
    }
    None
}

/// `<local@domain>` e-mail autolink. `s` starts after the `<`; the length
/// includes the closing `>`.
pub(crate) fn autolink_email(s: &[u8]) -> Option<usize> {
    let local = s
        .iter()
        .take_while(|&&b| b.is_ascii_alphanumeric() || b".!#$%&'*+/=?^_`{|}~-".contains(&b))
        .count();
    if local == 0 || s.get(local) != Some(&b'@') {
        return None;
    }
    let mut i = local + 1;
    loop {
        // label: alnum, then up to 62 of [alnum-] ending in alnum
        if !s.get(i)?.is_ascii_alphanumeric() {
            return None;
        }
        let run = s[i + 1..]
            .iter()
            .take_while(|&&b| b.is_ascii_alphanumeric() || b == b'-')
            .count();
        if run > 62 || (run > 0 && s[i + run] == b'-') {
            return None;
        }
        i += 1 + run;
        match s.get(i) {
            Some(b'.') => i += 1,
            Some(b'>') => return Some(i + 1),
            _ => return None,
        }
    }
}

/// Link title in double quotes, single quotes or parentheses.
pub(crate) fn link_title(s: &[u8]) -> Option<usize> {
    let close = match s.first()? {
        b'"' => b'"',
        b'\'' => b'\'',
        b'(' => b')',
        _ => return None,
    };
    let mut i = 1;
    while let Some(&b) = s.get(i) {
        if b == b'\\' && s.get(i + 1).is_some_and(|&n| is_ascii_punctuation(n)) {
            i += 2;
        } else if b == close {
            return Some(i + 1);
        } else if close == b')' && b == b'(' {
            return None;
        } else {
            i += 1;
        }
    }
    None
}

/// Length of the leading run of spaces, tabs and line endings.
pub(crate) fn spacechars(s: &[u8]) -> usize {
    whitespace(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atx_needs_space_or_line_end() {
        assert_eq!(atx_heading_start(b"## foo\n"), Some(3));
        assert_eq!(atx_heading_start(b"#\n"), Some(1));
        assert_eq!(atx_heading_start(b"#foo\n"), None);
        assert_eq!(atx_heading_start(b"####### foo\n"), None);
    }

    #[test]
    fn fences_open_and_close() {
        assert_eq!(open_code_fence(b"```rust\n"), Some(3));
        assert_eq!(open_code_fence(b"~~~~ a`b\n"), Some(4));
        assert_eq!(open_code_fence(b"``` a`b\n"), None);
        assert_eq!(open_code_fence(b"``\n"), None);
        assert_eq!(close_code_fence(b"````  \n", b'`'), Some(4));
        assert_eq!(close_code_fence(b"``` x\n", b'`'), None);
    }

    #[test]
    fn setext_and_thematic_break_lines() {
        assert_eq!(setext_heading_line(b"===  \n"), Some(1));
        assert_eq!(setext_heading_line(b"-\n"), Some(2));
        assert_eq!(setext_heading_line(b"= =\n"), None);
        assert!(thematic_break(b"- - -\n"));
        assert!(thematic_break(b"___\n"));
        assert!(!thematic_break(b"--\n"));
        assert!(!thematic_break(b"-*-\n"));
    }

    #[test]
    fn html_block_conditions() {
        assert_eq!(html_block_start(b"<script>\n"), Some(1));
        assert_eq!(html_block_start(b"<!-- c\n"), Some(2));
        assert_eq!(html_block_start(b"<?php\n"), Some(3));
        assert_eq!(html_block_start(b"<!DOCTYPE html>\n"), Some(4));
        assert_eq!(html_block_start(b"<![CDATA[\n"), Some(5));
        assert_eq!(html_block_start(b"<DIV class=x>\n"), Some(6));
        assert_eq!(html_block_start(b"</td>\n"), Some(6));
        assert_eq!(html_block_start(b"<span>\n"), None);
        assert_eq!(html_block_start_7(b"<span class=\"a\">  \n"), Some(7));
        assert_eq!(html_block_start_7(b"<span> text\n"), None);
        assert!(html_block_end(1, b"x </SCRIPT> y"));
        assert!(html_block_end(2, b"-->"));
        assert!(!html_block_end(6, b"anything"));
    }

    #[test]
    fn inline_html_constructs() {
        assert_eq!(html_inline(b"<a href=\"x\">rest"), Some(12));
        assert_eq!(html_inline(b"<br/>"), Some(5));
        assert_eq!(html_inline(b"</em >"), Some(6));
        assert_eq!(html_inline(b"<!-- c -->x"), Some(10));
        assert_eq!(html_inline(b"<!-->"), Some(5));
        assert_eq!(html_inline(b"<?x ?>"), Some(6));
        assert_eq!(html_inline(b"<!X y>"), Some(6));
        assert_eq!(html_inline(b"<![CDATA[a]]>"), Some(13));
        assert_eq!(html_inline(b"<a h=>"), None);
        assert_eq!(html_inline(b"<33>"), None);
    }

    #[test]
    fn pointy_autolinks() {
        assert_eq!(autolink_uri(b"http://a.b>"), Some(11));
        assert_eq!(autolink_uri(b"a:b>"), None);
        assert_eq!(autolink_uri(b"http://a b>"), None);
        assert_eq!(autolink_email(b"foo@bar.example>"), Some(16));
        assert_eq!(autolink_email(b"foo@-bar>"), None);
        assert_eq!(autolink_email(b"foo@bar->"), None);
    }

    #[test]
    fn titles() {
        assert_eq!(link_title(b"\"a\\\"b\" x"), Some(6));
        assert_eq!(link_title(b"(a(b)"), None);
        assert_eq!(link_title(b"'open"), None);
    }
}
