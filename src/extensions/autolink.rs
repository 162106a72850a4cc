//! Bare URLs, `www.` hosts and e-mail addresses turned into links.
//!
//! URLs and `www.` hosts are recognised while inline parsing, triggered by
//! `:` and `w`. E-mail addresses are found afterwards by scanning the text
//! nodes of the finished tree.

use crate::ast::{Document, LinkData, NodeId, NodeValue};
use crate::error::Error;
use crate::parser::inlines::Subject;
use crate::renderer::HtmlRenderer;
use crate::strings::{is_punctuation, is_space, is_whitespace};

const SAFE_SCHEMES: [&str; 3] = ["http://", "https://", "ftp://"];

fn is_valid_hostchar(text: &str, i: usize) -> bool {
    match text.get(i..).and_then(|s| s.chars().next()) {
        Some(c) => !is_whitespace(c) && !is_punctuation(c),
        None => false,
    }
}

/// Length of the domain at the start of `text`, or 0 when it is not one.
/// An underscore in either of the last two labels disqualifies it; unless
/// `allow_short`, at least one dot is required.
fn check_domain(text: &str, allow_short: bool) -> usize {
    let data = text.as_bytes();
    let size = data.len();
    let mut np = 0;
    let mut uscore1 = 0;
    let mut uscore2 = 0;

    let mut i = 1;
    while i + 1 < size {
        if data[i] == b'\\' && i + 2 < size {
            i += 1;
        }
        if data[i] == b'_' {
            uscore2 += 1;
        } else if data[i] == b'.' {
            uscore1 = uscore2;
            uscore2 = 0;
            np += 1;
        } else if !is_valid_hostchar(text, i) && data[i] != b'-' {
            break;
        }
        i += 1;
    }

    if uscore1 > 0 || uscore2 > 0 {
        return 0;
    }
    if allow_short || np > 0 { i } else { 0 }
}

/// Trims trailing punctuation that is unlikely to belong to the link:
/// sentence punctuation, unbalanced `)` and a trailing entity-like `&name;`.
fn autolink_delim(data: &[u8], mut link_end: usize) -> usize {
    let mut opening = 0;
    let mut closing = 0;
    for (i, &c) in data[..link_end].iter().enumerate() {
        match c {
            b'<' => {
                link_end = i;
                break;
            }
            b'(' => opening += 1,
            b')' => closing += 1,
            _ => {}
        }
    }

    while link_end > 0 {
        match data[link_end - 1] {
            b')' => {
                if closing <= opening {
                    return link_end;
                }
                closing -= 1;
                link_end -= 1;
            }
            b'?' | b'!' | b'.' | b',' | b':' | b'*' | b'_' | b'~' | b'\'' | b'"' => {
                link_end -= 1;
            }
            b';' => {
                if link_end < 2 {
                    link_end -= 1;
                    continue;
                }
                let mut new_end = link_end - 2;
                while new_end > 0 && data[new_end].is_ascii_alphabetic() {
                    new_end -= 1;
                }
                if new_end < link_end - 2 && data[new_end] == b'&' {
                    link_end = new_end;
                } else {
                    link_end -= 1;
                }
            }
            _ => return link_end,
        }
    }
    link_end
}

/// Extends a recognised link start up to whitespace or `<`, then trims it.
fn link_extent(data: &[u8], mut link_end: usize) -> usize {
    while link_end < data.len() && !is_space(data[link_end]) && data[link_end] != b'<' {
        link_end += 1;
    }
    autolink_delim(data, link_end)
}

fn is_safe_scheme(link: &str) -> bool {
    SAFE_SCHEMES.iter().any(|scheme| {
        let len = scheme.len();
        link.len() > len
            && link.as_bytes()[..len].eq_ignore_ascii_case(scheme.as_bytes())
            && is_valid_hostchar(link, len)
    })
}

fn make_link(subject: &mut Subject<'_>, url: String, text: &str) -> Result<NodeId, Error> {
    let link = subject.make(NodeValue::Autolink(LinkData {
        url,
        title: String::new(),
    }))?;
    let text = subject.make_text(text)?;
    subject.doc.append(link, text);
    Ok(link)
}

/// `scheme://host…` with the subject positioned at the `:`. The scheme
/// letters were already emitted as text and are taken back on success.
pub(crate) fn match_url(
    subject: &mut Subject<'_>,
    parent: NodeId,
) -> Result<Option<NodeId>, Error> {
    if subject.brackets_open() {
        return Ok(None);
    }
    let input = subject.input;
    let max_rewind = subject.pos;
    let data = &input.as_bytes()[max_rewind..];
    let size = data.len();
    if size < 4 || data[1] != b'/' || data[2] != b'/' {
        return Ok(None);
    }

    let mut rewind = 0;
    while rewind < max_rewind && input.as_bytes()[max_rewind - rewind - 1].is_ascii_alphabetic() {
        rewind += 1;
    }
    if !is_safe_scheme(&input[max_rewind - rewind..]) {
        return Ok(None);
    }

    let domain_len = check_domain(&input[max_rewind + 3..], true);
    if domain_len == 0 {
        return Ok(None);
    }
    let link_end = link_extent(data, 3 + domain_len);
    if link_end == 0 {
        return Ok(None);
    }

    let scheme = &input[max_rewind - rewind..max_rewind];
    if !unput(subject.doc, parent, scheme) {
        return Ok(None);
    }

    subject.pos = max_rewind + link_end;
    let url = &input[max_rewind - rewind..max_rewind + link_end];
    make_link(subject, url.to_string(), url).map(Some)
}

/// `www.host…` at a word start, linked with an `http://` prefix.
pub(crate) fn match_www(subject: &mut Subject<'_>) -> Result<Option<NodeId>, Error> {
    if subject.brackets_open() {
        return Ok(None);
    }
    let input = subject.input;
    let max_rewind = subject.pos;
    if max_rewind > 0 {
        let prev = input.as_bytes()[max_rewind - 1];
        if !b"*_~(".contains(&prev) && !is_space(prev) {
            return Ok(None);
        }
    }

    let rest = &input[max_rewind..];
    if !rest.starts_with("www.") {
        return Ok(None);
    }
    let domain_len = check_domain(rest, false);
    if domain_len == 0 {
        return Ok(None);
    }
    let link_end = link_extent(rest.as_bytes(), domain_len);
    if link_end == 0 {
        return Ok(None);
    }

    subject.pos = max_rewind + link_end;
    let text = &rest[..link_end];
    make_link(subject, format!("http://{text}"), text).map(Some)
}

/// Takes `text` back off the end of the trailing text children of
/// `parent`. Leaves the tree untouched and returns false when those
/// children do not end with it.
fn unput(doc: &mut Document, parent: NodeId, text: &str) -> bool {
    let mut tail = String::new();
    let mut node = doc.last_child(parent);
    while tail.len() < text.len() {
        let Some(n) = node else { break };
        let Some(t) = doc.value(n).text() else { break };
        tail.insert_str(0, t);
        node = doc.previous_sibling(n);
    }
    if !tail.ends_with(text) {
        return false;
    }

    let mut remaining = text.len();
    while remaining > 0 {
        let Some(last) = doc.last_child(parent) else { break };
        let Some(t) = doc.value_mut(last).text_mut() else { break };
        if t.len() <= remaining {
            remaining -= t.len();
            doc.detach(last);
        } else {
            let keep = t.len() - remaining;
            t.truncate(keep);
            remaining = 0;
        }
    }
    true
}

/// Links bare e-mail addresses found in text outside links.
pub(crate) fn postprocess(doc: &mut Document) -> Result<(), Error> {
    consolidate_text_nodes(doc);

    for text in text_outside_links(doc) {
        link_emails(doc, text)?;
    }
    Ok(())
}

/// Text nodes in document order, skipping the contents of links.
fn text_outside_links(doc: &Document) -> Vec<NodeId> {
    let root = doc.root();
    let mut found = Vec::new();
    let mut next = doc.first_child(root);

    while let Some(node) = next {
        let value = doc.value(node);
        if matches!(value, NodeValue::Text(_)) {
            found.push(node);
        }
        let descend = !matches!(value, NodeValue::Link(_) | NodeValue::Autolink(_));
        next = match doc.first_child(node) {
            Some(child) if descend => Some(child),
            _ => following(doc, root, node),
        };
    }
    found
}

/// The next node after `node` and its subtree, staying below `root`.
fn following(doc: &Document, root: NodeId, mut node: NodeId) -> Option<NodeId> {
    loop {
        if node == root {
            return None;
        }
        if let Some(sibling) = doc.next_sibling(node) {
            return Some(sibling);
        }
        node = doc.parent(node)?;
    }
}

/// Merges runs of adjacent text siblings into their first node.
fn consolidate_text_nodes(doc: &mut Document) {
    let parents: Vec<NodeId> = doc.descendants(doc.root()).collect();
    for parent in parents {
        let mut child = doc.first_child(parent);
        while let Some(c) = child {
            if matches!(doc.value(c), NodeValue::Text(_)) {
                while let Some(next) = doc.next_sibling(c) {
                    let Some(extra) = doc.value(next).text().map(str::to_owned) else {
                        break;
                    };
                    if let Some(t) = doc.value_mut(c).text_mut() {
                        t.push_str(&extra);
                    }
                    doc.detach(next);
                }
            }
            child = doc.next_sibling(c);
        }
    }
}

/// Whether the bytes right before `at - rewind` spell `protocol` (which
/// ends in `:`) and are not glued to a preceding alphanumeric.
fn validate_protocol(protocol: &[u8], data: &[u8], at: usize, rewind: usize, max_rewind: usize) -> bool {
    let len = protocol.len();
    if len > max_rewind - rewind {
        return false;
    }
    let start = at - rewind - len;
    if &data[start..at - rewind] != protocol {
        return false;
    }
    len == max_rewind - rewind || !data[start - 1].is_ascii_alphanumeric()
}

/// Splits `text` around every e-mail address it contains.
fn link_emails(doc: &mut Document, mut text: NodeId) -> Result<(), Error> {
    let Some(literal) = doc.value(text).text().map(str::to_owned) else {
        return Ok(());
    };
    let data = literal.as_bytes();
    let size = data.len();
    let mut start = 0;
    let mut offset = 0;

    loop {
        let base = start + offset;
        let Some(max_rewind) = data[base..].iter().position(|&b| b == b'@') else {
            break;
        };
        let at = base + max_rewind;

        let mut auto_mailto = true;
        let mut rewind = 0;
        while rewind < max_rewind {
            let c = data[at - rewind - 1];
            if c.is_ascii_alphanumeric() || b".+-_".contains(&c) {
                rewind += 1;
                continue;
            }
            if c == b':' && validate_protocol(b"mailto:", data, at, rewind, max_rewind) {
                auto_mailto = false;
                rewind += 1;
                continue;
            }
            break;
        }
        if rewind == 0 {
            offset += max_rewind + 1;
            continue;
        }

        let rest = size - at;
        let mut link_end = 0;
        let mut nb = 0;
        let mut np = 0;
        while link_end < rest {
            let c = data[at + link_end];
            if c.is_ascii_alphanumeric() {
                // part of a label
            } else if c == b'@' {
                nb += 1;
            } else if c == b'.'
                && link_end + 1 < rest
                && data[at + link_end + 1].is_ascii_alphanumeric()
            {
                np += 1;
            } else if c != b'-' && c != b'_' {
                break;
            }
            link_end += 1;
        }

        let last = data[at + link_end - 1];
        if link_end < 2 || nb != 1 || np == 0 || (!last.is_ascii_alphabetic() && last != b'.') {
            offset += max_rewind + link_end;
            continue;
        }

        let link_end = autolink_delim(&data[at..], link_end);
        if link_end == 0 {
            offset += max_rewind + 1;
            continue;
        }

        let link_start = at - rewind;
        let link_stop = at + link_end;
        let email = &literal[link_start..link_stop];
        let url = if auto_mailto {
            format!("mailto:{email}")
        } else {
            email.to_string()
        };

        let link = doc.alloc(NodeValue::Autolink(LinkData {
            url,
            title: String::new(),
        }))?;
        let link_text = doc.alloc(NodeValue::Text(email.to_string()))?;
        doc.append(link, link_text);
        doc.insert_after(text, link);

        let pre = &literal[start..link_start];
        if pre.is_empty() {
            doc.detach(text);
        } else if let Some(t) = doc.value_mut(text).text_mut() {
            *t = pre.to_string();
        }

        if link_stop == size {
            return Ok(());
        }
        let post = doc.alloc(NodeValue::Text(literal[link_stop..].to_string()))?;
        doc.insert_after(link, post);
        text = post;
        start = link_stop;
        offset = 0;
    }
    Ok(())
}

pub(crate) fn render(
    renderer: &mut HtmlRenderer<'_>,
    doc: &Document,
    node: NodeId,
    entering: bool,
) -> Result<bool, Error> {
    if let NodeValue::Autolink(link) = doc.value(node) {
        renderer.render_link(link, entering)?;
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Converter;
    use crate::extensions::Extension;
    use crate::options::Options;

    fn html(input: &str) -> String {
        Converter::with_extensions(&[Extension::Autolink], Options::DEFAULT)
            .markdown_to_html(input.as_bytes())
            .unwrap()
    }

    #[test]
    fn domains() {
        assert_eq!(check_domain("www.example.com", false), 14);
        assert_eq!(check_domain("localhost", false), 0);
        assert_eq!(check_domain("localhost", true), 8);
        assert_eq!(check_domain("www.xxx._yyy.zzz", false), 0);
        assert_eq!(check_domain("www._xxx.yyy.zzz", false), 15);
    }

    #[test]
    fn trailing_punctuation_is_trimmed() {
        fn trim(s: &str) -> &str {
            &s[..autolink_delim(s.as_bytes(), s.len())]
        }
        assert_eq!(trim("www.a.com."), "www.a.com");
        assert_eq!(trim("www.a.com/x_(y))"), "www.a.com/x_(y)");
        assert_eq!(trim("www.a.com/&hl;"), "www.a.com/");
        assert_eq!(trim("www.a.com/x;"), "www.a.com/x");
        assert_eq!(trim("www.a.com<b"), "www.a.com");
    }

    #[test]
    fn bare_urls() {
        assert_eq!(
            html("see https://x.test/a?b=c."),
            "<p>see <a href=\"https://x.test/a?b=c\">https://x.test/a?b=c</a>.</p>\n"
        );
        assert_eq!(html("mailto://x"), "<p>mailto://x</p>\n");
    }

    #[test]
    fn www_hosts_get_a_scheme() {
        assert_eq!(
            html("(www.commonmark.org/help)"),
            "<p>(<a href=\"http://www.commonmark.org/help\">www.commonmark.org/help</a>)</p>\n"
        );
        assert_eq!(html("awww.example.com"), "<p>awww.example.com</p>\n");
    }

    #[test]
    fn email_addresses() {
        assert_eq!(
            html("write foo.bar@example.com now"),
            "<p>write <a href=\"mailto:foo.bar@example.com\">foo.bar@example.com</a> now</p>\n"
        );
        assert_eq!(
            html("mailto:a@b.co"),
            "<p><a href=\"mailto:a@b.co\">mailto:a@b.co</a></p>\n"
        );
        assert_eq!(html("a.b-c_d@a.b-"), "<p>a.b-c_d@a.b-</p>\n");
        assert_eq!(html("a.b-c_d@a.b_"), "<p>a.b-c_d@a.b_</p>\n");
    }

    #[test]
    fn no_autolinks_inside_link_text() {
        assert_eq!(
            html("[www.a.com](/x)"),
            "<p><a href=\"/x\">www.a.com</a></p>\n"
        );
        assert_eq!(html("[a@b.co](/x)"), "<p><a href=\"/x\">a@b.co</a></p>\n");
    }

    #[test]
    fn emails_deep_inside_emphasis() {
        let depth = 5000;
        let input = "*a ".repeat(depth) + "x@y.co " + &"a* ".repeat(depth);
        let out = html(&input);
        assert_eq!(out.matches("<em>").count(), depth);
        assert_eq!(out.matches("<a href=\"mailto:x@y.co\">x@y.co</a>").count(), 1);
    }
}
