//! HTML renderer.
//!
//! Walks the tree in document order, producing an enter event for every
//! node and an exit event for nodes that can have children, and writes the
//! HTML for each event into one growing buffer.

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

use crate::ast::{Document, LinkData, ListType, NodeId, NodeValue};
use crate::error::Error;
use crate::extensions::Extension;
use crate::options::Options;

/// Bytes percent-encoded in link destinations, on top of everything
/// outside ASCII. `&` and `'` are entity-escaped instead.
const HREF_ESCAPE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Table rendering state shared by the rows and cells of one table.
#[derive(Debug, Default)]
pub(crate) struct TableState {
    pub(crate) in_header: bool,
    pub(crate) need_closing_body: bool,
}

pub struct HtmlRenderer<'a> {
    options: Options,
    extensions: &'a [Extension],
    out: String,
    /// Image whose children are being written as plain `alt` text.
    plain: Option<NodeId>,
    pub(crate) table: TableState,
}

impl<'a> HtmlRenderer<'a> {
    pub fn new(options: Options, extensions: &'a [Extension]) -> Self {
        HtmlRenderer {
            options,
            extensions,
            out: String::new(),
            plain: None,
            table: TableState::default(),
        }
    }

    /// Renders the whole document.
    pub fn render(mut self, doc: &Document) -> Result<String, Error> {
        let root = doc.root();
        let mut next = Some((root, true));

        while let Some((node, entering)) = next {
            let descend = self.render_node(doc, node, entering)?;
            next = if entering && descend && !is_leaf(doc.value(node)) {
                Some(match doc.first_child(node) {
                    Some(child) => (child, true),
                    None => (node, false),
                })
            } else if node == root {
                None
            } else if let Some(sibling) = doc.next_sibling(node) {
                Some((sibling, true))
            } else {
                doc.parent(node).map(|parent| (parent, false))
            };
        }
        Ok(self.out)
    }

    pub(crate) fn put(&mut self, s: &str) -> Result<(), Error> {
        self.out.try_reserve(s.len())?;
        self.out.push_str(s);
        Ok(())
    }

    /// Starts a new line unless the output is empty or already at one.
    pub(crate) fn cr(&mut self) -> Result<(), Error> {
        if !self.out.is_empty() && !self.out.ends_with('\n') {
            self.put("\n")?;
        }
        Ok(())
    }

    pub(crate) fn escape_html(&mut self, text: &str) -> Result<(), Error> {
        self.out.try_reserve(text.len())?;
        html_escape::encode_double_quoted_attribute_to_string(text, &mut self.out);
        Ok(())
    }

    pub(crate) fn escape_href(&mut self, url: &str) -> Result<(), Error> {
        self.out.try_reserve(url.len())?;
        for chunk in utf8_percent_encode(url, HREF_ESCAPE) {
            for (i, part) in chunk.split('&').enumerate() {
                if i > 0 {
                    self.put("&amp;")?;
                }
                for (j, piece) in part.split('\'').enumerate() {
                    if j > 0 {
                        self.put("&#x27;")?;
                    }
                    self.put(piece)?;
                }
            }
        }
        Ok(())
    }

    fn put_url(&mut self, url: &str) -> Result<(), Error> {
        if self.options.contains(Options::UNSAFE) || !is_dangerous_url(url) {
            self.escape_href(url)?;
        }
        Ok(())
    }

    /// `<a href="…" title="…">` and `</a>`.
    pub(crate) fn render_link(&mut self, link: &LinkData, entering: bool) -> Result<(), Error> {
        if entering {
            self.put("<a href=\"")?;
            self.put_url(&link.url)?;
            if !link.title.is_empty() {
                self.put("\" title=\"")?;
                self.escape_html(&link.title)?;
            }
            self.put("\">")
        } else {
            self.put("</a>")
        }
    }

    /// Writes one event. Returns whether the children should be visited.
    fn render_node(&mut self, doc: &Document, node: NodeId, entering: bool) -> Result<bool, Error> {
        if self.plain == Some(node) {
            self.plain = None;
        }

        let value = doc.value(node);
        if self.plain.is_some() {
            match value {
                NodeValue::Text(literal)
                | NodeValue::Code(literal)
                | NodeValue::HtmlInline(literal) => self.escape_html(literal)?,
                NodeValue::LineBreak | NodeValue::SoftBreak => self.put(" ")?,
                _ => {}
            }
            return Ok(true);
        }

        if let Some(ext) = value.owner() {
            if self.extensions.contains(&ext) {
                return ext.render_node(self, doc, node, entering);
            }
            if entering {
                self.escape_html(&doc.text_content(node))?;
            }
            return Ok(false);
        }

        match value {
            NodeValue::Document => {}
            NodeValue::BlockQuote => {
                self.cr()?;
                self.put(if entering { "<blockquote>\n" } else { "</blockquote>\n" })?;
            }
            NodeValue::List(list) => {
                self.cr()?;
                match (list.list_type, entering) {
                    (ListType::Bullet, true) => self.put("<ul>\n")?,
                    (ListType::Bullet, false) => self.put("</ul>\n")?,
                    (ListType::Ordered, true) if list.start == 1 => {
                        self.put("<ol>\n")?
                    }
                    (ListType::Ordered, true) => {
                        self.put(&format!("<ol start=\"{}\">\n", list.start))?
                    }
                    (ListType::Ordered, false) => self.put("</ol>\n")?,
                }
            }
            NodeValue::Item(..) => {
                if entering {
                    self.cr()?;
                    self.put("<li>")?;
                } else {
                    self.put("</li>\n")?;
                }
            }
            NodeValue::Heading(heading) => {
                if entering {
                    self.cr()?;
                    self.put(&format!("<h{}>", heading.level))?;
                } else {
                    self.put(&format!("</h{}>\n", heading.level))?;
                }
            }
            NodeValue::CodeBlock(code) => {
                self.cr()?;
                let lang = code
                    .info
                    .split(|c: char| c.is_ascii_whitespace())
                    .next()
                    .unwrap_or_default();
                if lang.is_empty() {
                    self.put("<pre><code>")?;
                } else if self.options.contains(Options::GITHUB_PRE_LANG) {
                    self.put("<pre lang=\"")?;
                    self.escape_html(lang)?;
                    self.put("\"><code>")?;
                } else {
                    self.put("<pre><code class=\"language-")?;
                    self.escape_html(lang)?;
                    self.put("\">")?;
                }
                self.escape_html(&code.literal)?;
                self.put("</code></pre>\n")?;
            }
            NodeValue::HtmlBlock(html) => {
                self.cr()?;
                if self.options.contains(Options::UNSAFE) {
                    self.put(&html.literal)?;
                } else {
                    self.put("<!-- raw HTML omitted -->")?;
                }
                self.cr()?;
            }
            NodeValue::ThematicBreak => {
                self.cr()?;
                self.put("<hr />\n")?;
            }
            NodeValue::Paragraph => {
                let tight = doc
                    .parent(node)
                    .and_then(|parent| doc.parent(parent))
                    .is_some_and(|grandparent| match doc.value(grandparent) {
                        NodeValue::List(list) => list.tight,
                        _ => false,
                    });
                if !tight {
                    if entering {
                        self.cr()?;
                        self.put("<p>")?;
                    } else {
                        self.put("</p>\n")?;
                    }
                }
            }
            NodeValue::Text(literal) => self.escape_html(literal)?,
            NodeValue::LineBreak => self.put("<br />\n")?,
            NodeValue::SoftBreak => self.put("\n")?,
            NodeValue::Code(literal) => {
                self.put("<code>")?;
                self.escape_html(literal)?;
                self.put("</code>")?;
            }
            NodeValue::HtmlInline(literal) => {
                if self.options.contains(Options::UNSAFE) {
                    self.put(literal)?;
                } else {
                    self.put("<!-- raw HTML omitted -->")?;
                }
            }
            NodeValue::Strong => self.put(if entering { "<strong>" } else { "</strong>" })?,
            NodeValue::Emphasis => self.put(if entering { "<em>" } else { "</em>" })?,
            NodeValue::Link(link) => self.render_link(link, entering)?,
            NodeValue::Image(link) => {
                if entering {
                    self.put("<img src=\"")?;
                    self.put_url(&link.url)?;
                    self.put("\" alt=\"")?;
                    self.plain = Some(node);
                } else {
                    if !link.title.is_empty() {
                        self.put("\" title=\"")?;
                        self.escape_html(&link.title)?;
                    }
                    self.put("\" />")?;
                }
            }
            // Owned by extensions and handled above.
            NodeValue::Table(..)
            | NodeValue::TableRow { .. }
            | NodeValue::TableCell
            | NodeValue::Strikethrough
            | NodeValue::Autolink(..) => {}
        }
        Ok(true)
    }
}

/// Kinds that never have children and get no exit event.
fn is_leaf(value: &NodeValue) -> bool {
    matches!(
        value,
        NodeValue::CodeBlock(..)
            | NodeValue::HtmlBlock(..)
            | NodeValue::ThematicBreak
            | NodeValue::Text(..)
            | NodeValue::SoftBreak
            | NodeValue::LineBreak
            | NodeValue::Code(..)
            | NodeValue::HtmlInline(..)
    )
}

/// `javascript:`, `vbscript:`, `file:` and `data:` URLs other than common
/// image types.
fn is_dangerous_url(url: &str) -> bool {
    let starts_with = |prefix: &str| {
        url.len() >= prefix.len() && url.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
    };
    if starts_with("javascript:") || starts_with("vbscript:") || starts_with("file:") {
        return true;
    }
    if starts_with("data:") {
        let safe_image = ["image/png", "image/gif", "image/jpeg", "image/webp"]
            .iter()
            .any(|kind| {
                let rest = &url.as_bytes()[5..];
                rest.len() >= kind.len() && rest[..kind.len()].eq_ignore_ascii_case(kind.as_bytes())
            });
        return !safe_image;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Converter;
    use pretty_assertions::assert_eq;

    fn html(input: &str) -> String {
        Converter::with_extensions(&[], Options::DEFAULT)
            .markdown_to_html(input.as_bytes())
            .unwrap()
    }

    fn href(url: &str) -> String {
        let mut renderer = HtmlRenderer::new(Options::DEFAULT, &[]);
        renderer.escape_href(url).unwrap();
        renderer.out
    }

    #[test]
    fn empty_document_renders_nothing() {
        assert_eq!(html(""), "");
    }

    #[test]
    fn hrefs_are_percent_encoded() {
        assert_eq!(href("foo%20bä"), "foo%20b%C3%A4");
        assert_eq!(href("/a b?c=d&e='f'"), "/a%20b?c=d&amp;e=&#x27;f&#x27;");
        assert_eq!(href("http://x/\\[\\"), "http://x/%5C%5B%5C");
    }

    #[test]
    fn dangerous_urls() {
        assert!(is_dangerous_url("JavaScript:alert(1)"));
        assert!(is_dangerous_url("data:text/html,x"));
        assert!(!is_dangerous_url("data:image/png;base64,x"));
        assert!(!is_dangerous_url("https://x.test"));
        assert_eq!(
            html("[a](javascript:alert(1))"),
            "<p><a href=\"\">a</a></p>\n"
        );
    }

    #[test]
    fn raw_html_is_omitted_unless_unsafe() {
        assert_eq!(html("<div>\nx\n</div>"), "<!-- raw HTML omitted -->\n");
        assert_eq!(html("a <b>c</b>"), "<p>a <!-- raw HTML omitted -->c<!-- raw HTML omitted --></p>\n");
        let unsafe_html = Converter::with_extensions(&[], Options::UNSAFE)
            .markdown_to_html(b"a <b>c</b>")
            .unwrap();
        assert_eq!(unsafe_html, "<p>a <b>c</b></p>\n");
    }

    #[test]
    fn image_alt_is_plain_text() {
        assert_eq!(
            html("![*a* `b`](/i.png \"t\")"),
            "<p><img src=\"/i.png\" alt=\"a b\" title=\"t\" /></p>\n"
        );
    }

    #[test]
    fn tight_lists_unwrap_paragraphs() {
        assert_eq!(html("- a\n- b\n"), "<ul>\n<li>a</li>\n<li>b</li>\n</ul>\n");
        assert_eq!(
            html("3. a\n\n4. b\n"),
            "<ol start=\"3\">\n<li>\n<p>a</p>\n</li>\n<li>\n<p>b</p>\n</li>\n</ol>\n"
        );
    }

    #[test]
    fn code_block_language() {
        assert_eq!(
            html("```rust extra\nfn x() {}\n```\n"),
            "<pre><code class=\"language-rust\">fn x() {}\n</code></pre>\n"
        );
        let pre_lang = Converter::with_extensions(&[], Options::GITHUB_PRE_LANG)
            .markdown_to_html(b"```rust\nx\n```\n")
            .unwrap();
        assert_eq!(pre_lang, "<pre lang=\"rust\"><code>x\n</code></pre>\n");
    }

    #[test]
    fn extension_nodes_without_their_extension_render_as_text() {
        let with = Converter::with_extensions(&[Extension::Strikethrough], Options::DEFAULT);
        let doc = with.parse(b"~~a <b~~").unwrap();
        let without = HtmlRenderer::new(Options::DEFAULT, &[]).render(&doc).unwrap();
        assert_eq!(without, "<p>a &lt;b</p>\n");
    }

    #[test]
    fn rendering_is_repeatable() {
        let converter = Converter::strict_gfm();
        let doc = converter.parse(b"# t\n\n| a |\n| - |\n| ~~b~~ |\n").unwrap();
        assert_eq!(converter.render(&doc).unwrap(), converter.render(&doc).unwrap());
    }
}
