//! GitHub-flavored Markdown to HTML, with the table, autolink and
//! strikethrough extensions.
//!
//! A [`Converter`] holds the options and the attached extensions and can be
//! shared freely once built:
//!
//! ```
//! let converter = gfmark::Converter::strict_gfm();
//! let html = converter.markdown_to_html(b"~~gone~~ www.example.com").unwrap();
//! assert_eq!(
//!     html,
//!     "<p><del>gone</del> <a href=\"http://www.example.com\">www.example.com</a></p>\n"
//! );
//! ```
//!
//! The free functions [`init`], [`markdown_to_html`] and [`deinit`] wrap a
//! process-wide default converter.

pub mod ast;
mod entity;
pub mod error;
pub mod extensions;
pub mod options;
pub(crate) mod parser;
pub mod renderer;
mod scanners;
mod strings;

use std::sync::{PoisonError, RwLock};

use tracing::debug;

pub use ast::{Document, NodeId, NodeValue};
pub use error::{Error, Result};
pub use extensions::{Extension, Registry};
pub use options::Options;

use parser::BlockParser;
use renderer::HtmlRenderer;

/// Options plus the extensions attached to every parse and render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Converter {
    extensions: Vec<Extension>,
    options: Options,
}

impl Converter {
    /// Attaches `table`, `autolink` and `strikethrough` as found in
    /// `registry`.
    pub fn new(registry: &Registry, options: Options) -> Self {
        let extensions = ["table", "autolink", "strikethrough"]
            .iter()
            .filter_map(|name| registry.find(name))
            .collect();
        Converter {
            extensions,
            options,
        }
    }

    /// A converter with exactly `extensions` attached.
    pub fn with_extensions(extensions: &[Extension], options: Options) -> Self {
        Converter {
            extensions: extensions.to_vec(),
            options,
        }
    }

    /// All extensions, `~~` only for strikethrough.
    pub fn strict_gfm() -> Self {
        Self::new(&Registry::builtin(), Options::strict_gfm())
    }

    /// As [`Converter::strict_gfm`], with code languages in `<pre lang>`.
    pub fn github_pre_lang() -> Self {
        Self::new(&Registry::builtin(), Options::github_pre_lang())
    }

    pub fn options(&self) -> Options {
        self.options
    }

    pub fn extensions(&self) -> &[Extension] {
        &self.extensions
    }

    pub fn parse(&self, input: &[u8]) -> Result<Document> {
        let mut parser = BlockParser::new(self.options, &self.extensions);
        parser.feed(input)?;
        parser.finish()
    }

    pub fn render(&self, doc: &Document) -> Result<String> {
        HtmlRenderer::new(self.options, &self.extensions).render(doc)
    }

    pub fn markdown_to_html(&self, input: &[u8]) -> Result<String> {
        let doc = self.parse(input)?;
        let html = self.render(&doc)?;
        debug!(
            input_bytes = input.len(),
            nodes = doc.node_count(),
            output_bytes = html.len(),
            "converted markdown"
        );
        Ok(html)
    }
}

static CONVERTER: RwLock<Option<Converter>> = RwLock::new(None);

/// Registers the built-in extensions and installs the strict GFM converter
/// as the process-wide default. Calling it again is harmless.
pub fn init() {
    init_with_options(Options::strict_gfm());
}

/// As [`init`], with a caller-chosen profile.
pub fn init_with_options(options: Options) {
    let registry = extensions::ensure_registered();
    let converter = Converter::new(&registry, options);
    let mut slot = CONVERTER.write().unwrap_or_else(PoisonError::into_inner);
    debug!(?options, extensions = ?converter.extensions(), "installed default converter");
    *slot = Some(converter);
}

/// Converts with the process-wide default converter.
pub fn markdown_to_html(input: &[u8]) -> Result<String> {
    let slot = CONVERTER.read().unwrap_or_else(PoisonError::into_inner);
    let converter = slot.as_ref().ok_or(Error::NotInitialized)?;
    converter.markdown_to_html(input)
}

/// Drops the default converter and the extension registry.
pub fn deinit() {
    let previous = CONVERTER
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .take();
    extensions::release();
    if previous.is_some() {
        debug!("released default converter");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converter_resolves_all_builtins() {
        let converter = Converter::strict_gfm();
        assert_eq!(converter.extensions(), Extension::ALL);
        assert_eq!(converter.options(), Options::STRIKETHROUGH_DOUBLE_TILDE);
    }

    #[test]
    fn basic_image() {
        let html = Converter::strict_gfm()
            .markdown_to_html(b"![foo](/url \"title\")\n")
            .unwrap();
        assert_eq!(html, "<p><img src=\"/url\" alt=\"foo\" title=\"title\" /></p>\n");
    }

    #[test]
    fn first_reference_definition_wins() {
        let html = Converter::strict_gfm()
            .markdown_to_html(b"[a]: /one\n[a]: /two\n[link][a]")
            .unwrap();
        assert_eq!(html, "<p><a href=\"/one\">link</a></p>\n");
    }

    #[test]
    fn multiple_of_three_rule() {
        let html = Converter::strict_gfm().markdown_to_html(b"**a*b**").unwrap();
        assert_eq!(html, "<p><strong>a*b</strong></p>\n");
    }

    #[test]
    fn pre_lang_profile() {
        let html = Converter::github_pre_lang()
            .markdown_to_html(b"```go\nx\n```")
            .unwrap();
        assert_eq!(html, "<pre lang=\"go\"><code>x\n</code></pre>\n");
    }
}
