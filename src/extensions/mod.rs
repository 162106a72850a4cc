//! The GitHub-flavored extensions and the registry that names them.
//!
//! Extensions are a closed set, so hooks are dispatched with a `match`
//! rather than through trait objects. Each hook is a no-op for extensions
//! that do not take part in that phase.

pub(crate) mod autolink;
pub(crate) mod strikethrough;
pub(crate) mod table;

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ast::{Document, NodeId};
use crate::error::Error;
use crate::parser::BlockParser;
use crate::parser::inlines::Subject;
use crate::renderer::HtmlRenderer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Extension {
    Table,
    Autolink,
    Strikethrough,
}

impl Extension {
    /// Registration order; block and inline hooks run in this order.
    pub const ALL: [Extension; 3] = [Extension::Table, Extension::Autolink, Extension::Strikethrough];

    pub fn name(self) -> &'static str {
        match self {
            Extension::Table => "table",
            Extension::Autolink => "autolink",
            Extension::Strikethrough => "strikethrough",
        }
    }

    /// Characters that must interrupt a run of plain text so the inline
    /// hook gets a chance to look at them.
    pub(crate) fn special_chars(self) -> &'static [u8] {
        match self {
            Extension::Table => b"",
            Extension::Autolink => b":w",
            Extension::Strikethrough => b"~",
        }
    }

    /// Tries to start a block of this extension's kind on the current line.
    pub(crate) fn try_open_block(
        self,
        parser: &mut BlockParser<'_>,
        container: NodeId,
        line: &str,
        indented: bool,
    ) -> Result<Option<NodeId>, Error> {
        match self {
            Extension::Table => table::try_opening_block(parser, container, line, indented),
            Extension::Autolink | Extension::Strikethrough => Ok(None),
        }
    }

    /// Whether an open block owned by this extension continues on `line`.
    pub(crate) fn continues_block(
        self,
        parser: &BlockParser<'_>,
        container: NodeId,
        line: &str,
    ) -> bool {
        match self {
            Extension::Table => table::matches(parser, container, line),
            Extension::Autolink | Extension::Strikethrough => false,
        }
    }

    /// Inline hook for `c`, called only where no core rule applied.
    pub(crate) fn try_parse_inline(
        self,
        subject: &mut Subject<'_>,
        parent: NodeId,
        c: u8,
    ) -> Result<Option<NodeId>, Error> {
        match (self, c) {
            (Extension::Autolink, b':') => autolink::match_url(subject, parent),
            (Extension::Autolink, b'w') => autolink::match_www(subject),
            (Extension::Strikethrough, b'~') => strikethrough::match_tilde(subject),
            _ => Ok(None),
        }
    }

    /// Runs after inline parsing over the whole document.
    pub(crate) fn postprocess(self, doc: &mut Document) -> Result<(), Error> {
        match self {
            Extension::Autolink => autolink::postprocess(doc),
            Extension::Table | Extension::Strikethrough => Ok(()),
        }
    }

    /// Renders a node this extension owns. Returns whether the renderer
    /// should descend into the node's children.
    pub(crate) fn render_node(
        self,
        renderer: &mut HtmlRenderer<'_>,
        doc: &Document,
        node: NodeId,
        entering: bool,
    ) -> Result<bool, Error> {
        match self {
            Extension::Table => table::render(renderer, doc, node, entering),
            Extension::Autolink => autolink::render(renderer, doc, node, entering),
            Extension::Strikethrough => strikethrough::render(renderer, entering),
        }
    }
}

impl fmt::Display for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The built-in extensions, looked up by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registry {
    extensions: Vec<Extension>,
}

impl Registry {
    pub fn builtin() -> Self {
        Registry {
            extensions: Extension::ALL.to_vec(),
        }
    }

    /// Case-sensitive lookup of `"table"`, `"autolink"` or `"strikethrough"`.
    pub fn find(&self, name: &str) -> Option<Extension> {
        self.extensions.iter().copied().find(|ext| ext.name() == name)
    }

    pub fn extensions(&self) -> &[Extension] {
        &self.extensions
    }
}

static REGISTRY: RwLock<Option<Arc<Registry>>> = RwLock::new(None);

/// Populates the process-wide registry if needed and returns it.
pub fn ensure_registered() -> Arc<Registry> {
    if let Some(registry) = REGISTRY
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .as_ref()
    {
        return Arc::clone(registry);
    }

    let mut slot = REGISTRY.write().unwrap_or_else(PoisonError::into_inner);
    let registry = slot.get_or_insert_with(|| {
        debug!(extensions = ?Extension::ALL, "registered built-in extensions");
        Arc::new(Registry::builtin())
    });
    Arc::clone(registry)
}

/// Looks `name` up in the process-wide registry.
pub fn find(name: &str) -> Result<Option<Extension>, Error> {
    let slot = REGISTRY.read().unwrap_or_else(PoisonError::into_inner);
    let registry = slot.as_ref().ok_or(Error::NotInitialized)?;
    Ok(registry.find(name))
}

/// Tears the process-wide registry down. A later `ensure_registered` builds
/// it again.
pub fn release() {
    let mut slot = REGISTRY.write().unwrap_or_else(PoisonError::into_inner);
    if slot.take().is_some() {
        debug!("released extension registry");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_lookup_is_case_sensitive() {
        let registry = Registry::builtin();
        assert_eq!(registry.find("table"), Some(Extension::Table));
        assert_eq!(registry.find("autolink"), Some(Extension::Autolink));
        assert_eq!(registry.find("strikethrough"), Some(Extension::Strikethrough));
        assert_eq!(registry.find("Table"), None);
        assert_eq!(registry.find("tasklist"), None);
    }

    #[test]
    fn names_round_trip_through_serde() {
        let json = serde_json::to_string(&Extension::ALL).unwrap();
        assert_eq!(json, r#"["table","autolink","strikethrough"]"#);
        let back: Vec<Extension> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Extension::ALL);
    }
}
