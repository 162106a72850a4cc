//! `~text~` and `~~text~~` as `<del>`.

use crate::ast::{NodeId, NodeValue};
use crate::error::Error;
use crate::options::Options;
use crate::parser::inlines::Subject;
use crate::renderer::HtmlRenderer;

/// Longest tilde run looked at in one go.
const MAX_RUN: usize = 100;

/// Consumes a run of `~` as a text node, pushing it as a delimiter when it
/// can take part in strikethrough.
pub(crate) fn match_tilde(subject: &mut Subject<'_>) -> Result<Option<NodeId>, Error> {
    let run = subject.scan_delims(b'~', MAX_RUN);
    let literal = "~".repeat(run.count);
    let node = subject.make(NodeValue::Text(literal))?;

    let usable = run.count == 2
        || (run.count == 1 && !subject.options().contains(Options::STRIKETHROUGH_DOUBLE_TILDE));
    if (run.left_flanking || run.right_flanking) && usable {
        subject.push_delimiter(b'~', run.left_flanking, run.right_flanking, node);
    }
    Ok(Some(node))
}

/// Resolves a `~` opener/closer pair. Runs of different lengths stay
/// literal; either way both delimiters and everything between them leave
/// the stack. Returns the delimiter to continue from.
pub(crate) fn insert(
    subject: &mut Subject<'_>,
    opener: usize,
    closer: usize,
) -> Result<Option<usize>, Error> {
    let res = subject.delimiters[closer].next;
    let opener_inl = subject.delimiters[opener].inl;
    let closer_inl = subject.delimiters[closer].inl;

    if subject.text_len(opener_inl) == subject.text_len(closer_inl) {
        *subject.doc.value_mut(opener_inl) = NodeValue::Strikethrough;
        let mut tmp = subject.doc.next_sibling(opener_inl);
        while let Some(t) = tmp {
            if t == closer_inl {
                break;
            }
            tmp = subject.doc.next_sibling(t);
            subject.doc.append(opener_inl, t);
        }
        subject.doc.detach(closer_inl);
    }

    let mut delim = Some(closer);
    while let Some(d) = delim {
        if d == opener {
            break;
        }
        delim = subject.delimiters[d].prev;
        subject.remove_delimiter(d);
    }
    subject.remove_delimiter(opener);

    Ok(res)
}

pub(crate) fn render(renderer: &mut HtmlRenderer<'_>, entering: bool) -> Result<bool, Error> {
    renderer.put(if entering { "<del>" } else { "</del>" })?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use crate::Converter;
    use crate::extensions::Extension;
    use crate::options::Options;

    fn html(input: &str, options: Options) -> String {
        Converter::with_extensions(&[Extension::Strikethrough], options)
            .markdown_to_html(input.as_bytes())
            .unwrap()
    }

    #[test]
    fn single_and_double_tildes() {
        assert_eq!(html("~a~ ~~b~~", Options::DEFAULT), "<p><del>a</del> <del>b</del></p>\n");
    }

    #[test]
    fn double_tilde_mode_leaves_single_runs_alone() {
        let options = Options::STRIKETHROUGH_DOUBLE_TILDE;
        assert_eq!(html("~single~", options), "<p>~single~</p>\n");
        assert_eq!(html("~~double~~", options), "<p><del>double</del></p>\n");
    }

    #[test]
    fn mismatched_and_long_runs_are_literal() {
        assert_eq!(html("~~a~", Options::DEFAULT), "<p>~~a~</p>\n");
        assert_eq!(html("x ~~~a~~~", Options::DEFAULT), "<p>x ~~~a~~~</p>\n");
    }

    #[test]
    fn nests_with_emphasis() {
        assert_eq!(
            html("~~*a* b~~", Options::DEFAULT),
            "<p><del><em>a</em> b</del></p>\n"
        );
    }

    #[test]
    fn tilde_without_extension_is_text() {
        let out = Converter::with_extensions(&[], Options::DEFAULT)
            .markdown_to_html(b"~~a~~")
            .unwrap();
        assert_eq!(out, "<p>~~a~~</p>\n");
    }
}
