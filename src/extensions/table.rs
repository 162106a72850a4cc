//! Pipe tables: a header row, a delimiter row, then body rows until a
//! line that is not a row.
//!
//! A table starts out as a paragraph. When the next line is a delimiter
//! row whose cell count matches the paragraph's last line, the paragraph
//! node is rewritten in place into a table.

use tracing::trace;

use crate::ast::{Alignment, Document, NodeId, NodeValue};
use crate::error::Error;
use crate::parser::BlockParser;
use crate::renderer::HtmlRenderer;
use crate::strings;

#[derive(Debug, PartialEq, Eq)]
struct Row {
    cells: Vec<String>,
    /// Start of the row within the scanned text; everything before it
    /// belongs to the preceding paragraph.
    paragraph_offset: usize,
}

fn is_spacechar(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | 0x0b | 0x0c)
}

/// Cell content up to an unescaped `|` or the line end.
fn scan_cell(s: &[u8], i: usize) -> usize {
    let mut j = i;
    loop {
        match s.get(j) {
            Some(b'\\') if s.get(j + 1) == Some(&b'|') => j += 2,
            Some(b'|' | b'\r' | b'\n') | None => break,
            Some(_) => j += 1,
        }
    }
    j - i
}

/// A `|` and the spaces after it.
fn scan_cell_end(s: &[u8], i: usize) -> usize {
    if s.get(i) != Some(&b'|') {
        return 0;
    }
    1 + s[i + 1..].iter().take_while(|&&b| is_spacechar(b)).count()
}

/// Trailing spaces and the line ending.
fn scan_row_end(s: &[u8], i: usize) -> usize {
    let spaces = s[i..].iter().take_while(|&&b| is_spacechar(b)).count();
    let j = i + spaces;
    match (s.get(j), s.get(j + 1)) {
        (Some(b'\n'), _) => spaces + 1,
        (Some(b'\r'), Some(b'\n')) => spaces + 2,
        (Some(b'\r'), _) => spaces + 1,
        _ => 0,
    }
}

/// Spaces, an optional `:`, at least one `-`, an optional `:`, spaces.
fn scan_delimiter_cell(s: &[u8], mut i: usize) -> Option<usize> {
    while s.get(i).is_some_and(|&b| is_spacechar(b)) {
        i += 1;
    }
    if s.get(i) == Some(&b':') {
        i += 1;
    }
    let dashes = s[i.min(s.len())..].iter().take_while(|&&b| b == b'-').count();
    if dashes == 0 {
        return None;
    }
    i += dashes;
    if s.get(i) == Some(&b':') {
        i += 1;
    }
    while s.get(i).is_some_and(|&b| is_spacechar(b)) {
        i += 1;
    }
    Some(i)
}

/// Whether `s` is a full delimiter row such as `| :-- | --: |`.
fn is_delimiter_row(s: &[u8]) -> bool {
    let start = usize::from(s.first() == Some(&b'|'));
    let Some(mut i) = scan_delimiter_cell(s, start) else {
        return false;
    };
    while s.get(i) == Some(&b'|') {
        match scan_delimiter_cell(s, i + 1) {
            Some(next) => i = next,
            None => {
                i += 1;
                break;
            }
        }
    }
    let end = scan_row_end(s, i);
    end > 0 && i + end == s.len()
}

fn unescape_pipes(s: &str) -> String {
    s.replace("\\|", "|")
}

/// Splits one row into cells. When `s` holds several lines, each line
/// that parses as a row restarts the scan, so the result is the last line
/// and `paragraph_offset` marks where it begins.
fn row_from_str(s: &str) -> Option<Row> {
    let bytes = s.as_bytes();
    let len = bytes.len();
    let mut cells = Vec::new();
    let mut paragraph_offset = 0;
    let mut offset = scan_cell_end(bytes, 0);
    let mut expect_more_cells = true;

    while offset < len && expect_more_cells {
        let cell_matched = scan_cell(bytes, offset);
        let pipe_matched = scan_cell_end(bytes, offset + cell_matched);

        if cell_matched > 0 || pipe_matched > 0 {
            let cell = unescape_pipes(&s[offset..offset + cell_matched]);
            cells.push(strings::trim(&cell).to_string());
        }
        offset += cell_matched + pipe_matched;

        if pipe_matched > 0 {
            expect_more_cells = true;
        } else {
            let row_end = scan_row_end(bytes, offset);
            offset += row_end;
            if row_end > 0 && offset != len {
                paragraph_offset = offset;
                cells.clear();
                offset += scan_cell_end(bytes, offset);
                expect_more_cells = true;
            } else {
                expect_more_cells = false;
            }
        }
    }

    if offset != len || cells.is_empty() {
        return None;
    }
    Some(Row {
        cells,
        paragraph_offset,
    })
}

fn alignment(cell: &str) -> Alignment {
    match (cell.starts_with(':'), cell.ends_with(':')) {
        (true, true) => Alignment::Center,
        (true, false) => Alignment::Left,
        (false, true) => Alignment::Right,
        (false, false) => Alignment::None,
    }
}

/// Block hook: a delimiter row under a paragraph opens a table, and a row
/// line under an open table adds a body row.
pub(crate) fn try_opening_block(
    parser: &mut BlockParser<'_>,
    container: NodeId,
    line: &str,
    indented: bool,
) -> Result<Option<NodeId>, Error> {
    if indented {
        return Ok(None);
    }
    let columns = match parser.doc.value(container) {
        NodeValue::Paragraph => None,
        NodeValue::Table(alignments) => Some(alignments.len()),
        _ => return Ok(None),
    };
    match columns {
        Some(columns) => try_opening_row(parser, container, columns, line),
        None => try_opening_header(parser, container, line),
    }
}

fn try_opening_header(
    parser: &mut BlockParser<'_>,
    container: NodeId,
    line: &str,
) -> Result<Option<NodeId>, Error> {
    let rest = &line[parser.first_nonspace..];
    if !is_delimiter_row(rest.as_bytes()) {
        return Ok(None);
    }
    let Some(delimiter_row) = row_from_str(rest) else {
        return Ok(None);
    };

    if !parser.resolve_reference_definitions(container) {
        return Ok(None);
    }
    let content = parser.doc.get(container).content.clone();
    let header_row = match row_from_str(&content) {
        Some(row) if row.cells.len() == delimiter_row.cells.len() => row,
        _ => return Ok(None),
    };

    trace!(columns = header_row.cells.len(), "table header recognised");

    if header_row.paragraph_offset > 0 {
        let leading = unescape_pipes(&content[..header_row.paragraph_offset]);
        let paragraph = parser.doc.alloc(NodeValue::Paragraph)?;
        parser.doc.get_mut(paragraph).content = strings::trim(&leading).to_string();
        parser.doc.insert_before(container, paragraph);
    }

    let alignments = delimiter_row.cells.iter().map(|c| alignment(c)).collect();
    *parser.doc.value_mut(container) = NodeValue::Table(alignments);
    parser.doc.get_mut(container).content.clear();

    let header = parser.add_child(container, NodeValue::TableRow { header: true })?;
    add_cells(&mut parser.doc, header, header_row.cells, None)?;

    parser.advance_to_line_end(line);
    Ok(Some(container))
}

fn try_opening_row(
    parser: &mut BlockParser<'_>,
    table: NodeId,
    columns: usize,
    line: &str,
) -> Result<Option<NodeId>, Error> {
    if parser.blank {
        return Ok(None);
    }
    let Some(row) = row_from_str(&line[parser.first_nonspace..]) else {
        return Ok(None);
    };

    let row_node = parser.add_child(table, NodeValue::TableRow { header: false })?;
    add_cells(&mut parser.doc, row_node, row.cells, Some(columns))?;

    parser.advance_to_line_end(line);
    Ok(Some(row_node))
}

/// Appends one cell per entry; with `columns` set, extra cells are
/// dropped and missing ones added empty.
fn add_cells(
    doc: &mut Document,
    row: NodeId,
    mut cells: Vec<String>,
    columns: Option<usize>,
) -> Result<(), Error> {
    if let Some(columns) = columns {
        cells.resize(columns, String::new());
    }
    for content in cells {
        let cell = doc.alloc(NodeValue::TableCell)?;
        doc.get_mut(cell).content = content;
        doc.append(row, cell);
    }
    Ok(())
}

/// Continuation check for an open table.
pub(crate) fn matches(parser: &BlockParser<'_>, container: NodeId, line: &str) -> bool {
    matches!(parser.doc.value(container), NodeValue::Table(..))
        && line
            .get(parser.first_nonspace..)
            .and_then(row_from_str)
            .is_some()
}

pub(crate) fn render(
    renderer: &mut HtmlRenderer<'_>,
    doc: &Document,
    node: NodeId,
    entering: bool,
) -> Result<bool, Error> {
    match doc.value(node) {
        NodeValue::Table(..) => {
            if entering {
                renderer.cr()?;
                renderer.put("<table>")?;
                renderer.table.need_closing_body = false;
            } else {
                if renderer.table.need_closing_body {
                    renderer.cr()?;
                    renderer.put("</tbody>")?;
                    renderer.cr()?;
                }
                renderer.table.need_closing_body = false;
                renderer.cr()?;
                renderer.put("</table>")?;
                renderer.cr()?;
            }
        }
        NodeValue::TableRow { header } => {
            if entering {
                renderer.cr()?;
                if *header {
                    renderer.table.in_header = true;
                    renderer.put("<thead>")?;
                    renderer.cr()?;
                } else if !renderer.table.need_closing_body {
                    renderer.put("<tbody>")?;
                    renderer.cr()?;
                    renderer.table.need_closing_body = true;
                }
                renderer.put("<tr>")?;
            } else {
                renderer.cr()?;
                renderer.put("</tr>")?;
                if *header {
                    renderer.cr()?;
                    renderer.put("</thead>")?;
                    renderer.table.in_header = false;
                }
            }
        }
        NodeValue::TableCell => {
            let tag = if renderer.table.in_header { "th" } else { "td" };
            if entering {
                renderer.cr()?;
                renderer.put("<")?;
                renderer.put(tag)?;
                match cell_alignment(doc, node) {
                    Alignment::Left => renderer.put(" style=\"text-align: left\"")?,
                    Alignment::Center => renderer.put(" style=\"text-align: center\"")?,
                    Alignment::Right => renderer.put(" style=\"text-align: right\"")?,
                    Alignment::None => {}
                }
                renderer.put(">")?;
            } else {
                renderer.put("</")?;
                renderer.put(tag)?;
                renderer.put(">")?;
            }
        }
        _ => {}
    }
    Ok(true)
}

fn cell_alignment(doc: &Document, cell: NodeId) -> Alignment {
    let Some(row) = doc.parent(cell) else {
        return Alignment::None;
    };
    let Some(NodeValue::Table(alignments)) = doc.parent(row).map(|t| doc.value(t)) else {
        return Alignment::None;
    };
    let index = doc.children(row).position(|c| c == cell);
    index
        .and_then(|i| alignments.get(i).copied())
        .unwrap_or(Alignment::None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Converter;
    use crate::extensions::Extension;
    use crate::options::Options;
    use pretty_assertions::assert_eq;

    fn html(input: &str) -> String {
        Converter::with_extensions(&[Extension::Table], Options::DEFAULT)
            .markdown_to_html(input.as_bytes())
            .unwrap()
    }

    #[test]
    fn delimiter_rows() {
        assert!(is_delimiter_row(b"| --- | :-: |\n"));
        assert!(is_delimiter_row(b"-|-\n"));
        assert!(is_delimiter_row(b":--\n"));
        assert!(!is_delimiter_row(b"| --- | x |\n"));
        assert!(!is_delimiter_row(b"| : |\n"));
        assert!(!is_delimiter_row(b"--- ---\n"));
    }

    #[test]
    fn rows_split_on_unescaped_pipes() {
        let row = row_from_str("| a | b \\| c |\n").unwrap();
        assert_eq!(row.cells, ["a", "b | c"]);
        assert_eq!(row.paragraph_offset, 0);
        assert_eq!(row_from_str("\n"), None);
        assert_eq!(row_from_str("plain\n").unwrap().cells, ["plain"]);
    }

    #[test]
    fn last_line_of_a_paragraph_is_the_header() {
        let row = row_from_str("intro\n| a | b |\n").unwrap();
        assert_eq!(row.cells, ["a", "b"]);
        assert_eq!(row.paragraph_offset, 6);
    }

    #[test]
    fn minimal_table() {
        assert_eq!(
            html("a|b\n-|-\n1|2"),
            "<table>\n<thead>\n<tr>\n<th>a</th>\n<th>b</th>\n</tr>\n</thead>\n\
             <tbody>\n<tr>\n<td>1</td>\n<td>2</td>\n</tr>\n</tbody>\n</table>\n"
        );
    }

    #[test]
    fn header_only_table_has_no_body() {
        assert_eq!(
            html("| a |\n| :-: |\n"),
            "<table>\n<thead>\n<tr>\n<th style=\"text-align: center\">a</th>\n</tr>\n</thead>\n</table>\n"
        );
    }

    #[test]
    fn mismatched_header_stays_a_paragraph() {
        assert_eq!(html("| a | b |\n| --- |\n"), "<p>| a | b |\n| --- |</p>\n");
        assert_eq!(html("a|b"), "<p>a|b</p>\n");
    }

    #[test]
    fn rows_are_padded_and_truncated() {
        assert_eq!(
            html("| a | b |\n|---|--:|\n| 1 |\n| 1 | 2 | 3 |\n"),
            "<table>\n<thead>\n<tr>\n<th>a</th>\n<th style=\"text-align: right\">b</th>\n</tr>\n</thead>\n\
             <tbody>\n<tr>\n<td>1</td>\n<td style=\"text-align: right\"></td>\n</tr>\n\
             <tr>\n<td>1</td>\n<td style=\"text-align: right\">2</td>\n</tr>\n</tbody>\n</table>\n"
        );
    }

    #[test]
    fn preceding_lines_stay_a_paragraph() {
        assert_eq!(
            html("intro\n| a |\n| - |\n"),
            "<p>intro</p>\n<table>\n<thead>\n<tr>\n<th>a</th>\n</tr>\n</thead>\n</table>\n"
        );
    }

    #[test]
    fn blank_line_or_new_block_ends_the_table() {
        assert_eq!(
            html("| a |\n| - |\n| b |\n> q\n"),
            "<table>\n<thead>\n<tr>\n<th>a</th>\n</tr>\n</thead>\n<tbody>\n<tr>\n<td>b</td>\n</tr>\n</tbody>\n</table>\n\
             <blockquote>\n<p>q</p>\n</blockquote>\n"
        );
        assert_eq!(
            html("| a |\n| - |\n\nafter\n"),
            "<table>\n<thead>\n<tr>\n<th>a</th>\n</tr>\n</thead>\n</table>\n<p>after</p>\n"
        );
    }

    #[test]
    fn cells_parse_inlines_and_escaped_pipes() {
        assert_eq!(
            html("| `a\\|b` | **c** |\n| - | - |\n"),
            "<table>\n<thead>\n<tr>\n<th><code>a|b</code></th>\n<th><strong>c</strong></th>\n</tr>\n</thead>\n</table>\n"
        );
    }
}
