//! Small text utilities shared by the block and inline parsers.

use unicode_casefold::UnicodeCaseFold;

use crate::entity;

/// Check if a byte is ASCII punctuation (can be backslash-escaped)
pub(crate) fn is_ascii_punctuation(b: u8) -> bool {
    matches!(b, b'!'..=b'/' | b':'..=b'@' | b'['..=b'`' | b'{'..=b'~')
}

/// Check if a character is Unicode punctuation (for emphasis flanking rules)
/// Characters in the Unicode P (punctuation) or S (symbol) categories count.
pub(crate) fn is_punctuation(c: char) -> bool {
    if c.is_ascii() {
        return c.is_ascii_punctuation();
    }

    // A simplified check covering the common ranges rather than the whole
    // Unicode database.
    matches!(c as u32,
        // Latin-1 Supplement (¡-¿, ×, ÷)
        0x00A1..=0x00BF | 0x00D7 | 0x00F7 |
        // Currency symbols
        0x20A0..=0x20CF |
        // General Punctuation
        0x2010..=0x2027 | 0x2030..=0x205E |
        // Supplemental Punctuation
        0x2E00..=0x2E7F |
        // Arrows, Mathematical Operators, Miscellaneous Technical
        0x2190..=0x23FF |
        // Box Drawing, Block Elements, Geometric Shapes, Misc Symbols, Dingbats
        0x2500..=0x27BF |
        // Miscellaneous Mathematical Symbols-A/B, Supplemental Arrows
        0x27C0..=0x27FF | 0x2900..=0x29FF |
        // Miscellaneous Symbols and Arrows
        0x2B00..=0x2BFF |
        // CJK Symbols and Punctuation
        0x3001..=0x3003 | 0x3008..=0x3011 | 0x3014..=0x301F |
        // Fullwidth ASCII punctuation
        0xFF01..=0xFF0F | 0xFF1A..=0xFF20 | 0xFF3B..=0xFF40 | 0xFF5B..=0xFF65
    )
}

/// Whitespace in the sense of the flanking rules.
pub(crate) fn is_whitespace(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\x0c' | '\r' | ' ') || (!c.is_ascii() && c.is_whitespace())
}

pub(crate) fn is_space_or_tab(b: u8) -> bool {
    b == b' ' || b == b'\t'
}

pub(crate) fn is_line_end(b: u8) -> bool {
    b == b'\n' || b == b'\r'
}

/// ASCII whitespace as the scanners see it, vertical tab included.
pub(crate) fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | 0x0b | 0x0c | b'\r')
}

pub(crate) fn is_blank(s: &str) -> bool {
    s.bytes().all(is_space)
}

pub(crate) fn trim(s: &str) -> &str {
    s.trim_matches(|c: char| c.is_ascii() && is_space(c as u8))
}

pub(crate) fn rtrim(s: &mut String) {
    let len = s.trim_end_matches(|c: char| c.is_ascii() && is_space(c as u8)).len();
    s.truncate(len);
}

/// Normalize a label for matching: Unicode case fold, collapse internal
/// whitespace, trim.
pub(crate) fn normalize_label(label: &str) -> String {
    let folded: String = trim(label).chars().case_fold().collect();
    folded.split_whitespace().collect::<Vec<&str>>().join(" ")
}

/// Removes the backslash in front of escaped ASCII punctuation.
pub(crate) fn unescape(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut result = String::with_capacity(text.len());
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 1 < bytes.len() && is_ascii_punctuation(bytes[i + 1]) {
            result.push_str(&text[start..i]);
            start = i + 1;
            i += 2;
        } else {
            i += 1;
        }
    }
    result.push_str(&text[start..]);
    result
}

/// Link destination as written: trimmed, pointy brackets dropped, entities
/// and backslash escapes resolved.
pub(crate) fn clean_url(url: &str) -> String {
    let url = trim(url);
    if url.is_empty() {
        return String::new();
    }
    let inner = if url.len() >= 2 && url.starts_with('<') && url.ends_with('>') {
        &url[1..url.len() - 1]
    } else {
        url
    };
    unescape(&entity::unescape_html(inner))
}

/// Link title without its surrounding quotes or parentheses.
pub(crate) fn clean_title(title: &str) -> String {
    let bytes = title.as_bytes();
    if bytes.is_empty() {
        return String::new();
    }
    let first = bytes[0];
    let last = bytes[bytes.len() - 1];
    let inner = if bytes.len() >= 2
        && ((first == b'\'' && last == b'\'')
            || (first == b'(' && last == b')')
            || (first == b'"' && last == b'"'))
    {
        &title[1..title.len() - 1]
    } else {
        title
    };
    unescape(&entity::unescape_html(inner))
}

/// Destination of a `<…>` autolink.
pub(crate) fn clean_autolink(url: &str, email: bool) -> String {
    let url = trim(url);
    if url.is_empty() {
        return String::new();
    }
    let decoded = entity::unescape_html(url);
    if email {
        format!("mailto:{}", decoded)
    } else {
        decoded
    }
}

/// Code span content: line endings become spaces, and one space is stripped
/// from each end when both ends have one and the content is not all spaces.
pub(crate) fn normalize_code(raw: &str) -> String {
    let mut code = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\r' => {
                if chars.peek() != Some(&'\n') {
                    code.push(' ');
                }
            }
            '\n' => code.push(' '),
            _ => code.push(c),
        }
    }

    if code.len() >= 2
        && code.starts_with(' ')
        && code.ends_with(' ')
        && code.bytes().any(|b| b != b' ')
    {
        code.pop();
        code.remove(0);
    }
    code
}

/// Drops an ATX closing sequence (`  ##`) and trailing whitespace.
pub(crate) fn chop_trailing_hashes(line: &str) -> &str {
    let line = line.trim_end_matches(|c: char| c.is_ascii() && is_space(c as u8));
    let without = line.trim_end_matches('#');
    if without.len() == line.len() {
        return line;
    }
    match without.as_bytes().last() {
        Some(&b) if is_space_or_tab(b) => {
            without.trim_end_matches(|c: char| c.is_ascii() && is_space(c as u8))
        }
        None => without,
        _ => line,
    }
}

/// Removes trailing lines containing only whitespace.
pub(crate) fn remove_trailing_blank_lines(s: &mut String) {
    let bytes = s.as_bytes();
    let Some(last_content) = bytes
        .iter()
        .rposition(|&b| !is_space_or_tab(b) && !is_line_end(b))
    else {
        s.clear();
        return;
    };
    if let Some(eol) = bytes[last_content..].iter().position(|&b| is_line_end(b)) {
        s.truncate(last_content + eol);
    }
}

/// Smallest char boundary at or after `i`.
pub(crate) fn ceil_char_boundary(s: &str, mut i: usize) -> usize {
    if i >= s.len() {
        return s.len();
    }
    while !s.is_char_boundary(i) {
        i += 1;
    }
    i
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_fold_case_and_whitespace() {
        assert_eq!(normalize_label("  Foo \n  BAR "), "foo bar");
        assert_eq!(normalize_label("ẞ"), "ss");
        assert_eq!(normalize_label("ΑΓΩ"), normalize_label("αγω"));
    }

    #[test]
    fn unescape_keeps_non_punctuation_backslashes() {
        assert_eq!(unescape(r"\*a\b\\"), r"*a\b\");
        assert_eq!(unescape(r"trailing\"), r"trailing\");
    }

    #[test]
    fn clean_url_strips_brackets_and_resolves_escapes() {
        assert_eq!(clean_url(" <a b> "), "a b");
        assert_eq!(clean_url(r"/u\_rl&amp;"), "/u_rl&");
        assert_eq!(clean_url(""), "");
    }

    #[test]
    fn clean_title_strips_any_delimiter_pair() {
        assert_eq!(clean_title("\"t\""), "t");
        assert_eq!(clean_title("'t'"), "t");
        assert_eq!(clean_title("(t)"), "t");
        assert_eq!(clean_title(r#""a \" &quot;""#), "a \" \"");
    }

    #[test]
    fn code_spans_normalize_line_endings_and_padding() {
        assert_eq!(normalize_code(" a "), "a");
        assert_eq!(normalize_code("  a  "), " a ");
        assert_eq!(normalize_code("   "), "   ");
        assert_eq!(normalize_code("a\nb"), "a b");
        assert_eq!(normalize_code("\nb\n"), "b");
    }

    #[test]
    fn closing_hashes_need_a_preceding_space() {
        assert_eq!(chop_trailing_hashes("foo ##  \n"), "foo");
        assert_eq!(chop_trailing_hashes("foo#\n"), "foo#");
        assert_eq!(chop_trailing_hashes("###\n"), "");
        assert_eq!(chop_trailing_hashes("foo\n"), "foo");
    }

    #[test]
    fn trailing_blank_lines_are_removed() {
        let mut s = String::from("code\n  \n\n");
        remove_trailing_blank_lines(&mut s);
        assert_eq!(s, "code");
        let mut blank = String::from(" \n");
        remove_trailing_blank_lines(&mut blank);
        assert_eq!(blank, "");
    }

    #[test]
    fn punctuation_covers_ascii_and_symbols() {
        for c in ['!', '*', '~', '€', '“', '¡', '→'] {
            assert!(is_punctuation(c), "{c:?}");
        }
        for c in ['a', '7', ' ', 'é', '中'] {
            assert!(!is_punctuation(c), "{c:?}");
        }
    }
}
