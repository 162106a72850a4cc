//! HTML entity and numeric character reference decoding.

use std::borrow::Cow;

/// Longest named entity (`&CounterClockwiseContourIntegral;`) plus slack.
const MAX_ENTITY_NAME: usize = 32;

/// Try to decode an entity or numeric character reference at the start of
/// `text`, which begins right after the `&`.
/// Returns the decoded text and the number of bytes consumed after the `&`.
pub(crate) fn unescape(text: &[u8]) -> Option<(String, usize)> {
    if text.first() == Some(&b'#') {
        return unescape_numeric(&text[1..]).map(|(s, len)| (s, len + 1));
    }

    let name_len = text
        .iter()
        .take(MAX_ENTITY_NAME + 1)
        .take_while(|b| b.is_ascii_alphanumeric())
        .count();
    if name_len == 0 || name_len > MAX_ENTITY_NAME || text.get(name_len) != Some(&b';') {
        return None;
    }

    // Names are ASCII alphanumerics, checked above.
    let name = std::str::from_utf8(&text[..name_len]).ok()?;
    decode_named(name).map(|s| (s, name_len + 1))
}

/// Decodes `&#…;` with up to 7 decimal or 6 hexadecimal digits.
fn unescape_numeric(text: &[u8]) -> Option<(String, usize)> {
    let (radix, start, max_digits) = match text.first() {
        Some(b'x' | b'X') => (16, 1, 6),
        _ => (10, 0, 7),
    };
    let digits = text[start..]
        .iter()
        .take_while(|b| {
            if radix == 16 {
                b.is_ascii_hexdigit()
            } else {
                b.is_ascii_digit()
            }
        })
        .count();
    if digits == 0 || digits > max_digits || text.get(start + digits) != Some(&b';') {
        return None;
    }

    let code_point = text[start..start + digits]
        .iter()
        .try_fold(0u32, |acc, &b| {
            let d = (b as char).to_digit(radix)?;
            acc.checked_mul(radix)?.checked_add(d)
        })?;
    // Replace invalid/null with replacement character
    let ch = if code_point == 0 {
        '\u{FFFD}'
    } else {
        char::from_u32(code_point).unwrap_or('\u{FFFD}')
    };
    Some((ch.to_string(), start + digits + 1))
}

/// Looks up an HTML5 named entity, `name` excluding `&` and `;`.
fn decode_named(name: &str) -> Option<String> {
    let candidate = format!("&{};", name);
    let decoded = html_escape::decode_html_entities(&candidate);
    match decoded {
        Cow::Borrowed(_) => None,
        // A legacy prefix such as `&amp` in `&ampfoo;` decodes only partly and
        // leaves the rest, semicolon included, in place.
        Cow::Owned(s) if s.ends_with(';') && name != "semi" => None,
        Cow::Owned(s) if s == candidate => None,
        Cow::Owned(s) => Some(s),
    }
}

/// Resolves every entity and numeric reference in `text`; anything that
/// does not form a valid reference is kept as written.
pub(crate) fn unescape_html(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut result = String::with_capacity(text.len());
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'&'
            && let Some((decoded, len)) = unescape(&bytes[i + 1..])
        {
            result.push_str(&text[start..i]);
            result.push_str(&decoded);
            i += 1 + len;
            start = i;
        } else {
            i += 1;
        }
    }
    result.push_str(&text[start..]);
    result
}
