use gfmark::Converter;

const TAGS: &[&str] = &[
    "a", "blockquote", "br", "code", "del", "em", "h1", "h2", "h3", "h4", "h5", "h6", "hr", "img",
    "li", "ol", "p", "pre", "strong", "table", "tbody", "td", "th", "thead", "tr", "ul",
];

const ENTITIES: &[&str] = &["&amp;", "&lt;", "&gt;", "&quot;", "&#x27;"];

const OMITTED: &str = "<!-- raw HTML omitted -->";

const FRAGMENTS: &[&str] = &[
    "<script>alert(1)</script>",
    "a < b > c & d",
    "[x](<a>) [y](\"q\")",
    "`<code>` ``& ``",
    "<http://a.b/<>",
    "www.a.com/<b>&c",
    "&bogus; &#0; &lt; &#x110000;",
    "*<*>*",
    "| <a | b> |\n|-|-|\n| & | \" |",
    "<!-- c -->",
    "<?php echo 1 ?>",
    "<![CDATA[x]]>",
    "![<a>](<b> \"<t>\")",
    "\\<not a tag>",
    "a@b.c<d",
    "~~<s>~~ ~x~",
    "```\"><img>\n<x>\n```",
    "    <indented>",
    "> <quote>\n- <item>",
    "[ref]\n\n[ref]: /u?a=<b>&c \"t\"",
    "[j](javascript:alert(1)) <vbscript:x>",
];

/// Walks `html` and fails on markup the renderer could not have produced:
/// unknown tags, stray `>` in text, or `&` that does not start an escape.
fn assert_safe(input: &str, html: &str) {
    let bytes = html.as_bytes();
    let mut i = 0;
    let mut in_tag = false;
    let mut in_quotes = false;

    while i < bytes.len() {
        let c = bytes[i];
        if in_tag {
            match c {
                b'"' => in_quotes = !in_quotes,
                b'>' if !in_quotes => in_tag = false,
                b'<' | b'>' => panic!("unescaped {:?} in attribute for {input:?}: {html}", c as char),
                _ => {}
            }
        } else {
            match c {
                b'<' if html[i..].starts_with(OMITTED) => {
                    i += OMITTED.len();
                    continue;
                }
                b'<' => {
                    let name: String = html[i + 1..]
                        .trim_start_matches('/')
                        .chars()
                        .take_while(char::is_ascii_alphanumeric)
                        .collect();
                    assert!(TAGS.contains(&name.as_str()), "unexpected tag {name:?} for {input:?}: {html}");
                    in_tag = true;
                }
                b'>' => panic!("stray '>' for {input:?}: {html}"),
                b'&' => assert!(
                    ENTITIES.iter().any(|e| html[i..].starts_with(e)),
                    "bare '&' for {input:?}: {html}"
                ),
                _ => {}
            }
        }
        i += 1;
    }
    assert!(!in_tag, "unterminated tag for {input:?}: {html}");
}

#[test]
fn safe_output_only_contains_known_markup() {
    let converter = Converter::strict_gfm();
    for a in FRAGMENTS {
        for b in FRAGMENTS {
            let input = format!("{a}\n{b}");
            let html = converter.markdown_to_html(input.as_bytes()).unwrap();
            assert_safe(&input, &html);
        }
    }
}

#[test]
fn dangerous_schemes_never_reach_an_href() {
    let converter = Converter::strict_gfm();
    for input in FRAGMENTS {
        let html = converter.markdown_to_html(input.as_bytes()).unwrap();
        assert!(!html.contains("href=\"javascript:"), "{html}");
        assert!(!html.contains("href=\"vbscript:"), "{html}");
    }
}

const ALPHABET: &[u8] = b"*_~|[]()<>!`\\&#:@w.\n -a1\t\xff";

fn xorshift(state: &mut u32) -> usize {
    *state ^= *state << 13;
    *state ^= *state >> 17;
    *state ^= *state << 5;
    *state as usize
}

#[test]
fn arbitrary_bytes_convert() {
    let converter = Converter::strict_gfm();
    let mut state: u32 = 0x2545_f491;
    for _ in 0..200 {
        let len = xorshift(&mut state) % 64;
        let input: Vec<u8> = (0..len)
            .map(|_| ALPHABET[xorshift(&mut state) % ALPHABET.len()])
            .collect();
        let doc = converter.parse(&input).unwrap();
        assert!(doc.is_well_formed(), "{:?}", String::from_utf8_lossy(&input));
        converter.render(&doc).unwrap();
    }
}
