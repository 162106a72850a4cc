use gfmark::{Converter, Extension, Options};
use pretty_assertions::assert_eq;
use serde::Deserialize;
use std::fs;

#[derive(Debug, Deserialize)]
struct GfmCase {
    markdown: String,
    html: String,
    example: u32,
    section: String,
    #[serde(default)]
    options: Vec<String>,
}

impl GfmCase {
    fn converter(&self) -> Converter {
        let mut options = Options::DEFAULT;
        for name in &self.options {
            match name.as_str() {
                "unsafe" => options.insert(Options::UNSAFE),
                "github_pre_lang" => options.insert(Options::GITHUB_PRE_LANG),
                "strikethrough_double_tilde" => options.insert(Options::STRIKETHROUGH_DOUBLE_TILDE),
                other => panic!("example {}: unknown option {other:?}", self.example),
            }
        }
        Converter::with_extensions(&Extension::ALL, options)
    }
}

fn load_cases() -> Vec<GfmCase> {
    let data = fs::read_to_string("tests/data/gfm_cases.json").expect("Failed to read gfm_cases.json");
    serde_json::from_str(&data).expect("Failed to parse gfm_cases.json")
}

#[test]
fn gfm_cases() {
    let cases = load_cases();
    assert!(!cases.is_empty());

    let mut failures = Vec::new();
    for case in &cases {
        let result = case
            .converter()
            .markdown_to_html(case.markdown.as_bytes())
            .expect("conversion failed");
        if result != case.html {
            if failures.len() < 5 {
                eprintln!("\nExample {} failed ({})", case.example, case.section);
                eprintln!("  Input:    {:?}", case.markdown);
                eprintln!("  Expected: {:?}", case.html);
                eprintln!("  Got:      {:?}", result);
            }
            failures.push(case.example);
        }
    }

    assert_eq!(failures, Vec::<u32>::new(), "failed examples");
}

#[test]
fn every_case_parses_to_a_well_formed_tree() {
    for case in load_cases() {
        let doc = case
            .converter()
            .parse(case.markdown.as_bytes())
            .expect("parse failed");
        assert!(doc.is_well_formed(), "example {} broke the tree", case.example);
    }
}

#[test]
fn rendering_is_repeatable() {
    for case in load_cases() {
        let converter = case.converter();
        let doc = converter.parse(case.markdown.as_bytes()).unwrap();
        assert_eq!(converter.render(&doc).unwrap(), converter.render(&doc).unwrap());
    }
}
