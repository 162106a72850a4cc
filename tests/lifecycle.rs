use gfmark::{Error, Extension, Options, extensions};

// The default converter is process-wide, so the whole lifecycle runs as one
// test.
#[test]
fn init_convert_deinit() {
    assert!(matches!(
        gfmark::markdown_to_html(b"# hi"),
        Err(Error::NotInitialized)
    ));
    assert!(matches!(extensions::find("table"), Err(Error::NotInitialized)));

    gfmark::init();
    assert_eq!(extensions::find("table").unwrap(), Some(Extension::Table));
    assert_eq!(extensions::find("tasklist").unwrap(), None);
    assert_eq!(gfmark::markdown_to_html(b"# hi").unwrap(), "<h1>hi</h1>\n");
    assert_eq!(gfmark::markdown_to_html(b"~one~").unwrap(), "<p>~one~</p>\n");

    // A second init swaps the profile in place.
    gfmark::init_with_options(Options::DEFAULT);
    assert_eq!(
        gfmark::markdown_to_html(b"~one~").unwrap(),
        "<p><del>one</del></p>\n"
    );

    gfmark::deinit();
    assert!(matches!(
        gfmark::markdown_to_html(b"# hi"),
        Err(Error::NotInitialized)
    ));
    assert!(matches!(extensions::find("table"), Err(Error::NotInitialized)));

    // Deinit twice is a no-op, and init works again afterwards.
    gfmark::deinit();
    gfmark::init();
    assert_eq!(gfmark::markdown_to_html(b"").unwrap(), "");
    gfmark::deinit();
}
