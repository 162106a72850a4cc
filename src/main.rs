use std::error::Error;
use std::io::{self, Read, Write};

use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let mut input = Vec::new();
    io::stdin().read_to_end(&mut input)?;

    gfmark::init();
    let output = gfmark::markdown_to_html(&input);
    gfmark::deinit();

    io::stdout().write_all(output?.as_bytes())?;
    Ok(())
}
