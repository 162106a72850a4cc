//! Error type shared by the parser, the renderer and the entry points.

use std::collections::TryReserveError;

/// Errors returned by conversion entry points.
///
/// Markdown itself never fails to parse: malformed constructs degrade to
/// paragraphs or literal text. The variants below cover usage mistakes and
/// resource exhaustion only.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The process-wide registry or default converter was used before
    /// `init()` or after `deinit()`.
    #[error("gfmark is not initialized; call init() first")]
    NotInitialized,

    /// Growing the node arena or an output buffer failed.
    #[error("allocation failed: {0}")]
    Allocation(#[from] TryReserveError),
}

pub type Result<T> = std::result::Result<T, Error>;
