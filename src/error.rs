//! Compositing error taxonomy
//!
//! Failures are contained at the compositor boundary: a load failure drops
//! one entry, a shader build failure aborts one attempt. Neither ever
//! propagates into the render loop. A stale snapshot completing after its
//! context was discarded is not an error at all and has no variant here.

use thiserror::Error;

use crate::texture::TextureError;

/// Errors raised by one compositing attempt.
#[derive(Debug, Error)]
pub enum CompositeError {
    /// A snapshot source could not be loaded or decoded
    #[error("failed to load texture {path}: {source}")]
    LoadFailure {
        path: String,
        #[source]
        source: TextureError,
    },
    /// The generated program failed validation; the prior material stays
    #[error("composite shader rejected: {0}")]
    ShaderBuild(String),
}
