//! Build error taxonomy.

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by a funnel build.
///
/// `MissingEntry` is special-cased by the cache controller (it selects the
/// degenerate-output branch instead of failing the build); every other
/// variant is fatal and propagates to the host pipeline unchanged.
#[derive(Debug, Error)]
pub enum FunnelError {
    #[error("entry `{0}` does not exist under the input root")]
    MissingEntry(PathBuf),

    #[error("failed to resolve `{specifier}` imported from `{importer}`: {reason}")]
    Resolution {
        specifier: String,
        importer: String,
        reason: String,
    },

    #[error("IO error at `{0}`")]
    Io(PathBuf, #[source] std::io::Error),
}

impl FunnelError {
    pub(crate) fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        Self::Io(path.into(), err)
    }
}

pub type Result<T> = std::result::Result<T, FunnelError>;
