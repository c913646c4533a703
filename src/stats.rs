//! Build outcome counters. Observability surface only, no behavioral
//! contract.

use std::fmt;

/// Counts of each build outcome since the funnel was created.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BuildStats {
    /// Builds that left the output directory untouched.
    pub cache_hit: u64,
    /// Builds that patched the output in place.
    pub patch_applied: u64,
    /// Builds that hit the missing-entry branch.
    pub missing_entry: u64,
    /// Verbatim full-tree copies (missing entry, exclude mode).
    pub copy_all: u64,
    /// Full recompute-and-rematerialize builds.
    pub full_rebuild: u64,
}

impl BuildStats {
    pub fn builds(&self) -> u64 {
        self.cache_hit + self.patch_applied + self.missing_entry + self.full_rebuild
    }
}

impl fmt::Display for BuildStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hit({}) patch({}) no-entry({}) copy-all({}) rebuild({})",
            self.cache_hit,
            self.patch_applied,
            self.missing_entry,
            self.copy_all,
            self.full_rebuild
        )
    }
}
