//! Structural snapshots and patch computation for change detection.
//!
//! A [`Snapshot`] captures stat-level metadata (mtime, size, permission
//! bits) for a set of relative paths. Two snapshots of the same path set
//! are compared with [`diff`], which yields the ordered create/update/
//! remove operations transforming one filesystem state into the other.
//! No file contents are read at any point.

use std::collections::BTreeMap;
use std::fs::Metadata;
use std::path::Path;
use std::time::UNIX_EPOCH;

use rayon::prelude::*;

/// Discriminates directory entries from regular files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
}

/// Stat-derived metadata sufficient to detect content or permission
/// changes across builds without reading file bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileMeta {
    pub kind: EntryKind,
    /// Modification time as milliseconds since the unix epoch.
    pub mtime_ms: u128,
    pub size: u64,
    /// Permission bits (unix mode; a readonly flag elsewhere).
    pub mode: u32,
}

impl FileMeta {
    fn from_metadata(meta: &Metadata) -> Self {
        let mtime_ms = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map_or(0, |d| d.as_millis());

        Self {
            kind: if meta.is_dir() {
                EntryKind::Dir
            } else {
                EntryKind::File
            },
            mtime_ms,
            size: meta.len(),
            mode: permission_bits(meta),
        }
    }
}

#[cfg(unix)]
fn permission_bits(meta: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode()
}

#[cfg(not(unix))]
fn permission_bits(meta: &Metadata) -> u32 {
    u32::from(meta.permissions().readonly())
}

/// Path-keyed metadata capture of a file subset at one point in time.
///
/// Keys are unix-style relative paths and iterate lexicographically, so
/// two snapshots built from the same path convention compare directly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    entries: BTreeMap<String, FileMeta>,
}

impl Snapshot {
    /// Stat every path under `root` and record the survivors.
    ///
    /// Paths that no longer exist are omitted silently, never recorded as
    /// placeholders: the caller may be probing a stale set, and absence
    /// is exactly what the differ later reports as a remove.
    pub fn capture(root: &Path, paths: &[String]) -> Self {
        let mut entries: Vec<(String, FileMeta)> = paths
            .par_iter()
            .filter_map(|rel| {
                let meta = std::fs::metadata(root.join(rel)).ok()?;
                Some((rel.clone(), FileMeta::from_metadata(&meta)))
            })
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        Self {
            entries: entries.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, path: &str) -> Option<&FileMeta> {
        self.entries.get(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

/// A single output-directory operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchOp {
    Create(String, FileMeta),
    Update(String, FileMeta),
    Remove(String),
}

impl PatchOp {
    pub fn path(&self) -> &str {
        match self {
            Self::Create(p, _) | Self::Update(p, _) | Self::Remove(p) => p,
        }
    }
}

/// Compute the patch transforming `old`'s filesystem state into `new`'s.
///
/// An empty patch means the two snapshots are observably identical.
/// Removes come first in reverse lexicographic order (children before
/// their directory); creates and updates follow in lexicographic order
/// (a parent directory always precedes its descendants), so a consumer
/// applying operations in sequence never touches a missing parent.
pub fn diff(old: &Snapshot, new: &Snapshot) -> Vec<PatchOp> {
    let mut ops: Vec<PatchOp> = old
        .entries
        .keys()
        .rev()
        .filter(|path| !new.entries.contains_key(*path))
        .map(|path| PatchOp::Remove(path.clone()))
        .collect();

    for (path, meta) in &new.entries {
        match old.entries.get(path) {
            None => ops.push(PatchOp::Create(path.clone(), *meta)),
            Some(prev) if prev != meta => ops.push(PatchOp::Update(path.clone(), *meta)),
            Some(_) => {}
        }
    }

    ops
}
