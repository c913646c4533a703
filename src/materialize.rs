//! Output tree materialization: full copies and in-place patches.
//!
//! `fs::copy` carries permission bits across, so a copied partition
//! preserves file modes without an extra chmod pass.

use std::fs;
use std::io;
use std::path::Path;

use crate::error::{FunnelError, Result};
use crate::snapshot::{EntryKind, PatchOp};

/// Copy every listed path from `input` into `output`, creating
/// intermediate directories as needed.
pub fn copy_all(input: &Path, output: &Path, paths: &[String]) -> Result<()> {
    for rel in paths {
        copy_one(&input.join(rel), &output.join(rel))?;
    }
    Ok(())
}

fn copy_one(src: &Path, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| FunnelError::io(parent, e))?;
    }

    if src.is_dir() {
        fs::create_dir_all(dest).map_err(|e| FunnelError::io(dest, e))?;
    } else {
        fs::copy(src, dest).map_err(|e| FunnelError::io(src, e))?;
    }
    Ok(())
}

/// Execute patch operations in order against `output`, reading source
/// bytes from `input` only for create/update. Mid-operation failure
/// aborts the build; partially applied output is left for the next full
/// rebuild to overwrite.
pub fn apply_patch(input: &Path, output: &Path, patch: &[PatchOp]) -> Result<()> {
    for op in patch {
        match op {
            PatchOp::Create(rel, meta) | PatchOp::Update(rel, meta) => {
                let dest = output.join(rel);
                if meta.kind == EntryKind::Dir {
                    remove_entry(&dest)?;
                    fs::create_dir_all(&dest).map_err(|e| FunnelError::io(dest, e))?;
                } else {
                    if dest.is_dir() {
                        remove_entry(&dest)?;
                    }
                    copy_one(&input.join(rel), &dest)?;
                }
            }
            PatchOp::Remove(rel) => remove_entry(&output.join(rel))?,
        }
    }
    Ok(())
}

/// Remove the contents of `dir` without removing `dir` itself; the host
/// pipeline owns the output directory across builds.
pub fn clear_dir(dir: &Path) -> Result<()> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(FunnelError::io(dir, e)),
    };

    for entry in entries {
        let entry = entry.map_err(|e| FunnelError::io(dir, e))?;
        remove_entry(&entry.path())?;
    }
    Ok(())
}

fn remove_entry(path: &Path) -> Result<()> {
    // Already gone counts as removed.
    let Ok(meta) = fs::symlink_metadata(path) else {
        return Ok(());
    };

    let removed = if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    removed.map_err(|e| FunnelError::io(path, e))
}
