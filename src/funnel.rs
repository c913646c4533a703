//! The cache controller: decides per build among no-op, patch and full
//! rebuild.
//!
//! A [`DependencyFunnel`] partitions the input tree into the dependency
//! set (files reachable from the entry through imports) and its
//! complement, and materializes exactly one partition into the output
//! directory. Cached snapshots of both partitions from the last full
//! rebuild let repeat builds skip resolution entirely: an unchanged
//! dependency snapshot means the partition boundary itself cannot have
//! moved, so at most the unselected side drifted.

use std::path::Path;

use jwalk::WalkDir;
use rustc_hash::FxHashSet;

use crate::config::{FunnelConfig, PartitionMode};
use crate::debug;
use crate::error::{FunnelError, Result};
use crate::materialize::{apply_patch, clear_dir, copy_all};
use crate::resolver::{RelativeResolver, SpecifierResolver, resolve_dependencies};
use crate::snapshot::{Snapshot, diff};
use crate::stats::BuildStats;

/// What a single build invocation did to the output directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    /// Output untouched; cached state still describes it.
    CacheHit,
    /// Non-dependency drift in exclude mode, patched in place.
    PatchApplied(usize),
    /// Entry absent; degenerate output per mode.
    MissingEntry,
    /// Dependency set changed (or first build); output rematerialized.
    FullRebuild,
}

impl std::fmt::Display for BuildOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CacheHit => write!(f, "cache hit"),
            Self::PatchApplied(n) => write!(f, "patched {n} op(s)"),
            Self::MissingEntry => write!(f, "entry missing"),
            Self::FullRebuild => write!(f, "full rebuild"),
        }
    }
}

/// Memory of the last successful full rebuild.
///
/// Committed as a whole at the end of a rebuild, never partially. The
/// one deliberate exception is the non-dependency snapshot, which is
/// refreshed in place after an applied patch - the dependency side is
/// provably unchanged at that point.
#[derive(Debug, Clone)]
struct BuildState {
    dep_set: Vec<String>,
    dep_snapshot: Snapshot,
    non_dep_set: Vec<String>,
    non_dep_snapshot: Snapshot,
}

pub struct DependencyFunnel {
    config: FunnelConfig,
    resolver: Box<dyn SpecifierResolver + Send + Sync>,
    state: Option<BuildState>,
    stats: BuildStats,
}

impl DependencyFunnel {
    pub fn new(config: FunnelConfig) -> Self {
        Self::with_resolver(config, Box::new(RelativeResolver))
    }

    /// Swap in a different module-graph walker (anything satisfying
    /// [`SpecifierResolver`]).
    pub fn with_resolver(
        config: FunnelConfig,
        resolver: Box<dyn SpecifierResolver + Send + Sync>,
    ) -> Self {
        Self {
            config,
            resolver,
            state: None,
            stats: BuildStats::default(),
        }
    }

    pub fn config(&self) -> &FunnelConfig {
        &self.config
    }

    pub fn stats(&self) -> &BuildStats {
        &self.stats
    }

    /// Run one build. `input` is the current source tree, `output` the
    /// persistent output directory owned by the host pipeline.
    ///
    /// The host must not start a second build before this one returns;
    /// cached state is only touched inside this call.
    pub fn build(&mut self, input: &Path, output: &Path) -> Result<BuildOutcome> {
        if !input.join(&self.config.entry).is_file() {
            return self.build_without_entry(input, output);
        }

        if let Some(outcome) = self.try_incremental(input, output)? {
            return Ok(outcome);
        }

        self.rebuild(input, output)
    }

    /// The no-op/patch fast paths. Returns `None` when a full rebuild is
    /// required (no cached state, or the dependency partition drifted).
    fn try_incremental(&mut self, input: &Path, output: &Path) -> Result<Option<BuildOutcome>> {
        let Some(state) = self.state.as_ref() else {
            return Ok(None);
        };

        let dep_now = Snapshot::capture(input, &state.dep_set);
        if !diff(&state.dep_snapshot, &dep_now).is_empty() {
            debug!("funnel"; "dependency graph changed");
            return Ok(None);
        }

        let non_dep_now = Snapshot::capture(input, &state.non_dep_set);
        let patch = diff(&state.non_dep_snapshot, &non_dep_now);

        if patch.is_empty() {
            debug!("funnel"; "cache hit, no changes");
            self.stats.cache_hit += 1;
            return Ok(Some(BuildOutcome::CacheHit));
        }

        if self.config.mode.is_include() {
            // Drift is confined to the unselected partition, so the
            // materialized output is still correct. The cached non-dep
            // snapshot goes stale here and stays stale until the next
            // full rebuild recaptures it; it is never diffed against
            // an assumed-fresh base in between.
            debug!("funnel"; "cache hit, no changes in dependency graph");
            self.stats.cache_hit += 1;
            return Ok(Some(BuildOutcome::CacheHit));
        }

        debug!("funnel"; "applying {} patch op(s)", patch.len());
        apply_patch(input, output, &patch)?;
        if let Some(state) = self.state.as_mut() {
            state.non_dep_snapshot = non_dep_now;
        }
        self.stats.patch_applied += 1;
        Ok(Some(BuildOutcome::PatchApplied(patch.len())))
    }

    /// Degenerate builds: with no entry, nothing is a dependency.
    /// Cached state is dropped: the output is about to stop matching
    /// what the snapshots describe, and a restored entry can come back
    /// stat-identical (rename preserves mtime/size/mode), so keeping
    /// the state would let a later build report a cache hit against
    /// the wiped output. Dropping it forces the next valid build
    /// through the full-recompute path.
    fn build_without_entry(&mut self, input: &Path, output: &Path) -> Result<BuildOutcome> {
        debug!("funnel"; "entry `{}` did not exist", self.config.entry);
        self.stats.missing_entry += 1;
        self.state = None;

        clear_dir(output)?;
        if self.config.mode == PartitionMode::Exclude {
            debug!("funnel"; "copying all modules");
            self.stats.copy_all += 1;
            copy_all(input, output, &enumerate_root(input))?;
        }
        Ok(BuildOutcome::MissingEntry)
    }

    /// Full recompute: resolve the dependency set, derive its
    /// complement, rematerialize the selected partition from scratch and
    /// commit fresh snapshots of both partitions.
    fn rebuild(&mut self, input: &Path, output: &Path) -> Result<BuildOutcome> {
        let resolved = resolve_dependencies(
            input,
            &self.config.entry,
            &self.config.external,
            &self.config.extension,
            self.resolver.as_ref(),
        );
        let mut dep_set = match resolved {
            Ok(set) => set,
            // The entry can race out of existence between the pre-check
            // and the walk; same branch either way.
            Err(FunnelError::MissingEntry(_)) => {
                return self.build_without_entry(input, output);
            }
            Err(e) => return Err(e),
        };
        dep_set.sort();
        dep_set.dedup();

        let members: FxHashSet<&str> = dep_set.iter().map(String::as_str).collect();
        let non_dep_set: Vec<String> = enumerate_root(input)
            .into_iter()
            .filter(|path| !members.contains(path.as_str()))
            .collect();

        clear_dir(output)?;
        let selected = match self.config.mode {
            PartitionMode::Include => &dep_set,
            PartitionMode::Exclude => &non_dep_set,
        };
        copy_all(input, output, selected)?;

        let dep_snapshot = Snapshot::capture(input, &dep_set);
        let non_dep_snapshot = Snapshot::capture(input, &non_dep_set);
        debug!(
            "funnel"; "rebuilt: {} dependency / {} other file(s), {} materialized",
            dep_set.len(),
            non_dep_set.len(),
            selected.len()
        );

        self.state = Some(BuildState {
            dep_set,
            dep_snapshot,
            non_dep_set,
            non_dep_snapshot,
        });
        self.stats.full_rebuild += 1;
        Ok(BuildOutcome::FullRebuild)
    }
}

/// Every file under `root`, as sorted unix-style relative paths. The
/// root directory itself is not part of the enumeration.
fn enumerate_root(root: &Path) -> Vec<String> {
    let mut paths: Vec<String> = WalkDir::new(root)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            let path = e.path();
            let rel = path.strip_prefix(root).ok()?;
            Some(rel.to_string_lossy().replace('\\', "/"))
        })
        .collect();
    paths.sort();
    paths
}
