//! Module-graph walk: from an entry file to the set of reachable modules.
//!
//! Discovery is a worklist walk. Each visited module is scanned for
//! import specifiers; every specifier is resolved against its importer by
//! a pluggable [`SpecifierResolver`], re-rooted under the input root, and
//! extended with the conventional module file extension. Specifiers that
//! resolve outside the tree, or that are listed as external, end
//! discovery at that edge. Modules are never parsed, only scanned - the
//! funnel partitions files, it does not validate them.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use rustc_hash::FxHashSet;

use crate::error::{FunnelError, Result};

/// Matches the specifier of `import ... from "x"`, bare `import "x"` and
/// `export ... from "x"` statements.
static SPECIFIER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?m)^\s*(?:import|export)\b[^'"\n]*?\bfrom\s*['"]([^'"\n]+)['"]|^\s*import\s*['"]([^'"\n]+)['"]"#,
    )
    .expect("specifier regex is valid")
});

/// Resolves an import specifier against its importer.
///
/// Implementations return a module specifier string, never a trusted
/// filesystem path: the walk re-roots the result under the input root
/// itself. Any module-graph walker with these semantics is pluggable.
pub trait SpecifierResolver {
    fn resolve(&self, importee: &str, importer: &str) -> Result<String>;
}

/// Default resolver: relative specifiers (`./x`, `../x`) join onto the
/// importer's directory, everything else is package-style and passes
/// through unchanged (alias mapping against the root happens at the
/// existence check).
#[derive(Debug, Default, Clone, Copy)]
pub struct RelativeResolver;

impl SpecifierResolver for RelativeResolver {
    fn resolve(&self, importee: &str, importer: &str) -> Result<String> {
        if !importee.starts_with("./") && !importee.starts_with("../") {
            return Ok(importee.to_string());
        }

        let base = importer.rfind('/').map_or("", |i| &importer[..i]);
        let mut parts: Vec<&str> = base.split('/').filter(|s| !s.is_empty()).collect();

        for segment in importee.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    if parts.pop().is_none() {
                        return Err(FunnelError::Resolution {
                            specifier: importee.to_string(),
                            importer: importer.to_string(),
                            reason: "specifier escapes the input root".to_string(),
                        });
                    }
                }
                other => parts.push(other),
            }
        }

        Ok(parts.join("/"))
    }
}

/// Extract import specifiers from module source, in order of appearance.
fn scan_specifiers(source: &str) -> Vec<String> {
    SPECIFIER_RE
        .captures_iter(source)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Strip the input-root prefix and any leading separator from a resolved
/// specifier. Walkers are not trusted to return root-relative strings.
fn rebase(resolved: &str, root: &Path) -> String {
    let root_str = root.to_string_lossy();
    let stripped = resolved.strip_prefix(root_str.as_ref()).unwrap_or(resolved);
    stripped.trim_start_matches('/').to_string()
}

/// Walk the import graph from `entry`, returning every reachable module
/// path relative to `root` in discovery order, deduplicated.
///
/// Fails with [`FunnelError::MissingEntry`] when the entry itself is
/// absent; any other failure (unreadable module, malformed specifier) is
/// fatal. Read-only: the walk probes existence and reads module sources,
/// nothing else.
pub fn resolve_dependencies(
    root: &Path,
    entry: &str,
    externals: &[String],
    extension: &str,
    resolver: &dyn SpecifierResolver,
) -> Result<Vec<String>> {
    if !root.join(entry).is_file() {
        return Err(FunnelError::MissingEntry(entry.into()));
    }

    let mut modules = vec![entry.to_string()];
    let mut seen: FxHashSet<String> = modules.iter().cloned().collect();
    let mut worklist = vec![entry.to_string()];

    while let Some(importer) = worklist.pop() {
        let importer_abs = root.join(&importer);
        let source = std::fs::read_to_string(&importer_abs)
            .map_err(|e| FunnelError::io(importer_abs, e))?;

        for specifier in scan_specifiers(&source) {
            if externals.iter().any(|ext| *ext == specifier) {
                continue;
            }

            let resolved = resolver.resolve(&specifier, &importer)?;
            let candidate = format!("{}.{}", rebase(&resolved, root), extension);
            if seen.contains(&candidate) {
                continue;
            }

            // A specifier that resolves to nothing on disk is someone
            // else's module; discovery stops at that edge.
            if root.join(&candidate).is_file() {
                seen.insert(candidate.clone());
                modules.push(candidate.clone());
                worklist.push(candidate);
            }
        }
    }

    Ok(modules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn resolve(root: &Path, entry: &str, externals: &[&str]) -> Result<Vec<String>> {
        let externals: Vec<String> = externals.iter().map(|s| (*s).to_string()).collect();
        resolve_dependencies(root, entry, &externals, "js", &RelativeResolver)
    }

    #[test]
    fn test_scan_specifiers_forms() {
        let source = r#"
            import a from './a';
            import { b, c } from "../lib/b";
            import './side-effect';
            export { d } from './d';
            export * from './e';
            const nope = "not an import from './f'";
        "#;

        let specs = scan_specifiers(source);
        assert_eq!(
            specs,
            vec!["./a", "../lib/b", "./side-effect", "./d", "./e"]
        );
    }

    #[test]
    fn test_relative_resolver_joins_importer_dir() {
        let resolver = RelativeResolver;
        assert_eq!(resolver.resolve("./b", "src/a.js").unwrap(), "src/b");
        assert_eq!(resolver.resolve("../lib/c", "src/a.js").unwrap(), "lib/c");
        assert_eq!(resolver.resolve("./b", "a.js").unwrap(), "b");
    }

    #[test]
    fn test_relative_resolver_passes_package_specifiers() {
        let resolver = RelativeResolver;
        assert_eq!(
            resolver.resolve("lib/util", "src/a.js").unwrap(),
            "lib/util"
        );
    }

    #[test]
    fn test_relative_resolver_rejects_root_escape() {
        let resolver = RelativeResolver;
        let err = resolver.resolve("../../b", "a.js").unwrap_err();
        assert!(matches!(err, FunnelError::Resolution { .. }));
    }

    #[test]
    fn test_resolve_walks_transitive_imports() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.js"), "import './b';").unwrap();
        fs::write(dir.path().join("b.js"), "import './c';").unwrap();
        fs::write(dir.path().join("c.js"), "export const c = 1;").unwrap();
        fs::write(dir.path().join("unrelated.js"), "export const u = 1;").unwrap();

        let modules = resolve(dir.path(), "a.js", &[]).unwrap();
        assert_eq!(modules, vec!["a.js", "b.js", "c.js"]);
    }

    #[test]
    fn test_resolve_missing_entry() {
        let dir = TempDir::new().unwrap();
        let err = resolve(dir.path(), "a.js", &[]).unwrap_err();
        assert!(matches!(err, FunnelError::MissingEntry(_)));
    }

    #[test]
    fn test_resolve_stops_at_externals() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.js"), "import './b';\nimport './c';").unwrap();
        fs::write(dir.path().join("b.js"), "").unwrap();
        fs::write(dir.path().join("c.js"), "").unwrap();

        let modules = resolve(dir.path(), "a.js", &["./c"]).unwrap();
        assert_eq!(modules, vec!["a.js", "b.js"]);
    }

    #[test]
    fn test_resolve_stops_at_unresolvable_specifiers() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.js"), "import './missing';\nimport 'fs';").unwrap();

        let modules = resolve(dir.path(), "a.js", &[]).unwrap();
        assert_eq!(modules, vec!["a.js"]);
    }

    #[test]
    fn test_resolve_handles_cycles() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.js"), "import './b';").unwrap();
        fs::write(dir.path().join("b.js"), "import './a';").unwrap();

        let modules = resolve(dir.path(), "a.js", &[]).unwrap();
        assert_eq!(modules, vec!["a.js", "b.js"]);
    }

    #[test]
    fn test_resolve_package_style_alias_under_root() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("lib")).unwrap();
        fs::write(dir.path().join("a.js"), "import 'lib/util';").unwrap();
        fs::write(dir.path().join("lib/util.js"), "").unwrap();

        let modules = resolve(dir.path(), "a.js", &[]).unwrap();
        assert_eq!(modules, vec!["a.js", "lib/util.js"]);
    }

    #[test]
    fn test_resolve_nested_relative_imports() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("src/nested")).unwrap();
        fs::write(dir.path().join("src/a.js"), "import './nested/b';").unwrap();
        fs::write(dir.path().join("src/nested/b.js"), "import '../c';").unwrap();
        fs::write(dir.path().join("src/c.js"), "").unwrap();

        let modules = resolve(dir.path(), "src/a.js", &[]).unwrap();
        assert_eq!(modules, vec!["src/a.js", "src/nested/b.js", "src/c.js"]);
    }
}
