//! Rebuild-set computation.
//!
//! A source is rebuilt when it is at least as new as its object file, or when a file
//! it includes (directly or through any chain of headers) changed after both the
//! last link and the source's object. Missing files count as infinitely old.

use super::utils::file_time;
use crate::graph::{DependencyGraph, has_extension};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Sources that need recompiling, most recently modified first.
pub fn compute_rebuild_set<F>(
    graph: &DependencyGraph,
    object_path: F,
    output_path: &Path,
    source_exts: &[String],
    header_exts: &[String],
    include_dir: Option<&Path>,
) -> Vec<PathBuf>
where
    F: Fn(&Path) -> PathBuf,
{
    let mut stale = BTreeSet::new();

    for source in graph.sources() {
        let object = object_path(source);
        if file_time(source) >= file_time(&object) {
            log::debug!(
                "rebuild {}: object {} is missing or outdated",
                source.display(),
                object.display()
            );
            stale.insert(source.clone());
        }
    }

    let output_age = file_time(output_path);
    log::debug!("output {} has age {:?}", output_path.display(), output_age);

    for header in graph.inverse().keys() {
        let age = dependency_time(header, include_dir);
        if age < output_age {
            continue;
        }

        log::trace!("cascading {}", header.display());
        for source in header_cascade(graph, header, source_exts, header_exts) {
            if age >= file_time(&object_path(&source)) && stale.insert(source.clone()) {
                log::debug!(
                    "rebuild {}: included {} changed",
                    source.display(),
                    header.display()
                );
            }
        }
    }

    let mut ordered: Vec<(SystemTime, PathBuf)> = stale
        .into_iter()
        .map(|source| (file_time(&source), source))
        .collect();
    ordered.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    ordered.into_iter().map(|(_, source)| source).collect()
}

/// Time of a dependency at its recorded path, or in `include_dir` when it has moved.
fn dependency_time(path: &Path, include_dir: Option<&Path>) -> SystemTime {
    if !path.exists()
        && let (Some(dir), Some(name)) = (include_dir, path.file_name())
    {
        return file_time(&dir.join(name));
    }
    file_time(path)
}

/// Every source that reaches `header` through the inverse graph.
///
/// Sources end a branch; headers are followed at most once each, so circular
/// includes terminate.
pub fn header_cascade(
    graph: &DependencyGraph,
    header: &Path,
    source_exts: &[String],
    header_exts: &[String],
) -> BTreeSet<PathBuf> {
    let mut sources = BTreeSet::new();
    let mut visited: BTreeSet<&Path> = BTreeSet::new();
    visited.insert(header);
    let mut stack: Vec<&Path> = vec![header];

    while let Some(file) = stack.pop() {
        let Some(dependents) = graph.dependents(file) else {
            continue;
        };
        for dependent in dependents {
            if has_extension(dependent, source_exts) {
                sources.insert(dependent.clone());
            } else if has_extension(dependent, header_exts) && visited.insert(dependent.as_path()) {
                stack.push(dependent.as_path());
            }
        }
    }

    sources
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::PathMap;
    use std::fs::{self, File};
    use std::time::{Duration, UNIX_EPOCH};

    fn exts(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    /// `(file, dependency)` pairs.
    fn graph(edges: &[(&str, &str)], sources: &[&str]) -> DependencyGraph {
        let mut forward = PathMap::new();
        for (file, dep) in edges {
            forward
                .entry(PathBuf::from(file))
                .or_default()
                .insert(PathBuf::from(dep));
        }
        DependencyGraph::from_forward(sources.iter().map(PathBuf::from).collect(), forward)
    }

    fn touch(path: &Path, secs: u64) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        let file = File::options()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        file.set_modified(UNIX_EPOCH + Duration::from_secs(secs)).unwrap();
    }

    #[test]
    fn test_cascade_through_header_chain() {
        let g = graph(
            &[
                ("a.cpp", "a.h"),
                ("b.cpp", "b.h"),
                ("a.h", "base.h"),
                ("b.h", "a.h"),
            ],
            &["a.cpp", "b.cpp", "c.cpp"],
        );
        let hit = header_cascade(&g, Path::new("base.h"), &exts(&["cpp"]), &exts(&["h"]));
        let expected: BTreeSet<PathBuf> = ["a.cpp", "b.cpp"].iter().map(PathBuf::from).collect();
        assert_eq!(hit, expected);
    }

    #[test]
    fn test_cascade_terminates_on_cycle() {
        let g = graph(
            &[
                ("main.cpp", "x.h"),
                ("x.h", "y.h"),
                ("y.h", "z.h"),
                ("z.h", "x.h"),
            ],
            &["main.cpp"],
        );
        for header in ["x.h", "y.h", "z.h"] {
            let hit = header_cascade(&g, Path::new(header), &exts(&["cpp"]), &exts(&["h"]));
            assert_eq!(hit.len(), 1, "cascade from {}", header);
        }
    }

    #[test]
    fn test_cascade_stops_at_unknown_extensions() {
        let g = graph(
            &[("main.cpp", "gen.inc"), ("gen.inc", "x.h")],
            &["main.cpp"],
        );
        let hit = header_cascade(&g, Path::new("x.h"), &exts(&["cpp"]), &exts(&["h"]));
        assert!(hit.is_empty());
    }

    #[test]
    fn test_missing_object_always_rebuilds() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("a.cpp");
        touch(&src, 1_000);
        let g = DependencyGraph::from_forward(
            [src.clone()].into_iter().collect(),
            [(src.clone(), BTreeSet::new())].into_iter().collect(),
        );
        let obj_dir = dir.path().join("obj");
        let rebuild = compute_rebuild_set(
            &g,
            |s| obj_dir.join(s.file_stem().unwrap()).with_extension("o"),
            &dir.path().join("bin/app"),
            &exts(&["cpp"]),
            &exts(&["h"]),
            None,
        );
        assert_eq!(rebuild, vec![src]);
    }

    #[test]
    fn test_ordered_by_most_recent_source() {
        let dir = tempfile::tempdir().unwrap();
        let names = ["old.cpp", "new.cpp", "mid.cpp"];
        let times = [100, 300, 200];
        let mut sources = BTreeSet::new();
        let mut forward = PathMap::new();
        for (name, t) in names.iter().zip(times) {
            let path = dir.path().join(name);
            touch(&path, t);
            sources.insert(path.clone());
            forward.insert(path, BTreeSet::new());
        }
        let g = DependencyGraph::from_forward(sources, forward);
        let rebuild = compute_rebuild_set(
            &g,
            |s| s.with_extension("o"),
            &dir.path().join("app"),
            &exts(&["cpp"]),
            &exts(&["h"]),
            None,
        );
        let order: Vec<String> = rebuild
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(order, ["new.cpp", "mid.cpp", "old.cpp"]);
    }

    #[test]
    fn test_header_found_in_include_dir() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src/a.cpp");
        let obj = dir.path().join("obj/a.o");
        let out = dir.path().join("bin/app");
        let inc = dir.path().join("include");
        touch(&src, 100);
        touch(&obj, 200);
        touch(&out, 200);
        touch(&inc.join("cfg.h"), 300);

        // Recorded next to the source, but only present in the include dir.
        let recorded = dir.path().join("src/cfg.h");
        let g = DependencyGraph::from_forward(
            [src.clone()].into_iter().collect(),
            [(src.clone(), [recorded.clone()].into_iter().collect())]
                .into_iter()
                .collect(),
        );
        let object_for = |_: &Path| obj.clone();

        let without = compute_rebuild_set(&g, object_for, &out, &exts(&["cpp"]), &exts(&["h"]), None);
        assert!(without.is_empty());

        let with = compute_rebuild_set(
            &g,
            object_for,
            &out,
            &exts(&["cpp"]),
            &exts(&["h"]),
            Some(&inc),
        );
        assert_eq!(with, vec![src]);
    }
}
