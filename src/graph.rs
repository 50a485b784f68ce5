//! Forward and inverse dependency maps for a source tree.
//!
//! The graph is rebuilt from scratch on every scan. `forward[file]` holds the direct
//! dependencies of `file`; `inverse` is its exact transpose. Include cycles are
//! allowed, so every traversal keeps a visited set.

use crate::deps::{DependencyExtractor, normalize_path};
use crate::error::{BuildError, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub type PathMap = BTreeMap<PathBuf, BTreeSet<PathBuf>>;

#[derive(Debug, Default, Clone)]
pub struct DependencyGraph {
    sources: BTreeSet<PathBuf>,
    forward: PathMap,
    inverse: PathMap,
}

impl DependencyGraph {
    /// Scans `source_dir` for files with one of `source_exts` and discovers the
    /// dependency closure of each one.
    pub fn build(
        source_dir: &Path,
        source_exts: &[String],
        include_dir: Option<&Path>,
        extractor: &dyn DependencyExtractor,
    ) -> Result<Self> {
        if !source_dir.is_dir() {
            return Err(BuildError::io(
                source_dir,
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "source directory does not exist",
                ),
            ));
        }

        let mut graph = DependencyGraph::default();
        for entry in WalkDir::new(source_dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| match e {
                Ok(entry) => Some(entry),
                Err(e) => {
                    log::warn!("skipping unreadable entry under {}: {}", source_dir.display(), e);
                    None
                }
            })
        {
            if !entry.file_type().is_file() || !has_extension(entry.path(), source_exts) {
                continue;
            }
            let source = normalize_path(entry.path());
            graph.sources.insert(source.clone());
            graph.discover(source, include_dir, extractor);
        }

        log::debug!(
            "found {} source files, {} files in total",
            graph.sources.len(),
            graph.forward.len()
        );
        graph.invert();
        Ok(graph)
    }

    /// Builds a graph from an explicit forward map (sources need not be keys).
    pub fn from_forward(sources: BTreeSet<PathBuf>, forward: PathMap) -> Self {
        let mut graph = Self {
            sources,
            forward,
            inverse: PathMap::new(),
        };
        graph.invert();
        graph
    }

    /// Visits every file reachable from `start` exactly once.
    fn discover(
        &mut self,
        start: PathBuf,
        include_dir: Option<&Path>,
        extractor: &dyn DependencyExtractor,
    ) {
        let mut stack = vec![start];
        while let Some(file) = stack.pop() {
            if self.forward.contains_key(&file) {
                continue;
            }
            let deps: BTreeSet<PathBuf> = extractor
                .extract(&file, include_dir)
                .into_iter()
                .map(|d| normalize_path(&d))
                .collect();
            stack.extend(
                deps.iter()
                    .filter(|d| !self.forward.contains_key(*d))
                    .cloned(),
            );
            self.forward.insert(file, deps);
        }
    }

    /// Rebuilds `inverse` from `forward`.
    pub fn invert(&mut self) {
        let mut inverse = PathMap::new();
        for (file, deps) in &self.forward {
            for dep in deps {
                inverse.entry(dep.clone()).or_default().insert(file.clone());
            }
        }
        self.inverse = inverse;
    }

    pub fn sources(&self) -> &BTreeSet<PathBuf> {
        &self.sources
    }

    pub fn forward(&self) -> &PathMap {
        &self.forward
    }

    pub fn inverse(&self) -> &PathMap {
        &self.inverse
    }

    pub fn dependents(&self, file: &Path) -> Option<&BTreeSet<PathBuf>> {
        self.inverse.get(file)
    }

    /// Every file the graph knows about: sources and everything they pull in.
    pub fn files(&self) -> BTreeSet<&PathBuf> {
        self.sources.iter().chain(self.forward.keys()).collect()
    }
}

pub fn has_extension(path: &Path, exts: &[String]) -> bool {
    path.extension()
        .map(|ext| {
            let ext = ext.to_string_lossy();
            exts.iter().any(|e| *e == ext)
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deps::IncludeExtractor;
    use std::fs;

    fn exts(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn assert_symmetric(graph: &DependencyGraph) {
        for (file, deps) in graph.forward() {
            for dep in deps {
                assert!(graph.inverse()[dep].contains(file));
            }
        }
        for (dep, files) in graph.inverse() {
            for file in files {
                assert!(graph.forward()[file].contains(dep));
            }
        }
    }

    #[test]
    fn test_build_discovers_closure_with_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("net")).unwrap();
        fs::write(src.join("main.cpp"), "#include \"a.h\"\n").unwrap();
        fs::write(src.join("net/socket.cpp"), "#include \"../a.h\"\n").unwrap();
        fs::write(src.join("a.h"), "#include \"b.h\"\n").unwrap();
        fs::write(src.join("b.h"), "#include \"a.h\"\n").unwrap();
        fs::write(src.join("notes.txt"), "#include \"a.h\"\n").unwrap();

        let graph =
            DependencyGraph::build(&src, &exts(&["cpp"]), None, &IncludeExtractor).unwrap();

        let a_h = normalize_path(&src.join("a.h"));
        let b_h = normalize_path(&src.join("b.h"));
        assert_eq!(graph.sources().len(), 2);
        assert_eq!(graph.forward().len(), 4);
        assert!(graph.forward()[&a_h].contains(&b_h));
        assert!(graph.forward()[&b_h].contains(&a_h));
        assert_eq!(graph.dependents(&a_h).map(|s| s.len()), Some(3));
        assert_symmetric(&graph);
    }

    #[test]
    fn test_rebuild_drops_removed_files() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("a.cpp"), "#include \"a.h\"\n").unwrap();
        fs::write(src.join("b.cpp"), "").unwrap();
        fs::write(src.join("a.h"), "").unwrap();

        let before =
            DependencyGraph::build(&src, &exts(&["cpp"]), None, &IncludeExtractor).unwrap();
        assert_eq!(before.sources().len(), 2);

        fs::remove_file(src.join("a.cpp")).unwrap();
        let after =
            DependencyGraph::build(&src, &exts(&["cpp"]), None, &IncludeExtractor).unwrap();
        assert_eq!(after.sources().len(), 1);
        assert!(after.inverse().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_subdir_keeps_other_sources() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        let locked = src.join("locked");
        fs::create_dir_all(&locked).unwrap();
        fs::write(src.join("main.cpp"), "").unwrap();
        fs::write(locked.join("hidden.cpp"), "").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        let result = DependencyGraph::build(&src, &exts(&["cpp"]), None, &IncludeExtractor);
        let still_readable = fs::read_dir(&locked).is_ok();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        let graph = result.unwrap();
        assert!(graph.sources().contains(&normalize_path(&src.join("main.cpp"))));
        if !still_readable {
            assert_eq!(graph.sources().len(), 1);
        }
    }

    #[test]
    fn test_missing_source_dir_is_io_error() {
        let err = DependencyGraph::build(
            Path::new("/no/such/source/dir"),
            &exts(&["cpp"]),
            None,
            &IncludeExtractor,
        )
        .unwrap_err();
        assert!(matches!(err, BuildError::Io { .. }));
    }

    #[test]
    fn test_inverse_is_transpose_of_forward() {
        let mut forward = PathMap::new();
        let edges = [
            ("a.cpp", &["x.h", "y.h"][..]),
            ("b.cpp", &["y.h"][..]),
            ("x.h", &["y.h"][..]),
            ("y.h", &["x.h"][..]),
        ];
        for (file, deps) in edges {
            forward.insert(
                PathBuf::from(file),
                deps.iter().map(PathBuf::from).collect(),
            );
        }
        let sources = ["a.cpp", "b.cpp"].iter().map(PathBuf::from).collect();
        let graph = DependencyGraph::from_forward(sources, forward);
        assert_symmetric(&graph);
        assert_eq!(graph.inverse()[Path::new("y.h")].len(), 3);
    }

    #[test]
    fn test_has_extension() {
        let e = exts(&["cpp", "cc"]);
        assert!(has_extension(Path::new("a/b.cc"), &e));
        assert!(!has_extension(Path::new("a/b.h"), &e));
        assert!(!has_extension(Path::new("Makefile"), &e));
    }
}
