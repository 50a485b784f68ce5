//! Direct dependency extraction.
//!
//! The graph builder only needs "which files does this file depend on"; how that is
//! answered is pluggable. [`IncludeExtractor`] reads C/C++ `#include "..."` lines.
//! Any closure `Fn(&Path, Option<&Path>) -> BTreeSet<PathBuf>` works as well.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

pub trait DependencyExtractor: Sync {
    /// Direct dependencies of `file`. Unreadable or missing files have none.
    fn extract(&self, file: &Path, include_dir: Option<&Path>) -> BTreeSet<PathBuf>;
}

impl<F> DependencyExtractor for F
where
    F: Fn(&Path, Option<&Path>) -> BTreeSet<PathBuf> + Sync,
{
    fn extract(&self, file: &Path, include_dir: Option<&Path>) -> BTreeSet<PathBuf> {
        self(file, include_dir)
    }
}

/// Quoted `#include` scanner.
///
/// A quoted name resolves against the including file's directory first and against
/// the include directory if that file does not exist. System includes (`<...>`) are
/// ignored.
#[derive(Debug, Default, Clone, Copy)]
pub struct IncludeExtractor;

impl DependencyExtractor for IncludeExtractor {
    fn extract(&self, file: &Path, include_dir: Option<&Path>) -> BTreeSet<PathBuf> {
        // Sources are not required to be UTF-8; include lines are ASCII either way.
        let bytes = match fs::read(file) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::trace!("skipping {}: {}", file.display(), e);
                return BTreeSet::new();
            }
        };

        let content = String::from_utf8_lossy(&bytes);
        let dir = file.parent().unwrap_or_else(|| Path::new(""));
        content
            .lines()
            .filter_map(include_target)
            .map(|name| resolve_include(dir, name, include_dir))
            .collect()
    }
}

/// `#include "name"` → `name`
fn include_target(line: &str) -> Option<&str> {
    let rest = line
        .trim_start()
        .strip_prefix('#')?
        .trim_start()
        .strip_prefix("include")?;
    let (_, quoted) = rest.split_once('"')?;
    let (name, _) = quoted.split_once('"')?;
    (!name.is_empty()).then_some(name)
}

fn resolve_include(dir: &Path, name: &str, include_dir: Option<&Path>) -> PathBuf {
    let local = normalize_path(&dir.join(name));
    if local.exists() {
        return local;
    }
    if let Some(include_dir) = include_dir {
        let fallback = normalize_path(&include_dir.join(name));
        if fallback.exists() {
            return fallback;
        }
    }
    local
}

/// Lexically collapses `.` and `name/..` segments without touching the filesystem.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }

    if out.is_empty() {
        PathBuf::from(".")
    } else {
        out.iter().collect()
    }
}
