//! Object pruning.
//!
//! Removes object files that can no longer be trusted: zero-length leftovers from an
//! interrupted compile, and objects whose source has been deleted or renamed.

use crate::error::{BuildError, Result};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Removes empty or orphaned `*.object_ext` files directly under `object_dir`.
/// Returns the removed paths; a non-empty result means the graph must be rescanned.
pub fn prune(
    object_dir: &Path,
    object_ext: &str,
    known_sources: &BTreeSet<PathBuf>,
) -> Result<Vec<PathBuf>> {
    if !object_dir.is_dir() {
        return Ok(Vec::new());
    }

    let stems: BTreeSet<String> = known_sources
        .iter()
        .filter_map(|s| s.file_stem())
        .map(|s| s.to_string_lossy().to_string())
        .collect();

    let entries = fs::read_dir(object_dir).map_err(|e| BuildError::io(object_dir, e))?;
    let mut candidates: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == object_ext))
        .collect();
    candidates.sort();

    let mut removed = Vec::new();
    for object in candidates {
        let empty = fs::metadata(&object).map(|m| m.len() == 0).unwrap_or(false);
        let orphan = object
            .file_stem()
            .map(|s| !stems.contains(s.to_string_lossy().as_ref()))
            .unwrap_or(true);
        if !empty && !orphan {
            continue;
        }

        log::debug!(
            "pruning {} ({})",
            object.display(),
            if empty { "empty" } else { "no matching source" }
        );
        fs::remove_file(&object).map_err(|e| BuildError::io(&object, e))?;
        removed.push(object);
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prunes_orphans_and_empty_objects() {
        let dir = tempfile::tempdir().unwrap();
        let obj = dir.path();
        fs::write(obj.join("main.o"), b"ELF").unwrap();
        fs::write(obj.join("stale.o"), b"ELF").unwrap();
        fs::write(obj.join("util.o"), b"").unwrap();
        fs::write(obj.join("notes.txt"), b"").unwrap();
        fs::create_dir(obj.join("nested.o")).unwrap();

        let sources: BTreeSet<PathBuf> = ["src/main.cpp", "src/net/util.cpp"]
            .iter()
            .map(PathBuf::from)
            .collect();

        let removed = prune(obj, "o", &sources).unwrap();
        assert_eq!(removed, vec![obj.join("stale.o"), obj.join("util.o")]);
        assert!(obj.join("main.o").exists());
        assert!(obj.join("notes.txt").exists());
        assert!(obj.join("nested.o").is_dir());

        // A second pass finds nothing left to do.
        assert!(prune(obj, "o", &sources).unwrap().is_empty());
    }

    #[test]
    fn test_missing_object_dir_is_not_an_error() {
        let removed = prune(Path::new("/no/such/objects"), "o", &BTreeSet::new()).unwrap();
        assert!(removed.is_empty());
    }
}
