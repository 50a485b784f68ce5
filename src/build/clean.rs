//! Build artifact cleanup.
//!
//! `mb clean [MODE]` removes the object files and link output of one mode, plus the
//! generated `compile_commands.json`. Directories are left in place.

use super::core::{compile_commands_path, select_mode};
use crate::config::ModeSettings;
use crate::template::Templater;
use crate::ui::Console;
use anyhow::{Context, Result};
use colored::*;
use std::fs;
use std::path::{Path, PathBuf};

pub fn clean(
    config_path: &Path,
    mode: Option<&str>,
    overrides: &[String],
    console: &Console,
) -> Result<Vec<PathBuf>> {
    let (tree, mode) = select_mode(config_path, mode, overrides)?;
    let templater = Templater::new(&tree);
    let settings = ModeSettings::resolve(&templater, &mode)?;

    let mut targets = object_files(&settings.object_dir, &settings.object_ext)?;
    targets.push(settings.output_path());
    targets.push(compile_commands_path(config_path));

    let mut removed = Vec::new();
    for path in targets.into_iter().filter(|p| p.is_file()) {
        fs::remove_file(&path).with_context(|| format!("Failed to remove {}", path.display()))?;
        log::debug!("removed {}", path.display());
        removed.push(path);
    }

    if removed.is_empty() {
        console.status(format!("{} Nothing to clean", "!".yellow()));
    } else {
        console.status(format!(
            "{} Clean complete ({} file(s) removed for {})",
            "✓".green(),
            removed.len(),
            mode
        ));
    }
    Ok(removed)
}

fn object_files(dir: &Path, ext: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Failed to list {}", dir.display()))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|e| e == ext))
        .collect();
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_removes_objects_and_output_only() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        let config = root.join("mb.toml");
        let obj = root.join("obj");
        let bin = root.join("bin");
        fs::create_dir_all(&obj).unwrap();
        fs::create_dir_all(&bin).unwrap();
        fs::write(
            &config,
            format!(
                "compileCmd = \"cc\"\nobjectDir = {:?}\noutputDir = {:?}\noutputName = \"app\"\n",
                obj.to_string_lossy(),
                bin.to_string_lossy()
            ),
        )
        .unwrap();
        fs::write(obj.join("a.o"), "o").unwrap();
        fs::write(obj.join("keep.txt"), "t").unwrap();
        fs::write(bin.join("app"), "bin").unwrap();
        fs::write(root.join("compile_commands.json"), "[]").unwrap();

        let removed = clean(&config, None, &[], &Console::new(true)).unwrap();
        assert!(removed.contains(&obj.join("a.o")));
        assert!(removed.contains(&bin.join("app")));
        assert!(!root.join("compile_commands.json").exists());
        assert!(obj.join("keep.txt").exists());
        assert!(obj.is_dir());
    }
}
