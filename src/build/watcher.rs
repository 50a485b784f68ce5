use super::core::{BuildOptions, build_project, select_mode};
use super::dispatch::FailureFlag;
use crate::config::ModeSettings;
use crate::template::Templater;
use crate::ui::Console;
use anyhow::Result;
use colored::*;
use notify::{Config, RecursiveMode, Watcher};
use std::path::PathBuf;
use std::sync::mpsc::channel;
use std::time::Duration;

/// Rebuilds the selected mode whenever something under its source or include
/// directory changes. Runs until the process is stopped.
pub fn watch(options: &BuildOptions, console: &Console) -> Result<()> {
    let dirs = watched_dirs(options)?;

    let (tx, rx) = channel();
    let config_notify = Config::default().with_poll_interval(Duration::from_secs(1));
    let mut watcher = notify::RecommendedWatcher::new(tx, config_notify)?;
    for dir in &dirs {
        watcher.watch(dir, RecursiveMode::Recursive)?;
    }
    let shown: Vec<String> = dirs.iter().map(|d| d.display().to_string()).collect();
    console.status(format!(
        "{} Watching for changes in {}...",
        "👀".cyan(),
        shown.join(", ")
    ));

    // First run
    rebuild(options, console);

    while rx.recv().is_ok() {
        // Debounce simple
        std::thread::sleep(Duration::from_millis(100));
        while rx.try_recv().is_ok() {}
        console.status(format!("{} File changed. Rebuilding...", "🔄".yellow()));
        rebuild(options, console);
    }
    Ok(())
}

fn watched_dirs(options: &BuildOptions) -> Result<Vec<PathBuf>> {
    let (tree, mode) = select_mode(
        &options.config_path,
        options.mode.as_deref(),
        &options.overrides,
    )?;
    let settings = ModeSettings::resolve(&Templater::new(&tree), &mode)?;

    let mut dirs = vec![settings.source_dir];
    if let Some(include) = settings.include_dir
        && include.is_dir()
        && !dirs.contains(&include)
    {
        dirs.push(include);
    }
    Ok(dirs)
}

fn rebuild(options: &BuildOptions, console: &Console) {
    // Fresh flag per run.
    let flag = FailureFlag::new();
    if let Err(e) = build_project(options, console, &flag) {
        console.error(format!("{:#}", e));
    }
}
