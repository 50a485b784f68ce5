use super::dispatch::{Dispatcher, FailureFlag, ShellRunner, Task, default_jobs};
use super::prune::prune;
use super::staleness::compute_rebuild_set;
use super::utils::{file_time, load_config, run_script, run_shell};
use crate::config::{ModeSettings, parse_override};
use crate::deps::IncludeExtractor;
use crate::error::BuildError;
use crate::graph::DependencyGraph;
use crate::mode::{ModePath, ModeTree, Value};
use crate::template::Templater;
use crate::ui::Console;
use anyhow::{Context, Result};
use colored::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

pub const COMPILE_COMMANDS: &str = "compile_commands.json";

#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub config_path: PathBuf,
    /// `/`-separated, possibly partial; completed through default children.
    pub mode: Option<String>,
    /// Worker count; `None` uses every hardware thread.
    pub jobs: Option<usize>,
    pub dry_run: bool,
    /// `name=value` pairs applied to the root variables after the `set` blocks.
    pub overrides: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    pub mode: ModePath,
    /// Sources whose compile command ran (or would run, on a dry run).
    pub compiled: Vec<PathBuf>,
    pub pruned: Vec<PathBuf>,
    pub linked: bool,
}

/// Entry of `compile_commands.json`.
#[derive(Debug, Serialize)]
struct CompileCommand {
    directory: String,
    command: String,
    file: String,
}

/// `compile_commands.json` lives next to the configuration file.
pub fn compile_commands_path(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join(COMPILE_COMMANDS)
}

// --- Helper: Load config, pick the mode, apply its overrides ---
pub fn select_mode(
    config_path: &Path,
    mode: Option<&str>,
    overrides: &[String],
) -> Result<(ModeTree, ModePath)> {
    let mut tree = load_config(config_path)?;
    let partial = ModePath::parse(mode.unwrap_or(""));
    let mode = tree.complete_path(&partial)?;

    tree.apply_overrides(&mode);
    for pair in overrides {
        let (name, value) = parse_override(pair)?;
        log::debug!("override {} from the command line", name);
        tree.set_root_variable(&name, value);
    }
    Ok((tree, mode))
}

fn scan(settings: &ModeSettings) -> Result<DependencyGraph> {
    let graph = DependencyGraph::build(
        &settings.source_dir,
        &settings.source_exts,
        settings.include_dir.as_deref(),
        &IncludeExtractor,
    )?;
    Ok(graph)
}

/// Sources that would overwrite each other's object file.
fn warn_object_collisions(graph: &DependencyGraph, settings: &ModeSettings, console: &Console) {
    let mut owners: BTreeMap<PathBuf, Vec<&PathBuf>> = BTreeMap::new();
    for source in graph.sources() {
        owners
            .entry(settings.object_path(source))
            .or_default()
            .push(source);
    }
    for (object, sources) in owners.iter().filter(|(_, s)| s.len() > 1) {
        let names: Vec<String> = sources.iter().map(|s| s.display().to_string()).collect();
        console.warn(format!(
            "{} is the object file of several sources: {}",
            object.display(),
            names.join(", ")
        ));
    }
}

fn run_hooks(
    templater: &Templater<'_>,
    settings: &ModeSettings,
    hooks: &[Value],
    stage: &str,
    console: &Console,
) -> Result<()> {
    if hooks.is_empty() {
        return Ok(());
    }
    let project_dir = std::env::current_dir()?;
    let input = settings.source_dir.to_string_lossy();
    let output = settings.output_path();
    let output = output.to_string_lossy();

    for hook in hooks {
        let command = templater.resolve_command(&settings.mode, hook, &input, &output)?;
        console.status(format!("   {} {}", "↪".cyan(), command));
        run_script(&command, &project_dir)
            .with_context(|| format!("{} command failed", stage))?;
    }
    Ok(())
}

fn write_compile_commands(
    path: &Path,
    templater: &Templater<'_>,
    settings: &ModeSettings,
    compile_cmd: &Value,
    graph: &DependencyGraph,
) -> Result<()> {
    let directory = std::env::current_dir()?.to_string_lossy().to_string();
    let entries = graph
        .sources()
        .iter()
        .map(|source| {
            let object = settings.object_path(source);
            let command = templater.resolve_command(
                &settings.mode,
                compile_cmd,
                &source.to_string_lossy(),
                &object.to_string_lossy(),
            )?;
            Ok(CompileCommand {
                directory: directory.clone(),
                command,
                file: source.to_string_lossy().to_string(),
            })
        })
        .collect::<Result<Vec<_>, BuildError>>()?;

    let json = serde_json::to_string_pretty(&entries)?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Link when the output is missing, anything was compiled, or an object is newer.
fn needs_link(output: &Path, objects: &[PathBuf], compiled: bool) -> bool {
    if compiled || !output.exists() {
        return true;
    }
    let output_time = file_time(output);
    objects.iter().any(|obj| file_time(obj) > output_time)
}

// --- CORE: Build Project ---
pub fn build_project(
    options: &BuildOptions,
    console: &Console,
    flag: &FailureFlag,
) -> Result<BuildReport> {
    let start_time = Instant::now();
    let (tree, mode) = select_mode(
        &options.config_path,
        options.mode.as_deref(),
        &options.overrides,
    )?;
    let templater = Templater::new(&tree);
    let settings = ModeSettings::resolve(&templater, &mode)?;
    let output = settings.output_path();
    let dry_run = options.dry_run;

    console.status(format!(
        "{} Building {}{}",
        "⚙".cyan(),
        mode.to_string().bold(),
        if dry_run { " (dry run)" } else { "" }
    ));

    // 1. Pre-build commands
    if !dry_run {
        run_hooks(&templater, &settings, &settings.pre_cmds, "Pre-build", console)?;
        fs::create_dir_all(&settings.object_dir).with_context(|| {
            format!("Failed to create {}", settings.object_dir.display())
        })?;
        fs::create_dir_all(&settings.output_dir).with_context(|| {
            format!("Failed to create {}", settings.output_dir.display())
        })?;
    }

    // 2. Scan, prune, rescan
    let mut graph = scan(&settings)?;
    let mut pruned = Vec::new();
    if !dry_run {
        pruned = prune(&settings.object_dir, &settings.object_ext, graph.sources())?;
        if !pruned.is_empty() {
            console.status(format!(
                "   {} Removed {} stale object file(s)",
                "🗑️".red(),
                pruned.len()
            ));
            graph = scan(&settings)?;
        }
    }

    if graph.sources().is_empty() {
        return Err(anyhow::anyhow!(
            "No source files found in {}",
            settings.source_dir.display()
        ));
    }
    warn_object_collisions(&graph, &settings, console);

    // 3. Rebuild set
    let rebuild = compute_rebuild_set(
        &graph,
        |source| settings.object_path(source),
        &output,
        &settings.source_exts,
        &settings.header_exts,
        settings.include_dir.as_deref(),
    );
    log::debug!("{} of {} sources are stale", rebuild.len(), graph.sources().len());

    // 4. Commands (all resolved before anything runs)
    let mut tasks = Vec::with_capacity(rebuild.len());
    if !rebuild.is_empty() {
        let compile_cmd = settings.require_compile_cmd()?;
        for (index, source) in rebuild.iter().enumerate() {
            let object = settings.object_path(source);
            let command = templater.resolve_command(
                &mode,
                compile_cmd,
                &source.to_string_lossy(),
                &object.to_string_lossy(),
            )?;
            tasks.push(Task {
                source: source.clone(),
                object,
                command,
                index,
            });
        }
    }

    let objects: Vec<PathBuf> = graph
        .sources()
        .iter()
        .map(|s| settings.object_path(s))
        .collect();
    let link_command = match &settings.link_cmd {
        Some(link) => {
            let inputs: Vec<String> = objects
                .iter()
                .map(|o| o.to_string_lossy().to_string())
                .collect();
            Some(templater.resolve_command(&mode, link, &inputs.join(" "), &output.to_string_lossy())?)
        }
        None => None,
    };

    if let Some(compile_cmd) = &settings.compile_cmd {
        if dry_run {
            log::debug!("dry run: not writing {}", COMPILE_COMMANDS);
        } else {
            let path = compile_commands_path(&options.config_path);
            write_compile_commands(&path, &templater, &settings, compile_cmd, &graph)?;
        }
    }

    let mut report = BuildReport {
        mode: mode.clone(),
        compiled: rebuild.clone(),
        pruned,
        linked: false,
    };

    if dry_run {
        for task in &tasks {
            console.status(format!("   {} {}", "compile".cyan(), task.command));
        }
        if let Some(link) = &link_command
            && needs_link(&output, &objects, !tasks.is_empty())
        {
            console.status(format!("   {} {}", "link".cyan(), link));
        }
        if tasks.is_empty() {
            console.status(format!("{} Up to date", "⚡".green()));
        }
        return Ok(report);
    }

    if flag.is_raised() {
        return Err(BuildError::Interrupted.into());
    }

    // 5. Compile
    let compiled = !tasks.is_empty();
    if compiled {
        let jobs = options.jobs.unwrap_or_else(default_jobs);
        let dispatch = Dispatcher::new(jobs, &ShellRunner, console, flag.clone()).run(tasks)?;
        log::debug!(
            "{} started, {} completed, {} failed",
            dispatch.started,
            dispatch.completed,
            dispatch.failures.len()
        );

        if let Some((task, err)) = dispatch.failures.into_iter().next() {
            return Err(anyhow::Error::new(err)
                .context(format!("Compilation of {} failed", task.source.display())));
        }
        if flag.is_raised() {
            return Err(BuildError::Interrupted.into());
        }
    }

    // 6. Link
    if let Some(link) = &link_command {
        if needs_link(&output, &objects, compiled) {
            console.status(format!("   {} Linking {}", "🔗".cyan(), output.display()));
            run_shell(link).context("Linking failed")?;
            report.linked = true;
        } else if !compiled {
            console.status(format!("{} Up to date", "⚡".green()));
        }
    } else if !compiled {
        console.status(format!("{} Up to date", "⚡".green()));
    }

    // 7. Post-build commands
    run_hooks(&templater, &settings, &settings.post_cmds, "Post-build", console)?;

    console.status(format!(
        "{} Build finished in {:.2?}",
        "✓".green(),
        start_time.elapsed()
    ));
    Ok(report)
}
