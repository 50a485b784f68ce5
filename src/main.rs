//! # mb CLI Entry Point
//!
//! This is the main executable for the `mb` command-line tool.
//! It parses CLI arguments using clap and routes commands to the library.
//!
//! ## Command Structure
//!
//! - **Build**: `build`, `clean`, `watch`
//! - **Inspect**: `modes`, `stats`
//! - **Shell**: `completions`

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use log::LevelFilter;
use std::path::PathBuf;

use modebuild::build::{self, BuildOptions, FailureFlag};
use modebuild::config::CONFIG_FILE;
use modebuild::error::BuildError;
use modebuild::stats;
use modebuild::tree;
use modebuild::ui::Console;

#[cfg(windows)]
#[link(name = "kernel32")]
unsafe extern "system" {
    fn SetConsoleOutputCP(wCodePageID: u32) -> i32;
    fn SetConsoleCP(wCodePageID: u32) -> i32;
}

#[cfg(windows)]
fn enable_windows_utf8_console() {
    unsafe {
        SetConsoleOutputCP(65001);
        SetConsoleCP(65001);
    }
}

#[cfg(not(windows))]
fn enable_windows_utf8_console() {}

#[derive(Parser)]
#[command(name = "mb")]
#[command(about = "Incremental, mode-driven C/C++ builds", version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file
    #[arg(long, global = true, default_value = CONFIG_FILE)]
    config: PathBuf,

    /// More diagnostics (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only print errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Override a root variable after the mode's `set` block (name=value)
    #[arg(long = "set", global = true, value_name = "NAME=VALUE")]
    overrides: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile stale sources and link
    Build {
        /// Mode path, e.g. `debug/asan` (defaults are followed to a leaf)
        mode: Option<String>,
        /// Number of parallel compile jobs
        #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
        jobs: Option<u64>,
        /// Compile one file at a time (same as -j1)
        #[arg(long, conflicts_with = "jobs")]
        sequential: bool,
        /// Show what would be executed without running
        #[arg(long)]
        dry_run: bool,
    },
    /// Remove object files and the link output of a mode
    Clean {
        mode: Option<String>,
    },
    /// Rebuild whenever a source or header changes
    Watch {
        mode: Option<String>,
        #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
        jobs: Option<u64>,
    },
    /// Print the mode tree
    Modes,
    /// Show file, line and pending-rebuild counts
    Stats {
        mode: Option<String>,
    },
    /// Generate shell completions
    Completions { shell: Shell },
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => LevelFilter::Error,
        (false, 0) => LevelFilter::Warn,
        (false, 1) => LevelFilter::Debug,
        (false, _) => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .parse_default_env()
        .init();
}

fn main() {
    enable_windows_utf8_console();

    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);
    let console = Console::new(cli.quiet);

    if let Err(e) = run(cli, &console) {
        console.error(format!("{:#}", e));
        let interrupted = e
            .downcast_ref::<BuildError>()
            .is_some_and(|b| matches!(b, BuildError::Interrupted));
        std::process::exit(if interrupted { 130 } else { 1 });
    }
}

fn run(cli: Cli, console: &Console) -> Result<()> {
    let options = |mode: Option<String>, jobs: Option<u64>, dry_run: bool| BuildOptions {
        config_path: cli.config.clone(),
        mode,
        jobs: jobs.map(|j| j as usize),
        dry_run,
        overrides: cli.overrides.clone(),
    };

    match &cli.command {
        Commands::Build {
            mode,
            jobs,
            sequential,
            dry_run,
        } => {
            let jobs = if *sequential { Some(1) } else { *jobs };
            let options = options(mode.clone(), jobs, *dry_run);

            let flag = FailureFlag::new();
            let handler_flag = flag.clone();
            if let Err(e) = ctrlc::set_handler(move || handler_flag.raise()) {
                log::warn!("could not install the Ctrl-C handler: {}", e);
            }

            build::build_project(&options, console, &flag)?;
            Ok(())
        }

        Commands::Clean { mode } => {
            build::clean(&cli.config, mode.as_deref(), &cli.overrides, console)?;
            Ok(())
        }

        Commands::Watch { mode, jobs } => build::watch(&options(mode.clone(), *jobs, false), console),

        Commands::Modes => tree::print_tree(&cli.config),

        Commands::Stats { mode } => {
            stats::print_stats(&cli.config, mode.as_deref(), &cli.overrides, console)?;
            Ok(())
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let bin_name = cmd.get_name().to_string();
            generate(*shell, &mut cmd, bin_name, &mut std::io::stdout());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_sequential_conflicts_with_jobs() {
        assert!(Cli::try_parse_from(["mb", "build", "-j", "2", "--sequential"]).is_err());
        assert!(Cli::try_parse_from(["mb", "build", "-j", "0"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "mb", "build", "debug/asan", "--dry-run", "--set", "cc=clang", "-vv",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.overrides, ["cc=clang"]);
        match cli.command {
            Commands::Build { mode, dry_run, .. } => {
                assert_eq!(mode.as_deref(), Some("debug/asan"));
                assert!(dry_run);
            }
            _ => panic!("expected build"),
        }
    }
}
