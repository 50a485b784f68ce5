//! The incremental build pipeline.
//!
//! `mb build` runs, in order: pre-build commands, source scan, object pruning (with
//! a rescan when anything was removed), staleness analysis, parallel compile
//! dispatch, link, post-build commands.

mod clean;
mod core;
pub mod dispatch;
pub mod prune;
pub mod staleness;
mod utils;
mod watcher;

pub use clean::clean;
pub use core::{
    BuildOptions, BuildReport, COMPILE_COMMANDS, build_project, compile_commands_path, select_mode,
};
pub use dispatch::{CommandRunner, DispatchReport, Dispatcher, FailureFlag, ShellRunner, Task};
pub use utils::{file_time, load_config, run_script, run_shell};
pub use watcher::watch;
