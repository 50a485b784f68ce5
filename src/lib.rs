//! # modebuild - Incremental C/C++ Builds Driven by Modes
//!
//! `mb` recompiles exactly the sources a change can affect and nothing else.
//! Build variants ("modes") form a tree declared in `mb.toml`; a child mode
//! inherits every variable of its ancestors and may override any of them.
//!
//! ## Features
//!
//! - **Mode Tree**: `debug/asan`, `release/arm`, ... with default children
//! - **Header Cascade**: touching a header rebuilds every source that reaches it
//! - **Token Templates**: `%in`, `%out`, `%mode`, list expansion, `#` concatenation
//! - **Parallel Builds**: a fixed worker pool that stops cleanly on first failure
//! - **Pruning**: orphaned and truncated object files are removed before analysis
//!
//! ## Quick Start
//!
//! ```toml
//! sourceDir = "src"
//! objectDir = ["build", "%modePath", "obj"]
//! outputDir = ["build", "%modePath"]
//! outputName = "app"
//! compileCmd = ["g++", "-c", "%in", "-o", "%out", "%flags"]
//! linkCmd = ["g++", "%in", "-o", "%out"]
//! flags = ["-Wall"]
//!
//! [modes.debug]
//! flags = ["-Wall", "-g"]
//!
//! [modes.release]
//! flags = ["-Wall", "-O2"]
//! ```
//!
//! ```bash
//! mb build release -j 8
//! ```
//!
//! ## Module Organization
//!
//! - [`build`] - Build pipeline: staleness, dispatch, pruning, clean, watch
//! - [`config`] - Configuration parsing (`mb.toml`) and per-mode settings
//! - [`mode`] - The mode tree and variable resolution
//! - [`template`] - Command and path templating
//! - [`deps`] / [`graph`] - Include extraction and the dependency graph

/// Incremental build pipeline with parallel compilation.
pub mod build;

/// Configuration parsing and resolved per-mode settings.
pub mod config;

/// Direct dependency extraction from source files.
pub mod deps;

/// Error types shared by the library.
pub mod error;

/// Forward and inverse dependency graph.
pub mod graph;

/// Mode tree, mode paths and variable values.
pub mod mode;

/// Project statistics.
pub mod stats;

/// Token templating for commands and paths.
pub mod template;

/// Mode tree printer.
pub mod tree;

/// Terminal output helpers.
pub mod ui;
