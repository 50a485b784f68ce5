//! Error kinds raised by the build core.
//!
//! Configuration, mode and token errors are fatal: the pipeline stops as soon as one
//! surfaces. Command failures stop new work from being dispatched but never kill
//! processes that are already running.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    /// Malformed or self-referential mode tree, or a required variable is missing.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("mode '{0}' not found")]
    ModeNotFound(String),

    /// A `%name` reference that matches no builtin and no variable.
    #[error("cannot resolve token '{token}': {reason}")]
    TokenResolution { token: String, reason: String },

    #[error("command failed with {}: {command}", exit_label(.code))]
    CommandFailure { command: String, code: Option<i32> },

    #[error("build interrupted")]
    Interrupted,

    #[error("failed to start build workers: {0}")]
    Workers(#[from] rayon::ThreadPoolBuildError),

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "a signal".to_string(),
    }
}

impl BuildError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BuildError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn unknown_token(token: &str) -> Self {
        BuildError::TokenResolution {
            token: token.to_string(),
            reason: "no builtin or variable with that name".to_string(),
        }
    }
}

pub type Result<T, E = BuildError> = std::result::Result<T, E>;
