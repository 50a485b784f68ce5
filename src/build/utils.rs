use crate::config::parse_config;
use crate::error::BuildError;
use crate::mode::ModeTree;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

// --- Helper: Load Config ---
pub fn load_config(path: &Path) -> Result<ModeTree> {
    if !path.exists() {
        return Err(anyhow::anyhow!(
            "{} not found.\n\n\
            💡 Tip: create one with at least a 'compileCmd', or pass --config <file>.",
            path.display()
        ));
    }
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {} - check file permissions", path.display()))?;

    let tree = parse_config(&text).with_context(|| format!("Failed to load {}", path.display()))?;
    Ok(tree)
}

// --- Helper: Modification time, epoch when the file is missing ---
pub fn file_time(path: &Path) -> SystemTime {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .unwrap_or(UNIX_EPOCH)
}

// --- Helper: Shell command (Cross Platform) ---
pub fn shell_command(command: &str) -> Command {
    if cfg!(target_os = "windows") {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", command]);
        cmd
    } else {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", command]);
        cmd
    }
}

/// Runs `command` through the shell with inherited stdout/stderr.
pub fn run_shell(command: &str) -> Result<(), BuildError> {
    let status = shell_command(command)
        .status()
        .map_err(|e| BuildError::io(shell_program(), e))?;

    if status.success() {
        Ok(())
    } else {
        Err(BuildError::CommandFailure {
            command: command.to_string(),
            code: status.code(),
        })
    }
}

fn shell_program() -> &'static str {
    if cfg!(target_os = "windows") { "cmd" } else { "sh" }
}

// --- Helper: Run pre/post build command ---
pub fn run_script(script: &str, project_dir: &Path) -> Result<(), BuildError> {
    if script.ends_with(".rhai") {
        let script_path = project_dir.join(script);
        if script_path.is_file() {
            log::debug!("running Rhai script {}", script_path.display());
            let engine = rhai::Engine::new();
            return engine
                .run_file(script_path)
                .map_err(|e| BuildError::CommandFailure {
                    command: format!("{} ({})", script, e),
                    code: None,
                });
        }
    }

    run_shell(script)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_time_missing_is_epoch() {
        assert_eq!(file_time(Path::new("/no/such/file.o")), UNIX_EPOCH);
    }

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config(Path::new("/no/such/mb.toml")).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_load_config_reports_bad_alias() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mb.toml");
        fs::write(&path, "cc = \"%cxx\"\n").unwrap();
        let err = load_config(&path).unwrap_err();
        let root = err.root_cause().to_string();
        assert!(root.contains("cxx"), "{}", root);
    }

    #[cfg(unix)]
    #[test]
    fn test_run_shell_exit_code() {
        assert!(run_shell("true").is_ok());
        let err = run_shell("exit 3").unwrap_err();
        assert!(matches!(err, BuildError::CommandFailure { code: Some(3), .. }));
    }

    #[test]
    fn test_run_rhai_script() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("ok.rhai"), "let x = 40 + 2; x").unwrap();
        fs::write(dir.path().join("bad.rhai"), "throw \"nope\";").unwrap();
        assert!(run_script("ok.rhai", dir.path()).is_ok());
        assert!(run_script("bad.rhai", dir.path()).is_err());
    }
}
