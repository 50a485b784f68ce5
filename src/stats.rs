//! Project statistics.
//!
//! `mb stats [MODE]` scans the selected mode's source tree the same way a build
//! does and reports what it found, including how many sources a build would
//! recompile right now.
//!
//! ## Example Output
//!
//! ```text
//! 📊 Calculating statistics for release...
//!   ┌──────────────┬───────┐
//!   │ Metric       │ Count │
//!   ├──────────────┼───────┤
//!   │ Files        │ 14    │
//!   │ Sources      │ 9     │
//!   │ Headers      │ 5     │
//!   │ Total Lines  │ 1234  │
//!   │ Code         │ 987   │
//!   │ Comments     │ 156   │
//!   │ Blank        │ 91    │
//!   │ Pending      │ 2     │
//!   └──────────────┴───────┘
//! ```

use crate::build::{select_mode, staleness::compute_rebuild_set};
use crate::config::ModeSettings;
use crate::deps::IncludeExtractor;
use crate::graph::{DependencyGraph, has_extension};
use crate::template::Templater;
use crate::ui::{Console, Table};
use anyhow::Result;
use colored::*;
use std::fs;
use std::path::Path;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Stats {
    pub files: usize,
    pub sources: usize,
    pub headers: usize,
    pub total_lines: usize,
    pub code_lines: usize,
    pub comment_lines: usize,
    pub blank_lines: usize,
    /// Sources the next build would recompile.
    pub pending: usize,
}

pub fn collect_stats(config_path: &Path, mode: Option<&str>, overrides: &[String]) -> Result<Stats> {
    let (tree, mode) = select_mode(config_path, mode, overrides)?;
    let settings = ModeSettings::resolve(&Templater::new(&tree), &mode)?;
    let graph = DependencyGraph::build(
        &settings.source_dir,
        &settings.source_exts,
        settings.include_dir.as_deref(),
        &IncludeExtractor,
    )?;

    let mut stats = Stats {
        sources: graph.sources().len(),
        ..Default::default()
    };

    for file in graph.files() {
        // Includes that could not be resolved are graph nodes but not files.
        if !file.is_file() {
            continue;
        }
        stats.files += 1;
        if has_extension(file, &settings.header_exts) {
            stats.headers += 1;
        }
        if let Ok((lines, code, blank, comment)) = count_file_stats(file) {
            stats.total_lines += lines;
            stats.code_lines += code;
            stats.blank_lines += blank;
            stats.comment_lines += comment;
        }
    }

    stats.pending = compute_rebuild_set(
        &graph,
        |source| settings.object_path(source),
        &settings.output_path(),
        &settings.source_exts,
        &settings.header_exts,
        settings.include_dir.as_deref(),
    )
    .len();

    Ok(stats)
}

pub fn print_stats(
    config_path: &Path,
    mode: Option<&str>,
    overrides: &[String],
    console: &Console,
) -> Result<Stats> {
    console.status(format!("{} Calculating statistics...", "📊".cyan()));
    let stats = collect_stats(config_path, mode, overrides)?;

    let mut table = Table::new(&["Metric", "Count"]);
    let rows = [
        ("Files", stats.files, false),
        ("Sources", stats.sources, false),
        ("Headers", stats.headers, false),
        ("Total Lines", stats.total_lines, false),
        ("Code", stats.code_lines, true),
        ("Comments", stats.comment_lines, false),
        ("Blank", stats.blank_lines, false),
    ];
    for (label, count, highlight) in rows {
        let label = if highlight { label.green() } else { label.dimmed() };
        table.add_row(vec![label.to_string(), count.to_string()]);
    }
    let pending = if stats.pending > 0 {
        stats.pending.to_string().yellow().to_string()
    } else {
        "0".to_string()
    };
    table.add_row(vec!["Pending".dimmed().to_string(), pending]);

    if !console.is_quiet() {
        table.print();
    }
    Ok(stats)
}

fn count_file_stats(path: &Path) -> Result<(usize, usize, usize, usize)> {
    let bytes = fs::read(path)?;
    Ok(count_lines(&String::from_utf8_lossy(&bytes)))
}

/// `(total, code, blank, comment)`
fn count_lines(content: &str) -> (usize, usize, usize, usize) {
    let mut total = 0;
    let mut blank = 0;
    let mut comment = 0;
    let mut code = 0;

    let mut in_block_comment = false;

    for line in content.lines() {
        total += 1;
        let trimmed = line.trim();

        if trimmed.is_empty() {
            blank += 1;
            continue;
        }

        if in_block_comment {
            comment += 1;
            if trimmed.contains("*/") {
                in_block_comment = false;
            }
        } else if trimmed.starts_with("//") {
            comment += 1;
        } else if trimmed.starts_with("/*") {
            comment += 1;
            if !trimmed.contains("*/") {
                in_block_comment = true;
            }
        } else {
            code += 1;
        }
    }

    (total, code, blank, comment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_lines_simple() {
        let content = r#"// Comment line
int main() {
    return 0;
}

"#;
        assert_eq!(count_lines(content), (5, 3, 1, 1));
    }

    #[test]
    fn test_count_lines_block_comment() {
        let content = r#"/*
 * Block comment
 */
int main() {}"#;
        let (total, code, _blank, comment) = count_lines(content);
        assert_eq!(total, 4);
        assert_eq!(code, 1);
        assert_eq!(comment, 3);
    }

    #[test]
    fn test_count_file_stats_latin1() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("legacy.cpp");
        fs::write(&file, b"// \xa9 M\xfcller\nint x;\n").unwrap();
        assert_eq!(count_file_stats(&file).unwrap(), (2, 1, 0, 1));
    }

    #[test]
    fn test_collect_stats_counts_graph() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("main.cpp"), "#include \"util.h\"\nint main() {}\n").unwrap();
        fs::write(src.join("util.cpp"), "#include \"util.h\"\n#include \"gone.h\"\n").unwrap();
        fs::write(src.join("util.h"), "// shared\n").unwrap();

        let config = dir.path().join("mb.toml");
        fs::write(
            &config,
            format!(
                "compileCmd = \"cc\"\nsourceDir = {:?}\nobjectDir = {:?}\n",
                src.to_string_lossy(),
                dir.path().join("obj").to_string_lossy()
            ),
        )
        .unwrap();

        let stats = collect_stats(&config, None, &[]).unwrap();
        assert_eq!(stats.sources, 2);
        assert_eq!(stats.files, 3);
        assert_eq!(stats.headers, 1);
        assert_eq!(stats.total_lines, 5);
        assert_eq!(stats.comment_lines, 1);
        assert_eq!(stats.pending, 2);
    }
}
