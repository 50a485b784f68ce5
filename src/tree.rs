//! Mode tree visualization.
//!
//! `mb modes` prints every mode in declaration order. Default children are marked
//! with `*`; a partial path on the command line follows the marks to a leaf.
//!
//! ## Example Output
//!
//! ```text
//! mb.toml
//! ├── debug *
//! │   ├── plain *
//! │   └── asan
//! └── release
//! ```

use crate::build::load_config;
use crate::mode::ModeNode;
use anyhow::Result;
use colored::*;
use std::path::Path;

pub fn print_tree(config_path: &Path) -> Result<()> {
    let tree = load_config(config_path)?;
    println!("{}", config_path.display().to_string().bold().cyan());
    for line in render_children(tree.root()) {
        println!("{}", line);
    }
    Ok(())
}

/// One line per descendant of `node`, depth first.
pub fn render_children(node: &ModeNode) -> Vec<String> {
    let mut lines = Vec::new();
    render(node, "", &mut lines);
    lines
}

fn render(node: &ModeNode, indent: &str, lines: &mut Vec<String>) {
    let default = node.default_child_node().map(|c| c.name.as_str());
    let count = node.children.len();
    for (i, child) in node.children.iter().enumerate() {
        let is_last = i + 1 == count;
        let prefix = if is_last { "└──" } else { "├──" };
        let marker = if Some(child.name.as_str()) == default {
            format!(" {}", "*".green())
        } else {
            String::new()
        };
        lines.push(format!("{}{} {}{}", indent, prefix, child.name.bold(), marker));

        let nested = format!("{}{}", indent, if is_last { "    " } else { "│   " });
        render(child, &nested, lines);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    #[test]
    fn test_render_marks_defaults_in_order() {
        let tree = parse_config(
            r#"
compileCmd = "cc"

[modes.debug]
defaultMode = "asan"
[modes.debug.modes.plain]
[modes.debug.modes.asan]

[modes.release]
"#,
        )
        .unwrap();

        let lines: Vec<String> = render_children(tree.root())
            .iter()
            .map(|l| console::strip_ansi_codes(l).to_string())
            .collect();
        assert_eq!(
            lines,
            [
                "├── debug *",
                "│   ├── plain",
                "│   └── asan *",
                "└── release",
            ]
        );
    }
}
