//! Terminal output.
//!
//! [`Console`] is the formatting context handed to everything that prints during a
//! build: it carries the quiet flag and the print lock that keeps concurrent worker
//! lines whole. [`Table`] renders the `mb stats` summary.

use colored::*;
use std::fmt::Display;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
pub struct Console {
    quiet: bool,
    print_lock: Mutex<()>,
}

impl Console {
    pub fn new(quiet: bool) -> Self {
        Self {
            quiet,
            print_lock: Mutex::new(()),
        }
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.print_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A progress line; silenced by `--quiet`.
    pub fn status(&self, line: impl Display) {
        if self.quiet {
            return;
        }
        let _guard = self.guard();
        println!("{}", line);
    }

    /// Failures are always shown.
    pub fn error(&self, line: impl Display) {
        let _guard = self.guard();
        eprintln!("{} {}", "x".red(), line);
    }

    pub fn warn(&self, line: impl Display) {
        if self.quiet {
            return;
        }
        let _guard = self.guard();
        println!("{} {}", "!".yellow(), line);
    }
}

pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: &[&str]) -> Self {
        Self {
            headers: headers.iter().map(|s| s.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn add_row(&mut self, row: Vec<String>) {
        if row.len() == self.headers.len() {
            self.rows.push(row);
        }
    }

    /// Column widths, shrunk (widest first, never below 8) to fit `max_width`.
    fn column_widths(&self, max_width: usize) -> Vec<usize> {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(console::measure_text_width(cell));
            }
        }

        let overhead = 3 + 3 * widths.len();
        while overhead + widths.iter().sum::<usize>() > max_width {
            match widths.iter_mut().filter(|w| **w > 8).max_by_key(|w| **w) {
                Some(widest) => *widest -= 1,
                None => break,
            }
        }
        widths
    }

    pub fn render(&self, max_width: usize) -> Vec<String> {
        if self.headers.is_empty() {
            return Vec::new();
        }
        let widths = self.column_widths(max_width);

        let rule = |left: &str, mid: &str, right: &str| {
            let cells: Vec<String> = widths.iter().map(|w| "─".repeat(w + 2)).collect();
            format!("  {}{}{}", left, cells.join(mid), right)
        };
        let line = |cells: &[String], bold: bool| {
            let rendered: Vec<String> = cells
                .iter()
                .zip(&widths)
                .map(|(cell, width)| {
                    let flat = cell.replace(['\n', '\r', '\t'], " ");
                    let text = console::truncate_str(&flat, *width, "...").to_string();
                    let pad = width.saturating_sub(console::measure_text_width(&text));
                    let text = if bold { text.bold().to_string() } else { text };
                    format!(" {}{} ", text, " ".repeat(pad))
                })
                .collect();
            format!("  │{}│", rendered.join("│"))
        };

        let mut out = vec![rule("┌", "┬", "┐"), line(&self.headers, true), rule("├", "┼", "┤")];
        out.extend(self.rows.iter().map(|row| line(row, false)));
        out.push(rule("└", "┴", "┘"));
        out
    }

    pub fn print(&self) {
        let (_, term_width) = console::Term::stdout().size();
        for line in self.render(term_width as usize) {
            println!("{}", line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_render_shape() {
        let mut table = Table::new(&["Metric", "Count"]);
        table.add_row(vec!["Sources".into(), "12".into()]);
        table.add_row(vec!["only one cell".into()]);
        let lines = table.render(80);
        assert_eq!(lines.len(), 5);
        assert!(lines[1].contains("Metric"));
        assert!(lines[3].contains("Sources"));
        let widths: Vec<usize> = lines.iter().map(|l| console::measure_text_width(l)).collect();
        assert!(widths.iter().all(|w| *w == widths[0]));
    }

    #[test]
    fn test_table_shrinks_to_width() {
        let mut table = Table::new(&["Path"]);
        table.add_row(vec!["x".repeat(200)]);
        let widths = table.column_widths(40);
        assert!(widths[0] <= 40);
        assert!(widths[0] >= 8);
    }
}
