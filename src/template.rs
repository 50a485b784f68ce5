//! Command and path templates.
//!
//! A template is a token list (or a single string). Each token is one of:
//!
//! - `text` - literal text
//! - `%name` - a builtin or a mode variable
//! - `%%text` / `##text` - the literal `%text` / `#text`
//! - `#token` - `token`, joined to the previous text without a separator
//!
//! Commands join tokens with a space, paths with the host path separator.
//! A list-valued variable expands in place, so a flag fragment defined once can be
//! referenced from several modes. Variables whose name contains `Dir` always
//! resolve as directory paths.

use crate::error::{BuildError, Result};
use crate::mode::{ModePath, ModeTree, Value};
use std::path::MAIN_SEPARATOR_STR;
use std::time::{SystemTime, UNIX_EPOCH};

/// Names that `%name` resolves without consulting the mode tree.
pub const BUILTINS: &[&str] = &[
    "in",
    "out",
    "mode",
    "modePath",
    "modeFirst",
    "modeLast",
    "self",
    "utime",
    "platform",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Literal(&'a str),
    Reference(&'a str),
}

/// Splits a raw token into its concatenation flag and payload.
fn parse_token(raw: &str) -> (bool, Token<'_>) {
    if raw.starts_with("##") || raw.starts_with("%%") {
        return (false, Token::Literal(&raw[1..]));
    }
    match raw.strip_prefix('#') {
        Some(rest) => (true, parse_payload(rest)),
        None => (false, parse_payload(raw)),
    }
}

fn parse_payload(raw: &str) -> Token<'_> {
    if raw.starts_with("%%") {
        Token::Literal(&raw[1..])
    } else if let Some(name) = raw.strip_prefix('%') {
        Token::Reference(name)
    } else {
        Token::Literal(raw)
    }
}

/// Process-wide values captured once so repeated resolution is byte-identical.
#[derive(Debug, Clone)]
pub struct Builtins {
    pub self_path: String,
    pub utime: u64,
    pub platform: &'static str,
}

impl Builtins {
    pub fn capture() -> Self {
        let self_path = std::env::current_exe()
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_default();
        let utime = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        Self {
            self_path,
            utime,
            platform: platform_id(),
        }
    }
}

fn platform_id() -> &'static str {
    match std::env::consts::OS {
        "macos" | "ios" => "mac",
        "freebsd" | "openbsd" | "netbsd" | "dragonfly" => "bsd",
        other => other,
    }
}

/// Accumulates emitted text, inserting a separator between tokens unless the next
/// one is concatenation-marked.
struct Fold {
    out: String,
    separator: &'static str,
    started: bool,
}

impl Fold {
    fn new(separator: &'static str) -> Self {
        Self {
            out: String::new(),
            separator,
            started: false,
        }
    }

    fn push(&mut self, text: &str, concat: bool) {
        if text.is_empty() {
            return;
        }
        if self.started && !concat {
            let doubled = self.separator == MAIN_SEPARATOR_STR
                && (self.out.ends_with(self.separator) || text.starts_with(self.separator));
            if !doubled {
                self.out.push_str(self.separator);
            }
        }
        self.out.push_str(text);
        self.started = true;
    }
}

#[derive(Clone, Copy)]
struct Scope<'s> {
    mode: &'s ModePath,
    input: Option<&'s str>,
    output: Option<&'s str>,
}

pub struct Templater<'a> {
    tree: &'a ModeTree,
    builtins: Builtins,
}

impl<'a> Templater<'a> {
    pub fn new(tree: &'a ModeTree) -> Self {
        Self::with_builtins(tree, Builtins::capture())
    }

    pub fn with_builtins(tree: &'a ModeTree, builtins: Builtins) -> Self {
        Self { tree, builtins }
    }

    pub fn tree(&self) -> &ModeTree {
        self.tree
    }

    /// Folds `tokens` into a filesystem path. An empty result is `.`.
    pub fn resolve_path(&self, mode: &ModePath, tokens: &Value) -> Result<String> {
        let scope = Scope {
            mode,
            input: None,
            output: None,
        };
        self.fold_path(scope, tokens, &mut Vec::new())
    }

    /// Resolves variable `name` for `mode` as a directory path.
    pub fn resolve_directory(&self, mode: &ModePath, name: &str) -> Result<Option<String>> {
        match self.tree.resolve(mode, name) {
            Some(value) => {
                let scope = Scope {
                    mode,
                    input: None,
                    output: None,
                };
                let mut stack = vec![name.to_string()];
                self.fold_path(scope, value, &mut stack).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Folds `template` into a shell command with `%in` and `%out` bound.
    pub fn resolve_command(
        &self,
        mode: &ModePath,
        template: &Value,
        input: &str,
        output: &str,
    ) -> Result<String> {
        let scope = Scope {
            mode,
            input: Some(input),
            output: Some(output),
        };
        let mut fold = Fold::new(" ");
        let mut stack = Vec::new();
        match template {
            // A plain string command is split into whitespace-separated tokens.
            Value::Scalar(text) => {
                for raw in text.split_whitespace() {
                    self.fold_token(scope, raw, false, &mut fold, &mut stack)?;
                }
            }
            other => self.fold_value(scope, other, false, &mut fold, &mut stack)?,
        }
        Ok(fold.out)
    }

    fn fold_path(&self, scope: Scope<'_>, value: &Value, stack: &mut Vec<String>) -> Result<String> {
        let mut fold = Fold::new(MAIN_SEPARATOR_STR);
        self.fold_value(scope, value, false, &mut fold, stack)?;
        if fold.out.is_empty() {
            Ok(".".to_string())
        } else {
            Ok(fold.out)
        }
    }

    fn fold_value(
        &self,
        scope: Scope<'_>,
        value: &Value,
        concat: bool,
        fold: &mut Fold,
        stack: &mut Vec<String>,
    ) -> Result<()> {
        match value {
            Value::Scalar(raw) => self.fold_token(scope, raw, concat, fold, stack),
            Value::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    self.fold_value(scope, item, concat && i == 0, fold, stack)?;
                }
                Ok(())
            }
            Value::Map(_) => Err(BuildError::TokenResolution {
                token: stack.last().map(|n| format!("%{}", n)).unwrap_or_default(),
                reason: "a table cannot be used in a template".to_string(),
            }),
        }
    }

    fn fold_token(
        &self,
        scope: Scope<'_>,
        raw: &str,
        concat_outer: bool,
        fold: &mut Fold,
        stack: &mut Vec<String>,
    ) -> Result<()> {
        let (concat, token) = parse_token(raw);
        let concat = concat || concat_outer;
        match token {
            Token::Literal(text) => {
                fold.push(text, concat);
                Ok(())
            }
            Token::Reference(name) => self.fold_reference(scope, name, concat, fold, stack),
        }
    }

    fn fold_reference(
        &self,
        scope: Scope<'_>,
        name: &str,
        concat: bool,
        fold: &mut Fold,
        stack: &mut Vec<String>,
    ) -> Result<()> {
        if let Some(text) = self.builtin(scope, name) {
            fold.push(&text, concat);
            return Ok(());
        }

        let value = self
            .tree
            .resolve(scope.mode, name)
            .ok_or_else(|| BuildError::unknown_token(&format!("%{}", name)))?;

        if stack.iter().any(|n| n == name) {
            let mut chain: Vec<&str> = stack.iter().map(String::as_str).collect();
            chain.push(name);
            return Err(BuildError::TokenResolution {
                token: format!("%{}", name),
                reason: format!("recursive reference ({})", chain.join(" -> ")),
            });
        }

        stack.push(name.to_string());
        let result = if name.contains("Dir") {
            self.fold_path(scope, value, stack)
                .map(|dir| fold.push(&dir, concat))
        } else {
            match value {
                Value::Scalar(text) => {
                    fold.push(text, concat);
                    Ok(())
                }
                other => self.fold_value(scope, other, concat, fold, stack),
            }
        };
        stack.pop();
        result
    }

    fn builtin(&self, scope: Scope<'_>, name: &str) -> Option<String> {
        let text = match name {
            "in" => scope.input?.to_string(),
            "out" => scope.output?.to_string(),
            "mode" => scope.mode.dotted(),
            "modePath" => scope.mode.host_path(),
            "modeFirst" => scope.mode.first().to_string(),
            "modeLast" => scope.mode.last().to_string(),
            "self" => self.builtins.self_path.clone(),
            "utime" => self.builtins.utime.to_string(),
            "platform" => self.builtins.platform.to_string(),
            _ => return None,
        };
        Some(text)
    }
}
