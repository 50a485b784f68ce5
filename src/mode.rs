//! Hierarchical build modes.
//!
//! A mode tree is loaded once from `mb.toml`. Every table is a [`ModeNode`]; its
//! `modes` table declares child modes. Looking up a variable for a mode path walks
//! from the root down to the leaf and the deepest definition wins.
//!
//! ```text
//! (root)            sourceDir = "src", flags = ["-Wall"]
//! ├── debug *       flags = ["-g"]
//! │   ├── asan *
//! │   └── plain
//! └── release       flags = ["-O2"]
//! ```
//!
//! `*` marks the default child used to complete a partial path, so `debug`
//! completes to `debug/asan` and the empty path to `debug/asan` as well.

use crate::error::{BuildError, Result};
use std::collections::BTreeMap;
use std::fmt;

/// A configuration value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Scalar(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn scalar(text: impl Into<String>) -> Self {
        Value::Scalar(text.into())
    }

    pub fn list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Value::List(items.into_iter().map(|s| Value::Scalar(s.into())).collect())
    }

    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            Value::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// Flattens scalars and (nested) lists into plain strings. Maps contribute nothing.
    pub fn flatten(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.flatten_into(&mut out);
        out
    }

    fn flatten_into(&self, out: &mut Vec<String>) {
        match self {
            Value::Scalar(s) => out.push(s.clone()),
            Value::List(items) => items.iter().for_each(|item| item.flatten_into(out)),
            Value::Map(_) => {}
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ModeNode {
    pub name: String,
    pub variables: BTreeMap<String, Value>,
    /// Root-variable overrides applied when this mode is selected for a build.
    pub set: BTreeMap<String, Value>,
    /// Child modes in declaration order.
    pub children: Vec<ModeNode>,
    pub default_child: Option<String>,
}

impl ModeNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_var(mut self, name: &str, value: Value) -> Self {
        self.variables.insert(name.to_string(), value);
        self
    }

    pub fn with_child(mut self, child: ModeNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn child(&self, name: &str) -> Option<&ModeNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// The child used to complete a partial mode path: the explicit default, or the
    /// first declared child.
    pub fn default_child_node(&self) -> Option<&ModeNode> {
        match &self.default_child {
            Some(name) => self.child(name),
            None => self.children.first(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// A `/`-separated path of child mode names. The empty path addresses the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ModePath(Vec<String>);

impl ModePath {
    pub fn parse(path: &str) -> Self {
        ModePath(
            path.split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// `debug.asan`
    pub fn dotted(&self) -> String {
        self.0.join(".")
    }

    /// `debug/asan` with the host path separator.
    pub fn host_path(&self) -> String {
        self.0.join(std::path::MAIN_SEPARATOR_STR)
    }

    pub fn first(&self) -> &str {
        self.0.first().map(String::as_str).unwrap_or("")
    }

    pub fn last(&self) -> &str {
        self.0.last().map(String::as_str).unwrap_or("")
    }

    fn pushed(&self, segment: &str) -> Self {
        let mut next = self.0.clone();
        next.push(segment.to_string());
        ModePath(next)
    }
}

impl fmt::Display for ModePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

#[derive(Debug, Clone)]
pub struct ModeTree {
    root: ModeNode,
}

impl ModeTree {
    /// Validates the structural invariants of the tree.
    pub fn new(root: ModeNode) -> Result<Self> {
        validate(&root, true)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &ModeNode {
        &self.root
    }

    /// Appends default children to `partial` until a leaf is reached.
    pub fn complete_path(&self, partial: &ModePath) -> Result<ModePath> {
        let mut node = &self.root;
        for segment in partial.segments() {
            node = node
                .child(segment)
                .ok_or_else(|| BuildError::ModeNotFound(partial.to_string()))?;
        }

        let mut full = partial.clone();
        while let Some(child) = node.default_child_node() {
            full = full.pushed(&child.name);
            node = child;
        }
        Ok(full)
    }

    /// Nodes from the root down to the end of `path`. Stops early at an unknown
    /// segment; callers pass paths produced by [`ModeTree::complete_path`].
    fn nodes_along(&self, path: &ModePath) -> Vec<&ModeNode> {
        let mut nodes = vec![&self.root];
        let mut node = &self.root;
        for segment in path.segments() {
            match node.child(segment) {
                Some(child) => {
                    nodes.push(child);
                    node = child;
                }
                None => break,
            }
        }
        nodes
    }

    /// The deepest definition of `name` along `path`, if any level defines it.
    pub fn resolve(&self, path: &ModePath, name: &str) -> Option<&Value> {
        self.nodes_along(path)
            .into_iter()
            .filter_map(|node| node.variables.get(name))
            .last()
    }

    /// Resolves `name` and folds it as a directory path.
    pub fn resolve_directory(&self, path: &ModePath, name: &str) -> Result<Option<String>> {
        crate::template::Templater::new(self).resolve_directory(path, name)
    }

    /// Copies the `set` block of every node along `path` into the root variables.
    /// Deeper nodes are applied last so their overrides win.
    pub fn apply_overrides(&mut self, path: &ModePath) {
        let overrides: Vec<(String, Value)> = self
            .nodes_along(path)
            .into_iter()
            .flat_map(|node| node.set.iter().map(|(k, v)| (k.clone(), v.clone())))
            .collect();

        for (name, value) in overrides {
            log::debug!("set {} (mode '{}')", name, path);
            self.root.variables.insert(name, value);
        }
    }

    pub fn set_root_variable(&mut self, name: &str, value: Value) {
        self.root.variables.insert(name.to_string(), value);
    }

    /// Every fully-qualified leaf path, in declaration order.
    pub fn modes(&self) -> Vec<ModePath> {
        let mut out = Vec::new();
        let mut stack = vec![(&self.root, ModePath::default())];
        while let Some((node, path)) = stack.pop() {
            if node.is_leaf() {
                out.push(path);
                continue;
            }
            for child in node.children.iter().rev() {
                stack.push((child, path.pushed(&child.name)));
            }
        }
        out
    }
}

fn validate(node: &ModeNode, is_root: bool) -> Result<()> {
    if !is_root && (node.name.is_empty() || node.name.contains('/')) {
        return Err(BuildError::Config(format!(
            "invalid mode name '{}': names must be non-empty and must not contain '/'",
            node.name
        )));
    }

    if let Some(default) = &node.default_child {
        if node.children.is_empty() {
            return Err(BuildError::Config(format!(
                "mode '{}' sets defaultMode '{}' but declares no child modes",
                node.name, default
            )));
        }
        if node.child(default).is_none() {
            return Err(BuildError::Config(format!(
                "defaultMode '{}' of mode '{}' is not one of its child modes",
                default, node.name
            )));
        }
    }

    for (i, child) in node.children.iter().enumerate() {
        if node.children[..i].iter().any(|c| c.name == child.name) {
            return Err(BuildError::Config(format!(
                "mode '{}' is declared twice",
                child.name
            )));
        }
        validate(child, false)?;
    }
    Ok(())
}
