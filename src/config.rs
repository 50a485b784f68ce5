//! `mb.toml` parsing.
//!
//! Every TOML table is a mode node. The keys `modes`, `defaultMode` and `set` shape
//! the tree; every other key is a variable. A variable whose value is exactly
//! `"%name"` is an alias for the value `name` has at that point in the tree and is
//! replaced by a copy of it while loading.

use crate::error::{BuildError, Result};
use crate::mode::{ModeNode, ModePath, ModeTree, Value};
use crate::template::{BUILTINS, Templater};
use std::path::PathBuf;

pub const CONFIG_FILE: &str = "mb.toml";

const KEY_MODES: &str = "modes";
const KEY_DEFAULT_MODE: &str = "defaultMode";
const KEY_SET: &str = "set";

pub fn parse_config(text: &str) -> Result<ModeTree> {
    let table: toml::Table =
        toml::from_str(text).map_err(|e| BuildError::Config(format!("invalid TOML: {}", e)))?;
    let root = node_from_table("", &table)?;
    let root = resolve_aliases(&root)?;
    ModeTree::new(root)
}

fn node_from_table(name: &str, table: &toml::Table) -> Result<ModeNode> {
    let mut node = ModeNode::new(name);

    for (key, value) in table {
        match key.as_str() {
            KEY_MODES => {
                let toml::Value::Table(children) = value else {
                    return Err(BuildError::Config(format!(
                        "'modes' of mode '{}' must be a table",
                        name
                    )));
                };
                if children.is_empty() {
                    return Err(BuildError::Config(format!(
                        "'modes' of mode '{}' is empty",
                        name
                    )));
                }
                for (child_name, child) in children {
                    let toml::Value::Table(child_table) = child else {
                        return Err(BuildError::Config(format!(
                            "mode '{}' must be a table",
                            child_name
                        )));
                    };
                    node.children.push(node_from_table(child_name, child_table)?);
                }
            }
            KEY_DEFAULT_MODE => match value {
                toml::Value::String(child) => node.default_child = Some(child.clone()),
                _ => {
                    return Err(BuildError::Config(format!(
                        "'defaultMode' of mode '{}' must be a string",
                        name
                    )));
                }
            },
            KEY_SET => match convert_value(value) {
                Value::Map(entries) => node.set = entries,
                _ => {
                    return Err(BuildError::Config(format!(
                        "'set' of mode '{}' must be a table",
                        name
                    )));
                }
            },
            _ => {
                node.variables.insert(key.clone(), convert_value(value));
            }
        }
    }

    Ok(node)
}

fn convert_value(value: &toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::Scalar(s.clone()),
        toml::Value::Array(items) => Value::List(items.iter().map(convert_value).collect()),
        toml::Value::Table(table) => Value::Map(
            table
                .iter()
                .map(|(k, v)| (k.clone(), convert_value(v)))
                .collect(),
        ),
        other => Value::Scalar(other.to_string()),
    }
}

/// The referenced name if `value` is an alias (`"%name"`, not a builtin).
fn alias_target(value: &Value) -> Option<&str> {
    let name = value.as_scalar()?.strip_prefix('%')?;
    let is_ident = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    (is_ident && !BUILTINS.contains(&name)).then_some(name)
}

fn resolve_aliases(root: &ModeNode) -> Result<ModeNode> {
    let mut chain = vec![root];
    resolve_node(&mut chain)
}

fn resolve_node<'a>(chain: &mut Vec<&'a ModeNode>) -> Result<ModeNode> {
    let depth = chain.len() - 1;
    let node: &'a ModeNode = chain[depth];

    let mut resolved = ModeNode::new(node.name.clone());
    resolved.default_child = node.default_child.clone();

    for (key, value) in &node.variables {
        let value = match alias_target(value) {
            Some(target) => {
                let mut visiting = vec![(depth, key.clone())];
                follow_alias(chain, depth, target, &mut visiting)?
            }
            None => value.clone(),
        };
        resolved.variables.insert(key.clone(), value);
    }

    for (key, value) in &node.set {
        let value = match alias_target(value) {
            Some(target) => follow_alias(chain, depth, target, &mut Vec::new())?,
            None => value.clone(),
        };
        resolved.set.insert(key.clone(), value);
    }

    for child in &node.children {
        chain.push(child);
        let child = resolve_node(chain);
        chain.pop();
        resolved.children.push(child?);
    }

    Ok(resolved)
}

/// Looks `name` up from `chain[from]` towards the root, following further aliases.
/// `visiting` holds the (level, variable) pairs already on the alias chain.
fn follow_alias(
    chain: &[&ModeNode],
    from: usize,
    name: &str,
    visiting: &mut Vec<(usize, String)>,
) -> Result<Value> {
    for level in (0..=from).rev() {
        let Some(value) = chain[level].variables.get(name) else {
            continue;
        };

        let key = (level, name.to_string());
        if visiting.contains(&key) {
            let names: Vec<String> = visiting
                .iter()
                .map(|(_, n)| n.clone())
                .chain(std::iter::once(name.to_string()))
                .collect();
            return Err(BuildError::Config(format!(
                "alias cycle: {}",
                names.join(" -> ")
            )));
        }

        return match alias_target(value) {
            Some(next) => {
                visiting.push(key);
                follow_alias(chain, level, next, visiting)
            }
            None => Ok(value.clone()),
        };
    }

    Err(BuildError::Config(format!(
        "alias '%{}' does not name any variable",
        name
    )))
}

/// Everything the build pipeline needs from the selected mode.
#[derive(Debug, Clone)]
pub struct ModeSettings {
    pub mode: ModePath,
    pub source_dir: PathBuf,
    pub object_dir: PathBuf,
    pub output_dir: PathBuf,
    pub include_dir: Option<PathBuf>,
    pub source_exts: Vec<String>,
    pub header_exts: Vec<String>,
    pub object_ext: String,
    pub output_name: String,
    pub compile_cmd: Option<Value>,
    pub link_cmd: Option<Value>,
    pub pre_cmds: Vec<Value>,
    pub post_cmds: Vec<Value>,
}

impl ModeSettings {
    pub fn resolve(templater: &Templater<'_>, mode: &ModePath) -> Result<Self> {
        let tree = templater.tree();
        let dir = |name: &str, default: &str| -> Result<PathBuf> {
            Ok(PathBuf::from(
                templater
                    .resolve_directory(mode, name)?
                    .unwrap_or_else(|| default.to_string()),
            ))
        };

        let output_name = match tree.resolve(mode, "outputName") {
            Some(value) => templater.resolve_path(mode, value)?,
            None => "a".to_string(),
        };

        let object_ext = match tree.resolve(mode, "objectExt") {
            Some(Value::Scalar(ext)) => normalize_ext(ext),
            Some(_) => {
                return Err(BuildError::Config(format!(
                    "'objectExt' of mode '{}' must be a string",
                    mode
                )));
            }
            None => "o".to_string(),
        };

        Ok(Self {
            mode: mode.clone(),
            source_dir: dir("sourceDir", "src")?,
            object_dir: dir("objectDir", ".")?,
            output_dir: dir("outputDir", "bin")?,
            include_dir: templater
                .resolve_directory(mode, "includeDir")?
                .map(PathBuf::from),
            source_exts: extensions(tree.resolve(mode, "sourceExt"), "cpp"),
            header_exts: extensions(tree.resolve(mode, "headerExt"), "h"),
            object_ext,
            output_name,
            compile_cmd: tree.resolve(mode, "compileCmd").cloned(),
            link_cmd: tree.resolve(mode, "linkCmd").cloned(),
            pre_cmds: command_list(tree.resolve(mode, "preCmds")),
            post_cmds: command_list(tree.resolve(mode, "postCmds")),
        })
    }

    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(&self.output_name)
    }

    /// `objectDir/<source stem>.<objectExt>`
    pub fn object_path(&self, source: &std::path::Path) -> PathBuf {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        self.object_dir.join(format!("{}.{}", stem, self.object_ext))
    }

    pub fn require_compile_cmd(&self) -> Result<&Value> {
        self.compile_cmd.as_ref().ok_or_else(|| {
            BuildError::Config(format!("mode '{}' does not define 'compileCmd'", self.mode))
        })
    }
}

fn normalize_ext(ext: &str) -> String {
    ext.trim_start_matches('.').to_string()
}

fn extensions(value: Option<&Value>, default: &str) -> Vec<String> {
    match value {
        Some(value) => value.flatten().iter().map(|e| normalize_ext(e)).collect(),
        None => vec![default.to_string()],
    }
}

/// A single command or a list whose items are commands.
fn command_list(value: Option<&Value>) -> Vec<Value> {
    match value {
        Some(Value::List(items)) => items.clone(),
        Some(scalar @ Value::Scalar(_)) => vec![scalar.clone()],
        _ => Vec::new(),
    }
}

pub fn parse_override(pair: &str) -> Result<(String, Value)> {
    match pair.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), Value::scalar(value)))
        }
        _ => Err(BuildError::Config(format!(
            "override '{}' must look like name=value",
            pair
        ))),
    }
}
