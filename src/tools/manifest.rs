//! TOML manifest of external command tools
//!
//! ```toml
//! [[tool]]
//! name = "lookup_stock"
//! description = "Get the latest price for a ticker symbol"
//! command = "./scripts/stock.sh"
//! args = ["--json"]
//!
//! [tool.parameters.symbol]
//! type = "string"
//! description = "Ticker symbol, e.g. 'AAPL'"
//! ```
//!
//! Relative `command` paths containing a separator, and relative
//! `working_dir` values, are resolved against the manifest's directory. Bare
//! program names are looked up on `PATH`.

use indexmap::IndexMap;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use super::command::CommandTool;
use super::descriptor::{ParamSpec, ToolDescriptor};
use super::registry::RegistryError;

#[derive(Debug, Clone, Deserialize)]
pub struct ToolManifest {
    #[serde(rename = "tool", default)]
    pub tools: Vec<ManifestEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestEntry {
    pub name: String,
    pub description: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    #[serde(default)]
    pub parameters: IndexMap<String, ParamSpec>,
}

impl ToolManifest {
    pub fn from_path(path: &Path) -> Result<Self, RegistryError> {
        let text = fs::read_to_string(path).map_err(|e| RegistryError::Manifest {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::parse(&text, path)
    }

    pub fn parse(text: &str, path: &Path) -> Result<Self, RegistryError> {
        toml::from_str(text).map_err(|e| RegistryError::Manifest {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Validates the entries and builds a descriptor and executable for each
    pub fn into_tools(
        self,
        path: &Path,
    ) -> Result<Vec<(ToolDescriptor, CommandTool)>, RegistryError> {
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let invalid = |message: String| RegistryError::Manifest {
            path: path.to_path_buf(),
            message,
        };

        let mut seen = HashSet::new();
        let mut tools = Vec::with_capacity(self.tools.len());

        for entry in self.tools {
            if entry.name.trim().is_empty() {
                return Err(invalid("tool name must not be empty".to_string()));
            }
            if entry.command.trim().is_empty() {
                return Err(invalid(format!("tool '{}' has an empty command", entry.name)));
            }
            if !seen.insert(entry.name.clone()) {
                return Err(RegistryError::DuplicateName(entry.name));
            }

            let program = resolve_program(base, &entry.command);
            let mut tool = CommandTool::new(entry.name.clone(), program).with_args(entry.args);
            if let Some(dir) = entry.working_dir {
                tool = tool.with_working_dir(if dir.is_relative() {
                    base.join(dir)
                } else {
                    dir
                });
            }

            let descriptor = ToolDescriptor {
                name: entry.name,
                description: entry.description,
                parameters: entry.parameters,
            };
            tools.push((descriptor, tool));
        }

        Ok(tools)
    }
}

fn resolve_program(base: &Path, command: &str) -> PathBuf {
    let program = PathBuf::from(command);
    if program.is_relative() && program.components().count() > 1 {
        base.join(program)
    } else {
        program
    }
}
