//! Tool registry
//!
//! Maps tool names to their descriptors and executables. The registry is
//! populated at startup and then shared read-only behind an `Arc` by every
//! conversation.

use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use super::builtin;
use super::descriptor::ToolDescriptor;
use super::manifest::ToolManifest;
use super::trait_def::Tool;
use crate::llm::LLMClient;

/// Registry misconfiguration errors
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Tool '{0}' is already registered")]
    DuplicateName(String),

    #[error("unknown tool '{0}'")]
    UnknownTool(String),

    #[error("Invalid tool manifest {path}: {message}")]
    Manifest { path: PathBuf, message: String },
}

/// A descriptor paired with the executable that implements it
#[derive(Clone)]
pub struct RegisteredTool {
    pub descriptor: ToolDescriptor,
    pub executable: Arc<dyn Tool>,
}

impl std::fmt::Debug for RegisteredTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredTool")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

/// Registry of all available tools, in registration order
#[derive(Debug, Default, Clone)]
pub struct ToolRegistry {
    tools: IndexMap<String, RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in tools
    ///
    /// When `normalizer` is given, `get_time` asks it to map timezone names the
    /// alias table does not know.
    pub fn with_builtins(normalizer: Option<Arc<dyn LLMClient>>) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        builtin::register_all(&mut registry, normalizer)?;
        Ok(registry)
    }

    pub fn register(
        &mut self,
        descriptor: ToolDescriptor,
        executable: Arc<dyn Tool>,
    ) -> Result<(), RegistryError> {
        if self.tools.contains_key(&descriptor.name) {
            return Err(RegistryError::DuplicateName(descriptor.name));
        }

        debug!(tool = %descriptor.name, "Registering tool");
        self.tools.insert(
            descriptor.name.clone(),
            RegisteredTool {
                descriptor,
                executable,
            },
        );
        Ok(())
    }

    /// Registers every command tool declared in a TOML manifest
    ///
    /// Returns the number of tools added. Nothing is registered if any entry is
    /// invalid or collides with an existing name.
    pub fn load_manifest(&mut self, path: &Path) -> Result<usize, RegistryError> {
        let manifest = ToolManifest::from_path(path)?;
        let entries = manifest.into_tools(path)?;

        if let Some((descriptor, _)) = entries
            .iter()
            .find(|(descriptor, _)| self.tools.contains_key(&descriptor.name))
        {
            return Err(RegistryError::DuplicateName(descriptor.name.clone()));
        }

        let count = entries.len();
        for (descriptor, tool) in entries {
            self.register(descriptor, Arc::new(tool))?;
        }

        info!(path = %path.display(), count, "Loaded tool manifest");
        Ok(count)
    }

    /// Descriptors in registration order
    pub fn describe_all(&self) -> Vec<&ToolDescriptor> {
        self.tools.values().map(|t| &t.descriptor).collect()
    }

    pub fn resolve(&self, name: &str) -> Result<&RegisteredTool, RegistryError> {
        self.tools
            .get(name)
            .ok_or_else(|| RegistryError::UnknownTool(name.to_string()))
    }

    /// Get all registered tool names
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if registry is empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{Arguments, FnTool, ParamSpec, ParamType};
    use serde_json::json;

    fn echo() -> (ToolDescriptor, Arc<dyn Tool>) {
        (
            ToolDescriptor::new("echo", "Echo the input")
                .param("text", ParamSpec::required(ParamType::String, "Text")),
            Arc::new(FnTool::new(|args: &Arguments| Ok(args["text"].clone()))),
        )
    }

    #[test]
    fn test_register_and_resolve() {
        let mut registry = ToolRegistry::new();
        let (descriptor, tool) = echo();
        registry.register(descriptor, tool).unwrap();

        assert_eq!(registry.len(), 1);
        assert!(!registry.is_empty());
        assert_eq!(registry.resolve("echo").unwrap().descriptor.name, "echo");
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut registry = ToolRegistry::new();
        let (descriptor, tool) = echo();
        registry.register(descriptor, tool).unwrap();

        let (descriptor, tool) = echo();
        let err = registry.register(descriptor, tool).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateName(ref n) if n == "echo"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_resolve_unknown() {
        let registry = ToolRegistry::new();
        let err = registry.resolve("bogus").unwrap_err();
        assert_eq!(err.to_string(), "unknown tool 'bogus'");
    }

    #[test]
    fn test_describe_all_in_registration_order() {
        let mut registry = ToolRegistry::new();
        for name in ["zeta", "alpha", "mid"] {
            registry
                .register(
                    ToolDescriptor::new(name, "d"),
                    Arc::new(FnTool::new(|_: &Arguments| Ok(json!(null)))),
                )
                .unwrap();
        }

        let names: Vec<_> = registry
            .describe_all()
            .iter()
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
        assert_eq!(registry.tool_names(), vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_with_builtins() {
        let registry = ToolRegistry::with_builtins(None).unwrap();

        let names = registry.tool_names();
        assert!(names.contains(&"echo"));
        assert!(names.contains(&"get_time"));
        assert!(names.contains(&"random_joke"));
        assert!(names.contains(&"add_numbers"));
        assert!(names.contains(&"calculate"));
        assert!(names.contains(&"get_weather"));

        for descriptor in registry.describe_all() {
            assert!(!descriptor.description.is_empty());
        }
    }
}
