//! Configuration management for toolchat
//!
//! Settings are loaded from environment variables with defaults. CLI flags
//! override individual fields after loading.
//!
//! # Environment Variables
//!
//! - `TOOLCHAT_MODEL`: Ollama model name - default: "gemma3:12b"
//! - `OLLAMA_HOST`: Ollama endpoint - default: "http://localhost:11434"
//! - `TOOLCHAT_MAX_ROUNDS`: Tool rounds per chat - default: "3"
//! - `TOOLCHAT_REQUEST_TIMEOUT`: Seconds per chat request - default: "60"
//! - `TOOLCHAT_TOOL_TIMEOUT`: Seconds per tool call - default: "30"
//! - `TOOLCHAT_TEMPERATURE`: Sampling temperature - default: model default
//! - `TOOLCHAT_MAX_TOKENS`: Tokens per model reply - default: model default
//! - `TOOLCHAT_HOST`: HTTP bind address - default: "0.0.0.0"
//! - `TOOLCHAT_PORT`: HTTP port - default: "8001"
//! - `TOOLCHAT_TOOLS_FILE`: TOML manifest of command tools - default: none
//! - `TOOLCHAT_LOG_LEVEL`: Logging level - default: "info"
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use toolchat::llm::LLMClient;
//! use toolchat::ToolchatConfig;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ToolchatConfig::default();
//! config.validate()?;
//!
//! let client = config.create_client()?;
//! let registry = config.build_registry(Some(client.clone() as Arc<dyn LLMClient>))?;
//! println!("{} tools available", registry.len());
//! # Ok(())
//! # }
//! ```

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::chat::{LoopOptions, DEFAULT_MAX_ROUNDS};
use crate::llm::{BackendError, LLMClient, OllamaClient};
use crate::tools::{RegistryError, ToolRegistry};

/// Default values for configuration
const DEFAULT_MODEL: &str = "gemma3:12b";
const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 30;
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8001;
const DEFAULT_LOG_LEVEL: &str = "info";

/// Upper bound on the round budget
const MAX_ROUNDS_LIMIT: usize = 20;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    /// Completion backend could not be constructed
    #[error("Backend initialization failed: {0}")]
    BackendInitError(#[from] BackendError),

    /// Tool registry could not be built
    #[error("Tool registry error: {0}")]
    Registry(#[from] RegistryError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolchatConfig {
    /// Model name to use for inference
    pub model: String,

    /// Ollama endpoint URL
    pub ollama_host: String,

    /// Maximum number of tool rounds per chat
    pub max_rounds: usize,

    /// Timeout for one chat request (all rounds), in seconds
    pub request_timeout_secs: u64,

    /// Timeout for one tool call, in seconds
    pub tool_timeout_secs: u64,

    /// Sampling temperature passed to the model
    pub temperature: Option<f32>,

    /// Cap on tokens generated per model reply
    pub max_tokens: Option<u32>,

    /// HTTP bind address
    pub host: String,

    /// HTTP port
    pub port: u16,

    /// Optional TOML manifest of external command tools
    pub tools_file: Option<PathBuf>,

    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for ToolchatConfig {
    /// Loads from `TOOLCHAT_*` environment variables, falling back to defaults
    /// for anything missing or unparsable
    fn default() -> Self {
        let model = env::var("TOOLCHAT_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        let ollama_host =
            env::var("OLLAMA_HOST").unwrap_or_else(|_| DEFAULT_OLLAMA_HOST.to_string());

        let max_rounds = env::var("TOOLCHAT_MAX_ROUNDS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(DEFAULT_MAX_ROUNDS);

        let request_timeout_secs = env::var("TOOLCHAT_REQUEST_TIMEOUT")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);

        let tool_timeout_secs = env::var("TOOLCHAT_TOOL_TIMEOUT")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TOOL_TIMEOUT_SECS);

        let temperature = env::var("TOOLCHAT_TEMPERATURE")
            .ok()
            .and_then(|v| v.parse::<f32>().ok());

        let max_tokens = env::var("TOOLCHAT_MAX_TOKENS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok());

        let host = env::var("TOOLCHAT_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());

        let port = env::var("TOOLCHAT_PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);

        let tools_file = env::var("TOOLCHAT_TOOLS_FILE")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        let log_level = env::var("TOOLCHAT_LOG_LEVEL")
            .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string())
            .to_lowercase();

        Self {
            model,
            ollama_host,
            max_rounds,
            request_timeout_secs,
            tool_timeout_secs,
            temperature,
            max_tokens,
            host,
            port,
            tools_file,
            log_level,
        }
    }
}

impl ToolchatConfig {
    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` naming the first invalid field
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "Model name must not be empty".to_string(),
            ));
        }

        if !(self.ollama_host.starts_with("http://") || self.ollama_host.starts_with("https://"))
        {
            return Err(ConfigError::ValidationFailed(format!(
                "OLLAMA_HOST must start with http:// or https://, got '{}'",
                self.ollama_host
            )));
        }

        if self.max_rounds > MAX_ROUNDS_LIMIT {
            return Err(ConfigError::ValidationFailed(format!(
                "Max rounds cannot exceed {}",
                MAX_ROUNDS_LIMIT
            )));
        }

        // At least 1 second, max 10 minutes
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "Request timeout must be at least 1 second".to_string(),
            ));
        }
        if self.request_timeout_secs > 600 {
            return Err(ConfigError::ValidationFailed(
                "Request timeout cannot exceed 10 minutes".to_string(),
            ));
        }
        if self.tool_timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "Tool timeout must be at least 1 second".to_string(),
            ));
        }

        if let Some(t) = self.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(ConfigError::ValidationFailed(format!(
                    "Temperature must be between 0.0 and 2.0, got {}",
                    t
                )));
            }
        }

        if self.max_tokens == Some(0) {
            return Err(ConfigError::ValidationFailed(
                "Max tokens must be at least 1".to_string(),
            ));
        }

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::ValidationFailed(format!(
                    "Invalid log level: {}. Valid options: trace, debug, info, warn, error",
                    self.log_level
                )))
            }
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn loop_options(&self) -> LoopOptions {
        LoopOptions {
            max_rounds: self.max_rounds,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }

    /// Creates the Ollama completion client
    pub fn create_client(&self) -> Result<Arc<OllamaClient>, ConfigError> {
        let client = OllamaClient::with_timeout(
            self.ollama_host.clone(),
            self.model.clone(),
            self.request_timeout(),
        )?;
        Ok(Arc::new(client))
    }

    /// Builds the registry of built-in tools plus any manifest tools
    pub fn build_registry(
        &self,
        normalizer: Option<Arc<dyn LLMClient>>,
    ) -> Result<ToolRegistry, ConfigError> {
        let mut registry = ToolRegistry::with_builtins(normalizer)?;

        if let Some(path) = &self.tools_file {
            let count = registry.load_manifest(path)?;
            info!(path = %path.display(), count, "Registered command tools");
        }

        Ok(registry)
    }
}

impl fmt::Display for ToolchatConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Toolchat Configuration:")?;
        writeln!(f, "  Model: {}", self.model)?;
        writeln!(f, "  Ollama Host: {}", self.ollama_host)?;
        writeln!(f, "  Max Rounds: {}", self.max_rounds)?;
        writeln!(f, "  Request Timeout: {}s", self.request_timeout_secs)?;
        writeln!(f, "  Tool Timeout: {}s", self.tool_timeout_secs)?;
        if let Some(t) = self.temperature {
            writeln!(f, "  Temperature: {}", t)?;
        }
        if let Some(n) = self.max_tokens {
            writeln!(f, "  Max Tokens: {}", n)?;
        }
        writeln!(f, "  Listen: {}", self.bind_address())?;
        if let Some(ref path) = self.tools_file {
            writeln!(f, "  Tools File: {}", path.display())?;
        }
        writeln!(f, "  Log Level: {}", self.log_level)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    /// Helper to temporarily set environment variables for testing
    struct EnvGuard {
        key: String,
        old_value: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &str, value: &str) -> Self {
            let old_value = env::var(key).ok();
            env::set_var(key, value);
            Self {
                key: key.to_string(),
                old_value,
            }
        }

        fn unset(key: &str) -> Self {
            let old_value = env::var(key).ok();
            env::remove_var(key);
            Self {
                key: key.to_string(),
                old_value,
            }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match &self.old_value {
                Some(v) => env::set_var(&self.key, v),
                None => env::remove_var(&self.key),
            }
        }
    }

    const ALL_VARS: &[&str] = &[
        "TOOLCHAT_MODEL",
        "OLLAMA_HOST",
        "TOOLCHAT_MAX_ROUNDS",
        "TOOLCHAT_REQUEST_TIMEOUT",
        "TOOLCHAT_TOOL_TIMEOUT",
        "TOOLCHAT_TEMPERATURE",
        "TOOLCHAT_MAX_TOKENS",
        "TOOLCHAT_HOST",
        "TOOLCHAT_PORT",
        "TOOLCHAT_TOOLS_FILE",
        "TOOLCHAT_LOG_LEVEL",
    ];

    fn clean_env() -> Vec<EnvGuard> {
        ALL_VARS.iter().map(|k| EnvGuard::unset(k)).collect()
    }

    #[test]
    #[serial]
    fn test_default_configuration() {
        let _guards = clean_env();

        let config = ToolchatConfig::default();

        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.ollama_host, DEFAULT_OLLAMA_HOST);
        assert_eq!(config.max_rounds, DEFAULT_MAX_ROUNDS);
        assert_eq!(config.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);
        assert_eq!(config.tool_timeout_secs, DEFAULT_TOOL_TIMEOUT_SECS);
        assert_eq!(config.temperature, None);
        assert_eq!(config.max_tokens, None);
        assert_eq!(config.bind_address(), "0.0.0.0:8001");
        assert_eq!(config.tools_file, None);
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_environment_variable_parsing() {
        let _clean = clean_env();
        let _guards = vec![
            EnvGuard::set("TOOLCHAT_MODEL", "llama3.2"),
            EnvGuard::set("OLLAMA_HOST", "http://gpu-box:11434"),
            EnvGuard::set("TOOLCHAT_MAX_ROUNDS", "5"),
            EnvGuard::set("TOOLCHAT_REQUEST_TIMEOUT", "120"),
            EnvGuard::set("TOOLCHAT_TOOL_TIMEOUT", "10"),
            EnvGuard::set("TOOLCHAT_TEMPERATURE", "0.2"),
            EnvGuard::set("TOOLCHAT_MAX_TOKENS", "512"),
            EnvGuard::set("TOOLCHAT_PORT", "9000"),
            EnvGuard::set("TOOLCHAT_TOOLS_FILE", "/etc/toolchat/tools.toml"),
            EnvGuard::set("TOOLCHAT_LOG_LEVEL", "DEBUG"),
        ];

        let config = ToolchatConfig::default();

        assert_eq!(config.model, "llama3.2");
        assert_eq!(config.ollama_host, "http://gpu-box:11434");
        assert_eq!(config.max_rounds, 5);
        assert_eq!(config.request_timeout(), Duration::from_secs(120));
        assert_eq!(config.tool_timeout(), Duration::from_secs(10));
        assert_eq!(config.temperature, Some(0.2));
        assert_eq!(config.max_tokens, Some(512));
        assert_eq!(config.loop_options().max_tokens, Some(512));
        assert_eq!(config.port, 9000);
        assert_eq!(
            config.tools_file,
            Some(PathBuf::from("/etc/toolchat/tools.toml"))
        );
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    #[serial]
    fn test_unparsable_values_fall_back() {
        let _clean = clean_env();
        let _guards = vec![
            EnvGuard::set("TOOLCHAT_MAX_ROUNDS", "many"),
            EnvGuard::set("TOOLCHAT_PORT", "99999"),
            EnvGuard::set("TOOLCHAT_TOOLS_FILE", "  "),
        ];

        let config = ToolchatConfig::default();
        assert_eq!(config.max_rounds, DEFAULT_MAX_ROUNDS);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.tools_file, None);
    }

    #[test]
    #[serial]
    fn test_validation_failures() {
        let _clean = clean_env();
        let base = ToolchatConfig::default();

        let cases: Vec<Box<dyn Fn(&mut ToolchatConfig)>> = vec![
            Box::new(|c| c.model = " ".to_string()),
            Box::new(|c| c.ollama_host = "localhost:11434".to_string()),
            Box::new(|c| c.max_rounds = 100),
            Box::new(|c| c.request_timeout_secs = 0),
            Box::new(|c| c.request_timeout_secs = 601),
            Box::new(|c| c.tool_timeout_secs = 0),
            Box::new(|c| c.temperature = Some(3.5)),
            Box::new(|c| c.max_tokens = Some(0)),
            Box::new(|c| c.log_level = "loud".to_string()),
        ];

        for mutate in cases {
            let mut config = base.clone();
            mutate(&mut config);
            assert!(
                matches!(config.validate(), Err(ConfigError::ValidationFailed(_))),
                "expected validation failure for {:?}",
                config
            );
        }
    }

    #[test]
    #[serial]
    fn test_zero_rounds_is_valid() {
        let _clean = clean_env();
        let mut config = ToolchatConfig::default();
        config.max_rounds = 0;
        assert!(config.validate().is_ok());
        assert_eq!(config.loop_options().max_rounds, 0);
    }

    #[test]
    #[serial]
    fn test_build_registry_with_manifest() {
        let _clean = clean_env();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[[tool]]\nname = \"uptime\"\ndescription = \"Host uptime\"\ncommand = \"uptime\""
        )
        .unwrap();

        let mut config = ToolchatConfig::default();
        config.tools_file = Some(file.path().to_path_buf());

        let registry = config.build_registry(None).unwrap();
        assert!(registry.resolve("uptime").is_ok());
        assert!(registry.resolve("echo").is_ok());
    }

    #[test]
    #[serial]
    fn test_build_registry_manifest_collision() {
        let _clean = clean_env();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[[tool]]\nname = \"echo\"\ndescription = \"Shadow\"\ncommand = \"cat\""
        )
        .unwrap();

        let mut config = ToolchatConfig::default();
        config.tools_file = Some(file.path().to_path_buf());

        let err = config.build_registry(None).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Registry(RegistryError::DuplicateName(_))
        ));
    }

    #[test]
    #[serial]
    fn test_config_display() {
        let _clean = clean_env();
        let config = ToolchatConfig::default();
        let display = format!("{}", config);
        assert!(display.contains("Toolchat Configuration:"));
        assert!(display.contains("Model: gemma3:12b"));
    }
}
