//! toolchat - tool-augmented chat with a local language model
//!
//! A completion model is taught one textual convention: to use a tool it
//! replies with `{"tool_call": {"name": ..., "arguments": {...}}}`. toolchat
//! finds that object in the reply, runs the named tool, feeds the result back
//! as a user message, and repeats until the model answers in plain text or the
//! round budget runs out.
//!
//! # Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use toolchat::{ConversationLoop, LoopOptions, OllamaClient, ToolDispatcher, ToolRegistry};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let client = Arc::new(OllamaClient::new(
//!     "http://localhost:11434".to_string(),
//!     "gemma3:12b".to_string(),
//! )?);
//! let registry = Arc::new(ToolRegistry::with_builtins(None)?);
//! let chat = ConversationLoop::new(client, ToolDispatcher::new(registry), LoopOptions::default());
//!
//! let outcome = chat.run("What is 12 * 7?").await?;
//! println!("{}", outcome.answer);
//! # Ok(())
//! # }
//! ```
//!
//! # Project Structure
//!
//! - [`tools`]: tool descriptors, registry, dispatcher and built-in tools
//! - [`chat`]: system prompt, tool call extraction and the conversation loop
//! - [`llm`]: completion client boundary and the Ollama client
//! - [`server`]: HTTP front-end
//! - [`cli`]: command-line interface

pub mod chat;
pub mod cli;
pub mod config;
pub mod llm;
pub mod server;
pub mod tools;
pub mod util;

pub use chat::{ChatError, ChatOutcome, ConversationLoop, LoopOptions, Termination, ToolCall};
pub use config::{ConfigError, ToolchatConfig};
pub use llm::{BackendError, ChatMessage, LLMClient, MockLLMClient, MockResponse, OllamaClient};
pub use tools::{ToolDescriptor, ToolDispatcher, ToolRegistry, ToolResult};
pub use util::{init_from_env, init_logging, LoggingConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
