//! Completion client abstraction layer
//!
//! This module provides a trait-based abstraction for talking to a chat
//! completion backend, allowing different backends (Ollama, Mock) to be used
//! interchangeably by the conversation loop.

mod client;
mod error;
mod mock;
mod ollama;
mod types;

pub use client::LLMClient;
pub use error::BackendError;
pub use mock::{MockLLMClient, MockResponse};
pub use ollama::OllamaClient;
pub use types::{ChatMessage, LLMRequest, LLMResponse, MessageRole};
