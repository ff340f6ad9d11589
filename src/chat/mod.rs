//! Tool-augmented chat
//!
//! - [`prompt`] builds the system prompt that teaches the call format.
//! - [`extractor`] finds a call in a model reply.
//! - [`conversation`] runs the bounded ask/dispatch/fold loop.

pub mod conversation;
pub mod extractor;
pub mod prompt;

pub use conversation::{
    ChatError, ChatOutcome, ConversationLoop, ConversationState, LoopOptions, LoopState,
    Termination, DEFAULT_MAX_ROUNDS, EXHAUSTED_MESSAGE,
};
pub use extractor::{extract, try_extract, MalformedCall, ToolCall};
pub use prompt::{build_system_prompt, TOOL_CALL_MARKER};
