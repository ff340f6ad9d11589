//! Bounded tool-calling conversation loop
//!
//! One [`ConversationLoop::run`] call answers one user message:
//!
//! 1. `AwaitingModel`: send the full history, append the reply.
//! 2. No tool call in the reply: `Answered`.
//! 3. Otherwise `Dispatching`: run the tool, append `Tool result: ...` as a
//!    user message, count the round.
//! 4. Once `max_rounds` rounds have dispatched a tool: `Exhausted`.
//!
//! Only a completion backend failure escapes as an error. Tool problems are
//! folded into the history for the model to read.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::extractor::{extract, ToolCall};
use super::prompt::build_system_prompt;
use crate::llm::{BackendError, ChatMessage, LLMClient, LLMRequest};
use crate::tools::ToolDispatcher;

/// Answer returned when the round budget runs out
pub const EXHAUSTED_MESSAGE: &str =
    "Sorry, I couldn't complete that request after several attempts.";

pub const DEFAULT_MAX_ROUNDS: usize = 3;

/// Errors that end a chat invocation
#[derive(Debug, Error)]
pub enum ChatError {
    /// The completion backend failed or was unreachable
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
}

impl ChatError {
    /// Returns a user-friendly error message with troubleshooting hints
    pub fn help_message(&self) -> String {
        match self {
            ChatError::Backend(BackendError::NetworkError { .. }) => format!(
                "{}\n\nIs Ollama running? Start it with `ollama serve` or set OLLAMA_HOST.",
                self
            ),
            ChatError::Backend(BackendError::TimeoutError { .. }) => format!(
                "{}\n\nThe model took too long. Increase TOOLCHAT_REQUEST_TIMEOUT or use a smaller model.",
                self
            ),
            ChatError::Backend(BackendError::ModelNotFound { .. }) => {
                format!("{}\n\nSet TOOLCHAT_MODEL to an installed model.", self)
            }
            ChatError::Backend(_) => self.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoopOptions {
    /// Maximum number of rounds that may dispatch a tool
    pub max_rounds: usize,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl Default for LoopOptions {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
            temperature: None,
            max_tokens: None,
        }
    }
}

impl LoopOptions {
    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Where a conversation currently is
#[derive(Debug, Clone, PartialEq)]
pub enum LoopState {
    AwaitingModel,
    Dispatching(ToolCall),
    Answered(String),
    Exhausted,
}

/// History and round counter owned by one invocation
#[derive(Debug, Clone)]
pub struct ConversationState {
    messages: Vec<ChatMessage>,
    rounds: usize,
}

impl ConversationState {
    pub fn new(system_prompt: impl Into<String>, user_message: impl Into<String>) -> Self {
        Self {
            messages: vec![
                ChatMessage::system(system_prompt),
                ChatMessage::user(user_message),
            ],
            rounds: 0,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Rounds that dispatched a tool so far
    pub fn rounds(&self) -> usize {
        self.rounds
    }

    fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    fn finish(self, answer: String, termination: Termination) -> ChatOutcome {
        let rounds = match termination {
            Termination::Answered => self.rounds + 1,
            Termination::Exhausted => self.rounds,
        };
        ChatOutcome {
            answer,
            termination,
            rounds,
            history: self.messages,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Termination {
    /// The model replied without a tool call
    Answered,
    /// The round budget ran out
    Exhausted,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Answered => f.write_str("answered"),
            Termination::Exhausted => f.write_str("exhausted"),
        }
    }
}

/// Final result of a chat invocation
#[derive(Debug, Clone, Serialize)]
pub struct ChatOutcome {
    pub answer: String,
    pub termination: Termination,
    /// Completion rounds executed
    pub rounds: usize,
    pub history: Vec<ChatMessage>,
}

/// Explicit context for running chats: backend, dispatcher and options
///
/// Cheap to share; concurrent [`run`](Self::run) calls never share state.
pub struct ConversationLoop {
    client: Arc<dyn LLMClient>,
    dispatcher: ToolDispatcher,
    options: LoopOptions,
    system_prompt: String,
}

impl ConversationLoop {
    pub fn new(client: Arc<dyn LLMClient>, dispatcher: ToolDispatcher, options: LoopOptions) -> Self {
        let system_prompt = build_system_prompt(&dispatcher.registry().describe_all());
        Self {
            client,
            dispatcher,
            options,
            system_prompt,
        }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn options(&self) -> &LoopOptions {
        &self.options
    }

    pub fn client(&self) -> &Arc<dyn LLMClient> {
        &self.client
    }

    pub fn dispatcher(&self) -> &ToolDispatcher {
        &self.dispatcher
    }

    pub async fn run(&self, user_message: &str) -> Result<ChatOutcome, ChatError> {
        let start = Instant::now();
        let mut conversation = ConversationState::new(self.system_prompt.as_str(), user_message);
        let mut state = if self.options.max_rounds == 0 {
            LoopState::Exhausted
        } else {
            LoopState::AwaitingModel
        };

        info!(
            backend = self.client.name(),
            max_rounds = self.options.max_rounds,
            "Starting chat"
        );

        loop {
            state = match state {
                LoopState::AwaitingModel => {
                    let reply = self.ask_model(&conversation).await?;
                    conversation.push(ChatMessage::assistant(reply.as_str()));

                    match extract(&reply) {
                        Some(call) => {
                            debug!(tool = %call.name, round = conversation.rounds + 1, "Model requested tool");
                            LoopState::Dispatching(call)
                        }
                        None => LoopState::Answered(reply),
                    }
                }
                LoopState::Dispatching(call) => {
                    let result = self.dispatcher.dispatch(&call.name, call.arguments).await;
                    conversation.push(ChatMessage::user(result.to_message_content()));
                    conversation.rounds += 1;

                    if conversation.rounds >= self.options.max_rounds {
                        LoopState::Exhausted
                    } else {
                        LoopState::AwaitingModel
                    }
                }
                LoopState::Answered(answer) => {
                    let outcome = conversation.finish(answer, Termination::Answered);
                    info!(
                        rounds = outcome.rounds,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "Chat answered"
                    );
                    return Ok(outcome);
                }
                LoopState::Exhausted => {
                    let outcome =
                        conversation.finish(EXHAUSTED_MESSAGE.to_string(), Termination::Exhausted);
                    warn!(
                        rounds = outcome.rounds,
                        max_rounds = self.options.max_rounds,
                        "Round budget exhausted"
                    );
                    return Ok(outcome);
                }
            };
        }
    }

    async fn ask_model(&self, conversation: &ConversationState) -> Result<String, ChatError> {
        let mut request = LLMRequest::new(conversation.messages().to_vec());
        if let Some(temperature) = self.options.temperature {
            request = request.with_temperature(temperature);
        }
        if let Some(max_tokens) = self.options.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }

        let response = self.client.chat(request).await.map_err(|e| {
            warn!(backend = self.client.name(), error = %e, "Completion request failed");
            ChatError::Backend(e)
        })?;

        debug!(
            response_ms = response.response_time.as_millis() as u64,
            chars = response.content.len(),
            "Model replied"
        );
        Ok(response.content)
    }
}

impl fmt::Debug for ConversationLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversationLoop")
            .field("backend", &self.client.name())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{MessageRole, MockLLMClient, MockResponse};
    use crate::tools::ToolRegistry;
    use serde_json::json;

    fn chat_loop(client: Arc<MockLLMClient>, max_rounds: usize) -> ConversationLoop {
        let registry = Arc::new(ToolRegistry::with_builtins(None).unwrap());
        ConversationLoop::new(
            client,
            ToolDispatcher::new(registry),
            LoopOptions::default().with_max_rounds(max_rounds),
        )
    }

    #[tokio::test]
    async fn test_direct_answer() {
        let client = Arc::new(MockLLMClient::new());
        client.add_response(MockResponse::text("Hello there"));

        let outcome = chat_loop(client.clone(), 3).run("hi").await.unwrap();

        assert_eq!(outcome.answer, "Hello there");
        assert_eq!(outcome.termination, Termination::Answered);
        assert_eq!(outcome.rounds, 1);
        assert_eq!(outcome.history.len(), 3);
        assert_eq!(client.request_count(), 1);
    }

    #[tokio::test]
    async fn test_tool_round_then_answer() {
        let client = Arc::new(MockLLMClient::new());
        client.add_responses(vec![
            MockResponse::tool_call("add_numbers", json!({"a": 2, "b": 3})),
            MockResponse::text("The sum is 5."),
        ]);

        let outcome = chat_loop(client.clone(), 3).run("2+3?").await.unwrap();

        assert_eq!(outcome.answer, "The sum is 5.");
        assert_eq!(outcome.rounds, 2);
        assert_eq!(outcome.history.len(), 5);
        assert_eq!(outcome.history[3], ChatMessage::user("Tool result: 5"));

        // The second request replays the folded result
        let second = &client.requests()[1];
        assert_eq!(second.messages.len(), 4);
        assert_eq!(second.messages[3].content, "Tool result: 5");
    }

    #[tokio::test]
    async fn test_system_message_first_and_unchanged() {
        let client = Arc::new(MockLLMClient::new());
        client.add_responses(vec![
            MockResponse::tool_call("echo", json!({"text": "x"})),
            MockResponse::text("done"),
        ]);

        let chat = chat_loop(client.clone(), 3);
        let outcome = chat.run("go").await.unwrap();

        for request in client.requests() {
            assert_eq!(request.messages[0].role, MessageRole::System);
            assert_eq!(request.messages[0].content, chat.system_prompt());
        }
        assert_eq!(outcome.history[0].content, chat.system_prompt());
    }

    #[tokio::test]
    async fn test_zero_rounds_never_calls_model() {
        let client = Arc::new(MockLLMClient::new());
        let outcome = chat_loop(client.clone(), 0).run("hi").await.unwrap();

        assert_eq!(outcome.termination, Termination::Exhausted);
        assert_eq!(outcome.answer, EXHAUSTED_MESSAGE);
        assert_eq!(outcome.rounds, 0);
        assert_eq!(outcome.history.len(), 2);
        assert_eq!(client.request_count(), 0);
    }

    #[tokio::test]
    async fn test_backend_error_propagates() {
        let client = Arc::new(MockLLMClient::new());
        client.add_responses(vec![
            MockResponse::tool_call("echo", json!({"text": "x"})),
            MockResponse::error(BackendError::NetworkError {
                message: "connection refused".to_string(),
            }),
        ]);

        let err = chat_loop(client, 3).run("hi").await.unwrap_err();
        assert!(matches!(err, ChatError::Backend(BackendError::NetworkError { .. })));
        assert!(err.help_message().contains("ollama serve"));
    }

    #[tokio::test]
    async fn test_options_forwarded_to_request() {
        let client = Arc::new(MockLLMClient::new());
        client.add_response(MockResponse::text("ok"));

        let registry = Arc::new(ToolRegistry::new());
        let chat = ConversationLoop::new(
            client.clone(),
            ToolDispatcher::new(registry),
            LoopOptions {
                max_rounds: 1,
                temperature: Some(0.3),
                max_tokens: Some(256),
            },
        );
        chat.run("hi").await.unwrap();

        let request = &client.requests()[0];
        assert_eq!(request.temperature, Some(0.3));
        assert_eq!(request.max_tokens, Some(256));
    }

    #[test]
    fn test_termination_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Termination::Exhausted).unwrap(),
            r#""exhausted""#
        );
        assert_eq!(Termination::Answered.to_string(), "answered");
    }
}
