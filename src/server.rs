//! HTTP front-end
//!
//! `POST /v1/chat` runs one conversation per request; `GET /health` reports the
//! backend and the registered tools.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::chat::{ChatError, ConversationLoop};
use crate::config::ToolchatConfig;
use crate::llm::LLMClient;
use crate::tools::ToolDispatcher;

/// Shared state for all handlers
#[derive(Clone)]
pub struct AppState {
    chat: Arc<ConversationLoop>,
    model: String,
    request_timeout: Duration,
}

impl AppState {
    pub fn new(chat: Arc<ConversationLoop>, model: impl Into<String>, request_timeout: Duration) -> Self {
        Self {
            chat,
            model: model.into(),
            request_timeout,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub user_message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub backend: String,
    pub model: String,
    pub available_tools: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let body = ErrorBody {
        error: message.into(),
    };
    (status, Json(body)).into_response()
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/v1/chat", post(chat))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "Rejected chat request");
            return error_response(StatusCode::BAD_REQUEST, "Missing user_message");
        }
    };

    let message = match request.user_message {
        Some(message) if !message.trim().is_empty() => message,
        _ => return error_response(StatusCode::BAD_REQUEST, "Missing user_message"),
    };

    let request_id = Uuid::new_v4();
    let span = info_span!("chat_request", %request_id);

    let run = state.chat.run(&message).instrument(span);
    match tokio::time::timeout(state.request_timeout, run).await {
        Ok(Ok(outcome)) => {
            info!(%request_id, termination = %outcome.termination, rounds = outcome.rounds, "Chat request complete");
            Json(ChatResponse {
                response: outcome.answer,
            })
            .into_response()
        }
        Ok(Err(ChatError::Backend(error))) => {
            warn!(%request_id, error = %error, "Chat request failed");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Chat error: {}", error),
            )
        }
        Err(_) => {
            warn!(
                %request_id,
                timeout_secs = state.request_timeout.as_secs(),
                "Chat request timed out"
            );
            error_response(
                StatusCode::GATEWAY_TIMEOUT,
                format!(
                    "Chat request timed out after {}s",
                    state.request_timeout.as_secs()
                ),
            )
        }
    }
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let registry = state.chat.dispatcher().registry();
    Json(HealthResponse {
        status: "healthy".to_string(),
        backend: state.chat.client().name().to_string(),
        model: state.model.clone(),
        available_tools: registry
            .tool_names()
            .into_iter()
            .map(String::from)
            .collect(),
    })
}

/// Builds the chat context from `config` and serves until the process exits
pub async fn serve(config: &ToolchatConfig) -> anyhow::Result<()> {
    let client = config.create_client()?;
    let registry = Arc::new(config.build_registry(Some(client.clone() as Arc<dyn LLMClient>))?);
    let dispatcher = ToolDispatcher::new(registry).with_timeout(config.tool_timeout());
    let chat = Arc::new(ConversationLoop::new(
        client,
        dispatcher,
        config.loop_options(),
    ));

    let state = AppState::new(chat, config.model.clone(), config.request_timeout());
    let app = router(state);

    let address = config.bind_address();
    let listener = TcpListener::bind(&address).await?;
    info!(address = %address, model = %config.model, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}
