//! Command handlers
//!
//! Each handler returns the process exit code: 0 on success, 1 on failure.

use std::io::Write;
use std::sync::Arc;

use indexmap::IndexMap;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, error, info};

use super::commands::{BackendArgs, ChatArgs, HealthArgs, ServeArgs, ToolsArgs};
use super::output::{HealthStatus, OutputFormat, OutputFormatter};
use crate::chat::ConversationLoop;
use crate::config::ToolchatConfig;
use crate::llm::{LLMClient, OllamaClient};
use crate::tools::{ToolDispatcher, ToolRegistry};

const QUIT_WORDS: &[&str] = &["quit", "exit", "q"];

fn apply_backend_args(config: &mut ToolchatConfig, args: &BackendArgs) {
    if let Some(ref model) = args.model {
        config.model = model.clone();
    }
    if let Some(ref host) = args.ollama_host {
        config.ollama_host = host.clone();
    }
    if let Some(ref path) = args.tools_file {
        config.tools_file = Some(path.clone());
    }
}

fn validated(config: ToolchatConfig) -> Option<ToolchatConfig> {
    match config.validate() {
        Ok(()) => {
            debug!("{}", config);
            Some(config)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            None
        }
    }
}

fn build_chat(config: &ToolchatConfig) -> anyhow::Result<ConversationLoop> {
    let client = config.create_client()?;
    let registry = config.build_registry(Some(client.clone() as Arc<dyn LLMClient>))?;
    let dispatcher = ToolDispatcher::new(Arc::new(registry)).with_timeout(config.tool_timeout());
    Ok(ConversationLoop::new(client, dispatcher, config.loop_options()))
}

pub async fn handle_chat(args: &ChatArgs) -> i32 {
    let mut config = ToolchatConfig::default();
    apply_backend_args(&mut config, &args.backend);
    if let Some(max_rounds) = args.max_rounds {
        config.max_rounds = max_rounds;
    }
    if let Some(temperature) = args.temperature {
        config.temperature = Some(temperature);
    }
    if let Some(max_tokens) = args.max_tokens {
        config.max_tokens = Some(max_tokens);
    }
    let Some(config) = validated(config) else {
        return 1;
    };

    let chat = match build_chat(&config) {
        Ok(chat) => chat,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return 1;
        }
    };
    let formatter = OutputFormatter::new(args.format.into());

    match &args.message {
        Some(message) => match chat.run(message).await {
            Ok(outcome) => match formatter.format_outcome(&outcome, args.show_history) {
                Ok(text) => {
                    print!("{}", text);
                    0
                }
                Err(e) => {
                    eprintln!("Error: {:#}", e);
                    1
                }
            },
            Err(e) => {
                error!(error = %e, "Chat failed");
                eprintln!("Error: {}", e.help_message());
                1
            }
        },
        None => {
            println!(
                "Chatting with {} ({} tools). Type 'quit' to exit.",
                config.model,
                chat.dispatcher().registry().len()
            );
            let stdin = BufReader::new(tokio::io::stdin());
            let mut stdout = std::io::stdout();
            match run_interactive(&chat, stdin, &mut stdout, &formatter, args.show_history).await {
                Ok(()) => 0,
                Err(e) => {
                    eprintln!("Error: {:#}", e);
                    1
                }
            }
        }
    }
}

/// Reads one prompt per line until end of input or a quit word
///
/// Backend failures are reported and the session continues.
pub async fn run_interactive<R, W>(
    chat: &ConversationLoop,
    reader: R,
    writer: &mut W,
    formatter: &OutputFormatter,
    show_history: bool,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = reader.lines();

    loop {
        write!(writer, "You: ")?;
        writer.flush()?;

        let Some(line) = lines.next_line().await? else {
            writeln!(writer)?;
            break;
        };
        let message = line.trim();

        if message.is_empty() {
            continue;
        }
        if QUIT_WORDS.contains(&message.to_lowercase().as_str()) {
            writeln!(writer, "Goodbye!")?;
            break;
        }

        match chat.run(message).await {
            Ok(outcome) => {
                let text = formatter.format_outcome(&outcome, show_history)?;
                write!(writer, "Assistant: {}", text)?;
            }
            Err(e) => {
                error!(error = %e, "Chat failed");
                writeln!(writer, "Error: {}", e.help_message())?;
            }
        }
    }

    Ok(())
}

pub async fn handle_serve(args: &ServeArgs) -> i32 {
    let mut config = ToolchatConfig::default();
    apply_backend_args(&mut config, &args.backend);
    if let Some(ref host) = args.host {
        config.host = host.clone();
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    let Some(config) = validated(config) else {
        return 1;
    };

    info!(address = %config.bind_address(), "Starting HTTP server");
    match crate::server::serve(&config).await {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    }
}

pub async fn handle_tools(args: &ToolsArgs) -> i32 {
    let mut config = ToolchatConfig::default();
    if let Some(ref path) = args.tools_file {
        config.tools_file = Some(path.clone());
    }

    let registry = match config.build_registry(None) {
        Ok(registry) => registry,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };

    print_tools(&registry, args.format.into())
}

fn print_tools(registry: &ToolRegistry, format: OutputFormat) -> i32 {
    match OutputFormatter::new(format).format_tools(&registry.describe_all()) {
        Ok(text) => {
            print!("{}", text);
            0
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    }
}

pub async fn handle_health(args: &HealthArgs) -> i32 {
    let mut config = ToolchatConfig::default();
    apply_backend_args(&mut config, &args.backend);
    let Some(config) = validated(config) else {
        return 1;
    };

    let status = match config.create_client() {
        Ok(client) => check_ollama(&client).await,
        Err(e) => HealthStatus::unavailable(e.to_string()),
    };
    let healthy = status.available;

    let mut results = IndexMap::new();
    results.insert("ollama".to_string(), status);

    match OutputFormatter::new(args.format.into()).format_health(&results) {
        Ok(text) => print!("{}", text),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return 1;
        }
    }

    if healthy {
        0
    } else {
        1
    }
}

async fn check_ollama(client: &OllamaClient) -> HealthStatus {
    match client.health_check().await {
        Ok(true) => {}
        Ok(false) => {
            return HealthStatus::unavailable(format!("Ollama not reachable at {}", client.endpoint()))
                .with_details("Start it with `ollama serve` or set OLLAMA_HOST")
        }
        Err(e) => return HealthStatus::unavailable(e.to_string()),
    }

    match client.list_models().await {
        Ok(models) if model_installed(&models, client.model()) => {
            HealthStatus::available(format!("Connected to {}", client.endpoint()))
                .with_details(format!("Model: {}", client.model()))
        }
        Ok(_) => HealthStatus::unavailable(format!("Model '{}' is not installed", client.model()))
            .with_details(format!("Run: ollama pull {}", client.model())),
        Err(e) => HealthStatus::unavailable(e.to_string()),
    }
}

fn model_installed(models: &[String], model: &str) -> bool {
    models
        .iter()
        .any(|name| name == model || *name == format!("{}:latest", model))
}
