use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Tool-augmented chat with a local language model
#[derive(Parser, Debug)]
#[command(
    name = "toolchat",
    about = "Tool-augmented chat with a local language model",
    version,
    author,
    long_about = "toolchat lets a local Ollama model call tools. The model answers in plain \
                  text or emits a {\"tool_call\": ...} object; toolchat runs the tool and \
                  feeds the result back until the model answers or the round budget runs out."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, global = true, help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - only log errors"
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Chat with the model",
        long_about = "Sends one message and prints the answer. Without a message, reads \
                      prompts from stdin until 'quit', 'exit' or 'q'.\n\n\
                      Examples:\n  \
                      toolchat chat \"What time is it in Tokyo?\"\n  \
                      toolchat chat --format json \"What is 12 * 7?\"\n  \
                      toolchat chat --model llama3.1:8b --max-rounds 5\n  \
                      toolchat chat"
    )]
    Chat(ChatArgs),

    #[command(
        about = "Run the HTTP server",
        long_about = "Serves POST /v1/chat and GET /health.\n\n\
                      Examples:\n  \
                      toolchat serve\n  \
                      toolchat serve --port 9000 --tools-file tools.toml"
    )]
    Serve(ServeArgs),

    #[command(
        about = "List registered tools",
        long_about = "Lists built-in tools and any tools from the manifest.\n\n\
                      Examples:\n  \
                      toolchat tools\n  \
                      toolchat tools --format json"
    )]
    Tools(ToolsArgs),

    #[command(
        about = "Check backend availability",
        long_about = "Checks that Ollama is reachable and the model is installed.\n\n\
                      Examples:\n  \
                      toolchat health\n  \
                      toolchat health --format json"
    )]
    Health(HealthArgs),
}

/// Overrides shared by every command that talks to the model
#[derive(Parser, Debug, Clone, Default)]
pub struct BackendArgs {
    #[arg(
        short = 'm',
        long,
        value_name = "MODEL",
        help = "Ollama model name (e.g., 'gemma3:12b')"
    )]
    pub model: Option<String>,

    #[arg(long, value_name = "URL", help = "Ollama endpoint URL")]
    pub ollama_host: Option<String>,

    #[arg(
        long,
        value_name = "FILE",
        help = "TOML manifest of external command tools"
    )]
    pub tools_file: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone)]
pub struct ChatArgs {
    #[arg(
        value_name = "MESSAGE",
        help = "Message to send (omit for interactive mode)"
    )]
    pub message: Option<String>,

    #[command(flatten)]
    pub backend: BackendArgs,

    #[arg(long, value_name = "N", help = "Maximum tool rounds per message")]
    pub max_rounds: Option<usize>,

    #[arg(long, value_name = "TEMP", help = "Sampling temperature (0.0 - 2.0)")]
    pub temperature: Option<f32>,

    #[arg(long, value_name = "N", help = "Cap on tokens per model reply")]
    pub max_tokens: Option<u32>,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,

    #[arg(long, help = "Print the full message history after the answer")]
    pub show_history: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub backend: BackendArgs,

    #[arg(long, value_name = "ADDR", help = "Address to bind")]
    pub host: Option<String>,

    #[arg(short = 'p', long, value_name = "PORT", help = "Port to listen on")]
    pub port: Option<u16>,
}

#[derive(Parser, Debug, Clone)]
pub struct ToolsArgs {
    #[arg(
        long,
        value_name = "FILE",
        help = "TOML manifest of external command tools"
    )]
    pub tools_file: Option<PathBuf>,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,
}

#[derive(Parser, Debug, Clone)]
pub struct HealthArgs {
    #[command(flatten)]
    pub backend: BackendArgs,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormatArg {
    Json,
    Human,
}

impl From<OutputFormatArg> for super::output::OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Json => super::output::OutputFormat::Json,
            OutputFormatArg::Human => super::output::OutputFormat::Human,
        }
    }
}
