use toolchat::cli::commands::{CliArgs, Commands};
use toolchat::cli::handlers::{handle_chat, handle_health, handle_serve, handle_tools};
use toolchat::util::{init_logging, LoggingConfig};
use toolchat::VERSION;

use clap::Parser;
use tracing::debug;

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    init_logging(LoggingConfig::from_flags(
        args.log_level.as_deref(),
        args.verbose,
        args.quiet,
    ));

    debug!("toolchat v{} starting", VERSION);
    debug!("Arguments: {:?}", args);

    let exit_code = match &args.command {
        Commands::Chat(chat_args) => handle_chat(chat_args).await,
        Commands::Serve(serve_args) => handle_serve(serve_args).await,
        Commands::Tools(tools_args) => handle_tools(tools_args).await,
        Commands::Health(health_args) => handle_health(health_args).await,
    };

    std::process::exit(exit_code);
}
