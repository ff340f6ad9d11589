pub mod commands;
pub mod handlers;
pub mod output;

pub use commands::{
    BackendArgs, ChatArgs, CliArgs, Commands, HealthArgs, OutputFormatArg, ServeArgs, ToolsArgs,
};
pub use output::{HealthStatus, OutputFormat, OutputFormatter};
