//! Structured logging setup for toolchat
//!
//! Initializes a `tracing` subscriber once per process. Output goes to stderr
//! so that `toolchat chat --format json` keeps stdout clean.
//!
//! # Example
//!
//! ```no_run
//! use toolchat::util::logging;
//!
//! // Level from TOOLCHAT_LOG_LEVEL, JSON output from TOOLCHAT_LOG_JSON
//! logging::init_from_env();
//!
//! tracing::info!(tool = "echo", "Executing tool");
//! ```

use std::env;
use std::sync::Once;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Ensures logging is only initialized once
static INIT: Once = Once::new();

/// Crates whose logs are capped at `warn` unless `RUST_LOG` says otherwise
const NOISY_CRATES: &[&str] = &["h2", "hyper", "hyper_util", "reqwest", "tower_http"];

/// Configuration for logging initialization
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Minimum log level for toolchat's own events
    pub level: Level,

    /// Use JSON output format (for log collectors)
    pub use_json: bool,

    /// Include the module target (e.g., toolchat::chat) in logs
    pub include_target: bool,

    /// Include file and line number information
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            use_json: false,
            include_target: true,
            include_location: false,
        }
    }
}

impl LoggingConfig {
    /// Builds a config from CLI flags, falling back to `TOOLCHAT_LOG_LEVEL`
    ///
    /// An explicit `--log-level` wins over `--verbose`, which wins over `--quiet`.
    pub fn from_flags(log_level: Option<&str>, verbose: bool, quiet: bool) -> Self {
        let level = if let Some(level_str) = log_level {
            parse_level(level_str)
        } else if verbose {
            Level::DEBUG
        } else if quiet {
            Level::ERROR
        } else {
            level_from_env()
        };

        Self {
            level,
            use_json: json_from_env(),
            ..Default::default()
        }
    }
}

/// Parses a log level from a string, case-insensitively
///
/// Unknown values fall back to `INFO` with a warning on stderr.
///
/// ```
/// use toolchat::util::logging::parse_level;
/// use tracing::Level;
///
/// assert_eq!(parse_level("debug"), Level::DEBUG);
/// assert_eq!(parse_level("WARN"), Level::WARN);
/// ```
pub fn parse_level(level_str: &str) -> Level {
    match level_str.trim().to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => {
            eprintln!(
                "Invalid log level '{}', defaulting to INFO. Valid levels: trace, debug, info, warn, error",
                level_str
            );
            Level::INFO
        }
    }
}

fn level_from_env() -> Level {
    env::var("TOOLCHAT_LOG_LEVEL")
        .map(|s| parse_level(&s))
        .unwrap_or(Level::INFO)
}

fn json_from_env() -> bool {
    env::var("TOOLCHAT_LOG_JSON")
        .ok()
        .and_then(|v| v.parse::<bool>().ok())
        .unwrap_or(false)
}

/// Filter for `level`: `RUST_LOG` when set, otherwise toolchat at `level` and
/// noisy dependencies at `warn`
pub fn build_filter(level: Level) -> EnvFilter {
    let rust_log_set = env::var("RUST_LOG").is_ok();
    let mut filter = if rust_log_set {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(level.to_string().to_lowercase())
    };

    if let Ok(directive) = format!("toolchat={}", level).parse() {
        filter = filter.add_directive(directive);
    }

    if !rust_log_set {
        for name in NOISY_CRATES {
            if let Ok(directive) = format!("{}=warn", name).parse() {
                filter = filter.add_directive(directive);
            }
        }
    }

    filter
}

/// Initializes the logging system; later calls are ignored
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let filter = build_filter(config.level);

        let layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(config.include_target)
            .with_file(config.include_location)
            .with_line_number(config.include_location);

        if config.use_json {
            tracing_subscriber::registry()
                .with(filter)
                .with(layer.json())
                .init();
        } else {
            tracing_subscriber::registry().with(filter).with(layer).init();
        }
    });
}

/// Initializes logging from `TOOLCHAT_LOG_LEVEL` and `TOOLCHAT_LOG_JSON`
pub fn init_from_env() {
    init_logging(LoggingConfig {
        level: level_from_env(),
        use_json: json_from_env(),
        ..Default::default()
    });
}
