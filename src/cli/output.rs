//! Output formatting for CLI commands
//!
//! Every command can print JSON (machine-readable) or human text.
//!
//! # Example
//!
//! ```ignore
//! use toolchat::cli::output::{OutputFormat, OutputFormatter};
//!
//! let formatter = OutputFormatter::new(OutputFormat::Human);
//! let text = formatter.format_outcome(&outcome, false)?;
//! println!("{}", text);
//! ```

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::chat::{ChatOutcome, Termination};
use crate::tools::ToolDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON format (machine-readable)
    Json,
    /// Human-readable formatted text
    Human,
}

fn rule() -> String {
    format!("{}\n\n", "\u{2501}".repeat(42))
}

pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a chat outcome; `show_history` adds every message in order
    pub fn format_outcome(&self, outcome: &ChatOutcome, show_history: bool) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                let json = if show_history {
                    serde_json::to_string_pretty(outcome)
                } else {
                    serde_json::to_string_pretty(&serde_json::json!({
                        "answer": outcome.answer,
                        "termination": outcome.termination,
                        "rounds": outcome.rounds,
                    }))
                };
                json.context("Failed to serialize chat outcome to JSON")
            }
            OutputFormat::Human => Ok(self.format_outcome_human(outcome, show_history)),
        }
    }

    pub fn format_tools(&self, tools: &[&ToolDescriptor]) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                let listing: Vec<_> = tools
                    .iter()
                    .map(|tool| {
                        serde_json::json!({
                            "name": tool.name,
                            "description": tool.description,
                            "input_schema": tool.input_schema(),
                        })
                    })
                    .collect();
                serde_json::to_string_pretty(&listing).context("Failed to serialize tools to JSON")
            }
            OutputFormat::Human => Ok(self.format_tools_human(tools)),
        }
    }

    pub fn format_health(&self, health_results: &IndexMap<String, HealthStatus>) -> Result<String> {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(health_results)
                .context("Failed to serialize health status to JSON"),
            OutputFormat::Human => Ok(self.format_health_human(health_results)),
        }
    }

    fn format_outcome_human(&self, outcome: &ChatOutcome, show_history: bool) -> String {
        let mut output = String::new();

        output.push_str(&outcome.answer);
        output.push('\n');

        if outcome.termination == Termination::Exhausted {
            output.push_str(&format!(
                "\n\u{26A0} Stopped after {} tool rounds\n",
                outcome.rounds
            ));
        }

        if show_history {
            output.push_str("\nConversation History\n");
            output.push_str(&rule());
            for (index, message) in outcome.history.iter().enumerate() {
                output.push_str(&format!("[{}] {}:\n", index, message.role));
                for line in message.content.lines() {
                    output.push_str(&format!("    {}\n", line));
                }
            }
        }

        output
    }

    fn format_tools_human(&self, tools: &[&ToolDescriptor]) -> String {
        let mut output = String::new();

        output.push_str(&format!("Registered Tools ({})\n", tools.len()));
        output.push_str(&rule());

        for tool in tools {
            output.push_str(&format!("{}\n", tool.name));
            output.push_str(&format!("  {}\n", tool.description));

            let count = tool.parameters.len();
            for (index, (name, spec)) in tool.parameters.iter().enumerate() {
                let branch = if index + 1 == count {
                    "\u{2514}\u{2500}"
                } else {
                    "\u{251C}\u{2500}"
                };
                let requirement = match &spec.default {
                    Some(default) => format!("default: {}", default),
                    None if spec.is_required() => "required".to_string(),
                    None => "optional".to_string(),
                };
                output.push_str(&format!(
                    "  {} {}: {} ({})",
                    branch, name, spec.param_type, requirement
                ));
                if !spec.description.is_empty() {
                    output.push_str(&format!(" - {}", spec.description));
                }
                output.push('\n');
            }
            output.push('\n');
        }

        output
    }

    fn format_health_human(&self, health_results: &IndexMap<String, HealthStatus>) -> String {
        let mut output = String::new();

        output.push_str("Backend Health Status\n");
        output.push_str(&rule());

        for (backend, status) in health_results {
            let status_symbol = if status.available {
                "\u{2713}"
            } else {
                "\u{2717}"
            };

            output.push_str(&format!("{} {}\n", status_symbol, backend));
            output.push_str(&format!(
                "  Status: {}\n",
                if status.available {
                    "Available"
                } else {
                    "Unavailable"
                }
            ));
            output.push_str(&format!("  Message: {}\n", status.message));

            if let Some(ref details) = status.details {
                output.push_str(&format!("  Details: {}\n", details));
            }
            output.push('\n');
        }

        output
    }
}

/// Health status for a backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub available: bool,
    pub message: String,
    pub details: Option<String>,
}

impl HealthStatus {
    pub fn available(message: impl Into<String>) -> Self {
        Self {
            available: true,
            message: message.into(),
            details: None,
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            available: false,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}
