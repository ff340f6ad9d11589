//! System prompt construction
//!
//! The system prompt teaches the model the call format that
//! [`extract`](super::extractor::extract) recognizes. Both sides use
//! [`TOOL_CALL_MARKER`], so changing the format is a single edit.

use serde_json::{json, Map, Value};
use std::fmt::Write;

use crate::tools::{ParamType, ToolDescriptor};

/// Text that introduces a structured call in model output
pub const TOOL_CALL_MARKER: &str = r#"{"tool_call":"#;

/// Number of tools shown as worked examples in the prompt
const MAX_EXAMPLES: usize = 3;

/// Builds the system prompt listing every tool and the call format
pub fn build_system_prompt(tools: &[&ToolDescriptor]) -> String {
    if tools.is_empty() {
        return "You are a helpful assistant. No tools are available, so answer the user directly."
            .to_string();
    }

    let mut prompt = String::from("You have access to these tools:\n");
    for tool in tools {
        let _ = writeln!(prompt, "- {}: {}", signature(tool), tool.description);
    }

    let _ = write!(
        prompt,
        "\nWhen you need to use a tool, respond with a JSON object in this exact format:\n\
         {marker} {{\"name\": \"tool_name\", \"arguments\": {{\"param1\": \"value1\", \"param2\": \"value2\"}}}}}}\n\
         \nExamples:\n",
        marker = TOOL_CALL_MARKER
    );
    for tool in tools.iter().take(MAX_EXAMPLES) {
        let _ = writeln!(prompt, "- To use {}: {}", tool.name, example_call(tool));
    }

    prompt.push_str(
        "\nAfter calling a tool, I'll provide the result and you should give a helpful response to the user.\n\
         If you don't need to use any tools, respond normally without JSON.\n",
    );
    prompt
}

/// `name(param: description, ...)` with defaults noted
fn signature(tool: &ToolDescriptor) -> String {
    let params: Vec<String> = tool
        .parameters
        .iter()
        .map(|(name, spec)| {
            let mut part = format!("{}: {}", name, spec.param_type);
            if !spec.description.is_empty() {
                let _ = write!(part, " - {}", spec.description);
            }
            if let Some(default) = &spec.default {
                let _ = write!(part, " (default: {})", default);
            }
            part
        })
        .collect();
    format!("{}({})", tool.name, params.join(", "))
}

fn example_call(tool: &ToolDescriptor) -> String {
    let arguments: Map<String, Value> = tool
        .parameters
        .iter()
        .filter(|(_, spec)| spec.is_required() || spec.default.is_some())
        .map(|(name, spec)| {
            let value = spec.default.clone().unwrap_or_else(|| match spec.param_type {
                ParamType::Integer => json!(1),
                ParamType::Number => json!(1.5),
                ParamType::Boolean => json!(true),
                ParamType::Object => json!({}),
                ParamType::Array => json!([]),
                ParamType::String | ParamType::Any => json!("..."),
            });
            (name.clone(), value)
        })
        .collect();

    json!({"tool_call": {"name": tool.name, "arguments": arguments}}).to_string()
}
