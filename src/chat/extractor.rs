//! Tool call extraction from free-form model output
//!
//! Models answer either in prose or with an embedded object of the form
//! `{"tool_call": {"name": "...", "arguments": {...}}}`, often wrapped in
//! explanation or code fences. [`extract`] finds the first such object and
//! returns it as a [`ToolCall`]. Anything that almost matches but cannot be
//! read (truncated output, bad JSON, a missing name) counts as no call.

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use super::prompt::TOOL_CALL_MARKER;
use crate::tools::Arguments;

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub name: String,
    pub arguments: Arguments,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Arguments) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// Why a marker-bearing reply could not be read as a call
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MalformedCall {
    #[error("call object is never closed")]
    Unbalanced,

    #[error("call object is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("'tool_call' is not an object")]
    NotAnObject,

    #[error("'tool_call' has no string 'name'")]
    MissingName,

    #[error("'arguments' is not an object")]
    InvalidArguments,
}

/// Returns the first well-formed tool call in `text`, if any
pub fn extract(text: &str) -> Option<ToolCall> {
    match try_extract(text) {
        Ok(call) => call,
        Err(reason) => {
            debug!(%reason, "Ignoring malformed tool call");
            None
        }
    }
}

/// Like [`extract`], but distinguishes "no marker" (`Ok(None)`) from a
/// marker that could not be read (`Err`)
pub fn try_extract(text: &str) -> Result<Option<ToolCall>, MalformedCall> {
    let object = match Scanner::new(text).run() {
        ScanOutcome::NoMarker => return Ok(None),
        ScanOutcome::Unbalanced => return Err(MalformedCall::Unbalanced),
        ScanOutcome::Object(object) => object,
    };

    let parsed: Value =
        serde_json::from_str(object).map_err(|e| MalformedCall::InvalidJson(e.to_string()))?;

    let call = parsed
        .get("tool_call")
        .and_then(Value::as_object)
        .ok_or(MalformedCall::NotAnObject)?;

    let name = call
        .get("name")
        .and_then(Value::as_str)
        .ok_or(MalformedCall::MissingName)?;

    let arguments = match call.get("arguments") {
        None | Some(Value::Null) => Arguments::new(),
        Some(Value::Object(map)) => map.clone(),
        Some(_) => return Err(MalformedCall::InvalidArguments),
    };

    Ok(Some(ToolCall::new(name, arguments)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    ScanningForMarker,
    CountingBraces {
        start: usize,
        depth: usize,
        in_string: bool,
        escaped: bool,
    },
    Done { start: usize, end: usize },
}

#[derive(Debug, PartialEq, Eq)]
enum ScanOutcome<'a> {
    NoMarker,
    Unbalanced,
    Object(&'a str),
}

/// Finds the object that opens at the first marker and the brace that closes
/// it, skipping braces inside string literals
struct Scanner<'a> {
    text: &'a str,
    state: ScanState,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            state: ScanState::ScanningForMarker,
        }
    }

    fn run(mut self) -> ScanOutcome<'a> {
        let start = match self.text.find(TOOL_CALL_MARKER) {
            Some(start) => start,
            None => return ScanOutcome::NoMarker,
        };

        self.state = ScanState::CountingBraces {
            start,
            depth: 0,
            in_string: false,
            escaped: false,
        };

        for (offset, ch) in self.text[start..].char_indices() {
            self.step(start + offset, ch);
            if let ScanState::Done { start, end } = self.state {
                return ScanOutcome::Object(&self.text[start..end]);
            }
        }

        ScanOutcome::Unbalanced
    }

    fn step(&mut self, index: usize, ch: char) {
        let ScanState::CountingBraces {
            start,
            depth,
            in_string,
            escaped,
        } = &mut self.state
        else {
            return;
        };

        if *escaped {
            *escaped = false;
            return;
        }

        match ch {
            '\\' if *in_string => *escaped = true,
            '"' => *in_string = !*in_string,
            '{' if !*in_string => *depth += 1,
            '}' if !*in_string => {
                *depth -= 1;
                if *depth == 0 {
                    self.state = ScanState::Done {
                        start: *start,
                        end: index + ch.len_utf8(),
                    };
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_bare_call() {
        let call = extract(r#"{"tool_call":{"name":"echo","arguments":{"text":"hi"}}}"#).unwrap();
        assert_eq!(call.name, "echo");
        assert_eq!(call.arguments["text"], json!("hi"));
    }

    #[test]
    fn test_extract_call_embedded_in_prose() {
        let text = "Sure, let me check.\n```json\n{\"tool_call\": {\"name\": \"get_time\", \
                    \"arguments\": {\"timezone\": \"JST\"}}}\n```\nOne moment.";
        let call = extract(text).unwrap();
        assert_eq!(call.name, "get_time");
        assert_eq!(call.arguments["timezone"], json!("JST"));
    }

    #[test]
    fn test_no_marker() {
        assert_eq!(extract("Hello there"), None);
        assert_eq!(try_extract("Hello there"), Ok(None));
        assert_eq!(extract(r#"{"name": "echo"}"#), None);
    }

    #[test]
    fn test_unbalanced_is_no_call() {
        let text = r#"{"tool_call":{"name":"echo","arguments":{"text":"hi"}"#;
        assert_eq!(extract(text), None);
        assert_eq!(try_extract(text), Err(MalformedCall::Unbalanced));
    }

    #[test]
    fn test_braces_inside_strings_ignored() {
        let text = r#"{"tool_call":{"name":"echo","arguments":{"text":"a } b { \" }"}}} trailing }"#;
        let call = extract(text).unwrap();
        assert_eq!(call.arguments["text"], json!("a } b { \" }"));
    }

    #[test]
    fn test_escaped_backslash_before_quote() {
        let text = r#"{"tool_call":{"name":"echo","arguments":{"text":"C:\\"}}}"#;
        let call = extract(text).unwrap();
        assert_eq!(call.arguments["text"], json!("C:\\"));
    }

    #[test]
    fn test_missing_name() {
        let text = r#"{"tool_call":{"arguments":{}}}"#;
        assert_eq!(extract(text), None);
        assert_eq!(try_extract(text), Err(MalformedCall::MissingName));

        let text = r#"{"tool_call":{"name":42}}"#;
        assert_eq!(try_extract(text), Err(MalformedCall::MissingName));
    }

    #[test]
    fn test_tool_call_not_object() {
        assert_eq!(
            try_extract(r#"{"tool_call": "echo"}"#),
            Err(MalformedCall::NotAnObject)
        );
    }

    #[test]
    fn test_invalid_json_is_no_call() {
        let text = r#"{"tool_call":{"name":"echo",}}"#;
        assert_eq!(extract(text), None);
        assert!(matches!(try_extract(text), Err(MalformedCall::InvalidJson(_))));
    }

    #[test]
    fn test_missing_arguments_is_empty_map() {
        let call = extract(r#"{"tool_call":{"name":"random_joke"}}"#).unwrap();
        assert!(call.arguments.is_empty());

        let call = extract(r#"{"tool_call":{"name":"random_joke","arguments":null}}"#).unwrap();
        assert!(call.arguments.is_empty());
    }

    #[test]
    fn test_non_object_arguments_rejected() {
        let text = r#"{"tool_call":{"name":"echo","arguments":["hi"]}}"#;
        assert_eq!(try_extract(text), Err(MalformedCall::InvalidArguments));
    }

    #[test]
    fn test_only_first_marker_considered() {
        let text = concat!(
            r#"{"tool_call":{"name":"first","arguments":{}}} then "#,
            r#"{"tool_call":{"name":"second","arguments":{}}}"#
        );
        assert_eq!(extract(text).unwrap().name, "first");

        // A broken first call is not rescued by a later one
        let text = concat!(
            r#"{"tool_call":{"arguments":{}}} then "#,
            r#"{"tool_call":{"name":"second","arguments":{}}}"#
        );
        assert_eq!(extract(text), None);
    }

    #[test]
    fn test_marker_with_space_not_recognized() {
        assert_eq!(
            extract(r#"{ "tool_call": {"name":"echo","arguments":{}}}"#),
            None
        );
    }

    #[test]
    fn test_multibyte_text_around_call() {
        let text = "天気は？ {\"tool_call\":{\"name\":\"get_weather\",\"arguments\":{\"city\":\"東京\"}}} ✓";
        let call = extract(text).unwrap();
        assert_eq!(call.arguments["city"], json!("東京"));
    }

    #[test]
    fn test_scanner_states() {
        let scanner = Scanner::new("no call");
        assert_eq!(scanner.state, ScanState::ScanningForMarker);
        assert_eq!(scanner.run(), ScanOutcome::NoMarker);

        let text = r#"x {"tool_call":{"name":"a"}} y"#;
        assert_eq!(
            Scanner::new(text).run(),
            ScanOutcome::Object(r#"{"tool_call":{"name":"a"}}"#)
        );
    }
}
