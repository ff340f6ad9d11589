//! Tool dispatch
//!
//! [`ToolDispatcher::dispatch`] is the single entry point the conversation loop
//! uses to run a tool. It never fails: every problem, from an unknown name to a
//! panicking executable, comes back as [`ToolResult::Failure`] so the model can
//! read it and react.

use futures_util::FutureExt;
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::registry::ToolRegistry;
use super::trait_def::Arguments;

/// Normalized outcome of one tool invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolResult {
    Success(String),
    Failure(String),
}

impl ToolResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ToolResult::Success(_))
    }

    /// Payload text on success, error description on failure
    pub fn text(&self) -> &str {
        match self {
            ToolResult::Success(text) | ToolResult::Failure(text) => text,
        }
    }

    /// Content of the user-role message that feeds this result back to the model
    pub fn to_message_content(&self) -> String {
        match self {
            ToolResult::Success(payload) => format!("Tool result: {}", payload),
            ToolResult::Failure(description) => format!("Tool result: Error: {}", description),
        }
    }
}

impl fmt::Display for ToolResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolResult::Success(payload) => f.write_str(payload),
            ToolResult::Failure(description) => write!(f, "Error: {}", description),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    timeout: Option<Duration>,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            timeout: None,
        }
    }

    /// Bounds each tool invocation; an expired call becomes a failure
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub async fn dispatch(&self, name: &str, arguments: Arguments) -> ToolResult {
        info!(tool = name, args = ?arguments, "Executing tool");
        let start = Instant::now();

        let result = self.run(name, arguments).await;

        match &result {
            ToolResult::Success(output) => {
                let preview: String = output.chars().take(200).collect();
                info!(
                    tool = name,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Tool execution completed"
                );
                debug!(tool = name, output_preview = %preview, "Tool output preview");
            }
            ToolResult::Failure(error) => {
                warn!(tool = name, error = %error, "Tool execution failed");
            }
        }

        result
    }

    async fn run(&self, name: &str, arguments: Arguments) -> ToolResult {
        let tool = match self.registry.resolve(name) {
            Ok(tool) => tool,
            Err(e) => return ToolResult::Failure(e.to_string()),
        };

        let bound = match tool.descriptor.bind(arguments) {
            Ok(bound) => bound,
            Err(e) => return ToolResult::Failure(e.to_string()),
        };

        let call = AssertUnwindSafe(tool.executable.call(&bound)).catch_unwind();

        let outcome = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    return ToolResult::Failure(format!(
                        "tool '{}' timed out after {}s",
                        name,
                        limit.as_secs()
                    ))
                }
            },
            None => call.await,
        };

        match outcome {
            Ok(Ok(value)) => ToolResult::Success(render_value(value)),
            Ok(Err(e)) => {
                let description = format!("{:#}", e);
                if description.trim().is_empty() {
                    ToolResult::Failure(format!("tool '{}' failed", name))
                } else {
                    ToolResult::Failure(description)
                }
            }
            Err(panic) => ToolResult::Failure(format!(
                "tool '{}' panicked: {}",
                name,
                panic_message(panic.as_ref())
            )),
        }
    }
}

/// Strings are used verbatim, anything else as its JSON text
fn render_value(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{FnTool, ParamSpec, ParamType, Tool, ToolDescriptor};
    use anyhow::anyhow;
    use async_trait::async_trait;
    use serde_json::json;

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        async fn call(&self, _arguments: &Arguments) -> anyhow::Result<Value> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(json!("late"))
        }
    }

    fn dispatcher() -> ToolDispatcher {
        let mut registry = ToolRegistry::new();
        registry
            .register(
                ToolDescriptor::new("echo", "Echo")
                    .param("text", ParamSpec::required(ParamType::String, "Text")),
                Arc::new(FnTool::new(|args: &Arguments| Ok(args["text"].clone()))),
            )
            .unwrap();
        registry
            .register(
                ToolDescriptor::new("broken", "Always fails"),
                Arc::new(FnTool::new(|_: &Arguments| {
                    Err(anyhow!("disk unavailable").context("reading data file"))
                })),
            )
            .unwrap();
        registry
            .register(
                ToolDescriptor::new("silent", "Fails without a message"),
                Arc::new(FnTool::new(|_: &Arguments| Err(anyhow!("")))),
            )
            .unwrap();
        registry
            .register(
                ToolDescriptor::new("panics", "Panics"),
                Arc::new(FnTool::new(|_: &Arguments| -> anyhow::Result<Value> {
                    panic!("index out of bounds")
                })),
            )
            .unwrap();
        registry
            .register(
                ToolDescriptor::new("structured", "Returns an object"),
                Arc::new(FnTool::new(|_: &Arguments| Ok(json!({"ok": true, "n": 2})))),
            )
            .unwrap();
        registry
            .register(ToolDescriptor::new("slow", "Sleeps"), Arc::new(SlowTool))
            .unwrap();

        ToolDispatcher::new(Arc::new(registry))
    }

    fn args(value: Value) -> Arguments {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_dispatch_success_verbatim_string() {
        let result = dispatcher().dispatch("echo", args(json!({"text": "hi"}))).await;
        assert_eq!(result, ToolResult::Success("hi".to_string()));
        assert_eq!(result.to_message_content(), "Tool result: hi");
    }

    #[tokio::test]
    async fn test_dispatch_structured_value_rendered_as_json() {
        let result = dispatcher().dispatch("structured", Arguments::new()).await;
        assert_eq!(result.text(), r#"{"n":2,"ok":true}"#);
    }

    #[tokio::test]
    async fn test_dispatch_unknown_tool() {
        let result = dispatcher().dispatch("bogus", Arguments::new()).await;
        assert!(!result.is_success());
        assert!(result.text().contains("unknown tool"));
        assert_eq!(
            result.to_message_content(),
            "Tool result: Error: unknown tool 'bogus'"
        );
    }

    #[tokio::test]
    async fn test_dispatch_error_keeps_chain() {
        let result = dispatcher().dispatch("broken", Arguments::new()).await;
        assert_eq!(
            result,
            ToolResult::Failure("reading data file: disk unavailable".to_string())
        );
    }

    #[tokio::test]
    async fn test_dispatch_empty_error_still_described() {
        let result = dispatcher().dispatch("silent", Arguments::new()).await;
        assert!(!result.is_success());
        assert!(!result.text().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_catches_panic() {
        let result = dispatcher().dispatch("panics", Arguments::new()).await;
        assert_eq!(
            result,
            ToolResult::Failure("tool 'panics' panicked: index out of bounds".to_string())
        );
    }

    #[tokio::test]
    async fn test_dispatch_binding_failure() {
        let result = dispatcher().dispatch("echo", Arguments::new()).await;
        assert!(result.text().contains("missing required argument 'text'"));

        let result = dispatcher()
            .dispatch("echo", args(json!({"text": "a", "extra": 1})))
            .await;
        assert!(result.text().contains("unexpected argument 'extra'"));
    }

    #[tokio::test]
    async fn test_dispatch_deeply_nested_calculation_fails() {
        let registry = Arc::new(ToolRegistry::with_builtins(None).unwrap());
        let dispatcher = ToolDispatcher::new(registry);

        for depth in [500, 3000, 10_000] {
            let expression = format!("{}1{}", "(".repeat(depth), ")".repeat(depth));
            let result = dispatcher
                .dispatch("calculate", args(json!({"expression": expression})))
                .await;
            assert!(!result.is_success());
            assert!(result.text().starts_with("Error calculating '((("));
        }

        let expression = format!("{}1{}", "(".repeat(500), ")".repeat(500));
        let result = dispatcher
            .dispatch("calculate", args(json!({"expression": expression})))
            .await;
        assert!(result.text().ends_with(": Expression nested too deeply"));
    }

    #[tokio::test]
    async fn test_dispatch_timeout() {
        let dispatcher = dispatcher().with_timeout(Duration::from_millis(50));
        let result = dispatcher.dispatch("slow", Arguments::new()).await;
        assert_eq!(
            result,
            ToolResult::Failure("tool 'slow' timed out after 0s".to_string())
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(ToolResult::Success("x".to_string()).to_string(), "x");
        assert_eq!(ToolResult::Failure("y".to_string()).to_string(), "Error: y");
    }
}
