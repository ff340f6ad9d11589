//! External command tools
//!
//! A command tool runs a program once per call. The bound arguments are
//! written to its stdin as a JSON object, trimmed stdout becomes the result
//! text, and a non-zero exit is an error carrying stderr.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use super::trait_def::{Arguments, Tool};

const MAX_OUTPUT_BYTES: usize = 10_000;

#[derive(Debug, Clone)]
pub struct CommandTool {
    name: String,
    program: PathBuf,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
}

impl CommandTool {
    pub fn new(name: impl Into<String>, program: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn program(&self) -> &PathBuf {
        &self.program
    }
}

#[async_trait]
impl Tool for CommandTool {
    async fn call(&self, arguments: &Arguments) -> Result<Value> {
        debug!(tool = %self.name, program = %self.program.display(), "Spawning command tool");

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        let mut child = command
            .spawn()
            .with_context(|| format!("Failed to start '{}'", self.program.display()))?;

        let payload = serde_json::to_vec(arguments)?;
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("stdin of '{}' unavailable", self.program.display()))?;

        // Feed stdin while stdout and stderr drain
        let feed = async move {
            let written = stdin.write_all(&payload).await;
            drop(stdin);
            written
        };
        let (written, output) = tokio::join!(feed, child.wait_with_output());

        let output = output.context("Failed to wait for tool process")?;
        // A tool that never reads its arguments may exit before the write lands
        if let Err(e) = written {
            if e.kind() != std::io::ErrorKind::BrokenPipe {
                return Err(e).context("Failed to write arguments to tool stdin");
            }
        }

        let stdout = truncate(String::from_utf8_lossy(&output.stdout).trim());
        let stderr = truncate(String::from_utf8_lossy(&output.stderr).trim());

        if !output.status.success() {
            let code = output
                .status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            if stderr.is_empty() {
                bail!("'{}' exited with status {}", self.name, code);
            }
            bail!("'{}' exited with status {}: {}", self.name, code, stderr);
        }

        Ok(Value::String(stdout))
    }
}

fn truncate(text: &str) -> String {
    if text.len() <= MAX_OUTPUT_BYTES {
        return text.to_string();
    }
    let mut end = MAX_OUTPUT_BYTES;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}\n... [output truncated]", &text[..end])
}
