use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// Named arguments passed to a tool, already bound against its descriptor
pub type Arguments = Map<String, Value>;

#[async_trait]
pub trait Tool: Send + Sync {
    async fn call(&self, arguments: &Arguments) -> Result<Value>;
}

/// Adapts a synchronous closure into a [`Tool`]
pub struct FnTool<F>(F);

impl<F> FnTool<F>
where
    F: Fn(&Arguments) -> Result<Value> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F> Tool for FnTool<F>
where
    F: Fn(&Arguments) -> Result<Value> + Send + Sync,
{
    async fn call(&self, arguments: &Arguments) -> Result<Value> {
        (self.0)(arguments)
    }
}
