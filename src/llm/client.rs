use super::error::BackendError;
use super::types::{LLMRequest, LLMResponse};
use async_trait::async_trait;

#[async_trait]
pub trait LLMClient: Send + Sync {
    async fn chat(&self, request: LLMRequest) -> Result<LLMResponse, BackendError>;

    fn name(&self) -> &str;

    fn model_info(&self) -> Option<String> {
        None
    }

    /// Reports whether the backend is reachable. Backends without a cheap
    /// probe are assumed healthy.
    async fn health_check(&self) -> Result<bool, BackendError> {
        Ok(true)
    }
}
