use async_trait::async_trait;

use crate::error::RagResult;

/// Text completion from an external generative model.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Generator: Send + Sync {
    /// Complete `prompt`, returning the model's text unmodified.
    async fn generate(&self, prompt: &str) -> RagResult<String>;
}
