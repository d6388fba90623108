use async_trait::async_trait;
use std::fmt;
use crate::Result;

#[async_trait]
pub trait InferenceModel: Send + Sync + fmt::Debug {
    /// Human readable backend name, used in logs
    fn name(&self) -> &str;

    /// Run a single prompt and return the raw response text
    async fn generate(&self, prompt: &str) -> Result<String>;
}
