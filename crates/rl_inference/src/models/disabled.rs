use std::fmt;
use rl_core::{Error, InferenceModel, Result};

/// Stand-in for a model that could not be configured; fails closed.
pub struct DisabledModel {
    reason: String,
}

impl fmt::Debug for DisabledModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisabledModel").field("reason", &self.reason).finish()
    }
}

impl DisabledModel {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

#[async_trait::async_trait]
impl InferenceModel for DisabledModel {
    fn name(&self) -> &str {
        "Disabled"
    }

    async fn generate(&self, _prompt: &str) -> Result<String> {
        Err(Error::Inference(format!("model is disabled: {}", self.reason)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_model_rejects() {
        let model = DisabledModel::new("no API key configured");
        let err = model.generate("anything").await.unwrap_err();
        assert_eq!(err.to_string(), "Inference error: model is disabled: no API key configured");
    }
}
