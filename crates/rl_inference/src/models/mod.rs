use std::sync::Arc;
use rl_core::config::{AppConfig, ModelKind};
use rl_core::InferenceModel;
use tracing::{info, warn};

pub mod deepseek;
pub mod disabled;
pub mod gemini;

pub use deepseek::DeepSeekModel;
pub use disabled::DisabledModel;
pub use gemini::GeminiModel;

/// Build the configured model. A missing key or a client that cannot be built
/// yields a `DisabledModel`, which rejects every prompt.
pub fn create_model(config: &AppConfig) -> Arc<dyn InferenceModel> {
    let model_name = config.model_name();
    let Some(api_key) = config.model_api_key() else {
        warn!("⚠️ No API key configured for {:?}, model calls will be rejected", config.model);
        return Arc::new(DisabledModel::new("no API key configured"));
    };

    let built = match config.model {
        ModelKind::Gemini => GeminiModel::new(api_key, &model_name).map(|m| Arc::new(m) as Arc<dyn InferenceModel>),
        ModelKind::Deepseek => DeepSeekModel::new(api_key, &model_name).map(|m| Arc::new(m) as Arc<dyn InferenceModel>),
    };

    match built {
        Ok(model) => {
            info!("🧠 {} model ({}) is ready", model.name(), model_name);
            model
        }
        Err(e) => {
            warn!("❌ Failed to initialise {:?} model: {}", config.model, e);
            Arc::new(DisabledModel::new(e.to_string()))
        }
    }
}
