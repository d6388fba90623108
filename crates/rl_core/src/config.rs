//! Process-wide configuration, read once from the environment at startup.
//!
//! A `.env` file in the working directory is honoured for local runs but skipped
//! under `cfg(test)` so tests stay hermetic.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum StorageKind {
    Memory,
    Sqlite,
}

impl FromStr for StorageKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(format!("unknown storage backend '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ModelKind {
    Gemini,
    Deepseek,
}

impl ModelKind {
    pub fn default_model_name(&self) -> &'static str {
        match self {
            ModelKind::Gemini => "gemini-2.5-flash-lite",
            ModelKind::Deepseek => "deepseek-chat",
        }
    }
}

impl FromStr for ModelKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "deepseek" => Ok(Self::Deepseek),
            other => Err(format!("unknown model backend '{}'", other)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bind_address: SocketAddr,
    pub log_level: Level,
    pub storage: StorageKind,
    pub database_path: PathBuf,
    pub model: ModelKind,
    pub model_name: Option<String>,
    pub gemini_api_key: Option<String>,
    pub deepseek_api_key: Option<String>,
    /// Bearer token -> user id
    pub api_tokens: HashMap<String, String>,
    pub fetch_timeout: Duration,
    pub workers: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 5001)),
            log_level: Level::INFO,
            storage: StorageKind::Memory,
            database_path: PathBuf::from("articles.db"),
            model: ModelKind::Gemini,
            model_name: None,
            gemini_api_key: None,
            deepseek_api_key: None,
            api_tokens: HashMap::new(),
            fetch_timeout: Duration::from_secs(20),
            workers: 5,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let bind_address = parse_var(&lookup, "RL_BIND_ADDRESS")?.unwrap_or(defaults.bind_address);
        let log_level = parse_var(&lookup, "RL_LOG_LEVEL")?.unwrap_or(defaults.log_level);
        let storage = parse_var(&lookup, "RL_STORAGE")?.unwrap_or(defaults.storage);
        let database_path = lookup("RL_DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.database_path);
        let model = parse_var(&lookup, "RL_MODEL")?.unwrap_or(defaults.model);
        let model_name = non_empty(lookup("RL_MODEL_NAME"));

        // Placeholder keys copied from a template count as absent.
        let gemini_api_key = non_empty(lookup("GEMINI_API_KEY"))
            .filter(|key| !key.contains("YOUR_GEMINI_API_KEY"));
        let deepseek_api_key = non_empty(lookup("DEEPSEEK_API_KEY"));

        let api_tokens = match lookup("RL_API_TOKENS") {
            Some(raw) => parse_tokens(&raw)?,
            None => HashMap::new(),
        };

        let fetch_timeout = parse_var::<u64, _>(&lookup, "RL_FETCH_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.fetch_timeout);
        let workers = parse_var::<usize, _>(&lookup, "RL_WORKERS")?.unwrap_or(defaults.workers);
        if workers == 0 {
            return Err(ConfigError::InvalidValue(
                "RL_WORKERS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            bind_address,
            log_level,
            storage,
            database_path,
            model,
            model_name,
            gemini_api_key,
            deepseek_api_key,
            api_tokens,
            fetch_timeout,
            workers,
        })
    }

    pub fn model_name(&self) -> String {
        self.model_name
            .clone()
            .unwrap_or_else(|| self.model.default_model_name().to_string())
    }

    pub fn model_api_key(&self) -> Option<&str> {
        match self.model {
            ModelKind::Gemini => self.gemini_api_key.as_deref(),
            ModelKind::Deepseek => self.deepseek_api_key.as_deref(),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match non_empty(lookup(key)) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
        None => Ok(None),
    }
}

fn parse_tokens(raw: &str) -> Result<HashMap<String, String>, ConfigError> {
    let mut tokens = HashMap::new();
    for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match pair.split_once(':') {
            Some((token, uid)) if !token.trim().is_empty() && !uid.trim().is_empty() => {
                tokens.insert(token.trim().to_string(), uid.trim().to_string());
            }
            _ => {
                return Err(ConfigError::InvalidValue(
                    "RL_API_TOKENS".to_string(),
                    format!("expected token:uid, got '{}'", pair),
                ))
            }
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.storage, StorageKind::Memory);
        assert_eq!(config.model, ModelKind::Gemini);
        assert_eq!(config.model_name(), "gemini-2.5-flash-lite");
        assert_eq!(config.fetch_timeout, Duration::from_secs(20));
        assert_eq!(config.workers, 5);
        assert!(config.model_api_key().is_none());
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("RL_STORAGE", "sqlite"),
            ("RL_MODEL", "deepseek"),
            ("DEEPSEEK_API_KEY", "sk-test"),
            ("RL_API_TOKENS", "tok-a:alice, tok-b:bob"),
            ("RL_WORKERS", "2"),
            ("RL_LOG_LEVEL", "debug"),
        ]))
        .unwrap();
        assert_eq!(config.storage, StorageKind::Sqlite);
        assert_eq!(config.model_name(), "deepseek-chat");
        assert_eq!(config.model_api_key(), Some("sk-test"));
        assert_eq!(config.api_tokens.get("tok-b").map(String::as_str), Some("bob"));
        assert_eq!(config.workers, 2);
        assert_eq!(config.log_level, Level::DEBUG);
    }

    #[test]
    fn test_placeholder_key_is_ignored() {
        let config =
            AppConfig::from_lookup(lookup_from(&[("GEMINI_API_KEY", "YOUR_GEMINI_API_KEY")])).unwrap();
        assert!(config.gemini_api_key.is_none());
    }

    #[test]
    fn test_invalid_values() {
        let err = AppConfig::from_lookup(lookup_from(&[("RL_WORKERS", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(key, _) if key == "RL_WORKERS"));

        let err = AppConfig::from_lookup(lookup_from(&[("RL_API_TOKENS", "missing-uid")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(key, _) if key == "RL_API_TOKENS"));
    }
}
