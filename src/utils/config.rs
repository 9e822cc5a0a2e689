use crate::models::{default_languages, Language, ModelProfile};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub inference: InferenceConfig,
    pub breaker: BreakerConfig,
    pub cache: CacheConfig,
    pub sessions: SessionConfig,
    pub logging: LoggingConfig,
    pub languages: Vec<Language>,
    pub models: Vec<ModelProfile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub name: String,
    pub bind_addr: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    pub endpoint: String,
    pub temperature: f32,
    pub top_p: f32,
    pub num_predict: i32,
    pub num_ctx: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    pub volume_threshold: u32,
    pub error_threshold_percentage: f32,
    pub cooldown_secs: u64,
    pub rolling_window_secs: u64,
    pub overall_timeout_secs: u64,
    pub retry_timeout_ratio: f32,
    pub shorten_ratio: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub db_path: Option<PathBuf>,
    pub max_size_mb: u64,
    pub eviction_fraction: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub ttl_secs: u64,
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "doc-translator".to_string(),
            bind_addr: "0.0.0.0".to_string(),
            port: 9527,
        }
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434/api".to_string(),
            temperature: 0.3,
            top_p: 0.9,
            num_predict: -1,
            num_ctx: 4096,
        }
    }
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            volume_threshold: 3,
            error_threshold_percentage: 40.0,
            cooldown_secs: 45,
            rolling_window_secs: 10,
            overall_timeout_secs: 360,
            retry_timeout_ratio: 0.6,
            shorten_ratio: 0.5,
        }
    }
}

impl BreakerConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn rolling_window(&self) -> Duration {
        Duration::from_secs(self.rolling_window_secs)
    }

    pub fn overall_timeout(&self) -> Duration {
        Duration::from_secs(self.overall_timeout_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            db_path: Some(PathBuf::from("./data/translation-cache.redb")),
            max_size_mb: 100,
            eviction_fraction: 0.2,
        }
    }
}

impl CacheConfig {
    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_mb * 1024 * 1024
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 60 * 60,
            sweep_interval_secs: 5 * 60,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            inference: InferenceConfig::default(),
            breaker: BreakerConfig::default(),
            cache: CacheConfig::default(),
            sessions: SessionConfig::default(),
            logging: LoggingConfig::default(),
            languages: default_languages(),
            models: Vec::new(),
        }
    }
}

impl AppConfig {
    pub fn load_from_file(path: &str) -> crate::utils::errors::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::utils::errors::TranslatorError::ConfigError(e.to_string()))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> crate::utils::errors::Result<Self> {
        toml::from_str(content)
            .map_err(|e| crate::utils::errors::TranslatorError::ConfigError(e.to_string()))
    }

    pub fn load_or_default(path: Option<&str>) -> Self {
        let config = match path.map(Self::load_from_file) {
            Some(Ok(config)) => config,
            Some(Err(e)) => {
                tracing::warn!(error = %e, "Failed to load config file, using defaults");
                Self::default()
            }
            None => Self::default(),
        };
        config.with_env_overrides()
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Some(size) = std::env::var("TRANSLATION_CACHE_SIZE_MB")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            self.cache.max_size_mb = size;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SizeClass;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [breaker]
            volume_threshold = 5
            error_threshold_percentage = 50.0
            cooldown_secs = 10
            rolling_window_secs = 10
            overall_timeout_secs = 360
            retry_timeout_ratio = 0.6
            shorten_ratio = 0.5

            [[models]]
            id = "phi3:mini"
            size_class = "small"
            max_tokens = 2048
            optimal_chunk_size = 1500
            overlap_percentage = 10.0
            avg_chars_per_token = 4.0
            "#,
        )
        .unwrap();

        assert_eq!(config.breaker.volume_threshold, 5);
        assert_eq!(config.breaker.cooldown(), Duration::from_secs(10));
        assert_eq!(config.server.port, 9527);
        assert_eq!(config.languages.len(), 5);
        assert_eq!(config.models[0].size_class, SizeClass::Small);
    }

    #[test]
    fn partial_section_keeps_its_other_defaults() {
        let config = AppConfig::from_toml("[server]\nport = 8080\n\n[cache]\nmax_size_mb = 5\n").unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.name, "doc-translator");
        assert_eq!(config.server.bind_addr, "0.0.0.0");
        assert_eq!(config.cache.max_size_bytes(), 5 * 1024 * 1024);
        assert!(config.cache.enabled);
        assert_eq!(config.breaker.volume_threshold, 3);
    }

    #[test]
    fn unreadable_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[server\nport = ").unwrap();

        let config = AppConfig::load_or_default(path.to_str());
        assert_eq!(config.server.name, "doc-translator");

        let err = AppConfig::load_from_file(path.to_str().unwrap()).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn example_config_parses() {
        let config = AppConfig::from_toml(include_str!("../../config.example.toml")).unwrap();
        assert_eq!(config.inference.endpoint, "http://localhost:11434/api");
        assert_eq!(config.cache.max_size_bytes(), 100 * 1024 * 1024);
        assert_eq!(config.sessions.ttl_secs, 3600);
        assert_eq!(config.models.len(), 1);
    }

    #[test]
    fn malformed_toml_is_config_error() {
        let err = AppConfig::from_toml("[server\nport = ").unwrap_err();
        assert!(err.is_configuration());
    }
}
