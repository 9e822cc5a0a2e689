pub mod config;
pub mod errors;

pub use config::{
    AppConfig, BreakerConfig, CacheConfig, InferenceConfig, LoggingConfig, ServerConfig,
    SessionConfig,
};
pub use errors::{Result, TranslatorError};

