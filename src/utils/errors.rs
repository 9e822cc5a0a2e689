use thiserror::Error;

#[derive(Error, Debug)]
pub enum TranslatorError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("Model not installed on inference endpoint: {0}")]
    ModelUnavailable(String),

    #[error("Unsupported target language: {0}")]
    UnsupportedLanguage(String),

    #[error("Invalid segmentation config: {0}")]
    InvalidSegmentationConfig(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("No segments extracted from document")]
    NoSegments,

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Inference request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Cache error: {0}")]
    CacheError(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Translation job cancelled")]
    Cancelled,

    #[error("Unsupported output format: {0}")]
    UnsupportedFormat(String),

    #[error("HTTP request error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl TranslatorError {
    /// Fatal errors that are surfaced immediately and never retried.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            TranslatorError::UnknownModel(_)
                | TranslatorError::ModelUnavailable(_)
                | TranslatorError::UnsupportedLanguage(_)
                | TranslatorError::InvalidSegmentationConfig(_)
                | TranslatorError::ConfigError(_)
        )
    }

    /// Failures of the inference endpoint that the client absorbs.
    pub fn is_transient(&self) -> bool {
        match self {
            TranslatorError::Inference(_) | TranslatorError::Timeout(_) => true,
            TranslatorError::HttpError(e) => !e.is_builder(),
            _ => false,
        }
    }

    /// Only an expired deadline triggers the shortened retry.
    pub fn is_timeout(&self) -> bool {
        match self {
            TranslatorError::Timeout(_) => true,
            TranslatorError::HttpError(e) => e.is_timeout(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, TranslatorError>;
