pub mod document;
pub mod models;
pub mod segmentation;
pub mod server;
pub mod state;
pub mod translation;
pub mod utils;

pub use document::{ExtractedPage, PlainTextExtractor, PlainTextFormatter, TextExtractor};
pub use models::{Language, LanguageSet, ModelProfile, ModelRegistry, SizeClass};
pub use segmentation::{reassemble, Segment, SegmentationConfig, Segmenter};
pub use server::AppState;
pub use state::{SessionStore, SessionSweeper};
pub use translation::{
    DocumentTranslation, DocumentTranslator, ResilientClient, TranslationCache,
    TranslationProgress, TranslationResult,
};
pub use utils::{AppConfig, Result, TranslatorError};
