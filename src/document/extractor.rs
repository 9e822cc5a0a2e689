use super::ExtractedPage;
use crate::segmentation::PAGE_BREAK;
use crate::utils::{Result, TranslatorError};
use async_trait::async_trait;
use std::path::Path;

/// Turns a source document into per-page plain text.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, path: &Path) -> Result<Vec<ExtractedPage>>;
}

/// UTF-8 text files; form feeds separate pages.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextExtractor;

impl PlainTextExtractor {
    pub fn split_pages(content: &str) -> Vec<ExtractedPage> {
        content
            .split(PAGE_BREAK)
            .enumerate()
            .map(|(i, text)| ExtractedPage::new(text, i + 1))
            .collect()
    }
}

#[async_trait]
impl TextExtractor for PlainTextExtractor {
    async fn extract(&self, path: &Path) -> Result<Vec<ExtractedPage>> {
        let bytes = tokio::fs::read(path).await?;
        let content = String::from_utf8(bytes).map_err(|e| {
            TranslatorError::Extraction(format!("{} is not valid UTF-8: {}", path.display(), e))
        })?;

        if content.trim().is_empty() {
            return Err(TranslatorError::Extraction(format!(
                "no text found in {}",
                path.display()
            )));
        }

        let pages = Self::split_pages(&content);
        tracing::debug!(path = %path.display(), pages = pages.len(), "Extracted text");
        Ok(pages)
    }
}
