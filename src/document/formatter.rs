use crate::utils::{Result, TranslatorError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Txt,
    #[default]
    Pdf,
}

impl std::str::FromStr for OutputFormat {
    type Err = TranslatorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "txt" => Ok(OutputFormat::Txt),
            "pdf" => Ok(OutputFormat::Pdf),
            other => Err(TranslatorError::UnsupportedFormat(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Margins {
    pub top: f32,
    pub bottom: f32,
    pub left: f32,
    pub right: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct DocumentStyle {
    pub font_size: f32,
    pub font_family: String,
    pub line_height: f32,
    pub page_size: String,
    pub margins: Margins,
}

impl Default for DocumentStyle {
    fn default() -> Self {
        Self {
            font_size: 12.0,
            font_family: "Helvetica".to_string(),
            line_height: 1.5,
            page_size: "A4".to_string(),
            margins: Margins {
                top: 72.0,
                bottom: 72.0,
                left: 72.0,
                right: 72.0,
            },
        }
    }
}

impl DocumentStyle {
    /// Extra spacing between lines, in points.
    pub fn line_gap(&self) -> f32 {
        (self.line_height - 1.0) * self.font_size
    }
}

/// Writes translated text to an output document.
#[async_trait]
pub trait DocumentFormatter: Send + Sync {
    async fn format(
        &self,
        text: &str,
        style: &DocumentStyle,
        format: OutputFormat,
        output_path: &Path,
    ) -> Result<PathBuf>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextFormatter;

#[async_trait]
impl DocumentFormatter for PlainTextFormatter {
    async fn format(
        &self,
        text: &str,
        _style: &DocumentStyle,
        format: OutputFormat,
        output_path: &Path,
    ) -> Result<PathBuf> {
        match format {
            OutputFormat::Txt => {
                if let Some(parent) = output_path.parent() {
                    if !parent.as_os_str().is_empty() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                }
                tokio::fs::write(output_path, text).await?;
                tracing::info!(path = %output_path.display(), bytes = text.len(), "Wrote translated document");
                Ok(output_path.to_path_buf())
            }
            OutputFormat::Pdf => Err(TranslatorError::UnsupportedFormat("pdf".to_string())),
        }
    }
}
