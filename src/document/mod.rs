pub mod extractor;
pub mod formatter;

pub use extractor::{PlainTextExtractor, TextExtractor};
pub use formatter::{DocumentFormatter, DocumentStyle, Margins, OutputFormat, PlainTextFormatter};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedPage {
    pub text: String,
    /// 1-based.
    pub page_number: usize,
}

impl ExtractedPage {
    pub fn new(text: impl Into<String>, page_number: usize) -> Self {
        Self {
            text: text.into(),
            page_number,
        }
    }
}
