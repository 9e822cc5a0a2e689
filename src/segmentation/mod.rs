pub mod reassembler;
pub mod segmenter;
pub mod sentences;

pub use reassembler::{reassemble, Reassembler};
pub use segmenter::Segmenter;
pub use sentences::{extract_markers, split_paragraphs, split_sentences};

use crate::utils::{Result, TranslatorError};
use serde::{Deserialize, Serialize};

/// Page separator in raw extracted text.
pub const PAGE_BREAK: char = '\u{000C}';

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SegmentationConfig {
    pub max_tokens: usize,
    pub optimal_chunk_size: usize,
    pub overlap_percentage: f32,
    pub avg_chars_per_token: f32,
    pub preserve_markup: bool,
    pub smart_paragraph_detection: bool,
    pub context_window: usize,
    pub min_segment_length: usize,
}

impl SegmentationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.optimal_chunk_size == 0 {
            return Err(TranslatorError::InvalidSegmentationConfig(
                "optimal_chunk_size must be greater than 0".to_string(),
            ));
        }
        if !(0.0..100.0).contains(&self.overlap_percentage) {
            return Err(TranslatorError::InvalidSegmentationConfig(format!(
                "overlap_percentage must be in [0, 100), got {}",
                self.overlap_percentage
            )));
        }
        if self.avg_chars_per_token <= 0.0 {
            return Err(TranslatorError::InvalidSegmentationConfig(
                "avg_chars_per_token must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            max_tokens: 4096,
            optimal_chunk_size: 3500,
            overlap_percentage: 15.0,
            avg_chars_per_token: 4.0,
            preserve_markup: true,
            smart_paragraph_detection: true,
            context_window: 200,
            min_segment_length: 20,
        }
    }
}

/// Caps applied when accumulating sentences into one segment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SegmentTier {
    pub max_sentences: usize,
    pub max_chunk_size: usize,
}

impl SegmentTier {
    pub fn new(max_sentences: usize, max_chunk_size: usize) -> Self {
        Self {
            max_sentences: max_sentences.max(1),
            max_chunk_size: max_chunk_size.max(1),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub id: String,
    pub text: String,
    pub page_number: usize,
    pub segment_index: usize,
    pub is_start_of_paragraph: bool,
    pub is_end_of_paragraph: bool,
    pub special_markers: Vec<String>,
    pub previous_segment_id: Option<String>,
    pub next_segment_id: Option<String>,
    /// Trailing text of the previous segment, sent as context only.
    pub overlap_context: Option<String>,
}

impl Segment {
    pub fn make_id(page_number: usize, segment_index: usize) -> String {
        format!("p{}-s{}", page_number, segment_index)
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

pub fn estimate_tokens(text: &str, avg_chars_per_token: f32) -> usize {
    if avg_chars_per_token <= 0.0 {
        return text.chars().count();
    }
    (text.chars().count() as f32 / avg_chars_per_token).ceil() as usize
}
