use super::sentences::{extract_markers, split_paragraphs, split_sentences};
use super::{Segment, SegmentTier, SegmentationConfig};
use crate::utils::Result;
use tracing::debug;

/// Sentence-aligned, size-bounded chunking of page text.
pub struct Segmenter {
    config: SegmentationConfig,
    tier: SegmentTier,
}

/// Sentences accumulated for the segment under construction.
#[derive(Default)]
struct SentenceBuffer {
    sentences: Vec<String>,
    char_len: usize,
}

impl SentenceBuffer {
    fn would_overflow(&self, sentence_len: usize, tier: &SegmentTier) -> bool {
        if self.sentences.is_empty() {
            return false;
        }
        self.sentences.len() + 1 > tier.max_sentences
            || self.char_len + 1 + sentence_len > tier.max_chunk_size
    }

    fn push(&mut self, sentence: String, sentence_len: usize) {
        if !self.sentences.is_empty() {
            self.char_len += 1;
        }
        self.char_len += sentence_len;
        self.sentences.push(sentence);
    }

    fn take(&mut self) -> Option<String> {
        if self.sentences.is_empty() {
            return None;
        }
        let text = self.sentences.join(" ");
        self.sentences.clear();
        self.char_len = 0;
        Some(text)
    }
}

impl Segmenter {
    pub fn new(config: SegmentationConfig, tier: SegmentTier) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, tier })
    }

    pub fn config(&self) -> &SegmentationConfig {
        &self.config
    }

    pub fn tier(&self) -> SegmentTier {
        self.tier
    }

    /// Segments one page. Empty text yields an empty list.
    pub fn segment(&self, page_text: &str, page_number: usize) -> Vec<Segment> {
        let paragraphs = if self.config.smart_paragraph_detection {
            split_paragraphs(page_text, self.config.min_segment_length)
        } else {
            vec![page_text.to_string()]
        };

        // (text, starts paragraph, ends paragraph)
        let mut chunks: Vec<(String, bool, bool)> = Vec::new();
        for paragraph in &paragraphs {
            let first = chunks.len();
            for text in self.chunk_paragraph(paragraph) {
                chunks.push((text, false, false));
            }
            if chunks.len() > first {
                chunks[first].1 = true;
                if let Some(last) = chunks.last_mut() {
                    last.2 = true;
                }
            }
        }

        let total = chunks.len();
        let mut segments: Vec<Segment> = Vec::with_capacity(total);
        for (index, (text, starts, ends)) in chunks.into_iter().enumerate() {
            let special_markers = if self.config.preserve_markup {
                extract_markers(&text)
            } else {
                Vec::new()
            };
            let overlap_context = segments
                .last()
                .and_then(|prev: &Segment| self.overlap_tail(&prev.text));

            segments.push(Segment {
                id: Segment::make_id(page_number, index),
                text,
                page_number,
                segment_index: index,
                is_start_of_paragraph: starts,
                is_end_of_paragraph: ends,
                special_markers,
                previous_segment_id: (index > 0).then(|| Segment::make_id(page_number, index - 1)),
                next_segment_id: (index + 1 < total)
                    .then(|| Segment::make_id(page_number, index + 1)),
                overlap_context,
            });
        }

        debug!(
            page = page_number,
            paragraphs = paragraphs.len(),
            segments = segments.len(),
            "Page segmented"
        );

        segments
    }

    fn chunk_paragraph(&self, paragraph: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut buffer = SentenceBuffer::default();

        for sentence in split_sentences(paragraph) {
            let sentence_len = sentence.chars().count();
            if buffer.would_overflow(sentence_len, &self.tier) {
                chunks.extend(buffer.take());
            }
            // An oversized sentence lands alone in the buffer and is flushed by
            // the next overflow check; sentences are never cut.
            buffer.push(sentence, sentence_len);
        }
        chunks.extend(buffer.take());

        chunks
    }

    fn overlap_tail(&self, previous: &str) -> Option<String> {
        if self.config.overlap_percentage <= 0.0 || self.config.context_window == 0 {
            return None;
        }

        let chars: Vec<char> = previous.chars().collect();
        let wanted = ((chars.len() as f32 * self.config.overlap_percentage / 100.0).ceil()
            as usize)
            .min(self.config.context_window);
        if wanted == 0 {
            return None;
        }

        let mut start = chars.len() - wanted.min(chars.len());
        // Align to a word boundary unless the tail is a single word.
        if start > 0 && !chars[start - 1].is_whitespace() {
            if let Some(offset) = chars[start..].iter().position(|c| c.is_whitespace()) {
                start += offset + 1;
            }
        }

        let tail: String = chars[start..].iter().collect();
        let tail = tail.trim();
        (!tail.is_empty()).then(|| tail.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segmentation::reassemble;

    fn plain_config() -> SegmentationConfig {
        SegmentationConfig {
            overlap_percentage: 0.0,
            preserve_markup: false,
            smart_paragraph_detection: false,
            min_segment_length: 0,
            ..SegmentationConfig::default()
        }
    }

    fn twelve_sentences() -> String {
        (1..=12).map(|i| format!("S{}.", i)).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn caps_sentences_per_segment() {
        let segmenter = Segmenter::new(plain_config(), SegmentTier::new(5, 300)).unwrap();
        let segments = segmenter.segment(&twelve_sentences(), 0);

        let counts: Vec<usize> = segments
            .iter()
            .map(|s| split_sentences(&s.text).len())
            .collect();
        assert_eq!(counts, vec![5, 5, 2]);
        assert_eq!(segments[0].text, "S1. S2. S3. S4. S5.");
        assert_eq!(segments[2].text, "S11. S12.");
        assert_eq!(
            segments.iter().map(|s| s.segment_index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn oversized_sentence_is_never_split() {
        let sentence = format!("{}.", "a".repeat(499));
        let segmenter = Segmenter::new(plain_config(), SegmentTier::new(5, 300)).unwrap();
        let segments = segmenter.segment(&sentence, 3);

        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, sentence);
        assert_eq!(segments[0].page_number, 3);
    }

    #[test]
    fn oversized_sentence_stands_alone_between_neighbours() {
        let long = format!("{}.", "b".repeat(400));
        let text = format!("Short one. {} Short two.", long);
        let segmenter = Segmenter::new(plain_config(), SegmentTier::new(5, 300)).unwrap();
        let segments = segmenter.segment(&text, 0);

        let texts: Vec<&str> = segments.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["Short one.", long.as_str(), "Short two."]);
    }

    #[test]
    fn respects_character_cap() {
        let text = (0..40)
            .map(|i| format!("Sentence number {} is here.", i))
            .collect::<Vec<_>>()
            .join(" ");
        let tier = SegmentTier::new(100, 120);
        let segmenter = Segmenter::new(plain_config(), tier).unwrap();
        let segments = segmenter.segment(&text, 0);

        assert!(segments.len() > 1);
        for segment in &segments {
            assert!(segment.char_len() <= tier.max_chunk_size, "{}", segment.text);
        }
    }

    #[test]
    fn preserves_every_sentence() {
        let text = "One fish. Two fish! Red fish? Blue fish. This one has a little star. \
                    This one has a little car. Say, what a lot of fish there are.";
        let segmenter = Segmenter::new(plain_config(), SegmentTier::new(2, 40)).unwrap();
        let segments = segmenter.segment(text, 0);

        let recovered: Vec<String> = segments
            .iter()
            .flat_map(|s| split_sentences(&s.text))
            .collect();
        assert_eq!(recovered, split_sentences(text));
    }

    #[test]
    fn empty_page_yields_no_segments() {
        let segmenter = Segmenter::new(SegmentationConfig::default(), SegmentTier::new(5, 300))
            .unwrap();
        assert!(segmenter.segment("", 0).is_empty());
        assert!(segmenter.segment("  \n\n  ", 0).is_empty());
    }

    #[test]
    fn first_segment_starts_paragraph_without_smart_detection() {
        let segmenter = Segmenter::new(plain_config(), SegmentTier::new(5, 300)).unwrap();
        let segments = segmenter.segment(&twelve_sentences(), 0);

        let starts: Vec<bool> = segments.iter().map(|s| s.is_start_of_paragraph).collect();
        assert_eq!(starts, vec![true, false, false]);
        assert!(segments[2].is_end_of_paragraph);
        assert_eq!(segments[1].previous_segment_id.as_deref(), Some("p0-s0"));
        assert_eq!(segments[1].next_segment_id.as_deref(), Some("p0-s2"));
        assert_eq!(segments[2].next_segment_id, None);
    }

    #[test]
    fn smart_detection_marks_paragraph_boundaries() {
        let config = SegmentationConfig {
            smart_paragraph_detection: true,
            ..plain_config()
        };
        let text = "First paragraph here. It has two sentences.\n\nSecond paragraph stands alone.";
        let segmenter = Segmenter::new(config, SegmentTier::new(5, 300)).unwrap();
        let segments = segmenter.segment(text, 1);

        assert_eq!(segments.len(), 2);
        assert!(segments[0].is_start_of_paragraph && segments[0].is_end_of_paragraph);
        assert!(segments[1].is_start_of_paragraph && segments[1].is_end_of_paragraph);
        assert_eq!(
            reassemble(&segments),
            "First paragraph here. It has two sentences.\n\nSecond paragraph stands alone."
        );
    }

    #[test]
    fn markers_only_collected_when_preserving_markup() {
        let text = "See [fig. 2] for #details.";
        let with_markup = SegmentationConfig {
            preserve_markup: true,
            ..plain_config()
        };
        let segmenter = Segmenter::new(with_markup, SegmentTier::new(5, 300)).unwrap();
        assert_eq!(
            segmenter.segment(text, 0)[0].special_markers,
            vec!["[fig. 2]", "#details"]
        );

        let segmenter = Segmenter::new(plain_config(), SegmentTier::new(5, 300)).unwrap();
        assert!(segmenter.segment(text, 0)[0].special_markers.is_empty());
    }

    #[test]
    fn overlap_context_carries_previous_tail() {
        let config = SegmentationConfig {
            overlap_percentage: 50.0,
            context_window: 200,
            ..plain_config()
        };
        let segmenter = Segmenter::new(config, SegmentTier::new(2, 300)).unwrap();
        let segments = segmenter.segment("Alpha beta gamma. Delta epsilon. Zeta eta.", 0);

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].overlap_context, None);
        let context = segments[1].overlap_context.as_deref().unwrap();
        assert!(segments[0].text.ends_with(context));
        assert!(!segments[1].text.contains(context));
    }

    #[test]
    fn rejects_invalid_config() {
        let config = SegmentationConfig {
            optimal_chunk_size: 0,
            ..SegmentationConfig::default()
        };
        assert!(Segmenter::new(config, SegmentTier::new(5, 300)).is_err());
    }
}
