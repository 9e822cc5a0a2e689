use super::Segment;

/// Rebuilds page-ordered text from segments in any order.
///
/// Segments are ordered by `(page_number, segment_index)`. A segment that starts a
/// paragraph, or the first segment of a new page, opens a block; others are appended
/// to the current block with a single space. Blocks are separated by a blank line.
pub fn reassemble(segments: &[Segment]) -> String {
    let mut ordered: Vec<&Segment> = segments.iter().collect();
    ordered.sort_by_key(|s| (s.page_number, s.segment_index));

    let mut reassembler = Reassembler::default();
    for segment in ordered {
        reassembler.push(segment, &segment.text);
    }
    reassembler.into_text()
}

/// Incremental form of [`reassemble`] for segments that arrive in document order.
#[derive(Debug, Default)]
pub struct Reassembler {
    text: String,
    current_page: Option<usize>,
    block_has_text: bool,
}

impl Reassembler {
    /// Appends `text` in the position of `segment`.
    pub fn push(&mut self, segment: &Segment, text: &str) {
        let text = text.trim();
        if segment.is_start_of_paragraph || self.current_page != Some(segment.page_number) {
            self.block_has_text = false;
        }
        self.current_page = Some(segment.page_number);

        if text.is_empty() {
            return;
        }
        if self.block_has_text {
            self.text.push(' ');
        } else if !self.text.is_empty() {
            self.text.push_str("\n\n");
        }
        self.text.push_str(text);
        self.block_has_text = true;
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(page: usize, index: usize, text: &str, starts: bool) -> Segment {
        Segment {
            id: Segment::make_id(page, index),
            text: text.to_string(),
            page_number: page,
            segment_index: index,
            is_start_of_paragraph: starts,
            is_end_of_paragraph: false,
            special_markers: Vec::new(),
            previous_segment_id: None,
            next_segment_id: None,
            overlap_context: None,
        }
    }

    #[test]
    fn joins_segments_into_paragraph_blocks() {
        let segments = vec![
            seg(0, 0, "Hello world.", true),
            seg(0, 1, "Still here.", false),
            seg(0, 2, "New paragraph.", true),
            seg(1, 0, "Second page.", false),
        ];
        assert_eq!(
            reassemble(&segments),
            "Hello world. Still here.\n\nNew paragraph.\n\nSecond page."
        );
    }

    #[test]
    fn independent_of_input_order() {
        let ordered = vec![
            seg(0, 0, "A.", true),
            seg(0, 1, "B.", false),
            seg(1, 0, "C.", true),
            seg(1, 1, "D.", false),
            seg(2, 0, "E.", true),
        ];
        let mut shuffled = ordered.clone();
        shuffled.reverse();
        shuffled.swap(0, 2);

        assert_eq!(reassemble(&ordered), reassemble(&shuffled));
        assert_eq!(reassemble(&ordered), "A. B.\n\nC. D.\n\nE.");
    }

    #[test]
    fn empty_input_gives_empty_text() {
        assert_eq!(reassemble(&[]), "");
    }

    #[test]
    fn incremental_matches_batch() {
        let segments = vec![
            seg(1, 0, "First.", true),
            seg(1, 1, "  ", false),
            seg(1, 2, "Second.", false),
            seg(1, 3, "Third.", true),
            seg(2, 0, "Fourth.", false),
        ];
        let mut reassembler = Reassembler::default();
        let mut prefixes = Vec::new();
        for segment in &segments {
            reassembler.push(segment, &segment.text);
            prefixes.push(reassembler.text().to_string());
        }

        assert_eq!(prefixes[0], "First.");
        assert_eq!(prefixes[2], "First. Second.");
        assert_eq!(reassembler.into_text(), reassemble(&segments));
    }
}
