use regex::Regex;
use std::sync::LazyLock;

static SENTENCE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?]+\s+").expect("valid sentence regex"));

static PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t\r]*\n").expect("valid paragraph regex"));

static MARKUP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[[^\]]*\]|\{[^}]*\}|\([^)]*\)|#\w+").expect("valid markup regex")
});

/// Splits text into punctuation-terminated sentences with internal whitespace collapsed.
///
/// A sentence ends at `.`, `!` or `?` followed by whitespace; trailing text without
/// terminal punctuation becomes the last sentence.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut start = 0;

    for m in SENTENCE_END.find_iter(text) {
        let punct_end = m.start() + m.as_str().trim_end().len();
        push_normalized(&mut sentences, &text[start..punct_end]);
        start = m.end();
    }
    push_normalized(&mut sentences, &text[start..]);

    sentences
}

fn push_normalized(sentences: &mut Vec<String>, raw: &str) {
    let normalized = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if !normalized.is_empty() {
        sentences.push(normalized);
    }
}

/// Splits a page into blank-line separated paragraphs.
///
/// Blocks shorter than `min_len` characters (stray headers, page numbers) are
/// folded into the following paragraph, or the previous one at end of page.
pub fn split_paragraphs(text: &str, min_len: usize) -> Vec<String> {
    let mut paragraphs: Vec<String> = Vec::new();
    let mut pending = String::new();

    for block in PARAGRAPH_BREAK.split(text) {
        let block = block.trim();
        if block.is_empty() {
            continue;
        }

        if !pending.is_empty() {
            pending.push(' ');
        }
        pending.push_str(block);

        if pending.chars().count() >= min_len {
            paragraphs.push(std::mem::take(&mut pending));
        }
    }

    if !pending.is_empty() {
        match paragraphs.last_mut() {
            Some(last) => {
                last.push(' ');
                last.push_str(&pending);
            }
            None => paragraphs.push(pending),
        }
    }

    paragraphs
}

/// Bracketed, braced, parenthesised and hash-tagged spans in order of appearance.
pub fn extract_markers(text: &str) -> Vec<String> {
    MARKUP
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_terminal_punctuation() {
        let sentences = split_sentences("Hello there. How are you? Fine!  Thanks");
        assert_eq!(sentences, vec!["Hello there.", "How are you?", "Fine!", "Thanks"]);
    }

    #[test]
    fn keeps_decimal_numbers_intact() {
        let sentences = split_sentences("Pi is 3.14 roughly. Done.");
        assert_eq!(sentences, vec!["Pi is 3.14 roughly.", "Done."]);
    }

    #[test]
    fn collapses_line_breaks_inside_sentences() {
        let sentences = split_sentences("A sentence\nwrapped over\nlines. Next one.");
        assert_eq!(sentences, vec!["A sentence wrapped over lines.", "Next one."]);
    }

    #[test]
    fn empty_text_has_no_sentences() {
        assert!(split_sentences("   \n ").is_empty());
    }

    #[test]
    fn short_blocks_fold_into_next_paragraph() {
        let text = "Chapter 1\n\nThe story begins here and goes on.\n\nSecond paragraph is long enough.";
        let paragraphs = split_paragraphs(text, 20);
        assert_eq!(
            paragraphs,
            vec![
                "Chapter 1 The story begins here and goes on.",
                "Second paragraph is long enough.",
            ]
        );
    }

    #[test]
    fn trailing_short_block_joins_previous_paragraph() {
        let paragraphs = split_paragraphs("A paragraph that is long enough.\n\n12", 20);
        assert_eq!(paragraphs, vec!["A paragraph that is long enough. 12"]);
    }

    #[test]
    fn extracts_markup_markers() {
        let markers = extract_markers("See [1] and {var} (note) for #rust details.");
        assert_eq!(markers, vec!["[1]", "{var}", "(note)", "#rust"]);
    }
}
