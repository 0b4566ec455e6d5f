// ============================================================
// Layer 4 — Text Preprocessor
// ============================================================
// Normalises raw article / summary text before it is split into
// words. The vocabulary is word-level, so anything that would
// create spurious distinct words has to go:
//
//   1. Unicode whitespace variants and control chars → space
//   2. Lowercase
//   3. Literal <pad> <sos> <eos> markers → space, so raw text can
//      never end or pad a sequence early (<unk> is left alone)
//   4. Collapse runs of whitespace (including newlines) into one
//      space and trim the ends
//   5. Optionally keep only the first `max_words` words
//
// Newlines are not preserved: every example is one line of words.

use super::vocab::{EOS, PAD, SOS};

/// Control markers raw text must not smuggle into an id sequence
const RESERVED_MARKERS: [&str; 3] = [PAD, SOS, EOS];

pub struct Preprocessor {
    /// Keep at most this many words (None = no limit)
    max_words: Option<usize>,
}

impl Preprocessor {
    pub fn new() -> Self {
        Self { max_words: None }
    }

    /// Truncate cleaned text to `max_words` words.
    pub fn with_max_words(mut self, max_words: Option<usize>) -> Self {
        self.max_words = max_words;
        self
    }

    /// Clean a raw string into a single lowercase line of words.
    pub fn clean(&self, text: &str) -> String {
        // ── Step 1: Normalise individual characters ───────────────────────────
        let normalised: String = text
            .chars()
            .map(|c| match c {
                '\u{00A0}' | '\u{200B}' | '\u{FEFF}' => ' ',
                c if c.is_control() => ' ',
                c => c,
            })
            .flat_map(char::to_lowercase)
            .collect();
        let normalised = RESERVED_MARKERS
            .iter()
            .fold(normalised, |text, marker| text.replace(marker, " "));

        // ── Step 2: Collapse whitespace, truncate ─────────────────────────────
        let words = normalised.split_whitespace();
        match self.max_words {
            Some(n) => words.take(n).collect::<Vec<_>>().join(" "),
            None => words.collect::<Vec<_>>().join(" "),
        }
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapses_whitespace_and_newlines() {
        let p = Preprocessor::new();
        assert_eq!(p.clean("  hello \n\n  world\t!  "), "hello world !");
    }

    #[test]
    fn test_lowercases() {
        assert_eq!(Preprocessor::new().clean("Police ARREST Man"), "police arrest man");
    }

    #[test]
    fn test_removes_control_and_invisible_chars() {
        let p = Preprocessor::new();
        assert_eq!(p.clean("a\x01b\u{00A0}c\u{200B}d"), "a b c d");
    }

    #[test]
    fn test_truncates_to_max_words() {
        let p = Preprocessor::new().with_max_words(Some(2));
        assert_eq!(p.clean("one two three"), "one two");
    }

    #[test]
    fn test_empty_string() {
        assert_eq!(Preprocessor::new().clean(""), "");
    }

    #[test]
    fn test_strips_reserved_markers() {
        let p = Preprocessor::new();
        assert_eq!(p.clean("the <eos> end <SOS>x<pad>"), "the end x");
        assert_eq!(p.clean("an <unk> word"), "an <unk> word");
    }

    #[test]
    fn test_stray_eos_does_not_cut_the_target_short() {
        use crate::data::vocab::{VocabBuilder, Vocabulary};

        let words: Vec<String> = ["police", "arrest", "man"].iter().map(|w| w.to_string()).collect();
        let vocab = Vocabulary::from_json(&VocabBuilder::tokenizer_json(&words)).unwrap();

        let cleaned = Preprocessor::new().clean("police <eos> arrest man");
        let ids     = vocab.encode_target(&cleaned).unwrap();
        assert_eq!(vocab.to_text(&ids), "police arrest man");
    }
}
