// ============================================================
// Layer 3 — TextPair Domain Type
// ============================================================
// One training example before tokenisation: the text to be
// summarised and its reference summary. This is the shape of one
// line in train.jsonl / test.jsonl.

use serde::{Deserialize, Serialize};

/// A raw source/target pair as it appears on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextPair {
    /// The text the encoder reads (e.g. an article)
    pub src: String,

    /// The reference output the decoder should produce (e.g. a headline)
    pub trg: String,
}

impl TextPair {
    pub fn new(src: impl Into<String>, trg: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            trg: trg.into(),
        }
    }

    /// A pair is usable only if both sides contain at least one word.
    pub fn is_usable(&self) -> bool {
        !self.src.trim().is_empty() && !self.trg.trim().is_empty()
    }
}
