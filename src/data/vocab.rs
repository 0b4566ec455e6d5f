// ============================================================
// Layer 4 — Vocabulary
// ============================================================
// Bidirectional word <-> id mapping, built once from the training
// texts and shared read-only by the sampler, trainer and evaluator.
//
// Backed by a HuggingFace `tokenizers` WordLevel model so the
// vocabulary can be written to / read from the standard
// tokenizer.json format (see infra::vocab_store).
//
// Reserved ids (fixed, always present):
//   <unk> = 0   <pad> = 1   <sos> = 2   <eos> = 3
// followed by the most frequent words, frequency-descending with
// ties broken alphabetically, capped at `max_words`.

use std::collections::HashMap;

use serde_json::json;
use tokenizers::Tokenizer;

use crate::error::{Result, Seq2SeqError};

pub const UNK: &str = "<unk>";
pub const PAD: &str = "<pad>";
pub const SOS: &str = "<sos>";
pub const EOS: &str = "<eos>";

const SPECIALS: [&str; 4] = [UNK, PAD, SOS, EOS];

// ─── Builder ──────────────────────────────────────────────────────────────────
/// Counts words over a corpus and emits a WordLevel tokenizer.
pub struct VocabBuilder {
    max_words: usize,
}

impl VocabBuilder {
    pub fn new(max_words: usize) -> Self {
        Self { max_words }
    }

    /// The kept words in id order (specials excluded).
    pub fn select_words<'a>(&self, texts: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        let mut freq: HashMap<&str, usize> = HashMap::new();
        for text in texts {
            for word in text.split_whitespace() {
                if !SPECIALS.contains(&word) {
                    *freq.entry(word).or_insert(0) += 1;
                }
            }
        }

        let mut words: Vec<(&str, usize)> = freq.into_iter().collect();
        words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        words.truncate(self.max_words);
        words.into_iter().map(|(w, _)| w.to_string()).collect()
    }

    /// tokenizer.json document for the given word list.
    pub fn tokenizer_json(words: &[String]) -> serde_json::Value {
        let mut vocab = serde_json::Map::new();
        for (id, token) in SPECIALS.iter().enumerate() {
            vocab.insert(token.to_string(), json!(id));
        }
        for (offset, word) in words.iter().enumerate() {
            vocab.insert(word.clone(), json!(SPECIALS.len() + offset));
        }

        let added_tokens: Vec<serde_json::Value> = SPECIALS
            .iter()
            .enumerate()
            .map(|(id, token)| {
                json!({
                    "id": id, "content": token, "single_word": false,
                    "lstrip": false, "rstrip": false, "normalized": false, "special": true
                })
            })
            .collect();

        json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": added_tokens,
            "normalizer": null,
            "pre_tokenizer": { "type": "WhitespaceSplit" },
            "post_processor": null,
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": vocab,
                "unk_token": UNK
            }
        })
    }

    /// Build an in-memory vocabulary from a corpus.
    pub fn build<'a>(&self, texts: impl IntoIterator<Item = &'a str>) -> Result<Vocabulary> {
        let words = self.select_words(texts);
        Vocabulary::from_json(&Self::tokenizer_json(&words))
    }
}

// ─── Vocabulary ───────────────────────────────────────────────────────────────
#[derive(Clone)]
pub struct Vocabulary {
    tokenizer: Tokenizer,
    unk: u32,
    pad: u32,
    sos: u32,
    eos: u32,
}

impl std::fmt::Debug for Vocabulary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vocabulary").field("len", &self.len()).finish()
    }
}

impl Vocabulary {
    /// Wrap a tokenizer; fails if any reserved symbol is missing.
    pub fn from_tokenizer(tokenizer: Tokenizer) -> Result<Self> {
        let id = |token: &str| {
            tokenizer.token_to_id(token).ok_or_else(|| {
                Seq2SeqError::Vocabulary(format!("reserved symbol {token} is missing"))
            })
        };
        Ok(Self {
            unk: id(UNK)?,
            pad: id(PAD)?,
            sos: id(SOS)?,
            eos: id(EOS)?,
            tokenizer,
        })
    }

    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        let tokenizer: Tokenizer = value
            .to_string()
            .parse()
            .map_err(|e| Seq2SeqError::Vocabulary(format!("invalid tokenizer JSON: {e}")))?;
        Self::from_tokenizer(tokenizer)
    }

    /// Number of ids, reserved symbols included.
    pub fn len(&self) -> usize {
        self.tokenizer.get_vocab_size(true)
    }

    pub fn unk_id(&self) -> u32 { self.unk }
    pub fn pad_id(&self) -> u32 { self.pad }
    pub fn sos_id(&self) -> u32 { self.sos }
    pub fn eos_id(&self) -> u32 { self.eos }

    /// Ids of the words in `text`, unknown words mapped to <unk>.
    pub fn encode_words(&self, text: &str) -> Result<Vec<u32>> {
        let encoding = self
            .tokenizer
            .encode(text, false)
            .map_err(|e| Seq2SeqError::Vocabulary(format!("encode failed: {e}")))?;
        Ok(encoding.get_ids().to_vec())
    }

    /// Encoder input: `words <eos>` (never empty).
    pub fn encode_source(&self, text: &str) -> Result<Vec<u32>> {
        let mut ids = self.encode_words(text)?;
        ids.push(self.eos);
        Ok(ids)
    }

    /// Decoder sequence: `<sos> words <eos>`.
    pub fn encode_target(&self, text: &str) -> Result<Vec<u32>> {
        let mut ids = vec![self.sos];
        ids.extend(self.encode_words(text)?);
        ids.push(self.eos);
        Ok(ids)
    }

    pub fn token(&self, id: u32) -> String {
        self.tokenizer
            .id_to_token(id)
            .unwrap_or_else(|| UNK.to_string())
    }

    /// Words up to the first <eos>, with <sos> and <pad> dropped.
    pub fn clean(&self, ids: &[u32]) -> Vec<String> {
        ids.iter()
            .take_while(|&&id| id != self.eos)
            .filter(|&&id| id != self.sos && id != self.pad)
            .map(|&id| self.token(id))
            .collect()
    }

    /// `clean` joined into a single space-separated string.
    pub fn to_text(&self, ids: &[u32]) -> String {
        self.clean(ids).join(" ")
    }
}
