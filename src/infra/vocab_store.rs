// ============================================================
// Layer 6 — Vocabulary Store
// ============================================================
// Persists the source and target vocabularies as tokenizer.json
// documents next to the checkpoint:
//
//   <model_path><prefix>src_vocab.json
//   <model_path><prefix>trg_vocab.json
//
// A resumed run must see exactly the ids the checkpoint was
// trained with, so an existing file is always reloaded instead of
// rebuilt from the (possibly changed) corpus.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tokenizers::Tokenizer;

use crate::data::vocab::{VocabBuilder, Vocabulary};

pub struct VocabStore {
    path: PathBuf,
}

impl VocabStore {
    /// `path` is the full file path, e.g. `models/small_src_vocab.json`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the stored vocabulary, or build one from `texts` and store it.
    pub fn load_or_build<'a>(
        &self,
        texts:     impl IntoIterator<Item = &'a str>,
        max_words: usize,
    ) -> Result<Vocabulary> {
        if self.exists() {
            tracing::info!("Loading existing vocabulary from '{}'", self.path.display());
            self.load()
        } else {
            tracing::info!("Building new vocabulary (max {} words)", max_words);
            self.build_and_save(texts, max_words)
        }
    }

    /// Load a previously saved vocabulary.
    pub fn load(&self) -> Result<Vocabulary> {
        let tokenizer = Tokenizer::from_file(&self.path).map_err(|e| {
            anyhow::anyhow!("Cannot load vocabulary from '{}': {}", self.path.display(), e)
        })?;
        Ok(Vocabulary::from_tokenizer(tokenizer)?)
    }

    /// Build from `texts`, overwriting any stored vocabulary.
    pub fn build_and_save<'a>(
        &self,
        texts:     impl IntoIterator<Item = &'a str>,
        max_words: usize,
    ) -> Result<Vocabulary> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create '{}'", parent.display()))?;
        }

        let words = VocabBuilder::new(max_words).select_words(texts);
        let json  = VocabBuilder::tokenizer_json(&words);

        std::fs::write(&self.path, serde_json::to_string_pretty(&json)?)
            .with_context(|| format!("Cannot write vocabulary '{}'", self.path.display()))?;

        tracing::info!(
            "Vocabulary built with {} words, saved to '{}'",
            words.len(),
            self.path.display()
        );

        // Load back so the in-memory copy is exactly what a resume will see
        self.load()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_then_reload_keeps_ids() {
        let dir   = tempfile::tempdir().unwrap();
        let store = VocabStore::new(dir.path().join("src_vocab.json"));

        let built = store.load_or_build(["b a a", "c a"], 10).unwrap();
        assert!(store.exists());

        // A different corpus must not change the stored ids
        let reloaded = store.load_or_build(["z z z y"], 10).unwrap();
        assert_eq!(built.len(), reloaded.len());
        assert_eq!(
            built.encode_words("a b c").unwrap(),
            reloaded.encode_words("a b c").unwrap()
        );
        assert_eq!(reloaded.encode_words("z").unwrap(), vec![reloaded.unk_id()]);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(VocabStore::new(dir.path().join("nope.json")).load().is_err());
    }
}
