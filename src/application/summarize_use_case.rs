// ============================================================
// Layer 2 — Summarize Use Case
// ============================================================
// Loads everything a finished (or in-progress) run left behind:
//
//   <model_path><prefix>config.json      → architecture
//   <model_path><prefix>src_vocab.json   → source ids
//   <model_path><prefix>trg_vocab.json   → target ids
//   <model_path><prefix>{encoder,decoder}.mpk.gz
//
// and greedy-decodes one input text on the configured device.

use anyhow::{Context, Result};
use burn::tensor::backend::AutodiffBackend;

use crate::application::config::TrainConfig;
use crate::data::vocab::Vocabulary;
use crate::infra::{checkpoint::CheckpointManager, vocab_store::VocabStore};
use crate::ml::{
    backend::{dispatch, resolve_device, BackendTask},
    inferencer::Summarizer,
};

pub struct SummarizeUseCase {
    config:      TrainConfig,
    checkpoints: CheckpointManager,
}

impl SummarizeUseCase {
    pub fn new(model_path: &str, prefix: &str) -> Result<Self> {
        let checkpoints = CheckpointManager::for_prefix(model_path, prefix);
        let mut config  = checkpoints.load_config().with_context(|| {
            format!("No saved config for prefix '{prefix}' in '{model_path}'. Have you run 'train' first?")
        })?;
        // the run may have been moved since it was trained
        config.model_path = model_path.to_string();

        Ok(Self { config, checkpoints })
    }

    pub fn summarize(&self, text: &str, max_len: Option<usize>, disable_accelerator: bool) -> Result<String> {
        let src_vocab = VocabStore::new(self.config.artefact("src_vocab.json")).load()?;
        let trg_vocab = VocabStore::new(self.config.artefact("trg_vocab.json")).load()?;

        let device = resolve_device(self.config.device, disable_accelerator)?;
        let task   = SummarizeTask {
            use_case: self,
            text,
            max_len: max_len.unwrap_or(self.config.max_decode_len),
            src_vocab,
            trg_vocab,
        };
        dispatch(device, task)?
    }
}

struct SummarizeTask<'a> {
    use_case:  &'a SummarizeUseCase,
    text:      &'a str,
    max_len:   usize,
    src_vocab: Vocabulary,
    trg_vocab: Vocabulary,
}

impl BackendTask for SummarizeTask<'_> {
    type Output = Result<String>;

    fn run<B: AutodiffBackend>(self, device: B::Device) -> Result<String> {
        // No gradients needed: load straight onto the inner backend
        let summarizer = Summarizer::<B::InnerBackend>::from_checkpoint(
            &self.use_case.checkpoints,
            &self.use_case.config,
            self.src_vocab,
            self.trg_vocab,
            device,
        )?;
        summarizer.summarize(self.text, self.max_len)
    }
}
