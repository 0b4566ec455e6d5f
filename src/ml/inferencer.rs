// ============================================================
// Layer 5 — Summarizer (inference)
// ============================================================
// Rebuilds the model from the saved config, loads the checkpoint
// pair into it and greedy-decodes raw text:
//
//   text → Preprocessor → src vocab ids + <eos>
//        → SequenceSampler (Greedy, inner backend)
//        → trg vocab clean → string

use anyhow::Result;
use burn::prelude::*;
use rand::{rngs::StdRng, SeedableRng};

use crate::application::config::TrainConfig;
use crate::data::{preprocessor::Preprocessor, vocab::Vocabulary};
use crate::infra::checkpoint::CheckpointManager;
use crate::ml::{
    model::{Seq2Seq, Seq2SeqConfig},
    sampler::{DecodeStrategy, SequenceSampler},
};

pub struct Summarizer<B: Backend> {
    model:        Seq2Seq<B>,
    src_vocab:    Vocabulary,
    trg_vocab:    Vocabulary,
    preprocessor: Preprocessor,
    device:       B::Device,
}

impl<B: Backend> Summarizer<B> {
    pub fn new(
        model:     Seq2Seq<B>,
        cfg:       &TrainConfig,
        src_vocab: Vocabulary,
        trg_vocab: Vocabulary,
        device:    B::Device,
    ) -> Self {
        let preprocessor = Preprocessor::new().with_max_words(cfg.max_src_len);
        Self { model, src_vocab, trg_vocab, preprocessor, device }
    }

    pub fn from_checkpoint(
        ckpt:      &CheckpointManager,
        cfg:       &TrainConfig,
        src_vocab: Vocabulary,
        trg_vocab: Vocabulary,
        device:    B::Device,
    ) -> Result<Self> {
        let model_cfg = Seq2SeqConfig::new(
            src_vocab.len(),
            trg_vocab.len(),
            cfg.encoder_embed_size,
            cfg.encoder_hidden_size,
            cfg.decoder_embed_size,
            cfg.decoder_hidden_size,
        )
        .with_num_layers(cfg.num_layers);

        let model = ckpt.load(model_cfg.init::<B>(&device), &device)?;
        tracing::info!("Model loaded from checkpoint");
        Ok(Self::new(model, cfg, src_vocab, trg_vocab, device))
    }

    pub fn summarize(&self, text: &str, max_len: usize) -> Result<String> {
        let cleaned = self.preprocessor.clean(text);
        let source  = self.src_vocab.encode_source(&cleaned)?;
        tracing::debug!("Source ids: {:?}", source);

        let sampler = SequenceSampler::new(max_len, self.trg_vocab.sos_id(), self.trg_vocab.eos_id());
        // unused by the greedy path
        let mut rng = StdRng::seed_from_u64(0);
        let decoded = sampler.sample(&self.model, &source, DecodeStrategy::Greedy, &mut rng, &self.device)?;

        Ok(self.trg_vocab.to_text(&decoded.tokens))
    }
}
