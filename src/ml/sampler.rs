// ============================================================
// Layer 5 — Sequence Sampler
// ============================================================
// Autoregressive decoding of ONE source sequence:
//
//   1. encode the source once
//   2. feed <sos>, get a distribution over the target vocabulary
//   3. pick a token (argmax, or draw from the categorical)
//   4. feed it back, repeat until <eos> or `max_len` tokens
//
// The log-probability of every picked token is kept as a tensor so
// that, on an autodiff backend, Σ log p carries the gradient the
// self-critical term needs. Greedy decodes are run on the inner
// backend (model.valid()), so nothing is recorded for them.
//
// Token choice happens on the host: the step's log-probs are read
// back once and the argmax / WeightedIndex draw is done in Rust.

use burn::{
    prelude::*,
    tensor::{activation::log_softmax, TensorData},
};
use rand::{distributions::WeightedIndex, prelude::Distribution, Rng};

use crate::data::batcher::pad_to_tensor;
use crate::error::{Result, Seq2SeqError};
use crate::ml::model::Seq2Seq;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStrategy {
    /// argmax at every step; deterministic
    Greedy,
    /// draw from softmax(logits) at every step
    Sample,
}

/// Result of one decode.
#[derive(Debug, Clone)]
pub struct Decoded<B: Backend> {
    /// Generated ids, including the closing <eos> if one was produced
    pub tokens:    Vec<u32>,
    /// log p of each generated id — [tokens.len()]
    pub log_probs: Tensor<B, 1>,
}

impl<B: Backend> Decoded<B> {
    /// Σ log p over the whole decode — [1]
    pub fn log_prob_sum(&self) -> Tensor<B, 1> {
        self.log_probs.clone().sum()
    }
}

#[derive(Debug, Clone)]
pub struct SequenceSampler {
    max_len: usize,
    sos:     u32,
    eos:     u32,
}

impl SequenceSampler {
    pub fn new(max_len: usize, sos: u32, eos: u32) -> Self {
        Self { max_len: max_len.max(1), sos, eos }
    }

    /// Decode `source` (unpadded ids, length ≥ 1).
    pub fn sample<B: Backend, R: Rng>(
        &self,
        model:    &Seq2Seq<B>,
        source:   &[u32],
        strategy: DecodeStrategy,
        rng:      &mut R,
        device:   &B::Device,
    ) -> Result<Decoded<B>> {
        if source.is_empty() {
            return Err(Seq2SeqError::Sampling("source sequence is empty".to_string()));
        }

        let src     = pad_to_tensor::<B>(&[source], self.eos, device);
        let encoded = model.encoder.forward(src, &[source.len()]);
        let mut state = model.decoder.init_state(&encoded);

        let mut previous  = self.sos;
        let mut tokens    = Vec::with_capacity(self.max_len);
        let mut log_probs = Vec::with_capacity(self.max_len);

        for _ in 0..self.max_len {
            let input = Tensor::<B, 1, Int>::from_data(TensorData::new(vec![previous as i32], [1]), device);
            let (logits, next) = model.decoder.step(input, state, &encoded);
            state = next;

            let step_log_probs = log_softmax(logits, 1); // [1, vocab]
            let host: Vec<f32> = step_log_probs.clone().into_data().iter::<f32>().collect();

            let picked = match strategy {
                DecodeStrategy::Greedy => argmax(&host),
                DecodeStrategy::Sample => draw(&host, rng)?,
            };

            log_probs.push(step_log_probs.slice([0..1, picked..picked + 1]).reshape([1]));
            tokens.push(picked as u32);

            if picked as u32 == self.eos {
                break;
            }
            previous = picked as u32;
        }

        Ok(Decoded { tokens, log_probs: Tensor::cat(log_probs, 0) })
    }
}

/// Index of the first maximum.
fn argmax(values: &[f32]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

fn draw<R: Rng>(log_probs: &[f32], rng: &mut R) -> Result<usize> {
    let weights = log_probs.iter().map(|lp| lp.exp());
    let dist = WeightedIndex::new(weights)
        .map_err(|e| Seq2SeqError::Sampling(format!("invalid categorical distribution: {e}")))?;
    Ok(dist.sample(rng))
}
