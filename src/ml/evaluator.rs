// ============================================================
// Layer 5 — Held-out Evaluator
// ============================================================
// Runs on the inner backend (model.valid()), so no gradients are
// ever recorded. One call:
//
//   for each of the n_test held-out examples (batch size 1):
//       loss += teacher-forced CE           (same as training)
//       hyps += greedy decode of the example
//       refs += cleaned ground truth
//
//   mean loss  = loss / n_test          (NaN/inf per example → error)
//   score      = scorer.corpus_score(hyps, refs)   ← ONE call
//
// The held-out iterator cycles, so pulling exactly n_test batches
// leaves it where the next call expects it.

use burn::prelude::*;
use rand::rngs::StdRng;

use crate::data::{iterator::BucketIterator, vocab::Vocabulary};
use crate::domain::traits::RewardScorer;
use crate::error::{Result, Seq2SeqError};
use crate::ml::{
    loss::{scalar, supervised_loss},
    model::Seq2Seq,
    sampler::{DecodeStrategy, SequenceSampler},
};

#[derive(Debug, Clone, PartialEq)]
pub struct EvalReport {
    pub mean_loss:  f64,
    pub score:      f64,
    pub n_examples: usize,
    /// (hypothesis, reference) of the first example, for the log
    pub first:      Option<(String, String)>,
}

pub struct Evaluator<'a> {
    sampler: &'a SequenceSampler,
    scorer:  &'a dyn RewardScorer,
    vocab:   &'a Vocabulary,
}

impl<'a> Evaluator<'a> {
    pub fn new(sampler: &'a SequenceSampler, scorer: &'a dyn RewardScorer, vocab: &'a Vocabulary) -> Self {
        Self { sampler, scorer, vocab }
    }

    /// Consume exactly `n_test` batches from `test_iter`. `step` is the
    /// global step reported if a held-out loss is not finite.
    pub fn evaluate<B: Backend>(
        &self,
        model:     &Seq2Seq<B>,
        test_iter: &mut BucketIterator<B>,
        n_test:    usize,
        step:      usize,
        rng:       &mut StdRng,
    ) -> Result<EvalReport> {
        let device = test_iter.device().clone();

        let mut loss_sum   = 0.0f64;
        let mut hypotheses = Vec::with_capacity(n_test);
        let mut references = Vec::with_capacity(n_test);

        for _ in 0..n_test {
            let batch = test_iter
                .next()
                .ok_or_else(|| Seq2SeqError::Data("held-out set is empty".to_string()))?;

            let loss = scalar(supervised_loss(model, &batch, self.vocab.pad_id()));
            if !loss.is_finite() {
                return Err(Seq2SeqError::NonFiniteLoss { step, value: loss });
            }
            loss_sum += loss as f64;

            // first sequence of the batch only
            let Some(pair) = batch.pairs.first() else { continue };
            let greedy = self.sampler.sample(model, &pair.src, DecodeStrategy::Greedy, rng, &device)?;

            hypotheses.push(self.vocab.to_text(&greedy.tokens));
            references.push(self.vocab.to_text(&pair.trg));
        }

        let score = self.scorer.corpus_score(&hypotheses, &references);
        let first = hypotheses.first().cloned().zip(references.first().cloned());

        Ok(EvalReport {
            mean_loss: loss_sum / n_test.max(1) as f64,
            score,
            n_examples: n_test,
            first,
        })
    }
}
