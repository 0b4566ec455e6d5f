// ============================================================
// Layer 5 — Batch Trainer
// ============================================================
// One optimiser step per batch:
//
//   ce   = teacher-forced cross-entropy (padding ignored)
//
//   if λ > 1e-5, for every example in the batch:
//       greedy  = decode(model.valid(), Greedy)   ← baseline, no tape
//       sample  = decode(model,        Sample)    ← log p on the tape
//       reward  = ROUGE(sample, truth) - ROUGE(greedy, truth)
//       sc     -= reward · Σ log p(sample)
//
//   loss = (1-λ)·ce + λ·sc      (λ active)
//        = ce                   (otherwise; sc is never built)
//
//   backward → GradientsParams → Adam step over encoder+decoder
//
// Examples are handled one at a time in an explicit loop; nothing
// is shared between iterations except the RNG and the running sum.
//
// Reference: Rennie et al. (2017) Self-critical Sequence Training
//            Williams (1992) REINFORCE

use std::sync::Arc;

use burn::{
    module::AutodiffModule,
    optim::{GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use rand::rngs::StdRng;

use crate::application::config::SelfCriticalWeight;
use crate::data::{batcher::Seq2SeqBatch, dataset::EncodedPair, vocab::Vocabulary};
use crate::domain::traits::RewardScorer;
use crate::error::{Result, Seq2SeqError};
use crate::ml::{
    loss::{scalar, supervised_loss},
    model::Seq2Seq,
    sampler::{DecodeStrategy, SequenceSampler},
};

/// The strings and scores of one self-critical example, for logging.
#[derive(Debug, Clone, PartialEq)]
pub struct CriticExample {
    pub truth:        String,
    pub greedy:       String,
    pub sample:       String,
    pub greedy_score: f64,
    pub sample_score: f64,
}

impl CriticExample {
    pub fn reward(&self) -> f64 {
        self.sample_score - self.greedy_score
    }
}

/// What one trained batch reports back to the loop.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    /// Combined loss the optimiser stepped on
    pub loss:        f32,
    pub ce_loss:     f32,
    /// None when the self-critical branch was skipped
    pub sc_loss:     Option<f32>,
    /// Mean reward over the batch (self-critical branch only)
    pub mean_reward: Option<f64>,
    /// Last example of the batch (self-critical branch only)
    pub last:        Option<CriticExample>,
}

/// Σ over examples of -reward · Σ log p, plus what the loop logs.
struct CriticSum<B: Backend> {
    loss:       Tensor<B, 1>,
    reward_sum: f64,
    count:      usize,
    last:       Option<CriticExample>,
}

pub struct BatchTrainer<B: AutodiffBackend, O: Optimizer<Seq2Seq<B>, B>> {
    optimizer:     O,
    learning_rate: f64,
    self_critical: SelfCriticalWeight,
    sampler:       SequenceSampler,
    scorer:        Arc<dyn RewardScorer>,
    rng:           StdRng,
    device:        B::Device,
}

impl<B, O> BatchTrainer<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<Seq2Seq<B>, B>,
{
    pub fn new(
        optimizer:     O,
        learning_rate: f64,
        self_critical: SelfCriticalWeight,
        sampler:       SequenceSampler,
        scorer:        Arc<dyn RewardScorer>,
        rng:           StdRng,
        device:        B::Device,
    ) -> Self {
        Self { optimizer, learning_rate, self_critical, sampler, scorer, rng, device }
    }

    /// The loss this batch would be stepped on, without stepping.
    /// Returns the combined loss tensor (still on the tape) and the report.
    pub fn batch_loss(
        &mut self,
        model:     &Seq2Seq<B>,
        batch:     &Seq2SeqBatch<B>,
        trg_vocab: &Vocabulary,
        step:      usize,
    ) -> Result<(Tensor<B, 1>, StepOutcome)> {
        // ── Supervised term ──────────────────────────────────────────────────
        let ce      = supervised_loss(model, batch, trg_vocab.pad_id());
        let ce_host = scalar(ce.clone());
        if !ce_host.is_finite() {
            return Err(Seq2SeqError::NonFiniteLoss { step, value: ce_host });
        }

        if !self.self_critical.is_active() {
            let outcome = StepOutcome {
                loss: ce_host, ce_loss: ce_host, sc_loss: None, mean_reward: None, last: None,
            };
            return Ok((ce, outcome));
        }

        // ── Self-critical term ───────────────────────────────────────────────
        let critic  = self.self_critical_loss(model, &batch.pairs, trg_vocab)?;
        let lambda  = self.self_critical.value();
        let sc_host = scalar(critic.loss.clone());
        let loss    = ce.mul_scalar(1.0 - lambda) + critic.loss.mul_scalar(lambda);

        let outcome = StepOutcome {
            loss:        scalar(loss.clone()),
            ce_loss:     ce_host,
            sc_loss:     Some(sc_host),
            mean_reward: Some(critic.reward_sum / critic.count.max(1) as f64),
            last:        critic.last,
        };
        Ok((loss, outcome))
    }

    /// Compute the loss, backpropagate it and apply one optimiser step.
    pub fn train_batch(
        &mut self,
        model:     Seq2Seq<B>,
        batch:     &Seq2SeqBatch<B>,
        trg_vocab: &Vocabulary,
        step:      usize,
    ) -> Result<(Seq2Seq<B>, StepOutcome)> {
        let (loss, outcome) = self.batch_loss(&model, batch, trg_vocab, step)?;

        let grads = loss.backward();
        let grads = GradientsParams::from_grads(grads, &model);
        let model = self.optimizer.step(self.learning_rate, model, grads);

        Ok((model, outcome))
    }

    fn self_critical_loss(
        &mut self,
        model:     &Seq2Seq<B>,
        pairs:     &[EncodedPair],
        trg_vocab: &Vocabulary,
    ) -> Result<CriticSum<B>> {
        // Greedy baseline runs without the tape
        let baseline_model = model.valid();
        let inner_device   = self.device.clone();

        let mut sum = CriticSum {
            loss:       Tensor::zeros([1], &self.device),
            reward_sum: 0.0,
            count:      0,
            last:       None,
        };

        for pair in pairs {
            let greedy = self.sampler.sample(
                &baseline_model, &pair.src, DecodeStrategy::Greedy, &mut self.rng, &inner_device,
            )?;
            let sample = self.sampler.sample(
                model, &pair.src, DecodeStrategy::Sample, &mut self.rng, &self.device,
            )?;

            let example = self.score_example(trg_vocab, &pair.trg, &greedy.tokens, &sample.tokens);
            let reward  = example.reward();

            // Equal scores: no contribution and no gradient
            if reward != 0.0 {
                sum.loss = sum.loss - sample.log_prob_sum().mul_scalar(reward);
            }
            sum.reward_sum += reward;
            sum.count      += 1;
            sum.last        = Some(example);
        }

        Ok(sum)
    }

    fn score_example(
        &self,
        trg_vocab: &Vocabulary,
        truth:     &[u32],
        greedy:    &[u32],
        sample:    &[u32],
    ) -> CriticExample {
        let truth  = trg_vocab.to_text(truth);
        let greedy = trg_vocab.to_text(greedy);
        let sample = trg_vocab.to_text(sample);

        CriticExample {
            greedy_score: self.scorer.score(&greedy, &truth),
            sample_score: self.scorer.score(&sample, &truth),
            truth,
            greedy,
            sample,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{batcher::Seq2SeqBatcher, vocab::VocabBuilder};
    use crate::infra::rouge::Rouge1;
    use crate::ml::model::Seq2SeqConfig;
    use burn::backend::{Autodiff, NdArray};
    use burn::data::dataloader::batcher::Batcher;
    use burn::optim::AdamConfig;
    use rand::SeedableRng;

    type TB = Autodiff<NdArray>;

    /// Gives every hypothesis the same score, so every reward is 0.
    struct ConstantScorer;

    impl RewardScorer for ConstantScorer {
        fn score(&self, _: &str, _: &str) -> f64 { 0.7 }
        fn corpus_score(&self, _: &[String], _: &[String]) -> f64 { 0.7 }
        fn name(&self) -> &'static str { "constant" }
    }

    fn vocab() -> Vocabulary {
        let words: Vec<String> = ["the", "cat", "sat", "on", "mat"].iter().map(|w| w.to_string()).collect();
        Vocabulary::from_json(&VocabBuilder::tokenizer_json(&words)).unwrap()
    }

    fn model(vocab: &Vocabulary) -> Seq2Seq<TB> {
        Seq2SeqConfig::new(vocab.len(), vocab.len(), 8, 12, 8, 12).init(&Default::default())
    }

    fn batch(vocab: &Vocabulary) -> Seq2SeqBatch<TB> {
        let pairs = vec![
            EncodedPair { src: vocab.encode_source("the cat sat").unwrap(), trg: vocab.encode_target("cat sat").unwrap() },
            EncodedPair { src: vocab.encode_source("on the mat").unwrap(),  trg: vocab.encode_target("mat").unwrap() },
        ];
        Seq2SeqBatcher::<TB>::new(Default::default(), vocab.pad_id()).batch(pairs)
    }

    /// Scores a hypothesis by its character length, ignoring the reference.
    struct LengthScorer;

    impl RewardScorer for LengthScorer {
        fn score(&self, hyp: &str, _: &str) -> f64 { hyp.len() as f64 / 10.0 }
        fn corpus_score(&self, _: &[String], _: &[String]) -> f64 { 0.0 }
        fn name(&self) -> &'static str { "length" }
    }

    fn trainer(
        lambda: f64,
        scorer: Arc<dyn RewardScorer>,
    ) -> BatchTrainer<TB, impl Optimizer<Seq2Seq<TB>, TB>> {
        seeded_trainer(lambda, scorer, 5)
    }

    fn seeded_trainer(
        lambda: f64,
        scorer: Arc<dyn RewardScorer>,
        seed:   u64,
    ) -> BatchTrainer<TB, impl Optimizer<Seq2Seq<TB>, TB>> {
        BatchTrainer::new(
            AdamConfig::new().init::<TB, Seq2Seq<TB>>(),
            1e-3,
            SelfCriticalWeight::new(lambda).unwrap(),
            SequenceSampler::new(5, 2, 3),
            scorer,
            StdRng::seed_from_u64(seed),
            Default::default(),
        )
    }

    #[test]
    fn test_disabled_branch_is_plain_cross_entropy() {
        let vocab = vocab();
        let model = model(&vocab);
        let batch = batch(&vocab);

        let expected = scalar(supervised_loss(&model, &batch, vocab.pad_id()));
        let mut trainer = trainer(0.0, Arc::new(Rouge1));
        let (loss, outcome) = trainer.batch_loss(&model, &batch, &vocab, 1).unwrap();

        assert_eq!(scalar(loss), expected);
        assert_eq!(outcome.loss, expected);
        assert!(outcome.sc_loss.is_none());
        assert!(outcome.last.is_none());
    }

    #[test]
    fn test_zero_reward_halves_the_supervised_loss() {
        let vocab = vocab();
        let model = model(&vocab);
        let batch = batch(&vocab);

        let ce = scalar(supervised_loss(&model, &batch, vocab.pad_id()));
        let mut trainer = trainer(0.5, Arc::new(ConstantScorer));
        let (loss, outcome) = trainer.batch_loss(&model, &batch, &vocab, 1).unwrap();

        assert_eq!(outcome.sc_loss, Some(0.0));
        assert_eq!(outcome.mean_reward, Some(0.0));
        assert!((scalar(loss) - 0.5 * ce).abs() < 1e-6);
    }

    #[test]
    fn test_identical_decodes_have_zero_reward() {
        let example = CriticExample {
            truth:        "cat sat".to_string(),
            greedy:       "the cat".to_string(),
            sample:       "the cat".to_string(),
            greedy_score: Rouge1.score("the cat", "cat sat"),
            sample_score: Rouge1.score("the cat", "cat sat"),
        };
        assert_eq!(example.reward(), 0.0);
    }

    #[test]
    fn test_self_critical_branch_reports_last_example() {
        let vocab = vocab();
        let model = model(&vocab);
        let batch = batch(&vocab);

        let mut trainer = trainer(0.3, Arc::new(Rouge1));
        let (loss, outcome) = trainer.batch_loss(&model, &batch, &vocab, 1).unwrap();

        assert!(scalar(loss).is_finite());
        let last = outcome.last.unwrap();
        assert_eq!(last.truth, "mat");
    }

    #[test]
    fn test_train_batch_changes_parameters() {
        let vocab = vocab();
        let model = model(&vocab);
        let batch = batch(&vocab);
        let before: Vec<f32> = model.decoder.output.weight.val().into_data().iter::<f32>().collect();

        let mut trainer = trainer(0.0, Arc::new(Rouge1));
        let (model, outcome) = trainer.train_batch(model, &batch, &vocab, 1).unwrap();
        let after: Vec<f32> = model.decoder.output.weight.val().into_data().iter::<f32>().collect();

        assert!(outcome.loss.is_finite());
        assert_ne!(before, after);
    }

    #[test]
    fn test_self_critical_loss_weights_sample_log_probs_by_reward() {
        let vocab   = vocab();
        let model   = model(&vocab);
        let batch   = batch(&vocab);
        let sampler = SequenceSampler::new(5, 2, 3);
        let device  = Default::default();
        let mut saw_reward = false;

        for seed in 0..20 {
            let mut trainer = seeded_trainer(0.5, Arc::new(LengthScorer), seed);
            let (_, outcome) = trainer.batch_loss(&model, &batch, &vocab, 1).unwrap();

            // same draws, same order: greedy (no randomness) then sample
            let mut rng      = StdRng::seed_from_u64(seed);
            let mut expected = 0.0f64;
            for pair in &batch.pairs {
                let greedy = sampler
                    .sample(&model.valid(), &pair.src, DecodeStrategy::Greedy, &mut rng, &device)
                    .unwrap();
                let sample = sampler
                    .sample(&model, &pair.src, DecodeStrategy::Sample, &mut rng, &device)
                    .unwrap();
                let reward = LengthScorer.score(&vocab.to_text(&sample.tokens), "")
                    - LengthScorer.score(&vocab.to_text(&greedy.tokens), "");
                expected -= reward * scalar(sample.log_prob_sum()) as f64;
                saw_reward |= reward != 0.0;
            }

            let sc = outcome.sc_loss.unwrap() as f64;
            assert!(
                (sc - expected).abs() <= 1e-4 * expected.abs().max(1.0),
                "seed {seed}: sc_loss {sc} vs -Σ reward·Σ log p = {expected}"
            );
        }
        assert!(saw_reward);
    }
}
