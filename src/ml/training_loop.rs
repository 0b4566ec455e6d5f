// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Drives the whole run, strictly sequentially:
//
//   for epoch in 0..num_epochs
//     for j in 0..batch_per_epoch          i = batch_per_epoch*epoch + j + 1
//       batch  ← train iterator (cycles)
//       model  ← BatchTrainer::train_batch
//       i % save_step == 0 → save encoder+decoder pair and history
//       i % log_step  == 0 → mean train loss + qualitative sample
//       i % test_step == 0 → held-out evaluation
//
// There is no early stopping: the full n_iters budget always runs.
// The cadence uses the run-local iteration number `i`; the history
// keeps the global step, which continues across resumed runs.

use std::sync::Arc;

use burn::{module::AutodiffModule, optim::Optimizer, tensor::backend::AutodiffBackend};
use rand::{rngs::StdRng, Rng};

use crate::application::config::TrainConfig;
use crate::data::{dataset::EncodedPair, iterator::BucketIterator, vocab::Vocabulary};
use crate::domain::{history::TrainingHistory, traits::RewardScorer};
use crate::error::Seq2SeqError;
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::{EvalRow, MetricsLogger},
};
use crate::ml::{
    evaluator::Evaluator,
    model::Seq2Seq,
    sampler::{DecodeStrategy, SequenceSampler},
    trainer::{BatchTrainer, StepOutcome},
};

// ─── Schedule ─────────────────────────────────────────────────────────────────
/// How many iterations the run consists of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub n_train:         usize,
    pub num_epochs:      usize,
    pub batch_per_epoch: usize,
    pub n_iters:         usize,
}

impl Schedule {
    pub fn new(n_train: usize, batch_size: usize, num_epochs: usize) -> Self {
        let batch_per_epoch = n_train.div_ceil(batch_size.max(1));
        Self { n_train, num_epochs, batch_per_epoch, n_iters: batch_per_epoch * num_epochs }
    }
}

/// Which side effects fire after iteration `i`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    pub log_step:  usize,
    pub save_step: usize,
    pub test_step: usize,
}

impl Cadence {
    pub fn from_config(cfg: &TrainConfig) -> Self {
        Self { log_step: cfg.log_step, save_step: cfg.save_step, test_step: cfg.test_step }
    }

    pub fn log(&self, i: usize) -> bool  { i % self.log_step == 0 }
    pub fn save(&self, i: usize) -> bool { i % self.save_step == 0 }
    pub fn test(&self, i: usize) -> bool { i % self.test_step == 0 }
}

// ─── Running statistics ───────────────────────────────────────────────────────
/// Loss / reward sums since the last reset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunningStats {
    loss_sum:     f64,
    loss_count:   usize,
    reward_sum:   f64,
    reward_count: usize,
}

impl RunningStats {
    pub fn add(&mut self, outcome: &StepOutcome) {
        self.loss_sum   += outcome.ce_loss as f64;
        self.loss_count += 1;
        if let Some(reward) = outcome.mean_reward {
            self.reward_sum   += reward;
            self.reward_count += 1;
        }
    }

    pub fn mean_loss(&self) -> f64 {
        if self.loss_count == 0 { 0.0 } else { self.loss_sum / self.loss_count as f64 }
    }

    pub fn mean_reward(&self) -> f64 {
        if self.reward_count == 0 { 0.0 } else { self.reward_sum / self.reward_count as f64 }
    }

    /// Current means, then reset.
    pub fn take(&mut self) -> (f64, f64) {
        let means = (self.mean_loss(), self.mean_reward());
        *self = Self::default();
        means
    }
}

// ─── Training loop ────────────────────────────────────────────────────────────
pub struct TrainingLoop<'a, B: AutodiffBackend, O: Optimizer<Seq2Seq<B>, B>> {
    pub schedule:    Schedule,
    pub cadence:     Cadence,
    pub trainer:     BatchTrainer<B, O>,
    pub train_iter:  BucketIterator<B>,
    pub test_iter:   BucketIterator<B::InnerBackend>,
    pub n_test:      usize,
    pub src_vocab:   &'a Vocabulary,
    pub trg_vocab:   &'a Vocabulary,
    pub sampler:     SequenceSampler,
    pub scorer:      Arc<dyn RewardScorer>,
    pub checkpoints: &'a CheckpointManager,
    pub metrics:     Option<MetricsLogger>,
    pub history:     TrainingHistory,
    pub rng:         StdRng,
}

impl<'a, B, O> TrainingLoop<'a, B, O>
where
    B: AutodiffBackend,
    O: Optimizer<Seq2Seq<B>, B>,
{
    /// Run every iteration of the schedule. Returns the trained model
    /// and the updated history.
    pub fn run(mut self, mut model: Seq2Seq<B>) -> anyhow::Result<(Seq2Seq<B>, TrainingHistory)> {
        let Schedule { num_epochs, batch_per_epoch, n_iters, .. } = self.schedule;
        tracing::info!("Start training... {} iterations...", n_iters);

        let mut log_stats  = RunningStats::default();
        let mut eval_stats = RunningStats::default();
        let mut last_saved = 0;

        for epoch in 0..num_epochs {
            for j in 0..batch_per_epoch {
                let i = batch_per_epoch * epoch + j + 1;

                let batch = self
                    .train_iter
                    .next()
                    .ok_or_else(|| Seq2SeqError::Data("training set is empty".to_string()))?;

                let (next, outcome) = self.trainer.train_batch(model, &batch, self.trg_vocab, i)?;
                model = next;
                self.history.global_step += 1;
                log_stats.add(&outcome);
                eval_stats.add(&outcome);

                // ── Saving ───────────────────────────────────────────────────
                if self.cadence.save(i) {
                    tracing::info!("Saving models...");
                    self.save(&model)?;
                    last_saved = i;
                }

                // ── Logging ──────────────────────────────────────────────────
                if self.cadence.log(i) {
                    let (train_loss, _) = log_stats.take();
                    tracing::info!(
                        "epoch {}/{}, iteration {}/{} (global step {})",
                        epoch, num_epochs, i, n_iters, self.history.global_step
                    );
                    tracing::info!("\tTrain loss: {:.4}", train_loss);
                    self.log_critic(&outcome);
                    self.log_random_sample(&model, &batch.pairs)?;
                }

                // ── Evaluating ───────────────────────────────────────────────
                if self.cadence.test(i) {
                    self.evaluate(&model, &mut eval_stats)?;
                }
            }
        }

        if last_saved != n_iters {
            tracing::info!("Saving final models...");
            self.save(&model)?;
        }

        tracing::info!("Training complete!");
        Ok((model, self.history))
    }

    fn save(&self, model: &Seq2Seq<B>) -> anyhow::Result<()> {
        self.checkpoints.save(model)?;
        self.checkpoints.save_history(&self.history)?;
        Ok(())
    }

    fn log_critic(&self, outcome: &StepOutcome) {
        let (Some(sc), Some(last)) = (outcome.sc_loss, outcome.last.as_ref()) else { return };
        tracing::info!("CE: {:.4}", outcome.ce_loss);
        tracing::info!("SC: {:.4}", sc);
        tracing::info!("GT: {}", last.truth);
        tracing::info!("greedy: {:.4}, {}", last.greedy_score, last.greedy);
        tracing::info!("sample: {:.4}, {}", last.sample_score, last.sample);
    }

    /// Greedy-decode one random example of the current batch.
    fn log_random_sample(
        &mut self,
        model: &Seq2Seq<B>,
        pairs: &[EncodedPair],
    ) -> anyhow::Result<()> {
        if pairs.is_empty() {
            return Ok(());
        }
        let pair   = &pairs[self.rng.gen_range(0..pairs.len())];
        let valid  = model.valid();
        let device = self.test_iter.device().clone();
        let greedy = self.sampler.sample(&valid, &pair.src, DecodeStrategy::Greedy, &mut self.rng, &device)?;

        tracing::info!("> {}", self.src_vocab.to_text(&pair.src));
        tracing::info!("= {}", self.trg_vocab.to_text(&pair.trg));
        tracing::info!("< {}", self.trg_vocab.to_text(&greedy.tokens));
        Ok(())
    }

    fn evaluate(&mut self, model: &Seq2Seq<B>, eval_stats: &mut RunningStats) -> anyhow::Result<()> {
        if self.n_test == 0 {
            tracing::warn!("No held-out examples, skipping evaluation");
            return Ok(());
        }

        let valid  = model.valid();
        let report = Evaluator::new(&self.sampler, self.scorer.as_ref(), self.trg_vocab)
            .evaluate(&valid, &mut self.test_iter, self.n_test, self.history.global_step, &mut self.rng)?;

        tracing::info!("Test loss: {:.4}", report.mean_loss);
        tracing::info!("Test {}: {:.4}", self.scorer.name(), report.score);
        if let Some((hyp, reference)) = &report.first {
            tracing::debug!("first held-out example: '{}' vs '{}'", hyp, reference);
        }

        let (train_loss, rl_score) = eval_stats.take();
        self.history.record_eval(report.mean_loss, rl_score, report.score);

        if let Some(metrics) = &self.metrics {
            metrics.log(&EvalRow::new(self.history.global_step, train_loss, report.mean_loss, report.score))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::config::{tiny, SelfCriticalWeight};
    use crate::data::{batcher::Seq2SeqBatcher, dataset::Seq2SeqDataset, vocab::VocabBuilder};
    use crate::infra::rouge::Rouge1;
    use crate::ml::model::Seq2SeqConfig;
    use burn::backend::{Autodiff, NdArray};
    use burn::optim::AdamConfig;
    use rand::SeedableRng;

    type TB = Autodiff<NdArray>;

    #[test]
    fn test_three_examples_batch_two_one_epoch() {
        let s = Schedule::new(3, 2, 1);
        assert_eq!(s.batch_per_epoch, 2);
        assert_eq!(s.n_iters, 2);
    }

    #[test]
    fn test_schedule_exact_division() {
        let s = Schedule::new(8, 4, 3);
        assert_eq!(s.batch_per_epoch, 2);
        assert_eq!(s.n_iters, 6);
    }

    #[test]
    fn test_cadence() {
        let c = Cadence { log_step: 2, save_step: 3, test_step: 6 };
        let logs: Vec<usize> = (1..=6).filter(|&i| c.log(i)).collect();
        assert_eq!(logs, vec![2, 4, 6]);
        assert!(c.save(3) && !c.save(4));
        assert!(c.test(6) && !c.test(3));
    }

    #[test]
    fn test_running_stats_reset_after_take() {
        let mut stats = RunningStats::default();
        let outcome = |ce: f32, reward: Option<f64>| StepOutcome {
            loss: ce, ce_loss: ce, sc_loss: None, mean_reward: reward, last: None,
        };
        stats.add(&outcome(2.0, None));
        stats.add(&outcome(4.0, Some(0.5)));

        assert_eq!(stats.take(), (3.0, 0.5));
        assert_eq!(stats, RunningStats::default());
    }

    #[test]
    fn test_full_run_saves_and_counts_global_steps() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = tiny();
        cfg.model_path = dir.path().to_string_lossy().into_owned();
        cfg.batch_size = 2;
        cfg.num_epochs = 1;
        cfg.log_step   = 1;
        cfg.save_step  = 5;
        cfg.test_step  = 1;

        let words: Vec<String> = ["x", "y", "z"].iter().map(|w| w.to_string()).collect();
        let vocab = Vocabulary::from_json(&VocabBuilder::tokenizer_json(&words)).unwrap();
        let pairs: Vec<EncodedPair> = ["x y", "y z", "z x"]
            .iter()
            .map(|t| EncodedPair { src: vocab.encode_source(t).unwrap(), trg: vocab.encode_target(t).unwrap() })
            .collect();
        let dataset = Arc::new(Seq2SeqDataset::new(pairs));

        let device = burn::backend::ndarray::NdArrayDevice::Cpu;
        let model: Seq2Seq<TB> = Seq2SeqConfig::new(vocab.len(), vocab.len(), 4, 6, 4, 6).init(&device);
        let sampler = SequenceSampler::new(4, vocab.sos_id(), vocab.eos_id());
        let scorer: Arc<dyn RewardScorer> = Arc::new(Rouge1);
        let checkpoints = CheckpointManager::new(&cfg);

        let training = TrainingLoop {
            schedule:    Schedule::new(3, cfg.batch_size, cfg.num_epochs),
            cadence:     Cadence::from_config(&cfg),
            trainer:     BatchTrainer::new(
                AdamConfig::new().init::<TB, Seq2Seq<TB>>(),
                cfg.learning_rate,
                SelfCriticalWeight::new(0.5).unwrap(),
                sampler.clone(),
                scorer.clone(),
                StdRng::seed_from_u64(1),
                device.clone(),
            ),
            train_iter:  BucketIterator::shuffled(
                dataset.clone(), Seq2SeqBatcher::new(device.clone(), vocab.pad_id()), cfg.batch_size, 1,
            ),
            test_iter:   BucketIterator::sequential(dataset, Seq2SeqBatcher::new(device.clone(), vocab.pad_id()), 1),
            n_test:      3,
            src_vocab:   &vocab,
            trg_vocab:   &vocab,
            sampler,
            scorer,
            checkpoints: &checkpoints,
            metrics:     Some(MetricsLogger::new(cfg.artefact("metrics.csv")).unwrap()),
            history:     TrainingHistory { global_step: 10, ..Default::default() },
            rng:         StdRng::seed_from_u64(2),
        };

        let (_, history) = training.run(model).unwrap();

        assert_eq!(history.global_step, 12);
        assert_eq!(history.steps, vec![11, 12]);
        // never hit save_step, so the final save wrote the pair
        assert!(checkpoints.encoder_file().is_file());
        assert!(checkpoints.decoder_file().is_file());
        assert_eq!(checkpoints.load_history().unwrap(), history);

        let csv = std::fs::read_to_string(cfg.artefact("metrics.csv")).unwrap();
        assert_eq!(csv.lines().count(), 3);
    }
}
