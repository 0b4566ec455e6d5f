// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates a training run in order:
//
//   Step 1: Validate config + self-critical weight   (Layer 2)
//   Step 2: Resolve the compute device               (Layer 5 - ml)
//   Step 3: Decide load vs fresh start               (Layer 6 - infra)
//   Step 4: Load train / held-out pairs              (Layer 4 - data)
//   Step 5: Clean the text                           (Layer 4 - data)
//   Step 6: Build or reload vocabularies             (Layer 6 - infra)
//   Step 7: Encode datasets                          (Layer 4 - data)
//   Step 8: Save config                              (Layer 6 - infra)
//   Step 9: Run the training loop                    (Layer 5 - ml)
//
// Everything that can reject the run (bad config, missing device,
// half a checkpoint) is checked before any data is touched.

use std::sync::Arc;

use anyhow::{Context, Result};
use burn::{optim::AdamConfig, prelude::*, tensor::backend::AutodiffBackend};
use rand::{rngs::StdRng, SeedableRng};

use crate::application::config::{SelfCriticalWeight, TrainConfig};
use crate::data::{
    batcher::Seq2SeqBatcher,
    dataset::Seq2SeqDataset,
    iterator::BucketIterator,
    loader::JsonlLoader,
    preprocessor::Preprocessor,
    splitter::split_train_test,
    vocab::Vocabulary,
};
use crate::domain::{
    example::TextPair,
    history::TrainingHistory,
    traits::{ExampleSource, RewardScorer},
};
use crate::infra::{
    checkpoint::{CheckpointManager, ResumePlan},
    metrics::MetricsLogger,
    rouge::Rouge1,
    vocab_store::VocabStore,
};
use crate::ml::{
    backend::{dispatch, resolve_device, BackendTask},
    model::{Seq2Seq, Seq2SeqConfig},
    sampler::SequenceSampler,
    trainer::BatchTrainer,
    training_loop::{Cadence, Schedule, TrainingLoop},
};

/// Everything `train` needs from the command line.
#[derive(Debug, Clone)]
pub struct TrainRequest {
    pub config:              TrainConfig,
    pub from_scratch:        bool,
    pub disable_accelerator: bool,
    /// Raw λ; validated in `execute`
    pub self_critical:       f64,
}

pub struct TrainUseCase {
    request: TrainRequest,
}

/// Cleaned, encoded data and the vocabularies it was encoded with.
struct PreparedData {
    train:     Seq2SeqDataset,
    test:      Seq2SeqDataset,
    src_vocab: Vocabulary,
    trg_vocab: Vocabulary,
}

impl TrainUseCase {
    pub fn new(request: TrainRequest) -> Self {
        Self { request }
    }

    pub fn execute(&self) -> Result<TrainingHistory> {
        let cfg = &self.request.config;

        // ── Step 1: Validate ─────────────────────────────────────────────────
        cfg.validate()?;
        let self_critical = SelfCriticalWeight::new(self.request.self_critical)?;
        tracing::info!(
            "Self-critical weight: {} ({})",
            self_critical.value(),
            if self_critical.is_active() { "enabled" } else { "disabled" }
        );

        // ── Step 2: Device ───────────────────────────────────────────────────
        let device = resolve_device(cfg.device, self.request.disable_accelerator)?;

        // ── Step 3: Resume plan ──────────────────────────────────────────────
        let checkpoints = CheckpointManager::new(cfg);
        let plan        = checkpoints.plan(self.request.from_scratch)?;

        // ── Steps 4-7: Data ──────────────────────────────────────────────────
        let data = prepare_data(cfg, plan)?;

        // ── Step 8: Save config for `summarize` ──────────────────────────────
        checkpoints.save_config(cfg)?;

        // ── Step 9: Train ────────────────────────────────────────────────────
        let task = TrainTask { cfg, plan, data, checkpoints: &checkpoints, self_critical };
        dispatch(device, task)?
    }
}

fn prepare_data(cfg: &TrainConfig, plan: ResumePlan) -> Result<PreparedData> {
    // ── Step 4: Load pairs ───────────────────────────────────────────────────
    tracing::info!("Loading data from '{}'...", cfg.data_dir);
    let loader    = JsonlLoader::new(&cfg.data_dir);
    let train_raw = loader.load_train()?;
    let (train_raw, test_raw) = match loader.load_test()? {
        Some(test) => (train_raw, test),
        None => {
            tracing::info!("No held-out file, holding out {:.0}% of training pairs", cfg.test_fraction * 100.0);
            split_train_test(train_raw, cfg.test_fraction, cfg.seed)
        }
    };

    // ── Step 5: Clean ────────────────────────────────────────────────────────
    let src_clean = Preprocessor::new().with_max_words(cfg.max_src_len);
    let trg_clean = Preprocessor::new().with_max_words(cfg.max_trg_len);
    let clean = |pairs: Vec<TextPair>| -> Vec<TextPair> {
        pairs
            .iter()
            .map(|p| TextPair::new(src_clean.clean(&p.src), trg_clean.clean(&p.trg)))
            .filter(TextPair::is_usable)
            .collect()
    };
    let train_pairs = clean(train_raw);
    let test_pairs  = clean(test_raw);
    if train_pairs.is_empty() {
        anyhow::bail!("no usable training pairs left after cleaning");
    }

    // ── Step 6: Vocabularies ─────────────────────────────────────────────────
    // A resumed model must see the ids it was trained with
    let src_store = VocabStore::new(cfg.artefact("src_vocab.json"));
    let trg_store = VocabStore::new(cfg.artefact("trg_vocab.json"));
    let src_texts = train_pairs.iter().map(|p| p.src.as_str());
    let trg_texts = train_pairs.iter().map(|p| p.trg.as_str());
    let (src_vocab, trg_vocab) = match plan {
        ResumePlan::Load => (
            src_store.load_or_build(src_texts, cfg.encoder_vocab)?,
            trg_store.load_or_build(trg_texts, cfg.decoder_vocab)?,
        ),
        ResumePlan::Fresh => (
            src_store.build_and_save(src_texts, cfg.encoder_vocab)?,
            trg_store.build_and_save(trg_texts, cfg.decoder_vocab)?,
        ),
    };
    tracing::info!("Source vocab: {}", src_vocab.len());
    tracing::info!("Target vocab: {}", trg_vocab.len());

    // ── Step 7: Encode ───────────────────────────────────────────────────────
    let train = Seq2SeqDataset::encode(&train_pairs, &src_vocab, &trg_vocab)
        .context("Failed to encode training pairs")?;
    let test  = Seq2SeqDataset::encode(&test_pairs, &src_vocab, &trg_vocab)
        .context("Failed to encode held-out pairs")?;

    Ok(PreparedData { train, test, src_vocab, trg_vocab })
}

/// The backend-generic half of the run.
struct TrainTask<'a> {
    cfg:           &'a TrainConfig,
    plan:          ResumePlan,
    data:          PreparedData,
    checkpoints:   &'a CheckpointManager,
    self_critical: SelfCriticalWeight,
}

impl BackendTask for TrainTask<'_> {
    type Output = Result<TrainingHistory>;

    fn run<B: AutodiffBackend>(self, device: B::Device) -> Result<TrainingHistory> {
        use burn::data::dataset::Dataset;

        let cfg = self.cfg;
        let PreparedData { train, test, src_vocab, trg_vocab } = self.data;
        B::seed(cfg.seed);

        // ── Model ────────────────────────────────────────────────────────────
        let model_cfg = Seq2SeqConfig::new(
            src_vocab.len(),
            trg_vocab.len(),
            cfg.encoder_embed_size,
            cfg.encoder_hidden_size,
            cfg.decoder_embed_size,
            cfg.decoder_hidden_size,
        )
        .with_num_layers(cfg.num_layers);
        let mut model: Seq2Seq<B> = model_cfg.init(&device);

        let history = match self.plan {
            ResumePlan::Load => {
                tracing::info!("Loading models...");
                model = self.checkpoints.load(model, &device)?;
                self.checkpoints.load_history()?
            }
            ResumePlan::Fresh => TrainingHistory::default(),
        };

        // ── Schedule ─────────────────────────────────────────────────────────
        let schedule = Schedule::new(train.len(), cfg.batch_size, cfg.num_epochs);
        let n_test   = test.len();
        tracing::info!(
            "{} training samples, {} epochs, batch size={}, {} batches per epoch.",
            schedule.n_train, cfg.num_epochs, cfg.batch_size, schedule.batch_per_epoch
        );
        tracing::info!("{} held-out samples", n_test);

        // ── Collaborators ────────────────────────────────────────────────────
        let pad     = trg_vocab.pad_id();
        let sampler = SequenceSampler::new(cfg.max_decode_len, trg_vocab.sos_id(), trg_vocab.eos_id());
        let scorer: Arc<dyn RewardScorer> = Arc::new(Rouge1);

        // m = β1*m + (1-β1)*g,  v = β2*v + (1-β2)*g²,  θ -= lr * m / (√v + ε)
        let optimizer = AdamConfig::new().with_epsilon(1e-8).init::<B, Seq2Seq<B>>();
        let trainer   = BatchTrainer::new(
            optimizer,
            cfg.learning_rate,
            self.self_critical,
            sampler.clone(),
            scorer.clone(),
            StdRng::seed_from_u64(cfg.seed),
            device.clone(),
        );

        let train_iter = BucketIterator::shuffled(
            Arc::new(train),
            Seq2SeqBatcher::<B>::new(device.clone(), pad),
            cfg.batch_size,
            cfg.seed,
        );
        let test_iter = BucketIterator::sequential(
            Arc::new(test),
            Seq2SeqBatcher::<B::InnerBackend>::new(device.clone(), pad),
            1,
        );

        let training = TrainingLoop {
            schedule,
            cadence:     Cadence::from_config(cfg),
            trainer,
            train_iter,
            test_iter,
            n_test,
            src_vocab:   &src_vocab,
            trg_vocab:   &trg_vocab,
            sampler,
            scorer,
            checkpoints: self.checkpoints,
            metrics:     Some(MetricsLogger::new(cfg.artefact("metrics.csv"))?),
            history,
            rng:         StdRng::seed_from_u64(cfg.seed.wrapping_add(1)),
        };

        let (_, history) = training.run(model)?;
        Ok(history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::config::tiny;
    use crate::error::Seq2SeqError;
    use std::path::Path;

    fn write_data(dir: &Path) {
        let lines = [
            r#"{"src": "the cat sat on the mat", "trg": "cat sat"}"#,
            r#"{"src": "a dog ran in the park", "trg": "dog ran"}"#,
            r#"{"src": "the bird flew over the house", "trg": "bird flew"}"#,
            r#"{"src": "a fish swam in the sea", "trg": "fish swam"}"#,
            r#"{"src": "the cow ate the grass", "trg": "cow ate"}"#,
        ];
        std::fs::write(dir.join("train.jsonl"), lines.join("\n")).unwrap();
        std::fs::write(
            dir.join("test.jsonl"),
            r#"{"src": "the cat ran in the park", "trg": "cat ran"}"#,
        )
        .unwrap();
    }

    fn request(root: &Path) -> TrainRequest {
        let mut config = tiny();
        config.data_dir   = root.join("data").to_string_lossy().into_owned();
        config.model_path = root.join("models").to_string_lossy().into_owned();
        config.batch_size = 2;
        config.num_epochs = 1;
        config.log_step   = 1;
        config.save_step  = 2;
        config.test_step  = 3;
        config.encoder_embed_size  = 8;
        config.encoder_hidden_size = 8;
        config.decoder_embed_size  = 8;
        config.decoder_hidden_size = 8;
        config.max_decode_len      = 5;
        TrainRequest { config, from_scratch: false, disable_accelerator: true, self_critical: 0.0 }
    }

    fn setup() -> (tempfile::TempDir, TrainRequest) {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("data")).unwrap();
        write_data(&root.path().join("data"));
        let req = request(root.path());
        (root, req)
    }

    #[test]
    fn test_half_checkpoint_fails_before_training() {
        let (_root, req) = setup();
        let ckpt = CheckpointManager::new(&req.config);
        std::fs::create_dir_all(&req.config.model_path).unwrap();
        std::fs::write(ckpt.encoder_file(), b"not a real record").unwrap();

        let err = TrainUseCase::new(req.clone()).execute().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Seq2SeqError>(),
            Some(Seq2SeqError::Checkpoint { .. })
        ));
        // nothing was built or trained
        assert!(!req.config.artefact("src_vocab.json").exists());
        assert!(!req.config.artefact("history.json").exists());
    }

    #[test]
    fn test_invalid_self_critical_is_rejected() {
        let (_root, mut req) = setup();
        req.self_critical = 1.5;
        let err = TrainUseCase::new(req).execute().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Seq2SeqError>(),
            Some(Seq2SeqError::InvalidSelfCritical(_))
        ));
    }

    #[test]
    fn test_train_then_resume_continues_global_step() {
        let (_root, mut req) = setup();

        // 5 pairs, batch 2 → 3 iterations
        let first = TrainUseCase::new(req.clone()).execute().unwrap();
        assert_eq!(first.global_step, 3);
        assert_eq!(first.steps, vec![3]);

        let ckpt = CheckpointManager::new(&req.config);
        assert!(ckpt.encoder_file().is_file() && ckpt.decoder_file().is_file());
        assert!(req.config.artefact("config.json").is_file());

        req.self_critical = 0.5;
        let second = TrainUseCase::new(req.clone()).execute().unwrap();
        assert_eq!(second.global_step, 6);
        assert_eq!(second.steps, vec![3, 6]);

        req.from_scratch = true;
        req.self_critical = 0.0;
        let fresh = TrainUseCase::new(req.clone()).execute().unwrap();
        assert_eq!(fresh.global_step, 3);

        // the run's artefacts are enough to summarise
        let summarizer = crate::application::summarize_use_case::SummarizeUseCase::new(
            &req.config.model_path,
            &req.config.prefix,
        )
        .unwrap();
        let summary = summarizer.summarize("the cat sat in the park", Some(4), true).unwrap();
        assert!(summary.split_whitespace().count() <= 4);
    }
}
