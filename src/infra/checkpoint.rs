// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores the encoder/decoder pair using Burn's
// NamedMpkGzFileRecorder at full precision.
//
// Files written per run prefix:
//   <model_path><prefix>encoder.mpk.gz   ← encoder weights
//   <model_path><prefix>decoder.mpk.gz   ← decoder weights
//   <model_path><prefix>history.json     ← TrainingHistory
//   <model_path><prefix>config.json      ← TrainConfig
//
// The pair is saved both-or-neither: each network is first written
// to `<prefix>encoder_partial.mpk.gz` / `..decoder_partial..`, and
// only when both writes succeeded are they renamed over the real
// files, encoder first. Renaming the encoder partial is the commit
// point, so leftovers from an interrupted save are settled before
// every plan/load:
//   both partials present    → not committed, partials discarded
//   only decoder partial     → committed, decoder rename finished
//   only encoder partial     → not committed, partial discarded
//
// Resume policy (CheckpointManager::plan):
//   from_scratch        → Fresh
//   both files present  → Load
//   neither present     → Fresh
//   exactly one present → Err(Checkpoint)
//
// Reference: Burn Book §5 (Records and Checkpointing)

use std::{
    fs,
    path::{Path, PathBuf},
};

use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkGzFileRecorder},
};

use crate::application::config::TrainConfig;
use crate::domain::history::TrainingHistory;
use crate::error::{Result, Seq2SeqError};
use crate::ml::model::Seq2Seq;

type PairRecorder = NamedMpkGzFileRecorder<FullPrecisionSettings>;

/// Appended by the recorder to every stem
const RECORD_EXTENSION: &str = "mpk.gz";
const PARTIAL_SUFFIX: &str   = "_partial";

/// What the training loop does with the model at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumePlan {
    Fresh,
    Load,
}

pub struct CheckpointManager {
    /// Stems without extension; the recorder appends `.mpk.gz`
    encoder_stem: PathBuf,
    decoder_stem: PathBuf,
    history_path: PathBuf,
    config_path:  PathBuf,
}

impl CheckpointManager {
    /// Paths for the run described by `cfg`.
    pub fn new(cfg: &TrainConfig) -> Self {
        Self::for_prefix(&cfg.model_path, &cfg.prefix)
    }

    pub fn for_prefix(model_path: impl AsRef<Path>, prefix: &str) -> Self {
        let dir = model_path.as_ref();
        Self {
            encoder_stem: dir.join(format!("{prefix}encoder")),
            decoder_stem: dir.join(format!("{prefix}decoder")),
            history_path: dir.join(format!("{prefix}history.json")),
            config_path:  dir.join(format!("{prefix}config.json")),
        }
    }

    pub fn encoder_file(&self) -> PathBuf {
        with_record_extension(&self.encoder_stem)
    }

    pub fn decoder_file(&self) -> PathBuf {
        with_record_extension(&self.decoder_stem)
    }

    /// Decide between loading and fresh initialisation.
    pub fn plan(&self, from_scratch: bool) -> Result<ResumePlan> {
        if from_scratch {
            return Ok(ResumePlan::Fresh);
        }
        self.settle_interrupted_save()?;

        let encoder = self.encoder_file();
        let decoder = self.decoder_file();
        match (encoder.is_file(), decoder.is_file()) {
            (true, true)   => Ok(ResumePlan::Load),
            (false, false) => {
                tracing::info!("No checkpoint at '{}', starting fresh", encoder.display());
                Ok(ResumePlan::Fresh)
            }
            (true, false)  => Err(Seq2SeqError::Checkpoint { missing: decoder, present: encoder }),
            (false, true)  => Err(Seq2SeqError::Checkpoint { missing: encoder, present: decoder }),
        }
    }

    // ── Model pair ───────────────────────────────────────────────────────────

    /// Write both networks, replacing the previous pair only once both
    /// new files exist.
    pub fn save<B: Backend>(&self, model: &Seq2Seq<B>) -> Result<()> {
        let recorder = PairRecorder::new();

        let encoder_partial = partial(&self.encoder_stem);
        let decoder_partial = partial(&self.decoder_stem);

        if let Some(parent) = self.encoder_stem.parent() {
            fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
        }

        model
            .encoder
            .clone()
            .save_file(encoder_partial.clone(), &recorder)
            .map_err(|e| io_error(&encoder_partial, e))?;
        model
            .decoder
            .clone()
            .save_file(decoder_partial.clone(), &recorder)
            .map_err(|e| io_error(&decoder_partial, e))?;

        for (from, to) in [
            (with_record_extension(&encoder_partial), self.encoder_file()),
            (with_record_extension(&decoder_partial), self.decoder_file()),
        ] {
            fs::rename(&from, &to).map_err(|e| io_error(&to, e))?;
        }

        tracing::debug!("Saved checkpoint pair to '{}'", self.encoder_file().display());
        Ok(())
    }

    /// Load both networks into `model`. Fails if either file is absent.
    pub fn load<B: Backend>(&self, model: Seq2Seq<B>, device: &B::Device) -> Result<Seq2Seq<B>> {
        self.settle_interrupted_save()?;
        for (missing, present) in [
            (self.encoder_file(), self.decoder_file()),
            (self.decoder_file(), self.encoder_file()),
        ] {
            if !missing.is_file() {
                return Err(Seq2SeqError::Checkpoint { missing, present });
            }
        }

        let recorder = PairRecorder::new();
        let encoder = model
            .encoder
            .load_file(self.encoder_stem.clone(), &recorder, device)
            .map_err(|e| io_error(&self.encoder_file(), e))?;
        let decoder = model
            .decoder
            .load_file(self.decoder_stem.clone(), &recorder, device)
            .map_err(|e| io_error(&self.decoder_file(), e))?;

        tracing::info!("Loaded checkpoint pair from '{}'", self.encoder_file().display());
        Ok(Seq2Seq { encoder, decoder })
    }

    /// Complete or discard the partial files a crashed `save` left behind.
    fn settle_interrupted_save(&self) -> Result<()> {
        let encoder_partial = with_record_extension(&partial(&self.encoder_stem));
        let decoder_partial = with_record_extension(&partial(&self.decoder_stem));

        match (encoder_partial.is_file(), decoder_partial.is_file()) {
            (false, false) => {}
            (false, true) => {
                tracing::warn!("Finishing interrupted checkpoint save at '{}'", decoder_partial.display());
                let decoder = self.decoder_file();
                fs::rename(&decoder_partial, &decoder).map_err(|e| io_error(&decoder, e))?;
            }
            (true, decoder_left) => {
                tracing::warn!("Discarding uncommitted checkpoint at '{}'", encoder_partial.display());
                fs::remove_file(&encoder_partial).map_err(|e| io_error(&encoder_partial, e))?;
                if decoder_left {
                    fs::remove_file(&decoder_partial).map_err(|e| io_error(&decoder_partial, e))?;
                }
            }
        }
        Ok(())
    }

    // ── Side files ───────────────────────────────────────────────────────────

    pub fn save_history(&self, history: &TrainingHistory) -> Result<()> {
        write_json(&self.history_path, history)
    }

    /// The stored history, or an empty one if none was saved yet.
    pub fn load_history(&self) -> Result<TrainingHistory> {
        if !self.history_path.is_file() {
            tracing::warn!(
                "No training history at '{}', counting steps from 0",
                self.history_path.display()
            );
            return Ok(TrainingHistory::default());
        }
        read_json(&self.history_path)
    }

    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        write_json(&self.config_path, cfg)
    }

    pub fn load_config(&self) -> Result<TrainConfig> {
        read_json(&self.config_path)
    }
}

/// `stem` → `stem.mpk.gz`, the name the recorder writes.
fn with_record_extension(stem: &Path) -> PathBuf {
    let mut name = stem.as_os_str().to_owned();
    name.push(".");
    name.push(RECORD_EXTENSION);
    PathBuf::from(name)
}

fn partial(stem: &Path) -> PathBuf {
    let mut name = stem.as_os_str().to_owned();
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

fn io_error(path: &Path, err: impl std::fmt::Display) -> Seq2SeqError {
    Seq2SeqError::CheckpointIo { path: path.to_path_buf(), reason: err.to_string() }
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
    }
    let json = serde_json::to_string_pretty(value).map_err(|e| io_error(path, e))?;
    fs::write(path, json).map_err(|e| io_error(path, e))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let json = fs::read_to_string(path).map_err(|e| io_error(path, e))?;
    serde_json::from_str(&json).map_err(|e| io_error(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::model::Seq2SeqConfig;
    use burn::backend::NdArray;
    use burn::tensor::TensorData;

    type TB = NdArray;

    fn model() -> Seq2Seq<TB> {
        Seq2SeqConfig::new(9, 7, 4, 6, 4, 6).init(&Default::default())
    }

    fn logits(model: &Seq2Seq<TB>) -> Vec<f32> {
        let device = Default::default();
        let src = Tensor::<TB, 2, Int>::from_data(TensorData::new(vec![4, 5, 3], [1, 3]), &device);
        let trg = Tensor::<TB, 2, Int>::from_data(TensorData::new(vec![2, 6], [1, 2]), &device);
        model.forward(src, &[3], trg).into_data().iter::<f32>().collect()
    }

    #[test]
    fn test_round_trip_reproduces_outputs() {
        let dir   = tempfile::tempdir().unwrap();
        let ckpt  = CheckpointManager::for_prefix(dir.path(), "t_");
        let saved = model();
        ckpt.save(&saved).unwrap();

        assert!(ckpt.encoder_file().is_file());
        assert!(ckpt.decoder_file().is_file());
        assert!(!with_record_extension(&partial(&ckpt.encoder_stem)).exists());

        let loaded = ckpt.load(model(), &Default::default()).unwrap();
        let (a, b) = (logits(&saved), logits(&loaded));
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-6);
        }
    }

    #[test]
    fn test_plan_policy() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::for_prefix(dir.path(), "p_");

        assert_eq!(ckpt.plan(false).unwrap(), ResumePlan::Fresh);
        ckpt.save(&model()).unwrap();
        assert_eq!(ckpt.plan(false).unwrap(), ResumePlan::Load);
        assert_eq!(ckpt.plan(true).unwrap(), ResumePlan::Fresh);
    }

    #[test]
    fn test_only_encoder_present_is_checkpoint_error() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::for_prefix(dir.path(), "half_");
        ckpt.save(&model()).unwrap();
        fs::remove_file(ckpt.decoder_file()).unwrap();

        match ckpt.plan(false) {
            Err(Seq2SeqError::Checkpoint { missing, .. }) => assert_eq!(missing, ckpt.decoder_file()),
            other => panic!("expected checkpoint error, got {other:?}"),
        }
        assert!(matches!(
            ckpt.load(model(), &Default::default()),
            Err(Seq2SeqError::Checkpoint { .. })
        ));
        // forcing a fresh start still works
        assert_eq!(ckpt.plan(true).unwrap(), ResumePlan::Fresh);
    }

    #[test]
    fn test_crash_between_renames_finishes_the_new_pair() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::for_prefix(dir.path(), "r_");
        ckpt.save(&model()).unwrap();

        // encoder already renamed, decoder still under its partial name
        let newer    = model();
        let recorder = PairRecorder::new();
        newer.encoder.clone().save_file(ckpt.encoder_stem.clone(), &recorder).unwrap();
        newer.decoder.clone().save_file(partial(&ckpt.decoder_stem), &recorder).unwrap();

        assert_eq!(ckpt.plan(false).unwrap(), ResumePlan::Load);
        assert!(!with_record_extension(&partial(&ckpt.decoder_stem)).exists());

        let loaded = ckpt.load(model(), &Default::default()).unwrap();
        for (x, y) in logits(&newer).iter().zip(&logits(&loaded)) {
            assert!((x - y).abs() < 1e-6);
        }
    }

    #[test]
    fn test_uncommitted_partials_are_discarded() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::for_prefix(dir.path(), "u_");
        let kept = model();
        ckpt.save(&kept).unwrap();

        let recorder = PairRecorder::new();
        let other    = model();
        other.encoder.clone().save_file(partial(&ckpt.encoder_stem), &recorder).unwrap();
        other.decoder.clone().save_file(partial(&ckpt.decoder_stem), &recorder).unwrap();

        let loaded = ckpt.load(model(), &Default::default()).unwrap();
        assert!(!with_record_extension(&partial(&ckpt.encoder_stem)).exists());
        assert!(!with_record_extension(&partial(&ckpt.decoder_stem)).exists());
        for (x, y) in logits(&kept).iter().zip(&logits(&loaded)) {
            assert!((x - y).abs() < 1e-6);
        }
    }

    #[test]
    fn test_history_keeps_full_float_precision() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::for_prefix(dir.path(), "f_");

        let mut history = TrainingHistory { global_step: 2, ..Default::default() };
        history.record_eval(1.9793474674224856, 0.1, 0.3);
        history.record_eval(1.975698510805766, 0.2, 0.1);
        ckpt.save_history(&history).unwrap();

        let restored = ckpt.load_history().unwrap();
        assert_eq!(restored.loss[0].to_bits(), 1.9793474674224856_f64.to_bits());
        assert_eq!(restored.loss[1].to_bits(), 1.975698510805766_f64.to_bits());
        assert_eq!(restored, history);
    }

    #[test]
    fn test_history_round_trip_and_default() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::for_prefix(dir.path(), "h_");
        assert_eq!(ckpt.load_history().unwrap(), TrainingHistory::default());

        let mut history = TrainingHistory { global_step: 12, ..Default::default() };
        history.record_eval(3.0, 0.0, 0.2);
        ckpt.save_history(&history).unwrap();
        assert_eq!(ckpt.load_history().unwrap(), history);
    }

    #[test]
    fn test_config_round_trip() {
        let dir  = tempfile::tempdir().unwrap();
        let ckpt = CheckpointManager::for_prefix(dir.path(), "c_");
        let cfg  = crate::application::config::tiny();
        ckpt.save_config(&cfg).unwrap();
        assert_eq!(ckpt.load_config().unwrap(), cfg);
    }
}
