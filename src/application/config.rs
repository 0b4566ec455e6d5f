// ============================================================
// Layer 2 — Training Configuration
// ============================================================
// Every hyperparameter of a run lives in one explicit struct that
// is passed into the training loop. Configurations are selected by
// name from a fixed registry (PRESETS) or loaded from a JSON file.
// Serialisable so the resolved config can be written next to the
// checkpoint and read back by the `summarize` command.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Result, Seq2SeqError};

/// Which compute device the config asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DevicePreference {
    /// Accelerator when compiled in, otherwise CPU
    Auto,
    Cpu,
    /// Accelerator or fail
    Accelerator,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    /// Directory holding train.jsonl (and optionally test.jsonl)
    pub data_dir:            String,
    /// Directory (with trailing separator handled) for checkpoints
    pub model_path:          String,
    /// Filename prefix for every artefact of this run
    pub prefix:              String,

    pub batch_size:          usize,
    pub num_epochs:          usize,

    /// Word caps for the source / target vocabularies (specials excluded)
    pub encoder_vocab:       usize,
    pub decoder_vocab:       usize,

    pub encoder_embed_size:  usize,
    pub encoder_hidden_size: usize,
    pub decoder_embed_size:  usize,
    pub decoder_hidden_size: usize,
    pub num_layers:          usize,

    pub learning_rate:       f64,

    pub log_step:            usize,
    pub save_step:           usize,
    pub test_step:           usize,

    /// Cap on generated length for greedy and sampled decodes
    pub max_decode_len:      usize,
    /// Optional word-level truncation before tokenisation. The keys
    /// must be present in a config file; `null` turns truncation off.
    #[serde(deserialize_with = "present_or_null")]
    pub max_src_len:         Option<usize>,
    #[serde(deserialize_with = "present_or_null")]
    pub max_trg_len:         Option<usize>,

    /// Fraction of train.jsonl held out when no test.jsonl exists
    pub test_fraction:       f64,
    pub seed:                u64,
    pub device:              DevicePreference,
}

/// `Option` field that still fails with "missing field" when the key is absent.
fn present_or_null<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer)
}

impl Default for TrainConfig {
    fn default() -> Self {
        small()
    }
}

// ─── Registry ─────────────────────────────────────────────────────────────────
/// Named configurations selectable with `--config <name>`.
pub const PRESETS: &[(&str, fn() -> TrainConfig)] = &[
    ("tiny", tiny),
    ("small", small),
    ("gigaword", gigaword),
];

/// A few hundred parameters per layer; for smoke runs and tests.
pub fn tiny() -> TrainConfig {
    TrainConfig {
        data_dir:            "data/tiny".to_string(),
        model_path:          "models/".to_string(),
        prefix:              "tiny_".to_string(),
        batch_size:          4,
        num_epochs:          2,
        encoder_vocab:       500,
        decoder_vocab:       500,
        encoder_embed_size:  16,
        encoder_hidden_size: 32,
        decoder_embed_size:  16,
        decoder_hidden_size: 32,
        num_layers:          1,
        learning_rate:       1e-3,
        log_step:            10,
        save_step:           50,
        test_step:           50,
        max_decode_len:      30,
        max_src_len:         Some(60),
        max_trg_len:         Some(20),
        test_fraction:       0.1,
        seed:                666,
        device:              DevicePreference::Cpu,
    }
}

pub fn small() -> TrainConfig {
    TrainConfig {
        data_dir:            "data/small".to_string(),
        model_path:          "models/".to_string(),
        prefix:              "small_".to_string(),
        batch_size:          32,
        num_epochs:          10,
        encoder_vocab:       20_000,
        decoder_vocab:       10_000,
        encoder_embed_size:  128,
        encoder_hidden_size: 256,
        decoder_embed_size:  128,
        decoder_hidden_size: 256,
        num_layers:          1,
        learning_rate:       1e-3,
        log_step:            100,
        save_step:           1000,
        test_step:           1000,
        max_decode_len:      30,
        max_src_len:         Some(100),
        max_trg_len:         Some(30),
        test_fraction:       0.05,
        seed:                666,
        device:              DevicePreference::Auto,
    }
}

/// Headline generation on the Gigaword corpus.
pub fn gigaword() -> TrainConfig {
    TrainConfig {
        data_dir:            "data/gigaword".to_string(),
        model_path:          "models/".to_string(),
        prefix:              "giga_".to_string(),
        batch_size:          64,
        num_epochs:          15,
        encoder_vocab:       50_000,
        decoder_vocab:       30_000,
        encoder_embed_size:  300,
        encoder_hidden_size: 512,
        decoder_embed_size:  300,
        decoder_hidden_size: 512,
        num_layers:          2,
        learning_rate:       5e-4,
        log_step:            200,
        save_step:           2000,
        test_step:           2000,
        max_decode_len:      30,
        max_src_len:         Some(80),
        max_trg_len:         Some(25),
        test_fraction:       0.01,
        seed:                666,
        device:              DevicePreference::Auto,
    }
}

impl TrainConfig {
    /// Look a configuration up in the registry.
    pub fn by_name(name: &str) -> Result<Self> {
        PRESETS
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, build)| build())
            .ok_or_else(|| Seq2SeqError::UnknownConfig {
                name:  name.to_string(),
                known: PRESETS.iter().map(|(n, _)| *n).collect::<Vec<_>>().join(", "),
            })
    }

    /// Load a configuration from JSON. Every key is required; a missing
    /// or mistyped key is a configuration error.
    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            Seq2SeqError::Configuration(format!("cannot read '{}': {e}", path.display()))
        })?;
        serde_json::from_str(&json).map_err(|e| {
            Seq2SeqError::Configuration(format!("'{}': {e}", path.display()))
        })
    }

    /// Reject values the training loop cannot run with.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("batch_size", self.batch_size),
            ("num_epochs", self.num_epochs),
            ("encoder_vocab", self.encoder_vocab),
            ("decoder_vocab", self.decoder_vocab),
            ("encoder_embed_size", self.encoder_embed_size),
            ("encoder_hidden_size", self.encoder_hidden_size),
            ("decoder_embed_size", self.decoder_embed_size),
            ("decoder_hidden_size", self.decoder_hidden_size),
            ("num_layers", self.num_layers),
            ("log_step", self.log_step),
            ("save_step", self.save_step),
            ("test_step", self.test_step),
            ("max_decode_len", self.max_decode_len),
        ];
        if let Some((key, _)) = positive.iter().find(|(_, v)| *v == 0) {
            return Err(Seq2SeqError::Configuration(format!("{key} must be > 0")));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(Seq2SeqError::Configuration(format!(
                "learning_rate must be > 0, got {}",
                self.learning_rate
            )));
        }
        if !(0.0..1.0).contains(&self.test_fraction) {
            return Err(Seq2SeqError::Configuration(format!(
                "test_fraction must lie in [0, 1), got {}",
                self.test_fraction
            )));
        }
        if self.prefix.contains('.') || self.prefix.contains('/') || self.prefix.contains('\\') {
            // the record files get their extension appended to this stem
            return Err(Seq2SeqError::Configuration(format!(
                "prefix '{}' must not contain '.', '/' or '\\'",
                self.prefix
            )));
        }
        if matches!(self.max_src_len, Some(0)) || matches!(self.max_trg_len, Some(0)) {
            return Err(Seq2SeqError::Configuration(
                "max_src_len / max_trg_len must be > 0 when set".to_string(),
            ));
        }
        Ok(())
    }

    /// `<model_path><prefix><name>` as a path stem (no extension).
    pub fn artefact(&self, name: &str) -> PathBuf {
        Path::new(&self.model_path).join(format!("{}{}", self.prefix, name))
    }
}

// ─── Self-critical weight ─────────────────────────────────────────────────────
/// λ in `loss = (1-λ)·CE + λ·SC`, validated to lie in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelfCriticalWeight(f64);

impl SelfCriticalWeight {
    /// Weights at or below this are treated as "branch disabled".
    pub const THRESHOLD: f64 = 1e-5;

    pub fn new(value: f64) -> Result<Self> {
        if (0.0..=1.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(Seq2SeqError::InvalidSelfCritical(value))
        }
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    pub fn is_active(&self) -> bool {
        self.0 > Self::THRESHOLD
    }
}
