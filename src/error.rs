// ============================================================
// Error taxonomy
// ============================================================
// Typed failures that callers may want to match on. The
// orchestration layers (cli/, application/) wrap these in
// anyhow::Error with extra context; everything below them
// returns Result<T, Seq2SeqError>.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Seq2SeqError {
    // --- Configuration ---
    #[error("Invalid config: {0}")]
    Configuration(String),

    #[error("Unknown config '{name}' (known: {known})")]
    UnknownConfig { name: String, known: String },

    #[error("Self-critical weight must lie in [0, 1], got {0}")]
    InvalidSelfCritical(f64),

    // --- Checkpoints ---
    #[error("Cannot resume: checkpoint file {missing} is missing (found {present})")]
    Checkpoint { missing: PathBuf, present: PathBuf },

    #[error("Checkpoint I/O failed for {path}: {reason}")]
    CheckpointIo { path: PathBuf, reason: String },

    // --- Device ---
    #[error("Device unavailable: {0}")]
    Device(String),

    // --- Compute ---
    #[error("Loss is not finite at iteration {step}: {value}")]
    NonFiniteLoss { step: usize, value: f32 },

    #[error("Sampling failed: {0}")]
    Sampling(String),

    // --- Data ---
    #[error("Data error: {0}")]
    Data(String),

    #[error("Vocabulary error: {0}")]
    Vocabulary(String),
}

pub type Result<T> = std::result::Result<T, Seq2SeqError>;
