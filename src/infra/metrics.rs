// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Appends one CSV row per held-out evaluation, next to the
// checkpoint, so learning curves survive the log stream.
//
// Output file: <model_path><prefix>metrics.csv
//
// Example CSV output:
//   step,train_loss,test_loss,test_rouge1_f
//   1000,4.812200,4.903100,0.118000
//   2000,4.101900,4.377500,0.164000
//   ...
//
// `step` is the global step, so rows from a resumed run continue
// the same curve. `train_loss` is the mean supervised loss since
// the previous evaluation.

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::PathBuf,
};
use serde::{Deserialize, Serialize};

const HEADER: &str = "step,train_loss,test_loss,test_rouge1_f";

/// One row of the metrics CSV
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalRow {
    pub step:          usize,
    pub train_loss:    f64,
    pub test_loss:     f64,
    pub test_rouge1_f: f64,
}

impl EvalRow {
    pub fn new(step: usize, train_loss: f64, test_loss: f64, test_rouge1_f: f64) -> Self {
        Self { step, train_loss, test_loss, test_rouge1_f }
    }
}

pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the header if the file doesn't exist yet; an existing
    /// file is appended to.
    pub fn new(csv_path: impl Into<PathBuf>) -> Result<Self> {
        let csv_path = csv_path.into();

        if let Some(dir) = csv_path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Cannot create '{}'", dir.display()))?;
        }

        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
            writeln!(f, "{HEADER}")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, row: &EvalRow) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open '{}'", self.csv_path.display()))?;

        writeln!(
            f,
            "{},{:.6},{:.6},{:.6}",
            row.step, row.train_loss, row.test_loss, row.test_rouge1_f,
        )?;

        tracing::debug!("Logged metrics at step {}", row.step);
        Ok(())
    }
}
