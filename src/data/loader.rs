// ============================================================
// Layer 4 — JSON-lines Loader
// ============================================================
// Reads source/target pairs from a data directory:
//
//   <data_dir>/train.jsonl   (required)
//   <data_dir>/test.jsonl    (optional held-out split)
//
// One JSON object per line:  {"src": "...", "trg": "..."}
// Blank lines are ignored. Lines that fail to parse, or whose
// src/trg is blank, are skipped with a warning rather than failing
// the whole load, but a train file with no usable pairs is an error.

use anyhow::{bail, Context, Result};
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use crate::domain::example::TextPair;
use crate::domain::traits::ExampleSource;

pub const TRAIN_FILE: &str = "train.jsonl";
pub const TEST_FILE: &str = "test.jsonl";

pub struct JsonlLoader {
    dir: PathBuf,
}

impl JsonlLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ExampleSource for JsonlLoader {
    fn load_train(&self) -> Result<Vec<TextPair>> {
        let path  = self.dir.join(TRAIN_FILE);
        let pairs = read_jsonl(&path)?;
        if pairs.is_empty() {
            bail!("'{}' contains no usable pairs", path.display());
        }
        Ok(pairs)
    }

    fn load_test(&self) -> Result<Option<Vec<TextPair>>> {
        let path = self.dir.join(TEST_FILE);
        if !path.exists() {
            tracing::debug!("No held-out file at '{}'", path.display());
            return Ok(None);
        }
        read_jsonl(&path).map(Some)
    }
}

fn read_jsonl(path: &Path) -> Result<Vec<TextPair>> {
    let file = File::open(path)
        .with_context(|| format!("Cannot open '{}'", path.display()))?;

    let mut pairs   = Vec::new();
    let mut skipped = 0usize;

    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("Cannot read '{}'", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<TextPair>(&line) {
            Ok(pair) if pair.is_usable() => pairs.push(pair),
            Ok(_) => skipped += 1,
            Err(e) => {
                tracing::warn!("Skipping {}:{}: {}", path.display(), line_no + 1, e);
                skipped += 1;
            }
        }
    }

    tracing::info!(
        "Loaded {} pairs from '{}' ({} skipped)",
        pairs.len(),
        path.display(),
        skipped
    );
    Ok(pairs)
}
