// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The training core only ever talks to its data source and its
// reward function through these traits, so either can be swapped
// (another file format, another text metric) without touching
// the trainer or the evaluator.

use anyhow::Result;
use crate::domain::example::TextPair;

// ─── ExampleSource ────────────────────────────────────────────────────────────
/// Any component that can produce raw training / held-out pairs.
///
/// Implementations:
///   - JsonlLoader → reads {"src": .., "trg": ..} lines
pub trait ExampleSource {
    /// Load the training pairs.
    fn load_train(&self) -> Result<Vec<TextPair>>;

    /// Load the held-out pairs, or `None` if this source has no
    /// dedicated held-out split.
    fn load_test(&self) -> Result<Option<Vec<TextPair>>>;
}

// ─── RewardScorer ─────────────────────────────────────────────────────────────
/// A text-similarity metric in [0, 1] used both as the
/// self-critical reward and as the held-out quality score.
///
/// Both methods must return 0 (never panic or error) when the
/// hypothesis or the reference is empty.
pub trait RewardScorer: Send + Sync {
    /// Score one hypothesis against one reference.
    fn score(&self, hypothesis: &str, reference: &str) -> f64;

    /// Score a whole corpus in a single call. This is not required
    /// to equal the mean of the per-pair scores.
    fn corpus_score(&self, hypotheses: &[String], references: &[String]) -> f64;

    /// Short metric name used in log lines.
    fn name(&self) -> &'static str;
}
