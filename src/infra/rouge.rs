// ============================================================
// Layer 6 — ROUGE-1 Scorer
// ============================================================
// Unigram-overlap F1 between a hypothesis and a reference.
//
//   overlap   = Σ_w min(count_hyp(w), count_ref(w))
//   precision = overlap / |hyp|
//   recall    = overlap / |ref|
//   F1        = 2PR / (P + R)
//
// Tokens are the whitespace-separated words of the already
// cleaned, detokenised strings. The corpus score pools the three
// counts over every pair and computes a single F1 (micro average).
//
// Reference: Lin (2004) ROUGE: A Package for Automatic Evaluation
//            of Summaries

use std::collections::HashMap;

use crate::domain::traits::RewardScorer;

/// Pooled unigram counts for one or more hypothesis/reference pairs.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct OverlapCounts {
    matched:    usize,
    hyp_total:  usize,
    ref_total:  usize,
}

impl OverlapCounts {
    fn of(hypothesis: &str, reference: &str) -> Self {
        let hyp = unigram_counts(hypothesis);
        let refs = unigram_counts(reference);

        let matched = hyp
            .iter()
            .map(|(w, &n)| n.min(refs.get(w).copied().unwrap_or(0)))
            .sum();

        Self {
            matched,
            hyp_total: hyp.values().sum(),
            ref_total: refs.values().sum(),
        }
    }

    fn add(self, other: Self) -> Self {
        Self {
            matched:   self.matched + other.matched,
            hyp_total: self.hyp_total + other.hyp_total,
            ref_total: self.ref_total + other.ref_total,
        }
    }

    fn f1(&self) -> f64 {
        if self.matched == 0 || self.hyp_total == 0 || self.ref_total == 0 {
            return 0.0;
        }
        let p = self.matched as f64 / self.hyp_total as f64;
        let r = self.matched as f64 / self.ref_total as f64;
        2.0 * p * r / (p + r)
    }
}

fn unigram_counts(text: &str) -> HashMap<&str, usize> {
    let mut counts = HashMap::new();
    for word in text.split_whitespace() {
        *counts.entry(word).or_insert(0) += 1;
    }
    counts
}

/// ROUGE-1 F1 reward.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rouge1;

impl RewardScorer for Rouge1 {
    fn score(&self, hypothesis: &str, reference: &str) -> f64 {
        OverlapCounts::of(hypothesis, reference).f1()
    }

    fn corpus_score(&self, hypotheses: &[String], references: &[String]) -> f64 {
        if hypotheses.len() != references.len() {
            tracing::warn!(
                "ROUGE corpus size mismatch: {} hypotheses vs {} references, scoring common prefix",
                hypotheses.len(),
                references.len()
            );
        }
        hypotheses
            .iter()
            .zip(references)
            .map(|(h, r)| OverlapCounts::of(h, r))
            .fold(OverlapCounts::default(), OverlapCounts::add)
            .f1()
    }

    fn name(&self) -> &'static str {
        "ROUGE-1_f"
    }
}
