use serde::{Deserialize, Serialize};

/// Progress of a model across every run that trained it.
///
/// Saved next to the checkpoint and restored on resume, so
/// `global_step` keeps counting where the previous run stopped.
/// One entry is appended to each list per held-out evaluation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    /// Optimiser steps taken in total
    pub global_step: usize,
    /// `global_step` at each evaluation
    pub steps:       Vec<usize>,
    /// Mean held-out loss at each evaluation
    pub loss:        Vec<f64>,
    /// Mean self-critical reward since the previous evaluation (0 when off)
    pub rl_score:    Vec<f64>,
    /// Held-out corpus score at each evaluation
    pub score:       Vec<f64>,
}

impl TrainingHistory {
    pub fn record_eval(&mut self, loss: f64, rl_score: f64, score: f64) {
        self.steps.push(self.global_step);
        self.loss.push(loss);
        self.rl_score.push(rl_score);
        self.score.push(score);
    }

    /// Best held-out score so far, if any evaluation ran.
    pub fn best_score(&self) -> Option<f64> {
        self.score.iter().copied().reduce(f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_eval_uses_global_step() {
        let mut h = TrainingHistory { global_step: 40, ..Default::default() };
        h.record_eval(2.5, 0.0, 0.1);
        h.global_step = 80;
        h.record_eval(2.1, 0.01, 0.3);

        assert_eq!(h.steps, vec![40, 80]);
        assert_eq!(h.best_score(), Some(0.3));
    }

    #[test]
    fn test_no_evaluations_no_best() {
        assert_eq!(TrainingHistory::default().best_score(), None);
    }
}
