// ============================================================
// Layer 4 — Train / Held-out Splitter
// ============================================================
// Used only when the data directory has no test.jsonl: shuffles
// the training pairs with the run's seed and carves off
// `test_fraction` of them as the held-out set.
//
// Seeded so that a resumed run holds out the same pairs it held
// out before.

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

/// Shuffle `samples` with `seed` and split into (train, held_out).
///
/// The held-out part gets `round(len * test_fraction)` items but
/// never all of them: at least one item stays in training.
pub fn split_train_test<T>(mut samples: Vec<T>, test_fraction: f64, seed: u64) -> (Vec<T>, Vec<T>) {
    let mut rng = StdRng::seed_from_u64(seed);
    samples.shuffle(&mut rng);

    let total    = samples.len();
    let n_test   = ((total as f64) * test_fraction).round() as usize;
    let n_test   = n_test.min(total.saturating_sub(1));
    let held_out = samples.split_off(total - n_test);

    tracing::debug!(
        "Dataset split: {} training, {} held-out",
        samples.len(),
        held_out.len()
    );

    (samples, held_out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correct_split_sizes() {
        let items: Vec<usize> = (0..100).collect();
        let (train, test)     = split_train_test(items, 0.2, 1);
        assert_eq!(train.len(), 80);
        assert_eq!(test.len(), 20);
    }

    #[test]
    fn test_same_seed_same_split() {
        let a = split_train_test((0..50).collect::<Vec<_>>(), 0.3, 7);
        let b = split_train_test((0..50).collect::<Vec<_>>(), 0.3, 7);
        assert_eq!(a, b);
    }

    #[test]
    fn test_never_holds_out_everything() {
        let (train, test) = split_train_test(vec![1, 2], 0.9, 0);
        assert_eq!(train.len(), 1);
        assert_eq!(test.len(), 1);
    }

    #[test]
    fn test_empty_dataset() {
        let (train, test) = split_train_test(Vec::<usize>::new(), 0.5, 0);
        assert!(train.is_empty());
        assert!(test.is_empty());
    }
}
