// ============================================================
// Layer 4 — Bucket Iterator
// ============================================================
// An endless batch iterator over a dataset.
//
// The training loop pulls exactly `batches_per_epoch` batches per
// epoch and the evaluator pulls exactly `n_test` batches per call,
// so the iterator never reports exhaustion: when one pass over the
// dataset ends, the next call starts a new pass (reshuffled first
// when shuffling is on). A pass yields ceil(len / batch_size)
// batches; the last one may be short.
//
// Burn's DataLoader is not used here because it stops at the end
// of the dataset and batches on worker threads; this loop is
// strictly sequential.

use std::sync::Arc;

use burn::data::{dataloader::batcher::Batcher, dataset::Dataset};
use burn::prelude::*;
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::data::batcher::{Seq2SeqBatch, Seq2SeqBatcher};
use crate::data::dataset::{EncodedPair, Seq2SeqDataset};

pub struct BucketIterator<B: Backend> {
    dataset:    Arc<Seq2SeqDataset>,
    batcher:    Seq2SeqBatcher<B>,
    batch_size: usize,
    order:      Vec<usize>,
    cursor:     usize,
    /// None = keep dataset order on every pass
    rng:        Option<StdRng>,
}

impl<B: Backend> BucketIterator<B> {
    /// Iterator that keeps dataset order.
    pub fn sequential(dataset: Arc<Seq2SeqDataset>, batcher: Seq2SeqBatcher<B>, batch_size: usize) -> Self {
        let order = (0..dataset.len()).collect();
        Self { dataset, batcher, batch_size: batch_size.max(1), order, cursor: 0, rng: None }
    }

    /// Iterator that reshuffles at the start of every pass.
    pub fn shuffled(
        dataset:    Arc<Seq2SeqDataset>,
        batcher:    Seq2SeqBatcher<B>,
        batch_size: usize,
        seed:       u64,
    ) -> Self {
        let mut iter = Self::sequential(dataset, batcher, batch_size);
        let mut rng  = StdRng::seed_from_u64(seed);
        iter.order.shuffle(&mut rng);
        iter.rng = Some(rng);
        iter
    }

    /// Number of batches in one full pass.
    pub fn batches_per_pass(&self) -> usize {
        self.order.len().div_ceil(self.batch_size)
    }

    pub fn device(&self) -> &B::Device {
        self.batcher.device()
    }

    fn start_new_pass(&mut self) {
        self.cursor = 0;
        if let Some(rng) = self.rng.as_mut() {
            self.order.shuffle(rng);
        }
    }
}

impl<B: Backend> Iterator for BucketIterator<B> {
    type Item = Seq2SeqBatch<B>;

    /// Only returns None for an empty dataset.
    fn next(&mut self) -> Option<Self::Item> {
        if self.order.is_empty() {
            return None;
        }
        if self.cursor >= self.order.len() {
            self.start_new_pass();
        }

        let end = (self.cursor + self.batch_size).min(self.order.len());
        let items: Vec<EncodedPair> = self.order[self.cursor..end]
            .iter()
            .filter_map(|&i| self.dataset.get(i))
            .collect();
        self.cursor = end;

        Some(self.batcher.batch(items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TB = NdArray;

    fn dataset(n: usize) -> Arc<Seq2SeqDataset> {
        let pairs = (0..n)
            .map(|i| EncodedPair { src: vec![10 + i as u32, 3], trg: vec![2, 10 + i as u32, 3] })
            .collect();
        Arc::new(Seq2SeqDataset::new(pairs))
    }

    #[test]
    fn test_pass_has_ceil_batches_and_short_tail() {
        let mut it = BucketIterator::sequential(dataset(3), Seq2SeqBatcher::<TB>::new(Default::default(), 1), 2);
        assert_eq!(it.batches_per_pass(), 2);
        assert_eq!(it.next().unwrap().batch_size(), 2);
        assert_eq!(it.next().unwrap().batch_size(), 1);
    }

    #[test]
    fn test_cycles_instead_of_ending() {
        let mut it = BucketIterator::sequential(dataset(2), Seq2SeqBatcher::<TB>::new(Default::default(), 1), 1);
        let firsts: Vec<u32> = (0..5).map(|_| it.next().unwrap().pairs[0].src[0]).collect();
        assert_eq!(firsts, vec![10, 11, 10, 11, 10]);
    }

    #[test]
    fn test_shuffled_pass_visits_every_example_once() {
        let mut it = BucketIterator::shuffled(dataset(7), Seq2SeqBatcher::<TB>::new(Default::default(), 1), 3, 42);
        let mut seen: Vec<u32> = (0..it.batches_per_pass())
            .flat_map(|_| it.next().unwrap().pairs.into_iter().map(|p| p.src[0]))
            .collect();
        seen.sort();
        assert_eq!(seen, (10..17).collect::<Vec<_>>());
    }

    #[test]
    fn test_empty_dataset_yields_nothing() {
        let mut it = BucketIterator::sequential(dataset(0), Seq2SeqBatcher::<TB>::new(Default::default(), 1), 4);
        assert!(it.next().is_none());
    }
}
