// ============================================================
// Layer 4 — Seq2Seq Batcher
// ============================================================
// Implements Burn's Batcher trait to turn a Vec<EncodedPair> into
// padded id tensors on the target device.
//
// Two things happen here that the recurrent models rely on:
//   - every batch is ordered by TRUE source length, longest first
//     (the packed-sequence convention the encoder masks with)
//   - shorter sequences are right-padded with <pad>
//
// Shapes (burn is batch-first):
//   src: [batch_size, max_src_len]   trg: [batch_size, max_trg_len]

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
    tensor::TensorData,
};

use crate::data::dataset::EncodedPair;

/// A padded batch ready for the encoder/decoder forward passes.
#[derive(Debug, Clone)]
pub struct Seq2SeqBatch<B: Backend> {
    /// Source ids — [batch_size, max_src_len]
    pub src: Tensor<B, 2, Int>,
    /// True source lengths, non-increasing
    pub src_lengths: Vec<usize>,

    /// Target ids `<sos> .. <eos> <pad>..` — [batch_size, max_trg_len]
    pub trg: Tensor<B, 2, Int>,
    pub trg_lengths: Vec<usize>,

    /// Unpadded host copies, in the same (sorted) order as the tensors.
    /// Used for per-example decoding and for ground-truth strings.
    pub pairs: Vec<EncodedPair>,
}

impl<B: Backend> Seq2SeqBatch<B> {
    pub fn batch_size(&self) -> usize {
        self.pairs.len()
    }
}

#[derive(Clone, Debug)]
pub struct Seq2SeqBatcher<B: Backend> {
    device: B::Device,
    pad_id: u32,
}

impl<B: Backend> Seq2SeqBatcher<B> {
    pub fn new(device: B::Device, pad_id: u32) -> Self {
        Self { device, pad_id }
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }
}

/// Flatten `rows` into a `[rows.len(), width]` tensor, padding with `pad`.
pub fn pad_to_tensor<B: Backend>(
    rows:   &[&[u32]],
    pad:    u32,
    device: &B::Device,
) -> Tensor<B, 2, Int> {
    let width = rows.iter().map(|r| r.len()).max().unwrap_or(0);
    let flat: Vec<i32> = rows
        .iter()
        .flat_map(|r| {
            r.iter()
                .copied()
                .chain(std::iter::repeat(pad).take(width - r.len()))
                .map(|id| id as i32)
        })
        .collect();

    Tensor::from_data(TensorData::new(flat, [rows.len(), width]), device)
}

impl<B: Backend> Batcher<EncodedPair, Seq2SeqBatch<B>> for Seq2SeqBatcher<B> {
    fn batch(&self, mut items: Vec<EncodedPair>) -> Seq2SeqBatch<B> {
        // Stable sort: equal lengths keep their sampled order
        items.sort_by(|a, b| b.src.len().cmp(&a.src.len()));

        let src_rows: Vec<&[u32]> = items.iter().map(|p| p.src.as_slice()).collect();
        let trg_rows: Vec<&[u32]> = items.iter().map(|p| p.trg.as_slice()).collect();

        Seq2SeqBatch {
            src:         pad_to_tensor(&src_rows, self.pad_id, &self.device),
            src_lengths: src_rows.iter().map(|r| r.len()).collect(),
            trg:         pad_to_tensor(&trg_rows, self.pad_id, &self.device),
            trg_lengths: trg_rows.iter().map(|r| r.len()).collect(),
            pairs:       items,
        }
    }
}
