// ============================================================
// Layer 5 — Supervised Loss
// ============================================================
// Teacher-forced cross-entropy with the padding index ignored:
//
//   decoder input  = trg[:, ..T-1]   (<sos> w1 .. wn)
//   decoder target = trg[:, 1..]     (w1 .. wn <eos>)
//
//   loss = -Σ mask·log p(target) / max(Σ mask, 1)
//
// burn's CrossEntropyLoss averages over every position, padding
// included, so the masked mean is written out here. A target made
// only of padding has Σ mask = 0 and yields exactly 0.

use burn::{prelude::*, tensor::activation::log_softmax};

use crate::data::batcher::Seq2SeqBatch;
use crate::ml::model::Seq2Seq;

/// Mean token cross-entropy over non-pad targets.
///
/// logits: [batch, len, vocab], targets: [batch, len] → [1]
pub fn masked_cross_entropy<B: Backend>(
    logits:  Tensor<B, 3>,
    targets: Tensor<B, 2, Int>,
    pad_id:  u32,
) -> Tensor<B, 1> {
    let [batch, len, vocab] = logits.dims();
    let log_probs = log_softmax(logits.reshape([batch * len, vocab]), 1);
    let targets   = targets.reshape([batch * len, 1]);

    let mask   = targets.clone().equal_elem(pad_id as i32).bool_not().float();
    let picked = log_probs.gather(1, targets);

    let total = (picked * mask.clone()).sum();
    let count = mask.sum().clamp_min(1.0);
    total.neg() / count
}

/// Teacher-forced supervised loss for one padded batch.
pub fn supervised_loss<B: Backend>(
    model:  &Seq2Seq<B>,
    batch:  &Seq2SeqBatch<B>,
    pad_id: u32,
) -> Tensor<B, 1> {
    let [size, trg_len] = batch.trg.dims();

    // drop the last symbol / drop <sos>
    let decoder_inputs = batch.trg.clone().slice([0..size, 0..trg_len - 1]);
    let targets        = batch.trg.clone().slice([0..size, 1..trg_len]);

    let logits = model.forward(batch.src.clone(), &batch.src_lengths, decoder_inputs);
    masked_cross_entropy(logits, targets, pad_id)
}

/// Host copy of a scalar loss tensor.
pub fn scalar<B: Backend>(loss: Tensor<B, 1>) -> f32 {
    loss.into_scalar().elem::<f32>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::TensorData;

    type TB = NdArray;

    fn targets(rows: Vec<i32>, shape: [usize; 2]) -> Tensor<TB, 2, Int> {
        Tensor::from_data(TensorData::new(rows, shape), &Default::default())
    }

    #[test]
    fn test_uniform_logits_give_log_vocab() {
        let logits = Tensor::<TB, 3>::zeros([2, 3, 5], &Default::default());
        let loss   = scalar(masked_cross_entropy(logits, targets(vec![0, 2, 3, 4, 2, 0], [2, 3]), 1));
        assert!((loss - (5.0f32).ln()).abs() < 1e-5);
    }

    #[test]
    fn test_all_pad_targets_give_zero() {
        let logits = Tensor::<TB, 3>::ones([2, 2, 4], &Default::default());
        let loss   = scalar(masked_cross_entropy(logits, targets(vec![1, 1, 1, 1], [2, 2]), 1));
        assert_eq!(loss, 0.0);
        assert!(loss.is_finite());
    }

    #[test]
    fn test_padding_positions_do_not_count() {
        let device = Default::default();
        let values: Vec<f32> = (0..8).map(|v| v as f32 * 0.3).collect();
        let row = Tensor::<TB, 1>::from_data(TensorData::new(values.clone(), [8]), &device);

        // one real position alone
        let single = row.clone().reshape([1, 1, 8]);
        let alone  = scalar(masked_cross_entropy(single, targets(vec![5], [1, 1]), 1));

        // same position followed by a padded one with very different logits
        let noisy  = Tensor::<TB, 1>::from_data(TensorData::new(vec![9.0f32; 8], [8]), &device);
        let padded = Tensor::cat(vec![row, noisy], 0).reshape([1, 2, 8]);
        let masked = scalar(masked_cross_entropy(padded, targets(vec![5, 1], [1, 2]), 1));

        assert!((alone - masked).abs() < 1e-6);
    }
}
