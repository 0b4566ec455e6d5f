// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// The training core and everything else that touches tensors.
//
// What's in this layer:
//
//   model.rs         — GRU encoder with length masking, GRU
//                      decoder with Luong attention
//   loss.rs          — teacher-forced cross-entropy, padding ignored
//   sampler.rs       — greedy / categorical decoding of one input
//   trainer.rs       — one optimiser step: CE + self-critical term
//   evaluator.rs     — held-out loss and corpus ROUGE
//   training_loop.rs — epochs, cadences, checkpoints, history
//   inferencer.rs    — greedy summaries from a saved checkpoint
//   backend.rs       — CPU / accelerator selection
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Rennie et al. (2017) Self-critical Sequence Training

/// Encoder / decoder architecture
pub mod model;

/// Masked cross-entropy
pub mod loss;

/// Autoregressive decoding
pub mod sampler;

/// Per-batch optimisation
pub mod trainer;

/// Held-out evaluation
pub mod evaluator;

/// Run orchestration
pub mod training_loop;

/// Inference from a checkpoint
pub mod inferencer;

/// Device resolution and backend dispatch
pub mod backend;
