// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting services the training core consumes:
//
//   checkpoint.rs  — encoder/decoder pair, history and config
//                    persistence (Burn NamedMpkGzFileRecorder)
//   vocab_store.rs — source/target vocabularies as tokenizer.json
//   rouge.rs       — ROUGE-1 F1, the reward and held-out metric
//   metrics.rs     — per-evaluation CSV rows
//
// Reference: Rust Book §7 (Modules)
//            Burn Book §5 (Checkpointing)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Vocabulary building, saving, and loading
pub mod vocab_store;

/// ROUGE-1 reward scorer
pub mod rouge;

/// Evaluation metrics CSV logger
pub mod metrics;
