// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from JSON-lines files to padded id tensors.
//
// The pipeline flows in this order:
//
//   train.jsonl / test.jsonl
//       │
//       ▼
//   JsonlLoader       → reads {"src", "trg"} pairs
//       │
//       ▼
//   split_train_test  → only when there is no test.jsonl
//       │
//       ▼
//   Preprocessor      → cleans text (whitespace, case, truncation)
//       │
//       ▼
//   Vocabulary        → words to ids, reserved <unk> <pad> <sos> <eos>
//       │
//       ▼
//   Seq2SeqDataset    → implements Burn's Dataset trait
//       │
//       ▼
//   Seq2SeqBatcher    → length-sorted, padded tensor batches
//       │
//       ▼
//   BucketIterator    → endless batch stream for the training loop
//
// Reference: Burn Book §4 (Datasets and Dataloaders)
//            Rust Book §13 (Iterators and Closures)

/// Reads source/target pairs from JSON-lines files
pub mod loader;

/// Cleans and normalises raw text
pub mod preprocessor;

/// Word-level vocabularies
pub mod vocab;

/// Implements Burn's Dataset trait for encoded pairs
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Cycling batch iterator
pub mod iterator;

/// Seeded train/held-out split
pub mod splitter;
