// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types and traits describing what the system works
// with: a source/target text pair, and the two collaborators the
// training core consumes as opaque services (an example source
// and a reward scorer).
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits

// A raw (source, target) text pair
pub mod example;

// Core abstractions (traits) that other layers implement
pub mod traits;

// Training progress persisted across runs
pub mod history;
