//! Sequence module
//!
//! Synthetic sequence generation for test inputs and benchmarks.

pub mod random;

/// Convenience re-exports
pub use random::{generate_records, random_sequence, write_random_fasta, RandomSequenceConfig};
