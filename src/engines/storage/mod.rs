//! Storage and data format handling
//!
//! This module provides the parsers and writers for the file formats the
//! search pipeline reads (FASTA) and writes (FASTA, CSV match tables).

pub mod formats;

/// How an input file is brought into memory before parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageMode {
    /// Read through a large line buffer
    #[default]
    Buffered,
    /// Parse directly from a read-only memory mapping
    MemoryMapped,
}
