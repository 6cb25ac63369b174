//! Rust engines for the search pipeline
//!
//! `core` holds the worker pool and buffered I/O primitives, `compute` the
//! matching algorithms and the dispatcher, `storage` the file formats.

pub mod core;
pub mod compute;
pub mod storage;

use crate::engines::compute::ComputeError;

/// Engine operation result type
pub type EngineResult<T> = Result<T, EngineError>;

/// Error types for engine operations
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid sequence data: {0}")]
    InvalidSequenceData(String),

    #[error("No sequences found in {0}")]
    NoSequences(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Thread pool error: {0}")]
    ThreadPool(String),

    #[error(transparent)]
    Compute(#[from] ComputeError),
}

impl From<rayon::ThreadPoolBuildError> for EngineError {
    fn from(e: rayon::ThreadPoolBuildError) -> Self {
        EngineError::ThreadPool(e.to_string())
    }
}
