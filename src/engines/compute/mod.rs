//! Compute primitives for pattern search
//!
//! `kmp` holds the failure-table builder and the scanner, `dispatch` fans a
//! pattern set out over the worker pool and aggregates the matches.

pub mod kmp;
pub mod dispatch;

/// Compute operation result type
pub type ComputeResult<T> = Result<T, ComputeError>;

/// Error types for compute operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ComputeError {
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    #[error("Worker failure: {0}")]
    WorkerFailure(String),

    #[error("Operation cancelled")]
    Cancelled,
}
