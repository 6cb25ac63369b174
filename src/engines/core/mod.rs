//! Core optimization engine
//!
//! Worker pool, cancellation, and buffered/memory-mapped I/O.

pub mod memory;
pub mod parallel;
pub mod io;
