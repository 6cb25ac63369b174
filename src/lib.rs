//! Parallel Knuth-Morris-Pratt search of many patterns against one genome.
//!
//! Each pattern is scanned independently with its own failure table; the
//! pattern set is fanned out over a fixed-size worker pool and all matches
//! are collected into one [`DispatchReport`].
//!
//! ```no_run
//! use kmp_genome::{Dispatcher, ParallelConfig};
//!
//! let dispatcher = Dispatcher::new(ParallelConfig::default().with_num_threads(4))?;
//! let report = dispatcher.dispatch(b"ABABDABACDABABCABAB", &["ABABCABAB"]);
//! assert_eq!(report.matches_for(0), vec![19]);
//! # Ok::<(), kmp_genome::EngineError>(())
//! ```

pub mod engines;
pub mod modules;

pub use engines::compute::dispatch::{
    dispatch, dispatch_sequential, DispatchReport, Dispatcher, Match, PatternError, PatternStatus,
    ResultAggregate,
};
pub use engines::compute::kmp::{build_lps, kmp_search, scan, KmpMatches};
pub use engines::compute::{ComputeError, ComputeResult};
pub use engines::core::parallel::{CancellationToken, ParallelConfig};
pub use engines::{EngineError, EngineResult};
