//! Parallel pattern dispatch
//!
//! Every pattern is an independent unit of work: one worker builds its
//! failure table, scans the whole genome, and appends the matches it found to
//! a shared [`ResultAggregate`] in a single critical section. The genome and
//! the pattern list are borrowed read-only by all workers.
//!
//! Failures stay local to their pattern. An empty pattern is rejected before
//! scheduling, a panicking unit is caught and recorded, and cancellation marks
//! every abandoned or never-started pattern. None of these touch the matches
//! of other patterns, and a unit that does not finish never writes any.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use rayon::ThreadPool;

use super::kmp::kmp_search_cancellable;
use super::{ComputeError, ComputeResult};
use crate::engines::core::parallel::{
    build_thread_pool, CancellationToken, ParallelConfig, WorkQueueScheduler,
};
use crate::engines::EngineResult;

/// One occurrence of a pattern in the genome
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Match {
    /// Index of the pattern in the dispatched pattern list
    pub pattern_index: usize,
    pub pattern: Arc<[u8]>,
    /// Index one past the last matched genome symbol
    pub end: usize,
}

impl Match {
    /// Index of the first matched genome symbol
    pub fn start(&self) -> usize {
        self.end - self.pattern.len()
    }
}

/// A pattern that could not be (fully) processed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternError {
    pub pattern_index: usize,
    pub pattern: Arc<[u8]>,
    pub kind: ComputeError,
}

/// Outcome of a single pattern within a dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternStatus {
    Matched(usize),
    NoMatches,
    Failed(ComputeError),
}

/// Shared sink for matches and per-pattern errors.
///
/// Writers append whole batches under a lock; contents are only read once the
/// aggregate is consumed by [`into_report`](Self::into_report).
#[derive(Debug, Default)]
pub struct ResultAggregate {
    matches: Mutex<Vec<Match>>,
    errors: Mutex<Vec<PatternError>>,
}

impl ResultAggregate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append all matches of one unit of work
    pub fn append_matches(&self, batch: Vec<Match>) {
        if batch.is_empty() {
            return;
        }
        self.matches.lock().extend(batch);
    }

    pub fn record_error(&self, error: PatternError) {
        self.errors.lock().push(error);
    }

    /// Freeze the aggregate into a report
    pub fn into_report(self, pattern_count: usize) -> DispatchReport {
        let errors = self.errors.into_inner();
        let cancelled = errors.iter().any(|e| e.kind == ComputeError::Cancelled);

        DispatchReport {
            matches: self.matches.into_inner(),
            errors,
            cancelled,
            pattern_count,
        }
    }
}

/// Final result of a dispatch: all matches plus the patterns that failed
#[derive(Debug, Clone)]
pub struct DispatchReport {
    /// Matches in no particular order across patterns; left-to-right within
    /// each pattern
    pub matches: Vec<Match>,
    pub errors: Vec<PatternError>,
    /// Whether any pattern was abandoned because of cancellation
    pub cancelled: bool,
    pattern_count: usize,
}

impl DispatchReport {
    /// Number of patterns submitted
    pub fn pattern_count(&self) -> usize {
        self.pattern_count
    }

    /// True when every pattern was processed without error
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }

    /// End indexes found for one pattern, in discovery order
    pub fn matches_for(&self, pattern_index: usize) -> Vec<usize> {
        self.matches
            .iter()
            .filter(|m| m.pattern_index == pattern_index)
            .map(|m| m.end)
            .collect()
    }

    /// Distinguish "no occurrences" from "failed" for one pattern
    pub fn status(&self, pattern_index: usize) -> PatternStatus {
        if let Some(error) = self.errors.iter().find(|e| e.pattern_index == pattern_index) {
            return PatternStatus::Failed(error.kind.clone());
        }

        match self.matches.iter().filter(|m| m.pattern_index == pattern_index).count() {
            0 => PatternStatus::NoMatches,
            n => PatternStatus::Matched(n),
        }
    }

    /// Put matches and errors into (pattern index, position) order
    pub fn sort(&mut self) {
        self.matches.sort_by_key(|m| (m.pattern_index, m.end));
        self.errors.sort_by_key(|e| e.pattern_index);
    }
}

/// A pattern queued for scanning
struct PatternJob {
    index: usize,
    pattern: Arc<[u8]>,
}

/// Runs pattern sets against a genome on a dedicated worker pool
pub struct Dispatcher {
    config: ParallelConfig,
    pool: ThreadPool,
}

impl Dispatcher {
    /// Create a dispatcher with its own thread pool
    pub fn new(config: ParallelConfig) -> EngineResult<Self> {
        let pool = build_thread_pool(&config)?;
        Ok(Self { config, pool })
    }

    pub fn config(&self) -> &ParallelConfig {
        &self.config
    }

    /// Find every occurrence of every pattern in `genome`
    pub fn dispatch<P: AsRef<[u8]>>(&self, genome: &[u8], patterns: &[P]) -> DispatchReport {
        self.dispatch_with_token(genome, patterns, &CancellationToken::new())
    }

    /// Like [`dispatch`](Self::dispatch), stopping early once `token` fires
    pub fn dispatch_with_token<P: AsRef<[u8]>>(
        &self,
        genome: &[u8],
        patterns: &[P],
        token: &CancellationToken,
    ) -> DispatchReport {
        self.dispatch_with(genome, patterns, token, kmp_search_cancellable)
    }

    /// Dispatch with a custom per-pattern scan function
    pub fn dispatch_with<P, F>(
        &self,
        genome: &[u8],
        patterns: &[P],
        token: &CancellationToken,
        scan_fn: F,
    ) -> DispatchReport
    where
        P: AsRef<[u8]>,
        F: Fn(&[u8], &[u8], &CancellationToken) -> ComputeResult<Vec<usize>> + Sync,
    {
        let token = match self.config.timeout {
            Some(timeout) => token.with_timeout(timeout),
            None => token.clone(),
        };

        let aggregate = ResultAggregate::new();
        let jobs = prepare_jobs(genome, patterns, &aggregate);
        let scheduler = WorkQueueScheduler::new(jobs);

        scheduler.execute(&self.pool, &token, |job| {
            run_unit(genome, job, &token, &scan_fn, &aggregate);
        });

        for job in scheduler.take_remaining() {
            aggregate.record_error(PatternError {
                pattern_index: job.index,
                pattern: job.pattern,
                kind: ComputeError::Cancelled,
            });
        }

        let report = aggregate.into_report(patterns.len());
        log_summary(&report);
        report
    }
}

/// Dispatch on a fresh pool sized to the machine
pub fn dispatch<P: AsRef<[u8]>>(genome: &[u8], patterns: &[P]) -> EngineResult<DispatchReport> {
    let dispatcher = Dispatcher::new(ParallelConfig::default())?;
    Ok(dispatcher.dispatch(genome, patterns))
}

/// Run every unit on the calling thread
pub fn dispatch_sequential<P: AsRef<[u8]>>(genome: &[u8], patterns: &[P]) -> DispatchReport {
    let token = CancellationToken::new();
    let aggregate = ResultAggregate::new();

    for job in prepare_jobs(genome, patterns, &aggregate) {
        run_unit(genome, job, &token, &kmp_search_cancellable, &aggregate);
    }

    aggregate.into_report(patterns.len())
}

/// Turn patterns into jobs, recording empty ones as invalid
fn prepare_jobs<P: AsRef<[u8]>>(
    genome: &[u8],
    patterns: &[P],
    aggregate: &ResultAggregate,
) -> Vec<PatternJob> {
    if genome.is_empty() {
        log::warn!("Genome is empty; no pattern can match");
    }

    let mut jobs = Vec::with_capacity(patterns.len());
    for (index, pattern) in patterns.iter().enumerate() {
        let pattern: Arc<[u8]> = Arc::from(pattern.as_ref());

        if pattern.is_empty() {
            aggregate.record_error(PatternError {
                pattern_index: index,
                pattern,
                kind: ComputeError::InvalidPattern(format!("Pattern #{} is empty", index)),
            });
            continue;
        }

        jobs.push(PatternJob { index, pattern });
    }

    jobs
}

/// Scan one pattern and publish its outcome
fn run_unit<F>(
    genome: &[u8],
    job: PatternJob,
    token: &CancellationToken,
    scan_fn: &F,
    aggregate: &ResultAggregate,
) where
    F: Fn(&[u8], &[u8], &CancellationToken) -> ComputeResult<Vec<usize>> + Sync,
{
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| scan_fn(genome, &job.pattern[..], token)))
        .unwrap_or_else(|payload| Err(ComputeError::WorkerFailure(panic_message(payload))));

    match outcome {
        Ok(ends) => {
            log::debug!(
                "Pattern #{} ({} bp): {} matches",
                job.index,
                job.pattern.len(),
                ends.len()
            );
            let batch = ends
                .into_iter()
                .map(|end| Match {
                    pattern_index: job.index,
                    pattern: Arc::clone(&job.pattern),
                    end,
                })
                .collect();
            aggregate.append_matches(batch);
        }
        Err(kind) => {
            if kind != ComputeError::Cancelled {
                log::warn!("Pattern #{} failed: {}", job.index, kind);
            }
            aggregate.record_error(PatternError {
                pattern_index: job.index,
                pattern: job.pattern,
                kind,
            });
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn log_summary(report: &DispatchReport) {
    log::info!(
        "Dispatched {} patterns: {} matches, {} errors{}",
        report.pattern_count(),
        report.matches.len(),
        report.errors.len(),
        if report.cancelled { " (cancelled)" } else { "" }
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::compute::kmp::{kmp_search, kmp_search_interruptible, CANCEL_CHECK_INTERVAL};
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};
    use std::collections::HashSet;
    use std::time::Duration;

    fn dispatcher(threads: usize) -> Dispatcher {
        Dispatcher::new(ParallelConfig::default().with_num_threads(threads)).unwrap()
    }

    fn random_dna(rng: &mut StdRng, len: usize) -> Vec<u8> {
        (0..len).map(|_| *b"ACGT".choose(rng).unwrap()).collect()
    }

    fn sorted(mut matches: Vec<Match>) -> Vec<Match> {
        matches.sort();
        matches
    }

    #[test]
    fn test_dispatch_single_pattern() {
        let report = dispatcher(2).dispatch(b"ABABDABACDABABCABAB", &["ABABCABAB"]);

        assert!(report.is_complete());
        assert_eq!(report.matches.len(), 1);
        assert_eq!(report.matches[0].end, 19);
        assert_eq!(report.matches[0].start(), 10);
        assert_eq!(&*report.matches[0].pattern, b"ABABCABAB");
    }

    #[test]
    fn test_dispatch_keeps_per_pattern_order() {
        let report = dispatcher(4).dispatch(b"AAAAACGTAAAA", &["AA", "CGT", "TTT"]);

        assert_eq!(report.matches_for(0), vec![2, 3, 4, 5, 10, 11, 12]);
        assert_eq!(report.matches_for(1), vec![8]);
        assert_eq!(report.status(0), PatternStatus::Matched(7));
        assert_eq!(report.status(2), PatternStatus::NoMatches);
    }

    #[test]
    fn test_dispatch_empty_genome() {
        let report = dispatcher(2).dispatch(b"", &["A", "ACGT"]);

        assert!(report.matches.is_empty());
        assert!(report.is_complete());
        assert_eq!(report.status(1), PatternStatus::NoMatches);
    }

    #[test]
    fn test_empty_pattern_is_rejected_not_skipped() {
        let patterns: Vec<&[u8]> = vec![&b"ACG"[..], &b""[..], &b"ACGTACGTACGT"[..]];
        let report = dispatcher(2).dispatch(b"ACGTACG", &patterns);

        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].pattern_index, 1);
        assert!(matches!(report.errors[0].kind, ComputeError::InvalidPattern(_)));
        assert!(matches!(report.status(1), PatternStatus::Failed(ComputeError::InvalidPattern(_))));

        // Siblings are unaffected; the long pattern is a zero-match success
        assert_eq!(report.matches_for(0), vec![3, 7]);
        assert_eq!(report.status(2), PatternStatus::NoMatches);
        assert!(!report.cancelled);
    }

    #[test]
    fn test_worker_panic_is_isolated() {
        let patterns = ["ACG", "GGG", "CGT"];
        let report = dispatcher(3).dispatch_with(
            b"ACGTACGT",
            &patterns,
            &CancellationToken::new(),
            |genome, pattern, _token| {
                if pattern == b"GGG" {
                    panic!("corrupt unit");
                }
                kmp_search(genome, pattern)
            },
        );

        assert_eq!(report.errors.len(), 1);
        assert_eq!(
            report.errors[0].kind,
            ComputeError::WorkerFailure("corrupt unit".to_string())
        );
        assert_eq!(report.matches_for(0), vec![3, 7]);
        assert_eq!(report.matches_for(2), vec![4, 8]);
        assert!(report.matches_for(1).is_empty());
    }

    #[test]
    fn test_cancelled_before_start() {
        let token = CancellationToken::new();
        token.cancel();

        let report = dispatcher(2).dispatch_with_token(b"ACGTACGT", &["AC", "GT", ""], &token);

        assert!(report.cancelled);
        assert!(report.matches.is_empty());
        assert_eq!(report.errors.len(), 3);
        assert_eq!(report.status(0), PatternStatus::Failed(ComputeError::Cancelled));
        assert!(matches!(report.status(2), PatternStatus::Failed(ComputeError::InvalidPattern(_))));
    }

    #[test]
    fn test_cancel_mid_run_stops_scheduling() {
        let token = CancellationToken::new();
        let report = dispatcher(1).dispatch_with(
            b"ACGTACGT",
            &["AC", "GT", "TA"],
            &token,
            |genome, pattern, token| {
                let found = kmp_search(genome, pattern);
                token.cancel();
                found
            },
        );

        // The single worker finishes its unit, then stops pulling work
        assert_eq!(report.matches_for(0), vec![2, 6]);
        assert_eq!(report.status(1), PatternStatus::Failed(ComputeError::Cancelled));
        assert_eq!(report.status(2), PatternStatus::Failed(ComputeError::Cancelled));
        assert!(report.cancelled);
    }

    #[test]
    fn test_timeout_cancels_dispatch() {
        let config = ParallelConfig::default()
            .with_num_threads(2)
            .with_timeout(Duration::ZERO);
        let report = Dispatcher::new(config).unwrap().dispatch(b"ACGTACGT", &["AC", "GT"]);

        assert!(report.cancelled);
        assert!(report.matches.is_empty());
        assert_eq!(report.errors.len(), 2);
    }

    #[test]
    fn test_timeout_leaves_caller_token_usable() {
        let caller = CancellationToken::new();
        let timed = Dispatcher::new(
            ParallelConfig::default()
                .with_num_threads(2)
                .with_timeout(Duration::ZERO),
        )
        .unwrap();

        let report = timed.dispatch_with_token(b"ACGTACGT", &["AC", "GT"], &caller);
        assert!(report.cancelled);
        assert!(!caller.is_cancelled());

        let report = dispatcher(2).dispatch_with_token(b"ACGTACGT", &["AC", "GT"], &caller);
        assert!(report.is_complete());
        assert_eq!(report.matches_for(0), vec![2, 6]);
        assert_eq!(report.matches_for(1), vec![4, 8]);
    }

    #[test]
    fn test_cancel_abandons_in_flight_unit() {
        let genome: Vec<u8> = b"ACGT".iter().cycle().take(CANCEL_CHECK_INTERVAL * 3).copied().collect();
        assert!(!kmp_search(&genome[..CANCEL_CHECK_INTERVAL], b"GTAC").unwrap().is_empty());

        let token = CancellationToken::new();
        let report = dispatcher(1).dispatch_with(&genome, &["GTAC", "ACGT"], &token, |genome, pattern, token| {
            // Cancel once the first chunk has been scanned
            let mut polls = 0;
            kmp_search_interruptible(genome, pattern, || {
                polls += 1;
                if polls == 2 {
                    token.cancel();
                }
                token.is_cancelled()
            })
        });

        assert!(report.cancelled);
        assert!(report.matches_for(0).is_empty());
        assert!(report.matches.is_empty());
        assert_eq!(report.status(0), PatternStatus::Failed(ComputeError::Cancelled));
        assert_eq!(report.status(1), PatternStatus::Failed(ComputeError::Cancelled));
    }

    #[test]
    fn test_duplicate_patterns_are_separate_units() {
        let report = dispatcher(2).dispatch(b"ACAC", &["AC", "AC"]);

        assert_eq!(report.matches_for(0), vec![2, 4]);
        assert_eq!(report.matches_for(1), vec![2, 4]);
        assert_eq!(report.matches.len(), 4);
    }

    #[test]
    fn test_dispatch_is_idempotent() {
        let mut rng = StdRng::seed_from_u64(7);
        let genome = random_dna(&mut rng, 2_000);
        let patterns: Vec<Vec<u8>> = (0..50).map(|_| random_dna(&mut rng, 4)).collect();

        let dispatcher = dispatcher(4);
        let first = dispatcher.dispatch(&genome, &patterns);
        let second = dispatcher.dispatch(&genome, &patterns);

        assert_eq!(sorted(first.matches), sorted(second.matches));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let mut rng = StdRng::seed_from_u64(42);
        let genome = random_dna(&mut rng, 10_000);

        let mut seen = HashSet::new();
        let mut patterns = Vec::new();
        while patterns.len() < 1000 {
            let len = rng.gen_range(3..=8);
            let pattern = random_dna(&mut rng, len);
            if seen.insert(pattern.clone()) {
                patterns.push(pattern);
            }
        }

        let parallel = dispatcher(8).dispatch(&genome, &patterns);
        let sequential = dispatch_sequential(&genome, &patterns);

        assert!(parallel.is_complete());
        assert_eq!(parallel.pattern_count(), 1000);
        assert!(!sequential.matches.is_empty());
        assert_eq!(sorted(parallel.matches), sorted(sequential.matches));
    }

    #[test]
    fn test_report_sort() {
        let mut report = dispatcher(4).dispatch(b"ACGTACGT", &["GT", "AC", ""]);
        report.sort();

        let order: Vec<(usize, usize)> = report.matches.iter().map(|m| (m.pattern_index, m.end)).collect();
        assert_eq!(order, vec![(0, 4), (0, 8), (1, 2), (1, 6)]);
    }
}
