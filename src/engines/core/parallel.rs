//! Parallel processing primitives
//!
//! This module provides the fixed-size worker pool used to fan independent
//! units of work out across threads, together with cooperative cancellation.
//! Workers pull units from a shared FIFO queue; a unit, once started, runs to
//! completion on the worker that took it unless it observes cancellation.

use std::collections::VecDeque;
use std::fs::File;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};

use crate::engines::{EngineError, EngineResult};

const DEFAULT_THREAD_NAME_PREFIX: &str = "kmp-worker";

/// Get the default number of threads to use
pub fn default_num_threads() -> usize {
    num_cpus::get()
}

/// Worker pool configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParallelConfig {
    /// Number of worker threads in the pool
    pub num_threads: usize,
    /// Prefix for worker thread names (`<prefix>-<idx>`)
    pub thread_name_prefix: String,
    /// Optional wall-clock budget for a whole dispatch, in seconds on disk
    #[serde(with = "timeout_secs")]
    pub timeout: Option<Duration>,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            num_threads: default_num_threads(),
            thread_name_prefix: DEFAULT_THREAD_NAME_PREFIX.to_string(),
            timeout: None,
        }
    }
}

impl ParallelConfig {
    /// Set the number of worker threads (clamped to at least one)
    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = num_threads.max(1);
        self
    }

    /// Set a deadline relative to the start of each dispatch
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Load a configuration from a YAML file; missing keys keep their defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let file = File::open(path.as_ref())?;
        let config: Self = serde_yaml::from_reader(file)
            .map_err(|e| EngineError::Config(format!("{}: {}", path.as_ref().display(), e)))?;
        let num_threads = config.num_threads;
        Ok(config.with_num_threads(num_threads))
    }
}

mod timeout_secs {
    use std::time::Duration;

    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(timeout: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match timeout {
            Some(timeout) => serializer.serialize_some(&timeout.as_secs_f64()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        Option::<f64>::deserialize(deserializer)?
            .map(|secs| Duration::try_from_secs_f64(secs).map_err(de::Error::custom))
            .transpose()
    }
}

/// Build a dedicated thread pool for the given configuration
pub fn build_thread_pool(config: &ParallelConfig) -> EngineResult<ThreadPool> {
    let num_threads = config.num_threads.max(1);
    let prefix = config.thread_name_prefix.clone();

    let pool = ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .thread_name(move |idx| format!("{}-{}", prefix, idx))
        .build()?;

    log::info!("Initialized thread pool with {} threads", num_threads);
    Ok(pool)
}

/// Cooperative cancellation signal shared between a caller and workers.
///
/// Clones share the same flag. A token derived with
/// [`with_deadline`](Self::with_deadline) gets a flag of its own: it observes
/// cancellation of the token it was derived from, but its own expiry or
/// [`cancel`](Self::cancel) never reaches back to that token.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
    parent: Option<Arc<CancellationToken>>,
    deadline: Option<Instant>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive a child token that also expires at `deadline`
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            parent: Some(Arc::new(self.clone())),
            deadline: Some(deadline),
        }
    }

    /// Derive a child token that expires `timeout` from now
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        if self.flag.load(Ordering::Relaxed) {
            return true;
        }
        if matches!(self.deadline, Some(deadline) if Instant::now() >= deadline) {
            self.cancel();
            return true;
        }
        self.parent.as_ref().map_or(false, |parent| parent.is_cancelled())
    }
}

/// FIFO work queue drained by every thread of a pool.
pub struct WorkQueueScheduler<T> {
    /// Work items not yet taken by a worker
    work_items: Mutex<VecDeque<T>>,
    /// Number of work items initially submitted
    total_items: usize,
    /// Number of completed work items
    completed: AtomicUsize,
}

impl<T: Send> WorkQueueScheduler<T> {
    /// Create a new scheduler with the given work items
    pub fn new(work_items: Vec<T>) -> Self {
        let total_items = work_items.len();
        Self {
            work_items: Mutex::new(work_items.into()),
            total_items,
            completed: AtomicUsize::new(0),
        }
    }

    /// Run every queued item through `f` on `pool`, blocking until the queue
    /// is drained or `token` is cancelled. Items left behind by cancellation
    /// can be recovered with [`take_remaining`](Self::take_remaining).
    pub fn execute<F>(&self, pool: &ThreadPool, token: &CancellationToken, f: F)
    where
        F: Fn(T) + Send + Sync,
    {
        let f = &f;
        pool.install(|| {
            rayon::scope(|s| {
                for _ in 0..pool.current_num_threads() {
                    s.spawn(move |_| loop {
                        if token.is_cancelled() {
                            break;
                        }

                        // Release the lock before running the unit
                        let work_item = self.work_items.lock().pop_front();

                        match work_item {
                            Some(item) => {
                                f(item);
                                self.completed.fetch_add(1, Ordering::SeqCst);
                            }
                            None => break,
                        }
                    });
                }
            });
        });
    }

    /// Remove and return the items no worker picked up
    pub fn take_remaining(&self) -> Vec<T> {
        self.work_items.lock().drain(..).collect()
    }

    /// Get the progress of the execution (0.0-1.0)
    pub fn progress(&self) -> f64 {
        if self.total_items == 0 {
            return 1.0;
        }

        let completed = self.completed.load(Ordering::SeqCst);
        completed as f64 / self.total_items as f64
    }

    /// Check if all work items have been processed
    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::SeqCst) == self.total_items
    }
}
