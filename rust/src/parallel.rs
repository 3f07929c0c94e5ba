//! Bounded fork/join worker pool shared by the concurrent convolutions.
//!
//! Every call joins before returning, so a table written inside
//! [`WorkerPool::for_each_index_init`] is complete once the call returns.

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use std::sync::Arc;

/// Upper bound on worker threads unless configured otherwise.
pub const DEFAULT_WORKER_CAP: usize = 15;

const DEFAULT_CHUNK_SIZE: usize = 64;

/// Minimum number of consecutive indices handed to one worker.
pub fn preferred_chunk_size(total_items: usize) -> usize {
    if total_items == 0 {
        1
    } else {
        DEFAULT_CHUNK_SIZE.min(total_items)
    }
}

/// Worker pool sized to the available parallelism, capped at `worker_cap`.
#[derive(Clone)]
pub struct WorkerPool {
    pool: Arc<ThreadPool>,
    workers: usize,
}

impl WorkerPool {
    pub fn new(worker_cap: usize) -> Result<Self, ThreadPoolBuildError> {
        let available = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let workers = available.min(worker_cap.max(1));
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("pcmax-worker-{}", i))
            .build()?;
        Ok(Self {
            pool: Arc::new(pool),
            workers,
        })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run `op` for every index in `0..len` with per-worker scratch state.
    ///
    /// A worker takes at least `min_len` consecutive indices. Use
    /// [`preferred_chunk_size`] for many cheap items and 1 for a few heavy ones.
    pub fn for_each_index_init<T, INIT, F>(&self, len: usize, min_len: usize, init: INIT, op: F)
    where
        INIT: Fn() -> T + Sync + Send,
        F: Fn(&mut T, usize) + Sync + Send,
    {
        self.pool.install(|| {
            (0..len)
                .into_par_iter()
                .with_min_len(min_len.max(1))
                .for_each_init(init, op)
        });
    }

    /// Map every index in `0..len`, keeping index order in the result.
    pub fn map_collect<T, F>(&self, len: usize, op: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send,
    {
        self.pool
            .install(|| (0..len).into_par_iter().map(op).collect())
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.workers)
            .finish()
    }
}
