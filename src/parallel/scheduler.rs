//! Fixed-size worker pool with chunked dispatch

use crossbeam::channel;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, info};

use crate::error::{ConvertError, Result};

/// Pool of CPU-bound workers that maps a task over a fixed list of items
pub struct WorkerPool {
    pool: ThreadPool,
    workers: usize,
    chunk_size: usize,
}

impl WorkerPool {
    /// Create a pool with `workers` threads dispatching `chunk_size` items at a time
    pub fn new(workers: usize, chunk_size: usize) -> Result<Self> {
        let workers = workers.max(1);
        let chunk_size = chunk_size.max(1);

        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|index| format!("jpegify-worker-{index}"))
            .build()
            .map_err(|e| ConvertError::pool(format!("Failed to create thread pool: {e}")))?;

        info!("Initializing worker pool with {} workers (chunk size {})", workers, chunk_size);

        Ok(Self {
            pool,
            workers,
            chunk_size,
        })
    }

    /// Number of worker threads
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Items handed to a worker per dispatch
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Run `task` once for every item and feed each result to `drain`.
    ///
    /// Workers only send results; `drain` runs on the calling thread, so it
    /// may mutate local state freely. Results arrive in completion order.
    /// Returns once every item has been attempted.
    pub fn for_each_chunked<I, T, F, D>(&self, items: &[I], task: F, mut drain: D)
    where
        I: Sync,
        T: Send,
        F: Fn(&I) -> T + Sync,
        D: FnMut(T),
    {
        let (sender, receiver) = channel::unbounded();
        let chunk_size = self.chunk_size;
        let task = &task;

        debug!("Dispatching {} items in chunks of {}", items.len(), chunk_size);

        std::thread::scope(|scope| {
            scope.spawn(move || {
                self.pool.install(move || {
                    items
                        .par_chunks(chunk_size)
                        .for_each_with(sender, |sender, chunk| {
                            for item in chunk {
                                // The receiver lives until every sender is dropped
                                let _ = sender.send(task(item));
                            }
                        });
                });
            });

            for result in receiver.iter() {
                drain(result);
            }
        });
    }
}
