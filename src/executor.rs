//! Optional parallelism for attribute extraction.
//!
//! A caller hands the catalog an [`Executor`]; every file extraction is
//! submitted up front and the handles are joined in submission order.

use std::sync::mpsc;

use crate::data::model::DatasetRecord;
use crate::error::{CatalogError, Result};

/// Result of extracting one file.
pub type Extraction = Result<DatasetRecord>;

/// A unit of work handed to an [`Executor`].
pub type ExtractTask = Box<dyn FnOnce() -> Extraction + Send + 'static>;

/// Pending result of a submitted task.
pub trait TaskHandle: Send {
    /// Block until the task finishes.
    fn result(self: Box<Self>) -> Extraction;
}

/// Anything that can run independent tasks, e.g. a thread pool.
pub trait Executor: Sync {
    fn submit(&self, task: ExtractTask) -> Box<dyn TaskHandle>;
}

// ---------------------------------------------------------------------------
// WorkerPool
// ---------------------------------------------------------------------------

/// Fixed-size rayon thread pool.
pub struct WorkerPool {
    pool: rayon::ThreadPool,
}

impl WorkerPool {
    /// Start a pool with `threads` workers; `0` lets rayon pick.
    pub fn new(threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("catalog-worker-{i}"))
            .panic_handler(|_| log::error!("extraction task panicked"))
            .build()?;
        Ok(Self { pool })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

struct PoolHandle {
    rx: mpsc::Receiver<Extraction>,
}

impl TaskHandle for PoolHandle {
    fn result(self: Box<Self>) -> Extraction {
        // A closed channel means the task panicked before sending.
        self.rx.recv().unwrap_or(Err(CatalogError::TaskFailed))
    }
}

impl Executor for WorkerPool {
    fn submit(&self, task: ExtractTask) -> Box<dyn TaskHandle> {
        let (tx, rx) = mpsc::sync_channel(1);
        self.pool.spawn(move || {
            let _ = tx.send(task());
        });
        Box::new(PoolHandle { rx })
    }
}
