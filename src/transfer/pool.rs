//! Transfer worker pool

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Sender};

use crate::error::{CloudError, Result};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Bounded pool of worker threads for chunked transfers
///
/// ## Concurrency:
/// - Jobs are queued on an unbounded crossbeam channel
/// - `threads` workers pull jobs until the pool is dropped
/// - Dropping the pool drains queued jobs, then joins every worker
pub struct TransferPool {
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl TransferPool {
    /// Spawn a pool with `threads` workers
    pub fn new(threads: usize) -> Result<Self> {
        if threads == 0 {
            return Err(CloudError::Config(
                "transfer pool needs at least one thread".to_string(),
            ));
        }

        let (sender, receiver) = channel::unbounded::<Job>();
        let mut workers = Vec::with_capacity(threads);

        for id in 0..threads {
            let receiver = receiver.clone();
            let handle = thread::Builder::new()
                .name(format!("cloudstore-transfer-{}", id))
                .spawn(move || {
                    for job in receiver.iter() {
                        if catch_unwind(AssertUnwindSafe(job)).is_err() {
                            tracing::error!(worker = id, "transfer job panicked");
                        }
                    }
                })?;
            workers.push(handle);
        }

        tracing::debug!(threads, "transfer pool started");

        Ok(Self {
            sender: Some(sender),
            workers,
        })
    }

    /// Number of worker threads
    pub fn threads(&self) -> usize {
        self.workers.len()
    }

    /// Queue a job
    pub fn execute<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| CloudError::Transfer("transfer pool is shut down".to_string()))?;
        sender
            .send(Box::new(job))
            .map_err(|_| CloudError::Transfer("transfer pool workers exited".to_string()))
    }
}

impl std::fmt::Debug for TransferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferPool")
            .field("threads", &self.threads())
            .finish()
    }
}

impl Drop for TransferPool {
    fn drop(&mut self) {
        // Closing the channel ends each worker's receive loop
        self.sender.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}
