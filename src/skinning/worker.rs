use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, trace};
use parking_lot::Mutex;

use crate::errors::{Result, RigError};
use crate::settings::RigSettings;

type Job = Box<dyn FnOnce() + Send + 'static>;

struct PoolInner {
    sender: Mutex<Option<flume::Sender<Job>>>,
    threads: Mutex<Vec<JoinHandle<()>>>,
    thread_count: usize,
}

impl Drop for PoolInner {
    fn drop(&mut self) {
        // closing the channel lets every worker fall out of its receive loop
        self.sender.lock().take();
        let current = thread::current().id();
        for handle in self.threads.lock().drain(..) {
            if handle.thread().id() != current {
                let _ = handle.join();
            }
        }
    }
}

/// Fixed set of worker threads fed by a shared job queue.
///
/// Submission is fire-and-forget. Handles are cheap to clone; the threads
/// shut down once the last handle is dropped and the queue drains.
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

impl WorkerPool {
    pub fn new(thread_count: usize) -> Result<Self> {
        let thread_count = thread_count.max(1);
        let (sender, receiver) = flume::unbounded::<Job>();

        let mut threads = Vec::with_capacity(thread_count);
        for i in 0..thread_count {
            let receiver = receiver.clone();
            let handle = thread::Builder::new().name(format!("marionette-worker-{i}")).spawn(move || {
                while let Ok(job) = receiver.recv() {
                    job();
                }
                trace!("worker {i} exiting");
            })?;
            threads.push(handle);
        }
        debug!("Started worker pool with {thread_count} threads");

        Ok(Self {
            inner: Arc::new(PoolInner {
                sender: Mutex::new(Some(sender)),
                threads: Mutex::new(threads),
                thread_count,
            }),
        })
    }

    pub fn from_settings(settings: &RigSettings) -> Result<Self> {
        Self::new(settings.worker_threads)
    }

    #[must_use]
    pub fn thread_count(&self) -> usize {
        self.inner.thread_count
    }

    /// Queues `job` for the next idle worker.
    pub fn submit(&self, job: impl FnOnce() + Send + 'static) -> Result<()> {
        let sender = self.inner.sender.lock();
        let sender = sender.as_ref().ok_or(RigError::WorkerUnavailable)?;
        sender.send(Box::new(job)).map_err(|_| RigError::WorkerUnavailable)
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool").field("thread_count", &self.inner.thread_count).finish()
    }
}
