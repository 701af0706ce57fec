//! # Serial Job Queue
//!
//! A FIFO executor with concurrency exactly one.
//!
//! ## Overview
//!
//! Jobs are boxed futures pushed through an unbounded `mpsc` channel and run
//! by a single worker task, one after another, in submission order. A job
//! starts only after the previous one has settled. A job that returns an
//! error or panics does not stop the worker; the next job still runs.
//!
//! Two independent queues back the player: one linearizes audio engine
//! mutations, the other runs offline downloads. They never wait on each other.
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::queue::SerialQueue;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let queue = SerialQueue::new("engine");
//!
//! // Fire-and-forget: errors are logged at the job boundary
//! queue.enqueue("warmup", async { Ok::<_, std::io::Error>(()) });
//!
//! // Await a result
//! let answer = queue.run(async { 40 + 2 }).await.unwrap();
//! assert_eq!(answer, 42);
//! # }
//! ```

use crate::error::{Error, Result};
use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Handle to a submitted job's eventual result.
pub struct JobHandle<T> {
    queue: Arc<str>,
    rx: oneshot::Receiver<Result<T>>,
}

impl<T> JobHandle<T> {
    /// Wait for the job to settle.
    ///
    /// Returns [`Error::QueueClosed`] if the queue shut down before the job
    /// ran and [`Error::JobPanicked`] if the job panicked.
    pub async fn wait(self) -> Result<T> {
        self.rx
            .await
            .unwrap_or_else(|_| Err(Error::QueueClosed(self.queue.to_string())))
    }
}

/// Single-concurrency FIFO job runner.
///
/// Cloning yields another handle to the same worker.
#[derive(Clone)]
pub struct SerialQueue {
    name: Arc<str>,
    sender: mpsc::UnboundedSender<Job>,
    pending: Arc<AtomicUsize>,
    shutdown: CancellationToken,
}

impl SerialQueue {
    /// Create a queue and spawn its worker on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn new(name: impl Into<String>) -> Self {
        let name: Arc<str> = Arc::from(name.into());
        let (sender, receiver) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicUsize::new(0));
        let shutdown = CancellationToken::new();

        tokio::spawn(Self::worker(
            Arc::clone(&name),
            receiver,
            Arc::clone(&pending),
            shutdown.clone(),
        ));

        Self {
            name,
            sender,
            pending,
            shutdown,
        }
    }

    async fn worker(
        name: Arc<str>,
        mut receiver: mpsc::UnboundedReceiver<Job>,
        pending: Arc<AtomicUsize>,
        shutdown: CancellationToken,
    ) {
        debug!(queue = %name, "Serial queue worker started");
        loop {
            let job = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                job = receiver.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
            };
            job.await;
            pending.fetch_sub(1, Ordering::SeqCst);
        }

        receiver.close();
        while receiver.try_recv().is_ok() {
            pending.fetch_sub(1, Ordering::SeqCst);
        }
        debug!(queue = %name, "Serial queue worker stopped");
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Jobs submitted but not yet settled, including the running one.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled() || self.sender.is_closed()
    }

    /// Submit a job and get a handle to its result.
    pub fn submit<F, T>(&self, fut: F) -> JobHandle<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let queue = Arc::clone(&self.name);
        let job_queue = Arc::clone(&self.name);

        let job: Job = Box::pin(async move {
            let outcome = match AssertUnwindSafe(fut).catch_unwind().await {
                Ok(value) => Ok(value),
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    error!(queue = %job_queue, %message, "Job panicked");
                    Err(Error::JobPanicked(message))
                }
            };
            // The submitter may have stopped waiting
            let _ = tx.send(outcome);
        });

        self.pending.fetch_add(1, Ordering::SeqCst);
        if self.shutdown.is_cancelled() || self.sender.send(job).is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            warn!(queue = %self.name, "Job submitted to a closed queue");
        }

        JobHandle { queue, rx }
    }

    /// Submit a job and wait for it to settle.
    pub async fn run<F, T>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        self.submit(fut).wait().await
    }

    /// Submit a fallible job without waiting. Failures are logged here and
    /// go no further.
    pub fn enqueue<F, E>(&self, label: &'static str, fut: F)
    where
        F: Future<Output = std::result::Result<(), E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let queue = Arc::clone(&self.name);
        self.submit(async move {
            if let Err(err) = fut.await {
                warn!(queue = %queue, job = label, error = %err, "Job failed");
            }
        });
    }

    /// Stop the worker once the running job settles. Queued jobs are dropped
    /// and their handles resolve to [`Error::QueueClosed`].
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

impl fmt::Debug for SerialQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialQueue")
            .field("name", &self.name)
            .field("pending", &self.pending())
            .finish()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
