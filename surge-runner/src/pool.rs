//! Bounded-concurrency worker pool

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::WorkError;

/// Result of one item
#[derive(Debug)]
pub struct Outcome<E> {
    /// Position of the item in the submitted list
    pub index: usize,
    pub result: Result<Duration, WorkError<E>>,
}

/// Runs one operation over many items with at most `parallel` in flight
///
/// `parallel == 0` starts one worker per item.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkerPool {
    parallel: usize,
}

type Queue<I> = Arc<Mutex<VecDeque<(usize, I)>>>;

impl WorkerPool {
    pub fn new(parallel: usize) -> Self {
        Self { parallel }
    }

    /// One worker per item
    pub fn unbounded() -> Self {
        Self::new(0)
    }

    /// Number of workers started for `items` items
    pub fn workers_for(&self, items: usize) -> usize {
        if self.parallel == 0 {
            items
        } else {
            self.parallel.min(items)
        }
    }

    /// Apply `op` to every item
    ///
    /// Outcomes arrive in completion order as they happen; the receiver
    /// closes once every item produced exactly one. After `cancel` fires,
    /// running operations are abandoned and items not started yet are
    /// reported as cancelled.
    pub fn run<I, F, Fut, E>(
        &self,
        items: Vec<I>,
        cancel: &CancellationToken,
        op: F,
    ) -> mpsc::UnboundedReceiver<Outcome<E>>
    where
        I: Send + 'static,
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let workers = self.workers_for(items.len());
        debug!("Starting {} workers for {} items", workers, items.len());

        let queue: Queue<I> = Arc::new(Mutex::new(items.into_iter().enumerate().collect()));
        let op = Arc::new(op);

        for _ in 0..workers {
            tokio::spawn(work(
                queue.clone(),
                op.clone(),
                tx.clone(),
                cancel.clone(),
            ));
        }

        rx
    }

    /// Like [`run`](Self::run), but wait for all outcomes
    pub async fn run_all<I, F, Fut, E>(
        &self,
        items: Vec<I>,
        cancel: &CancellationToken,
        op: F,
    ) -> Vec<Outcome<E>>
    where
        I: Send + 'static,
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Send + 'static,
    {
        let mut outcomes = self.run(items, cancel, op);
        let mut collected = Vec::new();
        while let Some(outcome) = outcomes.recv().await {
            collected.push(outcome);
        }
        collected
    }
}

async fn work<I, F, Fut, E>(
    queue: Queue<I>,
    op: Arc<F>,
    outcomes: mpsc::UnboundedSender<Outcome<E>>,
    cancel: CancellationToken,
) where
    F: Fn(I) -> Fut,
    Fut: Future<Output = Result<(), E>>,
{
    loop {
        // The guard must be gone before the next await
        let next = match queue.lock() {
            Ok(mut queue) => queue.pop_front(),
            Err(poisoned) => poisoned.into_inner().pop_front(),
        };
        let Some((index, item)) = next else {
            return;
        };

        let result = if cancel.is_cancelled() {
            Err(WorkError::Cancelled)
        } else {
            let start = Instant::now();
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(WorkError::Cancelled),
                result = op(item) => result
                    .map(|()| start.elapsed())
                    .map_err(WorkError::Failed),
            }
        };

        // Nobody listening is fine, the work still has to be done
        let _ = outcomes.send(Outcome { index, result });
    }
}
