//! Fixed-size worker pool fed through a bounded channel.
//!
//! A dispatcher pushes items into the channel while `limit` worker tasks
//! pull from it. Once cancellation is observed the dispatcher stops sending
//! and workers discard anything still buffered; an item a worker has already
//! started is always finished.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::future::join_all;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, error};

use crate::cancel::CancelSignal;

/// How much of a batch was actually handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Dispatch {
    pub total: usize,
    pub processed: usize,
}

impl Dispatch {
    pub fn skipped(&self) -> usize {
        self.total - self.processed
    }
}

/// Run `handler` over `items` with at most `limit` running at once.
///
/// Returns once every started handler has finished.
pub(crate) async fn run_bounded<T, F, Fut>(
    pool: &'static str,
    items: Vec<T>,
    limit: usize,
    cancel: &CancelSignal,
    handler: F,
) -> Dispatch
where
    T: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let total = items.len();
    if total == 0 {
        return Dispatch {
            total,
            processed: 0,
        };
    }

    let workers = limit.max(1).min(total);
    let (tx, rx) = mpsc::channel::<T>(workers);
    let rx = Arc::new(Mutex::new(rx));
    let handler = Arc::new(handler);
    let processed = Arc::new(AtomicUsize::new(0));

    debug!(pool, workers, items = total, "Starting worker pool");

    let mut handles = Vec::with_capacity(workers);
    for worker_id in 0..workers {
        let rx = Arc::clone(&rx);
        let handler = Arc::clone(&handler);
        let processed = Arc::clone(&processed);
        let cancel = cancel.clone();

        handles.push(tokio::spawn(async move {
            loop {
                let next = rx.lock().await.recv().await;
                let Some(item) = next else { break };
                if cancel.is_cancelled() {
                    continue;
                }
                handler(item).await;
                processed.fetch_add(1, Ordering::Relaxed);
            }
            debug!(pool, worker_id, "Worker finished");
        }));
    }
    // Only workers hold the receiver, so sends fail if every worker is gone.
    drop(rx);

    let mut cancelled = cancel.clone();
    for item in items {
        if cancelled.is_cancelled() {
            break;
        }
        tokio::select! {
            biased;
            _ = cancelled.cancelled() => break,
            sent = tx.send(item) => {
                if sent.is_err() {
                    break;
                }
            }
        }
    }
    drop(tx);

    for joined in join_all(handles).await {
        if let Err(e) = joined {
            error!(pool, error = %e, "Worker task panicked");
        }
    }

    Dispatch {
        total,
        processed: processed.load(Ordering::Relaxed),
    }
}
