//! Concurrent cleanup scheduling for hoover.
//!
//! Fans repositories out to bounded worker pools, evaluates every artifact
//! against the retention policy, deletes what is eligible and folds every
//! outcome into a single [`ResultAggregator`].

pub mod aggregator;
pub mod cancel;
mod pool;
pub mod scheduler;
pub mod worker;

#[cfg(test)]
mod testing;

pub use aggregator::{RepositoryOutcome, ResultAggregator};
pub use cancel::{CancelHandle, CancelSignal, cancellation};
pub use scheduler::{RepositoryScheduler, RunOptions};
pub use worker::{ArtifactWorkerPool, RepositoryReport};
