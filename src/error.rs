//! Error taxonomy for dataset actions.
//!
//! Every action either returns a complete result or exactly one [`DatasetError`]:
//! - [`DatasetError::Configuration`]: invalid settings, raised before any task starts
//! - [`DatasetError::PartitionExecution`]: a partition task failed; the whole action aborted
//! - [`DatasetError::ResultTooLarge`]: the gathered result exceeded the configured collect limit
//! - [`DatasetError::Gather`]: a partial result violated the gather contract (duplicate or
//!   out-of-range partition index)
//!
//! [`DatasetError::Cancelled`] is what sibling tasks report after the coordinator aborted
//! an action. The coordinator swallows it; callers never observe it.

use std::error::Error as StdError;
use thiserror::Error;

/// Boxed cause carried by [`DatasetError::PartitionExecution`].
pub type BoxedCause = Box<dyn StdError + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum DatasetError {
    /// Invalid parallelism, worker pool size, or config file contents.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// A partition task failed while evaluating its share of the action.
    #[error("partition {partition} failed: {source}")]
    PartitionExecution {
        /// Index of the first partition observed to fail.
        partition: usize,
        #[source]
        source: BoxedCause,
    },

    /// `collect()` gathered more elements than `max_collect_elements` allows.
    #[error("collected result too large: received {received} elements, limit is {limit}")]
    ResultTooLarge { limit: usize, received: usize },

    /// Gather protocol violation.
    #[error("gather error: {0}")]
    Gather(String),

    #[error("partition task cancelled")]
    Cancelled,
}

impl DatasetError {
    /// Wrap a task failure for `partition`.
    pub fn partition(partition: usize, cause: anyhow::Error) -> Self {
        Self::PartitionExecution {
            partition,
            source: cause.into(),
        }
    }

    /// Whether this error is a sibling-cancellation marker.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Whether a task error is only the cancellation marker raised after another task failed.
pub(crate) fn is_cancellation(err: &anyhow::Error) -> bool {
    err.downcast_ref::<DatasetError>()
        .is_some_and(DatasetError::is_cancelled)
}

/// Standard result alias for kernel operations.
pub type Result<T> = std::result::Result<T, DatasetError>;
