//! Actions: the operations that execute a dataset.
//!
//! Each call prepares the operator tree, runs every partition, and returns either a complete
//! result or a single [`DatasetError`](crate::DatasetError). A failed action leaves no partial
//! result behind. Actions can be repeated; every run re-evaluates the tree against the
//! environment's config at call time.
//!
//! ## Object reuse
//! With object reuse enabled, sources lend their elements and cross operators overwrite one
//! scratch pair per partition instead of allocating a new one for every combination.
//! - [`Dataset::collect`] clones each element out of such a buffer before it is gathered,
//!   so collected values are independent snapshots in both modes.
//! - [`Dataset::for_each`] hands the visitor a reference straight into the buffer; it is
//!   only valid for the duration of the call, which the borrow checker enforces.

use crate::dataset::{Dataset, Element};
use crate::environment::ActionKind;
use crate::error::Result;

impl<T: Element> Dataset<T> {
    /// Number of elements across all partitions.
    ///
    /// Plain cross products are counted by multiplying operand counts, without enumerating
    /// pairs.
    ///
    /// # Errors
    /// [`DatasetError::PartitionExecution`](crate::DatasetError::PartitionExecution) if any
    /// partition fails.
    pub fn count(&self) -> Result<u64> {
        self.env.run_action(
            ActionKind::Count,
            |runner| {
                let task = self.node.prepare(runner)?;
                let total = runner.count(&task)?;
                Ok((total, task.partitions()))
            },
            |total| *total,
        )
    }

    /// Every element, concatenated in ascending partition-index order.
    ///
    /// With a single partition this is exactly the input order.
    ///
    /// # Errors
    /// - [`DatasetError::PartitionExecution`](crate::DatasetError::PartitionExecution) if any
    ///   partition fails
    /// - [`DatasetError::ResultTooLarge`](crate::DatasetError::ResultTooLarge) if the result
    ///   exceeds `max_collect_elements`
    pub fn collect(&self) -> Result<Vec<T>> {
        self.env.run_action(
            ActionKind::Collect,
            |runner| {
                let task = self.node.prepare(runner)?;
                let all = runner.collect(&task)?;
                Ok((all, task.partitions()))
            },
            |all| all.len() as u64,
        )
    }

    /// [`collect`](Dataset::collect), then sort by value.
    ///
    /// # Errors
    /// Same as [`collect`](Dataset::collect).
    pub fn collect_sorted(&self) -> Result<Vec<T>>
    where
        T: Ord,
    {
        let mut all = self.collect()?;
        all.sort();
        Ok(all)
    }

    /// Stream every element to `visit` on the calling thread, in collect order.
    ///
    /// # Errors
    /// [`DatasetError::PartitionExecution`](crate::DatasetError::PartitionExecution) if any
    /// partition fails. Elements visited before the failure have already been seen.
    pub fn for_each<F>(&self, visit: F) -> Result<()>
    where
        F: FnMut(&T),
    {
        self.env.run_action(
            ActionKind::ForEach,
            |runner| {
                let task = self.node.prepare(runner)?;
                let seen = runner.visit(&task, visit)?;
                Ok((seen, task.partitions()))
            },
            |seen| *seen,
        )?;
        Ok(())
    }
}
