//! Coordinator-side gathering of per-partition results.
//!
//! Partition tasks finish in any order. Each partial result is offered to a
//! [`GatherBuffer`] together with its partition index; once every partition has reported,
//! the buffer yields the partials in ascending index order and a [`GatherFn`] reduces them
//! into the action's result:
//! - [`SumCounts`] adds per-partition counts (`count()`)
//! - [`ConcatPartitions`] concatenates per-partition element vectors (`collect()`)
//!
//! The buffer only lives for one action call. When the action aborts it is dropped, so no
//! partial result ever reaches the caller.
//!
//! ```
//! use ironset::gather::{ConcatPartitions, GatherBuffer, GatherFn};
//!
//! let gather = ConcatPartitions::unbounded();
//! let mut buffer = GatherBuffer::new(3);
//! buffer.offer(2, vec![5, 6], &gather).unwrap();
//! buffer.offer(0, vec![1, 2], &gather).unwrap();
//! buffer.offer(1, vec![3, 4], &gather).unwrap();
//!
//! let all = gather.finish(buffer.into_ordered().unwrap());
//! assert_eq!(all, vec![1, 2, 3, 4, 5, 6]);
//! ```

use crate::error::{DatasetError, Result};

/// Reduction of ordered per-partition partials into one action result.
pub trait GatherFn<P>: Send + Sync {
    type Output;

    /// Contribution of `partial` towards [`limit`](GatherFn::limit).
    fn weight(&self, _partial: &P) -> usize {
        0
    }

    /// Maximum total weight the coordinator accepts before aborting the action.
    fn limit(&self) -> Option<usize> {
        None
    }

    /// Combine partials, given in ascending partition-index order.
    fn finish(&self, partials: Vec<P>) -> Self::Output;
}

/// Partials indexed by partition, filled in arrival order.
pub struct GatherBuffer<P> {
    slots: Vec<Option<P>>,
    received: usize,
    weight: usize,
}

impl<P> GatherBuffer<P> {
    #[must_use]
    pub fn new(partitions: usize) -> Self {
        Self {
            slots: (0..partitions).map(|_| None).collect(),
            received: 0,
            weight: 0,
        }
    }

    /// Record the result of `partition`.
    ///
    /// # Errors
    /// - [`DatasetError::Gather`] if `partition` is out of range or already reported
    /// - [`DatasetError::ResultTooLarge`] if the accumulated weight passes `gather`'s limit
    pub fn offer<G: GatherFn<P>>(&mut self, partition: usize, partial: P, gather: &G) -> Result<()> {
        let partitions = self.slots.len();
        let Some(slot) = self.slots.get_mut(partition) else {
            return Err(DatasetError::Gather(format!(
                "partition {partition} out of range 0..{partitions}"
            )));
        };
        if slot.is_some() {
            return Err(DatasetError::Gather(format!(
                "partition {partition} reported twice"
            )));
        }

        let weight = self.weight.saturating_add(gather.weight(&partial));
        if let Some(limit) = gather.limit().filter(|limit| weight > *limit) {
            return Err(DatasetError::ResultTooLarge {
                limit,
                received: weight,
            });
        }

        *slot = Some(partial);
        self.weight = weight;
        self.received += 1;
        Ok(())
    }

    #[must_use]
    pub fn partitions(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn received(&self) -> usize {
        self.received
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.received == self.slots.len()
    }

    /// Partials in ascending partition order.
    ///
    /// # Errors
    /// Returns [`DatasetError::Gather`] naming the first partition that never reported.
    pub fn into_ordered(self) -> Result<Vec<P>> {
        self.slots
            .into_iter()
            .enumerate()
            .map(|(partition, slot)| {
                slot.ok_or_else(|| {
                    DatasetError::Gather(format!("partition {partition} never reported"))
                })
            })
            .collect()
    }
}

/// Sums per-partition element counts.
#[derive(Clone, Copy, Debug, Default)]
pub struct SumCounts;

impl GatherFn<u64> for SumCounts {
    type Output = u64;

    fn finish(&self, partials: Vec<u64>) -> u64 {
        partials.into_iter().sum()
    }
}

/// Concatenates per-partition element vectors, optionally bounded in total length.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConcatPartitions {
    limit: Option<usize>,
}

impl ConcatPartitions {
    #[must_use]
    pub fn new(limit: Option<usize>) -> Self {
        Self { limit }
    }

    #[must_use]
    pub fn unbounded() -> Self {
        Self { limit: None }
    }
}

impl<T> GatherFn<Vec<T>> for ConcatPartitions {
    type Output = Vec<T>;

    fn weight(&self, partial: &Vec<T>) -> usize {
        partial.len()
    }

    fn limit(&self) -> Option<usize> {
        self.limit
    }

    fn finish(&self, partials: Vec<Vec<T>>) -> Vec<T> {
        let total = partials.iter().map(Vec::len).sum();
        let mut out = Vec::with_capacity(total);
        for part in partials {
            out.extend(part);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arrival_order_does_not_affect_result_order() {
        let gather = ConcatPartitions::unbounded();
        let mut buffer = GatherBuffer::new(4);
        for (partition, part) in [(3, vec!['g']), (1, vec!['c', 'd']), (0, vec!['a', 'b']), (2, vec![])] {
            buffer.offer(partition, part, &gather).unwrap();
        }
        assert!(buffer.is_complete());
        let all = gather.finish(buffer.into_ordered().unwrap());
        assert_eq!(all, vec!['a', 'b', 'c', 'd', 'g']);
    }

    #[test]
    fn duplicate_and_out_of_range_reports_are_rejected() {
        let mut buffer = GatherBuffer::new(2);
        buffer.offer(0, 1u64, &SumCounts).unwrap();
        assert!(matches!(buffer.offer(0, 1, &SumCounts), Err(DatasetError::Gather(_))));
        assert!(matches!(buffer.offer(7, 1, &SumCounts), Err(DatasetError::Gather(_))));
        assert_eq!(buffer.received(), 1);
    }

    #[test]
    fn missing_partition_is_an_error() {
        let mut buffer = GatherBuffer::new(2);
        buffer.offer(1, 5u64, &SumCounts).unwrap();
        assert!(!buffer.is_complete());
        assert!(matches!(buffer.into_ordered(), Err(DatasetError::Gather(_))));
    }

    #[test]
    fn limit_is_enforced_on_accumulated_weight() {
        let gather = ConcatPartitions::new(Some(3));
        let mut buffer = GatherBuffer::new(2);
        buffer.offer(0, vec![1, 2], &gather).unwrap();
        let err = buffer.offer(1, vec![3, 4], &gather).unwrap_err();
        assert!(matches!(
            err,
            DatasetError::ResultTooLarge {
                limit: 3,
                received: 4
            }
        ));
    }

    #[test]
    fn counts_sum() {
        assert_eq!(SumCounts.finish(vec![2, 0, 5]), 7);
    }
}
