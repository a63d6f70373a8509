//! Deterministic assignment of source elements to partitions.
//!
//! Sources use contiguous range assignment: with `len` elements and `p` partitions,
//! every partition receives `len / p` elements and the first `len % p` partitions
//! receive one more. The assignment depends only on `(len, p)`, so re-running an
//! action over the same dataset always produces the same partitions, and
//! concatenating partitions by index reproduces the input order.

use std::ops::Range;

/// Element positions owned by partition `index` out of `partitions`.
///
/// `partitions` must be non-zero. Indices past the last partition yield an empty range.
///
/// ```
/// use ironset::partition::partition_range;
///
/// assert_eq!(partition_range(10, 3, 0), 0..4);
/// assert_eq!(partition_range(10, 3, 1), 4..7);
/// assert_eq!(partition_range(10, 3, 2), 7..10);
/// ```
#[must_use]
pub fn partition_range(len: usize, partitions: usize, index: usize) -> Range<usize> {
    if partitions == 0 || index >= partitions {
        return len..len;
    }
    let base = len / partitions;
    let extra = len % partitions;
    let start = index * base + index.min(extra);
    let size = base + usize::from(index < extra);
    start..start + size
}

/// All partition ranges for `len` elements, in partition-index order.
#[must_use]
pub fn partition_ranges(len: usize, partitions: usize) -> Vec<Range<usize>> {
    (0..partitions)
        .map(|i| partition_range(len, partitions, i))
        .collect()
}
