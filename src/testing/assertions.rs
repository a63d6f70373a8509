//! Assertion functions for dataset outputs.
//!
//! Partition-parallel results are ordered by partition index, so a test either compares in
//! order ([`assert_collections_equal`]) or as multisets ([`assert_collections_unordered_equal`]).

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

/// Assert that two collections are equal in order and content.
///
/// # Panics
///
/// Panics if the collections differ in length or content.
///
/// # Example
///
/// ```
/// use ironset::testing::assert_collections_equal;
///
/// assert_collections_equal(&[1, 2, 3], &[1, 2, 3]);
/// ```
pub fn assert_collections_equal<T: Debug + PartialEq>(actual: &[T], expected: &[T]) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "Collection length mismatch:\n  Expected length: {}\n  Actual length: {}\n  Expected: {expected:?}\n  Actual: {actual:?}",
        expected.len(),
        actual.len()
    );

    for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
        assert_eq!(
            a, e,
            "Collection mismatch at index {i}:\n  Expected: {e:?}\n  Actual: {a:?}"
        );
    }
}

/// Assert that two collections hold the same multiset of elements, ignoring order.
///
/// Duplicates count: `[1, 1, 2]` and `[1, 2, 2]` are different.
///
/// # Panics
///
/// Panics if any element occurs a different number of times in the two collections.
///
/// # Example
///
/// ```
/// use ironset::testing::assert_collections_unordered_equal;
///
/// assert_collections_unordered_equal(&[3, 1, 1, 2], &[1, 2, 3, 1]);
/// ```
pub fn assert_collections_unordered_equal<T: Debug + Eq + Hash>(actual: &[T], expected: &[T]) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "Collection length mismatch:\n  Expected length: {}\n  Actual length: {}",
        expected.len(),
        actual.len()
    );

    let actual_counts = multiplicities(actual);
    let expected_counts = multiplicities(expected);
    if actual_counts == expected_counts {
        return;
    }

    let mut missing = Vec::new();
    let mut extra = Vec::new();
    for (item, want) in &expected_counts {
        let got = actual_counts.get(item).copied().unwrap_or(0);
        if got < *want {
            missing.push((*item, want - got));
        }
    }
    for (item, got) in &actual_counts {
        let want = expected_counts.get(item).copied().unwrap_or(0);
        if *got > want {
            extra.push((*item, got - want));
        }
    }
    panic!(
        "Collection content mismatch (element, times):\n  Missing: {missing:?}\n  Extra: {extra:?}"
    );
}

fn multiplicities<T: Eq + Hash>(items: &[T]) -> HashMap<&T, usize> {
    let mut counts = HashMap::with_capacity(items.len());
    for item in items {
        *counts.entry(item).or_insert(0) += 1;
    }
    counts
}

/// Assert that `actual` is exactly the multiset of pairs `(a, b)` for `a` in `left` and
/// `b` in `right`.
///
/// # Panics
///
/// Panics on any missing or surplus pair.
///
/// # Example
///
/// ```
/// use ironset::testing::assert_cross_product;
///
/// assert_cross_product(&[(1, 'b'), (1, 'a'), (2, 'a'), (2, 'b')], &[1, 2], &['a', 'b']);
/// ```
pub fn assert_cross_product<A, B>(actual: &[(A, B)], left: &[A], right: &[B])
where
    A: Debug + Eq + Hash + Clone,
    B: Debug + Eq + Hash + Clone,
{
    let expected: Vec<(A, B)> = left
        .iter()
        .flat_map(|a| right.iter().map(move |b| (a.clone(), b.clone())))
        .collect();
    assert_collections_unordered_equal(actual, &expected);
}

/// Assert that all elements in a collection satisfy a predicate.
///
/// # Panics
///
/// Panics on the first element that does not satisfy the predicate.
///
/// # Example
///
/// ```
/// use ironset::testing::assert_all;
///
/// assert_all(&[2, 4, 6, 8], |x| x % 2 == 0);
/// ```
pub fn assert_all<T: Debug>(collection: &[T], predicate: impl Fn(&T) -> bool) {
    for (i, item) in collection.iter().enumerate() {
        assert!(
            predicate(item),
            "Predicate failed for element at index {i}:\n  Element: {item:?}"
        );
    }
}

/// Assert that a collection has the expected size.
///
/// # Panics
///
/// Panics if the collection size doesn't match.
///
/// # Example
///
/// ```
/// use ironset::testing::assert_collection_size;
///
/// assert_collection_size(&[1, 2, 3], 3);
/// ```
pub fn assert_collection_size<T>(collection: &[T], expected_size: usize) {
    assert_eq!(
        collection.len(),
        expected_size,
        "Collection size mismatch:\n  Expected: {expected_size}\n  Actual: {}",
        collection.len()
    );
}

/// Assert that a collection contains `element`.
///
/// # Panics
///
/// Panics if the element is not found.
pub fn assert_contains<T: Debug + PartialEq>(collection: &[T], element: &T) {
    assert!(
        collection.contains(element),
        "Element not found in collection:\n  Looking for: {element:?}\n  Collection: {collection:?}"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unordered_equality_respects_multiplicity() {
        assert_collections_unordered_equal(&['a', 'b', 'a'], &['a', 'a', 'b']);
    }

    #[test]
    #[should_panic(expected = "Missing")]
    fn unordered_equality_rejects_changed_duplicates() {
        assert_collections_unordered_equal(&[1, 1, 2], &[1, 2, 2]);
    }

    #[test]
    #[should_panic(expected = "length mismatch")]
    fn cross_product_rejects_omissions() {
        assert_cross_product(&[(1, 1)], &[1, 2], &[1]);
    }

    #[test]
    #[should_panic(expected = "index 1")]
    fn ordered_equality_reports_index() {
        assert_collections_equal(&[1, 5, 3], &[1, 2, 3]);
    }
}
