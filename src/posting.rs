// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

/// Record offsets collected by a lookup
///
/// Not persisted. Order is whatever produced it: chain order for a single-key
/// lookup, ascending for an intersection.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PostingList(Vec<u64>);

impl PostingList {
    /// Creates an empty posting list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of offsets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the list holds no offset.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the offsets as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[u64] {
        &self.0
    }

    /// Iterates over the offsets.
    pub fn iter(&self) -> std::slice::Iter<'_, u64> {
        self.0.iter()
    }

    /// Appends offsets.
    pub fn extend_from_slice(&mut self, offsets: &[u64]) {
        self.0.extend_from_slice(offsets);
    }

    /// Sorts ascending and drops duplicates.
    #[must_use]
    pub fn into_sorted_set(mut self) -> Self {
        self.0.sort_unstable();
        self.0.dedup();
        self
    }

    /// Returns the offsets present in both lists, ascending and without duplicates.
    ///
    /// Offsets from different indices address the same record store,
    /// so an equal offset means the very same record.
    #[must_use]
    pub fn intersect(mut self, mut other: Self) -> Self {
        self.0.sort_unstable();
        other.0.sort_unstable();
        Self(intersect_sorted(&self.0, &other.0))
    }

    /// Consumes the list, returning the inner vector.
    #[must_use]
    pub fn into_vec(self) -> Vec<u64> {
        self.0
    }
}

/// Two-pointer merge intersection of two ascending slices.
///
/// Each common value is emitted once, even if repeated in both inputs.
#[must_use]
pub fn intersect_sorted(a: &[u64], b: &[u64]) -> Vec<u64> {
    let mut out = Vec::with_capacity(a.len().min(b.len()));

    let mut a = a.iter().peekable();
    let mut b = b.iter().peekable();

    while let (Some(&&x), Some(&&y)) = (a.peek(), b.peek()) {
        match x.cmp(&y) {
            std::cmp::Ordering::Less => {
                a.next();
            }
            std::cmp::Ordering::Greater => {
                b.next();
            }
            std::cmp::Ordering::Equal => {
                if out.last() != Some(&x) {
                    out.push(x);
                }
                a.next();
                b.next();
            }
        }
    }

    out
}

impl From<Vec<u64>> for PostingList {
    fn from(value: Vec<u64>) -> Self {
        Self(value)
    }
}

impl FromIterator<u64> for PostingList {
    fn from_iter<T: IntoIterator<Item = u64>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for PostingList {
    type Item = u64;
    type IntoIter = std::vec::IntoIter<u64>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a PostingList {
    type Item = &'a u64;
    type IntoIter = std::slice::Iter<'a, u64>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn intersect_basic() {
        assert_eq!(vec![3, 5], intersect_sorted(&[1, 3, 5, 7], &[2, 3, 4, 5]));
        assert_eq!(Vec::<u64>::new(), intersect_sorted(&[1, 2], &[3, 4]));
        assert_eq!(Vec::<u64>::new(), intersect_sorted(&[], &[3, 4]));
        assert_eq!(Vec::<u64>::new(), intersect_sorted(&[1], &[]));
    }

    #[test]
    fn intersect_dedups() {
        assert_eq!(vec![2, 9], intersect_sorted(&[2, 2, 2, 9, 9], &[2, 2, 9]));
    }

    #[test]
    fn intersect_unsorted_lists() {
        let a = PostingList::from(vec![40, 10, 30, 10]);
        let b = PostingList::from(vec![30, 20, 10]);

        assert_eq!(vec![10, 30], a.clone().intersect(b.clone()).into_vec());
        assert_eq!(b.intersect(a).into_vec(), vec![10, 30]);
    }

    #[test]
    fn sorted_set() {
        let list: PostingList = [5, 1, 5, 3, 1].into_iter().collect();
        assert_eq!(&[1, 3, 5], list.into_sorted_set().as_slice());
    }
}
