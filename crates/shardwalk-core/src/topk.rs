//! # Top-K Selection
//!
//! Keeps the best `limit` items seen so far under an explicit comparator.
//! `compare(a, b) == Ordering::Less` means `a` ranks before `b`.
//!
//! Items are held sorted best-first; a push that would land past the limit
//! is rejected without allocating. Ties keep insertion order.

use std::cmp::Ordering;

/// Bounded best-first selection.
pub struct TopK<T, F>
where
    F: Fn(&T, &T) -> Ordering,
{
    limit: usize,
    items: Vec<T>,
    compare: F,
}

impl<T, F> TopK<T, F>
where
    F: Fn(&T, &T) -> Ordering,
{
    /// Keep at most `limit` items ranked by `compare`.
    pub fn new(limit: usize, compare: F) -> Self {
        Self {
            limit,
            items: Vec::with_capacity(limit.min(1024)),
            compare,
        }
    }

    /// Offer an item. Returns whether it was kept.
    pub fn push(&mut self, item: T) -> bool {
        if self.limit == 0 {
            return false;
        }
        let pos = self
            .items
            .partition_point(|held| (self.compare)(held, &item) != Ordering::Greater);
        if pos >= self.limit {
            return false;
        }
        self.items.insert(pos, item);
        self.items.truncate(self.limit);
        true
    }

    /// Whether `limit` items are held.
    pub fn is_full(&self) -> bool {
        self.items.len() >= self.limit
    }

    /// Number of items held.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether nothing is held.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The worst item held, if any.
    pub fn last(&self) -> Option<&T> {
        self.items.last()
    }

    /// Items best-first.
    pub fn into_sorted_vec(self) -> Vec<T> {
        self.items
    }
}

impl<T, F> Extend<T> for TopK<T, F>
where
    F: Fn(&T, &T) -> Ordering,
{
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.push(item);
        }
    }
}
