//! Ordered per-node bucket indices over interval handles
//!
//! Every endpoint node carries the same pair of ordered indices over the
//! handles localized to it: one sorted from the lower bounds, one from the
//! upper bounds. The orders are chosen so that the entries containing a
//! query point form a prefix: scanning from the front and stopping at the
//! first miss visits exactly the matching entries. The trailing comparator
//! keys only make lookup by interval value deterministic; they carry no
//! semantics of their own.
//!
//! Handles are opaque, so every operation takes the interval store to
//! resolve them against.

use std::cmp::Ordering;

use skipspan_core::Interval;

use crate::store::{IntervalHandle, IntervalStore};

/// Order of the lower-bound index: `inf` ascending, closed bound before
/// open on ties, then `sup` ascending and open upper bound first.
fn by_inf_order<V: PartialOrd + Copy>(a: &Interval<V>, b: &Interval<V>) -> Ordering {
    if a.inf() != b.inf() {
        return if a.inf() < b.inf() {
            Ordering::Less
        } else {
            Ordering::Greater
        };
    }
    if a.inf_closed() != b.inf_closed() {
        return if a.inf_closed() {
            Ordering::Less
        } else {
            Ordering::Greater
        };
    }
    if a.sup() != b.sup() {
        return if a.sup() < b.sup() {
            Ordering::Less
        } else {
            Ordering::Greater
        };
    }
    if a.sup_closed() != b.sup_closed() {
        return if b.sup_closed() {
            Ordering::Less
        } else {
            Ordering::Greater
        };
    }
    Ordering::Equal
}

/// Order of the upper-bound index: `sup` descending, closed bound before
/// open on ties, then `inf` descending and open lower bound first.
fn by_sup_order<V: PartialOrd + Copy>(a: &Interval<V>, b: &Interval<V>) -> Ordering {
    if a.sup() != b.sup() {
        return if a.sup() > b.sup() {
            Ordering::Less
        } else {
            Ordering::Greater
        };
    }
    if a.sup_closed() != b.sup_closed() {
        return if a.sup_closed() {
            Ordering::Less
        } else {
            Ordering::Greater
        };
    }
    if a.inf() != b.inf() {
        return if a.inf() > b.inf() {
            Ordering::Less
        } else {
            Ordering::Greater
        };
    }
    if a.inf_closed() != b.inf_closed() {
        return if b.inf_closed() {
            Ordering::Less
        } else {
            Ordering::Greater
        };
    }
    Ordering::Equal
}

/// The two ordered handle indices of one endpoint node
#[derive(Debug, Default)]
pub(crate) struct IntervalBuckets {
    by_inf: Vec<IntervalHandle>,
    by_sup: Vec<IntervalHandle>,
}

impl IntervalBuckets {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn len(&self) -> usize {
        debug_assert_eq!(self.by_inf.len(), self.by_sup.len());
        self.by_inf.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.by_inf.is_empty()
    }

    /// Inserts `handle` into both indices
    pub(crate) fn place<V: PartialOrd + Copy>(
        &mut self,
        handle: IntervalHandle,
        store: &IntervalStore<V>,
    ) {
        let interval = store.get(handle);
        let pos = self
            .by_inf
            .partition_point(|&h| by_inf_order(store.get(h), interval) != Ordering::Greater);
        self.by_inf.insert(pos, handle);
        let pos = self
            .by_sup
            .partition_point(|&h| by_sup_order(store.get(h), interval) != Ordering::Greater);
        self.by_sup.insert(pos, handle);
    }

    /// Inserts `handle` if its interval contains the node key or starts
    /// there; reports whether it was taken
    pub(crate) fn place_if_matches<V: PartialOrd + Copy>(
        &mut self,
        key: &V,
        handle: IntervalHandle,
        store: &IntervalStore<V>,
    ) -> bool {
        if store.get(handle).contains_or_inf(key) {
            self.place(handle, store);
            return true;
        }
        false
    }

    /// Removes one handle whose interval equals `probe` by value
    ///
    /// Returns the handle of the removed copy, or `None` when no stored
    /// copy here matches. The handle is removed from both indices; a copy
    /// present in one index but not the other is a corruption and aborts.
    pub(crate) fn erase<V: PartialOrd + Copy>(
        &mut self,
        probe: &Interval<V>,
        store: &IntervalStore<V>,
    ) -> Option<IntervalHandle> {
        let pos = self
            .by_inf
            .partition_point(|&h| by_inf_order(store.get(h), probe) == Ordering::Less);
        if pos >= self.by_inf.len() {
            return None;
        }
        let handle = self.by_inf[pos];
        if by_inf_order(store.get(handle), probe) != Ordering::Equal {
            return None;
        }
        self.by_inf.remove(pos);
        self.remove_from_sup(handle, store);
        Some(handle)
    }

    /// Emits every entry of the lower-bound index whose interval contains
    /// `value`, stopping at the first miss
    pub(crate) fn collect_by_lbound<V, F>(&self, value: &V, store: &IntervalStore<V>, out: &mut F)
    where
        V: PartialOrd + Copy,
        F: FnMut(Interval<V>),
    {
        for &h in &self.by_inf {
            let interval = store.get(h);
            if !interval.contains(value) {
                break;
            }
            out(*interval);
        }
    }

    /// Emits every entry of the upper-bound index whose interval contains
    /// `value`, stopping at the first miss
    pub(crate) fn collect_by_rbound<V, F>(&self, value: &V, store: &IntervalStore<V>, out: &mut F)
    where
        V: PartialOrd + Copy,
        F: FnMut(Interval<V>),
    {
        for &h in &self.by_sup {
            let interval = store.get(h);
            if !interval.contains(value) {
                break;
            }
            out(*interval);
        }
    }

    /// First entry of the lower-bound index: the entry most permissive at
    /// its lower bound; if it does not contain a value, nothing here does
    pub(crate) fn first_by_inf(&self) -> Option<IntervalHandle> {
        self.by_inf.first().copied()
    }

    /// First entry of the upper-bound index: the entry reaching furthest
    /// right
    pub(crate) fn first_by_sup(&self) -> Option<IntervalHandle> {
        self.by_sup.first().copied()
    }

    /// Removes from both indices the lower-bound prefix of entries whose
    /// interval contains `key` or starts there, returning the handles for
    /// re-placement elsewhere
    pub(crate) fn take_lbound_prefix<V: PartialOrd + Copy>(
        &mut self,
        key: &V,
        store: &IntervalStore<V>,
    ) -> Vec<IntervalHandle> {
        let n = self
            .by_inf
            .iter()
            .take_while(|&&h| store.get(h).contains_or_inf(key))
            .count();
        let moved: Vec<IntervalHandle> = self.by_inf.drain(..n).collect();
        for &h in &moved {
            self.remove_from_sup(h, store);
        }
        moved
    }

    /// Mirror of [`Self::take_lbound_prefix`] on the upper-bound index
    pub(crate) fn take_rbound_prefix<V: PartialOrd + Copy>(
        &mut self,
        key: &V,
        store: &IntervalStore<V>,
    ) -> Vec<IntervalHandle> {
        let n = self
            .by_sup
            .iter()
            .take_while(|&&h| store.get(h).contains_or_inf(key))
            .count();
        let moved: Vec<IntervalHandle> = self.by_sup.drain(..n).collect();
        for &h in &moved {
            self.remove_from_inf(h, store);
        }
        moved
    }

    /// Handles of the lower-bound index in order
    pub(crate) fn inf_handles(&self) -> &[IntervalHandle] {
        &self.by_inf
    }

    /// Handles of the upper-bound index in order
    pub(crate) fn sup_handles(&self) -> &[IntervalHandle] {
        &self.by_sup
    }

    fn remove_from_sup<V: PartialOrd + Copy>(
        &mut self,
        handle: IntervalHandle,
        store: &IntervalStore<V>,
    ) {
        let interval = store.get(handle);
        let mut i = self
            .by_sup
            .partition_point(|&h| by_sup_order(store.get(h), interval) == Ordering::Less);
        loop {
            assert!(
                i < self.by_sup.len()
                    && by_sup_order(store.get(self.by_sup[i]), interval) == Ordering::Equal,
                "handle present in lower-bound index but missing from upper-bound index"
            );
            if self.by_sup[i] == handle {
                self.by_sup.remove(i);
                return;
            }
            i += 1;
        }
    }

    fn remove_from_inf<V: PartialOrd + Copy>(
        &mut self,
        handle: IntervalHandle,
        store: &IntervalStore<V>,
    ) {
        let interval = store.get(handle);
        let mut i = self
            .by_inf
            .partition_point(|&h| by_inf_order(store.get(h), interval) == Ordering::Less);
        loop {
            assert!(
                i < self.by_inf.len()
                    && by_inf_order(store.get(self.by_inf[i]), interval) == Ordering::Equal,
                "handle present in upper-bound index but missing from lower-bound index"
            );
            if self.by_inf[i] == handle {
                self.by_inf.remove(i);
                return;
            }
            i += 1;
        }
    }
}
