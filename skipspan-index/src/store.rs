//! Stable-identity storage for stored interval copies
//!
//! The index stores intervals as a multiset: two equal intervals are two
//! distinct entries, and the bucket indices must be able to tell the
//! copies apart. The store hands out an opaque [`IntervalHandle`] per
//! copy; handle equality is slot identity, not interval equality. Slots
//! never move, so a handle stays valid until the copy it names is erased,
//! regardless of other insertions and removals. Freed slots are recycled
//! through a free list.

use skipspan_core::Interval;

/// Identity of one stored interval copy
///
/// Two handles compare equal only when they name the same stored copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct IntervalHandle(usize);

/// Arena of stored interval copies with stable addresses
#[derive(Debug)]
pub(crate) struct IntervalStore<V> {
    slots: Vec<Option<Interval<V>>>,
    free: Vec<usize>,
    len: usize,
}

impl<V: PartialOrd + Copy> IntervalStore<V> {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    /// Stores a copy of `interval` and returns its handle
    pub(crate) fn push(&mut self, interval: Interval<V>) -> IntervalHandle {
        self.len += 1;
        match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(interval);
                IntervalHandle(slot)
            }
            None => {
                self.slots.push(Some(interval));
                IntervalHandle(self.slots.len() - 1)
            }
        }
    }

    /// Resolves a handle to the interval it names
    ///
    /// A handle always outlives the copy it names while that copy is
    /// stored; resolving a stale handle is a bug in the index and aborts.
    pub(crate) fn get(&self, handle: IntervalHandle) -> &Interval<V> {
        self.slots[handle.0]
            .as_ref()
            .expect("stale interval handle")
    }

    /// Removes the copy named by `handle`, freeing its slot for reuse
    pub(crate) fn erase(&mut self, handle: IntervalHandle) -> Interval<V> {
        let interval = self.slots[handle.0]
            .take()
            .expect("stale interval handle");
        self.free.push(handle.0);
        self.len -= 1;
        interval
    }

    /// Number of stored copies
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Iterates over all stored copies in unspecified but stable order
    pub(crate) fn iter(&self) -> impl Iterator<Item = &Interval<V>> {
        self.slots.iter().filter_map(|slot| slot.as_ref())
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.len = 0;
    }

    /// Iterates over `(handle, interval)` pairs, for structural audits
    #[cfg(test)]
    pub(crate) fn iter_handles(&self) -> impl Iterator<Item = (IntervalHandle, &Interval<V>)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|iv| (IntervalHandle(i), iv)))
    }
}
