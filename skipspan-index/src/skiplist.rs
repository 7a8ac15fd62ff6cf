//! Interval skip list
//!
//! A randomized, level-linked list of endpoint nodes. Every stored
//! interval is localized to exactly one node's bucket indices, chosen so
//! that a stabbing query only has to inspect the buckets along one
//! top-down walk. Inserting or removing an endpoint node re-buckets
//! intervals across the neighbouring levels to keep that localization
//! intact; the two-phase insert and remove below are that re-bucketing.
//!
//! Expected costs are O(log n) per insert/remove and O(log n + k) per
//! stabbing query emitting k intervals, assuming the geometric level draw
//! stays independent of the keys.

use std::fmt;

use log::{debug, trace};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use skipspan_core::Interval;

use crate::bucket::IntervalBuckets;
use crate::store::{IntervalHandle, IntervalStore};

/// Cap on skip-list height (number of forward-pointer levels)
pub const MAX_LEVEL: usize = 48;

type NodeIdx = usize;

/// A node keyed by one endpoint value
///
/// A node exists while at least one stored interval has its lower bound
/// at `key`; `owner_count` tracks how many. The bucket indices hold the
/// handles localized here, which need not be the owners themselves.
struct EndpointNode<V> {
    key: V,
    owner_count: usize,
    forward: Vec<Option<NodeIdx>>,
    buckets: IntervalBuckets,
}

impl<V> EndpointNode<V> {
    fn new(key: V, height: usize) -> Self {
        Self {
            key,
            owner_count: 0,
            forward: vec![None; height],
            buckets: IntervalBuckets::new(),
        }
    }

    fn height(&self) -> usize {
        self.forward.len()
    }
}

/// A dynamic interval index answering point-stabbing queries
///
/// Stores a multiset of [`Interval`]s and enumerates, for a query point,
/// every stored interval containing it. Intervals may be inserted and
/// removed freely; duplicates are kept as distinct copies.
///
/// Not safe for concurrent mutation: all mutating operations take
/// `&mut self`, queries take `&self`.
///
/// # Example
///
/// ```
/// use skipspan_core::Interval;
/// use skipspan_index::IntervalSkipList;
///
/// let mut index = IntervalSkipList::new();
/// index.insert(Interval::closed(0.0, 10.0)?);
/// index.insert(Interval::new(5.0, 7.0, false, true)?);
///
/// let mut hits = Vec::new();
/// index.find_intervals(&6.0, |i| hits.push(i));
/// assert_eq!(hits.len(), 2);
/// assert!(index.is_contained(&0.0));
/// assert!(!index.is_contained(&11.0));
/// # Ok::<(), skipspan_core::Error>(())
/// ```
pub struct IntervalSkipList<V> {
    header: [Option<NodeIdx>; MAX_LEVEL],
    max_level: usize,
    nodes: Vec<Option<EndpointNode<V>>>,
    free_nodes: Vec<NodeIdx>,
    store: IntervalStore<V>,
    rng: StdRng,
}

impl<V: PartialOrd + Copy> IntervalSkipList<V> {
    /// Creates an empty index with an entropy-seeded level generator
    pub fn new() -> Self {
        Self {
            header: [None; MAX_LEVEL],
            max_level: 0,
            nodes: Vec::new(),
            free_nodes: Vec::new(),
            store: IntervalStore::new(),
            rng: StdRng::from_entropy(),
        }
    }

    /// Reseeds the level generator, for reproducible structure
    pub fn seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Number of stored interval copies
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Returns true if no intervals are stored
    pub fn is_empty(&self) -> bool {
        self.store.len() == 0
    }

    /// Iterates over all stored intervals in unspecified order
    pub fn iter(&self) -> impl Iterator<Item = &Interval<V>> {
        self.store.iter()
    }

    /// Inserts one interval copy
    pub fn insert(&mut self, interval: Interval<V>) {
        let handle = self.store.push(interval);
        self.insert_handle(handle);
    }

    /// Inserts every interval of `intervals`, returning how many
    pub fn insert_many<I>(&mut self, intervals: I) -> usize
    where
        I: IntoIterator<Item = Interval<V>>,
    {
        let mut inserted = 0;
        for interval in intervals {
            self.insert(interval);
            inserted += 1;
        }
        inserted
    }

    /// Removes one stored copy equal to `interval`
    ///
    /// Returns `false`, leaving the index untouched, when no copy
    /// matches. With duplicates stored, exactly one copy is removed.
    pub fn remove(&mut self, interval: &Interval<V>) -> bool {
        let lbound = interval.inf();
        let mut found: Option<IntervalHandle> = None;
        let mut stop_level: Option<usize> = None;
        let mut v: Option<NodeIdx> = None;

        // phase 1: walk toward the owner node, erasing the probe from the
        // first bucket that holds a matching copy
        'walk: for level in (0..=self.max_level).rev() {
            while let Some(next) = self.forward(v, level) {
                if self.node(next).key < lbound {
                    v = Some(next);
                    if found.is_none() {
                        found = self.erase_at(next, interval);
                    }
                } else {
                    break;
                }
            }
            if let Some(next) = self.forward(v, level) {
                if found.is_none() {
                    found = self.erase_at(next, interval);
                }
                if self.node(next).key == lbound {
                    stop_level = Some(level);
                    break 'walk;
                }
            }
        }
        let Some(handle) = found else {
            return false;
        };

        // the owner node exists whenever a copy was stored, and the walk
        // stops at its top level
        let level = stop_level.expect("owner node missing for a stored interval");
        let rm = self
            .forward(v, level)
            .expect("walk stopped without reaching the owner node");
        self.node_mut(rm).owner_count -= 1;
        if self.node(rm).owner_count > 0 {
            self.store.erase(handle);
            return true;
        }

        // phase 2: unlink the node level by level, redistributing its
        // buckets to the neighbours that now localize them
        trace!("removing endpoint node of height {}", level + 1);
        if let Some(right) = self.node(rm).forward[level] {
            self.drain_rbound(rm, right);
        }
        self.set_forward(v, level, self.node(rm).forward[level]);
        for lvl in (0..level).rev() {
            loop {
                let next = self
                    .forward(v, lvl)
                    .expect("removed node unreachable along lower level");
                if next == rm {
                    break;
                }
                v = Some(next);
                self.drain_lbound(rm, next);
            }
            // the right neighbour seen one level up already took its share
            if self.node(rm).forward[lvl] != self.node(rm).forward[lvl + 1] {
                if let Some(right) = self.node(rm).forward[lvl] {
                    self.drain_rbound(rm, right);
                }
            }
            self.set_forward(v, lvl, self.node(rm).forward[lvl]);
        }
        self.free_node(rm);
        self.store.erase(handle);
        true
    }

    /// Returns true if any stored interval contains `value`
    ///
    /// Same walk as [`Self::find_intervals`], but each bucket only has
    /// its extremum peeked: if the entry most likely to contain `value`
    /// does not, nothing else in that bucket does.
    pub fn is_contained(&self, value: &V) -> bool {
        let mut v: Option<NodeIdx> = None;
        for level in (0..=self.max_level).rev() {
            while let Some(next) = self.forward(v, level) {
                if self.node(next).key < *value {
                    v = Some(next);
                    if let Some(h) = self.node(next).buckets.first_by_sup() {
                        if self.store.get(h).contains(value) {
                            return true;
                        }
                    }
                } else {
                    break;
                }
            }
            if let Some(next) = self.forward(v, level) {
                if let Some(h) = self.node(next).buckets.first_by_inf() {
                    if self.store.get(h).contains(value) {
                        return true;
                    }
                }
                if self.node(next).key == *value {
                    break;
                }
            }
        }
        false
    }

    /// Emits every stored interval containing `value` to `out`
    ///
    /// Duplicate copies are emitted once each. Emission order is
    /// unspecified.
    pub fn find_intervals<F>(&self, value: &V, mut out: F)
    where
        F: FnMut(Interval<V>),
    {
        let mut v: Option<NodeIdx> = None;
        let mut prev_right: Option<NodeIdx> = None;
        'walk: for level in (0..=self.max_level).rev() {
            while let Some(next) = self.forward(v, level) {
                if self.node(next).key < *value {
                    v = Some(next);
                    self.node(next)
                        .buckets
                        .collect_by_rbound(value, &self.store, &mut out);
                } else {
                    break;
                }
            }
            if let Some(next) = self.forward(v, level) {
                if Some(next) != prev_right {
                    // intervals starting at the query point with an open
                    // lower bound do not contain it, so the node with that
                    // key is scanned from the lower bounds too
                    self.node(next)
                        .buckets
                        .collect_by_lbound(value, &self.store, &mut out);
                    if self.node(next).key == *value {
                        break 'walk;
                    }
                    prev_right = Some(next);
                }
            }
        }
    }

    /// Removes every stored interval
    ///
    /// The level generator keeps its state.
    pub fn clear(&mut self) {
        debug!("clearing {} stored intervals", self.len());
        self.nodes.clear();
        self.free_nodes.clear();
        self.header = [None; MAX_LEVEL];
        self.max_level = 0;
        self.store.clear();
    }

    /// Draws a node level from a geometric(1/2) distribution, clipped
    fn random_level(&mut self) -> usize {
        let mut level = 0;
        while level + 1 < MAX_LEVEL && self.rng.gen::<bool>() {
            level += 1;
        }
        level
    }

    /// Top-down exact-key search
    fn search_node(&self, key: &V) -> Option<NodeIdx> {
        let mut v: Option<NodeIdx> = None;
        for level in (0..=self.max_level).rev() {
            while let Some(next) = self.forward(v, level) {
                if self.node(next).key < *key {
                    v = Some(next);
                } else {
                    break;
                }
            }
            if let Some(next) = self.forward(v, level) {
                if self.node(next).key == *key {
                    return Some(next);
                }
            }
        }
        None
    }

    fn insert_handle(&mut self, handle: IntervalHandle) {
        let lbound = self.store.get(handle).inf();

        if let Some(existing) = self.search_node(&lbound) {
            // the endpoint is already keyed; the walk below finds the
            // highest node whose bucket localizes the new copy
            self.node_mut(existing).owner_count += 1;
            self.place_on_path(lbound, handle);
            return;
        }

        let lvl = self.random_level();
        trace!("allocating endpoint node of height {}", lvl + 1);
        let new_node = self.alloc_node(lbound, lvl + 1);
        self.node_mut(new_node).owner_count = 1;

        // phase 1: descend to the splice level; the new copy may already
        // belong to a node at a level above the new node's height
        let mut placed = false;
        let mut v: Option<NodeIdx> = None;
        let top = self.max_level.max(lvl);
        for level in (lvl..=top).rev() {
            while let Some(next) = self.forward(v, level) {
                if self.node(next).key < lbound {
                    v = Some(next);
                    if !placed {
                        placed = self.place_if_matches(next, handle);
                    }
                } else {
                    break;
                }
            }
            // at the splice level the right neighbour sits right of the
            // new node, which is the better holder; skip it there
            if !placed && level != lvl {
                if let Some(next) = self.forward(v, level) {
                    placed = self.place_if_matches(next, handle);
                }
            }
        }
        if !placed {
            let Self { nodes, store, .. } = self;
            nodes[new_node]
                .as_mut()
                .expect("freed endpoint node")
                .buckets
                .place(handle, store);
        }

        // a same-height right neighbour stops being the leftmost node of
        // that height; what it localized may now belong here
        if let Some(right) = self.forward(v, lvl) {
            if self.node(right).height() == lvl + 1 {
                self.drain_lbound(right, new_node);
            }
        }
        let succ = self.forward(v, lvl);
        self.node_mut(new_node).forward[lvl] = succ;
        self.set_forward(v, lvl, Some(new_node));

        // phase 2: splice the levels below, stealing bucket entries that
        // the new node now localizes
        let mut prev_right = succ;
        for level in (0..lvl).rev() {
            while let Some(next) = self.forward(v, level) {
                if self.node(next).key < lbound {
                    v = Some(next);
                    self.drain_rbound(next, new_node);
                } else {
                    break;
                }
            }
            if let Some(next) = self.forward(v, level) {
                if Some(next) != prev_right {
                    self.drain_lbound(next, new_node);
                    prev_right = Some(next);
                }
            }
            let succ = self.forward(v, level);
            self.node_mut(new_node).forward[level] = succ;
            self.set_forward(v, level, Some(new_node));
        }

        if lvl > self.max_level {
            for level in (self.max_level + 1)..=lvl {
                self.header[level] = Some(new_node);
            }
            self.max_level = lvl;
        }
    }

    /// Walks top-down and places `handle` into the first bucket that
    /// accepts it, the unique highest node localizing the interval
    fn place_on_path(&mut self, lbound: V, handle: IntervalHandle) {
        let mut v: Option<NodeIdx> = None;
        for level in (0..=self.max_level).rev() {
            while let Some(next) = self.forward(v, level) {
                if self.node(next).key < lbound {
                    v = Some(next);
                    if self.place_if_matches(next, handle) {
                        return;
                    }
                } else {
                    break;
                }
            }
            if let Some(next) = self.forward(v, level) {
                if self.place_if_matches(next, handle) {
                    return;
                }
            }
        }
        unreachable!("no endpoint node accepted a stored interval");
    }

    fn node(&self, idx: NodeIdx) -> &EndpointNode<V> {
        self.nodes[idx].as_ref().expect("freed endpoint node")
    }

    fn node_mut(&mut self, idx: NodeIdx) -> &mut EndpointNode<V> {
        self.nodes[idx].as_mut().expect("freed endpoint node")
    }

    fn forward(&self, at: Option<NodeIdx>, level: usize) -> Option<NodeIdx> {
        match at {
            None => self.header[level],
            Some(idx) => self.node(idx).forward[level],
        }
    }

    fn set_forward(&mut self, at: Option<NodeIdx>, level: usize, to: Option<NodeIdx>) {
        match at {
            None => self.header[level] = to,
            Some(idx) => self.node_mut(idx).forward[level] = to,
        }
    }

    fn alloc_node(&mut self, key: V, height: usize) -> NodeIdx {
        let node = EndpointNode::new(key, height);
        match self.free_nodes.pop() {
            Some(idx) => {
                self.nodes[idx] = Some(node);
                idx
            }
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            }
        }
    }

    fn free_node(&mut self, idx: NodeIdx) {
        let node = self.nodes[idx].take().expect("freed endpoint node");
        assert!(
            node.buckets.is_empty(),
            "endpoint node freed with intervals still localized to it"
        );
        self.free_nodes.push(idx);
    }

    fn place_if_matches(&mut self, idx: NodeIdx, handle: IntervalHandle) -> bool {
        let Self { nodes, store, .. } = self;
        let node = nodes[idx].as_mut().expect("freed endpoint node");
        node.buckets.place_if_matches(&node.key, handle, store)
    }

    fn erase_at(&mut self, idx: NodeIdx, probe: &Interval<V>) -> Option<IntervalHandle> {
        let Self { nodes, store, .. } = self;
        let node = nodes[idx].as_mut().expect("freed endpoint node");
        node.buckets.erase(probe, store)
    }

    /// Moves the matching lower-bound prefix of `from`'s buckets into `to`
    fn drain_lbound(&mut self, from: NodeIdx, to: NodeIdx) {
        let to_key = self.node(to).key;
        let moved = {
            let Self { nodes, store, .. } = self;
            nodes[from]
                .as_mut()
                .expect("freed endpoint node")
                .buckets
                .take_lbound_prefix(&to_key, store)
        };
        let Self { nodes, store, .. } = self;
        let target = nodes[to].as_mut().expect("freed endpoint node");
        for handle in moved {
            target.buckets.place(handle, store);
        }
    }

    /// Moves the matching upper-bound prefix of `from`'s buckets into `to`
    fn drain_rbound(&mut self, from: NodeIdx, to: NodeIdx) {
        let to_key = self.node(to).key;
        let moved = {
            let Self { nodes, store, .. } = self;
            nodes[from]
                .as_mut()
                .expect("freed endpoint node")
                .buckets
                .take_rbound_prefix(&to_key, store)
        };
        let Self { nodes, store, .. } = self;
        let target = nodes[to].as_mut().expect("freed endpoint node");
        for handle in moved {
            target.buckets.place(handle, store);
        }
    }
}

impl<V: PartialOrd + Copy> Default for IntervalSkipList<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: PartialOrd + Copy> FromIterator<Interval<V>> for IntervalSkipList<V> {
    fn from_iter<I: IntoIterator<Item = Interval<V>>>(iter: I) -> Self {
        let mut index = Self::new();
        index.insert_many(iter);
        index
    }
}

impl<V: PartialOrd + Copy + fmt::Debug> fmt::Debug for IntervalSkipList<V> {
    /// Dumps the node chain with keys, heights, owner counts and bucket
    /// contents
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "IntervalSkipList {{ len: {}, max_level: {} }}",
            self.len(),
            self.max_level
        )?;
        let mut at = self.header[0];
        while let Some(idx) = at {
            let node = self.node(idx);
            writeln!(
                f,
                "  key {:?} (height {}, owners {})",
                node.key,
                node.height(),
                node.owner_count
            )?;
            write!(f, "    by_inf: [")?;
            for (i, &h) in node.buckets.inf_handles().iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{:?}", self.store.get(h))?;
            }
            writeln!(f, "]")?;
            write!(f, "    by_sup: [")?;
            for (i, &h) in node.buckets.sup_handles().iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{:?}", self.store.get(h))?;
            }
            writeln!(f, "]")?;
            at = node.forward[0];
        }
        Ok(())
    }
}
