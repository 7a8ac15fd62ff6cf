//! Treap-backed interval index
//!
//! The same bucket discipline as the skip list, carried by a treap: a
//! binary search tree on endpoint keys, heap-ordered on random 64-bit
//! priorities. Structural changes are split/merge instead of level
//! splicing, and the re-bucketing drains run along the split or merge
//! spines. Queries are plain BST walks consuming the upper-bound index
//! when moving right and the lower-bound index when moving left.

use log::{debug, trace};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use skipspan_core::Interval;

use crate::bucket::IntervalBuckets;
use crate::store::{IntervalHandle, IntervalStore};

type NodeIdx = usize;

/// Where a subtree hangs: the root slot or a parent's child link
#[derive(Clone, Copy)]
enum Link {
    Root,
    Left(NodeIdx),
    Right(NodeIdx),
}

#[derive(Debug)]
struct TreapNode<V> {
    key: V,
    priority: u64,
    owner_count: usize,
    left: Option<NodeIdx>,
    right: Option<NodeIdx>,
    buckets: IntervalBuckets,
}

impl<V> TreapNode<V> {
    fn new(key: V, priority: u64) -> Self {
        Self {
            key,
            priority,
            owner_count: 0,
            left: None,
            right: None,
            buckets: IntervalBuckets::new(),
        }
    }
}

/// A dynamic interval index over a randomly balanced search tree
///
/// Behaviourally interchangeable with
/// [`IntervalSkipList`](crate::IntervalSkipList): the same multiset
/// semantics, stabbing queries and expected costs, with the balancing
/// left to treap priorities instead of level draws.
///
/// # Example
///
/// ```
/// use skipspan_core::Interval;
/// use skipspan_index::IntervalTreap;
///
/// let mut index = IntervalTreap::new();
/// index.insert(Interval::closed(0.0, 4.0)?);
/// index.insert(Interval::closed(2.0, 8.0)?);
///
/// let mut hits = Vec::new();
/// index.find_intervals(&3.0, |i| hits.push(i));
/// assert_eq!(hits.len(), 2);
/// # Ok::<(), skipspan_core::Error>(())
/// ```
#[derive(Debug)]
pub struct IntervalTreap<V> {
    root: Option<NodeIdx>,
    nodes: Vec<Option<TreapNode<V>>>,
    free_nodes: Vec<NodeIdx>,
    store: IntervalStore<V>,
    rng: StdRng,
}

impl<V: PartialOrd + Copy> IntervalTreap<V> {
    /// Creates an empty index with an entropy-seeded priority generator
    pub fn new() -> Self {
        Self {
            root: None,
            nodes: Vec::new(),
            free_nodes: Vec::new(),
            store: IntervalStore::new(),
            rng: StdRng::from_entropy(),
        }
    }

    /// Reseeds the priority generator, for reproducible structure
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
        let lbound = self.store.get(handle).inf();

        if let Some(existing) = self.find_node(&lbound) {
            self.node_mut(existing).owner_count += 1;
            self.place_on_path(lbound, handle);
            return;
        }

        let priority = self.rng.gen::<u64>();
        trace!("allocating treap node");
        let new_node = self.alloc_node(lbound, priority);
        self.node_mut(new_node).owner_count = 1;

        // descend while the standing priority beats the new one; the new
        // node displaces whatever subtree it stops at
        let mut link = Link::Root;
        let mut at = self.root;
        while let Some(idx) = at {
            if self.node(idx).priority <= priority {
                break;
            }
            if lbound < self.node(idx).key {
                link = Link::Left(idx);
                at = self.node(idx).left;
            } else {
                link = Link::Right(idx);
                at = self.node(idx).right;
            }
        }
        let (left, right) = self.split(at, &lbound);
        self.node_mut(new_node).left = left;
        self.node_mut(new_node).right = right;
        self.set_link(link, Some(new_node));

        // the split spines run along the new node's key; entries they
        // localized may now belong to the new node
        let mut at = left;
        while let Some(idx) = at {
            self.drain_rbound(idx, new_node);
            at = self.node(idx).right;
        }
        let mut at = right;
        while let Some(idx) = at {
            self.drain_lbound(idx, new_node);
            at = self.node(idx).left;
        }

        self.place_on_path(lbound, handle);
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
    /// matches.
    pub fn remove(&mut self, interval: &Interval<V>) -> bool {
        let lbound = interval.inf();

        // erase the probe from the first bucket along the search path
        // holding a matching copy
        let mut found: Option<IntervalHandle> = None;
        let mut at = self.root;
        while let Some(idx) = at {
            found = self.erase_at(idx, interval);
            if found.is_some() {
                break;
            }
            at = if self.node(idx).key < lbound {
                self.node(idx).right
            } else {
                self.node(idx).left
            };
        }
        let Some(handle) = found else {
            return false;
        };

        // walk to the owner node, remembering the link it hangs from
        let mut link = Link::Root;
        let mut at = self.root;
        let owner = loop {
            let idx = at.expect("owner node missing for a stored interval");
            if self.node(idx).key == lbound {
                break idx;
            }
            if lbound < self.node(idx).key {
                link = Link::Left(idx);
                at = self.node(idx).left;
            } else {
                link = Link::Right(idx);
                at = self.node(idx).right;
            }
        };

        self.node_mut(owner).owner_count -= 1;
        if self.node(owner).owner_count > 0 {
            self.store.erase(handle);
            return true;
        }

        // the children merge in priority order; hand each merge successor
        // the bucket entries it now localizes before it is linked in
        trace!("removing treap node");
        let mut left = self.node(owner).left;
        let mut right = self.node(owner).right;
        while left.is_some() || right.is_some() {
            let take_right = match (left, right) {
                (None, _) => true,
                (_, None) => false,
                (Some(l), Some(r)) => self.node(r).priority > self.node(l).priority,
            };
            if take_right {
                let idx = right.expect("merge successor vanished");
                self.drain_rbound(owner, idx);
                right = self.node(idx).left;
            } else {
                let idx = left.expect("merge successor vanished");
                self.drain_lbound(owner, idx);
                left = self.node(idx).right;
            }
        }
        let merged = self.merge(self.node(owner).left, self.node(owner).right);
        self.set_link(link, merged);
        self.free_node(owner);
        self.store.erase(handle);
        true
    }

    /// Returns true if any stored interval contains `value`
    pub fn is_contained(&self, value: &V) -> bool {
        let mut at = self.root;
        while let Some(idx) = at {
            let node = self.node(idx);
            if *value > node.key {
                if let Some(h) = node.buckets.first_by_sup() {
                    if self.store.get(h).contains(value) {
                        return true;
                    }
                }
                at = node.right;
            } else {
                if let Some(h) = node.buckets.first_by_inf() {
                    if self.store.get(h).contains(value) {
                        return true;
                    }
                }
                if node.key == *value {
                    break;
                }
                at = node.left;
            }
        }
        false
    }

    /// Emits every stored interval containing `value` to `out`
    pub fn find_intervals<F>(&self, value: &V, mut out: F)
    where
        F: FnMut(Interval<V>),
    {
        let mut at = self.root;
        while let Some(idx) = at {
            let node = self.node(idx);
            if *value > node.key {
                node.buckets.collect_by_rbound(value, &self.store, &mut out);
                at = node.right;
            } else {
                node.buckets.collect_by_lbound(value, &self.store, &mut out);
                if node.key == *value {
                    break;
                }
                at = node.left;
            }
        }
    }

    /// Removes every stored interval
    ///
    /// The priority generator keeps its state.
    pub fn clear(&mut self) {
        debug!("clearing {} stored intervals", self.len());
        self.root = None;
        self.nodes.clear();
        self.free_nodes.clear();
        self.store.clear();
    }

    /// Exact-key lookup
    fn find_node(&self, key: &V) -> Option<NodeIdx> {
        let mut at = self.root;
        while let Some(idx) = at {
            let node = self.node(idx);
            if node.key == *key {
                return Some(idx);
            }
            at = if node.key < *key { node.right } else { node.left };
        }
        None
    }

    /// Walks from the root toward `lbound` and places `handle` into the
    /// first bucket that accepts it
    fn place_on_path(&mut self, lbound: V, handle: IntervalHandle) {
        let mut at = self.root;
        while let Some(idx) = at {
            if self.place_if_matches(idx, handle) {
                return;
            }
            at = if self.node(idx).key < lbound {
                self.node(idx).right
            } else {
                self.node(idx).left
            };
        }
        unreachable!("no treap node accepted a stored interval");
    }

    /// Splits `at` into subtrees with keys below and at-or-above `key`
    fn split(&mut self, at: Option<NodeIdx>, key: &V) -> (Option<NodeIdx>, Option<NodeIdx>) {
        let Some(idx) = at else {
            return (None, None);
        };
        if self.node(idx).key < *key {
            let right = self.node(idx).right;
            let (a, b) = self.split(right, key);
            self.node_mut(idx).right = a;
            (Some(idx), b)
        } else {
            let left = self.node(idx).left;
            let (a, b) = self.split(left, key);
            self.node_mut(idx).left = b;
            (a, Some(idx))
        }
    }

    /// Merges two subtrees where every key of `a` precedes every key of
    /// `b`
    fn merge(&mut self, a: Option<NodeIdx>, b: Option<NodeIdx>) -> Option<NodeIdx> {
        let Some(ai) = a else {
            return b;
        };
        let Some(bi) = b else {
            return a;
        };
        if self.node(ai).priority < self.node(bi).priority {
            let left = self.node(bi).left;
            let merged = self.merge(a, left);
            self.node_mut(bi).left = merged;
            b
        } else {
            let right = self.node(ai).right;
            let merged = self.merge(right, b);
            self.node_mut(ai).right = merged;
            a
        }
    }

    fn node(&self, idx: NodeIdx) -> &TreapNode<V> {
        self.nodes[idx].as_ref().expect("freed treap node")
    }

    fn node_mut(&mut self, idx: NodeIdx) -> &mut TreapNode<V> {
        self.nodes[idx].as_mut().expect("freed treap node")
    }

    fn set_link(&mut self, link: Link, to: Option<NodeIdx>) {
        match link {
            Link::Root => self.root = to,
            Link::Left(idx) => self.node_mut(idx).left = to,
            Link::Right(idx) => self.node_mut(idx).right = to,
        }
    }

    fn alloc_node(&mut self, key: V, priority: u64) -> NodeIdx {
        let node = TreapNode::new(key, priority);
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
        let node = self.nodes[idx].take().expect("freed treap node");
        assert!(
            node.buckets.is_empty(),
            "treap node freed with intervals still localized to it"
        );
        self.free_nodes.push(idx);
    }

    fn place_if_matches(&mut self, idx: NodeIdx, handle: IntervalHandle) -> bool {
        let Self { nodes, store, .. } = self;
        let node = nodes[idx].as_mut().expect("freed treap node");
        node.buckets.place_if_matches(&node.key, handle, store)
    }

    fn erase_at(&mut self, idx: NodeIdx, probe: &Interval<V>) -> Option<IntervalHandle> {
        let Self { nodes, store, .. } = self;
        let node = nodes[idx].as_mut().expect("freed treap node");
        node.buckets.erase(probe, store)
    }

    fn drain_lbound(&mut self, from: NodeIdx, to: NodeIdx) {
        let to_key = self.node(to).key;
        let moved = {
            let Self { nodes, store, .. } = self;
            nodes[from]
                .as_mut()
                .expect("freed treap node")
                .buckets
                .take_lbound_prefix(&to_key, store)
        };
        let Self { nodes, store, .. } = self;
        let target = nodes[to].as_mut().expect("freed treap node");
        for handle in moved {
            target.buckets.place(handle, store);
        }
    }

    fn drain_rbound(&mut self, from: NodeIdx, to: NodeIdx) {
        let to_key = self.node(to).key;
        let moved = {
            let Self { nodes, store, .. } = self;
            nodes[from]
                .as_mut()
                .expect("freed treap node")
                .buckets
                .take_rbound_prefix(&to_key, store)
        };
        let Self { nodes, store, .. } = self;
        let target = nodes[to].as_mut().expect("freed treap node");
        for handle in moved {
            target.buckets.place(handle, store);
        }
    }
}

impl<V: PartialOrd + Copy> Default for IntervalTreap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: PartialOrd + Copy> FromIterator<Interval<V>> for IntervalTreap<V> {
    fn from_iter<I: IntoIterator<Item = Interval<V>>>(iter: I) -> Self {
        let mut index = Self::new();
        index.insert_many(iter);
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn iv(inf: f64, sup: f64, lc: bool, rc: bool) -> Interval<f64> {
        Interval::new(inf, sup, lc, rc).unwrap()
    }

    fn stab(index: &IntervalTreap<f64>, value: f64) -> Vec<Interval<f64>> {
        let mut out = Vec::new();
        index.find_intervals(&value, |i| out.push(i));
        out
    }

    impl<V: PartialOrd + Copy + std::fmt::Debug> IntervalTreap<V> {
        /// Audits key ordering, heap order, localization and owner
        /// accounting over the private arena
        fn check_invariants(&self) {
            let stored: Vec<(IntervalHandle, &Interval<V>)> = self.store.iter_handles().collect();
            let mut inf_seen: Vec<IntervalHandle> = Vec::new();
            let mut sup_seen: Vec<IntervalHandle> = Vec::new();
            let mut stack = vec![self.root];
            let mut node_count = 0usize;
            while let Some(at) = stack.pop() {
                let Some(idx) = at else { continue };
                let node = self.node(idx);
                node_count += 1;
                if let Some(l) = node.left {
                    assert!(self.node(l).key < node.key, "left child key out of order");
                    assert!(
                        self.node(l).priority <= node.priority,
                        "heap order broken"
                    );
                }
                if let Some(r) = node.right {
                    assert!(node.key < self.node(r).key, "right child key out of order");
                    assert!(
                        self.node(r).priority <= node.priority,
                        "heap order broken"
                    );
                }
                assert!(node.owner_count >= 1, "node kept alive without owners");
                let owners = stored
                    .iter()
                    .filter(|(_, i)| i.inf() == node.key)
                    .count();
                assert_eq!(node.owner_count, owners, "owner accounting broken");
                for &h in node.buckets.inf_handles() {
                    assert!(
                        self.store.get(h).contains_or_inf(&node.key),
                        "bucketed interval does not match its node"
                    );
                    inf_seen.push(h);
                }
                sup_seen.extend_from_slice(node.buckets.sup_handles());
                stack.push(node.left);
                stack.push(node.right);
            }
            let unique: HashSet<IntervalHandle> = inf_seen.iter().copied().collect();
            assert_eq!(unique.len(), inf_seen.len(), "handle bucketed twice");
            assert_eq!(inf_seen.len(), stored.len(), "localization lost a handle");
            let sup_unique: HashSet<IntervalHandle> = sup_seen.iter().copied().collect();
            assert_eq!(sup_unique, unique, "bucket indices disagree");
            assert!(node_count <= stored.len(), "more nodes than stored intervals");
        }
    }

    #[test]
    fn test_empty() {
        let index: IntervalTreap<f64> = IntervalTreap::new();
        assert_eq!(index.len(), 0);
        assert!(!index.is_contained(&0.0));
        assert!(stab(&index, 0.0).is_empty());
    }

    #[test]
    fn test_insert_and_stab() {
        let mut index = IntervalTreap::new();
        index.seed(7);
        index.insert(iv(-2.0, 3.0, true, false));
        assert_eq!(stab(&index, 0.0), vec![iv(-2.0, 3.0, true, false)]);
        assert!(stab(&index, 3.0).is_empty());
        index.check_invariants();
    }

    #[test]
    fn test_duplicate_infs_share_a_node() {
        let mut index = IntervalTreap::new();
        index.seed(3);
        index.insert(iv(1.0, 4.0, true, true));
        index.insert(iv(1.0, 9.0, true, true));
        index.insert(iv(1.0, 2.0, false, true));
        index.check_invariants();
        assert_eq!(stab(&index, 1.5).len(), 3);
        assert!(index.remove(&iv(1.0, 9.0, true, true)));
        index.check_invariants();
        assert_eq!(stab(&index, 5.0).len(), 0);
    }

    #[test]
    fn test_shared_endpoint_openness() {
        let mut index = IntervalTreap::new();
        index.seed(11);
        index.insert(iv(-5.0, 0.0, true, false));
        index.insert(iv(0.0, 5.0, true, false));
        assert_eq!(stab(&index, 0.0), vec![iv(0.0, 5.0, true, false)]);
        index.check_invariants();
    }

    #[test]
    fn test_remove_rebuilds_tree() {
        let mut index = IntervalTreap::new();
        index.seed(5);
        index.insert(iv(0.0, 100.0, true, true));
        for i in 1..20 {
            index.insert(iv(i as f64, i as f64 + 0.5, true, true));
        }
        index.check_invariants();
        for i in 1..20 {
            assert!(index.remove(&iv(i as f64, i as f64 + 0.5, true, true)));
        }
        index.check_invariants();
        assert_eq!(stab(&index, 50.0), vec![iv(0.0, 100.0, true, true)]);
    }

    #[test]
    fn test_random_churn_keeps_invariants() {
        let mut index = IntervalTreap::new();
        index.seed(23);
        let mut rng = StdRng::seed_from_u64(31);
        let mut live: Vec<Interval<f64>> = Vec::new();
        for step in 0..400 {
            if live.is_empty() || rng.gen::<f64>() < 0.6 {
                let a = rng.gen_range(-50..=50) as f64;
                let b = rng.gen_range(-50..=50) as f64;
                let (inf, sup) = if a <= b { (a, b) } else { (b, a) };
                let interval = iv(inf, sup, rng.gen(), rng.gen());
                index.insert(interval);
                live.push(interval);
            } else {
                let at = rng.gen_range(0..live.len());
                let interval = live.swap_remove(at);
                assert!(index.remove(&interval), "stored interval not found");
            }
            if step % 50 == 0 {
                index.check_invariants();
            }
        }
        index.check_invariants();
        assert_eq!(index.len(), live.len());
    }
}
