//! Property tests over arbitrary interval workloads
//!
//! Every property is checked on both back-ends against a plain linear
//! scan of the same intervals.

use proptest::prelude::*;

use skipspan_index::{Interval, IntervalSkipList, IntervalTreap};

fn arb_interval() -> impl Strategy<Value = Interval<f64>> {
    (-30i32..=30, -30i32..=30, any::<bool>(), any::<bool>()).prop_map(|(a, b, lc, rc)| {
        let (inf, sup) = if a <= b { (a, b) } else { (b, a) };
        Interval::new(inf as f64, sup as f64, lc, rc).unwrap()
    })
}

fn sort_key(i: &Interval<f64>) -> (f64, f64, bool, bool) {
    (i.inf(), i.sup(), i.inf_closed(), i.sup_closed())
}

fn sorted(mut intervals: Vec<Interval<f64>>) -> Vec<Interval<f64>> {
    intervals.sort_by(|a, b| sort_key(a).partial_cmp(&sort_key(b)).unwrap());
    intervals
}

fn stab_skiplist(index: &IntervalSkipList<f64>, value: f64) -> Vec<Interval<f64>> {
    let mut out = Vec::new();
    index.find_intervals(&value, |i| out.push(i));
    out
}

fn stab_treap(index: &IntervalTreap<f64>, value: f64) -> Vec<Interval<f64>> {
    let mut out = Vec::new();
    index.find_intervals(&value, |i| out.push(i));
    out
}

/// Query points worth probing: every endpoint, the gaps beside it, and a
/// point in between
fn query_points(intervals: &[Interval<f64>]) -> Vec<f64> {
    let mut points = Vec::new();
    for i in intervals {
        points.extend([i.inf(), i.inf() - 0.5, i.sup(), i.sup() + 0.5]);
        points.push((i.inf() + i.sup()) / 2.0);
    }
    points.push(0.0);
    points
}

fn reference_stab(intervals: &[Interval<f64>], value: f64) -> Vec<Interval<f64>> {
    intervals
        .iter()
        .filter(|i| i.contains(&value))
        .copied()
        .collect()
}

proptest! {
    /// Stabbing emits exactly the linear-scan answer, as a multiset, and
    /// the containment check agrees with it
    #[test]
    fn stab_matches_linear_scan(
        intervals in prop::collection::vec(arb_interval(), 0..40),
        seed in any::<u64>(),
    ) {
        let mut skiplist = IntervalSkipList::new();
        skiplist.seed(seed);
        let mut treap = IntervalTreap::new();
        treap.seed(seed);
        for i in &intervals {
            skiplist.insert(*i);
            treap.insert(*i);
        }
        for q in query_points(&intervals) {
            let expected = sorted(reference_stab(&intervals, q));
            prop_assert_eq!(&sorted(stab_skiplist(&skiplist, q)), &expected);
            prop_assert_eq!(&sorted(stab_treap(&treap, q)), &expected);
            prop_assert_eq!(skiplist.is_contained(&q), !expected.is_empty());
            prop_assert_eq!(treap.is_contained(&q), !expected.is_empty());
        }
    }

    /// len() equals inserts minus successful removes, and removing every
    /// copy empties the index
    #[test]
    fn size_accounting_round_trip(
        intervals in prop::collection::vec(arb_interval(), 1..30),
        seed in any::<u64>(),
    ) {
        let mut skiplist = IntervalSkipList::new();
        skiplist.seed(seed);
        let mut treap = IntervalTreap::new();
        treap.seed(seed);
        for (n, i) in intervals.iter().enumerate() {
            skiplist.insert(*i);
            treap.insert(*i);
            prop_assert_eq!(skiplist.len(), n + 1);
            prop_assert_eq!(treap.len(), n + 1);
        }
        let mut remaining = intervals.len();
        for i in &intervals {
            prop_assert!(skiplist.remove(i));
            prop_assert!(treap.remove(i));
            remaining -= 1;
            prop_assert_eq!(skiplist.len(), remaining);
            prop_assert_eq!(treap.len(), remaining);
        }
        for i in &intervals {
            prop_assert!(!skiplist.remove(i));
            prop_assert!(!treap.remove(i));
        }
        prop_assert!(skiplist.is_empty());
        prop_assert!(treap.is_empty());
    }

    /// Removing one copy leaves the answers of a reference with one copy
    /// fewer
    #[test]
    fn remove_is_one_copy(
        intervals in prop::collection::vec(arb_interval(), 1..25),
        victim in any::<prop::sample::Index>(),
        seed in any::<u64>(),
    ) {
        let victim = *victim.get(&intervals);
        let mut skiplist = IntervalSkipList::new();
        skiplist.seed(seed);
        let mut treap = IntervalTreap::new();
        treap.seed(seed);
        for i in &intervals {
            skiplist.insert(*i);
            treap.insert(*i);
        }
        prop_assert!(skiplist.remove(&victim));
        prop_assert!(treap.remove(&victim));

        let mut reference = intervals.clone();
        let at = reference.iter().position(|i| *i == victim).unwrap();
        reference.remove(at);
        for q in query_points(&intervals) {
            let expected = sorted(reference_stab(&reference, q));
            prop_assert_eq!(&sorted(stab_skiplist(&skiplist, q)), &expected);
            prop_assert_eq!(&sorted(stab_treap(&treap, q)), &expected);
        }
    }

    /// Clearing and re-inserting the same multiset restores every answer
    #[test]
    fn clear_then_rebuild_restores(
        intervals in prop::collection::vec(arb_interval(), 0..25),
        seed in any::<u64>(),
    ) {
        let mut skiplist = IntervalSkipList::new();
        skiplist.seed(seed);
        for i in &intervals {
            skiplist.insert(*i);
        }
        let queries = query_points(&intervals);
        let before: Vec<_> = queries
            .iter()
            .map(|q| sorted(stab_skiplist(&skiplist, *q)))
            .collect();
        skiplist.clear();
        prop_assert!(skiplist.is_empty());
        for i in &intervals {
            skiplist.insert(*i);
        }
        for (q, expected) in queries.iter().zip(&before) {
            prop_assert_eq!(&sorted(stab_skiplist(&skiplist, *q)), expected);
        }
    }

    /// Any two insertion orders of one multiset answer identically
    #[test]
    fn insertion_order_is_irrelevant(
        (original, shuffled) in prop::collection::vec(arb_interval(), 0..30)
            .prop_flat_map(|v| (Just(v.clone()), Just(v).prop_shuffle())),
        seed in any::<u64>(),
    ) {
        let mut first = IntervalSkipList::new();
        first.seed(seed);
        let mut second = IntervalSkipList::new();
        second.seed(seed.wrapping_add(1));
        for i in &original {
            first.insert(*i);
        }
        for i in &shuffled {
            second.insert(*i);
        }
        for q in query_points(&original) {
            prop_assert_eq!(
                sorted(stab_skiplist(&first, q)),
                sorted(stab_skiplist(&second, q))
            );
        }
    }
}
