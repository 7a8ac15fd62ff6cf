//! Dynamic interval stabbing indexes
//!
//! This crate implements an in-memory index over a multiset of
//! one-dimensional intervals, answering stabbing queries (enumerate
//! every stored interval containing a query point) under online
//! insertion and deletion. Two back-ends share one discipline:
//!
//! - **[`IntervalSkipList`]**: a randomized, level-linked skip list of
//!   endpoint nodes. Every stored interval is localized to exactly one
//!   node's bucket indices, and structural changes re-bucket intervals
//!   across neighbouring levels to keep queries touching only the nodes
//!   along one top-down walk.
//! - **[`IntervalTreap`]**: the same node contract over a randomly
//!   balanced search tree, re-bucketing along split and merge spines.
//!
//! Both give expected O(log n) insertion and removal and O(log n + k)
//! stabbing for k reported intervals. Instances are single-threaded:
//! mutation takes `&mut self`, queries take `&self`.
//!
//! # Example
//!
//! ```
//! use skipspan_index::{Interval, IntervalSkipList};
//!
//! let mut index = IntervalSkipList::new();
//! index.insert(Interval::new(0.0, 3.0, false, true)?);
//! index.insert(Interval::new(3.0, 5.0, false, true)?);
//!
//! // only the interval closed at 3.0 contains it
//! let mut hits = Vec::new();
//! index.find_intervals(&3.0, |i| hits.push(i));
//! assert_eq!(hits, vec![Interval::new(0.0, 3.0, false, true)?]);
//! # Ok::<(), skipspan_index::Error>(())
//! ```

mod bucket;
mod skiplist;
mod store;
mod treap;

pub use skiplist::{IntervalSkipList, MAX_LEVEL};
pub use treap::IntervalTreap;

pub use skipspan_core::{Error, Interval, Result};
