//! Hierarchical agglomerative clustering over a [`DistanceMatrix`].
//!
//! All current cluster pairs live in a min-heap keyed by
//! `(distance, min id, max id)`. Popping an entry whose cluster has already
//! been merged away is a no-op (lazy deletion). After every merge the new
//! cluster's distance to each remaining cluster is derived with
//! [`Linkage::combine`] and pushed.
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap};

use super::PlanError;
use crate::linkage::{DistanceMatrix, Linkage};
use crate::merge_tree::{ClusterId, MergeStep, MergeTree};

/// A candidate pair; ordering is by distance, then by the lexicographic
/// `(min id, max id)` key.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    distance: f64,
    low: ClusterId,
    high: ClusterId,
}

impl Candidate {
    fn new(distance: f64, a: ClusterId, b: ClusterId) -> Self {
        Self {
            distance,
            low: a.min(b),
            high: a.max(b),
        }
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then(self.low.cmp(&other.low))
            .then(self.high.cmp(&other.high))
    }
}

/// Clusters the sources of `matrix` under `linkage`.
///
/// Each emitted step records the linkage distance of its merge, and lists the
/// lower cluster id on the left.
///
/// # Errors
///
/// Returns [`PlanError::NoSources`] for an empty matrix.
pub fn agglomerative_merge_tree(
    matrix: &DistanceMatrix,
    linkage: Linkage,
) -> Result<MergeTree, PlanError> {
    let n = matrix.len();
    if n == 0 {
        return Err(PlanError::NoSources);
    }

    let total = 2 * n - 1;
    let mut active = vec![false; total];
    active[..n].fill(true);
    let mut sizes = vec![0usize; total];
    sizes[..n].fill(1);

    let mut distances: HashMap<(ClusterId, ClusterId), f64> = HashMap::new();
    let mut heap = BinaryHeap::with_capacity(n * n.saturating_sub(1) / 2);
    for i in 0..n {
        for j in i + 1..n {
            let d = matrix.get(i, j);
            distances.insert((i, j), d);
            heap.push(Reverse(Candidate::new(d, i, j)));
        }
    }

    let mut steps = Vec::with_capacity(n - 1);
    let mut stale = 0usize;
    while steps.len() < n - 1 {
        let Some(Reverse(best)) = heap.pop() else {
            break;
        };
        if !active[best.low] || !active[best.high] {
            stale += 1;
            continue;
        }

        let merged = n + steps.len();
        steps.push(MergeStep::new(best.low, best.high).with_distance(best.distance));
        active[best.low] = false;
        active[best.high] = false;
        sizes[merged] = sizes[best.low] + sizes[best.high];

        for other in (0..merged).filter(|&k| active[k]) {
            let d_low = distances.get(&(best.low.min(other), best.low.max(other)));
            let d_high = distances.get(&(best.high.min(other), best.high.max(other)));
            let (Some(&d_low), Some(&d_high)) = (d_low, d_high) else {
                continue;
            };
            let d = linkage.combine(d_low, d_high, sizes[best.low], sizes[best.high]);
            distances.insert((other, merged), d);
            heap.push(Reverse(Candidate::new(d, other, merged)));
        }
        active[merged] = true;
    }

    tracing::debug!(linkage = %linkage, stale, "agglomerative clustering finished");
    Ok(MergeTree::new(n, steps)?)
}
