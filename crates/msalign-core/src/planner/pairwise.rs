//! Pairwise baselines: fixed lists of source pairs matched independently.
//!
//! Unlike a merge tree, a baseline never forms clusters. Each pair is one
//! matcher call between two singleton sources, and all results land in the
//! same global alignment.
use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::PlanError;
use super::order::{OrderHeuristic, induced_order};
use crate::features::FeatureSummary;
use crate::source::SourceId;

/// Which pairs a baseline matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PairwiseBaseline {
    /// Every unordered pair `(i, j)` with `i < j`, in index order.
    AllPairs,
    /// The first source of the induced order against each of the others.
    FirstVsRest(OrderHeuristic),
    /// Neighbours in the induced order.
    Chain(OrderHeuristic),
}

impl PairwiseBaseline {
    /// All pairs, then both order-based shapes for every heuristic.
    pub fn all() -> Vec<PairwiseBaseline> {
        let heuristics = OrderHeuristic::all();
        std::iter::once(PairwiseBaseline::AllPairs)
            .chain(heuristics.iter().copied().map(PairwiseBaseline::FirstVsRest))
            .chain(heuristics.iter().copied().map(PairwiseBaseline::Chain))
            .collect()
    }

    /// The `(source, target)` pairs over `summaries`, in call order.
    ///
    /// Fewer than two sources give no pairs.
    pub fn pairs(&self, summaries: &[FeatureSummary]) -> Vec<(SourceId, SourceId)> {
        let n = summaries.len();
        match self {
            PairwiseBaseline::AllPairs => (0..n)
                .flat_map(|i| (i + 1..n).map(move |j| (i, j)))
                .collect(),
            PairwiseBaseline::FirstVsRest(heuristic) => {
                let order = induced_order(summaries, *heuristic);
                match order.split_first() {
                    Some((&first, rest)) => rest.iter().map(|&other| (first, other)).collect(),
                    None => Vec::new(),
                }
            }
            PairwiseBaseline::Chain(heuristic) => induced_order(summaries, *heuristic)
                .windows(2)
                .map(|w| (w[0], w[1]))
                .collect(),
        }
    }

    /// Whether scoring should close the alignment transitively first.
    ///
    /// All pairs already links every two sources directly. The order-based
    /// shapes only connect some of them, so most test cases are reachable
    /// through an intermediate source only.
    pub fn needs_transitive_closure(&self) -> bool {
        match self {
            PairwiseBaseline::AllPairs => false,
            PairwiseBaseline::FirstVsRest(_) | PairwiseBaseline::Chain(_) => true,
        }
    }
}

impl fmt::Display for PairwiseBaseline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PairwiseBaseline::AllPairs => f.write_str("all-pairs"),
            PairwiseBaseline::FirstVsRest(heuristic) => write!(f, "first-vs-rest:{heuristic}"),
            PairwiseBaseline::Chain(heuristic) => write!(f, "chain:{heuristic}"),
        }
    }
}

/// Pairs shared by one or more baselines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DistinctPairs {
    pub baselines: Vec<PairwiseBaseline>,
    pub pairs: Vec<(SourceId, SourceId)>,
}

impl DistinctPairs {
    /// Shared by every member, since baselines are grouped on it.
    pub fn needs_transitive_closure(&self) -> bool {
        self.baselines
            .first()
            .is_some_and(PairwiseBaseline::needs_transitive_closure)
    }
}

/// Groups `baselines` by identical pair lists, keeping first-seen order.
///
/// Baselines that disagree on transitive closure are never grouped, even when
/// their pairs coincide.
///
/// # Errors
///
/// Returns [`PlanError::NoSources`] for an empty input.
pub fn distinct_pair_plans(
    summaries: &[FeatureSummary],
    baselines: &[PairwiseBaseline],
) -> Result<Vec<DistinctPairs>, PlanError> {
    if summaries.is_empty() {
        return Err(PlanError::NoSources);
    }
    let mut groups: Vec<DistinctPairs> = Vec::new();
    let mut index: HashMap<(Vec<(SourceId, SourceId)>, bool), usize> = HashMap::new();
    for baseline in baselines {
        let pairs = baseline.pairs(summaries);
        let key = (pairs, baseline.needs_transitive_closure());
        if let Some(&slot) = index.get(&key) {
            groups[slot].baselines.push(*baseline);
        } else {
            index.insert(key.clone(), groups.len());
            groups.push(DistinctPairs {
                baselines: vec![*baseline],
                pairs: key.0,
            });
        }
    }
    tracing::debug!(
        baselines = baselines.len(),
        distinct = groups.len(),
        "grouped pairwise baselines"
    );
    Ok(groups)
}
