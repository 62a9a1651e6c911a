//! Merge-tree builder.
//!
//! Two interchangeable strategies turn per-source [`FeatureSummary`]s into a
//! [`MergeTree`]:
//!
//! - [`PlanStrategy::Order`]: sort sources by a scalar statistic and fold
//!   left, giving a caterpillar tree (see [`order`]).
//! - [`PlanStrategy::Cluster`]: hierarchical agglomerative clustering over a
//!   token-similarity distance matrix (see [`agglomerative`]).
//!
//! Several order heuristics often collapse onto the same tree, so
//! [`distinct_order_trees`] groups heuristics by the tree they produce before
//! anything is executed.
//!
//! [`pairwise`] plans the non-incremental baselines the trees are measured
//! against.
pub mod agglomerative;
pub mod order;
pub mod pairwise;

use serde::{Deserialize, Serialize};

use crate::features::FeatureSummary;
use crate::linkage::{DistanceMatrix, Linkage, TokenSimilarity};
use crate::merge_tree::{MergeTree, MergeTreeError};

pub use agglomerative::agglomerative_merge_tree;
pub use order::{OrderHeuristic, OrderStatistic, SortDirection, fold_left, induced_order};
pub use pairwise::{DistinctPairs, PairwiseBaseline, distinct_pair_plans};

// ---------------------------------------------------------------------------
// PlanError
// ---------------------------------------------------------------------------

/// Build-time planning failures. All of them are fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    /// The produced or supplied tree violates the forest property.
    #[error(transparent)]
    MalformedMergeTree(#[from] MergeTreeError),
    /// There is nothing to plan over.
    #[error("cannot plan a merge over zero sources")]
    NoSources,
    #[error("unknown linkage '{0}' (expected single, complete or average)")]
    UnknownLinkage(String),
    #[error("unknown order statistic '{0}'")]
    UnknownStatistic(String),
    #[error("unknown sort direction '{0}' (expected asc or desc)")]
    UnknownDirection(String),
    #[error("unknown token similarity '{0}' (expected jaccard, cosine or tfidf)")]
    UnknownSimilarity(String),
    #[error("invalid distance matrix: {0}")]
    InvalidDistanceMatrix(String),
    /// The order does not list every source exactly once.
    #[error("order {0:?} is not a permutation of the sources")]
    NotAPermutation(Vec<usize>),
}

// ---------------------------------------------------------------------------
// PlanStrategy
// ---------------------------------------------------------------------------

/// Which builder to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlanStrategy {
    /// Sort-then-fold.
    Order(OrderHeuristic),
    /// Agglomerative clustering.
    Cluster {
        #[serde(default)]
        linkage: Linkage,
        #[serde(default)]
        similarity: TokenSimilarity,
    },
}

impl Default for PlanStrategy {
    fn default() -> Self {
        PlanStrategy::Cluster {
            linkage: Linkage::default(),
            similarity: TokenSimilarity::default(),
        }
    }
}

impl std::fmt::Display for PlanStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanStrategy::Order(heuristic) => write!(f, "order:{heuristic}"),
            PlanStrategy::Cluster {
                linkage,
                similarity,
            } => write!(f, "cluster:{linkage}:{similarity}"),
        }
    }
}

/// Builds a merge tree over `summaries` with `strategy`.
///
/// # Errors
///
/// Returns [`PlanError::NoSources`] for an empty input.
pub fn build_merge_tree(
    summaries: &[FeatureSummary],
    strategy: &PlanStrategy,
) -> Result<MergeTree, PlanError> {
    if summaries.is_empty() {
        return Err(PlanError::NoSources);
    }
    let tree = match strategy {
        PlanStrategy::Order(heuristic) => order::order_merge_tree(summaries, *heuristic)?,
        PlanStrategy::Cluster {
            linkage,
            similarity,
        } => {
            let matrix = DistanceMatrix::from_summaries(summaries, *similarity);
            agglomerative_merge_tree(&matrix, *linkage)?
        }
    };
    tracing::debug!(
        strategy = %strategy,
        sources = summaries.len(),
        height = tree.height(),
        "built merge tree"
    );
    Ok(tree)
}

// ---------------------------------------------------------------------------
// Deduplication
// ---------------------------------------------------------------------------

/// Groups `candidates` by identical trees, keeping first-seen order of both
/// trees and labels.
pub fn distinct_trees<L>(candidates: Vec<(L, MergeTree)>) -> Vec<(Vec<L>, MergeTree)> {
    let mut groups: Vec<(Vec<L>, MergeTree)> = Vec::new();
    let mut index: std::collections::HashMap<MergeTree, usize> = std::collections::HashMap::new();
    for (label, tree) in candidates {
        if let Some(&slot) = index.get(&tree) {
            groups[slot].0.push(label);
        } else {
            index.insert(tree.clone(), groups.len());
            groups.push((vec![label], tree));
        }
    }
    groups
}

/// A tree together with every heuristic that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DistinctTree {
    pub heuristics: Vec<OrderHeuristic>,
    pub tree: MergeTree,
}

/// Runs every heuristic and returns the distinct resulting trees.
///
/// # Errors
///
/// Returns [`PlanError::NoSources`] for an empty input.
pub fn distinct_order_trees(
    summaries: &[FeatureSummary],
    heuristics: &[OrderHeuristic],
) -> Result<Vec<DistinctTree>, PlanError> {
    if summaries.is_empty() {
        return Err(PlanError::NoSources);
    }
    let candidates = heuristics
        .iter()
        .map(|&h| order::order_merge_tree(summaries, h).map(|tree| (h, tree)))
        .collect::<Result<Vec<_>, _>>()?;
    let distinct: Vec<DistinctTree> = distinct_trees(candidates)
        .into_iter()
        .map(|(heuristics, tree)| DistinctTree { heuristics, tree })
        .collect();
    tracing::info!(
        heuristics = heuristics.len(),
        distinct = distinct.len(),
        "deduplicated order heuristics"
    );
    Ok(distinct)
}
