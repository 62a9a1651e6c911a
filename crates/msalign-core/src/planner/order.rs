//! Order-based planning: sort by a statistic, then fold left.
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::PlanError;
use crate::features::FeatureSummary;
use crate::merge_tree::{MergeStep, MergeTree};
use crate::source::SourceId;

/// Scalar used to rank sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatistic {
    /// The source's position in the track.
    SourceIndex,
    ClassCount,
    InstanceCount,
    /// Triple count.
    ModelSize,
    DistinctSubjects,
}

impl OrderStatistic {
    pub const ALL: [OrderStatistic; 5] = [
        OrderStatistic::SourceIndex,
        OrderStatistic::ClassCount,
        OrderStatistic::InstanceCount,
        OrderStatistic::ModelSize,
        OrderStatistic::DistinctSubjects,
    ];

    /// Value of the statistic for source `index`.
    pub fn value(self, index: SourceId, summary: &FeatureSummary) -> u64 {
        match self {
            OrderStatistic::SourceIndex => index as u64,
            OrderStatistic::ClassCount => summary.class_count,
            OrderStatistic::InstanceCount => summary.instance_count,
            OrderStatistic::ModelSize => summary.triple_count,
            OrderStatistic::DistinctSubjects => summary.distinct_subject_count(),
        }
    }

    fn name(self) -> &'static str {
        match self {
            OrderStatistic::SourceIndex => "source-index",
            OrderStatistic::ClassCount => "class-count",
            OrderStatistic::InstanceCount => "instance-count",
            OrderStatistic::ModelSize => "model-size",
            OrderStatistic::DistinctSubjects => "distinct-subjects",
        }
    }
}

impl fmt::Display for OrderStatistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OrderStatistic {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace('_', "-");
        OrderStatistic::ALL
            .into_iter()
            .find(|stat| stat.name().eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| PlanError::UnknownStatistic(s.to_owned()))
    }
}

/// Sort direction of an [`OrderHeuristic`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Ascending,
    #[default]
    Descending,
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SortDirection::Ascending => "asc",
            SortDirection::Descending => "desc",
        })
    }
}

impl FromStr for SortDirection {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortDirection::Ascending),
            "desc" | "descending" => Ok(SortDirection::Descending),
            other => Err(PlanError::UnknownDirection(other.to_owned())),
        }
    }
}

/// A statistic plus a direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderHeuristic {
    pub statistic: OrderStatistic,
    #[serde(default)]
    pub direction: SortDirection,
}

impl OrderHeuristic {
    pub fn new(statistic: OrderStatistic, direction: SortDirection) -> Self {
        Self {
            statistic,
            direction,
        }
    }

    /// Every statistic in both directions.
    pub fn all() -> Vec<OrderHeuristic> {
        OrderStatistic::ALL
            .into_iter()
            .flat_map(|s| {
                [
                    OrderHeuristic::new(s, SortDirection::Descending),
                    OrderHeuristic::new(s, SortDirection::Ascending),
                ]
            })
            .collect()
    }
}

impl fmt::Display for OrderHeuristic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.statistic, self.direction)
    }
}

impl FromStr for OrderHeuristic {
    type Err = PlanError;

    /// Parses `class-count-desc`, `model-size-asc` or a bare statistic
    /// (descending).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        for (suffix, direction) in [
            ("-desc", SortDirection::Descending),
            ("-asc", SortDirection::Ascending),
        ] {
            if let Some(stat) = trimmed.strip_suffix(suffix) {
                return Ok(OrderHeuristic::new(stat.parse()?, direction));
            }
        }
        Ok(OrderHeuristic::new(
            trimmed.parse()?,
            SortDirection::Descending,
        ))
    }
}

/// Source indices sorted by `heuristic`. Equal values keep ascending source
/// index in both directions, so the result never depends on input iteration
/// order.
pub fn induced_order(summaries: &[FeatureSummary], heuristic: OrderHeuristic) -> Vec<SourceId> {
    let mut keyed: Vec<(u64, SourceId)> = summaries
        .iter()
        .enumerate()
        .map(|(i, s)| (heuristic.statistic.value(i, s), i))
        .collect();
    keyed.sort_by(|(va, ia), (vb, ib)| {
        let by_value = match heuristic.direction {
            SortDirection::Ascending => va.cmp(vb),
            SortDirection::Descending => vb.cmp(va),
        };
        match by_value {
            Ordering::Equal => ia.cmp(ib),
            Ordering::Less | Ordering::Greater => by_value,
        }
    });
    keyed.into_iter().map(|(_, i)| i).collect()
}

/// Caterpillar tree absorbing the sources in `order`: `order[0] + order[1]`
/// first, then each following source into the growing cluster.
///
/// # Errors
///
/// Returns [`PlanError::NotAPermutation`] when `order` does not list every
/// index in `0..order.len()` exactly once, and [`PlanError::NoSources`] for an
/// empty order.
pub fn fold_left(order: &[SourceId]) -> Result<MergeTree, PlanError> {
    let n = order.len();
    if n == 0 {
        return Err(PlanError::NoSources);
    }
    let mut seen = vec![false; n];
    for &i in order {
        if i >= n || std::mem::replace(&mut seen[i], true) {
            return Err(PlanError::NotAPermutation(order.to_vec()));
        }
    }
    let mut steps = Vec::with_capacity(n - 1);
    if n > 1 {
        steps.push(MergeStep::new(order[0], order[1]));
        for (k, &source) in order.iter().enumerate().skip(2) {
            steps.push(MergeStep::new(n + k - 2, source));
        }
    }
    Ok(MergeTree::new(n, steps)?)
}

/// Sort-then-fold merge tree.
///
/// # Errors
///
/// Returns [`PlanError::NoSources`] for an empty input.
pub fn order_merge_tree(
    summaries: &[FeatureSummary],
    heuristic: OrderHeuristic,
) -> Result<MergeTree, PlanError> {
    fold_left(&induced_order(summaries, heuristic))
}
