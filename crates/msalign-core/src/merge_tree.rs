//! Merge trees: immutable binary plans for combining N sources.
//!
//! Cluster ids follow the usual hierarchical-clustering layout: sources are
//! the singleton clusters `0..N`, and step `i` produces cluster `N + i` from
//! its two operands. A valid tree has exactly `N - 1` steps, every operand
//! exists before it is consumed, and no cluster is consumed twice (the forest
//! property). [`MergeTree::new`] and deserialization both enforce this, so
//! every `MergeTree` value is well formed.
//!
//! Two trees are equal when they merge the same unordered operand pairs in
//! the same order; recorded distances are not part of a tree's identity.
use std::hash::{Hash, Hasher};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::source::SourceId;

/// Identifier of a cluster: a source index or `N + step`.
pub type ClusterId = usize;

// ---------------------------------------------------------------------------
// MergeStep
// ---------------------------------------------------------------------------

/// One binary merge: `(left, right) -> N + step_index`.
#[derive(Debug, Clone, Copy)]
pub struct MergeStep {
    pub left: ClusterId,
    pub right: ClusterId,
    /// Linkage distance at which the merge happened, when known.
    pub distance: Option<f64>,
}

impl MergeStep {
    /// Creates a step without a recorded distance.
    pub fn new(left: ClusterId, right: ClusterId) -> Self {
        Self {
            left,
            right,
            distance: None,
        }
    }

    /// Attaches the merge distance.
    #[must_use]
    pub fn with_distance(mut self, distance: f64) -> Self {
        self.distance = Some(distance);
        self
    }

    /// Operands as an unordered pair `(min, max)`.
    pub fn operands(&self) -> (ClusterId, ClusterId) {
        (self.left.min(self.right), self.left.max(self.right))
    }
}

impl PartialEq for MergeStep {
    fn eq(&self, other: &Self) -> bool {
        self.operands() == other.operands()
    }
}

impl Eq for MergeStep {}

impl Hash for MergeStep {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.operands().hash(state);
    }
}

// ---------------------------------------------------------------------------
// MergeTreeError
// ---------------------------------------------------------------------------

/// Structural violations of the forest property.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MergeTreeError {
    /// A tree over zero sources.
    #[error("malformed merge tree: no sources")]
    NoSources,
    /// The number of steps is not `source_count - 1`.
    #[error(
        "malformed merge tree: {source_count} sources need {expected} steps, found {actual}"
    )]
    StepCount {
        source_count: usize,
        expected: usize,
        actual: usize,
    },
    /// An operand id has not been produced yet (or never will be).
    #[error("malformed merge tree: step {step} uses cluster {cluster} before it exists")]
    OperandNotFormed { step: usize, cluster: ClusterId },
    /// An operand was already consumed by an earlier step.
    #[error("malformed merge tree: step {step} reuses cluster {cluster}, already merged")]
    OperandReused { step: usize, cluster: ClusterId },
    /// Both operands are the same cluster.
    #[error("malformed merge tree: step {step} merges cluster {cluster} with itself")]
    SelfMerge { step: usize, cluster: ClusterId },
    /// The distance list does not line up with the steps.
    #[error("malformed merge tree: {steps} steps but {distances} distances")]
    DistanceCount { steps: usize, distances: usize },
}

/// Checks the forest property for `steps` over `source_count` singletons.
///
/// # Errors
///
/// Returns the first violation found, in step order.
pub fn validate_steps(source_count: usize, steps: &[MergeStep]) -> Result<(), MergeTreeError> {
    if source_count == 0 {
        return Err(MergeTreeError::NoSources);
    }
    let expected = source_count - 1;
    if steps.len() != expected {
        return Err(MergeTreeError::StepCount {
            source_count,
            expected,
            actual: steps.len(),
        });
    }
    let mut consumed = vec![false; 2 * source_count - 1];
    for (step, s) in steps.iter().enumerate() {
        if s.left == s.right {
            return Err(MergeTreeError::SelfMerge {
                step,
                cluster: s.left,
            });
        }
        for cluster in [s.left, s.right] {
            if cluster >= source_count + step {
                return Err(MergeTreeError::OperandNotFormed { step, cluster });
            }
            if consumed[cluster] {
                return Err(MergeTreeError::OperandReused { step, cluster });
            }
            consumed[cluster] = true;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// MergeTree
// ---------------------------------------------------------------------------

/// A validated merge plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "MergeTreeRepr", into = "MergeTreeRepr")]
pub struct MergeTree {
    source_count: usize,
    steps: Vec<MergeStep>,
}

#[derive(Serialize, Deserialize)]
struct MergeTreeRepr {
    source_count: usize,
    steps: Vec<[ClusterId; 2]>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    distances: Vec<Option<f64>>,
}

impl TryFrom<MergeTreeRepr> for MergeTree {
    type Error = MergeTreeError;

    fn try_from(repr: MergeTreeRepr) -> Result<Self, Self::Error> {
        if !repr.distances.is_empty() && repr.distances.len() != repr.steps.len() {
            return Err(MergeTreeError::DistanceCount {
                steps: repr.steps.len(),
                distances: repr.distances.len(),
            });
        }
        let steps = repr
            .steps
            .iter()
            .enumerate()
            .map(|(i, [left, right])| MergeStep {
                left: *left,
                right: *right,
                distance: repr.distances.get(i).copied().flatten(),
            })
            .collect();
        MergeTree::new(repr.source_count, steps)
    }
}

impl From<MergeTree> for MergeTreeRepr {
    fn from(tree: MergeTree) -> Self {
        let distances = if tree.steps.iter().any(|s| s.distance.is_some()) {
            tree.steps.iter().map(|s| s.distance).collect()
        } else {
            Vec::new()
        };
        MergeTreeRepr {
            source_count: tree.source_count,
            steps: tree.steps.iter().map(|s| [s.left, s.right]).collect(),
            distances,
        }
    }
}

impl PartialEq for MergeTree {
    fn eq(&self, other: &Self) -> bool {
        self.source_count == other.source_count && self.steps == other.steps
    }
}

impl Eq for MergeTree {}

impl Hash for MergeTree {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.source_count.hash(state);
        self.steps.hash(state);
    }
}

/// Node weight of the [`MergeTree::dendrogram`] graph.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DendrogramNode {
    pub cluster: ClusterId,
    /// Distance of the producing step; `None` for sources.
    pub distance: Option<f64>,
}

/// Edge weight of the dendrogram: `0` for the left child, `1` for the right.
pub type ChildSlot = u8;

impl MergeTree {
    /// Validates and wraps `steps`.
    ///
    /// # Errors
    ///
    /// Returns a [`MergeTreeError`] when the steps violate the forest property.
    pub fn new(source_count: usize, steps: Vec<MergeStep>) -> Result<Self, MergeTreeError> {
        validate_steps(source_count, &steps)?;
        Ok(Self {
            source_count,
            steps,
        })
    }

    /// Builds a tree from plain `(left, right)` pairs.
    ///
    /// # Errors
    ///
    /// See [`MergeTree::new`].
    pub fn from_pairs(
        source_count: usize,
        pairs: &[(ClusterId, ClusterId)],
    ) -> Result<Self, MergeTreeError> {
        Self::new(
            source_count,
            pairs.iter().map(|&(l, r)| MergeStep::new(l, r)).collect(),
        )
    }

    /// Number of singleton sources.
    pub fn source_count(&self) -> usize {
        self.source_count
    }

    /// The steps, in execution order.
    pub fn steps(&self) -> &[MergeStep] {
        &self.steps
    }

    /// Number of steps (`source_count - 1`).
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// `true` for a single-source tree, which has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Cluster id produced by step `step`.
    pub fn produced_by(&self, step: usize) -> ClusterId {
        self.source_count + step
    }

    /// Id of the final cluster.
    pub fn root(&self) -> ClusterId {
        self.source_count + self.steps.len() - 1
    }

    /// Recorded distances, one per step.
    pub fn distances(&self) -> Vec<Option<f64>> {
        self.steps.iter().map(|s| s.distance).collect()
    }

    /// The sources contained in `cluster`, ascending. Empty for ids outside
    /// the tree.
    pub fn members(&self, cluster: ClusterId) -> Vec<SourceId> {
        let mut out = Vec::new();
        if cluster > self.root() {
            return out;
        }
        let mut stack = vec![cluster];
        while let Some(c) = stack.pop() {
            if c < self.source_count {
                out.push(c);
            } else {
                let step = &self.steps[c - self.source_count];
                stack.push(step.left);
                stack.push(step.right);
            }
        }
        out.sort_unstable();
        out
    }

    /// The tree as a petgraph graph. Node index `i` holds cluster `i`; edges
    /// point from a merged cluster to its two children.
    pub fn dendrogram(&self) -> DiGraph<DendrogramNode, ChildSlot> {
        let mut graph = DiGraph::with_capacity(self.root() + 1, 2 * self.steps.len());
        for source in 0..self.source_count {
            graph.add_node(DendrogramNode {
                cluster: source,
                distance: None,
            });
        }
        for (i, step) in self.steps.iter().enumerate() {
            let parent = graph.add_node(DendrogramNode {
                cluster: self.produced_by(i),
                distance: step.distance,
            });
            graph.add_edge(parent, NodeIndex::new(step.left), 0);
            graph.add_edge(parent, NodeIndex::new(step.right), 1);
        }
        graph
    }

    /// Number of levels from the root down to the deepest source; a
    /// single-source tree has height 1.
    pub fn height(&self) -> usize {
        let graph = self.dendrogram();
        let mut best = 0;
        let mut stack = vec![(NodeIndex::new(self.root()), 1usize)];
        while let Some((node, depth)) = stack.pop() {
            best = best.max(depth);
            for child in graph.neighbors(node) {
                stack.push((child, depth + 1));
            }
        }
        best
    }

    /// How many steps become runnable in each successive wave when every step
    /// whose operands exist is executed at once.
    pub fn parallel_levels(&self) -> Vec<usize> {
        let total = self.root() + 1;
        let mut formed = vec![false; total];
        formed[..self.source_count].fill(true);
        let mut done = vec![false; self.steps.len()];
        let mut levels = Vec::new();
        let mut remaining = self.steps.len();
        while remaining > 0 {
            let ready: Vec<usize> = self
                .steps
                .iter()
                .enumerate()
                .filter(|(i, s)| !done[*i] && formed[s.left] && formed[s.right])
                .map(|(i, _)| i)
                .collect();
            for &i in &ready {
                done[i] = true;
                formed[self.produced_by(i)] = true;
            }
            remaining -= ready.len();
            levels.push(ready.len());
        }
        levels
    }

    /// Renders the tree as indented text. Sources use `labels[i]` when
    /// present; merged clusters show their id and distance.
    pub fn render(&self, labels: &[String]) -> String {
        let graph = self.dendrogram();
        let name = |node: NodeIndex| -> String {
            let weight = graph[node];
            if weight.cluster < self.source_count {
                labels
                    .get(weight.cluster)
                    .cloned()
                    .unwrap_or_else(|| weight.cluster.to_string())
            } else {
                match weight.distance {
                    Some(d) => format!("[{}] d={d:.3}", weight.cluster),
                    None => format!("[{}]", weight.cluster),
                }
            }
        };

        let mut out = String::new();
        // (node, prefix inherited from the parent, child slot; `None` at the root)
        let mut stack: Vec<(NodeIndex, String, Option<ChildSlot>)> =
            vec![(NodeIndex::new(self.root()), String::new(), None)];
        while let Some((node, prefix, slot)) = stack.pop() {
            let (connector, child_prefix) = match slot {
                None => ("", prefix.clone()),
                Some(0) => ("├── ", format!("{prefix}│   ")),
                Some(_) => ("└── ", format!("{prefix}    ")),
            };
            out.push_str(&format!("{prefix}{connector}{}\n", name(node)));
            let mut children: Vec<(ChildSlot, NodeIndex)> = graph
                .edges(node)
                .map(|e| (*e.weight(), e.target()))
                .collect();
            // Right child is pushed first so the left child prints first.
            children.sort_unstable_by(|a, b| b.cmp(a));
            for (child_slot, child) in children {
                stack.push((child, child_prefix.clone(), Some(child_slot)));
            }
        }
        out
    }

    /// SHA-256 over the source count and the unordered operand pairs, as
    /// lowercase hex. Equal trees have equal fingerprints.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.source_count.to_le_bytes());
        for step in &self.steps {
            let (a, b) = step.operands();
            hasher.update(a.to_le_bytes());
            hasher.update(b.to_le_bytes());
        }
        hasher
            .finalize()
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect()
    }
}

#[cfg(test)]
mod tests;
