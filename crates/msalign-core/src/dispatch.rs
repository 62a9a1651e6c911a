//! Incremental dispatcher: executes a merge tree with a pluggable matcher.
//!
//! A run walks the steps of one [`MergeTree`] in order. Each step hands the
//! two operand clusters to the [`Matcher`] together with an input alignment,
//! folds the returned correspondences into the running global [`Alignment`]
//! (later confidence wins), and registers the union of the operands under
//! the step's new cluster id.
//!
//! Runs move through `Ready -> Running -> Done | Failed`. A failing matcher
//! call or a cancellation stops the run, but the alignment accumulated so far
//! is returned in the [`DispatchOutcome`]. Steps within one run are strictly
//! sequential; independent trees can run side by side via [`dispatch_many`].
//!
//! [`Dispatcher::run_pairs`] is the non-incremental counterpart: a fixed list
//! of source pairs, each matched on its own, with every result folded into
//! the same global alignment.
pub mod cluster;

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::alignment::Alignment;
use crate::merge_tree::{ClusterId, MergeStep, MergeTree, MergeTreeError};
use crate::source::{SourceGraph, SourceId};

pub use cluster::ClusterGraph;

/// Opaque key-value configuration passed through to the matcher unchanged.
pub type MatcherParams = BTreeMap<String, serde_json::Value>;

// ---------------------------------------------------------------------------
// Matcher
// ---------------------------------------------------------------------------

/// Error reported by a matcher for one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{message}")]
pub struct MatcherError {
    pub message: String,
}

impl MatcherError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A two-way matcher.
///
/// `left` is the source side and `right` the target side of the call. The
/// returned alignment holds the correspondences found for this pair; it may
/// repeat correspondences of `input`.
pub trait Matcher {
    /// Matches two cluster graphs.
    ///
    /// # Errors
    ///
    /// Returns [`MatcherError`] when the matcher cannot produce an alignment.
    fn match_graphs(
        &self,
        left: &ClusterGraph,
        right: &ClusterGraph,
        input: &Alignment,
        params: &MatcherParams,
    ) -> Result<Alignment, MatcherError>;
}

impl<F> Matcher for F
where
    F: Fn(&ClusterGraph, &ClusterGraph, &Alignment, &MatcherParams) -> Result<Alignment, MatcherError>,
{
    fn match_graphs(
        &self,
        left: &ClusterGraph,
        right: &ClusterGraph,
        input: &Alignment,
        params: &MatcherParams,
    ) -> Result<Alignment, MatcherError> {
        self(left, right, input, params)
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Which prior correspondences a step's matcher call receives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputAlignmentMode {
    /// An empty alignment.
    None,
    /// The whole running alignment.
    Full,
    /// Running correspondences that touch an entity of either operand.
    #[default]
    Restricted,
}

/// How operands are assigned to the matcher's source and target sides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOrientation {
    /// `step.left` is the source, `step.right` the target.
    #[default]
    AsPlanned,
    /// The operand with more triples becomes the target.
    LargerAsTarget,
}

/// Settings of a dispatch run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub input_alignment: InputAlignmentMode,
    pub orientation: StepOrientation,
    /// Passed to every matcher call.
    pub params: MatcherParams,
    /// Keep each step's raw matcher output in the outcome.
    pub keep_step_alignments: bool,
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Shared flag that stops a run before its next step.
///
/// A matcher call already in flight is always awaited.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Lifecycle of a dispatch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Ready,
    Running,
    Done,
    Failed,
}

/// Why a run ended in [`RunState::Failed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FailureReason {
    /// The matcher returned an error at `step`.
    MatcherInvocationFailed { step: usize, error: MatcherError },
    /// The run was cancelled before `before_step` started.
    Cancelled { before_step: usize },
}

impl FailureReason {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            FailureReason::MatcherInvocationFailed { .. } => "matcher_invocation_failed",
            FailureReason::Cancelled { .. } => "cancelled",
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::MatcherInvocationFailed { step, error } => {
                write!(f, "matcher failed at step {step}: {error}")
            }
            FailureReason::Cancelled { before_step } => {
                write!(f, "cancelled before step {before_step}")
            }
        }
    }
}

/// Result of one executed (or failed) step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepRecord {
    pub step: usize,
    /// Cluster passed as the matcher's source side.
    pub source: ClusterId,
    /// Cluster passed as the matcher's target side.
    pub target: ClusterId,
    /// Cluster formed by the step; absent for pairwise runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub produced: Option<ClusterId>,
    /// Size of the input alignment handed to the matcher.
    pub input_size: usize,
    /// Correspondences returned by the matcher.
    pub returned: usize,
    /// Growth of the global alignment caused by this step.
    pub added: usize,
    pub elapsed: Duration,
    pub succeeded: bool,
}

/// Everything a run produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchOutcome {
    pub state: RunState,
    /// The global alignment; partial when the run failed.
    pub alignment: Alignment,
    pub steps: Vec<StepRecord>,
    pub failure: Option<FailureReason>,
    /// Raw per-step matcher output, when requested.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub step_alignments: Vec<Alignment>,
}

impl DispatchOutcome {
    pub fn is_done(&self) -> bool {
        self.state == RunState::Done
    }

    /// Sum of per-step wall-clock time.
    pub fn total_elapsed(&self) -> Duration {
        self.steps.iter().map(|s| s.elapsed).sum()
    }
}

/// Problems detected before any matcher call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    MalformedMergeTree(#[from] MergeTreeError),
    #[error("merge tree covers {tree} sources but {supplied} were supplied")]
    SourceCountMismatch { tree: usize, supplied: usize },
    #[error("pair {index} ({left}, {right}) does not name two distinct sources out of {sources}")]
    InvalidPair {
        index: usize,
        left: SourceId,
        right: SourceId,
        sources: usize,
    },
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Executes merge trees with a borrowed matcher.
pub struct Dispatcher<'m, M: ?Sized> {
    matcher: &'m M,
    config: DispatchConfig,
    cancel: CancellationToken,
    state: RunState,
}

impl<'m, M: Matcher + ?Sized> Dispatcher<'m, M> {
    pub fn new(matcher: &'m M, config: DispatchConfig) -> Self {
        Self {
            matcher,
            config,
            cancel: CancellationToken::new(),
            state: RunState::Ready,
        }
    }

    /// Uses `token` to observe cancellation requests.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// State of the latest run; `Ready` before the first one.
    pub fn state(&self) -> RunState {
        self.state
    }

    fn transition(&mut self, next: RunState) {
        tracing::info!(from = ?self.state, to = ?next, "dispatch state change");
        self.state = next;
    }

    /// Validates raw steps, then runs them.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::MalformedMergeTree`] without calling the
    /// matcher when `steps` violate the forest property over
    /// `sources.len()` sources.
    pub fn run_steps(
        &mut self,
        steps: &[MergeStep],
        sources: &[Arc<SourceGraph>],
    ) -> Result<DispatchOutcome, DispatchError> {
        let tree = MergeTree::new(sources.len(), steps.to_vec())?;
        self.run(&tree, sources)
    }

    /// Executes `tree` over `sources` (indexed like the tree's singletons).
    ///
    /// Matcher failures and cancellation are reported inside the outcome, not
    /// as `Err`.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::SourceCountMismatch`] when `sources` does not
    /// match the tree.
    pub fn run(
        &mut self,
        tree: &MergeTree,
        sources: &[Arc<SourceGraph>],
    ) -> Result<DispatchOutcome, DispatchError> {
        if tree.source_count() != sources.len() {
            return Err(DispatchError::SourceCountMismatch {
                tree: tree.source_count(),
                supplied: sources.len(),
            });
        }

        let mut clusters: Vec<Option<ClusterGraph>> = sources
            .iter()
            .enumerate()
            .map(|(i, g)| Some(ClusterGraph::singleton(i, Arc::clone(g))))
            .collect();
        clusters.resize_with(tree.root() + 1, || None);

        let mut global = Alignment::new();
        let mut records = Vec::with_capacity(tree.len());
        let mut step_alignments = Vec::new();
        let mut failure = None;

        self.transition(RunState::Running);
        for (i, step) in tree.steps().iter().enumerate() {
            if let Some(cancelled) = self.cancelled_before(i) {
                failure = Some(cancelled);
                break;
            }

            // Validated trees consume every cluster exactly once after it is formed.
            let (Some(left), Some(right)) =
                (clusters[step.left].take(), clusters[step.right].take())
            else {
                break;
            };
            let (source, target) = self.orient(left, right);
            let input = self.input_for(&global, &source, &target);
            let produced = tree.produced_by(i);

            let (record, result) =
                self.execute(i, &source, &target, &input, Some(produced), &mut global);
            records.push(record);
            match result {
                Ok(found) => {
                    if self.config.keep_step_alignments {
                        step_alignments.push(found);
                    }
                    clusters[produced] = Some(ClusterGraph::union(produced, &source, &target));
                }
                Err(error) => {
                    tracing::warn!(step = i, error = %error, "matcher invocation failed");
                    failure = Some(FailureReason::MatcherInvocationFailed { step: i, error });
                    break;
                }
            }
        }

        Ok(self.finish(global, records, failure, step_alignments))
    }

    /// Matches each `(source, target)` pair of singleton sources on its own
    /// and merges every result into one global alignment.
    ///
    /// Pairs never see each other's output: every call receives an empty
    /// input alignment. Orientation, failures and cancellation behave as in
    /// [`run`](Self::run).
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::InvalidPair`] without calling the matcher when
    /// a pair repeats a source or names one outside `sources`.
    pub fn run_pairs(
        &mut self,
        pairs: &[(SourceId, SourceId)],
        sources: &[Arc<SourceGraph>],
    ) -> Result<DispatchOutcome, DispatchError> {
        if let Some((index, &(left, right))) = pairs
            .iter()
            .enumerate()
            .find(|(_, (l, r))| l == r || *l >= sources.len() || *r >= sources.len())
        {
            return Err(DispatchError::InvalidPair {
                index,
                left,
                right,
                sources: sources.len(),
            });
        }

        let input = Alignment::new();
        let mut global = Alignment::new();
        let mut records = Vec::with_capacity(pairs.len());
        let mut step_alignments = Vec::new();
        let mut failure = None;

        self.transition(RunState::Running);
        for (i, &(left, right)) in pairs.iter().enumerate() {
            if let Some(cancelled) = self.cancelled_before(i) {
                failure = Some(cancelled);
                break;
            }

            let (source, target) = self.orient(
                ClusterGraph::singleton(left, Arc::clone(&sources[left])),
                ClusterGraph::singleton(right, Arc::clone(&sources[right])),
            );
            let (record, result) = self.execute(i, &source, &target, &input, None, &mut global);
            records.push(record);
            match result {
                Ok(found) => {
                    if self.config.keep_step_alignments {
                        step_alignments.push(found);
                    }
                }
                Err(error) => {
                    tracing::warn!(step = i, error = %error, "matcher invocation failed");
                    failure = Some(FailureReason::MatcherInvocationFailed { step: i, error });
                    break;
                }
            }
        }

        Ok(self.finish(global, records, failure, step_alignments))
    }

    fn cancelled_before(&self, step: usize) -> Option<FailureReason> {
        if self.cancel.is_cancelled() {
            tracing::warn!(step, "dispatch cancelled");
            Some(FailureReason::Cancelled { before_step: step })
        } else {
            None
        }
    }

    /// Calls the matcher once and folds a successful result into `global`.
    fn execute(
        &self,
        step: usize,
        source: &ClusterGraph,
        target: &ClusterGraph,
        input: &Alignment,
        produced: Option<ClusterId>,
        global: &mut Alignment,
    ) -> (StepRecord, Result<Alignment, MatcherError>) {
        let started = Instant::now();
        let result = self
            .matcher
            .match_graphs(source, target, input, &self.config.params);
        let elapsed = started.elapsed();

        let mut record = StepRecord {
            step,
            source: source.id(),
            target: target.id(),
            produced,
            input_size: input.len(),
            returned: 0,
            added: 0,
            elapsed,
            succeeded: false,
        };
        if let Ok(found) = &result {
            let before = global.len();
            global.extend_from(found);
            record.returned = found.len();
            record.added = global.len() - before;
            record.succeeded = true;
            tracing::info!(
                step,
                source = record.source,
                target = record.target,
                returned = record.returned,
                added = record.added,
                elapsed_ms = elapsed.as_millis() as u64,
                "matcher step finished"
            );
        }
        (record, result)
    }

    fn finish(
        &mut self,
        alignment: Alignment,
        steps: Vec<StepRecord>,
        failure: Option<FailureReason>,
        step_alignments: Vec<Alignment>,
    ) -> DispatchOutcome {
        let state = if failure.is_some() {
            RunState::Failed
        } else {
            RunState::Done
        };
        self.transition(state);
        DispatchOutcome {
            state,
            alignment,
            steps,
            failure,
            step_alignments,
        }
    }

    fn orient(&self, left: ClusterGraph, right: ClusterGraph) -> (ClusterGraph, ClusterGraph) {
        match self.config.orientation {
            StepOrientation::AsPlanned => (left, right),
            StepOrientation::LargerAsTarget => {
                if left.triple_count() > right.triple_count() {
                    (right, left)
                } else {
                    (left, right)
                }
            }
        }
    }

    fn input_for(
        &self,
        global: &Alignment,
        source: &ClusterGraph,
        target: &ClusterGraph,
    ) -> Alignment {
        match self.config.input_alignment {
            InputAlignmentMode::None => Alignment::new(),
            InputAlignmentMode::Full => global.clone(),
            InputAlignmentMode::Restricted => {
                let mut entities: HashSet<&str> = source.entities();
                entities.extend(target.entities());
                global.restricted_to(&entities)
            }
        }
    }
}

/// Runs every tree concurrently, each with its own private state.
///
/// Results are returned in the order of `trees`.
pub fn dispatch_many<M>(
    matcher: &M,
    trees: &[MergeTree],
    sources: &[Arc<SourceGraph>],
    config: &DispatchConfig,
) -> Vec<Result<DispatchOutcome, DispatchError>>
where
    M: Matcher + Sync + ?Sized,
{
    trees
        .par_iter()
        .map(|tree| Dispatcher::new(matcher, config.clone()).run(tree, sources))
        .collect()
}

/// Runs every pair plan concurrently; see [`Dispatcher::run_pairs`].
///
/// Results are returned in the order of `plans`.
pub fn dispatch_pairs_many<M>(
    matcher: &M,
    plans: &[Vec<(SourceId, SourceId)>],
    sources: &[Arc<SourceGraph>],
    config: &DispatchConfig,
) -> Vec<Result<DispatchOutcome, DispatchError>>
where
    M: Matcher + Sync + ?Sized,
{
    plans
        .par_iter()
        .map(|pairs| Dispatcher::new(matcher, config.clone()).run_pairs(pairs, sources))
        .collect()
}

#[cfg(test)]
mod tests;
