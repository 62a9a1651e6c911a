//! End-to-end experiment driver.
//!
//! `resolve -> summarize -> plan -> dispatch -> partition -> evaluate` for a
//! single strategy ([`run_experiment`]) or for a set of strategies whose
//! distinct trees run concurrently, next to the pairwise baselines they are
//! judged against ([`compare_strategies`]).
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::dataset_id::{DatasetIdError, DatasetIdResolver, ExtractionRule};
use crate::dispatch::{
    DispatchConfig, DispatchError, DispatchOutcome, Dispatcher, FailureReason, Matcher,
    dispatch_many, dispatch_pairs_many,
};
use crate::evaluation::{EvaluationConfig, EvaluationReport, evaluate_alignment};
use crate::features::{FeatureConfig, FeatureSummary, summarize_track};
use crate::merge_tree::MergeTree;
use crate::partition::{PartitionError, PartitionMode, Partitioner};
use crate::planner::{
    PairwiseBaseline, PlanError, PlanStrategy, build_merge_tree, distinct_pair_plans,
    distinct_trees,
};
use crate::source::{SourceGraph, SourceId, Track, TrackError};

/// Every knob of one experiment. Missing JSON fields take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub strategy: PlanStrategy,
    pub features: FeatureConfig,
    /// URL patterns for dataset resolution; namespace prefixes when empty.
    pub dataset_patterns: Vec<String>,
    /// Namespaces denied in addition to the shared vocabularies.
    pub denied_namespaces: Vec<String>,
    pub dispatch: DispatchConfig,
    pub evaluation: EvaluationConfig,
}

impl ExperimentConfig {
    /// Builds the dataset resolver described by this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetIdError::InvalidPattern`] for a pattern that does not
    /// compile.
    pub fn resolver(&self) -> Result<DatasetIdResolver, DatasetIdError> {
        let rule = if self.dataset_patterns.is_empty() {
            ExtractionRule::NamespacePrefix
        } else {
            ExtractionRule::url_patterns(&self.dataset_patterns)?
        };
        Ok(self
            .denied_namespaces
            .iter()
            .fold(DatasetIdResolver::new(rule), |r, ns| {
                r.with_denied_namespace(ns.as_str())
            }))
    }
}

/// Failures that stop an experiment before dispatch produces anything.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Track(#[from] TrackError),
    #[error(transparent)]
    DatasetId(#[from] DatasetIdError),
    #[error(transparent)]
    Partition(#[from] PartitionError),
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Outcome of one strategy.
#[derive(Debug, Clone, Serialize)]
pub struct ExperimentResult {
    pub strategy: PlanStrategy,
    pub tree: MergeTree,
    pub outcome: DispatchOutcome,
    /// Scores of the (possibly partial) global alignment.
    pub report: EvaluationReport,
}

/// One distinct tree of a comparison and every strategy that produced it.
#[derive(Debug, Clone, Serialize)]
pub struct StrategyComparison {
    pub strategies: Vec<PlanStrategy>,
    pub tree: MergeTree,
    pub outcome: DispatchOutcome,
    pub report: EvaluationReport,
}

/// One distinct pair list of a comparison and every baseline that produced it.
#[derive(Debug, Clone, Serialize)]
pub struct BaselineComparison {
    pub baselines: Vec<PairwiseBaseline>,
    pub pairs: Vec<(SourceId, SourceId)>,
    pub outcome: DispatchOutcome,
    /// Scored with transitive closure when the baselines need it.
    pub report: EvaluationReport,
}

/// Result of [`compare_strategies`].
#[derive(Debug, Clone, Serialize)]
pub struct Comparison {
    pub trees: Vec<StrategyComparison>,
    pub baselines: Vec<BaselineComparison>,
}

impl Comparison {
    /// Failure reasons of every run, trees first.
    pub fn failures(&self) -> Vec<&FailureReason> {
        self.trees
            .iter()
            .map(|c| &c.outcome)
            .chain(self.baselines.iter().map(|c| &c.outcome))
            .filter_map(|o| o.failure.as_ref())
            .collect()
    }

    /// Number of dispatch runs.
    pub fn runs(&self) -> usize {
        self.trees.len() + self.baselines.len()
    }
}

struct Prepared {
    partitioner: Partitioner,
    summaries: Vec<FeatureSummary>,
    sources: Vec<Arc<SourceGraph>>,
}

fn prepare(track: &Track, config: &ExperimentConfig) -> Result<Prepared, PipelineError> {
    track.validate()?;
    let partitioner = Partitioner::from_track(track, config.resolver()?)?;
    let summaries = summarize_track(track, &config.features);
    let sources = track.sources.iter().cloned().map(Arc::new).collect();
    Ok(Prepared {
        partitioner,
        summaries,
        sources,
    })
}

/// Runs one experiment with `config.strategy`.
///
/// A failed or cancelled dispatch still yields `Ok`; its partial alignment
/// is evaluated like a complete one.
///
/// # Errors
///
/// Returns [`PipelineError`] for an invalid track, an unresolvable source,
/// or a planning failure. The matcher is not called in those cases.
pub fn run_experiment<M>(
    track: &Track,
    config: &ExperimentConfig,
    matcher: &M,
) -> Result<ExperimentResult, PipelineError>
where
    M: Matcher + ?Sized,
{
    let prepared = prepare(track, config)?;
    let tree = build_merge_tree(&prepared.summaries, &config.strategy)?;
    let outcome =
        Dispatcher::new(matcher, config.dispatch.clone()).run(&tree, &prepared.sources)?;
    let report = evaluate_alignment(
        track,
        &prepared.partitioner,
        &outcome.alignment,
        &config.evaluation,
    );
    tracing::info!(
        strategy = %config.strategy,
        state = ?outcome.state,
        micro_f1 = report.micro.f1,
        "experiment finished"
    );
    Ok(ExperimentResult {
        strategy: config.strategy,
        tree,
        outcome,
        report,
    })
}

/// Builds a tree per strategy and a pair list per baseline, runs each
/// distinct plan once (concurrently), and evaluates every run.
/// `config.strategy` is ignored.
///
/// # Errors
///
/// As [`run_experiment`].
pub fn compare_strategies<M>(
    track: &Track,
    strategies: &[PlanStrategy],
    baselines: &[PairwiseBaseline],
    matcher: &M,
    config: &ExperimentConfig,
) -> Result<Comparison, PipelineError>
where
    M: Matcher + Sync + ?Sized,
{
    let prepared = prepare(track, config)?;
    let candidates = strategies
        .iter()
        .map(|s| build_merge_tree(&prepared.summaries, s).map(|tree| (*s, tree)))
        .collect::<Result<Vec<_>, _>>()?;
    let groups = distinct_trees(candidates);
    let pair_groups = if baselines.is_empty() {
        Vec::new()
    } else {
        distinct_pair_plans(&prepared.summaries, baselines)?
    };
    tracing::info!(
        strategies = strategies.len(),
        distinct = groups.len(),
        baselines = baselines.len(),
        distinct_baselines = pair_groups.len(),
        "deduplicated strategies"
    );

    let trees: Vec<MergeTree> = groups.iter().map(|(_, tree)| tree.clone()).collect();
    let plans: Vec<Vec<(SourceId, SourceId)>> =
        pair_groups.iter().map(|g| g.pairs.clone()).collect();
    let (tree_outcomes, pair_outcomes) = rayon::join(
        || dispatch_many(matcher, &trees, &prepared.sources, &config.dispatch),
        || dispatch_pairs_many(matcher, &plans, &prepared.sources, &config.dispatch),
    );

    let mut tree_comparisons = Vec::with_capacity(groups.len());
    for ((strategies, tree), outcome) in groups.into_iter().zip(tree_outcomes) {
        let outcome = outcome?;
        let report = evaluate_alignment(
            track,
            &prepared.partitioner,
            &outcome.alignment,
            &config.evaluation,
        );
        tree_comparisons.push(StrategyComparison {
            strategies,
            tree,
            outcome,
            report,
        });
    }

    let mut baseline_comparisons = Vec::with_capacity(pair_groups.len());
    for (group, outcome) in pair_groups.into_iter().zip(pair_outcomes) {
        let outcome = outcome?;
        let evaluation = if group.needs_transitive_closure() {
            EvaluationConfig {
                partition_mode: PartitionMode::TransitiveClosure,
                ..config.evaluation
            }
        } else {
            config.evaluation
        };
        let report =
            evaluate_alignment(track, &prepared.partitioner, &outcome.alignment, &evaluation);
        baseline_comparisons.push(BaselineComparison {
            baselines: group.baselines,
            pairs: group.pairs,
            outcome,
            report,
        });
    }

    Ok(Comparison {
        trees: tree_comparisons,
        baselines: baseline_comparisons,
    })
}
