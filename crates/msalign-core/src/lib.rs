#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod alignment;
pub mod closure;
pub mod dataset_id;
pub mod dispatch;
pub mod evaluation;
pub mod features;
pub mod linkage;
pub mod merge_tree;
pub mod partition;
pub mod pipeline;
pub mod planner;
pub mod source;
pub mod vocab;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use alignment::{Alignment, Correspondence, CorrespondenceKey, Relation, UnknownRelation};
pub use closure::EntityClosure;
pub use dataset_id::{DatasetId, DatasetIdError, DatasetIdResolver, ExtractionRule};
pub use dispatch::{
    CancellationToken, ClusterGraph, DispatchConfig, DispatchError, DispatchOutcome, Dispatcher,
    FailureReason, InputAlignmentMode, Matcher, MatcherError, MatcherParams, RunState,
    StepOrientation, StepRecord, dispatch_many, dispatch_pairs_many,
};
pub use evaluation::{
    AggregateScores, Aggregation, ConfusionMatrix, EvaluationConfig, EvaluationReport,
    GoldStandardCompleteness, MacroDivisor, ScoreRecord, evaluate, evaluate_alignment,
    macro_average, micro_average,
};
pub use features::{FeatureConfig, FeatureSummary, summarize_track};
pub use linkage::{DistanceMatrix, Linkage, TokenSimilarity};
pub use merge_tree::{ClusterId, MergeStep, MergeTree, MergeTreeError};
pub use partition::{
    PartitionError, PartitionMode, PartitionedAlignment, Partitioner, SourceTargetUris,
    TestCaseDatasets,
};
pub use pipeline::{
    BaselineComparison, Comparison, ExperimentConfig, ExperimentResult, PipelineError,
    StrategyComparison, compare_strategies, run_experiment,
};
pub use planner::{
    DistinctPairs, DistinctTree, OrderHeuristic, OrderStatistic, PairwiseBaseline, PlanError,
    PlanStrategy, SortDirection, build_merge_tree, distinct_order_trees, distinct_pair_plans,
};
pub use source::{SourceGraph, SourceId, Term, TestCase, Track, TrackError, Triple};

/// Returns the current version of the msalign-core library.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
