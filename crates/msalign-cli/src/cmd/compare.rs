//! Implementation of `msalign compare <track> --matcher <program>`.
//!
//! Plans the track with every order heuristic and every linkage, runs each
//! distinct tree once (concurrently), and prints one score line per tree.
//! The pairwise baselines follow, one line per distinct pair list.
use msalign_core::{
    Aggregation, Comparison, EvaluationReport, ExperimentConfig, Linkage, OrderHeuristic,
    PairwiseBaseline, PlanStrategy, TokenSimilarity, compare_strategies,
};

use crate::cli::DispatchArgs;
use crate::error::CliError;
use crate::matcher::ExternalCommandMatcher;
use crate::{OutputFormat, PathOrStdin, format, io};

/// Every order heuristic followed by every linkage over `similarity`.
pub fn all_strategies(similarity: TokenSimilarity) -> Vec<PlanStrategy> {
    OrderHeuristic::all()
        .into_iter()
        .map(PlanStrategy::Order)
        .chain(Linkage::ALL.into_iter().map(|linkage| PlanStrategy::Cluster {
            linkage,
            similarity,
        }))
        .collect()
}

fn scores(report: &EvaluationReport) -> (f64, f64) {
    (
        report.aggregate(Aggregation::Micro).f1,
        report.aggregate(Aggregation::Macro).f1,
    )
}

fn render(comparison: &Comparison) -> String {
    let mut out = format!(
        "{:<12}  {:>6}  {:>8}  {:>8}  {:>8}  strategies\n",
        "tree", "state", "aligned", "micro-f1", "macro-f1"
    );
    for tree in &comparison.trees {
        let names: Vec<String> = tree.strategies.iter().map(ToString::to_string).collect();
        let (micro, macro_f1) = scores(&tree.report);
        out.push_str(&format!(
            "{:<12}  {:>6}  {:>8}  {:>8.4}  {:>8.4}  {}\n",
            format::short_fingerprint(&tree.tree),
            if tree.outcome.is_done() { "done" } else { "failed" },
            tree.outcome.alignment.len(),
            micro,
            macro_f1,
            names.join(", ")
        ));
    }
    if comparison.baselines.is_empty() {
        return out;
    }
    out.push_str(&format!(
        "\n{:<12}  {:>6}  {:>8}  {:>8}  {:>8}  baselines\n",
        "pairs", "state", "aligned", "micro-f1", "macro-f1"
    ));
    for baseline in &comparison.baselines {
        let names: Vec<String> = baseline.baselines.iter().map(ToString::to_string).collect();
        let (micro, macro_f1) = scores(&baseline.report);
        out.push_str(&format!(
            "{:<12}  {:>6}  {:>8}  {:>8.4}  {:>8.4}  {}\n",
            baseline.pairs.len(),
            if baseline.outcome.is_done() { "done" } else { "failed" },
            baseline.outcome.alignment.len(),
            micro,
            macro_f1,
            names.join(", ")
        ));
    }
    out
}

/// Runs the `compare` command.
///
/// # Errors
///
/// Returns [`CliError`] with exit code 2 for unusable input and exit code 1
/// when at least one run failed.
pub fn run(
    track: &PathOrStdin,
    similarity: TokenSimilarity,
    with_baselines: bool,
    dispatch: &DispatchArgs,
    config: &ExperimentConfig,
    max_file_size: u64,
    output: OutputFormat,
) -> Result<(), CliError> {
    let track = io::read_track(track, max_file_size)?;
    let matcher = ExternalCommandMatcher::new(&dispatch.matcher, dispatch.matcher_args.clone());
    let strategies = all_strategies(similarity);
    let baselines = if with_baselines {
        PairwiseBaseline::all()
    } else {
        Vec::new()
    };
    let comparison = compare_strategies(&track, &strategies, &baselines, &matcher, config)?;

    format::emit(output, &comparison, render)?;

    let failures = comparison.failures();
    match failures.first() {
        None => Ok(()),
        Some(first) => {
            let reasons: Vec<String> = failures.iter().map(ToString::to_string).collect();
            Err(CliError::RunFailed {
                code: first.code(),
                detail: format!(
                    "{} of {} runs failed: {}",
                    failures.len(),
                    comparison.runs(),
                    reasons.join("; ")
                ),
            })
        }
    }
}
