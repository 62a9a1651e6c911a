//! Implementation of `msalign plan <track>`.
//!
//! Summarizes every source, builds one merge tree with the selected strategy
//! and prints it. Exit codes: 0 = success, 2 = unreadable or invalid track.
use msalign_core::{ExperimentConfig, MergeTree, PlanStrategy, build_merge_tree, summarize_track};
use serde::Serialize;

use crate::cli::StrategyArgs;
use crate::error::CliError;
use crate::{OutputFormat, PathOrStdin, format, io};

/// Everything `plan` prints.
#[derive(Debug, Serialize)]
pub struct PlanOutput {
    pub strategy: PlanStrategy,
    pub labels: Vec<String>,
    pub fingerprint: String,
    pub height: usize,
    /// Steps per dependency level; steps on one level are independent.
    pub parallel_levels: Vec<usize>,
    pub tree: MergeTree,
}

/// Runs the `plan` command.
///
/// # Errors
///
/// Returns [`CliError`] with exit code 2 when the track cannot be loaded or
/// the strategy cannot be planned.
pub fn run(
    track: &PathOrStdin,
    strategy: &StrategyArgs,
    config: &ExperimentConfig,
    max_file_size: u64,
    output: OutputFormat,
) -> Result<(), CliError> {
    let track = io::read_track(track, max_file_size)?;
    let strategy = strategy.resolve(config.strategy);
    let summaries = summarize_track(&track, &config.features);
    let tree = build_merge_tree(&summaries, &strategy).map_err(CliError::invalid)?;

    let plan = PlanOutput {
        strategy,
        labels: track.labels(),
        fingerprint: tree.fingerprint(),
        height: tree.height(),
        parallel_levels: tree.parallel_levels(),
        tree,
    };
    format::emit(output, &plan, |p| {
        format::render_tree(&p.strategy, &p.tree, &p.labels)
    })
}
