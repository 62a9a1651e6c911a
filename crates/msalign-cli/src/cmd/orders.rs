//! Implementation of `msalign orders <track>`.
//!
//! Runs every order heuristic (each statistic in both directions) and lists
//! the distinct trees, each with the heuristics that produced it.
use msalign_core::{
    DistinctTree, ExperimentConfig, OrderHeuristic, distinct_order_trees, summarize_track,
};
use serde::Serialize;

use crate::error::CliError;
use crate::{OutputFormat, PathOrStdin, format, io};

#[derive(Debug, Serialize)]
pub struct OrdersOutput {
    pub labels: Vec<String>,
    pub heuristics: usize,
    pub trees: Vec<DistinctTree>,
}

fn render(output: &OrdersOutput) -> String {
    let mut out = format!(
        "{} heuristics, {} distinct trees\n",
        output.heuristics,
        output.trees.len()
    );
    for (i, distinct) in output.trees.iter().enumerate() {
        let names: Vec<String> = distinct.heuristics.iter().map(ToString::to_string).collect();
        out.push_str(&format!(
            "\ntree {i} [{}]: {}\n",
            format::short_fingerprint(&distinct.tree),
            names.join(", ")
        ));
        out.push_str(&distinct.tree.render(&output.labels));
    }
    out
}

/// Runs the `orders` command.
///
/// # Errors
///
/// Returns [`CliError`] with exit code 2 when the track cannot be loaded.
pub fn run(
    track: &PathOrStdin,
    config: &ExperimentConfig,
    max_file_size: u64,
    output: OutputFormat,
) -> Result<(), CliError> {
    let track = io::read_track(track, max_file_size)?;
    let summaries = summarize_track(&track, &config.features);
    let heuristics = OrderHeuristic::all();
    let trees = distinct_order_trees(&summaries, &heuristics).map_err(CliError::invalid)?;
    let result = OrdersOutput {
        labels: track.labels(),
        heuristics: heuristics.len(),
        trees,
    };
    format::emit(output, &result, render)
}
