//! Implementation of `msalign resolve <track>`.
//!
//! Prints the dataset id each source resolves to and the dataset pair of
//! every test case. A source without a dataset id is printed as
//! `(unresolved)` and makes the command exit with code 2.
use msalign_core::{DatasetId, ExperimentConfig, Partitioner, TestCaseDatasets};
use serde::Serialize;

use crate::error::CliError;
use crate::{OutputFormat, PathOrStdin, format, io};

#[derive(Debug, Serialize)]
pub struct SourceDataset {
    pub index: usize,
    pub label: String,
    pub dataset: Option<DatasetId>,
}

#[derive(Debug, Serialize)]
pub struct ResolveOutput {
    pub sources: Vec<SourceDataset>,
    /// Empty when a source is unresolved.
    pub test_cases: Vec<TestCaseDatasets>,
}

fn render(output: &ResolveOutput) -> String {
    let width = output
        .sources
        .iter()
        .map(|s| s.label.len())
        .max()
        .unwrap_or(0);
    let mut out = String::new();
    for source in &output.sources {
        out.push_str(&format!(
            "{:>3}  {:<width$}  {}\n",
            source.index,
            source.label,
            source.dataset.as_deref().unwrap_or("(unresolved)")
        ));
    }
    if !output.test_cases.is_empty() {
        out.push('\n');
        for tc in &output.test_cases {
            out.push_str(&format!("{}: {} -> {}\n", tc.name, tc.source, tc.target));
        }
    }
    out
}

/// Runs the `resolve` command.
///
/// # Errors
///
/// Returns [`CliError`] with exit code 2 when the track cannot be loaded, a
/// dataset pattern does not compile, or a source resolves to nothing.
pub fn run(
    track: &PathOrStdin,
    config: &ExperimentConfig,
    max_file_size: u64,
    output: OutputFormat,
) -> Result<(), CliError> {
    let track = io::read_track(track, max_file_size)?;
    let resolver = config.resolver().map_err(CliError::invalid)?;

    let sources: Vec<SourceDataset> = track
        .sources
        .iter()
        .enumerate()
        .map(|(index, graph)| SourceDataset {
            index,
            label: graph.label.clone(),
            dataset: resolver.resolve_source(graph),
        })
        .collect();
    let unresolved: Vec<&str> = sources
        .iter()
        .filter(|s| s.dataset.is_none())
        .map(|s| s.label.as_str())
        .collect();
    let failure = (!unresolved.is_empty()).then(|| {
        CliError::invalid(format!(
            "no dataset id for source(s): {}",
            unresolved.join(", ")
        ))
    });

    let test_cases = if failure.is_none() {
        Partitioner::from_track(&track, resolver)
            .map_err(CliError::invalid)?
            .test_cases()
            .to_vec()
    } else {
        Vec::new()
    };

    format::emit(
        output,
        &ResolveOutput {
            sources,
            test_cases,
        },
        render,
    )?;
    failure.map_or(Ok(()), Err)
}
