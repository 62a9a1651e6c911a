//! Implementation of `msalign run <track> --matcher <program> [-- args..]`.
//!
//! Plans one merge tree, drives the external matcher over it and scores the
//! resulting global alignment. A failed run still prints its partial result
//! and scores, then exits with code 1.
use msalign_core::{ExperimentConfig, ExperimentResult, run_experiment};

use crate::cli::DispatchArgs;
use crate::error::CliError;
use crate::matcher::ExternalCommandMatcher;
use crate::{OutputFormat, PathOrStdin, format, io};

fn render(result: &ExperimentResult, labels: &[String]) -> String {
    let mut out = format::render_tree(&result.strategy, &result.tree, labels);
    out.push('\n');
    out.push_str(&format::render_outcome(&result.outcome));
    out.push('\n');
    out.push_str(&format::render_report(&result.report));
    out
}

/// Runs the `run` command.
///
/// # Errors
///
/// Returns [`CliError`] with exit code 2 for unusable input and exit code 1
/// when the dispatch run ends in the failed state.
pub fn run(
    track: &PathOrStdin,
    dispatch: &DispatchArgs,
    config: &ExperimentConfig,
    max_file_size: u64,
    output: OutputFormat,
) -> Result<(), CliError> {
    let track = io::read_track(track, max_file_size)?;
    let matcher = ExternalCommandMatcher::new(&dispatch.matcher, dispatch.matcher_args.clone());
    let result = run_experiment(&track, config, &matcher)?;

    let labels = track.labels();
    format::emit(output, &result, |r| render(r, &labels))?;

    match &result.outcome.failure {
        Some(reason) => Err(CliError::RunFailed {
            code: reason.code(),
            detail: reason.to_string(),
        }),
        None => Ok(()),
    }
}
