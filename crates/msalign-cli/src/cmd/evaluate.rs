//! Implementation of `msalign evaluate <track> <alignment>`.
//!
//! Partitions a global alignment onto the track's test cases and scores each
//! against its reference. Exit codes: 0 = scored, 2 = unreadable input.
use msalign_core::{ExperimentConfig, Partitioner, evaluate_alignment};

use crate::error::CliError;
use crate::{OutputFormat, PathOrStdin, format, io};

/// Runs the `evaluate` command.
///
/// # Errors
///
/// Returns [`CliError`] with exit code 2 when either document cannot be
/// loaded or a source has no dataset id.
pub fn run(
    track: &PathOrStdin,
    alignment: &PathOrStdin,
    config: &ExperimentConfig,
    max_file_size: u64,
    output: OutputFormat,
) -> Result<(), CliError> {
    let track = io::read_track(track, max_file_size)?;
    let alignment = io::read_alignment(alignment, max_file_size)?;
    let resolver = config.resolver().map_err(CliError::invalid)?;
    let partitioner = Partitioner::from_track(&track, resolver).map_err(CliError::invalid)?;

    let report = evaluate_alignment(&track, &partitioner, &alignment, &config.evaluation);
    format::emit(output, &report, format::render_report)
}
