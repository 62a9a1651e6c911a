/// File and stdin reading with size enforcement and UTF-8 validation.
///
/// Every document the `msalign` binary consumes (tracks, alignments,
/// experiment configs) enters through this module; `msalign-core` never
/// touches the filesystem.
///
/// Disk files have their size checked via `std::fs::metadata` before any
/// read. Stdin is read through a `Read::take` cap so allocation is bounded.
use std::io::Read as _;
use std::path::Path;

use msalign_core::{Alignment, ExperimentConfig, Track};
use serde::de::DeserializeOwned;

use crate::PathOrStdin;
use crate::error::CliError;

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Reads the entire contents of `source` into a `String`.
///
/// # Errors
///
/// Returns [`CliError`] (exit code 2) for a missing file, a permission
/// problem, input over `max_size`, any other I/O error, or invalid UTF-8.
pub fn read_input(source: &PathOrStdin, max_size: u64) -> Result<String, CliError> {
    match source {
        PathOrStdin::Path(path) => read_file(path, max_size),
        PathOrStdin::Stdin => read_stdin(max_size),
    }
}

/// Reads `source` and deserializes it as JSON. `what` names the document in
/// error messages.
///
/// # Errors
///
/// As [`read_input`], plus [`CliError::ParseFailed`] for malformed JSON.
pub fn read_json<T: DeserializeOwned>(
    source: &PathOrStdin,
    max_size: u64,
    what: &'static str,
) -> Result<T, CliError> {
    let content = read_input(source, max_size)?;
    serde_json::from_str(&content).map_err(|e| CliError::ParseFailed {
        what,
        source: source.to_string(),
        detail: format!("line {}, column {}: {e}", e.line(), e.column()),
    })
}

/// Loads and validates a track.
///
/// # Errors
///
/// As [`read_json`], plus [`CliError::InvalidInput`] for a structurally
/// invalid track.
pub fn read_track(source: &PathOrStdin, max_size: u64) -> Result<Track, CliError> {
    let track: Track = read_json(source, max_size, "track")?;
    track.validate().map_err(CliError::invalid)?;
    tracing::debug!(
        track = %track.name,
        sources = track.sources.len(),
        test_cases = track.test_cases.len(),
        "loaded track"
    );
    Ok(track)
}

/// Loads a global alignment: a JSON list of correspondences.
///
/// # Errors
///
/// As [`read_json`].
pub fn read_alignment(source: &PathOrStdin, max_size: u64) -> Result<Alignment, CliError> {
    read_json(source, max_size, "alignment")
}

/// Loads the experiment configuration, or the defaults when `source` is
/// `None`.
///
/// # Errors
///
/// As [`read_json`].
pub fn read_config(
    source: Option<&PathOrStdin>,
    max_size: u64,
) -> Result<ExperimentConfig, CliError> {
    match source {
        Some(source) => read_json(source, max_size, "config"),
        None => Ok(ExperimentConfig::default()),
    }
}

// ---------------------------------------------------------------------------
// Disk file reading
// ---------------------------------------------------------------------------

fn read_file(path: &Path, max_size: u64) -> Result<String, CliError> {
    let file_size = std::fs::metadata(path)
        .map_err(|e| io_error_to_cli(&e, path))?
        .len();

    if file_size > max_size {
        return Err(CliError::FileTooLarge {
            source: path.display().to_string(),
            limit: max_size,
            actual: Some(file_size),
        });
    }

    let bytes = std::fs::read(path).map_err(|e| io_error_to_cli(&e, path))?;
    bytes_to_string(&bytes, &path.display().to_string())
}

/// Maps a `std::io::Error` arising from a disk-file operation to a [`CliError`].
pub fn io_error_to_cli(e: &std::io::Error, path: &Path) -> CliError {
    let kind = e.kind();
    if kind == std::io::ErrorKind::NotFound {
        CliError::FileNotFound {
            path: path.to_path_buf(),
        }
    } else if kind == std::io::ErrorKind::PermissionDenied {
        CliError::PermissionDenied {
            path: path.to_path_buf(),
        }
    } else {
        CliError::IoError {
            source: path.display().to_string(),
            detail: e.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Stdin reading
// ---------------------------------------------------------------------------

/// Reads stdin, capped at `max_size` bytes. A stream of exactly `max_size`
/// bytes gets one extra read to tell "at the limit" from "over it".
fn read_stdin(max_size: u64) -> Result<String, CliError> {
    let stdin = std::io::stdin();
    let mut handle = stdin.lock();

    let mut buf: Vec<u8> = Vec::new();
    (&mut handle)
        .take(max_size)
        .read_to_end(&mut buf)
        .map_err(|e| CliError::StdinReadError {
            detail: e.to_string(),
        })?;

    if buf.len() as u64 == max_size {
        let mut byte = [0u8; 1];
        let extra = handle
            .read(&mut byte)
            .map_err(|e| CliError::StdinReadError {
                detail: e.to_string(),
            })?;
        if extra > 0 {
            return Err(CliError::FileTooLarge {
                source: "-".to_owned(),
                limit: max_size,
                actual: None,
            });
        }
    }

    bytes_to_string(&buf, "-")
}

// ---------------------------------------------------------------------------
// UTF-8 conversion
// ---------------------------------------------------------------------------

fn bytes_to_string(bytes: &[u8], source_label: &str) -> Result<String, CliError> {
    match std::str::from_utf8(bytes) {
        Ok(s) => Ok(s.to_owned()),
        Err(e) => Err(CliError::InvalidUtf8 {
            source: source_label.to_owned(),
            byte_offset: e.valid_up_to(),
        }),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
