/// CLI error types with associated exit codes.
///
/// [`CliError`] is the top-level error type for the `msalign` binary. Every
/// variant maps to a stable exit code (1 or 2) via [`CliError::exit_code`]:
///
/// - Exit code **2**, input failure: a file could not be read or parsed, a
///   track is malformed, or a flag value is unusable. Nothing was dispatched.
/// - Exit code **1**, logical failure: the run went ahead but ended in a
///   well-defined failure (a matcher step failed or the run was cancelled).
use std::fmt;
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// CliError
// ---------------------------------------------------------------------------

/// All error conditions that the `msalign` CLI can produce.
#[derive(Debug)]
pub enum CliError {
    // --- Exit code 2: input failures ---
    /// A file argument could not be found on the filesystem.
    FileNotFound {
        /// The path that was not found.
        path: PathBuf,
    },

    /// The process lacks permission to read a file.
    PermissionDenied {
        /// The path that could not be read.
        path: PathBuf,
    },

    /// The input exceeds the configured `--max-file-size` limit.
    FileTooLarge {
        /// `"-"` for stdin, otherwise the filesystem path.
        source: String,
        /// The configured size limit in bytes.
        limit: u64,
        /// The actual size in bytes; `None` for stdin.
        actual: Option<u64>,
    },

    /// The input bytes are not valid UTF-8.
    InvalidUtf8 {
        source: String,
        /// The byte offset of the first invalid byte sequence.
        byte_offset: usize,
    },

    /// An I/O error occurred while reading from stdin.
    StdinReadError { detail: String },

    /// A generic I/O error not covered by the more specific variants above.
    IoError { source: String, detail: String },

    /// The input is not the JSON document the command expects.
    ParseFailed {
        /// What was being parsed (`track`, `alignment`, `config`).
        what: &'static str,
        source: String,
        detail: String,
    },

    /// The input parsed but cannot be used: an invalid track, an unresolvable
    /// source, a bad dataset pattern or an unplannable strategy.
    InvalidInput { detail: String },

    // --- Exit code 1: logical failures ---
    /// The dispatch run ended in the failed state.
    ///
    /// The partial result has already been printed; this variant exists so
    /// `main` can exit with code 1 cleanly.
    RunFailed {
        /// Stable failure code, e.g. `matcher_invocation_failed`.
        code: &'static str,
        detail: String,
    },
}

impl CliError {
    /// Returns the process exit code for this error.
    ///
    /// - `2`: input failure (missing file, parse error, invalid track).
    /// - `1`: logical failure (a failed or cancelled run).
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::FileNotFound { .. }
            | Self::PermissionDenied { .. }
            | Self::FileTooLarge { .. }
            | Self::InvalidUtf8 { .. }
            | Self::StdinReadError { .. }
            | Self::IoError { .. }
            | Self::ParseFailed { .. }
            | Self::InvalidInput { .. } => 2,

            Self::RunFailed { .. } => 1,
        }
    }

    /// Returns a human-readable error message suitable for printing to stderr.
    pub fn message(&self) -> String {
        match self {
            Self::FileNotFound { path } => {
                format!("error: file not found: {}", path.display())
            }
            Self::PermissionDenied { path } => {
                format!("error: permission denied: {}", path.display())
            }
            Self::FileTooLarge {
                source,
                limit,
                actual: Some(actual),
            } => {
                format!("error: file too large: {source} is {actual} bytes, limit is {limit} bytes")
            }
            Self::FileTooLarge {
                source,
                limit,
                actual: None,
            } => {
                format!("error: file too large: {source} exceeded limit of {limit} bytes")
            }
            Self::InvalidUtf8 {
                source,
                byte_offset,
            } => {
                format!(
                    "error: invalid UTF-8 in {source}: first invalid byte at offset {byte_offset}"
                )
            }
            Self::StdinReadError { detail } => {
                format!("error: failed to read stdin: {detail}")
            }
            Self::IoError { source, detail } => {
                format!("error: I/O error on {source}: {detail}")
            }
            Self::ParseFailed {
                what,
                source,
                detail,
            } => {
                format!("error: {source} is not a valid {what}: {detail}")
            }
            Self::InvalidInput { detail } => format!("error: {detail}"),
            Self::RunFailed { code, detail } => {
                format!("error: run failed ({code}): {detail}")
            }
        }
    }

    /// Wraps any displayable core error as [`CliError::InvalidInput`].
    pub fn invalid(err: impl fmt::Display) -> Self {
        Self::InvalidInput {
            detail: err.to_string(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

impl std::error::Error for CliError {}

impl From<msalign_core::PipelineError> for CliError {
    fn from(err: msalign_core::PipelineError) -> Self {
        Self::invalid(err)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use std::path::PathBuf;

    use super::*;

    // ── exit_code ────────────────────────────────────────────────────────────

    #[test]
    fn file_not_found_is_exit_2() {
        let e = CliError::FileNotFound {
            path: PathBuf::from("track.json"),
        };
        assert_eq!(e.exit_code(), 2);
    }

    #[test]
    fn parse_failed_is_exit_2() {
        let e = CliError::ParseFailed {
            what: "track",
            source: "track.json".to_owned(),
            detail: "line 1, column 1: expected value".to_owned(),
        };
        assert_eq!(e.exit_code(), 2);
    }

    #[test]
    fn invalid_input_is_exit_2() {
        let e = CliError::invalid("track 'x' has no sources");
        assert_eq!(e.exit_code(), 2);
    }

    #[test]
    fn stdin_read_error_is_exit_2() {
        let e = CliError::StdinReadError {
            detail: "broken pipe".to_owned(),
        };
        assert_eq!(e.exit_code(), 2);
    }

    #[test]
    fn run_failed_is_exit_1() {
        let e = CliError::RunFailed {
            code: "cancelled",
            detail: "cancelled before step 0".to_owned(),
        };
        assert_eq!(e.exit_code(), 1);
    }

    // ── message content ──────────────────────────────────────────────────────

    #[test]
    fn file_too_large_with_actual_mentions_sizes() {
        let e = CliError::FileTooLarge {
            source: "big.json".to_owned(),
            limit: 1024,
            actual: Some(2048),
        };
        let msg = e.message();
        assert!(msg.contains("1024"), "message: {msg}");
        assert!(msg.contains("2048"), "message: {msg}");
    }

    #[test]
    fn file_too_large_stdin_has_no_actual() {
        let e = CliError::FileTooLarge {
            source: "-".to_owned(),
            limit: 10,
            actual: None,
        };
        assert!(e.message().contains("exceeded limit of 10"));
    }

    #[test]
    fn parse_failed_names_the_document_kind() {
        let e = CliError::ParseFailed {
            what: "alignment",
            source: "out.json".to_owned(),
            detail: "trailing comma".to_owned(),
        };
        let msg = e.message();
        assert!(msg.contains("out.json"), "message: {msg}");
        assert!(msg.contains("alignment"), "message: {msg}");
    }

    #[test]
    fn run_failed_carries_the_code() {
        let e = CliError::RunFailed {
            code: "matcher_invocation_failed",
            detail: "matcher failed at step 1: boom".to_owned(),
        };
        assert!(e.message().contains("matcher_invocation_failed"));
    }

    #[test]
    fn every_message_starts_with_error_prefix() {
        let errors = [
            CliError::FileNotFound {
                path: PathBuf::from("a"),
            },
            CliError::PermissionDenied {
                path: PathBuf::from("b"),
            },
            CliError::InvalidUtf8 {
                source: "c".to_owned(),
                byte_offset: 3,
            },
            CliError::IoError {
                source: "d".to_owned(),
                detail: "disk".to_owned(),
            },
            CliError::invalid("bad"),
        ];
        for e in &errors {
            assert!(e.message().starts_with("error: "), "{e}");
            assert_eq!(e.to_string(), e.message());
        }
    }
}
