//! Two-way matcher backed by an external process.
//!
//! Each call writes the two operands, the input alignment and the matcher
//! parameters as JSON files into a fresh scratch directory and runs
//!
//! ```text
//! <program> [args..] left.json right.json input.json params.json
//! ```
//!
//! The process must exit with status 0 and print an alignment (a JSON list
//! of correspondences) to stdout. Anything else is reported as a
//! [`MatcherError`], which fails the step.
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

use msalign_core::{
    Alignment, ClusterGraph, Matcher, MatcherError, MatcherParams, SourceGraph, SourceId,
};
use serde::Serialize;

/// JSON shape of one operand handed to the matcher process.
#[derive(Serialize)]
struct ClusterDocument<'a> {
    cluster: usize,
    label: String,
    members: &'a [SourceId],
    sources: Vec<&'a SourceGraph>,
}

impl<'a> ClusterDocument<'a> {
    fn new(cluster: &'a ClusterGraph) -> Self {
        Self {
            cluster: cluster.id(),
            label: cluster.label(),
            members: cluster.members(),
            sources: cluster.sources().iter().map(AsRef::as_ref).collect(),
        }
    }
}

/// Runs `program` once per merge step.
#[derive(Debug, Clone)]
pub struct ExternalCommandMatcher {
    program: PathBuf,
    args: Vec<String>,
}

impl ExternalCommandMatcher {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    fn describe(&self) -> String {
        self.program.display().to_string()
    }
}

fn write_document<T: Serialize + ?Sized>(
    dir: &Path,
    name: &str,
    value: &T,
) -> Result<PathBuf, MatcherError> {
    let path = dir.join(name);
    let file = std::fs::File::create(&path)
        .map_err(|e| MatcherError::new(format!("cannot create {}: {e}", path.display())))?;
    let mut writer = std::io::BufWriter::new(file);
    serde_json::to_writer(&mut writer, value)
        .map_err(|e| MatcherError::new(format!("cannot write {}: {e}", path.display())))?;
    writer
        .flush()
        .map_err(|e| MatcherError::new(format!("cannot write {}: {e}", path.display())))?;
    Ok(path)
}

impl Matcher for ExternalCommandMatcher {
    fn match_graphs(
        &self,
        left: &ClusterGraph,
        right: &ClusterGraph,
        input: &Alignment,
        params: &MatcherParams,
    ) -> Result<Alignment, MatcherError> {
        let scratch = tempfile::Builder::new()
            .prefix("msalign-step-")
            .tempdir()
            .map_err(|e| MatcherError::new(format!("cannot create scratch directory: {e}")))?;
        let dir = scratch.path();
        let paths = [
            write_document(dir, "left.json", &ClusterDocument::new(left))?,
            write_document(dir, "right.json", &ClusterDocument::new(right))?,
            write_document(dir, "input.json", input)?,
            write_document(dir, "params.json", params)?,
        ];

        tracing::debug!(
            program = %self.describe(),
            left = %left.label(),
            right = %right.label(),
            input = input.len(),
            "invoking matcher"
        );
        let started = Instant::now();
        let output = Command::new(&self.program)
            .args(&self.args)
            .args(&paths)
            .output()
            .map_err(|e| MatcherError::new(format!("cannot start {}: {e}", self.describe())))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = stderr.trim();
            return Err(MatcherError::new(if detail.is_empty() {
                format!("{} exited with {}", self.describe(), output.status)
            } else {
                format!("{} exited with {}: {detail}", self.describe(), output.status)
            }));
        }

        let alignment: Alignment = serde_json::from_slice(&output.stdout).map_err(|e| {
            MatcherError::new(format!(
                "{} printed an invalid alignment: {e}",
                self.describe()
            ))
        })?;
        tracing::debug!(
            program = %self.describe(),
            correspondences = alignment.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "matcher returned"
        );
        Ok(alignment)
    }
}
