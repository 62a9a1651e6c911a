/// Output rendering: aligned text for humans, pretty JSON for machines.
///
/// Commands build their result value once and hand it to [`emit`], which
/// picks the representation from `--format`. Logs never go through here;
/// they are written to stderr by the tracing subscriber.
use std::io::Write as _;

use msalign_core::{
    Aggregation, DispatchOutcome, EvaluationReport, MergeTree, PlanStrategy, RunState,
    ScoreRecord,
};
use serde::Serialize;

use crate::OutputFormat;
use crate::error::CliError;

// ---------------------------------------------------------------------------
// Emission
// ---------------------------------------------------------------------------

/// Writes `value` to stdout as pretty JSON or as the text from `human`.
///
/// # Errors
///
/// Returns [`CliError::IoError`] when stdout cannot be written.
pub fn emit<T, F>(format: OutputFormat, value: &T, human: F) -> Result<(), CliError>
where
    T: Serialize + ?Sized,
    F: FnOnce(&T) -> String,
{
    let text = match format {
        OutputFormat::Json => {
            let mut json = serde_json::to_string_pretty(value).map_err(|e| CliError::IoError {
                source: "stdout".to_owned(),
                detail: e.to_string(),
            })?;
            json.push('\n');
            json
        }
        OutputFormat::Human => human(value),
    };
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    out.write_all(text.as_bytes())
        .and_then(|()| out.flush())
        .map_err(|e| CliError::IoError {
            source: "stdout".to_owned(),
            detail: e.to_string(),
        })
}

// ---------------------------------------------------------------------------
// Trees
// ---------------------------------------------------------------------------

/// Strategy header, summary line and the indented dendrogram.
pub fn render_tree(strategy: &PlanStrategy, tree: &MergeTree, labels: &[String]) -> String {
    let mut out = String::new();
    out.push_str(&format!("strategy:    {strategy}\n"));
    out.push_str(&format!(
        "sources:     {}  steps: {}  height: {}\n",
        tree.source_count(),
        tree.len(),
        tree.height()
    ));
    out.push_str(&format!("fingerprint: {}\n", short_fingerprint(tree)));
    out.push_str(&tree.render(labels));
    out
}

/// First 12 hex digits of the tree fingerprint.
pub fn short_fingerprint(tree: &MergeTree) -> String {
    tree.fingerprint().chars().take(12).collect()
}

// ---------------------------------------------------------------------------
// Dispatch outcomes
// ---------------------------------------------------------------------------

/// One line per step, then the final state.
pub fn render_outcome(outcome: &DispatchOutcome) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:>4}  {:>6}  {:>6}  {:>8}  {:>7}  {:>7}  {:>10}\n",
        "step", "source", "target", "input", "matched", "added", "elapsed"
    ));
    for step in &outcome.steps {
        out.push_str(&format!(
            "{:>4}  {:>6}  {:>6}  {:>8}  {:>7}  {:>7}  {:>8}ms{}\n",
            step.step,
            step.source,
            step.target,
            step.input_size,
            step.returned,
            step.added,
            step.elapsed.as_millis(),
            if step.succeeded { "" } else { "  FAILED" }
        ));
    }
    let state = match outcome.state {
        RunState::Ready => "ready",
        RunState::Running => "running",
        RunState::Done => "done",
        RunState::Failed => "failed",
    };
    out.push_str(&format!(
        "state: {state}  correspondences: {}",
        outcome.alignment.len()
    ));
    if let Some(failure) = &outcome.failure {
        out.push_str(&format!("  ({failure})"));
    }
    out.push('\n');
    out
}

// ---------------------------------------------------------------------------
// Score reports
// ---------------------------------------------------------------------------

/// Per-test-case table followed by micro and macro lines.
pub fn render_report(report: &EvaluationReport) -> String {
    let width = report
        .per_test_case
        .iter()
        .map(|r| r.test_case.len())
        .max()
        .unwrap_or(0)
        .max("test case".len());

    let mut out = String::new();
    out.push_str(&format!(
        "{:<width$}  {:>5}  {:>5}  {:>5}  {:>9}  {:>6}  {:>6}\n",
        "test case", "tp", "fp", "fn", "precision", "recall", "f1"
    ));
    for record in &report.per_test_case {
        out.push_str(&render_record(record, width));
    }
    for mode in Aggregation::ALL {
        let scores = report.aggregate(mode);
        out.push_str(&format!(
            "{:<width$}  {:>5}  {:>5}  {:>5}  {:>9.4}  {:>6.4}  {:>6.4}\n",
            mode.to_string(),
            scores.counts.true_positive,
            scores.counts.false_positive,
            scores.counts.false_negative,
            scores.precision,
            scores.recall,
            scores.f1
        ));
    }
    if !report.ambiguous.is_empty() {
        let names: Vec<String> = report
            .ambiguous
            .iter()
            .map(|(name, n)| format!("{name} ({n})"))
            .collect();
        out.push_str(&format!("one-sided: {}\n", names.join(", ")));
    }
    if report.unresolved_entities > 0 {
        out.push_str(&format!("unresolved entities: {}\n", report.unresolved_entities));
    }
    out
}

fn render_record(record: &ScoreRecord, width: usize) -> String {
    format!(
        "{:<width$}  {:>5}  {:>5}  {:>5}  {:>9.4}  {:>6.4}  {:>6.4}{}\n",
        record.test_case,
        record.true_positive,
        record.false_positive,
        record.false_negative,
        record.precision,
        record.recall,
        record.f1,
        if record.covered { "" } else { "  (not covered)" }
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
