//! Confusion-matrix evaluation of system alignments against references.
//!
//! Membership is decided on correspondence identity `(entity_one,
//! entity_two, relation)`; confidence is ignored. Per-test-case matrices are
//! aggregated either by summing counts first (micro) or by averaging
//! per-test-case scores (macro). The two are reported side by side and never
//! derived from one another.
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::iter::Sum;
use std::ops::Add;
use std::str::FromStr;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::alignment::{Alignment, CorrespondenceKey, Relation};
use crate::partition::{PartitionMode, PartitionedAlignment, Partitioner};
use crate::source::Track;

// ---------------------------------------------------------------------------
// Gold standard completeness
// ---------------------------------------------------------------------------

/// How much of the true alignment a reference covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoldStandardCompleteness {
    /// Everything not in the reference is wrong.
    #[default]
    Complete,
    /// Only explicit conflicts with the reference count as wrong.
    Partial,
    /// Partial, but complete for every source entity it mentions.
    PartialSourceComplete,
    /// Partial, but complete for every target entity it mentions.
    PartialTargetComplete,
    /// Partial, but complete for every entity it mentions on either side.
    PartialSourceAndTargetComplete,
}

impl GoldStandardCompleteness {
    pub fn is_complete(self) -> bool {
        self == GoldStandardCompleteness::Complete
    }

    pub fn is_source_complete(self) -> bool {
        matches!(
            self,
            GoldStandardCompleteness::PartialSourceComplete
                | GoldStandardCompleteness::PartialSourceAndTargetComplete
        )
    }

    pub fn is_target_complete(self) -> bool {
        matches!(
            self,
            GoldStandardCompleteness::PartialTargetComplete
                | GoldStandardCompleteness::PartialSourceAndTargetComplete
        )
    }
}

// ---------------------------------------------------------------------------
// Confusion matrix
// ---------------------------------------------------------------------------

/// `a / b`, or `0` when `b` is zero.
fn ratio(a: f64, b: f64) -> f64 {
    if b == 0.0 { 0.0 } else { a / b }
}

/// Placeholder entity of a reference entry stating "no match".
fn is_null_entity(entity: &str) -> bool {
    let trimmed = entity.trim();
    trimmed.is_empty() || trimmed == "null"
}

/// True/false positive and false negative counts for one comparison.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub true_positive: usize,
    pub false_positive: usize,
    pub false_negative: usize,
    /// Correspondences in the system alignment.
    pub system_size: usize,
    /// Correspondences in the reference alignment.
    pub reference_size: usize,
}

impl ConfusionMatrix {
    /// Compares `system` against `reference`.
    ///
    /// Reference entries with relation `?` never produce a false negative.
    /// Against a complete reference they also suppress false positives on
    /// the same entity pair. Against a partial reference, `%` entries mark
    /// forbidden equivalences (a `null` side forbids every equivalence of the
    /// other entity), and a complete side turns every other system
    /// correspondence of a referenced entity into a false positive.
    pub fn compute(
        reference: &Alignment,
        system: &Alignment,
        completeness: GoldStandardCompleteness,
    ) -> Self {
        let (true_positive, false_positive, false_negative) = if completeness.is_complete() {
            Self::against_complete(reference, system)
        } else {
            Self::against_partial(reference, system, completeness)
        };
        Self {
            true_positive,
            false_positive,
            false_negative,
            system_size: system.len(),
            reference_size: reference.len(),
        }
    }

    fn against_complete(reference: &Alignment, system: &Alignment) -> (usize, usize, usize) {
        let mut false_positives: BTreeSet<&CorrespondenceKey> = system.keys().collect();
        let mut tp = 0;
        let mut fn_ = 0;
        for cell in reference.keys() {
            if cell.relation == Relation::Unknown {
                false_positives
                    .retain(|k| k.entity_one != cell.entity_one || k.entity_two != cell.entity_two);
            } else if system.contains(cell) {
                tp += 1;
                false_positives.remove(cell);
            } else {
                fn_ += 1;
            }
        }
        (tp, false_positives.len(), fn_)
    }

    fn against_partial(
        reference: &Alignment,
        system: &Alignment,
        completeness: GoldStandardCompleteness,
    ) -> (usize, usize, usize) {
        let mut true_positives: BTreeSet<&CorrespondenceKey> = BTreeSet::new();
        let mut false_positives: BTreeSet<&CorrespondenceKey> = BTreeSet::new();
        let mut fn_ = 0;

        for cell in reference.keys() {
            if cell.relation == Relation::Unknown {
                continue;
            }
            if cell.relation == Relation::Incompat {
                let forbidden = system.keys().filter(|k| {
                    k.relation == Relation::Equivalence
                        && if is_null_entity(&cell.entity_two) {
                            k.entity_one == cell.entity_one
                        } else if is_null_entity(&cell.entity_one) {
                            k.entity_two == cell.entity_two
                        } else {
                            k.entity_one == cell.entity_one && k.entity_two == cell.entity_two
                        }
                });
                false_positives.extend(forbidden);
                continue;
            }

            if system.contains(cell) {
                true_positives.insert(cell);
            } else {
                fn_ += 1;
            }
            let conflicts = system.keys().filter(|k| {
                k.relation == cell.relation
                    && *k != cell
                    && ((completeness.is_target_complete() && k.entity_two == cell.entity_two)
                        || (completeness.is_source_complete() && k.entity_one == cell.entity_one))
            });
            false_positives.extend(conflicts);
        }

        // A system correspondence can be confirmed by one reference entry and
        // contradicted by another; confirmation wins.
        let fp = false_positives.difference(&true_positives).count();
        (true_positives.len(), fp, fn_)
    }

    pub fn precision(&self) -> f64 {
        ratio(
            self.true_positive as f64,
            (self.true_positive + self.false_positive) as f64,
        )
    }

    pub fn recall(&self) -> f64 {
        ratio(
            self.true_positive as f64,
            (self.true_positive + self.false_negative) as f64,
        )
    }

    pub fn f1(&self) -> f64 {
        self.f_beta(1.0)
    }

    /// Weighted harmonic mean of precision and recall; recall counts `beta`
    /// times as much as precision.
    pub fn f_beta(&self, beta: f64) -> f64 {
        let p = self.precision();
        let r = self.recall();
        let b2 = beta * beta;
        ratio((1.0 + b2) * p * r, b2 * p + r)
    }

    /// `true` when neither side holds a correspondence.
    pub fn is_empty(&self) -> bool {
        self.system_size == 0 && self.reference_size == 0
    }
}

impl Add for ConfusionMatrix {
    type Output = ConfusionMatrix;

    fn add(self, rhs: ConfusionMatrix) -> ConfusionMatrix {
        ConfusionMatrix {
            true_positive: self.true_positive + rhs.true_positive,
            false_positive: self.false_positive + rhs.false_positive,
            false_negative: self.false_negative + rhs.false_negative,
            system_size: self.system_size + rhs.system_size,
            reference_size: self.reference_size + rhs.reference_size,
        }
    }
}

impl Sum for ConfusionMatrix {
    fn sum<I: Iterator<Item = ConfusionMatrix>>(iter: I) -> Self {
        iter.fold(ConfusionMatrix::default(), Add::add)
    }
}

impl<'a> Sum<&'a ConfusionMatrix> for ConfusionMatrix {
    fn sum<I: Iterator<Item = &'a ConfusionMatrix>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Aggregation mode over several test cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    Micro,
    Macro,
}

impl Aggregation {
    /// Both modes, in report order.
    pub const ALL: [Aggregation; 2] = [Aggregation::Micro, Aggregation::Macro];
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Aggregation::Micro => f.write_str("micro"),
            Aggregation::Macro => f.write_str("macro"),
        }
    }
}

/// Number of test cases that macro averages divide by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MacroDivisor {
    /// Test cases with a non-empty system or reference alignment.
    #[default]
    NonEmpty,
    /// Every test case, empty ones counting as zero.
    AllTestCases,
    /// An externally supplied count.
    Fixed(usize),
}

impl fmt::Display for MacroDivisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MacroDivisor::NonEmpty => f.write_str("non-empty"),
            MacroDivisor::AllTestCases => f.write_str("all"),
            MacroDivisor::Fixed(n) => write!(f, "{n}"),
        }
    }
}

/// Error returned for an unparseable [`MacroDivisor`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown macro divisor '{0}' (expected 'non-empty', 'all', or a count)")]
pub struct UnknownDivisor(pub String);

impl FromStr for MacroDivisor {
    type Err = UnknownDivisor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "non-empty" => Ok(MacroDivisor::NonEmpty),
            "all" | "all-test-cases" => Ok(MacroDivisor::AllTestCases),
            other => other
                .parse::<usize>()
                .map(MacroDivisor::Fixed)
                .map_err(|_| UnknownDivisor(s.to_owned())),
        }
    }
}

/// Scores aggregated over several test cases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AggregateScores {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Summed counts over all aggregated test cases.
    pub counts: ConfusionMatrix,
    /// Number of test cases the scores were derived from or divided by.
    pub test_cases: usize,
}

/// Sums the counts first, then derives scores once.
pub fn micro_average(matrices: &[ConfusionMatrix]) -> AggregateScores {
    let counts: ConfusionMatrix = matrices.iter().sum();
    AggregateScores {
        precision: counts.precision(),
        recall: counts.recall(),
        f1: counts.f1(),
        counts,
        test_cases: matrices.len(),
    }
}

/// Averages per-test-case scores over the count chosen by `divisor`.
///
/// A divisor of zero yields all-zero scores. A fixed count below the number
/// of non-empty test cases is raised to that number, keeping scores in
/// `[0, 1]`.
pub fn macro_average(matrices: &[ConfusionMatrix], divisor: MacroDivisor) -> AggregateScores {
    let non_empty = matrices.iter().filter(|m| !m.is_empty()).count();
    let n = match divisor {
        MacroDivisor::NonEmpty => non_empty,
        MacroDivisor::AllTestCases => matrices.len(),
        MacroDivisor::Fixed(n) if n < non_empty => {
            tracing::warn!(
                fixed = n,
                non_empty,
                "fixed macro divisor below non-empty test cases; raised"
            );
            non_empty
        }
        MacroDivisor::Fixed(n) => n,
    };
    let counts: ConfusionMatrix = matrices.iter().sum();
    if n == 0 {
        return AggregateScores {
            counts,
            ..AggregateScores::default()
        };
    }
    let denom = n as f64;
    AggregateScores {
        precision: matrices.iter().map(ConfusionMatrix::precision).sum::<f64>() / denom,
        recall: matrices.iter().map(ConfusionMatrix::recall).sum::<f64>() / denom,
        f1: matrices.iter().map(ConfusionMatrix::f1).sum::<f64>() / denom,
        counts,
        test_cases: n,
    }
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Evaluation settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    pub partition_mode: PartitionMode,
    pub macro_divisor: MacroDivisor,
}

/// Scores of one test case.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreRecord {
    pub test_case: String,
    pub true_positive: usize,
    pub false_positive: usize,
    pub false_negative: usize,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// The global alignment reached both sides of this test case.
    pub covered: bool,
}

impl ScoreRecord {
    fn new(test_case: &str, matrix: &ConfusionMatrix, covered: bool) -> Self {
        Self {
            test_case: test_case.to_owned(),
            true_positive: matrix.true_positive,
            false_positive: matrix.false_positive,
            false_negative: matrix.false_negative,
            precision: matrix.precision(),
            recall: matrix.recall(),
            f1: matrix.f1(),
            covered,
        }
    }
}

/// Per-test-case and aggregate scores of one system alignment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub per_test_case: Vec<ScoreRecord>,
    pub micro: AggregateScores,
    #[serde(rename = "macro")]
    pub macro_: AggregateScores,
    /// One-sided partition buckets, by test case.
    pub ambiguous: BTreeMap<String, usize>,
    pub unresolved_entities: usize,
}

impl EvaluationReport {
    /// The aggregate scores for `mode`.
    pub fn aggregate(&self, mode: Aggregation) -> &AggregateScores {
        match mode {
            Aggregation::Micro => &self.micro,
            Aggregation::Macro => &self.macro_,
        }
    }
}

/// Scores every test case of `track` against its partitioned candidate.
///
/// Test cases are evaluated in parallel; the report keeps track order.
pub fn evaluate(
    track: &Track,
    parts: &PartitionedAlignment,
    config: &EvaluationConfig,
) -> EvaluationReport {
    let scored: Vec<(ScoreRecord, ConfusionMatrix)> = track
        .test_cases
        .par_iter()
        .map(|tc| {
            let system = parts.alignment_for(&tc.name);
            let matrix = ConfusionMatrix::compute(&tc.reference, &system, tc.completeness);
            (
                ScoreRecord::new(&tc.name, &matrix, parts.is_covered(&tc.name)),
                matrix,
            )
        })
        .collect();
    let (per_test_case, matrices): (Vec<ScoreRecord>, Vec<ConfusionMatrix>) =
        scored.into_iter().unzip();

    let micro = micro_average(&matrices);
    let macro_ = macro_average(&matrices, config.macro_divisor);
    tracing::info!(
        test_cases = matrices.len(),
        micro_f1 = micro.f1,
        macro_f1 = macro_.f1,
        "evaluation finished"
    );

    EvaluationReport {
        per_test_case,
        micro,
        macro_,
        ambiguous: parts.ambiguous.clone(),
        unresolved_entities: parts.unresolved.len(),
    }
}

/// Partitions a global alignment with `partitioner`, then evaluates it.
pub fn evaluate_alignment(
    track: &Track,
    partitioner: &Partitioner,
    alignment: &Alignment,
    config: &EvaluationConfig,
) -> EvaluationReport {
    let parts = partitioner.partition_alignment(alignment, config.partition_mode);
    evaluate(track, &parts, config)
}
