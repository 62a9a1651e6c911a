//! Linkage engine: distances between sources and between clusters of sources.
//!
//! The base distance between two sources is `1 - similarity` of their token
//! multisets under a [`TokenSimilarity`]. Cluster distances follow a
//! [`Linkage`] rule, either computed directly over members
//! ([`Linkage::cluster_distance`]) or updated online after a merge with the
//! Lance–Williams recurrence ([`Linkage::combine`]).
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::features::{FeatureSummary, document_frequencies};
use crate::planner::PlanError;
use crate::source::SourceId;

// ---------------------------------------------------------------------------
// Linkage
// ---------------------------------------------------------------------------

/// Rule deriving inter-cluster distance from inter-source distances.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Linkage {
    /// Minimum pairwise distance.
    #[default]
    Single,
    /// Maximum pairwise distance.
    Complete,
    /// Mean pairwise distance.
    Average,
}

impl Linkage {
    /// Every linkage, in declaration order.
    pub const ALL: [Linkage; 3] = [Linkage::Single, Linkage::Complete, Linkage::Average];

    /// Distance from the union of clusters `i` and `j` (sizes `n_i`, `n_j`) to
    /// a third cluster `k`, given `d(i, k)` and `d(j, k)`.
    pub fn combine(self, d_ik: f64, d_jk: f64, n_i: usize, n_j: usize) -> f64 {
        match self {
            Linkage::Single => d_ik.min(d_jk),
            Linkage::Complete => d_ik.max(d_jk),
            Linkage::Average => {
                let (n_i, n_j) = (n_i as f64, n_j as f64);
                (n_i * d_ik + n_j * d_jk) / (n_i + n_j)
            }
        }
    }

    /// Distance between two clusters given by their member sources.
    ///
    /// Empty clusters are at distance `1.0` from everything.
    pub fn cluster_distance(self, a: &[SourceId], b: &[SourceId], matrix: &DistanceMatrix) -> f64 {
        if a.is_empty() || b.is_empty() {
            return 1.0;
        }
        let pairwise = a
            .iter()
            .flat_map(|&i| b.iter().map(move |&j| matrix.get(i, j)));
        match self {
            Linkage::Single => pairwise.fold(f64::INFINITY, f64::min),
            Linkage::Complete => pairwise.fold(f64::NEG_INFINITY, f64::max),
            Linkage::Average => pairwise.sum::<f64>() / (a.len() * b.len()) as f64,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Linkage::Single => "single",
            Linkage::Complete => "complete",
            Linkage::Average => "average",
        }
    }
}

impl fmt::Display for Linkage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Linkage {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Linkage::ALL
            .into_iter()
            .find(|l| l.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| PlanError::UnknownLinkage(s.to_owned()))
    }
}

// ---------------------------------------------------------------------------
// TokenSimilarity
// ---------------------------------------------------------------------------

/// Similarity between two token multisets, in `[0, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenSimilarity {
    /// Weighted Jaccard: sum of minima over sum of maxima.
    Jaccard,
    /// Cosine over raw counts.
    Cosine,
    /// Cosine over TF-IDF weights, with document frequencies taken from the
    /// full set of summaries.
    #[default]
    TfIdfCosine,
}

impl TokenSimilarity {
    /// Every similarity, in declaration order.
    pub const ALL: [TokenSimilarity; 3] = [
        TokenSimilarity::Jaccard,
        TokenSimilarity::Cosine,
        TokenSimilarity::TfIdfCosine,
    ];

    fn name(self) -> &'static str {
        match self {
            TokenSimilarity::Jaccard => "jaccard",
            TokenSimilarity::Cosine => "cosine",
            TokenSimilarity::TfIdfCosine => "tfidf",
        }
    }
}

impl fmt::Display for TokenSimilarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TokenSimilarity {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TokenSimilarity::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| PlanError::UnknownSimilarity(s.to_owned()))
    }
}

type Weights = BTreeMap<String, f64>;

fn raw_weights(summary: &FeatureSummary) -> Weights {
    summary
        .tokens
        .iter()
        .map(|(t, c)| (t.clone(), *c as f64))
        .collect()
}

/// `(tf / max_tf) * ln((1 + n) / (1 + df))` per token.
fn tfidf_weights(summary: &FeatureSummary, df: &HashMap<&str, usize>, n: usize) -> Weights {
    let max_tf = summary.tokens.values().copied().max().unwrap_or(0);
    if max_tf == 0 {
        return Weights::new();
    }
    summary
        .tokens
        .iter()
        .map(|(t, c)| {
            let df_t = df.get(t.as_str()).copied().unwrap_or(0);
            let idf = ((1 + n) as f64 / (1 + df_t) as f64).ln();
            (t.clone(), (*c as f64 / max_tf as f64) * idf)
        })
        .collect()
}

fn cosine(a: &Weights, b: &Weights) -> f64 {
    let norm = |w: &Weights| w.values().map(|v| v * v).sum::<f64>().sqrt();
    let (na, nb) = (norm(a), norm(b));
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    let dot: f64 = a
        .iter()
        .filter_map(|(t, va)| b.get(t).map(|vb| va * vb))
        .sum();
    (dot / (na * nb)).clamp(0.0, 1.0)
}

fn weighted_jaccard(a: &Weights, b: &Weights) -> f64 {
    let mut min_sum = 0.0;
    let mut max_sum = 0.0;
    for (t, va) in a {
        let vb = b.get(t).copied().unwrap_or(0.0);
        min_sum += va.min(vb);
        max_sum += va.max(vb);
    }
    for (t, vb) in b {
        if !a.contains_key(t) {
            max_sum += vb;
        }
    }
    if max_sum == 0.0 { 0.0 } else { min_sum / max_sum }
}

// ---------------------------------------------------------------------------
// DistanceMatrix
// ---------------------------------------------------------------------------

/// Symmetric source-by-source distance matrix with a zero diagonal, stored in
/// condensed (strict upper triangle) form.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix {
    n: usize,
    values: Vec<f64>,
}

impl DistanceMatrix {
    /// Builds a matrix by evaluating `distance(i, j)` for every `i < j`.
    pub fn from_fn(n: usize, mut distance: impl FnMut(usize, usize) -> f64) -> Self {
        let mut values = Vec::with_capacity(n * n.saturating_sub(1) / 2);
        for i in 0..n {
            for j in i + 1..n {
                values.push(distance(i, j));
            }
        }
        Self { n, values }
    }

    /// Builds the `1 - similarity` matrix over per-source summaries.
    pub fn from_summaries(summaries: &[FeatureSummary], similarity: TokenSimilarity) -> Self {
        let weights: Vec<Weights> = match similarity {
            TokenSimilarity::Jaccard | TokenSimilarity::Cosine => {
                summaries.iter().map(raw_weights).collect()
            }
            TokenSimilarity::TfIdfCosine => {
                let df = document_frequencies(summaries);
                summaries
                    .iter()
                    .map(|s| tfidf_weights(s, &df, summaries.len()))
                    .collect()
            }
        };
        Self::from_fn(summaries.len(), |i, j| {
            let sim = match similarity {
                TokenSimilarity::Jaccard => weighted_jaccard(&weights[i], &weights[j]),
                TokenSimilarity::Cosine | TokenSimilarity::TfIdfCosine => {
                    cosine(&weights[i], &weights[j])
                }
            };
            1.0 - sim
        })
    }

    /// Builds a matrix from full rows, checking shape and content.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::InvalidDistanceMatrix`] when the rows are not
    /// square, not symmetric, have a non-zero diagonal, or contain negative
    /// or non-finite values.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, PlanError> {
        let n = rows.len();
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != n) {
            return Err(PlanError::InvalidDistanceMatrix(format!(
                "row {i} has {} entries, expected {n}",
                row.len()
            )));
        }
        for (i, row) in rows.iter().enumerate() {
            if row[i] != 0.0 {
                return Err(PlanError::InvalidDistanceMatrix(format!(
                    "diagonal entry {i} is {}",
                    row[i]
                )));
            }
            for (j, &d) in row.iter().enumerate() {
                if !d.is_finite() || d < 0.0 {
                    return Err(PlanError::InvalidDistanceMatrix(format!(
                        "entry ({i}, {j}) is {d}"
                    )));
                }
                if d != rows[j][i] {
                    return Err(PlanError::InvalidDistanceMatrix(format!(
                        "entry ({i}, {j}) is not symmetric"
                    )));
                }
            }
        }
        Ok(Self::from_fn(n, |i, j| rows[i][j]))
    }

    /// Number of sources.
    pub fn len(&self) -> usize {
        self.n
    }

    /// `true` for a matrix over zero sources.
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    fn index(&self, i: usize, j: usize) -> usize {
        let (i, j) = if i < j { (i, j) } else { (j, i) };
        i * self.n - i * (i + 1) / 2 + (j - i - 1)
    }

    /// Distance between sources `i` and `j`; zero on the diagonal.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        if i == j {
            0.0
        } else {
            self.values[self.index(i, j)]
        }
    }
}

/// Distance between two clusters of sources under `linkage`.
pub fn distance(a: &[SourceId], b: &[SourceId], linkage: Linkage, matrix: &DistanceMatrix) -> f64 {
    linkage.cluster_distance(a, b, matrix)
}
