//! Per-source feature summaries used to order and cluster sources.
//!
//! A [`FeatureSummary`] pairs a bag of words (tokens from string literals and
//! IRI fragments) with scalar statistics. Summaries of merged clusters are
//! built with [`FeatureSummary::merge`]: token counts and additive statistics
//! sum, while distinct subjects are kept as a set so the union is recomputed
//! instead of double counted.
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::source::{SourceGraph, Track};
use crate::vocab;

// ---------------------------------------------------------------------------
// Tokenization
// ---------------------------------------------------------------------------

// The patterns below are literals known to compile; the fallbacks exist only
// because the workspace bans `expect()`.
static SEPARATOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[-_~|]+").unwrap_or_else(|_| {
        Regex::new("a^").unwrap_or_else(|_| unreachable!("regex engine broken"))
    })
});

static NON_WORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^\p{L}\p{N}]+").unwrap_or_else(|_| {
        Regex::new("a^").unwrap_or_else(|_| unreachable!("regex engine broken"))
    })
});

/// English function words dropped from every bag of words.
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "have", "in", "is",
    "it", "its", "of", "on", "or", "that", "the", "this", "to", "was", "were", "which", "with",
];

/// Inserts a space before every upper-case letter that starts a new
/// camel-case word (`partOf` -> `part Of`, `HTMLParser` -> `HTML Parser`).
fn split_camel_case(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 8);
    for (i, &c) in chars.iter().enumerate() {
        if i > 0 && c.is_uppercase() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            let boundary = prev.is_lowercase() || (prev.is_uppercase() && next_is_lower);
            if boundary && !prev.is_whitespace() {
                out.push(' ');
            }
        }
        out.push(c);
    }
    out
}

/// Splits `text` into normalized tokens.
///
/// Camel case and `-_~|` separate words, any other non-alphanumeric run is a
/// separator too, tokens are lower-cased, and stopwords and single-character
/// tokens are removed.
pub fn tokenize(text: &str) -> Vec<String> {
    let spaced = split_camel_case(text);
    let spaced = SEPARATOR_RE.replace_all(&spaced, " ");
    NON_WORD_RE
        .split(&spaced)
        .filter(|t| t.chars().count() > 1)
        .map(str::to_lowercase)
        .filter(|t| !STOPWORDS.contains(&t.as_str()))
        .collect()
}

/// The local name of an IRI: the text after its last `#` or `/`.
pub fn iri_fragment(iri: &str) -> Option<&str> {
    let cut = iri.rfind(['#', '/'])?;
    let fragment = &iri[cut + 1..];
    (!fragment.is_empty()).then_some(fragment)
}

// ---------------------------------------------------------------------------
// FeatureConfig
// ---------------------------------------------------------------------------

/// Controls which tokens end up in a summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Drop tokens present in fewer than this fraction of sources.
    pub min_document_frequency: f64,
    /// Drop tokens present in more than this fraction of sources.
    pub max_document_frequency: f64,
    /// Tokenize string literals.
    pub include_literals: bool,
    /// Tokenize the local names of subject IRIs.
    pub include_fragments: bool,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            min_document_frequency: 0.0,
            max_document_frequency: 1.0,
            include_literals: true,
            include_fragments: true,
        }
    }
}

// ---------------------------------------------------------------------------
// FeatureSummary
// ---------------------------------------------------------------------------

/// Characterization of one source or of a merged cluster of sources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSummary {
    /// Token multiset.
    pub tokens: BTreeMap<String, u64>,
    /// Subjects typed `owl:Class` or `rdfs:Class`.
    pub class_count: u64,
    /// Subjects typed with a non-schema class.
    pub instance_count: u64,
    /// Number of triples.
    pub triple_count: u64,
    /// Distinct subjects.
    pub subjects: BTreeSet<String>,
}

impl FeatureSummary {
    /// Extracts the summary of a single graph.
    pub fn from_graph(graph: &SourceGraph, config: &FeatureConfig) -> Self {
        let mut tokens: BTreeMap<String, u64> = BTreeMap::new();
        let mut classes = BTreeSet::new();
        let mut instances = BTreeSet::new();
        let mut subjects = BTreeSet::new();

        for triple in &graph.triples {
            if subjects.insert(triple.subject.clone()) && config.include_fragments {
                if let Some(fragment) = iri_fragment(&triple.subject) {
                    for token in tokenize(fragment) {
                        *tokens.entry(token).or_insert(0) += 1;
                    }
                }
            }
            if triple.predicate == vocab::RDF_TYPE {
                if let Some(class) = triple.object.as_iri() {
                    if vocab::is_class_type(class) {
                        classes.insert(triple.subject.as_str());
                    } else if !vocab::is_schema_type(class) {
                        instances.insert(triple.subject.as_str());
                    }
                }
            }
            if config.include_literals {
                if let Some(text) = triple.object.as_text() {
                    for token in tokenize(text) {
                        *tokens.entry(token).or_insert(0) += 1;
                    }
                }
            }
        }

        Self {
            tokens,
            class_count: classes.len() as u64,
            instance_count: instances.len() as u64,
            triple_count: graph.triples.len() as u64,
            subjects,
        }
    }

    /// Folds `other` into `self` following the cluster union rules.
    pub fn merge(&mut self, other: &FeatureSummary) {
        for (token, count) in &other.tokens {
            *self.tokens.entry(token.clone()).or_insert(0) += count;
        }
        self.class_count += other.class_count;
        self.instance_count += other.instance_count;
        self.triple_count += other.triple_count;
        self.subjects.extend(other.subjects.iter().cloned());
    }

    /// Returns the merge of `self` and `other` without mutating either.
    #[must_use]
    pub fn merged(&self, other: &FeatureSummary) -> FeatureSummary {
        let mut out = self.clone();
        out.merge(other);
        out
    }

    /// Number of distinct subjects.
    pub fn distinct_subject_count(&self) -> u64 {
        self.subjects.len() as u64
    }

    /// Sum of all token counts.
    pub fn token_total(&self) -> u64 {
        self.tokens.values().sum()
    }
}

// ---------------------------------------------------------------------------
// Vocabulary selection
// ---------------------------------------------------------------------------

/// Number of summaries each token occurs in.
pub fn document_frequencies(summaries: &[FeatureSummary]) -> HashMap<&str, usize> {
    let mut df: HashMap<&str, usize> = HashMap::new();
    for summary in summaries {
        for token in summary.tokens.keys() {
            *df.entry(token.as_str()).or_insert(0) += 1;
        }
    }
    df
}

/// Tokens whose document frequency lies within `[min_df, max_df]` (as
/// fractions of `summaries.len()`). An empty selection falls back to every
/// token so that clustering never runs on empty vectors.
pub fn select_vocabulary(summaries: &[FeatureSummary], config: &FeatureConfig) -> BTreeSet<String> {
    let n = summaries.len().max(1) as f64;
    let df = document_frequencies(summaries);
    let selected: BTreeSet<String> = df
        .iter()
        .filter(|(_, count)| {
            let fraction = **count as f64 / n;
            fraction >= config.min_document_frequency && fraction <= config.max_document_frequency
        })
        .map(|(token, _)| (*token).to_owned())
        .collect();
    if selected.is_empty() {
        tracing::debug!("document-frequency bounds removed every token; keeping the full vocabulary");
        df.keys().map(|t| (*t).to_owned()).collect()
    } else {
        selected
    }
}

/// Summarizes every source of `track` and applies the vocabulary selection.
pub fn summarize_track(track: &Track, config: &FeatureConfig) -> Vec<FeatureSummary> {
    let mut summaries: Vec<FeatureSummary> = track
        .sources
        .iter()
        .map(|g| FeatureSummary::from_graph(g, config))
        .collect();
    let vocabulary = select_vocabulary(&summaries, config);
    for summary in &mut summaries {
        summary.tokens.retain(|token, _| vocabulary.contains(token));
    }
    summaries
}
