//! Source graphs, test cases and tracks.
//!
//! A [`Track`] is the benchmark definition consumed by every other module: the
//! list of sources (indexed `0..N-1` in file order) and the pairwise
//! [`TestCase`]s with their reference alignments. Loading graphs from RDF
//! files is left to callers; a source here is already a list of triples.
use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::alignment::Alignment;
use crate::evaluation::GoldStandardCompleteness;
use crate::vocab;

/// Stable index of a source inside its track.
pub type SourceId = usize;

// ---------------------------------------------------------------------------
// Triples
// ---------------------------------------------------------------------------

/// Object position of a triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Term {
    /// An IRI reference.
    Iri(String),
    /// A literal value with optional language tag or datatype.
    Literal {
        value: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        lang: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        datatype: Option<String>,
    },
}

impl Term {
    /// Creates an IRI term.
    pub fn iri(value: impl Into<String>) -> Self {
        Term::Iri(value.into())
    }

    /// Creates a plain string literal.
    pub fn literal(value: impl Into<String>) -> Self {
        Term::Literal {
            value: value.into(),
            lang: None,
            datatype: None,
        }
    }

    /// Returns the IRI if this term is one.
    pub fn as_iri(&self) -> Option<&str> {
        match self {
            Term::Iri(iri) => Some(iri),
            Term::Literal { .. } => None,
        }
    }

    /// Returns the lexical value when this term is a textual literal
    /// (language-tagged, untyped, `xsd:string` or `rdf:langString`).
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Term::Iri(_) => None,
            Term::Literal {
                value,
                lang,
                datatype,
            } => {
                let textual = lang.is_some()
                    || datatype
                        .as_deref()
                        .is_none_or(|d| d == vocab::XSD_STRING || d == vocab::RDF_LANG_STRING);
                textual.then_some(value.as_str())
            }
        }
    }
}

/// A single statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Triple {
    pub subject: String,
    pub predicate: String,
    pub object: Term,
}

impl Triple {
    /// Creates a triple.
    pub fn new(subject: impl Into<String>, predicate: impl Into<String>, object: Term) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object,
        }
    }
}

// ---------------------------------------------------------------------------
// SourceGraph
// ---------------------------------------------------------------------------

/// One input graph participating in the N-way match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceGraph {
    /// Human-readable name, used in logs and rendered trees.
    pub label: String,
    /// Where the graph was loaded from, if known. Never dereferenced here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// The statements of the graph.
    #[serde(default)]
    pub triples: Vec<Triple>,
}

impl SourceGraph {
    /// Creates an empty graph with `label`.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            location: None,
            triples: Vec::new(),
        }
    }

    /// Appends a triple, builder style.
    #[must_use]
    pub fn with_triple(mut self, subject: &str, predicate: &str, object: Term) -> Self {
        self.triples.push(Triple::new(subject, predicate, object));
        self
    }

    /// Number of triples.
    pub fn len(&self) -> usize {
        self.triples.len()
    }

    /// `true` when the graph has no triples.
    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    /// Every IRI touched by the graph, in subject/predicate/object order per
    /// triple. Duplicates are preserved so callers can vote by frequency.
    pub fn iris(&self) -> impl Iterator<Item = &str> + '_ {
        self.triples.iter().flat_map(|t| {
            [
                Some(t.subject.as_str()),
                Some(t.predicate.as_str()),
                t.object.as_iri(),
            ]
            .into_iter()
            .flatten()
        })
    }

    /// Distinct subjects.
    pub fn subjects(&self) -> BTreeSet<&str> {
        self.triples.iter().map(|t| t.subject.as_str()).collect()
    }

    /// Distinct entities: subjects plus IRI objects that are not shared
    /// vocabulary terms.
    pub fn entities(&self) -> HashSet<&str> {
        let mut out = HashSet::new();
        for t in &self.triples {
            out.insert(t.subject.as_str());
            if let Some(iri) = t.object.as_iri() {
                if !vocab::is_shared_vocabulary(iri) {
                    out.insert(iri);
                }
            }
        }
        out
    }
}

// ---------------------------------------------------------------------------
// TestCase / Track
// ---------------------------------------------------------------------------

/// One pairwise benchmark unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    /// Unique name inside the track.
    pub name: String,
    /// Index of the source-side graph.
    pub source: SourceId,
    /// Index of the target-side graph.
    pub target: SourceId,
    /// Reference alignment between the two sides.
    #[serde(default)]
    pub reference: Alignment,
    /// How complete `reference` is.
    #[serde(default)]
    pub completeness: GoldStandardCompleteness,
}

/// A benchmark: sources plus the pairwise test cases defined over them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub name: String,
    pub sources: Vec<SourceGraph>,
    #[serde(default)]
    pub test_cases: Vec<TestCase>,
}

/// Structural problems in a [`Track`] definition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrackError {
    /// The track defines no sources.
    #[error("track '{0}' has no sources")]
    NoSources(String),
    /// A test case references a source index outside the track.
    #[error("test case '{test_case}' references source {source_id}, but the track has {available} sources")]
    UnknownSource {
        test_case: String,
        source_id: SourceId,
        available: usize,
    },
    /// A test case pairs a source with itself.
    #[error("test case '{0}' uses the same source on both sides")]
    SelfPairing(String),
    /// Two test cases share a name.
    #[error("duplicate test case name '{0}'")]
    DuplicateTestCase(String),
}

impl Track {
    /// Checks that every test case refers to two distinct existing sources and
    /// that test case names are unique.
    ///
    /// # Errors
    ///
    /// Returns the first [`TrackError`] found.
    pub fn validate(&self) -> Result<(), TrackError> {
        if self.sources.is_empty() {
            return Err(TrackError::NoSources(self.name.clone()));
        }
        let mut names = HashSet::new();
        for tc in &self.test_cases {
            for side in [tc.source, tc.target] {
                if side >= self.sources.len() {
                    return Err(TrackError::UnknownSource {
                        test_case: tc.name.clone(),
                        source_id: side,
                        available: self.sources.len(),
                    });
                }
            }
            if tc.source == tc.target {
                return Err(TrackError::SelfPairing(tc.name.clone()));
            }
            if !names.insert(tc.name.as_str()) {
                return Err(TrackError::DuplicateTestCase(tc.name.clone()));
            }
        }
        Ok(())
    }

    /// Labels of all sources, in index order.
    pub fn labels(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.label.clone()).collect()
    }

    /// Looks up a test case by name.
    pub fn test_case(&self, name: &str) -> Option<&TestCase> {
        self.test_cases.iter().find(|tc| tc.name == name)
    }
}
