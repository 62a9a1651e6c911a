//! Shared fixtures for unit tests.
//!
//! Compiled only in test builds. Integration tests under
//! `crates/msalign-core/tests/` keep their own helpers because they link
//! against the non-test library build.
#![allow(clippy::expect_used)]

use std::collections::BTreeMap;

use crate::alignment::{Alignment, Relation};
use crate::dispatch::{ClusterGraph, Matcher, MatcherError, MatcherParams};
use crate::evaluation::GoldStandardCompleteness;
use crate::features::{FeatureSummary, iri_fragment};
use crate::source::{SourceGraph, Term, TestCase, Track, Triple};
use crate::vocab;

/// Namespace of the synthetic source `label`.
pub fn ex_ns(label: &str) -> String {
    format!("http://{label}.example.org/onto#")
}

/// IRI of class `i` in source `label`.
pub fn ex_class(label: &str, i: usize) -> String {
    format!("{}C{i}", ex_ns(label))
}

/// `iri rdf:type owl:Class`.
pub fn class_triple(iri: &str) -> Triple {
    Triple::new(iri, vocab::RDF_TYPE, Term::iri(vocab::OWL_CLASS))
}

/// A source with `classes` labelled classes `C0..C{classes}` in its own
/// namespace.
pub fn ex_source(label: &str, classes: usize) -> SourceGraph {
    let mut graph = SourceGraph::new(label);
    for i in 0..classes {
        let iri = ex_class(label, i);
        graph.triples.push(class_triple(&iri));
        graph.triples.push(Triple::new(
            iri,
            "http://www.w3.org/2000/01/rdf-schema#label",
            Term::literal(format!("concept number {i}")),
        ));
    }
    graph
}

/// A summary carrying only scalar statistics.
pub fn summary_with_stats(classes: u64, instances: u64, triples: u64) -> FeatureSummary {
    FeatureSummary {
        class_count: classes,
        instance_count: instances,
        triple_count: triples,
        ..FeatureSummary::default()
    }
}

/// A summary carrying only tokens.
pub fn summary_with_tokens(tokens: &[(&str, u64)]) -> FeatureSummary {
    FeatureSummary {
        tokens: tokens
            .iter()
            .map(|(t, c)| ((*t).to_owned(), *c))
            .collect::<BTreeMap<_, _>>(),
        ..FeatureSummary::default()
    }
}

/// Reference alignment `a:Ci = b:Ci` for `i < classes`.
pub fn identity_reference(a: &str, b: &str, classes: usize) -> Alignment {
    let mut reference = Alignment::new();
    for i in 0..classes {
        reference.insert(ex_class(a, i), ex_class(b, i), 1.0, Relation::Equivalence);
    }
    reference
}

/// A track over `labels`, each source holding `classes` classes, with one
/// test case per unordered pair (in label order) and identity references.
pub fn ex_track(labels: &[&str], classes: usize) -> Track {
    let sources = labels.iter().map(|l| ex_source(l, classes)).collect();
    let mut test_cases = Vec::new();
    for (i, a) in labels.iter().enumerate() {
        for (j, b) in labels.iter().enumerate().skip(i + 1) {
            test_cases.push(TestCase {
                name: format!("{a}-{b}"),
                source: i,
                target: j,
                reference: identity_reference(a, b, classes),
                completeness: GoldStandardCompleteness::Complete,
            });
        }
    }
    Track {
        name: "synthetic".to_owned(),
        sources,
        test_cases,
    }
}

/// Links subjects of the two sides that share a local name.
pub struct LocalNameMatcher;

impl Matcher for LocalNameMatcher {
    fn match_graphs(
        &self,
        left: &ClusterGraph,
        right: &ClusterGraph,
        _input: &Alignment,
        _params: &MatcherParams,
    ) -> Result<Alignment, MatcherError> {
        let mut by_name: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for triple in right.triples() {
            if let Some(name) = iri_fragment(&triple.subject) {
                by_name.entry(name).or_default().push(triple.subject.as_str());
            }
        }
        let mut out = Alignment::new();
        for triple in left.triples() {
            let Some(name) = iri_fragment(&triple.subject) else {
                continue;
            };
            for other in by_name.get(name).into_iter().flatten() {
                out.insert(triple.subject.as_str(), *other, 1.0, Relation::Equivalence);
            }
        }
        Ok(out)
    }
}
