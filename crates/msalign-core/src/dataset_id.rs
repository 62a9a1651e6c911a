//! Dataset identity resolution.
//!
//! Attributes an entity IRI, or a whole source graph, to the dataset it came
//! from. Each IRI is mapped through an [`ExtractionRule`]; IRIs in shared
//! schema namespaces are discarded first so `rdf:type` and friends never
//! outvote the content namespace. The most frequent extraction wins, with
//! ties going to the lexicographically smallest identifier.
use std::collections::HashMap;

use regex::Regex;

use crate::source::SourceGraph;
use crate::vocab;

/// Identifier of a dataset (typically a namespace IRI).
pub type DatasetId = String;

/// Errors raised while building a resolver.
#[derive(Debug, thiserror::Error)]
pub enum DatasetIdError {
    /// A URL pattern failed to compile.
    #[error("invalid dataset pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

// ---------------------------------------------------------------------------
// ExtractionRule
// ---------------------------------------------------------------------------

/// How a single IRI is reduced to a dataset identifier.
#[derive(Debug, Clone, Default)]
pub enum ExtractionRule {
    /// Everything up to and including the last `/` or `#`.
    #[default]
    NamespacePrefix,
    /// The first pattern that matches; capture group 1 when the pattern has
    /// one, the whole match otherwise.
    UrlPattern(Vec<Regex>),
}

impl ExtractionRule {
    /// Compiles a [`ExtractionRule::UrlPattern`] from pattern strings.
    ///
    /// # Errors
    ///
    /// Returns [`DatasetIdError::InvalidPattern`] for the first pattern that
    /// does not compile.
    pub fn url_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<Self, DatasetIdError> {
        let compiled = patterns
            .iter()
            .map(|p| {
                Regex::new(p.as_ref()).map_err(|source| DatasetIdError::InvalidPattern {
                    pattern: p.as_ref().to_owned(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ExtractionRule::UrlPattern(compiled))
    }

    /// Applies the rule to one IRI.
    pub fn apply<'a>(&self, iri: &'a str) -> Option<&'a str> {
        match self {
            ExtractionRule::NamespacePrefix => namespace_prefix(iri),
            ExtractionRule::UrlPattern(patterns) => patterns.iter().find_map(|re| {
                let caps = re.captures(iri)?;
                caps.get(1).or_else(|| caps.get(0)).map(|m| m.as_str())
            }),
        }
    }
}

/// Returns `iri` up to and including its last `/` or `#`.
///
/// A separator that is part of the scheme (`http://`) does not count, so a
/// bare authority such as `http://x.org` yields `None`.
pub fn namespace_prefix(iri: &str) -> Option<&str> {
    let cut = iri.rfind(['/', '#'])?;
    let authority_start = iri.find("://").map_or(0, |i| i + 3);
    (cut >= authority_start).then(|| &iri[..=cut])
}

// ---------------------------------------------------------------------------
// DatasetIdResolver
// ---------------------------------------------------------------------------

/// Majority-vote dataset resolver.
#[derive(Debug, Clone)]
pub struct DatasetIdResolver {
    rule: ExtractionRule,
    denylist: Vec<String>,
}

impl Default for DatasetIdResolver {
    fn default() -> Self {
        Self::new(ExtractionRule::default())
    }
}

impl DatasetIdResolver {
    /// Creates a resolver with the default shared-vocabulary denylist.
    pub fn new(rule: ExtractionRule) -> Self {
        Self {
            rule,
            denylist: vocab::SHARED_VOCABULARY_NAMESPACES
                .iter()
                .map(|ns| (*ns).to_owned())
                .collect(),
        }
    }

    /// Adds a namespace whose IRIs never vote.
    #[must_use]
    pub fn with_denied_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.denylist.push(namespace.into());
        self
    }

    /// The active extraction rule.
    pub fn rule(&self) -> &ExtractionRule {
        &self.rule
    }

    /// `true` when `iri` belongs to a denied namespace.
    pub fn is_denied(&self, iri: &str) -> bool {
        self.denylist.iter().any(|ns| iri.starts_with(ns.as_str()))
    }

    /// Applies the extraction rule to a single non-denied IRI.
    pub fn extract<'a>(&self, iri: &'a str) -> Option<&'a str> {
        if self.is_denied(iri) {
            return None;
        }
        self.rule.apply(iri)
    }

    /// Dataset of a single entity.
    pub fn dataset_id(&self, entity: &str) -> Option<DatasetId> {
        self.extract(entity).map(str::to_owned)
    }

    /// Most frequent extraction over `iris`; ties go to the lexicographically
    /// smallest candidate. `None` when no IRI yields an extraction.
    pub fn majority<'a, I>(&self, iris: I) -> Option<DatasetId>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for iri in iris {
            if let Some(id) = self.extract(iri) {
                *counts.entry(id).or_insert(0) += 1;
            }
        }
        counts
            .into_iter()
            .max_by(|(a_id, a_n), (b_id, b_n)| a_n.cmp(b_n).then_with(|| b_id.cmp(a_id)))
            .map(|(id, _)| id.to_owned())
    }

    /// Dataset of a whole source, voting over every IRI it touches.
    pub fn resolve_source(&self, graph: &SourceGraph) -> Option<DatasetId> {
        self.majority(graph.iris())
    }
}
