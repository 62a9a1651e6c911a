//! Correspondences and alignments.
//!
//! An [`Alignment`] is a set of [`Correspondence`]s keyed by
//! `(entity_one, entity_two, relation)`. Confidence is payload, not identity:
//! adding a correspondence whose key is already present overwrites the stored
//! confidence instead of creating a second entry.
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Relation
// ---------------------------------------------------------------------------

/// Semantic relation asserted between two entities.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    /// `=`: both entities denote the same thing.
    #[default]
    Equivalence,
    /// `>`: the first entity subsumes the second.
    Subsumes,
    /// `<`: the first entity is subsumed by the second.
    Subsumed,
    /// `~`: the entities overlap.
    Overlap,
    /// `%`: the entities are incompatible (negative mapping).
    Incompat,
    /// `?`: the relation is unknown.
    Unknown,
}

impl Relation {
    /// All relations, in declaration order.
    pub const ALL: [Relation; 6] = [
        Relation::Equivalence,
        Relation::Subsumes,
        Relation::Subsumed,
        Relation::Overlap,
        Relation::Incompat,
        Relation::Unknown,
    ];

    /// Returns the relation that holds when the two entities are swapped.
    pub fn reversed(self) -> Self {
        match self {
            Relation::Subsumes => Relation::Subsumed,
            Relation::Subsumed => Relation::Subsumes,
            Relation::Equivalence | Relation::Overlap | Relation::Incompat | Relation::Unknown => {
                self
            }
        }
    }

    /// Returns the single-character symbol used in alignment files.
    pub fn symbol(self) -> &'static str {
        match self {
            Relation::Equivalence => "=",
            Relation::Subsumes => ">",
            Relation::Subsumed => "<",
            Relation::Overlap => "~",
            Relation::Incompat => "%",
            Relation::Unknown => "?",
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Error returned when a relation string is neither a known symbol nor name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown relation '{0}'")]
pub struct UnknownRelation(pub String);

impl FromStr for Relation {
    type Err = UnknownRelation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Relation::ALL
            .into_iter()
            .find(|r| {
                r.symbol() == trimmed
                    || format!("{r:?}").eq_ignore_ascii_case(trimmed)
            })
            .ok_or_else(|| UnknownRelation(trimmed.to_owned()))
    }
}

// ---------------------------------------------------------------------------
// Correspondence
// ---------------------------------------------------------------------------

fn default_confidence() -> f64 {
    1.0
}

/// Clamps a confidence into `[0, 1]`, mapping NaN to `0`.
pub fn clamp_confidence(confidence: f64) -> f64 {
    if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    }
}

/// One asserted link between two entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correspondence {
    /// Identifier of the first entity.
    pub entity_one: String,
    /// Identifier of the second entity.
    pub entity_two: String,
    /// Confidence in `[0, 1]`.
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    /// Asserted relation; defaults to equivalence.
    #[serde(default)]
    pub relation: Relation,
}

impl Correspondence {
    /// Creates an equivalence correspondence with confidence `1.0`.
    pub fn new(entity_one: impl Into<String>, entity_two: impl Into<String>) -> Self {
        Self {
            entity_one: entity_one.into(),
            entity_two: entity_two.into(),
            confidence: 1.0,
            relation: Relation::Equivalence,
        }
    }

    /// Sets the confidence (clamped into `[0, 1]`).
    #[must_use]
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = clamp_confidence(confidence);
        self
    }

    /// Sets the relation.
    #[must_use]
    pub fn with_relation(mut self, relation: Relation) -> Self {
        self.relation = relation;
        self
    }

    /// Returns the identity key of this correspondence.
    pub fn key(&self) -> CorrespondenceKey {
        CorrespondenceKey {
            entity_one: self.entity_one.clone(),
            entity_two: self.entity_two.clone(),
            relation: self.relation,
        }
    }

    /// `true` when both sides name the same entity.
    pub fn is_reflexive(&self) -> bool {
        self.entity_one == self.entity_two
    }

    /// Returns the correspondence with its entities swapped and the relation
    /// reversed accordingly.
    #[must_use]
    pub fn reversed(&self) -> Self {
        Self {
            entity_one: self.entity_two.clone(),
            entity_two: self.entity_one.clone(),
            confidence: self.confidence,
            relation: self.relation.reversed(),
        }
    }
}

/// Identity of a correspondence inside an [`Alignment`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CorrespondenceKey {
    /// Identifier of the first entity.
    pub entity_one: String,
    /// Identifier of the second entity.
    pub entity_two: String,
    /// Asserted relation.
    pub relation: Relation,
}

impl CorrespondenceKey {
    /// Creates a key from its parts.
    pub fn new(
        entity_one: impl Into<String>,
        entity_two: impl Into<String>,
        relation: Relation,
    ) -> Self {
        Self {
            entity_one: entity_one.into(),
            entity_two: entity_two.into(),
            relation,
        }
    }

    /// `true` when both sides name the same entity.
    pub fn is_reflexive(&self) -> bool {
        self.entity_one == self.entity_two
    }
}

// ---------------------------------------------------------------------------
// Alignment
// ---------------------------------------------------------------------------

/// A set of correspondences without duplicate `(entity_one, entity_two,
/// relation)` keys.
///
/// Iteration is ordered by key, so two alignments with the same content always
/// serialize identically.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Correspondence>", into = "Vec<Correspondence>")]
pub struct Alignment {
    cells: BTreeMap<CorrespondenceKey, f64>,
}

impl Alignment {
    /// Creates an empty alignment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of correspondences.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// `true` when the alignment holds no correspondences.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Adds a correspondence, overwriting the confidence of an existing entry
    /// with the same key.
    pub fn add(&mut self, correspondence: Correspondence) {
        let Correspondence {
            entity_one,
            entity_two,
            confidence,
            relation,
        } = correspondence;
        self.cells.insert(
            CorrespondenceKey {
                entity_one,
                entity_two,
                relation,
            },
            clamp_confidence(confidence),
        );
    }

    /// Convenience wrapper around [`Alignment::add`].
    pub fn insert(
        &mut self,
        entity_one: impl Into<String>,
        entity_two: impl Into<String>,
        confidence: f64,
        relation: Relation,
    ) {
        self.cells.insert(
            CorrespondenceKey::new(entity_one, entity_two, relation),
            clamp_confidence(confidence),
        );
    }

    /// Adds every correspondence of `other`; on key collisions `other` wins.
    pub fn extend_from(&mut self, other: &Alignment) {
        for (key, confidence) in &other.cells {
            self.cells.insert(key.clone(), *confidence);
        }
    }

    /// `true` when a correspondence with `key` is present.
    pub fn contains(&self, key: &CorrespondenceKey) -> bool {
        self.cells.contains_key(key)
    }

    /// `true` when `(entity_one, entity_two, relation)` is present.
    pub fn contains_cell(&self, entity_one: &str, entity_two: &str, relation: Relation) -> bool {
        self.cells
            .contains_key(&CorrespondenceKey::new(entity_one, entity_two, relation))
    }

    /// Confidence stored for `key`, if present.
    pub fn confidence(&self, key: &CorrespondenceKey) -> Option<f64> {
        self.cells.get(key).copied()
    }

    /// Removes the correspondence with `key`, returning its confidence.
    pub fn remove(&mut self, key: &CorrespondenceKey) -> Option<f64> {
        self.cells.remove(key)
    }

    /// Iterates over `(key, confidence)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&CorrespondenceKey, f64)> + '_ {
        self.cells.iter().map(|(k, c)| (k, *c))
    }

    /// Iterates over the keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &CorrespondenceKey> + '_ {
        self.cells.keys()
    }

    /// Iterates over owned correspondences in key order.
    pub fn correspondences(&self) -> impl Iterator<Item = Correspondence> + '_ {
        self.cells.iter().map(|(k, c)| Correspondence {
            entity_one: k.entity_one.clone(),
            entity_two: k.entity_two.clone(),
            confidence: *c,
            relation: k.relation,
        })
    }

    /// Keeps only the correspondences for which `keep` returns `true`.
    pub fn retain(&mut self, mut keep: impl FnMut(&CorrespondenceKey, f64) -> bool) {
        self.cells.retain(|k, c| keep(k, *c));
    }

    /// Every entity identifier mentioned on either side.
    pub fn entities(&self) -> BTreeSet<&str> {
        let mut out = BTreeSet::new();
        for key in self.cells.keys() {
            out.insert(key.entity_one.as_str());
            out.insert(key.entity_two.as_str());
        }
        out
    }

    /// Returns the correspondences that touch at least one of `entities`.
    pub fn restricted_to(&self, entities: &HashSet<&str>) -> Alignment {
        let cells = self
            .cells
            .iter()
            .filter(|(k, _)| {
                entities.contains(k.entity_one.as_str()) || entities.contains(k.entity_two.as_str())
            })
            .map(|(k, c)| (k.clone(), *c))
            .collect();
        Alignment { cells }
    }

    /// Returns a copy without correspondences whose two sides are identical.
    pub fn without_reflexive(&self) -> Alignment {
        let cells = self
            .cells
            .iter()
            .filter(|(k, _)| !k.is_reflexive())
            .map(|(k, c)| (k.clone(), *c))
            .collect();
        Alignment { cells }
    }
}

impl From<Vec<Correspondence>> for Alignment {
    fn from(value: Vec<Correspondence>) -> Self {
        value.into_iter().collect()
    }
}

impl From<Alignment> for Vec<Correspondence> {
    fn from(value: Alignment) -> Self {
        value.correspondences().collect()
    }
}

impl FromIterator<Correspondence> for Alignment {
    fn from_iter<I: IntoIterator<Item = Correspondence>>(iter: I) -> Self {
        let mut alignment = Alignment::new();
        alignment.extend(iter);
        alignment
    }
}

impl Extend<Correspondence> for Alignment {
    fn extend<I: IntoIterator<Item = Correspondence>>(&mut self, iter: I) {
        for correspondence in iter {
            self.add(correspondence);
        }
    }
}
