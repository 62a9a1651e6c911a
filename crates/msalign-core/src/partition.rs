//! Re-attribution of a multi-source alignment to pairwise test cases.
//!
//! The dispatcher produces one global alignment whose entities come from
//! every source of a track. The [`Partitioner`] resolves the dataset of each
//! entity and sorts it into the source-side or target-side bucket of every
//! test case that involves that dataset. A correspondence is kept for a test
//! case only when its two entities fall on opposite sides of that test case.
//!
//! Entities that cannot be attributed are logged and excluded; they never
//! abort the partition.
use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::alignment::{Alignment, CorrespondenceKey, Relation};
use crate::closure::EntityClosure;
use crate::dataset_id::{DatasetId, DatasetIdResolver};
use crate::source::{SourceId, Track, TrackError};

// ---------------------------------------------------------------------------
// Buckets
// ---------------------------------------------------------------------------

/// Identifiers attributed to the two sides of one test case.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceTargetUris {
    pub source: BTreeSet<String>,
    pub target: BTreeSet<String>,
}

impl SourceTargetUris {
    /// `true` when both sides received at least one identifier.
    pub fn contains_source_and_target(&self) -> bool {
        !self.source.is_empty() && !self.target.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_empty() && self.target.is_empty()
    }

    /// Total identifiers on both sides.
    pub fn len(&self) -> usize {
        self.source.len() + self.target.len()
    }
}

/// Dataset ids of the two sides of a test case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCaseDatasets {
    pub name: String,
    pub source: DatasetId,
    pub target: DatasetId,
}

/// Errors raised while building a [`Partitioner`] from a track.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PartitionError {
    #[error(transparent)]
    InvalidTrack(#[from] TrackError),
    /// No IRI of the source yields a dataset id.
    #[error("cannot resolve a dataset id for source {source_id} ('{label}')")]
    UnresolvedSource { source_id: SourceId, label: String },
}

/// How correspondences are assigned to test cases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionMode {
    /// Each correspondence is assigned on its own.
    #[default]
    Direct,
    /// Equivalences are closed transitively first; every source x target
    /// pair of a closed group is emitted with confidence 1.
    TransitiveClosure,
}

/// Result of [`Partitioner::partition_alignment`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PartitionedAlignment {
    /// Candidate alignment per test case name. Every test case has an entry.
    pub alignments: BTreeMap<String, Alignment>,
    /// Test cases at least one correspondence spans.
    pub covered: BTreeSet<String>,
    /// Test cases that correspondences touched on one side only and none
    /// covered, with the number of such correspondences.
    pub ambiguous: BTreeMap<String, usize>,
    /// Entities without a dataset id, or whose dataset is in no test case.
    pub unresolved: BTreeSet<String>,
    /// Reflexive correspondences dropped before partitioning.
    pub reflexive_removed: usize,
}

impl PartitionedAlignment {
    /// Candidate alignment of `test_case`, empty when unknown.
    pub fn alignment_for(&self, test_case: &str) -> Alignment {
        self.alignments.get(test_case).cloned().unwrap_or_default()
    }

    pub fn is_covered(&self, test_case: &str) -> bool {
        self.covered.contains(test_case)
    }
}

// ---------------------------------------------------------------------------
// Partitioner
// ---------------------------------------------------------------------------

/// Side of a test case an entity was attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Source,
    Target,
}

/// Splits identifiers and alignments by test case.
#[derive(Debug, Clone)]
pub struct Partitioner {
    resolver: DatasetIdResolver,
    test_cases: Vec<TestCaseDatasets>,
}

impl Partitioner {
    pub fn new(resolver: DatasetIdResolver, test_cases: Vec<TestCaseDatasets>) -> Self {
        Self {
            resolver,
            test_cases,
        }
    }

    /// Resolves the dataset id of every source by majority vote and builds
    /// one [`TestCaseDatasets`] per test case of `track`.
    ///
    /// # Errors
    ///
    /// Returns [`PartitionError::InvalidTrack`] for a structurally broken
    /// track and [`PartitionError::UnresolvedSource`] when a source used by a
    /// test case has no resolvable IRI.
    pub fn from_track(track: &Track, resolver: DatasetIdResolver) -> Result<Self, PartitionError> {
        track.validate()?;
        let mut resolved: HashMap<SourceId, DatasetId> = HashMap::new();
        let mut lookup = |id: SourceId| -> Result<DatasetId, PartitionError> {
            if let Some(ds) = resolved.get(&id) {
                return Ok(ds.clone());
            }
            let graph = &track.sources[id];
            let ds = resolver
                .resolve_source(graph)
                .ok_or_else(|| PartitionError::UnresolvedSource {
                    source_id: id,
                    label: graph.label.clone(),
                })?;
            tracing::debug!(source = id, label = %graph.label, dataset = %ds, "resolved source");
            resolved.insert(id, ds.clone());
            Ok(ds)
        };

        let mut test_cases = Vec::with_capacity(track.test_cases.len());
        for tc in &track.test_cases {
            test_cases.push(TestCaseDatasets {
                name: tc.name.clone(),
                source: lookup(tc.source)?,
                target: lookup(tc.target)?,
            });
        }
        Ok(Self::new(resolver, test_cases))
    }

    pub fn resolver(&self) -> &DatasetIdResolver {
        &self.resolver
    }

    pub fn test_cases(&self) -> &[TestCaseDatasets] {
        &self.test_cases
    }

    /// Sides of every test case that `dataset` participates in.
    fn sides<'s>(&'s self, dataset: &'s str) -> impl Iterator<Item = (&'s str, Side)> + 's {
        self.test_cases.iter().flat_map(move |tc| {
            let source = (tc.source == dataset).then_some((tc.name.as_str(), Side::Source));
            let target = (tc.target == dataset).then_some((tc.name.as_str(), Side::Target));
            source.into_iter().chain(target)
        })
    }

    fn attribute<'a, I>(&self, ids: I) -> (BTreeMap<String, SourceTargetUris>, BTreeSet<String>)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut buckets: BTreeMap<String, SourceTargetUris> = BTreeMap::new();
        let mut unresolved = BTreeSet::new();
        for id in ids {
            let Some(dataset) = self.resolver.dataset_id(id) else {
                tracing::debug!(entity = id, "no dataset id; entity excluded");
                unresolved.insert(id.to_owned());
                continue;
            };
            let mut attributed = false;
            for (name, side) in self.sides(&dataset) {
                attributed = true;
                let bucket = buckets.entry(name.to_owned()).or_default();
                let set = match side {
                    Side::Source => &mut bucket.source,
                    Side::Target => &mut bucket.target,
                };
                set.insert(id.to_owned());
            }
            if !attributed {
                tracing::debug!(
                    entity = id,
                    dataset = %dataset,
                    "dataset not in any test case; entity excluded"
                );
                unresolved.insert(id.to_owned());
            }
        }
        (buckets, unresolved)
    }

    /// Sorts `ids` into per-test-case buckets.
    ///
    /// An identifier lands in every test case whose source or target dataset
    /// matches its own. Unresolvable identifiers are skipped. Only test cases
    /// that received at least one identifier appear in the result.
    pub fn partition<'a, I>(&self, ids: I) -> BTreeMap<String, SourceTargetUris>
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.attribute(ids).0
    }

    /// Splits a global alignment into one candidate alignment per test case.
    ///
    /// Each correspondence (or, in closure mode, each closed equivalence
    /// group) is partitioned on its own. A test case is covered once one of
    /// them lands on both of its sides; the ones that touch only one side are
    /// counted, and a test case that was touched but never covered is
    /// reported as ambiguous.
    ///
    /// Kept correspondences are oriented so that `entity_one` lies on the
    /// test case's source side; swapping a correspondence reverses its
    /// relation.
    pub fn partition_alignment(
        &self,
        alignment: &Alignment,
        mode: PartitionMode,
    ) -> PartitionedAlignment {
        let filtered = alignment.without_reflexive();
        let reflexive_removed = alignment.len() - filtered.len();
        let (_, unresolved) = self.attribute(filtered.entities());

        let mut out = PartitionedAlignment {
            alignments: self
                .test_cases
                .iter()
                .map(|tc| (tc.name.clone(), Alignment::new()))
                .collect(),
            unresolved,
            reflexive_removed,
            ..PartitionedAlignment::default()
        };
        let mut one_sided: BTreeMap<String, usize> = BTreeMap::new();

        let mut closure = EntityClosure::new();
        for (key, confidence) in filtered.iter() {
            if mode == PartitionMode::TransitiveClosure && key.relation == Relation::Equivalence {
                closure.add(&key.entity_one, &key.entity_two);
                continue;
            }
            let buckets = self.partition([key.entity_one.as_str(), key.entity_two.as_str()]);
            for (name, bucket) in buckets {
                if !bucket.contains_source_and_target() {
                    *one_sided.entry(name).or_default() += 1;
                    continue;
                }
                if let Some(target) = out.alignments.get_mut(&name) {
                    assign(target, &bucket, key, confidence);
                }
                out.covered.insert(name);
            }
        }

        if mode == PartitionMode::TransitiveClosure {
            for group in closure.groups() {
                let buckets = self.partition(group.iter().map(String::as_str));
                for (name, bucket) in buckets {
                    if !bucket.contains_source_and_target() {
                        *one_sided.entry(name).or_default() += 1;
                        continue;
                    }
                    if let Some(target) = out.alignments.get_mut(&name) {
                        emit_group(target, &bucket);
                    }
                    out.covered.insert(name);
                }
            }
        }

        for (name, count) in one_sided {
            if out.covered.contains(&name) {
                continue;
            }
            tracing::warn!(
                test_case = %name,
                correspondences = count,
                "test case touched on one side only"
            );
            out.ambiguous.insert(name, count);
        }
        out
    }
}

/// Adds `key` to a test case alignment, swapped when `entity_one` sits on
/// the target side.
fn assign(
    alignment: &mut Alignment,
    bucket: &SourceTargetUris,
    key: &CorrespondenceKey,
    confidence: f64,
) {
    let one = key.entity_one.as_str();
    let two = key.entity_two.as_str();
    if bucket.source.contains(one) && bucket.target.contains(two) {
        alignment.insert(one, two, confidence, key.relation);
    } else if bucket.source.contains(two) && bucket.target.contains(one) {
        alignment.insert(two, one, confidence, key.relation.reversed());
    }
}

/// Every source x target pair of a closed group, with confidence 1.
fn emit_group(alignment: &mut Alignment, bucket: &SourceTargetUris) {
    for s in &bucket.source {
        for t in &bucket.target {
            if s != t {
                alignment.insert(s.as_str(), t.as_str(), 1.0, Relation::Equivalence);
            }
        }
    }
}
