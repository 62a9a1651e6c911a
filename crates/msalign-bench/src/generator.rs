//! Track generator.
//!
//! Every source draws its classes from one shared concept pool. Two sources
//! that both contain a concept agree on it, and that agreement is exactly
//! the reference alignment of their test case.

use std::collections::BTreeSet;

use msalign_core::{
    Alignment, GoldStandardCompleteness, Relation, SourceGraph, Term, TestCase, Track, vocab,
};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};

const RDFS_LABEL: &str = "http://www.w3.org/2000/01/rdf-schema#label";
const RDFS_SUBCLASS_OF: &str = "http://www.w3.org/2000/01/rdf-schema#subClassOf";

/// Words concept labels are built from.
const WORDS: &[&str] = &[
    "heart", "valve", "artery", "vein", "muscle", "bone", "nerve", "cell", "tissue", "organ",
    "blood", "skin", "lung", "liver", "kidney", "brain", "spine", "joint", "cartilage", "tendon",
    "gland", "duct", "membrane", "fiber", "node", "lobe", "cavity", "wall", "layer", "canal",
    "process", "surface", "region", "segment", "branch", "root", "trunk", "arch", "ring", "plate",
];

/// Configuration for the track generator.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Seed for the random number generator (deterministic).
    pub seed: u64,
    /// Number of source graphs.
    pub sources: usize,
    /// Size of the shared concept pool.
    pub concepts: usize,
    /// Fraction of the pool each source contains (0.0-1.0).
    pub coverage: f64,
    /// Average instances per class.
    pub instances_per_class: f64,
    /// Probability that a class gets a `subClassOf` edge to an earlier class.
    pub hierarchy_density: f64,
}

/// Predefined size tiers for benchmarking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeTier {
    /// 4 sources, ~30 classes each
    Small,
    /// 8 sources, ~200 classes each
    Medium,
    /// 16 sources, ~600 classes each
    Large,
}

impl SizeTier {
    /// Returns the default `GeneratorConfig` for this size tier.
    pub fn config(self, seed: u64) -> GeneratorConfig {
        match self {
            SizeTier::Small => GeneratorConfig {
                seed,
                sources: 4,
                concepts: 50,
                coverage: 0.6,
                instances_per_class: 0.5,
                hierarchy_density: 0.3,
            },
            SizeTier::Medium => GeneratorConfig {
                seed,
                sources: 8,
                concepts: 300,
                coverage: 0.65,
                instances_per_class: 1.0,
                hierarchy_density: 0.4,
            },
            SizeTier::Large => GeneratorConfig {
                seed,
                sources: 16,
                concepts: 1000,
                coverage: 0.6,
                instances_per_class: 1.5,
                hierarchy_density: 0.5,
            },
        }
    }
}

/// Generates a track from the given configuration.
///
/// All randomness is deterministic, seeded from `config.seed`. Every pair of
/// sources becomes a test case with a complete reference.
pub fn generate_track(config: &GeneratorConfig) -> Track {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let labels = concept_labels(config.concepts, &mut rng);

    let members: Vec<BTreeSet<usize>> = (0..config.sources)
        .map(|_| pick_concepts(config, &mut rng))
        .collect();
    let sources = members
        .iter()
        .enumerate()
        .map(|(i, concepts)| build_source(i, concepts, &labels, config, &mut rng))
        .collect();

    let mut test_cases = Vec::new();
    for source in 0..config.sources {
        for target in source + 1..config.sources {
            let mut reference = Alignment::new();
            for &concept in members[source].intersection(&members[target]) {
                reference.insert(
                    class_iri(source, concept),
                    class_iri(target, concept),
                    1.0,
                    Relation::Equivalence,
                );
            }
            test_cases.push(TestCase {
                name: format!("{}-{}", source_label(source), source_label(target)),
                source,
                target,
                reference,
                completeness: GoldStandardCompleteness::Complete,
            });
        }
    }

    Track {
        name: format!("synthetic-{}", config.seed),
        sources,
        test_cases,
    }
}

/// Label of source `index`.
pub fn source_label(index: usize) -> String {
    format!("s{index}")
}

/// Namespace of source `index`.
pub fn namespace(index: usize) -> String {
    format!("http://{}.example.org/onto#", source_label(index))
}

fn class_iri(source: usize, concept: usize) -> String {
    format!("{}C{concept}", namespace(source))
}

fn concept_labels(count: usize, rng: &mut StdRng) -> Vec<String> {
    (0..count)
        .map(|_| {
            let first = WORDS[rng.gen_range(0..WORDS.len())];
            let second = WORDS[rng.gen_range(0..WORDS.len())];
            format!("{first} {second}")
        })
        .collect()
}

fn pick_concepts(config: &GeneratorConfig, rng: &mut StdRng) -> BTreeSet<usize> {
    if config.concepts == 0 {
        return BTreeSet::new();
    }
    let wanted = (config.concepts as f64 * config.coverage.clamp(0.0, 1.0)).round() as usize;
    let amount = wanted.clamp(1, config.concepts);
    index::sample(rng, config.concepts, amount).into_iter().collect()
}

fn build_source(
    index: usize,
    concepts: &BTreeSet<usize>,
    labels: &[String],
    config: &GeneratorConfig,
    rng: &mut StdRng,
) -> SourceGraph {
    let mut graph = SourceGraph::new(source_label(index));
    let mut declared: Vec<String> = Vec::with_capacity(concepts.len());
    let mut instance = 0usize;

    for &concept in concepts {
        let iri = class_iri(index, concept);
        graph = graph
            .with_triple(&iri, vocab::RDF_TYPE, Term::iri(vocab::OWL_CLASS))
            .with_triple(&iri, RDFS_LABEL, Term::literal(labels[concept].as_str()));

        if !declared.is_empty() && rng.gen_bool(config.hierarchy_density.clamp(0.0, 1.0)) {
            let parent = &declared[rng.gen_range(0..declared.len())];
            graph = graph.with_triple(&iri, RDFS_SUBCLASS_OF, Term::iri(parent.as_str()));
        }

        let whole = config.instances_per_class.max(0.0).floor() as usize;
        let extra = usize::from(rng.gen_bool(config.instances_per_class.max(0.0).fract()));
        for _ in 0..whole + extra {
            let subject = format!("{}i{instance}", namespace(index));
            graph = graph.with_triple(&subject, vocab::RDF_TYPE, Term::iri(iri.as_str()));
            instance += 1;
        }
        declared.push(iri);
    }
    graph
}
