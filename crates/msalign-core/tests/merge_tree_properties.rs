//! Property tests for merge-tree construction.
//!
//! Both builders must emit a forest over `n` singletons: `n - 1` steps, every
//! operand formed before it is consumed, every cluster except the root
//! consumed exactly once.
#![allow(clippy::expect_used)]

use std::collections::BTreeMap;

use msalign_core::{
    DistanceMatrix, FeatureSummary, Linkage, MergeTree, OrderHeuristic, PlanStrategy,
    TokenSimilarity, build_merge_tree, planner::agglomerative_merge_tree,
};
use proptest::prelude::*;

const TOKENS: [&str; 6] = ["heart", "valve", "engine", "piston", "river", "delta"];

fn arb_summary() -> impl Strategy<Value = FeatureSummary> {
    (
        0u64..50,
        0u64..50,
        0u64..500,
        proptest::collection::vec((0usize..TOKENS.len(), 1u64..5), 0..6),
    )
        .prop_map(|(classes, instances, triples, tokens)| {
            let mut bag = BTreeMap::new();
            for (t, c) in tokens {
                *bag.entry(TOKENS[t].to_owned()).or_insert(0) += c;
            }
            FeatureSummary {
                tokens: bag,
                class_count: classes,
                instance_count: instances,
                triple_count: triples,
                ..FeatureSummary::default()
            }
        })
}

fn arb_matrix() -> impl Strategy<Value = DistanceMatrix> {
    (1usize..10).prop_flat_map(|n| {
        proptest::collection::vec(0.0f64..1.0, n * n).prop_map(move |raw| {
            DistanceMatrix::from_fn(n, |i, j| raw[i.min(j) * n + i.max(j)])
        })
    })
}

fn arb_strategy() -> impl Strategy<Value = PlanStrategy> {
    let heuristics = OrderHeuristic::all();
    prop_oneof![
        (0..heuristics.len()).prop_map(move |i| PlanStrategy::Order(heuristics[i])),
        (0usize..3, 0usize..3).prop_map(|(l, s)| PlanStrategy::Cluster {
            linkage: Linkage::ALL[l],
            similarity: [
                TokenSimilarity::Jaccard,
                TokenSimilarity::Cosine,
                TokenSimilarity::TfIdfCosine
            ][s],
        }),
    ]
}

/// Checks the forest property without relying on the tree's own validation.
fn assert_forest(tree: &MergeTree, n: usize) {
    assert_eq!(tree.source_count(), n);
    assert_eq!(tree.len(), n - 1, "n - 1 steps");
    let total = 2 * n - 1;
    let mut consumed = vec![0usize; total];
    for (i, step) in tree.steps().iter().enumerate() {
        let produced = n + i;
        for operand in [step.left, step.right] {
            assert!(operand < produced, "operand {operand} used before it exists");
            consumed[operand] += 1;
        }
        assert_ne!(step.left, step.right);
    }
    let root = total - 1;
    for (id, count) in consumed.iter().enumerate() {
        let expected = usize::from(id != root);
        assert_eq!(*count, expected, "cluster {id} consumed {count} times");
    }
    assert_eq!(tree.members(root), (0..n).collect::<Vec<_>>());
}

proptest! {
    #[test]
    fn planned_trees_are_forests(
        summaries in proptest::collection::vec(arb_summary(), 1..10),
        strategy in arb_strategy(),
    ) {
        let tree = build_merge_tree(&summaries, &strategy).expect("plan");
        assert_forest(&tree, summaries.len());
        prop_assert_eq!(tree.parallel_levels().iter().sum::<usize>(), tree.len());
        prop_assert!(tree.height() <= summaries.len());
    }

    #[test]
    fn agglomerative_trees_are_forests(matrix in arb_matrix(), l in 0usize..3) {
        let linkage = Linkage::ALL[l];
        let tree = agglomerative_merge_tree(&matrix, linkage).expect("cluster");
        assert_forest(&tree, matrix.len());
        for distance in tree.distances() {
            let d = distance.expect("clustering records distances");
            prop_assert!((0.0..1.0).contains(&d));
        }
    }

    #[test]
    fn single_linkage_distances_never_decrease(matrix in arb_matrix()) {
        let tree = agglomerative_merge_tree(&matrix, Linkage::Single).expect("cluster");
        let distances: Vec<f64> = tree.distances().into_iter().flatten().collect();
        for pair in distances.windows(2) {
            prop_assert!(pair[0] <= pair[1] + 1e-12, "{distances:?}");
        }
    }

    #[test]
    fn planning_is_deterministic(
        summaries in proptest::collection::vec(arb_summary(), 1..8),
        strategy in arb_strategy(),
    ) {
        let a = build_merge_tree(&summaries, &strategy).expect("plan");
        let b = build_merge_tree(&summaries, &strategy).expect("plan");
        prop_assert_eq!(
            serde_json::to_string(&a).expect("serialize"),
            serde_json::to_string(&b).expect("serialize")
        );
        prop_assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn serialized_trees_reload_equal(
        summaries in proptest::collection::vec(arb_summary(), 1..8),
        strategy in arb_strategy(),
    ) {
        let tree = build_merge_tree(&summaries, &strategy).expect("plan");
        let json = serde_json::to_string(&tree).expect("serialize");
        let back: MergeTree = serde_json::from_str(&json).expect("deserialize");
        prop_assert_eq!(back.distances().len(), tree.len());
        prop_assert_eq!(back, tree);
    }
}

#[test]
fn two_sources_give_one_step_for_every_strategy() {
    let summaries = vec![FeatureSummary::default(), FeatureSummary::default()];
    let mut strategies: Vec<PlanStrategy> = OrderHeuristic::all()
        .into_iter()
        .map(PlanStrategy::Order)
        .collect();
    for linkage in Linkage::ALL {
        strategies.push(PlanStrategy::Cluster {
            linkage,
            similarity: TokenSimilarity::Cosine,
        });
    }
    let first = build_merge_tree(&summaries, &strategies[0]).expect("plan");
    for strategy in &strategies {
        let tree = build_merge_tree(&summaries, strategy).expect("plan");
        assert_eq!(tree, first, "{strategy} must degenerate to one merge");
    }
}
