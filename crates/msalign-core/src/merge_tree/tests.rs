#![allow(clippy::expect_used)]

use super::*;

fn caterpillar(n: usize) -> MergeTree {
    let mut pairs = vec![(0, 1)];
    for i in 2..n {
        pairs.push((n + i - 2, i));
    }
    MergeTree::from_pairs(n, &pairs).expect("caterpillar is valid")
}

fn balanced_four() -> MergeTree {
    MergeTree::from_pairs(4, &[(0, 1), (2, 3), (4, 5)]).expect("balanced tree is valid")
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[test]
fn single_source_tree_has_no_steps() {
    let tree = MergeTree::new(1, Vec::new()).expect("one source, zero steps");
    assert!(tree.is_empty());
    assert_eq!(tree.root(), 0);
    assert_eq!(tree.height(), 1);
    assert!(tree.parallel_levels().is_empty());
}

#[test]
fn zero_sources_is_rejected() {
    assert_eq!(
        MergeTree::new(0, Vec::new()),
        Err(MergeTreeError::NoSources)
    );
}

#[test]
fn wrong_step_count_is_rejected() {
    let err = MergeTree::from_pairs(3, &[(0, 1)]).expect_err("missing a step");
    assert_eq!(
        err,
        MergeTreeError::StepCount {
            source_count: 3,
            expected: 2,
            actual: 1
        }
    );
}

#[test]
fn operand_from_the_future_is_rejected() {
    let err = MergeTree::from_pairs(3, &[(0, 4), (3, 2)]).expect_err("4 is not formed yet");
    assert_eq!(err, MergeTreeError::OperandNotFormed { step: 0, cluster: 4 });
}

#[test]
fn reused_operand_is_rejected() {
    let err = MergeTree::from_pairs(3, &[(0, 1), (0, 2)]).expect_err("0 consumed twice");
    assert_eq!(err, MergeTreeError::OperandReused { step: 1, cluster: 0 });
}

#[test]
fn self_merge_is_rejected() {
    let err = MergeTree::from_pairs(2, &[(1, 1)]).expect_err("self merge");
    assert_eq!(err, MergeTreeError::SelfMerge { step: 0, cluster: 1 });
}

#[test]
fn error_messages_name_the_problem() {
    let err = MergeTree::from_pairs(3, &[(0, 1), (0, 2)]).expect_err("invalid");
    assert!(
        err.to_string().starts_with("malformed merge tree"),
        "unexpected message: {err}"
    );
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

#[test]
fn equality_ignores_operand_order_and_distances() {
    let a = MergeTree::new(
        3,
        vec![
            MergeStep::new(0, 1).with_distance(0.1),
            MergeStep::new(3, 2).with_distance(0.5),
        ],
    )
    .expect("valid");
    let b = MergeTree::new(
        3,
        vec![
            MergeStep::new(1, 0).with_distance(0.1),
            MergeStep::new(2, 3).with_distance(0.9),
        ],
    )
    .expect("valid");
    assert_eq!(a, b);
    assert_eq!(a.fingerprint(), b.fingerprint());
}

#[test]
fn different_shapes_differ() {
    let a = caterpillar(4);
    let b = balanced_four();
    assert_ne!(a, b);
    assert_ne!(a.fingerprint(), b.fingerprint());
}

#[test]
fn fingerprint_is_hex_sha256() {
    let fp = caterpillar(5).fingerprint();
    assert_eq!(fp.len(), 64);
    assert!(fp.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
}

// ---------------------------------------------------------------------------
// Structure
// ---------------------------------------------------------------------------

#[test]
fn members_collects_sources() {
    let tree = balanced_four();
    assert_eq!(tree.members(4), vec![0, 1]);
    assert_eq!(tree.members(5), vec![2, 3]);
    assert_eq!(tree.members(6), vec![0, 1, 2, 3]);
    assert_eq!(tree.members(2), vec![2]);
    assert!(tree.members(7).is_empty());
}

#[test]
fn height_of_caterpillar_and_balanced() {
    assert_eq!(caterpillar(4).height(), 4);
    assert_eq!(balanced_four().height(), 3);
}

#[test]
fn parallel_levels_count_runnable_steps() {
    assert_eq!(balanced_four().parallel_levels(), vec![2, 1]);
    assert_eq!(caterpillar(4).parallel_levels(), vec![1, 1, 1]);
}

#[test]
fn dendrogram_has_two_children_per_merge() {
    let graph = balanced_four().dendrogram();
    assert_eq!(graph.node_count(), 7);
    assert_eq!(graph.edge_count(), 6);
    assert_eq!(graph[NodeIndex::new(6)].cluster, 6);
}

#[test]
fn render_draws_left_before_right() {
    let labels: Vec<String> = ["A", "B", "C"].iter().map(|s| (*s).to_owned()).collect();
    let rendered = caterpillar(3).render(&labels);
    let expected = "[4]\n├── [3]\n│   ├── A\n│   └── B\n└── C\n";
    assert_eq!(rendered, expected);
}

#[test]
fn render_shows_distances_and_falls_back_to_ids() {
    let tree = MergeTree::new(2, vec![MergeStep::new(0, 1).with_distance(0.25)]).expect("valid");
    let rendered = tree.render(&[]);
    assert_eq!(rendered, "[2] d=0.250\n├── 0\n└── 1\n");
}

// ---------------------------------------------------------------------------
// Serialization
// ---------------------------------------------------------------------------

#[test]
fn serializes_as_flat_pairs() {
    let value = serde_json::to_value(caterpillar(3)).expect("serialize");
    assert_eq!(
        value,
        serde_json::json!({"source_count": 3, "steps": [[0, 1], [3, 2]]})
    );
}

#[test]
fn distances_round_trip() {
    let tree = MergeTree::new(
        3,
        vec![
            MergeStep::new(0, 1).with_distance(0.1),
            MergeStep::new(3, 2).with_distance(0.5),
        ],
    )
    .expect("valid");
    let json = serde_json::to_string(&tree).expect("serialize");
    let back: MergeTree = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back.distances(), vec![Some(0.1), Some(0.5)]);
}

#[test]
fn deserialization_rejects_malformed_trees() {
    let bad = r#"{"source_count": 3, "steps": [[0, 1], [0, 2]]}"#;
    let err = serde_json::from_str::<MergeTree>(bad).expect_err("reused operand");
    assert!(err.to_string().contains("malformed merge tree"));

    let misaligned = r#"{"source_count": 2, "steps": [[0, 1]], "distances": [0.1, 0.2]}"#;
    assert!(serde_json::from_str::<MergeTree>(misaligned).is_err());
}
