//! Generated tracks are valid, deterministic, and score perfectly when
//! matched by the oracle.
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use msalign_bench::{OracleMatcher, SizeTier, generate_track};
use msalign_core::{ExperimentConfig, Partitioner, RunState, Track, run_experiment};

fn assert_valid(track: &Track, label: &str) {
    track
        .validate()
        .unwrap_or_else(|e| panic!("{label}: invalid track: {e}"));
    let n = track.sources.len();
    assert_eq!(
        track.test_cases.len(),
        n * (n - 1) / 2,
        "{label}: every pair of sources is a test case"
    );
    for tc in &track.test_cases {
        let source = track.sources[tc.source].entities();
        let target = track.sources[tc.target].entities();
        for key in tc.reference.keys() {
            assert!(
                source.contains(key.entity_one.as_str()),
                "{label}/{}: {} is not in the source graph",
                tc.name,
                key.entity_one
            );
            assert!(
                target.contains(key.entity_two.as_str()),
                "{label}/{}: {} is not in the target graph",
                tc.name,
                key.entity_two
            );
        }
    }
}

#[test]
fn generated_small_is_valid() {
    for seed in [42, 123, 999, 7777, 54321] {
        let track = generate_track(&SizeTier::Small.config(seed));
        assert_valid(&track, &format!("Small/seed={seed}"));
    }
}

#[test]
fn generated_medium_is_valid() {
    let track = generate_track(&SizeTier::Medium.config(42));
    assert_valid(&track, "Medium/seed=42");
}

#[test]
fn generation_is_deterministic() {
    let a = generate_track(&SizeTier::Small.config(42));
    let b = generate_track(&SizeTier::Small.config(42));
    let json_a = serde_json::to_string(&a).expect("serialize");
    let json_b = serde_json::to_string(&b).expect("serialize");
    assert_eq!(json_a, json_b, "same seed must produce identical output");
}

#[test]
fn different_seeds_differ() {
    let a = generate_track(&SizeTier::Small.config(1));
    let b = generate_track(&SizeTier::Small.config(2));
    assert_ne!(a, b);
}

#[test]
fn every_source_resolves_to_its_own_dataset() {
    let track = generate_track(&SizeTier::Small.config(42));
    let resolver = ExperimentConfig::default().resolver().expect("resolver");
    let partitioner = Partitioner::from_track(&track, resolver).expect("partitioner");
    for (tc, datasets) in track.test_cases.iter().zip(partitioner.test_cases()) {
        assert_eq!(tc.name, datasets.name);
        assert_ne!(datasets.source, datasets.target, "{}", tc.name);
    }
}

#[test]
fn oracle_run_scores_perfectly() {
    let track = generate_track(&SizeTier::Small.config(42));
    let matcher = OracleMatcher::from_track(&track);
    let result = run_experiment(&track, &ExperimentConfig::default(), &matcher).expect("runs");
    assert_eq!(result.outcome.state, RunState::Done);
    assert_eq!(result.outcome.alignment.len(), matcher.reference().len());
    assert!((result.report.micro.precision - 1.0).abs() < 1e-9);
    assert!((result.report.micro.recall - 1.0).abs() < 1e-9);
}

mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn generated_tracks_are_always_valid(seed in 0u64..10000) {
            let track = generate_track(&SizeTier::Small.config(seed));
            assert_valid(&track, &format!("proptest/seed={seed}"));
        }

        #[test]
        fn generated_tracks_round_trip_through_json(seed in 0u64..1000) {
            let track = generate_track(&SizeTier::Small.config(seed));
            let json = serde_json::to_string(&track).expect("serialize");
            let back: Track = serde_json::from_str(&json).expect("deserialize");
            prop_assert_eq!(track, back);
        }

        #[test]
        fn oracle_recall_is_perfect_for_any_seed(seed in 0u64..1000) {
            let track = generate_track(&SizeTier::Small.config(seed));
            let matcher = OracleMatcher::from_track(&track);
            let result = run_experiment(&track, &ExperimentConfig::default(), &matcher)
                .expect("runs");
            prop_assert_eq!(result.report.micro.counts.false_negative, 0);
            prop_assert_eq!(result.report.micro.counts.false_positive, 0);
        }
    }
}
