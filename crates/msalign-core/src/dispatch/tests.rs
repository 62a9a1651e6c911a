#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;

use super::*;
use crate::alignment::Relation;
use crate::test_helpers::{LocalNameMatcher, ex_class, ex_source};

fn sources(labels: &[(&str, usize)]) -> Vec<Arc<SourceGraph>> {
    labels
        .iter()
        .map(|(l, n)| Arc::new(ex_source(l, *n)))
        .collect()
}

fn caterpillar(n: usize) -> MergeTree {
    let mut pairs = vec![(0, 1)];
    for i in 2..n {
        pairs.push((n + i - 2, i));
    }
    MergeTree::from_pairs(n, &pairs).expect("valid")
}

/// Delegates to [`LocalNameMatcher`] and counts calls; fails on call
/// `fail_on` when set.
struct CountingMatcher {
    calls: AtomicUsize,
    fail_on: Option<usize>,
}

impl CountingMatcher {
    fn new(fail_on: Option<usize>) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_on,
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Matcher for CountingMatcher {
    fn match_graphs(
        &self,
        left: &ClusterGraph,
        right: &ClusterGraph,
        input: &Alignment,
        params: &MatcherParams,
    ) -> Result<Alignment, MatcherError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_on == Some(call) {
            return Err(MatcherError::new("matcher crashed"));
        }
        LocalNameMatcher.match_graphs(left, right, input, params)
    }
}

/// Records the operands and input size of every call.
#[derive(Default)]
struct RecordingMatcher {
    seen: Mutex<Vec<(Vec<usize>, Vec<usize>, usize)>>,
}

impl Matcher for RecordingMatcher {
    fn match_graphs(
        &self,
        left: &ClusterGraph,
        right: &ClusterGraph,
        input: &Alignment,
        params: &MatcherParams,
    ) -> Result<Alignment, MatcherError> {
        self.seen.lock().expect("lock").push((
            left.members().to_vec(),
            right.members().to_vec(),
            input.len(),
        ));
        LocalNameMatcher.match_graphs(left, right, input, params)
    }
}

/// Cancels `token` during its first call.
struct CancellingMatcher {
    token: CancellationToken,
}

impl Matcher for CancellingMatcher {
    fn match_graphs(
        &self,
        left: &ClusterGraph,
        right: &ClusterGraph,
        input: &Alignment,
        params: &MatcherParams,
    ) -> Result<Alignment, MatcherError> {
        self.token.cancel();
        LocalNameMatcher.match_graphs(left, right, input, params)
    }
}

// ---------------------------------------------------------------------------
// Successful runs
// ---------------------------------------------------------------------------

#[test]
fn caterpillar_run_accumulates_all_pairs() {
    let srcs = sources(&[("a", 2), ("b", 2), ("c", 2)]);
    let mut dispatcher = Dispatcher::new(&LocalNameMatcher, DispatchConfig::default());
    assert_eq!(dispatcher.state(), RunState::Ready);

    let outcome = dispatcher.run(&caterpillar(3), &srcs).expect("valid tree");
    assert_eq!(outcome.state, RunState::Done);
    assert_eq!(dispatcher.state(), RunState::Done);
    assert!(outcome.failure.is_none());
    assert_eq!(outcome.steps.len(), 2);
    assert!(outcome.steps.iter().all(|s| s.succeeded));
    // a-b after step 0, then {a,b}-c adds a-c and b-c.
    assert_eq!(outcome.alignment.len(), 6);
    assert!(outcome.alignment.contains_cell(
        &ex_class("b", 1),
        &ex_class("c", 1),
        Relation::Equivalence
    ));
    assert_eq!(outcome.steps[1].produced, Some(4));
    assert_eq!(outcome.steps[1].added, 4);
}

#[test]
fn single_source_run_is_immediately_done() {
    let srcs = sources(&[("a", 3)]);
    let tree = MergeTree::new(1, Vec::new()).expect("valid");
    let outcome = Dispatcher::new(&LocalNameMatcher, DispatchConfig::default())
        .run(&tree, &srcs)
        .expect("valid");
    assert!(outcome.is_done());
    assert!(outcome.alignment.is_empty());
    assert!(outcome.steps.is_empty());
}

#[test]
fn keep_step_alignments_retains_raw_output() {
    let srcs = sources(&[("a", 1), ("b", 1), ("c", 1)]);
    let config = DispatchConfig {
        keep_step_alignments: true,
        ..DispatchConfig::default()
    };
    let outcome = Dispatcher::new(&LocalNameMatcher, config)
        .run(&caterpillar(3), &srcs)
        .expect("valid");
    assert_eq!(outcome.step_alignments.len(), 2);
    assert_eq!(outcome.step_alignments[0].len(), 1);
    assert_eq!(outcome.step_alignments[1].len(), 2);
}

// ---------------------------------------------------------------------------
// Failure and cancellation
// ---------------------------------------------------------------------------

#[test]
fn matcher_failure_keeps_partial_alignment() {
    let srcs = sources(&[("a", 2), ("b", 2), ("c", 2)]);
    let matcher = CountingMatcher::new(Some(1));
    let outcome = Dispatcher::new(&matcher, DispatchConfig::default())
        .run(&caterpillar(3), &srcs)
        .expect("valid tree");

    assert_eq!(outcome.state, RunState::Failed);
    assert_eq!(outcome.alignment.len(), 2, "step 0 output survives");
    match &outcome.failure {
        Some(FailureReason::MatcherInvocationFailed { step, error }) => {
            assert_eq!(*step, 1);
            assert_eq!(error.message, "matcher crashed");
        }
        other => panic!("expected matcher failure, got {other:?}"),
    }
    assert_eq!(outcome.steps.len(), 2);
    assert!(!outcome.steps[1].succeeded);
}

#[test]
fn dispatcher_state_follows_each_run() {
    let srcs = sources(&[("a", 1), ("b", 1), ("c", 1)]);
    let matcher = CountingMatcher::new(Some(0));
    let mut dispatcher = Dispatcher::new(&matcher, DispatchConfig::default());

    let failed = dispatcher.run(&caterpillar(3), &srcs).expect("valid tree");
    assert_eq!(failed.state, RunState::Failed);
    assert_eq!(dispatcher.state(), RunState::Failed);

    // A single-source tree has no steps, so the matcher is never consulted.
    let lone = MergeTree::from_pairs(1, &[]).expect("valid");
    let done = dispatcher.run(&lone, &srcs[..1]).expect("valid tree");
    assert_eq!(done.state, RunState::Done);
    assert_eq!(dispatcher.state(), RunState::Done);
}

#[test]
fn failure_stops_later_steps() {
    let srcs = sources(&[("a", 1), ("b", 1), ("c", 1), ("d", 1)]);
    let matcher = CountingMatcher::new(Some(0));
    let outcome = Dispatcher::new(&matcher, DispatchConfig::default())
        .run(&caterpillar(4), &srcs)
        .expect("valid tree");
    assert_eq!(matcher.calls(), 1, "no step may start after a failure");
    assert!(outcome.alignment.is_empty());
    assert_eq!(
        outcome.failure.as_ref().map(FailureReason::code),
        Some("matcher_invocation_failed")
    );
}

#[test]
fn cancellation_between_steps() {
    let srcs = sources(&[("a", 1), ("b", 1), ("c", 1)]);
    let token = CancellationToken::new();
    let matcher = CancellingMatcher {
        token: token.clone(),
    };
    let outcome = Dispatcher::new(&matcher, DispatchConfig::default())
        .with_cancellation(token)
        .run(&caterpillar(3), &srcs)
        .expect("valid tree");

    assert_eq!(outcome.state, RunState::Failed);
    assert_eq!(
        outcome.failure,
        Some(FailureReason::Cancelled { before_step: 1 })
    );
    assert_eq!(outcome.alignment.len(), 1, "in-flight step completes");
    assert_eq!(outcome.steps.len(), 1);
}

#[test]
fn pre_cancelled_run_never_calls_matcher() {
    let srcs = sources(&[("a", 1), ("b", 1)]);
    let matcher = CountingMatcher::new(None);
    let token = CancellationToken::new();
    token.cancel();
    let outcome = Dispatcher::new(&matcher, DispatchConfig::default())
        .with_cancellation(token)
        .run(&caterpillar(2), &srcs)
        .expect("valid tree");
    assert_eq!(matcher.calls(), 0);
    assert_eq!(
        outcome.failure.as_ref().map(FailureReason::code),
        Some("cancelled")
    );
}

#[test]
fn malformed_steps_fail_before_any_call() {
    let srcs = sources(&[("a", 1), ("b", 1), ("c", 1)]);
    let matcher = CountingMatcher::new(None);
    let steps = [MergeStep::new(0, 1), MergeStep::new(0, 2)];
    let err = Dispatcher::new(&matcher, DispatchConfig::default())
        .run_steps(&steps, &srcs)
        .expect_err("reused operand");
    assert!(matches!(err, DispatchError::MalformedMergeTree(_)));
    assert_eq!(matcher.calls(), 0);
}

#[test]
fn source_count_mismatch_is_rejected() {
    let srcs = sources(&[("a", 1), ("b", 1)]);
    let err = Dispatcher::new(&LocalNameMatcher, DispatchConfig::default())
        .run(&caterpillar(3), &srcs)
        .expect_err("three-source tree, two sources");
    assert_eq!(
        err,
        DispatchError::SourceCountMismatch {
            tree: 3,
            supplied: 2
        }
    );
}

// ---------------------------------------------------------------------------
// Pairwise runs
// ---------------------------------------------------------------------------

#[test]
fn pairs_are_matched_without_merging() {
    let srcs = sources(&[("a", 2), ("b", 2), ("c", 2)]);
    let matcher = CountingMatcher::new(None);
    let config = DispatchConfig {
        input_alignment: InputAlignmentMode::Full,
        ..DispatchConfig::default()
    };
    let outcome = Dispatcher::new(&matcher, config)
        .run_pairs(&[(0, 1), (1, 2)], &srcs)
        .expect("valid pairs");

    assert_eq!(outcome.state, RunState::Done);
    assert_eq!(matcher.calls(), 2);
    // b-c never sees a-b, and a-c is never asked for.
    assert!(outcome.steps.iter().all(|s| s.input_size == 0));
    assert!(outcome.steps.iter().all(|s| s.produced.is_none()));
    assert_eq!((outcome.steps[1].source, outcome.steps[1].target), (1, 2));
    assert_eq!(outcome.alignment.len(), 4);
    assert!(!outcome.alignment.contains_cell(
        &ex_class("a", 0),
        &ex_class("c", 0),
        Relation::Equivalence
    ));
}

#[test]
fn bad_pairs_fail_before_any_call() {
    let srcs = sources(&[("a", 1), ("b", 1)]);
    let matcher = CountingMatcher::new(None);
    for pairs in [vec![(0, 1), (1, 1)], vec![(0, 2)]] {
        let err = Dispatcher::new(&matcher, DispatchConfig::default())
            .run_pairs(&pairs, &srcs)
            .expect_err("invalid pair");
        assert!(matches!(err, DispatchError::InvalidPair { sources: 2, .. }), "{err}");
    }
    assert_eq!(matcher.calls(), 0);
}

#[test]
fn failing_pair_stops_the_run() {
    let srcs = sources(&[("a", 1), ("b", 1), ("c", 1)]);
    let matcher = CountingMatcher::new(Some(1));
    let mut dispatcher = Dispatcher::new(&matcher, DispatchConfig::default());
    let outcome = dispatcher
        .run_pairs(&[(0, 1), (0, 2), (1, 2)], &srcs)
        .expect("valid pairs");

    assert_eq!(dispatcher.state(), RunState::Failed);
    assert_eq!(matcher.calls(), 2);
    assert_eq!(outcome.alignment.len(), 1, "only a-b survives");
    assert_eq!(
        outcome.failure,
        Some(FailureReason::MatcherInvocationFailed {
            step: 1,
            error: MatcherError::new("matcher crashed"),
        })
    );
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

fn input_sizes(mode: InputAlignmentMode) -> Vec<usize> {
    let srcs = sources(&[("a", 2), ("b", 2), ("c", 2), ("d", 2)]);
    let tree = MergeTree::from_pairs(4, &[(0, 1), (2, 3), (4, 5)]).expect("valid");
    let matcher = RecordingMatcher::default();
    let config = DispatchConfig {
        input_alignment: mode,
        ..DispatchConfig::default()
    };
    Dispatcher::new(&matcher, config)
        .run(&tree, &srcs)
        .expect("valid");
    let seen = matcher.seen.lock().expect("lock");
    seen.iter().map(|(_, _, n)| *n).collect()
}

#[test]
fn input_alignment_modes() {
    assert_eq!(input_sizes(InputAlignmentMode::None), vec![0, 0, 0]);
    assert_eq!(input_sizes(InputAlignmentMode::Full), vec![0, 2, 4]);
    assert_eq!(
        input_sizes(InputAlignmentMode::Restricted),
        vec![0, 0, 4],
        "a-b links do not touch c or d"
    );
}

#[test]
fn larger_cluster_becomes_target() {
    let srcs = sources(&[("big", 3), ("small", 1)]);
    let matcher = RecordingMatcher::default();
    let config = DispatchConfig {
        orientation: StepOrientation::LargerAsTarget,
        ..DispatchConfig::default()
    };
    let outcome = Dispatcher::new(&matcher, config)
        .run(&caterpillar(2), &srcs)
        .expect("valid");
    assert_eq!(outcome.steps[0].source, 1);
    assert_eq!(outcome.steps[0].target, 0);
    assert!(outcome.alignment.contains_cell(
        &ex_class("small", 0),
        &ex_class("big", 0),
        Relation::Equivalence
    ));
    let seen = matcher.seen.lock().expect("lock");
    assert_eq!(seen[0].0, vec![1]);
}

#[test]
fn params_reach_the_matcher() {
    struct ParamCheck;
    impl Matcher for ParamCheck {
        fn match_graphs(
            &self,
            _left: &ClusterGraph,
            _right: &ClusterGraph,
            _input: &Alignment,
            params: &MatcherParams,
        ) -> Result<Alignment, MatcherError> {
            if params.get("threshold").is_some_and(serde_json::Value::is_number) {
                Ok(Alignment::new())
            } else {
                Err(MatcherError::new("threshold missing"))
            }
        }
    }
    let mut config = DispatchConfig::default();
    config
        .params
        .insert("threshold".to_owned(), serde_json::json!(0.8));
    let outcome = Dispatcher::new(&ParamCheck, config)
        .run(&caterpillar(2), &sources(&[("a", 1), ("b", 1)]))
        .expect("valid");
    assert!(outcome.is_done());
}

#[test]
fn config_defaults_from_partial_json() {
    let config: DispatchConfig =
        serde_json::from_str(r#"{"input_alignment": "full"}"#).expect("parse");
    assert_eq!(config.input_alignment, InputAlignmentMode::Full);
    assert_eq!(config.orientation, StepOrientation::AsPlanned);
    assert!(config.params.is_empty());
}

// ---------------------------------------------------------------------------
// Concurrent runs
// ---------------------------------------------------------------------------

#[test]
fn dispatch_many_runs_independent_trees() {
    let srcs = sources(&[("a", 2), ("b", 2), ("c", 2), ("d", 2)]);
    let trees = vec![
        caterpillar(4),
        MergeTree::from_pairs(4, &[(0, 1), (2, 3), (4, 5)]).expect("valid"),
        MergeTree::from_pairs(4, &[(3, 2), (4, 1), (5, 0)]).expect("valid"),
    ];
    let results = dispatch_many(&LocalNameMatcher, &trees, &srcs, &DispatchConfig::default());
    assert_eq!(results.len(), 3);
    for result in &results {
        let outcome = result.as_ref().expect("valid tree");
        assert!(outcome.is_done());
        assert_eq!(outcome.alignment.len(), 12, "6 pairs x 2 classes");
    }
}

#[test]
fn dispatch_pairs_many_keeps_plan_order() {
    let srcs = sources(&[("a", 2), ("b", 2), ("c", 2)]);
    let plans = vec![vec![(0, 1), (0, 2), (1, 2)], vec![(2, 0)], Vec::new()];
    let results =
        dispatch_pairs_many(&LocalNameMatcher, &plans, &srcs, &DispatchConfig::default());
    let sizes: Vec<usize> = results
        .iter()
        .map(|r| r.as_ref().expect("valid pairs").alignment.len())
        .collect();
    assert_eq!(sizes, vec![6, 2, 0]);
}
