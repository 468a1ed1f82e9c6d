//! QA tests for the group sanity check sequencer.
//!
//! Run with: `cargo test -p keeper-core --test qa_group_sanity`

use keeper_core::investigator::{Insanity, PendingCheck, Stat};
use keeper_core::rules::Signal;
use keeper_core::sequencer::{PauseReason, SequencerError};
use keeper_core::testing::{assert_pending, TrackerHarness};
use keeper_core::TrackerError;

// =============================================================================
// TEST 1: Input collection
// =============================================================================

#[test]
fn test_start_rejected_until_every_roll_is_in() {
    let mut harness = TrackerHarness::with_investigators(3);
    harness.tracker.open_group_check().unwrap();
    harness.tracker.set_group_losses("1", "1D6").unwrap();
    harness.tracker.set_group_roll(harness.id(0), 30).unwrap();

    let err = harness.tracker.start_group_check().unwrap_err();
    match err {
        TrackerError::Group(SequencerError::MissingRolls(names)) => {
            assert_eq!(names, vec!["Investigator 2", "Investigator 3"]);
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(harness.tracker.group_turn().is_none());

    harness.tracker.set_group_roll(harness.id(1), 40).unwrap();
    harness.tracker.set_group_roll(harness.id(2), 50).unwrap();
    assert!(harness.tracker.start_group_check().is_ok());
}

#[test]
fn test_start_rejected_without_loss_expressions() {
    let mut harness = TrackerHarness::with_investigators(1);
    harness.tracker.open_group_check().unwrap();
    harness.tracker.set_group_roll(harness.id(0), 30).unwrap();
    assert!(matches!(
        harness.tracker.start_group_check(),
        Err(TrackerError::Group(SequencerError::MissingLossExpressions))
    ));
}

#[test]
fn test_start_rejected_with_nobody_alive() {
    let mut harness = TrackerHarness::with_investigators(1);
    harness.lose_health(0, 10);
    harness.tracker.open_group_check().unwrap();
    harness.tracker.set_group_losses("0", "1D4").unwrap();
    assert!(matches!(
        harness.tracker.start_group_check(),
        Err(TrackerError::Group(SequencerError::NoLivingInvestigators))
    ));
}

#[test]
fn test_dead_are_not_asked_to_roll() {
    let mut harness = TrackerHarness::with_investigators(3);
    harness.lose_health(1, 10);
    harness.start_group("0", "1D4", 20);
    harness.group_loss(0);
    let turn = harness.tracker.group_turn().unwrap();
    assert_eq!(turn.investigator, harness.id(2), "Dead investigator skipped");
    assert_eq!(turn.total, 2);
}

// =============================================================================
// TEST 2: Running through the group
// =============================================================================

#[test]
fn test_turn_reports_success_and_label() {
    let mut harness = TrackerHarness::with_investigators(2);
    harness.tracker.open_group_check().unwrap();
    harness.tracker.set_group_losses("0", "1D6").unwrap();
    harness.tracker.set_group_roll(harness.id(0), 50).unwrap();
    harness.tracker.set_group_roll(harness.id(1), 51).unwrap();

    let outcome = harness.tracker.start_group_check().unwrap();
    assert!(matches!(
        &outcome.signals[0],
        Signal::GroupCheckTurn { succeeded: true, loss, .. } if loss == "0"
    ));

    let outcome = harness.group_loss(0);
    assert!(matches!(
        &outcome.signals[0],
        Signal::GroupCheckTurn { succeeded: false, loss, .. } if loss == "1D6"
    ));
}

#[test]
fn test_full_run_without_pauses() {
    let mut harness = TrackerHarness::with_investigators(3);
    harness.start_group("0", "1D4", 99);
    harness.group_loss(2);
    harness.group_loss(3);
    let outcome = harness.group_loss(1);

    assert!(outcome.signals.contains(&Signal::GroupCheckComplete));
    assert!(harness.tracker.group().is_idle());
    assert_eq!(harness.investigator(0).sanity.current, 48);
    assert_eq!(harness.investigator(1).sanity.current, 47);
    assert_eq!(harness.investigator(2).sanity.current, 49);
    harness.assert_invariants();
}

#[test]
fn test_negative_loss_rejected() {
    let mut harness = TrackerHarness::with_investigators(1);
    harness.start_group("0", "1", 10);
    assert!(matches!(
        harness.tracker.confirm_group_loss(-1),
        Err(TrackerError::Group(SequencerError::NegativeLoss(-1)))
    ));
    assert_eq!(harness.tracker.group_turn().unwrap().investigator, harness.id(0));
}

// =============================================================================
// TEST 3: Pausing on follow-up checks
// =============================================================================

#[test]
fn test_pause_on_second_investigator_resumes_at_third() {
    let mut harness = TrackerHarness::with_investigators(3);
    harness.start_group("1", "1D10", 90);

    harness.group_loss(1);
    let outcome = harness.group_loss(6);
    assert!(outcome.signals.iter().any(|s| matches!(
        s,
        Signal::GroupCheckPaused {
            reason: PauseReason::Check(PendingCheck::TemporaryInsanity),
            ..
        }
    )));
    let pause = harness.tracker.group().pause().unwrap();
    assert_eq!(pause.investigator, harness.id(1));
    assert_eq!(harness.investigator(1).sanity.current, 44, "Loss committed");

    // Still pending: resuming is refused and nothing moves
    assert!(matches!(
        harness.tracker.resume_group_check(),
        Err(TrackerError::Group(SequencerError::CheckStillPending { .. }))
    ));
    assert!(matches!(
        harness.tracker.confirm_group_loss(1),
        Err(TrackerError::Group(SequencerError::NotRunning))
    ));

    harness
        .tracker
        .resolve_temporary_insanity(harness.id(1), false)
        .unwrap();
    let outcome = harness.tracker.resume_group_check().unwrap();
    assert!(matches!(&outcome.signals[0], Signal::GroupCheckTurn { name, .. } if name == "Investigator 3"));

    let turn = harness.tracker.group_turn().unwrap();
    assert_eq!(turn.investigator, harness.id(2));
    assert_eq!(harness.investigator(1).sanity.current, 44, "Not re-processed");

    harness.group_loss(1);
    assert!(harness.tracker.group().is_idle());
}

#[test]
fn test_pause_when_temporary_check_already_open() {
    let mut harness = TrackerHarness::with_investigators(2);
    harness.set(0, Stat::Sanity, 90);
    harness.lose_sanity(0, 6);
    assert_pending(harness.investigator(0), &[PendingCheck::TemporaryInsanity]);

    harness.start_group("0", "1D10", 99);
    let outcome = harness.group_loss(6);
    assert!(outcome.signals.iter().any(|s| matches!(
        s,
        Signal::GroupCheckPaused {
            reason: PauseReason::Check(PendingCheck::TemporaryInsanity),
            ..
        }
    )));
    let pause = harness.tracker.group().pause().unwrap();
    assert_eq!(pause.investigator, harness.id(0));
    assert!(harness.tracker.group_turn().is_none(), "Run must not move on");

    assert!(matches!(
        harness.tracker.resume_group_check(),
        Err(TrackerError::Group(SequencerError::CheckStillPending { .. }))
    ));
    harness
        .tracker
        .resolve_temporary_insanity(harness.id(0), false)
        .unwrap();
    harness.tracker.resume_group_check().unwrap();
    assert_eq!(
        harness.tracker.group_turn().unwrap().investigator,
        harness.id(1)
    );
}

#[test]
fn test_pause_on_indefinite_insanity() {
    let mut harness = TrackerHarness::with_investigators(1);
    harness.lose_sanity(0, 4);
    harness.start_group("1", "1D8", 95);
    harness.group_loss(7);

    let pause = harness.tracker.group().pause().unwrap();
    assert_eq!(
        pause.reason,
        PauseReason::Check(PendingCheck::IndefiniteInsanity)
    );

    harness
        .tracker
        .confirm_indefinite_insanity(harness.id(0))
        .unwrap();
    let outcome = harness.tracker.resume_group_check().unwrap();
    assert_eq!(outcome.signals, vec![Signal::GroupCheckComplete]);
}

#[test]
fn test_latent_episode_pauses_and_resumes_freely() {
    let mut harness = TrackerHarness::with_investigators(2);
    let first = harness.id(0);
    {
        let tracker = &mut harness.tracker;
        tracker.set_stat(first, Stat::Sanity, 45).unwrap();
        tracker.resolve_temporary_insanity(first, true).unwrap();
        tracker.request_recovery(first).unwrap();
        tracker.confirm_recovery(first, true).unwrap();
    }
    assert_eq!(
        harness.investigator(0).condition.insanity,
        Some(Insanity::Latent)
    );

    harness.start_group("0", "1D3", 100);
    let outcome = harness.group_loss(2);
    assert_eq!(outcome.episodes().count(), 1);
    assert_eq!(
        harness.tracker.group().pause().unwrap().reason,
        PauseReason::Episode
    );

    harness.tracker.resume_group_check().unwrap();
    assert_eq!(
        harness.tracker.group_turn().unwrap().investigator,
        harness.id(1)
    );
}

#[test]
fn test_zero_loss_never_pauses() {
    let mut harness = TrackerHarness::with_investigators(2);
    harness.start_group("0", "0", 1);
    harness.group_loss(0);
    let outcome = harness.group_loss(0);
    assert_eq!(outcome.signals, vec![Signal::GroupCheckComplete]);
}

// =============================================================================
// TEST 4: Cancelling
// =============================================================================

#[test]
fn test_cancel_keeps_committed_losses() {
    let mut harness = TrackerHarness::with_investigators(3);
    harness.start_group("1", "1D4", 99);
    harness.group_loss(3);

    let outcome = harness.tracker.cancel_group_check();
    assert_eq!(outcome.signals, vec![Signal::GroupCheckCancelled]);
    assert!(harness.tracker.group().is_idle());
    assert_eq!(harness.investigator(0).sanity.current, 47);
    assert_eq!(harness.investigator(1).sanity.current, 50);
}

#[test]
fn test_cancel_while_collecting_mutates_nothing() {
    let mut harness = TrackerHarness::with_investigators(2);
    let before: Vec<_> = harness.tracker.investigators().to_vec();
    harness.tracker.open_group_check().unwrap();
    harness.tracker.set_group_roll(harness.id(0), 12).unwrap();
    harness.tracker.cancel_group_check();
    assert_eq!(harness.tracker.investigators(), before.as_slice());
}
