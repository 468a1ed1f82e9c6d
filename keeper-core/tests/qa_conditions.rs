//! QA tests for health and sanity conditions through the tracker.
//!
//! Run with: `cargo test -p keeper-core --test qa_conditions`

use keeper_core::investigator::{Characteristic, Insanity, PendingCheck, Stat, Vitality};
use keeper_core::rules::{Signal, StatusKind};
use keeper_core::testing::{assert_invariants, assert_pending, investigator_with, TrackerHarness};

// =============================================================================
// TEST 1: Instant death
// =============================================================================

#[test]
fn test_full_health_in_one_blow_kills() {
    let mut harness = TrackerHarness::with_investigators(1);
    assert_eq!(harness.investigator(0).health.maximum, 10);

    harness.lose_health(0, 10);

    let inv = harness.investigator(0);
    assert!(inv.is_dead(), "A 10 HP blow should kill at max HP 10");
    assert!(inv.condition.is_unconscious(), "Dead implies unconscious");
    assert!(inv.pending.is_empty(), "Death clears pending checks");
    assert!(harness.saw(|s| matches!(s, Signal::InstantDeath { .. })));
    harness.assert_invariants();
}

#[test]
fn test_overkill_is_clamped_and_kills() {
    let mut harness = TrackerHarness::with_investigators(1);
    harness.set(0, Stat::Health, -40);
    let inv = harness.investigator(0);
    assert_eq!(inv.health.current, 0);
    assert!(inv.is_dead());
}

// =============================================================================
// TEST 2: Major wound
// =============================================================================

#[test]
fn test_exactly_half_is_major_wound() {
    let mut harness = TrackerHarness::with_investigators(1);
    harness.lose_health(0, 5);

    let inv = harness.investigator(0);
    assert!(inv.condition.major_wound);
    assert_eq!(inv.health.current, 5);
    assert_pending(inv, &[PendingCheck::MajorWound]);
    assert!(harness.tracker.is_blocked(inv.id));
}

#[test]
fn test_second_big_hit_does_not_rewound() {
    let mut harness = TrackerHarness::with_investigators(1);
    let id = harness.id(0);
    harness.lose_health(0, 5);
    harness.tracker.resolve_major_wound(id, true).unwrap();

    harness.set(0, Stat::Health, 10);
    harness.lose_health(0, 5);

    let inv = harness.investigator(0);
    assert!(inv.condition.major_wound);
    assert!(inv.pending.is_empty(), "Wound already set; no new test");
}

#[test]
fn test_wounded_investigator_dying_then_stabilized() {
    let mut harness = TrackerHarness::with_investigators(1);
    let id = harness.id(0);

    harness.lose_health(0, 6);
    harness.tracker.resolve_major_wound(id, false).unwrap();
    assert_eq!(harness.investigator(0).condition.vitality, Vitality::Unconscious);

    harness.lose_health(0, 4);
    let inv = harness.investigator(0);
    assert_eq!(inv.condition.vitality, Vitality::Dying);
    assert_pending(inv, &[PendingCheck::Dying]);

    harness.tracker.stabilize(id).unwrap();
    let inv = harness.investigator(0);
    assert_eq!(inv.condition.vitality, Vitality::Stabilized);
    assert_eq!(inv.health.current, 1);
    assert!(inv.pending.is_empty());

    harness.tracker.destabilize(id).unwrap();
    let inv = harness.investigator(0);
    assert_eq!(inv.condition.vitality, Vitality::Dying);
    assert_eq!(inv.health.current, 0);

    harness.tracker.resolve_dying(id, false).unwrap();
    let inv = harness.investigator(0);
    assert!(inv.is_dead());
    assert!(inv.condition.major_wound, "Major wound survives death");
    harness.assert_invariants();
}

#[test]
fn test_zero_health_without_wound_only_knocks_out() {
    let mut harness = TrackerHarness::with_investigators(1);
    harness.lose_health(0, 4);
    harness.lose_health(0, 4);
    harness.lose_health(0, 2);

    let inv = harness.investigator(0);
    assert_eq!(inv.condition.vitality, Vitality::Unconscious);
    assert!(!inv.condition.major_wound);
    assert!(inv.pending.is_empty());
}

// =============================================================================
// TEST 3: Sanity thresholds
// =============================================================================

#[test]
fn test_loss_of_six_raises_temporary_check() {
    let mut harness = TrackerHarness::with_investigators(1);
    harness.lose_sanity(0, 6);

    let inv = harness.investigator(0);
    assert_pending(inv, &[PendingCheck::TemporaryInsanity]);
    assert_eq!(inv.session_sanity_lost, 6);
}

#[test]
fn test_cumulative_loss_raises_indefinite_check() {
    let mut harness = TrackerHarness::with_investigators(1);
    harness.lose_sanity(0, 4);
    harness.lose_sanity(0, 4);
    assert!(harness.investigator(0).pending.is_empty());

    // 8 lost so far and sanity is 42: the threshold is now floor(42/5) = 8
    harness.lose_sanity(0, 2);
    let inv = harness.investigator(0);
    assert_pending(inv, &[PendingCheck::IndefiniteInsanity]);
    assert_eq!(inv.session_sanity_lost, 10);
    assert!(harness.saw(|s| matches!(
        s,
        Signal::IndefiniteInsanity {
            session_loss: 10,
            threshold: 8,
            ..
        }
    )));
}

#[test]
fn test_indefinite_confirmation_rolls_episode() {
    let mut harness = TrackerHarness::with_investigators(1);
    let id = harness.id(0);
    harness.lose_sanity(0, 12);
    assert_pending(harness.investigator(0), &[PendingCheck::IndefiniteInsanity]);

    let outcome = harness.tracker.confirm_indefinite_insanity(id).unwrap();
    assert_eq!(outcome.episodes().count(), 1);
    let inv = harness.investigator(0);
    assert_eq!(inv.condition.insanity, Some(Insanity::Indefinite));
    assert!(inv.pending.is_empty());

    harness.lose_sanity(0, 10);
    assert!(
        harness.investigator(0).pending.is_empty(),
        "Already indefinitely insane"
    );
}

#[test]
fn test_temporary_insanity_then_recovery() {
    let mut harness = TrackerHarness::with_investigators(1);
    let id = harness.id(0);
    harness.lose_sanity(0, 5);

    let outcome = harness.tracker.resolve_temporary_insanity(id, true).unwrap();
    assert_eq!(outcome.episodes().count(), 1);
    assert_eq!(
        harness.investigator(0).condition.insanity,
        Some(Insanity::Temporary)
    );

    harness
        .tracker
        .clear_status(id, StatusKind::TemporaryInsanity)
        .unwrap();
    assert_eq!(
        harness.investigator(0).condition.insanity,
        Some(Insanity::Temporary),
        "Recovery waits for confirmation"
    );

    harness.tracker.confirm_recovery(id, true).unwrap();
    assert_eq!(
        harness.investigator(0).condition.insanity,
        Some(Insanity::Latent)
    );

    let outcome = harness.lose_sanity(0, 1);
    assert_eq!(outcome.episodes().count(), 1, "Latent insanity relapses");
    assert!(harness.investigator(0).pending.is_empty());
    harness.assert_invariants();
}

#[test]
fn test_failed_temporary_test_keeps_sanity() {
    let mut harness = TrackerHarness::with_investigators(1);
    let id = harness.id(0);
    harness.lose_sanity(0, 7);

    let outcome = harness
        .tracker
        .resolve_temporary_insanity(id, false)
        .unwrap();
    assert_eq!(outcome.episodes().count(), 0);
    let inv = harness.investigator(0);
    assert_eq!(inv.condition.insanity, None);
    assert!(inv.pending.is_empty());
}

#[test]
fn test_resolving_absent_check_changes_nothing() {
    let mut harness = TrackerHarness::with_investigators(1);
    let id = harness.id(0);
    let before = harness.investigator(0).clone();

    assert!(harness.tracker.confirm_indefinite_insanity(id).is_err());
    assert!(harness.tracker.resolve_dying(id, true).is_err());
    assert_eq!(harness.investigator(0), &before);
}

// =============================================================================
// TEST 4: Derived maxima
// =============================================================================

#[test]
fn test_constitution_and_mythos_edits() {
    let mut harness = TrackerHarness::with_investigators(0);
    let index = harness.add(investigator_with("Amanda Sharpe", 40, 65, 60));
    assert_eq!(harness.investigator(index).health.maximum, 10);

    harness.edit(index, Stat::Characteristic(Characteristic::Constitution), "+20");
    assert_eq!(harness.investigator(index).health.maximum, 12);
    assert_eq!(harness.investigator(index).health.current, 10);

    harness.edit(index, Stat::Characteristic(Characteristic::Mythos), "50");
    let inv = harness.investigator(index);
    assert_eq!(inv.sanity.maximum, 49);
    assert_eq!(inv.sanity.current, 49);
    assert!(inv.pending.is_empty(), "Characteristic edits carry no rules");
}

#[test]
fn test_huge_constitution_does_not_overflow() {
    let mut harness = TrackerHarness::with_investigators(1);
    harness.edit(0, Stat::Characteristic(Characteristic::Constitution), "2147483647");

    let inv = harness.investigator(0);
    assert_eq!(inv.characteristics.constitution, i32::MAX);
    assert_eq!(inv.health.maximum, i32::MAX / 10);
    assert_eq!(inv.health.current, 10);

    // Exactly half of a huge maximum is still a major wound
    harness.set(0, Stat::Health, 214_748_364);
    harness.lose_health(0, 107_374_182);
    let inv = harness.investigator(0);
    assert!(inv.condition.major_wound);
    assert!(inv.is_alive());
    harness.assert_invariants();
}

// =============================================================================
// TEST 5: Session boundaries
// =============================================================================

#[test]
fn test_losses_outside_session_only_clamp() {
    let mut harness = TrackerHarness::with_investigators(1);
    harness.tracker.end_session();

    harness.lose_health(0, 10);
    harness.lose_sanity(0, 30);
    let inv = harness.investigator(0);
    assert_eq!(inv.health.current, 0);
    assert_eq!(inv.sanity.current, 20);
    assert!(!inv.is_dead());
    assert!(inv.pending.is_empty());
    assert_eq!(inv.session_sanity_lost, 0);
    assert_invariants(inv);
}

#[test]
fn test_new_session_resets_session_loss() {
    let mut harness = TrackerHarness::with_investigators(1);
    harness.lose_sanity(0, 3);
    harness.tracker.end_session();
    harness.tracker.start_session();
    assert_eq!(harness.investigator(0).session_sanity_lost, 0);
}
