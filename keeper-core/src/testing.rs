//! Testing utilities for the tracker.
//!
//! This module provides tools for integration testing:
//! - `TrackerHarness` for scripted table scenarios addressed by roster index
//! - `investigator_with` for building investigators from key characteristics
//! - Assertion helpers for verifying condition invariants

use crate::config::RulesConfig;
use crate::investigator::{
    Characteristics, Insanity, Investigator, InvestigatorId, PendingCheck, Stat, Vitality,
};
use crate::rules::Signal;
use crate::skills::SKILL_RANGE;
use crate::tracker::{Outcome, Tracker, TrackerError};

/// Build an investigator with the given CON, SIZ and POW.
pub fn investigator_with(name: &str, constitution: i32, size: i32, power: i32) -> Investigator {
    let characteristics = Characteristics {
        constitution,
        size,
        power,
        ..Characteristics::default()
    };
    Investigator::with_characteristics(name, format!("{}'s player", name), characteristics)
}

/// A tracker with an active session, driven by roster index.
pub struct TrackerHarness {
    pub tracker: Tracker,
    /// Every signal produced so far, in order.
    pub signals: Vec<Signal>,
}

impl TrackerHarness {
    /// Five default investigators and an active session.
    pub fn new() -> Self {
        Self::with_investigators(RulesConfig::default().default_roster_size)
    }

    /// `count` default investigators and an active session.
    pub fn with_investigators(count: usize) -> Self {
        let rules = RulesConfig::default().with_default_roster_size(count);
        let mut tracker = Tracker::with_default_roster(rules);
        let outcome = tracker.start_session();
        Self {
            tracker,
            signals: outcome.signals,
        }
    }

    /// Add a custom investigator, returning its roster index.
    pub fn add(&mut self, investigator: Investigator) -> usize {
        self.tracker.insert(investigator);
        self.tracker.investigators().len() - 1
    }

    pub fn id(&self, index: usize) -> InvestigatorId {
        self.tracker
            .id_at(index)
            .unwrap_or_else(|| panic!("no investigator at index {}", index))
    }

    pub fn investigator(&self, index: usize) -> &Investigator {
        &self.tracker.investigators()[index]
    }

    fn record(&mut self, result: Result<Outcome, TrackerError>) -> Outcome {
        let outcome = result.unwrap_or_else(|e| panic!("tracker call failed: {}", e));
        self.signals.extend(outcome.signals.iter().cloned());
        outcome
    }

    /// Edit a stat with raw modifier input.
    pub fn edit(&mut self, index: usize, stat: Stat, input: &str) -> Outcome {
        let id = self.id(index);
        let result = self.tracker.edit_stat(id, stat, input);
        self.record(result)
    }

    /// Store an absolute value.
    pub fn set(&mut self, index: usize, stat: Stat, value: i32) -> Outcome {
        let id = self.id(index);
        let result = self.tracker.set_stat(id, stat, value);
        self.record(result)
    }

    pub fn lose_health(&mut self, index: usize, amount: i32) -> Outcome {
        self.edit(index, Stat::Health, &format!("-{}", amount))
    }

    pub fn lose_sanity(&mut self, index: usize, amount: i32) -> Outcome {
        self.edit(index, Stat::Sanity, &format!("-{}", amount))
    }

    /// Run a group check where every living investigator rolls `roll`.
    pub fn start_group(&mut self, success: &str, failure: &str, roll: u32) -> Outcome {
        self.tracker
            .open_group_check()
            .unwrap_or_else(|e| panic!("open failed: {}", e));
        self.tracker
            .set_group_losses(success, failure)
            .unwrap_or_else(|e| panic!("losses failed: {}", e));
        for (id, _) in self.tracker.living() {
            self.tracker
                .set_group_roll(id, roll)
                .unwrap_or_else(|e| panic!("roll failed: {}", e));
        }
        let result = self.tracker.start_group_check();
        self.record(result)
    }

    pub fn group_loss(&mut self, loss: i32) -> Outcome {
        let result = self.tracker.confirm_group_loss(loss);
        self.record(result)
    }

    /// Whether any signal so far matches.
    pub fn saw(&self, predicate: impl Fn(&Signal) -> bool) -> bool {
        self.signals.iter().any(predicate)
    }

    /// Check the condition invariants on every investigator.
    pub fn assert_invariants(&self) {
        for investigator in self.tracker.investigators() {
            assert_invariants(investigator);
        }
    }
}

impl Default for TrackerHarness {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Assert the condition invariants that types alone cannot express.
pub fn assert_invariants(investigator: &Investigator) {
    let name = &investigator.name;
    let condition = &investigator.condition;

    if condition.is_dead() {
        assert!(condition.is_unconscious(), "{} is dead but awake", name);
        assert_eq!(condition.insanity, None, "{} is dead but insane", name);
        assert!(
            investigator.pending.is_empty(),
            "{} is dead with pending checks",
            name
        );
    }
    if investigator.pending.contains(PendingCheck::Dying) {
        assert_eq!(
            condition.vitality,
            Vitality::Dying,
            "{} has a dying check but is not dying",
            name
        );
    }
    if investigator.pending.contains(PendingCheck::LatentInsanity) {
        assert_eq!(
            condition.insanity,
            Some(Insanity::Temporary),
            "{} is recovering without temporary insanity",
            name
        );
    }
    assert!(
        (0..=investigator.health.maximum).contains(&investigator.health.current),
        "{} has HP {} outside 0..={}",
        name,
        investigator.health.current,
        investigator.health.maximum
    );
    assert!(
        (0..=investigator.sanity.maximum).contains(&investigator.sanity.current),
        "{} has SAN {} outside 0..={}",
        name,
        investigator.sanity.current,
        investigator.sanity.maximum
    );
    for (skill, value) in &investigator.skills {
        assert!(
            SKILL_RANGE.contains(value),
            "{} has {} at {}",
            name,
            skill,
            value
        );
    }
}

/// Assert an investigator has exactly these pending checks.
pub fn assert_pending(investigator: &Investigator, expected: &[PendingCheck]) {
    let actual: Vec<PendingCheck> = investigator.pending.iter().collect();
    let mut expected = expected.to_vec();
    expected.sort();
    assert_eq!(
        actual, expected,
        "{} has pending checks {:?}, expected {:?}",
        investigator.name, actual, expected
    );
}
