//! Pending-check resolution and manual status changes.
//!
//! Each resolver clears exactly one pending check and applies its
//! deterministic consequence. Resolving a check that is not pending, or
//! touching a dead investigator, is rejected and leaves the snapshot as-is.
//!
//! # Pass and fail are not symmetric
//!
//! For the major-wound test a pass is good news: the investigator stays
//! conscious. For the temporary-insanity test a pass on the INT roll means
//! the investigator *understands* what they saw and goes insane; a failure
//! means the mind represses the horror. Callers report the raw roll result
//! in both cases and must not invert it.

use crate::investigator::{Insanity, Investigator, PendingCheck, Vitality};
use crate::rules::{Action, ConditionEngine, Rejected, Scheduled, Signal, StatusKind, Transition};

/// Start a transition for a resolver, enforcing the shared preconditions.
fn begin(investigator: &Investigator, check: PendingCheck) -> Result<Transition, Rejected> {
    if investigator.is_dead() {
        return Err(Rejected::Dead);
    }
    if !investigator.pending.contains(check) {
        return Err(Rejected::NotPending(check));
    }
    let mut t = Transition::new(investigator.clone());
    t.clear(check);
    Ok(t)
}

fn alive(investigator: &Investigator) -> Result<Transition, Rejected> {
    if investigator.is_dead() {
        return Err(Rejected::Dead);
    }
    Ok(Transition::new(investigator.clone()))
}

impl ConditionEngine {
    /// Resolve the major-wound CON test.
    ///
    /// Pass keeps the investigator conscious, fail knocks them out. Either
    /// way an investigator already at 0 HP starts dying.
    pub fn resolve_major_wound(
        &self,
        investigator: &Investigator,
        passed: bool,
    ) -> Result<Transition, Rejected> {
        let mut t = begin(investigator, PendingCheck::MajorWound)?;
        let name = t.investigator.name.clone();

        if passed {
            t.signal(Signal::MajorWoundResisted { name });
        } else {
            if t.investigator.condition.vitality == Vitality::Conscious {
                t.investigator.condition.vitality = Vitality::Unconscious;
            }
            t.signal(Signal::KnockedOut { name });
        }

        if t.investigator.health.is_depleted() && !t.investigator.condition.is_dying() {
            t.enter_dying();
        }
        Ok(t)
    }

    /// Resolve the temporary-insanity INT test.
    ///
    /// `test_passed` is the INT roll result: a pass makes the investigator
    /// temporarily insane and rolls an episode, a fail only clears the
    /// check. See the module docs.
    pub fn resolve_temporary_insanity(
        &self,
        investigator: &Investigator,
        test_passed: bool,
    ) -> Result<Transition, Rejected> {
        let mut t = begin(investigator, PendingCheck::TemporaryInsanity)?;
        let name = t.investigator.name.clone();

        if test_passed {
            t.investigator.condition.insanity = Some(Insanity::Temporary);
            t.episode = Some(Insanity::Temporary);
            t.signal(Signal::TemporaryInsanity { name });
        } else {
            t.signal(Signal::HorrorRepressed { name });
        }
        Ok(t)
    }

    /// Acknowledge indefinite insanity. Always succeeds when pending.
    pub fn confirm_indefinite_insanity(
        &self,
        investigator: &Investigator,
    ) -> Result<Transition, Rejected> {
        let mut t = begin(investigator, PendingCheck::IndefiniteInsanity)?;
        t.investigator.condition.insanity = Some(Insanity::Indefinite);
        t.episode = Some(Insanity::Indefinite);
        t.signal(Signal::IndefiniteInsanityConfirmed {
            name: t.investigator.name.clone(),
        });
        Ok(t)
    }

    /// Resolve a dying CON test.
    ///
    /// A pass schedules the next test; the scheduled action re-checks that
    /// the investigator is still dying before it raises anything.
    pub fn resolve_dying(
        &self,
        investigator: &Investigator,
        passed: bool,
    ) -> Result<Transition, Rejected> {
        if investigator.is_alive() && !investigator.condition.is_dying() {
            return Err(Rejected::InvalidState("dying"));
        }
        let mut t = begin(investigator, PendingCheck::Dying)?;
        let name = t.investigator.name.clone();

        if passed {
            let after = self.rules().dying_recheck_delay;
            t.scheduled = Some(Scheduled {
                after,
                action: Action::RearmDyingCheck,
            });
            t.signal(Signal::DyingSurvived {
                name,
                next_check_in: after,
            });
        } else {
            t.investigator.kill();
            t.signal(Signal::Died { name });
        }
        Ok(t)
    }

    /// Raise the dying test again if it still applies.
    pub fn rearm_dying_check(&self, investigator: &Investigator) -> Result<Transition, Rejected> {
        if investigator.is_dead()
            || !investigator.condition.is_dying()
            || investigator.pending.contains(PendingCheck::Dying)
        {
            return Err(Rejected::Stale);
        }
        let mut t = Transition::new(investigator.clone());
        t.raise(PendingCheck::Dying);
        t.signal(Signal::DyingCheckDue {
            name: t.investigator.name.clone(),
            constitution: t.investigator.characteristics.constitution,
        });
        Ok(t)
    }

    /// Begin recovering from temporary insanity.
    ///
    /// The status stays until the operator decides whether it turns latent.
    pub fn request_recovery(&self, investigator: &Investigator) -> Result<Transition, Rejected> {
        let mut t = alive(investigator)?;
        if t.investigator.condition.insanity != Some(Insanity::Temporary) {
            return Err(Rejected::InvalidState("temporarily insane"));
        }
        if t.investigator.pending.contains(PendingCheck::LatentInsanity) {
            return Err(Rejected::Unchanged);
        }
        t.raise(PendingCheck::LatentInsanity);
        t.signal(Signal::RecoveryPending {
            name: t.investigator.name.clone(),
        });
        Ok(t)
    }

    /// Finish recovering from temporary insanity.
    pub fn confirm_recovery(
        &self,
        investigator: &Investigator,
        latent: bool,
    ) -> Result<Transition, Rejected> {
        let mut t = begin(investigator, PendingCheck::LatentInsanity)?;
        t.clear(PendingCheck::TemporaryInsanity);
        let name = t.investigator.name.clone();

        if latent {
            t.investigator.condition.insanity = Some(Insanity::Latent);
            t.signal(Signal::LatentInsanity { name });
        } else {
            t.investigator.condition.insanity = None;
            t.signal(Signal::Recovered { name });
        }
        Ok(t)
    }

    /// Stabilize a dying investigator. Health is floored at 1.
    pub fn stabilize(&self, investigator: &Investigator) -> Result<Transition, Rejected> {
        let mut t = alive(investigator)?;
        if !t.investigator.condition.is_dying() {
            return Err(Rejected::InvalidState("dying"));
        }
        t.investigator.condition.vitality = Vitality::Stabilized;
        t.clear(PendingCheck::Dying);
        t.investigator.health.current = t.investigator.health.current.max(1);
        t.signal(Signal::Stabilized {
            name: t.investigator.name.clone(),
        });
        Ok(t)
    }

    /// A stabilized investigator starts dying again at 0 HP.
    pub fn destabilize(&self, investigator: &Investigator) -> Result<Transition, Rejected> {
        let mut t = alive(investigator)?;
        if !t.investigator.condition.is_stabilized() {
            return Err(Rejected::InvalidState("stabilized"));
        }
        t.investigator.health.current = 0;
        t.investigator.condition.vitality = Vitality::Dying;
        t.raise(PendingCheck::Dying);
        t.signal(Signal::Destabilized {
            name: t.investigator.name.clone(),
            constitution: t.investigator.characteristics.constitution,
        });
        Ok(t)
    }

    /// Clear a status by hand.
    ///
    /// Temporary insanity goes through [`ConditionEngine::request_recovery`]
    /// instead of clearing outright.
    pub fn clear_status(
        &self,
        investigator: &Investigator,
        status: StatusKind,
    ) -> Result<Transition, Rejected> {
        let mut t = alive(investigator)?;
        let condition = &mut t.investigator.condition;
        match status {
            StatusKind::TemporaryInsanity => return self.request_recovery(investigator),
            StatusKind::MajorWound => {
                if !condition.major_wound {
                    return Err(Rejected::InvalidState("wounded"));
                }
                condition.major_wound = false;
                t.clear(PendingCheck::MajorWound);
            }
            StatusKind::Unconscious => {
                if !condition.is_unconscious() {
                    return Err(Rejected::InvalidState("unconscious"));
                }
                condition.vitality = Vitality::Conscious;
                t.clear(PendingCheck::Dying);
            }
            StatusKind::IndefiniteInsanity => {
                if condition.insanity != Some(Insanity::Indefinite) {
                    return Err(Rejected::InvalidState("indefinitely insane"));
                }
                condition.insanity = None;
            }
            StatusKind::LatentInsanity => {
                if condition.insanity != Some(Insanity::Latent) {
                    return Err(Rejected::InvalidState("latently insane"));
                }
                condition.insanity = None;
            }
        }

        t.signal(Signal::StatusCleared {
            name: t.investigator.name.clone(),
            status,
        });
        Ok(t)
    }
}
