//! Call of Cthulhu condition engine with an Action/Transition pipeline.
//!
//! 1. The operator (or the group sequencer) requests an Action
//! 2. ConditionEngine resolves it against an investigator snapshot
//! 3. A Transition carries the next snapshot plus the signals to show
//! 4. The tracker commits the snapshot and presents every signal
//!
//! The engine never mutates its input. Everything it decides is visible in
//! the returned Transition, which keeps the rules testable without a roster.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::config::RulesConfig;
use crate::episode::Episode;
use crate::investigator::{Insanity, Investigator, PendingCheck, Stat, Vitality};
use crate::sequencer::PauseReason;
use crate::skills::SuccessLevel;

// ============================================================================
// Actions
// ============================================================================

/// Statuses the operator may clear by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusKind {
    MajorWound,
    Unconscious,
    TemporaryInsanity,
    IndefiniteInsanity,
    LatentInsanity,
}

impl StatusKind {
    pub fn name(&self) -> &'static str {
        match self {
            StatusKind::MajorWound => "Major Wound",
            StatusKind::Unconscious => "Unconscious",
            StatusKind::TemporaryInsanity => "Temporary Insanity",
            StatusKind::IndefiniteInsanity => "Indefinite Insanity",
            StatusKind::LatentInsanity => "Latent Insanity",
        }
    }
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Everything that can change an investigator's condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// Store a resolved absolute value for a stat.
    SetStat { stat: Stat, value: i32 },

    /// Outcome of the major-wound CON test.
    MajorWoundTest { passed: bool },

    /// Outcome of the temporary-insanity INT test.
    ///
    /// `passed` is the result of the INT roll itself. Passing means the
    /// investigator fully grasps the horror and goes insane; failing means
    /// the mind represses it. This is the reverse of the major-wound test.
    TemporaryInsanityTest { passed: bool },

    /// Acknowledge indefinite insanity.
    ConfirmIndefiniteInsanity,

    /// Outcome of a dying CON test.
    DyingTest { passed: bool },

    /// Re-arm the dying test once its delay has elapsed.
    RearmDyingCheck,

    /// Start recovery from temporary insanity.
    RequestRecovery,

    /// Finish recovery: `latent` keeps the insanity dormant instead of curing it.
    ConfirmRecovery { latent: bool },

    /// First aid on a dying investigator.
    Stabilize,

    /// A stabilized investigator starts dying again.
    Destabilize,

    /// Manually clear a status.
    ClearStatus(StatusKind),
}

// ============================================================================
// Signals
// ============================================================================

/// Operator-facing output of a transition. Signals never block play; only
/// pending checks do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Signal {
    InstantDeath {
        name: String,
        loss: i32,
        max_health: i32,
    },
    MajorWound {
        name: String,
        loss: i32,
        constitution: i32,
    },
    Dying {
        name: String,
        constitution: i32,
    },
    Unconscious {
        name: String,
    },
    LatentEpisode {
        name: String,
        loss: i32,
    },
    IndefiniteInsanity {
        name: String,
        session_loss: i32,
        threshold: i32,
    },
    TemporaryInsanityRisk {
        name: String,
        loss: i32,
        intelligence: i32,
    },
    MajorWoundResisted {
        name: String,
    },
    KnockedOut {
        name: String,
    },
    TemporaryInsanity {
        name: String,
    },
    HorrorRepressed {
        name: String,
    },
    IndefiniteInsanityConfirmed {
        name: String,
    },
    DyingSurvived {
        name: String,
        next_check_in: Duration,
    },
    DyingCheckDue {
        name: String,
        constitution: i32,
    },
    Died {
        name: String,
    },
    Stabilized {
        name: String,
    },
    Destabilized {
        name: String,
        constitution: i32,
    },
    RecoveryPending {
        name: String,
    },
    LatentInsanity {
        name: String,
    },
    Recovered {
        name: String,
    },
    StatusCleared {
        name: String,
        status: StatusKind,
    },
    Episode(Episode),
    SessionStarted,
    SessionEnded {
        abandoned_checks: usize,
    },
    GroupCheckTurn {
        name: String,
        roll: u8,
        sanity: i32,
        succeeded: bool,
        loss: String,
    },
    GroupCheckPaused {
        name: String,
        reason: PauseReason,
    },
    GroupCheckComplete,
    GroupCheckCancelled,
    SkillCheck {
        name: String,
        skill: String,
        value: i32,
        roll: u8,
        level: SuccessLevel,
    },
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::InstantDeath {
                name,
                loss,
                max_health,
            } => write!(
                f,
                "INSTANT DEATH! {} lost {} HP in one blow (max HP {}).",
                name, loss, max_health
            ),
            Signal::MajorWound {
                name,
                loss,
                constitution,
            } => write!(
                f,
                "MAJOR WOUND! {} lost {} HP. Roll CON ({}) or fall unconscious.",
                name, loss, constitution
            ),
            Signal::Dying { name, constitution } => write!(
                f,
                "{} is DYING! Roll CON ({}) each round until stabilized.",
                name, constitution
            ),
            Signal::Unconscious { name } => {
                write!(f, "{} drops to 0 HP and falls unconscious.", name)
            }
            Signal::LatentEpisode { name, loss } => write!(
                f,
                "{} lost {} SAN while latently insane and suffers a bout of madness.",
                name, loss
            ),
            Signal::IndefiniteInsanity {
                name,
                session_loss,
                threshold,
            } => write!(
                f,
                "INDEFINITE INSANITY! {} has lost {} SAN this session (threshold {}). Confirm to continue.",
                name, session_loss, threshold
            ),
            Signal::TemporaryInsanityRisk {
                name,
                loss,
                intelligence,
            } => write!(
                f,
                "{} lost {} SAN at once. Roll INT ({}): success means temporary insanity.",
                name, loss, intelligence
            ),
            Signal::MajorWoundResisted { name } => {
                write!(f, "{} passes the CON test and stays conscious.", name)
            }
            Signal::KnockedOut { name } => {
                write!(f, "{} fails the CON test and falls unconscious.", name)
            }
            Signal::TemporaryInsanity { name } => write!(
                f,
                "{} understands what they saw and goes temporarily insane.",
                name
            ),
            Signal::HorrorRepressed { name } => {
                write!(f, "{} represses the horror and keeps their sanity.", name)
            }
            Signal::IndefiniteInsanityConfirmed { name } => {
                write!(f, "{} is now indefinitely insane.", name)
            }
            Signal::DyingSurvived {
                name,
                next_check_in,
            } => write!(
                f,
                "{} clings to life. Another CON test is due in {} ms.",
                name,
                next_check_in.as_millis()
            ),
            Signal::DyingCheckDue { name, constitution } => write!(
                f,
                "{} is still dying. Roll CON ({}) again.",
                name, constitution
            ),
            Signal::Died { name } => write!(f, "{} fails the CON test and dies.", name),
            Signal::Stabilized { name } => write!(f, "{} has been stabilized.", name),
            Signal::Destabilized { name, constitution } => write!(
                f,
                "{} is dying again! Roll CON ({}).",
                name, constitution
            ),
            Signal::RecoveryPending { name } => write!(
                f,
                "{} is recovering from temporary insanity. Does it become latent?",
                name
            ),
            Signal::LatentInsanity { name } => {
                write!(f, "{}'s insanity lies dormant (latent insanity).", name)
            }
            Signal::Recovered { name } => {
                write!(f, "{} has fully recovered their sanity.", name)
            }
            Signal::StatusCleared { name, status } => {
                write!(f, "{} is no longer affected by {}.", name, status)
            }
            Signal::Episode(episode) => write!(f, "{}", episode),
            Signal::SessionStarted => write!(f, "Session started. Session sanity losses reset."),
            Signal::SessionEnded { abandoned_checks } => write!(
                f,
                "Session ended. {} pending check(s) abandoned.",
                abandoned_checks
            ),
            Signal::GroupCheckTurn {
                name,
                roll,
                sanity,
                succeeded,
                loss,
            } => write!(
                f,
                "{} rolled {} against SAN {}: {}. Apply loss {}.",
                name,
                roll,
                sanity,
                if *succeeded { "success" } else { "failure" },
                loss
            ),
            Signal::GroupCheckPaused { name, reason } => write!(
                f,
                "Group sanity check paused: resolve {} for {} before resuming.",
                reason, name
            ),
            Signal::GroupCheckComplete => write!(f, "Group sanity check complete."),
            Signal::GroupCheckCancelled => write!(f, "Group sanity check cancelled."),
            Signal::SkillCheck {
                name,
                skill,
                value,
                roll,
                level,
            } => write!(
                f,
                "{} rolled {} on {} ({}%): {}.",
                name, roll, skill, value, level
            ),
        }
    }
}

// ============================================================================
// Transitions
// ============================================================================

/// Why the engine refused an action. The input snapshot is unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejected {
    #[error("investigator is dead")]
    Dead,
    #[error("value is unchanged")]
    Unchanged,
    #[error("no {0} is pending")]
    NotPending(PendingCheck),
    #[error("investigator is not {0}")]
    InvalidState(&'static str),
    #[error("scheduled re-check no longer applies")]
    Stale,
}

/// Work to run after a delay. Scheduled actions are re-validated when due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scheduled {
    pub after: Duration,
    pub action: Action,
}

/// Result of resolving an action.
#[derive(Debug, Clone)]
pub struct Transition {
    pub investigator: Investigator,
    pub signals: Vec<Signal>,
    /// Checks this transition raised, in order.
    pub raised: Vec<PendingCheck>,
    /// Insanity kind an episode should be rolled for.
    pub episode: Option<Insanity>,
    pub scheduled: Option<Scheduled>,
}

impl Transition {
    pub fn new(investigator: Investigator) -> Self {
        Self {
            investigator,
            signals: Vec::new(),
            raised: Vec::new(),
            episode: None,
            scheduled: None,
        }
    }

    pub(crate) fn signal(&mut self, signal: Signal) {
        self.signals.push(signal);
    }

    pub(crate) fn raise(&mut self, check: PendingCheck) {
        if self.investigator.pending.raise(check) {
            self.raised.push(check);
        }
    }

    pub(crate) fn clear(&mut self, check: PendingCheck) {
        self.investigator.pending.clear(check);
    }

    /// Move into dying and require a CON test.
    pub(crate) fn enter_dying(&mut self) {
        self.investigator.condition.vitality = Vitality::Dying;
        self.raise(PendingCheck::Dying);
        self.signal(Signal::Dying {
            name: self.investigator.name.clone(),
            constitution: self.investigator.characteristics.constitution,
        });
    }

    /// Whether this transition raised the given check.
    pub fn raised(&self, check: PendingCheck) -> bool {
        self.raised.contains(&check)
    }
}

// ============================================================================
// Engine
// ============================================================================

/// The condition engine.
#[derive(Debug, Clone, Default)]
pub struct ConditionEngine {
    rules: RulesConfig,
}

impl ConditionEngine {
    pub fn new(rules: RulesConfig) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &RulesConfig {
        &self.rules
    }

    /// Resolve an action against an investigator snapshot.
    pub fn resolve(
        &self,
        investigator: &Investigator,
        action: Action,
        session_active: bool,
    ) -> Result<Transition, Rejected> {
        if investigator.is_dead() {
            return Err(Rejected::Dead);
        }

        match action {
            Action::SetStat { stat, value } => {
                self.apply(investigator, stat, value, session_active)
            }
            Action::MajorWoundTest { passed } => self.resolve_major_wound(investigator, passed),
            Action::TemporaryInsanityTest { passed } => {
                self.resolve_temporary_insanity(investigator, passed)
            }
            Action::ConfirmIndefiniteInsanity => self.confirm_indefinite_insanity(investigator),
            Action::DyingTest { passed } => self.resolve_dying(investigator, passed),
            Action::RearmDyingCheck => self.rearm_dying_check(investigator),
            Action::RequestRecovery => self.request_recovery(investigator),
            Action::ConfirmRecovery { latent } => self.confirm_recovery(investigator, latent),
            Action::Stabilize => self.stabilize(investigator),
            Action::Destabilize => self.destabilize(investigator),
            Action::ClearStatus(status) => self.clear_status(investigator, status),
        }
    }

    /// Apply a new absolute value to a stat.
    ///
    /// The value is clamped first. Losses to health or sanity run the
    /// condition rules, but only while a session is active.
    pub fn apply(
        &self,
        investigator: &Investigator,
        stat: Stat,
        value: i32,
        session_active: bool,
    ) -> Result<Transition, Rejected> {
        if investigator.is_dead() {
            return Err(Rejected::Dead);
        }

        let before = investigator.stat(stat);
        let value = investigator.clamp_stat(stat, value);
        if value == before {
            return Err(Rejected::Unchanged);
        }

        let mut next = investigator.clone();
        next.set_stat(stat, value);
        if let Stat::Characteristic(c) = stat {
            if c.affects_maxima() {
                next.recompute_maxima(self.rules.sanity_ceiling);
            }
        }

        let mut transition = Transition::new(next);
        let loss = before - value;
        if !session_active || loss <= 0 {
            return Ok(transition);
        }

        match stat {
            Stat::Health => self.health_loss(&mut transition, loss),
            Stat::Sanity => self.sanity_loss(&mut transition, before, loss),
            Stat::Characteristic(_) => {}
        }

        Ok(transition)
    }

    fn health_loss(&self, t: &mut Transition, loss: i32) {
        let max_health = t.investigator.health.maximum;

        if loss >= max_health {
            t.investigator.kill();
            t.signal(Signal::InstantDeath {
                name: t.investigator.name.clone(),
                loss,
                max_health,
            });
            return;
        }

        if loss >= max_health - loss && !t.investigator.condition.major_wound {
            t.investigator.condition.major_wound = true;
            t.raise(PendingCheck::MajorWound);
            t.signal(Signal::MajorWound {
                name: t.investigator.name.clone(),
                loss,
                constitution: t.investigator.characteristics.constitution,
            });
        }

        let vitality = t.investigator.condition.vitality;
        if t.investigator.health.is_depleted()
            && !matches!(vitality, Vitality::Dying | Vitality::Dead)
        {
            if t.investigator.condition.major_wound {
                t.enter_dying();
            } else {
                if vitality == Vitality::Conscious {
                    t.investigator.condition.vitality = Vitality::Unconscious;
                }
                t.signal(Signal::Unconscious {
                    name: t.investigator.name.clone(),
                });
            }
        }
    }

    fn sanity_loss(&self, t: &mut Transition, sanity_before: i32, loss: i32) {
        let threshold = self.rules.indefinite_threshold(sanity_before);
        let session_loss = t.investigator.session_sanity_lost.saturating_add(loss);
        let insanity = t.investigator.condition.insanity;
        let name = t.investigator.name.clone();

        if insanity == Some(Insanity::Latent) {
            t.episode = Some(Insanity::Latent);
            t.signal(Signal::LatentEpisode { name, loss });
        } else if session_loss >= threshold && insanity != Some(Insanity::Indefinite) {
            t.investigator.condition.insanity = None;
            // A recovery in progress no longer applies once temporary
            // insanity has been replaced.
            t.clear(PendingCheck::LatentInsanity);
            t.raise(PendingCheck::IndefiniteInsanity);
            t.signal(Signal::IndefiniteInsanity {
                name,
                session_loss,
                threshold,
            });
        } else if loss >= self.rules.temporary_insanity_loss && insanity.is_none() {
            t.raise(PendingCheck::TemporaryInsanity);
            t.signal(Signal::TemporaryInsanityRisk {
                name,
                loss,
                intelligence: t.investigator.characteristics.intelligence,
            });
        }

        t.investigator.session_sanity_lost = session_loss;
    }
}
