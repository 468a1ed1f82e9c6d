//! The tracker: owner of all mutable state.
//!
//! A `Tracker` holds the roster, the session flag, the group sanity
//! sequencer and any scheduled re-checks. Every change goes through it, one
//! call at a time, and every call returns the signals the operator must see.

use std::path::Path;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::RulesConfig;
use crate::episode;
use crate::investigator::{Insanity, Investigator, InvestigatorId, NoteField, PendingCheck, Stat};
use crate::modifier::{self, ModifierError};
use crate::persist::{load_roster, LoadedRoster, PersistError, SavedRoster};
use crate::rules::{Action, ConditionEngine, Rejected, Signal, StatusKind, Transition};
use crate::sequencer::{GroupSanityCheck, GroupTurn, PauseReason, Progress, SequencerError};
use crate::skills::{self, SkillError};

/// Errors from tracker operations. The tracked state is unchanged whenever
/// one is returned.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Unknown investigator: {0}")]
    UnknownInvestigator(InvestigatorId),

    #[error("Invalid {stat} edit '{input}' ({source}); {stat} stays at {current}")]
    InvalidModifier {
        stat: Stat,
        input: String,
        current: String,
        source: ModifierError,
    },

    #[error("{investigator} has no skill '{skill}'")]
    UnknownSkill { investigator: String, skill: String },

    #[error("{0}")]
    Skill(#[from] SkillError),

    #[error("{0}")]
    Rejected(Rejected),

    #[error("{0}")]
    Group(#[from] SequencerError),

    #[error("Persistence error: {0}")]
    Persist(#[from] PersistError),
}

/// Signals produced by one tracker call.
#[derive(Debug, Clone, Default)]
pub struct Outcome {
    pub signals: Vec<Signal>,
    /// Whether any tracked state changed.
    pub applied: bool,
}

impl Outcome {
    fn ignored() -> Self {
        Self::default()
    }

    fn applied(signals: Vec<Signal>) -> Self {
        Self {
            signals,
            applied: true,
        }
    }

    fn merge(&mut self, other: Outcome) {
        self.applied |= other.applied;
        self.signals.extend(other.signals);
    }

    /// Operator-facing text for every signal, in order.
    pub fn messages(&self) -> Vec<String> {
        self.signals.iter().map(|s| s.to_string()).collect()
    }

    /// The episode signals, if any were rolled.
    pub fn episodes(&self) -> impl Iterator<Item = &episode::Episode> {
        self.signals.iter().filter_map(|s| match s {
            Signal::Episode(e) => Some(e),
            _ => None,
        })
    }
}

/// A deferred action, re-validated when it comes due.
#[derive(Debug, Clone, Copy)]
struct ScheduledTask {
    due: Instant,
    investigator: InvestigatorId,
    action: Action,
}

/// Owner of the roster and everything that acts on it.
#[derive(Debug, Clone)]
pub struct Tracker {
    engine: ConditionEngine,
    roster: Vec<Investigator>,
    next_number: u32,
    session_active: bool,
    group: GroupSanityCheck,
    scheduled: Vec<ScheduledTask>,
}

impl Tracker {
    /// An empty roster with no session running.
    pub fn new(rules: RulesConfig) -> Self {
        Self {
            engine: ConditionEngine::new(rules),
            roster: Vec::new(),
            next_number: 1,
            session_active: false,
            group: GroupSanityCheck::new(),
            scheduled: Vec::new(),
        }
    }

    /// A fresh roster of default investigators.
    pub fn with_default_roster(rules: RulesConfig) -> Self {
        let size = rules.default_roster_size;
        let mut tracker = Self::new(rules);
        for _ in 0..size {
            tracker.add_investigator();
        }
        tracker
    }

    pub fn rules(&self) -> &RulesConfig {
        self.engine.rules()
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn investigators(&self) -> &[Investigator] {
        &self.roster
    }

    pub fn investigator(&self, id: InvestigatorId) -> Option<&Investigator> {
        self.roster.iter().find(|i| i.id == id)
    }

    fn get(&self, id: InvestigatorId) -> Result<&Investigator, TrackerError> {
        self.investigator(id)
            .ok_or(TrackerError::UnknownInvestigator(id))
    }

    /// Id of the investigator at a roster position.
    pub fn id_at(&self, index: usize) -> Option<InvestigatorId> {
        self.roster.get(index).map(|i| i.id)
    }

    /// Living investigators in roster order.
    pub fn living(&self) -> Vec<(InvestigatorId, String)> {
        self.roster
            .iter()
            .filter(|i| i.is_alive())
            .map(|i| (i.id, i.name.clone()))
            .collect()
    }

    pub fn is_session_active(&self) -> bool {
        self.session_active
    }

    /// Whether an investigator owes a confirmation before play continues.
    pub fn is_blocked(&self, id: InvestigatorId) -> bool {
        self.investigator(id)
            .map(|i| !i.pending.is_empty())
            .unwrap_or(false)
    }

    pub fn group(&self) -> &GroupSanityCheck {
        &self.group
    }

    /// When the next scheduled re-check is due.
    pub fn next_due(&self) -> Option<Instant> {
        self.scheduled.iter().map(|t| t.due).min()
    }

    // ========================================================================
    // Roster
    // ========================================================================

    /// Add a default investigator named after the next free number.
    pub fn add_investigator(&mut self) -> InvestigatorId {
        let n = self.next_number;
        self.next_number += 1;
        self.insert(Investigator::new(
            format!("Investigator {}", n),
            format!("Player {}", n),
        ))
    }

    /// Add an existing investigator to the roster.
    pub fn insert(&mut self, mut investigator: Investigator) -> InvestigatorId {
        investigator.recompute_maxima(self.rules().sanity_ceiling);
        let id = investigator.id;
        info!(investigator = %investigator.name, %id, "Investigator added");
        self.roster.push(investigator);
        id
    }

    pub fn remove_investigator(&mut self, id: InvestigatorId) -> Result<Investigator, TrackerError> {
        let index = self
            .roster
            .iter()
            .position(|i| i.id == id)
            .ok_or(TrackerError::UnknownInvestigator(id))?;
        self.scheduled.retain(|t| t.investigator != id);
        let removed = self.roster.remove(index);
        info!(investigator = %removed.name, %id, "Investigator removed");
        Ok(removed)
    }

    /// Apply a sheet edit that carries no rules, unless the investigator is
    /// dead.
    fn edit_text(
        &mut self,
        id: InvestigatorId,
        edit: impl FnOnce(&mut Investigator),
    ) -> Result<bool, TrackerError> {
        let investigator = self
            .roster
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or(TrackerError::UnknownInvestigator(id))?;
        if investigator.is_dead() {
            debug!(investigator = %investigator.name, "Ignoring edit on dead investigator");
            return Ok(false);
        }
        edit(investigator);
        Ok(true)
    }

    pub fn rename(&mut self, id: InvestigatorId, name: impl Into<String>) -> Result<bool, TrackerError> {
        let name = name.into();
        self.edit_text(id, |i| i.name = name)
    }

    pub fn set_player(
        &mut self,
        id: InvestigatorId,
        player: impl Into<String>,
    ) -> Result<bool, TrackerError> {
        let player = player.into();
        self.edit_text(id, |i| i.player = player)
    }

    pub fn set_note(
        &mut self,
        id: InvestigatorId,
        field: NoteField,
        text: impl Into<String>,
    ) -> Result<bool, TrackerError> {
        let text = text.into();
        self.edit_text(id, |i| i.set_note(field, text))
    }

    // ========================================================================
    // Skills
    // ========================================================================

    /// Set one skill value, adding the skill if it is new.
    pub fn set_skill(
        &mut self,
        id: InvestigatorId,
        skill: &str,
        value: i32,
    ) -> Result<bool, TrackerError> {
        let skill = skills::validate_skill(skill, value)?;
        self.edit_text(id, |i| {
            i.skills.insert(skill, value);
        })
    }

    pub fn remove_skill(&mut self, id: InvestigatorId, skill: &str) -> Result<bool, TrackerError> {
        let skill = skill.trim();
        self.edit_text(id, |i| {
            i.skills.remove(skill);
        })
    }

    /// Replace every skill from `Name: value` lines.
    ///
    /// A block with any bad line changes nothing.
    pub fn import_skills(&mut self, id: InvestigatorId, text: &str) -> Result<bool, TrackerError> {
        self.get(id)?;
        let parsed = skills::parse_skills(text)?;
        let count = parsed.len();
        let changed = self.edit_text(id, |i| i.skills = parsed)?;
        if changed {
            info!(%id, count, "Skills imported");
        }
        Ok(changed)
    }

    /// Grade a D100 roll against one of an investigator's skills.
    ///
    /// Nothing is stored; the outcome carries the result signal only. Dead
    /// investigators make no checks.
    pub fn skill_check(
        &self,
        id: InvestigatorId,
        skill: &str,
        roll: u32,
    ) -> Result<Outcome, TrackerError> {
        let investigator = self.get(id)?;
        if investigator.is_dead() {
            debug!(investigator = %investigator.name, skill, "Ignoring skill check on dead investigator");
            return Ok(Outcome::ignored());
        }

        let skill = skill.trim();
        let value = *investigator
            .skills
            .get(skill)
            .ok_or_else(|| TrackerError::UnknownSkill {
                investigator: investigator.name.clone(),
                skill: skill.to_string(),
            })?;
        let level = skills::skill_check(value, roll)?;
        let roll = u8::try_from(roll).map_err(|_| SkillError::InvalidRoll(roll))?;
        info!(investigator = %investigator.name, skill, value, roll, %level, "Skill check");

        Ok(Outcome {
            signals: vec![Signal::SkillCheck {
                name: investigator.name.clone(),
                skill: skill.to_string(),
                value,
                roll,
                level,
            }],
            applied: false,
        })
    }

    // ========================================================================
    // Session
    // ========================================================================

    pub fn start_session(&mut self) -> Outcome {
        self.set_session_active(true)
    }

    pub fn end_session(&mut self) -> Outcome {
        self.set_session_active(false)
    }

    /// Toggle the session.
    ///
    /// Either transition resets session sanity loss. Ending a session also
    /// abandons pending checks, scheduled re-checks and any group check.
    pub fn set_session_active(&mut self, active: bool) -> Outcome {
        if self.session_active == active {
            return Outcome::ignored();
        }
        self.session_active = active;

        let mut abandoned = 0;
        for investigator in &mut self.roster {
            investigator.session_sanity_lost = 0;
            if !active {
                abandoned += investigator.pending.len();
                investigator.pending.clear_all();
            }
        }

        if active {
            info!("Session started");
            return Outcome::applied(vec![Signal::SessionStarted]);
        }

        self.scheduled.clear();
        let mut signals = Vec::new();
        if self.group.cancel() {
            signals.push(Signal::GroupCheckCancelled);
        }
        signals.push(Signal::SessionEnded {
            abandoned_checks: abandoned,
        });
        info!(abandoned, "Session ended");
        Outcome::applied(signals)
    }

    // ========================================================================
    // Stat edits and check resolution
    // ========================================================================

    /// Edit a stat from raw operator input such as `-3`, `*2` or `45`.
    ///
    /// Invalid input changes nothing; the error carries the current value
    /// for display.
    pub fn edit_stat(
        &mut self,
        id: InvestigatorId,
        stat: Stat,
        input: &str,
    ) -> Result<Outcome, TrackerError> {
        let investigator = self.get(id)?;
        if investigator.is_dead() {
            debug!(investigator = %investigator.name, %stat, "Ignoring edit on dead investigator");
            return Ok(Outcome::ignored());
        }

        let current = investigator.stat(stat);
        let value = modifier::resolve(current, input).map_err(|source| {
            debug!(%stat, input, %source, "Invalid modifier");
            TrackerError::InvalidModifier {
                stat,
                input: input.to_string(),
                current: current.to_string(),
                source,
            }
        })?;

        self.set_stat(id, stat, value)
    }

    /// Store a resolved absolute value.
    pub fn set_stat(
        &mut self,
        id: InvestigatorId,
        stat: Stat,
        value: i32,
    ) -> Result<Outcome, TrackerError> {
        self.act(id, Action::SetStat { stat, value })
    }

    /// Resolve an action now.
    pub fn act(&mut self, id: InvestigatorId, action: Action) -> Result<Outcome, TrackerError> {
        self.act_at(id, action, Instant::now())
    }

    /// Resolve an action at a given instant. Scheduled follow-ups are timed
    /// from `now`.
    pub fn act_at(
        &mut self,
        id: InvestigatorId,
        action: Action,
        now: Instant,
    ) -> Result<Outcome, TrackerError> {
        let investigator = self.get(id)?;
        match self.engine.resolve(investigator, action, self.session_active) {
            Ok(transition) => Ok(self.commit(transition, now)),
            Err(Rejected::Dead) => {
                debug!(%id, ?action, "Ignoring action on dead investigator");
                Ok(Outcome::ignored())
            }
            Err(Rejected::Unchanged) => Ok(Outcome::ignored()),
            Err(rejected) => {
                debug!(%id, ?action, %rejected, "Action rejected");
                Err(TrackerError::Rejected(rejected))
            }
        }
    }

    /// Outcome of the major-wound CON test.
    pub fn resolve_major_wound(
        &mut self,
        id: InvestigatorId,
        passed: bool,
    ) -> Result<Outcome, TrackerError> {
        self.act(id, Action::MajorWoundTest { passed })
    }

    /// Outcome of the temporary-insanity INT test. A pass means the
    /// investigator goes insane.
    pub fn resolve_temporary_insanity(
        &mut self,
        id: InvestigatorId,
        test_passed: bool,
    ) -> Result<Outcome, TrackerError> {
        self.act(id, Action::TemporaryInsanityTest {
            passed: test_passed,
        })
    }

    pub fn confirm_indefinite_insanity(
        &mut self,
        id: InvestigatorId,
    ) -> Result<Outcome, TrackerError> {
        self.act(id, Action::ConfirmIndefiniteInsanity)
    }

    pub fn resolve_dying(
        &mut self,
        id: InvestigatorId,
        passed: bool,
    ) -> Result<Outcome, TrackerError> {
        self.act(id, Action::DyingTest { passed })
    }

    pub fn request_recovery(&mut self, id: InvestigatorId) -> Result<Outcome, TrackerError> {
        self.act(id, Action::RequestRecovery)
    }

    pub fn confirm_recovery(
        &mut self,
        id: InvestigatorId,
        latent: bool,
    ) -> Result<Outcome, TrackerError> {
        self.act(id, Action::ConfirmRecovery { latent })
    }

    pub fn stabilize(&mut self, id: InvestigatorId) -> Result<Outcome, TrackerError> {
        self.act(id, Action::Stabilize)
    }

    pub fn destabilize(&mut self, id: InvestigatorId) -> Result<Outcome, TrackerError> {
        self.act(id, Action::Destabilize)
    }

    pub fn clear_status(
        &mut self,
        id: InvestigatorId,
        status: StatusKind,
    ) -> Result<Outcome, TrackerError> {
        self.act(id, Action::ClearStatus(status))
    }

    /// Run every scheduled action due at `now`.
    ///
    /// Each one is resolved against the investigator's current state, so a
    /// re-check whose investigator has since died, stabilized or been
    /// removed is dropped.
    pub fn run_due(&mut self, now: Instant) -> Outcome {
        let (due, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.scheduled)
            .into_iter()
            .partition(|t| t.due <= now);
        self.scheduled = waiting;

        let mut outcome = Outcome::ignored();
        for task in due {
            let Some(investigator) = self.investigator(task.investigator) else {
                debug!(investigator = %task.investigator, "Scheduled action discarded: investigator removed");
                continue;
            };
            match self
                .engine
                .resolve(investigator, task.action, self.session_active)
            {
                Ok(transition) => {
                    info!(investigator = %transition.investigator.name, action = ?task.action, "Scheduled action fired");
                    outcome.merge(self.commit(transition, now));
                }
                Err(reason) => {
                    debug!(investigator = %task.investigator, %reason, "Scheduled action discarded");
                }
            }
        }
        outcome
    }

    fn commit(&mut self, transition: Transition, now: Instant) -> Outcome {
        let Transition {
            investigator,
            mut signals,
            raised,
            episode: episode_kind,
            scheduled,
        } = transition;
        let id = investigator.id;

        if let Some(kind) = episode_kind {
            signals.push(Signal::Episode(episode::episode(
                investigator.name.clone(),
                kind,
            )));
        }
        if let Some(s) = scheduled {
            self.scheduled.push(ScheduledTask {
                due: now + s.after,
                investigator: id,
                action: s.action,
            });
        }

        for signal in &signals {
            info!(investigator = %investigator.name, "{}", signal);
        }
        if !raised.is_empty() {
            debug!(investigator = %investigator.name, ?raised, "Pending checks raised");
        }

        if let Some(slot) = self.roster.iter_mut().find(|i| i.id == id) {
            *slot = investigator;
        }
        Outcome::applied(signals)
    }

    // ========================================================================
    // Group sanity check
    // ========================================================================

    /// Start collecting inputs for a group sanity check.
    pub fn open_group_check(&mut self) -> Result<(), TrackerError> {
        if !self.session_active {
            return Err(SequencerError::SessionInactive.into());
        }
        self.group.open()?;
        Ok(())
    }

    pub fn set_group_losses(
        &mut self,
        success_loss: impl Into<String>,
        failure_loss: impl Into<String>,
    ) -> Result<(), TrackerError> {
        self.group.set_losses(success_loss, failure_loss)?;
        Ok(())
    }

    pub fn set_group_roll(&mut self, id: InvestigatorId, roll: u32) -> Result<(), TrackerError> {
        self.get(id)?;
        self.group.set_roll(id, roll)?;
        Ok(())
    }

    /// Capture the living investigators and begin the run.
    pub fn start_group_check(&mut self) -> Result<Outcome, TrackerError> {
        if !self.session_active {
            return Err(SequencerError::SessionInactive.into());
        }
        let living = self.living();
        self.group.start(&living)?;
        info!(count = living.len(), "Group sanity check started");

        let mut outcome = Outcome::applied(Vec::new());
        outcome.signals.extend(self.turn_signal());
        Ok(outcome)
    }

    /// The active turn, if the run is waiting for a loss.
    pub fn group_turn(&self) -> Option<GroupTurn> {
        self.group.turn()
    }

    fn turn_signal(&self) -> Option<Signal> {
        let turn = self.group.turn()?;
        let investigator = self.investigator(turn.investigator)?;
        let sanity = investigator.sanity.current;
        Some(Signal::GroupCheckTurn {
            name: investigator.name.clone(),
            roll: turn.roll,
            sanity,
            succeeded: turn.succeeded(sanity),
            loss: turn.applicable_loss(sanity).to_string(),
        })
    }

    /// Apply the active investigator's actual sanity loss and move on.
    pub fn confirm_group_loss(&mut self, loss: i32) -> Result<Outcome, TrackerError> {
        if loss < 0 {
            return Err(SequencerError::NegativeLoss(loss).into());
        }
        let turn = self.group.turn().ok_or(SequencerError::NotRunning)?;
        let Some(investigator) = self.investigator(turn.investigator) else {
            return Err(self.group.abort(turn.investigator).into());
        };

        let value = investigator.sanity.current - loss;
        let (mut outcome, pause) =
            match self
                .engine
                .apply(investigator, Stat::Sanity, value, self.session_active)
            {
                Ok(transition) => {
                    let pause = pause_reason(&transition);
                    (self.commit(transition, Instant::now()), pause)
                }
                Err(reason) => {
                    debug!(investigator = %turn.investigator, %reason, "Group loss not applied");
                    (Outcome::ignored(), None)
                }
            };

        let progress = self.group.record(turn.investigator, pause)?;
        self.report_progress(&mut outcome, progress);
        Ok(outcome)
    }

    /// Continue a paused run once its check has been resolved.
    pub fn resume_group_check(&mut self) -> Result<Outcome, TrackerError> {
        let pause = self.group.pause().ok_or(SequencerError::NotPaused)?;
        let Some(investigator) = self.investigator(pause.investigator) else {
            return Err(self.group.abort(pause.investigator).into());
        };

        let still_pending = match pause.reason {
            PauseReason::Check(check) => investigator.pending.contains(check),
            PauseReason::Episode => false,
        };
        let name = investigator.name.clone();
        let progress = self.group.resume(still_pending, &name)?;

        let mut outcome = Outcome::ignored();
        self.report_progress(&mut outcome, progress);
        Ok(outcome)
    }

    /// Abandon the group check. Losses already applied stay applied.
    pub fn cancel_group_check(&mut self) -> Outcome {
        if self.group.cancel() {
            info!("Group sanity check cancelled");
            Outcome::applied(vec![Signal::GroupCheckCancelled])
        } else {
            Outcome::ignored()
        }
    }

    fn report_progress(&self, outcome: &mut Outcome, progress: Progress) {
        match progress {
            Progress::Next(_) => outcome.signals.extend(self.turn_signal()),
            Progress::Paused(pause) => {
                let name = self
                    .investigator(pause.investigator)
                    .map(|i| i.name.clone())
                    .unwrap_or_default();
                outcome.signals.push(Signal::GroupCheckPaused {
                    name,
                    reason: pause.reason,
                });
            }
            Progress::Complete => {
                info!("Group sanity check complete");
                outcome.signals.push(Signal::GroupCheckComplete);
            }
        }
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    pub fn to_saved(&self) -> SavedRoster {
        SavedRoster::new(self.session_active, self.next_number, self.roster.clone())
    }

    /// Rebuild a tracker from a save, normalizing every investigator.
    pub fn from_saved(saved: SavedRoster, rules: RulesConfig) -> Self {
        let mut tracker = Self::new(rules);
        let ceiling = tracker.rules().sanity_ceiling;
        tracker.session_active = saved.session_active;
        tracker.next_number = saved
            .next_number
            .max(saved.investigators.len() as u32 + 1);
        for mut investigator in saved.investigators {
            investigator.normalize(ceiling, saved.session_active);
            tracker.roster.push(investigator);
        }
        tracker
    }

    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), TrackerError> {
        let path = path.as_ref();
        self.to_saved().save_json(path).await?;
        info!(path = %path.display(), count = self.roster.len(), "Roster saved");
        Ok(())
    }

    /// Load a roster, starting a default one if nothing usable is saved.
    pub async fn load(path: impl AsRef<Path>, rules: RulesConfig) -> Result<Self, TrackerError> {
        let path = path.as_ref();
        match load_roster(path).await? {
            LoadedRoster::Loaded(saved) => {
                info!(path = %path.display(), count = saved.investigators.len(), "Roster loaded");
                Ok(Self::from_saved(saved, rules))
            }
            LoadedRoster::Missing => {
                info!(path = %path.display(), "No saved roster; starting fresh");
                Ok(Self::with_default_roster(rules))
            }
            LoadedRoster::Rejected {
                session_active,
                reason,
            } => {
                warn!(path = %path.display(), %reason, "Saved roster rejected; starting fresh");
                let mut tracker = Self::with_default_roster(rules);
                tracker.session_active = session_active;
                Ok(tracker)
            }
        }
    }
}

impl Default for Tracker {
    fn default() -> Self {
        Self::with_default_roster(RulesConfig::default())
    }
}

/// Whether a group loss needs the run to stop for follow-up.
///
/// A sanity rule that fires on a check already open still pauses, so this
/// reads the resulting pending set rather than what was newly raised.
fn pause_reason(transition: &Transition) -> Option<PauseReason> {
    transition
        .signals
        .iter()
        .filter_map(|signal| match signal {
            Signal::TemporaryInsanityRisk { .. } => Some(PendingCheck::TemporaryInsanity),
            Signal::IndefiniteInsanity { .. } => Some(PendingCheck::IndefiniteInsanity),
            _ => None,
        })
        .find(|check| check.is_sanity_check() && transition.investigator.pending.contains(*check))
        .map(PauseReason::Check)
        .or_else(|| {
            (transition.episode == Some(Insanity::Latent)).then_some(PauseReason::Episode)
        })
}
