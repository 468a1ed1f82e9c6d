//! Group sanity check sequencer.
//!
//! Drives one shared sanity check across every living investigator:
//!
//! ```text
//! Idle -> CollectingInputs -> Running <-> Paused
//!   ^            |               |
//!   +------------+---------------+  (complete or cancel)
//! ```
//!
//! The sequencer only tracks order and progress. Applying losses is the
//! tracker's job, which reports back whether a turn needs to pause.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use tracing::{debug, error};

use crate::investigator::{InvestigatorId, PendingCheck};

/// Lowest and highest D100 roll accepted.
pub const ROLL_RANGE: std::ops::RangeInclusive<u32> = 1..=100;

/// Errors from sequencer operations. None of them change state, except
/// where noted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SequencerError {
    #[error("A group sanity check is already in progress")]
    AlreadyActive,

    #[error("No group sanity check is collecting inputs")]
    NotCollecting,

    #[error("No group sanity check is running")]
    NotRunning,

    #[error("The group sanity check is not paused")]
    NotPaused,

    #[error("Group sanity checks need an active session")]
    SessionInactive,

    #[error("Both SAN loss expressions (success/failure) are required")]
    MissingLossExpressions,

    #[error("No living investigators to check")]
    NoLivingInvestigators,

    #[error("Missing D100 rolls for: {}", .0.join(", "))]
    MissingRolls(Vec<String>),

    #[error("Invalid D100 roll {0}: must be between 1 and 100")]
    InvalidRoll(u32),

    #[error("SAN loss cannot be negative: {0}")]
    NegativeLoss(i32),

    #[error("It is not {0}'s turn")]
    WrongInvestigator(InvestigatorId),

    #[error("Resolve the {check} for {name} before continuing")]
    CheckStillPending { name: String, check: PendingCheck },

    /// The run has been aborted and the sequencer is idle again.
    #[error("Investigator {0} no longer exists; group sanity check aborted")]
    UnknownInvestigator(InvestigatorId),
}

/// What is holding up a paused run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PauseReason {
    /// A pending check raised by the loss.
    Check(PendingCheck),
    /// An automatic bout of madness from latent insanity.
    Episode,
}

impl fmt::Display for PauseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PauseReason::Check(check) => write!(f, "the {}", check),
            PauseReason::Episode => write!(f, "the bout of madness"),
        }
    }
}

/// Inputs gathered before a run starts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupInputs {
    pub success_loss: String,
    pub failure_loss: String,
    pub rolls: HashMap<InvestigatorId, u8>,
}

/// A run in progress. The order is captured once and never changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRun {
    pub success_loss: String,
    pub failure_loss: String,
    pub order: Vec<InvestigatorId>,
    pub rolls: HashMap<InvestigatorId, u8>,
    pub position: usize,
}

impl GroupRun {
    fn current(&self) -> Option<InvestigatorId> {
        self.order.get(self.position).copied()
    }
}

/// Where a paused run is waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pause {
    pub investigator: InvestigatorId,
    pub reason: PauseReason,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SequencerState {
    #[default]
    Idle,
    CollectingInputs(GroupInputs),
    Running(GroupRun),
    Paused { run: GroupRun, pause: Pause },
}

impl SequencerState {
    pub fn name(&self) -> &'static str {
        match self {
            SequencerState::Idle => "idle",
            SequencerState::CollectingInputs(_) => "collecting inputs",
            SequencerState::Running(_) => "running",
            SequencerState::Paused { .. } => "paused",
        }
    }
}

/// The active investigator's turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupTurn {
    pub investigator: InvestigatorId,
    pub roll: u8,
    pub success_loss: String,
    pub failure_loss: String,
    /// Zero-based position in the captured order.
    pub position: usize,
    pub total: usize,
}

impl GroupTurn {
    /// A roll at or under current sanity succeeds.
    pub fn succeeded(&self, sanity: i32) -> bool {
        i32::from(self.roll) <= sanity
    }

    /// The loss expression that applies for this roll.
    pub fn applicable_loss(&self, sanity: i32) -> &str {
        if self.succeeded(sanity) {
            &self.success_loss
        } else {
            &self.failure_loss
        }
    }
}

/// Result of finishing a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Next(InvestigatorId),
    Paused(Pause),
    Complete,
}

/// The group sanity check state machine.
#[derive(Debug, Clone, Default)]
pub struct GroupSanityCheck {
    state: SequencerState,
}

impl GroupSanityCheck {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SequencerState {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == SequencerState::Idle
    }

    /// Start collecting inputs.
    pub fn open(&mut self) -> Result<(), SequencerError> {
        if !self.is_idle() {
            return Err(SequencerError::AlreadyActive);
        }
        self.state = SequencerState::CollectingInputs(GroupInputs::default());
        debug!("Group sanity check collecting inputs");
        Ok(())
    }

    fn inputs_mut(&mut self) -> Result<&mut GroupInputs, SequencerError> {
        match &mut self.state {
            SequencerState::CollectingInputs(inputs) => Ok(inputs),
            _ => Err(SequencerError::NotCollecting),
        }
    }

    /// Set the success and failure loss labels, e.g. `0` and `1D6`.
    pub fn set_losses(
        &mut self,
        success_loss: impl Into<String>,
        failure_loss: impl Into<String>,
    ) -> Result<(), SequencerError> {
        let inputs = self.inputs_mut()?;
        inputs.success_loss = success_loss.into();
        inputs.failure_loss = failure_loss.into();
        Ok(())
    }

    /// Record an investigator's D100 roll.
    pub fn set_roll(&mut self, id: InvestigatorId, roll: u32) -> Result<(), SequencerError> {
        let inputs = self.inputs_mut()?;
        if !ROLL_RANGE.contains(&roll) {
            return Err(SequencerError::InvalidRoll(roll));
        }
        inputs.rolls.insert(id, roll as u8);
        Ok(())
    }

    /// Begin the run over the living investigators, in roster order.
    ///
    /// Stays in `CollectingInputs` if anything is missing.
    pub fn start(
        &mut self,
        living: &[(InvestigatorId, String)],
    ) -> Result<InvestigatorId, SequencerError> {
        let inputs = self.inputs_mut()?;

        if inputs.success_loss.trim().is_empty() || inputs.failure_loss.trim().is_empty() {
            return Err(SequencerError::MissingLossExpressions);
        }
        let Some((first, _)) = living.first() else {
            return Err(SequencerError::NoLivingInvestigators);
        };
        let missing: Vec<String> = living
            .iter()
            .filter(|(id, _)| !inputs.rolls.contains_key(id))
            .map(|(_, name)| name.clone())
            .collect();
        if !missing.is_empty() {
            return Err(SequencerError::MissingRolls(missing));
        }

        let first = *first;
        let inputs = std::mem::take(inputs);
        let order: Vec<InvestigatorId> = living.iter().map(|(id, _)| *id).collect();
        debug!(count = order.len(), "Group sanity check running");
        self.state = SequencerState::Running(GroupRun {
            success_loss: inputs.success_loss.trim().to_string(),
            failure_loss: inputs.failure_loss.trim().to_string(),
            order,
            rolls: inputs.rolls,
            position: 0,
        });
        Ok(first)
    }

    /// The active turn, if running and not paused.
    pub fn turn(&self) -> Option<GroupTurn> {
        let SequencerState::Running(run) = &self.state else {
            return None;
        };
        let investigator = run.current()?;
        Some(GroupTurn {
            investigator,
            roll: run.rolls.get(&investigator).copied()?,
            success_loss: run.success_loss.clone(),
            failure_loss: run.failure_loss.clone(),
            position: run.position,
            total: run.order.len(),
        })
    }

    /// Where the run is paused, if it is.
    pub fn pause(&self) -> Option<Pause> {
        match &self.state {
            SequencerState::Paused { pause, .. } => Some(*pause),
            _ => None,
        }
    }

    /// Finish the active investigator's turn, pausing if the loss needs
    /// follow-up.
    pub fn record(
        &mut self,
        id: InvestigatorId,
        pause: Option<PauseReason>,
    ) -> Result<Progress, SequencerError> {
        let SequencerState::Running(run) = &self.state else {
            return Err(SequencerError::NotRunning);
        };
        if run.current() != Some(id) {
            return Err(SequencerError::WrongInvestigator(id));
        }

        match pause {
            Some(reason) => {
                let pause = Pause {
                    investigator: id,
                    reason,
                };
                if let SequencerState::Running(run) = std::mem::take(&mut self.state) {
                    self.state = SequencerState::Paused { run, pause };
                }
                debug!(investigator = %id, ?reason, "Group sanity check paused");
                Ok(Progress::Paused(pause))
            }
            None => Ok(self.advance()),
        }
    }

    /// Resume a paused run once its check is resolved.
    ///
    /// `still_pending` is whether the recorded check is still outstanding on
    /// the paused investigator; `name` is used for the error message.
    pub fn resume(&mut self, still_pending: bool, name: &str) -> Result<Progress, SequencerError> {
        let SequencerState::Paused { pause, .. } = &self.state else {
            return Err(SequencerError::NotPaused);
        };
        if still_pending {
            if let PauseReason::Check(check) = pause.reason {
                return Err(SequencerError::CheckStillPending {
                    name: name.to_string(),
                    check,
                });
            }
        }

        if let SequencerState::Paused { run, .. } = std::mem::take(&mut self.state) {
            self.state = SequencerState::Running(run);
        }
        debug!("Group sanity check resumed");
        Ok(self.advance())
    }

    fn advance(&mut self) -> Progress {
        let SequencerState::Running(run) = &mut self.state else {
            return Progress::Complete;
        };
        run.position += 1;
        match run.current() {
            Some(next) => Progress::Next(next),
            None => {
                self.state = SequencerState::Idle;
                debug!("Group sanity check complete");
                Progress::Complete
            }
        }
    }

    /// Abandon the check from any state. Investigators already processed
    /// keep their committed losses. Returns false if nothing was active.
    pub fn cancel(&mut self) -> bool {
        let was = self.state.name();
        let active = !self.is_idle();
        self.state = SequencerState::Idle;
        if active {
            debug!(state = was, "Group sanity check cancelled");
        }
        active
    }

    /// Drop the run after a missing investigator.
    pub(crate) fn abort(&mut self, id: InvestigatorId) -> SequencerError {
        error!(investigator = %id, state = self.state.name(), "Group sanity check aborted: investigator missing");
        self.state = SequencerState::Idle;
        SequencerError::UnknownInvestigator(id)
    }
}
