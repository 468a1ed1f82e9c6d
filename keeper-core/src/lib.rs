//! Call of Cthulhu investigator tracker for the Keeper.
//!
//! This crate provides:
//! - Investigator sheets with derived health and sanity maxima
//! - A condition engine that turns HP and SAN losses into statuses and
//!   pending checks
//! - Resolvers for every pending check, plus bouts of madness
//! - A group sanity check sequencer with pause/resume
//! - Percentile skills graded by D100 skill checks
//! - Roster persistence
//!
//! # Quick Start
//!
//! ```ignore
//! use keeper_core::{RulesConfig, Stat, Tracker};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut tracker = Tracker::load("investigators.json", RulesConfig::default()).await?;
//!     tracker.start_session();
//!
//!     let id = tracker.id_at(0).expect("roster is not empty");
//!     let outcome = tracker.edit_stat(id, Stat::Sanity, "-6")?;
//!     for message in outcome.messages() {
//!         println!("{}", message);
//!     }
//!
//!     tracker.save("investigators.json").await?;
//!     Ok(())
//! }
//! ```

pub mod checks;
pub mod config;
pub mod episode;
pub mod investigator;
pub mod modifier;
pub mod persist;
pub mod rules;
pub mod sequencer;
pub mod skills;
pub mod testing;
pub mod tracker;

// Primary public API
pub use config::{RulesConfig, TrackerConfig};
pub use episode::{episode, episode_with_rng, DurationClass, Episode};
pub use investigator::{
    Characteristic, Characteristics, Condition, Insanity, Investigator, InvestigatorId, NoteField,
    PendingCheck, Pool, Stat, Vitality,
};
pub use modifier::{Modifier, ModifierError};
pub use persist::{PersistError, SavedRoster};
pub use rules::{Action, ConditionEngine, Rejected, Signal, StatusKind, Transition};
pub use sequencer::{GroupSanityCheck, GroupTurn, PauseReason, Progress, SequencerError};
pub use skills::{parse_skills, skill_check, SkillError, SuccessLevel};
pub use testing::TrackerHarness;
pub use tracker::{Outcome, Tracker, TrackerError};
