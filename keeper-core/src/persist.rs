//! Roster persistence.
//!
//! The roster and the session flag are saved together as one JSON document.
//! Loading is all-or-nothing for investigators: if any record is missing a
//! field the whole collection is rejected, though the session flag is kept
//! when it can still be read.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::Path;
use thiserror::Error;
use tokio::fs;

use crate::investigator::Investigator;

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid save format: {0}")]
    InvalidFormat(String),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

/// Current save file version.
const SAVE_VERSION: u32 = 1;

/// A saved roster with everything needed to resume tracking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedRoster {
    /// Save format version for compatibility checking.
    pub version: u32,

    /// When the save was created.
    pub saved_at: String,

    /// Whether a session was running.
    pub session_active: bool,

    /// Number used for the next default investigator name.
    pub next_number: u32,

    pub investigators: Vec<Investigator>,
}

impl SavedRoster {
    pub fn new(session_active: bool, next_number: u32, investigators: Vec<Investigator>) -> Self {
        Self {
            version: SAVE_VERSION,
            saved_at: chrono_now(),
            session_active,
            next_number,
            investigators,
        }
    }

    /// Save to a JSON file.
    pub async fn save_json(&self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).await?;
        Ok(())
    }

    /// Load from a JSON file, failing on any problem.
    pub async fn load_json(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let content = fs::read_to_string(path).await?;
        Self::parse(&content)
    }

    /// Parse and validate a saved roster.
    pub fn parse(content: &str) -> Result<Self, PersistError> {
        let saved: Self = serde_json::from_str(content)?;

        if saved.version != SAVE_VERSION {
            return Err(PersistError::VersionMismatch {
                expected: SAVE_VERSION,
                found: saved.version,
            });
        }

        let mut seen = HashSet::new();
        for investigator in &saved.investigators {
            if !seen.insert(investigator.id) {
                return Err(PersistError::InvalidFormat(format!(
                    "duplicate investigator id {}",
                    investigator.id
                )));
            }
        }

        Ok(saved)
    }

    /// Read only the session flag.
    pub fn peek_session(content: &str) -> Result<bool, PersistError> {
        #[derive(Deserialize)]
        struct Partial {
            session_active: bool,
        }

        let partial: Partial = serde_json::from_str(content)?;
        Ok(partial.session_active)
    }
}

/// Outcome of reading a roster file.
#[derive(Debug)]
pub enum LoadedRoster {
    /// No save file yet.
    Missing,
    Loaded(SavedRoster),
    /// The investigator collection was unusable.
    Rejected {
        session_active: bool,
        reason: String,
    },
}

/// Read a roster file, separating "nothing saved" and "unusable save" from
/// real I/O failures.
pub async fn load_roster(path: impl AsRef<Path>) -> Result<LoadedRoster, PersistError> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(LoadedRoster::Missing),
        Err(e) => return Err(e.into()),
    };

    match SavedRoster::parse(&content) {
        Ok(saved) => Ok(LoadedRoster::Loaded(saved)),
        Err(e) => Ok(LoadedRoster::Rejected {
            session_active: SavedRoster::peek_session(&content).unwrap_or(false),
            reason: e.to_string(),
        }),
    }
}

fn chrono_now() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();

    format!("{}", now.as_secs())
}
