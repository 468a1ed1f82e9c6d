//! Rule constants and tracker configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::investigator::DEFAULT_SANITY_CEILING;

/// Environment variable naming the roster save file.
pub const SAVE_PATH_ENV: &str = "KEEPER_SAVE_PATH";

/// Default roster file name.
pub const DEFAULT_SAVE_FILE: &str = "investigators.json";

/// Tunable constants used by the condition engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RulesConfig {
    /// Single sanity loss that calls for a temporary-insanity test.
    pub temporary_insanity_loss: i32,

    /// Session loss of `sanity / divisor` or more means indefinite insanity.
    pub indefinite_insanity_divisor: i32,

    /// Maximum sanity before Cthulhu Mythos is subtracted.
    pub sanity_ceiling: i32,

    /// Delay before a passed dying test is due again.
    pub dying_recheck_delay: Duration,

    /// Investigators created for a fresh roster.
    pub default_roster_size: usize,
}

impl RulesConfig {
    pub fn new() -> Self {
        Self {
            temporary_insanity_loss: 5,
            indefinite_insanity_divisor: 5,
            sanity_ceiling: DEFAULT_SANITY_CEILING,
            dying_recheck_delay: Duration::from_millis(50),
            default_roster_size: 5,
        }
    }

    /// Set the single-loss threshold for temporary insanity.
    pub fn with_temporary_insanity_loss(mut self, loss: i32) -> Self {
        self.temporary_insanity_loss = loss;
        self
    }

    /// Set the divisor for the indefinite-insanity threshold.
    pub fn with_indefinite_insanity_divisor(mut self, divisor: i32) -> Self {
        self.indefinite_insanity_divisor = divisor.max(1);
        self
    }

    pub fn with_sanity_ceiling(mut self, ceiling: i32) -> Self {
        self.sanity_ceiling = ceiling;
        self
    }

    /// Set how long after a passed dying test the next one is due.
    pub fn with_dying_recheck_delay(mut self, delay: Duration) -> Self {
        self.dying_recheck_delay = delay;
        self
    }

    pub fn with_default_roster_size(mut self, size: usize) -> Self {
        self.default_roster_size = size;
        self
    }

    /// Session sanity loss that triggers indefinite insanity.
    pub fn indefinite_threshold(&self, sanity_before: i32) -> i32 {
        sanity_before.div_euclid(self.indefinite_insanity_divisor.max(1))
    }
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for a tracker and its storage.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Rules the condition engine runs with.
    pub rules: RulesConfig,

    /// Where the roster is saved.
    pub save_path: PathBuf,

    /// Ignore any existing save and start a fresh roster.
    pub fresh: bool,
}

impl TrackerConfig {
    pub fn new() -> Self {
        Self {
            rules: RulesConfig::default(),
            save_path: PathBuf::from(DEFAULT_SAVE_FILE),
            fresh: false,
        }
    }

    /// Build a config, taking the save path from the environment if set.
    pub fn from_env() -> Self {
        let config = Self::new();
        match std::env::var(SAVE_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => config.with_save_path(path),
            _ => config,
        }
    }

    pub fn with_rules(mut self, rules: RulesConfig) -> Self {
        self.rules = rules;
        self
    }

    /// Set the roster save file.
    pub fn with_save_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.save_path = path.into();
        self
    }

    pub fn with_fresh(mut self, fresh: bool) -> Self {
        self.fresh = fresh;
        self
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rules() {
        let rules = RulesConfig::default();
        assert_eq!(rules.temporary_insanity_loss, 5);
        assert_eq!(rules.indefinite_insanity_divisor, 5);
        assert_eq!(rules.sanity_ceiling, 99);
        assert_eq!(rules.dying_recheck_delay, Duration::from_millis(50));
        assert_eq!(rules.default_roster_size, 5);
    }

    #[test]
    fn test_indefinite_threshold_floors() {
        let rules = RulesConfig::default();
        assert_eq!(rules.indefinite_threshold(50), 10);
        assert_eq!(rules.indefinite_threshold(54), 10);
        assert_eq!(rules.indefinite_threshold(4), 0);
    }

    #[test]
    fn test_divisor_never_zero() {
        let rules = RulesConfig::new().with_indefinite_insanity_divisor(0);
        assert_eq!(rules.indefinite_insanity_divisor, 1);
    }

    #[test]
    fn test_rules_serde() {
        let rules = RulesConfig::new().with_sanity_ceiling(80);
        let json = serde_json::to_string(&rules).unwrap();
        let back: RulesConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rules);
    }

    #[test]
    fn test_tracker_config_builder() {
        let config = TrackerConfig::new()
            .with_save_path("/tmp/roster.json")
            .with_fresh(true);
        assert_eq!(config.save_path, PathBuf::from("/tmp/roster.json"));
        assert!(config.fresh);
    }
}
