//! Percentile skills and D100 skill checks.
//!
//! Skill values live in 0..=100. A check compares a D100 roll against the
//! value and grades it: a 1 is always critical, a 100 always a fumble, and a
//! failed roll of 96 or more fumbles when the skill is under 50. Successes
//! are extreme at a fifth of the skill or less, hard at half or less.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::RangeInclusive;
use thiserror::Error;

/// Legal skill values.
pub const SKILL_RANGE: RangeInclusive<i32> = 0..=100;

/// Legal D100 results.
pub const D100_RANGE: RangeInclusive<u32> = 1..=100;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkillError {
    #[error("Roll {0} is not a D100 result (1-100)")]
    InvalidRoll(u32),

    #[error("Skill value {0} is outside 0-100")]
    InvalidValue(i32),

    #[error("Skill name is empty")]
    EmptyName,

    #[error("Expected 'Name: value', got '{0}'")]
    Malformed(String),

    #[error("No skills found")]
    NoSkills,
}

/// How well a skill roll went.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SuccessLevel {
    Critical,
    Extreme,
    Hard,
    Regular,
    Failure,
    Fumble,
}

impl SuccessLevel {
    pub fn name(&self) -> &'static str {
        match self {
            SuccessLevel::Critical => "critical success",
            SuccessLevel::Extreme => "extreme success",
            SuccessLevel::Hard => "hard success",
            SuccessLevel::Regular => "regular success",
            SuccessLevel::Failure => "failure",
            SuccessLevel::Fumble => "fumble",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(
            self,
            SuccessLevel::Critical
                | SuccessLevel::Extreme
                | SuccessLevel::Hard
                | SuccessLevel::Regular
        )
    }
}

impl fmt::Display for SuccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Grade a D100 roll against a skill value.
pub fn skill_check(skill: i32, roll: u32) -> Result<SuccessLevel, SkillError> {
    if !SKILL_RANGE.contains(&skill) {
        return Err(SkillError::InvalidValue(skill));
    }
    if !D100_RANGE.contains(&roll) {
        return Err(SkillError::InvalidRoll(roll));
    }

    // Both ranges are checked above
    let roll = roll as i32;
    let level = if roll == 1 {
        SuccessLevel::Critical
    } else if roll == 100 {
        SuccessLevel::Fumble
    } else if roll > skill {
        if roll >= 96 && skill < 50 {
            SuccessLevel::Fumble
        } else {
            SuccessLevel::Failure
        }
    } else if roll <= skill / 5 {
        SuccessLevel::Extreme
    } else if roll <= skill / 2 {
        SuccessLevel::Hard
    } else {
        SuccessLevel::Regular
    };
    Ok(level)
}

/// Validate a single skill entry.
pub fn validate_skill(name: &str, value: i32) -> Result<String, SkillError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(SkillError::EmptyName);
    }
    if !SKILL_RANGE.contains(&value) {
        return Err(SkillError::InvalidValue(value));
    }
    Ok(name.to_string())
}

/// Parse `Name: value` lines into a skill map.
///
/// Blank lines are skipped. Any other line that does not parse fails the
/// whole block, and so does a block with no skills in it.
pub fn parse_skills(text: &str) -> Result<BTreeMap<String, i32>, SkillError> {
    let mut skills = BTreeMap::new();

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let mut parts = line.split(':');
        let (Some(name), Some(value), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(SkillError::Malformed(line.to_string()));
        };
        let value: i32 = value
            .trim()
            .parse()
            .map_err(|_| SkillError::Malformed(line.to_string()))?;
        let name = validate_skill(name, value)?;
        skills.insert(name, value);
    }

    if skills.is_empty() {
        return Err(SkillError::NoSkills);
    }
    Ok(skills)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_is_always_critical() {
        assert_eq!(skill_check(0, 1), Ok(SuccessLevel::Critical));
        assert_eq!(skill_check(100, 1), Ok(SuccessLevel::Critical));
    }

    #[test]
    fn test_hundred_is_always_fumble() {
        assert_eq!(skill_check(100, 100), Ok(SuccessLevel::Fumble));
        assert_eq!(skill_check(60, 100), Ok(SuccessLevel::Fumble));
    }

    #[test]
    fn test_high_failures_fumble_below_fifty() {
        assert_eq!(skill_check(49, 96), Ok(SuccessLevel::Fumble));
        assert_eq!(skill_check(49, 95), Ok(SuccessLevel::Failure));
        assert_eq!(skill_check(50, 96), Ok(SuccessLevel::Failure));
        assert_eq!(skill_check(50, 99), Ok(SuccessLevel::Failure));
    }

    #[test]
    fn test_success_thresholds() {
        // 60: extreme at 12, hard at 30
        assert_eq!(skill_check(60, 12), Ok(SuccessLevel::Extreme));
        assert_eq!(skill_check(60, 13), Ok(SuccessLevel::Hard));
        assert_eq!(skill_check(60, 30), Ok(SuccessLevel::Hard));
        assert_eq!(skill_check(60, 31), Ok(SuccessLevel::Regular));
        assert_eq!(skill_check(60, 60), Ok(SuccessLevel::Regular));
        assert_eq!(skill_check(60, 61), Ok(SuccessLevel::Failure));
    }

    #[test]
    fn test_thresholds_round_down() {
        // 47: extreme at 9, hard at 23
        assert_eq!(skill_check(47, 9), Ok(SuccessLevel::Extreme));
        assert_eq!(skill_check(47, 10), Ok(SuccessLevel::Hard));
        assert_eq!(skill_check(47, 23), Ok(SuccessLevel::Hard));
        assert_eq!(skill_check(47, 24), Ok(SuccessLevel::Regular));
    }

    #[test]
    fn test_rejects_out_of_range() {
        assert_eq!(skill_check(50, 0), Err(SkillError::InvalidRoll(0)));
        assert_eq!(skill_check(50, 101), Err(SkillError::InvalidRoll(101)));
        assert_eq!(skill_check(101, 50), Err(SkillError::InvalidValue(101)));
        assert_eq!(skill_check(-1, 50), Err(SkillError::InvalidValue(-1)));
    }

    #[test]
    fn test_parse_skills() {
        let skills = parse_skills("Spot Hidden: 60\n\n  Dodge : 30\nLibrary Use:0").unwrap();
        assert_eq!(skills.len(), 3);
        assert_eq!(skills["Spot Hidden"], 60);
        assert_eq!(skills["Dodge"], 30);
        assert_eq!(skills["Library Use"], 0);
    }

    #[test]
    fn test_parse_skills_is_all_or_nothing() {
        assert_eq!(
            parse_skills("Spot Hidden: 60\nDodge 30"),
            Err(SkillError::Malformed("Dodge 30".to_string()))
        );
        assert_eq!(
            parse_skills("Spot Hidden: 60\nDodge: 130"),
            Err(SkillError::InvalidValue(130))
        );
        assert_eq!(parse_skills("Time: 10:30"), Err(SkillError::Malformed("Time: 10:30".to_string())));
        assert_eq!(parse_skills(": 40"), Err(SkillError::EmptyName));
        assert_eq!(parse_skills("  \n "), Err(SkillError::NoSkills));
    }
}
