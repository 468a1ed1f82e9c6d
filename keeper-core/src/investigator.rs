//! Call of Cthulhu investigator types.
//!
//! Contains everything tracked per investigator: characteristics, the
//! health and sanity pools with their derived maxima, the condition axes,
//! pending checks, percentile skills, and the free-text notes the engine
//! never interprets.

use crate::skills::SKILL_RANGE;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Sanity ceiling before Cthulhu Mythos is subtracted.
pub const DEFAULT_SANITY_CEILING: i32 = 99;

/// Deserialize an `Option` field that must still be present in the input.
///
/// Plain `Option` fields quietly default to `None` when missing, which would
/// let a truncated save resurrect an investigator in an unknown state.
fn required<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer)
}

// ============================================================================
// ID Types
// ============================================================================

/// Unique identifier for investigators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InvestigatorId(pub Uuid);

impl InvestigatorId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for InvestigatorId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InvestigatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for InvestigatorId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

// ============================================================================
// Characteristics
// ============================================================================

/// The characteristics printed on an investigator sheet, plus Cthulhu Mythos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Characteristic {
    Strength,
    Constitution,
    Size,
    Dexterity,
    Appearance,
    Intelligence,
    Power,
    Education,
    Luck,
    Mythos,
}

impl Characteristic {
    pub fn abbreviation(&self) -> &'static str {
        match self {
            Characteristic::Strength => "STR",
            Characteristic::Constitution => "CON",
            Characteristic::Size => "SIZ",
            Characteristic::Dexterity => "DEX",
            Characteristic::Appearance => "APP",
            Characteristic::Intelligence => "INT",
            Characteristic::Power => "POW",
            Characteristic::Education => "EDU",
            Characteristic::Luck => "LUCK",
            Characteristic::Mythos => "MYTHOS",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Characteristic::Strength => "Strength",
            Characteristic::Constitution => "Constitution",
            Characteristic::Size => "Size",
            Characteristic::Dexterity => "Dexterity",
            Characteristic::Appearance => "Appearance",
            Characteristic::Intelligence => "Intelligence",
            Characteristic::Power => "Power",
            Characteristic::Education => "Education",
            Characteristic::Luck => "Luck",
            Characteristic::Mythos => "Cthulhu Mythos",
        }
    }

    /// Whether a change to this characteristic moves a derived maximum.
    pub fn affects_maxima(&self) -> bool {
        matches!(
            self,
            Characteristic::Constitution | Characteristic::Size | Characteristic::Mythos
        )
    }

    pub fn all() -> [Characteristic; 10] {
        [
            Characteristic::Strength,
            Characteristic::Constitution,
            Characteristic::Size,
            Characteristic::Dexterity,
            Characteristic::Appearance,
            Characteristic::Intelligence,
            Characteristic::Power,
            Characteristic::Education,
            Characteristic::Luck,
            Characteristic::Mythos,
        ]
    }
}

impl fmt::Display for Characteristic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.abbreviation())
    }
}

/// Characteristic values container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Characteristics {
    pub strength: i32,
    pub constitution: i32,
    pub size: i32,
    pub dexterity: i32,
    pub appearance: i32,
    pub intelligence: i32,
    pub power: i32,
    pub education: i32,
    pub luck: i32,
    pub mythos: i32,
}

impl Characteristics {
    pub fn get(&self, characteristic: Characteristic) -> i32 {
        match characteristic {
            Characteristic::Strength => self.strength,
            Characteristic::Constitution => self.constitution,
            Characteristic::Size => self.size,
            Characteristic::Dexterity => self.dexterity,
            Characteristic::Appearance => self.appearance,
            Characteristic::Intelligence => self.intelligence,
            Characteristic::Power => self.power,
            Characteristic::Education => self.education,
            Characteristic::Luck => self.luck,
            Characteristic::Mythos => self.mythos,
        }
    }

    pub fn set(&mut self, characteristic: Characteristic, value: i32) {
        match characteristic {
            Characteristic::Strength => self.strength = value,
            Characteristic::Constitution => self.constitution = value,
            Characteristic::Size => self.size = value,
            Characteristic::Dexterity => self.dexterity = value,
            Characteristic::Appearance => self.appearance = value,
            Characteristic::Intelligence => self.intelligence = value,
            Characteristic::Power => self.power = value,
            Characteristic::Education => self.education = value,
            Characteristic::Luck => self.luck = value,
            Characteristic::Mythos => self.mythos = value,
        }
    }
}

impl Default for Characteristics {
    fn default() -> Self {
        Self {
            strength: 50,
            constitution: 50,
            size: 50,
            dexterity: 50,
            appearance: 50,
            intelligence: 50,
            power: 50,
            education: 50,
            luck: 50,
            mythos: 0,
        }
    }
}

/// Maximum hit points: (CON + SIZ) / 10, never below 1.
pub fn max_health(constitution: i32, size: i32) -> i32 {
    constitution.saturating_add(size).div_euclid(10).max(1)
}

/// Maximum sanity: the ceiling minus Cthulhu Mythos, never below 0.
pub fn max_sanity(mythos: i32, ceiling: i32) -> i32 {
    ceiling.saturating_sub(mythos).max(0)
}

// ============================================================================
// Pools
// ============================================================================

/// A tracked resource with a current value and a derived maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub current: i32,
    pub maximum: i32,
}

impl Pool {
    /// A full pool.
    pub fn new(maximum: i32) -> Self {
        Self {
            current: maximum,
            maximum,
        }
    }

    pub fn with_current(mut self, current: i32) -> Self {
        self.current = self.clamp(current);
        self
    }

    /// Clamp a proposed value into `[0, maximum]`.
    pub fn clamp(&self, value: i32) -> i32 {
        value.clamp(0, self.maximum.max(0))
    }

    /// Move the maximum; the current value is pulled down if it no longer fits.
    pub fn set_maximum(&mut self, maximum: i32) {
        self.maximum = maximum;
        if self.current > maximum {
            self.current = maximum;
        }
    }

    pub fn is_depleted(&self) -> bool {
        self.current <= 0
    }
}

/// Anything the operator can edit numerically on a sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stat {
    Health,
    Sanity,
    Characteristic(Characteristic),
}

impl Stat {
    pub fn name(&self) -> &'static str {
        match self {
            Stat::Health => "HP",
            Stat::Sanity => "SAN",
            Stat::Characteristic(c) => c.abbreviation(),
        }
    }
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ============================================================================
// Condition
// ============================================================================

/// Physical state, from fully conscious to dead.
///
/// Every state other than `Conscious` counts as unconscious, so dying and
/// stabilized can never coexist and neither can occur while awake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Vitality {
    #[default]
    Conscious,
    Unconscious,
    Dying,
    Stabilized,
    Dead,
}

impl Vitality {
    pub fn name(&self) -> &'static str {
        match self {
            Vitality::Conscious => "Conscious",
            Vitality::Unconscious => "Unconscious",
            Vitality::Dying => "Dying",
            Vitality::Stabilized => "Stabilized",
            Vitality::Dead => "Dead",
        }
    }

    pub fn is_unconscious(&self) -> bool {
        !matches!(self, Vitality::Conscious)
    }
}

impl fmt::Display for Vitality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// The three mutually exclusive insanity variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Insanity {
    Temporary,
    Indefinite,
    Latent,
}

impl Insanity {
    pub fn name(&self) -> &'static str {
        match self {
            Insanity::Temporary => "Temporary Insanity",
            Insanity::Indefinite => "Indefinite Insanity",
            Insanity::Latent => "Latent Insanity",
        }
    }
}

impl fmt::Display for Insanity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Status of an investigator along three independent axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Condition {
    pub major_wound: bool,
    pub vitality: Vitality,
    #[serde(deserialize_with = "required")]
    pub insanity: Option<Insanity>,
}

impl Condition {
    /// The terminal condition. Only a major wound survives death.
    pub fn dead(major_wound: bool) -> Self {
        Self {
            major_wound,
            vitality: Vitality::Dead,
            insanity: None,
        }
    }

    pub fn is_dead(&self) -> bool {
        self.vitality == Vitality::Dead
    }

    pub fn is_dying(&self) -> bool {
        self.vitality == Vitality::Dying
    }

    pub fn is_stabilized(&self) -> bool {
        self.vitality == Vitality::Stabilized
    }

    pub fn is_unconscious(&self) -> bool {
        self.vitality.is_unconscious()
    }

    /// Human-readable labels for every active status.
    pub fn labels(&self) -> Vec<&'static str> {
        let mut labels = Vec::new();
        if self.major_wound {
            labels.push("Major Wound");
        }
        if self.vitality != Vitality::Conscious {
            labels.push(self.vitality.name());
        }
        if let Some(insanity) = self.insanity {
            labels.push(insanity.name());
        }
        labels
    }
}

// ============================================================================
// Pending Checks
// ============================================================================

/// A manual confirmation the operator owes before play continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PendingCheck {
    MajorWound,
    TemporaryInsanity,
    IndefiniteInsanity,
    Dying,
    LatentInsanity,
}

impl PendingCheck {
    pub fn description(&self) -> &'static str {
        match self {
            PendingCheck::MajorWound => "major-wound CON test",
            PendingCheck::TemporaryInsanity => "temporary-insanity INT test",
            PendingCheck::IndefiniteInsanity => "indefinite-insanity confirmation",
            PendingCheck::Dying => "dying CON test",
            PendingCheck::LatentInsanity => "latent-insanity confirmation",
        }
    }

    /// Checks that can hold up a group sanity check.
    pub fn is_sanity_check(&self) -> bool {
        matches!(
            self,
            PendingCheck::TemporaryInsanity | PendingCheck::IndefiniteInsanity
        )
    }
}

impl fmt::Display for PendingCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Set of outstanding checks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PendingChecks(BTreeSet<PendingCheck>);

impl PendingChecks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the check was not already pending.
    pub fn raise(&mut self, check: PendingCheck) -> bool {
        self.0.insert(check)
    }

    /// Returns true if the check was pending.
    pub fn clear(&mut self, check: PendingCheck) -> bool {
        self.0.remove(&check)
    }

    pub fn clear_all(&mut self) {
        self.0.clear();
    }

    pub fn contains(&self, check: PendingCheck) -> bool {
        self.0.contains(&check)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = PendingCheck> + '_ {
        self.0.iter().copied()
    }
}

// ============================================================================
// Notes
// ============================================================================

/// Background entries on the reverse of the sheet.
pub const BACKGROUND_KEYS: [&str; 10] = [
    "description",
    "ideology",
    "significant_people",
    "meaningful_locations",
    "treasured_possessions",
    "traits",
    "injuries",
    "phobias_manias",
    "arcane_tomes",
    "encounters",
];

/// Free text carried alongside the sheet. The engine never reads it.
///
/// `skills` holds anything the operator keeps beside the skill values, such
/// as specialisations or a pasted block that did not parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notes {
    pub skills: String,
    pub inventory: String,
    pub background: BTreeMap<String, String>,
}

impl Default for Notes {
    fn default() -> Self {
        Self {
            skills: String::new(),
            inventory: String::new(),
            background: BACKGROUND_KEYS
                .iter()
                .map(|key| (key.to_string(), String::new()))
                .collect(),
        }
    }
}

/// Which free-text field an edit targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteField {
    Skills,
    Inventory,
    Background(String),
}

// ============================================================================
// Investigator
// ============================================================================

/// A player character and all of its tracked state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Investigator {
    pub id: InvestigatorId,
    /// Character name.
    pub name: String,
    /// Name of the person playing.
    pub player: String,

    pub characteristics: Characteristics,
    pub health: Pool,
    pub sanity: Pool,

    pub condition: Condition,
    pub pending: PendingChecks,

    /// Sanity lost since the current session started.
    pub session_sanity_lost: i32,

    /// Percentile skills by name.
    pub skills: BTreeMap<String, i32>,
    pub notes: Notes,
}

impl Investigator {
    /// Create an investigator with default characteristics and full pools.
    pub fn new(name: impl Into<String>, player: impl Into<String>) -> Self {
        Self::with_characteristics(name, player, Characteristics::default())
    }

    /// Create an investigator from rolled characteristics.
    ///
    /// Health starts full and sanity starts at POW.
    pub fn with_characteristics(
        name: impl Into<String>,
        player: impl Into<String>,
        characteristics: Characteristics,
    ) -> Self {
        let health = Pool::new(max_health(characteristics.constitution, characteristics.size));
        let sanity = Pool::new(max_sanity(characteristics.mythos, DEFAULT_SANITY_CEILING))
            .with_current(characteristics.power);

        Self {
            id: InvestigatorId::new(),
            name: name.into(),
            player: player.into(),
            characteristics,
            health,
            sanity,
            condition: Condition::default(),
            pending: PendingChecks::new(),
            session_sanity_lost: 0,
            skills: BTreeMap::new(),
            notes: Notes::default(),
        }
    }

    pub fn is_dead(&self) -> bool {
        self.condition.is_dead()
    }

    pub fn is_alive(&self) -> bool {
        !self.is_dead()
    }

    pub fn stat(&self, stat: Stat) -> i32 {
        match stat {
            Stat::Health => self.health.current,
            Stat::Sanity => self.sanity.current,
            Stat::Characteristic(c) => self.characteristics.get(c),
        }
    }

    /// Clamp a proposed value the way the sheet would store it.
    pub fn clamp_stat(&self, stat: Stat, value: i32) -> i32 {
        match stat {
            Stat::Health => self.health.clamp(value),
            Stat::Sanity => self.sanity.clamp(value),
            Stat::Characteristic(_) => value.max(0),
        }
    }

    /// Write a value without running any rules.
    pub fn set_stat(&mut self, stat: Stat, value: i32) {
        match stat {
            Stat::Health => self.health.current = value,
            Stat::Sanity => self.sanity.current = value,
            Stat::Characteristic(c) => self.characteristics.set(c, value),
        }
    }

    /// Recompute both maxima from characteristics and re-clamp the pools.
    pub fn recompute_maxima(&mut self, sanity_ceiling: i32) {
        let c = &self.characteristics;
        let health = max_health(c.constitution, c.size);
        let sanity = max_sanity(c.mythos, sanity_ceiling);
        self.health.set_maximum(health);
        self.sanity.set_maximum(sanity);
        self.health.current = self.health.current.max(0);
        self.sanity.current = self.sanity.current.max(0);
    }

    /// Mark the investigator dead, dropping everything death overrides.
    pub fn kill(&mut self) {
        self.condition = Condition::dead(self.condition.major_wound);
        self.pending.clear_all();
    }

    /// Repair a snapshot restored from storage.
    ///
    /// Saved data may predate a rules change or have been edited by hand, so
    /// maxima are recomputed and statuses brought back in line.
    pub fn normalize(&mut self, sanity_ceiling: i32, session_active: bool) {
        self.recompute_maxima(sanity_ceiling);
        for value in self.skills.values_mut() {
            *value = (*value).clamp(*SKILL_RANGE.start(), *SKILL_RANGE.end());
        }

        match self.condition.vitality {
            Vitality::Dead => self.kill(),
            Vitality::Dying => {
                self.pending.raise(PendingCheck::Dying);
            }
            Vitality::Stabilized | Vitality::Conscious => {
                self.pending.clear(PendingCheck::Dying);
            }
            Vitality::Unconscious => {}
        }

        if self.condition.insanity != Some(Insanity::Temporary) {
            self.pending.clear(PendingCheck::LatentInsanity);
        }

        if !session_active {
            self.session_sanity_lost = 0;
            self.pending.clear_all();
        }
    }

    /// Update one of the free-text fields.
    pub fn set_note(&mut self, field: NoteField, text: impl Into<String>) {
        let text = text.into();
        match field {
            NoteField::Skills => self.notes.skills = text,
            NoteField::Inventory => self.notes.inventory = text,
            NoteField::Background(key) => {
                self.notes.background.insert(key, text);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_investigator_pools() {
        let investigator = Investigator::new("Harvey Walters", "Ana");
        assert_eq!(investigator.health, Pool::new(10));
        assert_eq!(investigator.sanity.current, 50);
        assert_eq!(investigator.sanity.maximum, 99);
        assert!(investigator.pending.is_empty());
        assert_eq!(investigator.condition, Condition::default());
    }

    #[test]
    fn test_max_health_floors_and_minimum() {
        assert_eq!(max_health(50, 50), 10);
        assert_eq!(max_health(45, 60), 10);
        assert_eq!(max_health(55, 60), 11);
        assert_eq!(max_health(0, 5), 1);
        assert_eq!(max_health(i32::MAX, i32::MAX), i32::MAX / 10);
    }

    #[test]
    fn test_max_sanity_subtracts_mythos() {
        assert_eq!(max_sanity(0, 99), 99);
        assert_eq!(max_sanity(14, 99), 85);
        assert_eq!(max_sanity(120, 99), 0);
    }

    #[test]
    fn test_recompute_maxima_clamps_current() {
        let mut investigator = Investigator::new("Carl Stanford", "Bo");
        investigator.characteristics.constitution = 30;
        investigator.characteristics.size = 40;
        investigator.recompute_maxima(DEFAULT_SANITY_CEILING);
        assert_eq!(investigator.health.maximum, 7);
        assert_eq!(investigator.health.current, 7);

        investigator.characteristics.mythos = 60;
        investigator.recompute_maxima(DEFAULT_SANITY_CEILING);
        assert_eq!(investigator.sanity.maximum, 39);
        assert_eq!(investigator.sanity.current, 39);
    }

    #[test]
    fn test_raising_maximum_keeps_current() {
        let mut pool = Pool::new(10).with_current(4);
        pool.set_maximum(12);
        assert_eq!(pool.current, 4);
        assert_eq!(pool.maximum, 12);
    }

    #[test]
    fn test_kill_keeps_only_major_wound() {
        let mut investigator = Investigator::new("Kate Winthrop", "Cy");
        investigator.condition.major_wound = true;
        investigator.condition.vitality = Vitality::Dying;
        investigator.condition.insanity = Some(Insanity::Temporary);
        investigator.pending.raise(PendingCheck::Dying);

        investigator.kill();

        assert!(investigator.is_dead());
        assert!(investigator.condition.major_wound);
        assert!(investigator.condition.is_unconscious());
        assert_eq!(investigator.condition.insanity, None);
        assert!(investigator.pending.is_empty());
    }

    #[test]
    fn test_normalize_rearms_dying_check() {
        let mut investigator = Investigator::new("Jenny Barnes", "Di");
        investigator.condition.vitality = Vitality::Dying;
        investigator.normalize(DEFAULT_SANITY_CEILING, true);
        assert!(investigator.pending.contains(PendingCheck::Dying));
    }

    #[test]
    fn test_normalize_outside_session_drops_checks() {
        let mut investigator = Investigator::new("Joe Diamond", "Ed");
        investigator.session_sanity_lost = 7;
        investigator.pending.raise(PendingCheck::TemporaryInsanity);
        investigator.normalize(DEFAULT_SANITY_CEILING, false);
        assert_eq!(investigator.session_sanity_lost, 0);
        assert!(investigator.pending.is_empty());
    }

    #[test]
    fn test_missing_insanity_field_is_rejected() {
        let json = r#"{"major_wound": false, "vitality": "Conscious"}"#;
        assert!(serde_json::from_str::<Condition>(json).is_err());

        let json = r#"{"major_wound": false, "vitality": "Conscious", "insanity": null}"#;
        let condition: Condition = serde_json::from_str(json).unwrap();
        assert_eq!(condition.insanity, None);
    }

    #[test]
    fn test_condition_labels() {
        let condition = Condition {
            major_wound: true,
            vitality: Vitality::Stabilized,
            insanity: Some(Insanity::Latent),
        };
        assert_eq!(
            condition.labels(),
            vec!["Major Wound", "Stabilized", "Latent Insanity"]
        );
    }
}
