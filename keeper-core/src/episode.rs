//! Bouts of madness.
//!
//! An episode is flavor output attached to a signal whenever an
//! investigator enters, or relapses into, an insanity state. Generating
//! one never touches investigator state.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::investigator::Insanity;

/// Real-time bouts of madness, indexed by a 1D10 roll minus one.
pub const BOUTS_OF_MADNESS: [&str; 10] = [
    "Amnesia: forgets recent events (1D10 rounds).",
    "Psychosomatic disability: blindness, deafness or paralysis (1D10 rounds).",
    "Violence: lashes out indiscriminately (1D10 rounds).",
    "Paranoia: extreme distrust, everyone is conspiring (1D10 rounds).",
    "Significant person: mistakes someone for a key figure from their backstory (1D10 rounds).",
    "Faint: falls unconscious (1D10 rounds).",
    "Flee in panic: runs away without control (1D10 rounds).",
    "Hysterics or emotional outburst: uncontrollable laughing, crying or screaming (1D10 rounds).",
    "Phobia: gains a new phobia and reacts to it (1D10 rounds).",
    "Mania: gains a new mania and acts on it (1D10 rounds).",
];

/// How long the underlying insanity lasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DurationClass {
    Hours,
    Months,
    UntilCuredOrEpisodeEnds,
}

impl DurationClass {
    pub fn for_insanity(kind: Insanity) -> Self {
        match kind {
            Insanity::Temporary => DurationClass::Hours,
            Insanity::Indefinite => DurationClass::Months,
            Insanity::Latent => DurationClass::UntilCuredOrEpisodeEnds,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            DurationClass::Hours => "1D10 hours",
            DurationClass::Months => "months (until cured)",
            DurationClass::UntilCuredOrEpisodeEnds => {
                "until cured (indefinite) or until the episode ends (temporary)"
            }
        }
    }
}

impl fmt::Display for DurationClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// A rolled bout of madness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Episode {
    pub investigator: String,
    pub kind: Insanity,
    /// Table index, 0..=9.
    pub roll: u8,
    pub description: String,
    pub duration: DurationClass,
}

impl Episode {
    /// Build the episode for a known table index.
    pub fn from_roll(investigator: impl Into<String>, kind: Insanity, roll: u8) -> Self {
        let index = usize::from(roll) % BOUTS_OF_MADNESS.len();
        Self {
            investigator: investigator.into(),
            kind,
            roll: index as u8,
            description: BOUTS_OF_MADNESS[index].to_string(),
            duration: DurationClass::for_insanity(kind),
        }
    }
}

impl fmt::Display for Episode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Bout of madness for {} ({})! 1D10 = {}: {} Underlying state lasts {}.",
            self.investigator,
            self.kind,
            self.roll + 1,
            self.description,
            self.duration
        )
    }
}

/// Roll a bout of madness.
pub fn episode(investigator: impl Into<String>, kind: Insanity) -> Episode {
    episode_with_rng(investigator, kind, &mut rand::thread_rng())
}

/// Roll a bout of madness with a specific RNG (useful for testing).
pub fn episode_with_rng<R: Rng>(
    investigator: impl Into<String>,
    kind: Insanity,
    rng: &mut R,
) -> Episode {
    let roll = rng.gen_range(0..BOUTS_OF_MADNESS.len()) as u8;
    Episode::from_roll(investigator, kind, roll)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_roll_in_range() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let e = episode_with_rng("Ruth", Insanity::Temporary, &mut rng);
            assert!(e.roll <= 9);
            assert_eq!(e.description, BOUTS_OF_MADNESS[usize::from(e.roll)]);
        }
    }

    #[test]
    fn test_every_entry_reachable() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut seen = [false; 10];
        for _ in 0..500 {
            let e = episode_with_rng("Ruth", Insanity::Indefinite, &mut rng);
            seen[usize::from(e.roll)] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn test_same_seed_same_episode() {
        let a = episode_with_rng("Ruth", Insanity::Latent, &mut StdRng::seed_from_u64(3));
        let b = episode_with_rng("Ruth", Insanity::Latent, &mut StdRng::seed_from_u64(3));
        assert_eq!(a, b);
    }

    #[test]
    fn test_duration_per_kind() {
        assert_eq!(
            episode("A", Insanity::Temporary).duration,
            DurationClass::Hours
        );
        assert_eq!(
            episode("A", Insanity::Indefinite).duration,
            DurationClass::Months
        );
        assert_eq!(
            episode("A", Insanity::Latent).duration,
            DurationClass::UntilCuredOrEpisodeEnds
        );
    }

    #[test]
    fn test_display_mentions_name_and_roll() {
        let e = Episode::from_roll("Tommy Muldoon", Insanity::Temporary, 5);
        let text = e.to_string();
        assert!(text.contains("Tommy Muldoon"));
        assert!(text.contains("1D10 = 6"));
        assert!(text.contains("Faint"));
    }
}
