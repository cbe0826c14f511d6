use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown difficulty: {raw}")]
pub struct ParseDifficultyError {
    raw: String,
}

/// Difficulty tier of a quiz.
///
/// Ordered from easiest to hardest so tiers can be compared and stepped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    Expert,
}

impl Difficulty {
    pub const ALL: [Difficulty; 4] = [
        Difficulty::Easy,
        Difficulty::Medium,
        Difficulty::Hard,
        Difficulty::Expert,
    ];

    /// Seconds a player gets for each question at this tier.
    #[must_use]
    pub fn time_per_question(self) -> u32 {
        match self {
            Difficulty::Easy => 60,
            Difficulty::Medium => 45,
            Difficulty::Hard => 30,
            Difficulty::Expert => 20,
        }
    }

    /// Base reward for a correct answer when a question carries no explicit points.
    #[must_use]
    pub fn base_points(self) -> u32 {
        match self {
            Difficulty::Easy => 50,
            Difficulty::Medium => 75,
            Difficulty::Hard => 100,
            Difficulty::Expert => 150,
        }
    }

    #[must_use]
    pub fn hint_penalty(self) -> u32 {
        match self {
            Difficulty::Easy => 10,
            Difficulty::Medium => 15,
            Difficulty::Hard => 20,
            Difficulty::Expert => 25,
        }
    }

    /// One tier harder, saturating at `Expert`.
    #[must_use]
    pub fn harder(self) -> Self {
        match self {
            Difficulty::Easy => Difficulty::Medium,
            Difficulty::Medium => Difficulty::Hard,
            Difficulty::Hard | Difficulty::Expert => Difficulty::Expert,
        }
    }

    /// One tier easier, saturating at `Easy`.
    #[must_use]
    pub fn easier(self) -> Self {
        match self {
            Difficulty::Easy | Difficulty::Medium => Difficulty::Easy,
            Difficulty::Hard => Difficulty::Medium,
            Difficulty::Expert => Difficulty::Hard,
        }
    }

    /// Adjust a requested tier from a player's recent accuracy history.
    ///
    /// With no history the request is kept. An average of 80% or more steps one
    /// tier up, 40% or less steps one tier down.
    #[must_use]
    pub fn adapt(self, recent_accuracy: &[u32]) -> Self {
        if recent_accuracy.is_empty() {
            return self;
        }
        // Compare totals so the average is never rounded.
        let sum: u64 = recent_accuracy.iter().map(|&a| u64::from(a)).sum();
        let len = recent_accuracy.len() as u64;
        if sum >= 80 * len {
            self.harder()
        } else if sum <= 40 * len {
            self.easier()
        } else {
            self
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
            Difficulty::Expert => "Expert",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = ParseDifficultyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Difficulty::ALL
            .into_iter()
            .find(|d| d.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ParseDifficultyError {
                raw: s.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("hard".parse::<Difficulty>().unwrap(), Difficulty::Hard);
        assert_eq!(" EXPERT ".parse::<Difficulty>().unwrap(), Difficulty::Expert);
        assert!("impossible".parse::<Difficulty>().is_err());
    }

    #[test]
    fn tiers_step_and_saturate() {
        assert_eq!(Difficulty::Expert.harder(), Difficulty::Expert);
        assert_eq!(Difficulty::Easy.easier(), Difficulty::Easy);
        assert_eq!(Difficulty::Medium.harder(), Difficulty::Hard);
        assert_eq!(Difficulty::Hard.easier(), Difficulty::Medium);
    }

    #[test]
    fn adapt_keeps_request_without_history() {
        assert_eq!(Difficulty::Medium.adapt(&[]), Difficulty::Medium);
    }

    #[test]
    fn adapt_moves_on_strong_and_weak_averages() {
        assert_eq!(Difficulty::Medium.adapt(&[90, 70, 80]), Difficulty::Hard);
        assert_eq!(Difficulty::Medium.adapt(&[40, 30]), Difficulty::Easy);
        assert_eq!(Difficulty::Medium.adapt(&[41, 79]), Difficulty::Medium);
    }

    #[test]
    fn adapt_uses_the_exact_average() {
        assert_eq!(Difficulty::Medium.adapt(&[40, 41]), Difficulty::Medium);
        assert_eq!(Difficulty::Medium.adapt(&[40, 40]), Difficulty::Easy);
        assert_eq!(Difficulty::Medium.adapt(&[79, 80]), Difficulty::Medium);
        assert_eq!(Difficulty::Medium.adapt(&[80, 80]), Difficulty::Hard);
    }

    #[test]
    fn harder_tiers_give_less_time() {
        let times: Vec<u32> = Difficulty::ALL
            .iter()
            .map(|d| d.time_per_question())
            .collect();
        assert!(times.windows(2).all(|w| w[0] > w[1]));
    }
}
