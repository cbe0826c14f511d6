use thiserror::Error;

use crate::model::Difficulty;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ScoringPolicyError {
    #[error("time budget must be at least one second")]
    ZeroTimeBudget,

    #[error("time bonus divisor must be at least one")]
    ZeroTimeBonusDivisor,
}

/// Timing and bonus parameters of a quiz session.
///
/// A correct answer earns
/// `base + time_remaining / time_bonus_divisor + streak_bonus_step * (streak - 1)`,
/// where `streak` already counts the answer being scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoringPolicy {
    time_budget_secs: u32,
    time_bonus_divisor: u32,
    streak_bonus_step: u32,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            time_budget_secs: 30,
            time_bonus_divisor: 3,
            streak_bonus_step: 20,
        }
    }
}

impl ScoringPolicy {
    /// # Errors
    ///
    /// Returns `ScoringPolicyError` if the time budget or the bonus divisor is zero.
    pub fn new(
        time_budget_secs: u32,
        time_bonus_divisor: u32,
        streak_bonus_step: u32,
    ) -> Result<Self, ScoringPolicyError> {
        if time_budget_secs == 0 {
            return Err(ScoringPolicyError::ZeroTimeBudget);
        }
        if time_bonus_divisor == 0 {
            return Err(ScoringPolicyError::ZeroTimeBonusDivisor);
        }
        Ok(Self {
            time_budget_secs,
            time_bonus_divisor,
            streak_bonus_step,
        })
    }

    /// Default bonuses with the per-question time of the given tier.
    #[must_use]
    pub fn for_difficulty(difficulty: Difficulty) -> Self {
        Self {
            time_budget_secs: difficulty.time_per_question(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn time_budget_secs(&self) -> u32 {
        self.time_budget_secs
    }

    #[must_use]
    pub fn time_bonus_divisor(&self) -> u32 {
        self.time_bonus_divisor
    }

    #[must_use]
    pub fn streak_bonus_step(&self) -> u32 {
        self.streak_bonus_step
    }

    #[must_use]
    pub fn time_bonus(&self, time_remaining: u32) -> u32 {
        time_remaining / self.time_bonus_divisor
    }

    /// `streak` includes the answer being scored, so a run of one earns nothing.
    #[must_use]
    pub fn streak_bonus(&self, streak: u32) -> u32 {
        self.streak_bonus_step.saturating_mul(streak.saturating_sub(1))
    }

    /// Points for one correct answer.
    #[must_use]
    pub fn award(&self, base_points: u32, time_remaining: u32, streak: u32) -> u32 {
        base_points
            .saturating_add(self.time_bonus(time_remaining))
            .saturating_add(self.streak_bonus(streak))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_thirty_second_rounds() {
        let policy = ScoringPolicy::default();
        assert_eq!(policy.time_budget_secs(), 30);
        assert_eq!(policy.award(100, 30, 1), 110);
    }

    #[test]
    fn streak_bonus_grows_linearly() {
        let policy = ScoringPolicy::default();
        assert_eq!(policy.streak_bonus(0), 0);
        assert_eq!(policy.streak_bonus(1), 0);
        assert_eq!(policy.streak_bonus(2), 20);
        assert_eq!(policy.streak_bonus(4), 60);
    }

    #[test]
    fn time_bonus_floors() {
        let policy = ScoringPolicy::default();
        assert_eq!(policy.time_bonus(29), 9);
        assert_eq!(policy.time_bonus(2), 0);
    }

    #[test]
    fn rejects_zero_parameters() {
        assert_eq!(
            ScoringPolicy::new(0, 3, 20).unwrap_err(),
            ScoringPolicyError::ZeroTimeBudget
        );
        assert_eq!(
            ScoringPolicy::new(30, 0, 20).unwrap_err(),
            ScoringPolicyError::ZeroTimeBonusDivisor
        );
    }

    #[test]
    fn difficulty_sets_time_budget() {
        let policy = ScoringPolicy::for_difficulty(Difficulty::Expert);
        assert_eq!(policy.time_budget_secs(), 20);
        assert_eq!(policy.streak_bonus_step(), 20);
    }

    #[test]
    fn award_saturates() {
        let policy = ScoringPolicy::new(30, 1, u32::MAX).unwrap();
        assert_eq!(policy.award(u32::MAX, 30, 3), u32::MAX);
    }
}
