//! Read side over persisted results: rankings, history, recommendations and
//! adaptive difficulty.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::NaiveDate;
use log::debug;
use quiz_core::model::Difficulty;
use serde::Serialize;
use storage::repository::{LeaderboardRow, RecordRow, ResultRepository};

use crate::error::SessionError;

/// How many recent sessions feed the adaptive difficulty rule.
pub const DEFAULT_HISTORY_WINDOW: u32 = 5;

/// Topics averaging below this accuracy are flagged as weak.
pub const WEAK_TOPIC_THRESHOLD: u32 = 60;
/// Overall accuracy above which advancement quizzes are suggested.
pub const ADVANCEMENT_THRESHOLD: u32 = 70;
const MAX_IMPROVEMENTS: usize = 3;
const MAX_ADVANCEMENTS: usize = 2;
const ADVANCED_TOPICS: [&str; 3] = ["Advanced Algorithms", "System Design", "Machine Learning"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationKind {
    Improvement,
    Advancement,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub kind: RecommendationKind,
    pub topic: String,
    pub difficulty: Difficulty,
    pub reason: String,
}

/// Consecutive calendar days (UTC) on which a player completed a quiz.
///
/// `current` is the run ending on `last_active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityStreak {
    pub current: u32,
    pub best: u32,
    pub last_active: Option<NaiveDate>,
}

impl ActivityStreak {
    fn from_days(days: &BTreeSet<NaiveDate>) -> Self {
        let mut streak = Self::default();
        for &day in days {
            streak.current = match streak.last_active {
                Some(prev) if prev.succ_opt() == Some(day) => streak.current + 1,
                _ => 1,
            };
            streak.best = streak.best.max(streak.current);
            streak.last_active = Some(day);
        }
        streak
    }
}

#[derive(Clone)]
pub struct LeaderboardService {
    results: Arc<dyn ResultRepository>,
}

impl LeaderboardService {
    #[must_use]
    pub fn new(results: Arc<dyn ResultRepository>) -> Self {
        Self { results }
    }

    /// Players ranked by total score, ties broken by name.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the ranking cannot be loaded.
    pub async fn top(&self, limit: u32) -> Result<Vec<LeaderboardRow>, SessionError> {
        Ok(self.results.leaderboard(limit).await?)
    }

    /// A player's most recent sessions, newest first.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the records cannot be loaded.
    pub async fn history(&self, player: &str, limit: u32) -> Result<Vec<RecordRow>, SessionError> {
        Ok(self.results.recent_records(player, limit).await?)
    }

    /// Topics whose mean accuracy is below [`WEAK_TOPIC_THRESHOLD`], by name.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the records cannot be loaded.
    pub async fn weak_topics(&self, player: &str) -> Result<Vec<String>, SessionError> {
        let rows = self.all_records(player).await?;
        Ok(weak_topics(&rows))
    }

    /// Improvement quizzes for weak topics, plus harder material for strong players.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the records cannot be loaded.
    pub async fn recommendations(&self, player: &str) -> Result<Vec<Recommendation>, SessionError> {
        let rows = self.all_records(player).await?;
        let mut out: Vec<Recommendation> = weak_topics(&rows)
            .into_iter()
            .take(MAX_IMPROVEMENTS)
            .map(|topic| Recommendation {
                kind: RecommendationKind::Improvement,
                reason: format!("Improve your skills in {topic}"),
                topic,
                difficulty: Difficulty::Medium,
            })
            .collect();

        let total: u64 = rows.iter().map(|r| u64::from(accuracy(r))).sum();
        let len = rows.len() as u64;
        if len > 0 && total > u64::from(ADVANCEMENT_THRESHOLD) * len {
            out.extend(ADVANCED_TOPICS.iter().take(MAX_ADVANCEMENTS).map(|topic| {
                Recommendation {
                    kind: RecommendationKind::Advancement,
                    topic: (*topic).to_owned(),
                    difficulty: Difficulty::Hard,
                    reason: "Ready for advanced challenges".to_owned(),
                }
            }));
        }
        debug!("{} recommendations for {player}", out.len());
        Ok(out)
    }

    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the records cannot be loaded.
    pub async fn activity_streak(&self, player: &str) -> Result<ActivityStreak, SessionError> {
        let rows = self.all_records(player).await?;
        let days: BTreeSet<NaiveDate> = rows
            .iter()
            .map(|r| r.record.completed_at().date_naive())
            .collect();
        Ok(ActivityStreak::from_days(&days))
    }

    async fn all_records(&self, player: &str) -> Result<Vec<RecordRow>, SessionError> {
        Ok(self.results.recent_records(player, u32::MAX).await?)
    }
}

fn accuracy(row: &RecordRow) -> u32 {
    row.record.result().accuracy_percent()
}

fn weak_topics(rows: &[RecordRow]) -> Vec<String> {
    let mut per_topic: BTreeMap<&str, (u64, u64)> = BTreeMap::new();
    for row in rows {
        let entry = per_topic.entry(row.record.topic()).or_default();
        entry.0 += u64::from(accuracy(row));
        entry.1 += 1;
    }
    per_topic
        .into_iter()
        .filter(|(_, (sum, n))| *sum < u64::from(WEAK_TOPIC_THRESHOLD) * n)
        .map(|(topic, _)| topic.to_owned())
        .collect()
}

/// Picks the difficulty a player actually gets from their recent accuracy.
#[derive(Clone)]
pub struct QuizPlanner {
    results: Arc<dyn ResultRepository>,
    window: u32,
}

impl QuizPlanner {
    #[must_use]
    pub fn new(results: Arc<dyn ResultRepository>) -> Self {
        Self {
            results,
            window: DEFAULT_HISTORY_WINDOW,
        }
    }

    #[must_use]
    pub fn with_window(mut self, window: u32) -> Self {
        self.window = window;
        self
    }

    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the player's history cannot be loaded.
    pub async fn effective_difficulty(
        &self,
        player: &str,
        requested: Difficulty,
    ) -> Result<Difficulty, SessionError> {
        if self.window == 0 {
            return Ok(requested);
        }
        let rows = self.results.recent_records(player, self.window).await?;
        let accuracies: Vec<u32> = rows
            .iter()
            .map(|row| row.record.result().accuracy_percent())
            .collect();
        let effective = requested.adapt(&accuracies);
        if effective != requested {
            debug!(
                "adapted difficulty for {player}: {requested} -> {effective} over {} sessions",
                accuracies.len()
            );
        }
        Ok(effective)
    }
}
