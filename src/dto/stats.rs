use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    dao::models::{DuelHistoryEntity, PlayerDuelRecordEntity},
    dto::format_system_time,
    state::{
        duel::{DuelFormat, PlayerOutcome, Team, UserId},
        stats::DuelStatistics,
    },
};

/// Default number of entries returned by history and leaderboard routes.
pub const DEFAULT_LIMIT: usize = 10;
/// Upper bound of the `limit` query parameter.
pub const MAX_LIMIT: usize = 100;

/// Optional `limit` query parameter.
#[derive(Debug, Deserialize, IntoParams)]
pub struct LimitQuery {
    /// Number of entries, 10 by default, at most 100.
    pub limit: Option<usize>,
}

impl LimitQuery {
    /// Requested limit clamped to `1..=MAX_LIMIT`.
    pub fn resolved(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

/// In-memory duel counters of a user.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserStatsResponse {
    pub user_id: UserId,
    pub duels_created: u32,
    pub duels_joined: u32,
    pub duels_completed: u32,
    pub duels_won: u32,
    pub duels_lost: u32,
    pub duels_drawn: u32,
    pub questions_answered: u32,
    pub correct_answers: u32,
    /// Percentage of correct answers.
    pub accuracy: f64,
    /// Percentage of completed duels won.
    pub win_rate: f64,
}

impl UserStatsResponse {
    pub fn new(user_id: UserId, stats: DuelStatistics) -> Self {
        Self {
            user_id,
            duels_created: stats.duels_created,
            duels_joined: stats.duels_joined,
            duels_completed: stats.duels_completed,
            duels_won: stats.duels_won,
            duels_lost: stats.duels_lost,
            duels_drawn: stats.duels_drawn,
            questions_answered: stats.questions_answered,
            correct_answers: stats.correct_answers,
            accuracy: stats.accuracy(),
            win_rate: stats.win_rate(),
        }
    }
}

/// Stored lifetime record of a player.
#[derive(Debug, Serialize, ToSchema)]
pub struct PlayerRecordResponse {
    pub user_id: UserId,
    pub total_duels: u32,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub win_rate: f64,
    /// RFC 3339 time of the last finished duel.
    pub last_duel: Option<String>,
}

impl From<PlayerDuelRecordEntity> for PlayerRecordResponse {
    fn from(record: PlayerDuelRecordEntity) -> Self {
        Self {
            win_rate: record.win_rate(),
            user_id: record.user_id,
            total_duels: record.total_duels,
            wins: record.wins,
            losses: record.losses,
            draws: record.draws,
            last_duel: record.last_duel.map(format_system_time),
        }
    }
}

/// One finished duel in a player's history.
#[derive(Debug, Serialize, ToSchema)]
pub struct DuelHistoryEntry {
    pub duel_id: String,
    pub format: DuelFormat,
    pub category: String,
    pub team: Team,
    pub outcome: PlayerOutcome,
    pub team_score: u32,
    pub opponent_score: u32,
    pub personal_score: u32,
    pub finished_at: String,
}

impl From<DuelHistoryEntity> for DuelHistoryEntry {
    fn from(entry: DuelHistoryEntity) -> Self {
        Self {
            duel_id: entry.duel_id,
            format: entry.format,
            category: entry.category,
            team: entry.team,
            outcome: entry.outcome,
            team_score: entry.team_score,
            opponent_score: entry.opponent_score,
            personal_score: entry.personal_score,
            finished_at: format_system_time(entry.finished_at),
        }
    }
}

/// Ranked leaderboard entry.
#[derive(Debug, Serialize, ToSchema)]
pub struct LeaderboardEntry {
    /// 1-based rank.
    pub rank: usize,
    #[serde(flatten)]
    pub record: PlayerRecordResponse,
}

/// Rank the records in the order the store returned them.
pub fn rank(records: Vec<PlayerDuelRecordEntity>) -> Vec<LeaderboardEntry> {
    records
        .into_iter()
        .enumerate()
        .map(|(index, record)| LeaderboardEntry {
            rank: index + 1,
            record: record.into(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_are_clamped() {
        assert_eq!(LimitQuery { limit: None }.resolved(), DEFAULT_LIMIT);
        assert_eq!(LimitQuery { limit: Some(0) }.resolved(), 1);
        assert_eq!(LimitQuery { limit: Some(500) }.resolved(), MAX_LIMIT);
    }

    #[test]
    fn ranks_start_at_one() {
        let ranked = rank(vec![
            PlayerDuelRecordEntity::empty(4),
            PlayerDuelRecordEntity::empty(2),
        ]);
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[1].record.user_id, 2);
    }
}
