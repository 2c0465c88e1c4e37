use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, time::SystemTime};

use crate::state::duel::{DuelFormat, DuelOutcome, DuelWinner, PlayerOutcome, Team, UserId};

/// Minimum number of completed duels before a player shows on the leaderboard.
pub const LEADERBOARD_MIN_DUELS: u32 = 5;

/// Points scored by one player in a finished duel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerScoreEntity {
    /// Player identifier.
    pub user_id: UserId,
    /// Correct answers given during the duel.
    pub score: u32,
}

/// Final result of a duel as stored by the persistence layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DuelResultEntity {
    /// Identifier of the finished duel.
    pub duel_id: String,
    /// Team size descriptor.
    pub format: DuelFormat,
    /// Question category.
    pub category: String,
    /// Final roster of team A.
    pub team_a: Vec<UserId>,
    /// Final roster of team B.
    pub team_b: Vec<UserId>,
    /// Verdict.
    pub winner: DuelWinner,
    /// Final score of team A.
    pub team_a_score: u32,
    /// Final score of team B.
    pub team_b_score: u32,
    /// Per-player points in join order.
    pub player_scores: Vec<PlayerScoreEntity>,
    /// When the duel finished.
    pub finished_at: SystemTime,
}

impl DuelResultEntity {
    /// Build the stored result from a computed outcome.
    pub fn from_outcome(outcome: &DuelOutcome, finished_at: SystemTime) -> Self {
        Self {
            duel_id: outcome.duel_id.clone(),
            format: outcome.format,
            category: outcome.category.clone(),
            team_a: outcome.team_a.clone(),
            team_b: outcome.team_b.clone(),
            winner: outcome.winner,
            team_a_score: outcome.team_scores.team_a,
            team_b_score: outcome.team_scores.team_b,
            player_scores: outcome
                .player_scores
                .iter()
                .map(|(user_id, score)| PlayerScoreEntity {
                    user_id: *user_id,
                    score: *score,
                })
                .collect(),
            finished_at,
        }
    }

    /// The duel seen from one participant, `None` when they did not play it.
    pub fn history_for(&self, user_id: UserId) -> Option<DuelHistoryEntity> {
        let team = if self.team_a.contains(&user_id) {
            Team::TeamA
        } else if self.team_b.contains(&user_id) {
            Team::TeamB
        } else {
            return None;
        };

        let (team_score, opponent_score) = match team {
            Team::TeamA => (self.team_a_score, self.team_b_score),
            Team::TeamB => (self.team_b_score, self.team_a_score),
        };
        let outcome = match (self.winner, team) {
            (DuelWinner::Draw, _) => PlayerOutcome::Drew,
            (DuelWinner::TeamA, Team::TeamA) | (DuelWinner::TeamB, Team::TeamB) => {
                PlayerOutcome::Won
            }
            _ => PlayerOutcome::Lost,
        };
        let personal_score = self
            .player_scores
            .iter()
            .find(|entry| entry.user_id == user_id)
            .map(|entry| entry.score)
            .unwrap_or_default();

        Some(DuelHistoryEntity {
            duel_id: self.duel_id.clone(),
            format: self.format,
            category: self.category.clone(),
            team,
            outcome,
            team_score,
            opponent_score,
            personal_score,
            finished_at: self.finished_at,
        })
    }
}

/// Lifetime duel record of a player.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerDuelRecordEntity {
    /// Player identifier.
    pub user_id: UserId,
    /// Completed duels.
    pub total_duels: u32,
    /// Duels won.
    pub wins: u32,
    /// Duels lost.
    pub losses: u32,
    /// Duels drawn.
    pub draws: u32,
    /// When the last duel finished.
    pub last_duel: Option<SystemTime>,
}

impl PlayerDuelRecordEntity {
    /// Record with no duel played.
    pub fn empty(user_id: UserId) -> Self {
        Self {
            user_id,
            total_duels: 0,
            wins: 0,
            losses: 0,
            draws: 0,
            last_duel: None,
        }
    }

    /// Count one more completed duel.
    pub fn apply(&mut self, outcome: PlayerOutcome, at: SystemTime) {
        self.total_duels += 1;
        match outcome {
            PlayerOutcome::Won => self.wins += 1,
            PlayerOutcome::Lost => self.losses += 1,
            PlayerOutcome::Drew => self.draws += 1,
        }
        self.last_duel = Some(at);
    }

    /// Share of duels won, in percent.
    pub fn win_rate(&self) -> f64 {
        if self.total_duels == 0 {
            0.0
        } else {
            f64::from(self.wins) * 100.0 / f64::from(self.total_duels)
        }
    }
}

/// Leaderboard order: win rate, then wins, both descending.
pub fn leaderboard_order(a: &PlayerDuelRecordEntity, b: &PlayerDuelRecordEntity) -> Ordering {
    b.win_rate()
        .total_cmp(&a.win_rate())
        .then_with(|| b.wins.cmp(&a.wins))
        .then_with(|| a.user_id.cmp(&b.user_id))
}

/// A finished duel seen from one participant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DuelHistoryEntity {
    /// Identifier of the duel.
    pub duel_id: String,
    /// Team size descriptor.
    pub format: DuelFormat,
    /// Question category.
    pub category: String,
    /// Side the player was on.
    pub team: Team,
    /// Outcome for the player.
    pub outcome: PlayerOutcome,
    /// Final score of the player's team.
    pub team_score: u32,
    /// Final score of the other team.
    pub opponent_score: u32,
    /// Points scored by the player.
    pub personal_score: u32,
    /// When the duel finished.
    pub finished_at: SystemTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(winner: DuelWinner) -> DuelResultEntity {
        DuelResultEntity {
            duel_id: "duel_a".into(),
            format: DuelFormat::OneVsOne,
            category: "random".into(),
            team_a: vec![1],
            team_b: vec![2],
            winner,
            team_a_score: 4,
            team_b_score: 2,
            player_scores: vec![
                PlayerScoreEntity {
                    user_id: 1,
                    score: 4,
                },
                PlayerScoreEntity {
                    user_id: 2,
                    score: 2,
                },
            ],
            finished_at: SystemTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn history_is_seen_from_the_player_side() {
        let stored = result(DuelWinner::TeamA);
        let loser = stored.history_for(2).unwrap();
        assert_eq!(loser.team, Team::TeamB);
        assert_eq!(loser.outcome, PlayerOutcome::Lost);
        assert_eq!((loser.team_score, loser.opponent_score), (2, 4));
        assert_eq!(loser.personal_score, 2);
        assert!(stored.history_for(3).is_none());
    }

    #[test]
    fn leaderboard_prefers_win_rate_then_wins() {
        let mut strong = PlayerDuelRecordEntity::empty(1);
        let mut busy = PlayerDuelRecordEntity::empty(2);
        for _ in 0..5 {
            strong.apply(PlayerOutcome::Won, SystemTime::UNIX_EPOCH);
        }
        for _ in 0..8 {
            busy.apply(PlayerOutcome::Won, SystemTime::UNIX_EPOCH);
        }
        busy.apply(PlayerOutcome::Lost, SystemTime::UNIX_EPOCH);

        let mut board = vec![busy.clone(), strong.clone()];
        board.sort_by(leaderboard_order);
        assert_eq!(board[0].user_id, 1);
        assert_eq!(board[1].user_id, 2);
    }
}
