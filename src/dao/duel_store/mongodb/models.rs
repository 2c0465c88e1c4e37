use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};

use crate::{
    dao::models::{DuelResultEntity, PlayerDuelRecordEntity, PlayerScoreEntity},
    state::duel::{DuelFormat, DuelWinner, UserId},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoDuelDocument {
    #[serde(rename = "_id")]
    id: String,
    format: DuelFormat,
    category: String,
    team_a: Vec<UserId>,
    team_b: Vec<UserId>,
    winner: DuelWinner,
    team_a_score: i64,
    team_b_score: i64,
    player_scores: Vec<MongoPlayerScore>,
    finished_at: DateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MongoPlayerScore {
    user_id: UserId,
    score: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoPlayerRecordDocument {
    #[serde(rename = "_id")]
    user_id: UserId,
    #[serde(default)]
    total_duels: i64,
    #[serde(default)]
    wins: i64,
    #[serde(default)]
    losses: i64,
    #[serde(default)]
    draws: i64,
    #[serde(default)]
    last_duel: Option<DateTime>,
}

impl From<DuelResultEntity> for MongoDuelDocument {
    fn from(value: DuelResultEntity) -> Self {
        Self {
            id: value.duel_id,
            format: value.format,
            category: value.category,
            team_a: value.team_a,
            team_b: value.team_b,
            winner: value.winner,
            team_a_score: i64::from(value.team_a_score),
            team_b_score: i64::from(value.team_b_score),
            player_scores: value
                .player_scores
                .into_iter()
                .map(|entry| MongoPlayerScore {
                    user_id: entry.user_id,
                    score: i64::from(entry.score),
                })
                .collect(),
            finished_at: DateTime::from_system_time(value.finished_at),
        }
    }
}

impl From<MongoDuelDocument> for DuelResultEntity {
    fn from(value: MongoDuelDocument) -> Self {
        Self {
            duel_id: value.id,
            format: value.format,
            category: value.category,
            team_a: value.team_a,
            team_b: value.team_b,
            winner: value.winner,
            team_a_score: to_count(value.team_a_score),
            team_b_score: to_count(value.team_b_score),
            player_scores: value
                .player_scores
                .into_iter()
                .map(|entry| PlayerScoreEntity {
                    user_id: entry.user_id,
                    score: to_count(entry.score),
                })
                .collect(),
            finished_at: value.finished_at.to_system_time(),
        }
    }
}

impl From<MongoPlayerRecordDocument> for PlayerDuelRecordEntity {
    fn from(value: MongoPlayerRecordDocument) -> Self {
        Self {
            user_id: value.user_id,
            total_duels: to_count(value.total_duels),
            wins: to_count(value.wins),
            losses: to_count(value.losses),
            draws: to_count(value.draws),
            last_duel: value.last_duel.map(DateTime::to_system_time),
        }
    }
}

fn to_count(value: i64) -> u32 {
    u32::try_from(value).unwrap_or_default()
}

pub fn doc_id(id: impl Into<mongodb::bson::Bson>) -> Document {
    doc! {"_id": id.into()}
}

/// Filter matching duels the user played on either side.
pub fn participant_filter(user_id: UserId) -> Document {
    doc! {"$or": [{"team_a": user_id}, {"team_b": user_id}]}
}
