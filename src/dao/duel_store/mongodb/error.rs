use mongodb::error::Error as MongoError;
use thiserror::Error;

use crate::state::duel::UserId;

pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

/// Failures of the MongoDB duel store.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to save duel `{id}`")]
    SaveDuel {
        id: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to update duel record of user `{user_id}`")]
    SaveRecord {
        user_id: UserId,
        #[source]
        source: MongoError,
    },
    #[error("failed to load duel data of user `{user_id}`")]
    LoadPlayer {
        user_id: UserId,
        #[source]
        source: MongoError,
    },
    #[error("failed to load the leaderboard")]
    Leaderboard {
        #[source]
        source: MongoError,
    },
    #[error("failed to reset duel record of user `{user_id}`")]
    ResetRecord {
        user_id: UserId,
        #[source]
        source: MongoError,
    },
}
