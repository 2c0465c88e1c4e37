#[cfg(feature = "mongo-store")]
pub mod mongodb;
pub mod memory;

use std::time::SystemTime;

use futures::future::BoxFuture;

use crate::{
    dao::{
        models::{DuelHistoryEntity, DuelResultEntity, PlayerDuelRecordEntity},
        storage::StorageResult,
    },
    state::duel::{PlayerOutcome, UserId},
};

/// Abstraction over the persistence layer for finished duels and player records.
pub trait DuelStore: Send + Sync {
    /// Store the final result of a duel.
    fn record_duel_result(&self, result: DuelResultEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Count one completed duel in the player's record.
    fn record_player_outcome(
        &self,
        user_id: UserId,
        outcome: PlayerOutcome,
        at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Lifetime record of the player, if any duel was stored.
    fn player_record(
        &self,
        user_id: UserId,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerDuelRecordEntity>>>;
    /// Most recent duels of the player, newest first.
    fn duel_history(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<DuelHistoryEntity>>>;
    /// Best players by win rate then wins.
    fn leaderboard(&self, limit: usize)
    -> BoxFuture<'static, StorageResult<Vec<PlayerDuelRecordEntity>>>;
    /// Forget the player's record.
    fn reset_player(&self, user_id: UserId) -> BoxFuture<'static, StorageResult<()>>;
    /// Check the backend is reachable.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish the backend connection.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
