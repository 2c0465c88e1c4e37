use std::{collections::HashMap, sync::Arc, time::SystemTime};

use futures::future::BoxFuture;
use tokio::sync::RwLock;

use crate::{
    dao::{
        duel_store::DuelStore,
        models::{
            DuelHistoryEntity, DuelResultEntity, LEADERBOARD_MIN_DUELS, PlayerDuelRecordEntity,
            leaderboard_order,
        },
        storage::StorageResult,
    },
    state::duel::{PlayerOutcome, UserId},
};

/// Process-local store used when no database is configured.
#[derive(Clone, Default)]
pub struct InMemoryDuelStore {
    inner: Arc<RwLock<MemoryState>>,
}

#[derive(Default)]
struct MemoryState {
    results: Vec<DuelResultEntity>,
    records: HashMap<UserId, PlayerDuelRecordEntity>,
}

impl InMemoryDuelStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl DuelStore for InMemoryDuelStore {
    fn record_duel_result(&self, result: DuelResultEntity) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.write().await.results.push(result);
            Ok(())
        })
    }

    fn record_player_outcome(
        &self,
        user_id: UserId,
        outcome: PlayerOutcome,
        at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner
                .write()
                .await
                .records
                .entry(user_id)
                .or_insert_with(|| PlayerDuelRecordEntity::empty(user_id))
                .apply(outcome, at);
            Ok(())
        })
    }

    fn player_record(
        &self,
        user_id: UserId,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerDuelRecordEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move { Ok(inner.read().await.records.get(&user_id).cloned()) })
    }

    fn duel_history(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<DuelHistoryEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let guard = inner.read().await;
            let mut history: Vec<_> = guard
                .results
                .iter()
                .filter_map(|result| result.history_for(user_id))
                .collect();
            history.sort_by(|a, b| b.finished_at.cmp(&a.finished_at));
            history.truncate(limit);
            Ok(history)
        })
    }

    fn leaderboard(
        &self,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<PlayerDuelRecordEntity>>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            let guard = inner.read().await;
            let mut board: Vec<_> = guard
                .records
                .values()
                .filter(|record| record.total_duels >= LEADERBOARD_MIN_DUELS)
                .cloned()
                .collect();
            board.sort_by(leaderboard_order);
            board.truncate(limit);
            Ok(board)
        })
    }

    fn reset_player(&self, user_id: UserId) -> BoxFuture<'static, StorageResult<()>> {
        let inner = self.inner.clone();
        Box::pin(async move {
            inner.write().await.records.remove(&user_id);
            Ok(())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        dao::models::PlayerScoreEntity,
        state::duel::{DuelFormat, DuelWinner},
    };

    fn result(id: &str, winner: DuelWinner, finished_at: SystemTime) -> DuelResultEntity {
        DuelResultEntity {
            duel_id: id.into(),
            format: DuelFormat::OneVsOne,
            category: "random".into(),
            team_a: vec![1],
            team_b: vec![2],
            winner,
            team_a_score: 1,
            team_b_score: 0,
            player_scores: vec![PlayerScoreEntity {
                user_id: 1,
                score: 1,
            }],
            finished_at,
        }
    }

    #[tokio::test]
    async fn history_is_newest_first_and_limited() {
        let store = InMemoryDuelStore::new();
        let early = SystemTime::UNIX_EPOCH;
        let late = early + Duration::from_secs(60);
        store
            .record_duel_result(result("duel_old", DuelWinner::TeamA, early))
            .await
            .unwrap();
        store
            .record_duel_result(result("duel_new", DuelWinner::Draw, late))
            .await
            .unwrap();

        let history = store.duel_history(2, 1).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].duel_id, "duel_new");
        assert_eq!(history[0].outcome, PlayerOutcome::Drew);
        assert!(store.duel_history(3, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn leaderboard_requires_enough_duels() {
        let store = InMemoryDuelStore::new();
        for _ in 0..LEADERBOARD_MIN_DUELS {
            store
                .record_player_outcome(1, PlayerOutcome::Won, SystemTime::UNIX_EPOCH)
                .await
                .unwrap();
        }
        store
            .record_player_outcome(2, PlayerOutcome::Won, SystemTime::UNIX_EPOCH)
            .await
            .unwrap();

        let board = store.leaderboard(10).await.unwrap();
        assert_eq!(board.len(), 1);
        assert_eq!(board[0].user_id, 1);
        assert_eq!(board[0].wins, LEADERBOARD_MIN_DUELS);
    }

    #[tokio::test]
    async fn reset_forgets_the_record() {
        let store = InMemoryDuelStore::new();
        store
            .record_player_outcome(1, PlayerOutcome::Lost, SystemTime::UNIX_EPOCH)
            .await
            .unwrap();
        assert_eq!(store.player_record(1).await.unwrap().unwrap().losses, 1);
        store.reset_player(1).await.unwrap();
        assert!(store.player_record(1).await.unwrap().is_none());
    }
}
