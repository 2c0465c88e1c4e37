use tracing::{info, warn};

use crate::{
    dao::models::{DuelHistoryEntity, PlayerDuelRecordEntity},
    error::ServiceError,
    state::{SharedState, duel::UserId, stats::DuelStatistics},
};

/// In-memory counters of the user.
pub fn user_duel_stats(state: &SharedState, user_id: UserId) -> DuelStatistics {
    state.stats().get(user_id)
}

/// Forget the user's counters and stored record.
///
/// In-memory counters are always reset; the stored record only when a store
/// is installed.
pub async fn reset_user_duel_stats(
    state: &SharedState,
    user_id: UserId,
) -> Result<(), ServiceError> {
    state.stats().reset(user_id);
    match state.duel_store().await {
        Some(store) => store.reset_player(user_id).await?,
        None => warn!(user_id, "degraded mode: stored duel record kept"),
    }
    info!(user_id, "duel statistics reset");
    Ok(())
}

/// Stored lifetime record, empty when the user never finished a duel.
pub async fn player_record(
    state: &SharedState,
    user_id: UserId,
) -> Result<PlayerDuelRecordEntity, ServiceError> {
    let store = state.require_duel_store().await?;
    Ok(store
        .player_record(user_id)
        .await?
        .unwrap_or_else(|| PlayerDuelRecordEntity::empty(user_id)))
}

/// Most recent finished duels of the user.
pub async fn duel_history(
    state: &SharedState,
    user_id: UserId,
    limit: usize,
) -> Result<Vec<DuelHistoryEntity>, ServiceError> {
    let store = state.require_duel_store().await?;
    Ok(store.duel_history(user_id, limit).await?)
}

/// Best players with enough completed duels.
pub async fn leaderboard(
    state: &SharedState,
    limit: usize,
) -> Result<Vec<PlayerDuelRecordEntity>, ServiceError> {
    let store = state.require_duel_store().await?;
    Ok(store.leaderboard(limit).await?)
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::SystemTime};

    use super::*;
    use crate::{
        config::DuelConfig,
        dao::{
            duel_store::{DuelStore, memory::InMemoryDuelStore},
            questions::QuestionBank,
        },
        services::sse_gateway::SseGateway,
        state::{AppState, duel::PlayerOutcome},
    };

    fn state() -> SharedState {
        AppState::new(
            DuelConfig::default(),
            Arc::new(SseGateway::new()),
            Arc::new(QuestionBank::default()),
        )
    }

    #[tokio::test]
    async fn stored_queries_need_a_store() {
        let state = state();
        assert!(matches!(
            leaderboard(&state, 10).await,
            Err(ServiceError::Degraded)
        ));
        assert!(matches!(
            player_record(&state, 1).await,
            Err(ServiceError::Degraded)
        ));
    }

    #[tokio::test]
    async fn reset_clears_memory_and_store() {
        let state = state();
        let store = InMemoryDuelStore::new();
        state.install_duel_store(Arc::new(store.clone())).await;

        state.stats().record_created(1);
        store
            .record_player_outcome(1, PlayerOutcome::Won, SystemTime::now())
            .await
            .unwrap();
        assert_eq!(player_record(&state, 1).await.unwrap().wins, 1);

        reset_user_duel_stats(&state, 1).await.unwrap();
        assert_eq!(user_duel_stats(&state, 1), DuelStatistics::default());
        assert_eq!(player_record(&state, 1).await.unwrap().total_duels, 0);
    }
}
