use std::{sync::Arc, time::SystemTime};

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database, IndexModel,
    bson::{DateTime, Document, doc},
    options::IndexOptions,
};
use tokio::sync::RwLock;

use super::{
    config::MongoConfig,
    connection::{self, connect_duel_database},
    error::{MongoDaoError, MongoResult},
    models::{MongoDuelDocument, MongoPlayerRecordDocument, doc_id, participant_filter},
};
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

const DUEL_COLLECTION_NAME: &str = "duels";
const STATS_COLLECTION_NAME: &str = "duel_stats";

/// Duel store backed by MongoDB.
#[derive(Clone)]
pub struct MongoDuelStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    #[allow(dead_code)]
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        connection::ping(&database)
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) = connect_duel_database(&self.config).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoDuelStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) = connect_duel_database(&config).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let duels = self.duels().await;
        let finished_index = IndexModel::builder()
            .keys(doc! {"finished_at": -1})
            .options(
                IndexOptions::builder()
                    .name(Some("duel_finished_idx".to_owned()))
                    .build(),
            )
            .build();
        duels
            .create_index(finished_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: DUEL_COLLECTION_NAME,
                index: "finished_at",
                source,
            })?;

        let stats = self.stats().await;
        let wins_index = IndexModel::builder()
            .keys(doc! {"wins": -1})
            .options(
                IndexOptions::builder()
                    .name(Some("duel_stats_wins_idx".to_owned()))
                    .build(),
            )
            .build();
        stats
            .create_index(wins_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: STATS_COLLECTION_NAME,
                index: "wins",
                source,
            })?;

        Ok(())
    }

    async fn duels(&self) -> Collection<MongoDuelDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoDuelDocument>(DUEL_COLLECTION_NAME)
    }

    async fn stats(&self) -> Collection<MongoPlayerRecordDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoPlayerRecordDocument>(STATS_COLLECTION_NAME)
    }

    async fn record_duel_result(&self, result: DuelResultEntity) -> MongoResult<()> {
        let id = result.duel_id.clone();
        let document: MongoDuelDocument = result.into();
        self.duels()
            .await
            .replace_one(doc_id(id.clone()), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveDuel { id, source })?;
        Ok(())
    }

    async fn record_player_outcome(
        &self,
        user_id: UserId,
        outcome: PlayerOutcome,
        at: SystemTime,
    ) -> MongoResult<()> {
        let counter = match outcome {
            PlayerOutcome::Won => "wins",
            PlayerOutcome::Lost => "losses",
            PlayerOutcome::Drew => "draws",
        };
        let mut increments = Document::new();
        increments.insert("total_duels", 1_i64);
        increments.insert(counter, 1_i64);

        self.stats()
            .await
            .update_one(
                doc_id(user_id),
                doc! {
                    "$inc": increments,
                    "$set": {"last_duel": DateTime::from_system_time(at)},
                },
            )
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveRecord { user_id, source })?;
        Ok(())
    }

    async fn player_record(&self, user_id: UserId) -> MongoResult<Option<PlayerDuelRecordEntity>> {
        let document = self
            .stats()
            .await
            .find_one(doc_id(user_id))
            .await
            .map_err(|source| MongoDaoError::LoadPlayer { user_id, source })?;
        Ok(document.map(Into::into))
    }

    async fn duel_history(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> MongoResult<Vec<DuelHistoryEntity>> {
        let documents: Vec<MongoDuelDocument> = self
            .duels()
            .await
            .find(participant_filter(user_id))
            .sort(doc! {"finished_at": -1})
            .limit(i64::try_from(limit).unwrap_or(i64::MAX))
            .await
            .map_err(|source| MongoDaoError::LoadPlayer { user_id, source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::LoadPlayer { user_id, source })?;

        Ok(documents
            .into_iter()
            .filter_map(|document| DuelResultEntity::from(document).history_for(user_id))
            .collect())
    }

    async fn leaderboard(&self, limit: usize) -> MongoResult<Vec<PlayerDuelRecordEntity>> {
        let documents: Vec<MongoPlayerRecordDocument> = self
            .stats()
            .await
            .find(doc! {"total_duels": {"$gte": i64::from(LEADERBOARD_MIN_DUELS)}})
            .await
            .map_err(|source| MongoDaoError::Leaderboard { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::Leaderboard { source })?;

        let mut board: Vec<PlayerDuelRecordEntity> =
            documents.into_iter().map(Into::into).collect();
        board.sort_by(leaderboard_order);
        board.truncate(limit);
        Ok(board)
    }

    async fn reset_player(&self, user_id: UserId) -> MongoResult<()> {
        self.stats()
            .await
            .delete_one(doc_id(user_id))
            .await
            .map_err(|source| MongoDaoError::ResetRecord { user_id, source })?;
        Ok(())
    }
}

impl DuelStore for MongoDuelStore {
    fn record_duel_result(&self, result: DuelResultEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.record_duel_result(result).await.map_err(Into::into) })
    }

    fn record_player_outcome(
        &self,
        user_id: UserId,
        outcome: PlayerOutcome,
        at: SystemTime,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .record_player_outcome(user_id, outcome, at)
                .await
                .map_err(Into::into)
        })
    }

    fn player_record(
        &self,
        user_id: UserId,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerDuelRecordEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.player_record(user_id).await.map_err(Into::into) })
    }

    fn duel_history(
        &self,
        user_id: UserId,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<DuelHistoryEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.duel_history(user_id, limit).await.map_err(Into::into) })
    }

    fn leaderboard(
        &self,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<PlayerDuelRecordEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.leaderboard(limit).await.map_err(Into::into) })
    }

    fn reset_player(&self, user_id: UserId) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.reset_player(user_id).await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
