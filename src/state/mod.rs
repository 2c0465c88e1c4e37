pub mod duel;
pub mod name_cache;
pub mod registry;
pub mod sse;
pub mod state_machine;
pub mod stats;

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use dashmap::DashMap;
use tokio::{
    sync::{Mutex, RwLock, watch},
    task::JoinHandle,
};

use crate::{
    config::DuelConfig,
    dao::{duel_store::DuelStore, questions::QuestionSource},
    error::ServiceError,
    services::gateway::SharedGateway,
};

pub use self::state_machine::DuelStatus;
use self::{
    duel::UserId, name_cache::UserNameCache, registry::DuelRegistry, stats::StatisticsTracker,
};

pub type SharedState = Arc<AppState>;

/// Handle of a running quick-join search, tagged with its generation.
struct SearchTask {
    generation: u64,
    handle: JoinHandle<()>,
}

/// Central application state: duel registry, collaborators and background tasks.
pub struct AppState {
    config: DuelConfig,
    registry: DuelRegistry,
    stats: StatisticsTracker,
    names: UserNameCache,
    gateway: SharedGateway,
    questions: Arc<dyn QuestionSource>,
    duel_store: RwLock<Option<Arc<dyn DuelStore>>>,
    degraded: watch::Sender<bool>,
    search_tasks: DashMap<UserId, SearchTask>,
    search_generation: AtomicU64,
    supervisors: Mutex<Vec<JoinHandle<()>>>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(
        config: DuelConfig,
        gateway: SharedGateway,
        questions: Arc<dyn QuestionSource>,
    ) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            names: UserNameCache::new(gateway.clone(), config.user_cache_ttl),
            config,
            registry: DuelRegistry::new(),
            stats: StatisticsTracker::new(),
            gateway,
            questions,
            duel_store: RwLock::new(None),
            degraded: degraded_tx,
            search_tasks: DashMap::new(),
            search_generation: AtomicU64::new(0),
            supervisors: Mutex::new(Vec::new()),
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &DuelConfig {
        &self.config
    }

    /// Owner of every duel, mapping, queue and timer.
    pub fn registry(&self) -> &DuelRegistry {
        &self.registry
    }

    /// In-memory per-user counters.
    pub fn stats(&self) -> &StatisticsTracker {
        &self.stats
    }

    /// Display name cache.
    pub fn names(&self) -> &UserNameCache {
        &self.names
    }

    /// Outbound messaging gateway.
    pub fn gateway(&self) -> &SharedGateway {
        &self.gateway
    }

    /// Question provider.
    pub fn questions(&self) -> &dyn QuestionSource {
        self.questions.as_ref()
    }

    /// Obtain a handle to the current duel store, if one is installed.
    pub async fn duel_store(&self) -> Option<Arc<dyn DuelStore>> {
        let guard = self.duel_store.read().await;
        guard.as_ref().cloned()
    }

    /// Current duel store or [`ServiceError::Degraded`].
    pub async fn require_duel_store(&self) -> Result<Arc<dyn DuelStore>, ServiceError> {
        self.duel_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new duel store implementation and leave degraded mode.
    pub async fn install_duel_store(&self, store: Arc<dyn DuelStore>) {
        {
            let mut guard = self.duel_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false).await;
    }

    /// Remove the current duel store and enter degraded mode.
    pub async fn clear_duel_store(&self) {
        {
            let mut guard = self.duel_store.write().await;
            guard.take();
        }
        self.update_degraded(true).await;
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub async fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }

    /// Reserve a generation number for a search task about to be spawned.
    pub fn next_search_generation(&self) -> u64 {
        self.search_generation.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Track the user's quick-join search, aborting any previous one.
    pub fn track_search(&self, user_id: UserId, generation: u64, handle: JoinHandle<()>) {
        if let Some(previous) = self
            .search_tasks
            .insert(user_id, SearchTask { generation, handle })
        {
            previous.handle.abort();
        }
    }

    /// Forget a search that ended on its own. Never aborts.
    pub fn finish_search(&self, user_id: UserId, generation: u64) {
        self.search_tasks
            .remove_if(&user_id, |_, task| task.generation == generation);
    }

    /// Abort the user's search task; returns whether one was running.
    pub fn abort_search(&self, user_id: UserId) -> bool {
        match self.search_tasks.remove(&user_id) {
            Some((_, task)) => {
                task.handle.abort();
                true
            }
            None => false,
        }
    }

    /// True while a search task is tracked for the user.
    pub fn is_searching(&self, user_id: UserId) -> bool {
        self.search_tasks.contains_key(&user_id)
    }

    /// Keep a background supervisor alive until shutdown.
    pub async fn track_supervisor(&self, handle: JoinHandle<()>) {
        self.supervisors.lock().await.push(handle);
    }

    /// Stop background work and purge every duel.
    pub async fn shutdown(&self) {
        for handle in self.supervisors.lock().await.drain(..) {
            handle.abort();
        }

        let searching: Vec<UserId> = self.search_tasks.iter().map(|entry| *entry.key()).collect();
        for user_id in searching {
            self.abort_search(user_id);
        }

        self.registry.clear();
    }
}
