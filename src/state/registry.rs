use std::{collections::HashMap, sync::Arc};

use dashmap::{DashMap, mapref::entry::Entry};
use tokio::{sync::Mutex, task::JoinHandle};
use uuid::Uuid;

use crate::{
    error::DuelError,
    services::gateway::MessageId,
    state::{
        duel::{Duel, DuelFormat, DuelId, DuelSnapshot, UserId},
        state_machine::DuelStatus,
    },
};

/// Shared handle on a registered duel. Every mutation happens under its lock.
pub type DuelHandle = Arc<Mutex<Duel>>;

/// Process-wide owner of duels, user mappings, message indexes, round timers
/// and matchmaking queues.
///
/// Maps are only touched through short, non-nested accesses so no shard lock is
/// ever held across an `.await` or while another map is locked.
#[derive(Default)]
pub struct DuelRegistry {
    duels: DashMap<DuelId, DuelHandle>,
    user_duels: DashMap<UserId, DuelId>,
    lobby_messages: DashMap<DuelId, HashMap<UserId, MessageId>>,
    question_messages: DashMap<DuelId, HashMap<UserId, MessageId>>,
    queues: DashMap<DuelFormat, Vec<UserId>>,
    round_timers: DashMap<DuelId, JoinHandle<()>>,
}

impl DuelRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a waiting duel with `creator_id` as its only player.
    ///
    /// The creator is mapped to the new duel atomically; a creator already in
    /// a duel gets [`DuelError::AlreadyInDuel`].
    pub fn create_duel(
        &self,
        format: DuelFormat,
        creator_id: UserId,
        category: String,
        max_questions: u32,
    ) -> Result<DuelId, DuelError> {
        loop {
            let id = new_duel_id();
            let Entry::Vacant(slot) = self.duels.entry(id.clone()) else {
                continue;
            };
            self.claim_user(creator_id, &id)?;
            let duel = Duel::new(id.clone(), format, creator_id, category, max_questions);
            slot.insert(Arc::new(Mutex::new(duel)));
            return Ok(id);
        }
    }

    /// Handle of a registered duel.
    pub fn get(&self, duel_id: &str) -> Result<DuelHandle, DuelError> {
        self.duels
            .get(duel_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| DuelError::DuelNotFound(duel_id.to_string()))
    }

    /// True when the duel id is registered.
    pub fn contains(&self, duel_id: &str) -> bool {
        self.duels.contains_key(duel_id)
    }

    /// Number of registered duels.
    pub fn duel_count(&self) -> usize {
        self.duels.len()
    }

    /// Every registered duel with its handle.
    pub fn handles(&self) -> Vec<(DuelId, DuelHandle)> {
        self.duels
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Run `f` while holding the duel's lock.
    ///
    /// Registration is re-checked once the lock is held, so a duel purged while
    /// the caller was waiting yields [`DuelError::DuelNotFound`].
    pub async fn with_duel_lock<R>(
        &self,
        duel_id: &str,
        f: impl FnOnce(&mut Duel) -> R,
    ) -> Result<R, DuelError> {
        let handle = self.get(duel_id)?;
        let mut guard = handle.lock().await;
        if !self.is_current(duel_id, &handle) {
            return Err(DuelError::DuelNotFound(duel_id.to_string()));
        }
        Ok(f(&mut guard))
    }

    /// True when `handle` is still the registered instance for `duel_id`.
    pub fn is_current(&self, duel_id: &str, handle: &DuelHandle) -> bool {
        self.duels
            .get(duel_id)
            .is_some_and(|current| Arc::ptr_eq(current.value(), handle))
    }

    /// Waiting, non-full duels, optionally restricted to a format, oldest first.
    ///
    /// The result is a snapshot: callers must re-validate under the duel lock.
    pub async fn list_available(&self, format: Option<DuelFormat>) -> Vec<DuelSnapshot> {
        let mut available = Vec::new();
        for (_, handle) in self.handles() {
            let duel = handle.lock().await;
            if format.is_some_and(|wanted| duel.format() != wanted) {
                continue;
            }
            if duel.status() == DuelStatus::Waiting && !duel.is_full() {
                available.push(duel.snapshot());
            }
        }
        available.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        available
    }

    /// Purge a duel with its message indexes, round timer and user mappings.
    ///
    /// Idempotent; returns the handle when the duel was still registered.
    pub fn remove_duel(&self, duel_id: &str) -> Option<DuelHandle> {
        let removed = self.duels.remove(duel_id).map(|(_, handle)| handle);
        self.lobby_messages.remove(duel_id);
        self.question_messages.remove(duel_id);
        self.cancel_round_timer(duel_id);
        self.user_duels.retain(|_, mapped| mapped.as_str() != duel_id);
        removed
    }

    /// Purge every duel and mapping.
    pub fn clear(&self) {
        let ids: Vec<DuelId> = self.duels.iter().map(|entry| entry.key().clone()).collect();
        for id in ids {
            self.remove_duel(&id);
        }
        self.user_duels.clear();
        self.clear_queues();
    }

    /// Duel the user currently belongs to.
    pub fn duel_of(&self, user_id: UserId) -> Option<DuelId> {
        self.user_duels
            .get(&user_id)
            .map(|entry| entry.value().clone())
    }

    /// Map the user to `duel_id` unless they are already mapped.
    pub fn claim_user(&self, user_id: UserId, duel_id: &str) -> Result<(), DuelError> {
        match self.user_duels.entry(user_id) {
            Entry::Occupied(entry) if entry.get() == duel_id => {
                Err(DuelError::AlreadyJoined(duel_id.to_string()))
            }
            Entry::Occupied(entry) => Err(DuelError::AlreadyInDuel(entry.get().clone())),
            Entry::Vacant(slot) => {
                slot.insert(duel_id.to_string());
                Ok(())
            }
        }
    }

    /// Drop the user's mapping if it still points at `duel_id`.
    pub fn release_user(&self, user_id: UserId, duel_id: &str) {
        self.user_duels
            .remove_if(&user_id, |_, mapped| mapped.as_str() == duel_id);
    }

    /// Put the user at the back of the format's queue, leaving any other queue.
    pub fn enqueue(&self, format: DuelFormat, user_id: UserId) {
        self.dequeue_everywhere(user_id);
        let mut queue = self.queues.entry(format).or_default();
        if !queue.contains(&user_id) {
            queue.push(user_id);
        }
    }

    /// Remove the user from the format's queue; no-op when absent.
    pub fn dequeue(&self, format: DuelFormat, user_id: UserId) -> bool {
        let Some(mut queue) = self.queues.get_mut(&format) else {
            return false;
        };
        let before = queue.len();
        queue.retain(|queued| *queued != user_id);
        before != queue.len()
    }

    /// Remove the user from every queue.
    pub fn dequeue_everywhere(&self, user_id: UserId) {
        for format in DuelFormat::ALL {
            self.dequeue(format, user_id);
        }
    }

    /// True when the user waits in any queue.
    pub fn is_queued(&self, user_id: UserId) -> bool {
        self.queues
            .iter()
            .any(|queue| queue.value().contains(&user_id))
    }

    /// Number of users waiting for the format.
    pub fn queue_len(&self, format: DuelFormat) -> usize {
        self.queues
            .get(&format)
            .map(|queue| queue.len())
            .unwrap_or_default()
    }

    /// Empty every queue.
    pub fn clear_queues(&self) {
        self.queues.clear();
    }

    /// Lobby message shown to the user for the duel.
    pub fn lobby_message(&self, duel_id: &str, user_id: UserId) -> Option<MessageId> {
        self.lobby_messages
            .get(duel_id)
            .and_then(|messages| messages.get(&user_id).copied())
    }

    /// Remember the lobby message shown to the user.
    ///
    /// Returns false, recording nothing, once the duel is purged.
    pub fn set_lobby_message(&self, duel_id: &str, user_id: UserId, message_id: MessageId) -> bool {
        self.lobby_messages
            .entry(duel_id.to_string())
            .or_default()
            .insert(user_id, message_id);
        self.keep_if_registered(&self.lobby_messages, duel_id)
    }

    /// Forget and return the user's lobby message.
    pub fn take_lobby_message(&self, duel_id: &str, user_id: UserId) -> Option<MessageId> {
        self.lobby_messages
            .get_mut(duel_id)
            .and_then(|mut messages| messages.remove(&user_id))
    }

    /// Forget and return every lobby message of the duel.
    pub fn take_lobby_messages(&self, duel_id: &str) -> HashMap<UserId, MessageId> {
        self.lobby_messages
            .remove(duel_id)
            .map(|(_, messages)| messages)
            .unwrap_or_default()
    }

    /// Remember the question message shown to the user.
    ///
    /// Returns false, recording nothing, once the duel is purged.
    pub fn set_question_message(&self, duel_id: &str, user_id: UserId, message_id: MessageId) -> bool {
        self.question_messages
            .entry(duel_id.to_string())
            .or_default()
            .insert(user_id, message_id);
        self.keep_if_registered(&self.question_messages, duel_id)
    }

    /// Forget and return the user's question message.
    pub fn take_question_message(&self, duel_id: &str, user_id: UserId) -> Option<MessageId> {
        self.question_messages
            .get_mut(duel_id)
            .and_then(|mut messages| messages.remove(&user_id))
    }

    /// Forget and return every question message of the duel.
    pub fn take_question_messages(&self, duel_id: &str) -> HashMap<UserId, MessageId> {
        self.question_messages
            .remove(duel_id)
            .map(|(_, messages)| messages)
            .unwrap_or_default()
    }

    /// Track the timer of the open round.
    ///
    /// A previous handle is detached, not aborted: it belongs to a round that
    /// already closed. The timer of a purged duel is aborted on the spot.
    pub fn set_round_timer(&self, duel_id: &str, handle: JoinHandle<()>) -> bool {
        self.round_timers.insert(duel_id.to_string(), handle);
        if self.duels.contains_key(duel_id) {
            return true;
        }
        self.cancel_round_timer(duel_id);
        false
    }

    /// Abort the pending round timer, if any.
    pub fn cancel_round_timer(&self, duel_id: &str) {
        if let Some((_, handle)) = self.round_timers.remove(duel_id) {
            handle.abort();
        }
    }

    /// Drop the index entry again when the duel was purged meanwhile.
    ///
    /// Checked after the insert so a concurrent [`Self::remove_duel`] either
    /// sees the entry or is seen here.
    fn keep_if_registered(
        &self,
        index: &DashMap<DuelId, HashMap<UserId, MessageId>>,
        duel_id: &str,
    ) -> bool {
        if self.duels.contains_key(duel_id) {
            return true;
        }
        index.remove(duel_id);
        false
    }

    #[cfg(test)]
    fn has_round_timer(&self, duel_id: &str) -> bool {
        self.round_timers.contains_key(duel_id)
    }
}

fn new_duel_id() -> DuelId {
    format!("duel_{}", Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn registry_with_duel(format: DuelFormat, creator: UserId) -> (DuelRegistry, DuelId) {
        let registry = DuelRegistry::new();
        let id = registry
            .create_duel(format, creator, "random".into(), 10)
            .unwrap();
        (registry, id)
    }

    #[tokio::test]
    async fn create_registers_duel_and_maps_creator() {
        let (registry, id) = registry_with_duel(DuelFormat::OneVsOne, 1);
        assert!(id.starts_with("duel_"));
        assert_eq!(registry.duel_of(1), Some(id.clone()));
        let status = registry
            .with_duel_lock(&id, |duel| duel.status())
            .await
            .unwrap();
        assert_eq!(status, DuelStatus::Waiting);
    }

    #[tokio::test]
    async fn creator_in_a_duel_cannot_create_another() {
        let (registry, id) = registry_with_duel(DuelFormat::OneVsOne, 1);
        let err = registry
            .create_duel(DuelFormat::TwoVsTwo, 1, "random".into(), 10)
            .unwrap_err();
        assert_eq!(err, DuelError::AlreadyInDuel(id));
        assert_eq!(registry.duel_count(), 1);
    }

    #[test]
    fn claim_distinguishes_same_and_other_duel() {
        let registry = DuelRegistry::new();
        registry.claim_user(7, "duel_a").unwrap();
        assert_eq!(
            registry.claim_user(7, "duel_a").unwrap_err(),
            DuelError::AlreadyJoined("duel_a".into())
        );
        assert_eq!(
            registry.claim_user(7, "duel_b").unwrap_err(),
            DuelError::AlreadyInDuel("duel_a".into())
        );
        registry.release_user(7, "duel_b");
        assert_eq!(registry.duel_of(7), Some("duel_a".into()));
        registry.release_user(7, "duel_a");
        assert_eq!(registry.duel_of(7), None);
    }

    #[tokio::test]
    async fn lock_on_purged_duel_reports_not_found() {
        let (registry, id) = registry_with_duel(DuelFormat::OneVsOne, 1);
        let handle = registry.get(&id).unwrap();
        let guard = handle.lock().await;
        registry.remove_duel(&id);
        drop(guard);

        let err = registry.with_duel_lock(&id, |_| ()).await.unwrap_err();
        assert_eq!(err, DuelError::DuelNotFound(id.clone()));
        assert_eq!(registry.duel_of(1), None);
    }

    #[tokio::test]
    async fn remove_is_idempotent_and_clears_indexes() {
        let (registry, id) = registry_with_duel(DuelFormat::TwoVsTwo, 1);
        registry.set_lobby_message(&id, 1, 10);
        registry.set_question_message(&id, 1, 11);
        registry.set_round_timer(&id, tokio::spawn(async {}));

        assert!(registry.remove_duel(&id).is_some());
        assert!(registry.remove_duel(&id).is_none());
        assert_eq!(registry.lobby_message(&id, 1), None);
        assert!(registry.take_question_messages(&id).is_empty());
        assert!(!registry.has_round_timer(&id));
    }

    #[tokio::test]
    async fn available_duels_skip_full_started_and_other_formats() {
        let registry = DuelRegistry::new();
        let open = registry
            .create_duel(DuelFormat::TwoVsTwo, 1, "random".into(), 10)
            .unwrap();
        let full = registry
            .create_duel(DuelFormat::OneVsOne, 2, "random".into(), 10)
            .unwrap();
        registry
            .with_duel_lock(&full, |duel| duel.add_player(3))
            .await
            .unwrap()
            .unwrap();

        let all = registry.list_available(None).await;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, open);
        assert!(
            registry
                .list_available(Some(DuelFormat::OneVsOne))
                .await
                .is_empty()
        );
    }

    #[test]
    fn queues_hold_a_user_once() {
        let registry = DuelRegistry::new();
        registry.enqueue(DuelFormat::OneVsOne, 1);
        registry.enqueue(DuelFormat::OneVsOne, 1);
        assert_eq!(registry.queue_len(DuelFormat::OneVsOne), 1);

        registry.enqueue(DuelFormat::TwoVsTwo, 1);
        assert_eq!(registry.queue_len(DuelFormat::OneVsOne), 0);
        assert_eq!(registry.queue_len(DuelFormat::TwoVsTwo), 1);

        assert!(registry.dequeue(DuelFormat::TwoVsTwo, 1));
        assert!(!registry.dequeue(DuelFormat::TwoVsTwo, 1));
        assert!(!registry.dequeue(DuelFormat::FourVsFour, 99));
        assert!(!registry.is_queued(1));
    }

    #[test]
    fn message_indexes_are_taken_once() {
        let (registry, id) = registry_with_duel(DuelFormat::TwoVsTwo, 1);
        assert!(registry.set_lobby_message(&id, 1, 5));
        assert!(registry.set_lobby_message(&id, 2, 6));
        assert_eq!(registry.take_lobby_message(&id, 1), Some(5));
        assert_eq!(registry.take_lobby_message(&id, 1), None);
        let rest = registry.take_lobby_messages(&id);
        assert_eq!(rest.get(&2), Some(&6));
        assert!(registry.take_lobby_messages(&id).is_empty());
    }

    #[tokio::test]
    async fn purged_duels_accept_no_new_index_entries() {
        let (registry, id) = registry_with_duel(DuelFormat::OneVsOne, 1);
        registry.remove_duel(&id);

        assert!(!registry.set_lobby_message(&id, 1, 5));
        assert!(!registry.set_question_message(&id, 1, 6));
        let (tx, mut rx) = tokio::sync::mpsc::channel::<()>(1);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let _ = tx.send(()).await;
        });
        assert!(!registry.set_round_timer(&id, timer));

        assert_eq!(registry.lobby_message(&id, 1), None);
        assert!(registry.take_question_messages(&id).is_empty());
        assert!(!registry.has_round_timer(&id));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn cancelled_round_timer_never_fires() {
        let (registry, id) = registry_with_duel(DuelFormat::OneVsOne, 1);
        let (tx, mut rx) = tokio::sync::mpsc::channel::<()>(1);
        registry.set_round_timer(
            &id,
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                let _ = tx.send(()).await;
            }),
        );
        registry.cancel_round_timer(&id);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn clear_purges_everything() {
        let (registry, _) = registry_with_duel(DuelFormat::OneVsOne, 1);
        registry.enqueue(DuelFormat::OneVsOne, 1);
        registry.clear();
        assert_eq!(registry.duel_count(), 0);
        assert_eq!(registry.duel_of(1), None);
        assert!(!registry.is_queued(1));
    }
}
