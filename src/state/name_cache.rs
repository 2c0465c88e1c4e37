use std::{collections::HashMap, time::Duration};

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::debug;

use crate::{services::gateway::SharedGateway, state::duel::UserId};

/// Short-lived cache of display names resolved through the gateway.
pub struct UserNameCache {
    gateway: SharedGateway,
    ttl: Duration,
    entries: DashMap<UserId, (String, Instant)>,
}

impl UserNameCache {
    /// Empty cache backed by `gateway`.
    pub fn new(gateway: SharedGateway, ttl: Duration) -> Self {
        Self {
            gateway,
            ttl,
            entries: DashMap::new(),
        }
    }

    /// Fresh cached name or a gateway lookup.
    ///
    /// A failed lookup yields `Player <id>` and is not cached.
    pub async fn display_name(&self, user_id: UserId) -> String {
        if let Some(name) = self.cached(user_id) {
            return name;
        }

        match self.gateway.resolve_display_name(user_id).await {
            Ok(name) => {
                self.entries.insert(user_id, (name.clone(), Instant::now()));
                name
            }
            Err(err) => {
                debug!(user_id, error = %err, "display name lookup failed");
                fallback_name(user_id)
            }
        }
    }

    /// Resolve several names, one lookup at a time.
    pub async fn display_names(&self, user_ids: &[UserId]) -> HashMap<UserId, String> {
        let mut names = HashMap::with_capacity(user_ids.len());
        for user_id in user_ids {
            names.insert(*user_id, self.display_name(*user_id).await);
        }
        names
    }

    /// Drop every expired entry; returns how many were removed.
    pub fn clear_expired(&self) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries
            .retain(|_, (_, fetched_at)| fetched_at.elapsed() < ttl);
        before.saturating_sub(self.entries.len())
    }

    /// Number of cached entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn cached(&self, user_id: UserId) -> Option<String> {
        let entry = self.entries.get(&user_id)?;
        let (name, fetched_at) = entry.value();
        (fetched_at.elapsed() < self.ttl).then(|| name.clone())
    }
}

/// Name used when the gateway cannot resolve a user.
pub fn fallback_name(user_id: UserId) -> String {
    format!("Player {user_id}")
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use futures::{FutureExt, future::BoxFuture};

    use super::*;
    use crate::services::gateway::{DeliveryError, MessageId, MessageOptions, MessagingGateway};

    #[derive(Default)]
    struct CountingGateway {
        lookups: AtomicUsize,
    }

    impl MessagingGateway for CountingGateway {
        fn send_message(
            &self,
            _user_id: UserId,
            _text: String,
            _options: Option<MessageOptions>,
        ) -> BoxFuture<'static, Result<MessageId, DeliveryError>> {
            async { Ok(1) }.boxed()
        }

        fn edit_message(
            &self,
            _user_id: UserId,
            _message_id: MessageId,
            _text: String,
            _options: Option<MessageOptions>,
        ) -> BoxFuture<'static, Result<(), DeliveryError>> {
            async { Ok(()) }.boxed()
        }

        fn delete_message(
            &self,
            _user_id: UserId,
            _message_id: MessageId,
        ) -> BoxFuture<'static, Result<(), DeliveryError>> {
            async { Ok(()) }.boxed()
        }

        fn resolve_display_name(
            &self,
            user_id: UserId,
        ) -> BoxFuture<'static, Result<String, DeliveryError>> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            async move {
                if user_id < 0 {
                    Err(DeliveryError::UnknownUser(user_id))
                } else {
                    Ok(format!("user-{user_id}"))
                }
            }
            .boxed()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn names_are_cached_until_the_ttl_expires() {
        let gateway = Arc::new(CountingGateway::default());
        let cache = UserNameCache::new(gateway.clone(), Duration::from_secs(300));

        assert_eq!(cache.display_name(5).await, "user-5");
        assert_eq!(cache.display_name(5).await, "user-5");
        assert_eq!(gateway.lookups.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(301)).await;
        assert_eq!(cache.clear_expired(), 1);
        assert!(cache.is_empty());
        assert_eq!(cache.display_name(5).await, "user-5");
        assert_eq!(gateway.lookups.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_lookups_fall_back_and_are_not_cached() {
        let gateway = Arc::new(CountingGateway::default());
        let cache = UserNameCache::new(gateway.clone(), Duration::from_secs(300));

        assert_eq!(cache.display_name(-3).await, "Player -3");
        assert!(cache.is_empty());
        cache.display_name(-3).await;
        assert_eq!(gateway.lookups.load(Ordering::SeqCst), 2);
    }
}
