use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::{dto::sse::ServerEvent, state::duel::UserId};

const USER_STREAM_CAPACITY: usize = 32;

/// Per-user SSE hubs used by the gateway to reach connected clients.
#[derive(Default)]
pub struct UserStreams {
    hubs: DashMap<UserId, SseHub>,
}

impl UserStreams {
    /// Empty set of streams.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber on the user's stream, creating it on demand.
    pub fn subscribe(&self, user_id: UserId) -> broadcast::Receiver<ServerEvent> {
        self.hubs
            .entry(user_id)
            .or_insert_with(|| SseHub::new(USER_STREAM_CAPACITY))
            .subscribe()
    }

    /// Push an event to the user's stream.
    ///
    /// Returns `false` when nobody listens for that user.
    pub fn send(&self, user_id: UserId, event: ServerEvent) -> bool {
        self.hubs
            .get(&user_id)
            .is_some_and(|hub| hub.broadcast(event))
    }

    /// True when at least one client listens for the user.
    pub fn is_connected(&self, user_id: UserId) -> bool {
        self.hubs
            .get(&user_id)
            .is_some_and(|hub| hub.receiver_count() > 0)
    }

    /// Drop hubs nobody listens to anymore.
    pub fn prune(&self) {
        self.hubs.retain(|_, hub| hub.receiver_count() > 0);
    }
}

/// Simple broadcast hub wrapper used by the SSE services.
pub struct SseHub {
    sender: broadcast::Sender<ServerEvent>,
}

impl SseHub {
    /// Construct a new hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    /// Send an event to all current subscribers; `false` when there are none.
    pub fn broadcast(&self, event: ServerEvent) -> bool {
        self.sender.send(event).is_ok()
    }

    /// Number of live subscribers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_reach_only_the_addressed_user() {
        let streams = UserStreams::new();
        let mut alice = streams.subscribe(1);
        let mut bob = streams.subscribe(2);

        assert!(streams.send(1, ServerEvent::new(Some("ping".into()), "hi".into())));
        let received = alice.recv().await.unwrap();
        assert_eq!(received.data, "hi");
        assert!(bob.try_recv().is_err());
    }

    #[test]
    fn sending_without_listeners_reports_failure() {
        let streams = UserStreams::new();
        assert!(!streams.send(9, ServerEvent::new(None, "lost".into())));
        let receiver = streams.subscribe(9);
        drop(receiver);
        assert!(!streams.is_connected(9));
        streams.prune();
        assert!(!streams.send(9, ServerEvent::new(None, "lost".into())));
    }
}
