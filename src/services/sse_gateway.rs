use std::sync::{
    Arc,
    atomic::{AtomicI64, Ordering},
};

use dashmap::DashMap;
use futures::future::BoxFuture;
use tokio::sync::broadcast;
use tracing::debug;

use crate::{
    dto::sse::{MessageDeletedEvent, MessageEditedEvent, MessageSentEvent, ServerEvent},
    services::gateway::{DeliveryError, MessageId, MessageOptions, MessagingGateway},
    state::{duel::UserId, sse::UserStreams},
};

/// SSE event name of a new message.
pub const MESSAGE_SENT: &str = "message.sent";
/// SSE event name of an edited message.
pub const MESSAGE_EDITED: &str = "message.edited";
/// SSE event name of a retracted message.
pub const MESSAGE_DELETED: &str = "message.deleted";

/// Gateway delivering messages over per-user SSE streams.
///
/// Clients register their display name through the profile route and listen on
/// `/users/{id}/events`; a user without a live stream is unreachable.
#[derive(Clone, Default)]
pub struct SseGateway {
    inner: Arc<SseGatewayInner>,
}

#[derive(Default)]
struct SseGatewayInner {
    streams: UserStreams,
    profiles: DashMap<UserId, String>,
    next_message_id: AtomicI64,
}

impl SseGateway {
    /// Gateway without any connected user.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a stream for the user.
    pub fn subscribe(&self, user_id: UserId) -> broadcast::Receiver<ServerEvent> {
        self.inner.streams.subscribe(user_id)
    }

    /// Remember the display name of the user.
    pub fn set_display_name(&self, user_id: UserId, name: String) {
        self.inner.profiles.insert(user_id, name);
    }

    /// Drop streams without listeners.
    pub fn prune(&self) {
        self.inner.streams.prune();
    }

    /// Deliver a prepared event; `false` when nobody listens for the user.
    pub fn push_raw(&self, user_id: UserId, event: ServerEvent) -> bool {
        self.inner.streams.send(user_id, event)
    }

    fn push<T: serde::Serialize>(
        &self,
        user_id: UserId,
        event: &'static str,
        payload: &T,
    ) -> Result<(), DeliveryError> {
        let event = ServerEvent::json(Some(event.to_string()), payload)
            .map_err(|err| DeliveryError::Transport(err.to_string()))?;
        if self.inner.streams.send(user_id, event) {
            Ok(())
        } else {
            debug!(user_id, "no live stream for user");
            Err(DeliveryError::Unreachable(user_id))
        }
    }
}

impl MessagingGateway for SseGateway {
    fn send_message(
        &self,
        user_id: UserId,
        text: String,
        options: Option<MessageOptions>,
    ) -> BoxFuture<'static, Result<MessageId, DeliveryError>> {
        let message_id = self.inner.next_message_id.fetch_add(1, Ordering::Relaxed) + 1;
        let payload = MessageSentEvent {
            message_id,
            text,
            buttons: options.map(|options| options.buttons).unwrap_or_default(),
        };
        let result = self
            .push(user_id, MESSAGE_SENT, &payload)
            .map(|()| message_id);
        Box::pin(async move { result })
    }

    fn edit_message(
        &self,
        user_id: UserId,
        message_id: MessageId,
        text: String,
        options: Option<MessageOptions>,
    ) -> BoxFuture<'static, Result<(), DeliveryError>> {
        let payload = MessageEditedEvent {
            message_id,
            text,
            buttons: options.map(|options| options.buttons).unwrap_or_default(),
        };
        let result = self.push(user_id, MESSAGE_EDITED, &payload);
        Box::pin(async move { result })
    }

    fn delete_message(
        &self,
        user_id: UserId,
        message_id: MessageId,
    ) -> BoxFuture<'static, Result<(), DeliveryError>> {
        let result = self.push(user_id, MESSAGE_DELETED, &MessageDeletedEvent { message_id });
        Box::pin(async move { result })
    }

    fn resolve_display_name(
        &self,
        user_id: UserId,
    ) -> BoxFuture<'static, Result<String, DeliveryError>> {
        let result = self
            .inner
            .profiles
            .get(&user_id)
            .map(|entry| entry.value().clone())
            .ok_or(DeliveryError::UnknownUser(user_id));
        Box::pin(async move { result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::gateway::MessageButton;

    #[tokio::test]
    async fn sent_messages_reach_the_user_stream() {
        let gateway = SseGateway::new();
        let mut stream = gateway.subscribe(1);

        let options = MessageOptions::column([MessageButton::new("Paris", "answer:duel_x:1")]);
        let id = gateway
            .send_message(1, "Capital?".into(), Some(options))
            .await
            .unwrap();

        let event = stream.recv().await.unwrap();
        assert_eq!(event.event.as_deref(), Some(MESSAGE_SENT));
        assert!(event.data.contains("Capital?"));
        assert!(event.data.contains("answer:duel_x:1"));

        gateway.delete_message(1, id).await.unwrap();
        let event = stream.recv().await.unwrap();
        assert_eq!(event.event.as_deref(), Some(MESSAGE_DELETED));
    }

    #[tokio::test]
    async fn users_without_stream_are_unreachable() {
        let gateway = SseGateway::new();
        let err = gateway.send_message(5, "hi".into(), None).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Unreachable(5)));
    }

    #[tokio::test]
    async fn display_names_come_from_profiles() {
        let gateway = SseGateway::new();
        assert!(matches!(
            gateway.resolve_display_name(3).await,
            Err(DeliveryError::UnknownUser(3))
        ));
        gateway.set_display_name(3, "Ada".into());
        assert_eq!(gateway.resolve_display_name(3).await.unwrap(), "Ada");
    }
}
