use std::sync::Arc;

use futures::future::{BoxFuture, join_all};
use serde::Serialize;
use thiserror::Error;
use tracing::warn;
use utoipa::ToSchema;

use crate::state::duel::UserId;

/// Identifier of a message delivered to a user, as issued by the gateway.
pub type MessageId = i64;

/// Generic action button attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct MessageButton {
    /// Text shown on the button.
    pub label: String,
    /// Opaque action key sent back by the client (`answer:<duel>:<index>`).
    pub action: String,
}

impl MessageButton {
    /// Build a button from a label and an action key.
    pub fn new(label: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            action: action.into(),
        }
    }
}

/// Rendering options of a message; each inner vector is one row of buttons.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct MessageOptions {
    /// Rows of buttons.
    pub buttons: Vec<Vec<MessageButton>>,
}

impl MessageOptions {
    /// One button per row.
    pub fn column(buttons: impl IntoIterator<Item = MessageButton>) -> Self {
        Self {
            buttons: buttons.into_iter().map(|button| vec![button]).collect(),
        }
    }
}

/// Per-recipient delivery failure.
#[derive(Debug, Clone, Error)]
pub enum DeliveryError {
    /// The recipient cannot be reached right now.
    #[error("user {0} is unreachable")]
    Unreachable(UserId),
    /// The gateway never heard of the user.
    #[error("unknown user {0}")]
    UnknownUser(UserId),
    /// Transport level failure.
    #[error("transport failure: {0}")]
    Transport(String),
}

/// Outbound seam towards the chat platform.
pub trait MessagingGateway: Send + Sync {
    /// Deliver a new message and return its identifier.
    fn send_message(
        &self,
        user_id: UserId,
        text: String,
        options: Option<MessageOptions>,
    ) -> BoxFuture<'static, Result<MessageId, DeliveryError>>;
    /// Replace the content of a previously sent message.
    fn edit_message(
        &self,
        user_id: UserId,
        message_id: MessageId,
        text: String,
        options: Option<MessageOptions>,
    ) -> BoxFuture<'static, Result<(), DeliveryError>>;
    /// Retract a previously sent message.
    fn delete_message(
        &self,
        user_id: UserId,
        message_id: MessageId,
    ) -> BoxFuture<'static, Result<(), DeliveryError>>;
    /// Display name of the user.
    fn resolve_display_name(&self, user_id: UserId)
    -> BoxFuture<'static, Result<String, DeliveryError>>;
}

/// Shared handle on the gateway.
pub type SharedGateway = Arc<dyn MessagingGateway>;

/// Send the same text to every recipient concurrently.
///
/// Failures are logged and skipped; the returned ids only cover successful
/// deliveries.
pub async fn broadcast_text(
    gateway: &SharedGateway,
    recipients: &[UserId],
    text: &str,
    options: Option<MessageOptions>,
) -> Vec<(UserId, MessageId)> {
    let sends = recipients.iter().map(|user_id| {
        let user_id = *user_id;
        let delivery = gateway.send_message(user_id, text.to_string(), options.clone());
        async move { (user_id, delivery.await) }
    });

    join_all(sends)
        .await
        .into_iter()
        .filter_map(|(user_id, result)| match result {
            Ok(message_id) => Some((user_id, message_id)),
            Err(err) => {
                warn!(user_id, error = %err, "failed to deliver message");
                None
            }
        })
        .collect()
}

/// Send a personalised text to each recipient concurrently, logging failures.
pub async fn send_each(gateway: &SharedGateway, messages: Vec<(UserId, String)>) {
    let sends = messages.into_iter().map(|(user_id, text)| {
        let delivery = gateway.send_message(user_id, text, None);
        async move { (user_id, delivery.await) }
    });

    for (user_id, result) in join_all(sends).await {
        if let Err(err) = result {
            warn!(user_id, error = %err, "failed to deliver message");
        }
    }
}

/// Retract messages concurrently, logging failures.
pub async fn delete_all(gateway: &SharedGateway, messages: impl IntoIterator<Item = (UserId, MessageId)>) {
    let deletions = messages.into_iter().map(|(user_id, message_id)| {
        let deletion = gateway.delete_message(user_id, message_id);
        async move { (user_id, deletion.await) }
    });

    for (user_id, result) in join_all(deletions).await {
        if let Err(err) = result {
            warn!(user_id, error = %err, "failed to delete message");
        }
    }
}
