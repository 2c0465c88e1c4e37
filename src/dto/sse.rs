use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    services::gateway::{MessageButton, MessageId},
    state::duel::UserId,
};

#[derive(Clone, Debug)]
/// Dispatched payload carried across SSE channels.
pub struct ServerEvent {
    /// Optional SSE event name.
    pub event: Option<String>,
    /// Raw data field.
    pub data: String,
}

impl ServerEvent {
    /// Event carrying a plain string.
    pub fn new(event: Option<String>, data: String) -> Self {
        Self { event, data }
    }

    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Initial metadata sent to a client when its stream opens.
pub struct Handshake {
    /// User the stream belongs to.
    pub user_id: UserId,
    /// Human-readable message confirming the subscription.
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
/// `message.sent`: a new message for the user.
pub struct MessageSentEvent {
    /// Identifier used by later edits and deletions.
    pub message_id: MessageId,
    /// Message body.
    pub text: String,
    /// Rows of action buttons.
    pub buttons: Vec<Vec<MessageButton>>,
}

#[derive(Debug, Serialize, ToSchema)]
/// `message.edited`: replacement content of an earlier message.
pub struct MessageEditedEvent {
    /// Edited message.
    pub message_id: MessageId,
    /// New body.
    pub text: String,
    /// New rows of action buttons.
    pub buttons: Vec<Vec<MessageButton>>,
}

#[derive(Debug, Serialize, ToSchema)]
/// `message.deleted`: the message must disappear.
pub struct MessageDeletedEvent {
    /// Retracted message.
    pub message_id: MessageId,
}
