use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};

use crate::{
    dto::sse::{Handshake, ServerEvent},
    services::sse_gateway::SseGateway,
    state::duel::UserId,
};

/// Open the user's message stream, queueing a handshake as its first event.
pub fn subscribe_user(gateway: &SseGateway, user_id: UserId) -> broadcast::Receiver<ServerEvent> {
    let receiver = gateway.subscribe(user_id);
    if let Ok(event) = ServerEvent::json(
        Some("handshake".to_string()),
        &Handshake {
            user_id,
            message: format!("listening for duel messages of user {user_id}"),
        },
    ) {
        gateway.push_raw(user_id, event);
    }
    receiver
}

/// Convert a user's broadcast receiver into an SSE response.
///
/// Events are forwarded until the client disconnects, after which streams
/// without listeners are pruned from the gateway.
pub fn to_sse_stream(
    mut receiver: broadcast::Receiver<ServerEvent>,
    gateway: SseGateway,
    user_id: UserId,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            let mut event = Event::default().data(payload.data);
                            if let Some(name) = payload.event {
                                event = event.event(name);
                            }

                            if tx.send(Ok(event)).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(skipped)) => {
                            debug!(user_id, skipped, "user stream lagged");
                        }
                    }
                }
            }
        }

        drop(receiver);
        gateway.prune();
        info!(user_id, "user SSE stream disconnected");
    });

    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
