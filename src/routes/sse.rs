use std::convert::Infallible;

use axum::{
    Extension, Router,
    extract::Path,
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;
use tracing::info;

use crate::{
    services::{sse_gateway::SseGateway, sse_service},
    state::{SharedState, duel::UserId},
};

#[utoipa::path(
    get,
    path = "/users/{id}/events",
    tag = "sse",
    params(("id" = i64, Path, description = "User identifier")),
    responses((status = 200, description = "Duel messages of the user", content_type = "text/event-stream", body = String))
)]
/// Stream the duel messages addressed to one user.
pub async fn user_stream(
    Extension(gateway): Extension<SseGateway>,
    Path(user_id): Path<UserId>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = sse_service::subscribe_user(&gateway, user_id);
    info!(user_id, "new user SSE connection");
    sse_service::to_sse_stream(receiver, gateway, user_id)
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/users/{id}/events", get(user_stream))
}
