use axum::{Extension, Router};

use crate::{services::sse_gateway::SseGateway, state::SharedState};

pub mod docs;
pub mod duels;
pub mod health;
pub mod sse;
pub mod users;

/// Compose all route trees, wiring in shared state, the SSE gateway and
/// documentation routes.
pub fn router(state: SharedState, sse_gateway: SseGateway) -> Router<()> {
    let api_router = health::router()
        .merge(sse::router())
        .merge(duels::router())
        .merge(users::router());

    let docs_router = docs::router(state.clone());

    api_router
        .merge(docs_router)
        .layer(Extension(sse_gateway))
        .with_state(state)
}
