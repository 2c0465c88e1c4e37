use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Health payload: `degraded` while no duel store is usable.
///
/// Duels keep running in degraded mode; only persistence is affected.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    match state.duel_store().await {
        Some(store) => {
            if let Err(err) = store.health_check().await {
                warn!(error = %err, "duel store health check failed");
            }
        }
        None => warn!("duel store unavailable (degraded mode)"),
    }

    let active_duels = state.registry().duel_count();
    if state.is_degraded().await {
        HealthResponse::degraded(active_duels)
    } else {
        HealthResponse::ok(active_duels)
    }
}
