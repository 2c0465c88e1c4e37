use serde::Serialize;
use utoipa::ToSchema;

/// Health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status ("ok" or "degraded").
    pub status: String,
    /// Number of duels currently registered.
    pub active_duels: usize,
}

impl HealthResponse {
    /// The duel store is reachable.
    pub fn ok(active_duels: usize) -> Self {
        Self {
            status: "ok".to_string(),
            active_duels,
        }
    }

    /// Duels keep running but results are not persisted.
    pub fn degraded(active_duels: usize) -> Self {
        Self {
            status: "degraded".to_string(),
            active_duels,
        }
    }
}
