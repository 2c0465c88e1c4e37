/// Periodic purge of stale duels and cached names.
pub mod cleanup;
/// OpenAPI documentation generation.
pub mod documentation;
/// Messaging gateway seam and fan-out helpers.
pub mod gateway;
/// Health check service.
pub mod health_service;
/// Lobby creation, membership and rendering.
pub mod lobby;
/// Quick-join matchmaking and background searches.
pub mod matchmaking;
/// Round loop of started duels.
pub mod session;
/// Messaging gateway backed by per-user SSE streams.
pub mod sse_gateway;
/// Server-Sent Events streaming service.
pub mod sse_service;
/// Statistics, history and leaderboard queries.
pub mod stats_service;
/// Storage connection supervisor toggling degraded mode.
pub mod storage_supervisor;
