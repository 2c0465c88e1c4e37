use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
};
use validator::Validate;

use crate::{
    dto::{
        duel::{CancelSearchResponse, DuelSummary, ProfileRequest, RefreshLobbyResponse},
        stats::{
            DuelHistoryEntry, LeaderboardEntry, LimitQuery, PlayerRecordResponse,
            UserStatsResponse, rank,
        },
    },
    error::AppError,
    services::{lobby, matchmaking, sse_gateway::SseGateway, stats_service},
    state::{SharedState, duel::UserId},
};

/// Per-user routes: current duel, searches, statistics and profile.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/users/{id}/duel", get(current_duel))
        .route("/users/{id}/lobby/refresh", post(refresh_lobby))
        .route("/users/{id}/search/cancel", post(cancel_search))
        .route("/users/{id}/stats", get(user_stats).delete(reset_stats))
        .route("/users/{id}/record", get(player_record))
        .route("/users/{id}/history", get(duel_history))
        .route("/users/{id}/profile", put(update_profile))
        .route("/leaderboard", get(leaderboard))
}

/// Duel the user currently belongs to.
#[utoipa::path(
    get,
    path = "/users/{id}/duel",
    tag = "users",
    params(("id" = i64, Path, description = "User identifier")),
    responses(
        (status = 200, description = "Current duel", body = DuelSummary),
        (status = 404, description = "User is not in a duel")
    )
)]
pub async fn current_duel(
    State(state): State<SharedState>,
    Path(user_id): Path<UserId>,
) -> Result<Json<DuelSummary>, AppError> {
    lobby::current_duel(&state, user_id)
        .await
        .map(|snapshot| Json(snapshot.into()))
        .ok_or_else(|| AppError::NotFound("You are not in a duel".into()))
}

/// Re-send the lobby of the user's current duel.
#[utoipa::path(
    post,
    path = "/users/{id}/lobby/refresh",
    tag = "users",
    params(("id" = i64, Path, description = "User identifier")),
    responses((status = 200, description = "Lobby refreshed", body = RefreshLobbyResponse))
)]
pub async fn refresh_lobby(
    State(state): State<SharedState>,
    Path(user_id): Path<UserId>,
) -> Json<RefreshLobbyResponse> {
    let duel_id = lobby::refresh_lobby(&state, user_id).await;
    Json(RefreshLobbyResponse { duel_id })
}

/// Stop a quick-join search and leave the lobby it opened.
#[utoipa::path(
    post,
    path = "/users/{id}/search/cancel",
    tag = "users",
    params(("id" = i64, Path, description = "User identifier")),
    responses((status = 200, description = "Search cancelled", body = CancelSearchResponse))
)]
pub async fn cancel_search(
    State(state): State<SharedState>,
    Path(user_id): Path<UserId>,
) -> Result<Json<CancelSearchResponse>, AppError> {
    let was_searching = matchmaking::cancel_search(&state, user_id).await?;
    Ok(Json(CancelSearchResponse { was_searching }))
}

/// In-memory duel counters of the user.
#[utoipa::path(
    get,
    path = "/users/{id}/stats",
    tag = "users",
    params(("id" = i64, Path, description = "User identifier")),
    responses((status = 200, description = "Statistics", body = UserStatsResponse))
)]
pub async fn user_stats(
    State(state): State<SharedState>,
    Path(user_id): Path<UserId>,
) -> Json<UserStatsResponse> {
    let stats = stats_service::user_duel_stats(&state, user_id);
    Json(UserStatsResponse::new(user_id, stats))
}

/// Reset the user's counters and stored record.
#[utoipa::path(
    delete,
    path = "/users/{id}/stats",
    tag = "users",
    params(("id" = i64, Path, description = "User identifier")),
    responses(
        (status = 204, description = "Statistics reset"),
        (status = 503, description = "Store unavailable")
    )
)]
pub async fn reset_stats(
    State(state): State<SharedState>,
    Path(user_id): Path<UserId>,
) -> Result<StatusCode, AppError> {
    stats_service::reset_user_duel_stats(&state, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Stored lifetime record of the user.
#[utoipa::path(
    get,
    path = "/users/{id}/record",
    tag = "users",
    params(("id" = i64, Path, description = "User identifier")),
    responses(
        (status = 200, description = "Lifetime record", body = PlayerRecordResponse),
        (status = 503, description = "Store unavailable")
    )
)]
pub async fn player_record(
    State(state): State<SharedState>,
    Path(user_id): Path<UserId>,
) -> Result<Json<PlayerRecordResponse>, AppError> {
    let record = stats_service::player_record(&state, user_id).await?;
    Ok(Json(record.into()))
}

/// Most recent finished duels of the user.
#[utoipa::path(
    get,
    path = "/users/{id}/history",
    tag = "users",
    params(("id" = i64, Path, description = "User identifier"), LimitQuery),
    responses(
        (status = 200, description = "Duel history", body = [DuelHistoryEntry]),
        (status = 503, description = "Store unavailable")
    )
)]
pub async fn duel_history(
    State(state): State<SharedState>,
    Path(user_id): Path<UserId>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<DuelHistoryEntry>>, AppError> {
    let history = stats_service::duel_history(&state, user_id, query.resolved()).await?;
    Ok(Json(history.into_iter().map(DuelHistoryEntry::from).collect()))
}

/// Register the display name shown to other players.
#[utoipa::path(
    put,
    path = "/users/{id}/profile",
    tag = "users",
    params(("id" = i64, Path, description = "User identifier")),
    request_body = ProfileRequest,
    responses(
        (status = 204, description = "Profile stored"),
        (status = 400, description = "Invalid display name")
    )
)]
pub async fn update_profile(
    Extension(gateway): Extension<SseGateway>,
    Path(user_id): Path<UserId>,
    Json(payload): Json<ProfileRequest>,
) -> Result<StatusCode, AppError> {
    payload.validate()?;
    gateway.set_display_name(user_id, payload.display_name.trim().to_string());
    Ok(StatusCode::NO_CONTENT)
}

/// Best players by win rate, then wins.
#[utoipa::path(
    get,
    path = "/leaderboard",
    tag = "users",
    params(LimitQuery),
    responses(
        (status = 200, description = "Leaderboard", body = [LeaderboardEntry]),
        (status = 503, description = "Store unavailable")
    )
)]
pub async fn leaderboard(
    State(state): State<SharedState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<LeaderboardEntry>>, AppError> {
    let records = stats_service::leaderboard(&state, query.resolved()).await?;
    Ok(Json(rank(records)))
}
