use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use validator::Validate;

use crate::{
    dto::duel::{
        AnswerRequest, AnswerResponse, AvailableDuelsQuery, CreateDuelRequest, CreateDuelResponse,
        DuelSummary, JoinDuelResponse, QuickJoinRequest, QuickJoinResponse, UserActionRequest,
    },
    error::AppError,
    services::{lobby, matchmaking, session},
    state::SharedState,
};

/// Routes driving the duel lifecycle.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/duels", get(list_duels).post(create_duel))
        .route("/duels/quick-join", post(quick_join))
        .route("/duels/{id}", get(duel_status))
        .route("/duels/{id}/join", post(join_duel))
        .route("/duels/{id}/leave", post(leave_duel))
        .route("/duels/{id}/start", post(start_duel))
        .route("/duels/{id}/answer", post(submit_answer))
}

/// List waiting duels that still have free seats, oldest first.
#[utoipa::path(
    get,
    path = "/duels",
    tag = "duels",
    params(AvailableDuelsQuery),
    responses(
        (status = 200, description = "Open duels", body = [DuelSummary]),
        (status = 400, description = "Unknown format")
    )
)]
pub async fn list_duels(
    State(state): State<SharedState>,
    Query(query): Query<AvailableDuelsQuery>,
) -> Result<Json<Vec<DuelSummary>>, AppError> {
    let duels = lobby::available_duels(&state, query.format.as_deref()).await?;
    Ok(Json(duels.into_iter().map(DuelSummary::from).collect()))
}

/// Open a new duel lobby.
#[utoipa::path(
    post,
    path = "/duels",
    tag = "duels",
    request_body = CreateDuelRequest,
    responses(
        (status = 201, description = "Duel created", body = CreateDuelResponse),
        (status = 409, description = "User already in a duel")
    )
)]
pub async fn create_duel(
    State(state): State<SharedState>,
    Json(payload): Json<CreateDuelRequest>,
) -> Result<(StatusCode, Json<CreateDuelResponse>), AppError> {
    payload.validate()?;
    let duel_id = lobby::create_duel(&state, &payload.format, payload.user_id).await?;
    Ok((StatusCode::CREATED, Json(CreateDuelResponse { duel_id })))
}

/// Join the oldest open duel of a format or start a background search.
#[utoipa::path(
    post,
    path = "/duels/quick-join",
    tag = "duels",
    request_body = QuickJoinRequest,
    responses(
        (status = 200, description = "Matched or searching", body = QuickJoinResponse),
        (status = 409, description = "User already in a duel")
    )
)]
pub async fn quick_join(
    State(state): State<SharedState>,
    Json(payload): Json<QuickJoinRequest>,
) -> Result<Json<QuickJoinResponse>, AppError> {
    payload.validate()?;
    let join = matchmaking::quick_join(&state, payload.user_id, &payload.format).await?;
    Ok(Json(join.into()))
}

/// Current state of a duel.
#[utoipa::path(
    get,
    path = "/duels/{id}",
    tag = "duels",
    params(("id" = String, Path, description = "Duel identifier")),
    responses(
        (status = 200, description = "Duel state", body = DuelSummary),
        (status = 404, description = "Duel not found")
    )
)]
pub async fn duel_status(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<DuelSummary>, AppError> {
    let snapshot = lobby::duel_status(&state, &id).await?;
    Ok(Json(snapshot.into()))
}

/// Take a seat in a waiting duel.
#[utoipa::path(
    post,
    path = "/duels/{id}/join",
    tag = "duels",
    params(("id" = String, Path, description = "Duel identifier")),
    request_body = UserActionRequest,
    responses(
        (status = 200, description = "Joined", body = JoinDuelResponse),
        (status = 404, description = "Duel not found"),
        (status = 409, description = "Duel full, started or user busy")
    )
)]
pub async fn join_duel(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(payload): Json<UserActionRequest>,
) -> Result<Json<JoinDuelResponse>, AppError> {
    payload.validate()?;
    let team = lobby::join_duel(&state, &id, payload.user_id).await?;
    Ok(Json(JoinDuelResponse { duel_id: id, team }))
}

/// Leave a duel, stopping any quick search.
#[utoipa::path(
    post,
    path = "/duels/{id}/leave",
    tag = "duels",
    params(("id" = String, Path, description = "Duel identifier")),
    request_body = UserActionRequest,
    responses(
        (status = 204, description = "Left the duel"),
        (status = 404, description = "Duel not found"),
        (status = 409, description = "User not in the duel")
    )
)]
pub async fn leave_duel(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(payload): Json<UserActionRequest>,
) -> Result<StatusCode, AppError> {
    payload.validate()?;
    lobby::leave_duel(&state, &id, payload.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Start a duel; creator only.
#[utoipa::path(
    post,
    path = "/duels/{id}/start",
    tag = "duels",
    params(("id" = String, Path, description = "Duel identifier")),
    request_body = UserActionRequest,
    responses(
        (status = 204, description = "Duel started"),
        (status = 403, description = "Caller is not the creator"),
        (status = 409, description = "Already started or not enough players")
    )
)]
pub async fn start_duel(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(payload): Json<UserActionRequest>,
) -> Result<StatusCode, AppError> {
    payload.validate()?;
    session::start_duel(&state, &id, payload.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Answer the open question.
#[utoipa::path(
    post,
    path = "/duels/{id}/answer",
    tag = "duels",
    params(("id" = String, Path, description = "Duel identifier")),
    request_body = AnswerRequest,
    responses(
        (status = 200, description = "Answer recorded", body = AnswerResponse),
        (status = 400, description = "Option out of range"),
        (status = 409, description = "No open question or already answered")
    )
)]
pub async fn submit_answer(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Json(payload): Json<AnswerRequest>,
) -> Result<Json<AnswerResponse>, AppError> {
    payload.validate()?;
    let outcome =
        session::submit_answer(&state, &id, payload.user_id, payload.option_index).await?;
    Ok(Json(outcome.into()))
}
