use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Quiz Duel Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::user_stream,
        crate::routes::duels::list_duels,
        crate::routes::duels::create_duel,
        crate::routes::duels::quick_join,
        crate::routes::duels::duel_status,
        crate::routes::duels::join_duel,
        crate::routes::duels::leave_duel,
        crate::routes::duels::start_duel,
        crate::routes::duels::submit_answer,
        crate::routes::users::current_duel,
        crate::routes::users::refresh_lobby,
        crate::routes::users::cancel_search,
        crate::routes::users::user_stats,
        crate::routes::users::reset_stats,
        crate::routes::users::player_record,
        crate::routes::users::duel_history,
        crate::routes::users::update_profile,
        crate::routes::users::leaderboard,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::duel::CreateDuelRequest,
            crate::dto::duel::QuickJoinRequest,
            crate::dto::duel::UserActionRequest,
            crate::dto::duel::AnswerRequest,
            crate::dto::duel::ProfileRequest,
            crate::dto::duel::DuelSummary,
            crate::dto::duel::PlayerScoreSummary,
            crate::dto::duel::CreateDuelResponse,
            crate::dto::duel::QuickJoinResponse,
            crate::dto::duel::JoinDuelResponse,
            crate::dto::duel::AnswerResponse,
            crate::dto::duel::CancelSearchResponse,
            crate::dto::duel::RefreshLobbyResponse,
            crate::dto::stats::UserStatsResponse,
            crate::dto::stats::PlayerRecordResponse,
            crate::dto::stats::DuelHistoryEntry,
            crate::dto::stats::LeaderboardEntry,
            crate::dto::sse::Handshake,
            crate::dto::sse::MessageSentEvent,
            crate::dto::sse::MessageEditedEvent,
            crate::dto::sse::MessageDeletedEvent,
            crate::services::gateway::MessageButton,
            crate::state::DuelStatus,
            crate::state::duel::DuelFormat,
            crate::state::duel::Team,
            crate::state::duel::TeamScores,
            crate::state::duel::PlayerOutcome,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sse", description = "Per-user message streams"),
        (name = "duels", description = "Duel lobby and round operations"),
        (name = "users", description = "Per-user state, statistics and leaderboard"),
    )
)]
pub struct ApiDoc;
