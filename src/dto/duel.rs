use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    dto::{
        format_system_time,
        validation::{validate_display_name, validate_duel_format},
    },
    services::matchmaking::QuickJoin,
    state::{
        DuelStatus,
        duel::{AnswerOutcome, DuelFormat, DuelId, DuelSnapshot, Team, TeamScores, UserId},
    },
};

/// Payload used to open a new duel lobby.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateDuelRequest {
    /// Creator of the duel.
    #[validate(range(min = 1))]
    pub user_id: UserId,
    /// Team size, `1v1` to `4v4`.
    #[validate(custom(function = "validate_duel_format"))]
    pub format: String,
}

/// Payload of a quick-join request.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct QuickJoinRequest {
    #[validate(range(min = 1))]
    pub user_id: UserId,
    #[validate(custom(function = "validate_duel_format"))]
    pub format: String,
}

/// Identifies the acting user for join, leave and start.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct UserActionRequest {
    #[validate(range(min = 1))]
    pub user_id: UserId,
}

/// Answer submitted for the open round.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct AnswerRequest {
    #[validate(range(min = 1))]
    pub user_id: UserId,
    /// Zero-based index of the chosen option.
    pub option_index: usize,
}

/// Display name registration used by the messaging gateway.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct ProfileRequest {
    #[validate(
        length(max = 64),
        custom(function = "validate_display_name")
    )]
    pub display_name: String,
}

/// Optional format filter of the duel listing.
#[derive(Debug, Deserialize, IntoParams)]
pub struct AvailableDuelsQuery {
    /// Only list duels of this format.
    pub format: Option<String>,
}

/// Points scored by one player.
#[derive(Debug, Serialize, ToSchema)]
pub struct PlayerScoreSummary {
    pub user_id: UserId,
    pub score: u32,
}

/// Public view of a duel.
#[derive(Debug, Serialize, ToSchema)]
pub struct DuelSummary {
    pub id: DuelId,
    pub format: DuelFormat,
    pub status: DuelStatus,
    /// Round accepting answers, if any.
    pub open_round: Option<u32>,
    pub creator_id: UserId,
    pub category: String,
    pub players: Vec<UserId>,
    pub max_players: usize,
    pub team_a: Vec<UserId>,
    pub team_b: Vec<UserId>,
    pub team_scores: TeamScores,
    pub player_scores: Vec<PlayerScoreSummary>,
    /// Players who answered the open round.
    pub answered: usize,
    pub questions_asked: u32,
    pub max_questions: u32,
    /// RFC 3339 creation time.
    pub created_at: String,
}

impl From<DuelSnapshot> for DuelSummary {
    fn from(snapshot: DuelSnapshot) -> Self {
        let max_players = snapshot.max_players();
        Self {
            id: snapshot.id,
            format: snapshot.format,
            status: snapshot.status,
            open_round: snapshot.open_round,
            creator_id: snapshot.creator_id,
            category: snapshot.category,
            players: snapshot.players,
            max_players,
            team_a: snapshot.team_a,
            team_b: snapshot.team_b,
            team_scores: snapshot.team_scores,
            player_scores: snapshot
                .player_scores
                .into_iter()
                .map(|(user_id, score)| PlayerScoreSummary { user_id, score })
                .collect(),
            answered: snapshot.answered,
            questions_asked: snapshot.questions_asked,
            max_questions: snapshot.max_questions,
            created_at: format_system_time(snapshot.created_at_wall),
        }
    }
}

/// Identifier of a freshly created duel.
#[derive(Debug, Serialize, ToSchema)]
pub struct CreateDuelResponse {
    pub duel_id: DuelId,
}

/// Result of a quick-join request.
#[derive(Debug, Serialize, ToSchema)]
pub struct QuickJoinResponse {
    pub duel_id: DuelId,
    /// `false` when a new duel was opened and the search continues in the background.
    pub matched: bool,
}

impl From<QuickJoin> for QuickJoinResponse {
    fn from(join: QuickJoin) -> Self {
        Self {
            duel_id: join.duel_id,
            matched: join.matched,
        }
    }
}

/// Seat obtained by joining a duel.
#[derive(Debug, Serialize, ToSchema)]
pub struct JoinDuelResponse {
    pub duel_id: DuelId,
    pub team: Team,
}

/// Feedback on a submitted answer.
#[derive(Debug, Serialize, ToSchema)]
pub struct AnswerResponse {
    pub correct: bool,
    pub message: String,
    pub round: u32,
}

impl From<AnswerOutcome> for AnswerResponse {
    fn from(outcome: AnswerOutcome) -> Self {
        Self {
            correct: outcome.correct,
            message: outcome.message,
            round: outcome.round,
        }
    }
}

/// Result of a search cancellation.
#[derive(Debug, Serialize, ToSchema)]
pub struct CancelSearchResponse {
    /// Whether a background search was running.
    pub was_searching: bool,
}

/// Result of a lobby refresh.
#[derive(Debug, Serialize, ToSchema)]
pub struct RefreshLobbyResponse {
    /// Duel whose lobby was re-rendered, if the user is in one.
    pub duel_id: Option<DuelId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_request_rejects_unknown_formats() {
        let request = CreateDuelRequest {
            user_id: 1,
            format: "5v5".into(),
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn user_ids_must_be_positive() {
        assert!(UserActionRequest { user_id: 0 }.validate().is_err());
        assert!(UserActionRequest { user_id: 7 }.validate().is_ok());
    }

    #[test]
    fn blank_display_names_are_rejected() {
        let request = ProfileRequest {
            display_name: "  ".into(),
        };
        assert!(request.validate().is_err());
    }
}
