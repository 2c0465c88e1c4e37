use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::{dao::storage::StorageError, state::duel::DuelId};

/// Domain errors raised by the duel engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DuelError {
    /// Format string is not one of `1v1`..`4v4`.
    #[error("invalid duel format: {0}")]
    InvalidFormat(String),
    /// Duel id is unknown or the duel was purged.
    #[error("duel {0} not found")]
    DuelNotFound(DuelId),
    /// User is already mapped to another duel.
    #[error("user already participates in duel {0}")]
    AlreadyInDuel(DuelId),
    /// User is already a player of this duel.
    #[error("user already joined duel {0}")]
    AlreadyJoined(DuelId),
    /// Every seat is taken.
    #[error("duel {0} is full")]
    DuelFull(DuelId),
    /// The duel left the lobby phase.
    #[error("duel {0} already started")]
    DuelAlreadyStarted(DuelId),
    /// User is not a player of this duel.
    #[error("user is not part of duel {0}")]
    NotInDuel(DuelId),
    /// Only the creator may start the duel.
    #[error("only the duel creator can start it")]
    NotCreator,
    /// Not enough players to start.
    #[error("need at least {required} players, got {actual}")]
    NotEnoughPlayers {
        /// Minimum number of players.
        required: usize,
        /// Current number of players.
        actual: usize,
    },
    /// No round is accepting answers.
    #[error("no active question")]
    NoActiveQuestion,
    /// User already answered the open round.
    #[error("answer already recorded for this round")]
    AlreadyAnswered,
    /// Option index out of range.
    #[error("option {index} is out of range (0..{available})")]
    InvalidOption {
        /// Index sent by the player.
        index: usize,
        /// Number of options of the question.
        available: usize,
    },
}

impl DuelError {
    /// Short message suitable for the end user.
    pub fn user_message(&self) -> String {
        match self {
            DuelError::InvalidFormat(_) => {
                "Unknown duel format. Available formats: 1v1, 2v2, 3v3, 4v4".into()
            }
            DuelError::DuelNotFound(_) => "Duel not found".into(),
            DuelError::AlreadyInDuel(_) => "You are already in a duel".into(),
            DuelError::AlreadyJoined(_) => "You already joined this duel".into(),
            DuelError::DuelFull(_) => "This duel is full".into(),
            DuelError::DuelAlreadyStarted(_) => "This duel has already started".into(),
            DuelError::NotInDuel(_) => "You are not part of this duel".into(),
            DuelError::NotCreator => "Only the duel creator can start the duel".into(),
            DuelError::NotEnoughPlayers { required, .. } => {
                format!("At least {required} players are needed to start")
            }
            DuelError::NoActiveQuestion => "There is no active question".into(),
            DuelError::AlreadyAnswered => "You have already answered this question".into(),
            DuelError::InvalidOption { .. } => "Invalid answer option".into(),
        }
    }
}

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Domain rule violated.
    #[error(transparent)]
    Duel(#[from] DuelError),
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("{0}")]
    BadRequest(String),
    /// Caller is not allowed to perform the operation.
    #[error("{0}")]
    Forbidden(String),
    /// Requested resource not found.
    #[error("{0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("{0}")]
    Conflict(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl From<DuelError> for AppError {
    fn from(err: DuelError) -> Self {
        let message = err.user_message();
        match err {
            DuelError::DuelNotFound(_) => AppError::NotFound(message),
            DuelError::InvalidFormat(_) | DuelError::InvalidOption { .. } => {
                AppError::BadRequest(message)
            }
            DuelError::NotCreator => AppError::Forbidden(message),
            DuelError::AlreadyInDuel(_)
            | DuelError::AlreadyJoined(_)
            | DuelError::DuelFull(_)
            | DuelError::DuelAlreadyStarted(_)
            | DuelError::NotInDuel(_)
            | DuelError::NotEnoughPlayers { .. }
            | DuelError::NoActiveQuestion
            | DuelError::AlreadyAnswered => AppError::Conflict(message),
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Duel(duel) => duel.into(),
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: impl Into<AppError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn duel_errors_map_to_http_statuses() {
        assert_eq!(
            status_of(DuelError::DuelNotFound("duel_x".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(DuelError::InvalidFormat("5v5".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(DuelError::NotCreator), StatusCode::FORBIDDEN);
        assert_eq!(
            status_of(DuelError::DuelFull("duel_x".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(ServiceError::Degraded),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn user_messages_do_not_leak_ids() {
        let err = DuelError::DuelNotFound("duel_secret".into());
        assert!(!err.user_message().contains("duel_secret"));
    }
}
