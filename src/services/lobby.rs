//! Lobby management: creating, joining and leaving duels, and keeping every
//! member's lobby message in sync.

use std::collections::HashMap;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::{
    error::{DuelError, ServiceError},
    services::{
        gateway::{self, MessageButton, MessageOptions},
        matchmaking, session,
    },
    state::{
        DuelStatus, SharedState,
        duel::{Duel, DuelFormat, DuelId, DuelSnapshot, RoundSummary, Team, UserId},
        name_cache::fallback_name,
    },
};

/// Create a waiting duel with the user as creator and only player.
pub async fn create_duel(
    state: &SharedState,
    format: &str,
    user_id: UserId,
) -> Result<DuelId, ServiceError> {
    let format: DuelFormat = format.parse()?;
    let duel_id = open_duel(state, format, user_id)?;
    info!(duel_id = %duel_id, user_id, format = %format, "duel created");

    render_lobby(state, &duel_id, None).await;
    Ok(duel_id)
}

/// Register a duel for `user_id` with the configured defaults and count it.
pub(crate) fn open_duel(
    state: &SharedState,
    format: DuelFormat,
    user_id: UserId,
) -> Result<DuelId, DuelError> {
    let config = state.config();
    let duel_id = state.registry().create_duel(
        format,
        user_id,
        config.default_category.clone(),
        config.max_questions,
    )?;
    state.stats().record_created(user_id);
    Ok(duel_id)
}

/// Seat the user in a waiting duel and return their team.
///
/// Members that were waiting in a matchmaking queue are dequeued: they found
/// their match.
pub async fn join_duel(
    state: &SharedState,
    duel_id: &str,
    user_id: UserId,
) -> Result<Team, ServiceError> {
    let registry = state.registry();
    registry.get(duel_id)?;
    registry.claim_user(user_id, duel_id)?;

    let joined = registry
        .with_duel_lock(duel_id, |duel| {
            let team = duel.add_player(user_id)?;
            Ok::<_, DuelError>((team, duel.players().to_vec()))
        })
        .await
        .and_then(|result| result);

    let (team, players) = match joined {
        Ok(joined) => joined,
        Err(err) => {
            registry.release_user(user_id, duel_id);
            return Err(err.into());
        }
    };

    state.stats().record_joined(user_id);
    for member in &players {
        registry.dequeue_everywhere(*member);
    }

    let name = state.names().display_name(user_id).await;
    info!(duel_id, user_id, team = ?team, "player joined duel");
    render_lobby(
        state,
        duel_id,
        Some(format!("{name} joined {}!", team.label())),
    )
    .await;
    Ok(team)
}

/// Leave a duel on the user's request, stopping any running search.
pub async fn leave_duel(
    state: &SharedState,
    duel_id: &str,
    user_id: UserId,
) -> Result<(), ServiceError> {
    matchmaking::stop_search(state, user_id);
    remove_member(state, duel_id, user_id).await?;
    Ok(())
}

/// Result of removing a player while holding the duel lock.
struct MemberRemoval {
    status: DuelStatus,
    empty: bool,
    early_close: Option<RoundSummary>,
}

/// Remove a player without touching their search task.
///
/// Empty duels are purged; waiting lobbies are re-rendered; an active round
/// whose remaining players all answered closes right away.
pub(crate) async fn remove_member(
    state: &SharedState,
    duel_id: &str,
    user_id: UserId,
) -> Result<(), DuelError> {
    remove_member_if(state, duel_id, user_id, |_| true).await?;
    Ok(())
}

/// [`remove_member`], checking `keep_going` under the same duel lock first.
///
/// Returns `Ok(false)` and leaves the duel untouched when the check fails.
pub(crate) async fn remove_member_if(
    state: &SharedState,
    duel_id: &str,
    user_id: UserId,
    keep_going: impl FnOnce(&Duel) -> bool,
) -> Result<bool, DuelError> {
    let registry = state.registry();
    let removal = registry
        .with_duel_lock(duel_id, |duel| {
            if !keep_going(duel) {
                return Ok(None);
            }
            duel.remove_player(user_id)
                .ok_or_else(|| DuelError::NotInDuel(duel_id.to_string()))?;
            let early_close = match duel.open_round() {
                Some(round) if duel.all_answered() => duel.close_round(round),
                _ => None,
            };
            Ok::<_, DuelError>(Some(MemberRemoval {
                status: duel.status(),
                empty: duel.is_empty(),
                early_close,
            }))
        })
        .await
        .and_then(|result| result)?;
    let Some(removal) = removal else {
        return Ok(false);
    };

    registry.release_user(user_id, duel_id);
    let mut retracted = Vec::new();
    if let Some(message_id) = registry.take_lobby_message(duel_id, user_id) {
        retracted.push((user_id, message_id));
    }
    if let Some(message_id) = registry.take_question_message(duel_id, user_id) {
        retracted.push((user_id, message_id));
    }
    gateway::delete_all(state.gateway(), retracted).await;
    info!(duel_id, user_id, "player left duel");

    if removal.empty {
        registry.remove_duel(duel_id);
        info!(duel_id, "empty duel purged");
        return Ok(true);
    }

    match removal.status {
        DuelStatus::Waiting => {
            let name = state.names().display_name(user_id).await;
            render_lobby(state, duel_id, Some(format!("{name} left the duel"))).await;
        }
        DuelStatus::Active => {
            if let Some(summary) = removal.early_close {
                registry.cancel_round_timer(duel_id);
                debug!(duel_id, round = summary.round, "round closed after a player left");
                tokio::spawn(session::complete_round(
                    state.clone(),
                    duel_id.to_string(),
                    summary,
                ));
            }
        }
        DuelStatus::Finished => {}
    }
    Ok(true)
}

/// Re-render the lobby of every member of a waiting duel.
///
/// Existing lobby messages are edited in place; members without one (or whose
/// edit failed) get a fresh message whose id is recorded.
pub async fn render_lobby(state: &SharedState, duel_id: &str, banner: Option<String>) {
    let registry = state.registry();
    let Ok(snapshot) = registry.with_duel_lock(duel_id, |duel| duel.snapshot()).await else {
        return;
    };
    if snapshot.status != DuelStatus::Waiting {
        return;
    }

    let names = state.names().display_names(&snapshot.players).await;
    let text = lobby_text(&snapshot, &names, banner.as_deref());
    let gateway = state.gateway();

    let updates = snapshot.players.iter().map(|&user_id| {
        let options = lobby_buttons(&snapshot, user_id);
        let existing = registry.lobby_message(duel_id, user_id);
        let text = text.clone();
        async move {
            if let Some(message_id) = existing {
                match gateway
                    .edit_message(user_id, message_id, text.clone(), Some(options.clone()))
                    .await
                {
                    Ok(()) => return,
                    Err(err) => {
                        debug!(duel_id, user_id, error = %err, "lobby edit failed; sending a new message")
                    }
                }
            }

            match gateway.send_message(user_id, text, Some(options)).await {
                Ok(message_id) => {
                    if !registry.set_lobby_message(duel_id, user_id, message_id) {
                        gateway::delete_all(gateway, [(user_id, message_id)]).await;
                    }
                }
                Err(err) => warn!(duel_id, user_id, error = %err, "failed to deliver lobby"),
            }
        }
    });

    join_all(updates).await;
}

/// Plain-text lobby body shared by every member.
pub fn lobby_text(
    snapshot: &DuelSnapshot,
    names: &HashMap<UserId, String>,
    banner: Option<&str>,
) -> String {
    let mut text = format!(
        "Duel lobby {}\n\nPlayers: {}/{}\nCategory: {}\n",
        snapshot.format,
        snapshot.players.len(),
        snapshot.max_players(),
        snapshot.category,
    );

    if let Some(banner) = banner {
        text.push_str(&format!("\n{banner}\n"));
    }

    text.push_str(&format!("\nDuel ID: {}\n\nParticipants:\n", snapshot.id));
    for (position, user_id) in snapshot.players.iter().enumerate() {
        let marker = match snapshot.team_of(*user_id) {
            Some(Team::TeamA) => "[A]",
            Some(Team::TeamB) => "[B]",
            None => "[ ]",
        };
        let name = names
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| fallback_name(*user_id));
        let crown = if *user_id == snapshot.creator_id {
            " (creator)"
        } else {
            ""
        };
        text.push_str(&format!("{}. {marker} {name}{crown}\n", position + 1));
    }

    let footer = if snapshot.is_full() {
        "The lobby is full. The creator can start the duel."
    } else if snapshot.players.len() >= 2 {
        "The creator can start now or wait for more players."
    } else {
        "Waiting for players..."
    };
    text.push('\n');
    text.push_str(footer);
    text
}

/// Buttons of a member's lobby message; only the creator may start.
pub fn lobby_buttons(snapshot: &DuelSnapshot, user_id: UserId) -> MessageOptions {
    let mut buttons = vec![MessageButton::new(
        format!("Players: {}/{}", snapshot.players.len(), snapshot.max_players()),
        format!("refresh:{}", snapshot.id),
    )];
    if user_id == snapshot.creator_id && snapshot.players.len() >= 2 {
        buttons.push(MessageButton::new(
            "Start duel",
            format!("start:{}", snapshot.id),
        ));
    }
    buttons.push(MessageButton::new(
        "Leave",
        format!("leave:{}", snapshot.id),
    ));
    MessageOptions::column(buttons)
}

/// Re-render the lobby of the user's current duel, returning its id.
pub async fn refresh_lobby(state: &SharedState, user_id: UserId) -> Option<DuelId> {
    let duel_id = state.registry().duel_of(user_id)?;
    render_lobby(state, &duel_id, None).await;
    Some(duel_id)
}

/// Waiting, non-full duels, optionally filtered by format.
pub async fn available_duels(
    state: &SharedState,
    format: Option<&str>,
) -> Result<Vec<DuelSnapshot>, ServiceError> {
    let format = format.map(str::parse::<DuelFormat>).transpose()?;
    Ok(state.registry().list_available(format).await)
}

/// Current state of a duel.
pub async fn duel_status(state: &SharedState, duel_id: &str) -> Result<DuelSnapshot, ServiceError> {
    Ok(state
        .registry()
        .with_duel_lock(duel_id, |duel| duel.snapshot())
        .await?)
}

/// Duel the user currently belongs to.
pub async fn current_duel(state: &SharedState, user_id: UserId) -> Option<DuelSnapshot> {
    let duel_id = state.registry().duel_of(user_id)?;
    state
        .registry()
        .with_duel_lock(&duel_id, |duel| duel.snapshot())
        .await
        .ok()
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;
    use tokio::time::Instant;

    use super::*;
    use crate::state::duel::TeamScores;

    fn snapshot(players: Vec<UserId>) -> DuelSnapshot {
        let team_a: Vec<_> = players.iter().copied().step_by(2).collect();
        let team_b: Vec<_> = players.iter().copied().skip(1).step_by(2).collect();
        DuelSnapshot {
            id: "duel_abc".into(),
            format: DuelFormat::TwoVsTwo,
            status: DuelStatus::Waiting,
            open_round: None,
            creator_id: players[0],
            category: "random".into(),
            player_scores: players.iter().map(|p| (*p, 0)).collect::<IndexMap<_, _>>(),
            players,
            team_a,
            team_b,
            team_scores: TeamScores::default(),
            answered: 0,
            questions_asked: 0,
            max_questions: 10,
            created_at: Instant::now(),
            created_at_wall: std::time::SystemTime::now(),
        }
    }

    #[test]
    fn lobby_lists_members_with_their_team() {
        let snapshot = snapshot(vec![1, 2, 3]);
        let names = HashMap::from([(1, "Ada".to_string()), (2, "Bob".to_string())]);
        let text = lobby_text(&snapshot, &names, Some("Bob joined Team B!"));

        assert!(text.contains("Players: 3/4"));
        assert!(text.contains("1. [A] Ada (creator)"));
        assert!(text.contains("2. [B] Bob"));
        assert!(text.contains("3. [A] Player 3"));
        assert!(text.contains("Bob joined Team B!"));
        assert!(text.contains("duel_abc"));
    }

    #[test]
    fn only_the_creator_gets_a_start_button() {
        let snapshot = snapshot(vec![1, 2]);
        let has_start = |options: MessageOptions| {
            options
                .buttons
                .iter()
                .flatten()
                .any(|button| button.action == "start:duel_abc")
        };
        assert!(has_start(lobby_buttons(&snapshot, 1)));
        assert!(!has_start(lobby_buttons(&snapshot, 2)));
    }

    #[test]
    fn a_lone_creator_cannot_start() {
        let snapshot = snapshot(vec![1]);
        assert!(
            !lobby_buttons(&snapshot, 1)
                .buttons
                .iter()
                .flatten()
                .any(|button| button.action.starts_with("start:"))
        );
    }
}
