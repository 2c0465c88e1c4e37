//! Quick-join matchmaking: join an open duel right away or keep searching in
//! the background until the wait limit expires.

use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::{
    error::{DuelError, ServiceError},
    services::lobby,
    state::{
        DuelStatus, SharedState,
        duel::{Duel, DuelFormat, DuelId, UserId},
    },
};

/// Outcome of a quick-join request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuickJoin {
    /// Duel the user now belongs to.
    pub duel_id: DuelId,
    /// True when the user joined an existing duel; false when a new duel was
    /// opened and a background search started.
    pub matched: bool,
}

/// Join the oldest open duel of the format, or open one and start searching.
pub async fn quick_join(
    state: &SharedState,
    user_id: UserId,
    format: &str,
) -> Result<QuickJoin, ServiceError> {
    let format: DuelFormat = format.parse()?;
    if let Some(current) = state.registry().duel_of(user_id) {
        return Err(DuelError::AlreadyInDuel(current).into());
    }

    if let Some(duel_id) = join_first_available(state, format, user_id, None).await? {
        info!(duel_id = %duel_id, user_id, format = %format, "quick join matched");
        return Ok(QuickJoin {
            duel_id,
            matched: true,
        });
    }

    let duel_id = lobby::open_duel(state, format, user_id)?;
    state.registry().enqueue(format, user_id);
    lobby::render_lobby(
        state,
        &duel_id,
        Some("Searching for opponents...".to_string()),
    )
    .await;

    let generation = state.next_search_generation();
    let deadline = Instant::now() + state.config().max_wait_time;
    let handle = tokio::spawn(search_loop(
        state.clone(),
        user_id,
        format,
        duel_id.clone(),
        deadline,
        generation,
    ));
    state.track_search(user_id, generation, handle);
    info!(duel_id = %duel_id, user_id, format = %format, "quick join searching");

    Ok(QuickJoin {
        duel_id,
        matched: false,
    })
}

/// Join the first open duel of the format that accepts the user.
///
/// Candidates that filled up, started or vanished since the listing are
/// skipped.
async fn join_first_available(
    state: &SharedState,
    format: DuelFormat,
    user_id: UserId,
    skip: Option<&str>,
) -> Result<Option<DuelId>, ServiceError> {
    for candidate in state.registry().list_available(Some(format)).await {
        if candidate.players.contains(&user_id) || skip == Some(candidate.id.as_str()) {
            continue;
        }
        match lobby::join_duel(state, &candidate.id, user_id).await {
            Ok(_) => return Ok(Some(candidate.id)),
            Err(ServiceError::Duel(
                DuelError::DuelFull(_)
                | DuelError::DuelNotFound(_)
                | DuelError::DuelAlreadyStarted(_)
                | DuelError::AlreadyJoined(_),
            )) => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(None)
}

#[derive(Debug)]
enum SearchEnd {
    Matched,
    Moved(DuelId),
    TimedOut,
}

/// Background search of a queued user.
///
/// Ends as soon as the user leaves the queue (somebody joined their duel or
/// the search was cancelled), after moving the user into another open duel,
/// or at the deadline. A timed-out duel stays open.
pub async fn search_loop(
    state: SharedState,
    user_id: UserId,
    format: DuelFormat,
    mut own_duel: DuelId,
    deadline: Instant,
    generation: u64,
) {
    let poll = state.config().search_poll_interval;
    let registry = state.registry();

    let end = loop {
        let now = Instant::now();
        if now >= deadline {
            break SearchEnd::TimedOut;
        }
        sleep(poll.min(deadline - now)).await;

        if !registry.is_queued(user_id) {
            break SearchEnd::Matched;
        }
        match try_move(&state, user_id, format, &mut own_duel).await {
            Ok(Some(duel_id)) => break SearchEnd::Moved(duel_id),
            Ok(None) => {}
            Err(err) => warn!(user_id, error = %err, "quick search scan failed"),
        }
    };

    match end {
        SearchEnd::Matched => debug!(user_id, "quick search ended: matched or cancelled"),
        SearchEnd::Moved(duel_id) => {
            info!(user_id, duel_id = %duel_id, "quick search moved player into another duel")
        }
        SearchEnd::TimedOut => {
            registry.dequeue(format, user_id);
            info!(user_id, duel_id = %own_duel, "quick search timed out; duel stays open");
        }
    }
    state.finish_search(user_id, generation);
}

/// Move the user from their solo duel into another open duel of the format.
///
/// When the other duel's creator is searching as well, only the owner of the
/// younger duel moves, so two searchers meet in a single duel.
async fn try_move(
    state: &SharedState,
    user_id: UserId,
    format: DuelFormat,
    own_duel: &mut DuelId,
) -> Result<Option<DuelId>, ServiceError> {
    let registry = state.registry();
    let Ok(own) = registry
        .with_duel_lock(own_duel, |duel| duel.snapshot())
        .await
    else {
        return Ok(None);
    };
    if own.status != DuelStatus::Waiting || own.players != [user_id] {
        return Ok(None);
    }

    let candidates = registry.list_available(Some(format)).await;
    let Some(target) = candidates.into_iter().find(|candidate| {
        if candidate.id == own.id || candidate.players.contains(&user_id) {
            return false;
        }
        let rival_searching =
            candidate.players.len() == 1 && registry.is_queued(candidate.creator_id);
        !rival_searching || (candidate.created_at, &candidate.id) < (own.created_at, &own.id)
    }) else {
        return Ok(None);
    };

    // somebody may have joined while the candidates were listed
    let still_solo = |duel: &Duel| {
        duel.status() == DuelStatus::Waiting
            && duel.players() == [user_id]
            && registry.is_queued(user_id)
    };
    if !lobby::remove_member_if(state, own_duel, user_id, still_solo).await? {
        return Ok(None);
    }
    match lobby::join_duel(state, &target.id, user_id).await {
        Ok(_) => Ok(Some(target.id)),
        Err(err) => {
            debug!(user_id, duel_id = %target.id, error = %err, "move failed; reopening own duel");
            *own_duel = lobby::open_duel(state, format, user_id)?;
            lobby::render_lobby(
                state,
                own_duel,
                Some("Searching for opponents...".to_string()),
            )
            .await;
            Ok(None)
        }
    }
}

/// Abort the user's search task and take them out of every queue.
pub fn stop_search(state: &SharedState, user_id: UserId) -> bool {
    let aborted = state.abort_search(user_id);
    state.registry().dequeue_everywhere(user_id);
    aborted
}

/// Cancel the user's quick search and leave the waiting duel it opened.
///
/// Returns whether a search was running.
pub async fn cancel_search(state: &SharedState, user_id: UserId) -> Result<bool, ServiceError> {
    let was_searching = stop_search(state, user_id);
    let Some(duel_id) = state.registry().duel_of(user_id) else {
        return Ok(was_searching);
    };

    let waiting = |duel: &Duel| duel.status() == DuelStatus::Waiting;
    match lobby::remove_member_if(state, &duel_id, user_id, waiting).await {
        Ok(_) | Err(DuelError::DuelNotFound(_) | DuelError::NotInDuel(_)) => {}
        Err(err) => return Err(err.into()),
    }
    info!(user_id, was_searching, "quick search cancelled");
    Ok(was_searching)
}
