use tokio::time::{Instant, MissedTickBehavior, interval};
use tracing::{debug, error, info};

use crate::{
    services::{gateway, matchmaking},
    state::SharedState,
};

/// Periodically purge stale duels and expired cached names.
///
/// Every sweep runs on its own task so a panicking sweep only costs one tick.
pub async fn run(state: SharedState) {
    let mut ticker = interval(state.config().cleanup_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // the first tick completes immediately
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let sweep = tokio::spawn(sweep(state.clone()));
        match sweep.await {
            Ok(purged) if purged > 0 => info!(purged, "stale duels purged"),
            Ok(_) => debug!("cleanup sweep found nothing to purge"),
            Err(err) => error!(error = %err, "cleanup sweep failed"),
        }
    }
}

/// Purge every duel older than the configured staleness limit.
///
/// Returns the number of purged duels.
pub async fn sweep(state: SharedState) -> usize {
    let registry = state.registry();
    let max_age = state.config().stale_duel_timeout;
    let now = Instant::now();
    let mut purged = 0;

    for (duel_id, handle) in registry.handles() {
        let duel = handle.lock().await;
        if !registry.is_current(&duel_id, &handle)
            || now.saturating_duration_since(duel.created_at()) < max_age
        {
            continue;
        }

        let members = duel.players().to_vec();
        for user_id in &members {
            matchmaking::stop_search(&state, *user_id);
            registry.release_user(*user_id, &duel_id);
        }
        let mut retracted: Vec<_> = registry.take_lobby_messages(&duel_id).into_iter().collect();
        retracted.extend(registry.take_question_messages(&duel_id));
        registry.remove_duel(&duel_id);
        drop(duel);

        gateway::delete_all(state.gateway(), retracted).await;
        info!(duel_id = %duel_id, players = members.len(), "stale duel purged");
        purged += 1;
    }

    let expired = state.names().clear_expired();
    if expired > 0 {
        debug!(expired, "expired display names dropped");
    }
    purged
}
