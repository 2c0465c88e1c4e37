//! Round loop of a started duel: questions, answers, timers and results.

use std::time::SystemTime;

use futures::{FutureExt, future::BoxFuture};
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::{
    dao::models::DuelResultEntity,
    error::{DuelError, ServiceError},
    services::gateway::{self, MessageButton, MessageOptions},
    state::{
        DuelStatus, SharedState,
        duel::{AnswerOutcome, DuelOutcome, PlayerOutcome, Question, RoundSummary, Team, UserId},
        name_cache::fallback_name,
    },
};

/// Start a waiting duel on behalf of its creator.
///
/// Lobby messages are retracted, every player gets a starting notice and the
/// first question follows after the configured start delay.
pub async fn start_duel(
    state: &SharedState,
    duel_id: &str,
    user_id: UserId,
) -> Result<(), ServiceError> {
    let registry = state.registry();
    let snapshot = registry
        .with_duel_lock(duel_id, |duel| {
            duel.start(user_id)?;
            Ok::<_, DuelError>(duel.snapshot())
        })
        .await
        .and_then(|result| result)?;

    for member in &snapshot.players {
        registry.dequeue_everywhere(*member);
        state.abort_search(*member);
    }
    gateway::delete_all(state.gateway(), registry.take_lobby_messages(duel_id)).await;

    let notice = format!(
        "Duel {} is starting!\n\nCategory: {}\nPlayers: {}\nQuestions: {}\n\nGet ready...",
        snapshot.format,
        snapshot.category,
        snapshot.players.len(),
        snapshot.max_questions,
    );
    gateway::broadcast_text(state.gateway(), &snapshot.players, &notice, None).await;
    info!(duel_id, user_id, players = snapshot.players.len(), "duel started");

    let state = state.clone();
    let duel_id = duel_id.to_string();
    tokio::spawn(async move {
        sleep(state.config().start_delay).await;
        ask_question(state, duel_id).await;
    });
    Ok(())
}

/// Open the next round, or finish the duel when no question is left.
pub async fn ask_question(state: SharedState, duel_id: String) {
    let registry = state.registry();
    let Ok((has_left, category)) = registry
        .with_duel_lock(&duel_id, |duel| {
            (
                duel.status() == DuelStatus::Active && duel.has_questions_left(),
                duel.category().to_string(),
            )
        })
        .await
    else {
        debug!(duel_id = %duel_id, "duel vanished before the next question");
        return;
    };
    if !has_left {
        finish_duel(&state, &duel_id).await;
        return;
    }

    let Some(question) = fetch_question(&state, &duel_id, &category).await else {
        warn!(duel_id = %duel_id, category = %category, "no question available; finishing duel with current scores");
        finish_duel(&state, &duel_id).await;
        return;
    };

    let opened = registry
        .with_duel_lock(&duel_id, |duel| {
            duel.begin_round(question.clone(), Instant::now())
                .map(|round| (round, duel.snapshot()))
        })
        .await;
    let (round, snapshot) = match opened {
        Ok(Ok(opened)) => opened,
        Ok(Err(err)) => {
            debug!(duel_id = %duel_id, error = %err, "round not opened");
            return;
        }
        Err(_) => return,
    };

    let text = format!(
        "Question {}/{}\n\n{}\n\nScore: Team A {} - {} Team B",
        round,
        snapshot.max_questions,
        question.text,
        snapshot.team_scores.team_a,
        snapshot.team_scores.team_b,
    );
    let delivered = gateway::broadcast_text(
        state.gateway(),
        &snapshot.players,
        &text,
        Some(answer_buttons(&duel_id, &question)),
    )
    .await;
    let recorded = delivered
        .iter()
        .all(|&(user_id, message_id)| registry.set_question_message(&duel_id, user_id, message_id));
    if !recorded {
        debug!(duel_id = %duel_id, round, "duel purged during the question broadcast");
        gateway::delete_all(state.gateway(), delivered).await;
        return;
    }
    info!(duel_id = %duel_id, round, "question asked");

    let timer_state = state.clone();
    let timer_duel = duel_id.clone();
    let timeout = state.config().question_timeout;
    let timer = tokio::spawn(async move {
        sleep(timeout).await;
        if let Some(summary) = close_round(&timer_state, &timer_duel, round).await {
            debug!(duel_id = %timer_duel, round, "round timed out");
            tokio::spawn(complete_round(timer_state, timer_duel, summary));
        }
    });
    if !registry.set_round_timer(&duel_id, timer) {
        debug!(duel_id = %duel_id, round, "duel purged before its round timer was armed");
    }
}

async fn fetch_question(state: &SharedState, duel_id: &str, category: &str) -> Option<Question> {
    let config = state.config();
    let mut attempt = 0;
    loop {
        if let Some(question) = state.questions().random_question(category) {
            return Some(question);
        }
        if attempt >= config.question_retry_limit {
            return None;
        }
        attempt += 1;
        debug!(duel_id, category, attempt, "question source empty; retrying");
        sleep(config.question_retry_delay).await;
        if !state.registry().contains(duel_id) {
            return None;
        }
    }
}

/// One button per option, acting as `answer:<duel>:<index>`.
pub fn answer_buttons(duel_id: &str, question: &Question) -> MessageOptions {
    MessageOptions::column(question.options.iter().enumerate().map(|(index, option)| {
        MessageButton::new(option.clone(), format!("answer:{duel_id}:{index}"))
    }))
}

/// Close `round` of the duel. Only the first caller gets the summary.
pub async fn close_round(state: &SharedState, duel_id: &str, round: u32) -> Option<RoundSummary> {
    state
        .registry()
        .with_duel_lock(duel_id, |duel| duel.close_round(round))
        .await
        .ok()
        .flatten()
}

/// Score a player's answer for the open round.
///
/// The answering player's controls are retracted; when everybody answered the
/// round closes right away and the pending timer is cancelled.
pub async fn submit_answer(
    state: &SharedState,
    duel_id: &str,
    user_id: UserId,
    option_index: usize,
) -> Result<AnswerOutcome, ServiceError> {
    let registry = state.registry();
    let (outcome, early_close) = registry
        .with_duel_lock(duel_id, |duel| {
            let outcome = duel.record_answer(user_id, option_index, Instant::now())?;
            let early_close = if outcome.all_answered {
                duel.close_round(outcome.round)
            } else {
                None
            };
            Ok::<_, DuelError>((outcome, early_close))
        })
        .await
        .and_then(|result| result)?;

    state.stats().record_answer(user_id, outcome.correct);
    if let Some(message_id) = registry.take_question_message(duel_id, user_id) {
        gateway::delete_all(state.gateway(), [(user_id, message_id)]).await;
    }
    debug!(duel_id, user_id, round = outcome.round, correct = outcome.correct, "answer recorded");

    if let Some(summary) = early_close {
        registry.cancel_round_timer(duel_id);
        debug!(duel_id, round = summary.round, "every player answered");
        tokio::spawn(complete_round(state.clone(), duel_id.to_string(), summary));
    }
    Ok(outcome)
}

/// Report a closed round, pause, then move on to the next question.
pub fn complete_round(
    state: SharedState,
    duel_id: String,
    summary: RoundSummary,
) -> BoxFuture<'static, ()> {
    async move {
        let registry = state.registry();
        gateway::delete_all(state.gateway(), registry.take_question_messages(&duel_id)).await;

        let Ok(players) = registry
            .with_duel_lock(&duel_id, |duel| duel.players().to_vec())
            .await
        else {
            return;
        };

        let text = round_report(&summary);
        gateway::broadcast_text(state.gateway(), &players, &text, None).await;
        info!(
            duel_id = %duel_id,
            round = summary.round,
            correct = summary.correct_players.len(),
            "round completed"
        );

        sleep(state.config().post_round_delay).await;
        ask_question(state, duel_id).await;
    }
    .boxed()
}

/// Plain-text report of a closed round.
pub fn round_report(summary: &RoundSummary) -> String {
    let unanswered = summary
        .total_players
        .saturating_sub(summary.correct_players.len() + summary.incorrect_players.len());
    let mut text = format!(
        "Round {}/{} finished!\n\nCorrect answer: {}\n\nCorrect: {}\nIncorrect: {}\n",
        summary.round,
        summary.max_questions,
        summary.question.correct_answer(),
        summary.correct_players.len(),
        summary.incorrect_players.len(),
    );
    if unanswered > 0 {
        text.push_str(&format!("No answer: {unanswered}\n"));
    }
    text.push_str(&format!(
        "\nScore: Team A {} - {} Team B",
        summary.team_scores.team_a, summary.team_scores.team_b
    ));
    text
}

/// Finish an active duel, report and persist its result, then purge it.
///
/// Returns `false` when the duel is unknown or was already finished.
pub async fn finish_duel(state: &SharedState, duel_id: &str) -> bool {
    let registry = state.registry();
    let Ok(Some(outcome)) = registry
        .with_duel_lock(duel_id, |duel| duel.finish())
        .await
    else {
        return false;
    };
    registry.cancel_round_timer(duel_id);
    gateway::delete_all(state.gateway(), registry.take_question_messages(duel_id)).await;

    for user_id in outcome.participants() {
        state.stats().record_outcome(user_id, outcome.outcome_for(user_id));
    }

    let participants: Vec<UserId> = outcome.participants().collect();
    let names = state.names().display_names(&participants).await;
    let name_of = |user_id: &UserId| {
        names
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| fallback_name(*user_id))
    };
    let messages = participants
        .iter()
        .map(|user_id| (*user_id, result_text(&outcome, *user_id, &name_of)))
        .collect();
    gateway::send_each(state.gateway(), messages).await;

    persist_outcome(state, &outcome).await;

    for user_id in &participants {
        registry.release_user(*user_id, duel_id);
    }
    registry.remove_duel(duel_id);
    info!(
        duel_id,
        winner = ?outcome.winner,
        team_a = outcome.team_scores.team_a,
        team_b = outcome.team_scores.team_b,
        "duel finished"
    );
    true
}

async fn persist_outcome(state: &SharedState, outcome: &DuelOutcome) {
    let Some(store) = state.duel_store().await else {
        warn!(duel_id = %outcome.duel_id, "degraded mode: duel result not persisted");
        return;
    };

    let finished_at = SystemTime::now();
    if let Err(err) = store
        .record_duel_result(DuelResultEntity::from_outcome(outcome, finished_at))
        .await
    {
        warn!(duel_id = %outcome.duel_id, error = %err, "failed to persist duel result");
    }
    for user_id in outcome.participants() {
        if let Err(err) = store
            .record_player_outcome(user_id, outcome.outcome_for(user_id), finished_at)
            .await
        {
            warn!(duel_id = %outcome.duel_id, user_id, error = %err, "failed to persist player record");
        }
    }
}

/// Personalised end-of-duel message for `user_id`.
pub fn result_text(
    outcome: &DuelOutcome,
    user_id: UserId,
    name_of: &impl Fn(&UserId) -> String,
) -> String {
    let headline = match outcome.outcome_for(user_id) {
        PlayerOutcome::Won => "Victory! Your team won the duel!",
        PlayerOutcome::Lost => "Defeat! Your team lost the duel.",
        PlayerOutcome::Drew => "Draw! Both teams scored the same.",
    };
    let team = outcome
        .team_of(user_id)
        .map(Team::label)
        .unwrap_or("no team");
    let personal = outcome.player_scores.get(&user_id).copied().unwrap_or(0);

    let roster = |members: &[UserId]| {
        members
            .iter()
            .map(|member| {
                let score = outcome.player_scores.get(member).copied().unwrap_or(0);
                format!("  {} ({score})", name_of(member))
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "{headline}\n\nFinal score: Team A {} - {} Team B\nYou played for {team} and scored {personal}.\n\nTeam A:\n{}\n\nTeam B:\n{}",
        outcome.team_scores.team_a,
        outcome.team_scores.team_b,
        roster(&outcome.team_a),
        roster(&outcome.team_b),
    )
}

#[cfg(test)]
mod tests {
    use indexmap::IndexMap;

    use super::*;
    use crate::state::duel::{DuelFormat, DuelWinner, TeamScores};

    fn outcome() -> DuelOutcome {
        DuelOutcome {
            duel_id: "duel_x".into(),
            format: DuelFormat::TwoVsTwo,
            category: "random".into(),
            winner: DuelWinner::TeamA,
            team_scores: TeamScores {
                team_a: 3,
                team_b: 1,
            },
            team_a: vec![1, 3],
            team_b: vec![2, 4],
            player_scores: IndexMap::from([(1, 2), (2, 1), (3, 1), (4, 0)]),
        }
    }

    fn question() -> Question {
        Question {
            text: "Capital of France?".into(),
            options: vec!["Berlin".into(), "Paris".into()],
            correct_option: 1,
        }
    }

    #[test]
    fn results_are_personalised() {
        let outcome = outcome();
        let name_of = |user: &UserId| format!("P{user}");

        let winner = result_text(&outcome, 1, &name_of);
        assert!(winner.starts_with("Victory!"));
        assert!(winner.contains("You played for Team A and scored 2."));
        assert!(winner.contains("  P3 (1)"));

        let loser = result_text(&outcome, 4, &name_of);
        assert!(loser.starts_with("Defeat!"));
        assert!(loser.contains("Final score: Team A 3 - 1 Team B"));
    }

    #[test]
    fn round_report_counts_missing_answers() {
        let summary = RoundSummary {
            round: 2,
            question: question(),
            correct_players: vec![1],
            incorrect_players: vec![2],
            total_players: 4,
            team_scores: TeamScores {
                team_a: 2,
                team_b: 0,
            },
            questions_asked: 2,
            max_questions: 10,
        };
        let report = round_report(&summary);
        assert!(report.contains("Round 2/10 finished!"));
        assert!(report.contains("Correct answer: Paris"));
        assert!(report.contains("No answer: 2"));
        assert!(report.contains("Score: Team A 2 - 0 Team B"));
    }

    #[test]
    fn answer_buttons_carry_the_option_index() {
        let options = answer_buttons("duel_x", &question());
        let actions: Vec<_> = options
            .buttons
            .iter()
            .flatten()
            .map(|button| button.action.as_str())
            .collect();
        assert_eq!(actions, ["answer:duel_x:0", "answer:duel_x:1"]);
    }
}
