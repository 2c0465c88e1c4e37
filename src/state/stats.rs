use dashmap::DashMap;

use crate::state::duel::{PlayerOutcome, UserId};

/// Per-user duel counters kept in memory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DuelStatistics {
    /// Duels the user created.
    pub duels_created: u32,
    /// Duels the user joined (creation excluded).
    pub duels_joined: u32,
    /// Duels the user played to the end.
    pub duels_completed: u32,
    /// Completed duels won.
    pub duels_won: u32,
    /// Completed duels lost.
    pub duels_lost: u32,
    /// Completed duels drawn.
    pub duels_drawn: u32,
    /// Answers submitted.
    pub questions_answered: u32,
    /// Correct answers submitted.
    pub correct_answers: u32,
}

impl DuelStatistics {
    /// Share of correct answers, in percent.
    pub fn accuracy(&self) -> f64 {
        percentage(self.correct_answers, self.questions_answered)
    }

    /// Share of completed duels won, in percent.
    pub fn win_rate(&self) -> f64 {
        percentage(self.duels_won, self.duels_completed)
    }
}

fn percentage(part: u32, total: u32) -> f64 {
    if total == 0 {
        0.0
    } else {
        f64::from(part) * 100.0 / f64::from(total)
    }
}

/// Concurrent map of [`DuelStatistics`] keyed by user.
#[derive(Default)]
pub struct StatisticsTracker {
    users: DashMap<UserId, DuelStatistics>,
}

impl StatisticsTracker {
    /// Empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a created duel.
    pub fn record_created(&self, user_id: UserId) {
        self.users.entry(user_id).or_default().duels_created += 1;
    }

    /// Count a joined duel.
    pub fn record_joined(&self, user_id: UserId) {
        self.users.entry(user_id).or_default().duels_joined += 1;
    }

    /// Count a submitted answer.
    pub fn record_answer(&self, user_id: UserId, correct: bool) {
        let mut stats = self.users.entry(user_id).or_default();
        stats.questions_answered += 1;
        if correct {
            stats.correct_answers += 1;
        }
    }

    /// Count a completed duel with its outcome.
    pub fn record_outcome(&self, user_id: UserId, outcome: PlayerOutcome) {
        let mut stats = self.users.entry(user_id).or_default();
        stats.duels_completed += 1;
        match outcome {
            PlayerOutcome::Won => stats.duels_won += 1,
            PlayerOutcome::Lost => stats.duels_lost += 1,
            PlayerOutcome::Drew => stats.duels_drawn += 1,
        }
    }

    /// Counters of the user; zeroes for unknown users.
    pub fn get(&self, user_id: UserId) -> DuelStatistics {
        self.users
            .get(&user_id)
            .map(|entry| *entry.value())
            .unwrap_or_default()
    }

    /// Forget the user's counters.
    pub fn reset(&self, user_id: UserId) {
        self.users.remove(&user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_users_have_zeroed_stats() {
        let tracker = StatisticsTracker::new();
        let stats = tracker.get(42);
        assert_eq!(stats, DuelStatistics::default());
        assert_eq!(stats.accuracy(), 0.0);
        assert_eq!(stats.win_rate(), 0.0);
    }

    #[test]
    fn derived_rates_follow_counters() {
        let tracker = StatisticsTracker::new();
        tracker.record_answer(1, true);
        tracker.record_answer(1, false);
        tracker.record_answer(1, true);
        tracker.record_answer(1, true);
        tracker.record_outcome(1, PlayerOutcome::Won);
        tracker.record_outcome(1, PlayerOutcome::Drew);

        let stats = tracker.get(1);
        assert_eq!(stats.questions_answered, 4);
        assert_eq!(stats.correct_answers, 3);
        assert_eq!(stats.accuracy(), 75.0);
        assert_eq!(stats.duels_completed, 2);
        assert_eq!(stats.win_rate(), 50.0);
    }

    #[test]
    fn reset_only_touches_the_given_user() {
        let tracker = StatisticsTracker::new();
        tracker.record_created(1);
        tracker.record_joined(2);
        tracker.reset(1);
        assert_eq!(tracker.get(1).duels_created, 0);
        assert_eq!(tracker.get(2).duels_joined, 1);
    }
}
