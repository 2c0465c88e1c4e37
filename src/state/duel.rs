use std::{
    collections::HashSet,
    fmt,
    str::FromStr,
    time::{Duration, SystemTime},
};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use utoipa::ToSchema;

use crate::{
    error::DuelError,
    state::state_machine::{DuelEvent, DuelStateMachine, DuelStatus, InvalidTransition},
};

/// Identifier of a chat user as known by the messaging gateway.
pub type UserId = i64;
/// Opaque duel identifier, safe to hand to end users for manual joins.
pub type DuelId = String;

/// Team-size descriptor fixing the maximum number of participants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum DuelFormat {
    /// One player per team.
    #[serde(rename = "1v1")]
    OneVsOne,
    /// Two players per team.
    #[serde(rename = "2v2")]
    TwoVsTwo,
    /// Three players per team.
    #[serde(rename = "3v3")]
    ThreeVsThree,
    /// Four players per team.
    #[serde(rename = "4v4")]
    FourVsFour,
}

impl DuelFormat {
    /// Every supported format, smallest first.
    pub const ALL: [DuelFormat; 4] = [
        DuelFormat::OneVsOne,
        DuelFormat::TwoVsTwo,
        DuelFormat::ThreeVsThree,
        DuelFormat::FourVsFour,
    ];

    /// Number of players on each team.
    pub fn team_size(self) -> usize {
        match self {
            DuelFormat::OneVsOne => 1,
            DuelFormat::TwoVsTwo => 2,
            DuelFormat::ThreeVsThree => 3,
            DuelFormat::FourVsFour => 4,
        }
    }

    /// Maximum number of participants across both teams.
    pub fn max_players(self) -> usize {
        self.team_size() * 2
    }

    /// Canonical wire representation (`"2v2"`).
    pub fn as_str(self) -> &'static str {
        match self {
            DuelFormat::OneVsOne => "1v1",
            DuelFormat::TwoVsTwo => "2v2",
            DuelFormat::ThreeVsThree => "3v3",
            DuelFormat::FourVsFour => "4v4",
        }
    }
}

impl fmt::Display for DuelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DuelFormat {
    type Err = DuelError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        DuelFormat::ALL
            .into_iter()
            .find(|format| format.as_str() == normalized)
            .ok_or_else(|| DuelError::InvalidFormat(value.to_string()))
    }
}

/// One of the two sides of a duel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Team {
    /// First side; the creator always starts here.
    TeamA,
    /// Second side.
    TeamB,
}

impl Team {
    /// Human readable label.
    pub fn label(self) -> &'static str {
        match self {
            Team::TeamA => "Team A",
            Team::TeamB => "Team B",
        }
    }
}

/// Multiple choice question served during a round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    /// Question prompt.
    pub text: String,
    /// Ordered answer options.
    pub options: Vec<String>,
    /// Index of the correct entry in `options`.
    pub correct_option: usize,
}

impl Question {
    /// Text of the correct option.
    pub fn correct_answer(&self) -> &str {
        self.options
            .get(self.correct_option)
            .map(String::as_str)
            .unwrap_or_default()
    }
}

/// Answer recorded for a player during the open round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerAnswer {
    /// Option picked by the player.
    pub option_index: usize,
    /// Whether the option matches the correct one.
    pub correct: bool,
    /// Time elapsed between the question broadcast and the answer.
    pub response_time: Duration,
}

/// Running score of both teams.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct TeamScores {
    /// Points of team A.
    pub team_a: u32,
    /// Points of team B.
    pub team_b: u32,
}

impl TeamScores {
    /// Points of the given team.
    pub fn get(&self, team: Team) -> u32 {
        match team {
            Team::TeamA => self.team_a,
            Team::TeamB => self.team_b,
        }
    }

    fn increment(&mut self, team: Team) {
        match team {
            Team::TeamA => self.team_a += 1,
            Team::TeamB => self.team_b += 1,
        }
    }

    /// Winner by strictly higher score, `None` on a tie.
    pub fn leader(&self) -> Option<Team> {
        match self.team_a.cmp(&self.team_b) {
            std::cmp::Ordering::Greater => Some(Team::TeamA),
            std::cmp::Ordering::Less => Some(Team::TeamB),
            std::cmp::Ordering::Equal => None,
        }
    }
}

/// Final verdict of a duel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DuelWinner {
    /// Team A scored more.
    TeamA,
    /// Team B scored more.
    TeamB,
    /// Equal scores.
    Draw,
}

impl From<Option<Team>> for DuelWinner {
    fn from(value: Option<Team>) -> Self {
        match value {
            Some(Team::TeamA) => DuelWinner::TeamA,
            Some(Team::TeamB) => DuelWinner::TeamB,
            None => DuelWinner::Draw,
        }
    }
}

/// Outcome of a finished duel from one player's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PlayerOutcome {
    /// The player's team won.
    Won,
    /// The player's team lost.
    Lost,
    /// Nobody won.
    Drew,
}

/// Result of a successfully recorded answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerOutcome {
    /// Whether the answer was correct.
    pub correct: bool,
    /// Short message for the answering player.
    pub message: String,
    /// Round the answer belongs to.
    pub round: u32,
    /// True when this answer completed the round for every current player.
    pub all_answered: bool,
}

/// Aggregated outcome of a closed round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundSummary {
    /// Round that was closed.
    pub round: u32,
    /// Question that was asked.
    pub question: Question,
    /// Players who answered correctly.
    pub correct_players: Vec<UserId>,
    /// Players who answered incorrectly.
    pub incorrect_players: Vec<UserId>,
    /// Players in the duel when the round closed.
    pub total_players: usize,
    /// Running scores after this round.
    pub team_scores: TeamScores,
    /// Rounds asked so far.
    pub questions_asked: u32,
    /// Round cap.
    pub max_questions: u32,
}

/// Final results of a duel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuelOutcome {
    /// Finished duel.
    pub duel_id: DuelId,
    /// Format of the duel.
    pub format: DuelFormat,
    /// Question category.
    pub category: String,
    /// Verdict.
    pub winner: DuelWinner,
    /// Final team scores.
    pub team_scores: TeamScores,
    /// Final roster of team A.
    pub team_a: Vec<UserId>,
    /// Final roster of team B.
    pub team_b: Vec<UserId>,
    /// Per-player points in join order.
    pub player_scores: IndexMap<UserId, u32>,
}

impl DuelOutcome {
    /// Team the player finished on.
    pub fn team_of(&self, user_id: UserId) -> Option<Team> {
        if self.team_a.contains(&user_id) {
            Some(Team::TeamA)
        } else if self.team_b.contains(&user_id) {
            Some(Team::TeamB)
        } else {
            None
        }
    }

    /// Outcome for the given participant.
    pub fn outcome_for(&self, user_id: UserId) -> PlayerOutcome {
        match (self.winner, self.team_of(user_id)) {
            (DuelWinner::Draw, _) => PlayerOutcome::Drew,
            (DuelWinner::TeamA, Some(Team::TeamA)) | (DuelWinner::TeamB, Some(Team::TeamB)) => {
                PlayerOutcome::Won
            }
            _ => PlayerOutcome::Lost,
        }
    }

    /// Every participant, team A first.
    pub fn participants(&self) -> impl Iterator<Item = UserId> + '_ {
        self.team_a.iter().chain(self.team_b.iter()).copied()
    }
}

/// Read-only copy of a duel used for listings, lobbies and status queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuelSnapshot {
    /// Duel identifier.
    pub id: DuelId,
    /// Format of the duel.
    pub format: DuelFormat,
    /// Coarse status.
    pub status: DuelStatus,
    /// Round currently accepting answers.
    pub open_round: Option<u32>,
    /// Current creator.
    pub creator_id: UserId,
    /// Question category.
    pub category: String,
    /// Players in join order.
    pub players: Vec<UserId>,
    /// Roster of team A.
    pub team_a: Vec<UserId>,
    /// Roster of team B.
    pub team_b: Vec<UserId>,
    /// Running team scores.
    pub team_scores: TeamScores,
    /// Per-player points.
    pub player_scores: IndexMap<UserId, u32>,
    /// Players who answered the open round.
    pub answered: usize,
    /// Rounds asked so far.
    pub questions_asked: u32,
    /// Round cap.
    pub max_questions: u32,
    /// Creation time (monotonic).
    pub created_at: Instant,
    /// Creation time (wall clock).
    pub created_at_wall: SystemTime,
}

impl DuelSnapshot {
    /// Maximum number of participants.
    pub fn max_players(&self) -> usize {
        self.format.max_players()
    }

    /// True when no seat is left.
    pub fn is_full(&self) -> bool {
        self.players.len() >= self.max_players()
    }

    /// Team the player sits on.
    pub fn team_of(&self, user_id: UserId) -> Option<Team> {
        if self.team_a.contains(&user_id) {
            Some(Team::TeamA)
        } else if self.team_b.contains(&user_id) {
            Some(Team::TeamB)
        } else {
            None
        }
    }
}

/// Aggregate root of one duel session.
///
/// The struct lives behind the per-duel lock owned by the registry; every
/// method assumes the caller holds that lock.
#[derive(Debug)]
pub struct Duel {
    id: DuelId,
    format: DuelFormat,
    creator_id: UserId,
    category: String,
    machine: DuelStateMachine,
    players: Vec<UserId>,
    team_a: Vec<UserId>,
    team_b: Vec<UserId>,
    team_scores: TeamScores,
    player_scores: IndexMap<UserId, u32>,
    current_question: Option<Question>,
    answered_players: HashSet<UserId>,
    player_answers: IndexMap<UserId, PlayerAnswer>,
    questions_asked: u32,
    max_questions: u32,
    created_at: Instant,
    created_at_wall: SystemTime,
    question_start_time: Option<Instant>,
}

impl Duel {
    /// Build a waiting duel with the creator seated on team A.
    pub fn new(
        id: DuelId,
        format: DuelFormat,
        creator_id: UserId,
        category: String,
        max_questions: u32,
    ) -> Self {
        let mut player_scores = IndexMap::new();
        player_scores.insert(creator_id, 0);

        Self {
            id,
            format,
            creator_id,
            category,
            machine: DuelStateMachine::new(),
            players: vec![creator_id],
            team_a: vec![creator_id],
            team_b: Vec::new(),
            team_scores: TeamScores::default(),
            player_scores,
            current_question: None,
            answered_players: HashSet::new(),
            player_answers: IndexMap::new(),
            questions_asked: 0,
            max_questions,
            created_at: Instant::now(),
            created_at_wall: SystemTime::now(),
            question_start_time: None,
        }
    }

    /// Duel identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Format of the duel.
    pub fn format(&self) -> DuelFormat {
        self.format
    }

    /// Current creator (the only player allowed to start).
    pub fn creator_id(&self) -> UserId {
        self.creator_id
    }

    /// Question category.
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Coarse status.
    pub fn status(&self) -> DuelStatus {
        self.machine.status()
    }

    /// Players in join order.
    pub fn players(&self) -> &[UserId] {
        &self.players
    }

    /// Running team scores.
    pub fn team_scores(&self) -> TeamScores {
        self.team_scores
    }

    /// Question of the open round.
    pub fn current_question(&self) -> Option<&Question> {
        self.current_question.as_ref()
    }

    /// Round currently accepting answers.
    pub fn open_round(&self) -> Option<u32> {
        self.machine.open_round()
    }

    /// Creation time used for staleness checks.
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// True when every seat is taken.
    pub fn is_full(&self) -> bool {
        self.players.len() >= self.format.max_players()
    }

    /// True when nobody is left.
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// True when the round cap has not been reached.
    pub fn has_questions_left(&self) -> bool {
        self.questions_asked < self.max_questions
    }

    /// Team the player sits on.
    pub fn team_of(&self, user_id: UserId) -> Option<Team> {
        if self.team_a.contains(&user_id) {
            Some(Team::TeamA)
        } else if self.team_b.contains(&user_id) {
            Some(Team::TeamB)
        } else {
            None
        }
    }

    /// Read-only copy of the duel.
    pub fn snapshot(&self) -> DuelSnapshot {
        DuelSnapshot {
            id: self.id.clone(),
            format: self.format,
            status: self.status(),
            open_round: self.open_round(),
            creator_id: self.creator_id,
            category: self.category.clone(),
            players: self.players.clone(),
            team_a: self.team_a.clone(),
            team_b: self.team_b.clone(),
            team_scores: self.team_scores,
            player_scores: self.player_scores.clone(),
            answered: self.answered_players.len(),
            questions_asked: self.questions_asked,
            max_questions: self.max_questions,
            created_at: self.created_at,
            created_at_wall: self.created_at_wall,
        }
    }

    /// Seat a new player on the smaller team (ties favour team A).
    pub fn add_player(&mut self, user_id: UserId) -> Result<Team, DuelError> {
        if self.players.contains(&user_id) {
            return Err(DuelError::AlreadyJoined(self.id.clone()));
        }
        if self.status() != DuelStatus::Waiting {
            return Err(DuelError::DuelAlreadyStarted(self.id.clone()));
        }
        if self.is_full() {
            return Err(DuelError::DuelFull(self.id.clone()));
        }

        let team = if self.team_a.len() <= self.team_b.len() {
            self.team_a.push(user_id);
            Team::TeamA
        } else {
            self.team_b.push(user_id);
            Team::TeamB
        };
        self.players.push(user_id);
        self.player_scores.insert(user_id, 0);
        Ok(team)
    }

    /// Remove a player from roster, team and scores.
    ///
    /// When the creator leaves a non-empty duel the earliest remaining player
    /// inherits the role. Returns the team the player was on.
    pub fn remove_player(&mut self, user_id: UserId) -> Option<Team> {
        let team = self.team_of(user_id)?;
        self.players.retain(|player| *player != user_id);
        self.team_a.retain(|player| *player != user_id);
        self.team_b.retain(|player| *player != user_id);
        self.player_scores.shift_remove(&user_id);

        if self.creator_id == user_id {
            if let Some(next) = self.players.first() {
                self.creator_id = *next;
            }
        }
        Some(team)
    }

    /// Leave the lobby for the round loop.
    pub fn start(&mut self, user_id: UserId) -> Result<(), DuelError> {
        if self.status() != DuelStatus::Waiting {
            return Err(DuelError::DuelAlreadyStarted(self.id.clone()));
        }
        if self.creator_id != user_id {
            return Err(DuelError::NotCreator);
        }
        if self.players.len() < 2 {
            return Err(DuelError::NotEnoughPlayers {
                required: 2,
                actual: self.players.len(),
            });
        }

        self.machine
            .apply(DuelEvent::Start)
            .map_err(|_| DuelError::DuelAlreadyStarted(self.id.clone()))?;
        Ok(())
    }

    /// Open the next round with `question`, returning its number.
    pub fn begin_round(&mut self, question: Question, now: Instant) -> Result<u32, InvalidTransition> {
        let round = self.questions_asked + 1;
        self.machine.apply(DuelEvent::OpenRound { round })?;

        self.current_question = Some(question);
        self.answered_players.clear();
        self.player_answers.clear();
        self.questions_asked = round;
        self.question_start_time = Some(now);
        Ok(round)
    }

    /// Record a player's answer for the open round.
    pub fn record_answer(
        &mut self,
        user_id: UserId,
        option_index: usize,
        now: Instant,
    ) -> Result<AnswerOutcome, DuelError> {
        let (Some(round), Some(question)) = (self.machine.open_round(), &self.current_question)
        else {
            return Err(DuelError::NoActiveQuestion);
        };
        let Some(team) = self.team_of(user_id) else {
            return Err(DuelError::NotInDuel(self.id.clone()));
        };
        if self.answered_players.contains(&user_id) {
            return Err(DuelError::AlreadyAnswered);
        }
        if option_index >= question.options.len() {
            return Err(DuelError::InvalidOption {
                index: option_index,
                available: question.options.len(),
            });
        }

        let correct = option_index == question.correct_option;
        let message = if correct {
            "Correct! +1 point for your team".to_string()
        } else {
            format!("Wrong! The correct answer was: {}", question.correct_answer())
        };
        let response_time = self
            .question_start_time
            .map(|started| now.saturating_duration_since(started))
            .unwrap_or_default();

        self.answered_players.insert(user_id);
        self.player_answers.insert(
            user_id,
            PlayerAnswer {
                option_index,
                correct,
                response_time,
            },
        );

        if correct {
            self.team_scores.increment(team);
            *self.player_scores.entry(user_id).or_insert(0) += 1;
        }

        Ok(AnswerOutcome {
            correct,
            message,
            round,
            all_answered: self.all_answered(),
        })
    }

    /// True when every current player answered the open round.
    pub fn all_answered(&self) -> bool {
        !self.players.is_empty()
            && self
                .players
                .iter()
                .all(|player| self.answered_players.contains(player))
    }

    /// Close `round` if it is still open.
    ///
    /// Returns `None` when the round was already closed (or never opened), so
    /// exactly one caller observes the summary of a given round.
    pub fn close_round(&mut self, round: u32) -> Option<RoundSummary> {
        self.machine.apply(DuelEvent::CloseRound { round }).ok()?;

        let question = self.current_question.take()?;
        let (correct, incorrect): (Vec<_>, Vec<_>) = self
            .player_answers
            .iter()
            .partition(|(_, answer)| answer.correct);

        let summary = RoundSummary {
            round,
            question,
            correct_players: correct.into_iter().map(|(user, _)| *user).collect(),
            incorrect_players: incorrect.into_iter().map(|(user, _)| *user).collect(),
            total_players: self.players.len(),
            team_scores: self.team_scores,
            questions_asked: self.questions_asked,
            max_questions: self.max_questions,
        };

        self.answered_players.clear();
        self.player_answers.clear();
        self.question_start_time = None;
        Some(summary)
    }

    /// Compute final results; `None` when the duel is not active.
    pub fn finish(&mut self) -> Option<DuelOutcome> {
        self.machine.apply(DuelEvent::Finish).ok()?;

        self.current_question = None;
        self.answered_players.clear();
        self.player_answers.clear();
        self.question_start_time = None;

        Some(DuelOutcome {
            duel_id: self.id.clone(),
            format: self.format,
            category: self.category.clone(),
            winner: self.team_scores.leader().into(),
            team_scores: self.team_scores,
            team_a: self.team_a.clone(),
            team_b: self.team_b.clone(),
            player_scores: self.player_scores.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question() -> Question {
        Question {
            text: "Capital of France?".into(),
            options: vec!["Berlin".into(), "Paris".into(), "Rome".into()],
            correct_option: 1,
        }
    }

    fn duel(format: DuelFormat) -> Duel {
        Duel::new("duel_test".into(), format, 1, "random".into(), 10)
    }

    fn active_duel() -> Duel {
        let mut duel = duel(DuelFormat::OneVsOne);
        duel.add_player(2).unwrap();
        duel.start(1).unwrap();
        duel
    }

    #[test]
    fn max_players_is_twice_the_team_size() {
        for (format, expected) in DuelFormat::ALL.into_iter().zip([2, 4, 6, 8]) {
            assert_eq!(format.max_players(), expected);
        }
    }

    #[test]
    fn formats_parse_from_wire_names() {
        assert_eq!("2v2".parse::<DuelFormat>().unwrap(), DuelFormat::TwoVsTwo);
        assert_eq!(" 4V4 ".parse::<DuelFormat>().unwrap(), DuelFormat::FourVsFour);
        assert_eq!(
            "5v5".parse::<DuelFormat>().unwrap_err(),
            DuelError::InvalidFormat("5v5".into())
        );
    }

    #[test]
    fn creator_starts_alone_on_team_a() {
        let duel = duel(DuelFormat::TwoVsTwo);
        let snapshot = duel.snapshot();
        assert_eq!(snapshot.players, vec![1]);
        assert_eq!(snapshot.team_a, vec![1]);
        assert!(snapshot.team_b.is_empty());
        assert_eq!(snapshot.player_scores.get(&1), Some(&0));
        assert_eq!(snapshot.status, DuelStatus::Waiting);
    }

    #[test]
    fn joins_balance_teams_and_keep_rosters_disjoint() {
        for format in DuelFormat::ALL {
            let mut duel = duel(format);
            for user in 2..=(format.max_players() as UserId) {
                duel.add_player(user).unwrap();
                let snapshot = duel.snapshot();
                assert!(snapshot.team_a.len().abs_diff(snapshot.team_b.len()) <= 1);
                assert!(snapshot.team_a.iter().all(|p| !snapshot.team_b.contains(p)));
                let mut union: Vec<_> =
                    snapshot.team_a.iter().chain(&snapshot.team_b).copied().collect();
                union.sort();
                let mut players = snapshot.players.clone();
                players.sort();
                assert_eq!(union, players);
            }
            assert_eq!(
                duel.add_player(99).unwrap_err(),
                DuelError::DuelFull("duel_test".into())
            );
        }
    }

    #[test]
    fn ties_favour_team_a_after_a_leave() {
        let mut duel = duel(DuelFormat::TwoVsTwo);
        assert_eq!(duel.add_player(2).unwrap(), Team::TeamB);
        assert_eq!(duel.add_player(3).unwrap(), Team::TeamA);
        duel.remove_player(3);
        assert_eq!(duel.add_player(4).unwrap(), Team::TeamA);
    }

    #[test]
    fn joining_twice_is_rejected() {
        let mut duel = duel(DuelFormat::TwoVsTwo);
        assert_eq!(
            duel.add_player(1).unwrap_err(),
            DuelError::AlreadyJoined("duel_test".into())
        );
    }

    #[test]
    fn creator_role_moves_to_next_player() {
        let mut duel = duel(DuelFormat::TwoVsTwo);
        duel.add_player(2).unwrap();
        duel.add_player(3).unwrap();
        assert_eq!(duel.remove_player(1), Some(Team::TeamA));
        assert_eq!(duel.creator_id(), 2);
        assert_eq!(duel.remove_player(1), None);
    }

    #[test]
    fn start_requires_creator_and_two_players() {
        let mut duel = duel(DuelFormat::OneVsOne);
        assert_eq!(
            duel.start(1).unwrap_err(),
            DuelError::NotEnoughPlayers {
                required: 2,
                actual: 1
            }
        );
        duel.add_player(2).unwrap();
        assert_eq!(duel.start(2).unwrap_err(), DuelError::NotCreator);
        duel.start(1).unwrap();
        assert_eq!(duel.status(), DuelStatus::Active);
        assert_eq!(
            duel.start(1).unwrap_err(),
            DuelError::DuelAlreadyStarted("duel_test".into())
        );
        assert_eq!(
            duel.add_player(3).unwrap_err(),
            DuelError::DuelAlreadyStarted("duel_test".into())
        );
    }

    #[test]
    fn answers_are_scored_once_per_round() {
        let mut duel = active_duel();
        let start = Instant::now();
        let round = duel.begin_round(question(), start).unwrap();
        assert_eq!(round, 1);

        let first = duel
            .record_answer(1, 1, start + Duration::from_secs(2))
            .unwrap();
        assert!(first.correct);
        assert!(!first.all_answered);
        assert_eq!(
            duel.record_answer(1, 1, start).unwrap_err(),
            DuelError::AlreadyAnswered
        );
        assert_eq!(duel.team_scores().team_a, 1);

        assert_eq!(
            duel.record_answer(2, 7, start).unwrap_err(),
            DuelError::InvalidOption {
                index: 7,
                available: 3
            }
        );
        let second = duel.record_answer(2, 0, start).unwrap();
        assert!(!second.correct);
        assert!(second.message.contains("Paris"));
        assert!(second.all_answered);

        assert_eq!(
            duel.team_scores(),
            TeamScores {
                team_a: 1,
                team_b: 0
            }
        );
        assert_eq!(duel.snapshot().player_scores.get(&1), Some(&1));
    }

    #[test]
    fn response_time_is_measured_from_question_start() {
        let mut duel = active_duel();
        let start = Instant::now();
        duel.begin_round(question(), start).unwrap();
        duel.record_answer(1, 1, start + Duration::from_millis(1_500))
            .unwrap();
        assert_eq!(
            duel.player_answers.get(&1).map(|answer| answer.response_time),
            Some(Duration::from_millis(1_500))
        );
    }

    #[test]
    fn answers_without_an_open_round_are_rejected() {
        let mut duel = active_duel();
        assert_eq!(
            duel.record_answer(1, 0, Instant::now()).unwrap_err(),
            DuelError::NoActiveQuestion
        );
    }

    #[test]
    fn outsiders_cannot_answer() {
        let mut duel = active_duel();
        duel.begin_round(question(), Instant::now()).unwrap();
        assert_eq!(
            duel.record_answer(42, 1, Instant::now()).unwrap_err(),
            DuelError::NotInDuel("duel_test".into())
        );
    }

    #[test]
    fn a_round_closes_exactly_once() {
        let mut duel = active_duel();
        let now = Instant::now();
        let round = duel.begin_round(question(), now).unwrap();
        duel.record_answer(1, 1, now).unwrap();
        duel.record_answer(2, 2, now).unwrap();

        let summary = duel.close_round(round).unwrap();
        assert_eq!(summary.correct_players, vec![1]);
        assert_eq!(summary.incorrect_players, vec![2]);
        assert_eq!(summary.team_scores.team_a, 1);
        assert!(duel.close_round(round).is_none());
        assert_eq!(duel.team_scores().team_a + duel.team_scores().team_b, 1);
        assert!(duel.current_question().is_none());
        assert_eq!(
            duel.record_answer(1, 1, now).unwrap_err(),
            DuelError::NoActiveQuestion
        );
    }

    #[test]
    fn finish_declares_the_leader_and_is_idempotent() {
        let mut duel = active_duel();
        let now = Instant::now();
        let round = duel.begin_round(question(), now).unwrap();
        duel.record_answer(2, 1, now).unwrap();
        duel.close_round(round);

        let outcome = duel.finish().unwrap();
        assert_eq!(outcome.winner, DuelWinner::TeamB);
        assert_eq!(outcome.outcome_for(2), PlayerOutcome::Won);
        assert_eq!(outcome.outcome_for(1), PlayerOutcome::Lost);
        assert!(duel.finish().is_none());
        assert_eq!(duel.status(), DuelStatus::Finished);
    }

    #[test]
    fn equal_scores_are_a_draw() {
        let mut duel = active_duel();
        let outcome = duel.finish().unwrap();
        assert_eq!(outcome.winner, DuelWinner::Draw);
        assert_eq!(outcome.outcome_for(1), PlayerOutcome::Drew);
        assert_eq!(outcome.outcome_for(2), PlayerOutcome::Drew);
    }

    #[test]
    fn waiting_duels_cannot_finish() {
        let mut duel = duel(DuelFormat::OneVsOne);
        assert!(duel.finish().is_none());
    }
}
