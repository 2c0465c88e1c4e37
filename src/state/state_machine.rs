use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// High-level phases a duel can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuelPhase {
    /// Lobby is open; players can join and leave.
    Waiting,
    /// The round loop is running.
    Active(RoundPhase),
    /// Results were computed; terminal.
    Finished,
}

/// Fine-grained phase while a duel is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    /// The duel started but the first question is not out yet.
    Starting,
    /// A question is on screen and answers are accepted.
    Open {
        /// 1-based round number.
        round: u32,
    },
    /// The round was closed and its results are being reported.
    Closed {
        /// 1-based round number.
        round: u32,
    },
}

/// Coarse status exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DuelStatus {
    /// Lobby phase.
    Waiting,
    /// Rounds are being played.
    Active,
    /// Results are final.
    Finished,
}

/// Events that can be applied to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuelEvent {
    /// Creator starts the duel from the lobby.
    Start,
    /// A new question is broadcast.
    OpenRound {
        /// Round being opened; must follow the previous one.
        round: u32,
    },
    /// The answer window of a round ends (timer or everybody answered).
    CloseRound {
        /// Round being closed; must be the open one.
        round: u32,
    },
    /// Final results are computed.
    Finish,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the state machine was in when the invalid event was received.
    pub from: DuelPhase,
    /// The event that cannot be applied from this phase.
    pub event: DuelEvent,
}

/// State machine driving a single duel through lobby, rounds and results.
///
/// Every mutation goes through [`DuelStateMachine::apply`], which only accepts
/// an event when it is legal from the current phase. Closing round `n` is only
/// legal from `Open { round: n }`, so of two callers racing to close the same
/// round exactly one wins.
#[derive(Debug, Clone)]
pub struct DuelStateMachine {
    phase: DuelPhase,
}

impl Default for DuelStateMachine {
    fn default() -> Self {
        Self {
            phase: DuelPhase::Waiting,
        }
    }
}

impl DuelStateMachine {
    /// Create a new state machine in the lobby phase.
    pub fn new() -> Self {
        Self::default()
    }

    /// Collapse the phase into the coarse public status.
    pub fn status(&self) -> DuelStatus {
        match self.phase {
            DuelPhase::Waiting => DuelStatus::Waiting,
            DuelPhase::Active(_) => DuelStatus::Active,
            DuelPhase::Finished => DuelStatus::Finished,
        }
    }

    /// Round currently accepting answers, if any.
    pub fn open_round(&self) -> Option<u32> {
        match self.phase {
            DuelPhase::Active(RoundPhase::Open { round }) => Some(round),
            _ => None,
        }
    }

    /// Apply an event, moving to the next phase when the transition is legal.
    pub fn apply(&mut self, event: DuelEvent) -> Result<DuelPhase, InvalidTransition> {
        let next = self.compute_transition(event)?;
        self.phase = next;
        Ok(next)
    }

    /// Compute a transition from an event if the transition is valid.
    fn compute_transition(&self, event: DuelEvent) -> Result<DuelPhase, InvalidTransition> {
        let next = match (self.phase, event) {
            (DuelPhase::Waiting, DuelEvent::Start) => DuelPhase::Active(RoundPhase::Starting),
            (DuelPhase::Active(RoundPhase::Starting), DuelEvent::OpenRound { round: 1 }) => {
                DuelPhase::Active(RoundPhase::Open { round: 1 })
            }
            (
                DuelPhase::Active(RoundPhase::Closed { round: previous }),
                DuelEvent::OpenRound { round },
            ) if round == previous + 1 => DuelPhase::Active(RoundPhase::Open { round }),
            (
                DuelPhase::Active(RoundPhase::Open { round: current }),
                DuelEvent::CloseRound { round },
            ) if round == current => DuelPhase::Active(RoundPhase::Closed { round }),
            (DuelPhase::Active(_), DuelEvent::Finish) => DuelPhase::Finished,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(sm: &mut DuelStateMachine, event: DuelEvent) -> DuelPhase {
        sm.apply(event).unwrap()
    }

    #[test]
    fn initial_state_is_waiting() {
        let sm = DuelStateMachine::new();
        assert_eq!(sm.status(), DuelStatus::Waiting);
        assert_eq!(sm.open_round(), None);
    }

    #[test]
    fn full_happy_path_through_duel() {
        let mut sm = DuelStateMachine::new();

        assert_eq!(
            apply(&mut sm, DuelEvent::Start),
            DuelPhase::Active(RoundPhase::Starting)
        );
        assert_eq!(
            apply(&mut sm, DuelEvent::OpenRound { round: 1 }),
            DuelPhase::Active(RoundPhase::Open { round: 1 })
        );
        assert_eq!(sm.open_round(), Some(1));
        assert_eq!(
            apply(&mut sm, DuelEvent::CloseRound { round: 1 }),
            DuelPhase::Active(RoundPhase::Closed { round: 1 })
        );
        assert_eq!(
            apply(&mut sm, DuelEvent::OpenRound { round: 2 }),
            DuelPhase::Active(RoundPhase::Open { round: 2 })
        );
        assert_eq!(
            apply(&mut sm, DuelEvent::CloseRound { round: 2 }),
            DuelPhase::Active(RoundPhase::Closed { round: 2 })
        );
        assert_eq!(apply(&mut sm, DuelEvent::Finish), DuelPhase::Finished);
        assert_eq!(sm.status(), DuelStatus::Finished);
    }

    #[test]
    fn closing_a_round_twice_is_rejected() {
        let mut sm = DuelStateMachine::new();
        apply(&mut sm, DuelEvent::Start);
        apply(&mut sm, DuelEvent::OpenRound { round: 1 });
        apply(&mut sm, DuelEvent::CloseRound { round: 1 });

        let err = sm.apply(DuelEvent::CloseRound { round: 1 }).unwrap_err();
        assert_eq!(err.from, DuelPhase::Active(RoundPhase::Closed { round: 1 }));
        assert_eq!(sm.status(), DuelStatus::Active);
        assert_eq!(sm.open_round(), None);
    }

    #[test]
    fn stale_round_close_is_rejected() {
        let mut sm = DuelStateMachine::new();
        apply(&mut sm, DuelEvent::Start);
        apply(&mut sm, DuelEvent::OpenRound { round: 1 });
        apply(&mut sm, DuelEvent::CloseRound { round: 1 });
        apply(&mut sm, DuelEvent::OpenRound { round: 2 });

        assert!(sm.apply(DuelEvent::CloseRound { round: 1 }).is_err());
        assert_eq!(sm.open_round(), Some(2));
    }

    #[test]
    fn rounds_cannot_be_skipped() {
        let mut sm = DuelStateMachine::new();
        apply(&mut sm, DuelEvent::Start);
        assert!(sm.apply(DuelEvent::OpenRound { round: 2 }).is_err());
        apply(&mut sm, DuelEvent::OpenRound { round: 1 });
        assert!(sm.apply(DuelEvent::OpenRound { round: 2 }).is_err());
    }

    #[test]
    fn finish_is_only_reachable_from_active() {
        let mut sm = DuelStateMachine::new();
        let err = sm.apply(DuelEvent::Finish).unwrap_err();
        assert_eq!(err.from, DuelPhase::Waiting);
        assert_eq!(err.event, DuelEvent::Finish);

        apply(&mut sm, DuelEvent::Start);
        apply(&mut sm, DuelEvent::Finish);
        assert!(sm.apply(DuelEvent::Finish).is_err());
        assert!(sm.apply(DuelEvent::Start).is_err());
    }
}
