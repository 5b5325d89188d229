//! Undercover game rules.
//!
//! Everything in here is synchronous and free of I/O: the engine consumes a
//! room snapshot plus the caller's input and returns the next snapshot,
//! leaving persistence and fan-out to [`crate::state::AppState`].

pub mod engine;
pub mod outcome;
pub mod roles;
pub mod turn;
pub mod vote;

use crate::protocol::RoomEvent;
use crate::store::StoreError;
use crate::types::{Room, Seat};

/// Result type for game actions
pub type GameResult<T> = Result<T, GameError>;

/// Reasons an action is rejected. None of them leave a partial write behind.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("room does not exist")]
    RoomNotFound,

    #[error("user does not exist in room")]
    UserNotFound,

    #[error("game has started")]
    GameAlreadyStarted,

    #[error("game has not started")]
    GameNotStarted,

    #[error("username already exists")]
    UsernameTaken,

    #[error("not authorized")]
    NotAuthorized,

    #[error("no card available for the chosen languages")]
    NoCardAvailable,

    #[error("room was modified concurrently, please retry")]
    PersistenceConflict,

    #[error("cannot {action} while the room is {phase}")]
    WrongPhase {
        action: &'static str,
        phase: String,
    },

    #[error("user has already voted this round")]
    AlreadyVoted,

    #[error("eliminated players cannot vote")]
    PlayerEliminated,

    #[error("seat {0} is not a valid choice")]
    InvalidSeat(Seat),

    #[error("invalid role counts: {anti} anti and {blank} blank for {total} players")]
    InvalidRoleCounts {
        anti: usize,
        blank: usize,
        total: usize,
    },

    #[error("{0}")]
    InvalidInput(String),

    #[error("persistence failure: {0}")]
    Store(#[from] StoreError),
}

/// What the caller must do with the new snapshot
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Insert a room that did not exist yet
    Create(Room),
    /// Overwrite the room that was read
    Replace(Room),
    /// Remove the room that was read
    Delete(Room),
}

impl Outcome {
    pub fn room(&self) -> &Room {
        match self {
            Outcome::Create(room) | Outcome::Replace(room) | Outcome::Delete(room) => room,
        }
    }
}

/// A committed-to-be state change plus the event announcing it
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub outcome: Outcome,
    pub event: RoomEvent,
}

impl Transition {
    pub fn room(&self) -> &Room {
        self.outcome.room()
    }
}
