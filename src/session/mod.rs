mod coordinator;
mod error;
mod handler;
pub mod protocol;
mod registry;

use std::fmt::{Display, Formatter};

use crate::core::{Cell, GameState};

pub use coordinator::Session;
pub use error::SessionError;
pub use handler::ConnectionHandler;
pub use registry::{Lobby, PlayerRegistry};

pub type SessionResult<T> = Result<T, SessionError>;

/// Identity of a connected player. Slot one plays X, slot two plays O.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Slot {
    One,
    Two,
}

impl Slot {
    pub const ALL: [Slot; 2] = [Slot::One, Slot::Two];

    pub fn id(self) -> u8 {
        match self {
            Slot::One => 1,
            Slot::Two => 2,
        }
    }

    pub fn opponent(self) -> Slot {
        match self {
            Slot::One => Slot::Two,
            Slot::Two => Slot::One,
        }
    }

    /// Board marker written for this slot's moves.
    pub fn mark(self) -> Cell {
        match self {
            Slot::One => Cell::Player1,
            Slot::Two => Cell::Player2,
        }
    }
}

impl Display for Slot {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// One-shot notice for the other handler that the round is over.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionSignal {
    PeerGone,
    RoundConcluded,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnOutcome {
    Continue,
    /// The round is over. Carries the final state as seen when the round ended, so a
    /// reset by the other handler cannot change what gets reported to the client.
    Stop(GameState),
}
