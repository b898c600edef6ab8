//! The error taxonomy of remote operations on the arena. These travel over the wire as part of
//! the reply, so agents learn why an action was refused.

use crate::geometry::Point;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why the arena refused an operation. None of these are fatal for the arena.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ArenaError {
    /// The reference was never handed out or is not visible (pending potion).
    #[error("unknown reference {0}")]
    UnknownReference(u32),
    /// The reference belonged to an entity that died, disconnected or was consumed.
    #[error("stale reference {0}")]
    StaleReference(u32),
    /// The request broke the rules of the protocol or the game.
    #[error("protocol violation: {0}")]
    ProtocolViolation(Violation),
    /// Wrong administrative secret. Carries no further detail on purpose.
    #[error("administrative request rejected")]
    Unauthorized,
}

impl ArenaError {
    /// Stale references are expected in normal play and only worth a debug line.
    pub fn is_benign(&self) -> bool {
        matches!(self, ArenaError::StaleReference(_))
    }
}

impl From<Violation> for ArenaError {
    fn from(value: Violation) -> Self {
        ArenaError::ProtocolViolation(value)
    }
}

/// The individual protocol violations.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum Violation {
    #[error("reference {0} was never allocated")]
    UnallocatedReference(u32),
    #[error("reference {0} is already registered")]
    DuplicateRegistration(u32),
    #[error("turn budget must be positive")]
    InvalidTurnBudget,
    #[error("the arena is full")]
    ArenaFull,
    #[error("position {0} lies outside the arena")]
    OutOfBounds(Point),
    #[error("callback address {0} is already in use")]
    CallbackAddressInUse(String),
    #[error("callback endpoint {0} could not be reached")]
    CallbackUnreachable(String),
    #[error("only characters may register")]
    NotACharacter,
    #[error("only potions may be injected")]
    NotAPotion,
    #[error("target {0} is not a character")]
    TargetNotACharacter(u32),
    #[error("target {0} is not a potion")]
    TargetNotAPotion(u32),
    #[error("an entity cannot target itself")]
    SelfTarget,
    #[error("target is {distance} cells away, limit is {limit}")]
    OutOfReach { distance: i32, limit: i32 },
    #[error("this session acts for reference {bound:?}, not {requested}")]
    ForeignReference { bound: Option<u32>, requested: u32 },
    #[error("this session already registered reference {0}")]
    SessionAlreadyBound(u32),
    #[error("no reference ids left")]
    ReferencesExhausted,
}
