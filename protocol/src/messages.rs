//! The remote calls in both directions.

use crate::address::CallbackAddress;
use crate::entity::Entity;
use crate::error::ArenaError;
use crate::geometry::Point;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The neighbour snapshot handed to an agent: reference id to position, valid for one round.
pub type Neighbors = BTreeMap<u32, Point>;

/// Agent -> Arena calls. Every call is answered by exactly one [`ArenaResponse`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArenaRequest {
    /// First step of the handshake.
    AllocateReference,
    /// Last step of the handshake: the callback endpoint is up, please register us.
    Connect {
        reference: u32,
        callback: CallbackAddress,
        entity: Entity,
        /// Number of turns before the arena disconnects us, `None` for unlimited.
        turn_budget: Option<u32>,
        position: Point,
    },
    GetPosition {
        reference: u32,
    },
    GetNeighbors {
        reference: u32,
    },
    ElementFromRef {
        reference: u32,
    },
    /// `target == None` wanders in the default direction.
    Move {
        reference: u32,
        target: Option<u32>,
    },
    Attack {
        reference: u32,
        target: u32,
    },
    Slow {
        reference: u32,
        target: u32,
    },
    PickupPotion {
        reference: u32,
        potion: u32,
    },
    SetStatusText {
        reference: u32,
        text: String,
    },
    IsGameStarted,

    // Administrative calls.
    /// Answers whether `secret` is the administrative secret, without doing anything else.
    CheckSecret {
        secret: String,
    },
    StartGame {
        secret: String,
    },
    Evict {
        target: u32,
        secret: String,
    },
    StagePotion {
        potion: Entity,
        position: Point,
        secret: String,
    },
    ReleasePotion {
        reference: u32,
        secret: String,
    },
    AddPotion {
        potion: Entity,
        position: Point,
        secret: String,
    },
    PendingPotions {
        secret: String,
    },
}

impl ArenaRequest {
    /// A short name for logging that never contains a secret.
    pub fn name(&self) -> &'static str {
        match self {
            ArenaRequest::AllocateReference => "allocate_reference",
            ArenaRequest::Connect { .. } => "connect",
            ArenaRequest::GetPosition { .. } => "get_position",
            ArenaRequest::GetNeighbors { .. } => "get_neighbors",
            ArenaRequest::ElementFromRef { .. } => "element_from_ref",
            ArenaRequest::Move { .. } => "move",
            ArenaRequest::Attack { .. } => "attack",
            ArenaRequest::Slow { .. } => "slow",
            ArenaRequest::PickupPotion { .. } => "pickup_potion",
            ArenaRequest::SetStatusText { .. } => "set_status_text",
            ArenaRequest::IsGameStarted => "is_game_started",
            ArenaRequest::CheckSecret { .. } => "check_secret",
            ArenaRequest::StartGame { .. } => "start_game",
            ArenaRequest::Evict { .. } => "evict",
            ArenaRequest::StagePotion { .. } => "stage_potion",
            ArenaRequest::ReleasePotion { .. } => "release_potion",
            ArenaRequest::AddPotion { .. } => "add_potion",
            ArenaRequest::PendingPotions { .. } => "pending_potions",
        }
    }
}

/// A staged potion as listed to the administrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingPotion {
    pub reference: u32,
    pub potion: Entity,
    pub position: Point,
}

/// Arena -> Agent answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArenaResponse {
    Reference(u32),
    Accepted(bool),
    Position(Point),
    Neighbors(Neighbors),
    Element(Entity),
    PendingPotions(Vec<PendingPotion>),
    /// The call went through, nothing to report.
    Done,
    Failed(ArenaError),
}

impl<E> From<Result<E, ArenaError>> for ArenaResponse
where
    E: Into<ArenaResponse>,
{
    fn from(value: Result<E, ArenaError>) -> Self {
        match value {
            Ok(response) => response.into(),
            Err(error) => ArenaResponse::Failed(error),
        }
    }
}

impl From<()> for ArenaResponse {
    fn from(_: ()) -> Self {
        ArenaResponse::Done
    }
}

impl From<Point> for ArenaResponse {
    fn from(value: Point) -> Self {
        ArenaResponse::Position(value)
    }
}

impl From<Neighbors> for ArenaResponse {
    fn from(value: Neighbors) -> Self {
        ArenaResponse::Neighbors(value)
    }
}

impl From<Entity> for ArenaResponse {
    fn from(value: Entity) -> Self {
        ArenaResponse::Element(value)
    }
}

impl From<bool> for ArenaResponse {
    fn from(value: bool) -> Self {
        ArenaResponse::Accepted(value)
    }
}

/// Arena -> Agent callback calls, one at a time per agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AgentRequest {
    ExecuteTurn(Neighbors),
    Shutdown(String),
}
