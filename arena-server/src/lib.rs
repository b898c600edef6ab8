//! The arena: a shared grid world in which remote agents take turns.
//!
//! The [`Registry`] owns all entities, the [`Resolver`] applies actions, the [`Coordinator`]
//! drives the rounds and the [`session`] module serves the agents over websockets.

pub mod admin;
pub mod arena;
pub mod callback;
pub mod config;
pub mod coordinator;
pub mod hand_shake;
pub mod registry;
pub mod resolver;
pub mod session;
pub mod view;

pub use arena::Arena;
pub use callback::{AgentHandle, CallbackCommand, CallbackError};
pub use config::{ArenaConfig, CoordinatorConfig, Rules, SECRET_ENV, load_config};
pub use coordinator::{Coordinator, GAME_OVER, GameSummary};
pub use registry::Registry;
pub use resolver::{ActionOutcome, Resolver};
pub use session::router;
