//! The agent side of the arena.
//!
//! Every agent is both a caller and a callee: it calls the arena through its [`ArenaLink`] and
//! serves the arena's turn callbacks on an endpoint of its own. [`run_agent`] wires both up for a
//! [`Strategy`].

pub mod arena_link;
pub mod callback_listener;
pub mod console;
pub mod error;
pub mod strategy;

pub use arena_link::ArenaLink;
pub use console::{AgentSettings, run_agent};
pub use error::AgentError;
pub use strategy::{AgentContext, Strategy};
