//! The contract between a decision policy and the agent runtime.
//!
//! The runtime owns the connection to the arena and the callback endpoint. Once per round the
//! arena hands the turn to the agent, the runtime calls [`Strategy::execute_turn`] with the
//! neighbour snapshot and reports the turn as done when the future completes. Inside the turn the
//! strategy acts through the [`AgentContext`].
//!
//! ```ignore
//! struct Wanderer;
//!
//! impl Strategy for Wanderer {
//!     async fn execute_turn(&mut self, agent: &AgentContext, _: Neighbors) -> Result<(), AgentError> {
//!         agent.link.move_toward(agent.reference, None).await
//!     }
//! }
//! ```

use crate::arena_link::ArenaLink;
use crate::error::AgentError;
use protocol::Neighbors;

/// What a strategy knows about itself.
#[derive(Clone)]
pub struct AgentContext {
    /// The reference id of our character.
    pub reference: u32,
    /// The session with the arena.
    pub link: ArenaLink,
}

impl AgentContext {
    /// Shows what we are up to. Failing to do so is not worth ending the turn for.
    pub async fn say(&self, text: impl Into<String>) {
        if let Err(error) = self.link.set_status_text(self.reference, text).await {
            tracing::debug!(%error, "Status text refused.");
        }
    }
}

/// A decision policy.
pub trait Strategy: Send + 'static {
    /// Plays one turn. Calls the arena refuses ([`AgentError::Rejected`]) do not end the agent;
    /// every other error does.
    fn execute_turn(
        &mut self,
        agent: &AgentContext,
        neighbors: Neighbors,
    ) -> impl Future<Output = Result<(), AgentError>> + Send;

    /// Called once when the arena disconnects us.
    fn shutdown(&mut self, reason: &str) {
        tracing::info!(reason, "Disconnected by the arena.");
    }
}
