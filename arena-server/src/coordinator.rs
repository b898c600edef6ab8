//! The turn loop.
//!
//! Waits at the start gate, then hands the turn to one live character after the other, highest
//! initiative first. Every callback is awaited before the next one starts. A callback that fails
//! or exceeds the turn timeout counts as a disconnection; nothing is retried.

use crate::arena::Arena;
use crate::registry::TurnSlot;
use protocol::Entity;
use std::sync::Arc;

/// The notice every remaining agent gets at the end.
pub const GAME_OVER: &str = "game over";

/// How the game ended.
#[derive(Debug, Clone)]
pub struct GameSummary {
    pub rounds: u64,
    pub survivors: Vec<(u32, Entity)>,
}

pub struct Coordinator {
    arena: Arc<Arena>,
}

impl Coordinator {
    pub fn new(arena: Arc<Arena>) -> Self {
        Coordinator { arena }
    }

    /// Runs the game to its end.
    pub async fn run(self) -> GameSummary {
        tracing::info!("Waiting for the game to start.");
        self.arena.wait_for_start().await;

        let config = self.arena.coordinator_config().clone();
        let mut rounds = 0;
        while !self.arena.is_finished().await {
            if config.max_rounds.is_some_and(|max| rounds >= max) {
                tracing::info!(rounds, "Round limit reached.");
                break;
            }
            rounds += 1;
            self.play_round(rounds).await;
            if self.arena.is_finished().await {
                break;
            }
            tokio::time::sleep(config.round_pause()).await;
        }

        let registry = self.arena.registry();
        let survivors = registry.survivors().await;
        for slot in registry.turn_order().await {
            slot.callback.shutdown(GAME_OVER).await;
        }
        tracing::info!(rounds, survivors = survivors.len(), "Game over.");
        GameSummary { rounds, survivors }
    }

    /// One pass over the live characters. The order is computed fresh for every round.
    pub async fn play_round(&self, round: u64) {
        let order = self.arena.registry().turn_order().await;
        tracing::debug!(round, live = order.len(), "Round started.");
        for slot in order {
            if self.arena.is_finished().await {
                return;
            }
            // Killed or gone earlier in this round.
            if !self.arena.registry().is_live(slot.reference).await {
                continue;
            }
            self.play_turn(slot).await;
        }
    }

    async fn play_turn(&self, slot: TurnSlot) {
        let registry = self.arena.registry();
        let config = self.arena.coordinator_config();
        let reference = slot.reference;

        let neighbors = match registry
            .neighbors(reference, registry.rules().vision_radius)
            .await
        {
            Ok(neighbors) => neighbors,
            Err(error) => {
                tracing::debug!(reference, %error, "Character vanished before its turn.");
                return;
            }
        };

        match tokio::time::timeout(config.turn_timeout(), slot.callback.execute_turn(neighbors))
            .await
        {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                tracing::warn!(reference, %error, "Turn callback failed.");
                self.arena.disconnect(reference, "Turn callback failed.").await;
                return;
            }
            Err(_) => {
                tracing::warn!(reference, timeout_ms = config.turn_timeout_ms, "Turn timed out.");
                self.arena.disconnect(reference, "Turn timed out.").await;
                return;
            }
        }

        if registry.consume_turn(reference).await {
            self.arena.disconnect(reference, "Turn budget used up.").await;
        }
    }
}
