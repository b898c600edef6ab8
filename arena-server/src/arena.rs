//! The arena state shared by all sessions and the coordinator.

use crate::admin::TournamentControl;
use crate::config::{ArenaConfig, CoordinatorConfig};
use crate::registry::Registry;
use crate::resolver::Resolver;
use tokio::sync::watch;

/// Everything the arena owns. Lives in an `Arc` shared by the sessions and the coordinator.
pub struct Arena {
    registry: Registry,
    coordinator: CoordinatorConfig,
    /// The start gate. Flips to true once and never back.
    gate: watch::Sender<bool>,
    /// Only present in the tournament variant.
    control: Option<TournamentControl>,
}

impl Arena {
    pub fn new(config: &ArenaConfig) -> Self {
        let (gate, _) = watch::channel(false);
        Arena {
            registry: Registry::new(config.rules.clone()),
            coordinator: config.coordinator.clone(),
            gate,
            control: config.admin_secret.clone().map(TournamentControl::new),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn resolver(&self) -> Resolver<'_> {
        Resolver::new(&self.registry)
    }

    pub fn coordinator_config(&self) -> &CoordinatorConfig {
        &self.coordinator
    }

    pub(crate) fn control(&self) -> Option<&TournamentControl> {
        self.control.as_ref()
    }

    pub fn is_tournament(&self) -> bool {
        self.control.is_some()
    }

    pub fn is_game_started(&self) -> bool {
        *self.gate.borrow()
    }

    /// Waits until the start gate opened.
    pub async fn wait_for_start(&self) {
        let mut receiver = self.gate.subscribe();
        // The sender lives as long as self, so this only returns once the gate is open.
        let _ = receiver.wait_for(|started| *started).await;
    }

    /// Opens the start gate. Returns false if it was open already.
    pub(crate) fn open_gate(&self) -> bool {
        let opened = self.gate.send_if_modified(|started| {
            if *started {
                false
            } else {
                *started = true;
                true
            }
        });
        if opened {
            tracing::info!("Game started.");
        }
        opened
    }

    /// Called after every successful registration. The plain arena starts by itself once enough
    /// characters are in.
    pub async fn character_joined(&self) {
        if self.is_tournament() || self.is_game_started() {
            return;
        }
        let live = self.registry.live_count().await;
        if live >= self.coordinator.min_characters {
            tracing::info!(live, "Enough characters joined.");
            self.open_gate();
        }
    }

    /// The game is over once at most one character is left, but never before it started.
    pub async fn is_finished(&self) -> bool {
        self.is_game_started() && self.registry.live_count().await <= 1
    }

    /// Moves a character to the graveyard and sends it a last notice. False if it was not live.
    pub async fn disconnect(&self, reference: u32, reason: &str) -> bool {
        match self.registry.disconnect(reference).await {
            Some(callback) => {
                tracing::info!(reference, reason, "Character disconnected.");
                callback.shutdown(reason).await;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::AgentHandle;
    use protocol::{CharacterKind, Characteristic, Entity, Point};

    async fn join(arena: &Arena, name: &str, force: i32, position: Point) -> u32 {
        let (handle, _) = AgentHandle::in_process(format!("local/{name}"));
        let entity = Entity::character(
            name,
            "G1",
            CharacterKind::Fighter,
            [(Characteristic::Force, force), (Characteristic::Initiative, 0)],
        );
        let reference = arena
            .registry()
            .register_character(entity, handle, position, None)
            .await
            .unwrap();
        arena.character_joined().await;
        reference
    }

    #[tokio::test]
    async fn last_one_standing_ends_the_game() {
        let arena = Arena::new(&ArenaConfig::default());
        let a = join(&arena, "A", 50, Point::new(10, 10)).await;
        let b = join(&arena, "B", 10, Point::new(11, 10)).await;
        let c = join(&arena, "C", 10, Point::new(10, 11)).await;
        assert!(arena.is_game_started());
        assert!(!arena.is_finished().await);

        let resolver = arena.resolver();
        while arena.registry().is_live(b).await {
            resolver.attack(a, b).await.unwrap();
        }
        assert_eq!(arena.registry().live_count().await, 2);
        assert!(!arena.is_finished().await);

        while arena.registry().is_live(c).await {
            resolver.attack(a, c).await.unwrap();
        }
        assert_eq!(arena.registry().live_count().await, 1);
        assert!(arena.is_finished().await);
    }

    #[tokio::test]
    async fn plain_arena_waits_for_enough_characters() {
        let arena = Arena::new(&ArenaConfig::default());
        join(&arena, "alone", 20, Point::new(0, 0)).await;
        assert!(!arena.is_game_started());
        // A single character before the start is not a finished game.
        assert!(!arena.is_finished().await);
        join(&arena, "second", 20, Point::new(5, 5)).await;
        assert!(arena.is_game_started());
    }

    #[tokio::test]
    async fn tournament_never_starts_by_itself() {
        let config = ArenaConfig::default().with_secret_override(Some("s3cret".into()));
        let arena = Arena::new(&config);
        for i in 0..4 {
            join(&arena, &format!("p{i}"), 20, Point::new(i, i)).await;
        }
        assert!(arena.is_tournament());
        assert!(!arena.is_game_started());
    }

    #[tokio::test]
    async fn disconnect_sends_a_notice_once() {
        let arena = Arena::new(&ArenaConfig::default());
        let (handle, mut receiver) = AgentHandle::in_process("local/x");
        let entity = Entity::character("x", "G1", CharacterKind::Fighter, []);
        let reference = arena
            .registry()
            .register_character(entity, handle, Point::new(1, 1), None)
            .await
            .unwrap();

        assert!(arena.disconnect(reference, "bye").await);
        assert!(!arena.disconnect(reference, "bye again").await);
        match receiver.recv().await {
            Some(crate::callback::CallbackCommand::Shutdown { reason }) => assert_eq!(reason, "bye"),
            _ => panic!("expected a shutdown notice"),
        }
    }
}
