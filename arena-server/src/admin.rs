//! The administrative control plane of the tournament variant.
//!
//! Every call carries the shared secret fixed at start up. A wrong secret is logged and rejected
//! with [`ArenaError::Unauthorized`] before anything is touched. The plain arena has no secret, so
//! there every administrative call is rejected.

use crate::arena::Arena;
use protocol::{ArenaError, Entity, PendingPotion, Point};

/// The reason an evicted agent gets told.
pub const EVICTION_NOTICE: &str = "Evicted by the administrator.";

/// Holds the shared secret.
pub struct TournamentControl {
    secret: String,
}

impl TournamentControl {
    pub fn new(secret: String) -> Self {
        TournamentControl { secret }
    }

    fn check(&self, secret: &str, operation: &'static str) -> Result<(), ArenaError> {
        // Plain comparison, the secret only keeps honest players honest.
        if self.secret == secret {
            Ok(())
        } else {
            tracing::warn!(operation, "Administrative call with a wrong secret.");
            Err(ArenaError::Unauthorized)
        }
    }
}

impl Arena {
    fn authorize(&self, secret: &str, operation: &'static str) -> Result<(), ArenaError> {
        match self.control() {
            Some(control) => control.check(secret, operation),
            None => {
                tracing::warn!(operation, "Administrative call on an arena without secret.");
                Err(ArenaError::Unauthorized)
            }
        }
    }

    /// Whether `secret` would be accepted. A wrong one is logged like any other rejection.
    pub fn check_secret(&self, secret: &str) -> bool {
        self.authorize(secret, "check_secret").is_ok()
    }

    /// Opens the start gate. Starting a running game again is accepted and changes nothing.
    pub fn start_game(&self, secret: &str) -> Result<bool, ArenaError> {
        self.authorize(secret, "start_game")?;
        self.open_gate();
        Ok(true)
    }

    /// Throws a character out. A character that is already gone is only dropped from the
    /// records, a live one is told first. False if there was nothing to evict.
    pub async fn evict(&self, target: u32, secret: &str) -> Result<bool, ArenaError> {
        self.authorize(secret, "evict")?;
        let registry = self.registry();
        if registry.forget(target).await {
            tracing::info!(target, "Disconnected character removed.");
            return Ok(true);
        }
        let Some(callback) = registry.callback(target).await else {
            tracing::info!(target, "Nothing to evict.");
            return Ok(false);
        };
        callback.shutdown(EVICTION_NOTICE).await;
        let evicted = registry.disconnect(target).await.is_some();
        tracing::info!(target, evicted, "Character evicted.");
        Ok(evicted)
    }

    /// First half of the two phase injection: the potion exists but nobody can see it.
    pub async fn stage_potion(
        &self,
        potion: Entity,
        position: Point,
        secret: &str,
    ) -> Result<u32, ArenaError> {
        self.authorize(secret, "stage_potion")?;
        self.registry().add_potion(potion, position, true).await
    }

    pub async fn release_potion(&self, reference: u32, secret: &str) -> Result<(), ArenaError> {
        self.authorize(secret, "release_potion")?;
        self.registry().release_potion(reference).await
    }

    /// Puts a potion into play right away.
    pub async fn add_potion(
        &self,
        potion: Entity,
        position: Point,
        secret: &str,
    ) -> Result<u32, ArenaError> {
        self.authorize(secret, "add_potion")?;
        self.registry().add_potion(potion, position, false).await
    }

    pub async fn pending_potions(&self, secret: &str) -> Result<Vec<PendingPotion>, ArenaError> {
        self.authorize(secret, "pending_potions")?;
        Ok(self.registry().pending_potions().await)
    }
}
