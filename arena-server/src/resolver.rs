//! Resolution of the four actions a character can take.
//!
//! Every action validates and applies under a single registry lock, so a character that moved or
//! died in between can never be acted upon with outdated data. Disconnect notices for characters
//! that died are sent after the lock is released.

use crate::callback::AgentHandle;
use crate::registry::Registry;
use protocol::{ArenaError, Characteristic, Direction, Point, Violation};

/// What an action ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Moved(Point),
    /// The target of a move vanished, nothing happened.
    Stayed,
    Hit {
        damage: i32,
        remaining_life: i32,
        killed: bool,
    },
    /// The target already died, nothing happened.
    AlreadyDead,
    Slowed {
        initiative: i32,
    },
    PickedUp {
        killed: bool,
    },
}

/// The direction a character wanders in when it has no target.
pub const WANDER_DIRECTION: Direction = Direction::East;

/// Mitigation is a tenth of the defender's initiative, every hit deals at least one point.
pub fn damage(attacker_force: i32, defender_initiative: i32) -> i32 {
    (attacker_force - defender_initiative / 10).max(1)
}

pub struct Resolver<'a> {
    registry: &'a Registry,
}

impl<'a> Resolver<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Resolver { registry }
    }

    /// One step toward `target`, or one step in the wander direction without target.
    pub async fn move_toward(
        &self,
        actor: u32,
        target: Option<u32>,
    ) -> Result<ActionOutcome, ArenaError> {
        let rules = self.registry.rules();
        let mut state = self.registry.lock().await;
        let origin = state.live_character(actor)?.position;

        let destination = match target {
            None => wander(origin, rules.world_width, rules.world_height),
            Some(target) if target == actor => return Err(Violation::SelfTarget.into()),
            Some(target) => match state.visible(target) {
                Ok(view) => origin
                    .step_toward(&view.position)
                    .clamped(rules.world_width, rules.world_height),
                Err(error) if error.is_benign() => {
                    tracing::debug!(actor, target, "Move target vanished, staying.");
                    return Ok(ActionOutcome::Stayed);
                }
                Err(error) => return Err(error),
            },
        };

        state.live_character_mut(actor)?.position = destination;
        tracing::debug!(actor, ?target, %destination, "Moved.");
        Ok(ActionOutcome::Moved(destination))
    }

    pub async fn attack(&self, actor: u32, target: u32) -> Result<ActionOutcome, ArenaError> {
        if actor == target {
            return Err(Violation::SelfTarget.into());
        }
        let (outcome, buried) = {
            let mut state = self.registry.lock().await;
            let attacker = state.live_character(actor)?;
            let force = attacker.entity.get(Characteristic::Force);
            let origin = attacker.position;

            if state.is_buried(target) {
                tracing::debug!(actor, target, "Attack on a dead character ignored.");
                return Ok(ActionOutcome::AlreadyDead);
            }
            let defender = state.target_character(target)?;
            self.check_reach(origin, defender.position)?;

            let damage = damage(force, defender.entity.get(Characteristic::Initiative));
            let defender = state.live_character_mut(target)?;
            let remaining_life = defender
                .entity
                .characteristics
                .add(Characteristic::Life, -damage);
            let killed = defender.entity.characteristics.is_dead();
            if !killed {
                if let Some(kind) = defender.entity.character_kind() {
                    kind.after_damage(&mut defender.entity.characteristics);
                }
            }
            tracing::info!(actor, target, damage, remaining_life, killed, "Attack resolved.");

            let buried = if killed { state.bury(target) } else { None };
            (
                ActionOutcome::Hit {
                    damage,
                    remaining_life,
                    killed,
                },
                buried,
            )
        };
        notify_death(buried, format!("Killed by {actor}.")).await;
        Ok(outcome)
    }

    /// Lowers the target's initiative. Cadence is up to the agent.
    pub async fn slow(&self, actor: u32, target: u32) -> Result<ActionOutcome, ArenaError> {
        if actor == target {
            return Err(Violation::SelfTarget.into());
        }
        let slow_amount = self.registry.rules().slow_amount;
        let mut state = self.registry.lock().await;
        let caster = state.live_character(actor)?;
        let factor = caster
            .entity
            .character_kind()
            .map_or(1, |kind| kind.slow_factor());
        let origin = caster.position;

        if state.is_buried(target) {
            tracing::debug!(actor, target, "Slow on a dead character ignored.");
            return Ok(ActionOutcome::AlreadyDead);
        }
        let defender = state.target_character(target)?;
        self.check_reach(origin, defender.position)?;

        let initiative = state
            .live_character_mut(target)?
            .entity
            .characteristics
            .add(Characteristic::Initiative, -slow_amount * factor);
        tracing::info!(actor, target, initiative, "Slow resolved.");
        Ok(ActionOutcome::Slowed { initiative })
    }

    /// Drinks a released potion. The potion is gone afterwards, whatever it did.
    pub async fn pickup_potion(
        &self,
        actor: u32,
        potion: u32,
    ) -> Result<ActionOutcome, ArenaError> {
        let (outcome, buried) = {
            let mut state = self.registry.lock().await;
            let origin = state.live_character(actor)?.position;
            let target = state.target_potion(potion)?;
            self.check_reach(origin, target.position)?;

            let Some(drunk) = state.consume_potion(potion) else {
                return Err(state.missing(potion));
            };
            let drinker = state.live_character_mut(actor)?;
            drinker
                .entity
                .characteristics
                .apply(&drunk.entity.characteristics);
            let killed = drinker.entity.characteristics.is_dead();
            tracing::info!(actor, potion, killed, "Potion picked up.");

            let buried = if killed { state.bury(actor) } else { None };
            (ActionOutcome::PickedUp { killed }, buried)
        };
        notify_death(buried, "Poisoned.".to_string()).await;
        Ok(outcome)
    }

    fn check_reach(&self, from: Point, to: Point) -> Result<(), ArenaError> {
        let distance = from.chebyshev(&to);
        let limit = self.registry.rules().interaction_distance;
        if distance > limit {
            return Err(Violation::OutOfReach { distance, limit }.into());
        }
        Ok(())
    }
}

/// First in-bounds step, trying the compass from the wander direction on.
fn wander(origin: Point, width: i32, height: i32) -> Point {
    WANDER_DIRECTION
        .rotations()
        .map(|direction| origin.step(direction))
        .find(|next| next.is_within(width, height))
        .unwrap_or(origin)
}

async fn notify_death(buried: Option<AgentHandle>, reason: String) {
    if let Some(callback) = buried {
        callback.shutdown(reason).await;
    }
}
