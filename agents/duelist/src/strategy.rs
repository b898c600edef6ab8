//! A simple duelling policy: go to the nearest element, drink potions, and against characters
//! open with a slow followed by a series of attacks.

use agent_lib::{AgentContext, AgentError, Strategy};
use protocol::{ArenaError, DEFAULT_INTERACTION_DISTANCE, Neighbors, Point, Violation};

/// Attacks after every slow before slowing again.
const ATTACKS_PER_SLOW: u32 = 10;

/// What to do against an adjacent character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Blow {
    Slow,
    Attack,
}

/// Slow once, then attack [`ATTACKS_PER_SLOW`] times, then start over.
#[derive(Debug, Default)]
pub struct Cadence {
    counter: u32,
}

impl Cadence {
    pub fn next_blow(&mut self) -> Blow {
        if self.counter == 0 {
            self.counter = 1;
            return Blow::Slow;
        }
        self.counter = if self.counter < ATTACKS_PER_SLOW {
            self.counter + 1
        } else {
            0
        };
        Blow::Attack
    }
}

/// The closest neighbour, lowest reference on ties.
pub fn nearest(position: Point, neighbors: &Neighbors) -> Option<(u32, i32)> {
    neighbors
        .iter()
        .map(|(reference, point)| (*reference, position.chebyshev(point)))
        .min_by_key(|(_, distance)| *distance)
}

/// The arena's interaction limit, if `error` says we were too far away.
pub fn reach_limit(error: &AgentError) -> Option<i32> {
    match error {
        AgentError::Rejected(ArenaError::ProtocolViolation(Violation::OutOfReach { limit, .. })) => {
            Some(*limit)
        }
        _ => None,
    }
}

pub struct Duelist {
    cadence: Cadence,
    /// Interaction distance as far as we know it. The arena may be configured tighter.
    reach: i32,
}

impl Default for Duelist {
    fn default() -> Self {
        Duelist {
            cadence: Cadence::default(),
            reach: DEFAULT_INTERACTION_DISTANCE,
        }
    }
}

impl Duelist {
    /// Runs an interaction. If the target was out of reach we remember the arena's limit and
    /// step toward the target instead.
    async fn interact(
        &mut self,
        agent: &AgentContext,
        target: u32,
        result: Result<(), AgentError>,
    ) -> Result<(), AgentError> {
        match result {
            Err(error) => match reach_limit(&error) {
                Some(limit) => {
                    tracing::debug!(target, limit, "Out of reach, closing in.");
                    self.reach = limit;
                    agent.link.move_toward(agent.reference, Some(target)).await
                }
                None => Err(error),
            },
            Ok(()) => Ok(()),
        }
    }
}

impl Strategy for Duelist {
    async fn execute_turn(
        &mut self,
        agent: &AgentContext,
        neighbors: Neighbors,
    ) -> Result<(), AgentError> {
        let me = agent.reference;
        let position = agent.link.position(me).await?;

        let Some((target, distance)) = nearest(position, &neighbors) else {
            agent.say("Wandering...").await;
            return agent.link.move_toward(me, None).await;
        };

        let element = agent.link.element_from_ref(target).await?;
        if distance > self.reach {
            agent.say(format!("Heading for {}", element.name)).await;
            return agent.link.move_toward(me, Some(target)).await;
        }

        let result = if element.is_potion() {
            agent.say(format!("Drinking {}", element.name)).await;
            agent.link.pickup_potion(me, target).await
        } else {
            match self.cadence.next_blow() {
                Blow::Slow => {
                    agent.say(format!("Slowing {}", element.name)).await;
                    agent.link.slow(me, target).await
                }
                Blow::Attack => {
                    agent.say(format!("Duelling {}", element.name)).await;
                    agent.link.attack(me, target).await
                }
            }
        };
        self.interact(agent, target, result).await
    }
}
