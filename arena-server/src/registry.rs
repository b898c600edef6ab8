//! The authoritative store of everything in the arena.
//!
//! All state sits behind one mutex. Every mutation and every read that needs a consistent
//! snapshot takes that lock for its whole duration, and the lock is never held across network
//! calls. Callers never see the collections themselves, only copies.
//!
//! Reference ids start at 1, grow strictly and are never reused, across characters and potions.
//! A reference is classified as
//! - visible: a live character or a released potion,
//! - stale: a character in the graveyard or a consumed potion,
//! - unknown: anything else, including staged potions which stay hidden until released.

use crate::callback::AgentHandle;
use crate::config::Rules;
use crate::view::ElementView;
use protocol::{ArenaError, Characteristic, Entity, Neighbors, PendingPotion, Point, Violation};
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::{Mutex, MutexGuard};

/// A live character due for its turn.
#[derive(Debug, Clone)]
pub struct TurnSlot {
    pub reference: u32,
    pub callback: AgentHandle,
}

/// The collections guarded by the registry lock.
pub struct RegistryState {
    /// The next id we hand out, consecutively counted.
    next_reference: u32,
    /// Live characters.
    characters: BTreeMap<u32, ElementView>,
    /// Dead or disconnected characters, kept for the record.
    graveyard: BTreeMap<u32, ElementView>,
    /// Staged and released potions.
    potions: BTreeMap<u32, ElementView>,
    /// Potions that were picked up.
    consumed: BTreeSet<u32>,
    /// Characters whose graveyard record was dropped. Their ids stay taken.
    retired: BTreeSet<u32>,
}

impl Default for RegistryState {
    fn default() -> Self {
        RegistryState {
            next_reference: 1,
            characters: BTreeMap::new(),
            graveyard: BTreeMap::new(),
            potions: BTreeMap::new(),
            consumed: BTreeSet::new(),
            retired: BTreeSet::new(),
        }
    }
}

impl RegistryState {
    fn allocate(&mut self) -> Result<u32, ArenaError> {
        let reference = self.next_reference;
        self.next_reference = reference
            .checked_add(1)
            .ok_or(Violation::ReferencesExhausted)?;
        Ok(reference)
    }

    /// The error for a reference that is neither a live character nor a visible potion.
    pub(crate) fn missing(&self, reference: u32) -> ArenaError {
        if self.graveyard.contains_key(&reference)
            || self.consumed.contains(&reference)
            || self.retired.contains(&reference)
        {
            ArenaError::StaleReference(reference)
        } else {
            ArenaError::UnknownReference(reference)
        }
    }

    pub(crate) fn is_buried(&self, reference: u32) -> bool {
        self.graveyard.contains_key(&reference)
    }

    pub(crate) fn live_character(&self, reference: u32) -> Result<&ElementView, ArenaError> {
        self.characters
            .get(&reference)
            .ok_or_else(|| self.missing(reference))
    }

    pub(crate) fn live_character_mut(
        &mut self,
        reference: u32,
    ) -> Result<&mut ElementView, ArenaError> {
        if !self.characters.contains_key(&reference) {
            return Err(self.missing(reference));
        }
        self.characters
            .get_mut(&reference)
            .ok_or(ArenaError::UnknownReference(reference))
    }

    /// A live character as the target of an action. Potions are rejected as such.
    pub(crate) fn target_character(&self, reference: u32) -> Result<&ElementView, ArenaError> {
        if let Some(view) = self.characters.get(&reference) {
            return Ok(view);
        }
        match self.potions.get(&reference) {
            Some(potion) if potion.is_visible() => {
                Err(Violation::TargetNotACharacter(reference).into())
            }
            _ => Err(self.missing(reference)),
        }
    }

    /// A released potion as the target of a pickup.
    pub(crate) fn target_potion(&self, reference: u32) -> Result<&ElementView, ArenaError> {
        if self.characters.contains_key(&reference) {
            return Err(Violation::TargetNotAPotion(reference).into());
        }
        match self.potions.get(&reference) {
            Some(potion) if potion.is_visible() => Ok(potion),
            _ => Err(self.missing(reference)),
        }
    }

    /// Any visible element.
    pub(crate) fn visible(&self, reference: u32) -> Result<&ElementView, ArenaError> {
        if let Some(view) = self.characters.get(&reference) {
            return Ok(view);
        }
        match self.potions.get(&reference) {
            Some(potion) if potion.is_visible() => Ok(potion),
            _ => Err(self.missing(reference)),
        }
    }

    /// Moves a live character to the graveyard and voids its callback endpoint.
    /// Returns the endpoint so a last notice can be sent once the lock is released.
    pub(crate) fn bury(&mut self, reference: u32) -> Option<AgentHandle> {
        let mut view = self.characters.remove(&reference)?;
        view.mark_dead();
        let callback = view.take_callback();
        self.graveyard.insert(reference, view);
        callback
    }

    /// Removes a potion for good.
    pub(crate) fn consume_potion(&mut self, reference: u32) -> Option<ElementView> {
        let potion = self.potions.remove(&reference)?;
        self.consumed.insert(reference);
        Some(potion)
    }

    fn neighbors_of(&self, reference: u32, radius: i32) -> Result<Neighbors, ArenaError> {
        let center = self.visible(reference)?.position;
        Ok(self
            .characters
            .values()
            .chain(self.potions.values())
            .filter(|view| view.reference != reference && view.is_visible())
            .filter(|view| view.position.chebyshev(&center) <= radius)
            .map(|view| (view.reference, view.position))
            .collect())
    }

    fn check_attach(
        &self,
        rules: &Rules,
        reference: u32,
        entity: &Entity,
        position: Point,
        turn_budget: Option<u32>,
        callback_address: &str,
    ) -> Result<(), ArenaError> {
        if reference == 0 || reference >= self.next_reference {
            return Err(Violation::UnallocatedReference(reference).into());
        }
        if self.characters.contains_key(&reference)
            || self.graveyard.contains_key(&reference)
            || self.potions.contains_key(&reference)
            || self.consumed.contains(&reference)
            || self.retired.contains(&reference)
        {
            return Err(Violation::DuplicateRegistration(reference).into());
        }
        if !entity.is_character() {
            return Err(Violation::NotACharacter.into());
        }
        if turn_budget == Some(0) {
            return Err(Violation::InvalidTurnBudget.into());
        }
        if !position.is_within(rules.world_width, rules.world_height) {
            return Err(Violation::OutOfBounds(position).into());
        }
        if self.characters.len() >= rules.max_characters {
            return Err(Violation::ArenaFull.into());
        }
        let address_taken = self
            .characters
            .values()
            .filter_map(ElementView::callback)
            .any(|handle| handle.address() == callback_address);
        if address_taken {
            return Err(Violation::CallbackAddressInUse(callback_address.to_string()).into());
        }
        Ok(())
    }
}

/// The registry owned by the arena.
pub struct Registry {
    state: Mutex<RegistryState>,
    rules: Rules,
}

impl Registry {
    pub fn new(rules: Rules) -> Self {
        Registry {
            state: Mutex::new(RegistryState::default()),
            rules,
        }
    }

    pub fn rules(&self) -> &Rules {
        &self.rules
    }

    /// Entry point for the resolver, which validates and applies under one lock.
    pub(crate) async fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().await
    }

    /// Hands out the next reference id.
    pub async fn allocate_reference(&self) -> Result<u32, ArenaError> {
        self.state.lock().await.allocate()
    }

    /// Checks whether `attach_character` would currently accept the registration.
    pub async fn validate_attach(
        &self,
        reference: u32,
        entity: &Entity,
        position: Point,
        turn_budget: Option<u32>,
        callback_address: &str,
    ) -> Result<(), ArenaError> {
        let state = self.state.lock().await;
        state.check_attach(
            &self.rules,
            reference,
            entity,
            position,
            turn_budget,
            callback_address,
        )
    }

    /// Registers a character under a reference allocated earlier.
    pub async fn attach_character(
        &self,
        reference: u32,
        entity: Entity,
        callback: AgentHandle,
        position: Point,
        turn_budget: Option<u32>,
    ) -> Result<(), ArenaError> {
        let mut state = self.state.lock().await;
        state.check_attach(
            &self.rules,
            reference,
            &entity,
            position,
            turn_budget,
            callback.address(),
        )?;
        tracing::info!(reference, %entity, %position, "Character registered.");
        let view = ElementView::character(reference, entity, position, callback, turn_budget);
        state.characters.insert(reference, view);
        Ok(())
    }

    /// Allocates a reference and registers the character in one go.
    pub async fn register_character(
        &self,
        entity: Entity,
        callback: AgentHandle,
        position: Point,
        turn_budget: Option<u32>,
    ) -> Result<u32, ArenaError> {
        let mut state = self.state.lock().await;
        let reference = state.allocate()?;
        state.check_attach(
            &self.rules,
            reference,
            &entity,
            position,
            turn_budget,
            callback.address(),
        )?;
        tracing::info!(reference, %entity, %position, "Character registered.");
        let view = ElementView::character(reference, entity, position, callback, turn_budget);
        state.characters.insert(reference, view);
        Ok(reference)
    }

    pub async fn position(&self, reference: u32) -> Result<Point, ArenaError> {
        let state = self.state.lock().await;
        Ok(state.visible(reference)?.position)
    }

    /// Visible elements within Chebyshev `radius` of `reference`, without `reference` itself.
    pub async fn neighbors(&self, reference: u32, radius: i32) -> Result<Neighbors, ArenaError> {
        self.state.lock().await.neighbors_of(reference, radius)
    }

    pub async fn element_from_ref(&self, reference: u32) -> Result<Entity, ArenaError> {
        let state = self.state.lock().await;
        Ok(state.visible(reference)?.entity.clone())
    }

    pub async fn set_status_text(&self, reference: u32, text: &str) -> Result<(), ArenaError> {
        let mut state = self.state.lock().await;
        state.live_character_mut(reference)?.set_status(text);
        Ok(())
    }

    pub async fn status_text(&self, reference: u32) -> Result<String, ArenaError> {
        let state = self.state.lock().await;
        Ok(state.visible(reference)?.status().to_string())
    }

    /// Live characters by initiative, highest first, ties by reference.
    pub async fn turn_order(&self) -> Vec<TurnSlot> {
        let state = self.state.lock().await;
        let mut order: Vec<(i32, TurnSlot)> = state
            .characters
            .values()
            .filter_map(|view| {
                let callback = view.callback()?.clone();
                Some((
                    view.entity.get(Characteristic::Initiative),
                    TurnSlot {
                        reference: view.reference,
                        callback,
                    },
                ))
            })
            .collect();
        order.sort_by(|(a_init, a), (b_init, b)| {
            b_init.cmp(a_init).then(a.reference.cmp(&b.reference))
        });
        order.into_iter().map(|(_, slot)| slot).collect()
    }

    /// The callback endpoint of a live character.
    pub async fn callback(&self, reference: u32) -> Option<AgentHandle> {
        let state = self.state.lock().await;
        state.characters.get(&reference)?.callback().cloned()
    }

    pub async fn is_live(&self, reference: u32) -> bool {
        self.state.lock().await.characters.contains_key(&reference)
    }

    pub async fn is_buried(&self, reference: u32) -> bool {
        self.state.lock().await.is_buried(reference)
    }

    pub async fn live_count(&self) -> usize {
        self.state.lock().await.characters.len()
    }

    pub async fn graveyard_count(&self) -> usize {
        self.state.lock().await.graveyard.len()
    }

    /// Counts one turn down for `reference`. True if its budget is used up.
    pub async fn consume_turn(&self, reference: u32) -> bool {
        let mut state = self.state.lock().await;
        state
            .characters
            .get_mut(&reference)
            .is_some_and(ElementView::consume_turn)
    }

    /// Live to graveyard. Returns the voided callback endpoint, `None` if the character was
    /// not live.
    pub async fn disconnect(&self, reference: u32) -> Option<AgentHandle> {
        self.state.lock().await.bury(reference)
    }

    /// Drops the graveyard record of a character. True if there was one. The reference stays
    /// stale and can never be registered again.
    pub async fn forget(&self, reference: u32) -> bool {
        let mut state = self.state.lock().await;
        if state.graveyard.remove(&reference).is_none() {
            return false;
        }
        state.retired.insert(reference);
        true
    }

    /// The live characters with their entities.
    pub async fn survivors(&self) -> Vec<(u32, Entity)> {
        let state = self.state.lock().await;
        state
            .characters
            .values()
            .map(|view| (view.reference, view.entity.clone()))
            .collect()
    }

    /// Puts a potion into the arena, hidden if `pending`.
    pub async fn add_potion(
        &self,
        potion: Entity,
        position: Point,
        pending: bool,
    ) -> Result<u32, ArenaError> {
        if !potion.is_potion() {
            return Err(Violation::NotAPotion.into());
        }
        if !position.is_within(self.rules.world_width, self.rules.world_height) {
            return Err(Violation::OutOfBounds(position).into());
        }
        let mut state = self.state.lock().await;
        let reference = state.allocate()?;
        tracing::info!(reference, %potion, %position, pending, "Potion added.");
        state
            .potions
            .insert(reference, ElementView::potion(reference, potion, position, pending));
        Ok(reference)
    }

    /// Makes a staged potion visible. Releasing a visible potion again changes nothing.
    pub async fn release_potion(&self, reference: u32) -> Result<(), ArenaError> {
        let mut state = self.state.lock().await;
        if !state.potions.contains_key(&reference) {
            return Err(if state.characters.contains_key(&reference) {
                Violation::TargetNotAPotion(reference).into()
            } else {
                state.missing(reference)
            });
        }
        if let Some(potion) = state.potions.get_mut(&reference) {
            if potion.is_pending() {
                potion.release();
                tracing::info!(reference, "Potion released.");
            }
        }
        Ok(())
    }

    pub async fn pending_potions(&self) -> Vec<PendingPotion> {
        let state = self.state.lock().await;
        state
            .potions
            .values()
            .filter(|potion| potion.is_pending())
            .map(|potion| PendingPotion {
                reference: potion.reference,
                potion: potion.entity.clone(),
                position: potion.position,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::CharacterKind;

    fn fighter(name: &str) -> Entity {
        Entity::character(name, "G1", CharacterKind::Fighter, [])
    }

    async fn join(registry: &Registry, name: &str, position: Point) -> u32 {
        let (handle, _) = AgentHandle::in_process(format!("local/{name}"));
        registry
            .register_character(fighter(name), handle, position, None)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn references_strictly_increase_across_kinds() {
        let registry = Registry::new(Rules::default());
        let a = registry.allocate_reference().await.unwrap();
        let b = join(&registry, "b", Point::new(1, 1)).await;
        let c = registry
            .add_potion(Entity::potion("p", "Admin", []), Point::new(2, 2), false)
            .await
            .unwrap();
        let d = registry.allocate_reference().await.unwrap();
        assert!(a >= 1);
        assert!(a < b && b < c && c < d);
    }

    #[tokio::test]
    async fn registered_position_reads_back() {
        let registry = Registry::new(Rules::default());
        let position = Point::new(17, 42);
        let reference = join(&registry, "a", position).await;
        assert_eq!(registry.position(reference).await.unwrap(), position);
    }

    #[tokio::test]
    async fn neighbors_exclude_self_dead_far_and_pending() {
        let registry = Registry::new(Rules::default());
        let me = join(&registry, "me", Point::new(10, 10)).await;
        let near = join(&registry, "near", Point::new(12, 9)).await;
        let dead = join(&registry, "dead", Point::new(11, 11)).await;
        let far = join(&registry, "far", Point::new(40, 40)).await;
        let pending = registry
            .add_potion(Entity::potion("hidden", "Admin", []), Point::new(10, 11), true)
            .await
            .unwrap();
        let visible = registry
            .add_potion(Entity::potion("shown", "Admin", []), Point::new(9, 9), false)
            .await
            .unwrap();
        registry.disconnect(dead).await;

        let neighbors = registry.neighbors(me, 5).await.unwrap();
        assert!(!neighbors.contains_key(&me));
        assert!(!neighbors.contains_key(&dead));
        assert!(!neighbors.contains_key(&far));
        assert!(!neighbors.contains_key(&pending));
        assert_eq!(neighbors.get(&near), Some(&Point::new(12, 9)));
        assert_eq!(neighbors.get(&visible), Some(&Point::new(9, 9)));
    }

    #[tokio::test]
    async fn unknown_and_stale_are_told_apart() {
        let registry = Registry::new(Rules::default());
        let reference = join(&registry, "a", Point::new(0, 0)).await;
        assert_eq!(
            registry.position(999).await,
            Err(ArenaError::UnknownReference(999))
        );
        assert!(registry.disconnect(reference).await.is_some());
        assert_eq!(
            registry.element_from_ref(reference).await,
            Err(ArenaError::StaleReference(reference))
        );
        assert!(registry.disconnect(reference).await.is_none());
        assert_eq!(registry.graveyard_count().await, 1);
    }

    #[tokio::test]
    async fn attach_validates_the_handshake() {
        let rules = Rules {
            max_characters: 1,
            ..Rules::default()
        };
        let registry = Registry::new(rules);
        let (handle, _) = AgentHandle::in_process("host:1");
        let origin = Point::new(0, 0);

        let unallocated = registry
            .attach_character(7, fighter("a"), handle.clone(), origin, None)
            .await;
        assert_eq!(
            unallocated,
            Err(Violation::UnallocatedReference(7).into())
        );

        let reference = registry.allocate_reference().await.unwrap();
        let zero_budget = registry
            .attach_character(reference, fighter("a"), handle.clone(), origin, Some(0))
            .await;
        assert_eq!(zero_budget, Err(Violation::InvalidTurnBudget.into()));

        let outside = Point::new(-1, 5);
        let out_of_bounds = registry
            .attach_character(reference, fighter("a"), handle.clone(), outside, None)
            .await;
        assert_eq!(out_of_bounds, Err(Violation::OutOfBounds(outside).into()));

        let potion = Entity::potion("p", "G1", []);
        let not_character = registry
            .attach_character(reference, potion, handle.clone(), origin, None)
            .await;
        assert_eq!(not_character, Err(Violation::NotACharacter.into()));

        registry
            .attach_character(reference, fighter("a"), handle.clone(), origin, Some(3))
            .await
            .unwrap();
        let duplicate = registry
            .attach_character(reference, fighter("a"), handle.clone(), origin, None)
            .await;
        assert_eq!(
            duplicate,
            Err(Violation::DuplicateRegistration(reference).into())
        );

        let next = registry.allocate_reference().await.unwrap();
        let full = registry
            .attach_character(next, fighter("b"), handle, origin, None)
            .await;
        assert_eq!(full, Err(Violation::ArenaFull.into()));
    }

    #[tokio::test]
    async fn callback_addresses_must_differ() {
        let registry = Registry::new(Rules::default());
        let (first, _) = AgentHandle::in_process("host:5100");
        let (second, _) = AgentHandle::in_process("host:5100");
        registry
            .register_character(fighter("a"), first, Point::new(0, 0), None)
            .await
            .unwrap();
        let clash = registry
            .register_character(fighter("b"), second, Point::new(1, 0), None)
            .await;
        assert_eq!(
            clash,
            Err(Violation::CallbackAddressInUse("host:5100".into()).into())
        );
    }

    #[tokio::test]
    async fn turn_order_follows_initiative() {
        let registry = Registry::new(Rules::default());
        let mut references = Vec::new();
        for (name, initiative) in [("slow", 10), ("fast", 150), ("mid", 50), ("mid2", 50)] {
            let (handle, _) = AgentHandle::in_process(name);
            let entity = Entity::character(
                name,
                "G1",
                CharacterKind::Fighter,
                [(Characteristic::Initiative, initiative)],
            );
            references.push(
                registry
                    .register_character(entity, handle, Point::new(0, 0), None)
                    .await
                    .unwrap(),
            );
        }
        let order: Vec<u32> = registry
            .turn_order()
            .await
            .into_iter()
            .map(|slot| slot.reference)
            .collect();
        assert_eq!(
            order,
            vec![references[1], references[2], references[3], references[0]]
        );
    }

    #[tokio::test]
    async fn staged_potion_is_hidden_until_released() {
        let registry = Registry::new(Rules::default());
        let observer = join(&registry, "observer", Point::new(5, 5)).await;
        let potion = registry
            .add_potion(Entity::potion("Tonic", "Admin", []), Point::new(5, 6), true)
            .await
            .unwrap();

        let pending = registry.pending_potions().await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].reference, potion);
        assert_eq!(
            registry.element_from_ref(potion).await,
            Err(ArenaError::UnknownReference(potion))
        );
        assert!(!registry.neighbors(observer, 3).await.unwrap().contains_key(&potion));

        registry.release_potion(potion).await.unwrap();
        assert!(registry.pending_potions().await.is_empty());
        assert!(registry.neighbors(observer, 3).await.unwrap().contains_key(&potion));
        assert_eq!(
            registry.release_potion(observer).await,
            Err(Violation::TargetNotAPotion(observer).into())
        );
    }

    #[tokio::test]
    async fn forgotten_references_stay_taken() {
        let registry = Registry::new(Rules::default());
        let reference = registry.allocate_reference().await.unwrap();
        let (handle, _) = AgentHandle::in_process("host:1");
        registry
            .attach_character(reference, fighter("a"), handle, Point::new(0, 0), None)
            .await
            .unwrap();
        registry.disconnect(reference).await;
        assert!(registry.forget(reference).await);
        assert!(!registry.forget(reference).await);

        let (impostor, _) = AgentHandle::in_process("host:2");
        let again = registry
            .attach_character(reference, fighter("impostor"), impostor, Point::new(0, 0), None)
            .await;
        assert_eq!(again, Err(Violation::DuplicateRegistration(reference).into()));
        assert_eq!(
            registry.element_from_ref(reference).await,
            Err(ArenaError::StaleReference(reference))
        );
    }

    #[test]
    fn allocation_stops_at_the_last_id() {
        let mut state = RegistryState {
            next_reference: u32::MAX - 1,
            ..RegistryState::default()
        };
        assert_eq!(state.allocate(), Ok(u32::MAX - 1));
        assert_eq!(state.allocate(), Err(Violation::ReferencesExhausted.into()));
        assert_eq!(state.allocate(), Err(Violation::ReferencesExhausted.into()));
    }
}
