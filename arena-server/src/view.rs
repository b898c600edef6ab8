//! The arena's records of the elements in play.

use crate::callback::AgentHandle;
use protocol::{Entity, MAX_STATUS_LENGTH, Point};

/// The server side record of one element: the entity itself plus everything only the arena knows.
#[derive(Debug, Clone)]
pub struct ElementView {
    pub reference: u32,
    pub entity: Entity,
    pub position: Point,
    /// `None` for potions and for disconnected characters.
    callback: Option<AgentHandle>,
    alive: bool,
    /// Staged potions are invisible until released.
    pending: bool,
    /// Transient status text, e.g. what the character is up to.
    status: String,
    /// Turns left before the character gets disconnected, `None` for unlimited.
    turns_left: Option<u32>,
}

impl ElementView {
    pub fn character(
        reference: u32,
        entity: Entity,
        position: Point,
        callback: AgentHandle,
        turn_budget: Option<u32>,
    ) -> Self {
        ElementView {
            reference,
            entity,
            position,
            callback: Some(callback),
            alive: true,
            pending: false,
            status: String::new(),
            turns_left: turn_budget,
        }
    }

    pub fn potion(reference: u32, entity: Entity, position: Point, pending: bool) -> Self {
        ElementView {
            reference,
            entity,
            position,
            callback: None,
            alive: true,
            pending,
            status: if pending {
                "Pending".to_string()
            } else {
                String::new()
            },
            turns_left: None,
        }
    }

    pub fn callback(&self) -> Option<&AgentHandle> {
        self.callback.as_ref()
    }

    /// Voids the callback endpoint and hands it out for a last notice.
    pub fn take_callback(&mut self) -> Option<AgentHandle> {
        self.callback.take()
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn mark_dead(&mut self) {
        self.alive = false;
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn release(&mut self) {
        self.pending = false;
        self.status.clear();
    }

    /// Visible to neighbour and element queries.
    pub fn is_visible(&self) -> bool {
        self.alive && !self.pending
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn set_status(&mut self, text: &str) {
        self.status = text.chars().take(MAX_STATUS_LENGTH).collect();
    }

    pub fn turns_left(&self) -> Option<u32> {
        self.turns_left
    }

    /// Counts one turn down. Returns true once the budget is used up.
    pub fn consume_turn(&mut self) -> bool {
        match self.turns_left.as_mut() {
            Some(left) => {
                *left = left.saturating_sub(1);
                *left == 0
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::CharacterKind;

    fn fighter_view(budget: Option<u32>) -> ElementView {
        let (handle, _) = AgentHandle::in_process("test");
        let entity = Entity::character("Conan", "G1", CharacterKind::Fighter, []);
        ElementView::character(1, entity, Point::new(0, 0), handle, budget)
    }

    #[test]
    fn budget_runs_out() {
        let mut view = fighter_view(Some(2));
        assert!(!view.consume_turn());
        assert!(view.consume_turn());
        assert_eq!(view.turns_left(), Some(0));

        let mut unlimited = fighter_view(None);
        assert!(!unlimited.consume_turn());
    }

    #[test]
    fn status_is_truncated() {
        let mut view = fighter_view(None);
        view.set_status(&"x".repeat(500));
        assert_eq!(view.status().len(), MAX_STATUS_LENGTH);
    }

    #[test]
    fn pending_potion_becomes_visible_on_release() {
        let tonic = Entity::potion("Tonic", "Admin", []);
        let mut potion = ElementView::potion(5, tonic, Point::new(1, 1), true);
        assert!(!potion.is_visible());
        assert_eq!(potion.status(), "Pending");
        potion.release();
        assert!(potion.is_visible());
        assert!(potion.status().is_empty());
    }
}
