//! The entity model shared by arena and agents.
//!
//! An [`Entity`] only carries what an agent declares about itself: name, group, kind and
//! characteristics. Reference id and position belong to the arena's registry, agents only
//! ever see snapshots of them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A named numeric attribute of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Characteristic {
    Life,
    Force,
    Initiative,
}

impl Characteristic {
    pub const ALL: [Characteristic; 3] = [
        Characteristic::Life,
        Characteristic::Force,
        Characteristic::Initiative,
    ];

    /// Inclusive range a character's value is clamped to.
    pub fn bounds(self) -> (i32, i32) {
        match self {
            Characteristic::Life => (0, 100),
            Characteristic::Force => (0, 100),
            Characteristic::Initiative => (0, 200),
        }
    }

    /// The value a character starts with if it does not declare one.
    pub fn default_value(self) -> i32 {
        match self {
            Characteristic::Life => 100,
            Characteristic::Force => 20,
            Characteristic::Initiative => 50,
        }
    }

    fn clamp(self, value: i32) -> i32 {
        let (low, high) = self.bounds();
        value.clamp(low, high)
    }
}

/// Characteristic values of one entity. For characters these are absolute values, for potions
/// they are the deltas applied on pickup.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Characteristics(BTreeMap<Characteristic, i32>);

impl Characteristics {
    /// Full character sheet, every value clamped and missing ones defaulted.
    pub fn for_character(values: impl IntoIterator<Item = (Characteristic, i32)>) -> Self {
        let mut sheet: BTreeMap<Characteristic, i32> = Characteristic::ALL
            .iter()
            .map(|c| (*c, c.default_value()))
            .collect();
        for (characteristic, value) in values {
            sheet.insert(characteristic, characteristic.clamp(value));
        }
        Characteristics(sheet)
    }

    /// Raw deltas, nothing clamped or defaulted.
    pub fn deltas(values: impl IntoIterator<Item = (Characteristic, i32)>) -> Self {
        Characteristics(values.into_iter().collect())
    }

    /// The stored value, 0 if absent.
    pub fn get(&self, characteristic: Characteristic) -> i32 {
        self.0.get(&characteristic).copied().unwrap_or(0)
    }

    /// Adds `delta` and clamps into the characteristic's bounds. Returns the new value.
    pub fn add(&mut self, characteristic: Characteristic, delta: i32) -> i32 {
        let value = characteristic.clamp(self.get(characteristic).saturating_add(delta));
        self.0.insert(characteristic, value);
        value
    }

    /// Applies every delta of `other`.
    pub fn apply(&mut self, other: &Characteristics) {
        for (characteristic, delta) in other.iter() {
            self.add(characteristic, delta);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Characteristic, i32)> + '_ {
        self.0.iter().map(|(c, v)| (*c, *v))
    }

    /// A character dies when its life drops to zero.
    pub fn is_dead(&self) -> bool {
        self.get(Characteristic::Life) <= 0
    }
}

/// The kinds of characters with their passive abilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CharacterKind {
    /// No passive ability.
    #[default]
    Fighter,
    /// Grows stronger the more it gets hurt.
    Berserker,
    /// Slows its opponents twice as hard.
    TimeMage,
}

impl CharacterKind {
    /// Hook invoked after the character took damage and survived.
    pub fn after_damage(self, sheet: &mut Characteristics) {
        match self {
            CharacterKind::Berserker => {
                let life = sheet.get(Characteristic::Life);
                if life < 100 {
                    sheet.add(Characteristic::Force, (100 - life) / 2);
                }
            }
            CharacterKind::Fighter | CharacterKind::TimeMage => {}
        }
    }

    /// Multiplier on the initiative debuff this character inflicts.
    pub fn slow_factor(self) -> i32 {
        match self {
            CharacterKind::TimeMage => 2,
            CharacterKind::Fighter | CharacterKind::Berserker => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityKind {
    Character(CharacterKind),
    Potion,
}

/// An element of the arena as declared by its creator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    /// The group (team) label.
    pub group: String,
    pub kind: EntityKind,
    pub characteristics: Characteristics,
}

impl Entity {
    pub fn character(
        name: impl Into<String>,
        group: impl Into<String>,
        kind: CharacterKind,
        values: impl IntoIterator<Item = (Characteristic, i32)>,
    ) -> Self {
        Entity {
            name: name.into(),
            group: group.into(),
            kind: EntityKind::Character(kind),
            characteristics: Characteristics::for_character(values),
        }
    }

    pub fn potion(
        name: impl Into<String>,
        group: impl Into<String>,
        deltas: impl IntoIterator<Item = (Characteristic, i32)>,
    ) -> Self {
        Entity {
            name: name.into(),
            group: group.into(),
            kind: EntityKind::Potion,
            characteristics: Characteristics::deltas(deltas),
        }
    }

    pub fn is_character(&self) -> bool {
        matches!(self.kind, EntityKind::Character(_))
    }

    pub fn is_potion(&self) -> bool {
        matches!(self.kind, EntityKind::Potion)
    }

    pub fn character_kind(&self) -> Option<CharacterKind> {
        match self.kind {
            EntityKind::Character(kind) => Some(kind),
            EntityKind::Potion => None,
        }
    }

    pub fn get(&self, characteristic: Characteristic) -> i32 {
        self.characteristics.get(characteristic)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.name, self.group)
    }
}
