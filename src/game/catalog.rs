//! Unit archetypes available for spawning

/// Template a unit is built from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitArchetype {
    pub id: &'static str,
    pub max_hp: u32,
    pub damage: u32,
}

/// Every archetype a player may spawn
pub const ARCHETYPES: [UnitArchetype; 5] = [
    // Baseline melee
    UnitArchetype {
        id: "soldier",
        max_hp: 80,
        damage: 15,
    },
    UnitArchetype {
        id: "knight",
        max_hp: 150,
        damage: 22,
    },
    UnitArchetype {
        id: "archer",
        max_hp: 55,
        damage: 28,
    },
    // Glass cannon
    UnitArchetype {
        id: "mage",
        max_hp: 45,
        damage: 38,
    },
    UnitArchetype {
        id: "tank",
        max_hp: 220,
        damage: 12,
    },
];

/// Look up an archetype by id
pub fn archetype(id: &str) -> Option<&'static UnitArchetype> {
    ARCHETYPES.iter().find(|a| a.id == id)
}
