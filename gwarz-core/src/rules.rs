//! RulesConfig - unit, city, combat and upkeep tables

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::hex::HEX_SIZE;
use crate::units::{UnitKind, UNIT_KINDS};
use crate::world::Terrain;

/// Per-kind unit statistics
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnitStats {
    pub max_hp: i32,
    pub attack: i32,
    pub defense: i32,
    pub range: u32,
    pub movement: u32,
    /// Ignored for kinds that are not fuel-limited
    #[serde(default)]
    pub max_fuel: u32,
    /// Production time in rounds
    pub cost: u32,
}

impl UnitStats {
    /// Stats from the standard game
    pub fn standard(kind: UnitKind) -> Self {
        let (max_hp, attack, defense, range, movement, max_fuel) = match kind {
            UnitKind::Infantry => (10, 2, 2, 1, 1, 0),
            UnitKind::Tank => (20, 4, 4, 1, 2, 0),
            UnitKind::Fighter => (20, 4, 3, 1, 3, 30),
            UnitKind::TransportPlane => (30, 0, 4, 1, 4, 30),
            UnitKind::TransportShip => (30, 0, 4, 1, 2, 0),
            UnitKind::Destroyer => (30, 5, 5, 1, 2, 0),
            UnitKind::Cruiser => (50, 6, 6, 2, 1, 0),
            UnitKind::AirCarrier => (100, 2, 6, 1, 1, 0),
        };
        Self {
            max_hp,
            attack,
            defense,
            range,
            movement,
            max_fuel,
            cost: 1,
        }
    }
}

/// What a transport kind may carry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportRule {
    pub capacity: usize,
    pub cargo: Vec<UnitKind>,
}

impl TransportRule {
    pub fn allows(&self, kind: UnitKind) -> bool {
        self.cargo.contains(&kind)
    }
}

/// Cities fight back as stationary defenders
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CityRules {
    pub max_hp: i32,
    pub attack: i32,
    pub defense: i32,
    pub range: u32,
    /// Ordinary combat never pushes a city below this
    pub min_hp: i32,
}

impl Default for CityRules {
    fn default() -> Self {
        let max_hp = 15;
        Self {
            max_hp,
            attack: 2,
            defense: 3,
            range: 1,
            min_hp: (max_hp / 10).max(1),
        }
    }
}

/// Damage formula constants
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CombatRules {
    pub roll_min: f64,
    pub roll_max: f64,
    pub attack_factor: f64,
    pub defense_factor: f64,
    /// Chance that a zero-damage strike still chips
    pub chip_chance: f64,
    pub chip_damage: i32,
}

impl Default for CombatRules {
    fn default() -> Self {
        Self {
            roll_min: 0.8,
            roll_max: 1.2,
            attack_factor: 1.5,
            defense_factor: 0.5,
            chip_chance: 0.2,
            chip_damage: 2,
        }
    }
}

/// Defense multiplier of the hex a defender stands on
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TerrainBonus {
    pub water: f64,
    pub land: f64,
    pub mountain: f64,
}

impl TerrainBonus {
    pub fn defense(&self, terrain: Terrain) -> f64 {
        match terrain {
            Terrain::Water => self.water,
            Terrain::Land => self.land,
            Terrain::Mountain => self.mountain,
        }
    }
}

impl Default for TerrainBonus {
    fn default() -> Self {
        Self {
            water: 1.0,
            land: 1.0,
            mountain: 1.2,
        }
    }
}

/// Fraction of max hp restored at upkeep for units that held still
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct HealRules {
    pub field: f64,
    pub friendly_city: f64,
}

impl Default for HealRules {
    fn default() -> Self {
        Self {
            field: 0.1,
            friendly_city: 0.2,
        }
    }
}

/// Complete rules tables. Missing JSON fields fall back to the standard game.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    pub units: BTreeMap<UnitKind, UnitStats>,
    pub transports: BTreeMap<UnitKind, TransportRule>,
    pub city: CityRules,
    pub combat: CombatRules,
    pub terrain_defense: TerrainBonus,
    pub heal: HealRules,
    /// Units one player may stack in an owned city
    pub max_stack: usize,
    pub hex_size: f64,
}

impl Default for RulesConfig {
    fn default() -> Self {
        let units = UNIT_KINDS
            .iter()
            .map(|&kind| (kind, UnitStats::standard(kind)))
            .collect();

        let mut transports = BTreeMap::new();
        transports.insert(
            UnitKind::TransportShip,
            TransportRule { capacity: 3, cargo: vec![UnitKind::Infantry, UnitKind::Tank] },
        );
        transports.insert(
            UnitKind::TransportPlane,
            TransportRule { capacity: 2, cargo: vec![UnitKind::Infantry, UnitKind::Tank] },
        );
        transports.insert(
            UnitKind::AirCarrier,
            TransportRule { capacity: 5, cargo: vec![UnitKind::Fighter] },
        );

        Self {
            units,
            transports,
            city: CityRules::default(),
            combat: CombatRules::default(),
            terrain_defense: TerrainBonus::default(),
            heal: HealRules::default(),
            max_stack: 5,
            hex_size: HEX_SIZE,
        }
    }
}

impl RulesConfig {
    /// Stats for a kind; kinds absent from the table use the standard values
    pub fn stats(&self, kind: UnitKind) -> UnitStats {
        self.units
            .get(&kind)
            .copied()
            .unwrap_or_else(|| UnitStats::standard(kind))
    }

    /// Transport rule, if this kind carries anything
    pub fn transport(&self, kind: UnitKind) -> Option<&TransportRule> {
        self.transports.get(&kind)
    }

    /// Load from JSON file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read rules file: {}", path.display()))?;
        let rules: RulesConfig = serde_json::from_str(&content)
            .with_context(|| format!("Invalid rules file: {}", path.display()))?;
        rules.validate()?;
        Ok(rules)
    }

    /// Save to JSON file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject tables the engine cannot run with
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_stack == 0 {
            anyhow::bail!("max_stack must be at least 1");
        }
        if self.city.min_hp < 1 || self.city.min_hp > self.city.max_hp {
            anyhow::bail!(
                "city min_hp {} must lie in 1..={}",
                self.city.min_hp,
                self.city.max_hp
            );
        }
        if self.combat.roll_min > self.combat.roll_max {
            anyhow::bail!("combat roll_min exceeds roll_max");
        }
        for (kind, stats) in &self.units {
            if stats.max_hp <= 0 {
                anyhow::bail!("{kind} needs positive max_hp");
            }
        }
        for (kind, rule) in &self.transports {
            if rule.cargo.contains(kind) {
                anyhow::bail!("{kind} cannot carry its own kind");
            }
        }
        Ok(())
    }
}
