//! Unit kinds, identifiers and the unit record

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::hex::Hex;
use crate::rules::RulesConfig;

/// Where a unit kind is allowed to travel
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Domain {
    Land,
    Sea,
    Air,
}

/// Unit kind
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UnitKind {
    Infantry,
    Tank,
    Fighter,
    TransportPlane,
    TransportShip,
    Destroyer,
    Cruiser,
    AirCarrier,
}

/// All unit kinds, in production-menu order
pub const UNIT_KINDS: [UnitKind; 8] = [
    UnitKind::Infantry,
    UnitKind::Tank,
    UnitKind::Fighter,
    UnitKind::TransportPlane,
    UnitKind::TransportShip,
    UnitKind::Destroyer,
    UnitKind::Cruiser,
    UnitKind::AirCarrier,
];

impl UnitKind {
    pub fn name(self) -> &'static str {
        match self {
            UnitKind::Infantry => "Infantry",
            UnitKind::Tank => "Tank",
            UnitKind::Fighter => "Fighter",
            UnitKind::TransportPlane => "TransportPlane",
            UnitKind::TransportShip => "TransportShip",
            UnitKind::Destroyer => "Destroyer",
            UnitKind::Cruiser => "Cruiser",
            UnitKind::AirCarrier => "AirCarrier",
        }
    }

    /// Single-character map label
    pub fn digit(self) -> char {
        match self {
            UnitKind::Infantry => '1',
            UnitKind::Tank => '2',
            UnitKind::Fighter => '3',
            UnitKind::TransportPlane => '4',
            UnitKind::TransportShip => '5',
            UnitKind::Destroyer => '6',
            UnitKind::Cruiser => '7',
            UnitKind::AirCarrier => '8',
        }
    }

    pub fn domain(self) -> Domain {
        match self {
            UnitKind::Infantry | UnitKind::Tank => Domain::Land,
            UnitKind::Fighter | UnitKind::TransportPlane => Domain::Air,
            UnitKind::TransportShip
            | UnitKind::Destroyer
            | UnitKind::Cruiser
            | UnitKind::AirCarrier => Domain::Sea,
        }
    }

    pub fn is_land(self) -> bool {
        self.domain() == Domain::Land
    }

    pub fn is_sea(self) -> bool {
        self.domain() == Domain::Sea
    }

    /// Kinds whose movement is capped by fuel and that crash at zero
    pub fn is_fuel_limited(self) -> bool {
        self.domain() == Domain::Air
    }

    /// Only infantry can take cities
    pub fn can_capture(self) -> bool {
        self == UnitKind::Infantry
    }

    /// Aircraft and carriers cannot be put on sentry duty
    pub fn can_sentry(self) -> bool {
        !self.is_fuel_limited() && self != UnitKind::AirCarrier
    }

    pub fn from_name(name: &str) -> Option<UnitKind> {
        UNIT_KINDS
            .iter()
            .copied()
            .find(|k| k.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Stable unit identifier, assigned at creation and never reused
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId(pub u32);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Player identifier (index into the turn rotation)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub u8);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// A unit on the map or inside a transport
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    pub kind: UnitKind,
    pub owner: PlayerId,
    pub pos: Hex,
    pub hp: i32,
    pub max_hp: i32,
    pub attack: i32,
    pub defense: i32,
    pub range: u32,
    pub movement_left: u32,
    /// Present only for fuel-limited kinds
    pub fuel: Option<u32>,
    /// Moved since the last upkeep; blocks healing
    pub moved: bool,
    pub sentry: bool,
    /// Remaining hexes of a multi-turn order
    pub path: Option<VecDeque<Hex>>,
}

impl Unit {
    /// Fresh unit with full stats and a full movement budget
    pub fn new(id: UnitId, kind: UnitKind, owner: PlayerId, pos: Hex, rules: &RulesConfig) -> Self {
        let stats = rules.stats(kind);
        Self {
            id,
            kind,
            owner,
            pos,
            hp: stats.max_hp,
            max_hp: stats.max_hp,
            attack: stats.attack,
            defense: stats.defense,
            range: stats.range,
            movement_left: stats.movement,
            fuel: if kind.is_fuel_limited() { Some(stats.max_fuel) } else { None },
            moved: false,
            sentry: false,
            path: None,
        }
    }

    /// Hexes this unit may still travel this turn (fuel caps aircraft)
    pub fn step_budget(&self) -> u32 {
        match self.fuel {
            Some(fuel) => self.movement_left.min(fuel),
            None => self.movement_left,
        }
    }

    pub fn has_path(&self) -> bool {
        self.path.as_ref().is_some_and(|p| !p.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_lookup() {
        assert_eq!(UnitKind::from_name("Infantry"), Some(UnitKind::Infantry));
        assert_eq!(UnitKind::from_name("aircarrier"), Some(UnitKind::AirCarrier));
        assert_eq!(UnitKind::from_name("Zeppelin"), None);
    }

    #[test]
    fn test_domains() {
        for kind in UNIT_KINDS {
            match kind {
                UnitKind::Infantry | UnitKind::Tank => assert!(kind.is_land(), "{kind} should be land"),
                UnitKind::Fighter | UnitKind::TransportPlane => assert!(kind.is_fuel_limited(), "{kind} should need fuel"),
                _ => assert!(kind.is_sea(), "{kind} should be sea"),
            }
        }
    }

    #[test]
    fn test_new_unit_has_full_stats() {
        let rules = RulesConfig::default();
        let fighter = Unit::new(UnitId(7), UnitKind::Fighter, PlayerId(1), Hex::new(0, 0), &rules);
        assert_eq!(fighter.hp, 20);
        assert_eq!(fighter.movement_left, 3);
        assert_eq!(fighter.fuel, Some(30));

        let tank = Unit::new(UnitId(8), UnitKind::Tank, PlayerId(1), Hex::new(0, 0), &rules);
        assert_eq!(tank.fuel, None);
        assert_eq!(tank.step_budget(), 2);
    }

    #[test]
    fn test_step_budget_capped_by_fuel() {
        let rules = RulesConfig::default();
        let mut plane = Unit::new(UnitId(1), UnitKind::TransportPlane, PlayerId(0), Hex::new(0, 0), &rules);
        plane.fuel = Some(2);
        assert_eq!(plane.step_budget(), 2);
    }
}
