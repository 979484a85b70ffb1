//! Scenario files: initial setup for a game (map, cities, starting units)

use std::collections::VecDeque;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::game::Game;
use crate::hex::Hex;
use crate::movement;
use crate::rules::RulesConfig;
use crate::units::{PlayerId, UnitKind};
use crate::world::{Production, WorldGrid, WorldState};

/// A city on the scenario map
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CitySetup {
    pub hex: Hex,
    /// Player name; absent for neutral cities
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub production: Option<UnitKind>,
}

/// A unit present at game start
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnitSetup {
    pub kind: UnitKind,
    pub owner: String,
    pub hex: Hex,
    #[serde(default)]
    pub sentry: bool,
    /// Standing move order, followed from the owner's first turn
    #[serde(default)]
    pub goal: Option<Hex>,
    #[serde(default)]
    pub hp: Option<i32>,
    #[serde(default)]
    pub fuel: Option<u32>,
}

/// Initial setup description.
///
/// `map` rows use `.` or `~` for water, `#` for land, `^` for mountains and
/// spaces for holes. Row index is `r`, column index is `q`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub players: Vec<String>,
    pub map: Vec<String>,
    #[serde(default)]
    pub cities: Vec<CitySetup>,
    #[serde(default)]
    pub units: Vec<UnitSetup>,
}

impl Scenario {
    /// Load from JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario file: {}", path.display()))?;
        Self::from_json(&content).with_context(|| format!("Invalid scenario file: {}", path.display()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let scenario: Scenario = serde_json::from_str(json)?;
        if scenario.players.is_empty() {
            anyhow::bail!("scenario {:?} lists no players", scenario.name);
        }
        if scenario.players.len() > usize::from(u8::MAX) + 1 {
            anyhow::bail!("scenario {:?} lists {} players, at most 256 are supported", scenario.name, scenario.players.len());
        }
        Ok(scenario)
    }

    fn player(&self, name: &str) -> Result<PlayerId> {
        let seat = self
            .players
            .iter()
            .position(|p| p == name)
            .with_context(|| format!("unknown player {name:?}"))?;
        let id = u8::try_from(seat).with_context(|| format!("player {name:?} is seat {seat}, past the last id"))?;
        Ok(PlayerId(id))
    }

    /// Build the world described by this scenario
    pub fn build_world(&self, rules: RulesConfig) -> Result<WorldState> {
        let city_hexes: Vec<Hex> = self.cities.iter().map(|c| c.hex).collect();
        let grid = WorldGrid::from_rows(&self.map, &city_hexes)?;
        let mut world = WorldState::new(grid, rules);

        for city in &self.cities {
            let owner = city.owner.as_deref().map(|name| self.player(name)).transpose()?;
            world.set_city_owner(city.hex, owner);
            if let Some(kind) = city.production {
                let cost = world.rules().stats(kind).cost;
                if let Some(state) = world.city_mut(city.hex) {
                    state.production = Production { unit: Some(kind), turns_left: cost };
                }
            }
        }

        for setup in &self.units {
            if !world.grid().contains(setup.hex) {
                anyhow::bail!("{} placed off the map at {}", setup.kind, setup.hex);
            }
            let owner = self.player(&setup.owner)?;
            let id = world.spawn_unit(setup.kind, owner, setup.hex);

            let path = match setup.goal {
                Some(goal) => {
                    let unit = world.unit(id).context("spawned unit missing")?;
                    let path = movement::find_path(&world, unit, setup.hex, goal);
                    if path.is_none() {
                        tracing::warn!("{} {} has no path to {}", setup.kind, id, goal);
                    }
                    path
                }
                None => None,
            };

            if let Some(unit) = world.unit_mut(id) {
                if let Some(hp) = setup.hp {
                    unit.hp = hp.clamp(1, unit.max_hp);
                }
                if let (Some(fuel), Some(_)) = (setup.fuel, unit.fuel) {
                    unit.fuel = Some(fuel);
                }
                if setup.sentry && unit.kind.can_sentry() {
                    unit.sentry = true;
                    unit.movement_left = 0;
                }
                unit.path = path.map(VecDeque::from);
            }
        }

        tracing::debug!(
            "Scenario {:?}: {} hexes, {} cities, {} units",
            self.name,
            world.grid().hexes().len(),
            self.cities.len(),
            self.units.len()
        );
        Ok(world)
    }

    /// Build a game with ChaCha8 dice seeded from `seed`
    pub fn into_game(self, rules: RulesConfig, seed: u64) -> Result<Game> {
        let world = self.build_world(rules)?;
        Ok(Game::new(world, self.players, seed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::GameResult;
    use serde_json::json;

    fn sample() -> String {
        json!({
            "name": "strait",
            "players": ["Red", "Blue"],
            "map": ["##..##", "##..##"],
            "cities": [
                {"hex": {"q": 0, "r": 0}, "owner": "Red", "production": "Tank"},
                {"hex": {"q": 5, "r": 1}, "owner": "Blue"},
                {"hex": {"q": 1, "r": 1}}
            ],
            "units": [
                {"kind": "Infantry", "owner": "Red", "hex": {"q": 1, "r": 0}, "goal": {"q": 0, "r": 1}},
                {"kind": "Fighter", "owner": "Blue", "hex": {"q": 4, "r": 0}, "fuel": 4},
                {"kind": "Tank", "owner": "Blue", "hex": {"q": 5, "r": 0}, "sentry": true, "hp": 7}
            ]
        })
        .to_string()
    }

    #[test]
    fn test_scenario_builds_world() {
        let scenario = Scenario::from_json(&sample()).unwrap();
        let world = scenario.build_world(RulesConfig::default()).unwrap();

        assert_eq!(world.city_owner(Hex::new(0, 0)), Some(PlayerId(0)));
        assert_eq!(world.city_owner(Hex::new(5, 1)), Some(PlayerId(1)));
        assert!(world.is_neutral_city(Hex::new(1, 1)));
        let production = world.city(Hex::new(0, 0)).unwrap().production;
        assert_eq!(production.unit, Some(UnitKind::Tank));
        assert_eq!(production.turns_left, 1);

        let units: Vec<_> = world.units().collect();
        assert_eq!(units.len(), 3);
        assert!(units[0].has_path());
        assert_eq!(units[1].fuel, Some(4));
        assert!(units[2].sentry);
        assert_eq!(units[2].movement_left, 0);
        assert_eq!(units[2].hp, 7);
    }

    #[test]
    fn test_into_game() {
        let game = Scenario::from_json(&sample()).unwrap().into_game(RulesConfig::default(), 7).unwrap();
        assert_eq!(game.players().len(), 2);
        assert_eq!(game.players()[1].name, "Blue");
        assert_eq!(game.result(), GameResult::Ongoing);
    }

    #[test]
    fn test_unknown_owner_rejected() {
        let json = json!({"name": "x", "players": ["Red"], "map": ["###"],
            "units": [{"kind": "Tank", "owner": "Green", "hex": {"q": 0, "r": 0}}]});
        let err = Scenario::from_json(&json.to_string()).unwrap().build_world(RulesConfig::default()).unwrap_err();
        assert!(err.to_string().contains("Green"));
    }

    #[test]
    fn test_too_many_players_rejected() {
        let players: Vec<String> = (0..300).map(|i| format!("P{i}")).collect();
        let json = json!({"name": "crowd", "players": players, "map": ["#"]});
        let err = Scenario::from_json(&json.to_string()).unwrap_err();
        assert!(err.to_string().contains("300 players"));

        let scenario = Scenario {
            name: "crowd".into(),
            players,
            map: vec!["#".into()],
            cities: Vec::new(),
            units: Vec::new(),
        };
        assert_eq!(scenario.player("P255").unwrap(), PlayerId(255));
        let err = scenario.player("P256").unwrap_err();
        assert!(err.to_string().contains("seat 256"));
    }

    #[test]
    fn test_bad_scenarios_rejected() {
        let no_players = json!({"name": "x", "players": [], "map": ["#"]});
        assert!(Scenario::from_json(&no_players.to_string()).is_err());

        let bad_tile = json!({"name": "x", "players": ["Red"], "map": ["#x#"]});
        assert!(Scenario::from_json(&bad_tile.to_string()).unwrap().build_world(RulesConfig::default()).is_err());

        let off_map = json!({"name": "x", "players": ["Red"], "map": ["##"],
            "units": [{"kind": "Tank", "owner": "Red", "hex": {"q": 4, "r": 0}}]});
        assert!(Scenario::from_json(&off_map.to_string()).unwrap().build_world(RulesConfig::default()).is_err());
    }
}
