//! World grid (immutable map) and world state (units, cities, manifests)

use std::collections::BTreeMap;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::events::{GameEvent, LossCause};
use crate::hex::Hex;
use crate::rules::RulesConfig;
use crate::units::{PlayerId, Unit, UnitId, UnitKind};

// ============================================================================
// TERRAIN AND GRID
// ============================================================================

/// Terrain of a single hex
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Terrain {
    Water,
    Land,
    Mountain,
}

impl Terrain {
    /// Map character: `.` water, `#` land, `^` mountain
    pub fn from_char(ch: char) -> Option<Terrain> {
        match ch {
            '.' | '~' => Some(Terrain::Water),
            '#' => Some(Terrain::Land),
            '^' => Some(Terrain::Mountain),
            _ => None,
        }
    }
}

/// Error building a grid from map rows
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MapError {
    #[error("unknown terrain character {ch:?} at row {row}, column {col}")]
    UnknownTerrain { ch: char, row: usize, col: usize },
    #[error("city at {0} is not on the map")]
    CityOffMap(Hex),
    #[error("city at {0} is on water")]
    CityOnWater(Hex),
}

/// The map: valid hexes, terrain, city sites and which of them are coastal.
/// Fixed for the whole game once built.
#[derive(Clone, Debug, Default)]
pub struct WorldGrid {
    hexes: FxHashSet<Hex>,
    terrain: FxHashMap<Hex, Terrain>,
    cities: Vec<Hex>,
    city_set: FxHashSet<Hex>,
    coastal: FxHashSet<Hex>,
}

impl WorldGrid {
    /// Build from a terrain lookup and a list of city sites
    pub fn new(terrain: FxHashMap<Hex, Terrain>, cities: &[Hex]) -> Result<Self, MapError> {
        let mut grid = Self {
            hexes: terrain.keys().copied().collect(),
            terrain,
            ..Self::default()
        };
        for &city in cities {
            grid.add_city(city)?;
        }
        Ok(grid)
    }

    /// Build from ASCII rows: row index is `r`, column index is `q`.
    /// Spaces are holes in the map.
    pub fn from_rows<S: AsRef<str>>(rows: &[S], cities: &[Hex]) -> Result<Self, MapError> {
        let mut terrain = FxHashMap::default();
        for (row, line) in rows.iter().enumerate() {
            for (col, ch) in line.as_ref().chars().enumerate() {
                if ch == ' ' {
                    continue;
                }
                let t = Terrain::from_char(ch).ok_or(MapError::UnknownTerrain { ch, row, col })?;
                terrain.insert(Hex::new(col as i32, row as i32), t);
            }
        }
        Self::new(terrain, cities)
    }

    fn add_city(&mut self, hex: Hex) -> Result<(), MapError> {
        match self.terrain.get(&hex) {
            None => return Err(MapError::CityOffMap(hex)),
            Some(Terrain::Water) => return Err(MapError::CityOnWater(hex)),
            Some(_) => {}
        }
        if self.city_set.insert(hex) {
            self.cities.push(hex);
            if hex.neighbors(&self.hexes).any(|n| self.terrain.get(&n) == Some(&Terrain::Water)) {
                self.coastal.insert(hex);
            }
        }
        Ok(())
    }

    pub fn contains(&self, hex: Hex) -> bool {
        self.hexes.contains(&hex)
    }

    pub fn hexes(&self) -> &FxHashSet<Hex> {
        &self.hexes
    }

    pub fn terrain(&self, hex: Hex) -> Option<Terrain> {
        self.terrain.get(&hex).copied()
    }

    /// On-map neighbors of `hex`
    pub fn neighbors(&self, hex: Hex) -> impl Iterator<Item = Hex> + '_ {
        hex.neighbors(&self.hexes)
    }

    /// City sites in the order they were declared
    pub fn cities(&self) -> &[Hex] {
        &self.cities
    }

    pub fn is_city(&self, hex: Hex) -> bool {
        self.city_set.contains(&hex)
    }

    pub fn is_coastal_city(&self, hex: Hex) -> bool {
        self.coastal.contains(&hex)
    }

    /// True if any neighbor is land or mountain
    pub fn touches_land(&self, hex: Hex) -> bool {
        self.neighbors(hex)
            .any(|n| matches!(self.terrain(n), Some(Terrain::Land | Terrain::Mountain)))
    }
}

// ============================================================================
// CITIES
// ============================================================================

/// Production order of a city
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Production {
    pub unit: Option<UnitKind>,
    pub turns_left: u32,
}

/// Mutable state of a city
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityState {
    /// `None` for neutral cities
    pub owner: Option<PlayerId>,
    pub hp: i32,
    pub production: Production,
}

// ============================================================================
// WORLD STATE
// ============================================================================

/// Everything that changes during a game.
///
/// Units live in an arena keyed by [`UnitId`]. A unit is either active (in
/// `units`) or carried (in exactly one manifest), never both.
#[derive(Clone, Debug)]
pub struct WorldState {
    grid: WorldGrid,
    rules: RulesConfig,
    units: BTreeMap<UnitId, Unit>,
    manifests: BTreeMap<UnitId, Vec<Unit>>,
    cities: BTreeMap<Hex, CityState>,
    next_id: u32,
}

impl WorldState {
    /// All cities start neutral at full hp
    pub fn new(grid: WorldGrid, rules: RulesConfig) -> Self {
        let cities = grid
            .cities()
            .iter()
            .map(|&hex| {
                (
                    hex,
                    CityState {
                        owner: None,
                        hp: rules.city.max_hp,
                        production: Production::default(),
                    },
                )
            })
            .collect();
        Self {
            grid,
            rules,
            units: BTreeMap::new(),
            manifests: BTreeMap::new(),
            cities,
            next_id: 1,
        }
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn grid(&self) -> &WorldGrid {
        &self.grid
    }

    pub fn rules(&self) -> &RulesConfig {
        &self.rules
    }

    /// Active unit by id
    pub fn unit(&self, id: UnitId) -> Option<&Unit> {
        self.units.get(&id)
    }

    pub fn unit_mut(&mut self, id: UnitId) -> Option<&mut Unit> {
        self.units.get_mut(&id)
    }

    /// Active units in id order
    pub fn units(&self) -> impl Iterator<Item = &Unit> + '_ {
        self.units.values()
    }

    pub fn unit_ids(&self) -> Vec<UnitId> {
        self.units.keys().copied().collect()
    }

    pub fn units_at(&self, hex: Hex) -> impl Iterator<Item = &Unit> + '_ {
        self.units.values().filter(move |u| u.pos == hex)
    }

    pub fn unit_count_at(&self, hex: Hex) -> usize {
        self.units_at(hex).count()
    }

    /// Units carried by a transport, in load order
    pub fn manifest(&self, transport: UnitId) -> &[Unit] {
        self.manifests.get(&transport).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Transport currently carrying `unit`, if any
    pub fn carrier_of(&self, unit: UnitId) -> Option<UnitId> {
        self.manifests
            .iter()
            .find(|(_, cargo)| cargo.iter().any(|u| u.id == unit))
            .map(|(&transport, _)| transport)
    }

    /// Every carried unit with its transport
    pub fn loaded_units(&self) -> impl Iterator<Item = (UnitId, &Unit)> + '_ {
        self.manifests
            .iter()
            .flat_map(|(&transport, cargo)| cargo.iter().map(move |u| (transport, u)))
    }

    pub fn city(&self, hex: Hex) -> Option<&CityState> {
        self.cities.get(&hex)
    }

    pub fn city_mut(&mut self, hex: Hex) -> Option<&mut CityState> {
        self.cities.get_mut(&hex)
    }

    pub fn cities(&self) -> impl Iterator<Item = (Hex, &CityState)> + '_ {
        self.cities.iter().map(|(&hex, city)| (hex, city))
    }

    pub fn city_owner(&self, hex: Hex) -> Option<PlayerId> {
        self.cities.get(&hex).and_then(|c| c.owner)
    }

    /// City at `hex` exists and is owned by `player`
    pub fn is_friendly_city(&self, hex: Hex, player: PlayerId) -> bool {
        self.city_owner(hex) == Some(player)
    }

    /// City at `hex` exists and has no owner
    pub fn is_neutral_city(&self, hex: Hex) -> bool {
        self.cities.get(&hex).is_some_and(|c| c.owner.is_none())
    }

    /// City at `hex` is owned by somebody other than `player`
    pub fn is_enemy_city(&self, hex: Hex, player: PlayerId) -> bool {
        matches!(self.city_owner(hex), Some(owner) if owner != player)
    }

    pub fn terrain(&self, hex: Hex) -> Option<Terrain> {
        self.grid.terrain(hex)
    }

    // ========================================================================
    // SETUP
    // ========================================================================

    /// Place a new unit with full stats and movement
    pub fn spawn_unit(&mut self, kind: UnitKind, owner: PlayerId, pos: Hex) -> UnitId {
        let id = UnitId(self.next_id);
        self.next_id += 1;
        self.units.insert(id, Unit::new(id, kind, owner, pos, &self.rules));
        id
    }

    pub fn set_city_owner(&mut self, hex: Hex, owner: Option<PlayerId>) {
        if let Some(city) = self.cities.get_mut(&hex) {
            city.owner = owner;
        }
    }

    // ========================================================================
    // MUTATION
    // ========================================================================

    /// Move an active unit and drag its cargo along
    pub(crate) fn relocate(&mut self, id: UnitId, to: Hex) {
        if let Some(unit) = self.units.get_mut(&id) {
            unit.pos = to;
        }
        self.sync_cargo(id, to);
    }

    /// Keep every carried unit on its carrier's hex
    pub(crate) fn sync_cargo(&mut self, transport: UnitId, pos: Hex) {
        let Some(cargo) = self.manifests.get_mut(&transport) else {
            return;
        };
        let nested: Vec<UnitId> = cargo.iter().map(|u| u.id).collect();
        for unit in cargo.iter_mut() {
            unit.pos = pos;
        }
        for id in nested {
            self.sync_cargo(id, pos);
        }
    }

    /// Take an active unit out of play and put it in a manifest
    pub(crate) fn stow(&mut self, transport: UnitId, cargo: UnitId) -> bool {
        let Some(pos) = self.units.get(&transport).map(|t| t.pos) else {
            return false;
        };
        let Some(mut unit) = self.units.remove(&cargo) else {
            return false;
        };
        unit.pos = pos;
        unit.movement_left = 0;
        unit.path = None;
        self.manifests.entry(transport).or_default().push(unit);
        self.sync_cargo(cargo, pos);
        true
    }

    /// Take a carried unit out of a manifest and put it back in play
    pub(crate) fn disembark(&mut self, transport: UnitId, cargo: UnitId, to: Hex) -> bool {
        let Some(list) = self.manifests.get_mut(&transport) else {
            return false;
        };
        let Some(idx) = list.iter().position(|u| u.id == cargo) else {
            return false;
        };
        let mut unit = list.remove(idx);
        if list.is_empty() {
            self.manifests.remove(&transport);
        }
        unit.pos = to;
        self.units.insert(cargo, unit);
        self.sync_cargo(cargo, to);
        true
    }

    pub(crate) fn manifest_mut(&mut self, transport: UnitId) -> Option<&mut Vec<Unit>> {
        self.manifests.get_mut(&transport)
    }

    /// Remove an active unit and everything it carries
    pub(crate) fn remove_unit(&mut self, id: UnitId, cause: LossCause, events: &mut Vec<GameEvent>) -> bool {
        let Some(unit) = self.units.remove(&id) else {
            return false;
        };
        tracing::debug!("{} {} of {} removed ({:?})", unit.kind, unit.id, unit.owner, cause);
        events.push(GameEvent::UnitDestroyed {
            unit: unit.id,
            kind: unit.kind,
            owner: unit.owner,
            at: unit.pos,
            cause,
        });
        self.drop_cargo(id, events);
        true
    }

    fn drop_cargo(&mut self, transport: UnitId, events: &mut Vec<GameEvent>) {
        let Some(cargo) = self.manifests.remove(&transport) else {
            return;
        };
        for unit in cargo {
            events.push(GameEvent::UnitDestroyed {
                unit: unit.id,
                kind: unit.kind,
                owner: unit.owner,
                at: unit.pos,
                cause: LossCause::LostWithCarrier(transport),
            });
            self.drop_cargo(unit.id, events);
        }
    }

    /// Hand a city to `new_owner`, removing every other unit standing in it
    pub(crate) fn capture_city(
        &mut self,
        hex: Hex,
        new_owner: PlayerId,
        keep: Option<UnitId>,
        reset_hp: bool,
        events: &mut Vec<GameEvent>,
    ) {
        let displaced: Vec<UnitId> = self
            .units_at(hex)
            .filter(|u| Some(u.id) != keep)
            .map(|u| u.id)
            .collect();
        for id in displaced {
            self.remove_unit(id, LossCause::Displaced, events);
        }

        let max_hp = self.rules.city.max_hp;
        if let Some(city) = self.cities.get_mut(&hex) {
            let previous = city.owner;
            city.owner = Some(new_owner);
            if reset_hp {
                city.hp = max_hp;
            }
            tracing::info!("City {} captured by {}", hex, new_owner);
            events.push(GameEvent::CityCaptured {
                city: hex,
                by: new_owner,
                from: previous,
            });
        }
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    /// Player owning every city on the map, if any
    pub fn sole_city_owner(&self) -> Option<PlayerId> {
        let mut owners = self.cities.values().map(|c| c.owner);
        let first = owners.next()??;
        owners.all(|o| o == Some(first)).then_some(first)
    }

    /// Player still owns something: a city, an active unit or cargo
    pub fn has_presence(&self, player: PlayerId) -> bool {
        self.cities.values().any(|c| c.owner == Some(player))
            || self.units.values().any(|u| u.owner == player)
            || self.loaded_units().any(|(_, u)| u.owner == player)
    }

    /// Redrawable picture of the current state
    pub fn snapshot(&self) -> WorldSnapshot {
        let mut units: Vec<UnitView> = self.units.values().map(|u| UnitView::of(u, None)).collect();
        units.extend(self.loaded_units().map(|(t, u)| UnitView::of(u, Some(t))));
        WorldSnapshot {
            units,
            cities: self
                .cities
                .iter()
                .map(|(&hex, c)| CityView {
                    hex,
                    owner: c.owner,
                    hp: c.hp,
                    production: c.production,
                    coastal: self.grid.is_coastal_city(hex),
                })
                .collect(),
        }
    }
}

// ============================================================================
// SNAPSHOTS
// ============================================================================

/// One unit as the presentation layer sees it
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UnitView {
    pub id: UnitId,
    pub kind: UnitKind,
    pub owner: PlayerId,
    pub pos: Hex,
    pub hp: i32,
    pub max_hp: i32,
    pub movement_left: u32,
    pub fuel: Option<u32>,
    pub sentry: bool,
    pub carried_by: Option<UnitId>,
}

impl UnitView {
    fn of(unit: &Unit, carried_by: Option<UnitId>) -> Self {
        Self {
            id: unit.id,
            kind: unit.kind,
            owner: unit.owner,
            pos: unit.pos,
            hp: unit.hp,
            max_hp: unit.max_hp,
            movement_left: unit.movement_left,
            fuel: unit.fuel,
            sentry: unit.sentry,
            carried_by,
        }
    }
}

/// One city as the presentation layer sees it
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CityView {
    pub hex: Hex,
    pub owner: Option<PlayerId>,
    pub hp: i32,
    pub production: Production,
    pub coastal: bool,
}

/// State sufficient to redraw the board
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WorldSnapshot {
    pub units: Vec<UnitView>,
    pub cities: Vec<CityView>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_world() -> WorldState {
        //   q: 0123
        // r=0  ##..
        // r=1  ###.
        let grid = WorldGrid::from_rows(&["##..", "###."], &[Hex::new(1, 0), Hex::new(0, 1)]).unwrap();
        WorldState::new(grid, RulesConfig::default())
    }

    #[test]
    fn test_grid_from_rows() {
        let grid = WorldGrid::from_rows(&["#.^", " #"], &[]).unwrap();
        assert_eq!(grid.terrain(Hex::new(0, 0)), Some(Terrain::Land));
        assert_eq!(grid.terrain(Hex::new(1, 0)), Some(Terrain::Water));
        assert_eq!(grid.terrain(Hex::new(2, 0)), Some(Terrain::Mountain));
        assert!(!grid.contains(Hex::new(0, 1)));
        assert_eq!(grid.hexes().len(), 4);
    }

    #[test]
    fn test_grid_rejects_bad_input() {
        assert_eq!(
            WorldGrid::from_rows(&["#x"], &[]).unwrap_err(),
            MapError::UnknownTerrain { ch: 'x', row: 0, col: 1 }
        );
        assert_eq!(
            WorldGrid::from_rows(&["#."], &[Hex::new(1, 0)]).unwrap_err(),
            MapError::CityOnWater(Hex::new(1, 0))
        );
        assert_eq!(
            WorldGrid::from_rows(&["#."], &[Hex::new(5, 5)]).unwrap_err(),
            MapError::CityOffMap(Hex::new(5, 5))
        );
    }

    #[test]
    fn test_coastal_flag() {
        let world = small_world();
        // (1,0) touches water at (2,0); (0,1) is surrounded by land or holes
        assert!(world.grid().is_coastal_city(Hex::new(1, 0)));
        assert!(!world.grid().is_coastal_city(Hex::new(0, 1)));
    }

    #[test]
    fn test_cities_start_neutral() {
        let world = small_world();
        assert!(world.is_neutral_city(Hex::new(1, 0)));
        assert_eq!(world.city(Hex::new(1, 0)).map(|c| c.hp), Some(15));
        assert_eq!(world.sole_city_owner(), None);
    }

    #[test]
    fn test_stow_and_disembark_keep_partition() {
        let mut world = small_world();
        let ship = world.spawn_unit(UnitKind::TransportShip, PlayerId(0), Hex::new(2, 0));
        let inf = world.spawn_unit(UnitKind::Infantry, PlayerId(0), Hex::new(1, 0));

        assert!(world.stow(ship, inf));
        assert!(world.unit(inf).is_none());
        assert_eq!(world.manifest(ship).len(), 1);
        assert_eq!(world.manifest(ship)[0].pos, Hex::new(2, 0));
        assert_eq!(world.carrier_of(inf), Some(ship));

        world.relocate(ship, Hex::new(3, 1));
        assert_eq!(world.manifest(ship)[0].pos, Hex::new(3, 1));

        assert!(world.disembark(ship, inf, Hex::new(2, 1)));
        assert_eq!(world.unit(inf).map(|u| u.pos), Some(Hex::new(2, 1)));
        assert!(world.manifest(ship).is_empty());
        assert_eq!(world.carrier_of(inf), None);
    }

    #[test]
    fn test_remove_cascades_to_cargo() {
        let mut world = small_world();
        let ship = world.spawn_unit(UnitKind::TransportShip, PlayerId(0), Hex::new(2, 0));
        let inf = world.spawn_unit(UnitKind::Infantry, PlayerId(0), Hex::new(1, 0));
        let tank = world.spawn_unit(UnitKind::Tank, PlayerId(0), Hex::new(1, 1));
        world.stow(ship, inf);
        world.stow(ship, tank);

        let mut events = Vec::new();
        assert!(world.remove_unit(ship, LossCause::Combat, &mut events));
        assert_eq!(events.len(), 3);
        assert!(matches!(
            events[1],
            GameEvent::UnitDestroyed { unit, cause: LossCause::LostWithCarrier(t), .. } if unit == inf && t == ship
        ));
        assert_eq!(world.loaded_units().count(), 0);
        assert!(!world.has_presence(PlayerId(0)));
    }

    #[test]
    fn test_capture_city_displaces_others() {
        let mut world = small_world();
        let city = Hex::new(0, 1);
        world.set_city_owner(city, Some(PlayerId(1)));
        let defender = world.spawn_unit(UnitKind::Tank, PlayerId(1), city);
        let victor = world.spawn_unit(UnitKind::Infantry, PlayerId(0), city);

        let mut events = Vec::new();
        world.capture_city(city, PlayerId(0), Some(victor), true, &mut events);
        assert!(world.unit(defender).is_none());
        assert!(world.unit(victor).is_some());
        assert_eq!(world.city_owner(city), Some(PlayerId(0)));
    }

    #[test]
    fn test_sole_city_owner() {
        let mut world = small_world();
        world.set_city_owner(Hex::new(1, 0), Some(PlayerId(2)));
        assert_eq!(world.sole_city_owner(), None);
        world.set_city_owner(Hex::new(0, 1), Some(PlayerId(2)));
        assert_eq!(world.sole_city_owner(), Some(PlayerId(2)));
    }

    #[test]
    fn test_snapshot_lists_cargo() {
        let mut world = small_world();
        let ship = world.spawn_unit(UnitKind::TransportShip, PlayerId(0), Hex::new(2, 0));
        let inf = world.spawn_unit(UnitKind::Infantry, PlayerId(0), Hex::new(1, 0));
        world.stow(ship, inf);
        let snap = world.snapshot();
        assert_eq!(snap.units.len(), 2);
        assert_eq!(snap.units.iter().find(|u| u.id == inf).and_then(|u| u.carried_by), Some(ship));
        assert_eq!(snap.cities.len(), 2);
    }
}
