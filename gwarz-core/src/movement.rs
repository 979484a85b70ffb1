//! Movement legality, reachability, fuel range and pathfinding

use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};

use rustc_hash::{FxHashMap, FxHashSet};

use crate::events::{GameEvent, LossCause};
use crate::hex::{distance, Hex};
use crate::units::{Domain, PlayerId, Unit, UnitId, UnitKind};
use crate::world::{Terrain, WorldState};

// ============================================================================
// LEGALITY
// ============================================================================

/// Terrain a unit kind may stand on
pub fn allowed_terrain(kind: UnitKind) -> &'static [Terrain] {
    match kind.domain() {
        Domain::Land => &[Terrain::Land],
        Domain::Sea => &[Terrain::Water],
        Domain::Air => &[Terrain::Water, Terrain::Land, Terrain::Mountain],
    }
}

pub fn can_traverse(kind: UnitKind, terrain: Terrain) -> bool {
    allowed_terrain(kind).contains(&terrain)
}

/// True if `owner` cannot put another unit on `hex`.
///
/// Owned cities hold up to `max_stack` units; everywhere else one unit fills the hex.
pub fn is_occupied(world: &WorldState, hex: Hex, owner: PlayerId) -> bool {
    let count = world.unit_count_at(hex);
    if world.is_friendly_city(hex, owner) {
        count >= world.rules().max_stack
    } else {
        count > 0
    }
}

/// Friendly transport at `hex` with room for `unit`, if any
pub fn loadable_transport(world: &WorldState, hex: Hex, unit: &Unit) -> Option<UnitId> {
    world
        .units_at(hex)
        .find(|t| {
            t.id != unit.id
                && t.owner == unit.owner
                && world
                    .rules()
                    .transport(t.kind)
                    .is_some_and(|rule| rule.allows(unit.kind) && world.manifest(t.id).len() < rule.capacity)
        })
        .map(|t| t.id)
}

pub fn is_loadable_transport_hex(world: &WorldState, hex: Hex, unit: &Unit) -> bool {
    loadable_transport(world, hex, unit).is_some()
}

/// How a unit may enter a hex
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Entry {
    /// Ordinary move; the unit may keep going
    Open,
    /// The unit boards this transport and stops
    Boarding(UnitId),
    /// Infantry stepping into an empty enemy city; the move ends there
    Terminal,
}

/// Per-hex legality shared by reachability, pathfinding and path walking.
/// `None` means the hex cannot be entered.
pub fn entry(world: &WorldState, unit: &Unit, hex: Hex) -> Option<Entry> {
    let terrain = world.terrain(hex)?;

    if world.is_neutral_city(hex) {
        return None;
    }
    if world
        .units_at(hex)
        .any(|u| u.owner != unit.owner && u.kind == UnitKind::AirCarrier)
    {
        return None;
    }
    if world.is_enemy_city(hex, unit.owner) {
        let open = unit.kind.can_capture() && world.unit_count_at(hex) == 0;
        return open.then_some(Entry::Terminal);
    }
    if let Some(transport) = loadable_transport(world, hex, unit) {
        return Some(Entry::Boarding(transport));
    }

    let harbour = unit.kind.is_sea()
        && world.grid().is_coastal_city(hex)
        && world.is_friendly_city(hex, unit.owner);
    let allowed = can_traverse(unit.kind, terrain) || harbour;
    (allowed && !is_occupied(world, hex, unit.owner)).then_some(Entry::Open)
}

// ============================================================================
// REACHABILITY
// ============================================================================

/// Hexes the unit can reach this turn, origin excluded
pub fn reachable(world: &WorldState, unit: &Unit) -> FxHashSet<Hex> {
    let budget = unit.step_budget();
    let mut reach = FxHashSet::default();
    let mut visited = FxHashSet::default();
    visited.insert(unit.pos);
    let mut queue = VecDeque::from([(unit.pos, 0u32)]);

    while let Some((hex, dist)) = queue.pop_front() {
        if dist >= budget {
            continue;
        }
        for next in world.grid().neighbors(hex) {
            if !visited.insert(next) {
                continue;
            }
            match entry(world, unit, next) {
                Some(Entry::Open) => {
                    reach.insert(next);
                    queue.push_back((next, dist + 1));
                }
                Some(Entry::Boarding(_) | Entry::Terminal) => {
                    reach.insert(next);
                }
                None => {}
            }
        }
    }
    reach
}

/// Hexes at exactly `fuel` steps through allowed terrain.
/// Occupancy is ignored; empty for kinds without fuel.
pub fn fuel_range(world: &WorldState, unit: &Unit) -> FxHashSet<Hex> {
    let mut border = FxHashSet::default();
    let Some(fuel) = unit.fuel else {
        return border;
    };

    let mut visited = FxHashSet::default();
    visited.insert(unit.pos);
    let mut queue = VecDeque::from([(unit.pos, 0u32)]);
    while let Some((hex, dist)) = queue.pop_front() {
        if dist == fuel {
            border.insert(hex);
            continue;
        }
        for next in world.grid().neighbors(hex) {
            let passable = world
                .terrain(next)
                .is_some_and(|t| can_traverse(unit.kind, t));
            if passable && visited.insert(next) {
                queue.push_back((next, dist + 1));
            }
        }
    }
    border
}

// ============================================================================
// PATHFINDING
// ============================================================================

#[derive(Copy, Clone, Eq, PartialEq)]
struct Frontier {
    hex: Hex,
    cost: u32,
    priority: u32,
}

// Min-heap on priority, then cost
impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.cost.cmp(&self.cost))
            .then_with(|| self.hex.cmp(&other.hex))
    }
}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Shortest legal path from `start` to `goal` for `unit`, ignoring this
/// turn's movement budget. The result excludes `start` and ends at `goal`.
///
/// Boarding and terminal hexes are only allowed as the goal.
pub fn find_path(world: &WorldState, unit: &Unit, start: Hex, goal: Hex) -> Option<Vec<Hex>> {
    if start == goal || entry(world, unit, goal).is_none() {
        return None;
    }

    let mut open_set = BinaryHeap::new();
    let mut came_from: FxHashMap<Hex, Hex> = FxHashMap::default();
    let mut g_score: FxHashMap<Hex, u32> = FxHashMap::default();
    let mut closed: FxHashSet<Hex> = FxHashSet::default();

    g_score.insert(start, 0);
    open_set.push(Frontier { hex: start, cost: 0, priority: distance(start, goal) });

    while let Some(Frontier { hex: current, cost, .. }) = open_set.pop() {
        if !closed.insert(current) {
            continue;
        }
        if current == goal {
            let mut path = vec![current];
            let mut curr = current;
            while let Some(&prev) = came_from.get(&curr) {
                if prev == start {
                    break;
                }
                path.push(prev);
                curr = prev;
            }
            path.reverse();
            return Some(path);
        }

        for next in world.grid().neighbors(current) {
            if closed.contains(&next) {
                continue;
            }
            match entry(world, unit, next) {
                Some(Entry::Open) => {}
                Some(_) if next == goal => {}
                _ => continue,
            }
            let tentative = cost + 1;
            if tentative < g_score.get(&next).copied().unwrap_or(u32::MAX) {
                came_from.insert(next, current);
                g_score.insert(next, tentative);
                open_set.push(Frontier {
                    hex: next,
                    cost: tentative,
                    priority: tentative + distance(next, goal),
                });
            }
        }
    }
    None
}

// ============================================================================
// PATH WALKING
// ============================================================================

/// Result of a single step along a unit's pending path
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    Moved { to: Hex },
    /// Stepped onto a transport and is now cargo
    Boarded { transport: UnitId, at: Hex },
    /// Infantry walked into an empty enemy city
    Captured { city: Hex },
    /// Ran out of fuel and was removed with its cargo
    Crashed { at: Hex },
    /// Next hex is illegal; the path was discarded
    Blocked { at: Hex },
    /// No pending path (or the unit is gone)
    Idle,
    /// Path remains but the budget is spent for this turn
    OutOfMoves,
}

impl StepOutcome {
    /// Walking may continue after this step
    pub fn continues(&self) -> bool {
        matches!(self, StepOutcome::Moved { .. })
    }
}

/// Every step taken by one advance
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MoveReport {
    pub steps: Vec<StepOutcome>,
}

impl MoveReport {
    /// Hexes actually entered
    pub fn hexes_entered(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| {
                matches!(
                    s,
                    StepOutcome::Moved { .. }
                        | StepOutcome::Boarded { .. }
                        | StepOutcome::Captured { .. }
                        | StepOutcome::Crashed { .. }
                )
            })
            .count()
    }

    pub fn last(&self) -> Option<StepOutcome> {
        self.steps.last().copied()
    }
}

fn discard_path(world: &mut WorldState, id: UnitId, events: &mut Vec<GameEvent>) {
    if let Some(unit) = world.unit_mut(id) {
        if unit.path.take().is_some() {
            events.push(GameEvent::PathDiscarded { unit: id, at: unit.pos });
        }
    }
}

/// Take exactly one step of the unit's pending path.
///
/// The world is consistent after every call, so a caller may stop between steps.
pub fn step_along_path(world: &mut WorldState, id: UnitId, events: &mut Vec<GameEvent>) -> StepOutcome {
    let Some(unit) = world.unit(id) else {
        return StepOutcome::Idle;
    };
    let Some(next) = unit.path.as_ref().and_then(|p| p.front().copied()) else {
        if let Some(unit) = world.unit_mut(id) {
            unit.path = None;
        }
        return StepOutcome::Idle;
    };
    if unit.step_budget() == 0 {
        return StepOutcome::OutOfMoves;
    }

    let from = unit.pos;
    let owner = unit.owner;
    let kind = unit.kind;
    let how = if from.distance_to(next) == 1 { entry(world, unit, next) } else { None };
    let Some(how) = how else {
        tracing::debug!("{} {} blocked at {} -> {}", kind, id, from, next);
        discard_path(world, id, events);
        return StepOutcome::Blocked { at: next };
    };

    let out_of_fuel = {
        let Some(unit) = world.unit_mut(id) else {
            return StepOutcome::Idle;
        };
        unit.pos = next;
        if let Some(path) = unit.path.as_mut() {
            path.pop_front();
            if path.is_empty() {
                unit.path = None;
            }
        }
        unit.movement_left = unit.movement_left.saturating_sub(1);
        unit.moved = true;
        if let Some(fuel) = unit.fuel.as_mut() {
            *fuel = fuel.saturating_sub(1);
        }
        unit.fuel == Some(0)
    };
    world.sync_cargo(id, next);
    if kind == UnitKind::AirCarrier {
        refuel_cargo(world, id);
    }
    tracing::debug!("{} {} moved {} -> {}", kind, id, from, next);
    events.push(GameEvent::UnitMoved { unit: id, from, to: next });

    if out_of_fuel {
        tracing::warn!("{} {} of {} ran out of fuel at {}", kind, id, owner, next);
        world.remove_unit(id, LossCause::OutOfFuel, events);
        return StepOutcome::Crashed { at: next };
    }

    match how {
        Entry::Open => StepOutcome::Moved { to: next },
        Entry::Boarding(transport) => {
            world.stow(transport, id);
            events.push(GameEvent::UnitLoaded { unit: id, transport });
            StepOutcome::Boarded { transport, at: next }
        }
        Entry::Terminal => {
            if let Some(unit) = world.unit_mut(id) {
                unit.path = None;
            }
            world.capture_city(next, owner, Some(id), false, events);
            StepOutcome::Captured { city: next }
        }
    }
}

/// Walk the pending path until it ends, is blocked, or the budget runs out
pub fn advance_along_path(world: &mut WorldState, id: UnitId, events: &mut Vec<GameEvent>) -> MoveReport {
    let mut report = MoveReport::default();
    loop {
        let outcome = step_along_path(world, id, events);
        report.steps.push(outcome);
        if !outcome.continues() {
            break;
        }
    }
    report
}

/// Top up every fighter carried by a carrier
pub(crate) fn refuel_cargo(world: &mut WorldState, carrier: UnitId) {
    let rules = world.rules().clone();
    if let Some(cargo) = world.manifest_mut(carrier) {
        for unit in cargo.iter_mut().filter(|u| u.kind.is_fuel_limited()) {
            unit.fuel = Some(rules.stats(unit.kind).max_fuel);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RulesConfig;
    use crate::world::WorldGrid;
    use proptest::prelude::*;

    const P0: PlayerId = PlayerId(0);
    const P1: PlayerId = PlayerId(1);

    fn world(rows: &[&str], cities: &[Hex]) -> WorldState {
        let grid = WorldGrid::from_rows(rows, cities).unwrap();
        WorldState::new(grid, RulesConfig::default())
    }

    fn unit(world: &WorldState, id: UnitId) -> &Unit {
        world.unit(id).unwrap()
    }

    #[test]
    fn test_allowed_terrain() {
        assert_eq!(allowed_terrain(UnitKind::Tank), &[Terrain::Land]);
        assert_eq!(allowed_terrain(UnitKind::Cruiser), &[Terrain::Water]);
        assert_eq!(allowed_terrain(UnitKind::Fighter).len(), 3);
    }

    #[test]
    fn test_occupied_respects_stack_limit() {
        let mut w = world(&["###"], &[Hex::new(1, 0)]);
        w.set_city_owner(Hex::new(1, 0), Some(P0));
        for _ in 0..4 {
            w.spawn_unit(UnitKind::Infantry, P0, Hex::new(1, 0));
        }
        assert!(!is_occupied(&w, Hex::new(1, 0), P0));
        w.spawn_unit(UnitKind::Infantry, P0, Hex::new(1, 0));
        assert!(is_occupied(&w, Hex::new(1, 0), P0));
        // The enemy sees any garrison as occupied
        assert!(is_occupied(&w, Hex::new(1, 0), P1));

        w.spawn_unit(UnitKind::Tank, P0, Hex::new(0, 0));
        assert!(is_occupied(&w, Hex::new(0, 0), P0));
        assert!(!is_occupied(&w, Hex::new(2, 0), P0));
    }

    #[test]
    fn test_reachable_tank_budget() {
        let mut w = world(&["#####", "#####"], &[]);
        let tank = w.spawn_unit(UnitKind::Tank, P0, Hex::new(0, 0));
        let reach = reachable(&w, unit(&w, tank));
        assert!(!reach.contains(&Hex::new(0, 0)));
        assert!(reach.contains(&Hex::new(2, 0)));
        assert!(!reach.contains(&Hex::new(3, 0)));
        assert!(reach.iter().all(|h| h.distance_to(Hex::new(0, 0)) <= 2));
    }

    #[test]
    fn test_reachable_blocked_by_water_and_units() {
        let mut w = world(&["#.##"], &[]);
        let tank = w.spawn_unit(UnitKind::Tank, P0, Hex::new(0, 0));
        assert!(reachable(&w, unit(&w, tank)).is_empty());

        let mut w = world(&["###"], &[]);
        let tank = w.spawn_unit(UnitKind::Tank, P0, Hex::new(0, 0));
        w.spawn_unit(UnitKind::Infantry, P1, Hex::new(1, 0));
        assert!(reachable(&w, unit(&w, tank)).is_empty());
    }

    #[test]
    fn test_neutral_city_and_enemy_city() {
        // Row of land with a neutral city in the middle
        let mut w = world(&["#####"], &[Hex::new(2, 0)]);
        let inf = w.spawn_unit(UnitKind::Infantry, P0, Hex::new(1, 0));
        let tank = w.spawn_unit(UnitKind::Tank, P0, Hex::new(3, 0));
        assert!(!reachable(&w, unit(&w, inf)).contains(&Hex::new(2, 0)));
        assert!(!reachable(&w, unit(&w, tank)).contains(&Hex::new(2, 0)));

        w.set_city_owner(Hex::new(2, 0), Some(P1));
        // Infantry may step in to capture; tanks may not
        assert_eq!(entry(&w, unit(&w, inf), Hex::new(2, 0)), Some(Entry::Terminal));
        assert!(reachable(&w, unit(&w, inf)).contains(&Hex::new(2, 0)));
        assert!(!reachable(&w, unit(&w, tank)).contains(&Hex::new(2, 0)));
    }

    #[test]
    fn test_enemy_city_is_terminal() {
        let mut w = world(&["####"], &[Hex::new(1, 0)]);
        w.set_city_owner(Hex::new(1, 0), Some(P1));
        let inf = w.spawn_unit(UnitKind::Infantry, P0, Hex::new(0, 0));
        w.unit_mut(inf).unwrap().movement_left = 3;
        let reach = reachable(&w, unit(&w, inf));
        assert!(reach.contains(&Hex::new(1, 0)));
        assert!(!reach.contains(&Hex::new(2, 0)));
    }

    #[test]
    fn test_enemy_carrier_never_enterable() {
        let mut w = world(&["..."], &[]);
        let fighter = w.spawn_unit(UnitKind::Fighter, P0, Hex::new(0, 0));
        w.spawn_unit(UnitKind::AirCarrier, P1, Hex::new(1, 0));
        assert_eq!(entry(&w, unit(&w, fighter), Hex::new(1, 0)), None);

        let own = w.spawn_unit(UnitKind::AirCarrier, P0, Hex::new(2, 0));
        assert_eq!(entry(&w, unit(&w, fighter), Hex::new(2, 0)), Some(Entry::Boarding(own)));
    }

    #[test]
    fn test_ship_loadable_while_it_has_room() {
        //   r=0  ##...
        let mut w = world(&["##..."], &[]);
        let inf = w.spawn_unit(UnitKind::Infantry, P0, Hex::new(1, 0));
        let near = w.spawn_unit(UnitKind::TransportShip, P0, Hex::new(2, 0));
        let far = w.spawn_unit(UnitKind::TransportShip, P0, Hex::new(4, 0));
        w.spawn_unit(UnitKind::TransportShip, P1, Hex::new(3, 0));
        assert!(is_loadable_transport_hex(&w, Hex::new(2, 0), unit(&w, inf)));
        assert_eq!(loadable_transport(&w, Hex::new(4, 0), unit(&w, inf)), Some(far));
        assert!(!is_loadable_transport_hex(&w, Hex::new(3, 0), unit(&w, inf)));
        assert_eq!(loadable_transport(&w, Hex::new(2, 0), unit(&w, inf)), Some(near));

        // A full ship no longer qualifies
        for _ in 0..3 {
            let extra = w.spawn_unit(UnitKind::Infantry, P0, Hex::new(0, 0));
            w.stow(near, extra);
        }
        assert!(!is_loadable_transport_hex(&w, Hex::new(2, 0), unit(&w, inf)));
    }

    #[test]
    fn test_sea_unit_enters_own_coastal_city() {
        let mut w = world(&["..#"], &[Hex::new(2, 0)]);
        let ship = w.spawn_unit(UnitKind::Destroyer, P0, Hex::new(0, 0));
        assert!(!reachable(&w, unit(&w, ship)).contains(&Hex::new(2, 0)));
        w.set_city_owner(Hex::new(2, 0), Some(P0));
        assert!(reachable(&w, unit(&w, ship)).contains(&Hex::new(2, 0)));
    }

    #[test]
    fn test_fuel_range_border() {
        let mut w = world(&["......", "......"], &[]);
        let fighter = w.spawn_unit(UnitKind::Fighter, P0, Hex::new(0, 0));
        w.unit_mut(fighter).unwrap().fuel = Some(2);
        let border = fuel_range(&w, unit(&w, fighter));
        assert!(!border.is_empty());
        assert!(border.iter().all(|h| h.distance_to(Hex::new(0, 0)) == 2));

        let ship = w.spawn_unit(UnitKind::Destroyer, P0, Hex::new(5, 1));
        assert!(fuel_range(&w, unit(&w, ship)).is_empty());
    }

    #[test]
    fn test_find_path_around_water() {
        //   q: 01234
        // r=0  #.###
        // r=1  ###..
        let mut w = world(&["#.###", "###.."], &[]);
        let tank = w.spawn_unit(UnitKind::Tank, P0, Hex::new(0, 0));
        let path = find_path(&w, unit(&w, tank), Hex::new(0, 0), Hex::new(2, 0)).unwrap();
        assert_eq!(path.last(), Some(&Hex::new(2, 0)));
        assert!(!path.contains(&Hex::new(0, 0)));
        // The only two-step route crosses water
        assert_eq!(path.len(), 3);
        assert!(path.iter().all(|&h| w.terrain(h) == Some(Terrain::Land)));
    }

    #[test]
    fn test_find_path_none_cases() {
        let mut w = world(&["#.#"], &[]);
        let tank = w.spawn_unit(UnitKind::Tank, P0, Hex::new(0, 0));
        let u = unit(&w, tank);
        assert_eq!(find_path(&w, u, Hex::new(0, 0), Hex::new(0, 0)), None);
        assert_eq!(find_path(&w, u, Hex::new(0, 0), Hex::new(1, 0)), None);
        assert_eq!(find_path(&w, u, Hex::new(0, 0), Hex::new(2, 0)), None);
        assert_eq!(find_path(&w, u, Hex::new(0, 0), Hex::new(9, 9)), None);
    }

    #[test]
    fn test_walk_stops_at_budget_and_resumes() {
        let mut w = world(&["#####"], &[]);
        let tank = w.spawn_unit(UnitKind::Tank, P0, Hex::new(0, 0));
        let path = find_path(&w, unit(&w, tank), Hex::new(0, 0), Hex::new(4, 0)).unwrap();
        w.unit_mut(tank).unwrap().path = Some(path.into());

        let mut events = Vec::new();
        let report = advance_along_path(&mut w, tank, &mut events);
        assert_eq!(report.hexes_entered(), 2);
        assert_eq!(report.last(), Some(StepOutcome::OutOfMoves));
        assert_eq!(unit(&w, tank).pos, Hex::new(2, 0));
        assert!(unit(&w, tank).has_path());

        w.unit_mut(tank).unwrap().movement_left = 2;
        let report = advance_along_path(&mut w, tank, &mut events);
        assert_eq!(report.last(), Some(StepOutcome::Idle));
        assert_eq!(unit(&w, tank).pos, Hex::new(4, 0));
        assert!(unit(&w, tank).path.is_none());
    }

    #[test]
    fn test_blocked_step_discards_path() {
        let mut w = world(&["####"], &[]);
        let tank = w.spawn_unit(UnitKind::Tank, P0, Hex::new(0, 0));
        w.unit_mut(tank).unwrap().path = Some([Hex::new(1, 0), Hex::new(2, 0)].into());
        w.spawn_unit(UnitKind::Infantry, P1, Hex::new(1, 0));

        let mut events = Vec::new();
        assert_eq!(step_along_path(&mut w, tank, &mut events), StepOutcome::Blocked { at: Hex::new(1, 0) });
        assert!(unit(&w, tank).path.is_none());
        assert_eq!(unit(&w, tank).pos, Hex::new(0, 0));
        assert!(matches!(events[0], GameEvent::PathDiscarded { .. }));
    }

    #[test]
    fn test_fighter_crashes_when_fuel_runs_out() {
        let mut w = world(&["....."], &[]);
        let fighter = w.spawn_unit(UnitKind::Fighter, P0, Hex::new(0, 0));
        w.unit_mut(fighter).unwrap().fuel = Some(2);
        w.unit_mut(fighter).unwrap().path = Some([Hex::new(1, 0), Hex::new(2, 0), Hex::new(3, 0)].into());

        let mut events = Vec::new();
        let report = advance_along_path(&mut w, fighter, &mut events);
        assert_eq!(report.last(), Some(StepOutcome::Crashed { at: Hex::new(2, 0) }));
        assert!(w.unit(fighter).is_none());
        assert!(events.iter().any(|e| matches!(
            e,
            GameEvent::UnitDestroyed { cause: LossCause::OutOfFuel, .. }
        )));
    }

    #[test]
    fn test_walk_onto_transport_boards() {
        let mut w = world(&["##.."], &[]);
        let inf = w.spawn_unit(UnitKind::Infantry, P0, Hex::new(1, 0));
        let ship = w.spawn_unit(UnitKind::TransportShip, P0, Hex::new(2, 0));
        let path = find_path(&w, unit(&w, inf), Hex::new(1, 0), Hex::new(2, 0)).unwrap();
        w.unit_mut(inf).unwrap().path = Some(path.into());

        let mut events = Vec::new();
        let report = advance_along_path(&mut w, inf, &mut events);
        assert_eq!(report.last(), Some(StepOutcome::Boarded { transport: ship, at: Hex::new(2, 0) }));
        assert!(w.unit(inf).is_none());
        assert_eq!(w.manifest(ship)[0].movement_left, 0);
    }

    #[test]
    fn test_carrier_step_refuels_fighters() {
        let mut w = world(&["..."], &[]);
        let carrier = w.spawn_unit(UnitKind::AirCarrier, P0, Hex::new(0, 0));
        let fighter = w.spawn_unit(UnitKind::Fighter, P0, Hex::new(0, 0));
        w.unit_mut(fighter).unwrap().fuel = Some(4);
        w.stow(carrier, fighter);
        w.unit_mut(carrier).unwrap().path = Some([Hex::new(1, 0)].into());

        let mut events = Vec::new();
        step_along_path(&mut w, carrier, &mut events);
        let cargo = w.manifest(carrier);
        assert_eq!(cargo[0].fuel, Some(30));
        assert_eq!(cargo[0].pos, Hex::new(1, 0));
    }

    #[test]
    fn test_infantry_walks_into_empty_enemy_city() {
        let mut w = world(&["###"], &[Hex::new(1, 0)]);
        w.set_city_owner(Hex::new(1, 0), Some(P1));
        let inf = w.spawn_unit(UnitKind::Infantry, P0, Hex::new(0, 0));
        w.unit_mut(inf).unwrap().path = Some([Hex::new(1, 0)].into());

        let mut events = Vec::new();
        let outcome = step_along_path(&mut w, inf, &mut events);
        assert_eq!(outcome, StepOutcome::Captured { city: Hex::new(1, 0) });
        assert_eq!(w.city_owner(Hex::new(1, 0)), Some(P0));
        assert!(w.unit(inf).is_some());
    }

    // Shortest step count under the legality predicate, by plain BFS
    fn bfs_steps(w: &WorldState, u: &Unit, goal: Hex) -> Option<usize> {
        let mut seen = FxHashSet::default();
        seen.insert(u.pos);
        let mut queue = VecDeque::from([(u.pos, 0usize)]);
        while let Some((hex, d)) = queue.pop_front() {
            for next in w.grid().neighbors(hex) {
                if next == goal && entry(w, u, next).is_some() {
                    return Some(d + 1);
                }
                if entry(w, u, next) == Some(Entry::Open) && seen.insert(next) {
                    queue.push_back((next, d + 1));
                }
            }
        }
        None
    }

    fn arb_rows() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec(
            prop::collection::vec(prop::sample::select(vec!['#', '#', '#', '.']), 6)
                .prop_map(|cells| cells.into_iter().collect::<String>()),
            6,
        )
    }

    proptest! {
        #[test]
        fn prop_reachable_respects_terrain(rows in arb_rows(), move_budget in 1..5u32) {
            let grid = WorldGrid::from_rows(&rows, &[]).unwrap();
            let mut w = WorldState::new(grid, RulesConfig::default());
            let start = Hex::new(0, 0);
            prop_assume!(w.terrain(start) == Some(Terrain::Land));
            let tank = w.spawn_unit(UnitKind::Tank, P0, start);
            w.unit_mut(tank).unwrap().movement_left = move_budget;
            let u = w.unit(tank).unwrap();
            for hex in reachable(&w, u) {
                prop_assert_eq!(w.terrain(hex), Some(Terrain::Land));
                prop_assert!(hex.distance_to(start) <= move_budget);
            }
        }

        #[test]
        fn prop_find_path_is_shortest(rows in arb_rows(), gq in 0..6i32, gr in 0..6i32) {
            let grid = WorldGrid::from_rows(&rows, &[]).unwrap();
            let mut w = WorldState::new(grid, RulesConfig::default());
            let start = Hex::new(0, 0);
            let goal = Hex::new(gq, gr);
            prop_assume!(w.terrain(start) == Some(Terrain::Land));
            let tank = w.spawn_unit(UnitKind::Tank, P0, start);
            let u = w.unit(tank).unwrap();
            let path = find_path(&w, u, start, goal);
            let expected = if goal == start { None } else { bfs_steps(&w, u, goal) };
            prop_assert_eq!(path.as_ref().map(Vec::len), expected);
            if let Some(path) = path {
                prop_assert!(path.len() as u32 >= distance(start, goal));
                let mut prev = start;
                for hex in path {
                    prop_assert_eq!(prev.distance_to(hex), 1);
                    prev = hex;
                }
            }
        }
    }
}
