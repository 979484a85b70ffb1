//! Turn and ownership state machine: commands, turn rotation, upkeep, win check

use std::collections::BTreeSet;

use rand_chacha::ChaCha8Rng;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::combat::{self, BattleResult, Dice, RngDice, Target};
use crate::error::{ActionError, InvalidAction};
use crate::events::{GameEvent, LossCause};
use crate::hex::Hex;
use crate::movement::{self, MoveReport, StepOutcome};
use crate::transport;
use crate::units::{PlayerId, Unit, UnitId, UnitKind};
use crate::world::{Production, WorldState};

// ============================================================================
// CORE TYPES
// ============================================================================

/// Game result
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameResult {
    Ongoing,
    Won(PlayerId),
}

/// A seat in the turn rotation
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub eliminated: bool,
}

/// Per-player tally for summaries
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Standing {
    pub player: PlayerId,
    pub name: String,
    pub cities: usize,
    pub units: usize,
    pub eliminated: bool,
}

// ============================================================================
// GAME
// ============================================================================

/// A running game: world state, turn rotation, dice and the event log
pub struct Game<D = RngDice<ChaCha8Rng>> {
    world: WorldState,
    players: Vec<Player>,
    current: usize,
    round: u32,
    result: GameResult,
    dice: D,
    events: Vec<GameEvent>,
}

impl Game<RngDice<ChaCha8Rng>> {
    /// New game with ChaCha8 combat dice seeded from `seed`
    pub fn new(world: WorldState, names: Vec<String>, seed: u64) -> Self {
        Self::with_dice(world, names, RngDice::seeded(seed))
    }
}

impl<D: Dice> Game<D> {
    // ========================================================================
    // CONSTRUCTION
    // ========================================================================

    /// New game with the given dice. Player ids follow the order of `names`;
    /// names past the 256th have no id and are left out.
    pub fn with_dice(world: WorldState, names: Vec<String>, dice: D) -> Self {
        let players = (0..=u8::MAX)
            .map(PlayerId)
            .zip(names)
            .map(|(id, name)| Player { id, name, eliminated: false })
            .collect();
        let mut game = Self {
            world,
            players,
            current: 0,
            round: 1,
            result: GameResult::Ongoing,
            dice,
            events: Vec::new(),
        };
        if let Some(first) = game.players.first() {
            game.events.push(GameEvent::TurnStarted { player: first.id, round: 1 });
        }
        game.check_outcome();
        game
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn world(&self) -> &WorldState {
        &self.world
    }

    /// Direct world access for setting up positions
    pub fn world_mut(&mut self) -> &mut WorldState {
        &mut self.world
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn current_player(&self) -> PlayerId {
        self.players.get(self.current).map_or(PlayerId(0), |p| p.id)
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn result(&self) -> GameResult {
        self.result
    }

    pub fn winner(&self) -> Option<PlayerId> {
        match self.result {
            GameResult::Won(winner) => Some(winner),
            GameResult::Ongoing => None,
        }
    }

    pub fn is_over(&self) -> bool {
        self.result != GameResult::Ongoing
    }

    /// Events since the last [`Game::take_events`]
    pub fn events(&self) -> &[GameEvent] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn standings(&self) -> Vec<Standing> {
        self.players
            .iter()
            .map(|p| Standing {
                player: p.id,
                name: p.name.clone(),
                cities: self.world.cities().filter(|(_, c)| c.owner == Some(p.id)).count(),
                units: self.world.units().filter(|u| u.owner == p.id).count()
                    + self.world.loaded_units().filter(|(_, u)| u.owner == p.id).count(),
                eliminated: p.eliminated,
            })
            .collect()
    }

    // ========================================================================
    // GUARDS
    // ========================================================================

    fn ensure_ongoing(&self) -> Result<(), ActionError> {
        match self.result {
            GameResult::Won(winner) => Err(ActionError::GameOver { winner }),
            GameResult::Ongoing => Ok(()),
        }
    }

    /// Active unit belonging to the player to move
    fn own_unit(&self, id: UnitId) -> Result<&Unit, ActionError> {
        let unit = self.world.unit(id).ok_or(InvalidAction::UnknownUnit(id))?;
        if unit.owner != self.current_player() {
            return Err(InvalidAction::NotYourUnit { unit: id, owner: unit.owner }.into());
        }
        Ok(unit)
    }

    fn own_city(&self, hex: Hex) -> Result<(), ActionError> {
        let city = self.world.city(hex).ok_or(InvalidAction::NotACity(hex))?;
        match city.owner {
            None => Err(InvalidAction::NeutralCity(hex).into()),
            Some(owner) if owner != self.current_player() => Err(InvalidAction::NotYourCity(hex).into()),
            Some(_) => Ok(()),
        }
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    pub fn reachable(&self, id: UnitId) -> Result<FxHashSet<Hex>, ActionError> {
        let unit = self.world.unit(id).ok_or(InvalidAction::UnknownUnit(id))?;
        Ok(movement::reachable(&self.world, unit))
    }

    pub fn fuel_range(&self, id: UnitId) -> Result<FxHashSet<Hex>, ActionError> {
        let unit = self.world.unit(id).ok_or(InvalidAction::UnknownUnit(id))?;
        Ok(movement::fuel_range(&self.world, unit))
    }

    pub fn find_path(&self, id: UnitId, goal: Hex) -> Result<Vec<Hex>, ActionError> {
        let unit = self.world.unit(id).ok_or(InvalidAction::UnknownUnit(id))?;
        movement::find_path(&self.world, unit, unit.pos, goal)
            .ok_or(ActionError::NoPathFound { from: unit.pos, to: goal })
    }

    /// Hexes in range holding something this unit may attack, sorted.
    /// Neutral cities only count for units that capture.
    pub fn attackable_hexes(&self, id: UnitId) -> Result<Vec<Hex>, ActionError> {
        let unit = self.world.unit(id).ok_or(InvalidAction::UnknownUnit(id))?;
        if unit.movement_left == 0 {
            return Ok(Vec::new());
        }

        let in_range = |hex: Hex| unit.pos.distance_to(hex) <= unit.range;
        let floor = self.world.rules().city.min_hp;
        let mut hexes = BTreeSet::new();
        for other in self.world.units() {
            if other.owner != unit.owner && in_range(other.pos) {
                hexes.insert(other.pos);
            }
        }
        for (hex, city) in self.world.cities() {
            if !in_range(hex) {
                continue;
            }
            let open = match city.owner {
                None => unit.kind.can_capture(),
                Some(owner) => owner != unit.owner && (city.hp > floor || unit.kind.can_capture()),
            };
            if open {
                hexes.insert(hex);
            }
        }
        Ok(hexes.into_iter().collect())
    }

    /// Next own unit, in id order after `after`, that still has movement
    /// and is not on sentry. Wraps around.
    pub fn next_movable(&self, after: Option<UnitId>) -> Option<UnitId> {
        let player = self.current_player();
        let movable: Vec<UnitId> = self
            .world
            .units()
            .filter(|u| u.owner == player && u.movement_left > 0 && !u.sentry)
            .map(|u| u.id)
            .collect();
        let first = movable.first().copied();
        let Some(after) = after else {
            return first;
        };
        match movable.iter().position(|&id| id == after) {
            Some(idx) => movable.get((idx + 1) % movable.len()).copied(),
            None => movable.iter().copied().find(|&id| id > after).or(first),
        }
    }

    // ========================================================================
    // UNIT COMMANDS
    // ========================================================================

    /// Plan a path to `goal`, store it as the unit's orders and start walking.
    /// Orders longer than this turn's budget carry over to later turns.
    pub fn order_move(&mut self, id: UnitId, goal: Hex) -> Result<MoveReport, ActionError> {
        self.ensure_ongoing()?;
        let unit = self.own_unit(id)?;
        let path = movement::find_path(&self.world, unit, unit.pos, goal)
            .ok_or(ActionError::NoPathFound { from: unit.pos, to: goal })?;
        if let Some(fuel) = unit.fuel {
            if path.len() > fuel as usize {
                return Err(InvalidAction::InsufficientFuel { unit: id, needed: path.len(), fuel }.into());
            }
        }

        tracing::debug!("{} ordered to {} ({} steps)", id, goal, path.len());
        if let Some(unit) = self.world.unit_mut(id) {
            unit.path = Some(path.into());
            unit.sentry = false;
        }
        self.advance_unit_along_path(id)
    }

    /// Walk the unit's pending path as far as this turn allows
    pub fn advance_unit_along_path(&mut self, id: UnitId) -> Result<MoveReport, ActionError> {
        self.ensure_ongoing()?;
        self.own_unit(id)?;
        let report = movement::advance_along_path(&mut self.world, id, &mut self.events);
        self.check_outcome();
        Ok(report)
    }

    /// Take a single step of the unit's pending path
    pub fn step_unit(&mut self, id: UnitId) -> Result<StepOutcome, ActionError> {
        self.ensure_ongoing()?;
        self.own_unit(id)?;
        let outcome = movement::step_along_path(&mut self.world, id, &mut self.events);
        self.check_outcome();
        Ok(outcome)
    }

    pub fn clear_path(&mut self, id: UnitId) -> Result<(), ActionError> {
        self.own_unit(id)?;
        if let Some(unit) = self.world.unit_mut(id) {
            unit.path = None;
        }
        Ok(())
    }

    /// Attack a unit or city
    pub fn resolve_battle(&mut self, id: UnitId, target: Target) -> Result<BattleResult, ActionError> {
        self.ensure_ongoing()?;
        self.own_unit(id)?;
        let result = combat::resolve_battle(&mut self.world, id, target, &mut self.dice, &mut self.events)?;
        self.check_outcome();
        Ok(result)
    }

    /// Attack whatever stands at `hex`: an enemy city while it can still be
    /// fought, otherwise the first enemy unit there
    pub fn attack_hex(&mut self, id: UnitId, hex: Hex) -> Result<BattleResult, ActionError> {
        let unit = self.own_unit(id)?;
        let floor = self.world.rules().city.min_hp;
        let city_target = self.world.city(hex).and_then(|city| match city.owner {
            None => Some(true),
            Some(owner) if owner != unit.owner => Some(city.hp > floor || unit.kind.can_capture()),
            Some(_) => None,
        });
        let enemy = self
            .world
            .units_at(hex)
            .find(|u| u.owner != unit.owner)
            .map(|u| u.id);

        let target = match (city_target, enemy) {
            (Some(true), _) => Target::City(hex),
            (_, Some(enemy)) => Target::Unit(enemy),
            (Some(false), None) => Target::City(hex),
            (None, None) => return Err(InvalidAction::NoTarget(hex).into()),
        };
        self.resolve_battle(id, target)
    }

    /// Infantry claims an empty neutral city in range. The Infantry is spent.
    pub fn capture_empty_neutral_city(&mut self, id: UnitId, hex: Hex) -> Result<(), ActionError> {
        self.ensure_ongoing()?;
        let unit = self.own_unit(id)?;
        if !unit.kind.can_capture() {
            return Err(InvalidAction::CannotCapture(unit.kind).into());
        }
        if unit.movement_left == 0 {
            return Err(InvalidAction::NoMovementLeft(id).into());
        }
        let city = self.world.city(hex).ok_or(InvalidAction::NotACity(hex))?;
        if city.owner.is_some() {
            return Err(InvalidAction::CityNotNeutral(hex).into());
        }
        if unit.pos.distance_to(hex) > unit.range {
            return Err(InvalidAction::OutOfRange { target: hex, range: unit.range }.into());
        }

        let owner = unit.owner;
        self.world.capture_city(hex, owner, None, true, &mut self.events);
        self.world.remove_unit(id, LossCause::CaptureSpent, &mut self.events);
        self.check_outcome();
        Ok(())
    }

    pub fn load_unit(&mut self, transport: UnitId, cargo: UnitId) -> Result<(), ActionError> {
        self.ensure_ongoing()?;
        self.own_unit(transport)?;
        self.own_unit(cargo)?;
        transport::load_unit(&mut self.world, transport, cargo, &mut self.events)?;
        Ok(())
    }

    /// Put cargo down around the transport; returns the units that left
    pub fn unload_transport(&mut self, transport: UnitId) -> Result<Vec<UnitId>, ActionError> {
        self.ensure_ongoing()?;
        self.own_unit(transport)?;
        Ok(transport::unload_transport(&mut self.world, transport, &mut self.events)?)
    }

    /// Sentry: skip the unit until an enemy comes adjacent
    pub fn sentry_unit(&mut self, id: UnitId) -> Result<(), ActionError> {
        let unit = self.own_unit(id)?;
        if !unit.kind.can_sentry() {
            return Err(InvalidAction::CannotSentry(unit.kind).into());
        }
        if unit.movement_left == 0 {
            return Err(InvalidAction::NoMovementLeft(id).into());
        }
        if let Some(unit) = self.world.unit_mut(id) {
            unit.sentry = true;
            unit.movement_left = 0;
            unit.path = None;
        }
        Ok(())
    }

    /// Take a unit off sentry. It gets its movement back this turn.
    pub fn wake_unit(&mut self, id: UnitId) -> Result<(), ActionError> {
        self.ensure_ongoing()?;
        let unit = self.own_unit(id)?;
        if !unit.sentry {
            return Err(InvalidAction::NotSentried(id).into());
        }
        let full = self.world.rules().stats(unit.kind).movement;
        if let Some(unit) = self.world.unit_mut(id) {
            unit.sentry = false;
            unit.movement_left = full;
        }
        self.events.push(GameEvent::SentryWoke { unit: id });
        Ok(())
    }

    /// Give up the rest of this unit's turn
    pub fn skip_unit(&mut self, id: UnitId) -> Result<(), ActionError> {
        self.own_unit(id)?;
        if let Some(unit) = self.world.unit_mut(id) {
            unit.movement_left = 0;
        }
        Ok(())
    }

    // ========================================================================
    // CITY COMMANDS
    // ========================================================================

    /// Queue a unit in an own city. Ships need a coastal city.
    pub fn set_production(&mut self, city: Hex, kind: UnitKind) -> Result<(), ActionError> {
        self.ensure_ongoing()?;
        self.own_city(city)?;
        if kind.is_sea() && !self.world.grid().is_coastal_city(city) {
            return Err(InvalidAction::RequiresCoastalCity { kind, city }.into());
        }
        let turns = self.world.rules().stats(kind).cost;
        if let Some(state) = self.world.city_mut(city) {
            state.production = Production { unit: Some(kind), turns_left: turns };
        }
        tracing::debug!("City {} producing {} in {} rounds", city, kind, turns);
        Ok(())
    }

    pub fn cancel_production(&mut self, city: Hex) -> Result<(), ActionError> {
        self.own_city(city)?;
        if let Some(state) = self.world.city_mut(city) {
            state.production = Production::default();
        }
        Ok(())
    }

    // ========================================================================
    // TURN MACHINE
    // ========================================================================

    /// Hand over to the next player still in the game. Runs their turn start
    /// and automatic advancement, then upkeep when the rotation wraps.
    pub fn end_turn(&mut self) -> Result<(), ActionError> {
        self.ensure_ongoing()?;
        let seats = self.players.len();
        if seats == 0 {
            return Ok(());
        }

        let mut wrapped = false;
        for _ in 0..seats {
            self.current = (self.current + 1) % seats;
            if self.current == 0 {
                wrapped = true;
            }
            if !self.players[self.current].eliminated {
                break;
            }
        }

        self.start_turn();
        if wrapped && !self.is_over() {
            self.upkeep();
        }
        self.check_outcome();
        Ok(())
    }

    fn start_turn(&mut self) {
        let player = self.current_player();
        tracing::info!("Round {}: {} to move", self.round, player);
        self.events.push(GameEvent::TurnStarted { player, round: self.round });

        let ids = self.world.unit_ids();
        for &id in &ids {
            let Some(unit) = self.world.unit(id) else { continue };
            if unit.owner != player {
                continue;
            }
            let full = self.world.rules().stats(unit.kind).movement;
            let wake = unit.sentry && self.enemy_adjacent(unit);
            if let Some(unit) = self.world.unit_mut(id) {
                if wake {
                    unit.sentry = false;
                    self.events.push(GameEvent::SentryWoke { unit: id });
                }
                if !unit.sentry {
                    unit.movement_left = full;
                }
            }
        }

        for &id in &ids {
            let Some(unit) = self.world.unit(id) else { continue };
            if unit.owner != player || unit.sentry || !unit.has_path() {
                continue;
            }
            if self.threatened(unit) {
                if let Some(unit) = self.world.unit_mut(id) {
                    unit.path = None;
                    self.events.push(GameEvent::PathDiscarded { unit: id, at: unit.pos });
                }
                continue;
            }
            movement::advance_along_path(&mut self.world, id, &mut self.events);
            self.check_outcome();
            if self.is_over() {
                break;
            }
        }
    }

    fn enemy_adjacent(&self, unit: &Unit) -> bool {
        self.world
            .grid()
            .neighbors(unit.pos)
            .any(|n| self.world.units_at(n).any(|u| u.owner != unit.owner))
    }

    /// Enemy unit or a city not held by the owner next door
    fn threatened(&self, unit: &Unit) -> bool {
        self.enemy_adjacent(unit)
            || self
                .world
                .grid()
                .neighbors(unit.pos)
                .any(|n| self.world.grid().is_city(n) && !self.world.is_friendly_city(n, unit.owner))
    }

    /// Once per round: fuel, healing, production
    fn upkeep(&mut self) {
        let rules = self.world.rules().clone();

        for id in self.world.unit_ids() {
            let Some(unit) = self.world.unit(id) else { continue };
            let Some(fuel) = unit.fuel else { continue };
            let at_home = self.world.is_friendly_city(unit.pos, unit.owner);
            let max_fuel = rules.stats(unit.kind).max_fuel;
            let fuel = if at_home { max_fuel } else { fuel.saturating_sub(1) };
            if let Some(unit) = self.world.unit_mut(id) {
                unit.fuel = Some(fuel);
            }
            if fuel == 0 {
                tracing::warn!("{} ran out of fuel during upkeep", id);
                self.world.remove_unit(id, LossCause::OutOfFuel, &mut self.events);
            }
        }

        for id in self.world.unit_ids() {
            let Some(unit) = self.world.unit(id) else { continue };
            let in_city = self.world.is_friendly_city(unit.pos, unit.owner);
            if let Some(unit) = self.world.unit_mut(id) {
                if !unit.moved {
                    let fraction = if in_city { rules.heal.friendly_city } else { rules.heal.field };
                    let heal = ((fraction * f64::from(unit.max_hp)).floor() as i32).max(1);
                    unit.hp = (unit.hp + heal).min(unit.max_hp);
                }
                unit.moved = false;
            }
        }

        let cities: Vec<Hex> = self.world.cities().map(|(hex, _)| hex).collect();
        for hex in cities {
            self.tick_production(hex);
        }

        tracing::info!("Round {} complete", self.round);
        self.events.push(GameEvent::RoundEnded { round: self.round });
        self.round += 1;
    }

    fn tick_production(&mut self, hex: Hex) {
        let max_stack = self.world.rules().max_stack;
        let crowded = self.world.unit_count_at(hex) >= max_stack;
        let Some(city) = self.world.city_mut(hex) else { return };
        let Some(owner) = city.owner else { return };
        let Some(kind) = city.production.unit else { return };
        if city.production.turns_left == 0 {
            return;
        }

        city.production.turns_left -= 1;
        if city.production.turns_left > 0 {
            return;
        }
        if crowded {
            city.production.turns_left = 1;
            tracing::debug!("City {} is full, {} waits", hex, kind);
            return;
        }
        city.production = Production::default();

        let id = self.world.spawn_unit(kind, owner, hex);
        if let Some(unit) = self.world.unit_mut(id) {
            unit.movement_left = 0;
        }
        tracing::info!("City {} built {} {} for {}", hex, kind, id, owner);
        self.events.push(GameEvent::UnitSpawned { unit: id, kind, owner, at: hex });
    }

    /// Eliminations and the win check
    fn check_outcome(&mut self) {
        for player in self.players.iter_mut().filter(|p| !p.eliminated) {
            if !self.world.has_presence(player.id) {
                player.eliminated = true;
                tracing::info!("{} ({}) eliminated", player.id, player.name);
                self.events.push(GameEvent::PlayerEliminated { player: player.id });
            }
        }
        if self.result == GameResult::Ongoing {
            if let Some(winner) = self.world.sole_city_owner() {
                self.result = GameResult::Won(winner);
                tracing::info!("{} owns every city and wins", winner);
                self.events.push(GameEvent::GameWon { winner });
            }
        }
    }
}
