//! Combat: a pure damage exchange plus its application to the world

use std::fmt;

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::InvalidAction;
use crate::events::{GameEvent, LossCause};
use crate::hex::Hex;
use crate::movement::can_traverse;
use crate::rules::{CityRules, CombatRules};
use crate::units::{PlayerId, Unit, UnitId};
use crate::world::{CityState, WorldState};

/// Upper bound on strikes in one battle. Two units that cannot hurt each
/// other would otherwise trade chip damage for a long time.
pub const MAX_EXCHANGES: usize = 1000;

// ============================================================================
// DICE
// ============================================================================

/// Source of combat randomness
pub trait Dice {
    /// Uniform multiplier in `[min, max]`
    fn roll(&mut self, min: f64, max: f64) -> f64;
    /// True with probability `p`
    fn chance(&mut self, p: f64) -> bool;
}

/// Dice backed by any RNG
#[derive(Clone, Debug)]
pub struct RngDice<R>(pub R);

impl RngDice<ChaCha8Rng> {
    pub fn seeded(seed: u64) -> Self {
        RngDice(ChaCha8Rng::seed_from_u64(seed))
    }
}

impl<R: Rng> Dice for RngDice<R> {
    fn roll(&mut self, min: f64, max: f64) -> f64 {
        if min >= max {
            min
        } else {
            self.0.gen_range(min..=max)
        }
    }

    fn chance(&mut self, p: f64) -> bool {
        self.0.gen_bool(p.clamp(0.0, 1.0))
    }
}

/// Dice that always roll the same multiplier and chip result
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FixedDice {
    pub roll: f64,
    pub chip: bool,
}

impl Default for FixedDice {
    fn default() -> Self {
        Self { roll: 1.0, chip: false }
    }
}

impl Dice for FixedDice {
    fn roll(&mut self, _min: f64, _max: f64) -> f64 {
        self.roll
    }

    fn chance(&mut self, _p: f64) -> bool {
        self.chip
    }
}

// ============================================================================
// COMBATANTS
// ============================================================================

/// Stats a combatant brings to an exchange
pub trait CombatProfile {
    fn hp(&self) -> i32;
    fn attack(&self) -> i32;
    fn defense(&self) -> i32;
    fn range(&self) -> u32;
    fn owner(&self) -> Option<PlayerId>;
    fn position(&self) -> Hex;
}

impl CombatProfile for Unit {
    fn hp(&self) -> i32 {
        self.hp
    }
    fn attack(&self) -> i32 {
        self.attack
    }
    fn defense(&self) -> i32 {
        self.defense
    }
    fn range(&self) -> u32 {
        self.range
    }
    fn owner(&self) -> Option<PlayerId> {
        Some(self.owner)
    }
    fn position(&self) -> Hex {
        self.pos
    }
}

/// A city fighting as a stationary defender
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CityDefender {
    pub hex: Hex,
    pub owner: Option<PlayerId>,
    pub hp: i32,
    pub attack: i32,
    pub defense: i32,
    pub range: u32,
}

impl CityDefender {
    pub fn new(hex: Hex, city: &CityState, rules: &CityRules) -> Self {
        Self {
            hex,
            owner: city.owner,
            hp: city.hp,
            attack: rules.attack,
            defense: rules.defense,
            range: rules.range,
        }
    }
}

impl CombatProfile for CityDefender {
    fn hp(&self) -> i32 {
        self.hp
    }
    fn attack(&self) -> i32 {
        self.attack
    }
    fn defense(&self) -> i32 {
        self.defense
    }
    fn range(&self) -> u32 {
        self.range
    }
    fn owner(&self) -> Option<PlayerId> {
        self.owner
    }
    fn position(&self) -> Hex {
        self.hex
    }
}

/// Whoever is on the receiving end of an attack
#[derive(Clone, Copy, Debug)]
pub enum Defender<'a> {
    Unit(&'a Unit),
    City(CityDefender),
}

impl CombatProfile for Defender<'_> {
    fn hp(&self) -> i32 {
        match self {
            Defender::Unit(u) => u.hp(),
            Defender::City(c) => c.hp(),
        }
    }
    fn attack(&self) -> i32 {
        match self {
            Defender::Unit(u) => u.attack(),
            Defender::City(c) => c.attack(),
        }
    }
    fn defense(&self) -> i32 {
        match self {
            Defender::Unit(u) => u.defense(),
            Defender::City(c) => c.defense(),
        }
    }
    fn range(&self) -> u32 {
        match self {
            Defender::Unit(u) => u.range(),
            Defender::City(c) => c.range(),
        }
    }
    fn owner(&self) -> Option<PlayerId> {
        match self {
            Defender::Unit(u) => u.owner(),
            Defender::City(c) => c.owner(),
        }
    }
    fn position(&self) -> Hex {
        match self {
            Defender::Unit(u) => u.position(),
            Defender::City(c) => c.position(),
        }
    }
}

/// What an attack is aimed at
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Target {
    Unit(UnitId),
    City(Hex),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Unit(id) => write!(f, "unit {id}"),
            Target::City(hex) => write!(f, "city {hex}"),
        }
    }
}

// ============================================================================
// EXCHANGE
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Side {
    Attacker,
    Defender,
}

/// One blow and the hp of both sides after it
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Strike {
    pub by: Side,
    pub damage: i32,
    pub attacker_hp: i32,
    pub defender_hp: i32,
}

/// Hp of both sides at one point of a battle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HpFrame {
    pub attacker_hp: i32,
    pub defender_hp: i32,
}

/// Full record of an exchange, computed before the world is touched
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BattleReport {
    pub attacker_start_hp: i32,
    pub defender_start_hp: i32,
    pub strikes: Vec<Strike>,
    pub attacker_hp: i32,
    pub defender_hp: i32,
}

impl BattleReport {
    /// Hp snapshots from the opening state through every strike.
    /// Can be replayed any number of times.
    pub fn replay(&self) -> impl Iterator<Item = HpFrame> + '_ {
        std::iter::once(HpFrame {
            attacker_hp: self.attacker_start_hp,
            defender_hp: self.defender_start_hp,
        })
        .chain(self.strikes.iter().map(|s| HpFrame {
            attacker_hp: s.attacker_hp,
            defender_hp: s.defender_hp,
        }))
    }

    pub fn strikes_by(&self, side: Side) -> impl Iterator<Item = &Strike> + '_ {
        self.strikes.iter().filter(move |s| s.by == side)
    }
}

/// Damage of a single blow
pub fn strike_damage<R: Dice + ?Sized>(
    attack: i32,
    defense: i32,
    terrain_bonus: f64,
    rules: &CombatRules,
    dice: &mut R,
) -> i32 {
    let attack_roll = dice.roll(rules.roll_min, rules.roll_max);
    let defense_roll = dice.roll(rules.roll_min, rules.roll_max);
    let raw = f64::from(attack) * attack_roll * rules.attack_factor
        - f64::from(defense) * defense_roll * terrain_bonus * rules.defense_factor;
    let damage = raw.floor().max(0.0) as i32;
    if damage == 0 && dice.chance(rules.chip_chance) {
        rules.chip_damage
    } else {
        damage
    }
}

/// Run the alternating exchange.
///
/// `terrain_bonus` scales the defender's defense on the attacker's blows only.
/// With `city_floor` set the defender is a city: its hp is clamped at the
/// floor and the exchange ends once it gets there.
pub fn simulate_exchange<A, D, R>(
    attacker: &A,
    defender: &D,
    terrain_bonus: f64,
    city_floor: Option<i32>,
    rules: &CombatRules,
    dice: &mut R,
) -> BattleReport
where
    A: CombatProfile + ?Sized,
    D: CombatProfile + ?Sized,
    R: Dice + ?Sized,
{
    let standing = |hp: i32| match city_floor {
        Some(floor) => hp > floor,
        None => hp > 0,
    };

    let mut attacker_hp = attacker.hp();
    let mut defender_hp = defender.hp();
    let mut strikes = Vec::new();

    while attacker_hp > 0 && standing(defender_hp) && strikes.len() < MAX_EXCHANGES {
        let mut damage = strike_damage(attacker.attack(), defender.defense(), terrain_bonus, rules, dice);
        if let Some(floor) = city_floor {
            damage = damage.min(defender_hp - floor);
        }
        defender_hp -= damage;
        strikes.push(Strike { by: Side::Attacker, damage, attacker_hp, defender_hp });
        tracing::debug!("attacker strikes for {}, defender at {}", damage, defender_hp);
        if !standing(defender_hp) {
            break;
        }

        let damage = strike_damage(defender.attack(), attacker.defense(), 1.0, rules, dice);
        attacker_hp -= damage;
        strikes.push(Strike { by: Side::Defender, damage, attacker_hp, defender_hp });
        tracing::debug!("defender strikes back for {}, attacker at {}", damage, attacker_hp);
    }

    BattleReport {
        attacker_start_hp: attacker.hp(),
        defender_start_hp: defender.hp(),
        strikes,
        attacker_hp,
        defender_hp,
    }
}

// ============================================================================
// RESOLUTION
// ============================================================================

/// How a battle ended
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum BattleOutcome {
    AttackerDestroyed,
    DefenderDestroyed,
    /// Both fell; the attacker is kept alive at 1 hp
    BothFell,
    /// Neither side fell within the exchange limit
    Standoff,
    /// City worn down but still in enemy hands
    CityHeld,
    CityCaptured,
}

/// Battle applied to the world
#[derive(Clone, Debug, PartialEq)]
pub struct BattleResult {
    pub report: BattleReport,
    pub outcome: BattleOutcome,
    /// Hex the attacker moved onto after winning, if any
    pub advanced_to: Option<Hex>,
}

/// Check an attack without touching the world; returns the defender hex
pub fn validate_attack(world: &WorldState, attacker: UnitId, target: Target) -> Result<Hex, InvalidAction> {
    let unit = world.unit(attacker).ok_or(InvalidAction::UnknownUnit(attacker))?;
    if unit.movement_left == 0 {
        return Err(InvalidAction::NoMovementLeft(attacker));
    }

    let hex = match target {
        Target::Unit(id) => {
            let defender = world.unit(id).ok_or(InvalidAction::UnknownUnit(id))?;
            if defender.owner == unit.owner {
                return Err(InvalidAction::FriendlyTarget(defender.pos));
            }
            defender.pos
        }
        Target::City(hex) => {
            let city = world.city(hex).ok_or(InvalidAction::NotACity(hex))?;
            match city.owner {
                None => return Err(InvalidAction::NeutralCity(hex)),
                Some(owner) if owner == unit.owner => return Err(InvalidAction::FriendlyTarget(hex)),
                Some(_) => {}
            }
            if city.hp <= world.rules().city.min_hp && !unit.kind.can_capture() {
                return Err(InvalidAction::CityAtFloor(hex));
            }
            hex
        }
    };

    if unit.pos.distance_to(hex) > unit.range {
        return Err(InvalidAction::OutOfRange { target: hex, range: unit.range });
    }
    Ok(hex)
}

/// Fight a battle and apply the result: removals, city damage, advance
/// onto a vacated hex, and Infantry captures.
pub fn resolve_battle<R: Dice + ?Sized>(
    world: &mut WorldState,
    attacker: UnitId,
    target: Target,
    dice: &mut R,
    events: &mut Vec<GameEvent>,
) -> Result<BattleResult, InvalidAction> {
    let hex = validate_attack(world, attacker, target)?;
    let unit = world.unit(attacker).ok_or(InvalidAction::UnknownUnit(attacker))?.clone();
    let rules = world.rules().clone();
    let bonus = world
        .terrain(hex)
        .map_or(1.0, |terrain| rules.terrain_defense.defense(terrain));

    let (report, floor) = match target {
        Target::Unit(id) => {
            let defender = world.unit(id).ok_or(InvalidAction::UnknownUnit(id))?;
            let report = simulate_exchange(&unit, &Defender::Unit(defender), bonus, None, &rules.combat, dice);
            (report, None)
        }
        Target::City(hex) => {
            let city = world.city(hex).ok_or(InvalidAction::NotACity(hex))?;
            let defender = Defender::City(CityDefender::new(hex, city, &rules.city));
            let floor = rules.city.min_hp;
            let report = simulate_exchange(&unit, &defender, bonus, Some(floor), &rules.combat, dice);
            (report, Some(floor))
        }
    };
    tracing::info!(
        "{} {} attacked {}: {} strikes, {} vs {}",
        unit.kind,
        attacker,
        target,
        report.strikes.len(),
        report.attacker_hp,
        report.defender_hp
    );
    events.push(GameEvent::BattleResolved { attacker, target, report: report.clone() });

    let mut advanced_to = None;
    let outcome = match (target, floor) {
        (Target::Unit(defender), _) => {
            let outcome = apply_unit_battle(world, attacker, defender, &report, events);
            if matches!(outcome, BattleOutcome::DefenderDestroyed | BattleOutcome::BothFell) {
                advanced_to = advance(world, &unit, hex, events);
            }
            outcome
        }
        (Target::City(hex), floor) => {
            let floor = floor.unwrap_or(rules.city.min_hp);
            apply_city_battle(world, &unit, hex, floor, &report, events)
        }
    };

    if let Some(survivor) = world.unit_mut(attacker) {
        survivor.movement_left = survivor.movement_left.saturating_sub(1);
    }

    Ok(BattleResult { report, outcome, advanced_to })
}

fn apply_unit_battle(
    world: &mut WorldState,
    attacker: UnitId,
    defender: UnitId,
    report: &BattleReport,
    events: &mut Vec<GameEvent>,
) -> BattleOutcome {
    let attacker_down = report.attacker_hp <= 0;
    let defender_down = report.defender_hp <= 0;

    match (attacker_down, defender_down) {
        (true, true) => {
            if let Some(unit) = world.unit_mut(attacker) {
                unit.hp = 1;
            }
            world.remove_unit(defender, LossCause::Combat, events);
            BattleOutcome::BothFell
        }
        (true, false) => {
            world.remove_unit(attacker, LossCause::Combat, events);
            if let Some(unit) = world.unit_mut(defender) {
                unit.hp = report.defender_hp;
            }
            BattleOutcome::AttackerDestroyed
        }
        (false, true) => {
            if let Some(unit) = world.unit_mut(attacker) {
                unit.hp = report.attacker_hp;
            }
            world.remove_unit(defender, LossCause::Combat, events);
            BattleOutcome::DefenderDestroyed
        }
        (false, false) => {
            if let Some(unit) = world.unit_mut(attacker) {
                unit.hp = report.attacker_hp;
            }
            if let Some(unit) = world.unit_mut(defender) {
                unit.hp = report.defender_hp;
            }
            BattleOutcome::Standoff
        }
    }
}

/// Move a victorious melee attacker onto the vacated hex.
/// Only Infantry may advance into a city. It takes the city, wipes out what
/// is left of the garrison and is spent.
fn advance(world: &mut WorldState, attacker: &Unit, hex: Hex, events: &mut Vec<GameEvent>) -> Option<Hex> {
    if attacker.pos.distance_to(hex) != 1 || world.unit(attacker.id).is_none() {
        return None;
    }
    let terrain = world.terrain(hex)?;
    if !can_traverse(attacker.kind, terrain) {
        return None;
    }

    if world.grid().is_city(hex) {
        if !attacker.kind.can_capture() || !world.is_enemy_city(hex, attacker.owner) {
            return None;
        }
        move_in(world, attacker, hex, events);
        world.capture_city(hex, attacker.owner, Some(attacker.id), true, events);
        world.remove_unit(attacker.id, LossCause::CaptureSpent, events);
        return Some(hex);
    }

    if world.unit_count_at(hex) > 0 {
        return None;
    }
    move_in(world, attacker, hex, events);
    Some(hex)
}

fn move_in(world: &mut WorldState, attacker: &Unit, hex: Hex, events: &mut Vec<GameEvent>) {
    world.relocate(attacker.id, hex);
    if let Some(unit) = world.unit_mut(attacker.id) {
        unit.moved = true;
        unit.path = None;
    }
    events.push(GameEvent::UnitMoved { unit: attacker.id, from: attacker.pos, to: hex });
}

fn apply_city_battle(
    world: &mut WorldState,
    attacker: &Unit,
    hex: Hex,
    floor: i32,
    report: &BattleReport,
    events: &mut Vec<GameEvent>,
) -> BattleOutcome {
    if let Some(city) = world.city_mut(hex) {
        city.hp = report.defender_hp.max(floor);
    }

    if report.attacker_hp <= 0 {
        world.remove_unit(attacker.id, LossCause::Combat, events);
        return BattleOutcome::AttackerDestroyed;
    }
    if let Some(unit) = world.unit_mut(attacker.id) {
        unit.hp = report.attacker_hp;
    }

    if report.defender_hp <= floor && attacker.kind.can_capture() {
        world.capture_city(hex, attacker.owner, Some(attacker.id), true, events);
        world.remove_unit(attacker.id, LossCause::CaptureSpent, events);
        return BattleOutcome::CityCaptured;
    }
    BattleOutcome::CityHeld
}
