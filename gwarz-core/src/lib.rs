//! G-WARZ Core - Rules engine
//!
//! This crate provides the game-state machine for G-WARZ:
//! - Hex geometry (axial coordinates, pixel conversion)
//! - World grid, cities and the unit arena with cargo manifests
//! - Movement legality, reachability and pathfinding
//! - Transport loading and unloading
//! - Combat resolution with pluggable dice
//! - Turn rotation, upkeep, production and win detection

pub mod hex;
pub mod units;
pub mod rules;
pub mod world;
pub mod movement;
pub mod transport;
pub mod combat;
pub mod events;
pub mod error;
pub mod game;
pub mod scenario;

// Re-exports for convenient access
pub use hex::{Hex, Viewport, DIRECTIONS};
pub use units::{Domain, PlayerId, Unit, UnitId, UnitKind};
pub use rules::RulesConfig;
pub use world::{CityState, Production, Terrain, WorldGrid, WorldSnapshot, WorldState};
pub use movement::{MoveReport, StepOutcome};
pub use combat::{BattleOutcome, BattleReport, BattleResult, Dice, FixedDice, RngDice, Target};
pub use events::{GameEvent, LossCause};
pub use error::{ActionError, InvalidAction};
pub use game::{Game, GameResult, Player, Standing};
pub use scenario::Scenario;
