//! Outcome events emitted to the presentation layer

use std::fmt;

use serde::Serialize;

use crate::combat::{BattleReport, Target};
use crate::hex::Hex;
use crate::units::{PlayerId, UnitId, UnitKind};

/// Why a unit left play
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum LossCause {
    Combat,
    OutOfFuel,
    /// Removed from a city that changed hands
    Displaced,
    /// Infantry spent taking a city
    CaptureSpent,
    /// Cargo of a transport that was removed
    LostWithCarrier(UnitId),
}

/// Something that happened in the world
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event")]
pub enum GameEvent {
    TurnStarted { player: PlayerId, round: u32 },
    RoundEnded { round: u32 },
    UnitMoved { unit: UnitId, from: Hex, to: Hex },
    UnitLoaded { unit: UnitId, transport: UnitId },
    UnitUnloaded { unit: UnitId, transport: UnitId, to: Hex },
    UnitDestroyed { unit: UnitId, kind: UnitKind, owner: PlayerId, at: Hex, cause: LossCause },
    UnitSpawned { unit: UnitId, kind: UnitKind, owner: PlayerId, at: Hex },
    SentryWoke { unit: UnitId },
    PathDiscarded { unit: UnitId, at: Hex },
    BattleResolved { attacker: UnitId, target: Target, report: BattleReport },
    CityCaptured { city: Hex, by: PlayerId, from: Option<PlayerId> },
    PlayerEliminated { player: PlayerId },
    GameWon { winner: PlayerId },
}

impl fmt::Display for GameEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameEvent::TurnStarted { player, round } => write!(f, "round {round}: {player} to move"),
            GameEvent::RoundEnded { round } => write!(f, "round {round} ended"),
            GameEvent::UnitMoved { unit, from, to } => write!(f, "{unit} moved {from} -> {to}"),
            GameEvent::UnitLoaded { unit, transport } => write!(f, "{unit} boarded {transport}"),
            GameEvent::UnitUnloaded { unit, transport, to } => {
                write!(f, "{unit} left {transport} at {to}")
            }
            GameEvent::UnitDestroyed { unit, kind, owner, at, cause } => {
                write!(f, "{owner} lost {kind} {unit} at {at} ({cause:?})")
            }
            GameEvent::UnitSpawned { unit, kind, owner, at } => {
                write!(f, "{owner} built {kind} {unit} at {at}")
            }
            GameEvent::SentryWoke { unit } => write!(f, "{unit} woke from sentry"),
            GameEvent::PathDiscarded { unit, at } => write!(f, "{unit} dropped its orders at {at}"),
            GameEvent::BattleResolved { attacker, target, report } => write!(
                f,
                "{attacker} attacked {target}: {} strikes, attacker hp {}, defender hp {}",
                report.strikes.len(),
                report.attacker_hp,
                report.defender_hp
            ),
            GameEvent::CityCaptured { city, by, from } => match from {
                Some(prev) => write!(f, "{by} took city {city} from {prev}"),
                None => write!(f, "{by} claimed city {city}"),
            },
            GameEvent::PlayerEliminated { player } => write!(f, "{player} eliminated"),
            GameEvent::GameWon { winner } => write!(f, "{winner} wins"),
        }
    }
}
