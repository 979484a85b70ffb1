//! Rule violations reported back to the caller

use crate::hex::Hex;
use crate::units::{PlayerId, UnitId, UnitKind};

/// Why a command was refused. A refused command leaves the world untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidAction {
    #[error("no active unit {0}")]
    UnknownUnit(UnitId),
    #[error("unit {unit} belongs to {owner}")]
    NotYourUnit { unit: UnitId, owner: PlayerId },
    #[error("unit {0} has no movement left")]
    NoMovementLeft(UnitId),
    #[error("{0} is not a city")]
    NotACity(Hex),
    #[error("city {0} is not yours")]
    NotYourCity(Hex),
    #[error("city {0} is neutral")]
    NeutralCity(Hex),
    #[error("city {0} already has an owner")]
    CityNotNeutral(Hex),
    #[error("city {0} is already at its hp floor")]
    CityAtFloor(Hex),
    #[error("{target} is beyond range {range}")]
    OutOfRange { target: Hex, range: u32 },
    #[error("nothing to attack at {0}")]
    NoTarget(Hex),
    #[error("{0} is held by your own side")]
    FriendlyTarget(Hex),
    #[error("{0} cannot capture cities")]
    CannotCapture(UnitKind),
    #[error("{kind} can only be built in a coastal city, {city} is inland")]
    RequiresCoastalCity { kind: UnitKind, city: Hex },
    #[error("{0} cannot stand sentry")]
    CannotSentry(UnitKind),
    #[error("unit {0} is not on sentry")]
    NotSentried(UnitId),
    #[error("unit {0} is not a transport")]
    NotATransport(UnitId),
    #[error("{transport} cannot carry {cargo}")]
    CargoNotAllowed { transport: UnitKind, cargo: UnitKind },
    #[error("transport {0} is full")]
    TransportFull(UnitId),
    #[error("transport {0} carries nothing")]
    NothingToUnload(UnitId),
    #[error("unit {cargo} is not in position to board {transport}")]
    NotInLoadingPosition { cargo: UnitId, transport: UnitId },
    #[error("transport {0} cannot unload here")]
    UnloadLocation(UnitId),
    #[error("no free hex to unload transport {0}")]
    NoLandingHex(UnitId),
    #[error("unit {unit} needs {needed} fuel but has {fuel}")]
    InsufficientFuel { unit: UnitId, needed: usize, fuel: u32 },
}

/// Error returned by game commands
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    #[error(transparent)]
    Invalid(#[from] InvalidAction),
    #[error("no path from {from} to {to}")]
    NoPathFound { from: Hex, to: Hex },
    #[error("game is over, {winner} won")]
    GameOver { winner: PlayerId },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = ActionError::from(InvalidAction::OutOfRange { target: Hex::new(3, 0), range: 1 });
        assert_eq!(err.to_string(), "(3, 0) is beyond range 1");

        let err = ActionError::NoPathFound { from: Hex::new(0, 0), to: Hex::new(1, -1) };
        assert_eq!(err.to_string(), "no path from (0, 0) to (1, -1)");

        let err = InvalidAction::CargoNotAllowed { transport: UnitKind::AirCarrier, cargo: UnitKind::Tank };
        assert_eq!(err.to_string(), "AirCarrier cannot carry Tank");
    }
}
