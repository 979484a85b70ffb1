//! Loading and unloading transports

use crate::error::InvalidAction;
use crate::events::GameEvent;
use crate::units::{Unit, UnitId, UnitKind};
use crate::world::WorldState;

/// Put an active unit into a transport's manifest.
///
/// The cargo must stand on the transport's hex, or next to a ship.
pub fn load_unit(
    world: &mut WorldState,
    transport: UnitId,
    cargo: UnitId,
    events: &mut Vec<GameEvent>,
) -> Result<(), InvalidAction> {
    let carrier = world.unit(transport).ok_or(InvalidAction::UnknownUnit(transport))?;
    let unit = world.unit(cargo).ok_or(InvalidAction::UnknownUnit(cargo))?;
    check_load(world, carrier, unit)?;

    world.stow(transport, cargo);
    tracing::debug!("{} boarded {}", cargo, transport);
    events.push(GameEvent::UnitLoaded { unit: cargo, transport });
    Ok(())
}

fn check_load(world: &WorldState, carrier: &Unit, unit: &Unit) -> Result<(), InvalidAction> {
    let rule = world
        .rules()
        .transport(carrier.kind)
        .ok_or(InvalidAction::NotATransport(carrier.id))?;
    if carrier.id == unit.id || unit.owner != carrier.owner {
        return Err(InvalidAction::NotYourUnit { unit: unit.id, owner: unit.owner });
    }
    if !rule.allows(unit.kind) {
        return Err(InvalidAction::CargoNotAllowed { transport: carrier.kind, cargo: unit.kind });
    }
    if world.manifest(carrier.id).len() >= rule.capacity {
        return Err(InvalidAction::TransportFull(carrier.id));
    }

    let colocated = unit.pos == carrier.pos;
    let from_shore = carrier.kind.is_sea() && unit.kind.is_land() && unit.pos.distance_to(carrier.pos) == 1;
    if !colocated && !from_shore {
        return Err(InvalidAction::NotInLoadingPosition { cargo: unit.id, transport: carrier.id });
    }
    if from_shore && unit.movement_left == 0 {
        return Err(InvalidAction::NoMovementLeft(unit.id));
    }
    Ok(())
}

/// True if a transport is somewhere it may put its cargo down
pub fn can_unload_here(world: &WorldState, carrier: &Unit) -> bool {
    let pos = carrier.pos;
    match carrier.kind {
        UnitKind::TransportPlane => world.grid().is_city(pos),
        kind if kind.is_sea() => world.is_friendly_city(pos, carrier.owner) || world.grid().touches_land(pos),
        _ => false,
    }
}

/// Whether the transport's hex has room for one more unit of `owner`.
/// The transport itself does not count against the stack.
fn has_room(world: &WorldState, carrier: &Unit) -> bool {
    let others = world.units_at(carrier.pos).filter(|u| u.id != carrier.id).count();
    if world.is_friendly_city(carrier.pos, carrier.owner) {
        others < world.rules().max_stack
    } else {
        others == 0
    }
}

/// Put cargo back into play on the transport's hex.
///
/// Units go out in manifest order while the hex has room; the rest stay
/// aboard. Returns the units that left.
pub fn unload_transport(
    world: &mut WorldState,
    transport: UnitId,
    events: &mut Vec<GameEvent>,
) -> Result<Vec<UnitId>, InvalidAction> {
    let carrier = world.unit(transport).ok_or(InvalidAction::UnknownUnit(transport))?;
    if world.rules().transport(carrier.kind).is_none() {
        return Err(InvalidAction::NotATransport(transport));
    }
    if carrier.movement_left == 0 {
        return Err(InvalidAction::NoMovementLeft(transport));
    }
    if world.manifest(transport).is_empty() {
        return Err(InvalidAction::NothingToUnload(transport));
    }
    if !can_unload_here(world, carrier) {
        return Err(InvalidAction::UnloadLocation(transport));
    }

    let to = carrier.pos;
    let cargo: Vec<(UnitId, UnitKind)> = world.manifest(transport).iter().map(|u| (u.id, u.kind)).collect();
    let mut placed = Vec::new();
    for &(id, kind) in &cargo {
        match world.unit(transport) {
            Some(carrier) if has_room(world, carrier) => {}
            _ => break,
        }
        world.disembark(transport, id, to);
        let movement = world.rules().stats(kind).movement;
        if let Some(landed) = world.unit_mut(id) {
            landed.movement_left = movement;
            landed.sentry = false;
        }
        events.push(GameEvent::UnitUnloaded { unit: id, transport, to });
        placed.push(id);
    }

    if placed.is_empty() {
        return Err(InvalidAction::NoLandingHex(transport));
    }
    if let Some(carrier) = world.unit_mut(transport) {
        carrier.movement_left = carrier.movement_left.saturating_sub(1);
    }
    tracing::debug!("{} unloaded {} of {} units at {}", transport, placed.len(), cargo.len(), to);
    Ok(placed)
}
