//! Inspect command - movement and attack options of one unit

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use gwarz_core::hex::{hex_to_pixel, pixel_to_hex};
use gwarz_core::{Game, Hex, RulesConfig, Scenario, UnitId, Viewport};

#[derive(Args)]
pub struct InspectArgs {
    /// Scenario JSON file
    #[arg(long, value_name = "FILE")]
    pub scenario: PathBuf,

    /// Rules JSON file (defaults to the standard tables)
    #[arg(long, value_name = "FILE")]
    pub rules: Option<PathBuf>,

    /// Unit id, numbered from 1 in scenario order
    #[arg(long)]
    pub unit: u32,

    /// Also show the path to this hex, as `q,r`
    #[arg(long, allow_hyphen_values = true)]
    pub goal: Option<Hex>,

    /// Resolve a screen pixel `x,y` on the default viewport to a goal hex
    #[arg(long, allow_hyphen_values = true, conflicts_with = "goal")]
    pub pixel: Option<String>,
}

/// Run inspect command
pub fn run(args: InspectArgs) -> Result<()> {
    let scenario = Scenario::load(&args.scenario)?;
    let rules = match &args.rules {
        Some(path) => RulesConfig::load(path)?,
        None => RulesConfig::default(),
    };
    let view = Viewport { hex_size: rules.hex_size, ..Viewport::default() };
    let game = scenario.into_game(rules, 0)?;

    let id = UnitId(args.unit);
    let unit = game
        .world()
        .unit(id)
        .with_context(|| format!("no active unit {id}"))?;
    let (px, py) = hex_to_pixel(unit.pos, &view);
    println!(
        "{} {} of {} at {} (pixel {},{}), hp {}/{}, moves {}, fuel {}",
        unit.kind,
        id,
        unit.owner,
        unit.pos,
        px,
        py,
        unit.hp,
        unit.max_hp,
        unit.movement_left,
        unit.fuel.map_or_else(|| "-".to_string(), |f| f.to_string())
    );

    println!("reachable: {}", format_hexes(game.reachable(id)?));
    if unit.fuel.is_some() {
        println!("fuel range: {}", format_hexes(game.fuel_range(id)?));
    }
    println!("attackable: {}", format_hexes(game.attackable_hexes(id)?));

    let goal = match (&args.goal, &args.pixel) {
        (Some(goal), _) => Some(*goal),
        (None, Some(pixel)) => Some(resolve_pixel(pixel, &view, &game)?),
        (None, None) => None,
    };
    if let Some(goal) = goal {
        match game.find_path(id, goal) {
            Ok(path) => println!("path to {}: {}", goal, format_hexes(path)),
            Err(err) => println!("path to {}: {}", goal, err),
        }
    }
    Ok(())
}

fn resolve_pixel(pixel: &str, view: &Viewport, game: &Game) -> Result<Hex> {
    let (x, y) = pixel
        .split_once(',')
        .with_context(|| format!("expected `x,y`, got `{pixel}`"))?;
    let x: f64 = x.trim().parse().with_context(|| format!("bad x in `{pixel}`"))?;
    let y: f64 = y.trim().parse().with_context(|| format!("bad y in `{pixel}`"))?;
    let hexes = game.world().grid().hexes().iter().copied();
    pixel_to_hex(x, y, view, hexes).with_context(|| format!("pixel {pixel} is off the map"))
}

/// Sorted, space separated
fn format_hexes(hexes: impl IntoIterator<Item = Hex>) -> String {
    let mut hexes: Vec<Hex> = hexes.into_iter().collect();
    if hexes.is_empty() {
        return "none".to_string();
    }
    hexes.sort();
    hexes.iter().map(Hex::to_string).collect::<Vec<_>>().join(" ")
}
