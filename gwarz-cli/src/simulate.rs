//! Simulate command - run end-of-turn cycles on a scenario
//!
//! ## Architecture (4-layer granularity)
//!
//! - Level 1: run() - orchestration
//! - Level 2: load_setup(), play_rounds(), report_results()
//! - Level 3: play_turn(), requeue_production()
//! - Level 4: formatting utilities

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use gwarz_core::{Game, GameEvent, GameResult, RulesConfig, Scenario, Standing};

// ============================================================================
// COMMAND ARGUMENTS (Level 4 - Configuration)
// ============================================================================

#[derive(Args)]
pub struct SimulateArgs {
    /// Scenario JSON file
    #[arg(long, value_name = "FILE")]
    pub scenario: PathBuf,

    /// Rules JSON file (defaults to the standard tables)
    #[arg(long, value_name = "FILE")]
    pub rules: Option<PathBuf>,

    /// Stop after this many rounds
    #[arg(long, default_value = "20")]
    pub rounds: u32,

    /// Combat dice seed (random if omitted)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Cities queue the same unit again after each build
    #[arg(long)]
    pub repeat_production: bool,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

/// Everything a run produced
struct SimulationRecord {
    scenario: String,
    seed: u64,
    rounds_played: u32,
    result: GameResult,
    events: Vec<GameEvent>,
    standings: Vec<Standing>,
}

// ============================================================================
// LEVEL 1 - ORCHESTRATION
// ============================================================================

/// Run simulate command
///
/// 1. Load scenario and rules
/// 2. Cycle turns until the round limit or a winner
/// 3. Report the event log and standings
pub fn run(args: SimulateArgs) -> Result<()> {
    let seed = args.seed.unwrap_or_else(rand::random);
    let (scenario, rules) = load_setup(&args)?;

    tracing::info!(
        "Simulating {:?}: {} players, {} rounds, seed={}",
        scenario.name,
        scenario.players.len(),
        args.rounds,
        seed
    );

    let name = scenario.name.clone();
    let game = scenario.into_game(rules, seed)?;
    let record = play_rounds(game, name, seed, &args);

    report_results(&record, &args)
}

// ============================================================================
// LEVEL 2 - PHASES
// ============================================================================

fn load_setup(args: &SimulateArgs) -> Result<(Scenario, RulesConfig)> {
    let scenario = Scenario::load(&args.scenario)?;
    let rules = match &args.rules {
        Some(path) => RulesConfig::load(path)
            .with_context(|| format!("Failed to load rules: {}", path.display()))?,
        None => RulesConfig::default(),
    };
    Ok((scenario, rules))
}

/// Cycle whole rounds; every seat ends its turn without issuing orders
fn play_rounds(mut game: Game, scenario: String, seed: u64, args: &SimulateArgs) -> SimulationRecord {
    let mut events = game.take_events();
    let first_round = game.round();

    while !game.is_over() && game.round() < first_round + args.rounds {
        let batch = play_turn(&mut game);
        if args.repeat_production {
            requeue_production(&mut game, &batch);
        }
        events.extend(batch);
    }

    if let GameResult::Won(winner) = game.result() {
        tracing::info!("{} won in round {}", winner, game.round());
    }

    SimulationRecord {
        scenario,
        seed,
        rounds_played: game.round() - first_round,
        result: game.result(),
        events,
        standings: game.standings(),
    }
}

fn report_results(record: &SimulationRecord, args: &SimulateArgs) -> Result<()> {
    if args.json {
        print_json_results(record)
    } else {
        print_text_results(record);
        Ok(())
    }
}

// ============================================================================
// LEVEL 3 - STEPS
// ============================================================================

fn play_turn(game: &mut Game) -> Vec<GameEvent> {
    if let Err(err) = game.end_turn() {
        tracing::warn!("end_turn refused: {}", err);
    }
    game.take_events()
}

/// Put the same order back on every city that just built something
fn requeue_production(game: &mut Game, batch: &[GameEvent]) {
    for event in batch {
        let GameEvent::UnitSpawned { kind, owner, at, .. } = *event else {
            continue;
        };
        if game.current_player() != owner {
            continue;
        }
        if let Err(err) = game.set_production(at, kind) {
            tracing::debug!("could not requeue {} at {}: {}", kind, at, err);
        }
    }
}

// ============================================================================
// LEVEL 4 - UTILITIES
// ============================================================================

fn print_json_results(record: &SimulationRecord) -> Result<()> {
    #[derive(serde::Serialize)]
    struct JsonOutput<'a> {
        scenario: &'a str,
        seed: u64,
        rounds_played: u32,
        winner: Option<String>,
        standings: &'a [Standing],
        events: &'a [GameEvent],
    }

    let output = JsonOutput {
        scenario: &record.scenario,
        seed: record.seed,
        rounds_played: record.rounds_played,
        winner: winner_name(record),
        standings: &record.standings,
        events: &record.events,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn print_text_results(record: &SimulationRecord) {
    println!("=== {} (seed {}) ===", record.scenario, record.seed);
    for event in &record.events {
        match event {
            GameEvent::TurnStarted { .. } | GameEvent::RoundEnded { .. } => println!("{event}"),
            _ => println!("  {event}"),
        }
    }

    println!("\n=== Standings after {} rounds ===", record.rounds_played);
    for s in &record.standings {
        println!(
            "{:<12} {:>3} cities {:>4} units{}",
            s.name,
            s.cities,
            s.units,
            if s.eliminated { "  (eliminated)" } else { "" }
        );
    }
    match winner_name(record) {
        Some(name) => println!("Winner: {name}"),
        None => println!("No winner"),
    }
}

fn winner_name(record: &SimulationRecord) -> Option<String> {
    match record.result {
        GameResult::Won(winner) => record
            .standings
            .iter()
            .find(|s| s.player == winner)
            .map(|s| s.name.clone()),
        GameResult::Ongoing => None,
    }
}

// ============================================================================
// TESTS
// ============================================================================
