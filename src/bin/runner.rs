//! apologise-runner binary
//!
//! Drives a level catalog headlessly from the command line: loads the engine
//! tuning and the catalog, steps the level with scripted input, and prints
//! JSON snapshots.
//!
//! ## Configuration (CLI / env, tuning via `config` crate)
//!
//! | Flag / key              | Default             | Description                         |
//! |-------------------------|---------------------|-------------------------------------|
//! | `--catalog`             | `data/levels.json`  | Level catalog (JSON)                |
//! | `--config`              | none                | Engine tuning (TOML)                |
//! | `APOLOGISE_*`           |                     | Tuning overrides, `__` nests keys   |
//! | `--steps`               | `600`               | Fixed steps to run                  |
//! | `--hold`                | none                | Direction held every step           |
//! | `--jump-every`          | `0`                 | Jump every N steps (0 = never)      |
//! | `--auto-advance`        | off                 | Dismiss dialogue as it appears      |
//! | `--snapshot-every`      | `0`                 | Print a snapshot every N steps      |

use anyhow::{Context, Result};
use apologise_core::{
    config::EngineConfig,
    protocol::{Intent, LevelState},
    types::Direction,
    Level, LevelCatalog,
};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing::info;

/// Steps between automatic dialogue advances.
const ADVANCE_DELAY: u64 = 30;

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Hold {
    Left,
    Right,
}

impl From<Hold> for Direction {
    fn from(h: Hold) -> Self {
        match h {
            Hold::Left => Direction::Left,
            Hold::Right => Direction::Right,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "apologise-runner", about = "Headless Apologise level runner", version)]
struct Args {
    /// Level catalog (JSON)
    #[arg(long, env = "APOLOGISE_RUNNER_CATALOG", default_value = "data/levels.json")]
    catalog: PathBuf,

    /// Engine tuning file (TOML)
    #[arg(long, env = "APOLOGISE_RUNNER_CONFIG")]
    config: Option<PathBuf>,

    /// Number of fixed steps to run
    #[arg(long, default_value_t = 600)]
    steps: u64,

    /// Direction to hold every step
    #[arg(long, value_enum)]
    hold: Option<Hold>,

    /// Jump every N steps (0 = never)
    #[arg(long, default_value_t = 0)]
    jump_every: u64,

    /// Dismiss dialogue and run outcomes automatically
    #[arg(long)]
    auto_advance: bool,

    /// Print a JSON snapshot every N steps (0 = only at the end)
    #[arg(long, default_value_t = 0)]
    snapshot_every: u64,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("apologise_core=debug".parse()?),
        )
        .init();

    let args = Args::parse();

    let config = EngineConfig::load(args.config.as_deref())
        .context("loading engine configuration")?;
    let catalog = LevelCatalog::from_path(&args.catalog, &config.world)
        .with_context(|| format!("loading level catalog {}", args.catalog.display()))?;

    info!(
        "Starting apologise-runner ({} levels, step={}s, steps={})",
        catalog.len(),
        config.physics.step,
        args.steps,
    );

    let mut level = Level::new(catalog, config).context("starting level session")?;

    for step in 1..=args.steps {
        if let Some(hold) = args.hold {
            level.apply(Intent::Move {
                direction: hold.into(),
            });
        }
        if args.jump_every > 0 && step % args.jump_every == 0 {
            level.apply(Intent::Jump);
        }
        if args.auto_advance && step % ADVANCE_DELAY == 0 && wants_advance(&level) {
            level.apply(Intent::AdvanceDialogue);
        }

        let report = level.step();
        for event in &report.events {
            info!(frame = report.frame, state = ?report.state, "{:?}", event);
        }

        if args.snapshot_every > 0 && step % args.snapshot_every == 0 {
            println!("{}", serde_json::to_string(&level.snapshot())?);
        }
    }

    println!("{}", serde_json::to_string_pretty(&level.snapshot())?);
    Ok(())
}

/// Whether the host would be waiting on the player to dismiss something.
fn wants_advance(level: &Level) -> bool {
    match level.state() {
        LevelState::Playing => level.dialogue().is_blocking(),
        LevelState::WonPendingDialogue => level.dialogue().is_showing_ending(),
        LevelState::RunComplete => true,
        LevelState::Transitioning => false,
    }
}
