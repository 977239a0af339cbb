//! Engine tuning: every constant the simulation reads, loaded once and
//! passed explicitly into the level, player and actors.
//!
//! ## Layering (via the `config` crate)
//!
//! | Source                         | Example                                   |
//! |--------------------------------|-------------------------------------------|
//! | Built-in defaults              | `EngineConfig::default()`                 |
//! | Optional TOML file             | `--config engine.toml`                    |
//! | Environment (`APOLOGISE_*`)    | `APOLOGISE_PHYSICS__STEP=0.02`            |

use crate::error::{ConfigurationError, Result};
use crate::types::Vec2;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// Physics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PhysicsSettings {
    /// Fixed integration step in seconds, independent of host frame rate.
    pub step: f32,
    /// Gravity in level units per second squared (`+y` is down).
    pub gravity: Vec2,
    /// Fraction of velocity retained after one second of free motion.
    pub damping: f32,
}

impl Default for PhysicsSettings {
    fn default() -> Self {
        Self {
            step: 0.01,
            gravity: Vec2::new(0.0, 6000.0),
            damping: 0.00005,
        }
    }
}

// ---------------------------------------------------------------------------
// World geometry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorldSettings {
    /// Width of the playfield; the boundary edges are placed on its border.
    pub width: f32,
    pub height: f32,
    /// Collision radius of segment geometry and door sensors.
    pub line_radius: f32,
    pub friction: f32,
    pub elasticity: f32,
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            width: 1000.0,
            height: 500.0,
            line_radius: 2.0,
            friction: 0.8,
            elasticity: 0.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlayerSettings {
    pub mass: f32,
    pub half_extents: Vec2,
    /// Horizontal impulse applied per step while a direction is held.
    pub accel: f32,
    pub friction: f32,
    pub elasticity: f32,
    /// Radius of the sensor around the player that kills actors it touches.
    pub hazard_radius: f32,
    /// Moving steps between consecutive footstep cues.
    pub step_sound_delay: u32,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            mass: 50.0,
            half_extents: Vec2::new(10.0, 15.0),
            accel: 4000.0,
            friction: 0.5,
            elasticity: 0.0,
            hazard_radius: 100.0,
            step_sound_delay: 12,
        }
    }
}

/// Jump impulses, shared by the player and by actors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct JumpSettings {
    /// Upward impulse applied once at launch.
    pub initial_impulse: f32,
    /// Upward impulse applied on each sustained step.
    pub sustain_impulse: f32,
    /// Maximum number of sustained steps per jump.
    pub sustain_steps: u32,
}

impl Default for JumpSettings {
    fn default() -> Self {
        Self {
            initial_impulse: 20000.0,
            sustain_impulse: 5000.0,
            sustain_steps: 8,
        }
    }
}

// ---------------------------------------------------------------------------
// Actors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ActorSettings {
    pub mass: f32,
    pub half_extents: Vec2,
    pub corpse_half_extents: Vec2,
    /// Offset from the actor's last position at which its corpse spawns.
    pub corpse_offset: Vec2,
    pub friction: f32,
    pub elasticity: f32,
    /// Horizontal speed at or below which an actor counts as blocked.
    pub turn_threshold_velocity: f32,
}

impl Default for ActorSettings {
    fn default() -> Self {
        Self {
            mass: 50.0,
            half_extents: Vec2::new(10.0, 15.0),
            corpse_half_extents: Vec2::new(10.0, 13.5),
            corpse_offset: Vec2::zero(),
            friction: 0.5,
            elasticity: 0.0,
            turn_threshold_velocity: 1e-3,
        }
    }
}

/// Which behaviour an actor runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiKind {
    Walk,
    RunAway,
}

/// Per-mode tunables. Fields a mode does not read are ignored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct AiParams {
    /// Horizontal impulse per step in the facing direction.
    pub accel: f32,
    /// Distance beyond the hazard radius at which a fleeing actor turns away.
    pub turn_prox: f32,
    /// Distance beyond the hazard radius inside which a fleeing actor speeds up.
    pub speedup_prox: f32,
    /// Smallest divisor applied to `accel` while speeding up.
    pub max_speedup: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AiParameterTable {
    pub walk: AiParams,
    pub run_away: AiParams,
}

impl AiParameterTable {
    pub fn get(&self, kind: AiKind) -> &AiParams {
        match kind {
            AiKind::Walk => &self.walk,
            AiKind::RunAway => &self.run_away,
        }
    }
}

impl Default for AiParameterTable {
    fn default() -> Self {
        Self {
            walk: AiParams {
                accel: 1500.0,
                ..Default::default()
            },
            run_away: AiParams {
                accel: 2500.0,
                turn_prox: 50.0,
                speedup_prox: 50.0,
                max_speedup: 0.5,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Progression
// ---------------------------------------------------------------------------

/// Kill-count bounds for the end-of-run rank.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RankThresholds {
    /// At or below this many kills the run earns the best rank.
    pub low: u32,
    /// At or above this many kills the run earns the worst rank.
    pub high: u32,
}

impl Default for RankThresholds {
    fn default() -> Self {
        Self { low: 17, high: 20 }
    }
}

/// Where the player appears when the next level loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EntryPolicy {
    /// Always at the descriptor's start point.
    #[default]
    Start,
    /// Mirror the offset from the previous exit onto the new entrance.
    CarryThroughEntrance,
}

// ---------------------------------------------------------------------------
// Engine config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub physics: PhysicsSettings,
    /// Maximum deviation from straight down, in degrees, for a contact to
    /// count as standing on something.
    pub ground_angle_threshold_deg: f32,
    pub world: WorldSettings,
    pub player: PlayerSettings,
    pub jump: JumpSettings,
    pub actor: ActorSettings,
    pub ai: AiParameterTable,
    /// Steps that nearby actors keep fleeing after a kill.
    pub run_time_steps: u32,
    /// Length of the fade between levels, in steps.
    pub transition_steps: u32,
    pub ranks: RankThresholds,
    pub entry: EntryPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            physics: PhysicsSettings::default(),
            ground_angle_threshold_deg: 30.0,
            world: WorldSettings::default(),
            player: PlayerSettings::default(),
            jump: JumpSettings::default(),
            actor: ActorSettings::default(),
            ai: AiParameterTable::default(),
            run_time_steps: 300,
            transition_steps: 90,
            ranks: RankThresholds::default(),
            entry: EntryPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Ground threshold in radians.
    pub fn ground_angle_threshold(&self) -> f32 {
        self.ground_angle_threshold_deg.to_radians()
    }

    /// Reject values that would make bodies or timers degenerate.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("physics.step", self.physics.step),
            ("player.mass", self.player.mass),
            ("player.half_extents", self.player.half_extents.x.min(self.player.half_extents.y)),
            ("player.hazard_radius", self.player.hazard_radius),
            ("actor.mass", self.actor.mass),
            ("actor.half_extents", self.actor.half_extents.x.min(self.actor.half_extents.y)),
            (
                "actor.corpse_half_extents",
                self.actor.corpse_half_extents.x.min(self.actor.corpse_half_extents.y),
            ),
            ("transition_steps", self.transition_steps as f32),
            ("ai.run_away.max_speedup", self.ai.run_away.max_speedup),
        ];
        match positive.into_iter().find(|(_, v)| !(*v > 0.0)) {
            Some((field, _)) => Err(ConfigurationError::InvalidTuning { field }),
            None => Ok(()),
        }
    }

    /// Layer defaults, an optional TOML file, then `APOLOGISE_*` env vars.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Self::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix("APOLOGISE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}
