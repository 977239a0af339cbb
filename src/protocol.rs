//! Host protocol: everything that crosses the boundary between the level
//! engine and the presentation layer that drives it.
//!
//! ## Directions
//!
//! | Type            | Direction      | When                          |
//! |-----------------|----------------|-------------------------------|
//! | [`Intent`]      | host → engine  | any time between steps        |
//! | [`StepReport`]  | engine → host  | returned by every `step()`    |
//! | [`LevelSnapshot`] | engine → host | on demand, once per frame    |
//!
//! ## Design rules
//!
//! 1. Every type is serde-serialisable with snake_case JSON.
//! 2. No physics-layer types leak out (handles, shape ids, rapier types).
//! 3. Presentation hints from the level data are passed through untouched.

use crate::catalog::Presentation;
use crate::config::{AiKind, RankThresholds};
use crate::dialogue::VisibleDialogue;
use crate::types::{ActorId, Direction, Facing, Segment, Vec2};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Intents  (host → engine)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Intent {
    /// Held direction; re-assert every frame it stays held.
    Move { direction: Direction },
    /// Edge-triggered.
    Jump,
    /// Edge-triggered; ignored outside normal play.
    Reset,
    /// Edge-triggered.
    AdvanceDialogue,
}

// ---------------------------------------------------------------------------
// Step events  (engine → host)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoundCue {
    Jump,
    Step,
    Die,
    Win,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rank {
    Best,
    Default,
    Worst,
}

impl Rank {
    /// `kills ≤ low` is best, `kills ≥ high` is worst, anything between is
    /// the default rank.
    pub fn for_kills(kills: u32, thresholds: &RankThresholds) -> Self {
        if kills <= thresholds.low {
            Rank::Best
        } else if kills >= thresholds.high {
            Rank::Worst
        } else {
            Rank::Default
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub rank: Rank,
    pub total_kills: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LevelEvent {
    Sound { cue: SoundCue },
    ActorKilled { actor: ActorId },
    LevelWon,
    TransitionStarted,
    LevelAdvanced { index: usize },
    RunCompleted { outcome: RunOutcome },
    /// A `Custom` trigger action fired.
    Custom { id: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelState {
    Playing,
    WonPendingDialogue,
    Transitioning,
    /// The run outcome is on screen; simulation is held.
    RunComplete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    /// Steps taken since the session started, including held steps.
    pub frame: u64,
    pub state: LevelState,
    /// Whether physics advanced during this step.
    pub simulated: bool,
    pub events: Vec<LevelEvent>,
}

impl StepReport {
    pub fn sounds(&self) -> impl Iterator<Item = SoundCue> + '_ {
        self.events.iter().filter_map(|e| match e {
            LevelEvent::Sound { cue } => Some(*cue),
            _ => None,
        })
    }
}

// ---------------------------------------------------------------------------
// Snapshot  (engine → host)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayerView {
    pub position: Vec2,
    pub facing: Facing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorPhase {
    Alive { ai: AiKind },
    /// Corpse still falling.
    Falling,
    /// Corpse frozen in place.
    AtRest,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActorView {
    pub id: ActorId,
    pub position: Vec2,
    /// Corpses have no facing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facing: Option<Facing>,
    pub phase: ActorPhase,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransitionOverlay {
    pub remaining: u32,
    /// Rises from `0.0` when the fade starts towards `1.0`.
    pub progress: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelSnapshot {
    pub frame: u64,
    pub level_index: usize,
    pub state: LevelState,
    /// Drawn geometry: descriptor and revealed shapes, minus hidden ones.
    /// World boundary edges are not included.
    pub geometry: Vec<Vec<Vec2>>,
    pub entrance: Segment,
    pub exit: Segment,
    pub player: PlayerView,
    pub actors: Vec<ActorView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dialogue: Option<VisibleDialogue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transition: Option<TransitionOverlay>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_outcome: Option<RunOutcome>,
    pub kills: u32,
    pub total_kills: u32,
    pub presentation: Presentation,
}
