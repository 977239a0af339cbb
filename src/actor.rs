//! ActorAI – Walk / RunAway behaviour for non-player actors, and the
//! corpses that replace them.
//!
//! ## Turn policy
//!
//! | Situation                                   | Result                    |
//! |---------------------------------------------|---------------------------|
//! | jump in progress                            | sustain, no block test    |
//! | blocked, already tried jumping              | reverse facing            |
//! | blocked, first time, grounded               | jump                      |
//! | blocked, first time, airborne               | reverse facing            |
//! | moving freely                               | clear the tried flag      |
//!
//! "Blocked" means the horizontal velocity opposes the facing or is at or
//! below `turn_threshold_velocity`. The very first update never jumps or
//! turns.

use crate::collision::{GroundSet, GroundTracker};
use crate::config::{ActorSettings, AiKind, AiParameterTable, AiParams, EngineConfig, JumpSettings};
use crate::physics::{
    BodyId, Layers, PhysicsWorld, ShapeDef, ShapeRole, ShapeTag, SurfaceMaterial,
};
use crate::protocol::SoundCue;
use crate::types::{ActorId, Facing, Vec2};
use log::debug;

// ---------------------------------------------------------------------------
// AI state
// ---------------------------------------------------------------------------

/// Mode plus the mutable per-mode data, rebuilt on every `set_ai`.
#[derive(Debug, Clone, PartialEq)]
pub struct AiState {
    pub kind: AiKind,
    pub params: AiParams,
    /// Set when a jump ended; the next blocked step turns instead.
    pub tried_jumping: bool,
    /// Last measured distance to the player (RunAway only).
    pub proximity: Option<f32>,
}

impl AiState {
    fn new(kind: AiKind, table: &AiParameterTable) -> Self {
        Self {
            kind,
            params: table.get(kind).clone(),
            tried_jumping: false,
            proximity: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

pub struct Actor {
    id: ActorId,
    body: BodyId,
    facing: Facing,
    default_kind: AiKind,
    ai: AiState,
    table: AiParameterTable,
    on: GroundSet,
    jump_timer: u32,
    initialized: bool,
    dead: bool,
    settings: ActorSettings,
    jump: JumpSettings,
    hazard_radius: f32,
}

impl Actor {
    pub fn spawn(
        world: &mut PhysicsWorld,
        id: ActorId,
        position: Vec2,
        facing: Facing,
        kind: AiKind,
        config: &EngineConfig,
    ) -> Option<Self> {
        let settings = &config.actor;
        let body = world.add_dynamic(position);
        world.attach(
            body,
            &ShapeDef::Box {
                half_extents: settings.half_extents,
            },
            SurfaceMaterial::new(settings.friction, settings.elasticity),
            settings.mass,
            ShapeTag::new(ShapeRole::Actor(id), Layers::ACTOR),
            false,
        )?;

        Some(Self {
            id,
            body,
            facing,
            default_kind: kind,
            ai: AiState::new(kind, &config.ai),
            table: config.ai.clone(),
            on: GroundSet::new(),
            jump_timer: 0,
            initialized: false,
            dead: false,
            settings: settings.clone(),
            jump: config.jump.clone(),
            hazard_radius: config.player.hazard_radius,
        })
    }

    /// Switch mode. `None` restores the spawn default with fresh parameters.
    pub fn set_ai(&mut self, kind: Option<AiKind>) {
        let kind = kind.unwrap_or(self.default_kind);
        if kind != self.ai.kind {
            debug!("{} switches to {:?}", self.id, kind);
        }
        self.ai = AiState::new(kind, &self.table);
    }

    /// Flag the actor for reaping. Returns `false` if it was already dead.
    pub fn mark_dead(&mut self) -> bool {
        !std::mem::replace(&mut self.dead, true)
    }

    pub fn update(&mut self, world: &mut PhysicsWorld, player: Vec2, cues: &mut Vec<SoundCue>) {
        let position = world.position(self.body).unwrap_or_default();
        let velocity = world.velocity(self.body).unwrap_or_default();
        let mut turned = false;

        if self.jump_timer > 0 {
            world.apply_impulse(self.body, Vec2::new(0.0, -self.jump.sustain_impulse));
            self.jump_timer -= 1;
            if self.jump_timer == 0 {
                self.ai.tried_jumping = true;
            }
        } else if self.is_blocked(velocity) {
            if self.ai.tried_jumping {
                self.ai.tried_jumping = false;
                self.turn();
                turned = true;
            } else if self.initialized && !self.try_jump(world, cues) {
                self.turn();
                turned = true;
            }
        } else {
            self.ai.tried_jumping = false;
        }

        if self.ai.kind == AiKind::RunAway && !turned {
            let distance = player.distance(position);
            self.ai.proximity = Some(distance);
            if distance < self.hazard_radius + self.ai.params.turn_prox {
                self.ai.tried_jumping = false;
                self.facing = if player.x < position.x {
                    Facing::Right
                } else {
                    Facing::Left
                };
            }
        }

        world.apply_impulse(self.body, Vec2::new(self.facing.sign() * self.accel(), 0.0));
        self.initialized = true;
    }

    fn is_blocked(&self, velocity: Vec2) -> bool {
        velocity.x * self.facing.sign() < 0.0
            || velocity.x.abs() <= self.settings.turn_threshold_velocity
    }

    fn turn(&mut self) {
        self.facing = self.facing.reversed();
    }

    fn try_jump(&mut self, world: &mut PhysicsWorld, cues: &mut Vec<SoundCue>) -> bool {
        if self.on.is_empty() {
            return false;
        }
        cues.push(SoundCue::Jump);
        world.apply_impulse(self.body, Vec2::new(0.0, -self.jump.initial_impulse));
        self.jump_timer = self.jump.sustain_steps;
        if self.jump_timer == 0 {
            self.ai.tried_jumping = true;
        }
        true
    }

    /// Impulse magnitude for this step.
    fn accel(&self) -> f32 {
        let params = &self.ai.params;
        let mut accel = params.accel;
        if self.ai.kind == AiKind::RunAway && params.speedup_prox > 0.0 {
            let r = self.hazard_radius;
            let distance = self.ai.proximity.unwrap_or(r + params.speedup_prox);
            if distance < r + params.speedup_prox {
                accel /= ((distance - r) / params.speedup_prox).max(params.max_speedup);
            }
        }
        accel
    }

    pub fn id(&self) -> ActorId {
        self.id
    }

    pub fn body(&self) -> BodyId {
        self.body
    }

    pub fn facing(&self) -> Facing {
        self.facing
    }

    pub fn ai(&self) -> &AiState {
        &self.ai
    }

    pub fn is_dead(&self) -> bool {
        self.dead
    }

    pub fn is_jumping(&self) -> bool {
        self.jump_timer > 0
    }
}

impl GroundTracker for Actor {
    fn ground(&self) -> &GroundSet {
        &self.on
    }

    fn ground_mut(&mut self) -> &mut GroundSet {
        &mut self.on
    }
}

// ---------------------------------------------------------------------------
// Corpse
// ---------------------------------------------------------------------------

/// A killed actor's remains: falls until it touches ground, then freezes.
pub struct Corpse {
    id: ActorId,
    body: BodyId,
    moving: bool,
    on: GroundSet,
}

impl Corpse {
    pub fn spawn(
        world: &mut PhysicsWorld,
        id: ActorId,
        position: Vec2,
        settings: &ActorSettings,
    ) -> Option<Self> {
        let body = world.add_dynamic(position);
        world.attach(
            body,
            &ShapeDef::Box {
                half_extents: settings.corpse_half_extents,
            },
            SurfaceMaterial::new(settings.friction, settings.elasticity),
            settings.mass,
            ShapeTag::new(ShapeRole::Corpse(id), Layers::COLLIDABLE),
            false,
        )?;
        Some(Self {
            id,
            body,
            moving: true,
            on: GroundSet::new(),
        })
    }

    /// Freeze on first ground contact. Returns `true` on the step it froze;
    /// every later call is a no-op.
    pub fn update(&mut self, world: &mut PhysicsWorld) -> bool {
        if !self.moving || self.on.is_empty() {
            return false;
        }
        self.moving = false;
        world.freeze_body(self.body);
        debug!("Corpse of {} came to rest", self.id);
        true
    }

    pub fn id(&self) -> ActorId {
        self.id
    }

    pub fn body(&self) -> BodyId {
        self.body
    }

    pub fn is_moving(&self) -> bool {
        self.moving
    }
}

impl GroundTracker for Corpse {
    fn ground(&self) -> &GroundSet {
        &self.on
    }

    fn ground_mut(&mut self) -> &mut GroundSet {
        &mut self.on
    }
}

// ---------------------------------------------------------------------------
// Roster slots
// ---------------------------------------------------------------------------

/// One roster entry: a live actor or the corpse that replaced it.
pub enum RosterSlot {
    Alive(Actor),
    Dead(Corpse),
}

impl RosterSlot {
    pub fn body(&self) -> BodyId {
        match self {
            RosterSlot::Alive(a) => a.body(),
            RosterSlot::Dead(c) => c.body(),
        }
    }

    pub fn as_alive_mut(&mut self) -> Option<&mut Actor> {
        match self {
            RosterSlot::Alive(a) => Some(a),
            RosterSlot::Dead(_) => None,
        }
    }

    pub fn as_alive(&self) -> Option<&Actor> {
        match self {
            RosterSlot::Alive(a) => Some(a),
            RosterSlot::Dead(_) => None,
        }
    }

    pub fn tracker_mut(&mut self) -> &mut dyn GroundTracker {
        match self {
            RosterSlot::Alive(a) => a,
            RosterSlot::Dead(c) => c,
        }
    }
}
