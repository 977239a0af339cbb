//! PlayerController – buffered movement intents and jump integration.

use crate::collision::{GroundSet, GroundTracker};
use crate::config::{JumpSettings, PlayerSettings};
use crate::physics::{
    BodyId, Layers, PhysicsWorld, ShapeDef, ShapeLookup, ShapeRole, ShapeTag,
    SurfaceMaterial,
};
use crate::protocol::SoundCue;
use crate::types::{Direction, Facing, Vec2};
use log::debug;
use std::collections::HashSet;

pub struct Player {
    body: BodyId,
    position: Vec2,
    facing: Facing,
    on: GroundSet,
    intents: HashSet<Direction>,
    /// Sustained jump steps left; zero when no jump is being held.
    jump_timer: u32,
    /// Moving steps until the next footstep cue.
    step_sound: u32,
    settings: PlayerSettings,
    jump: JumpSettings,
}

impl Player {
    /// Create the player's body, solid box and hazard sensor at `position`.
    pub fn spawn(
        world: &mut PhysicsWorld,
        position: Vec2,
        settings: &PlayerSettings,
        jump: &JumpSettings,
    ) -> Option<Self> {
        let body = world.add_dynamic(position);
        let material = SurfaceMaterial::new(settings.friction, settings.elasticity);
        world.attach(
            body,
            &ShapeDef::Box {
                half_extents: settings.half_extents,
            },
            material,
            settings.mass,
            ShapeTag::new(ShapeRole::Player, Layers::PLAYER),
            false,
        )?;
        world.attach(
            body,
            &ShapeDef::Circle {
                radius: settings.hazard_radius,
            },
            material,
            0.0,
            ShapeTag::new(ShapeRole::HazardSensor, Layers::HAZARD),
            true,
        )?;

        Some(Self {
            body,
            position,
            facing: Facing::Right,
            on: GroundSet::new(),
            intents: HashSet::new(),
            jump_timer: 0,
            step_sound: settings.step_sound_delay,
            settings: settings.clone(),
            jump: jump.clone(),
        })
    }

    /// Move the player to `position` at rest and forget all transient state.
    pub fn reset(&mut self, world: &mut PhysicsWorld, position: Vec2) {
        world.set_position(self.body, position);
        world.set_velocity(self.body, Vec2::zero());
        self.position = position;
        self.facing = Facing::Right;
        self.on.clear();
        self.intents.clear();
        self.jump_timer = 0;
        self.step_sound = self.settings.step_sound_delay;
    }

    /// Place the player at `position` keeping its velocity, as when walking
    /// through into the next level.
    pub fn carry_to(&mut self, world: &mut PhysicsWorld, position: Vec2) {
        world.set_position(self.body, position);
        self.position = position;
        self.on.clear();
        self.intents.clear();
        self.jump_timer = 0;
    }

    // -----------------------------------------------------------------------
    // Intents
    // -----------------------------------------------------------------------

    /// Buffer a held direction for the coming step.
    pub fn push_intent(&mut self, direction: Direction) {
        self.intents.insert(direction);
    }

    /// Launch a jump if standing on something. An airborne call changes
    /// nothing and returns `false`.
    pub fn jump(&mut self, world: &mut PhysicsWorld, cues: &mut Vec<SoundCue>) -> bool {
        if self.on.is_empty() {
            return false;
        }
        if self.on_geometry(&*world) {
            cues.push(SoundCue::Jump);
        }
        world.apply_impulse(self.body, Vec2::new(0.0, -self.jump.initial_impulse));
        self.jump_timer = self.jump.sustain_steps;
        debug!("Player jumped from {}", self.position);
        true
    }

    // -----------------------------------------------------------------------
    // Update
    // -----------------------------------------------------------------------

    pub fn update(&mut self, world: &mut PhysicsWorld, cues: &mut Vec<SoundCue>) {
        if let Some(p) = world.position(self.body) {
            self.position = p;
        }

        let net: f32 = self.intents.iter().map(|d| d.horizontal()).sum();
        if let Some(facing) = Facing::from_sign(net) {
            self.facing = facing;
            if self.on_geometry(&*world) && self.settings.step_sound_delay > 0 {
                self.step_sound = self.step_sound.saturating_sub(1);
                if self.step_sound == 0 {
                    cues.push(SoundCue::Step);
                    self.step_sound = self.settings.step_sound_delay;
                }
            }
        }
        world.apply_impulse(self.body, Vec2::new(net * self.settings.accel, 0.0));

        if self.intents.contains(&Direction::Up) && self.jump_timer > 0 {
            world.apply_impulse(self.body, Vec2::new(0.0, -self.jump.sustain_impulse));
            self.jump_timer -= 1;
        } else {
            // released or expired: this jump cannot be sustained again
            self.jump_timer = 0;
        }

        self.intents.clear();
    }

    /// Standing on at least one owner-less (level geometry) shape.
    fn on_geometry(&self, shapes: &impl ShapeLookup) -> bool {
        self.on
            .iter()
            .any(|s| shapes.tag(s).is_some_and(|t| t.owner().is_none()))
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn body(&self) -> BodyId {
        self.body
    }

    /// Position as of the last update or reset.
    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn facing(&self) -> Facing {
        self.facing
    }

    pub fn jump_timer(&self) -> u32 {
        self.jump_timer
    }

    pub fn intents(&self) -> &HashSet<Direction> {
        &self.intents
    }
}

impl GroundTracker for Player {
    fn ground(&self) -> &GroundSet {
        &self.on
    }

    fn ground_mut(&mut self) -> &mut GroundSet {
        &mut self.on
    }
}
