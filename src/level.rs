//! Level – the orchestrator. Owns the physics world, the player, the actor
//! roster, door and trigger sensors, and the win / transition / dialogue
//! state, and exposes the step/snapshot contract to the host loop.
//!
//! ## State machine
//!
//! | State                | Physics | Leaves when                              |
//! |----------------------|---------|------------------------------------------|
//! | `Playing`            | yes*    | door reached or `SetWon` trigger fired   |
//! | `WonPendingDialogue` | no      | end line dismissed, or there is none     |
//! | `Transitioning`      | no      | countdown reaches zero                   |
//! | `RunComplete`        | no      | host dismisses the run outcome           |
//!
//! \* Opening dialogue with unread lines holds physics while `Playing`.
//!
//! ## Per-step order
//!
//! 1. Win handling (transition countdown, end line) and return.
//! 2. Blocking dialogue: return.
//! 3. Run queued triggers, then drop their sensors.
//! 4. Step physics; classify and apply every contact.
//! 5. Update the player, then actors (corpses run their freeze check).
//! 6. Reap dead actors into corpses.

use crate::actor::{Actor, Corpse, RosterSlot};
use crate::catalog::{GeometryDef, GeometryShape, LevelCatalog, LevelDescriptor, TriggerAction};
use crate::collision::{CollisionClassifier, Contact, GroundChange, GroundTracker};
use crate::config::{AiKind, EngineConfig, EntryPolicy};
use crate::dialogue::Dialogue;
use crate::error::{ConfigurationError, InvariantViolation, Result};
use crate::physics::{
    ContactEvent, EntityRef, Layers, PhysicsWorld, ShapeDef, ShapeId, ShapeRole, ShapeTag,
    SurfaceMaterial,
};
use crate::player::Player;
use crate::protocol::{
    ActorPhase, ActorView, Intent, LevelEvent, LevelSnapshot, LevelState, PlayerView, Rank,
    RunOutcome, SoundCue, StepReport, TransitionOverlay,
};
use crate::types::{ActorId, Direction, Segment, TriggerId, Vec2};
use log::{debug, info, warn};

/// A trigger sensor that has not fired yet.
#[derive(Debug)]
struct ActiveTrigger {
    id: TriggerId,
    shape: ShapeId,
    actions: Vec<TriggerAction>,
}

/// Where the player goes when a descriptor is loaded.
#[derive(Debug, Clone, Copy)]
enum Placement {
    Start,
    /// Coming through from the previous level's exit.
    Through { previous_exit: Segment },
}

pub struct Level {
    config: EngineConfig,
    catalog: LevelCatalog,
    classifier: CollisionClassifier,
    world: PhysicsWorld,
    player: Player,
    index: usize,
    current: LevelDescriptor,

    // Per-load registrations
    static_shapes: Vec<ShapeId>,
    visible_geometry: Vec<GeometryShape>,
    exit_shape: Option<ShapeId>,
    roster: Vec<RosterSlot>,
    triggers: Vec<ActiveTrigger>,
    pending_triggers: Vec<TriggerId>,

    // Per-load state
    dialogue: Dialogue,
    kills: u32,
    run_timer: u32,
    won: bool,
    transition: Option<u32>,

    // Session state
    total_kills: u32,
    run_outcome: Option<RunOutcome>,
    frame: u64,
    /// Events raised outside `step()`, delivered with the next report.
    pending_events: Vec<LevelEvent>,
}

impl Level {
    /// Build a session at the first level of `catalog`.
    pub fn new(catalog: LevelCatalog, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let first = catalog.get(0)?.clone();

        let mut world = PhysicsWorld::new(&config.physics);
        let player = Player::spawn(&mut world, first.start, &config.player, &config.jump)
            .ok_or(ConfigurationError::InvalidTuning {
                field: "player.half_extents",
            })?;

        let mut level = Self {
            classifier: CollisionClassifier::new(config.ground_angle_threshold()),
            dialogue: Dialogue::new(&first.dialogue),
            config,
            catalog,
            world,
            player,
            index: 0,
            current: first,
            static_shapes: Vec::new(),
            visible_geometry: Vec::new(),
            exit_shape: None,
            roster: Vec::new(),
            triggers: Vec::new(),
            pending_triggers: Vec::new(),
            kills: 0,
            run_timer: 0,
            won: false,
            transition: None,
            total_kills: 0,
            run_outcome: None,
            frame: 0,
            pending_events: Vec::new(),
        };
        level.load(Placement::Start)?;
        Ok(level)
    }

    // -----------------------------------------------------------------------
    // Loading
    // -----------------------------------------------------------------------

    /// (Re)load the descriptor at `self.index`, replacing every registration
    /// from the previous load.
    fn load(&mut self, placement: Placement) -> Result<()> {
        let desc = self.catalog.get(self.index)?.clone();
        self.teardown();

        let world = self.config.world.clone();
        let material = SurfaceMaterial::new(world.friction, world.elasticity);

        if world.width > 0.0 && world.height > 0.0 {
            let (w, h) = (world.width, world.height);
            let edges = [
                (Vec2::new(0.0, 0.0), Vec2::new(w, 0.0)),
                (Vec2::new(w, 0.0), Vec2::new(w, h)),
                (Vec2::new(0.0, h), Vec2::new(w, h)),
                (Vec2::new(0.0, 0.0), Vec2::new(0.0, h)),
            ];
            for (a, b) in edges {
                let shape = ShapeDef::Segment {
                    a,
                    b,
                    radius: world.line_radius,
                };
                let tag = ShapeTag::new(ShapeRole::Geometry, Layers::COLLIDABLE);
                if let Some(id) = self.world.add_static(&shape, material, tag, false) {
                    self.static_shapes.push(id);
                }
            }
        }

        for geometry in &desc.geometry {
            self.add_geometry(geometry);
        }

        let exit = ShapeDef::Segment {
            a: desc.exit.a,
            b: desc.exit.b,
            radius: world.line_radius,
        };
        self.exit_shape = self.world.add_static(
            &exit,
            material,
            ShapeTag::new(ShapeRole::Door, Layers::DOOR),
            true,
        );

        for (i, spawn) in desc.actors.iter().enumerate() {
            let id = ActorId(i as u32);
            match Actor::spawn(&mut self.world, id, spawn.position, spawn.facing, spawn.ai, &self.config) {
                Some(actor) => self.roster.push(RosterSlot::Alive(actor)),
                None => warn!("Could not spawn {} at {}", id, spawn.position),
            }
        }

        for (i, trigger) in desc.triggers.iter().enumerate() {
            let id = TriggerId(i as u32);
            let shape = self.world.add_static(
                &ShapeDef::Polygon(trigger.region.clone()),
                material,
                ShapeTag::new(ShapeRole::Trigger(id), Layers::TRIGGER),
                true,
            );
            match shape {
                Some(shape) => self.triggers.push(ActiveTrigger {
                    id,
                    shape,
                    actions: trigger.actions.clone(),
                }),
                None => warn!("Could not register {}", id),
            }
        }

        match placement {
            Placement::Through { previous_exit }
                if self.config.entry == EntryPolicy::CarryThroughEntrance =>
            {
                let here = self
                    .world
                    .position(self.player.body())
                    .unwrap_or(self.player.position());
                let position = carry_through(here, previous_exit, desc.entrance);
                self.player.carry_to(&mut self.world, position);
            }
            _ => self.player.reset(&mut self.world, desc.start),
        }

        self.dialogue = Dialogue::new(&desc.dialogue);
        self.kills = 0;
        self.run_timer = 0;
        self.won = false;
        self.transition = None;
        self.pending_triggers.clear();

        debug!(
            "Loaded level {}: {} actors, {} geometry, {} triggers",
            self.index,
            self.roster.len(),
            desc.geometry.len(),
            self.triggers.len()
        );
        self.current = desc;
        Ok(())
    }

    /// Unregister every body and sensor from the previous load. The player
    /// survives across loads.
    fn teardown(&mut self) {
        for shape in self.static_shapes.drain(..) {
            self.world.remove_shape(shape);
        }
        if let Some(shape) = self.exit_shape.take() {
            self.world.remove_shape(shape);
        }
        for trigger in self.triggers.drain(..) {
            self.world.remove_shape(trigger.shape);
        }
        for slot in self.roster.drain(..) {
            self.world.remove_body(slot.body());
        }
        self.visible_geometry.clear();
    }

    fn add_geometry(&mut self, geometry: &GeometryDef) {
        let shape = match &geometry.shape {
            GeometryShape::Segment(s) => ShapeDef::Segment {
                a: s.a,
                b: s.b,
                radius: self.config.world.line_radius,
            },
            GeometryShape::Polygon(points) => ShapeDef::Polygon(points.clone()),
        };
        let material = SurfaceMaterial::new(self.config.world.friction, self.config.world.elasticity);
        let tag = ShapeTag::new(ShapeRole::Geometry, Layers::COLLIDABLE);
        match self.world.add_static(&shape, material, tag, false) {
            Some(id) => {
                self.static_shapes.push(id);
                if !geometry.removable {
                    self.visible_geometry.push(geometry.shape.clone());
                }
            }
            None => warn!("Skipping degenerate geometry in level {}", self.index),
        }
    }

    // -----------------------------------------------------------------------
    // Host input
    // -----------------------------------------------------------------------

    pub fn apply(&mut self, intent: Intent) {
        match intent {
            Intent::Move { direction } => self.move_player(direction),
            Intent::Jump => {
                self.jump();
            }
            Intent::Reset => {
                self.reset();
            }
            Intent::AdvanceDialogue => self.advance_dialogue(),
        }
    }

    /// Buffer a held direction. Ignored while the simulation is held.
    pub fn move_player(&mut self, direction: Direction) {
        if self.accepts_movement() {
            self.player.push_intent(direction);
        }
    }

    /// Returns whether a jump launched.
    pub fn jump(&mut self) -> bool {
        if !self.accepts_movement() {
            return false;
        }
        let mut cues = Vec::new();
        let jumped = self.player.jump(&mut self.world, &mut cues);
        self.pending_events
            .extend(cues.into_iter().map(|cue| LevelEvent::Sound { cue }));
        jumped
    }

    /// Restart the current level. Only legal while `Playing`; returns whether
    /// the reset happened.
    pub fn reset(&mut self) -> bool {
        if self.state() != LevelState::Playing {
            debug!("Reset ignored in {:?}", self.state());
            return false;
        }
        match self.load(Placement::Start) {
            Ok(()) => true,
            Err(e) => {
                warn!("Reset failed: {e}");
                false
            }
        }
    }

    pub fn advance_dialogue(&mut self) {
        if self.run_outcome.take().is_some() {
            info!("Run outcome dismissed");
            return;
        }
        if !self.dialogue.is_active() {
            return;
        }
        if self.won && self.transition.is_none() {
            let mut events = Vec::new();
            self.start_transition(&mut events);
            self.pending_events.extend(events);
        } else {
            self.dialogue.advance();
        }
    }

    fn accepts_movement(&self) -> bool {
        self.state() == LevelState::Playing && !self.dialogue.is_blocking()
    }

    // -----------------------------------------------------------------------
    // Step
    // -----------------------------------------------------------------------

    pub fn step(&mut self) -> StepReport {
        self.frame += 1;
        let mut events = std::mem::take(&mut self.pending_events);
        let simulated = self.advance(&mut events);
        StepReport {
            frame: self.frame,
            state: self.state(),
            simulated,
            events,
        }
    }

    /// One step of the state machine. Returns whether physics ran.
    fn advance(&mut self, events: &mut Vec<LevelEvent>) -> bool {
        if self.run_outcome.is_some() {
            return false;
        }

        if self.won {
            match self.transition {
                Some(remaining) => {
                    let remaining = remaining.saturating_sub(1);
                    if remaining == 0 {
                        self.transition = None;
                        self.next_level(events);
                    } else {
                        self.transition = Some(remaining);
                    }
                }
                None if self.dialogue.end_line().is_none() => self.start_transition(events),
                None if !self.dialogue.is_showing_ending() => self.dialogue.show_ending(),
                None => {}
            }
            return false;
        }

        if self.dialogue.is_blocking() {
            return false;
        }

        self.run_pending_triggers(events);

        let contacts = self.world.step(self.config.physics.step);
        for contact in &contacts {
            self.handle_contact(contact, events);
        }

        let mut cues = Vec::new();
        self.player.update(&mut self.world, &mut cues);

        let stop_fleeing = if self.run_timer > 0 {
            self.run_timer -= 1;
            self.run_timer == 0
        } else {
            false
        };
        let player_at = self.player.position();
        for slot in &mut self.roster {
            match slot {
                RosterSlot::Alive(actor) if actor.is_dead() => {}
                RosterSlot::Alive(actor) => {
                    if stop_fleeing {
                        actor.set_ai(None);
                    }
                    actor.update(&mut self.world, player_at, &mut cues);
                }
                RosterSlot::Dead(corpse) => {
                    corpse.update(&mut self.world);
                }
            }
        }

        self.reap();
        events.extend(cues.into_iter().map(|cue| LevelEvent::Sound { cue }));
        true
    }

    fn handle_contact(&mut self, contact: &ContactEvent, events: &mut Vec<LevelEvent>) {
        let classified = match self.classifier.classify(&self.world, contact) {
            Ok(c) => c,
            Err(violation) => {
                warn!("Skipping contact {:?}/{:?}: {violation}", contact.a, contact.b);
                return;
            }
        };

        match classified {
            Contact::Hazard { victim } => self.kill(victim, events),
            Contact::Door => self.set_won(events),
            Contact::Trigger { trigger } => {
                if !self.triggers.iter().any(|t| t.id == trigger) {
                    warn!("{}", InvariantViolation::UnknownTrigger(trigger));
                } else if !self.pending_triggers.contains(&trigger) {
                    debug!("Queued {}", trigger);
                    self.pending_triggers.push(trigger);
                }
            }
            Contact::Ground { changes } => {
                for change in &changes {
                    self.apply_ground_change(change);
                }
            }
            Contact::Ignored => {}
        }
    }

    fn apply_ground_change(&mut self, change: &GroundChange) {
        match change.owner {
            EntityRef::Player => self.player.apply_ground_change(change),
            EntityRef::Actor(id) => {
                match self.roster.iter_mut().find(|slot| slot_id(slot) == id) {
                    Some(slot) => slot.tracker_mut().apply_ground_change(change),
                    None => warn!("{}", InvariantViolation::UnknownOwner(id)),
                }
            }
        }
    }

    fn run_pending_triggers(&mut self, events: &mut Vec<LevelEvent>) {
        for id in std::mem::take(&mut self.pending_triggers) {
            let Some(pos) = self.triggers.iter().position(|t| t.id == id) else {
                warn!("{}", InvariantViolation::UnknownTrigger(id));
                continue;
            };
            let trigger = self.triggers.remove(pos);
            debug!("Firing {} ({} actions)", id, trigger.actions.len());
            for action in &trigger.actions {
                self.run_action(action, events);
            }
            self.world.remove_shape(trigger.shape);
        }
    }

    fn run_action(&mut self, action: &TriggerAction, events: &mut Vec<LevelEvent>) {
        match action {
            TriggerAction::SetWon => self.set_won(events),
            TriggerAction::RevealGeometry { geometry } => self.add_geometry(geometry),
            TriggerAction::ExtendDialogue { line, text } => {
                if !self.dialogue.extend_line(*line, text) {
                    warn!("Trigger extends missing dialogue line {line}");
                }
            }
            TriggerAction::Custom { id } => events.push(LevelEvent::Custom { id: *id }),
        }
    }

    fn kill(&mut self, victim: ActorId, events: &mut Vec<LevelEvent>) {
        let Some(actor) = self
            .roster
            .iter_mut()
            .filter_map(RosterSlot::as_alive_mut)
            .find(|a| a.id() == victim)
        else {
            warn!("{}", InvariantViolation::HazardWithoutVictim);
            return;
        };
        if !actor.mark_dead() {
            return;
        }

        self.kills += 1;
        events.push(LevelEvent::Sound { cue: SoundCue::Die });
        events.push(LevelEvent::ActorKilled { actor: victim });
        debug!("{} killed ({} this level)", victim, self.kills);

        let mut fleeing = false;
        for other in self.roster.iter_mut().filter_map(RosterSlot::as_alive_mut) {
            if other.id() != victim && !other.is_dead() {
                other.set_ai(Some(AiKind::RunAway));
                fleeing = true;
            }
        }
        if fleeing {
            self.run_timer = self.config.run_time_steps;
        }
    }

    /// Replace every dead actor with a corpse at its last position.
    fn reap(&mut self) {
        let offset = self.config.actor.corpse_offset;
        let mut lost = Vec::new();

        for slot in &mut self.roster {
            let RosterSlot::Alive(actor) = &mut *slot else {
                continue;
            };
            if !actor.is_dead() {
                continue;
            }
            let id = actor.id();
            let Some(position) = self.world.position(actor.body()) else {
                warn!("{}", InvariantViolation::ReapWithoutBody(id));
                lost.push(id);
                continue;
            };
            self.world.remove_body(actor.body());
            match Corpse::spawn(&mut self.world, id, position + offset, &self.config.actor) {
                Some(corpse) => *slot = RosterSlot::Dead(corpse),
                None => {
                    warn!("Could not spawn corpse of {}", id);
                    lost.push(id);
                }
            }
        }

        if !lost.is_empty() {
            self.roster.retain(|slot| !lost.contains(&slot_id(slot)));
        }
    }

    fn set_won(&mut self, events: &mut Vec<LevelEvent>) {
        if self.won {
            return;
        }
        self.won = true;
        events.push(LevelEvent::LevelWon);
        events.push(LevelEvent::Sound { cue: SoundCue::Win });
        info!("Level {} won with {} kills", self.index, self.kills);
    }

    fn start_transition(&mut self, events: &mut Vec<LevelEvent>) {
        self.transition = Some(self.config.transition_steps);
        events.push(LevelEvent::TransitionStarted);
    }

    fn next_level(&mut self, events: &mut Vec<LevelEvent>) {
        self.total_kills += self.kills;
        let previous_exit = self.current.exit;
        self.index += 1;

        let placement = if self.index < self.catalog.len() {
            info!("Advancing to level {}", self.index);
            Placement::Through { previous_exit }
        } else {
            let outcome = RunOutcome {
                rank: Rank::for_kills(self.total_kills, &self.config.ranks),
                total_kills: self.total_kills,
            };
            info!("Run complete: {:?} with {} kills", outcome.rank, outcome.total_kills);
            events.push(LevelEvent::RunCompleted { outcome });
            self.run_outcome = Some(outcome);
            self.total_kills = 0;
            self.index = 0;
            Placement::Start
        };

        match self.load(placement) {
            Ok(()) => events.push(LevelEvent::LevelAdvanced { index: self.index }),
            Err(e) => warn!("Failed to load level {}: {e}", self.index),
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn state(&self) -> LevelState {
        if self.run_outcome.is_some() {
            LevelState::RunComplete
        } else if self.won && self.transition.is_some() {
            LevelState::Transitioning
        } else if self.won {
            LevelState::WonPendingDialogue
        } else {
            LevelState::Playing
        }
    }

    pub fn snapshot(&self) -> LevelSnapshot {
        let player_position = self
            .world
            .position(self.player.body())
            .unwrap_or(self.player.position());

        let actors = self
            .roster
            .iter()
            .map(|slot| {
                let position = self.world.position(slot.body()).unwrap_or_default();
                match slot {
                    RosterSlot::Alive(a) => ActorView {
                        id: a.id(),
                        position,
                        facing: Some(a.facing()),
                        phase: ActorPhase::Alive { ai: a.ai().kind },
                    },
                    RosterSlot::Dead(c) => ActorView {
                        id: c.id(),
                        position,
                        facing: None,
                        phase: if c.is_moving() {
                            ActorPhase::Falling
                        } else {
                            ActorPhase::AtRest
                        },
                    },
                }
            })
            .collect();

        let total = self.config.transition_steps.max(1);
        let transition = self.transition.map(|remaining| TransitionOverlay {
            remaining,
            progress: (total.saturating_sub(remaining)) as f32 / total as f32,
        });

        LevelSnapshot {
            frame: self.frame,
            level_index: self.index,
            state: self.state(),
            geometry: self.visible_geometry.iter().map(GeometryShape::points).collect(),
            entrance: self.current.entrance,
            exit: self.current.exit,
            player: PlayerView {
                position: player_position,
                facing: self.player.facing(),
            },
            actors,
            dialogue: self.dialogue.visible(self.transition.is_some()),
            transition,
            run_outcome: self.run_outcome,
            kills: self.kills,
            total_kills: self.total_kills,
            presentation: self.current.presentation.clone(),
        }
    }

    pub fn level_index(&self) -> usize {
        self.index
    }

    pub fn is_won(&self) -> bool {
        self.won
    }

    pub fn kills(&self) -> u32 {
        self.kills
    }

    pub fn total_kills(&self) -> u32 {
        self.total_kills
    }

    pub fn run_timer(&self) -> u32 {
        self.run_timer
    }

    pub fn transition_remaining(&self) -> Option<u32> {
        self.transition
    }

    pub fn run_outcome(&self) -> Option<RunOutcome> {
        self.run_outcome
    }

    pub fn active_triggers(&self) -> usize {
        self.triggers.len()
    }

    pub fn dialogue(&self) -> &Dialogue {
        &self.dialogue
    }

    pub fn player(&self) -> &Player {
        &self.player
    }

    pub fn roster(&self) -> &[RosterSlot] {
        &self.roster
    }

    pub fn world(&self) -> &PhysicsWorld {
        &self.world
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

fn slot_id(slot: &RosterSlot) -> ActorId {
    match slot {
        RosterSlot::Alive(a) => a.id(),
        RosterSlot::Dead(c) => c.id(),
    }
}

/// Mirror the player's offset from the previous exit onto the new entrance.
fn carry_through(position: Vec2, previous_exit: Segment, entrance: Segment) -> Vec2 {
    let mut offset = position - previous_exit.b;
    if entrance.is_vertical() {
        offset.x = -offset.x;
    } else {
        offset.y = -offset.y;
    }
    entrance.b + offset
}
