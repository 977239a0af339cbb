//! PhysicsWorld – rapier2d wrapper: gravity, damping, fixed stepping,
//! body registration and raw contact events.
//!
//! The world knows nothing about the game beyond each shape's [`ShapeTag`],
//! which it stores so that the collision classifier can look roles up by
//! [`ShapeId`]. Everything above this module speaks in `ShapeId`/`BodyId`
//! and [`Vec2`]; rapier handles never leak out.

use crate::config::PhysicsSettings;
use crate::types::{ActorId, TriggerId, Vec2};
use log::debug;
use rapier2d::prelude::*;
use std::collections::HashMap;

// ---------------------------------------------------------------------------
// Layers
// ---------------------------------------------------------------------------

/// Semantic layer mask. Two shapes interact iff their masks intersect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Layers(pub u32);

impl Layers {
    /// Solid bodies that push each other around.
    pub const COLLIDABLE: Self = Self(1 << 0);

    /// The player's hazard sensor and the actors it can kill.
    pub const HAZARD: Self = Self(1 << 1);

    /// The exit sensor and the player.
    pub const DOOR: Self = Self(1 << 2);

    /// Trigger sensors and the player.
    pub const TRIGGER: Self = Self(1 << 3);

    pub const PLAYER: Self = Self(Self::COLLIDABLE.0 | Self::DOOR.0 | Self::TRIGGER.0);
    pub const ACTOR: Self = Self(Self::COLLIDABLE.0 | Self::HAZARD.0);

    #[inline]
    pub fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    #[inline]
    pub fn intersects(self, other: Self) -> bool {
        (self.0 & other.0) != 0
    }

    fn groups(self) -> InteractionGroups {
        let group = Group::from_bits_truncate(self.0);
        InteractionGroups::new(group, group)
    }
}

impl std::ops::BitOr for Layers {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

// ---------------------------------------------------------------------------
// Identifiers & tags
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShapeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyId(pub u32);

/// Logical entity a shape belongs to, for entities that track ground contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityRef {
    Player,
    /// A live actor or the corpse that replaced it.
    Actor(ActorId),
}

/// What a shape means to the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeRole {
    Geometry,
    Player,
    HazardSensor,
    Actor(ActorId),
    Corpse(ActorId),
    Door,
    Trigger(TriggerId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapeTag {
    pub role: ShapeRole,
    pub layers: Layers,
}

impl ShapeTag {
    pub fn new(role: ShapeRole, layers: Layers) -> Self {
        Self { role, layers }
    }

    /// The owning entity, if this shape's entity keeps a ground set.
    pub fn owner(&self) -> Option<EntityRef> {
        match self.role {
            ShapeRole::Player => Some(EntityRef::Player),
            ShapeRole::Actor(id) | ShapeRole::Corpse(id) => Some(EntityRef::Actor(id)),
            _ => None,
        }
    }
}

/// Read access to shape tags, implemented by [`PhysicsWorld`].
pub trait ShapeLookup {
    fn tag(&self, shape: ShapeId) -> Option<&ShapeTag>;
}

// ---------------------------------------------------------------------------
// Shape descriptors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum ShapeDef {
    /// Axis-aligned box centred on its body.
    Box { half_extents: Vec2 },
    Circle { radius: f32 },
    /// Segment with a collision radius (a capsule when `radius > 0`).
    Segment { a: Vec2, b: Vec2, radius: f32 },
    /// Convex polygon in world coordinates.
    Polygon(Vec<Vec2>),
}

impl ShapeDef {
    fn to_shared(&self) -> Option<SharedShape> {
        match self {
            ShapeDef::Box { half_extents } => {
                Some(SharedShape::cuboid(half_extents.x, half_extents.y))
            }
            ShapeDef::Circle { radius } => Some(SharedShape::ball(*radius)),
            ShapeDef::Segment { a, b, radius } => {
                if a == b {
                    return None;
                }
                let (pa, pb) = (point![a.x, a.y], point![b.x, b.y]);
                if *radius > 0.0 {
                    Some(SharedShape::capsule(pa, pb, *radius))
                } else {
                    Some(SharedShape::segment(pa, pb))
                }
            }
            ShapeDef::Polygon(points) => {
                let pts: Vec<Point<Real>> = points.iter().map(|p| point![p.x, p.y]).collect();
                SharedShape::convex_hull(&pts)
            }
        }
    }
}

/// Surface response of a shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceMaterial {
    pub friction: f32,
    pub elasticity: f32,
}

impl SurfaceMaterial {
    pub fn new(friction: f32, elasticity: f32) -> Self {
        Self {
            friction,
            elasticity,
        }
    }
}

// ---------------------------------------------------------------------------
// Contact events
// ---------------------------------------------------------------------------

/// A begin or separate event between two shapes.
///
/// `normals` point from `a` towards `b`. Sensor overlaps carry no normals.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactEvent {
    pub a: ShapeId,
    pub b: ShapeId,
    pub normals: Vec<Vec2>,
    pub separating: bool,
}

// ---------------------------------------------------------------------------
// PhysicsWorld
// ---------------------------------------------------------------------------

struct ShapeEntry {
    handle: ColliderHandle,
    tag: ShapeTag,
    body: Option<BodyId>,
}

pub struct PhysicsWorld {
    pipeline: PhysicsPipeline,
    gravity: Vector<Real>,
    integration_params: IntegrationParameters,
    island_manager: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    rigid_body_set: RigidBodySet,
    collider_set: ColliderSet,
    impulse_joint_set: ImpulseJointSet,
    multibody_joint_set: MultibodyJointSet,
    ccd_solver: CCDSolver,
    /// rapier linear damping equivalent to the configured retention.
    linear_damping: Real,
    next_id: u32,
    shapes: HashMap<ShapeId, ShapeEntry>,
    collider_to_shape: HashMap<ColliderHandle, ShapeId>,
    /// Colliders removed since the last step; rapier reports their
    /// separation events during the next step.
    retired: HashMap<ColliderHandle, ShapeId>,
    bodies: HashMap<BodyId, RigidBodyHandle>,
    /// Last normals seen per pair, keyed `(min, max)` and oriented min→max.
    normals: HashMap<(ShapeId, ShapeId), Vec<Vec2>>,
}

impl PhysicsWorld {
    pub fn new(settings: &PhysicsSettings) -> Self {
        let integration_params = IntegrationParameters {
            dt: settings.step,
            ..IntegrationParameters::default()
        };

        Self {
            pipeline: PhysicsPipeline::new(),
            gravity: vector![settings.gravity.x, settings.gravity.y],
            integration_params,
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            linear_damping: linear_damping_for(settings.damping, settings.step),
            next_id: 0,
            shapes: HashMap::new(),
            collider_to_shape: HashMap::new(),
            retired: HashMap::new(),
            bodies: HashMap::new(),
            normals: HashMap::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    /// Register a static shape. Returns `None` if the shape is degenerate.
    pub fn add_static(
        &mut self,
        shape: &ShapeDef,
        material: SurfaceMaterial,
        tag: ShapeTag,
        sensor: bool,
    ) -> Option<ShapeId> {
        let collider = collider_builder(shape, material, tag, sensor)?.build();
        let handle = self.collider_set.insert(collider);
        Some(self.track_shape(handle, tag, None))
    }

    /// Register a dynamic, rotation-locked body at `position`.
    pub fn add_dynamic(&mut self, position: Vec2) -> BodyId {
        let rb = RigidBodyBuilder::dynamic()
            .translation(vector![position.x, position.y])
            .lock_rotations()
            .linear_damping(self.linear_damping)
            .can_sleep(false)
            .build();
        let handle = self.rigid_body_set.insert(rb);
        let id = BodyId(self.alloc_id());
        self.bodies.insert(id, handle);
        id
    }

    /// Attach a shape to a dynamic body. Sensors contribute no mass; solid
    /// shapes carry `mass`.
    pub fn attach(
        &mut self,
        body: BodyId,
        shape: &ShapeDef,
        material: SurfaceMaterial,
        mass: f32,
        tag: ShapeTag,
        sensor: bool,
    ) -> Option<ShapeId> {
        let body_handle = *self.bodies.get(&body)?;
        let builder = collider_builder(shape, material, tag, sensor)?;
        let builder = if sensor {
            builder.density(0.0)
        } else {
            builder.mass(mass)
        };
        let handle = self.collider_set.insert_with_parent(
            builder.build(),
            body_handle,
            &mut self.rigid_body_set,
        );
        Some(self.track_shape(handle, tag, Some(body)))
    }

    /// Unregister one shape. Unknown ids are ignored.
    pub fn remove_shape(&mut self, shape: ShapeId) {
        let Some(entry) = self.shapes.remove(&shape) else {
            return;
        };
        self.collider_set.remove(
            entry.handle,
            &mut self.island_manager,
            &mut self.rigid_body_set,
            true,
        );
        self.retire(entry.handle, shape);
    }

    /// Unregister a body and every shape attached to it.
    pub fn remove_body(&mut self, body: BodyId) {
        let Some(handle) = self.bodies.remove(&body) else {
            return;
        };
        let attached: Vec<ShapeId> = self
            .shapes
            .iter()
            .filter(|(_, e)| e.body == Some(body))
            .map(|(id, _)| *id)
            .collect();
        self.rigid_body_set.remove(
            handle,
            &mut self.island_manager,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            true,
        );
        for id in attached {
            if let Some(entry) = self.shapes.remove(&id) {
                self.retire(entry.handle, id);
            }
        }
    }

    /// Turn a dynamic body into an immovable one in place.
    pub fn freeze_body(&mut self, body: BodyId) -> bool {
        let Some(rb) = self.body_mut(body) else {
            return false;
        };
        rb.set_linvel(vector![0.0, 0.0], false);
        rb.set_body_type(RigidBodyType::Fixed, true);
        true
    }

    // -----------------------------------------------------------------------
    // Forces & state
    // -----------------------------------------------------------------------

    pub fn apply_impulse(&mut self, body: BodyId, impulse: Vec2) {
        if let Some(rb) = self.body_mut(body) {
            rb.apply_impulse(vector![impulse.x, impulse.y], true);
        }
    }

    pub fn position(&self, body: BodyId) -> Option<Vec2> {
        let rb = self.rigid_body_set.get(*self.bodies.get(&body)?)?;
        let t = rb.translation();
        Some(Vec2::new(t.x, t.y))
    }

    pub fn velocity(&self, body: BodyId) -> Option<Vec2> {
        let rb = self.rigid_body_set.get(*self.bodies.get(&body)?)?;
        let v = rb.linvel();
        Some(Vec2::new(v.x, v.y))
    }

    pub fn set_position(&mut self, body: BodyId, position: Vec2) {
        if let Some(rb) = self.body_mut(body) {
            rb.set_translation(vector![position.x, position.y], true);
        }
    }

    pub fn set_velocity(&mut self, body: BodyId, velocity: Vec2) {
        if let Some(rb) = self.body_mut(body) {
            rb.set_linvel(vector![velocity.x, velocity.y], true);
        }
    }

    pub fn is_static(&self, body: BodyId) -> bool {
        self.bodies
            .get(&body)
            .and_then(|h| self.rigid_body_set.get(*h))
            .map(|rb| rb.is_fixed())
            .unwrap_or(false)
    }

    pub fn contains_shape(&self, shape: ShapeId) -> bool {
        self.shapes.contains_key(&shape)
    }

    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    // -----------------------------------------------------------------------
    // Stepping
    // -----------------------------------------------------------------------

    /// Advance every dynamic body by exactly `dt` and return the contact
    /// events produced by the step.
    pub fn step(&mut self, dt: f32) -> Vec<ContactEvent> {
        self.integration_params.dt = dt;

        let (collision_send, collision_recv) =
            rapier2d::crossbeam::channel::unbounded::<CollisionEvent>();
        let (force_send, _force_recv) =
            rapier2d::crossbeam::channel::unbounded::<ContactForceEvent>();
        let event_handler = ChannelEventCollector::new(collision_send, force_send);

        self.pipeline.step(
            &self.gravity,
            &self.integration_params,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            None,
            &(),
            &event_handler,
        );

        self.refresh_normals();

        let mut events = Vec::new();
        while let Ok(event) = collision_recv.try_recv() {
            let (h1, h2, separating) = match event {
                CollisionEvent::Started(h1, h2, _) => (h1, h2, false),
                CollisionEvent::Stopped(h1, h2, _) => (h1, h2, true),
            };
            let (Some(a), Some(b)) = (self.lookup(h1), self.lookup(h2)) else {
                debug!("Dropping contact event for untracked collider");
                continue;
            };
            let normals = if separating {
                self.take_normals(a, b)
            } else {
                self.normals_for(a, b)
            };
            events.push(ContactEvent {
                a,
                b,
                normals,
                separating,
            });
        }

        self.retired.clear();
        events
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn alloc_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn track_shape(&mut self, handle: ColliderHandle, tag: ShapeTag, body: Option<BodyId>) -> ShapeId {
        let id = ShapeId(self.alloc_id());
        self.shapes.insert(id, ShapeEntry { handle, tag, body });
        self.collider_to_shape.insert(handle, id);
        id
    }

    fn retire(&mut self, handle: ColliderHandle, shape: ShapeId) {
        self.collider_to_shape.remove(&handle);
        self.retired.insert(handle, shape);
    }

    fn lookup(&self, handle: ColliderHandle) -> Option<ShapeId> {
        self.collider_to_shape
            .get(&handle)
            .or_else(|| self.retired.get(&handle))
            .copied()
    }

    fn body_mut(&mut self, body: BodyId) -> Option<&mut RigidBody> {
        let handle = *self.bodies.get(&body)?;
        self.rigid_body_set.get_mut(handle)
    }

    fn refresh_normals(&mut self) {
        for pair in self.narrow_phase.contact_pairs() {
            if !pair.has_any_active_contact {
                continue;
            }
            let (Some(a), Some(b)) = (
                self.collider_to_shape.get(&pair.collider1).copied(),
                self.collider_to_shape.get(&pair.collider2).copied(),
            ) else {
                continue;
            };
            let flip = a > b;
            let normals = pair
                .manifolds
                .iter()
                .filter(|m| !m.points.is_empty())
                .map(|m| {
                    let n = Vec2::new(m.data.normal.x, m.data.normal.y);
                    if flip {
                        -n
                    } else {
                        n
                    }
                })
                .collect();
            self.normals.insert(pair_key(a, b), normals);
        }
    }

    fn normals_for(&self, a: ShapeId, b: ShapeId) -> Vec<Vec2> {
        let normals = self.normals.get(&pair_key(a, b)).cloned().unwrap_or_default();
        orient(normals, a, b)
    }

    fn take_normals(&mut self, a: ShapeId, b: ShapeId) -> Vec<Vec2> {
        let normals = self.normals.remove(&pair_key(a, b)).unwrap_or_default();
        orient(normals, a, b)
    }
}

impl ShapeLookup for PhysicsWorld {
    fn tag(&self, shape: ShapeId) -> Option<&ShapeTag> {
        self.shapes.get(&shape).map(|e| &e.tag)
    }
}

fn collider_builder(
    shape: &ShapeDef,
    material: SurfaceMaterial,
    tag: ShapeTag,
    sensor: bool,
) -> Option<ColliderBuilder> {
    let shared = shape.to_shared()?;
    Some(
        ColliderBuilder::new(shared)
            .friction(material.friction)
            .friction_combine_rule(CoefficientCombineRule::Multiply)
            .restitution(material.elasticity)
            .collision_groups(tag.layers.groups())
            .sensor(sensor)
            .active_events(ActiveEvents::COLLISION_EVENTS),
    )
}

fn pair_key(a: ShapeId, b: ShapeId) -> (ShapeId, ShapeId) {
    (a.min(b), a.max(b))
}

/// Re-orient min→max normals so they point from `a` to `b`.
fn orient(normals: Vec<Vec2>, a: ShapeId, b: ShapeId) -> Vec<Vec2> {
    if a > b {
        normals.into_iter().map(|n| -n).collect()
    } else {
        normals
    }
}

/// Convert "fraction of velocity kept per second" into rapier's per-step
/// `v *= 1 / (1 + dt * c)` damping coefficient.
pub fn linear_damping_for(retained_per_second: f32, dt: f32) -> f32 {
    if retained_per_second >= 1.0 || dt <= 0.0 {
        return 0.0;
    }
    let per_step = retained_per_second.max(f32::MIN_POSITIVE).powf(dt);
    (1.0 / per_step - 1.0) / dt
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn world() -> PhysicsWorld {
        PhysicsWorld::new(&PhysicsSettings::default())
    }

    fn floor(world: &mut PhysicsWorld) -> ShapeId {
        world
            .add_static(
                &ShapeDef::Segment {
                    a: Vec2::new(0.0, 500.0),
                    b: Vec2::new(1000.0, 500.0),
                    radius: 2.0,
                },
                SurfaceMaterial::new(0.8, 0.0),
                ShapeTag::new(ShapeRole::Geometry, Layers::COLLIDABLE),
                false,
            )
            .unwrap()
    }

    #[test]
    fn damping_conversion() {
        assert_eq!(linear_damping_for(1.0, 0.01), 0.0);
        let c = linear_damping_for(0.00005, 0.01);
        // one step keeps 0.00005^0.01 of the velocity
        assert_relative_eq!(1.0 / (1.0 + 0.01 * c), 0.00005f32.powf(0.01), epsilon = 1e-5);
    }

    #[test]
    fn layers_intersect() {
        assert!(Layers::PLAYER.intersects(Layers::DOOR));
        assert!(!Layers::HAZARD.intersects(Layers::PLAYER));
        assert!(Layers::ACTOR.contains(Layers::HAZARD));
    }

    #[test]
    fn degenerate_polygon_is_rejected() {
        let mut w = world();
        let line = ShapeDef::Polygon(vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(2.0, 2.0),
        ]);
        let tag = ShapeTag::new(ShapeRole::Geometry, Layers::COLLIDABLE);
        assert!(w
            .add_static(&line, SurfaceMaterial::new(0.8, 0.0), tag, false)
            .is_none());
        assert_eq!(w.shape_count(), 0);
    }

    #[test]
    fn falling_box_lands_with_downward_normal() {
        let mut w = world();
        let ground = floor(&mut w);
        let body = w.add_dynamic(Vec2::new(500.0, 470.0));
        let shape = w
            .attach(
                body,
                &ShapeDef::Box {
                    half_extents: Vec2::new(10.0, 15.0),
                },
                SurfaceMaterial::new(0.5, 0.0),
                50.0,
                ShapeTag::new(ShapeRole::Player, Layers::PLAYER),
                false,
            )
            .unwrap();

        let mut landed = None;
        for _ in 0..100 {
            for ev in w.step(0.01) {
                let pair = (ev.a.min(ev.b), ev.a.max(ev.b));
                if !ev.separating && pair == (shape.min(ground), shape.max(ground)) {
                    landed = Some(ev);
                }
            }
            if landed.is_some() {
                break;
            }
        }

        let ev = landed.expect("box should land on the floor");
        assert!(!ev.normals.is_empty());
        let towards_ground = if ev.a == shape { ev.normals[0] } else { -ev.normals[0] };
        assert!(towards_ground.y > 0.9, "normal {:?}", towards_ground);
    }

    #[test]
    fn removing_body_drops_attached_shapes() {
        let mut w = world();
        let body = w.add_dynamic(Vec2::new(100.0, 100.0));
        let tag = ShapeTag::new(ShapeRole::Player, Layers::PLAYER);
        let material = SurfaceMaterial::new(0.5, 0.0);
        let solid = w
            .attach(body, &ShapeDef::Box { half_extents: Vec2::new(10.0, 15.0) }, material, 50.0, tag, false)
            .unwrap();
        let sensor = w
            .attach(
                body,
                &ShapeDef::Circle { radius: 100.0 },
                material,
                0.0,
                ShapeTag::new(ShapeRole::HazardSensor, Layers::HAZARD),
                true,
            )
            .unwrap();

        w.remove_body(body);
        assert!(!w.contains_shape(solid));
        assert!(!w.contains_shape(sensor));
        assert_eq!(w.body_count(), 0);
        assert!(w.position(body).is_none());
        // removing twice is harmless
        w.remove_body(body);
        w.remove_shape(solid);
    }

    #[test]
    fn freeze_makes_body_static() {
        let mut w = world();
        let body = w.add_dynamic(Vec2::new(100.0, 100.0));
        assert!(!w.is_static(body));
        assert!(w.freeze_body(body));
        assert!(w.is_static(body));
        w.step(0.01);
        assert_eq!(w.position(body), Some(Vec2::new(100.0, 100.0)));
    }

    #[test]
    fn owner_follows_role() {
        assert_eq!(
            ShapeTag::new(ShapeRole::Corpse(ActorId(4)), Layers::COLLIDABLE).owner(),
            Some(EntityRef::Actor(ActorId(4)))
        );
        assert_eq!(ShapeTag::new(ShapeRole::Door, Layers::DOOR).owner(), None);
    }
}
