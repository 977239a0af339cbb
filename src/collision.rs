//! CollisionClassifier – turns raw contact events into game events.
//!
//! | Pair (either order)              | Begin            | Separate |
//! |----------------------------------|------------------|----------|
//! | hazard sensor + actor            | `Hazard`         | ignored  |
//! | exit sensor + anything           | `Door`           | ignored  |
//! | trigger sensor + anything        | `Trigger`        | ignored  |
//! | anything with a ground owner     | `Ground` (add)   | `Ground` (remove) |
//!
//! Sensor pairs never resolve physically; ground contacts do.

use crate::error::InvariantViolation;
use crate::physics::{ContactEvent, EntityRef, ShapeId, ShapeLookup, ShapeRole, ShapeTag};
use crate::types::{ActorId, TriggerId, Vec2};
use std::collections::BTreeSet;

// ---------------------------------------------------------------------------
// Ground sets
// ---------------------------------------------------------------------------

/// Shapes an entity is currently standing on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroundSet(BTreeSet<ShapeId>);

impl GroundSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the shape was not already present.
    pub fn insert(&mut self, shape: ShapeId) -> bool {
        self.0.insert(shape)
    }

    /// Removing an absent shape is a no-op.
    pub fn remove(&mut self, shape: ShapeId) -> bool {
        self.0.remove(&shape)
    }

    pub fn contains(&self, shape: ShapeId) -> bool {
        self.0.contains(&shape)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = ShapeId> + '_ {
        self.0.iter().copied()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

/// An entity whose shapes keep a ground set.
pub trait GroundTracker {
    fn ground(&self) -> &GroundSet;
    fn ground_mut(&mut self) -> &mut GroundSet;

    fn is_grounded(&self) -> bool {
        !self.ground().is_empty()
    }

    fn apply_ground_change(&mut self, change: &GroundChange) {
        match change.action {
            GroundAction::Add => {
                self.ground_mut().insert(change.other);
            }
            GroundAction::Remove => {
                self.ground_mut().remove(change.other);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Classified contacts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroundAction {
    Add,
    Remove,
}

/// One ground-set update for one owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroundChange {
    pub owner: EntityRef,
    pub other: ShapeId,
    pub action: GroundAction,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Contact {
    /// The player's hazard sensor touched an actor.
    Hazard { victim: ActorId },
    /// Something reached the exit.
    Door,
    /// A trigger sensor was entered.
    Trigger { trigger: TriggerId },
    /// Ground-set updates; may be empty.
    Ground { changes: Vec<GroundChange> },
    /// A sensor separated, or neither shape is known any more.
    Ignored,
}

impl Contact {
    /// Whether the backend should resolve the pair as a solid contact.
    pub fn resolves_physically(&self) -> bool {
        matches!(self, Contact::Ground { .. })
    }
}

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
pub struct CollisionClassifier {
    /// Radians either side of straight down that count as standing.
    ground_angle_threshold: f32,
}

impl CollisionClassifier {
    pub fn new(ground_angle_threshold: f32) -> Self {
        Self {
            ground_angle_threshold,
        }
    }

    pub fn classify(
        &self,
        shapes: &impl ShapeLookup,
        event: &ContactEvent,
    ) -> Result<Contact, InvariantViolation> {
        let tag_a = shapes.tag(event.a).copied();
        let tag_b = shapes.tag(event.b).copied();

        if let Some(contact) = sensor_contact(tag_a, tag_b) {
            return if event.separating {
                Ok(Contact::Ignored)
            } else {
                contact
            };
        }

        if tag_a.is_none() && tag_b.is_none() {
            return Ok(Contact::Ignored);
        }

        let mut changes = Vec::new();
        let sides = [(tag_a, event.b, false), (tag_b, event.a, true)];
        for (tag, other, flip) in sides {
            let Some(owner) = tag.and_then(|t| t.owner()) else {
                continue;
            };
            if event.separating {
                // Normals can rotate between begin and separate; always drop.
                changes.push(GroundChange {
                    owner,
                    other,
                    action: GroundAction::Remove,
                });
            } else if self.any_standing(&event.normals, flip) {
                changes.push(GroundChange {
                    owner,
                    other,
                    action: GroundAction::Add,
                });
            }
        }

        Ok(Contact::Ground { changes })
    }

    fn any_standing(&self, normals: &[Vec2], flip: bool) -> bool {
        normals.iter().any(|n| {
            let n = if flip { -*n } else { *n };
            n.angle_to(Vec2::DOWN)
                .is_some_and(|angle| angle <= self.ground_angle_threshold)
        })
    }
}

/// Semantic sensor classification, in priority order.
fn sensor_contact(
    a: Option<ShapeTag>,
    b: Option<ShapeTag>,
) -> Option<Result<Contact, InvariantViolation>> {
    let roles = [a.map(|t| t.role), b.map(|t| t.role)];

    for (this, other) in [(roles[0], roles[1]), (roles[1], roles[0])] {
        if this == Some(ShapeRole::HazardSensor) {
            return Some(match other {
                Some(ShapeRole::Actor(victim)) => Ok(Contact::Hazard { victim }),
                _ => Err(InvariantViolation::HazardWithoutVictim),
            });
        }
    }

    if roles.contains(&Some(ShapeRole::Door)) {
        return Some(Ok(Contact::Door));
    }

    roles.iter().find_map(|role| match role {
        Some(ShapeRole::Trigger(trigger)) => Some(Ok(Contact::Trigger { trigger: *trigger })),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::Layers;
    use std::collections::HashMap;

    #[derive(Default)]
    struct Tags(HashMap<ShapeId, ShapeTag>);

    impl ShapeLookup for Tags {
        fn tag(&self, shape: ShapeId) -> Option<&ShapeTag> {
            self.0.get(&shape)
        }
    }

    const PLAYER: ShapeId = ShapeId(1);
    const FLOOR: ShapeId = ShapeId(2);
    const SENSOR: ShapeId = ShapeId(3);
    const ACTOR: ShapeId = ShapeId(4);
    const DOOR: ShapeId = ShapeId(5);
    const TRIGGER: ShapeId = ShapeId(6);
    const WALL: ShapeId = ShapeId(7);

    fn tags() -> Tags {
        let mut t = Tags::default();
        t.0.insert(PLAYER, ShapeTag::new(ShapeRole::Player, Layers::PLAYER));
        t.0.insert(FLOOR, ShapeTag::new(ShapeRole::Geometry, Layers::COLLIDABLE));
        t.0.insert(WALL, ShapeTag::new(ShapeRole::Geometry, Layers::COLLIDABLE));
        t.0.insert(SENSOR, ShapeTag::new(ShapeRole::HazardSensor, Layers::HAZARD));
        t.0.insert(ACTOR, ShapeTag::new(ShapeRole::Actor(ActorId(0)), Layers::ACTOR));
        t.0.insert(DOOR, ShapeTag::new(ShapeRole::Door, Layers::DOOR));
        t.0.insert(TRIGGER, ShapeTag::new(ShapeRole::Trigger(TriggerId(2)), Layers::TRIGGER));
        t
    }

    fn classifier() -> CollisionClassifier {
        CollisionClassifier::new(30f32.to_radians())
    }

    fn begin(a: ShapeId, b: ShapeId, normals: Vec<Vec2>) -> ContactEvent {
        ContactEvent {
            a,
            b,
            normals,
            separating: false,
        }
    }

    #[test]
    fn standing_on_floor_adds_floor() {
        let c = classifier()
            .classify(&tags(), &begin(PLAYER, FLOOR, vec![Vec2::DOWN]))
            .unwrap();
        assert_eq!(
            c,
            Contact::Ground {
                changes: vec![GroundChange {
                    owner: EntityRef::Player,
                    other: FLOOR,
                    action: GroundAction::Add,
                }]
            }
        );
        assert!(c.resolves_physically());
    }

    #[test]
    fn normal_is_flipped_for_second_side() {
        // floor listed first: normal points floor → player, i.e. up
        let c = classifier()
            .classify(&tags(), &begin(FLOOR, PLAYER, vec![Vec2::new(0.0, -1.0)]))
            .unwrap();
        let Contact::Ground { changes } = c else {
            panic!("expected ground contact");
        };
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].other, FLOOR);
    }

    #[test]
    fn wall_contact_is_not_ground() {
        let c = classifier()
            .classify(&tags(), &begin(PLAYER, WALL, vec![Vec2::new(1.0, 0.0)]))
            .unwrap();
        assert_eq!(c, Contact::Ground { changes: vec![] });
    }

    #[test]
    fn threshold_is_inclusive() {
        let c = CollisionClassifier::new(45f32.to_radians());
        let slope = Vec2::new(1.0, 1.0);
        let Contact::Ground { changes } = c.classify(&tags(), &begin(PLAYER, FLOOR, vec![slope])).unwrap()
        else {
            panic!("expected ground contact");
        };
        assert_eq!(changes.len(), 1);

        let Contact::Ground { changes } =
            classifier().classify(&tags(), &begin(PLAYER, FLOOR, vec![slope])).unwrap()
        else {
            panic!("expected ground contact");
        };
        assert!(changes.is_empty());
    }

    #[test]
    fn only_the_upper_owner_stands() {
        // player standing on an actor's head
        let Contact::Ground { changes } = classifier()
            .classify(&tags(), &begin(PLAYER, ACTOR, vec![Vec2::DOWN]))
            .unwrap()
        else {
            panic!("expected ground contact");
        };
        // the actor sees the normal flipped (up) and does not stand on the player
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].owner, EntityRef::Player);
        assert_eq!(changes[0].other, ACTOR);
    }

    #[test]
    fn separation_removes_and_is_idempotent() {
        let mut set = GroundSet::new();
        set.insert(FLOOR);

        let ev = ContactEvent {
            a: PLAYER,
            b: FLOOR,
            normals: vec![],
            separating: true,
        };
        let Contact::Ground { changes } = classifier().classify(&tags(), &ev).unwrap() else {
            panic!("expected ground contact");
        };
        assert_eq!(changes[0].action, GroundAction::Remove);

        assert!(set.remove(changes[0].other));
        assert!(!set.remove(changes[0].other));
        assert!(set.is_empty());
    }

    #[test]
    fn begin_twice_adds_once() {
        let mut set = GroundSet::new();
        assert!(set.insert(FLOOR));
        assert!(!set.insert(FLOOR));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn hazard_door_and_trigger_do_not_resolve() {
        let k = classifier();
        let t = tags();
        let hazard = k.classify(&t, &begin(ACTOR, SENSOR, vec![])).unwrap();
        assert_eq!(hazard, Contact::Hazard { victim: ActorId(0) });
        assert!(!hazard.resolves_physically());

        assert_eq!(k.classify(&t, &begin(PLAYER, DOOR, vec![])).unwrap(), Contact::Door);
        assert_eq!(
            k.classify(&t, &begin(TRIGGER, PLAYER, vec![])).unwrap(),
            Contact::Trigger { trigger: TriggerId(2) }
        );
    }

    #[test]
    fn sensor_separation_is_ignored() {
        let ev = ContactEvent {
            a: PLAYER,
            b: DOOR,
            normals: vec![],
            separating: true,
        };
        assert_eq!(classifier().classify(&tags(), &ev).unwrap(), Contact::Ignored);
    }

    #[test]
    fn hazard_without_actor_is_violation() {
        let err = classifier()
            .classify(&tags(), &begin(SENSOR, FLOOR, vec![]))
            .unwrap_err();
        assert_eq!(err, InvariantViolation::HazardWithoutVictim);
    }

    #[test]
    fn removed_shape_still_clears_owner() {
        // FLOOR tag gone (removed last step); player still loses it
        let mut t = tags();
        t.0.remove(&FLOOR);
        let ev = ContactEvent {
            a: FLOOR,
            b: PLAYER,
            normals: vec![Vec2::new(0.0, -1.0)],
            separating: true,
        };
        let Contact::Ground { changes } = classifier().classify(&t, &ev).unwrap() else {
            panic!("expected ground contact");
        };
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].other, FLOOR);
    }
}
