//! Core level types shared across all modules.

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Mul, Neg, Sub};

// ---------------------------------------------------------------------------
// Basic math
// ---------------------------------------------------------------------------

/// A point or vector in level space.
///
/// Level space is screen-oriented: `x` grows to the right and `y` grows
/// downwards, so gravity is a positive `y` vector.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(from = "[f32; 2]", into = "[f32; 2]")]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    /// Straight down in level space.
    pub const DOWN: Vec2 = Vec2 { x: 0.0, y: 1.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub const fn zero() -> Self {
        Self::new(0.0, 0.0)
    }

    pub fn dot(self, other: Vec2) -> f32 {
        self.x * other.x + self.y * other.y
    }

    /// z component of the 3D cross product.
    pub fn perp_dot(self, other: Vec2) -> f32 {
        self.x * other.y - self.y * other.x
    }

    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    pub fn distance(self, other: Vec2) -> f32 {
        (self - other).length()
    }

    /// Unsigned angle in radians between `self` and `other`, in `[0, π]`.
    ///
    /// Returns `None` when either vector has zero length.
    pub fn angle_to(self, other: Vec2) -> Option<f32> {
        if self.length() == 0.0 || other.length() == 0.0 {
            return None;
        }
        Some(self.perp_dot(other).abs().atan2(self.dot(other)))
    }
}

impl From<[f32; 2]> for Vec2 {
    fn from([x, y]: [f32; 2]) -> Self {
        Self::new(x, y)
    }
}

impl From<Vec2> for [f32; 2] {
    fn from(v: Vec2) -> Self {
        [v.x, v.y]
    }
}

impl Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Vec2) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;
    fn mul(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

impl Neg for Vec2 {
    type Output = Vec2;
    fn neg(self) -> Vec2 {
        Vec2::new(-self.x, -self.y)
    }
}

impl std::fmt::Display for Vec2 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.2}, {:.2})", self.x, self.y)
    }
}

// ---------------------------------------------------------------------------
// Segments
// ---------------------------------------------------------------------------

/// A line segment between two points (doors, thin geometry).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(from = "[Vec2; 2]", into = "[Vec2; 2]")]
pub struct Segment {
    pub a: Vec2,
    pub b: Vec2,
}

impl Segment {
    pub const fn new(a: Vec2, b: Vec2) -> Self {
        Self { a, b }
    }

    pub fn is_degenerate(&self) -> bool {
        self.a == self.b
    }

    /// Whether the segment runs along the `y` axis.
    pub fn is_vertical(&self) -> bool {
        self.a.x == self.b.x
    }
}

impl From<[Vec2; 2]> for Segment {
    fn from([a, b]: [Vec2; 2]) -> Self {
        Self::new(a, b)
    }
}

impl From<Segment> for [Vec2; 2] {
    fn from(s: Segment) -> Self {
        [s.a, s.b]
    }
}

// ---------------------------------------------------------------------------
// Direction & facing
// ---------------------------------------------------------------------------

/// Horizontal facing of the player or an actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Facing {
    Left,
    Right,
}

impl Facing {
    /// `-1.0` for left, `1.0` for right.
    pub fn sign(self) -> f32 {
        match self {
            Facing::Left => -1.0,
            Facing::Right => 1.0,
        }
    }

    pub fn reversed(self) -> Facing {
        match self {
            Facing::Left => Facing::Right,
            Facing::Right => Facing::Left,
        }
    }

    /// Facing for a signed horizontal quantity; `None` for zero.
    pub fn from_sign(value: f32) -> Option<Facing> {
        if value > 0.0 {
            Some(Facing::Right)
        } else if value < 0.0 {
            Some(Facing::Left)
        } else {
            None
        }
    }
}

/// Held movement intent delivered by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Left,
    Up,
    Right,
    Down,
}

impl Direction {
    /// Horizontal contribution of this intent.
    pub fn horizontal(self) -> f32 {
        match self {
            Direction::Left => -1.0,
            Direction::Right => 1.0,
            Direction::Up | Direction::Down => 0.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Index of an actor within the level roster. Corpses inherit the id of the
/// actor they replace.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ActorId(pub u32);

impl std::fmt::Display for ActorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "actor#{}", self.0)
    }
}

/// Index of a trigger region within its level descriptor.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct TriggerId(pub u32);

impl std::fmt::Display for TriggerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "trigger#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::{FRAC_PI_2, FRAC_PI_4, PI};

    #[test]
    fn angle_to_is_unsigned() {
        let right = Vec2::new(1.0, 0.0);
        assert_relative_eq!(right.angle_to(Vec2::DOWN).unwrap(), FRAC_PI_2);
        assert_relative_eq!(Vec2::new(-1.0, 0.0).angle_to(Vec2::DOWN).unwrap(), FRAC_PI_2);
        assert_relative_eq!(Vec2::new(1.0, 1.0).angle_to(Vec2::DOWN).unwrap(), FRAC_PI_4);
        assert_relative_eq!(Vec2::new(0.0, -3.0).angle_to(Vec2::DOWN).unwrap(), PI);
    }

    #[test]
    fn zero_vector_has_no_angle() {
        assert!(Vec2::zero().angle_to(Vec2::DOWN).is_none());
    }

    #[test]
    fn vec2_deserializes_from_pair() {
        let v: Vec2 = serde_json::from_str("[3.0, -4.5]").unwrap();
        assert_eq!(v, Vec2::new(3.0, -4.5));
        let s: Segment = serde_json::from_str("[[0, 0], [0, 500]]").unwrap();
        assert!(s.is_vertical());
    }

    #[test]
    fn facing_from_sign() {
        assert_eq!(Facing::from_sign(2.0), Some(Facing::Right));
        assert_eq!(Facing::from_sign(-0.5), Some(Facing::Left));
        assert_eq!(Facing::from_sign(0.0), None);
        assert_eq!(Facing::Left.reversed(), Facing::Right);
    }
}
