//! LevelCatalog – the ordered, validated, immutable list of level
//! descriptors.
//!
//! ## JSON format
//!
//! The catalog file is an array of level objects:
//!
//! | Field        | Type                               | Notes                         |
//! |--------------|------------------------------------|-------------------------------|
//! | `start`      | `[x, y]`                           | required                      |
//! | `entrance`   | `[[x, y], [x, y]]`                 | segment                       |
//! | `exit`       | `[[x, y], [x, y]]`                 | segment, becomes the door     |
//! | `actors`     | `[{position, facing, ai}]`         | `facing`: `left`/`right`      |
//! | `geometry`   | `[[[x, y], ...]]` or `[{points, removable}]` | 2 points = segment    |
//! | `dialogue`   | `[string \| null]`                 | last entry = end-of-level line|
//! | `triggers`   | `[{region, actions}]`              | see [`TriggerAction`]         |
//!
//! Presentation hints (`shape_colour`, `message_colour`, `message_arrow`,
//! `background`, `music`) are optional and passed through untouched.

use crate::config::{AiKind, WorldSettings};
use crate::error::{ConfigurationError, Result};
use crate::types::{Facing, Segment, Vec2};
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum GeometryShape {
    Segment(Segment),
    /// Convex polygon; point order is irrelevant.
    Polygon(Vec<Vec2>),
}

impl GeometryShape {
    pub fn points(&self) -> Vec<Vec2> {
        match self {
            GeometryShape::Segment(s) => vec![s.a, s.b],
            GeometryShape::Polygon(points) => points.clone(),
        }
    }

    pub fn is_degenerate(&self) -> bool {
        match self {
            GeometryShape::Segment(s) => s.is_degenerate(),
            GeometryShape::Polygon(points) => !spans_area(points),
        }
    }
}

/// One static geometry primitive.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RawGeometry")]
pub struct GeometryDef {
    pub shape: GeometryShape,
    /// Solid but never drawn.
    pub removable: bool,
}

impl GeometryDef {
    pub fn segment(a: Vec2, b: Vec2) -> Self {
        Self {
            shape: GeometryShape::Segment(Segment::new(a, b)),
            removable: false,
        }
    }

    pub fn polygon(points: Vec<Vec2>) -> Self {
        Self {
            shape: GeometryShape::Polygon(points),
            removable: false,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawGeometry {
    Points(Vec<Vec2>),
    Full {
        points: Vec<Vec2>,
        #[serde(default)]
        removable: bool,
    },
}

impl From<RawGeometry> for GeometryDef {
    fn from(raw: RawGeometry) -> Self {
        let (points, removable) = match raw {
            RawGeometry::Points(points) => (points, false),
            RawGeometry::Full { points, removable } => (points, removable),
        };
        let shape = match points.as_slice() {
            [a, b] => GeometryShape::Segment(Segment::new(*a, *b)),
            _ => GeometryShape::Polygon(points),
        };
        Self { shape, removable }
    }
}

/// At least three points that are not all on one line.
fn spans_area(points: &[Vec2]) -> bool {
    let Some(&origin) = points.first() else {
        return false;
    };
    let Some(&axis) = points.iter().find(|p| **p != origin) else {
        return false;
    };
    let axis = axis - origin;
    points
        .iter()
        .any(|p| axis.perp_dot(*p - origin).abs() > 1e-6)
}

// ---------------------------------------------------------------------------
// Actors & triggers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ActorSpawn {
    pub position: Vec2,
    pub facing: Facing,
    pub ai: AiKind,
}

/// Scripted effect of entering a trigger region.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerAction {
    /// Complete the level.
    SetWon,
    /// Add a solid piece of geometry.
    RevealGeometry { geometry: GeometryDef },
    /// Append text to an opening dialogue line.
    ExtendDialogue { line: usize, text: String },
    /// Reported to the host as an event.
    Custom { id: u32 },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TriggerDef {
    pub region: Vec<Vec2>,
    pub actions: Vec<TriggerAction>,
}

// ---------------------------------------------------------------------------
// Descriptors
// ---------------------------------------------------------------------------

/// Host-only data carried alongside a level.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Presentation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape_colour: Option<[u8; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_colour: Option<[u8; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_arrow: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub music: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LevelDescriptor {
    pub start: Vec2,
    pub entrance: Segment,
    pub exit: Segment,
    pub actors: Vec<ActorSpawn>,
    pub geometry: Vec<GeometryDef>,
    pub dialogue: Vec<Option<String>>,
    pub triggers: Vec<TriggerDef>,
    pub presentation: Presentation,
}

impl LevelDescriptor {
    /// Number of opening dialogue lines (everything but the end line).
    pub fn opening_lines(&self) -> usize {
        match self.dialogue.first() {
            Some(Some(_)) => self.dialogue.len() - 1,
            _ => 0,
        }
    }

    fn validate(&self, level: usize, world: &WorldSettings) -> Result<()> {
        if self.exit.is_degenerate() {
            return Err(ConfigurationError::DegenerateDoor { level, which: "exit" });
        }
        if self.entrance.is_degenerate() {
            return Err(ConfigurationError::DegenerateDoor {
                level,
                which: "entrance",
            });
        }

        let bounded = world.width > 0.0 && world.height > 0.0;
        if !bounded && self.geometry.is_empty() {
            return Err(ConfigurationError::DoorWithoutGeometry { level });
        }

        if let Some(index) = self.geometry.iter().position(|g| g.shape.is_degenerate()) {
            return Err(ConfigurationError::DegenerateGeometry { level, index });
        }

        let opening = self.opening_lines();
        for (index, trigger) in self.triggers.iter().enumerate() {
            if !spans_area(&trigger.region) {
                return Err(ConfigurationError::DegenerateTrigger { level, index });
            }
            for action in &trigger.actions {
                match action {
                    TriggerAction::ExtendDialogue { line, .. } if *line >= opening => {
                        return Err(ConfigurationError::MissingDialogueLine {
                            level,
                            index,
                            line: *line,
                        });
                    }
                    TriggerAction::RevealGeometry { geometry } if geometry.shape.is_degenerate() => {
                        return Err(ConfigurationError::DegenerateTrigger { level, index });
                    }
                    _ => {}
                }
            }
        }

        Ok(())
    }
}

/// On-disk form; `start` is checked rather than left to serde so that a
/// missing start point gets its own error.
#[derive(Deserialize)]
struct RawLevel {
    start: Option<Vec2>,
    entrance: Segment,
    exit: Segment,
    #[serde(default)]
    actors: Vec<ActorSpawn>,
    #[serde(default)]
    geometry: Vec<GeometryDef>,
    #[serde(default)]
    dialogue: Vec<Option<String>>,
    #[serde(default)]
    triggers: Vec<TriggerDef>,
    #[serde(flatten)]
    presentation: Presentation,
}

impl RawLevel {
    fn into_descriptor(self, level: usize) -> Result<LevelDescriptor> {
        let start = self
            .start
            .ok_or(ConfigurationError::MissingStart { level })?;
        Ok(LevelDescriptor {
            start,
            entrance: self.entrance,
            exit: self.exit,
            actors: self.actors,
            geometry: self.geometry,
            dialogue: self.dialogue,
            triggers: self.triggers,
            presentation: self.presentation,
        })
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LevelCatalog {
    levels: Vec<LevelDescriptor>,
}

impl LevelCatalog {
    /// Validate descriptors against the world they will be loaded into.
    pub fn new(levels: Vec<LevelDescriptor>, world: &WorldSettings) -> Result<Self> {
        if levels.is_empty() {
            return Err(ConfigurationError::EmptyCatalog);
        }
        for (index, level) in levels.iter().enumerate() {
            level.validate(index, world)?;
        }
        debug!("Level catalog validated: {} levels", levels.len());
        Ok(Self { levels })
    }

    pub fn from_json_str(json: &str, world: &WorldSettings) -> Result<Self> {
        let raw: Vec<RawLevel> = serde_json::from_str(json)?;
        let levels = raw
            .into_iter()
            .enumerate()
            .map(|(index, level)| level.into_descriptor(index))
            .collect::<Result<Vec<_>>>()?;
        Self::new(levels, world)
    }

    pub fn from_path(path: &Path, world: &WorldSettings) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigurationError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json, world)
    }

    pub fn get(&self, index: usize) -> Result<&LevelDescriptor> {
        self.levels
            .get(index)
            .ok_or(ConfigurationError::LevelOutOfRange {
                index,
                len: self.levels.len(),
            })
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}
