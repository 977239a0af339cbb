//! Error types for level loading and the runtime invariant checks.

use crate::types::{ActorId, TriggerId};
use std::path::PathBuf;
use thiserror::Error;

/// Malformed level data or tuning. Fatal at load time, surfaced to the host
/// before any simulation starts.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// The catalog has no levels.
    #[error("level catalog is empty")]
    EmptyCatalog,

    /// A level has no start point.
    #[error("level {level}: missing start point")]
    MissingStart { level: usize },

    /// An exit (or entrance) segment collapses to a point.
    #[error("level {level}: degenerate {which} segment")]
    DegenerateDoor { level: usize, which: &'static str },

    /// A door is declared but the level has no solid geometry at all.
    #[error("level {level}: exit declared with no geometry and no world bounds")]
    DoorWithoutGeometry { level: usize },

    /// A geometry entry cannot form a convex polygon or segment.
    #[error("level {level}: geometry #{index} is degenerate")]
    DegenerateGeometry { level: usize, index: usize },

    /// A trigger region cannot form a convex polygon.
    #[error("level {level}: trigger #{index} region is degenerate")]
    DegenerateTrigger { level: usize, index: usize },

    /// A trigger extends a dialogue line that does not exist.
    #[error("level {level}: trigger #{index} extends missing dialogue line {line}")]
    MissingDialogueLine {
        level: usize,
        index: usize,
        line: usize,
    },

    /// A level index outside the catalog.
    #[error("level index {index} out of range (catalog has {len} levels)")]
    LevelOutOfRange { index: usize, len: usize },

    /// A tuning value that must be positive is not.
    #[error("invalid engine configuration: {field} must be positive")]
    InvalidTuning { field: &'static str },

    /// Level data failed to parse.
    #[error("failed to parse level data: {0}")]
    Parse(#[from] serde_json::Error),

    /// Level data failed to load from disk.
    #[error("failed to read {path}: {source}")]
    Io {
        /// The path that failed.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Layered engine configuration failed to build.
    #[error("invalid engine configuration: {0}")]
    Config(#[from] config::ConfigError),
}

/// Result type for loading operations.
pub type Result<T> = std::result::Result<T, ConfigurationError>;

/// A broken internal assumption detected mid-step.
///
/// These are never returned: the level logs them and skips the offending
/// event, since a dropped contact is preferable to a crashed frame loop.
#[derive(Debug, Error, PartialEq)]
pub enum InvariantViolation {
    #[error("contact references {0}, which is not active")]
    UnknownTrigger(TriggerId),

    #[error("hazard contact with a shape that is not a live actor")]
    HazardWithoutVictim,

    #[error("{0} reached the reaper without a physics body")]
    ReapWithoutBody(ActorId),

    #[error("contact owner {0} is not in the roster")]
    UnknownOwner(ActorId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ConfigurationError::MissingStart { level: 3 };
        assert_eq!(format!("{err}"), "level 3: missing start point");

        let err = ConfigurationError::LevelOutOfRange { index: 9, len: 5 };
        assert!(format!("{err}").contains("catalog has 5"));

        let v = InvariantViolation::UnknownTrigger(TriggerId(2));
        assert!(format!("{v}").contains("trigger#2"));
    }
}
