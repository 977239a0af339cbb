//! Apologise level engine
//!
//! The simulation core of a 2D side-scrolling platformer: a fixed-step
//! rigid-body world, semantic collision classification, actor AI, and level
//! progression with scripted triggers and dialogue.
//!
//! ## Architecture
//!
//! ```text
//! Level  (level.rs)              ← step / snapshot contract, win & dialogue state
//!   ├── LevelCatalog  (catalog.rs)     ← validated descriptors
//!   ├── PhysicsWorld  (physics.rs)     ← rapier2d wrapper
//!   ├── CollisionClassifier (collision.rs)
//!   ├── Player  (player.rs)
//!   ├── Actor / Corpse  (actor.rs)
//!   └── Dialogue  (dialogue.rs)
//! ```
//!
//! Hosts talk to a `Level` exclusively through [`protocol`] types: they push
//! [`protocol::Intent`]s, call [`Level::step`] once per frame, and render
//! [`Level::snapshot`].

pub mod actor;
pub mod catalog;
pub mod collision;
pub mod config;
pub mod dialogue;
pub mod error;
pub mod level;
pub mod physics;
pub mod player;
pub mod protocol;
pub mod types;

pub use catalog::{LevelCatalog, LevelDescriptor};
pub use config::EngineConfig;
pub use error::{ConfigurationError, InvariantViolation};
pub use level::Level;
pub use protocol::{Intent, LevelEvent, LevelSnapshot, StepReport};
pub use types::{ActorId, Direction, Facing, Segment, TriggerId, Vec2};
