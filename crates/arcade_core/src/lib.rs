//! # Arcade Core
//!
//! Deterministic simulation core for small 2D arcade games.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No networking
//! - No system randomness
//! - No floating-point math (uses fixed-point)
//!
//! Given the same starting world and the same timed inputs, a run always
//! produces the same sequence of states. Replays rely on this: a recording
//! stores a snapshot and the inputs, and playback re-simulates the rest.
//!
//! ## Crate Structure
//!
//! - [`object`] and [`registry`] - Simulation objects and their store
//! - [`event`], [`queue`] and [`dispatch`] - Timestamped events and handlers
//! - [`collision`] - AABB queries and stepped motion
//! - [`world`] - The fixed per-tick step
//! - [`replay`] - Recording and playback
//! - [`instance`] - The tick loop tying it together
//! - [`policies`] - Reference platformer and invaders games

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod behavior;
pub mod collision;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod handlers;
pub mod instance;
pub mod math;
pub mod object;
pub mod policies;
pub mod queue;
pub mod registry;
pub mod replay;
pub mod timeline;
pub mod world;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::behavior::{Behavior, BehaviorRegistry, SimContext};
    pub use crate::collision::{Axis, MotionConfig, MotionResult};
    pub use crate::config::EngineConfig;
    pub use crate::dispatch::{EventHandler, HandlerContext, HandlerId, HandlerRegistry};
    pub use crate::error::{EngineError, Result};
    pub use crate::event::{
        Event, EventKind, EventType, Input, OperatorCommand, PlaybackRate, Tick,
    };
    pub use crate::instance::{GameInstance, TickReport, WorldView};
    pub use crate::math::{Fixed, Rect, Vec2Fixed};
    pub use crate::object::{Capabilities, InstanceId, ObjectId, ObjectKind, SimObject};
    pub use crate::policies::Game;
    pub use crate::queue::EventQueue;
    pub use crate::registry::ObjectRegistry;
    pub use crate::replay::{
        ReplayManager, ReplayMode, ReplayRecord, ReplayStatus, TransitionOutcome,
    };
    pub use crate::world::{SharedState, World};
}
