//! Per-object behavior policies.
//!
//! A [`Behavior`] is registered per [`ObjectKind`] and runs once per tick for
//! every `MOVING` object of that kind, in ascending id order. It gets its
//! own object by value-copy and a [`SimContext`] with read access to the
//! registry; the updated copy is written back before the next object runs.

use std::collections::BTreeMap;

use crate::collision::MotionConfig;
use crate::config::EngineConfig;
use crate::event::{EventKind, Tick};
use crate::object::{InstanceId, ObjectId, ObjectKind, SimObject};
use crate::queue::EventQueue;
use crate::registry::ObjectRegistry;
use crate::world::SharedState;

/// Per-tick update procedure for one object kind.
pub trait Behavior {
    /// Update `object` for the current tick.
    fn update(&self, object: &mut SimObject, ctx: &mut SimContext<'_>);
}

/// Everything a behavior may see or touch during its update.
pub struct SimContext<'a> {
    /// Authoritative clock. During playback this is the replayed tick.
    pub now: Tick,
    /// Authoritative player count. During playback this is the recorded one.
    pub player_count: usize,
    /// Whether the tick is being played back from a recording.
    pub replaying: bool,
    /// Engine settings.
    pub config: &'a EngineConfig,
    /// Live objects as of this point in the tick.
    pub registry: &'a ObjectRegistry,
    /// World-wide counters shared by a game's policies.
    pub shared: &'a mut SharedState,
    pub(crate) queue: &'a mut EventQueue,
    pub(crate) removals: &'a mut Vec<ObjectId>,
}

impl SimContext<'_> {
    /// Schedule an event for `now + event_delay`.
    pub fn emit(&mut self, kind: EventKind, source: InstanceId) -> Tick {
        self.queue.schedule(
            kind,
            self.now,
            self.config.event_delay,
            source,
            self.replaying,
        )
    }

    /// Queue an object for removal at the end of the tick.
    pub fn schedule_removal(&mut self, id: ObjectId) {
        self.removals.push(id);
    }

    /// Motion parameters derived from the engine config.
    #[must_use]
    pub fn motion(&self) -> MotionConfig {
        MotionConfig::from(self.config)
    }
}

/// Behaviors keyed by object kind.
#[derive(Default)]
pub struct BehaviorRegistry {
    by_kind: BTreeMap<ObjectKind, Box<dyn Behavior>>,
}

impl BehaviorRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the behavior for `kind`, replacing any previous one.
    pub fn register(&mut self, kind: ObjectKind, behavior: Box<dyn Behavior>) {
        if self.by_kind.insert(kind, behavior).is_some() {
            tracing::debug!(?kind, "replaced behavior");
        }
    }

    /// Behavior for `kind`.
    #[must_use]
    pub fn get(&self, kind: ObjectKind) -> Option<&dyn Behavior> {
        self.by_kind.get(&kind).map(AsRef::as_ref)
    }

    /// Number of kinds with a behavior.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_kind.len()
    }

    /// Whether no behaviors are installed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_kind.is_empty()
    }
}

impl std::fmt::Debug for BehaviorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BehaviorRegistry")
            .field("kinds", &self.by_kind.keys().collect::<Vec<_>>())
            .finish()
    }
}
