//! Simulation state and the fixed per-tick step.
//!
//! A [`World`] owns everything that must be identical between a live run
//! and its playback: the tick counter, the registry, the pending event
//! queue and the shared counters. Policies are not part of it; the same
//! policy set drives the live world and the playback world.
//!
//! # Step order
//!
//! 1. Advance the tick counter.
//! 2. Run behaviors for `MOVING` objects in ascending id order.
//! 3. Drain and dispatch every event due at the new tick.
//! 4. Commit queued registry insertions and removals.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::behavior::{BehaviorRegistry, SimContext};
use crate::config::EngineConfig;
use crate::dispatch::{HandlerContext, HandlerRegistry};
use crate::error::{EngineError, Result};
use crate::event::{Event, OperatorCommand, Tick};
use crate::object::{Capabilities, ObjectId, SimObject};
use crate::queue::EventQueue;
use crate::registry::{CommitReport, ObjectRegistry};

/// Named integer counters shared by all policies of one world.
///
/// Replaces process-wide statics: the counters are serialized with the
/// world, so a snapshot restores them too.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SharedState {
    counters: BTreeMap<String, i64>,
}

impl SharedState {
    /// Read a counter.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<i64> {
        self.counters.get(name).copied()
    }

    /// Read a counter, or `default` if unset.
    #[must_use]
    pub fn get_or(&self, name: &str, default: i64) -> i64 {
        self.get(name).unwrap_or(default)
    }

    /// Set a counter.
    pub fn set(&mut self, name: &str, value: i64) {
        self.counters.insert(name.to_string(), value);
    }

    /// Add `delta` to a counter (unset counts as zero) and return the result.
    pub fn add(&mut self, name: &str, delta: i64) -> i64 {
        let value = self.counters.entry(name.to_string()).or_insert(0);
        *value += delta;
        *value
    }

    /// Whether a counter is set to a non-zero value.
    #[must_use]
    pub fn flag(&self, name: &str) -> bool {
        self.get_or(name, 0) != 0
    }
}

/// Result of one [`World::step`].
#[derive(Debug, Clone, Default)]
pub struct StepReport {
    /// Tick the world is at after the step.
    pub tick: Tick,
    /// Events dispatched this step, in dispatch order.
    pub dispatched: Vec<Event>,
    /// Registry mutations applied at commit.
    pub commit: CommitReport,
    /// Replay-control commands raised by handlers.
    pub requests: Vec<OperatorCommand>,
    /// [`World::state_hash`] after the commit.
    pub state_hash: u64,
}

/// Complete simulation state of one instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct World {
    tick: Tick,
    registry: ObjectRegistry,
    queue: EventQueue,
    shared: SharedState,
}

impl World {
    /// Create an empty world at tick 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current tick.
    #[must_use]
    pub const fn tick(&self) -> Tick {
        self.tick
    }

    /// Object registry.
    #[must_use]
    pub const fn registry(&self) -> &ObjectRegistry {
        &self.registry
    }

    /// Mutable object registry, for scene setup between ticks.
    pub fn registry_mut(&mut self) -> &mut ObjectRegistry {
        &mut self.registry
    }

    /// Pending events.
    #[must_use]
    pub const fn queue(&self) -> &EventQueue {
        &self.queue
    }

    /// Mutable event queue, for injecting events between ticks.
    pub fn queue_mut(&mut self) -> &mut EventQueue {
        &mut self.queue
    }

    /// Shared policy counters.
    #[must_use]
    pub const fn shared(&self) -> &SharedState {
        &self.shared
    }

    /// Mutable shared policy counters.
    pub fn shared_mut(&mut self) -> &mut SharedState {
        &mut self.shared
    }

    /// Add an object immediately, running its activation transition if it is
    /// `SPAWNABLE`. Meant for scene setup.
    pub fn add_object(&mut self, mut object: SimObject) -> Result<ObjectId> {
        if object.has(Capabilities::SPAWNABLE) {
            object.activate();
        }
        self.registry.add(object)
    }

    /// Run one step. See the module docs for the order.
    pub fn step(
        &mut self,
        config: &EngineConfig,
        behaviors: &BehaviorRegistry,
        handlers: &HandlerRegistry,
        replaying: bool,
    ) -> Result<StepReport> {
        self.tick += 1;
        let now = self.tick;

        self.run_behaviors(config, behaviors, replaying);

        let mut report = StepReport {
            tick: now,
            ..StepReport::default()
        };

        let due = self.queue.drain_due(now);
        for event in &due {
            let mut ctx = HandlerContext {
                now,
                player_count: self.registry.player_count(),
                config,
                registry: &mut self.registry,
                shared: &mut self.shared,
                queue: &mut self.queue,
                requests: &mut report.requests,
                replaying,
            };
            handlers.dispatch(event, &mut ctx, replaying);
        }
        report.dispatched = due;

        report.commit = self.registry.commit()?;
        report.state_hash = self.state_hash();

        #[cfg(debug_assertions)]
        tracing::debug!(
            tick = self.tick,
            state_hash = report.state_hash,
            replaying,
            "World state hash"
        );

        Ok(report)
    }

    fn run_behaviors(&mut self, config: &EngineConfig, behaviors: &BehaviorRegistry, replaying: bool) {
        let mut removals = Vec::new();

        for id in self.registry.ids() {
            let Some(object) = self.registry.get(id) else {
                continue;
            };
            if !object.has(Capabilities::MOVING) || self.registry.is_removal_scheduled(id) {
                continue;
            }
            let Some(behavior) = behaviors.get(object.kind) else {
                continue;
            };

            let mut updated = object.clone();
            {
                let mut ctx = SimContext {
                    now: self.tick,
                    player_count: self.registry.player_count(),
                    replaying,
                    config,
                    registry: &self.registry,
                    shared: &mut self.shared,
                    queue: &mut self.queue,
                    removals: &mut removals,
                };
                behavior.update(&mut updated, &mut ctx);
            }

            if let Some(slot) = self.registry.get_mut(id) {
                *slot = updated;
            }
            for removed in removals.drain(..) {
                self.registry.schedule_removal(removed);
            }
        }
    }

    /// Hash of the full world state, for determinism checks.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();

        self.tick.hash(&mut hasher);

        // Objects in id order
        self.registry.len().hash(&mut hasher);
        for object in self.registry.all() {
            object.hash(&mut hasher);
        }

        self.queue.len().hash(&mut hasher);
        // Provenance is left out so a playback can be compared with the live run
        for event in self.queue.pending() {
            event.kind.hash(&mut hasher);
            event.timestamp.hash(&mut hasher);
            event.source.hash(&mut hasher);
        }

        self.shared.hash(&mut hasher);

        hasher.finish()
    }

    /// Serialize the world to bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serialize(self)
            .map_err(|e| EngineError::Serialization(format!("Failed to serialize world: {}", e)))
    }

    /// Deserialize a world from bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails.
    pub fn deserialize(data: &[u8]) -> Result<Self> {
        bincode::deserialize(data)
            .map_err(|e| EngineError::Serialization(format!("Failed to deserialize world: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::Behavior;
    use crate::event::EventKind;
    use crate::math::{Fixed, Vec2Fixed};
    use crate::object::ObjectKind;

    struct Drift;

    impl Behavior for Drift {
        fn update(&self, object: &mut SimObject, ctx: &mut SimContext<'_>) {
            object.bounds = object.bounds.translated(Vec2Fixed::from_ints(1, 0));
            if ctx.now == 2 {
                ctx.emit(EventKind::Despawn { target: object.id }, 0);
            }
        }
    }

    fn drifting_world() -> (World, BehaviorRegistry, HandlerRegistry) {
        let mut world = World::new();
        world
            .add_object(SimObject::at(ObjectKind::Bullet, 0, 0))
            .unwrap();
        let mut behaviors = BehaviorRegistry::new();
        behaviors.register(ObjectKind::Bullet, Box::new(Drift));
        (world, behaviors, HandlerRegistry::with_core_handlers())
    }

    #[test]
    fn test_step_order_and_deferred_removal() {
        let (mut world, behaviors, handlers) = drifting_world();
        let config = EngineConfig::default();

        let report = world.step(&config, &behaviors, &handlers, false).unwrap();
        assert_eq!(report.tick, 1);
        assert!(report.dispatched.is_empty());

        // Despawn emitted at tick 2, due at tick 3
        world.step(&config, &behaviors, &handlers, false).unwrap();
        assert_eq!(world.registry().len(), 1);
        assert_eq!(world.queue().peek_timestamp(), Some(3));

        let report = world.step(&config, &behaviors, &handlers, false).unwrap();
        assert_eq!(report.dispatched.len(), 1);
        assert_eq!(report.commit.removed, vec![1]);
        assert!(world.registry().is_empty());
    }

    #[test]
    fn test_events_emitted_in_replay_are_marked() {
        let (mut world, behaviors, handlers) = drifting_world();
        let config = EngineConfig::default();
        world.step(&config, &behaviors, &handlers, true).unwrap();
        world.step(&config, &behaviors, &handlers, true).unwrap();
        assert!(world.queue().pending().all(|e| e.replay_sourced));
    }

    #[test]
    fn test_hash_and_serialization_roundtrip() {
        let (mut world, behaviors, handlers) = drifting_world();
        let config = EngineConfig::default();
        world.shared_mut().set("turn", 4);
        world.step(&config, &behaviors, &handlers, false).unwrap();

        let bytes = world.serialize().unwrap();
        let restored = World::deserialize(&bytes).unwrap();
        assert_eq!(restored, world);
        assert_eq!(restored.state_hash(), world.state_hash());

        let mut moved = restored.clone();
        moved.registry_mut().get_mut(1).unwrap().bounds.x = Fixed::from_num(99);
        assert_ne!(moved.state_hash(), world.state_hash());
    }

    #[test]
    fn test_deserialize_garbage_fails() {
        assert!(matches!(
            World::deserialize(&[1, 2, 3]),
            Err(EngineError::Serialization(_))
        ));
    }

    #[test]
    fn test_shared_state() {
        let mut shared = SharedState::default();
        assert_eq!(shared.get("x"), None);
        assert_eq!(shared.get_or("x", 7), 7);
        assert_eq!(shared.add("x", 2), 2);
        assert_eq!(shared.add("x", 3), 5);
        assert!(shared.flag("x"));
        shared.set("x", 0);
        assert!(!shared.flag("x"));
    }
}
