//! The tick loop.
//!
//! [`GameInstance`] owns one live [`World`], the policy set, and the
//! [`ReplayManager`]. Each [`tick`](GameInstance::tick) advances either the
//! live world or, while a recording plays, the playback world. Operator
//! commands raised during a live tick are applied after its commit, at the
//! tick boundary.

use std::time::Duration;

use crate::behavior::{Behavior, BehaviorRegistry};
use crate::config::EngineConfig;
use crate::dispatch::{EventHandler, HandlerId, HandlerRegistry};
use crate::error::Result;
use crate::event::{Event, EventKind, EventType, Input, OperatorCommand, PlaybackRate, Tick};
use crate::math::Rect;
use crate::object::{InstanceId, ObjectId, ObjectKind, SimObject};
use crate::registry::ObjectRegistry;
use crate::replay::{ReplayManager, ReplayMode, ReplayRecord, ReplayStatus, TransitionOutcome};
use crate::timeline::Timeline;
use crate::world::World;

/// What happened during one [`GameInstance::tick`].
#[derive(Debug, Clone)]
pub struct TickReport {
    /// Tick of the world that advanced.
    pub tick: Tick,
    /// Whether the playback world advanced rather than the live one.
    pub replaying: bool,
    /// Replay mode after the tick.
    pub mode: ReplayMode,
    /// Events dispatched, in order.
    pub dispatched: Vec<Event>,
    /// Objects inserted at commit.
    pub inserted: Vec<ObjectId>,
    /// Objects removed at commit.
    pub removed: Vec<ObjectId>,
    /// Operator commands applied at the tick boundary, with their outcome.
    pub transitions: Vec<(OperatorCommand, TransitionOutcome)>,
    /// Whether playback ran out this tick.
    pub playback_finished: bool,
    /// Hash of the world that advanced, after its commit.
    pub state_hash: u64,
}

impl TickReport {
    /// Inputs dispatched this tick, with their source.
    #[must_use]
    pub fn inputs(&self) -> Vec<(InstanceId, Input)> {
        self.dispatched
            .iter()
            .filter_map(|e| match e.kind {
                EventKind::Input { input } => Some((e.source, input)),
                _ => None,
            })
            .collect()
    }
}

/// Read-only snapshot of the active world for presentation.
#[derive(Debug, Clone, Copy)]
pub struct WorldView<'a> {
    /// Tick of the active world.
    pub tick: Tick,
    /// Replay manager status.
    pub status: ReplayStatus,
    registry: &'a ObjectRegistry,
}

impl<'a> WorldView<'a> {
    /// All objects in id order.
    pub fn objects(&self) -> impl Iterator<Item = &'a SimObject> + 'a {
        self.registry.all()
    }

    /// Object by id.
    #[must_use]
    pub fn get(&self, id: ObjectId) -> Option<&'a SimObject> {
        self.registry.get(id)
    }

    /// Objects whose box overlaps `rect`, physical or not.
    #[must_use]
    pub fn query(&self, rect: &Rect) -> Vec<&'a SimObject> {
        self.registry
            .all()
            .filter(|o| o.bounds.intersects(rect))
            .collect()
    }

    /// Objects of one kind.
    pub fn of_kind(&self, kind: ObjectKind) -> impl Iterator<Item = &'a SimObject> + 'a {
        self.registry.of_kind(kind)
    }

    /// Number of objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    /// Whether there are no objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Number of player objects.
    #[must_use]
    pub fn player_count(&self) -> usize {
        self.registry.player_count()
    }
}

/// One simulation instance: live world, policies and replay manager.
///
/// # Example
///
/// ```
/// use arcade_core::prelude::*;
///
/// let mut game = GameInstance::new(EngineConfig::default()).unwrap();
/// game.tick().unwrap();
/// assert_eq!(game.clock(), 1);
/// ```
#[derive(Debug)]
pub struct GameInstance {
    config: EngineConfig,
    world: World,
    behaviors: BehaviorRegistry,
    handlers: HandlerRegistry,
    replay: ReplayManager,
    timeline: Timeline,
}

impl GameInstance {
    /// Create an instance with an empty world and the core handlers.
    ///
    /// # Errors
    /// Returns an error if `config` fails validation.
    pub fn new(config: EngineConfig) -> Result<Self> {
        Self::with_world(config, World::new())
    }

    /// Create an instance around an existing world.
    ///
    /// # Errors
    /// Returns an error if `config` fails validation.
    pub fn with_world(config: EngineConfig, world: World) -> Result<Self> {
        config.validate()?;
        let timeline = Timeline::new(config.tick_rate);
        Ok(Self {
            config,
            world,
            behaviors: BehaviorRegistry::new(),
            handlers: HandlerRegistry::with_core_handlers(),
            replay: ReplayManager::new(),
            timeline,
        })
    }

    /// Engine settings.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The live world.
    #[must_use]
    pub const fn world(&self) -> &World {
        &self.world
    }

    /// The live world, for scene setup.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// The world presentation should show: the playback world while
    /// playing, else the live world.
    #[must_use]
    pub fn active_world(&self) -> &World {
        self.replay.playback_world().unwrap_or(&self.world)
    }

    /// Replay manager.
    #[must_use]
    pub const fn replay(&self) -> &ReplayManager {
        &self.replay
    }

    /// Install a behavior for `kind`.
    pub fn register_behavior(&mut self, kind: ObjectKind, behavior: Box<dyn Behavior>) {
        self.behaviors.register(kind, behavior);
    }

    /// Add a handler for `event_type` after the existing ones.
    pub fn register_handler(&mut self, event_type: EventType, handler: Box<dyn EventHandler>) -> HandlerId {
        self.handlers.register(event_type, handler)
    }

    /// Remove a handler.
    pub fn unregister_handler(&mut self, id: HandlerId) -> bool {
        self.handlers.unregister(id)
    }

    /// Mutable behavior and handler registries, for installing a policy set.
    pub fn policies_mut(&mut self) -> (&mut BehaviorRegistry, &mut HandlerRegistry) {
        (&mut self.behaviors, &mut self.handlers)
    }

    /// Add an object to the live world immediately.
    ///
    /// # Errors
    /// Returns [`EngineError::DuplicateIdentity`](crate::error::EngineError::DuplicateIdentity)
    /// on a repeated id.
    pub fn add_object(&mut self, object: SimObject) -> Result<ObjectId> {
        self.world.add_object(object)
    }

    /// Authoritative clock: the replayed tick while playing, else the live
    /// tick.
    #[must_use]
    pub fn clock(&self) -> Tick {
        self.replay.clock().unwrap_or_else(|| self.world.tick())
    }

    /// Authoritative player count.
    #[must_use]
    pub fn player_count(&self) -> usize {
        self.replay
            .player_count()
            .unwrap_or_else(|| self.world.registry().player_count())
    }

    /// Hash of the active world.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        self.active_world().state_hash()
    }

    /// Presentation view of the active world.
    #[must_use]
    pub fn view(&self) -> WorldView<'_> {
        let world = self.active_world();
        WorldView {
            tick: world.tick(),
            status: self.replay.status(),
            registry: world.registry(),
        }
    }

    /// Deliver an external input.
    ///
    /// The input is recorded if a recording is running, then scheduled for
    /// the next tick. While a recording plays the live world is paused and
    /// the input is dropped; returns whether it was accepted.
    pub fn submit_input(&mut self, source: InstanceId, input: Input) -> bool {
        if self.replay.is_playing() {
            tracing::debug!(source, %input, "input dropped during playback");
            return false;
        }
        let now = self.world.tick();
        self.replay
            .record_input(now, source, input, self.world.registry().player_count());
        self.world.queue_mut().schedule(
            EventKind::Input { input },
            now,
            self.config.event_delay,
            source,
            false,
        );
        true
    }

    /// Ask for a player object for `source`. It appears at the next spawn
    /// point once its spawn event is dispatched.
    pub fn join(&mut self, source: InstanceId) -> bool {
        self.submit_input(source, Input::Join)
    }

    /// Run one step.
    ///
    /// # Errors
    /// Returns fatal errors only (duplicate identity, snapshot failures).
    pub fn tick(&mut self) -> Result<TickReport> {
        if let Some(step) = self
            .replay
            .step_playback(&self.config, &self.behaviors, &self.handlers)?
        {
            return Ok(TickReport {
                tick: step.report.tick,
                replaying: true,
                mode: self.replay.mode(),
                dispatched: step.report.dispatched,
                inserted: step.report.commit.inserted,
                removed: step.report.commit.removed,
                transitions: Vec::new(),
                playback_finished: step.finished,
                state_hash: step.report.state_hash,
            });
        }

        let step = self
            .world
            .step(&self.config, &self.behaviors, &self.handlers, false)?;

        let mut transitions = Vec::with_capacity(step.requests.len());
        for command in step.requests {
            let outcome = self.apply_operator(command)?;
            transitions.push((command, outcome));
        }

        Ok(TickReport {
            tick: step.tick,
            replaying: false,
            mode: self.replay.mode(),
            dispatched: step.dispatched,
            inserted: step.commit.inserted,
            removed: step.commit.removed,
            transitions,
            playback_finished: false,
            state_hash: step.state_hash,
        })
    }

    /// Run `count` steps, stopping at the first error.
    ///
    /// # Errors
    /// Returns the first fatal error.
    pub fn run(&mut self, count: u64) -> Result<Vec<TickReport>> {
        let capacity = usize::try_from(count).unwrap_or(0);
        let mut reports = Vec::with_capacity(capacity);
        for _ in 0..count {
            reports.push(self.tick()?);
        }
        Ok(reports)
    }

    /// Account for elapsed wall time and run the ticks that are due, at the
    /// playback rate while playing and the engine rate otherwise. Returns
    /// the number of ticks run.
    ///
    /// # Errors
    /// Returns the first fatal error.
    pub fn advance(&mut self, elapsed: Duration) -> Result<u64> {
        let rate = self
            .replay
            .playback_rate()
            .map_or(self.config.tick_rate, PlaybackRate::ticks_per_second);
        self.timeline.set_rate(rate);
        let due = self.timeline.advance(elapsed);
        for _ in 0..due {
            self.tick()?;
        }
        Ok(due)
    }

    fn apply_operator(&mut self, command: OperatorCommand) -> Result<TransitionOutcome> {
        match command {
            OperatorCommand::StartRecording => self.replay.start_recording(&self.world),
            OperatorCommand::StopRecording => Ok(self.replay.stop_recording(&self.world)),
            OperatorCommand::Playback(rate) => self.replay.play_replay(rate),
        }
    }

    /// Start recording now, at the tick boundary.
    ///
    /// # Errors
    /// Returns an error if the snapshot fails.
    pub fn start_recording(&mut self) -> Result<TransitionOutcome> {
        self.apply_operator(OperatorCommand::StartRecording)
    }

    /// Stop recording now.
    pub fn stop_recording(&mut self) -> TransitionOutcome {
        self.replay.stop_recording(&self.world)
    }

    /// Play the last record at `rate`.
    ///
    /// # Errors
    /// Returns an error if the snapshot cannot be decoded.
    pub fn play_replay(&mut self, rate: PlaybackRate) -> Result<TransitionOutcome> {
        self.apply_operator(OperatorCommand::Playback(rate))
    }

    /// Cancel playback and resume the live world.
    pub fn stop_playback(&mut self) -> TransitionOutcome {
        self.replay.stop_playback()
    }

    /// Make `record` the one [`play_replay`](Self::play_replay) uses.
    pub fn load_record(&mut self, record: ReplayRecord) -> TransitionOutcome {
        self.replay.load_record(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Fixed;

    fn instance_with_player() -> (GameInstance, ObjectId) {
        let mut game = GameInstance::new(EngineConfig::default()).unwrap();
        let id = game
            .add_object(SimObject::player(1, Fixed::ZERO, Fixed::ZERO))
            .unwrap();
        (game, id)
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = EngineConfig {
            event_delay: 0,
            ..EngineConfig::default()
        };
        assert!(GameInstance::new(config).is_err());
    }

    #[test]
    fn test_input_takes_effect_next_tick() {
        let (mut game, id) = instance_with_player();
        assert!(game.submit_input(1, Input::RightPressed));
        assert!(!game.world().registry().get(id).unwrap().state.input.right);

        let report = game.tick().unwrap();
        assert_eq!(report.inputs(), vec![(1, Input::RightPressed)]);
        assert!(game.world().registry().get(id).unwrap().state.input.right);
    }

    #[test]
    fn test_operator_input_drives_replay_manager() {
        let (mut game, _) = instance_with_player();
        game.submit_input(1, Input::Operator(OperatorCommand::StartRecording));
        let report = game.tick().unwrap();
        assert_eq!(
            report.transitions,
            vec![(OperatorCommand::StartRecording, TransitionOutcome::Applied)]
        );
        assert_eq!(report.mode, ReplayMode::Recording);

        game.submit_input(1, Input::Operator(OperatorCommand::StartRecording));
        let report = game.tick().unwrap();
        assert_eq!(
            report.transitions,
            vec![(OperatorCommand::StartRecording, TransitionOutcome::Ignored)]
        );
    }

    #[test]
    fn test_join_spawns_player() {
        let mut game = GameInstance::new(EngineConfig::default()).unwrap();
        assert!(game.join(4));
        game.tick().unwrap(); // Join dispatched, spawn scheduled
        assert_eq!(game.player_count(), 0);
        let report = game.tick().unwrap();
        assert_eq!(report.inserted.len(), 1);
        assert_eq!(game.player_count(), 1);
        assert!(game.view().get(report.inserted[0]).unwrap().state.alive);
    }

    #[test]
    fn test_advance_paces_ticks() {
        let mut game = GameInstance::new(EngineConfig::default()).unwrap();
        assert_eq!(game.advance(Duration::from_millis(500)).unwrap(), 30);
        assert_eq!(game.clock(), 30);
    }

    #[test]
    fn test_view_queries_by_bounds() {
        let (mut game, id) = instance_with_player();
        game.add_object(SimObject::at(ObjectKind::Block, 500, 500))
            .unwrap();
        let view = game.view();
        assert_eq!(view.len(), 2);
        assert_eq!(view.status.mode, ReplayMode::Idle);
        let hits: Vec<_> = view
            .query(&Rect::from_ints(0, 0, 10, 10))
            .into_iter()
            .map(|o| o.id)
            .collect();
        assert_eq!(hits, vec![id]);
    }
}
