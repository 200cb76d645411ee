//! Session recording and playback.
//!
//! A recording stores a snapshot of the world taken when recording starts
//! and every external input that arrives afterwards, tagged with the tick it
//! arrived on. Playback restores the snapshot into a separate world and
//! feeds the inputs back through the normal event pipeline, so behaviors
//! and handlers reproduce the original run tick for tick.
//!
//! While playing, the manager's playback world is authoritative for the
//! clock and the player count. The live world is paused until playback
//! ends or is stopped.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::behavior::BehaviorRegistry;
use crate::config::EngineConfig;
use crate::dispatch::HandlerRegistry;
use crate::error::{EngineError, Result};
use crate::event::{EventKind, Input, PlaybackRate, Tick};
use crate::object::InstanceId;
use crate::world::{StepReport, World};

/// Replay file format version for compatibility.
pub const REPLAY_VERSION: u32 = 1;

/// One recorded input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayEntry {
    /// Tick the input arrived on.
    pub tick: Tick,
    /// Input source.
    pub source: InstanceId,
    /// The input.
    pub input: Input,
    /// Players registered when the input arrived.
    pub player_count: usize,
}

/// Complete recorded session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayRecord {
    /// Replay format version.
    pub version: u32,
    /// Tick at which recording started.
    pub start_tick: Tick,
    /// Tick at which recording stopped. `None` while still recording.
    pub end_tick: Option<Tick>,
    /// Players registered when recording started.
    pub start_player_count: usize,
    /// Players registered when recording stopped.
    pub end_player_count: usize,
    /// Serialized world at `start_tick`.
    pub snapshot: Vec<u8>,
    /// Inputs in arrival order.
    pub entries: Vec<ReplayEntry>,
    /// World hash at `end_tick`, for verification.
    pub final_hash: u64,
}

impl ReplayRecord {
    /// Start a record from the current state of `world`.
    ///
    /// # Errors
    /// Returns an error if the world cannot be serialized.
    pub fn new(world: &World) -> Result<Self> {
        Ok(Self {
            version: REPLAY_VERSION,
            start_tick: world.tick(),
            end_tick: None,
            start_player_count: world.registry().player_count(),
            end_player_count: 0,
            snapshot: world.serialize()?,
            entries: Vec::new(),
            final_hash: 0,
        })
    }

    /// Append an input.
    pub fn record(&mut self, entry: ReplayEntry) {
        self.entries.push(entry);
    }

    /// Close the record at the current state of `world`.
    pub fn finalize(&mut self, world: &World) {
        self.end_tick = Some(world.tick());
        self.end_player_count = world.registry().player_count();
        self.final_hash = world.state_hash();
    }

    /// Whether recording has stopped.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.end_tick.is_some()
    }

    /// Recorded length in ticks.
    #[must_use]
    pub fn duration(&self) -> u64 {
        self.end_tick
            .map_or(0, |end| end.saturating_sub(self.start_tick))
    }

    /// Number of recorded inputs.
    #[must_use]
    pub fn input_count(&self) -> usize {
        self.entries.len()
    }

    /// Inputs that arrived on `tick`.
    #[must_use]
    pub fn entries_at(&self, tick: Tick) -> Vec<&ReplayEntry> {
        self.entries.iter().filter(|e| e.tick == tick).collect()
    }

    /// Rebuild the world as it was when recording started.
    ///
    /// # Errors
    /// Returns an error if the snapshot cannot be decoded.
    pub fn restore_world(&self) -> Result<World> {
        World::deserialize(&self.snapshot)
    }

    /// Save the record to a file.
    ///
    /// # Errors
    /// Returns an error if serialization or file writing fails.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let bytes = bincode::serialize(self)
            .map_err(|e| EngineError::Serialization(format!("Failed to serialize replay: {}", e)))?;
        std::fs::write(path.as_ref(), bytes)
            .map_err(|e| EngineError::Io(format!("Failed to write replay file: {}", e)))?;
        Ok(())
    }

    /// Load a record from a file.
    ///
    /// # Errors
    /// Returns an error if reading or decoding fails, or the file was
    /// written by another format version.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())
            .map_err(|e| EngineError::Io(format!("Failed to read replay file: {}", e)))?;
        Self::from_bytes(&bytes)
    }

    /// Decode a record, checking its format version.
    ///
    /// # Errors
    /// Returns an error if decoding fails or the version differs.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let record: Self = bincode::deserialize(bytes)
            .map_err(|e| EngineError::Serialization(format!("Failed to deserialize replay: {}", e)))?;

        if record.version != REPLAY_VERSION {
            return Err(EngineError::ReplayVersionMismatch {
                expected: REPLAY_VERSION,
                found: record.version,
            });
        }

        Ok(record)
    }
}

/// Replay manager state, without payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReplayMode {
    /// Neither recording nor playing.
    Idle,
    /// Capturing inputs.
    Recording,
    /// Driving the playback world.
    Playing,
}

impl fmt::Display for ReplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Recording => write!(f, "recording"),
            Self::Playing => write!(f, "playing"),
        }
    }
}

/// What presentation needs to show about the replay manager.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReplayStatus {
    /// Current mode.
    pub mode: ReplayMode,
    /// Playback progress in `[0, 1]`, while playing.
    pub progress: Option<f64>,
    /// Playback rate in ticks per second, while playing.
    pub rate: Option<u32>,
    /// Inputs captured so far, while recording.
    pub recorded_inputs: usize,
}

/// Whether a transition request changed the mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The transition happened.
    Applied,
    /// The request was not valid in the current mode and did nothing.
    Ignored,
}

impl TransitionOutcome {
    /// Whether the transition happened.
    #[must_use]
    pub const fn is_applied(self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Outcome of one playback tick.
#[derive(Debug, Clone)]
pub struct PlaybackStep {
    /// Report from stepping the playback world.
    pub report: StepReport,
    /// Whether the recording was exhausted and the manager returned to idle.
    pub finished: bool,
}

#[derive(Debug)]
struct Playback {
    world: World,
    record: ReplayRecord,
    end_tick: Tick,
    cursor: usize,
    rate: PlaybackRate,
}

impl Playback {
    fn progress(&self) -> f64 {
        let total = self.end_tick.saturating_sub(self.record.start_tick);
        if total == 0 {
            return 1.0;
        }
        let done = self.world.tick().saturating_sub(self.record.start_tick);
        #[allow(clippy::cast_precision_loss)]
        let ratio = done as f64 / total as f64;
        ratio.min(1.0)
    }
}

#[derive(Debug)]
enum State {
    Idle,
    Recording(ReplayRecord),
    Playing(Box<Playback>),
}

/// Records sessions and plays them back.
#[derive(Debug)]
pub struct ReplayManager {
    state: State,
    last: Option<ReplayRecord>,
}

impl Default for ReplayManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplayManager {
    /// Create an idle manager with no record.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: State::Idle,
            last: None,
        }
    }

    /// Current mode.
    #[must_use]
    pub const fn mode(&self) -> ReplayMode {
        match self.state {
            State::Idle => ReplayMode::Idle,
            State::Recording(_) => ReplayMode::Recording,
            State::Playing(_) => ReplayMode::Playing,
        }
    }

    /// Whether inputs are being captured.
    #[must_use]
    pub const fn is_recording(&self) -> bool {
        matches!(self.state, State::Recording(_))
    }

    /// Whether a recording is playing.
    #[must_use]
    pub const fn is_playing(&self) -> bool {
        matches!(self.state, State::Playing(_))
    }

    fn ignored(&self, command: &str) -> TransitionOutcome {
        tracing::debug!(mode = %self.mode(), command, "replay transition ignored");
        TransitionOutcome::Ignored
    }

    fn invalid(&self, command: &str) -> EngineError {
        EngineError::InvalidTransition {
            from: self.mode().to_string(),
            command: command.to_string(),
        }
    }

    /// Idle to Recording, snapshotting `world`. Ignored in any other mode.
    ///
    /// # Errors
    /// Returns an error if the world cannot be serialized.
    pub fn start_recording(&mut self, world: &World) -> Result<TransitionOutcome> {
        if !matches!(self.state, State::Idle) {
            return Ok(self.ignored("start recording"));
        }
        self.state = State::Recording(ReplayRecord::new(world)?);
        tracing::debug!(tick = world.tick(), "recording started");
        Ok(TransitionOutcome::Applied)
    }

    /// Like [`start_recording`](Self::start_recording), failing with
    /// [`EngineError::InvalidTransition`] when not idle.
    ///
    /// # Errors
    /// Returns an error if not idle or the snapshot fails.
    pub fn try_start_recording(&mut self, world: &World) -> Result<()> {
        match self.start_recording(world)? {
            TransitionOutcome::Applied => Ok(()),
            TransitionOutcome::Ignored => Err(self.invalid("start recording")),
        }
    }

    /// Recording to Idle, finalizing the record against `world`. Ignored in
    /// any other mode.
    pub fn stop_recording(&mut self, world: &World) -> TransitionOutcome {
        if !self.is_recording() {
            return self.ignored("stop recording");
        }
        if let State::Recording(mut record) = std::mem::replace(&mut self.state, State::Idle) {
            record.finalize(world);
            tracing::debug!(
                start = record.start_tick,
                end = world.tick(),
                inputs = record.input_count(),
                "recording stopped"
            );
            self.last = Some(record);
        }
        TransitionOutcome::Applied
    }

    /// Like [`stop_recording`](Self::stop_recording), failing with
    /// [`EngineError::InvalidTransition`] when not recording.
    ///
    /// # Errors
    /// Returns an error if not recording.
    pub fn try_stop_recording(&mut self, world: &World) -> Result<()> {
        match self.stop_recording(world) {
            TransitionOutcome::Applied => Ok(()),
            TransitionOutcome::Ignored => Err(self.invalid("stop recording")),
        }
    }

    /// Idle to Playing at `rate`. Ignored unless idle with a finished,
    /// non-empty record.
    ///
    /// # Errors
    /// Returns an error if the record's snapshot cannot be decoded.
    pub fn play_replay(&mut self, rate: PlaybackRate) -> Result<TransitionOutcome> {
        if !matches!(self.state, State::Idle) {
            return Ok(self.ignored("play replay"));
        }
        let Some(record) = self.last.as_ref() else {
            return Ok(self.ignored("play replay"));
        };
        let Some(end_tick) = record.end_tick.filter(|end| *end > record.start_tick) else {
            return Ok(self.ignored("play replay"));
        };

        let world = record.restore_world()?;
        tracing::debug!(
            start = record.start_tick,
            end = end_tick,
            rate = rate.ticks_per_second(),
            "playback started"
        );
        self.state = State::Playing(Box::new(Playback {
            world,
            record: record.clone(),
            end_tick,
            cursor: 0,
            rate,
        }));
        Ok(TransitionOutcome::Applied)
    }

    /// Like [`play_replay`](Self::play_replay), failing with
    /// [`EngineError::InvalidTransition`] when playback cannot start.
    ///
    /// # Errors
    /// Returns an error if playback cannot start or the snapshot fails.
    pub fn try_play_replay(&mut self, rate: PlaybackRate) -> Result<()> {
        match self.play_replay(rate)? {
            TransitionOutcome::Applied => Ok(()),
            TransitionOutcome::Ignored => Err(self.invalid("play replay")),
        }
    }

    /// Playing to Idle before the record is exhausted. The record is kept.
    pub fn stop_playback(&mut self) -> TransitionOutcome {
        if !self.is_playing() {
            return self.ignored("stop playback");
        }
        self.state = State::Idle;
        tracing::debug!("playback stopped");
        TransitionOutcome::Applied
    }

    /// Capture an input while recording. Returns whether it was captured.
    pub fn record_input(
        &mut self,
        tick: Tick,
        source: InstanceId,
        input: Input,
        player_count: usize,
    ) -> bool {
        let State::Recording(record) = &mut self.state else {
            return false;
        };
        record.record(ReplayEntry {
            tick,
            source,
            input,
            player_count,
        });
        true
    }

    /// Replayed clock, while playing.
    #[must_use]
    pub fn clock(&self) -> Option<Tick> {
        match &self.state {
            State::Playing(playback) => Some(playback.world.tick()),
            _ => None,
        }
    }

    /// Replayed player count, while playing.
    #[must_use]
    pub fn player_count(&self) -> Option<usize> {
        match &self.state {
            State::Playing(playback) => Some(playback.world.registry().player_count()),
            _ => None,
        }
    }

    /// Playback rate, while playing.
    #[must_use]
    pub fn playback_rate(&self) -> Option<PlaybackRate> {
        match &self.state {
            State::Playing(playback) => Some(playback.rate),
            _ => None,
        }
    }

    /// The world being played back.
    #[must_use]
    pub fn playback_world(&self) -> Option<&World> {
        match &self.state {
            State::Playing(playback) => Some(&playback.world),
            _ => None,
        }
    }

    /// Mode and progress for presentation.
    #[must_use]
    pub fn status(&self) -> ReplayStatus {
        match &self.state {
            State::Idle => ReplayStatus {
                mode: ReplayMode::Idle,
                progress: None,
                rate: None,
                recorded_inputs: 0,
            },
            State::Recording(record) => ReplayStatus {
                mode: ReplayMode::Recording,
                progress: None,
                rate: None,
                recorded_inputs: record.input_count(),
            },
            State::Playing(playback) => ReplayStatus {
                mode: ReplayMode::Playing,
                progress: Some(playback.progress()),
                rate: Some(playback.rate.ticks_per_second()),
                recorded_inputs: 0,
            },
        }
    }

    /// The most recent finished record.
    #[must_use]
    pub const fn last_record(&self) -> Option<&ReplayRecord> {
        self.last.as_ref()
    }

    /// Replace the stored record, e.g. with one loaded from disk. Ignored
    /// unless idle and the record is finished.
    pub fn load_record(&mut self, record: ReplayRecord) -> TransitionOutcome {
        if !matches!(self.state, State::Idle) || !record.is_complete() {
            return self.ignored("load record");
        }
        self.last = Some(record);
        TransitionOutcome::Applied
    }

    /// Advance the playback world by one tick, injecting the inputs that
    /// arrived on the current replayed tick first. Returns `None` unless
    /// playing.
    ///
    /// # Errors
    /// Propagates fatal errors from the step.
    pub fn step_playback(
        &mut self,
        config: &EngineConfig,
        behaviors: &BehaviorRegistry,
        handlers: &HandlerRegistry,
    ) -> Result<Option<PlaybackStep>> {
        let State::Playing(playback) = &mut self.state else {
            return Ok(None);
        };
        let playback = &mut **playback;

        let now = playback.world.tick();
        while let Some(&entry) = playback.record.entries.get(playback.cursor) {
            if entry.tick > now {
                break;
            }
            let live_count = playback.world.registry().player_count();
            if entry.player_count != live_count {
                tracing::warn!(
                    tick = entry.tick,
                    recorded = entry.player_count,
                    replayed = live_count,
                    "player count diverged during playback"
                );
            }
            playback.world.queue_mut().schedule(
                EventKind::Input { input: entry.input },
                now,
                config.event_delay,
                entry.source,
                true,
            );
            playback.cursor += 1;
        }

        let report = playback.world.step(config, behaviors, handlers, true)?;
        let finished = playback.world.tick() >= playback.end_tick;
        if finished {
            tracing::debug!(tick = playback.world.tick(), "playback finished");
            self.state = State::Idle;
        }

        Ok(Some(PlaybackStep { report, finished }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::OperatorCommand;
    use crate::object::SimObject;
    use crate::math::Fixed;

    fn world_with_player() -> World {
        let mut world = World::new();
        world
            .add_object(SimObject::player(1, Fixed::ZERO, Fixed::ZERO))
            .unwrap();
        world
    }

    #[test]
    fn test_transitions() {
        let world = world_with_player();
        let mut manager = ReplayManager::new();
        assert_eq!(manager.mode(), ReplayMode::Idle);

        // Nothing to play, nothing to stop
        assert_eq!(manager.play_replay(PlaybackRate::Normal).unwrap(), TransitionOutcome::Ignored);
        assert_eq!(manager.stop_recording(&world), TransitionOutcome::Ignored);
        assert_eq!(manager.stop_playback(), TransitionOutcome::Ignored);

        assert!(manager.start_recording(&world).unwrap().is_applied());
        assert_eq!(manager.mode(), ReplayMode::Recording);
        assert_eq!(manager.start_recording(&world).unwrap(), TransitionOutcome::Ignored);
        assert_eq!(manager.play_replay(PlaybackRate::Normal).unwrap(), TransitionOutcome::Ignored);

        assert!(manager.stop_recording(&world).is_applied());
        assert_eq!(manager.mode(), ReplayMode::Idle);
        assert!(manager.last_record().unwrap().is_complete());
    }

    #[test]
    fn test_strict_variants_report_invalid_transition() {
        let world = world_with_player();
        let mut manager = ReplayManager::new();
        let err = manager.try_stop_recording(&world).unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidTransition { ref from, ref command }
                if from == "idle" && command == "stop recording"
        ));
        assert!(manager.try_play_replay(PlaybackRate::Half).is_err());
        manager.try_start_recording(&world).unwrap();
        assert!(manager.try_start_recording(&world).is_err());
    }

    #[test]
    fn test_record_input_only_while_recording() {
        let world = world_with_player();
        let mut manager = ReplayManager::new();
        assert!(!manager.record_input(0, 1, Input::LeftPressed, 1));

        manager.start_recording(&world).unwrap();
        assert!(manager.record_input(0, 1, Input::LeftPressed, 1));
        assert!(manager.record_input(
            0,
            1,
            Input::Operator(OperatorCommand::StopRecording),
            1
        ));
        assert_eq!(manager.status().recorded_inputs, 2);
    }

    #[test]
    fn test_zero_length_record_does_not_play() {
        let world = world_with_player();
        let mut manager = ReplayManager::new();
        manager.start_recording(&world).unwrap();
        manager.stop_recording(&world);
        assert_eq!(manager.play_replay(PlaybackRate::Normal).unwrap(), TransitionOutcome::Ignored);
    }

    #[test]
    fn test_load_record_requires_finished_record() {
        let world = world_with_player();
        let mut manager = ReplayManager::new();
        let unfinished = ReplayRecord::new(&world).unwrap();
        assert_eq!(manager.load_record(unfinished.clone()), TransitionOutcome::Ignored);

        let mut finished = unfinished;
        finished.finalize(&world);
        assert!(manager.load_record(finished).is_applied());
        assert!(manager.last_record().is_some());
    }

    #[test]
    fn test_record_bytes_roundtrip_and_version_check() {
        let world = world_with_player();
        let mut record = ReplayRecord::new(&world).unwrap();
        record.record(ReplayEntry {
            tick: 0,
            source: 1,
            input: Input::RightPressed,
            player_count: 1,
        });
        record.finalize(&world);

        let bytes = bincode::serialize(&record).unwrap();
        let decoded = ReplayRecord::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, record);
        assert_eq!(decoded.restore_world().unwrap(), world);
        assert_eq!(decoded.entries_at(0).len(), 1);

        record.version = REPLAY_VERSION + 1;
        let bytes = bincode::serialize(&record).unwrap();
        assert!(matches!(
            ReplayRecord::from_bytes(&bytes),
            Err(EngineError::ReplayVersionMismatch { found, .. }) if found == REPLAY_VERSION + 1
        ));
    }
}
