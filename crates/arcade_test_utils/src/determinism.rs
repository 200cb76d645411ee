//! Determinism testing utilities.
//!
//! Provides a harness for verifying that the simulation
//! produces identical results given identical inputs, and that a replay
//! reproduces the live run it was recorded from.
//!
//! # Testing Strategy
//!
//! Replays store a snapshot plus inputs, so the simulation must be 100%
//! deterministic. Sources of non-determinism include:
//!
//! - **Floating-point math**: We use fixed-point arithmetic via
//!   [`arcade_core::math::Fixed`] throughout.
//!
//! - **HashMap iteration order**: Rust's default hasher is randomized.
//!   The registry and queue are ordered maps.
//!
//! - **Process-wide state**: Policy counters live in the world's
//!   [`SharedState`](arcade_core::world::SharedState), never in statics.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use arcade_core::event::{Input, PlaybackRate, Tick};
use arcade_core::instance::GameInstance;
use arcade_core::object::InstanceId;
use arcade_core::world::World;

use crate::fixtures::{drive, ScriptedInput};

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for deterministic simulation).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the simulation was deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the simulation produced different hashes across runs.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Simulation is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a simulation multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run the simulation
/// * `ticks` - Number of ticks to simulate per run
/// * `setup` - Function to create initial simulation state
/// * `step` - Function to advance simulation by one tick
/// * `hash` - Function to compute state hash
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S, Tick),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for tick in 0..ticks {
            step(&mut state, tick);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Run the same scripted game twice and compare final hashes.
///
/// # Panics
///
/// Panics if a tick returns a fatal error.
pub fn verify_game_determinism<F>(setup_fn: F, script: &[ScriptedInput], ticks: u64) -> DeterminismResult
where
    F: Fn() -> GameInstance,
{
    let mut result = verify_determinism(
        2,
        1,
        &setup_fn,
        |game, _| {
            drive(game, script, ticks).expect("scripted run failed");
        },
        GameInstance::state_hash,
    );
    result.ticks = ticks;
    result
}

/// Compare two scripted runs tick-by-tick, finding the first divergence.
///
/// # Returns
///
/// `None` if the runs match, `Some(tick)` if they diverge at that tick.
///
/// # Panics
///
/// Panics if a tick returns a fatal error.
pub fn find_first_divergence<F>(setup_fn: F, script: &[ScriptedInput], ticks: u64) -> Option<u64>
where
    F: Fn() -> GameInstance,
{
    let mut first = setup_fn();
    let mut second = setup_fn();

    if first.state_hash() != second.state_hash() {
        return Some(0);
    }

    for _ in 0..ticks {
        for game in [&mut first, &mut second] {
            drive(game, script, 1).expect("scripted run failed");
        }
        if first.state_hash() != second.state_hash() {
            return Some(first.clock());
        }
    }

    None
}

/// Verify that a serialization round-trip preserves the world exactly.
pub fn verify_serialization_determinism(world: &World) -> bool {
    let Ok(bytes) = world.serialize() else {
        return false;
    };
    let Ok(restored) = World::deserialize(&bytes) else {
        return false;
    };
    restored.state_hash() == world.state_hash()
}

/// One run observed tick by tick, relative to where it started.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Trace {
    /// State hash after each tick.
    pub hashes: Vec<u64>,
    /// Dispatched inputs as `(ticks since start, source, input)`.
    pub inputs: Vec<(u64, InstanceId, Input)>,
}

/// A recorded live run next to its playback.
#[derive(Debug, Clone)]
pub struct ReplayCheck {
    /// Live run while recording.
    pub live: Trace,
    /// Playback of the recording.
    pub replay: Trace,
    /// Hash stored in the record when recording stopped.
    pub record_hash: u64,
}

impl ReplayCheck {
    /// Whether playback matched the live run tick for tick.
    #[must_use]
    pub fn is_faithful(&self) -> bool {
        self.live == self.replay && self.replay.hashes.last() == Some(&self.record_hash)
    }

    /// First tick (relative) at which playback diverged.
    #[must_use]
    pub fn first_divergence(&self) -> Option<usize> {
        self.live
            .hashes
            .iter()
            .zip(&self.replay.hashes)
            .position(|(a, b)| a != b)
    }

    /// Assert that playback matched the live run.
    ///
    /// # Panics
    ///
    /// Panics with the first divergent tick if playback did not match.
    pub fn assert_faithful(&self) {
        assert!(
            self.is_faithful(),
            "Replay diverged from the live run!\n\
             First divergent tick: {:?}\n\
             Live ticks: {}, replayed ticks: {}\n\
             Live inputs: {:?}\n\
             Replayed inputs: {:?}",
            self.first_divergence(),
            self.live.hashes.len(),
            self.replay.hashes.len(),
            self.live.inputs,
            self.replay.inputs
        );
    }
}

/// Record `ticks` ticks of `script` on `game`, then play the recording back
/// at `rate` and collect both traces.
///
/// Script ticks are relative to the start of the recording.
///
/// # Panics
///
/// Panics if recording or playback cannot start, or on a fatal tick error.
pub fn record_and_replay(
    game: &mut GameInstance,
    script: &[ScriptedInput],
    ticks: u64,
    rate: PlaybackRate,
) -> ReplayCheck {
    assert!(
        game.start_recording().expect("snapshot failed").is_applied(),
        "recording did not start"
    );
    let start = game.clock();

    let mut live = Trace::default();
    for offset in 0..ticks {
        for scripted in script.iter().filter(|s| s.tick == offset) {
            game.submit_input(scripted.source, scripted.input);
        }
        let report = game.tick().expect("live tick failed");
        live.hashes.push(report.state_hash);
        for (source, input) in report.inputs() {
            live.inputs.push((report.tick - start, source, input));
        }
    }

    assert!(game.stop_recording().is_applied(), "recording did not stop");
    let record_hash = game
        .replay()
        .last_record()
        .map(|r| r.final_hash)
        .expect("no record after stopping");

    assert!(
        game.play_replay(rate).expect("snapshot decode failed").is_applied(),
        "playback did not start"
    );

    let mut replay = Trace::default();
    loop {
        let report = game.tick().expect("playback tick failed");
        assert!(report.replaying, "live world advanced during playback");
        replay.hashes.push(report.state_hash);
        for (source, input) in report.inputs() {
            replay.inputs.push((report.tick - start, source, input));
        }
        if report.playback_finished {
            break;
        }
    }

    tracing::debug!(
        live_ticks = live.hashes.len(),
        replay_ticks = replay.hashes.len(),
        "replay check complete"
    );

    ReplayCheck {
        live,
        replay,
        record_hash,
    }
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for determinism testing.
///
/// These strategies generate random but reproducible inputs for
/// property-based testing of simulation determinism.
pub mod strategies {
    use proptest::prelude::*;

    use arcade_core::event::Input;
    use arcade_core::math::{Fixed, Rect};

    use crate::fixtures::ScriptedInput;

    /// Generate a fixed-point coordinate inside the default world.
    pub fn arb_fixed_position() -> impl Strategy<Value = Fixed> {
        (0i32..800i32).prop_map(Fixed::from_num)
    }

    /// Generate a non-empty rectangle with whole-number edges.
    pub fn arb_rect() -> impl Strategy<Value = Rect> {
        (0i32..700, 0i32..700, 1i32..100, 1i32..100)
            .prop_map(|(x, y, w, h)| Rect::from_ints(x, y, w, h))
    }

    /// Generate a held-key input (no joins or operator commands).
    pub fn arb_held_input() -> impl Strategy<Value = Input> {
        prop_oneof![
            Just(Input::LeftPressed),
            Just(Input::LeftReleased),
            Just(Input::RightPressed),
            Just(Input::RightReleased),
            Just(Input::ActionPressed),
            Just(Input::ActionReleased),
        ]
    }

    /// Generate a script of held-key inputs for source 1 within `ticks`.
    pub fn arb_script(ticks: u64, max_len: usize) -> impl Strategy<Value = Vec<ScriptedInput>> {
        prop::collection::vec((0..ticks, arb_held_input()), 0..max_len).prop_map(|mut entries| {
            entries.sort_by_key(|(tick, _)| *tick);
            entries
                .into_iter()
                .map(|(tick, input)| ScriptedInput {
                    tick,
                    source: 1,
                    input,
                })
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_determinism_detects_divergence() {
        let counter = std::cell::Cell::new(0u64);
        let result = verify_determinism(
            3,
            5,
            || {
                counter.set(counter.get() + 1);
                counter.get()
            },
            |state, _| *state += 1,
            |state| *state,
        );
        assert!(!result.is_deterministic);
        assert_eq!(result.unique_hashes().len(), 3);
    }

    #[test]
    fn test_compute_hash_is_stable() {
        assert_eq!(compute_hash(&(1u32, "a")), compute_hash(&(1u32, "a")));
        assert_ne!(compute_hash(&1u32), compute_hash(&2u32));
    }
}
