//! Test fixtures and helpers.
//!
//! Pre-built scenes and scripted inputs for consistent testing.

use serde::{Deserialize, Serialize};

use arcade_core::error::Result;
use arcade_core::event::{Input, Tick};
use arcade_core::instance::GameInstance;
use arcade_core::math::Fixed;
use arcade_core::object::{InstanceId, ObjectKind, SimObject};

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> Fixed {
    Fixed::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
///
/// Note: In real simulation code, never use floats.
/// This is only for convenient test setup.
#[must_use]
pub fn fixed_f(n: f64) -> Fixed {
    Fixed::from_num(n)
}

/// Solid block with an explicit size.
#[must_use]
pub fn block(x: i32, y: i32, width: i32, height: i32) -> SimObject {
    SimObject::at(ObjectKind::Block, x, y).with_size(fixed(width), fixed(height))
}

/// Player for `source` at whole-number coordinates.
#[must_use]
pub fn player(source: InstanceId, x: i32, y: i32) -> SimObject {
    SimObject::player(source, fixed(x), fixed(y))
}

/// Row of default-sized blocks spanning the default world at height `y`.
#[must_use]
pub fn floor(y: i32) -> Vec<SimObject> {
    (0..16).map(|i| SimObject::at(ObjectKind::Block, i * 50, y)).collect()
}

/// An input delivered before a given tick runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptedInput {
    /// Clock value at which the input is submitted.
    pub tick: Tick,
    /// Submitting source.
    pub source: InstanceId,
    /// The input.
    pub input: Input,
}

impl ScriptedInput {
    /// Shorthand constructor.
    #[must_use]
    pub const fn new(tick: Tick, source: InstanceId, input: Input) -> Self {
        Self {
            tick,
            source,
            input,
        }
    }
}

/// Parse a RON list of scripted inputs.
///
/// ```ignore
/// [(tick: 0, source: 1, input: RightPressed), (tick: 5, source: 1, input: Join)]
/// ```
///
/// # Errors
///
/// Returns the RON parse error.
pub fn parse_script(text: &str) -> std::result::Result<Vec<ScriptedInput>, ron::error::SpannedError> {
    ron::from_str(text)
}

/// Run `ticks` ticks, submitting each scripted input whose tick equals the
/// clock just before the tick runs.
///
/// # Errors
///
/// Returns the first fatal tick error.
pub fn drive(game: &mut GameInstance, script: &[ScriptedInput], ticks: u64) -> Result<()> {
    for _ in 0..ticks {
        let now = game.clock();
        for scripted in script.iter().filter(|s| s.tick == now) {
            if !game.submit_input(scripted.source, scripted.input) {
                tracing::trace!(tick = now, input = %scripted.input, "scripted input dropped");
            }
        }
        game.tick()?;
    }
    Ok(())
}
