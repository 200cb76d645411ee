//! Event and input definitions.
//!
//! Events are the only way effects cross a tick boundary. Every event
//! carries the tick it becomes due; the queue never hands it out earlier.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::object::{InstanceId, ObjectId, SimObject};

/// Simulation tick number.
pub type Tick = u64;

/// Named playback speeds offered to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlaybackRate {
    /// 30 ticks per second.
    Half,
    /// 60 ticks per second.
    Normal,
    /// 120 ticks per second.
    Double,
    /// Any other positive rate.
    Custom(u32),
}

impl PlaybackRate {
    /// Ticks per second at this rate. Never zero.
    #[must_use]
    pub const fn ticks_per_second(self) -> u32 {
        match self {
            Self::Half => 30,
            Self::Normal => 60,
            Self::Double => 120,
            Self::Custom(0) => 1,
            Self::Custom(rate) => rate,
        }
    }

    /// Named rate for `rate` if there is one, else a custom rate.
    #[must_use]
    pub const fn from_ticks_per_second(rate: u32) -> Self {
        match rate {
            30 => Self::Half,
            60 => Self::Normal,
            120 => Self::Double,
            other => Self::Custom(other),
        }
    }
}

/// Commands addressed to the replay manager rather than to a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperatorCommand {
    /// Begin recording a session.
    StartRecording,
    /// Finish the recording in progress.
    StopRecording,
    /// Play back the last finished recording.
    Playback(PlaybackRate),
}

/// External input vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Input {
    /// Left pressed.
    LeftPressed,
    /// Left released.
    LeftReleased,
    /// Right pressed.
    RightPressed,
    /// Right released.
    RightReleased,
    /// Action (jump or fire) pressed.
    ActionPressed,
    /// Action released.
    ActionReleased,
    /// Request a player object for this source.
    Join,
    /// Replay control.
    Operator(OperatorCommand),
}

impl Input {
    /// Whether this input is an operator command.
    #[must_use]
    pub const fn is_operator(&self) -> bool {
        matches!(self, Self::Operator(_))
    }
}

impl fmt::Display for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LeftPressed => write!(f, "LEFT PRESSED"),
            Self::LeftReleased => write!(f, "LEFT RELEASED"),
            Self::RightPressed => write!(f, "RIGHT PRESSED"),
            Self::RightReleased => write!(f, "RIGHT RELEASED"),
            Self::ActionPressed => write!(f, "JUMP PRESSED"),
            Self::ActionReleased => write!(f, "JUMP RELEASED"),
            Self::Join => write!(f, "JOIN"),
            Self::Operator(OperatorCommand::StartRecording) => write!(f, "START RECORD"),
            Self::Operator(OperatorCommand::StopRecording) => write!(f, "STOP RECORD"),
            Self::Operator(OperatorCommand::Playback(rate)) => {
                write!(f, "PLAYBACK{}", rate.ticks_per_second())
            }
        }
    }
}

/// Error returned when parsing an unrecognised input string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unrecognised input: {0:?}")]
pub struct ParseInputError(pub String);

impl FromStr for Input {
    type Err = ParseInputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();
        let input = match normalized.as_str() {
            "LEFT PRESSED" => Self::LeftPressed,
            "LEFT RELEASED" => Self::LeftReleased,
            "RIGHT PRESSED" => Self::RightPressed,
            "RIGHT RELEASED" => Self::RightReleased,
            "JUMP PRESSED" | "ACTION PRESSED" | "FIRE PRESSED" => Self::ActionPressed,
            "JUMP RELEASED" | "ACTION RELEASED" | "FIRE RELEASED" => Self::ActionReleased,
            "JOIN" => Self::Join,
            "START RECORD" => Self::Operator(OperatorCommand::StartRecording),
            "STOP RECORD" => Self::Operator(OperatorCommand::StopRecording),
            other => {
                let rate = other
                    .strip_prefix("PLAYBACK")
                    .and_then(|r| r.trim().parse::<u32>().ok())
                    .filter(|r| *r > 0)
                    .ok_or_else(|| ParseInputError(s.to_string()))?;
                Self::Operator(OperatorCommand::Playback(
                    PlaybackRate::from_ticks_per_second(rate),
                ))
            }
        };
        Ok(input)
    }
}

/// Event payloads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// Two objects overlap.
    Collision {
        /// Object that detected the overlap.
        a: ObjectId,
        /// Object it overlapped.
        b: ObjectId,
    },
    /// Run the kill transition on a killable object, then remove it.
    Death {
        /// Object to kill.
        target: ObjectId,
    },
    /// Remove an object without a kill transition.
    Despawn {
        /// Object to remove.
        target: ObjectId,
    },
    /// Insert a new object.
    Spawn {
        /// Object to insert, not yet registered.
        object: Box<SimObject>,
    },
    /// External input from a source.
    Input {
        /// The input.
        input: Input,
    },
}

impl EventKind {
    /// Discriminant used to look up handlers.
    #[must_use]
    pub const fn event_type(&self) -> EventType {
        match self {
            Self::Collision { .. } => EventType::Collision,
            Self::Death { .. } => EventType::Death,
            Self::Despawn { .. } => EventType::Despawn,
            Self::Spawn { .. } => EventType::Spawn,
            Self::Input { .. } => EventType::Input,
        }
    }
}

/// Event discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventType {
    /// [`EventKind::Collision`].
    Collision,
    /// [`EventKind::Death`].
    Death,
    /// [`EventKind::Despawn`].
    Despawn,
    /// [`EventKind::Spawn`].
    Spawn,
    /// [`EventKind::Input`].
    Input,
}

/// A scheduled event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Event {
    /// Payload.
    pub kind: EventKind,
    /// Tick at which the event becomes due.
    pub timestamp: Tick,
    /// Input source the event originates from.
    pub source: InstanceId,
    /// Produced while playing back a recording.
    pub replay_sourced: bool,
}

impl Event {
    /// Create a live event.
    #[must_use]
    pub const fn new(kind: EventKind, timestamp: Tick, source: InstanceId) -> Self {
        Self {
            kind,
            timestamp,
            source,
            replay_sourced: false,
        }
    }

    /// Mark the event as produced by playback.
    #[must_use]
    pub fn replayed(mut self) -> Self {
        self.replay_sourced = true;
        self
    }

    /// Discriminant of the payload.
    #[must_use]
    pub const fn event_type(&self) -> EventType {
        self.kind.event_type()
    }
}
