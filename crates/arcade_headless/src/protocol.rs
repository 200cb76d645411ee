//! JSON protocol for headless sessions.
//!
//! The interactive runner communicates via JSON lines (one JSON object per
//! line):
//!
//! **Input (stdin):** Commands from the controlling script or agent
//! **Output (stdout):** Responses and state
//!
//! # Example Session
//!
//! ```text
//! <- {"type":"ready","version":"1.0","game":"platformer","tick":0}
//! -> {"cmd":"join","source":1}
//! <- {"type":"ack","cmd":"join"}
//! -> {"cmd":"input","source":1,"input":"RIGHT PRESSED"}
//! <- {"type":"ack","cmd":"input"}
//! -> {"cmd":"tick","count":60}
//! <- {"type":"ticked","tick":60,"mode":"Idle","hash":1234,"events":2}
//! -> {"cmd":"query"}
//! <- {"type":"state","tick":60,"mode":"Idle","hash":1234,"objects":[...]}
//! ```

use serde::{Deserialize, Serialize};

use arcade_core::event::Tick;
use arcade_core::object::{InstanceId, ObjectId, ObjectKind, SimObject};
use arcade_core::replay::{ReplayMode, ReplayRecord};

/// Protocol version reported in the ready line.
pub const PROTOCOL_VERSION: &str = "1.0";

// ============================================================================
// Input Commands (controller -> runner)
// ============================================================================

/// Commands that can be sent to the interactive runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    /// Advance by N ticks (default: 1).
    Tick {
        /// Ticks to run.
        #[serde(default = "default_tick_count")]
        count: u32,
    },

    /// Submit an input in its text form, e.g. `"LEFT PRESSED"`.
    Input {
        /// Submitting source.
        source: InstanceId,
        /// Input text.
        input: String,
    },

    /// Ask for a player object for `source`.
    Join {
        /// Joining source.
        source: InstanceId,
    },

    /// Full state of the active world without advancing time.
    Query,

    /// State hash of the active world.
    Hash,

    /// Start recording.
    Record,

    /// Stop recording.
    StopRecord,

    /// Play the last record at `rate` ticks per second.
    Playback {
        /// Ticks per second.
        #[serde(default = "default_rate")]
        rate: u32,
    },

    /// Save the last finished record.
    Save {
        /// Destination file.
        path: String,
    },

    /// Load a record file as the one to play.
    Load {
        /// Source file.
        path: String,
    },

    /// Quit the session.
    Quit,
}

fn default_tick_count() -> u32 {
    1
}

fn default_rate() -> u32 {
    60
}

// ============================================================================
// Output Responses (runner -> controller)
// ============================================================================

/// Responses sent from the headless runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Runner is ready to accept commands.
    Ready {
        /// Protocol version.
        version: String,
        /// Installed game.
        game: String,
        /// Starting clock.
        tick: Tick,
    },

    /// Acknowledgment of a command.
    Ack {
        /// Acknowledged command.
        cmd: String,
    },

    /// Error processing a command.
    Error {
        /// What went wrong.
        message: String,
        /// Command that failed, when it could be parsed.
        #[serde(skip_serializing_if = "Option::is_none")]
        cmd: Option<String>,
    },

    /// Ticks were run.
    Ticked {
        /// Clock after the last tick.
        tick: Tick,
        /// Replay mode after the last tick.
        mode: ReplayMode,
        /// Hash of the world that advanced last.
        hash: u64,
        /// Events dispatched over all ticks run.
        events: usize,
    },

    /// Full state of the active world.
    State {
        /// Active world's tick.
        tick: Tick,
        /// Replay mode.
        mode: ReplayMode,
        /// Playback progress, while playing.
        #[serde(skip_serializing_if = "Option::is_none")]
        progress: Option<f64>,
        /// State hash.
        hash: u64,
        /// Objects in id order.
        objects: Vec<ObjectState>,
    },

    /// State hash only.
    Hash {
        /// Active world's tick.
        tick: Tick,
        /// State hash.
        hash: u64,
    },

    /// A replay mode transition was requested.
    Transition {
        /// Command name.
        cmd: String,
        /// Whether the mode changed.
        applied: bool,
        /// Mode after the request.
        mode: ReplayMode,
    },

    /// Session ended.
    Goodbye {
        /// Final clock.
        tick: Tick,
    },
}

/// Presentation view of one object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectState {
    /// Registry id.
    pub id: ObjectId,
    /// Object variant.
    pub kind: ObjectKind,
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
    /// Controlling source, for players.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<InstanceId>,
    /// Marker text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl From<&SimObject> for ObjectState {
    fn from(object: &SimObject) -> Self {
        Self {
            id: object.id,
            kind: object.kind,
            x: object.bounds.x.to_num(),
            y: object.bounds.y.to_num(),
            width: object.bounds.width.to_num(),
            height: object.bounds.height.to_num(),
            source: object.source,
            label: object.label.clone(),
        }
    }
}

/// Metadata of a replay file, for `inspect`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordInfo {
    /// Format version.
    pub version: u32,
    /// First recorded tick.
    pub start_tick: Tick,
    /// Last recorded tick.
    pub end_tick: Option<Tick>,
    /// Ticks covered.
    pub duration: u64,
    /// Inputs recorded.
    pub inputs: usize,
    /// Players at start.
    pub start_players: usize,
    /// Players at end.
    pub end_players: usize,
    /// Snapshot size in bytes.
    pub snapshot_bytes: usize,
    /// Final state hash, as hex.
    pub final_hash: String,
}

impl From<&ReplayRecord> for RecordInfo {
    fn from(record: &ReplayRecord) -> Self {
        Self {
            version: record.version,
            start_tick: record.start_tick,
            end_tick: record.end_tick,
            duration: record.duration(),
            inputs: record.input_count(),
            start_players: record.start_player_count,
            end_players: record.end_player_count,
            snapshot_bytes: record.snapshot.len(),
            final_hash: format!("{:016x}", record.final_hash),
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

impl Response {
    /// Create a ready response.
    pub fn ready(game: impl Into<String>, tick: Tick) -> Self {
        Self::Ready {
            version: PROTOCOL_VERSION.to_string(),
            game: game.into(),
            tick,
        }
    }

    /// Create an acknowledgment.
    pub fn ack(cmd: &str) -> Self {
        Self::Ack {
            cmd: cmd.to_string(),
        }
    }

    /// Create an error response.
    pub fn error(message: impl Into<String>, cmd: Option<&str>) -> Self {
        Self::Error {
            message: message.into(),
            cmd: cmd.map(String::from),
        }
    }

    /// Serialize to JSON line (with newline).
    pub fn to_json_line(&self) -> String {
        let mut json = serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"type":"error","message":"Serialization failed: {e}"}}"#)
        });
        json.push('\n');
        json
    }
}

impl Command {
    /// Parse from a JSON line.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Get command name for acknowledgment.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Tick { .. } => "tick",
            Self::Input { .. } => "input",
            Self::Join { .. } => "join",
            Self::Query => "query",
            Self::Hash => "hash",
            Self::Record => "record",
            Self::StopRecord => "stop_record",
            Self::Playback { .. } => "playback",
            Self::Save { .. } => "save",
            Self::Load { .. } => "load",
            Self::Quit => "quit",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tick_command() {
        let cmd = Command::from_json(r#"{"cmd":"tick","count":60}"#).unwrap();
        assert!(matches!(cmd, Command::Tick { count: 60 }));
    }

    #[test]
    fn test_default_tick_count_and_rate() {
        assert!(matches!(
            Command::from_json(r#"{"cmd":"tick"}"#).unwrap(),
            Command::Tick { count: 1 }
        ));
        assert!(matches!(
            Command::from_json(r#"{"cmd":"playback"}"#).unwrap(),
            Command::Playback { rate: 60 }
        ));
    }

    #[test]
    fn test_parse_input_command() {
        let cmd = Command::from_json(r#"{"cmd":"input","source":2,"input":"LEFT PRESSED"}"#).unwrap();
        assert!(matches!(
            cmd,
            Command::Input { source: 2, ref input } if input == "LEFT PRESSED"
        ));
        assert_eq!(cmd.name(), "input");
        assert!(Command::from_json(r#"{"cmd":"teleport"}"#).is_err());
    }

    #[test]
    fn test_serialize_state_response() {
        let marker = SimObject::marker("YOU WIN", 300, 300);
        let resp = Response::State {
            tick: 100,
            mode: ReplayMode::Idle,
            progress: None,
            hash: 12345,
            objects: vec![ObjectState::from(&marker)],
        };
        let json = resp.to_json_line();
        assert!(json.ends_with('\n'));
        assert!(json.contains(r#""type":"state""#));
        assert!(json.contains(r#""tick":100"#));
        assert!(json.contains(r#""label":"YOU WIN""#));
        assert!(!json.contains("progress"));
    }

    #[test]
    fn test_error_omits_missing_command() {
        let json = Response::error("bad line", None).to_json_line();
        assert_eq!(json, "{\"type\":\"error\",\"message\":\"bad line\"}\n");
    }
}
