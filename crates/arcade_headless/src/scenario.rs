//! Scenario loading and configuration.
//!
//! A scenario names the game to run, the engine settings, any objects placed
//! on top of the game's default scene, and a scripted input timeline.
//!
//! # Example RON
//!
//! ```ron
//! Scenario(
//!     name: "Jump the gap",
//!     game: Platformer,
//!     objects: [(kind: Player, x: 120, y: 100, source: Some(1))],
//!     script: [
//!         (tick: 10, source: 1, input: "RIGHT PRESSED"),
//!         (tick: 40, source: 1, input: "JUMP PRESSED"),
//!     ],
//!     ticks: 120,
//! )
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use arcade_core::config::{EngineConfig, DEFAULT_TICK_RATE, DEFAULT_WORLD_SIZE};
use arcade_core::error::EngineError;
use arcade_core::event::{Input, ParseInputError, Tick};
use arcade_core::instance::GameInstance;
use arcade_core::math::{Fixed, Rect};
use arcade_core::object::{InstanceId, ObjectKind, SimObject};
use arcade_core::policies::Game;

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// The input script is malformed.
    #[error("Invalid script: {0}")]
    Script(#[from] ScriptError),
    /// The engine rejected the scenario's settings or objects.
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
}

/// Error type for scripted input timelines.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ScriptError {
    /// A step names an input the engine doesn't know.
    #[error("tick {tick}: {source}")]
    UnknownInput {
        /// Tick of the offending step.
        tick: Tick,
        /// Parse failure.
        source: ParseInputError,
    },
    /// Steps must be listed in tick order.
    #[error("step at tick {tick} follows a step at tick {previous}")]
    OutOfOrder {
        /// Tick of the offending step.
        tick: Tick,
        /// Tick of the step before it.
        previous: Tick,
    },
}

/// Engine settings in whole units, as written by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Live ticks per second.
    pub tick_rate: u32,
    /// Ticks between an event's creation and its timestamp.
    pub event_delay: u64,
    /// Discrete advance while resolving blocked motion.
    pub step_unit: i32,
    /// Playable area size, or `None` for an unbounded world.
    pub world_size: Option<(i32, i32)>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tick_rate: DEFAULT_TICK_RATE,
            event_delay: 1,
            step_unit: 1,
            world_size: Some((DEFAULT_WORLD_SIZE, DEFAULT_WORLD_SIZE)),
        }
    }
}

impl Settings {
    /// Convert to an engine configuration. Validation happens when the
    /// instance is built.
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            tick_rate: self.tick_rate,
            event_delay: self.event_delay,
            step_unit: Fixed::from_num(self.step_unit),
            bounds: self.world_size.map(|(w, h)| Rect::from_ints(0, 0, w, h)),
        }
    }
}

/// An object placed at scenario start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectPlacement {
    /// Object variant.
    pub kind: ObjectKind,
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Size override; the kind's default size otherwise.
    #[serde(default)]
    pub size: Option<(i32, i32)>,
    /// Speed override.
    #[serde(default)]
    pub speed: Option<i32>,
    /// Initial heading.
    #[serde(default)]
    pub direction: Option<i32>,
    /// Controlling input source, for players.
    #[serde(default)]
    pub source: Option<InstanceId>,
    /// Marker text.
    #[serde(default)]
    pub label: Option<String>,
}

impl ObjectPlacement {
    /// Placement with defaults for everything but kind and position.
    #[must_use]
    pub const fn new(kind: ObjectKind, x: i32, y: i32) -> Self {
        Self {
            kind,
            x,
            y,
            size: None,
            speed: None,
            direction: None,
            source: None,
            label: None,
        }
    }

    /// Build the unregistered object.
    #[must_use]
    pub fn to_object(&self) -> SimObject {
        let mut object = match (self.kind, self.source) {
            (ObjectKind::Player, Some(source)) => {
                SimObject::player(source, Fixed::from_num(self.x), Fixed::from_num(self.y))
            }
            (ObjectKind::MovingPlatform, _) => SimObject::moving_platform(self.x, self.y),
            (kind, source) => {
                let object = SimObject::at(kind, self.x, self.y);
                match source {
                    Some(source) => object.with_source(source),
                    None => object,
                }
            }
        };
        if let Some((w, h)) = self.size {
            object = object.with_size(Fixed::from_num(w), Fixed::from_num(h));
        }
        if let Some(speed) = self.speed {
            object = object.with_speed(Fixed::from_num(speed));
        }
        if let Some(direction) = self.direction {
            object = object.with_direction(direction);
        }
        if let Some(label) = &self.label {
            object = object.with_label(label.clone());
        }
        object
    }
}

/// One scripted input, submitted when the clock reaches `tick`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptStep {
    /// Clock value at which the input is submitted.
    pub tick: Tick,
    /// Submitting source.
    pub source: InstanceId,
    /// Input in its text form, e.g. `"LEFT PRESSED"` or `"PLAYBACK120"`.
    pub input: String,
}

impl ScriptStep {
    /// Shorthand constructor.
    #[must_use]
    pub fn new(tick: Tick, source: InstanceId, input: impl Into<String>) -> Self {
        Self {
            tick,
            source,
            input: input.into(),
        }
    }
}

/// A parsed script step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptedInput {
    /// Clock value at which the input is submitted.
    pub tick: Tick,
    /// Submitting source.
    pub source: InstanceId,
    /// The input.
    pub input: Input,
}

fn default_true() -> bool {
    true
}

fn default_ticks() -> u64 {
    600
}

/// A complete scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Policy set to install.
    pub game: Game,
    /// Engine settings.
    #[serde(default)]
    pub settings: Settings,
    /// Whether to load the game's default scene before `objects`.
    #[serde(default = "default_true")]
    pub default_scene: bool,
    /// Objects added after the default scene.
    #[serde(default)]
    pub objects: Vec<ObjectPlacement>,
    /// Scripted inputs, in tick order.
    #[serde(default)]
    pub script: Vec<ScriptStep>,
    /// Ticks to run when no count is given on the command line.
    #[serde(default = "default_ticks")]
    pub ticks: u64,
}

impl Scenario {
    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    /// Load from a RON string (useful for embedded scenarios).
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        Ok(scenario)
    }

    /// Built-in scenario by name, or a scenario file by path. `None` selects
    /// the platformer.
    pub fn resolve(name_or_path: Option<&str>) -> Result<Self, ScenarioError> {
        match name_or_path {
            None => Ok(Self::platformer()),
            Some(name) => match name.parse::<Game>() {
                Ok(Game::Platformer) => Ok(Self::platformer()),
                Ok(Game::Invaders) => Ok(Self::invaders()),
                Err(_) => Self::load(name),
            },
        }
    }

    /// Two players running and jumping across the default level.
    #[must_use]
    pub fn platformer() -> Self {
        Self {
            name: "platformer".to_string(),
            description: "Two players cross the default level; one walks into the hazard".to_string(),
            game: Game::Platformer,
            settings: Settings::default(),
            default_scene: true,
            objects: Vec::new(),
            script: vec![
                ScriptStep::new(0, 1, "JOIN"),
                ScriptStep::new(0, 2, "JOIN"),
                ScriptStep::new(60, 1, "RIGHT PRESSED"),
                ScriptStep::new(90, 1, "JUMP PRESSED"),
                ScriptStep::new(95, 1, "JUMP RELEASED"),
                ScriptStep::new(120, 2, "RIGHT PRESSED"),
                ScriptStep::new(200, 1, "RIGHT RELEASED"),
                ScriptStep::new(260, 2, "LEFT PRESSED"),
                ScriptStep::new(300, 2, "LEFT RELEASED"),
            ],
            ticks: 600,
        }
    }

    /// One shooter against the default fleet.
    #[must_use]
    pub fn invaders() -> Self {
        Self {
            name: "invaders".to_string(),
            description: "A single shooter sweeps left while firing".to_string(),
            game: Game::Invaders,
            settings: Settings::default(),
            default_scene: true,
            objects: Vec::new(),
            script: vec![
                ScriptStep::new(0, 1, "JOIN"),
                ScriptStep::new(10, 1, "FIRE PRESSED"),
                ScriptStep::new(20, 1, "LEFT PRESSED"),
                ScriptStep::new(80, 1, "LEFT RELEASED"),
                ScriptStep::new(90, 1, "RIGHT PRESSED"),
                ScriptStep::new(200, 1, "RIGHT RELEASED"),
            ],
            ticks: 900,
        }
    }

    /// Engine configuration for this scenario.
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        self.settings.engine_config()
    }

    /// Parse the script into engine inputs.
    pub fn parsed_script(&self) -> Result<Vec<ScriptedInput>, ScriptError> {
        let mut parsed = Vec::with_capacity(self.script.len());
        let mut previous = 0;
        for step in &self.script {
            if step.tick < previous {
                return Err(ScriptError::OutOfOrder {
                    tick: step.tick,
                    previous,
                });
            }
            previous = step.tick;
            let input = step
                .input
                .parse::<Input>()
                .map_err(|source| ScriptError::UnknownInput {
                    tick: step.tick,
                    source,
                })?;
            parsed.push(ScriptedInput {
                tick: step.tick,
                source: step.source,
                input,
            });
        }
        Ok(parsed)
    }

    /// Build a game instance with the policies installed and the scene
    /// populated. The script is not applied.
    pub fn build(&self) -> Result<GameInstance, ScenarioError> {
        let config = self.engine_config();
        let mut game = if self.default_scene {
            self.game.with_scene(config)?
        } else {
            self.game.instance(config)?
        };
        for placement in &self.objects {
            game.add_object(placement.to_object())?;
        }
        tracing::debug!(
            scenario = %self.name,
            game = %self.game,
            objects = game.view().len(),
            "Scenario built"
        );
        Ok(game)
    }

    /// Build an instance for playing back records of this scenario: the
    /// policies are installed, the world stays empty.
    pub fn playback_instance(&self) -> Result<GameInstance, ScenarioError> {
        Ok(self.game.instance(self.engine_config())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_scripts_parse() {
        for scenario in [Scenario::platformer(), Scenario::invaders()] {
            let script = scenario.parsed_script().unwrap();
            assert_eq!(script.len(), scenario.script.len());
            assert_eq!(script[0].input, Input::Join);
        }
    }

    #[test]
    fn test_resolve_builtin_names() {
        assert_eq!(Scenario::resolve(None).unwrap().game, Game::Platformer);
        assert_eq!(Scenario::resolve(Some("Invaders")).unwrap().game, Game::Invaders);
        assert!(matches!(
            Scenario::resolve(Some("no/such/file.ron")),
            Err(ScenarioError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_from_ron_with_defaults() {
        let scenario = Scenario::from_ron_str(
            r#"Scenario(
                name: "bare",
                game: Invaders,
                default_scene: false,
                objects: [(kind: Player, x: 385, y: 740, source: Some(1))],
                script: [(tick: 3, source: 1, input: "fire pressed")],
            )"#,
        )
        .unwrap();
        assert_eq!(scenario.ticks, 600);
        assert_eq!(scenario.settings, Settings::default());

        let game = scenario.build().unwrap();
        assert_eq!(game.view().len(), 1);
        assert_eq!(game.player_count(), 1);
        assert_eq!(scenario.parsed_script().unwrap()[0].input, Input::ActionPressed);
    }

    #[test]
    fn test_script_errors() {
        let mut scenario = Scenario::platformer();
        scenario.script = vec![ScriptStep::new(5, 1, "JOIN"), ScriptStep::new(2, 1, "JOIN")];
        assert_eq!(
            scenario.parsed_script(),
            Err(ScriptError::OutOfOrder {
                tick: 2,
                previous: 5
            })
        );

        scenario.script = vec![ScriptStep::new(1, 1, "DANCE")];
        assert!(matches!(
            scenario.parsed_script(),
            Err(ScriptError::UnknownInput { tick: 1, .. })
        ));
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let mut scenario = Scenario::invaders();
        scenario.settings.event_delay = 0;
        assert!(matches!(scenario.build(), Err(ScenarioError::Engine(_))));
    }

    #[test]
    fn test_placement_overrides() {
        let mut placement = ObjectPlacement::new(ObjectKind::Block, 10, 20);
        placement.size = Some((5, 6));
        let object = placement.to_object();
        assert_eq!(object.bounds, Rect::from_ints(10, 20, 5, 6));
        assert!(object.is_physical());

        let platform = ObjectPlacement::new(ObjectKind::MovingPlatform, 0, 0).to_object();
        assert_eq!(platform.state.direction, 1);
    }
}
