//! Headless session driving.
//!
//! [`run_scenario`] and [`play_record`] back the one-shot CLI commands.
//! [`HeadlessRunner`] serves the interactive JSON-lines protocol.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

use arcade_core::error::{EngineError, Result as EngineResult};
use arcade_core::event::{Input, PlaybackRate, Tick};
use arcade_core::instance::GameInstance;
use arcade_core::object::InstanceId;
use arcade_core::replay::{ReplayMode, ReplayRecord, TransitionOutcome};

use crate::protocol::{Command, ObjectState, Response};
use crate::scenario::{Scenario, ScenarioError, ScriptedInput};

/// Options for a one-shot scenario run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Ticks to run; the scenario's own count otherwise.
    pub ticks: Option<u64>,
    /// Record the whole run and save it here.
    pub record: Option<PathBuf>,
    /// Include every object in the summary.
    pub include_state: bool,
}

/// Result of a scenario run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Scenario name.
    pub scenario: String,
    /// Installed game.
    pub game: String,
    /// Final live tick.
    pub final_tick: Tick,
    /// Final state hash, as hex.
    pub hash: String,
    /// Objects in the final world.
    pub objects: usize,
    /// Players in the final world.
    pub players: usize,
    /// Events dispatched over the run.
    pub events: usize,
    /// Where the record was saved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<String>,
    /// Final objects, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<Vec<ObjectState>>,
}

/// Result of playing a record.
#[derive(Debug, Clone, Serialize)]
pub struct PlaybackSummary {
    /// Ticks played.
    pub ticks: u64,
    /// Inputs in the record.
    pub inputs: usize,
    /// Playback rate in ticks per second.
    pub rate: u32,
    /// Wall-clock seconds the playback takes at `rate`.
    pub seconds: f64,
    /// Hash stored in the record, as hex.
    pub recorded_hash: String,
    /// Hash the playback world ended on, as hex.
    pub replayed_hash: String,
    /// Whether the two hashes agree.
    pub matches: bool,
}

/// Submit every scripted input due at the current clock, then tick; repeat
/// `ticks` times. Returns the number of events dispatched.
///
/// # Errors
/// Returns the first fatal tick error.
pub fn drive(game: &mut GameInstance, script: &[ScriptedInput], ticks: u64) -> EngineResult<usize> {
    let mut events = 0;
    for _ in 0..ticks {
        let now = game.clock();
        for step in script.iter().filter(|s| s.tick == now) {
            if !game.submit_input(step.source, step.input) {
                tracing::debug!(tick = now, input = %step.input, "Scripted input dropped");
            }
        }
        events += game.tick()?.dispatched.len();
    }
    Ok(events)
}

/// Build `scenario`, play its script and summarize the final world.
pub fn run_scenario(scenario: &Scenario, options: &RunOptions) -> Result<RunSummary, ScenarioError> {
    let script = scenario.parsed_script()?;
    let mut game = scenario.build()?;
    let ticks = options.ticks.unwrap_or(scenario.ticks);

    if options.record.is_some() {
        game.start_recording()?;
    }
    tracing::info!(scenario = %scenario.name, ticks, "Running scenario");
    let events = drive(&mut game, &script, ticks)?;

    let record = match &options.record {
        Some(path) => {
            // A scripted StopRecording may already have closed the record
            game.stop_recording();
            let record = game
                .replay()
                .last_record()
                .ok_or(EngineError::NoRecord)?;
            record.save(path)?;
            tracing::info!(
                path = %path.display(),
                inputs = record.input_count(),
                duration = record.duration(),
                "Record saved"
            );
            Some(path.display().to_string())
        }
        None => None,
    };

    let view = game.view();
    Ok(RunSummary {
        scenario: scenario.name.clone(),
        game: scenario.game.to_string(),
        final_tick: game.world().tick(),
        hash: format!("{:016x}", game.world().state_hash()),
        objects: view.len(),
        players: view.player_count(),
        events,
        record,
        state: options
            .include_state
            .then(|| view.objects().map(ObjectState::from).collect()),
    })
}

/// Play `record` to the end with `scenario`'s policies installed.
pub fn play_record(
    scenario: &Scenario,
    record: ReplayRecord,
    rate: PlaybackRate,
) -> Result<PlaybackSummary, ScenarioError> {
    let mut game = scenario.playback_instance()?;
    let recorded_hash = record.final_hash;
    let inputs = record.input_count();
    let duration = record.duration();

    game.load_record(record);
    game.play_replay(rate)?;

    let mut ticks = 0;
    let mut replayed_hash = game.state_hash();
    while game.replay().mode() == ReplayMode::Playing {
        let report = game.tick()?;
        ticks += 1;
        replayed_hash = report.state_hash;
        if report.playback_finished {
            break;
        }
    }

    let per_second = rate.ticks_per_second();
    #[allow(clippy::cast_precision_loss)]
    let seconds = duration as f64 / f64::from(per_second);
    Ok(PlaybackSummary {
        ticks,
        inputs,
        rate: per_second,
        seconds,
        recorded_hash: format!("{recorded_hash:016x}"),
        replayed_hash: format!("{replayed_hash:016x}"),
        matches: replayed_hash == recorded_hash,
    })
}

/// Load a record file.
pub fn load_record<P: AsRef<Path>>(path: P) -> Result<ReplayRecord, ScenarioError> {
    Ok(ReplayRecord::load(path)?)
}

/// Interactive JSON-lines session over one game instance.
#[derive(Debug)]
pub struct HeadlessRunner {
    game: GameInstance,
    game_name: String,
    quit: bool,
}

impl HeadlessRunner {
    /// Runner over a freshly built scenario.
    pub fn new(scenario: &Scenario) -> Result<Self, ScenarioError> {
        Ok(Self {
            game: scenario.build()?,
            game_name: scenario.game.to_string(),
            quit: false,
        })
    }

    /// The driven instance.
    #[must_use]
    pub const fn game(&self) -> &GameInstance {
        &self.game
    }

    /// Whether a quit command was handled.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.quit
    }

    /// Serve commands from `input` until quit or end of input.
    ///
    /// # Errors
    /// Returns IO errors from reading or writing.
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, mut output: W) -> std::io::Result<()> {
        output.write_all(Response::ready(&self.game_name, self.game.clock()).to_json_line().as_bytes())?;
        output.flush()?;

        for line in input.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let response = match Command::from_json(line) {
                Ok(command) => self.handle(command),
                Err(e) => {
                    tracing::warn!("Failed to parse command: {e}");
                    Response::error(format!("Invalid command: {e}"), None)
                }
            };
            output.write_all(response.to_json_line().as_bytes())?;
            output.flush()?;
            if self.quit {
                break;
            }
        }
        Ok(())
    }

    /// Handle one command.
    pub fn handle(&mut self, command: Command) -> Response {
        let name = command.name();
        tracing::debug!(cmd = name, "Handling command");
        match self.apply(command) {
            Ok(response) => response,
            Err(e) => Response::error(e.to_string(), Some(name)),
        }
    }

    fn apply(&mut self, command: Command) -> Result<Response, EngineError> {
        let name = command.name();
        match command {
            Command::Tick { count } => {
                let reports = self.game.run(u64::from(count))?;
                Ok(Response::Ticked {
                    tick: self.game.clock(),
                    mode: self.game.replay().mode(),
                    hash: reports
                        .last()
                        .map_or_else(|| self.game.state_hash(), |r| r.state_hash),
                    events: reports.iter().map(|r| r.dispatched.len()).sum(),
                })
            }
            Command::Input { source, input } => {
                match input.parse::<Input>() {
                    Ok(input) => Ok(self.submit(name, source, input)),
                    Err(e) => Ok(Response::error(e.to_string(), Some(name))),
                }
            }
            Command::Join { source } => Ok(self.submit(name, source, Input::Join)),
            Command::Query => {
                let view = self.game.view();
                Ok(Response::State {
                    tick: view.tick,
                    mode: view.status.mode,
                    progress: view.status.progress,
                    hash: self.game.state_hash(),
                    objects: view.objects().map(ObjectState::from).collect(),
                })
            }
            Command::Hash => Ok(Response::Hash {
                tick: self.game.clock(),
                hash: self.game.state_hash(),
            }),
            Command::Record => {
                let outcome = self.game.start_recording()?;
                Ok(self.transition(name, outcome))
            }
            Command::StopRecord => {
                let outcome = self.game.stop_recording();
                Ok(self.transition(name, outcome))
            }
            Command::Playback { rate } => {
                let outcome = self
                    .game
                    .play_replay(PlaybackRate::from_ticks_per_second(rate))?;
                Ok(self.transition(name, outcome))
            }
            Command::Save { path } => {
                let record = self
                    .game
                    .replay()
                    .last_record()
                    .ok_or(EngineError::NoRecord)?;
                record.save(&path)?;
                Ok(Response::ack(name))
            }
            Command::Load { path } => {
                let record = ReplayRecord::load(&path)?;
                let outcome = self.game.load_record(record);
                Ok(self.transition(name, outcome))
            }
            Command::Quit => {
                self.quit = true;
                Ok(Response::Goodbye {
                    tick: self.game.clock(),
                })
            }
        }
    }

    fn submit(&mut self, name: &str, source: InstanceId, input: Input) -> Response {
        if self.game.submit_input(source, input) {
            Response::ack(name)
        } else {
            Response::error("input dropped during playback", Some(name))
        }
    }

    fn transition(&self, name: &str, outcome: TransitionOutcome) -> Response {
        Response::Transition {
            cmd: name.to_string(),
            applied: outcome.is_applied(),
            mode: self.game.replay().mode(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner() -> HeadlessRunner {
        HeadlessRunner::new(&Scenario::platformer()).unwrap()
    }

    #[test]
    fn test_join_then_tick_adds_player() {
        let mut runner = runner();
        assert!(matches!(
            runner.handle(Command::Join { source: 1 }),
            Response::Ack { .. }
        ));
        let response = runner.handle(Command::Tick { count: 2 });
        assert!(matches!(response, Response::Ticked { tick: 2, .. }));
        assert_eq!(runner.game().player_count(), 1);
    }

    #[test]
    fn test_bad_input_text_is_an_error() {
        let mut runner = runner();
        let response = runner.handle(Command::Input {
            source: 1,
            input: "DANCE".to_string(),
        });
        assert!(matches!(response, Response::Error { cmd: Some(ref c), .. } if c == "input"));
    }

    #[test]
    fn test_save_without_record_reports_missing_record() {
        let mut runner = runner();
        let response = runner.handle(Command::Save {
            path: "unused.replay".to_string(),
        });
        match response {
            Response::Error { message, cmd } => {
                assert_eq!(message, EngineError::NoRecord.to_string());
                assert_eq!(cmd.as_deref(), Some("save"));
            }
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[test]
    fn test_playback_without_record_is_ignored() {
        let mut runner = runner();
        let response = runner.handle(Command::Playback { rate: 60 });
        assert!(matches!(
            response,
            Response::Transition {
                applied: false,
                mode: ReplayMode::Idle,
                ..
            }
        ));
    }

    #[test]
    fn test_session_over_json_lines() {
        let mut runner = runner();
        let input = concat!(
            "{\"cmd\":\"join\",\"source\":1}\n",
            "not json\n",
            "\n",
            "{\"cmd\":\"tick\",\"count\":3}\n",
            "{\"cmd\":\"quit\"}\n",
            "{\"cmd\":\"tick\"}\n",
        );
        let mut output = Vec::new();
        runner.run(input.as_bytes(), &mut output).unwrap();

        let text = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].contains(r#""type":"ready""#));
        assert!(lines[2].contains(r#""type":"error""#));
        assert!(lines[3].contains(r#""tick":3"#));
        assert!(lines[4].contains(r#""type":"goodbye""#));
        assert!(runner.is_finished());
    }
}
