//! Scenario runs, record files and playback verification through the
//! headless entry points.

use std::path::PathBuf;

use arcade_core::event::PlaybackRate;
use arcade_core::policies::Game;
use arcade_headless::runner::{load_record, play_record, run_scenario, RunOptions};
use arcade_headless::{RecordInfo, Scenario, ScenarioError};

fn scenario_file(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("scenarios").join(name)
}

#[test]
fn demo_scenarios_load() {
    let platformer = Scenario::load(scenario_file("platformer_demo.ron")).unwrap();
    assert_eq!(platformer.game, Game::Platformer);
    assert_eq!(platformer.objects.len(), 2);
    platformer.parsed_script().unwrap();

    let invaders = Scenario::load(scenario_file("invaders_demo.ron")).unwrap();
    assert_eq!(invaders.game, Game::Invaders);
    assert!(!invaders.default_scene);
    let game = invaders.build().unwrap();
    assert_eq!(game.view().len(), 7);
}

#[test]
fn runs_are_reproducible() {
    let scenario = Scenario::load(scenario_file("platformer_demo.ron")).unwrap();
    let options = RunOptions {
        ticks: Some(250),
        include_state: true,
        ..RunOptions::default()
    };
    let first = run_scenario(&scenario, &options).unwrap();
    let second = run_scenario(&scenario, &options).unwrap();

    assert_eq!(first.final_tick, 250);
    assert_eq!(first.hash, second.hash);
    assert_eq!(first.hash.len(), 16);
    assert_eq!(first.state.as_ref().map(Vec::len), Some(first.objects));
    assert!(first.record.is_none());
}

#[test]
fn recorded_run_verifies_on_playback() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("invaders.replay");
    let scenario = Scenario::invaders();
    let options = RunOptions {
        ticks: Some(240),
        record: Some(path.clone()),
        include_state: false,
    };
    let summary = run_scenario(&scenario, &options).unwrap();
    assert_eq!(summary.record.as_deref(), Some(path.to_str().unwrap()));

    let record = load_record(&path).unwrap();
    assert_eq!(record.duration(), 240);
    let info = RecordInfo::from(&record);
    assert_eq!(info.inputs, scenario.script.len());
    assert_eq!(info.final_hash, summary.hash);

    let playback = play_record(&scenario, record, PlaybackRate::Double).unwrap();
    assert!(playback.matches);
    assert_eq!(playback.ticks, 240);
    assert_eq!(playback.rate, 120);
    assert!((playback.seconds - 2.0).abs() < f64::EPSILON);
    assert_eq!(playback.replayed_hash, summary.hash);
}

#[test]
fn scripted_stop_closes_the_record() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("demo.replay");
    let scenario = Scenario::load(scenario_file("invaders_demo.ron")).unwrap();
    let options = RunOptions {
        ticks: None,
        record: Some(path.clone()),
        include_state: false,
    };
    let summary = run_scenario(&scenario, &options).unwrap();
    assert_eq!(summary.final_tick, 600);

    // Recording started before the script; the scripted start is ignored
    // and the scripted stop lands after tick 301.
    let record = load_record(&path).unwrap();
    assert_eq!(record.start_tick, 0);
    assert_eq!(record.duration(), 301);

    let playback = play_record(&scenario, record, PlaybackRate::Normal).unwrap();
    assert!(playback.matches, "{} != {}", playback.replayed_hash, playback.recorded_hash);
}

#[test]
fn broken_scenario_files_are_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.ron");
    std::fs::write(&path, "Scenario(name: \"x\", game: Pong)").unwrap();
    assert!(matches!(Scenario::load(&path), Err(ScenarioError::ParseError(_))));

    std::fs::write(
        &path,
        "Scenario(name: \"x\", game: Invaders, script: [(tick: 0, source: 1, input: \"WARP\")])",
    )
    .unwrap();
    let scenario = Scenario::load(&path).unwrap();
    assert!(matches!(
        run_scenario(&scenario, &RunOptions::default()),
        Err(ScenarioError::Script(_))
    ));

    assert!(matches!(
        load_record(dir.path().join("missing.replay")),
        Err(ScenarioError::Engine(_))
    ));
}
