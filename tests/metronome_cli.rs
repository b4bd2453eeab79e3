use std::process::Command;

use serde_json::Value;

fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_metronome_cli"))
}

#[test]
fn parse_tempo_prints_clamped_bpm() {
    for (raw, expected) in [("120", "120"), ("0", "1"), ("999", "300"), (" 45 ", "45")] {
        let output = cli()
            .args(["parse-tempo", raw])
            .output()
            .expect("failed to run metronome_cli parse-tempo");
        assert!(output.status.success(), "input {raw:?} was rejected");
        let stdout = String::from_utf8(output.stdout).expect("stdout UTF-8");
        assert_eq!(stdout.trim(), expected);
    }
}

#[test]
fn parse_tempo_rejects_text() {
    let output = cli()
        .args(["parse-tempo", "allegro"])
        .output()
        .expect("failed to run metronome_cli parse-tempo");
    assert_eq!(output.status.code(), Some(2));
    assert!(output.stdout.is_empty());
}

#[test]
fn simulate_reports_regular_pulses() {
    let output = cli()
        .args(["simulate", "--bpm", "120", "--seconds", "2"])
        .output()
        .expect("failed to run metronome_cli simulate");
    assert!(
        output.status.success(),
        "CLI exited with {:?}",
        output.status.code()
    );

    let stdout = String::from_utf8(output.stdout).expect("stdout UTF-8");
    let json: Value = serde_json::from_str(stdout.trim()).expect("simulation report JSON");
    assert_eq!(json["bpm"], 120);
    assert_eq!(json["beat_interval"], 0.5);
    assert_eq!(json["max_drift"], 0.0);
    let pulses = json["pulses"].as_array().expect("pulses array");
    assert_eq!(pulses.len(), json["pulse_count"].as_u64().unwrap_or_default() as usize);
    assert!(pulses.len() >= 4);
}

#[test]
fn simulate_with_jitter_keeps_beat_grid() {
    let output = cli()
        .args([
            "simulate",
            "--bpm",
            "200",
            "--seconds",
            "3",
            "--jitter-ms",
            "40",
            "--seed",
            "7",
        ])
        .output()
        .expect("failed to run jittered simulate");
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).expect("stdout UTF-8");
    let json: Value = serde_json::from_str(stdout.trim()).expect("simulation report JSON");
    assert_eq!(json["max_drift"], 0.0);
    assert!(json["pulse_count"].as_u64().unwrap_or_default() >= 10);
}

#[test]
fn simulate_rejects_out_of_range_tempo() {
    let output = cli()
        .args(["simulate", "--bpm", "0"])
        .output()
        .expect("failed to run metronome_cli simulate");
    assert_eq!(output.status.code(), Some(1));
}
