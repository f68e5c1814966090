//! End-to-end tests driving the `seiscoal` binary across all four
//! subcommands: `build-lut` -> `scan` -> `trigger` -> `locate`.

use std::io::Write;

use assert_cmd::Command;
use byteorder::{LittleEndian, WriteBytesExt};
use predicates::prelude::*;
use tempfile::tempdir;

fn write_stations(path: &std::path::Path) {
    let mut f = std::fs::File::create(path).unwrap();
    writeln!(f, "name,longitude,latitude,elevation").unwrap();
    writeln!(f, "AA01,0.0,0.0,0.0").unwrap();
    writeln!(f, "AA02,0.01,0.0,0.0").unwrap();
    writeln!(f, "AA03,0.0,0.01,0.0").unwrap();
}

fn write_velocity(path: &std::path::Path) {
    let mut f = std::fs::File::create(path).unwrap();
    writeln!(f, "depth,vp,vs").unwrap();
    writeln!(f, "0,5000,2900").unwrap();
    writeln!(f, "5000,6000,3400").unwrap();
}

fn write_config(path: &std::path::Path) {
    let mut f = std::fs::File::create(path).unwrap();
    writeln!(
        f,
        r#"
sampling_rate = 100.0
detection_threshold = 1.5
marginal_window_s = 1.0
minimum_repeat_s = 2.0
pick_threshold = 0.88
percent_tt = 0.1
onset_centred = false
normalise_coalescence = false
time_step_s = 0.5
n_cores = 1

[p_bp_filter]
low_hz = 2.0
high_hz = 16.0
order = 4

[s_bp_filter]
low_hz = 2.0
high_hz = 16.0
order = 4

[p_onset_win]
sta_s = 0.1
lta_s = 1.0

[s_onset_win]
sta_s = 0.2
lta_s = 1.5

[decimate]
dx = 1
dy = 1
dz = 1
"#
    )
    .unwrap();
}

/// A raw-f32 waveform: 3 stations, all available, with a synthetic P/S pulse
/// injected into the Z and E components at a fixed sample so the pipeline
/// has something to detect.
fn write_waveform(path: &std::path::Path, n_stations: usize, n_samples: usize, sampling_rate: f64) {
    let mut f = std::fs::File::create(path).unwrap();
    f.write_u32::<LittleEndian>(n_stations as u32).unwrap();
    f.write_u32::<LittleEndian>(n_samples as u32).unwrap();
    f.write_f64::<LittleEndian>(sampling_rate).unwrap();
    f.write_f64::<LittleEndian>(0.0).unwrap();

    let pulse_centre = n_samples / 2;
    for component in 0..3 {
        for _station in 0..n_stations {
            for t in 0..n_samples {
                let d = t as f64 - pulse_centre as f64;
                let envelope = (-(d * d) / (2.0 * 20.0 * 20.0)).exp();
                let carrier = (2.0 * std::f64::consts::PI * 8.0 * t as f64 / sampling_rate).sin();
                let value = if component == 2 { 5.0 * envelope * carrier } else { 2.0 * envelope * carrier };
                f.write_f32::<LittleEndian>(value as f32).unwrap();
            }
        }
    }
    for _ in 0..n_stations {
        f.write_u8(1).unwrap();
    }
}

#[test]
fn pipeline_runs_end_to_end() {
    let dir = tempdir().unwrap();
    let stations_path = dir.path().join("stations.csv");
    let velocity_path = dir.path().join("velocity.csv");
    let config_path = dir.path().join("config.toml");
    let waveform_path = dir.path().join("waveform.raw");
    let lut_path = dir.path().join("lut.bin");
    let coa_path = dir.path().join("coa.csv");
    let windows_path = dir.path().join("windows.csv");
    let events_path = dir.path().join("events.csv");

    write_stations(&stations_path);
    write_velocity(&velocity_path);
    write_config(&config_path);
    write_waveform(&waveform_path, 3, 2000, 100.0);

    Command::cargo_bin("seiscoal")
        .unwrap()
        .args([
            "build-lut",
            "--stations",
            stations_path.to_str().unwrap(),
            "--velocity-model",
            velocity_path.to_str().unwrap(),
            "--output",
            lut_path.to_str().unwrap(),
            "--nx",
            "3",
            "--ny",
            "3",
            "--nz",
            "3",
            "--dx",
            "200.0",
            "--dy",
            "200.0",
            "--dz",
            "200.0",
            "--longitude",
            "0.0",
            "--latitude",
            "0.0",
            "--mode",
            "homogeneous",
        ])
        .assert()
        .success();
    assert!(lut_path.exists());

    Command::cargo_bin("seiscoal")
        .unwrap()
        .args([
            "scan",
            "--lut",
            lut_path.to_str().unwrap(),
            "--waveform",
            waveform_path.to_str().unwrap(),
            "--config",
            config_path.to_str().unwrap(),
            "--output",
            coa_path.to_str().unwrap(),
        ])
        .assert()
        .success();
    let coa_contents = std::fs::read_to_string(&coa_path).unwrap();
    assert!(coa_contents.starts_with("time_unix_s,value,x,y,z"));

    Command::cargo_bin("seiscoal")
        .unwrap()
        .args([
            "trigger",
            "--coa-series",
            coa_path.to_str().unwrap(),
            "--config",
            config_path.to_str().unwrap(),
            "--output",
            windows_path.to_str().unwrap(),
        ])
        .assert()
        .success();
    let windows_contents = std::fs::read_to_string(&windows_path).unwrap();
    assert!(windows_contents.starts_with("start_unix_s,end_unix_s,peak_unix_s,peak_value,x,y,z"));

    Command::cargo_bin("seiscoal")
        .unwrap()
        .args([
            "locate",
            "--lut",
            lut_path.to_str().unwrap(),
            "--waveform",
            waveform_path.to_str().unwrap(),
            "--windows",
            windows_path.to_str().unwrap(),
            "--config",
            config_path.to_str().unwrap(),
            "--output",
            events_path.to_str().unwrap(),
        ])
        .assert()
        .success();
    assert!(events_path.exists());
}

#[test]
fn build_lut_rejects_an_unknown_mode() {
    let dir = tempdir().unwrap();
    let stations_path = dir.path().join("stations.csv");
    let velocity_path = dir.path().join("velocity.csv");
    let lut_path = dir.path().join("lut.bin");
    write_stations(&stations_path);
    write_velocity(&velocity_path);

    Command::cargo_bin("seiscoal")
        .unwrap()
        .args([
            "build-lut",
            "--stations",
            stations_path.to_str().unwrap(),
            "--velocity-model",
            velocity_path.to_str().unwrap(),
            "--output",
            lut_path.to_str().unwrap(),
            "--nx",
            "3",
            "--ny",
            "3",
            "--nz",
            "3",
            "--dx",
            "200.0",
            "--dy",
            "200.0",
            "--dz",
            "200.0",
            "--longitude",
            "0.0",
            "--latitude",
            "0.0",
            "--mode",
            "bogus",
        ])
        .assert()
        .failure()
        .stdout(predicate::str::contains("unknown build mode"));
}

#[test]
fn trigger_rejects_a_malformed_coa_series_row() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("config.toml");
    let coa_path = dir.path().join("coa.csv");
    let windows_path = dir.path().join("windows.csv");
    write_config(&config_path);
    std::fs::write(&coa_path, "time_unix_s,value,x,y,z\n1,2,3\n").unwrap();

    Command::cargo_bin("seiscoal")
        .unwrap()
        .args([
            "trigger",
            "--coa-series",
            coa_path.to_str().unwrap(),
            "--config",
            config_path.to_str().unwrap(),
            "--output",
            windows_path.to_str().unwrap(),
        ])
        .assert()
        .failure();
}
