use std::io::BufRead;
use std::path::{Path, PathBuf};

use clap::Parser;
use hifitime::Epoch;
use log::{info, warn};

use crate::config::Config;
use crate::error::SeisError;
use crate::event::{CsvResultsWriter, ResultsWriter};
use crate::locate::{locate_event, LocateConfig};
use crate::lut::read_lut;
use crate::scan::CoalescenceScanner;
use crate::trigger::{CandidateWindow, CoaSample};
use crate::waveform::{RawF32Source, WaveformSource};

use super::scan_cmd::onset_pipeline_from_config;

#[derive(Parser, Debug)]
pub struct LocateArgs {
    /// Path to a binary LUT produced by `build-lut`.
    #[clap(long, help_heading = "INPUT AND OUTPUT")]
    lut: PathBuf,

    /// Path to a raw-f32 waveform file (see `RawF32Source`).
    #[clap(long, help_heading = "INPUT AND OUTPUT")]
    waveform: PathBuf,

    /// Path to the candidate window CSV produced by `trigger`.
    #[clap(long, help_heading = "INPUT AND OUTPUT")]
    windows: PathBuf,

    /// Path to the TOML/YAML config file.
    #[clap(long, help_heading = "INPUT AND OUTPUT")]
    config: PathBuf,

    /// Path the event/pick CSV is written to.
    #[clap(short, long, help_heading = "INPUT AND OUTPUT")]
    output: PathBuf,

    /// Half-window, in cells, used by the 3D Gaussian fit.
    #[clap(long, default_value = "3", help_heading = "LOCATION")]
    gaussian_half_window: i64,

    /// Half-window, in cells, used by the cubic-spline fit.
    #[clap(long, default_value = "3", help_heading = "LOCATION")]
    spline_half_window: i64,

    /// Grid-refinement factor the cubic-spline fit evaluates on.
    #[clap(long, default_value = "10", help_heading = "LOCATION")]
    spline_upscale: usize,

    /// Normalised-coalescence fraction above which a cell contributes to
    /// the covariance fit.
    #[clap(long, default_value = "0.88", help_heading = "LOCATION")]
    covariance_threshold: f64,
}

fn parse_f64(field: &str, context: &str) -> Result<f64, SeisError> {
    field
        .parse()
        .map_err(|_| SeisError::Io(format!("bad numeric value {field:?} in {context}")))
}

fn read_windows(path: &Path) -> Result<Vec<CandidateWindow>, SeisError> {
    let file = std::fs::File::open(path)?;
    let mut lines = std::io::BufReader::new(file).lines();
    lines.next();

    let mut windows = Vec::new();
    for line in lines {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() != 7 {
            return Err(SeisError::Io(format!("windows row has {} fields, expected 7", fields.len())));
        }
        windows.push(CandidateWindow {
            start: Epoch::from_unix_seconds(parse_f64(fields[0], "windows")?),
            end: Epoch::from_unix_seconds(parse_f64(fields[1], "windows")?),
            peak: CoaSample {
                time: Epoch::from_unix_seconds(parse_f64(fields[2], "windows")?),
                value: parse_f64(fields[3], "windows")?,
                xyz: (
                    parse_f64(fields[4], "windows")?,
                    parse_f64(fields[5], "windows")?,
                    parse_f64(fields[6], "windows")?,
                ),
            },
        });
    }
    Ok(windows)
}

/// Locates and picks every candidate window. A failure in any one window
/// (onset computation, scan, or fit) is logged and that window is skipped;
/// it never aborts the run, per `SPEC_FULL.md` §7's per-event error policy.
pub fn run(args: LocateArgs) -> Result<(), SeisError> {
    let config = Config::from_file(&args.config)?;
    config.validate()?;

    let lut = read_lut(&args.lut)?;
    let source = RawF32Source::new(&args.waveform);
    let windows = read_windows(&args.windows)?;
    let onset_pipeline = onset_pipeline_from_config(&config);

    let locate_config = LocateConfig {
        covariance_threshold: args.covariance_threshold,
        gaussian_half_window: args.gaussian_half_window,
        spline_half_window: args.spline_half_window,
        spline_upscale: args.spline_upscale,
        sampling_rate: config.sampling_rate,
        marginal_window_s: config.marginal_window_s,
        percent_tt: config.percent_tt,
        pick_threshold: config.pick_threshold,
    };

    let output = std::fs::File::create(&args.output)?;
    let mut writer = CsvResultsWriter::new(std::io::BufWriter::new(output));

    let mut located_count = 0;
    for window in &windows {
        let frame = match source.read(window.start, window.end, config.sampling_rate) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("skipping event at {:?}: failed to read waveform: {e}", window.peak.time);
                continue;
            }
        };
        let (p_onsets, s_onsets) = match onset_pipeline.run(&frame) {
            Ok(onsets) => onsets,
            Err(e) => {
                warn!("skipping event at {:?}: onset computation failed: {e}", window.peak.time);
                continue;
            }
        };
        let scanner = CoalescenceScanner::new(&lut, config.sampling_rate, config.normalise_coalescence);
        let scan_result = match scanner.scan(&p_onsets, &s_onsets, &frame.availability) {
            Ok(result) => result,
            Err(e) => {
                warn!("skipping event at {:?}: scan failed: {e}", window.peak.time);
                continue;
            }
        };
        match locate_event(&lut, &scan_result, window, &p_onsets, &s_onsets, frame.start_time, &locate_config) {
            Ok(located) => {
                writer.write_event(&located)?;
                located_count += 1;
            }
            Err(e) => warn!("skipping event at {:?}: location failed: {e}", window.peak.time),
        }
    }
    info!("located {located_count}/{} candidate windows", windows.len());
    Ok(())
}
