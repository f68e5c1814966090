use std::io::Write as _;
use std::path::PathBuf;

use clap::Parser;
use log::info;

use crate::config::Config;
use crate::error::SeisError;
use crate::lut::read_lut;
use crate::onset::{FilterSpec, OnsetPipeline, PhaseOnsetConfig, StaLtaMode, StaLtaWindow};
use crate::scan::{coa_series, CoalescenceScanner};
use crate::waveform::{RawF32Source, WaveformSource};

#[derive(Parser, Debug)]
pub struct ScanArgs {
    /// Path to a binary LUT produced by `build-lut`.
    #[clap(long, help_heading = "INPUT AND OUTPUT")]
    lut: PathBuf,

    /// Path to a raw-f32 waveform file (see `RawF32Source`).
    #[clap(long, help_heading = "INPUT AND OUTPUT")]
    waveform: PathBuf,

    /// Path to the TOML/YAML config file.
    #[clap(long, help_heading = "INPUT AND OUTPUT")]
    config: PathBuf,

    /// Path the coalescence time series CSV is written to.
    #[clap(short, long, help_heading = "INPUT AND OUTPUT")]
    output: PathBuf,
}

pub(super) fn onset_pipeline_from_config(config: &Config) -> OnsetPipeline {
    let mode = if config.onset_centred {
        StaLtaMode::Centred
    } else {
        StaLtaMode::Classic
    };
    let samples = |seconds: f64| (seconds * config.sampling_rate).round().max(1.0) as usize;
    OnsetPipeline {
        p: PhaseOnsetConfig {
            filter: FilterSpec {
                low_hz: config.p_bp_filter.low_hz,
                high_hz: config.p_bp_filter.high_hz,
                order: config.p_bp_filter.order,
                sampling_rate: config.sampling_rate,
            },
            window: StaLtaWindow {
                sta_samples: samples(config.p_onset_win.sta_s),
                lta_samples: samples(config.p_onset_win.lta_s),
            },
            mode,
        },
        s: PhaseOnsetConfig {
            filter: FilterSpec {
                low_hz: config.s_bp_filter.low_hz,
                high_hz: config.s_bp_filter.high_hz,
                order: config.s_bp_filter.order,
                sampling_rate: config.sampling_rate,
            },
            window: StaLtaWindow {
                sta_samples: samples(config.s_onset_win.sta_s),
                lta_samples: samples(config.s_onset_win.lta_s),
            },
            mode,
        },
    }
}

pub fn run(args: ScanArgs) -> Result<(), SeisError> {
    let config = Config::from_file(&args.config)?;
    config.validate()?;

    let lut = read_lut(&args.lut)?;
    let source = RawF32Source::new(&args.waveform);
    // `RawF32Source` ignores the window bounds and reads the whole file; a
    // production `WaveformSource` would honour them.
    let frame = source.read(
        hifitime::Epoch::from_unix_seconds(0.0),
        hifitime::Epoch::from_unix_seconds(0.0),
        config.sampling_rate,
    )?;

    let pipeline = onset_pipeline_from_config(&config);
    let (p_onsets, s_onsets) = pipeline.run(&frame)?;

    let scanner = CoalescenceScanner::new(&lut, config.sampling_rate, config.normalise_coalescence);
    let result = scanner.scan(&p_onsets, &s_onsets, &frame.availability)?;
    let series = coa_series(&result, &lut, frame.start_time, config.sampling_rate);

    let mut writer = std::io::BufWriter::new(std::fs::File::create(&args.output)?);
    writeln!(writer, "time_unix_s,value,x,y,z")?;
    for sample in &series {
        writeln!(
            writer,
            "{},{},{},{},{}",
            sample.time.to_unix_seconds(),
            sample.value,
            sample.xyz.0,
            sample.xyz.1,
            sample.xyz.2
        )?;
    }
    info!("wrote {} coalescence samples to {}", series.len(), args.output.display());
    Ok(())
}
