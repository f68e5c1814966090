use std::io::{BufRead, Write as _};
use std::path::{Path, PathBuf};

use clap::Parser;
use hifitime::Epoch;
use log::info;

use crate::config::Config;
use crate::error::SeisError;
use crate::trigger::{trigger, CoaSample, TriggerConfig};

#[derive(Parser, Debug)]
pub struct TriggerArgs {
    /// Path to the coalescence time series CSV produced by `scan`.
    #[clap(long, help_heading = "INPUT AND OUTPUT")]
    coa_series: PathBuf,

    /// Path to the TOML/YAML config file.
    #[clap(long, help_heading = "INPUT AND OUTPUT")]
    config: PathBuf,

    /// Path the candidate window CSV is written to.
    #[clap(short, long, help_heading = "INPUT AND OUTPUT")]
    output: PathBuf,
}

fn parse_f64(field: &str, context: &str) -> Result<f64, SeisError> {
    field
        .parse()
        .map_err(|_| SeisError::Io(format!("bad numeric value {field:?} in {context}")))
}

fn read_coa_series(path: &Path) -> Result<Vec<CoaSample>, SeisError> {
    let file = std::fs::File::open(path)?;
    let mut lines = std::io::BufReader::new(file).lines();
    lines.next();

    let mut series = Vec::new();
    for line in lines {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() != 5 {
            return Err(SeisError::Io(format!("coa series row has {} fields, expected 5", fields.len())));
        }
        series.push(CoaSample {
            time: Epoch::from_unix_seconds(parse_f64(fields[0], "coa series")?),
            value: parse_f64(fields[1], "coa series")?,
            xyz: (
                parse_f64(fields[2], "coa series")?,
                parse_f64(fields[3], "coa series")?,
                parse_f64(fields[4], "coa series")?,
            ),
        });
    }
    Ok(series)
}

pub fn run(args: TriggerArgs) -> Result<(), SeisError> {
    let config = Config::from_file(&args.config)?;
    config.validate()?;
    let series = read_coa_series(&args.coa_series)?;

    let trigger_config = TriggerConfig {
        detection_threshold: config.detection_threshold,
        marginal_window_s: config.marginal_window_s,
        minimum_repeat_s: config.minimum_repeat_s,
    };
    let windows = trigger(&series, &trigger_config)?;

    let mut writer = std::io::BufWriter::new(std::fs::File::create(&args.output)?);
    writeln!(writer, "start_unix_s,end_unix_s,peak_unix_s,peak_value,x,y,z")?;
    for window in &windows {
        writeln!(
            writer,
            "{},{},{},{},{},{},{}",
            window.start.to_unix_seconds(),
            window.end.to_unix_seconds(),
            window.peak.time.to_unix_seconds(),
            window.peak.value,
            window.peak.xyz.0,
            window.peak.xyz.1,
            window.peak.xyz.2
        )?;
    }
    info!("triggered {} candidate windows", windows.len());
    Ok(())
}
