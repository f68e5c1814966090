//! One-shot logging setup for the CLI entry point.
//!
//! Grounded on the teacher's `fern` + `log` convention: a colored terminal
//! sink plus an optional plain file sink, both driven off one verbosity
//! count (`-v`/`-vv`).

use std::path::Path;

use fern::colors::{Color, ColoredLevelConfig};
use log::LevelFilter;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("failed to open log file {path}: {source}")]
    OpenLogFile { path: String, source: std::io::Error },

    #[error("failed to install the logger: {0}")]
    Install(#[from] log::SetLoggerError),
}

/// Maps a `-v` count to a level: none is `info`, one `-v` is `debug`, two or
/// more is `trace`.
fn level_for_verbosity(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Installs the global logger. Call once, from the CLI entry point.
pub fn setup_logging(verbosity: u8, log_file: Option<&Path>) -> Result<(), LoggingError> {
    let level = level_for_verbosity(verbosity);
    let colors = ColoredLevelConfig::new()
        .info(Color::Green)
        .warn(Color::Yellow)
        .error(Color::Red)
        .debug(Color::Blue)
        .trace(Color::BrightBlack);

    let terminal = fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
                colors.color(record.level()),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stdout());

    let mut dispatch = fern::Dispatch::new().chain(terminal);

    if let Some(path) = log_file {
        let file = fern::log_file(path).map_err(|source| LoggingError::OpenLogFile {
            path: path.display().to_string(),
            source,
        })?;
        let file_sink = fern::Dispatch::new()
            .format(|out, message, record| {
                out.finish(format_args!(
                    "[{} {} {}] {}",
                    chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
                    record.level(),
                    record.target(),
                    message
                ))
            })
            .level(level)
            .chain(file);
        dispatch = dispatch.chain(file_sink);
    }

    dispatch.apply()?;
    Ok(())
}

impl From<LoggingError> for crate::error::SeisError {
    fn from(e: LoggingError) -> Self {
        Self::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_maps_to_expected_levels() {
        assert_eq!(level_for_verbosity(0), LevelFilter::Info);
        assert_eq!(level_for_verbosity(1), LevelFilter::Debug);
        assert_eq!(level_for_verbosity(5), LevelFilter::Trace);
    }
}
