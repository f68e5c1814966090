//! Groups coalescence peaks into candidate events: run detection above a
//! threshold, asymmetric window padding, and overlap merging.
//!
//! Grounded on `examples/original_source/QMigrate/signal/scan.py`'s
//! `trigger` method (run grouping, per-side padding against the run's peak
//! sample, merging overlapping candidate windows, `event_id` assignment).

use hifitime::{Duration, Epoch, Unit};
use thiserror::Error;

use crate::event::Event;

#[derive(Error, Debug)]
pub enum TriggerError {
    #[error("minimum_repeat ({minimum_repeat}s) must be at least marginal_window ({marginal_window}s)")]
    RepeatLessThanMarginal {
        minimum_repeat: f64,
        marginal_window: f64,
    },
}

/// One sample of the coalescence time series, reduced to its spatial peak.
#[derive(Clone, Copy, Debug)]
pub struct CoaSample {
    pub time: Epoch,
    pub value: f64,
    pub xyz: (f64, f64, f64),
}

/// Trigger configuration.
#[derive(Clone, Copy, Debug)]
pub struct TriggerConfig {
    pub detection_threshold: f64,
    /// Half-width of the window placed around each triggered peak.
    pub marginal_window_s: f64,
    /// Minimum separation between two triggers before they're merged into
    /// one candidate window.
    pub minimum_repeat_s: f64,
}

impl TriggerConfig {
    fn validate(&self) -> Result<(), TriggerError> {
        if self.minimum_repeat_s < self.marginal_window_s {
            return Err(TriggerError::RepeatLessThanMarginal {
                minimum_repeat: self.minimum_repeat_s,
                marginal_window: self.marginal_window_s,
            });
        }
        Ok(())
    }
}

/// A candidate event window: the padded time span to hand to [`crate::locate`],
/// plus the best coalescence sample inside it.
#[derive(Clone, Debug)]
pub struct CandidateWindow {
    pub start: Epoch,
    pub end: Epoch,
    pub peak: CoaSample,
}

/// Finds contiguous runs of `series` above `config.detection_threshold` and
/// pads each into a candidate window around its peak sample: on each side,
/// if the peak sits closer than `config.marginal_window_s` to that edge of
/// the run, the edge is pushed out to `config.marginal_window_s` from the
/// peak; otherwise the run's own edge is kept. Either way
/// `config.minimum_repeat_s` is then added as further padding on that side.
/// Windows that overlap, or are separated by less than
/// `config.minimum_repeat_s`, are merged, keeping the highest-coalescence
/// sample across the merge as the merged window's peak.
pub fn trigger(series: &[CoaSample], config: &TriggerConfig) -> Result<Vec<CandidateWindow>, TriggerError> {
    config.validate()?;
    if series.is_empty() {
        return Ok(Vec::new());
    }

    let marginal_window = Duration::from_f64(config.marginal_window_s, Unit::Second);
    let minimum_repeat = Duration::from_f64(config.minimum_repeat_s, Unit::Second);
    let merge_gap = Duration::from_f64(
        config.minimum_repeat_s - 2.0 * config.marginal_window_s,
        Unit::Second,
    );

    let mut windows: Vec<CandidateWindow> = Vec::new();
    let mut run_start: Option<usize> = None;

    for (i, sample) in series.iter().enumerate() {
        let above = sample.value >= config.detection_threshold;
        if above && run_start.is_none() {
            run_start = Some(i);
        }
        let run_ends_here = run_start.is_some() && (!above || i == series.len() - 1);
        if run_ends_here {
            let start_idx = run_start.take().unwrap();
            let end_idx = if above { i } else { i - 1 };
            let run = &series[start_idx..=end_idx];
            let peak = *run
                .iter()
                .max_by(|a, b| a.value.partial_cmp(&b.value).unwrap())
                .expect("run is non-empty");

            let t_min = run[0].time;
            let t_max = run[run.len() - 1].time;
            let t_val = peak.time;

            let start = if t_val - t_min < marginal_window {
                t_val - marginal_window - minimum_repeat
            } else {
                t_min - minimum_repeat
            };
            let end = if t_max - t_val < marginal_window {
                t_val + marginal_window + minimum_repeat
            } else {
                t_max + minimum_repeat
            };

            windows.push(CandidateWindow { start, end, peak });
        }
    }

    windows.sort_by(|a, b| a.start.partial_cmp(&b.start).unwrap());
    let mut merged: Vec<CandidateWindow> = Vec::new();
    for window in windows {
        match merged.last_mut() {
            Some(prev) if window.start - prev.end <= merge_gap => {
                if window.end > prev.end {
                    prev.end = window.end;
                }
                if window.peak.value > prev.peak.value {
                    prev.peak = window.peak;
                }
            }
            _ => merged.push(window),
        }
    }

    Ok(merged)
}

/// Builds an [`Event`] from a triggered window's peak sample.
pub fn event_from_window(window: &CandidateWindow) -> Event {
    Event {
        event_id: Event::id_from_time(window.peak.time),
        coa_time: window.peak.time,
        coa_value: window.peak.value,
        coa_xyz: window.peak.xyz,
        min_time: window.start,
        max_time: window.end,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hifitime::Epoch;

    fn sample(t: f64, value: f64) -> CoaSample {
        CoaSample {
            time: Epoch::from_unix_seconds(t),
            value,
            xyz: (0.0, 0.0, 0.0),
        }
    }

    fn config() -> TriggerConfig {
        TriggerConfig {
            detection_threshold: 1.5,
            marginal_window_s: 1.0,
            minimum_repeat_s: 2.0,
        }
    }

    #[test]
    fn window_padding_includes_minimum_repeat_beyond_the_run() {
        // A single-sample run: the peak sits 0s from both edges, so both
        // sides get pushed out to marginal_window_s, plus minimum_repeat_s.
        let series = vec![sample(0.0, 0.1), sample(1.0, 2.0), sample(2.0, 0.1)];
        let windows = trigger(&series, &config()).unwrap();
        assert_eq!(windows.len(), 1);
        let start_s = (windows[0].peak.time - windows[0].start).to_seconds();
        let end_s = (windows[0].end - windows[0].peak.time).to_seconds();
        assert!((start_s - 3.0).abs() < 1e-9);
        assert!((end_s - 3.0).abs() < 1e-9);
    }

    #[test]
    fn a_single_run_becomes_one_window() {
        let series = vec![
            sample(0.0, 0.1),
            sample(1.0, 2.0),
            sample(2.0, 3.0),
            sample(3.0, 0.2),
        ];
        let windows = trigger(&series, &config()).unwrap();
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].peak.value, 3.0);
    }

    #[test]
    fn nearby_runs_are_merged() {
        let series = vec![
            sample(0.0, 2.0),
            sample(1.0, 0.1),
            sample(1.5, 2.5),
            sample(2.5, 0.1),
        ];
        let windows = trigger(&series, &config()).unwrap();
        assert_eq!(windows.len(), 1);
    }

    #[test]
    fn distant_runs_stay_separate() {
        let series = vec![
            sample(0.0, 2.0),
            sample(1.0, 0.1),
            sample(20.0, 2.5),
            sample(21.0, 0.1),
        ];
        let windows = trigger(&series, &config()).unwrap();
        assert_eq!(windows.len(), 2);
    }

    #[test]
    fn no_peaks_above_threshold_gives_no_windows() {
        let series = vec![sample(0.0, 0.1), sample(1.0, 0.2)];
        let windows = trigger(&series, &config()).unwrap();
        assert!(windows.is_empty());
    }

    #[test]
    fn rejects_inconsistent_repeat_and_marginal() {
        let bad = TriggerConfig {
            detection_threshold: 1.0,
            marginal_window_s: 5.0,
            minimum_repeat_s: 1.0,
        };
        assert!(trigger(&[], &bad).is_err());
    }
}
