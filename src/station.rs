//! Seismic station metadata.

use std::io::BufRead;
use std::path::Path;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StationFileError {
    #[error("station file has no header row")]
    MissingHeader,

    #[error("station file row {row} has {found} columns, expected 4 (name, longitude, latitude, elevation)")]
    WrongColumnCount { row: usize, found: usize },

    #[error("station file row {row} has an unparseable numeric value: {value:?}")]
    BadNumber { row: usize, value: String },

    #[error("station file has no stations")]
    Empty,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A single recording station. Elevation is positive upward, matching the
/// source's "elevation above reference" convention used throughout the LUT.
#[derive(Clone, Debug, PartialEq)]
pub struct Station {
    pub name: String,
    pub longitude: f64,
    pub latitude: f64,
    pub elevation: f64,
}

impl Station {
    pub fn new(name: impl Into<String>, longitude: f64, latitude: f64, elevation: f64) -> Self {
        Self {
            name: name.into(),
            longitude,
            latitude,
            elevation,
        }
    }
}

/// An ordered station set. This order indexes every per-station array used
/// by the LUT, onset pipeline and scanner.
#[derive(Clone, Debug, Default)]
pub struct StationSet {
    stations: Vec<Station>,
}

impl StationSet {
    pub fn new(stations: Vec<Station>) -> Self {
        Self { stations }
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Station> {
        self.stations.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Station> {
        self.stations.get(index)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.stations.iter().position(|s| s.name == name)
    }

    /// Reads a station table CSV: a header row followed by `name,
    /// longitude, latitude, elevation` rows.
    pub fn from_csv(path: impl AsRef<Path>) -> Result<Self, StationFileError> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        let mut lines = reader.lines();
        lines.next().ok_or(StationFileError::MissingHeader)??;

        let mut stations = Vec::new();
        for (row, line) in lines.enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            if fields.len() != 4 {
                return Err(StationFileError::WrongColumnCount { row, found: fields.len() });
            }
            let parse = |value: &str| -> Result<f64, StationFileError> {
                value.parse().map_err(|_| StationFileError::BadNumber { row, value: value.to_string() })
            };
            stations.push(Station::new(fields[0], parse(fields[1])?, parse(fields[2])?, parse(fields[3])?));
        }
        if stations.is_empty() {
            return Err(StationFileError::Empty);
        }
        Ok(Self::new(stations))
    }
}

impl std::ops::Index<usize> for StationSet {
    type Output = Station;
    fn index(&self, index: usize) -> &Station {
        &self.stations[index]
    }
}
