//! Observed-data CSV ingest.
//!
//! The file needs a `time` column (or `t`) and any subset of the `X`, `S`,
//! `P`, `V` columns. Empty cells are missing measurements; other columns are
//! ignored.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;
use tracing::{debug, warn};

use crate::error::{FedBatchError, Result};
use crate::fitting::{Observation, ObservedData};
use crate::model::Channel;

/// Read observed data from a CSV file.
pub fn read_observed(path: impl AsRef<Path>) -> Result<ObservedData> {
    parse_observed(File::open(path)?)
}

/// Parse observed data from any CSV source.
pub fn parse_observed<R: Read>(source: R) -> Result<ObservedData> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(source);

    let headers = reader.headers()?.clone();
    let layout = Layout::from_headers(&headers)?;

    let mut observations = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        // Header is line 1.
        let line = idx + 2;
        let record = record?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        observations.push(layout.parse_row(&record, line)?);
    }
    debug!(rows = observations.len(), "read observed data");

    ObservedData::new(observations)
}

struct Layout {
    time: usize,
    channels: Vec<(usize, Channel)>,
}

impl Layout {
    fn from_headers(headers: &StringRecord) -> Result<Self> {
        let mut time = None;
        let mut channels = Vec::new();

        for (idx, raw) in headers.iter().enumerate() {
            // Spreadsheet exports may prefix the first header with a BOM.
            let name = raw.trim_start_matches('\u{feff}');
            if name.eq_ignore_ascii_case("time") || name == "t" {
                time = Some(idx);
            } else if let Ok(channel) = name.parse::<Channel>() {
                channels.push((idx, channel));
            } else {
                warn!(column = name, "ignoring unrecognized data column");
            }
        }

        let time = time.ok_or_else(|| FedBatchError::invalid("observed data needs a time column"))?;
        if channels.is_empty() {
            return Err(FedBatchError::invalid(
                "observed data needs at least one of the X, S, P, V columns",
            ));
        }
        Ok(Self { time, channels })
    }

    fn parse_row(&self, record: &StringRecord, line: usize) -> Result<Observation> {
        let t = match record.get(self.time) {
            Some(cell) if !cell.is_empty() => parse_cell(cell, "time", line)?,
            _ => {
                return Err(FedBatchError::invalid(format!(
                    "line {}: missing time",
                    line
                )))
            }
        };

        let mut obs = Observation::new(t);
        for &(idx, channel) in &self.channels {
            match record.get(idx) {
                Some(cell) if !cell.is_empty() => {
                    obs = obs.with(channel, parse_cell(cell, channel.symbol(), line)?);
                }
                _ => {}
            }
        }
        Ok(obs)
    }
}

fn parse_cell(cell: &str, column: &str, line: usize) -> Result<f64> {
    cell.parse::<f64>().map_err(|_| {
        FedBatchError::invalid(format!(
            "line {}: {} value {:?} is not a number",
            line, column, cell
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_cells_and_extra_columns() {
        let csv = "time,X,S,P,B,V\n0,0.5,20,0,1,1.0\n4,1.2,,0,,\n2,0.8,15\n";
        let data = parse_observed(csv.as_bytes()).unwrap();

        assert_eq!(data.len(), 3);
        assert_eq!(data.unique_times(), vec![0.0, 2.0, 4.0]);
        assert_eq!(data.observations()[1].values.len(), 2);
        assert_eq!(data.observations()[2].get(Channel::Substrate), None);
        assert_eq!(data.measurement_count(), 4 + 2 + 2);
        assert!(data.initial_state().is_some());
    }

    #[test]
    fn test_bad_cells_reported_with_line() {
        let err = parse_observed("time,X\n0,0.5\n1,abc\n".as_bytes()).unwrap_err();
        assert!(format!("{}", err).contains("line 3"));

        assert!(parse_observed("X,S\n0.5,20\n".as_bytes()).is_err());
        assert!(parse_observed("time,B\n0,1\n".as_bytes()).is_err());
    }
}
