//! Writers for result records.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::error::Result;
use crate::model::{ModelParameters, ProductionMode};
use crate::simulator::TimeSeries;
use crate::strategy::OptimizationResult;

/// Column order of exported trajectories.
pub const SERIES_COLUMNS: [&str; 8] = ["time", "X", "S", "P", "V", "F", "mu", "qP"];

/// Write a trajectory with feed rate and specific rates as CSV.
pub fn write_series_csv(
    path: impl AsRef<Path>,
    series: &TimeSeries,
    params: &ModelParameters,
    mode: ProductionMode,
) -> Result<()> {
    write_series(File::create(path)?, series, params, mode)
}

/// Write a trajectory as CSV to any sink.
pub fn write_series<W: Write>(
    sink: W,
    series: &TimeSeries,
    params: &ModelParameters,
    mode: ProductionMode,
) -> Result<()> {
    let mut writer = csv::Writer::from_writer(sink);
    writer.write_record(SERIES_COLUMNS)?;

    let rates = series.rates(params, mode);
    let feeds = series.feed_rates(params);
    for ((sample, rate), feed) in series.iter().zip(&rates).zip(&feeds) {
        let s = &sample.state;
        writer.write_record(
            [sample.t, s.x, s.s, s.p, s.v, *feed, rate.mu, rate.q_p].map(|v| v.to_string()),
        )?;
    }
    writer.flush()?;
    Ok(())
}

/// Write a full parameter record as flat YAML, readable by
/// [`read_parameters`](super::read_parameters).
pub fn write_parameters_yaml(path: impl AsRef<Path>, params: &ModelParameters) -> Result<()> {
    fs::write(path, serde_yaml::to_string(params)?)?;
    Ok(())
}

/// Write any result record as pretty JSON.
pub fn write_json<T: Serialize>(path: impl AsRef<Path>, record: &T) -> Result<()> {
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, record)?;
    Ok(())
}

/// Write the plain-text optimization summary.
pub fn write_summary(path: impl AsRef<Path>, result: &OptimizationResult) -> Result<()> {
    fs::write(path, result.to_string())?;
    Ok(())
}
