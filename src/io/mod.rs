//! File formats for records exchanged with the outside world.
//!
//! - Parameters, initial state, free parameters and tunable bounds: YAML
//! - Observed data and exported trajectories: CSV
//! - Fit and optimization results: JSON, plus YAML for the resulting
//!   parameter record and plain text for the optimization summary

mod export;
mod observed;
mod records;

pub use export::{
    write_json, write_parameters_yaml, write_series, write_series_csv, write_summary,
    SERIES_COLUMNS,
};
pub use observed::{parse_observed, read_observed};
pub use records::{
    parse_free_parameters, parse_initial_state, parse_parameter_set, parse_parameters,
    parse_tunable_bounds, read_free_parameters, read_initial_state, read_parameters,
    read_tunable_bounds,
};
