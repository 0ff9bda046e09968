//! YAML record files: parameters, initial state, free parameters and
//! tunable bounds.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_yaml::{Mapping, Value};
use tracing::warn;

use crate::error::{FedBatchError, Result};
use crate::fitting::FreeParameter;
use crate::model::parameters::is_known_parameter;
use crate::model::{ModelParameters, ParameterSet, State};
use crate::parameters::Bounds;
use crate::strategy::Tunable;

const KINETIC: &str = "kinetic";
const OPERATION: &str = "operation";
const FEED: &str = "feed";

/// Read a complete parameter record from a YAML file.
pub fn read_parameters(path: impl AsRef<Path>) -> Result<ModelParameters> {
    parse_parameters(&fs::read_to_string(path)?)
}

/// Parse a complete parameter record.
///
/// Keys may sit at the top level or in `kinetic`, `operation` and
/// `operation.feed` sections; top-level keys win over sectioned ones.
/// Unknown keys are dropped with a warning.
pub fn parse_parameters(text: &str) -> Result<ModelParameters> {
    let set = parse_parameter_set(text)?;
    ModelParameters::from_set(&set)
}

/// Parse a possibly partial parameter set, flattening sections.
pub fn parse_parameter_set(text: &str) -> Result<ParameterSet> {
    let root: Value = serde_yaml::from_str(text)?;
    let root = match root {
        Value::Null => return Ok(ParameterSet::new()),
        Value::Mapping(m) => m,
        _ => return Err(FedBatchError::invalid("parameter file must be a mapping")),
    };

    let mut set = ParameterSet::new();
    if let Some(kinetic) = section(&root, KINETIC)? {
        collect_numbers(kinetic, &mut set);
    }
    if let Some(operation) = section(&root, OPERATION)? {
        collect_numbers(operation, &mut set);
        if let Some(feed) = section(operation, FEED)? {
            collect_numbers(feed, &mut set);
        }
    }
    collect_numbers(&root, &mut set);
    Ok(set)
}

fn section<'a>(map: &'a Mapping, key: &str) -> Result<Option<&'a Mapping>> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Mapping(m)) => Ok(Some(m)),
        Some(_) => Err(FedBatchError::invalid(format!(
            "section {} must be a mapping",
            key
        ))),
    }
}

fn collect_numbers(map: &Mapping, set: &mut ParameterSet) {
    for (key, value) in map {
        let Some(name) = key.as_str() else {
            warn!(key = ?key, "ignoring non-string parameter key");
            continue;
        };
        if matches!(name, KINETIC | OPERATION | FEED) {
            continue;
        }
        if !is_known_parameter(name) {
            warn!(name, "ignoring unknown parameter");
            continue;
        }
        match value.as_f64() {
            Some(v) => {
                set.insert(name, v);
            }
            None => warn!(name, value = ?value, "ignoring non-numeric parameter value"),
        }
    }
}

/// Read an initial state (`X`, `S`, `P`, `V`) from a YAML file.
pub fn read_initial_state(path: impl AsRef<Path>) -> Result<State> {
    parse_initial_state(&fs::read_to_string(path)?)
}

pub fn parse_initial_state(text: &str) -> Result<State> {
    let state: State = serde_yaml::from_str(text)?;
    state.validate_initial()?;
    Ok(state)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FreeEntry {
    List([f64; 3]),
    Map(FreeParameter),
}

/// Read free-parameter definitions from a YAML file.
pub fn read_free_parameters(path: impl AsRef<Path>) -> Result<BTreeMap<String, FreeParameter>> {
    parse_free_parameters(&fs::read_to_string(path)?)
}

/// Parse free parameters, either `name: [initial, lower, upper]` or
/// `name: {initial, min, max}`.
pub fn parse_free_parameters(text: &str) -> Result<BTreeMap<String, FreeParameter>> {
    let entries: Option<BTreeMap<String, FreeEntry>> = serde_yaml::from_str(text)?;
    Ok(entries
        .unwrap_or_default()
        .into_iter()
        .map(|(name, entry)| {
            let free = match entry {
                FreeEntry::List([initial, lower, upper]) => {
                    FreeParameter::new(initial, lower, upper)
                }
                FreeEntry::Map(free) => free,
            };
            (name, free)
        })
        .collect())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BoundsEntry {
    List([f64; 2]),
    Map(Bounds),
}

/// Read search intervals for tunable parameters from a YAML file.
pub fn read_tunable_bounds(path: impl AsRef<Path>) -> Result<BTreeMap<Tunable, Bounds>> {
    parse_tunable_bounds(&fs::read_to_string(path)?)
}

/// Parse `name: [lower, upper]` (or `{min, max}`) entries. Names that cannot
/// be tuned are dropped with a warning.
pub fn parse_tunable_bounds(text: &str) -> Result<BTreeMap<Tunable, Bounds>> {
    let entries: Option<BTreeMap<String, BoundsEntry>> = serde_yaml::from_str(text)?;
    let mut out = BTreeMap::new();
    for (name, entry) in entries.unwrap_or_default() {
        let Ok(tunable) = name.parse::<Tunable>() else {
            warn!(name = %name, "ignoring bounds for a parameter that cannot be tuned");
            continue;
        };
        let bounds = match entry {
            BoundsEntry::List([lower, upper]) => Bounds::new(lower, upper)?,
            BoundsEntry::Map(bounds) => bounds,
        };
        out.insert(tunable, bounds);
    }
    Ok(out)
}
