//! Experimental observations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{FedBatchError, Result};
use crate::model::{Channel, State};

/// Measurements taken at one time. Any subset of channels may be present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub t: f64,
    pub values: BTreeMap<Channel, f64>,
}

impl Observation {
    pub fn new(t: f64) -> Self {
        Self {
            t,
            values: BTreeMap::new(),
        }
    }

    /// Builder-style insert.
    pub fn with(mut self, channel: Channel, value: f64) -> Self {
        self.values.insert(channel, value);
        self
    }

    pub fn get(&self, channel: Channel) -> Option<f64> {
        self.values.get(&channel).copied()
    }
}

/// A time-ordered set of observations from one experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Observation>", into = "Vec<Observation>")]
pub struct ObservedData {
    observations: Vec<Observation>,
}

impl ObservedData {
    /// Validate and sort observations by time.
    ///
    /// Repeated times are allowed (replicates). Empty rows are dropped.
    pub fn new(observations: Vec<Observation>) -> Result<Self> {
        let mut observations: Vec<Observation> = observations
            .into_iter()
            .filter(|o| !o.values.is_empty())
            .collect();
        if observations.is_empty() {
            return Err(FedBatchError::invalid("observed data contains no measurements"));
        }
        for obs in &observations {
            if !obs.t.is_finite() || obs.t < 0.0 {
                return Err(FedBatchError::invalid(format!(
                    "observation time must be finite and non-negative, got {}",
                    obs.t
                )));
            }
            if let Some((channel, v)) = obs.values.iter().find(|(_, v)| !v.is_finite()) {
                return Err(FedBatchError::invalid(format!(
                    "non-finite {} measurement at t = {}: {}",
                    channel, obs.t, v
                )));
            }
        }
        observations.sort_by(|a, b| a.t.total_cmp(&b.t));
        Ok(Self { observations })
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Distinct observation times, ascending.
    pub fn unique_times(&self) -> Vec<f64> {
        let mut times: Vec<f64> = self.observations.iter().map(|o| o.t).collect();
        times.dedup();
        times
    }

    /// Latest observation time.
    pub fn last_time(&self) -> f64 {
        self.observations.last().map(|o| o.t).unwrap_or(0.0)
    }

    /// Total number of measured values.
    pub fn measurement_count(&self) -> usize {
        self.observations.iter().map(|o| o.values.len()).sum()
    }

    /// Measured values of one channel as `(t, value)` pairs.
    pub fn channel(&self, channel: Channel) -> Vec<(f64, f64)> {
        self.observations
            .iter()
            .filter_map(|o| o.get(channel).map(|v| (o.t, v)))
            .collect()
    }

    /// Channels measured at least once.
    pub fn channels(&self) -> Vec<Channel> {
        Channel::ALL
            .into_iter()
            .filter(|c| self.observations.iter().any(|o| o.values.contains_key(c)))
            .collect()
    }

    /// The first observation as a full state, if it is at `t = 0` and
    /// measures all four channels.
    pub fn initial_state(&self) -> Option<State> {
        let first = self.observations.first()?;
        if first.t != 0.0 {
            return None;
        }
        Some(State::new(
            first.get(Channel::Biomass)?,
            first.get(Channel::Substrate)?,
            first.get(Channel::Product)?,
            first.get(Channel::Volume)?,
        ))
    }
}

impl TryFrom<Vec<Observation>> for ObservedData {
    type Error = FedBatchError;

    fn try_from(observations: Vec<Observation>) -> Result<Self> {
        Self::new(observations)
    }
}

impl From<ObservedData> for Vec<Observation> {
    fn from(data: ObservedData) -> Self {
        data.observations
    }
}
