//! Simulated trajectories.

use serde::{Deserialize, Serialize};

use crate::error::{FedBatchError, Result};
use crate::model::{
    feed_rate, specific_rates, Channel, ModelParameters, ProductionMode, SpecificRates, State,
};

/// One point of a trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub t: f64,
    #[serde(flatten)]
    pub state: State,
}

/// A trajectory sampled at strictly increasing times.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Sample>", into = "Vec<Sample>")]
pub struct TimeSeries {
    samples: Vec<Sample>,
}

impl TimeSeries {
    /// Build a series, checking that times strictly increase.
    pub fn new(samples: Vec<Sample>) -> Result<Self> {
        if let Some(pair) = samples.windows(2).find(|w| w[1].t <= w[0].t) {
            return Err(FedBatchError::invalid(format!(
                "time series must be strictly increasing, got {} after {}",
                pair[1].t, pair[0].t
            )));
        }
        Ok(Self { samples })
    }

    pub(crate) fn from_sorted(samples: Vec<Sample>) -> Self {
        Self { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    pub fn times(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.t).collect()
    }

    /// Values of one channel, in time order.
    pub fn channel(&self, channel: Channel) -> Vec<f64> {
        self.samples.iter().map(|s| s.state.get(channel)).collect()
    }

    pub fn first(&self) -> Option<&Sample> {
        self.samples.first()
    }

    pub fn last(&self) -> Option<&Sample> {
        self.samples.last()
    }

    /// State at the last sample.
    pub fn final_state(&self) -> Option<State> {
        self.samples.last().map(|s| s.state)
    }

    /// State at `t`, linearly interpolated between samples.
    ///
    /// `None` outside the sampled range.
    pub fn state_at(&self, t: f64) -> Option<State> {
        let first = self.samples.first()?;
        let last = self.samples.last()?;
        if t < first.t || t > last.t {
            return None;
        }

        let idx = self.samples.partition_point(|s| s.t < t);
        let right = &self.samples[idx];
        if right.t == t || idx == 0 {
            return Some(right.state);
        }
        let left = &self.samples[idx - 1];
        let frac = (t - left.t) / (right.t - left.t);
        Some(left.state.lerp(&right.state, frac))
    }

    /// Specific rates at every sample.
    pub fn rates(&self, params: &ModelParameters, mode: ProductionMode) -> Vec<SpecificRates> {
        self.samples
            .iter()
            .map(|s| specific_rates(s.t, &s.state, params, mode))
            .collect()
    }

    /// Feed rate at every sample.
    pub fn feed_rates(&self, params: &ModelParameters) -> Vec<f64> {
        self.samples.iter().map(|s| feed_rate(s.t, params)).collect()
    }
}

impl TryFrom<Vec<Sample>> for TimeSeries {
    type Error = FedBatchError;

    fn try_from(samples: Vec<Sample>) -> Result<Self> {
        Self::new(samples)
    }
}

impl From<TimeSeries> for Vec<Sample> {
    fn from(series: TimeSeries) -> Self {
        series.samples
    }
}

impl<'a> IntoIterator for &'a TimeSeries {
    type Item = &'a Sample;
    type IntoIter = std::slice::Iter<'a, Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.iter()
    }
}

/// The uniform reporting grid `0, step, 2*step, ...` closed with `t_end`.
///
/// A grid point closer to `t_end` than a millionth of a step is dropped in
/// favour of `t_end` itself, so the last interval is never degenerate.
pub fn reporting_grid(t_end: f64, step: f64) -> Result<Vec<f64>> {
    if !(t_end.is_finite() && t_end > 0.0) {
        return Err(FedBatchError::invalid(format!(
            "end time must be positive and finite, got {}",
            t_end
        )));
    }
    if !(step.is_finite() && step > 0.0) {
        return Err(FedBatchError::invalid(format!(
            "reporting step must be positive and finite, got {}",
            step
        )));
    }

    let mut grid = Vec::new();
    let mut k: u64 = 0;
    loop {
        let t = k as f64 * step;
        if t >= t_end - 1e-6 * step {
            break;
        }
        grid.push(t);
        k += 1;
    }
    grid.push(t_end);
    Ok(grid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn series() -> TimeSeries {
        TimeSeries::new(vec![
            Sample {
                t: 0.0,
                state: State::new(1.0, 10.0, 0.0, 1.0),
            },
            Sample {
                t: 2.0,
                state: State::new(3.0, 6.0, 1.0, 2.0),
            },
        ])
        .unwrap()
    }

    #[test]
    fn test_rejects_unsorted() {
        let s = Sample {
            t: 1.0,
            state: State::new(1.0, 1.0, 1.0, 1.0),
        };
        assert!(TimeSeries::new(vec![s, s]).is_err());
    }

    #[test]
    fn test_state_at() {
        let ts = series();
        let mid = ts.state_at(1.0).unwrap();
        assert_relative_eq!(mid.x, 2.0);
        assert_relative_eq!(mid.s, 8.0);
        assert_eq!(ts.state_at(0.0).unwrap().x, 1.0);
        assert_eq!(ts.state_at(2.0).unwrap().x, 3.0);
        assert!(ts.state_at(2.5).is_none());
        assert!(ts.state_at(-0.1).is_none());
    }

    #[test]
    fn test_channels_and_final_state() {
        let ts = series();
        assert_eq!(ts.channel(Channel::Volume), vec![1.0, 2.0]);
        assert_eq!(ts.final_state().unwrap().p, 1.0);
        assert_eq!(ts.times(), vec![0.0, 2.0]);
    }

    #[test]
    fn test_reporting_grid() {
        assert_eq!(reporting_grid(1.0, 0.25).unwrap(), vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(reporting_grid(1.0, 0.4).unwrap(), vec![0.0, 0.4, 0.8, 1.0]);
        // 0.1 does not divide 0.3 exactly in binary.
        assert_eq!(reporting_grid(0.3, 0.1).unwrap().len(), 4);
        assert!(reporting_grid(0.0, 0.1).is_err());
        assert!(reporting_grid(1.0, -0.1).is_err());
    }

    #[test]
    fn test_serializes_flat() {
        let json = serde_json::to_value(series()).unwrap();
        assert_eq!(json[1]["t"], 2.0);
        assert_eq!(json[1]["X"], 3.0);

        let back: TimeSeries = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(back, series());

        let reversed: Vec<_> = json.as_array().unwrap().iter().rev().cloned().collect();
        let reversed = serde_json::Value::Array(reversed);
        assert!(serde_json::from_value::<TimeSeries>(reversed).is_err());
    }
}
