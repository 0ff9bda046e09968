//! State vector of the fed-batch model.

use std::fmt;
use std::str::FromStr;

use ode_solvers::Vector4;
use serde::{Deserialize, Serialize};

use crate::error::{FedBatchError, Result};

/// The model state: biomass, substrate, product and volume.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct State {
    /// Biomass concentration (g/L)
    #[serde(rename = "X")]
    pub x: f64,

    /// Substrate concentration (g/L)
    #[serde(rename = "S")]
    pub s: f64,

    /// Product concentration (g/L)
    #[serde(rename = "P")]
    pub p: f64,

    /// Working volume (L)
    #[serde(rename = "V")]
    pub v: f64,
}

impl State {
    pub fn new(x: f64, s: f64, p: f64, v: f64) -> Self {
        Self { x, s, p, v }
    }

    /// Value of a single channel.
    pub fn get(&self, channel: Channel) -> f64 {
        match channel {
            Channel::Biomass => self.x,
            Channel::Substrate => self.s,
            Channel::Product => self.p,
            Channel::Volume => self.v,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.s.is_finite() && self.p.is_finite() && self.v.is_finite()
    }

    /// Check that the state is usable as an initial condition.
    pub fn validate_initial(&self) -> Result<()> {
        for channel in Channel::ALL {
            let v = self.get(channel);
            if !v.is_finite() || v < 0.0 {
                return Err(FedBatchError::invalid(format!(
                    "initial {} must be finite and non-negative, got {}",
                    channel, v
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn to_vector(self) -> Vector4<f64> {
        Vector4::new(self.x, self.s, self.p, self.v)
    }

    pub(crate) fn from_vector(y: &Vector4<f64>) -> Self {
        Self::new(y[0], y[1], y[2], y[3])
    }

    /// Linear interpolation between two states.
    pub(crate) fn lerp(&self, other: &State, frac: f64) -> State {
        State::new(
            self.x + (other.x - self.x) * frac,
            self.s + (other.s - self.s) * frac,
            self.p + (other.p - self.p) * frac,
            self.v + (other.v - self.v) * frac,
        )
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "X={}, S={}, P={}, V={}", self.x, self.s, self.p, self.v)
    }
}

/// A named component of the state, as measured in experiments.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Channel {
    #[serde(rename = "X")]
    Biomass,
    #[serde(rename = "S")]
    Substrate,
    #[serde(rename = "P")]
    Product,
    #[serde(rename = "V")]
    Volume,
}

impl Channel {
    /// All channels in state order.
    pub const ALL: [Channel; 4] = [
        Channel::Biomass,
        Channel::Substrate,
        Channel::Product,
        Channel::Volume,
    ];

    /// Column symbol used in data files.
    pub fn symbol(&self) -> &'static str {
        match self {
            Channel::Biomass => "X",
            Channel::Substrate => "S",
            Channel::Product => "P",
            Channel::Volume => "V",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Channel {
    type Err = FedBatchError;

    fn from_str(s: &str) -> Result<Self> {
        Channel::ALL
            .into_iter()
            .find(|c| c.symbol() == s)
            .ok_or_else(|| FedBatchError::invalid(format!("unknown channel: {}", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_round_trip() {
        for channel in Channel::ALL {
            assert_eq!(channel.symbol().parse::<Channel>().unwrap(), channel);
        }
        assert!("B".parse::<Channel>().is_err());
    }

    #[test]
    fn test_validate_initial() {
        assert!(State::new(0.5, 20.0, 0.0, 1.0).validate_initial().is_ok());
        assert!(State::new(0.5, -1.0, 0.0, 1.0).validate_initial().is_err());
        assert!(State::new(0.5, 20.0, f64::NAN, 1.0)
            .validate_initial()
            .is_err());
    }

    #[test]
    fn test_lerp() {
        let a = State::new(0.0, 10.0, 0.0, 1.0);
        let b = State::new(2.0, 0.0, 1.0, 3.0);
        let mid = a.lerp(&b, 0.5);
        assert_eq!(mid, State::new(1.0, 5.0, 0.5, 2.0));
    }
}
