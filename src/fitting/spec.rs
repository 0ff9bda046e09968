//! Fixed/free partition of the parameter record.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{FedBatchError, Result};
use crate::model::parameters::is_known_parameter;
use crate::model::{ModelParameters, ParameterSet, PARAMETER_NAMES};
use crate::parameters::Bounds;

/// Starting value and search interval of one fitted parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FreeParameter {
    pub initial: f64,
    #[serde(rename = "min", alias = "lower")]
    pub lower: f64,
    #[serde(rename = "max", alias = "upper")]
    pub upper: f64,
}

impl FreeParameter {
    pub fn new(initial: f64, lower: f64, upper: f64) -> Self {
        Self {
            initial,
            lower,
            upper,
        }
    }

    pub fn bounds(&self) -> Result<Bounds> {
        Ok(Bounds::new(self.lower, self.upper)?)
    }

    fn validate(&self, name: &str) -> Result<()> {
        if !(self.initial.is_finite() && self.lower.is_finite() && self.upper.is_finite()) {
            return Err(FedBatchError::invalid(format!(
                "free parameter {} needs finite initial value and bounds",
                name
            )));
        }
        if self.lower > self.upper {
            return Err(FedBatchError::invalid(format!(
                "lower bound {} exceeds upper bound {} for {}",
                self.lower, self.upper, name
            )));
        }
        if self.initial < self.lower {
            return Err(FedBatchError::invalid(format!(
                "lower bound {} exceeds initial {} for {}",
                self.lower, self.initial, name
            )));
        }
        if self.initial > self.upper {
            return Err(FedBatchError::invalid(format!(
                "initial {} exceeds upper bound {} for {}",
                self.initial, self.upper, name
            )));
        }
        Ok(())
    }
}

/// Which parameters are held fixed and which are searched.
///
/// Every required model parameter must appear in exactly one of the two
/// partitions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FitSpec {
    pub fixed: ParameterSet,
    pub free: BTreeMap<String, FreeParameter>,
}

impl FitSpec {
    pub fn new(fixed: ParameterSet, free: BTreeMap<String, FreeParameter>) -> Self {
        Self { fixed, free }
    }

    /// Split a full record: every name in `free` is searched, the rest of
    /// `params` is fixed.
    pub fn from_parameters(
        params: &ModelParameters,
        free: BTreeMap<String, FreeParameter>,
    ) -> Self {
        let fixed = params
            .to_set()
            .iter()
            .filter(|(name, _)| !free.contains_key(*name))
            .map(|(name, value)| (name.to_string(), value))
            .collect();
        Self { fixed, free }
    }

    /// Names of the free parameters, in search-vector order.
    pub fn free_names(&self) -> Vec<&str> {
        self.free.keys().map(String::as_str).collect()
    }

    /// Check the partition and build the record at the initial guesses.
    pub fn initial_parameters(&self) -> Result<ModelParameters> {
        for name in self.free.keys() {
            if self.fixed.contains(name) {
                return Err(FedBatchError::invalid(format!(
                    "parameter {} is both fixed and free",
                    name
                )));
            }
            if !is_known_parameter(name) {
                return Err(FedBatchError::invalid(format!(
                    "unknown free parameter: {}",
                    name
                )));
            }
        }
        for (name, free) in &self.free {
            free.validate(name)?;
        }

        let missing: Vec<&str> = PARAMETER_NAMES
            .iter()
            .copied()
            .filter(|name| !self.fixed.contains(name) && !self.free.contains_key(*name))
            .collect();
        if !missing.is_empty() {
            return Err(FedBatchError::invalid(format!(
                "parameter(s) neither fixed nor free: {}",
                missing.join(", ")
            )));
        }

        let mut merged = self.fixed.clone();
        for (name, free) in &self.free {
            merged.insert(name.clone(), free.initial);
        }
        ModelParameters::from_set(&merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ModelParameters {
        ModelParameters {
            mu_max: 0.6,
            ks: 0.1,
            ks_p: 0.5,
            y_xs: 0.5,
            y_ps: 0.2,
            ms: 0.05,
            alpha: 0.1,
            beta: 0.02,
            sf: 500.0,
            ti: 10.0,
            k1: 0.01,
            b: 0.005,
            k2: 0.0,
            fi: None,
        }
    }

    #[test]
    fn test_from_parameters_partitions() {
        let free = BTreeMap::from([("mu_max".to_string(), FreeParameter::new(0.5, 0.4, 0.8))]);
        let spec = FitSpec::from_parameters(&params(), free);
        assert!(!spec.fixed.contains("mu_max"));
        assert_eq!(spec.fixed.len(), 12);

        let initial = spec.initial_parameters().unwrap();
        assert_eq!(initial.mu_max, 0.5);
        assert_eq!(initial.ks, 0.1);
    }

    #[test]
    fn test_bound_ordering_rejected() {
        let free = BTreeMap::from([("mu_max".to_string(), FreeParameter::new(1.0, 2.0, 3.0))]);
        let err = FitSpec::from_parameters(&params(), free)
            .initial_parameters()
            .unwrap_err();
        assert!(format!("{}", err).contains("lower bound 2 exceeds initial 1 for mu_max"));
    }

    #[test]
    fn test_collision_and_missing_rejected() {
        let mut spec = FitSpec::from_parameters(&params(), BTreeMap::new());
        spec.free
            .insert("ti".to_string(), FreeParameter::new(10.0, 5.0, 15.0));
        assert!(matches!(
            spec.initial_parameters(),
            Err(FedBatchError::InvalidSpec(_))
        ));

        let spec = FitSpec::new(ParameterSet::new(), BTreeMap::new());
        let err = spec.initial_parameters().unwrap_err();
        assert!(format!("{}", err).contains("mu_max"));
    }

    #[test]
    fn test_pinned_free_parameter_allowed() {
        let free = BTreeMap::from([("Ks".to_string(), FreeParameter::new(0.1, 0.1, 0.1))]);
        assert!(FitSpec::from_parameters(&params(), free)
            .initial_parameters()
            .is_ok());
    }
}
