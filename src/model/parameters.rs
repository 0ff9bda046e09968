//! Kinetic and operational parameter records.
//!
//! Two representations are used. [`ParameterSet`] is a plain name -> value
//! map: it may be partial (a fit's fixed parameters) and is the shape records
//! take in files. [`ModelParameters`] is the complete record handed to the
//! model equations. It is `Copy`, so every trial evaluation works on its own
//! value and never touches the caller's record.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{FedBatchError, Result};

/// Names of every required parameter, in canonical order.
pub const PARAMETER_NAMES: [&str; 13] = [
    "mu_max", "Ks", "Ks_p", "Y_xs", "Y_ps", "ms", "alpha", "beta", "Sf", "ti", "k1", "b", "k2",
];

/// Parameters that may be left out of a record.
pub const OPTIONAL_PARAMETER_NAMES: [&str; 1] = ["Fi"];

/// A named collection of parameter values, possibly incomplete.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet {
    values: BTreeMap<String, f64>,
}

impl ParameterSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value, returning the previous one.
    pub fn insert(&mut self, name: impl Into<String>, value: f64) -> Option<f64> {
        self.values.insert(name.into(), value)
    }

    /// Look up a value by name.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    /// Whether the set holds a value for `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Number of values in the set.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over `(name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Names in the set that the model does not know about.
    pub fn unknown_names(&self) -> Vec<&str> {
        self.values
            .keys()
            .map(String::as_str)
            .filter(|name| !is_known_parameter(name))
            .collect()
    }
}

impl FromIterator<(String, f64)> for ParameterSet {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Whether `name` is a required or optional model parameter.
pub fn is_known_parameter(name: &str) -> bool {
    PARAMETER_NAMES.contains(&name) || OPTIONAL_PARAMETER_NAMES.contains(&name)
}

/// The complete parameter record of the fed-batch model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelParameters {
    /// Maximum specific growth rate (1/h)
    pub mu_max: f64,

    /// Monod half-saturation constant for growth (g/L)
    #[serde(rename = "Ks")]
    pub ks: f64,

    /// Half-saturation constant for product formation (g/L)
    #[serde(rename = "Ks_p")]
    pub ks_p: f64,

    /// Biomass yield on substrate (g/g)
    #[serde(rename = "Y_xs")]
    pub y_xs: f64,

    /// Product yield on substrate (g/g)
    #[serde(rename = "Y_ps")]
    pub y_ps: f64,

    /// Maintenance coefficient (g substrate / g biomass / h)
    pub ms: f64,

    /// Growth-associated product coefficient (g/g)
    pub alpha: f64,

    /// Non-growth-associated product coefficient (g/g/h)
    pub beta: f64,

    /// Substrate concentration in the feed (g/L)
    #[serde(rename = "Sf")]
    pub sf: f64,

    /// Induction time (h)
    pub ti: f64,

    /// Growth-phase feed acceleration (L/h^2)
    pub k1: f64,

    /// Growth-phase base feed rate (L/h)
    pub b: f64,

    /// Production-phase feed slope (L/h^2)
    pub k2: f64,

    /// Feed rate right after induction (L/h). Defaults to the growth-phase
    /// rate at `ti`.
    #[serde(rename = "Fi", default, skip_serializing_if = "Option::is_none")]
    pub fi: Option<f64>,
}

impl ModelParameters {
    /// Build a complete record from a parameter set.
    ///
    /// Every name in [`PARAMETER_NAMES`] must be present and no unknown
    /// names are accepted.
    pub fn from_set(set: &ParameterSet) -> Result<Self> {
        let unknown = set.unknown_names();
        if !unknown.is_empty() {
            return Err(FedBatchError::invalid(format!(
                "unknown parameter(s): {}",
                unknown.join(", ")
            )));
        }

        let missing: Vec<&str> = PARAMETER_NAMES
            .iter()
            .copied()
            .filter(|name| !set.contains(name))
            .collect();
        if !missing.is_empty() {
            return Err(FedBatchError::invalid(format!(
                "missing parameter(s): {}",
                missing.join(", ")
            )));
        }

        // All required names are present past this point.
        let value = |name: &str| set.get(name).unwrap_or(f64::NAN);
        let params = Self {
            mu_max: value("mu_max"),
            ks: value("Ks"),
            ks_p: value("Ks_p"),
            y_xs: value("Y_xs"),
            y_ps: value("Y_ps"),
            ms: value("ms"),
            alpha: value("alpha"),
            beta: value("beta"),
            sf: value("Sf"),
            ti: value("ti"),
            k1: value("k1"),
            b: value("b"),
            k2: value("k2"),
            fi: set.get("Fi"),
        };
        params.validate()?;
        Ok(params)
    }

    /// Convert back into a parameter set.
    pub fn to_set(&self) -> ParameterSet {
        let mut set: ParameterSet = PARAMETER_NAMES
            .iter()
            .filter_map(|name| self.get(name).map(|v| (name.to_string(), v)))
            .collect();
        if let Some(fi) = self.fi {
            set.insert("Fi", fi);
        }
        set
    }

    /// Look up a parameter value by name.
    ///
    /// Returns `None` for unknown names and for `Fi` when it is not set.
    pub fn get(&self, name: &str) -> Option<f64> {
        let value = match name {
            "mu_max" => self.mu_max,
            "Ks" => self.ks,
            "Ks_p" => self.ks_p,
            "Y_xs" => self.y_xs,
            "Y_ps" => self.y_ps,
            "ms" => self.ms,
            "alpha" => self.alpha,
            "beta" => self.beta,
            "Sf" => self.sf,
            "ti" => self.ti,
            "k1" => self.k1,
            "b" => self.b,
            "k2" => self.k2,
            "Fi" => return self.fi,
            _ => return None,
        };
        Some(value)
    }

    /// Return a copy of this record with one value replaced.
    pub fn with_value(&self, name: &str, value: f64) -> Result<Self> {
        let mut params = *self;
        let slot = match name {
            "mu_max" => &mut params.mu_max,
            "Ks" => &mut params.ks,
            "Ks_p" => &mut params.ks_p,
            "Y_xs" => &mut params.y_xs,
            "Y_ps" => &mut params.y_ps,
            "ms" => &mut params.ms,
            "alpha" => &mut params.alpha,
            "beta" => &mut params.beta,
            "Sf" => &mut params.sf,
            "ti" => &mut params.ti,
            "k1" => &mut params.k1,
            "b" => &mut params.b,
            "k2" => &mut params.k2,
            "Fi" => {
                params.fi = Some(value);
                return Ok(params);
            }
            _ => {
                return Err(FedBatchError::invalid(format!(
                    "unknown parameter: {}",
                    name
                )))
            }
        };
        *slot = value;
        Ok(params)
    }

    /// Return a copy with every `(name, value)` pair applied in order.
    pub fn with_values<'a, I>(&self, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        values
            .into_iter()
            .try_fold(*self, |params, (name, value)| params.with_value(name, value))
    }

    /// Feed rate immediately after induction.
    pub fn induction_feed(&self) -> f64 {
        self.fi.unwrap_or(self.k1 * self.ti + self.b)
    }

    /// Check that every value is finite and physically admissible.
    pub fn validate(&self) -> Result<()> {
        for name in PARAMETER_NAMES.iter().chain(OPTIONAL_PARAMETER_NAMES.iter()) {
            if let Some(v) = self.get(name) {
                if !v.is_finite() {
                    return Err(FedBatchError::invalid(format!(
                        "parameter {} must be finite, got {}",
                        name, v
                    )));
                }
            }
        }

        let non_negative = [
            ("mu_max", self.mu_max),
            ("Ks", self.ks),
            ("Ks_p", self.ks_p),
            ("ms", self.ms),
            ("alpha", self.alpha),
            ("beta", self.beta),
            ("Sf", self.sf),
        ];
        for (name, v) in non_negative {
            if v < 0.0 {
                return Err(FedBatchError::invalid(format!(
                    "parameter {} must be non-negative, got {}",
                    name, v
                )));
            }
        }

        for (name, v) in [("Y_xs", self.y_xs), ("Y_ps", self.y_ps)] {
            if v <= 0.0 {
                return Err(FedBatchError::invalid(format!(
                    "yield {} must be positive, got {}",
                    name, v
                )));
            }
        }

        Ok(())
    }
}

impl fmt::Display for ModelParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in self.to_set().iter() {
            writeln!(f, "  {}: {}", name, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_set() -> ParameterSet {
        [
            ("mu_max", 0.6),
            ("Ks", 0.1),
            ("Ks_p", 0.5),
            ("Y_xs", 0.5),
            ("Y_ps", 0.2),
            ("ms", 0.05),
            ("alpha", 0.1),
            ("beta", 0.02),
            ("Sf", 500.0),
            ("ti", 10.0),
            ("k1", 0.01),
            ("b", 0.005),
            ("k2", 0.0),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }

    #[test]
    fn test_from_set_complete() {
        let params = ModelParameters::from_set(&full_set()).unwrap();
        assert_eq!(params.mu_max, 0.6);
        assert_eq!(params.sf, 500.0);
        assert_eq!(params.fi, None);
        assert_eq!(params.to_set(), full_set());
    }

    #[test]
    fn test_from_set_missing_and_unknown() {
        let mut set = full_set();
        set.values.remove("k2");
        let err = ModelParameters::from_set(&set).unwrap_err();
        assert!(format!("{}", err).contains("k2"));

        let mut set = full_set();
        set.insert("Kb", 5.0);
        let err = ModelParameters::from_set(&set).unwrap_err();
        assert!(format!("{}", err).contains("Kb"));
    }

    #[test]
    fn test_with_value_does_not_touch_original() {
        let params = ModelParameters::from_set(&full_set()).unwrap();
        let changed = params.with_value("ti", 12.0).unwrap();
        assert_eq!(params.ti, 10.0);
        assert_eq!(changed.ti, 12.0);

        let with_fi = params.with_value("Fi", 0.02).unwrap();
        assert_eq!(with_fi.get("Fi"), Some(0.02));
        assert!(params.with_value("nope", 1.0).is_err());
    }

    #[test]
    fn test_induction_feed_defaults_to_growth_rate() {
        let params = ModelParameters::from_set(&full_set()).unwrap();
        assert!((params.induction_feed() - 0.105).abs() < 1e-12);
        let params = params.with_value("Fi", 0.05).unwrap();
        assert_eq!(params.induction_feed(), 0.05);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let params = ModelParameters::from_set(&full_set()).unwrap();
        assert!(params.with_value("Y_xs", 0.0).unwrap().validate().is_err());
        assert!(params.with_value("mu_max", -0.1).unwrap().validate().is_err());
        assert!(params.with_value("k1", f64::NAN).unwrap().validate().is_err());
        // Negative slopes are allowed.
        assert!(params.with_value("k2", -0.01).unwrap().validate().is_ok());
    }
}
