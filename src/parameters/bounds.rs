//! Parameter bounds and the bounded <-> unbounded transform.
//!
//! The least-squares search works on unbounded internal coordinates. Each
//! free parameter is mapped onto its finite interval with the Minuit sine
//! transform.

use std::f64::{INFINITY, NEG_INFINITY};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when working with parameter bounds
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BoundsError {
    #[error("Invalid bounds: min ({min}) must not exceed max ({max})")]
    InvalidBounds { min: f64, max: f64 },

    #[error("Parameter value {value} is outside bounds: [{min}, {max}]")]
    ValueOutsideBounds { value: f64, min: f64, max: f64 },

    #[error("Infinite parameter value is not allowed")]
    InfiniteValue,

    #[error("The bounded transform needs finite bounds, got [{min}, {max}]")]
    InfiniteBounds { min: f64, max: f64 },
}

/// A closed interval `[min, max]`. Either end may be infinite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    /// Minimum allowed value for the parameter
    pub min: f64,

    /// Maximum allowed value for the parameter
    pub max: f64,
}

// Infinite ends are written as null, since neither JSON nor our YAML files
// carry a portable infinity.
#[derive(Serialize, Deserialize)]
struct BoundsRepr {
    #[serde(default)]
    min: Option<f64>,
    #[serde(default)]
    max: Option<f64>,
}

impl Serialize for Bounds {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        BoundsRepr {
            min: self.has_lower_bound().then_some(self.min),
            max: self.has_upper_bound().then_some(self.max),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Bounds {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let repr = BoundsRepr::deserialize(deserializer)?;
        Bounds::new(
            repr.min.unwrap_or(NEG_INFINITY),
            repr.max.unwrap_or(INFINITY),
        )
        .map_err(serde::de::Error::custom)
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            min: NEG_INFINITY,
            max: INFINITY,
        }
    }
}

impl Bounds {
    /// Create new bounds. `min == max` is allowed and pins the parameter.
    ///
    /// # Examples
    ///
    /// ```
    /// use fedbatch_rs::parameters::Bounds;
    ///
    /// let bounds = Bounds::new(0.0, 10.0).unwrap();
    /// assert_eq!(bounds.min, 0.0);
    /// assert_eq!(bounds.max, 10.0);
    /// assert!(Bounds::new(1.0, 0.0).is_err());
    /// ```
    pub fn new(min: f64, max: f64) -> Result<Self, BoundsError> {
        if min.is_nan() || max.is_nan() || min > max {
            return Err(BoundsError::InvalidBounds { min, max });
        }

        Ok(Self { min, max })
    }

    /// Unbounded interval (negative infinity to positive infinity).
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Bounded from below only.
    pub fn min_only(min: f64) -> Self {
        Self { min, max: INFINITY }
    }

    /// Bounded from above only.
    pub fn max_only(max: f64) -> Self {
        Self {
            min: NEG_INFINITY,
            max,
        }
    }

    pub fn is_within_bounds(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Both ends finite.
    pub fn is_finite(&self) -> bool {
        self.min.is_finite() && self.max.is_finite()
    }

    pub fn has_lower_bound(&self) -> bool {
        self.min.is_finite()
    }

    pub fn has_upper_bound(&self) -> bool {
        self.max.is_finite()
    }

    /// Width of the interval. Infinite when either end is.
    pub fn width(&self) -> f64 {
        self.max - self.min
    }

    /// Clamp a value to be within the bounds.
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

/// Minuit-style mapping between internal (unbounded) and external (bounded)
/// coordinates of one parameter:
/// `external = min + (sin(internal) + 1) * (max - min) / 2`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundsTransform {
    bounds: Bounds,
}

impl BoundsTransform {
    /// Fails unless both ends of `bounds` are finite.
    pub fn new(bounds: Bounds) -> Result<Self, BoundsError> {
        if !bounds.is_finite() {
            return Err(BoundsError::InfiniteBounds {
                min: bounds.min,
                max: bounds.max,
            });
        }
        Ok(Self { bounds })
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    /// Map an internal value to the bounded external value.
    pub fn to_external(&self, internal_value: f64) -> f64 {
        let b = &self.bounds;
        let external = b.min + (internal_value.sin() + 1.0) * b.width() / 2.0;
        // Rounding can leave the result a hair outside the interval.
        b.clamp(external)
    }

    /// Map an external value to internal coordinates.
    ///
    /// Fails when the value is not finite or lies outside the bounds.
    pub fn to_internal(&self, external_value: f64) -> Result<f64, BoundsError> {
        if !external_value.is_finite() {
            return Err(BoundsError::InfiniteValue);
        }

        let b = &self.bounds;
        if !b.is_within_bounds(external_value) {
            return Err(BoundsError::ValueOutsideBounds {
                value: external_value,
                min: b.min,
                max: b.max,
            });
        }

        if b.width() == 0.0 {
            return Ok(0.0);
        }
        let scaled = 2.0 * (external_value - b.min) / b.width() - 1.0;
        Ok(scaled.clamp(-1.0, 1.0).asin())
    }

    /// Derivative d(external)/d(internal) at an internal value.
    ///
    /// Used to carry covariances from internal to external coordinates. It
    /// vanishes where the external value sits on a bound.
    pub fn external_derivative(&self, internal_value: f64) -> f64 {
        internal_value.cos() * self.bounds.width() / 2.0
    }
}
