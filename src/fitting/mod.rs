//! # Parameter fitting
//!
//! Estimates a subset of model parameters from experimental time series.
//!
//! A [`FitSpec`] splits the parameter record into fixed values and free
//! parameters, each free one with a starting guess and a search interval.
//! For every trial the free values are merged into the fixed record, the
//! model is integrated to each observation time, and the residual
//! `simulated - measured` is formed for every measured channel. The search
//! is Levenberg-Marquardt on sine-transformed coordinates, so every trial
//! stays inside its bounds.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::collections::BTreeMap;
//! use fedbatch_rs::fitting::{FitSpec, Fitter, FreeParameter, ObservedData};
//! use fedbatch_rs::model::{ModelParameters, State};
//!
//! # fn run(params: ModelParameters, data: ObservedData) -> fedbatch_rs::Result<()> {
//! let free = BTreeMap::from([
//!     ("mu_max".to_string(), FreeParameter::new(0.5, 0.4, 0.8)),
//!     ("alpha".to_string(), FreeParameter::new(0.05, 0.0, 0.5)),
//! ]);
//! let spec = FitSpec::from_parameters(&params, free);
//!
//! let result = Fitter::default().fit(&data, &spec, &State::new(0.5, 20.0, 0.0, 1.0))?;
//! println!("{}", result);
//! # Ok(())
//! # }
//! ```

mod data;
mod fitter;
mod metrics;
mod spec;
pub mod uncertainty;

pub use data::{Observation, ObservedData};
pub use fitter::{FitResult, FittedParameter, Fitter, FAILED_TRIAL_RESIDUAL};
pub use metrics::{ChannelMetrics, FitMetrics};
pub use spec::{FitSpec, FreeParameter};
