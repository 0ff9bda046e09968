//! # fedbatch-rs
//!
//! `fedbatch-rs` models fed-batch fermentation of an engineered *E. coli*
//! strain producing squalene, and builds three tools on the model:
//!
//! - Forward simulation of biomass, substrate, product and volume under a
//!   two-phase feeding strategy
//! - Bounded least-squares estimation of model parameters from experimental
//!   time series, with goodness-of-fit metrics and standard errors
//! - Global search over the feeding strategy to maximize final product or
//!   biomass under a working-volume limit
//!
//! ## Basic Usage
//!
//! ```rust
//! use fedbatch_rs::io::parse_parameters;
//! use fedbatch_rs::model::State;
//! use fedbatch_rs::simulator::Simulator;
//!
//! let params = parse_parameters(
//!     "mu_max: 0.6\nKs: 0.1\nKs_p: 0.5\nY_xs: 0.5\nY_ps: 0.2\nms: 0.05\n\
//!      alpha: 0.1\nbeta: 0.02\nSf: 500\nti: 10\nk1: 0.01\nb: 0.005\nk2: 0.0\n",
//! )
//! .unwrap();
//!
//! let series = Simulator::default()
//!     .simulate(&params, &State::new(0.5, 20.0, 0.0, 1.0), 24.0, 1.0)
//!     .unwrap();
//! let end = series.final_state().unwrap();
//! assert!(end.v > 1.0);
//! ```

// Public modules
pub mod error;

// Model and numerics
pub mod model;
pub mod parameters;
pub mod problem;
pub mod simulator;

mod utils;

pub mod global_opt;
pub mod lm;

// Procedures built on the simulator
pub mod fitting;
pub mod strategy;

// Record files
pub mod io;

// Re-exports for convenience
pub use error::{FedBatchError, Result};
pub use fitting::{FitResult, FitSpec, Fitter};
pub use model::{ModelParameters, State};
pub use simulator::{Simulator, SimulatorConfig, TimeSeries};
pub use strategy::{OptimizationResult, OptimizationSpec, StrategyOptimizer};

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
