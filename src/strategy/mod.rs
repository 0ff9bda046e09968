//! # Strategy optimization
//!
//! Searches operational parameters (`ti`, `k1`, `k2`, `b`, `Sf`) for the
//! feeding strategy that maximizes final product or biomass, subject to a
//! limit on the final working volume.
//!
//! Moving `ti` moves the feed switch, so the objective is not smooth in it.
//! The search is therefore differential evolution over the box of tuned
//! bounds. Trials that overfill the vessel get a large penalty that grows
//! with the excess volume, so the population is pushed back towards the
//! feasible region instead of being stopped by an error.
//!
//! ```rust,no_run
//! use fedbatch_rs::model::{ModelParameters, State};
//! use fedbatch_rs::parameters::Bounds;
//! use fedbatch_rs::strategy::{Objective, OptimizationSpec, StrategyOptimizer, Tunable};
//!
//! # fn run(baseline: ModelParameters) -> fedbatch_rs::Result<()> {
//! let spec = OptimizationSpec::new(baseline, Objective::MaxProduct)
//!     .with_tunable(Tunable::Ti, Bounds::new(4.0, 24.0)?)
//!     .with_tunable(Tunable::K2, Bounds::new(0.0, 0.05)?)
//!     .with_max_volume(5.0);
//!
//! let result = StrategyOptimizer::default()
//!     .with_seed(42)
//!     .optimize(&spec, &State::new(0.5, 20.0, 0.0, 1.0))?;
//! println!("{}", result);
//! # Ok(())
//! # }
//! ```

mod optimizer;
mod spec;

pub use optimizer::{OptimizationResult, StrategyOptimizer, FAILURE_PENALTY, INFEASIBLE_PENALTY};
pub use spec::{Objective, OptimizationSpec, Tunable, DEFAULT_HORIZON, DEFAULT_MAX_VOLUME};
