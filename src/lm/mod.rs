//! Levenberg-Marquardt algorithm implementation.
//!
//! A damped Gauss-Newton minimizer for problems implementing
//! [`crate::problem::Problem`]. It works on unbounded coordinates; bounded
//! searches map their parameters through
//! [`crate::parameters::BoundsTransform`] first.

pub mod algorithm;
pub mod config;
pub mod convergence;

pub use algorithm::{LevenbergMarquardt, LmResult};
pub use config::LmConfig;
pub use convergence::{ConvergenceCriteria, ConvergenceStatus};
