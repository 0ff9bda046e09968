//! Numerical helpers shared by the least-squares search and the covariance
//! estimate.

pub mod finite_difference;
pub mod matrix_convert;
