//! # Fed-batch fermentation model
//!
//! This module defines the fixed-form fed-batch model of an engineered
//! *E. coli* strain producing squalene. The state is four-dimensional:
//!
//! - `X`: biomass concentration (g/L)
//! - `S`: substrate concentration (g/L)
//! - `P`: product (squalene) concentration (g/L)
//! - `V`: working volume (L)
//!
//! Growth follows Monod kinetics, product formation follows the
//! Luedeking-Piret law and the feed rate switches from a growth-phase ramp to
//! a production-phase law at the induction time `ti`.
//!
//! ## Core Components
//!
//! - [`ModelParameters`]: the complete, validated kinetic/operational record
//! - [`ParameterSet`]: a possibly partial name -> value map used at the I/O and
//!   fitting boundaries
//! - [`State`] and [`Channel`]: the state vector and its named components
//! - [`derivatives`], [`feed_rate`], [`specific_rates`]: the model equations
//!
//! ## Example Usage
//!
//! ```rust
//! use fedbatch_rs::model::{
//!     derivatives, feed_rate, ModelParameters, ParameterSet, ProductionMode, State,
//! };
//!
//! let mut set = ParameterSet::new();
//! for (name, value) in [
//!     ("mu_max", 0.6), ("Ks", 0.1), ("Ks_p", 0.5), ("Y_xs", 0.5), ("Y_ps", 0.2),
//!     ("ms", 0.05), ("alpha", 0.1), ("beta", 0.02), ("Sf", 500.0),
//!     ("ti", 10.0), ("k1", 0.01), ("b", 0.005), ("k2", 0.0),
//! ] {
//!     set.insert(name, value);
//! }
//! let params = ModelParameters::from_set(&set).unwrap();
//!
//! let state = State::new(1.0, 20.0, 0.0, 1.0);
//! let d = derivatives(5.0, &state, &params, ProductionMode::Induced);
//! assert_eq!(d.dv, feed_rate(5.0, &params));
//! assert_eq!(d.dp, 0.0);
//! ```

pub mod equations;
pub mod parameters;
pub mod state;

pub use equations::{
    derivatives, derivatives_in_phase, feed_rate, feed_rate_in_phase, specific_rates,
    specific_rates_in_phase, Derivatives, FeedPhase, ProductionMode, SpecificRates,
};
pub use parameters::{ModelParameters, ParameterSet, OPTIONAL_PARAMETER_NAMES, PARAMETER_NAMES};
pub use state::{Channel, State};

pub(crate) use equations::FedBatchSystem;
