//! # Bounded parameters
//!
//! Interval constraints for searched parameters, together with the
//! transform the least-squares search uses to stay inside them.
//!
//! ```rust
//! use fedbatch_rs::parameters::{Bounds, BoundsTransform};
//!
//! let transform = BoundsTransform::new(Bounds::new(0.4, 0.8).unwrap()).unwrap();
//! let internal = transform.to_internal(0.5).unwrap();
//!
//! // Any internal value maps back inside the interval.
//! for step in [-10.0, 0.0, 10.0] {
//!     let external = transform.to_external(internal + step);
//!     assert!((0.4..=0.8).contains(&external));
//! }
//! ```

pub mod bounds;

pub use bounds::{Bounds, BoundsError, BoundsTransform};
