//! # curvefit
//!
//! Joint non-linear fitting of several curves that share parameters, with
//! correlated parameter uncertainties.
//!
//! This crate is a **façade** that re-exports the public items of the
//! workspace crates. Application code should depend on this crate rather
//! than the individual `cf-*` crates.
//!
//! ## Quick start
//!
//! ```rust
//! use curvefit::prelude::*;
//!
//! let model = curvefit::models::library::linear("line", None).unwrap();
//! let xs: Vec<Real> = (0..8).map(Real::from).collect();
//! let ys: Vec<Real> = xs.iter().map(|x| 2.0 * x - 1.0).collect();
//! let request = FitRequest::new(vec![model], vec![DataSeries::new("line", xs, ys).unwrap()])
//!     .with_guesses([("slope", 1.0), ("intercept", 0.0)]);
//!
//! let result = fit_curves(&request).unwrap();
//! assert!(result.success());
//! assert!((result.raw_param("slope").unwrap() - 2.0).abs() < 1e-8);
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

/// Core types, aliases, and error definitions.
pub use cf_core as core;

/// Arrays, matrices, distributions and optimizers.
pub use cf_math as math;

/// Curve models and the DRAG builder.
pub use cf_models as models;

/// Parameters, composition, fitting and results.
pub use cf_fit as fit;

pub use cf_core::{Error, Real, Result};
pub use cf_fit::{fit_batch, fit_curves, CurveFitResult, FitRequest};

/// The items most fits need.
pub mod prelude {
    pub use cf_core::{Error, Real, Result};
    pub use cf_fit::{
        fit_batch, fit_curves, fit_with_parameters, propagate_values, CorrelatedValue,
        CurveFitResult, DataSeries, FitMethod, FitOptions, FitRequest, ParameterSet, Weighting,
    };
    pub use cf_models::{DragModelBuilder, Model};
}
