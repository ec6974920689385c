//! # cf-fit
//!
//! Joint fitting of several curves that share parameters.
//!
//! A fit flows through the modules in this order:
//!
//! 1. [`parameters`]: the name-keyed [`ParameterSet`], declared from the
//!    models, caller guesses, bounds and fixed values.
//! 2. [`composer`]: [`ModelComposer`] pairs models with [`DataSeries`] and
//!    builds the [`JointObjective`].
//! 3. [`executor`]: [`FitExecutor`] minimizes it into a [`RawFitOutcome`].
//! 4. [`uncertainty`]: the covariance becomes correlated
//!    [`CorrelatedValue`]s.
//! 5. [`result`]: everything is frozen into a [`CurveFitResult`].
//!
//! [`fit_curves`] runs the whole chain for one [`FitRequest`];
//! [`fit_batch`] runs independent requests in parallel.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod analysis;
pub mod composer;
pub mod data;
pub mod executor;
pub mod options;
pub mod parameters;
pub mod result;
pub mod uncertainty;

pub use analysis::{fit_batch, fit_curves, fit_with_parameters, FitRequest};
pub use composer::{JointObjective, ModelComposer};
pub use data::DataSeries;
pub use executor::{FitExecutor, RawFitOutcome};
pub use options::{FitMethod, FitOptions, Weighting};
pub use parameters::{Parameter, ParameterSet};
pub use result::{CurveFitResult, CurveStatistics, FitArguments};
pub use uncertainty::{propagate, propagate_values, CorrelatedValue, CovarianceContext};
