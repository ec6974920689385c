//! Request-level entry points.

use crate::composer::ModelComposer;
use crate::data::DataSeries;
use crate::executor::FitExecutor;
use crate::options::{FitMethod, FitOptions};
use crate::parameters::ParameterSet;
use crate::result::CurveFitResult;
use crate::uncertainty::propagate;
use cf_core::{errors::Result, Real};
use cf_models::Model;
use log::debug;
use rayon::prelude::*;
use std::collections::HashMap;

/// Everything needed for one joint fit.
#[derive(Debug, Clone)]
pub struct FitRequest {
    /// Curve models; data series are paired with them by name.
    pub models: Vec<Model>,
    /// Measured data, one series per model.
    pub data: Vec<DataSeries>,
    /// Minimizer.
    pub fit_method: FitMethod,
    /// Starting values by parameter name.
    pub initial_guesses: HashMap<String, Real>,
    /// `(lower, upper)` by parameter name.
    pub bounds: HashMap<String, (Real, Real)>,
    /// Parameters held at a value.
    pub fixed_parameters: HashMap<String, Real>,
    /// Tolerances and switches.
    pub options: FitOptions,
}

impl FitRequest {
    /// Request with default method and options and no guesses.
    pub fn new(models: Vec<Model>, data: Vec<DataSeries>) -> Self {
        Self {
            models,
            data,
            fit_method: FitMethod::default(),
            initial_guesses: HashMap::new(),
            bounds: HashMap::new(),
            fixed_parameters: HashMap::new(),
            options: FitOptions::default(),
        }
    }

    /// Select the minimizer.
    pub fn with_method(mut self, method: FitMethod) -> Self {
        self.fit_method = method;
        self
    }

    /// Select the minimizer by name, e.g. `"least_squares"` or `"nelder"`.
    pub fn with_method_name(mut self, name: &str) -> Result<Self> {
        self.fit_method = name.parse()?;
        Ok(self)
    }

    /// Starting value for one parameter.
    pub fn with_guess(mut self, name: impl Into<String>, value: Real) -> Self {
        self.initial_guesses.insert(name.into(), value);
        self
    }

    /// Starting values for several parameters.
    pub fn with_guesses<I, S>(mut self, guesses: I) -> Self
    where
        I: IntoIterator<Item = (S, Real)>,
        S: Into<String>,
    {
        self.initial_guesses
            .extend(guesses.into_iter().map(|(k, v)| (k.into(), v)));
        self
    }

    /// Bounds for one parameter.
    pub fn with_bounds(mut self, name: impl Into<String>, lower: Real, upper: Real) -> Self {
        self.bounds.insert(name.into(), (lower, upper));
        self
    }

    /// Hold one parameter at `value`.
    pub fn with_fixed(mut self, name: impl Into<String>, value: Real) -> Self {
        self.fixed_parameters.insert(name.into(), value);
        self
    }

    /// Replace the options.
    pub fn with_options(mut self, options: FitOptions) -> Self {
        self.options = options;
        self
    }
}

/// Run one joint fit.
///
/// Setup problems (name mismatches, conflicting or missing parameters)
/// are returned as `Err`; a fit that does not converge is an `Ok` result
/// with `success() == false`.
pub fn fit_curves(request: &FitRequest) -> Result<CurveFitResult> {
    let parameters = ModelComposer::declare_model_parameters(
        &request.models,
        &request.initial_guesses,
        &request.bounds,
        &request.fixed_parameters,
    )?;
    fit_with_parameters(
        &request.models,
        &request.data,
        &parameters,
        request.fit_method,
        &request.options,
    )
}

/// Run one joint fit over an explicitly built [`ParameterSet`].
pub fn fit_with_parameters(
    models: &[Model],
    data: &[DataSeries],
    parameters: &ParameterSet,
    method: FitMethod,
    options: &FitOptions,
) -> Result<CurveFitResult> {
    let objective = ModelComposer::compose(models, data, parameters, options.weighting)?;
    let init_params = parameters
        .iter()
        .map(|p| (p.name().to_string(), p.initial()))
        .collect();
    debug!(
        "fitting {} curves with {method}",
        objective.curve_names().len()
    );
    let outcome = FitExecutor::new(options.clone()).fit(&objective, method);
    let values = propagate(&outcome, parameters)?;
    Ok(CurveFitResult::assemble(
        &objective,
        outcome,
        values,
        init_params,
        options,
    ))
}

/// Run independent fits in parallel; results come back in request order.
pub fn fit_batch(requests: &[FitRequest]) -> Vec<Result<CurveFitResult>> {
    requests.par_iter().map(fit_curves).collect()
}
