//! The `Model` type: a named parametric curve.
//!
//! A model maps `(x, parameter values)` to a predicted `y`. It lists the
//! parameter names it reads, in the order its callable expects them, and may
//! carry default initial guesses and default bounds per parameter. Models
//! that list the same parameter name share that parameter in a joint fit.

use cf_core::{
    errors::{Error, Result},
    Real,
};
use std::fmt;
use std::sync::Arc;

/// The callable behind a [`Model`]: `f(x, params) -> y`, where `params`
/// follows [`Model::parameter_names`].
pub type ModelFn = Arc<dyn Fn(Real, &[Real]) -> Real + Send + Sync>;

/// A named parametric curve.
///
/// Cloning is cheap: the callable is shared behind an `Arc`.
#[derive(Clone)]
pub struct Model {
    name: String,
    parameters: Vec<String>,
    defaults: Vec<Option<Real>>,
    bounds: Vec<Option<(Real, Real)>>,
    function: ModelFn,
}

impl Model {
    /// Create a model.
    ///
    /// Fails with `Error::InvalidArgument` when the name is empty, no
    /// parameters are listed, a parameter name is empty, or a parameter name
    /// is repeated.
    pub fn new<I, S, F>(name: impl Into<String>, parameters: I, function: F) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(Real, &[Real]) -> Real + Send + Sync + 'static,
    {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::InvalidArgument("model name must not be empty".into()));
        }
        let parameters: Vec<String> = parameters.into_iter().map(Into::into).collect();
        if parameters.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "model '{name}' declares no parameters"
            )));
        }
        for (i, p) in parameters.iter().enumerate() {
            if p.is_empty() {
                return Err(Error::InvalidArgument(format!(
                    "model '{name}' has an empty parameter name"
                )));
            }
            if parameters[..i].contains(p) {
                return Err(Error::InvalidArgument(format!(
                    "model '{name}' declares parameter '{p}' twice"
                )));
            }
        }
        let n = parameters.len();
        Ok(Self {
            name,
            parameters,
            defaults: vec![None; n],
            bounds: vec![None; n],
            function: Arc::new(function),
        })
    }

    /// Attach a default initial guess for `parameter`.
    pub fn with_default(mut self, parameter: &str, value: Real) -> Result<Self> {
        let i = self.require_index(parameter)?;
        if !value.is_finite() {
            return Err(Error::InvalidArgument(format!(
                "default for '{parameter}' in model '{}' must be finite, got {value}",
                self.name
            )));
        }
        self.defaults[i] = Some(value);
        Ok(self)
    }

    /// Attach default bounds `[lower, upper]` for `parameter`.
    pub fn with_bounds(mut self, parameter: &str, lower: Real, upper: Real) -> Result<Self> {
        let i = self.require_index(parameter)?;
        if lower.is_nan() || upper.is_nan() || lower > upper {
            return Err(Error::InvalidArgument(format!(
                "invalid bounds [{lower}, {upper}] for '{parameter}' in model '{}'",
                self.name
            )));
        }
        self.bounds[i] = Some((lower, upper));
        Ok(self)
    }

    /// The curve name; data series are paired with models by this name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parameter names in the order the callable expects them.
    pub fn parameter_names(&self) -> &[String] {
        &self.parameters
    }

    /// Position of `parameter` in [`Model::parameter_names`].
    pub fn index_of(&self, parameter: &str) -> Option<usize> {
        self.parameters.iter().position(|p| p == parameter)
    }

    /// Default initial guess for `parameter`, if one was attached.
    pub fn default_value(&self, parameter: &str) -> Option<Real> {
        self.index_of(parameter).and_then(|i| self.defaults[i])
    }

    /// Default bounds for `parameter`, if any were attached.
    pub fn default_bounds(&self, parameter: &str) -> Option<(Real, Real)> {
        self.index_of(parameter).and_then(|i| self.bounds[i])
    }

    /// Evaluate the model at a single `x`.
    ///
    /// `params` must follow [`Model::parameter_names`]; use
    /// [`Model::evaluate_many`] for a checked call.
    #[inline]
    pub fn evaluate(&self, x: Real, params: &[Real]) -> Real {
        (self.function)(x, params)
    }

    /// Evaluate the model at every `x`, checking the parameter count.
    pub fn evaluate_many(&self, xs: &[Real], params: &[Real]) -> Result<Vec<Real>> {
        if params.len() != self.parameters.len() {
            return Err(Error::DimensionMismatch {
                expected: self.parameters.len(),
                found: params.len(),
            });
        }
        Ok(xs.iter().map(|&x| self.evaluate(x, params)).collect())
    }

    fn require_index(&self, parameter: &str) -> Result<usize> {
        self.index_of(parameter).ok_or_else(|| {
            Error::InvalidArgument(format!(
                "model '{}' has no parameter '{parameter}'",
                self.name
            ))
        })
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .field("defaults", &self.defaults)
            .field("bounds", &self.bounds)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.parameters.join(", "))
    }
}
