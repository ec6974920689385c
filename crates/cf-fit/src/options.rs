//! Fit configuration: minimizer choice, residual weighting and tolerances.

use cf_core::{errors::Error, Real, Size};
use cf_math::optimization::EndCriteria;
use std::fmt;
use std::str::FromStr;

/// The minimizer used for a fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum FitMethod {
    /// Levenberg–Marquardt least squares.
    #[default]
    LeastSquares,
    /// Nelder–Mead simplex.
    NelderMead,
    /// BFGS quasi-Newton.
    Bfgs,
}

impl FitMethod {
    /// Canonical lower-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            FitMethod::LeastSquares => "least_squares",
            FitMethod::NelderMead => "nelder_mead",
            FitMethod::Bfgs => "bfgs",
        }
    }
}

impl fmt::Display for FitMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FitMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "least_squares" | "leastsq" | "lm" => Ok(FitMethod::LeastSquares),
            "nelder" | "nelder_mead" => Ok(FitMethod::NelderMead),
            "bfgs" => Ok(FitMethod::Bfgs),
            _ => Err(Error::UnknownFitMethod(s.to_string())),
        }
    }
}

/// How data weights enter the residuals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Weighting {
    /// Use the weights supplied with each series; unit weight otherwise.
    #[default]
    Auto,
    /// Ignore supplied weights.
    Uniform,
}

/// Tolerances and switches for a fit.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FitOptions {
    /// Iteration limit; `None` picks a limit from the method and the number
    /// of free parameters.
    pub max_iterations: Option<Size>,
    /// Relative change of the cost below which the fit has converged.
    pub function_tolerance: Real,
    /// Relative step size below which the fit has converged.
    pub step_tolerance: Real,
    /// Gradient tolerance.
    pub gradient_tolerance: Real,
    /// Relative size of the initial Nelder–Mead simplex.
    pub simplex_step: Real,
    /// Residual weighting.
    pub weighting: Weighting,
    /// Estimate the parameter covariance at the solution.
    pub estimate_covariance: bool,
    /// Scale the covariance by the reduced χ².
    ///
    /// Scaled uncertainties follow the observed scatter, so adding curves to
    /// a joint fit tightens shared parameters only on average. With
    /// `false` and σ-based weights the covariance comes from the weights
    /// alone and shared parameters never get looser as curves are added.
    pub scale_covariance: bool,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            max_iterations: None,
            function_tolerance: 1e-10,
            step_tolerance: 1e-10,
            gradient_tolerance: 1e-10,
            simplex_step: 0.05,
            weighting: Weighting::Auto,
            estimate_covariance: true,
            scale_covariance: true,
        }
    }
}

impl FitOptions {
    /// Set the iteration limit.
    pub fn with_max_iterations(mut self, n: Size) -> Self {
        self.max_iterations = Some(n);
        self
    }

    /// Set the function tolerance.
    pub fn with_function_tolerance(mut self, tol: Real) -> Self {
        self.function_tolerance = tol;
        self
    }

    /// Set the step tolerance.
    pub fn with_step_tolerance(mut self, tol: Real) -> Self {
        self.step_tolerance = tol;
        self
    }

    /// Set the gradient tolerance.
    pub fn with_gradient_tolerance(mut self, tol: Real) -> Self {
        self.gradient_tolerance = tol;
        self
    }

    /// Set the relative Nelder–Mead simplex size.
    pub fn with_simplex_step(mut self, step: Real) -> Self {
        self.simplex_step = step;
        self
    }

    /// Set the weighting mode.
    pub fn with_weighting(mut self, weighting: Weighting) -> Self {
        self.weighting = weighting;
        self
    }

    /// Enable or disable covariance estimation.
    pub fn with_covariance(mut self, estimate: bool) -> Self {
        self.estimate_covariance = estimate;
        self
    }

    /// Enable or disable scaling the covariance by the reduced χ².
    pub fn with_scaled_covariance(mut self, scale: bool) -> Self {
        self.scale_covariance = scale;
        self
    }

    /// Iteration limit for `method` with `n_free` free parameters.
    pub fn iteration_limit(&self, method: FitMethod, n_free: Size) -> Size {
        self.max_iterations.unwrap_or(match method {
            FitMethod::LeastSquares => 200 * (n_free + 1),
            FitMethod::NelderMead => 1000 * (n_free + 1),
            FitMethod::Bfgs => 400 * (n_free + 1),
        })
    }

    /// Optimizer end criteria for `method` with `n_free` free parameters.
    pub fn end_criteria(&self, method: FitMethod, n_free: Size) -> EndCriteria {
        EndCriteria::default()
            .with_max_iterations(self.iteration_limit(method, n_free))
            .with_function_epsilon(self.function_tolerance)
            .with_step_epsilon(self.step_tolerance)
            .with_gradient_norm_epsilon(self.gradient_tolerance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_names_parse_case_insensitively() {
        assert_eq!("least_squares".parse::<FitMethod>().unwrap(), FitMethod::LeastSquares);
        assert_eq!("LeastSq".parse::<FitMethod>().unwrap(), FitMethod::LeastSquares);
        assert_eq!("LM".parse::<FitMethod>().unwrap(), FitMethod::LeastSquares);
        assert_eq!("Nelder".parse::<FitMethod>().unwrap(), FitMethod::NelderMead);
        assert_eq!("nelder_mead".parse::<FitMethod>().unwrap(), FitMethod::NelderMead);
        assert_eq!("BFGS".parse::<FitMethod>().unwrap(), FitMethod::Bfgs);
        assert!(matches!(
            "powell".parse::<FitMethod>(),
            Err(Error::UnknownFitMethod(name)) if name == "powell"
        ));
    }

    #[test]
    fn method_display_roundtrips() {
        for m in [FitMethod::LeastSquares, FitMethod::NelderMead, FitMethod::Bfgs] {
            assert_eq!(m.to_string().parse::<FitMethod>().unwrap(), m);
        }
        assert_eq!(FitMethod::default(), FitMethod::LeastSquares);
    }

    #[test]
    fn end_criteria_follow_options() {
        let opts = FitOptions::default()
            .with_function_tolerance(1e-6)
            .with_step_tolerance(1e-7)
            .with_gradient_tolerance(1e-8);
        let ec = opts.end_criteria(FitMethod::LeastSquares, 3);
        assert_eq!(ec.max_iterations, 800);
        assert_eq!(ec.function_epsilon, 1e-6);
        assert_eq!(ec.step_epsilon, 1e-7);
        assert_eq!(ec.gradient_norm_epsilon, 1e-8);
        let capped = opts.with_max_iterations(5).end_criteria(FitMethod::NelderMead, 3);
        assert_eq!(capped.max_iterations, 5);
    }
}
