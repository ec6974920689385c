//! The immutable fit result.

use crate::composer::JointObjective;
use crate::executor::{reduced_chi_square, RawFitOutcome};
use crate::options::{FitMethod, FitOptions};
use crate::uncertainty::CorrelatedValue;
use cf_core::{
    utilities::{format_general, format_relative_uncertainty, format_with_uncertainty},
    Real, Size,
};
use cf_math::matrix_utilities::covariance_decompose;
use cf_math::{ChiSquareDistribution, Matrix, StudentTDistribution};
use std::fmt::{self, Write as _};

/// Per-curve goodness of fit.
#[derive(Debug, Clone, PartialEq)]
pub struct CurveStatistics {
    name: String,
    n_points: Size,
    chi_square: Real,
}

impl CurveStatistics {
    /// Curve (model) name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of data points of the curve.
    pub fn n_points(&self) -> Size {
        self.n_points
    }

    /// The curve's contribution to the total χ².
    pub fn chi_square(&self) -> Real {
        self.chi_square
    }
}

/// How the fit was set up.
#[derive(Debug, Clone, PartialEq)]
pub struct FitArguments {
    method: FitMethod,
    options: FitOptions,
    bounds: Vec<(String, Real, Real)>,
    fixed: Vec<(String, Real)>,
}

impl FitArguments {
    /// Minimizer.
    pub fn method(&self) -> FitMethod {
        self.method
    }

    /// Options the fit ran with.
    pub fn options(&self) -> &FitOptions {
        &self.options
    }

    /// `(name, lower, upper)` of each free parameter.
    pub fn bounds(&self) -> &[(String, Real, Real)] {
        &self.bounds
    }

    /// `(name, value)` of each fixed parameter.
    pub fn fixed(&self) -> &[(String, Real)] {
        &self.fixed
    }
}

/// Outcome of one fit invocation.
///
/// Everything is set at construction; [`fit_report`](Self::fit_report) and
/// `Display` are rendered from the fields below and nothing else.
#[derive(Debug, Clone)]
pub struct CurveFitResult {
    success: bool,
    method: FitMethod,
    message: String,
    parameters: Vec<(String, CorrelatedValue)>,
    raw_params: Vec<(String, Real)>,
    init_params: Vec<(String, Real)>,
    free_names: Vec<String>,
    covariance: Option<Matrix>,
    residuals: Vec<Real>,
    chi_square: Real,
    degrees_of_freedom: isize,
    n_data: Size,
    curve_statistics: Vec<CurveStatistics>,
    function_evaluations: Size,
    jacobian_evaluations: Size,
    iterations: Size,
    fit_arguments: FitArguments,
}

impl CurveFitResult {
    pub(crate) fn assemble(
        objective: &JointObjective,
        outcome: RawFitOutcome,
        parameters: Vec<(String, CorrelatedValue)>,
        init_params: Vec<(String, Real)>,
        options: &FitOptions,
    ) -> Self {
        let set = objective.parameters();
        let free_names = set.resolve();
        let raw_params = set
            .iter()
            .zip(&outcome.full_values)
            .map(|(p, &v)| (p.name().to_string(), v))
            .collect();
        let curve_statistics = objective
            .curve_names()
            .into_iter()
            .zip(objective.block_ranges())
            .map(|(name, range)| CurveStatistics {
                name: name.to_string(),
                n_points: range.len(),
                chi_square: outcome
                    .residuals
                    .get(range)
                    .map_or(Real::NAN, |r| r.iter().map(|v| v * v).sum()),
            })
            .collect();
        let fit_arguments = FitArguments {
            method: outcome.method,
            options: options.clone(),
            bounds: set
                .iter()
                .filter(|p| !p.is_fixed())
                .map(|p| (p.name().to_string(), p.lower(), p.upper()))
                .collect(),
            fixed: set
                .iter()
                .filter(|p| p.is_fixed())
                .map(|p| (p.name().to_string(), p.initial()))
                .collect(),
        };
        Self {
            success: outcome.success,
            method: outcome.method,
            message: outcome.message,
            parameters,
            raw_params,
            init_params,
            free_names,
            covariance: outcome.covariance,
            n_data: objective.residual_count(),
            residuals: outcome.residuals,
            chi_square: outcome.chi_square,
            degrees_of_freedom: outcome.degrees_of_freedom,
            curve_statistics,
            function_evaluations: outcome.function_evaluations,
            jacobian_evaluations: outcome.jacobian_evaluations,
            iterations: outcome.iterations,
            fit_arguments,
        }
    }

    /// Whether the minimizer converged.
    pub fn success(&self) -> bool {
        self.success
    }

    /// Minimizer used.
    pub fn method(&self) -> FitMethod {
        self.method
    }

    /// Termination message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// All parameters with uncertainties, in declaration order.
    pub fn parameters(&self) -> &[(String, CorrelatedValue)] {
        &self.parameters
    }

    /// One parameter with its uncertainty.
    pub fn parameter(&self, name: &str) -> Option<&CorrelatedValue> {
        self.parameters
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// All final parameter values, in declaration order.
    pub fn raw_params(&self) -> &[(String, Real)] {
        &self.raw_params
    }

    /// Final value of one parameter.
    pub fn raw_param(&self, name: &str) -> Option<Real> {
        lookup(&self.raw_params, name)
    }

    /// Starting values handed to the minimizer, in declaration order.
    pub fn init_params(&self) -> &[(String, Real)] {
        &self.init_params
    }

    /// Starting value of one parameter.
    pub fn init_param(&self, name: &str) -> Option<Real> {
        lookup(&self.init_params, name)
    }

    /// Free parameter names; this is the covariance index order.
    pub fn free_parameter_names(&self) -> &[String] {
        &self.free_names
    }

    /// Final free-parameter values in covariance order.
    pub fn flat_values(&self) -> Vec<Real> {
        self.free_names
            .iter()
            .filter_map(|n| self.raw_param(n))
            .collect()
    }

    /// Covariance of the free parameters.
    pub fn covariance(&self) -> Option<&Matrix> {
        self.covariance.as_ref()
    }

    /// Weighted residuals at the solution, curve blocks in model order.
    pub fn residuals(&self) -> &[Real] {
        &self.residuals
    }

    /// Sum of squared weighted residuals.
    pub fn chi_square(&self) -> Real {
        self.chi_square
    }

    /// `χ² / dof`; NaN when `dof ≤ 0`.
    pub fn reduced_chi_square(&self) -> Real {
        reduced_chi_square(self.chi_square, self.degrees_of_freedom)
    }

    /// Data points minus free parameters.
    pub fn degrees_of_freedom(&self) -> isize {
        self.degrees_of_freedom
    }

    /// Total number of data points.
    pub fn n_data(&self) -> Size {
        self.n_data
    }

    /// Number of free parameters.
    pub fn n_free(&self) -> Size {
        self.free_names.len()
    }

    /// Akaike information criterion.
    pub fn aic(&self) -> Real {
        information_criteria(self.chi_square, self.n_data, self.n_free()).0
    }

    /// Bayesian information criterion.
    pub fn bic(&self) -> Real {
        information_criteria(self.chi_square, self.n_data, self.n_free()).1
    }

    /// Probability of a χ² at least this large given the degrees of
    /// freedom; meaningful when the weights are inverse standard errors.
    pub fn chi_square_p_value(&self) -> Real {
        if self.degrees_of_freedom <= 0 {
            return Real::NAN;
        }
        ChiSquareDistribution::new(self.degrees_of_freedom as Real)
            .map_or(Real::NAN, |d| d.survival(self.chi_square))
    }

    /// Per-curve statistics in model order.
    pub fn curve_statistics(&self) -> &[CurveStatistics] {
        &self.curve_statistics
    }

    /// Curve names in model order.
    pub fn curve_names(&self) -> Vec<&str> {
        self.curve_statistics.iter().map(|c| c.name()).collect()
    }

    /// Residual evaluations.
    pub fn function_evaluations(&self) -> Size {
        self.function_evaluations
    }

    /// Jacobian or gradient evaluations.
    pub fn jacobian_evaluations(&self) -> Size {
        self.jacobian_evaluations
    }

    /// Minimizer iterations.
    pub fn iterations(&self) -> Size {
        self.iterations
    }

    /// How the fit was set up.
    pub fn fit_arguments(&self) -> &FitArguments {
        &self.fit_arguments
    }

    /// Correlation matrix of the free parameters, in covariance order.
    ///
    /// `None` without a covariance or when it has a negative variance.
    pub fn correlation_matrix(&self) -> Option<Matrix> {
        let cov = self.covariance.as_ref()?;
        covariance_decompose(cov).ok().map(|(_, corr)| corr)
    }

    /// Correlation coefficient of two free parameters.
    pub fn correlation(&self, a: &str, b: &str) -> Option<Real> {
        let i = self.free_names.iter().position(|n| n == a)?;
        let j = self.free_names.iter().position(|n| n == b)?;
        self.correlation_matrix().map(|corr| corr[(i, j)])
    }

    /// Two-sided Student-t confidence interval of a parameter at `level`
    /// (e.g. `0.95`). NaN bounds when the interval is undefined.
    pub fn confidence_interval(&self, name: &str, level: Real) -> Option<(Real, Real)> {
        let value = self.parameter(name)?;
        let t = if self.degrees_of_freedom > 0 {
            StudentTDistribution::new(self.degrees_of_freedom as Real)
                .map_or(Real::NAN, |d| d.two_sided_critical(level))
        } else {
            Real::NAN
        };
        let half = t * value.std_dev();
        Some((value.nominal() - half, value.nominal() + half))
    }

    /// Human-readable summary; correlations below `min_correlation` in
    /// magnitude are left out.
    pub fn fit_report(&self, min_correlation: Real) -> String {
        let mut s = String::new();
        // writing into a String cannot fail
        let _ = self.write_report(&mut s, min_correlation);
        s
    }

    fn write_report(&self, s: &mut String, min_correlation: Real) -> fmt::Result {
        if self.success {
            writeln!(s, "CurveFitResult: success")?;
        } else {
            writeln!(s, "CurveFitResult: FAILED ({})", self.message)?;
        }
        writeln!(s, " - fitting method: {}", self.method)?;
        writeln!(s, " - curves: {}", self.curve_names().join(", "))?;
        writeln!(s, " - message: {}", self.message)?;
        writeln!(s, " - function evaluations: {}", self.function_evaluations)?;
        writeln!(s, " - iterations: {}", self.iterations)?;
        writeln!(s, " - data points: {}", self.n_data)?;
        writeln!(s, " - free parameters: {}", self.n_free())?;
        writeln!(s, " - degrees of freedom: {}", self.degrees_of_freedom)?;
        writeln!(s, " - chi-square: {}", format_general(self.chi_square, 6))?;
        writeln!(
            s,
            " - reduced chi-square: {}",
            format_general(self.reduced_chi_square(), 6)
        )?;
        writeln!(s, " - Akaike info crit.: {}", format_general(self.aic(), 6))?;
        writeln!(s, " - Bayesian info crit.: {}", format_general(self.bic(), 6))?;
        for c in &self.curve_statistics {
            writeln!(
                s,
                "  * {}: {} points, chi-square = {}",
                c.name,
                c.n_points,
                format_general(c.chi_square, 6)
            )?;
        }

        writeln!(s, " - init params:")?;
        for (name, v) in &self.init_params {
            writeln!(s, "  * {name} = {}", format_general(*v, 6))?;
        }

        writeln!(s, " - fit params:")?;
        for (name, v) in &self.parameters {
            if v.is_exact() {
                writeln!(s, "  * {name} = {} (fixed)", format_general(v.nominal(), 6))?;
                continue;
            }
            let std = v.std_dev();
            write!(s, "  * {name} = {}", format_with_uncertainty(v.nominal(), std, 6))?;
            match format_relative_uncertainty(v.nominal(), std) {
                Some(rel) => writeln!(s, " ({rel})")?,
                None => writeln!(s)?,
            }
        }

        let correlations = self.reportable_correlations(min_correlation);
        if !correlations.is_empty() {
            writeln!(
                s,
                " - correlations (|C| >= {}):",
                format_general(min_correlation, 3)
            )?;
            for (a, b, c) in correlations {
                writeln!(s, "  * ({a}, {b}) = {c:.4}")?;
            }
        }
        Ok(())
    }

    /// Free-parameter pairs with `|C| ≥ threshold`, largest first.
    fn reportable_correlations(&self, threshold: Real) -> Vec<(&str, &str, Real)> {
        let mut out = Vec::new();
        let Some(corr) = self.correlation_matrix() else {
            return out;
        };
        for (i, a) in self.free_names.iter().enumerate() {
            for (j, b) in self.free_names.iter().enumerate().skip(i + 1) {
                let c = corr[(i, j)];
                if c.is_finite() && c.abs() >= threshold {
                    out.push((a.as_str(), b.as_str(), c));
                }
            }
        }
        out.sort_by(|x, y| y.2.abs().total_cmp(&x.2.abs()));
        out
    }
}

impl fmt::Display for CurveFitResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fit_report(0.1))
    }
}

fn lookup(pairs: &[(String, Real)], name: &str) -> Option<Real> {
    pairs.iter().find(|(n, _)| n == name).map(|&(_, v)| v)
}

/// `(AIC, BIC)` for `n` points and `k` free parameters.
///
/// `−2 ln L = n · ln(max(χ², 1e-250 · n) / n)`; NaN when `n = 0`.
pub(crate) fn information_criteria(chi_square: Real, n: Size, k: Size) -> (Real, Real) {
    if n == 0 {
        return (Real::NAN, Real::NAN);
    }
    let n = n as Real;
    let k = k as Real;
    let neg2_log_likelihood = n * (chi_square.max(1e-250 * n) / n).ln();
    (
        neg2_log_likelihood + 2.0 * k,
        neg2_log_likelihood + n.ln() * k,
    )
}
