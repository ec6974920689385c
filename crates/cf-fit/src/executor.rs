//! Running a minimizer over a joint objective.
//!
//! `FitExecutor::fit` never returns an error: whatever happens inside the
//! optimizer ends up in a [`RawFitOutcome`] with `success` and `message`
//! describing it.

use crate::composer::JointObjective;
use crate::options::{FitMethod, FitOptions};
use cf_core::{Real, Size};
use cf_math::matrix_utilities::{rank, singular_values, spd_inverse};
use cf_math::optimization::{
    Bfgs, CostFunction, EndCriteriaType, LevenbergMarquardt, OptimizationResult, Simplex,
};
use cf_math::{Array, Matrix};
use log::{debug, info, warn};

/// Everything the minimizer produced, before uncertainties are attached.
#[derive(Debug, Clone)]
pub struct RawFitOutcome {
    /// Minimizer used.
    pub method: FitMethod,
    /// Final free-parameter vector, in free-parameter order.
    pub free_values: Vec<Real>,
    /// Final values of all parameters, in declaration order.
    pub full_values: Vec<Real>,
    /// Covariance of the free parameters, if it could be estimated.
    pub covariance: Option<Matrix>,
    /// Weighted residuals at the final point.
    pub residuals: Vec<Real>,
    /// Whether the minimizer converged.
    pub success: bool,
    /// Termination message.
    pub message: String,
    /// Residual evaluations.
    pub function_evaluations: Size,
    /// Jacobian or gradient evaluations.
    pub jacobian_evaluations: Size,
    /// Minimizer iterations.
    pub iterations: Size,
    /// Termination kind reported by the minimizer, if it ran.
    pub end_type: Option<EndCriteriaType>,
    /// Sum of squared weighted residuals.
    pub chi_square: Real,
    /// Residual count minus free-parameter count.
    pub degrees_of_freedom: isize,
}

impl RawFitOutcome {
    /// `χ² / dof`, or NaN when `dof ≤ 0`.
    pub fn reduced_chi_square(&self) -> Real {
        reduced_chi_square(self.chi_square, self.degrees_of_freedom)
    }
}

pub(crate) fn reduced_chi_square(chi_square: Real, dof: isize) -> Real {
    if dof > 0 {
        chi_square / dof as Real
    } else {
        Real::NAN
    }
}

/// Runs the selected minimizer on a [`JointObjective`].
#[derive(Debug, Clone, Default)]
pub struct FitExecutor {
    options: FitOptions,
}

impl FitExecutor {
    /// Executor with the given options.
    pub fn new(options: FitOptions) -> Self {
        Self { options }
    }

    /// The options in use.
    pub fn options(&self) -> &FitOptions {
        &self.options
    }

    /// Minimize `objective` with `method`.
    ///
    /// Fixed parameters never enter the optimizer vector. Bounds are
    /// enforced by the minimizer itself. The outcome's covariance is
    /// `(JᵀJ)⁻¹` at the final point, scaled by the reduced χ² unless that
    /// is switched off in the options.
    pub fn fit(&self, objective: &JointObjective, method: FitMethod) -> RawFitOutcome {
        let n_free = objective.free_count();
        let n_data = objective.residual_count();
        let dof = n_data as isize - n_free as isize;
        let x0 = Array::from_vec(objective.parameters().free_initial_values());

        if n_data == 0 {
            warn!("{method} fit skipped: no data points");
            let (residuals, chi_square) = self.residuals_at(objective, &x0);
            return RawFitOutcome {
                method,
                full_values: objective.parameters().initial_values(),
                free_values: x0.to_vec(),
                covariance: None,
                residuals,
                success: false,
                message: "no data points".to_string(),
                function_evaluations: 0,
                jacobian_evaluations: 0,
                iterations: 0,
                end_type: None,
                chi_square,
                degrees_of_freedom: dof,
            };
        }

        let (x, success, message, counts, end_type) = if n_free == 0 {
            debug!("no free parameters; evaluating residuals once");
            (
                x0,
                true,
                "no free parameters; residuals evaluated at the fixed values".to_string(),
                (1, 0, 0),
                None,
            )
        } else {
            match self.minimize(objective, method, &x0) {
                Ok(r) => {
                    let message = r.end_type.describe().to_string();
                    let counts = (r.function_evaluations, r.jacobian_evaluations, r.iterations);
                    let success = r.is_success();
                    (r.x, success, message, counts, Some(r.end_type))
                }
                Err(e) => (x0, false, format!("optimizer error: {e}"), (0, 0, 0), None),
            }
        };

        let (residuals, chi_square) = self.residuals_at(objective, &x);
        let finite = chi_square.is_finite();
        let success = success && finite;
        let message = if finite {
            message
        } else {
            warn!("{method} fit ended with non-finite residuals");
            "non-finite residuals at the final point".to_string()
        };

        let covariance = if finite && self.options.estimate_covariance {
            self.covariance_at(objective, &x, chi_square, dof)
        } else {
            None
        };
        if covariance.is_none() && self.options.estimate_covariance {
            warn!("{method} fit: covariance could not be estimated");
        }

        let (function_evaluations, jacobian_evaluations, iterations) = counts;
        if success {
            info!(
                "{method} fit converged after {iterations} iterations: chi-square = {chi_square}, dof = {dof}"
            );
        } else {
            warn!("{method} fit failed: {message}");
        }

        let full_values = objective.parameters().expand_unchecked(x.as_slice());
        RawFitOutcome {
            method,
            free_values: x.to_vec(),
            full_values,
            covariance,
            residuals,
            success,
            message,
            function_evaluations,
            jacobian_evaluations,
            iterations,
            end_type,
            chi_square,
            degrees_of_freedom: dof,
        }
    }

    fn minimize(
        &self,
        objective: &JointObjective,
        method: FitMethod,
        x0: &Array,
    ) -> cf_core::Result<OptimizationResult> {
        let criteria = self.options.end_criteria(method, objective.free_count());
        let constraint = objective.constraint();
        match method {
            FitMethod::LeastSquares => {
                LevenbergMarquardt::default().minimize(objective, constraint, x0, &criteria)
            }
            FitMethod::NelderMead => Simplex::new(self.options.simplex_step).minimize(
                objective,
                constraint,
                x0,
                &criteria,
            ),
            FitMethod::Bfgs => Bfgs.minimize(objective, constraint, x0, &criteria),
        }
    }

    fn residuals_at(&self, objective: &JointObjective, x: &Array) -> (Vec<Real>, Real) {
        let r = objective.values(x);
        let chi_square = r.norm_squared();
        (r.to_vec(), chi_square)
    }

    fn covariance_at(
        &self,
        objective: &JointObjective,
        x: &Array,
        chi_square: Real,
        dof: isize,
    ) -> Option<Matrix> {
        let jtj = objective.jacobian(x).gram();
        let Some(inverse) = spd_inverse(&jtj) else {
            if !jtj.is_finite() {
                debug!("normal matrix has non-finite entries");
                return None;
            }
            let scale = singular_values(&jtj).iter().fold(0.0_f64, |a, &b| a.max(b));
            debug!(
                "normal matrix is singular: rank {} of {}",
                rank(&jtj, scale * 1e-12),
                jtj.rows()
            );
            return None;
        };
        if !self.options.scale_covariance {
            return Some(inverse);
        }
        if dof <= 0 {
            return None;
        }
        Some(inverse.scale(chi_square / dof as Real))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composer::ModelComposer;
    use crate::data::DataSeries;
    use crate::options::Weighting;
    use crate::parameters::ParameterSet;
    use approx::assert_abs_diff_eq;
    use cf_models::Model;

    fn line_objective(xs: &[Real], slope: Real, intercept: Real, set: &ParameterSet) -> JointObjective {
        let model = Model::new("line", ["slope", "intercept"], |x, p| p[0] * x + p[1]).unwrap();
        let y = xs.iter().map(|x| slope * x + intercept).collect();
        let data = DataSeries::new("line", xs.to_vec(), y).unwrap();
        ModelComposer::compose(&[model], &[data], set, Weighting::Auto).unwrap()
    }

    fn free_set(slope: Real, intercept: Real) -> ParameterSet {
        let mut set = ParameterSet::new();
        set.declare_free("slope", slope).unwrap();
        set.declare_free("intercept", intercept).unwrap();
        set
    }

    #[test]
    fn every_method_recovers_a_line() {
        let xs: Vec<Real> = (0..10).map(Real::from).collect();
        let set = free_set(1.0, 0.0);
        let obj = line_objective(&xs, 2.5, -1.0, &set);
        for method in [FitMethod::LeastSquares, FitMethod::NelderMead, FitMethod::Bfgs] {
            let out = FitExecutor::default().fit(&obj, method);
            assert!(out.success, "{method}: {}", out.message);
            assert_abs_diff_eq!(out.free_values[0], 2.5, epsilon = 1e-4);
            assert_abs_diff_eq!(out.free_values[1], -1.0, epsilon = 1e-4);
            assert_eq!(out.degrees_of_freedom, 8);
            assert_eq!(out.residuals.len(), 10);
        }
    }

    #[test]
    fn fixed_parameters_keep_their_value() {
        let xs: Vec<Real> = (0..6).map(Real::from).collect();
        let mut set = ParameterSet::new();
        set.declare_free("slope", 0.0).unwrap();
        set.declare_fixed("intercept", 3.0).unwrap();
        let obj = line_objective(&xs, 1.5, 3.0, &set);
        let out = FitExecutor::default().fit(&obj, FitMethod::LeastSquares);
        assert!(out.success);
        assert_eq!(out.free_values.len(), 1);
        assert_eq!(out.full_values[1], 3.0);
        assert_abs_diff_eq!(out.full_values[0], 1.5, epsilon = 1e-8);
        assert_eq!(out.covariance.as_ref().map(Matrix::rows), Some(1));
    }

    #[test]
    fn no_free_parameters_gives_empty_covariance() {
        let xs = [0.0, 1.0, 2.0];
        let mut set = ParameterSet::new();
        set.declare_fixed("slope", 1.0).unwrap();
        set.declare_fixed("intercept", 0.0).unwrap();
        let obj = line_objective(&xs, 1.0, 1.0, &set);
        let out = FitExecutor::default().fit(&obj, FitMethod::LeastSquares);
        assert!(out.success);
        assert_eq!(out.chi_square, 3.0);
        assert_eq!(out.reduced_chi_square(), 1.0);
        assert_eq!(out.covariance, Some(Matrix::zeros(0, 0)));
        assert_eq!(out.function_evaluations, 1);
    }

    #[test]
    fn no_data_is_a_failure_not_an_error() {
        let set = free_set(1.0, 0.0);
        let obj = line_objective(&[], 1.0, 0.0, &set);
        let out = FitExecutor::default().fit(&obj, FitMethod::NelderMead);
        assert!(!out.success);
        assert_eq!(out.message, "no data points");
        assert!(out.reduced_chi_square().is_nan());
        assert_eq!(out.free_values, vec![1.0, 0.0]);
    }

    #[test]
    fn underdetermined_fit_has_nan_reduced_chi_square() {
        let set = free_set(1.0, 0.0);
        let obj = line_objective(&[1.0], 2.0, 0.0, &set);
        let out = FitExecutor::default().fit(&obj, FitMethod::LeastSquares);
        assert_eq!(out.degrees_of_freedom, -1);
        assert!(out.reduced_chi_square().is_nan());
        assert!(out.covariance.is_none());
    }

    #[test]
    fn unscaled_covariance_is_inverse_normal_matrix() {
        // y = k·x at x = 1, 2: JᵀJ = 1 + 4
        let model = Model::new("p", ["k"], |x, p| p[0] * x).unwrap();
        let mut set = ParameterSet::new();
        set.declare_free("k", 1.0).unwrap();
        let data = DataSeries::new("p", vec![1.0, 2.0], vec![2.0, 4.0]).unwrap();
        let obj = ModelComposer::compose(&[model], &[data], &set, Weighting::Auto).unwrap();
        let exec = FitExecutor::new(FitOptions::default().with_scaled_covariance(false));
        let out = exec.fit(&obj, FitMethod::LeastSquares);
        let cov = out.covariance.unwrap();
        assert_abs_diff_eq!(cov[(0, 0)], 0.2, epsilon = 1e-6);
    }

    #[test]
    fn non_finite_model_output_fails() {
        let model = Model::new("p", ["k"], |x, p| (p[0] * x).ln()).unwrap();
        let mut set = ParameterSet::new();
        set.declare_free("k", -1.0).unwrap();
        let data = DataSeries::new("p", vec![1.0, 2.0, 3.0], vec![0.0, 0.5, 1.0]).unwrap();
        let obj = ModelComposer::compose(&[model], &[data], &set, Weighting::Auto).unwrap();
        let out = FitExecutor::default().fit(&obj, FitMethod::LeastSquares);
        assert!(!out.success);
        assert!(out.covariance.is_none());
    }

    #[test]
    fn iteration_limit_is_reported() {
        let xs: Vec<Real> = (0..20).map(Real::from).collect();
        let set = free_set(100.0, 50.0);
        let obj = line_objective(&xs, 0.3, 0.1, &set);
        let exec = FitExecutor::new(FitOptions::default().with_max_iterations(2));
        let out = exec.fit(&obj, FitMethod::NelderMead);
        assert!(!out.success);
        assert_eq!(out.end_type, Some(EndCriteriaType::MaxIterations));
        assert_eq!(out.message, "maximum number of iterations reached");
    }

    #[test]
    fn optimizer_errors_become_failed_outcomes() {
        let xs: Vec<Real> = (0..5).map(Real::from).collect();
        let set = free_set(1.0, 0.0);
        let obj = line_objective(&xs, 0.3, 0.1, &set);
        let exec = FitExecutor::new(FitOptions::default().with_simplex_step(0.0));
        let out = exec.fit(&obj, FitMethod::NelderMead);
        assert!(!out.success);
        assert!(out.message.starts_with("optimizer error:"), "{}", out.message);
        assert_eq!(out.end_type, None);
        assert_eq!(out.free_values, [1.0, 0.0]);
    }
}
