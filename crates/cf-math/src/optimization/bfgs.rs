//! BFGS quasi-Newton optimizer with projection onto box constraints.
//!
//! Maintains an approximation to the inverse Hessian of `0.5 · Σ r²` that is
//! updated at each accepted step. Trial points along the search direction
//! are projected into the feasible box; a backtracking Armijo line search
//! picks the step length.

use crate::array::Array;
use crate::comparison::relative_change;
use crate::matrix::Matrix;
use crate::optimization::{
    Constraint, CostFunction, EndCriteria, EndCriteriaType, OptimizationResult,
};
use cf_core::{errors::Result, Real, Size};
use log::debug;

const ARMIJO: Real = 1e-4;
const MAX_BACKTRACKS: Size = 60;

/// BFGS (Broyden–Fletcher–Goldfarb–Shanno) quasi-Newton optimizer.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bfgs;

impl Bfgs {
    /// Create a new BFGS optimizer.
    pub fn new() -> Self {
        Self
    }

    /// Minimize `cost_fn` subject to `constraint`, starting from `initial_values`.
    pub fn minimize<C: CostFunction, K: Constraint>(
        &self,
        cost_fn: &C,
        constraint: &K,
        initial_values: &Array,
        end_criteria: &EndCriteria,
    ) -> Result<OptimizationResult> {
        let n = initial_values.size();
        let mut x = constraint.project(initial_values);
        let mut value = cost_fn.value(&x);
        let mut nfev: Size = 1;
        let mut njev: Size = 0;
        let mut iterations = 0;

        let end_type = 'outer: {
            if !value.is_finite() {
                break 'outer EndCriteriaType::NonFinite;
            }
            let mut grad = cost_fn.gradient(&x);
            njev += 1;
            let mut h_inv = Matrix::identity(n);
            let mut first_update = true;
            let mut stationary = 0;

            loop {
                if value <= end_criteria.root_epsilon {
                    break 'outer EndCriteriaType::RootEpsilon;
                }
                if projected_gradient(&x, &grad, constraint).max_abs()
                    <= end_criteria.gradient_norm_epsilon * value.max(1.0)
                {
                    break 'outer EndCriteriaType::GradientNormEpsilon;
                }
                if iterations >= end_criteria.max_iterations {
                    break 'outer EndCriteriaType::MaxIterations;
                }
                iterations += 1;

                // p = -H⁻¹ ∇f, falling back to steepest descent when p is not
                // a descent direction
                let mut direction = -h_inv.mul_vec(&grad);
                if grad.dot(&direction) >= 0.0 {
                    h_inv = Matrix::identity(n);
                    first_update = true;
                    direction = -&grad;
                }

                let mut alpha = 1.0;
                let mut accepted: Option<(Array, Real)> = None;
                for _ in 0..MAX_BACKTRACKS {
                    let trial = constraint.project(&(&x + &(&direction * alpha)));
                    let step = &trial - &x;
                    let trial_value = cost_fn.value(&trial);
                    nfev += 1;
                    if trial_value.is_finite() && trial_value <= value + ARMIJO * grad.dot(&step) {
                        accepted = Some((trial, trial_value));
                        break;
                    }
                    alpha *= 0.5;
                }

                let Some((x_new, value_new)) = accepted else {
                    break 'outer EndCriteriaType::StationaryPoint;
                };

                let s = &x_new - &x;
                let step_small =
                    s.norm() <= end_criteria.step_epsilon * (x.norm() + end_criteria.step_epsilon);
                let f_change = relative_change(value, value_new, Real::MIN_POSITIVE);

                let new_grad = cost_fn.gradient(&x_new);
                njev += 1;
                let y = &new_grad - &grad;
                let sy = s.dot(&y);
                if sy > 1e-300 {
                    if first_update {
                        // scale the initial approximation by sᵀy / yᵀy
                        h_inv = Matrix::identity(n).scale(sy / y.norm_squared());
                        first_update = false;
                    }
                    update_inverse_hessian(&mut h_inv, &s, &y, sy);
                }

                x = x_new;
                value = value_new;
                grad = new_grad;

                if step_small {
                    break 'outer EndCriteriaType::StepEpsilon;
                }
                if f_change <= end_criteria.function_epsilon {
                    stationary += 1;
                    if stationary >= 2 || stationary >= end_criteria.max_stationary_state_iterations {
                        break 'outer EndCriteriaType::FunctionEpsilon;
                    }
                } else {
                    stationary = 0;
                }
            }
        };

        debug!("bfgs stopped after {iterations} iterations: {end_type}");
        Ok(OptimizationResult {
            x,
            value,
            iterations,
            function_evaluations: nfev,
            jacobian_evaluations: njev,
            end_type,
        })
    }
}

/// Gradient with the components that push against an active bound zeroed.
fn projected_gradient<K: Constraint>(x: &Array, grad: &Array, constraint: &K) -> Array {
    let moved = constraint.project(&(x - grad));
    x - &moved
}

/// `H ← (I − ρ s yᵀ) H (I − ρ y sᵀ) + ρ s sᵀ` with `ρ = 1 / sᵀy`.
fn update_inverse_hessian(h: &mut Matrix, s: &Array, y: &Array, sy: Real) {
    let n = s.size();
    let rho = 1.0 / sy;
    let hy = h.mul_vec(y);
    let yhy = y.dot(&hy);
    let factor = 1.0 + rho * yhy;
    // H is symmetric, so yᵀH = (Hy)ᵀ
    for i in 0..n {
        for j in 0..n {
            h[(i, j)] += rho * (factor * s[i] * s[j] - hy[i] * s[j] - s[i] * hy[j]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimization::test_functions::*;
    use crate::optimization::{BoundaryConstraint, NoConstraint};

    #[test]
    fn bfgs_simple_quadratic() {
        let result = Bfgs::new()
            .minimize(
                &SimpleQuadratic,
                &NoConstraint,
                &Array::from_slice(&[0.0]),
                &EndCriteria::default(),
            )
            .unwrap();
        assert!(result.is_success(), "{:?}", result.end_type);
        assert!((result.x[0] - 3.0).abs() < 1e-6, "got x = {}", result.x[0]);
    }

    #[test]
    fn bfgs_rosenbrock() {
        let result = Bfgs::new()
            .minimize(
                &Rosenbrock,
                &NoConstraint,
                &Array::from_slice(&[-1.2, 1.0]),
                &EndCriteria::default(),
            )
            .unwrap();
        assert!((result.x[0] - 1.0).abs() < 1e-4, "x[0] = {}", result.x[0]);
        assert!((result.x[1] - 1.0).abs() < 1e-4, "x[1] = {}", result.x[1]);
        assert!(result.jacobian_evaluations > 0);
    }

    #[test]
    fn bfgs_projects_onto_bounds() {
        let c = BoundaryConstraint::new(vec![3.5], vec![10.0]).unwrap();
        let result = Bfgs::new()
            .minimize(
                &SimpleQuadratic,
                &c,
                &Array::from_slice(&[8.0]),
                &EndCriteria::default(),
            )
            .unwrap();
        assert!(result.is_success(), "{:?}", result.end_type);
        assert!((result.x[0] - 3.5).abs() < 1e-10);
    }

    #[test]
    fn inverse_hessian_update_satisfies_secant_condition() {
        let mut h = Matrix::identity(2);
        let s = Array::from_slice(&[0.5, -0.25]);
        let y = Array::from_slice(&[1.0, 0.5]);
        let sy = s.dot(&y);
        update_inverse_hessian(&mut h, &s, &y, sy);
        // H y = s after the update
        let hy = h.mul_vec(&y);
        assert!((hy[0] - s[0]).abs() < 1e-12);
        assert!((hy[1] - s[1]).abs() < 1e-12);
    }
}
