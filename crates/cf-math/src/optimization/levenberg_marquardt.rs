//! Levenberg–Marquardt least-squares optimizer with box constraints.
//!
//! Each iteration solves the damped normal equations
//!
//! ```text
//! (JᵀJ + λ·D) δ = −Jᵀ r,    D = diag(max(diag(JᵀJ), tiny))
//! ```
//!
//! and clips the trial point `x + δ` into the feasible box. Accepted steps
//! shrink `λ`; rejected steps grow it. Termination follows the MINPACK
//! conventions: relative cost reduction (`function_epsilon`), relative step
//! size (`step_epsilon`) and the scaled cosine between the residual vector
//! and the Jacobian columns (`gradient_norm_epsilon`).

use crate::array::Array;
use crate::matrix::Matrix;
use crate::optimization::{
    Constraint, CostFunction, EndCriteria, EndCriteriaType, OptimizationResult,
};
use cf_core::{errors::Result, Real, Size};
use log::debug;
use nalgebra::DMatrix;

/// Levenberg–Marquardt least-squares optimizer.
#[derive(Debug, Clone)]
pub struct LevenbergMarquardt {
    initial_damping: Real,
    max_rejections: Size,
}

impl LevenbergMarquardt {
    /// Create an optimizer whose initial damping is
    /// `initial_damping · max(diag(JᵀJ))`.
    pub fn new(initial_damping: Real) -> Self {
        Self {
            initial_damping,
            max_rejections: 40,
        }
    }

    /// Minimize `cost_fn` subject to `constraint`, starting from `initial_values`.
    ///
    /// The starting point is first projected into the feasible region.
    pub fn minimize<C: CostFunction, K: Constraint>(
        &self,
        cost_fn: &C,
        constraint: &K,
        initial_values: &Array,
        end_criteria: &EndCriteria,
    ) -> Result<OptimizationResult> {
        let n = initial_values.size();
        let mut x = constraint.project(initial_values);
        let mut r = cost_fn.values(&x);
        let mut nfev: Size = 1;
        let mut njev: Size = 0;
        let mut value = 0.5 * r.norm_squared();

        let finish = |x: Array,
                      value: Real,
                      iterations: Size,
                      nfev: Size,
                      njev: Size,
                      end_type: EndCriteriaType|
         -> Result<OptimizationResult> {
            debug!("levenberg-marquardt stopped after {iterations} iterations: {end_type}");
            Ok(OptimizationResult {
                x,
                value,
                iterations,
                function_evaluations: nfev,
                jacobian_evaluations: njev,
                end_type,
            })
        };

        if !value.is_finite() {
            return finish(x, value, 0, nfev, njev, EndCriteriaType::NonFinite);
        }
        if value <= end_criteria.root_epsilon {
            return finish(x, value, 0, nfev, njev, EndCriteriaType::RootEpsilon);
        }

        let mut jac = cost_fn.jacobian(&x);
        njev += 1;
        let mut lambda: Option<Real> = None;

        for iteration in 1..=end_criteria.max_iterations {
            let a = jac.gram();
            let g = jac.tr_mul_vec(&r);

            if scaled_gradient_norm(&jac, &g, &r) <= end_criteria.gradient_norm_epsilon {
                return finish(x, value, iteration - 1, nfev, njev, EndCriteriaType::GradientNormEpsilon);
            }

            let diag: Vec<Real> = (0..n).map(|i| a[(i, i)].max(1e-12)).collect();
            let mut mu = match lambda {
                Some(l) => l,
                None => {
                    let max_diag = diag.iter().fold(0.0_f64, |m, &d| m.max(d));
                    self.initial_damping * max_diag.max(1e-12)
                }
            };

            let mut accepted = false;
            for _ in 0..self.max_rejections {
                let step = match solve_damped(&a, &diag, mu, &g) {
                    Some(s) => s,
                    None => {
                        mu *= 10.0;
                        continue;
                    }
                };
                let x_new = constraint.project(&(&x + &step));
                let actual_step = &x_new - &x;
                let step_small = actual_step.norm()
                    <= end_criteria.step_epsilon * (x.norm() + end_criteria.step_epsilon);

                let r_new = cost_fn.values(&x_new);
                nfev += 1;
                let value_new = 0.5 * r_new.norm_squared();

                if value_new.is_finite() && value_new < value {
                    let reduction = (value - value_new) / value;
                    x = x_new;
                    r = r_new;
                    value = value_new;
                    mu = (mu / 3.0).max(1e-300);
                    lambda = Some(mu);

                    if value <= end_criteria.root_epsilon {
                        return finish(x, value, iteration, nfev, njev, EndCriteriaType::RootEpsilon);
                    }
                    if step_small {
                        return finish(x, value, iteration, nfev, njev, EndCriteriaType::StepEpsilon);
                    }
                    if reduction <= end_criteria.function_epsilon {
                        return finish(x, value, iteration, nfev, njev, EndCriteriaType::FunctionEpsilon);
                    }
                    jac = cost_fn.jacobian(&x);
                    njev += 1;
                    accepted = true;
                    break;
                }

                if step_small {
                    // the damped step has collapsed without reducing the cost
                    return finish(x, value, iteration, nfev, njev, EndCriteriaType::StepEpsilon);
                }
                mu *= 10.0;
            }

            if !accepted {
                return finish(x, value, iteration, nfev, njev, EndCriteriaType::StationaryPoint);
            }
        }

        finish(
            x,
            value,
            end_criteria.max_iterations,
            nfev,
            njev,
            EndCriteriaType::MaxIterations,
        )
    }
}

impl Default for LevenbergMarquardt {
    fn default() -> Self {
        Self::new(1e-3)
    }
}

/// Solve `(A + μ·diag(d)) δ = −g` by Cholesky.
fn solve_damped(a: &Matrix, diag: &[Real], mu: Real, g: &Array) -> Option<Array> {
    let mut m: DMatrix<Real> = a.inner().clone();
    for (i, d) in diag.iter().enumerate() {
        m[(i, i)] += mu * d;
    }
    let chol = m.cholesky()?;
    let rhs = -g.inner();
    let step = chol.solve(&rhs);
    if step.iter().all(|v| v.is_finite()) {
        Some(Array::from(step))
    } else {
        None
    }
}

/// `max_j |(Jᵀr)_j| / (‖J_j‖ ‖r‖)`, the cosine of the largest angle between
/// the residual vector and a Jacobian column. Zero when `r` vanishes.
fn scaled_gradient_norm(jac: &Matrix, g: &Array, r: &Array) -> Real {
    let r_norm = r.norm();
    if r_norm == 0.0 {
        return 0.0;
    }
    let mut worst: Real = 0.0;
    for j in 0..jac.cols() {
        let col_norm = jac.column(j).norm();
        if col_norm > 0.0 {
            worst = worst.max(g[j].abs() / (col_norm * r_norm));
        }
    }
    worst
}
