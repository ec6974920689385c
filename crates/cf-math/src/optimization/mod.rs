//! Optimization framework.
//!
//! Provides the cost-function and constraint traits, end criteria, and the
//! three bounded minimizers used by the fitter: Levenberg–Marquardt,
//! Nelder–Mead simplex and BFGS.

use crate::array::Array;
use crate::matrix::Matrix;
use cf_core::{
    errors::{Error, Result},
    Real, Size,
};

pub mod bfgs;
pub mod levenberg_marquardt;
pub mod simplex;

pub use bfgs::Bfgs;
pub use levenberg_marquardt::LevenbergMarquardt;
pub use simplex::Simplex;

// ── Cost function trait ───────────────────────────────────────────────────────

/// A least-squares cost function defined by a residual vector.
pub trait CostFunction {
    /// Evaluate the residual vector at `x`.
    fn values(&self, x: &Array) -> Array;

    /// Return the scalar cost `0.5 * Σ r²(x)`.
    fn value(&self, x: &Array) -> Real {
        0.5 * self.values(x).norm_squared()
    }

    /// Jacobian of the residuals, `m × n` with one row per residual.
    ///
    /// The default uses forward differences with a step relative to each
    /// coordinate.
    fn jacobian(&self, x: &Array) -> Matrix {
        let f0 = self.values(x);
        forward_difference_jacobian::<_, NoConstraint>(|p| self.values(p), x, &f0, None)
    }

    /// Gradient of the scalar cost, `Jᵀ r`.
    fn gradient(&self, x: &Array) -> Array {
        let r = self.values(x);
        self.jacobian(x).tr_mul_vec(&r)
    }
}

/// Forward-difference Jacobian of `f` at `x` given `f0 = f(x)`.
///
/// The step for coordinate `j` is `√ε · max(|xⱼ|, 1)`. When `constraint`
/// is given and the forward point would leave the feasible box, the
/// backward point is used instead; when both would, the step is shortened
/// to the wider feasible side. A coordinate with no room to move gets a zero
/// column.
pub fn forward_difference_jacobian<F, K>(
    f: F,
    x: &Array,
    f0: &Array,
    constraint: Option<&K>,
) -> Matrix
where
    F: Fn(&Array) -> Array,
    K: Constraint + ?Sized,
{
    let n = x.size();
    let m = f0.size();
    let mut jac = Matrix::zeros(m, n);
    let base = f64::EPSILON.sqrt();
    for j in 0..n {
        let step = base * x[j].abs().max(1.0);
        let xp = match constraint {
            Some(c) => feasible_shift(c, x, j, step),
            None => {
                let mut xp = x.clone();
                xp[j] += step;
                xp
            }
        };
        let h = xp[j] - x[j];
        if h == 0.0 {
            continue;
        }
        let fp = f(&xp);
        for r in 0..m {
            jac[(r, j)] = (fp[r] - f0[r]) / h;
        }
    }
    jac
}

/// `x` moved along coordinate `j` by at most `step`, staying feasible.
fn feasible_shift<K: Constraint + ?Sized>(c: &K, x: &Array, j: usize, step: Real) -> Array {
    let mut forward = x.clone();
    forward[j] += step;
    if c.test(&forward) {
        return forward;
    }
    let mut backward = x.clone();
    backward[j] -= step;
    if c.test(&backward) {
        return backward;
    }
    let forward = c.project(&forward);
    let backward = c.project(&backward);
    if forward[j] - x[j] >= x[j] - backward[j] {
        forward
    } else {
        backward
    }
}

// ── Constraints ───────────────────────────────────────────────────────────────

/// A constraint on the parameter space.
pub trait Constraint {
    /// Return `true` if `x` satisfies the constraint.
    fn test(&self, x: &Array) -> bool;

    /// Closest feasible point to `x` (coordinate-wise clipping).
    fn project(&self, x: &Array) -> Array {
        x.clone()
    }

    /// Mirror infeasible coordinates back into the feasible region.
    fn reflect(&self, x: &Array) -> Array {
        self.project(x)
    }
}

/// No constraint: all parameter values are accepted.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoConstraint;

impl Constraint for NoConstraint {
    fn test(&self, _x: &Array) -> bool {
        true
    }
}

/// Per-coordinate box constraint `lower[i] <= x[i] <= upper[i]`.
///
/// Infinite bounds are allowed on either side.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundaryConstraint {
    lower: Vec<Real>,
    upper: Vec<Real>,
}

impl BoundaryConstraint {
    /// Create a box constraint from per-coordinate bounds.
    pub fn new(lower: Vec<Real>, upper: Vec<Real>) -> Result<Self> {
        if lower.len() != upper.len() {
            return Err(Error::DimensionMismatch {
                expected: lower.len(),
                found: upper.len(),
            });
        }
        for (i, (&lo, &hi)) in lower.iter().zip(upper.iter()).enumerate() {
            if lo.is_nan() || hi.is_nan() || lo > hi {
                return Err(Error::InvalidArgument(format!(
                    "invalid bounds [{lo}, {hi}] for coordinate {i}"
                )));
            }
        }
        Ok(Self { lower, upper })
    }

    /// Lower bounds.
    pub fn lower(&self) -> &[Real] {
        &self.lower
    }

    /// Upper bounds.
    pub fn upper(&self) -> &[Real] {
        &self.upper
    }
}

impl Constraint for BoundaryConstraint {
    fn test(&self, x: &Array) -> bool {
        x.size() == self.lower.len()
            && x
                .iter()
                .zip(self.lower.iter().zip(self.upper.iter()))
                .all(|(&v, (&lo, &hi))| v >= lo && v <= hi)
    }

    fn project(&self, x: &Array) -> Array {
        let mut out = x.clone();
        for i in 0..out.size().min(self.lower.len()) {
            out[i] = out[i].max(self.lower[i]).min(self.upper[i]);
        }
        out
    }

    fn reflect(&self, x: &Array) -> Array {
        let mut out = x.clone();
        for i in 0..out.size().min(self.lower.len()) {
            let (lo, hi) = (self.lower[i], self.upper[i]);
            let mut v = out[i];
            if v < lo {
                v = lo + (lo - v);
            } else if v > hi {
                v = hi - (v - hi);
            }
            // a reflection that overshoots the opposite bound is clipped
            out[i] = v.max(lo).min(hi);
        }
        out
    }
}

// ── End criteria ──────────────────────────────────────────────────────────────

/// Criteria to stop an optimization.
#[derive(Debug, Clone, PartialEq)]
pub struct EndCriteria {
    /// Maximum number of iterations.
    pub max_iterations: Size,
    /// Maximum number of consecutive iterations without progress.
    pub max_stationary_state_iterations: Size,
    /// Stop when the cost drops to or below this value.
    pub root_epsilon: Real,
    /// Stop when the relative change of the cost drops below this value.
    pub function_epsilon: Real,
    /// Stop when the relative step size drops below this value.
    pub step_epsilon: Real,
    /// Stop when the (scaled) gradient norm drops below this value.
    pub gradient_norm_epsilon: Real,
}

impl EndCriteria {
    /// Create new end criteria.
    pub fn new(
        max_iterations: Size,
        max_stationary_state_iterations: Size,
        root_epsilon: Real,
        function_epsilon: Real,
        step_epsilon: Real,
        gradient_norm_epsilon: Real,
    ) -> Self {
        Self {
            max_iterations,
            max_stationary_state_iterations,
            root_epsilon,
            function_epsilon,
            step_epsilon,
            gradient_norm_epsilon,
        }
    }

    /// Set the iteration limit.
    pub fn with_max_iterations(mut self, n: Size) -> Self {
        self.max_iterations = n;
        self
    }

    /// Set the relative function tolerance.
    pub fn with_function_epsilon(mut self, eps: Real) -> Self {
        self.function_epsilon = eps;
        self
    }

    /// Set the relative step tolerance.
    pub fn with_step_epsilon(mut self, eps: Real) -> Self {
        self.step_epsilon = eps;
        self
    }

    /// Set the gradient tolerance.
    pub fn with_gradient_norm_epsilon(mut self, eps: Real) -> Self {
        self.gradient_norm_epsilon = eps;
        self
    }
}

impl Default for EndCriteria {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            max_stationary_state_iterations: 100,
            root_epsilon: 0.0,
            function_epsilon: 1e-10,
            step_epsilon: 1e-10,
            gradient_norm_epsilon: 1e-10,
        }
    }
}

/// The reason an optimization terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndCriteriaType {
    /// Maximum iterations reached.
    MaxIterations,
    /// Cost at or below the root epsilon.
    RootEpsilon,
    /// Relative cost change below the function epsilon.
    FunctionEpsilon,
    /// Relative step below the step epsilon.
    StepEpsilon,
    /// Gradient norm below the gradient epsilon.
    GradientNormEpsilon,
    /// No further reduction is possible at working precision.
    StationaryPoint,
    /// The cost function returned NaN or infinity at the starting point.
    NonFinite,
    /// The linearized step could not be computed.
    Singular,
}

impl EndCriteriaType {
    /// Whether this termination counts as a converged optimization.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            EndCriteriaType::RootEpsilon
                | EndCriteriaType::FunctionEpsilon
                | EndCriteriaType::StepEpsilon
                | EndCriteriaType::GradientNormEpsilon
                | EndCriteriaType::StationaryPoint
        )
    }

    /// Human-readable description.
    pub fn describe(&self) -> &'static str {
        match self {
            EndCriteriaType::MaxIterations => "maximum number of iterations reached",
            EndCriteriaType::RootEpsilon => "cost function reached zero",
            EndCriteriaType::FunctionEpsilon => "relative reduction of the cost below tolerance",
            EndCriteriaType::StepEpsilon => "relative step size below tolerance",
            EndCriteriaType::GradientNormEpsilon => "gradient below tolerance",
            EndCriteriaType::StationaryPoint => "no further reduction possible",
            EndCriteriaType::NonFinite => "non-finite residuals",
            EndCriteriaType::Singular => "singular linearized system",
        }
    }
}

impl std::fmt::Display for EndCriteriaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.describe())
    }
}

/// Result of an optimization.
#[derive(Debug, Clone)]
pub struct OptimizationResult {
    /// Final parameter values.
    pub x: Array,
    /// Final cost `0.5 * Σ r²`.
    pub value: Real,
    /// Number of iterations performed.
    pub iterations: Size,
    /// Number of residual evaluations.
    pub function_evaluations: Size,
    /// Number of Jacobian (or gradient) evaluations.
    pub jacobian_evaluations: Size,
    /// Reason for termination.
    pub end_type: EndCriteriaType,
}

impl OptimizationResult {
    /// Shorthand for `end_type.is_success()`.
    pub fn is_success(&self) -> bool {
        self.end_type.is_success()
    }
}

#[cfg(test)]
pub(crate) mod test_functions {
    use super::*;

    /// Rosenbrock: residuals `(1 - x, 10 (y - x²))`.
    pub struct Rosenbrock;
    impl CostFunction for Rosenbrock {
        fn values(&self, x: &Array) -> Array {
            Array::from_slice(&[1.0 - x[0], 10.0 * (x[1] - x[0] * x[0])])
        }
    }

    /// `(x - 3)²`.
    pub struct SimpleQuadratic;
    impl CostFunction for SimpleQuadratic {
        fn values(&self, x: &Array) -> Array {
            Array::from_slice(&[x[0] - 3.0])
        }
    }

    /// Straight line through `(t, 2t + 1)` for t = 0..5.
    pub struct LineData;
    impl CostFunction for LineData {
        fn values(&self, x: &Array) -> Array {
            Array::from_vec(
                (0..6)
                    .map(|t| {
                        let t = t as Real;
                        (2.0 * t + 1.0) - (x[0] * t + x[1])
                    })
                    .collect(),
            )
        }
    }
}
