//! Nelder–Mead simplex optimizer with box constraints.
//!
//! Trial vertices that leave the feasible box are reflected back into it
//! (`Constraint::reflect`) before they are evaluated, so every evaluated
//! point is feasible.

use crate::array::Array;
use crate::comparison::relative_change;
use crate::optimization::{
    Constraint, CostFunction, EndCriteria, EndCriteriaType, OptimizationResult,
};
use cf_core::{ensure, errors::Result, Real, Size};
use log::debug;

/// Initial step used for coordinates that start at exactly zero.
const ZERO_COORDINATE_STEP: Real = 0.00025;

/// Nelder–Mead simplex optimizer.
#[derive(Debug, Clone)]
pub struct Simplex {
    lambda: Real,
}

impl Simplex {
    /// Create a simplex whose initial vertices are offset from the starting
    /// point by `lambda · |xᵢ|` along each coordinate.
    pub fn new(lambda: Real) -> Self {
        Self { lambda }
    }

    /// Minimize `cost_fn` subject to `constraint`, starting from `initial_values`.
    pub fn minimize<C: CostFunction, K: Constraint>(
        &self,
        cost_fn: &C,
        constraint: &K,
        initial_values: &Array,
        end_criteria: &EndCriteria,
    ) -> Result<OptimizationResult> {
        ensure!(
            self.lambda.is_finite() && self.lambda > 0.0,
            "simplex step must be positive, got {}",
            self.lambda
        );
        let n = initial_values.size();
        let np1 = n + 1;
        let mut nfev: Size = 0;
        let eval = |p: &Array, nfev: &mut Size| -> Real {
            *nfev += 1;
            let v = cost_fn.value(p);
            if v.is_nan() {
                Real::INFINITY
            } else {
                v
            }
        };

        let start = constraint.project(initial_values);
        let mut vertices: Vec<Array> = Vec::with_capacity(np1);
        vertices.push(start.clone());
        for i in 0..n {
            let mut v = start.clone();
            let step = if start[i] != 0.0 {
                self.lambda * start[i].abs()
            } else {
                ZERO_COORDINATE_STEP
            };
            v[i] += step;
            if !constraint.test(&v) {
                v[i] = start[i] - step;
            }
            vertices.push(constraint.project(&v));
        }

        let mut values: Vec<Real> = Vec::with_capacity(np1);
        for v in &vertices {
            values.push(eval(v, &mut nfev));
        }
        if !values[0].is_finite() {
            return Ok(OptimizationResult {
                x: start,
                value: values[0],
                iterations: 0,
                function_evaluations: nfev,
                jacobian_evaluations: 0,
                end_type: EndCriteriaType::NonFinite,
            });
        }

        let mut iterations = 0;
        let end_type = loop {
            order(&mut vertices, &mut values);
            let best = values[0];

            if best <= end_criteria.root_epsilon {
                break EndCriteriaType::RootEpsilon;
            }
            let f_spread = values
                .iter()
                .map(|&v| relative_change(best, v, Real::MIN_POSITIVE))
                .fold(0.0, Real::max);
            if f_spread <= end_criteria.function_epsilon {
                break EndCriteriaType::FunctionEpsilon;
            }
            let x_scale = vertices[0].max_abs().max(1.0);
            let x_spread = vertices[1..]
                .iter()
                .map(|v| (v - &vertices[0]).max_abs())
                .fold(0.0, Real::max);
            if x_spread <= end_criteria.step_epsilon * x_scale {
                break EndCriteriaType::StepEpsilon;
            }
            if iterations >= end_criteria.max_iterations {
                break EndCriteriaType::MaxIterations;
            }
            iterations += 1;

            let worst = n;
            let mut centroid = Array::zeros(n);
            for v in &vertices[..n] {
                centroid = &centroid + v;
            }
            centroid = &centroid / n as Real;

            let reflected = constraint.reflect(&(&(&centroid * 2.0) - &vertices[worst]));
            let fr = eval(&reflected, &mut nfev);

            if fr < values[0] {
                let expanded = constraint.reflect(&(&(&reflected * 2.0) - &centroid));
                let fe = eval(&expanded, &mut nfev);
                if fe < fr {
                    vertices[worst] = expanded;
                    values[worst] = fe;
                } else {
                    vertices[worst] = reflected;
                    values[worst] = fr;
                }
            } else if fr < values[n - 1] {
                vertices[worst] = reflected;
                values[worst] = fr;
            } else {
                let contracted = if fr < values[worst] {
                    (&centroid + &reflected) / 2.0
                } else {
                    (&centroid + &vertices[worst]) / 2.0
                };
                let fc = eval(&contracted, &mut nfev);
                if fc < values[worst].min(fr) {
                    vertices[worst] = contracted;
                    values[worst] = fc;
                } else {
                    for i in 1..np1 {
                        vertices[i] = (&vertices[0] + &vertices[i]) / 2.0;
                        values[i] = eval(&vertices[i], &mut nfev);
                    }
                }
            }
        };

        debug!("nelder-mead stopped after {iterations} iterations: {end_type}");
        Ok(OptimizationResult {
            x: vertices[0].clone(),
            value: values[0],
            iterations,
            function_evaluations: nfev,
            jacobian_evaluations: 0,
            end_type,
        })
    }
}

impl Default for Simplex {
    fn default() -> Self {
        Self::new(0.05)
    }
}

/// Sort vertices by ascending cost.
fn order(vertices: &mut [Array], values: &mut [Real]) {
    let mut pairs: Vec<(Array, Real)> = vertices
        .iter()
        .cloned()
        .zip(values.iter().copied())
        .collect();
    pairs.sort_by(|a, b| a.1.total_cmp(&b.1));
    for (i, (v, f)) in pairs.into_iter().enumerate() {
        vertices[i] = v;
        values[i] = f;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimization::test_functions::*;
    use crate::optimization::{BoundaryConstraint, NoConstraint};

    #[test]
    fn simplex_simple_quadratic() {
        let opt = Simplex::default();
        let result = opt
            .minimize(
                &SimpleQuadratic,
                &NoConstraint,
                &Array::from_slice(&[0.0]),
                &EndCriteria::default(),
            )
            .unwrap();
        assert!(result.is_success(), "{:?}", result.end_type);
        assert!((result.x[0] - 3.0).abs() < 1e-6, "got x = {}", result.x[0]);
        assert_eq!(result.jacobian_evaluations, 0);
    }

    #[test]
    fn simplex_rejects_non_positive_step() {
        let result = Simplex::new(0.0).minimize(
            &SimpleQuadratic,
            &NoConstraint,
            &Array::from_slice(&[0.0]),
            &EndCriteria::default(),
        );
        assert!(matches!(result, Err(cf_core::errors::Error::Precondition(_))));
    }

    #[test]
    fn simplex_rosenbrock() {
        let opt = Simplex::new(0.5);
        let ec = EndCriteria::default().with_max_iterations(5000);
        let result = opt
            .minimize(&Rosenbrock, &NoConstraint, &Array::from_slice(&[-1.0, 1.0]), &ec)
            .unwrap();
        assert!((result.x[0] - 1.0).abs() < 1e-3, "x[0] = {}", result.x[0]);
        assert!((result.x[1] - 1.0).abs() < 1e-3, "x[1] = {}", result.x[1]);
    }

    #[test]
    fn every_vertex_stays_in_bounds() {
        struct Checked<'a>(&'a BoundaryConstraint);
        impl CostFunction for Checked<'_> {
            fn values(&self, x: &Array) -> Array {
                assert!(self.0.test(x), "evaluated outside the box: {x}");
                Array::from_slice(&[x[0] - 3.0, x[1] + 1.0])
            }
        }
        let c = BoundaryConstraint::new(vec![0.0, 0.0], vec![2.0, 5.0]).unwrap();
        let result = Simplex::default()
            .minimize(
                &Checked(&c),
                &c,
                &Array::from_slice(&[1.0, 1.0]),
                &EndCriteria::default(),
            )
            .unwrap();
        assert!((result.x[0] - 2.0).abs() < 1e-6);
        assert!(result.x[1].abs() < 1e-6);
    }

    #[test]
    fn iteration_limit_is_reported() {
        let ec = EndCriteria::default().with_max_iterations(3);
        let result = Simplex::default()
            .minimize(&Rosenbrock, &NoConstraint, &Array::from_slice(&[-1.0, 1.0]), &ec)
            .unwrap();
        assert_eq!(result.end_type, EndCriteriaType::MaxIterations);
        assert_eq!(result.iterations, 3);
    }
}
