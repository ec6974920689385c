//! Values with correlated uncertainties.
//!
//! A [`CorrelatedValue`] is a nominal value plus its first-order
//! sensitivities to one or more [`CovarianceContext`]s. All parameters of
//! one fit point into the same context, so
//!
//! ```text
//! var(f) = Σ_ctx  gᵀ · Σ_ctx · g
//! ```
//!
//! keeps every correlation between them. A context without a covariance
//! matrix makes every value that depends on it NaN-uncertain.

use crate::executor::RawFitOutcome;
use crate::parameters::ParameterSet;
use cf_core::{
    errors::{Error, Result},
    utilities::format_with_uncertainty,
    Real,
};
use cf_math::Matrix;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// A covariance matrix shared by a group of values.
#[derive(Debug)]
pub struct CovarianceContext {
    id: u64,
    names: Vec<String>,
    covariance: Option<Matrix>,
}

impl CovarianceContext {
    /// New context over `names`; `covariance` must be `n × n` if present.
    pub fn new(names: Vec<String>, covariance: Option<Matrix>) -> Result<Arc<Self>> {
        if let Some(c) = &covariance {
            let n = names.len();
            if c.rows() != n || c.cols() != n {
                return Err(Error::DimensionMismatch {
                    expected: n,
                    found: if c.rows() != n { c.rows() } else { c.cols() },
                });
            }
        }
        Ok(Arc::new(Self {
            id: NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed),
            names,
            covariance,
        }))
    }

    /// Unique id of this context.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Variable names, in covariance index order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// The covariance matrix, if one is known.
    pub fn covariance(&self) -> Option<&Matrix> {
        self.covariance.as_ref()
    }

    /// Number of variables.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// `true` for a context over no variables.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// `aᵀ Σ b`; NaN without a covariance.
    fn bilinear(&self, a: &[Real], b: &[Real]) -> Real {
        let Some(c) = &self.covariance else {
            return Real::NAN;
        };
        let mut sum = 0.0;
        for (i, &ai) in a.iter().enumerate() {
            if ai == 0.0 {
                continue;
            }
            for (j, &bj) in b.iter().enumerate() {
                if bj != 0.0 {
                    sum += ai * c[(i, j)] * bj;
                }
            }
        }
        sum
    }
}

#[derive(Debug, Clone)]
struct Term {
    context: Arc<CovarianceContext>,
    sensitivities: Vec<Real>,
}

/// A number with a first-order, correlation-aware uncertainty.
#[derive(Debug, Clone)]
pub struct CorrelatedValue {
    nominal: Real,
    terms: Vec<Term>,
}

impl CorrelatedValue {
    /// A value without uncertainty.
    pub fn exact(nominal: Real) -> Self {
        Self {
            nominal,
            terms: Vec::new(),
        }
    }

    /// A value with standard deviation `std_dev`, uncorrelated with
    /// everything else.
    pub fn independent(nominal: Real, std_dev: Real) -> Self {
        let covariance = Matrix::from_diagonal(&[std_dev * std_dev]);
        let context = Arc::new(CovarianceContext {
            id: NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed),
            names: vec![String::new()],
            covariance: Some(covariance),
        });
        Self {
            nominal,
            terms: vec![Term {
                context,
                sensitivities: vec![1.0],
            }],
        }
    }

    /// Variable `index` of `context`, with nominal value `nominal`.
    pub fn from_context(
        context: &Arc<CovarianceContext>,
        index: usize,
        nominal: Real,
    ) -> Result<Self> {
        if index >= context.len() {
            return Err(Error::InvalidArgument(format!(
                "index {index} out of range for a context of {} variables",
                context.len()
            )));
        }
        let mut sensitivities = vec![0.0; context.len()];
        sensitivities[index] = 1.0;
        Ok(Self {
            nominal,
            terms: vec![Term {
                context: Arc::clone(context),
                sensitivities,
            }],
        })
    }

    /// Nominal value.
    pub fn nominal(&self) -> Real {
        self.nominal
    }

    /// Variance; NaN when any context it depends on lacks a covariance.
    pub fn variance(&self) -> Real {
        self.terms
            .iter()
            .map(|t| t.context.bilinear(&t.sensitivities, &t.sensitivities))
            .sum()
    }

    /// Standard deviation.
    pub fn std_dev(&self) -> Real {
        let variance = self.variance();
        if variance < 0.0 {
            0.0
        } else {
            variance.sqrt()
        }
    }

    /// `true` when the uncertainty is exactly zero.
    pub fn is_exact(&self) -> bool {
        self.terms.is_empty()
    }

    /// Whether the two values depend on a common covariance context.
    pub fn shares_context(&self, other: &CorrelatedValue) -> bool {
        self.terms
            .iter()
            .any(|a| other.terms.iter().any(|b| a.context.id == b.context.id))
    }

    /// Covariance between two values.
    pub fn covariance_with(&self, other: &CorrelatedValue) -> Real {
        let mut sum = 0.0;
        for a in &self.terms {
            for b in &other.terms {
                if a.context.id == b.context.id {
                    sum += a.context.bilinear(&a.sensitivities, &b.sensitivities);
                }
            }
        }
        sum
    }

    /// Correlation coefficient between two values; NaN when either is exact.
    pub fn correlation_with(&self, other: &CorrelatedValue) -> Real {
        let denom = self.std_dev() * other.std_dev();
        if denom == 0.0 {
            return Real::NAN;
        }
        self.covariance_with(other) / denom
    }

    /// `self + other`.
    pub fn sum(&self, other: &CorrelatedValue) -> CorrelatedValue {
        linear_combination(self.nominal + other.nominal, &[(self, 1.0), (other, 1.0)])
    }

    /// `self − other`.
    pub fn difference(&self, other: &CorrelatedValue) -> CorrelatedValue {
        linear_combination(self.nominal - other.nominal, &[(self, 1.0), (other, -1.0)])
    }

    /// `self · other`.
    pub fn product(&self, other: &CorrelatedValue) -> CorrelatedValue {
        linear_combination(
            self.nominal * other.nominal,
            &[(self, other.nominal), (other, self.nominal)],
        )
    }

    /// `self / other`.
    pub fn ratio(&self, other: &CorrelatedValue) -> CorrelatedValue {
        let b = other.nominal;
        linear_combination(
            self.nominal / b,
            &[(self, 1.0 / b), (other, -self.nominal / (b * b))],
        )
    }

    /// `factor · self`.
    pub fn scaled(&self, factor: Real) -> CorrelatedValue {
        linear_combination(self.nominal * factor, &[(self, factor)])
    }
}

impl fmt::Display for CorrelatedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = f.precision().unwrap_or(6);
        f.write_str(&format_with_uncertainty(self.nominal, self.std_dev(), digits))
    }
}

fn linear_combination(nominal: Real, parts: &[(&CorrelatedValue, Real)]) -> CorrelatedValue {
    let mut terms: Vec<Term> = Vec::new();
    for (value, coefficient) in parts {
        for t in &value.terms {
            match terms.iter_mut().find(|u| u.context.id == t.context.id) {
                Some(u) => {
                    for (s, v) in u.sensitivities.iter_mut().zip(&t.sensitivities) {
                        *s += coefficient * v;
                    }
                }
                None => terms.push(Term {
                    context: Arc::clone(&t.context),
                    sensitivities: t.sensitivities.iter().map(|v| coefficient * v).collect(),
                }),
            }
        }
    }
    CorrelatedValue { nominal, terms }
}

/// First-order propagation of `inputs` through `f`.
///
/// The gradient of `f` at the nominal inputs comes from central
/// differences; the result carries `σ² = gᵀ Σ g` over the joint covariance
/// of the inputs.
pub fn propagate_values<F>(inputs: &[CorrelatedValue], f: F) -> CorrelatedValue
where
    F: Fn(&[Real]) -> Real,
{
    let x: Vec<Real> = inputs.iter().map(CorrelatedValue::nominal).collect();
    let nominal = f(&x);
    let step = f64::EPSILON.cbrt();
    let mut probe = x.clone();
    let gradient: Vec<Real> = (0..x.len())
        .map(|i| {
            let h = step * x[i].abs().max(1.0);
            probe[i] = x[i] + h;
            let up = f(&probe);
            probe[i] = x[i] - h;
            let down = f(&probe);
            probe[i] = x[i];
            (up - down) / (2.0 * h)
        })
        .collect();
    let parts: Vec<(&CorrelatedValue, Real)> = inputs.iter().zip(gradient).collect();
    linear_combination(nominal, &parts)
}

/// Attach correlated uncertainties to the parameters of a finished fit.
///
/// Free parameters share one context over the outcome's covariance; fixed
/// parameters are exact. Parameters come back in declaration order.
pub fn propagate(
    outcome: &RawFitOutcome,
    parameters: &ParameterSet,
) -> Result<Vec<(String, CorrelatedValue)>> {
    if outcome.full_values.len() != parameters.len() {
        return Err(Error::DimensionMismatch {
            expected: parameters.len(),
            found: outcome.full_values.len(),
        });
    }
    let context = CovarianceContext::new(parameters.resolve(), outcome.covariance.clone())?;
    let mut free_index = 0;
    let mut values = Vec::with_capacity(parameters.len());
    for (p, &v) in parameters.iter().zip(&outcome.full_values) {
        let value = if p.is_fixed() {
            CorrelatedValue::exact(v)
        } else {
            let value = CorrelatedValue::from_context(&context, free_index, v)?;
            free_index += 1;
            value
        };
        values.push((p.name().to_string(), value));
    }
    Ok(values)
}
