//! The shared parameter registry.
//!
//! Parameters are keyed by name. Declaring a name a second time merges with
//! the first declaration when bounds and fixed state agree, and is rejected
//! otherwise. Declaration order is preserved; the free parameters in that
//! order define the optimizer vector and the covariance matrix indices.

use cf_core::{
    errors::{Error, Result},
    Real, Size,
};
use cf_math::comparison::same_value;
use std::collections::HashMap;

/// One named fit parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    name: String,
    initial: Real,
    lower: Real,
    upper: Real,
    fixed: bool,
}

impl Parameter {
    /// Parameter name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Starting value (the held value when fixed).
    pub fn initial(&self) -> Real {
        self.initial
    }

    /// Lower bound (may be `-inf`).
    pub fn lower(&self) -> Real {
        self.lower
    }

    /// Upper bound (may be `+inf`).
    pub fn upper(&self) -> Real {
        self.upper
    }

    /// `(lower, upper)`.
    pub fn bounds(&self) -> (Real, Real) {
        (self.lower, self.upper)
    }

    /// Whether the parameter is held at its initial value.
    pub fn is_fixed(&self) -> bool {
        self.fixed
    }

    /// Whether at least one bound is finite.
    pub fn is_bounded(&self) -> bool {
        self.lower.is_finite() || self.upper.is_finite()
    }
}

/// Ordered, name-keyed registry of fit parameters.
#[derive(Debug, Clone, Default)]
pub struct ParameterSet {
    params: Vec<Parameter>,
    index: HashMap<String, usize>,
}

impl ParameterSet {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name`, or merge with an earlier declaration of it.
    ///
    /// A repeated declaration must agree on bounds and fixed state (and, for
    /// fixed parameters, on the held value); otherwise
    /// `Error::ConflictingParameter` is returned. On a successful merge the
    /// first initial value is kept.
    pub fn declare(
        &mut self,
        name: &str,
        initial: Real,
        lower: Real,
        upper: Real,
        fixed: bool,
    ) -> Result<()> {
        if name.is_empty() {
            return Err(Error::InvalidArgument("parameter name must not be empty".into()));
        }
        if !initial.is_finite() {
            return Err(Error::InvalidArgument(format!(
                "initial value of '{name}' must be finite, got {initial}"
            )));
        }
        if lower.is_nan() || upper.is_nan() || lower > upper {
            return Err(Error::InvalidArgument(format!(
                "invalid bounds [{lower}, {upper}] for '{name}'"
            )));
        }
        if initial < lower || initial > upper {
            return Err(Error::InvalidArgument(format!(
                "initial value {initial} of '{name}' is outside [{lower}, {upper}]"
            )));
        }

        if let Some(&i) = self.index.get(name) {
            let existing = &self.params[i];
            let conflict = |reason: String| Error::ConflictingParameter {
                name: name.to_string(),
                reason,
            };
            if !same_value(existing.lower, lower) {
                return Err(conflict(format!(
                    "lower bound {} vs {lower}",
                    existing.lower
                )));
            }
            if !same_value(existing.upper, upper) {
                return Err(conflict(format!(
                    "upper bound {} vs {upper}",
                    existing.upper
                )));
            }
            if existing.fixed != fixed {
                return Err(conflict(format!(
                    "fixed {} vs {fixed}",
                    existing.fixed
                )));
            }
            if fixed && !same_value(existing.initial, initial) {
                return Err(conflict(format!(
                    "fixed at {} vs {initial}",
                    existing.initial
                )));
            }
            return Ok(());
        }

        self.index.insert(name.to_string(), self.params.len());
        self.params.push(Parameter {
            name: name.to_string(),
            initial,
            lower,
            upper,
            fixed,
        });
        Ok(())
    }

    /// Declare an unbounded free parameter.
    pub fn declare_free(&mut self, name: &str, initial: Real) -> Result<()> {
        self.declare(name, initial, Real::NEG_INFINITY, Real::INFINITY, false)
    }

    /// Declare a parameter held at `value`.
    pub fn declare_fixed(&mut self, name: &str, value: Real) -> Result<()> {
        self.declare(name, value, Real::NEG_INFINITY, Real::INFINITY, true)
    }

    /// Free parameter names in first-declaration order.
    pub fn resolve(&self) -> Vec<String> {
        self.free().map(|p| p.name.clone()).collect()
    }

    /// Number of declared parameters.
    pub fn len(&self) -> Size {
        self.params.len()
    }

    /// `true` when nothing has been declared.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Number of free parameters.
    pub fn free_count(&self) -> Size {
        self.free().count()
    }

    /// Look a parameter up by name.
    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.index.get(name).map(|&i| &self.params[i])
    }

    /// Position of `name` among all parameters.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Position of `name` among the free parameters.
    pub fn free_index_of(&self, name: &str) -> Option<usize> {
        self.free().position(|p| p.name == name)
    }

    /// All parameters in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter()
    }

    fn free(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter().filter(|p| !p.fixed)
    }

    /// Initial values of every parameter in declaration order.
    pub fn initial_values(&self) -> Vec<Real> {
        self.params.iter().map(|p| p.initial).collect()
    }

    /// Initial values of the free parameters in declaration order.
    pub fn free_initial_values(&self) -> Vec<Real> {
        self.free().map(|p| p.initial).collect()
    }

    /// `(lower, upper)` bound vectors of the free parameters.
    pub fn free_bounds(&self) -> (Vec<Real>, Vec<Real>) {
        self.free().map(|p| (p.lower, p.upper)).unzip()
    }

    /// Expand a free-parameter vector into a full one; fixed parameters take
    /// their held values.
    pub fn expand(&self, free: &[Real]) -> Result<Vec<Real>> {
        let n_free = self.free_count();
        if free.len() != n_free {
            return Err(Error::DimensionMismatch {
                expected: n_free,
                found: free.len(),
            });
        }
        Ok(self.expand_unchecked(free))
    }

    pub(crate) fn expand_unchecked(&self, free: &[Real]) -> Vec<Real> {
        let mut values = free.iter();
        self.params
            .iter()
            .map(|p| {
                if p.fixed {
                    p.initial
                } else {
                    values.next().copied().unwrap_or(Real::NAN)
                }
            })
            .collect()
    }
}
