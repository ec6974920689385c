//! Measured data series.

use cf_core::{
    errors::{Error, Result},
    Real,
};

/// An ordered sequence of `(x, y, weight)` points for one curve.
///
/// The name pairs the series with the model of the same name. Weights
/// multiply the residuals, so a standard error `σ` corresponds to a weight
/// of `1/σ`. A series without weights uses unit weight for every point.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DataSeries {
    name: String,
    x: Vec<Real>,
    y: Vec<Real>,
    weights: Option<Vec<Real>>,
}

impl DataSeries {
    /// Unweighted series.
    pub fn new(name: impl Into<String>, x: Vec<Real>, y: Vec<Real>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::InvalidArgument("data series name must not be empty".into()));
        }
        if x.len() != y.len() {
            return Err(Error::DimensionMismatch {
                expected: x.len(),
                found: y.len(),
            });
        }
        Ok(Self {
            name,
            x,
            y,
            weights: None,
        })
    }

    /// Weighted series; weights must be finite and non-negative.
    pub fn with_weights(
        name: impl Into<String>,
        x: Vec<Real>,
        y: Vec<Real>,
        weights: Vec<Real>,
    ) -> Result<Self> {
        let mut series = Self::new(name, x, y)?;
        if weights.len() != series.x.len() {
            return Err(Error::DimensionMismatch {
                expected: series.x.len(),
                found: weights.len(),
            });
        }
        if let Some(w) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
            return Err(Error::InvalidArgument(format!(
                "weights of '{}' must be finite and non-negative, got {w}",
                series.name
            )));
        }
        series.weights = Some(weights);
        Ok(series)
    }

    /// Series with per-point standard errors, converted to weights `1/σ`.
    pub fn with_sigma(
        name: impl Into<String>,
        x: Vec<Real>,
        y: Vec<Real>,
        sigma: Vec<Real>,
    ) -> Result<Self> {
        let name = name.into();
        if let Some(s) = sigma.iter().find(|s| !s.is_finite() || **s <= 0.0) {
            return Err(Error::InvalidArgument(format!(
                "standard errors of '{name}' must be finite and positive, got {s}"
            )));
        }
        let weights = sigma.iter().map(|s| 1.0 / s).collect();
        Self::with_weights(name, x, y, weights)
    }

    /// Curve name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Independent variable.
    pub fn x(&self) -> &[Real] {
        &self.x
    }

    /// Measured values.
    pub fn y(&self) -> &[Real] {
        &self.y
    }

    /// Per-point weights, if any were supplied.
    pub fn weights(&self) -> Option<&[Real]> {
        self.weights.as_deref()
    }

    /// Weight of point `i` (1 when the series is unweighted).
    pub fn weight(&self, i: usize) -> Real {
        self.weights.as_ref().map_or(1.0, |w| w[i])
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// `true` when the series has no points.
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Iterate over `(x, y, weight)` triples.
    pub fn points(&self) -> impl Iterator<Item = (Real, Real, Option<Real>)> + '_ {
        self.x
            .iter()
            .zip(self.y.iter())
            .enumerate()
            .map(move |(i, (&x, &y))| (x, y, self.weights.as_ref().map(|w| w[i])))
    }
}
