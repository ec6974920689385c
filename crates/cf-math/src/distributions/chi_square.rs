//! Chi-square distribution.
//!
//! Wraps the `statrs` crate's chi-squared implementation.

use cf_core::{
    errors::{Error, Result},
    Real,
};
use statrs::distribution::{ChiSquared, Continuous, ContinuousCDF};

/// Chi-square distribution with `df` degrees of freedom.
#[derive(Debug, Clone)]
pub struct ChiSquareDistribution {
    dist: ChiSquared,
    df: Real,
}

impl ChiSquareDistribution {
    /// Create a chi-square distribution with the given degrees of freedom.
    ///
    /// Fails with `Error::InvalidArgument` unless `df` is finite and positive.
    pub fn new(df: Real) -> Result<Self> {
        if !(df.is_finite() && df > 0.0) {
            return Err(Error::InvalidArgument(format!(
                "degrees of freedom must be positive, got {df}"
            )));
        }
        let dist = ChiSquared::new(df)
            .map_err(|e| Error::InvalidArgument(format!("chi-square({df}): {e}")))?;
        Ok(Self { dist, df })
    }

    /// Degrees of freedom.
    pub fn df(&self) -> Real {
        self.df
    }

    /// Probability density function.
    pub fn pdf(&self, x: Real) -> Real {
        if x < 0.0 {
            return 0.0;
        }
        self.dist.pdf(x)
    }

    /// Cumulative distribution function P(X ≤ x).
    pub fn cdf(&self, x: Real) -> Real {
        if x <= 0.0 {
            return 0.0;
        }
        self.dist.cdf(x)
    }

    /// Upper-tail probability P(X > x), the p-value of a χ² statistic.
    pub fn survival(&self, x: Real) -> Real {
        if x.is_nan() {
            return Real::NAN;
        }
        if x <= 0.0 {
            return 1.0;
        }
        self.dist.sf(x)
    }

    /// Inverse CDF (quantile function). Returns NaN for `p` outside `[0, 1]`.
    pub fn inverse_cdf(&self, p: Real) -> Real {
        if !(0.0..=1.0).contains(&p) {
            return Real::NAN;
        }
        self.dist.inverse_cdf(p)
    }
}
