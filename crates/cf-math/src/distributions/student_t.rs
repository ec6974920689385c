//! Student's t-distribution.
//!
//! Wraps the `statrs` crate's Student-t implementation.

use cf_core::{
    errors::{Error, Result},
    Real,
};
use statrs::distribution::{Continuous, ContinuousCDF, StudentsT};

/// Standard Student's t-distribution with `df` degrees of freedom.
#[derive(Debug, Clone)]
pub struct StudentTDistribution {
    dist: StudentsT,
    df: Real,
}

impl StudentTDistribution {
    /// Create a Student-t distribution with the given degrees of freedom.
    ///
    /// Fails with `Error::InvalidArgument` unless `df` is finite and positive.
    pub fn new(df: Real) -> Result<Self> {
        if !(df.is_finite() && df > 0.0) {
            return Err(Error::InvalidArgument(format!(
                "degrees of freedom must be positive, got {df}"
            )));
        }
        // location 0, scale 1
        let dist = StudentsT::new(0.0, 1.0, df)
            .map_err(|e| Error::InvalidArgument(format!("student-t({df}): {e}")))?;
        Ok(Self { dist, df })
    }

    /// Degrees of freedom.
    pub fn df(&self) -> Real {
        self.df
    }

    /// Probability density function.
    pub fn pdf(&self, x: Real) -> Real {
        self.dist.pdf(x)
    }

    /// Cumulative distribution function P(T ≤ x).
    pub fn cdf(&self, x: Real) -> Real {
        self.dist.cdf(x)
    }

    /// Inverse CDF (quantile function). Returns NaN for `p` outside `[0, 1]`.
    pub fn inverse_cdf(&self, p: Real) -> Real {
        if !(0.0..=1.0).contains(&p) {
            return Real::NAN;
        }
        self.dist.inverse_cdf(p)
    }

    /// Two-sided critical value `t*` with `P(|T| ≤ t*) = level`.
    ///
    /// Returns NaN unless `0 < level < 1`.
    pub fn two_sided_critical(&self, level: Real) -> Real {
        if !(level > 0.0 && level < 1.0) {
            return Real::NAN;
        }
        self.inverse_cdf(0.5 + 0.5 * level)
    }
}
