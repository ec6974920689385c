//! Matrix decompositions and covariance helpers.
//!
//! Wraps nalgebra's Cholesky and SVD factorizations into the operations the
//! fitter needs: inverting a normal matrix `JᵀJ` when it is positive
//! definite, the numerical rank used to diagnose a singular one, and
//! splitting a covariance matrix into standard deviations and correlations.

use crate::array::Array;
use crate::matrix::Matrix;
use cf_core::{
    errors::{Error, Result},
    Real,
};

/// Smallest Cholesky pivot of the unit-diagonal rescaled matrix that still
/// counts as full rank. A pivot `p` means the column is at angle `asin(p)`
/// from the span of the columns before it.
pub const MIN_SCALED_PIVOT: Real = 1e-5;

/// Inverse of a symmetric positive-definite matrix via Cholesky.
///
/// The matrix is first rescaled to a unit diagonal, `S = D⁻¹ᐟ² A D⁻¹ᐟ²`, so
/// the rank test does not depend on the units of each coordinate. Returns
/// `None` when the matrix is not square, contains non-finite entries, has a
/// non-positive diagonal entry, or when a pivot of `S` falls below
/// [`MIN_SCALED_PIVOT`]. A `0 × 0` matrix inverts to itself.
pub fn spd_inverse(m: &Matrix) -> Option<Matrix> {
    if !m.is_square() || !m.is_finite() {
        return None;
    }
    let n = m.rows();
    if n == 0 {
        return Some(Matrix::zeros(0, 0));
    }
    let mut d = Vec::with_capacity(n);
    for i in 0..n {
        let a = m[(i, i)];
        if a <= 0.0 {
            return None;
        }
        d.push(a.sqrt().recip());
    }

    let mut scaled = m.inner().clone();
    for i in 0..n {
        for j in 0..n {
            scaled[(i, j)] *= d[i] * d[j];
        }
    }
    let chol = scaled.cholesky()?;
    let l = chol.l();
    if (0..n).any(|i| l[(i, i)].is_nan() || l[(i, i)] < MIN_SCALED_PIVOT) {
        return None;
    }

    let mut inv = chol.inverse();
    for i in 0..n {
        for j in 0..n {
            inv[(i, j)] *= d[i] * d[j];
        }
    }
    if inv.iter().all(|v| v.is_finite()) {
        Some(Matrix::from(inv))
    } else {
        None
    }
}

/// Singular values in descending order.
pub fn singular_values(m: &Matrix) -> Array {
    Array::from(m.inner().clone().singular_values())
}

/// Rank of a matrix (number of singular values above `tolerance`).
pub fn rank(m: &Matrix, tolerance: Real) -> usize {
    singular_values(m).iter().filter(|&&s| s > tolerance).count()
}

/// Extract standard deviations and a correlation matrix from a covariance
/// matrix.
///
/// `σᵢ = √Cᵢᵢ` and `ρᵢⱼ = Cᵢⱼ / (σᵢ σⱼ)`; entries whose denominator is zero
/// are reported as NaN off the diagonal.
pub fn covariance_decompose(covariance: &Matrix) -> Result<(Array, Matrix)> {
    let n = covariance.rows();
    if covariance.cols() != n {
        return Err(Error::InvalidArgument(
            "covariance matrix must be square".into(),
        ));
    }

    let mut stds = vec![0.0; n];
    for (i, s) in stds.iter_mut().enumerate() {
        let var = covariance[(i, i)];
        if var < 0.0 {
            return Err(Error::InvalidArgument(format!(
                "negative variance at index {i}: {var}"
            )));
        }
        *s = var.sqrt();
    }

    let mut corr = Matrix::identity(n);
    for i in 0..n {
        for j in (i + 1)..n {
            let denom = stds[i] * stds[j];
            let rho = if denom > 0.0 {
                covariance[(i, j)] / denom
            } else {
                Real::NAN
            };
            corr[(i, j)] = rho;
            corr[(j, i)] = rho;
        }
    }

    Ok((Array::from_vec(stds), corr))
}
