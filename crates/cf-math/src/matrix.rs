//! `Matrix`: a two-dimensional matrix of reals.
//!
//! A thin newtype around `nalgebra::DMatrix<f64>`. Jacobians, normal
//! matrices and covariance matrices all travel through this type.

use crate::array::Array;
use cf_core::Real;
use nalgebra::DMatrix;
use std::ops::{Add, Index, IndexMut, Mul, Sub};

/// A dynamically-sized 2D matrix of `Real` values.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix(DMatrix<Real>);

impl Matrix {
    /// Create a zero-filled `rows × cols` matrix.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self(DMatrix::zeros(rows, cols))
    }

    /// Create an identity matrix of size `n × n`.
    pub fn identity(n: usize) -> Self {
        Self(DMatrix::identity(n, n))
    }

    /// Create from a row-major data slice.
    pub fn from_row_slice(rows: usize, cols: usize, data: &[Real]) -> Self {
        Self(DMatrix::from_row_slice(rows, cols, data))
    }

    /// Create a diagonal matrix from the given entries.
    pub fn from_diagonal(diag: &[Real]) -> Self {
        let n = diag.len();
        let mut m = DMatrix::zeros(n, n);
        for (i, &d) in diag.iter().enumerate() {
            m[(i, i)] = d;
        }
        Self(m)
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.0.nrows()
    }

    /// Number of columns.
    pub fn cols(&self) -> usize {
        self.0.ncols()
    }

    /// Return `true` if the matrix is square.
    pub fn is_square(&self) -> bool {
        self.0.nrows() == self.0.ncols()
    }

    /// `true` when every element is finite.
    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }

    /// Borrow the inner `DMatrix`.
    pub fn inner(&self) -> &DMatrix<Real> {
        &self.0
    }

    /// Transpose.
    pub fn transpose(&self) -> Self {
        Self(self.0.transpose())
    }

    /// Inverse (returns `None` if the matrix is singular or not square).
    pub fn try_inverse(&self) -> Option<Self> {
        self.0.clone().try_inverse().map(Self)
    }

    /// Diagonal elements as an `Array`.
    pub fn diagonal(&self) -> Array {
        let n = self.0.nrows().min(self.0.ncols());
        let data: Vec<Real> = (0..n).map(|i| self.0[(i, i)]).collect();
        Array::from_vec(data)
    }

    /// Extract a row as an `Array`.
    pub fn row(&self, i: usize) -> Array {
        Array::from_vec(self.0.row(i).iter().copied().collect())
    }

    /// Extract a column as an `Array`.
    pub fn column(&self, j: usize) -> Array {
        Array::from_vec(self.0.column(j).iter().copied().collect())
    }

    /// Matrix-vector product `M * v`.
    pub fn mul_vec(&self, v: &Array) -> Array {
        Array::from(&self.0 * v.inner())
    }

    /// Transposed matrix-vector product `Mᵀ * v`.
    pub fn tr_mul_vec(&self, v: &Array) -> Array {
        Array::from(self.0.tr_mul(v.inner()))
    }

    /// Normal matrix `Mᵀ M` (Gram matrix of the columns).
    pub fn gram(&self) -> Self {
        Self(self.0.tr_mul(&self.0))
    }

    /// Multiply every element by `scalar`.
    pub fn scale(&self, scalar: Real) -> Self {
        Self(&self.0 * scalar)
    }

    /// Quadratic form `vᵀ M v`.
    pub fn quadratic_form(&self, v: &Array) -> Real {
        v.dot(&self.mul_vec(v))
    }
}

// ── From / Into ───────────────────────────────────────────────────────────────

impl From<DMatrix<Real>> for Matrix {
    fn from(m: DMatrix<Real>) -> Self {
        Self(m)
    }
}

impl From<Matrix> for DMatrix<Real> {
    fn from(m: Matrix) -> Self {
        m.0
    }
}

// ── Indexing ──────────────────────────────────────────────────────────────────

impl Index<(usize, usize)> for Matrix {
    type Output = Real;
    fn index(&self, (i, j): (usize, usize)) -> &Real {
        &self.0[(i, j)]
    }
}

impl IndexMut<(usize, usize)> for Matrix {
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut Real {
        &mut self.0[(i, j)]
    }
}

// ── Arithmetic ────────────────────────────────────────────────────────────────

impl Add for &Matrix {
    type Output = Matrix;
    fn add(self, rhs: &Matrix) -> Matrix {
        Matrix(&self.0 + &rhs.0)
    }
}

impl Sub for &Matrix {
    type Output = Matrix;
    fn sub(self, rhs: &Matrix) -> Matrix {
        Matrix(&self.0 - &rhs.0)
    }
}

impl Mul for &Matrix {
    type Output = Matrix;
    fn mul(self, rhs: &Matrix) -> Matrix {
        Matrix(&self.0 * &rhs.0)
    }
}

impl Mul<Real> for &Matrix {
    type Output = Matrix;
    fn mul(self, rhs: Real) -> Matrix {
        Matrix(&self.0 * rhs)
    }
}

// ── Display ───────────────────────────────────────────────────────────────────

impl std::fmt::Display for Matrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for i in 0..self.rows() {
            write!(f, "| ")?;
            for j in 0..self.cols() {
                if j > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{:>12.6e}", self.0[(i, j)])?;
            }
            writeln!(f, " |")?;
        }
        Ok(())
    }
}
