//! # cf-math
//!
//! Numerical building blocks for curvefit-rs: array and matrix newtypes over
//! nalgebra, covariance helpers, χ² and Student-t distributions (via statrs)
//! and bounded least-squares optimizers.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// ── Modules ───────────────────────────────────────────────────────────────────

/// `Array` newtype over `nalgebra::DVector`.
pub mod array;

/// Floating-point comparison utilities.
pub mod comparison;

/// Probability distributions.
pub mod distributions;

/// `Matrix` newtype over `nalgebra::DMatrix`.
pub mod matrix;

/// Decompositions, SPD inversion and covariance helpers.
pub mod matrix_utilities;

/// Cost functions, constraints, end criteria and optimizers.
pub mod optimization;

// ── Convenience re-exports ────────────────────────────────────────────────────

pub use array::Array;
pub use comparison::{relative_change, same_value};
pub use distributions::{ChiSquareDistribution, StudentTDistribution};
pub use matrix::Matrix;
