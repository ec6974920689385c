//! Probability distributions used for goodness-of-fit statistics.
//!
//! Thin wrappers over `statrs`: the χ² distribution gives fit p-values and
//! the Student-t distribution gives parameter confidence intervals.

pub mod chi_square;
pub mod student_t;

pub use chi_square::ChiSquareDistribution;
pub use student_t::StudentTDistribution;
