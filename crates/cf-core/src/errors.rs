//! Error types for curvefit-rs.
//!
//! Setup and structural problems (conflicting parameter declarations, data
//! series that do not match any model, malformed inputs) are reported through
//! a single `thiserror`-derived enum.  Numerical failures of a fit are *not*
//! errors: they are carried as data inside the fit result.  The `ensure!`
//! and `fail!` convenience macros cover the common precondition / runtime
//! failure cases.

use thiserror::Error;

/// The top-level error type used throughout curvefit-rs.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// General runtime error.
    #[error("{0}")]
    Runtime(String),

    /// Precondition violated.
    #[error("precondition not satisfied: {0}")]
    Precondition(String),

    /// Invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The same parameter name was declared with incompatible bounds or
    /// fixed state.
    #[error("conflicting declarations for parameter '{name}': {reason}")]
    ConflictingParameter {
        /// The parameter name.
        name: String,
        /// What differed between the declarations.
        reason: String,
    },

    /// A data series has no model of the same name, or a model has no data.
    #[error("data/model mismatch: {0}")]
    DataModelMismatch(String),

    /// Two sequences that must agree in length do not.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch {
        /// The required length.
        expected: usize,
        /// The length actually supplied.
        found: usize,
    },

    /// A fit method name could not be recognised.
    #[error("unknown fit method '{0}'")]
    UnknownFitMethod(String),
}

/// Shorthand `Result` type used throughout curvefit-rs.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Returns `Err(Error::Precondition(...))` if `$cond` is false.
///
/// # Example
/// ```
/// use cf_core::{ensure, errors::Error};
/// fn positive(x: f64) -> cf_core::errors::Result<f64> {
///     ensure!(x > 0.0, "x must be positive, got {x}");
///     Ok(x)
/// }
/// assert!(positive(1.0).is_ok());
/// assert!(positive(-1.0).is_err());
/// ```
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $($msg:tt)*) => {
        if !$cond {
            return Err($crate::errors::Error::Precondition(
                format!($($msg)*)
            ));
        }
    };
}

/// Returns `Err(Error::Runtime(...))` immediately.
///
/// # Example
/// ```
/// use cf_core::{fail, errors::Error};
/// fn always_err() -> cf_core::errors::Result<()> {
///     fail!("something went wrong");
/// }
/// assert!(always_err().is_err());
/// ```
#[macro_export]
macro_rules! fail {
    ($($msg:tt)*) => {
        return Err($crate::errors::Error::Runtime(format!($($msg)*)))
    };
}
