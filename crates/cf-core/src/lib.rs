//! # cf-core
//!
//! Core types and error definitions for curvefit-rs.
//!
//! This crate provides the foundational building blocks shared across all
//! other crates in the workspace: numeric type aliases, the error hierarchy
//! with its `ensure!` / `fail!` macros, and report formatting helpers.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// ── Public modules ───────────────────────────────────────────────────────────

/// Error types and the `ensure!` / `fail!` macros.
pub mod errors;

/// Miscellaneous utilities.
pub mod utilities;

// ── Primitive type aliases ────────────────────────────────────────────────────

/// Floating-point type used throughout the library.
pub type Real = f64;

/// Alias used for array sizes / indices.
pub type Size = usize;

// ── Re-exports for convenience ────────────────────────────────────────────────

pub use errors::{Error, Result};
