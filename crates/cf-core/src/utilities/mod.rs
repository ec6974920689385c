//! Miscellaneous utilities.

pub mod data_formatters;

pub use data_formatters::{format_general, format_relative_uncertainty, format_with_uncertainty};
