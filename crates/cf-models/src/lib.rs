//! # cf-models
//!
//! Parametric curve models for curvefit-rs: the [`Model`] type, a small
//! library of standard shapes, and the DRAG builder that generates one curve
//! per repetition count at call time.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod drag;
pub mod library;
pub mod model;

pub use drag::DragModelBuilder;
pub use model::{Model, ModelFn};
