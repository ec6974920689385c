//! Standard curve shapes.
//!
//! Each constructor takes the curve name and an optional prefix that is
//! prepended to every parameter name, so two instances of the same shape
//! can either share parameters (same prefix) or stay independent.

use crate::model::Model;
use cf_core::{errors::Result, Real};
use std::f64::consts::TAU;

fn named(prefix: Option<&str>, base: &str) -> String {
    format!("{}{base}", prefix.unwrap_or(""))
}

/// `slope · x + intercept`.
pub fn linear(name: &str, prefix: Option<&str>) -> Result<Model> {
    Model::new(
        name,
        [named(prefix, "slope"), named(prefix, "intercept")],
        |x, p| p[0] * x + p[1],
    )
}

/// `amp · exp(−x / tau) + base`, with `tau > 0`.
pub fn exponential_decay(name: &str, prefix: Option<&str>) -> Result<Model> {
    let tau = named(prefix, "tau");
    let base = named(prefix, "base");
    Model::new(
        name,
        [named(prefix, "amp"), tau.clone(), base.clone()],
        |x, p| p[0] * (-x / p[1]).exp() + p[2],
    )?
    .with_bounds(&tau, Real::MIN_POSITIVE, Real::INFINITY)?
    .with_default(&base, 0.0)
}

/// `amp · cos(2π · freq · x + phase) + base`, with `freq ≥ 0`.
pub fn cosine(name: &str, prefix: Option<&str>) -> Result<Model> {
    let freq = named(prefix, "freq");
    let phase = named(prefix, "phase");
    Model::new(
        name,
        [named(prefix, "amp"), freq.clone(), phase.clone(), named(prefix, "base")],
        |x, p| p[0] * (TAU * p[1] * x + p[2]).cos() + p[3],
    )?
    .with_bounds(&freq, 0.0, Real::INFINITY)?
    .with_default(&phase, 0.0)
}

/// `amp · exp(−(x − x0)² / (2 sigma²)) + base`, with `sigma > 0`.
pub fn gaussian(name: &str, prefix: Option<&str>) -> Result<Model> {
    let sigma = named(prefix, "sigma");
    let base = named(prefix, "base");
    Model::new(
        name,
        [named(prefix, "amp"), named(prefix, "x0"), sigma.clone(), base.clone()],
        |x, p| {
            let z = (x - p[1]) / p[2];
            p[0] * (-0.5 * z * z).exp() + p[3]
        },
    )?
    .with_bounds(&sigma, Real::MIN_POSITIVE, Real::INFINITY)?
    .with_default(&base, 0.0)
}
