//! Dynamic multi-curve model generation for DRAG calibration.
//!
//! A DRAG sweep measures the same oscillation for several pulse repetition
//! counts `n`. Curve `n` is
//!
//! ```text
//! y = amp · cos(2π · n · freq · (x − beta)) + base
//! ```
//!
//! and every curve shares `freq`, `beta` and `base`. The amplitude is shared
//! too unless per-curve amplitudes are requested, in which case curve `n`
//! reads `amp_nrep=<n>`. The number of curves is decided at call time.

use crate::model::Model;
use cf_core::{
    errors::{Error, Result},
    Real,
};
use std::f64::consts::TAU;

/// Repetition counts used when none are given.
pub const DEFAULT_REPS: [u32; 3] = [3, 5, 7];

/// Builds one DRAG model per repetition count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragModelBuilder {
    reps: Vec<u32>,
    per_curve_amplitude: bool,
}

impl DragModelBuilder {
    /// Builder for the given repetition counts, in curve order.
    pub fn new(reps: impl IntoIterator<Item = u32>) -> Self {
        Self {
            reps: reps.into_iter().collect(),
            per_curve_amplitude: false,
        }
    }

    /// Give every curve its own amplitude parameter `amp_nrep=<n>`.
    pub fn with_per_curve_amplitude(mut self, per_curve: bool) -> Self {
        self.per_curve_amplitude = per_curve;
        self
    }

    /// Repetition counts in curve order.
    pub fn reps(&self) -> &[u32] {
        &self.reps
    }

    /// Curve name for repetition count `n`.
    pub fn curve_name(n: u32) -> String {
        format!("nrep={n}")
    }

    /// Amplitude parameter name for curve `n` under the current settings.
    pub fn amplitude_name(&self, n: u32) -> String {
        if self.per_curve_amplitude {
            format!("amp_{}", Self::curve_name(n))
        } else {
            "amp".to_string()
        }
    }

    /// Build the models.
    ///
    /// Fails with `Error::InvalidArgument` when no repetition counts were
    /// given, a count is zero, or a count is repeated.
    pub fn build(&self) -> Result<Vec<Model>> {
        if self.reps.is_empty() {
            return Err(Error::InvalidArgument(
                "at least one repetition count is required".into(),
            ));
        }
        let mut models = Vec::with_capacity(self.reps.len());
        for (i, &n) in self.reps.iter().enumerate() {
            if n == 0 {
                return Err(Error::InvalidArgument("repetition counts must be positive".into()));
            }
            if self.reps[..i].contains(&n) {
                return Err(Error::InvalidArgument(format!(
                    "repetition count {n} given twice"
                )));
            }
            let reps = Real::from(n);
            let model = Model::new(
                Self::curve_name(n),
                [self.amplitude_name(n), "freq".into(), "beta".into(), "base".into()],
                move |x, p| p[0] * (TAU * reps * p[1] * (x - p[2])).cos() + p[3],
            )?
            .with_bounds("freq", 0.0, Real::INFINITY)?;
            models.push(model);
        }
        Ok(models)
    }
}

impl Default for DragModelBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_REPS)
    }
}
