//! Joint multi-curve objective.
//!
//! `ModelComposer` pairs every model with the data series of the same name
//! and merges them into one [`JointObjective`]: a map from the free
//! parameter vector to the concatenated weighted residuals, one block per
//! curve in model order. Parameters that several models list by the same
//! name are one shared entry of the [`ParameterSet`].

use crate::data::DataSeries;
use crate::options::Weighting;
use crate::parameters::ParameterSet;
use cf_core::{
    errors::{Error, Result},
    Real, Size,
};
use cf_math::optimization::{forward_difference_jacobian, BoundaryConstraint, CostFunction};
use cf_math::{Array, Matrix};
use cf_models::Model;
use log::debug;
use std::collections::{HashMap, HashSet};
use std::ops::Range;

/// One curve of the joint problem.
#[derive(Debug, Clone)]
struct CurveBlock {
    model: Model,
    x: Vec<Real>,
    y: Vec<Real>,
    weights: Vec<Real>,
    /// For each model parameter, its position in the full parameter vector.
    param_index: Vec<usize>,
    range: Range<usize>,
}

impl CurveBlock {
    fn residuals_into(&self, full: &[Real], scratch: &mut Vec<Real>, out: &mut [Real]) {
        scratch.clear();
        scratch.extend(self.param_index.iter().map(|&i| full[i]));
        for (k, r) in out.iter_mut().enumerate() {
            *r = self.weights[k] * (self.y[k] - self.model.evaluate(self.x[k], scratch));
        }
    }
}

/// Builds joint objectives and parameter sets from models and data.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelComposer;

impl ModelComposer {
    /// Pair `models` with `data` by exact name and build the joint objective.
    ///
    /// Fails with `Error::DataModelMismatch` when names are duplicated or a
    /// model and a data series have no counterpart, and with
    /// `Error::InvalidArgument` when a model parameter is missing from
    /// `parameters` or a free parameter is read by no model.
    pub fn compose(
        models: &[Model],
        data: &[DataSeries],
        parameters: &ParameterSet,
        weighting: Weighting,
    ) -> Result<JointObjective> {
        let mut data_by_name: HashMap<&str, &DataSeries> = HashMap::with_capacity(data.len());
        for series in data {
            if data_by_name.insert(series.name(), series).is_some() {
                return Err(Error::DataModelMismatch(format!(
                    "data series '{}' given more than once",
                    series.name()
                )));
            }
        }
        let mut model_names: HashSet<&str> = HashSet::with_capacity(models.len());
        for model in models {
            if !model_names.insert(model.name()) {
                return Err(Error::DataModelMismatch(format!(
                    "model '{}' given more than once",
                    model.name()
                )));
            }
        }
        for series in data {
            if !model_names.contains(series.name()) {
                return Err(Error::DataModelMismatch(format!(
                    "data series '{}' has no model of the same name",
                    series.name()
                )));
            }
        }

        let mut used = vec![false; parameters.len()];
        let mut curves = Vec::with_capacity(models.len());
        let mut offset = 0;
        for model in models {
            let series = data_by_name.get(model.name()).ok_or_else(|| {
                Error::DataModelMismatch(format!("model '{}' has no data series", model.name()))
            })?;
            let param_index = model
                .parameter_names()
                .iter()
                .map(|p| {
                    parameters.index_of(p).ok_or_else(|| {
                        Error::InvalidArgument(format!(
                            "parameter '{p}' of model '{}' is not declared",
                            model.name()
                        ))
                    })
                })
                .collect::<Result<Vec<usize>>>()?;
            for &i in &param_index {
                used[i] = true;
            }
            let n = series.len();
            let weights = match weighting {
                Weighting::Auto => (0..n).map(|k| series.weight(k)).collect(),
                Weighting::Uniform => vec![1.0; n],
            };
            curves.push(CurveBlock {
                model: model.clone(),
                x: series.x().to_vec(),
                y: series.y().to_vec(),
                weights,
                param_index,
                range: offset..offset + n,
            });
            offset += n;
        }

        if let Some(p) = parameters
            .iter()
            .zip(used.iter())
            .find(|&(p, &u)| !u && !p.is_fixed())
            .map(|(p, _)| p)
        {
            return Err(Error::InvalidArgument(format!(
                "free parameter '{}' is not used by any model",
                p.name()
            )));
        }

        let (lower, upper) = parameters.free_bounds();
        let constraint = BoundaryConstraint::new(lower, upper)?;
        debug!(
            "composed {} curves, {} residuals, {} free parameters",
            curves.len(),
            offset,
            parameters.free_count()
        );
        Ok(JointObjective {
            curves,
            parameters: parameters.clone(),
            constraint,
            residual_count: offset,
        })
    }

    /// Build the parameter set for `models` in first-declaration order
    /// (models in supply order, parameters in model order).
    ///
    /// Initial values come from `fixed`, then `guesses`, then the first
    /// model default; bounds come from `bounds`, then the model defaults,
    /// then `(-inf, inf)`. Keys of the three maps that no model reads are
    /// rejected with `Error::InvalidArgument`; two models giving different
    /// default bounds for one name yield `Error::ConflictingParameter`.
    pub fn declare_model_parameters(
        models: &[Model],
        guesses: &HashMap<String, Real>,
        bounds: &HashMap<String, (Real, Real)>,
        fixed: &HashMap<String, Real>,
    ) -> Result<ParameterSet> {
        let known: HashSet<&str> = models
            .iter()
            .flat_map(|m| m.parameter_names().iter().map(String::as_str))
            .collect();
        for key in guesses.keys().chain(bounds.keys()).chain(fixed.keys()) {
            if !known.contains(key.as_str()) {
                return Err(Error::InvalidArgument(format!(
                    "'{key}' is not a parameter of any model"
                )));
            }
        }

        let mut set = ParameterSet::new();
        for model in models {
            for name in model.parameter_names() {
                if set.get(name).is_some() {
                    continue;
                }
                let (lower, upper) = match bounds.get(name) {
                    Some(&b) => b,
                    None => model_default_bounds(models, name)?
                        .unwrap_or((Real::NEG_INFINITY, Real::INFINITY)),
                };
                let (initial, is_fixed) = match fixed.get(name) {
                    Some(&v) => (v, true),
                    None => {
                        let guess = guesses
                            .get(name)
                            .copied()
                            .or_else(|| models.iter().find_map(|m| m.default_value(name)));
                        match guess {
                            Some(v) => (v, false),
                            None => {
                                return Err(Error::InvalidArgument(format!(
                                    "no initial value for parameter '{name}'"
                                )))
                            }
                        }
                    }
                };
                set.declare(name, initial, lower, upper, is_fixed)?;
            }
        }
        Ok(set)
    }
}

/// Default bounds for `name` agreed on by every model that gives some.
fn model_default_bounds(models: &[Model], name: &str) -> Result<Option<(Real, Real)>> {
    let mut found: Option<(Real, Real)> = None;
    for model in models {
        if let Some(b) = model.default_bounds(name) {
            match found {
                Some(prev) if prev != b => {
                    return Err(Error::ConflictingParameter {
                        name: name.to_string(),
                        reason: format!(
                            "default bounds [{}, {}] vs [{}, {}] in model '{}'",
                            prev.0,
                            prev.1,
                            b.0,
                            b.1,
                            model.name()
                        ),
                    })
                }
                _ => found = Some(b),
            }
        }
    }
    Ok(found)
}

/// The composed residual function over the free parameters.
#[derive(Debug, Clone)]
pub struct JointObjective {
    curves: Vec<CurveBlock>,
    parameters: ParameterSet,
    constraint: BoundaryConstraint,
    residual_count: Size,
}

impl JointObjective {
    /// Curve names in block order.
    pub fn curve_names(&self) -> Vec<&str> {
        self.curves.iter().map(|c| c.model.name()).collect()
    }

    /// Residual index range of each curve, in block order.
    pub fn block_ranges(&self) -> Vec<Range<usize>> {
        self.curves.iter().map(|c| c.range.clone()).collect()
    }

    /// Total number of residuals.
    pub fn residual_count(&self) -> Size {
        self.residual_count
    }

    /// Number of free parameters.
    pub fn free_count(&self) -> Size {
        self.constraint.lower().len()
    }

    /// The parameter set the objective was composed with.
    pub fn parameters(&self) -> &ParameterSet {
        &self.parameters
    }

    /// Box constraint on the free parameters.
    pub fn constraint(&self) -> &BoundaryConstraint {
        &self.constraint
    }

    /// Weighted residuals per curve for a full parameter vector.
    pub fn evaluate_blocks(&self, full: &[Real]) -> Result<Vec<Vec<Real>>> {
        if full.len() != self.parameters.len() {
            return Err(Error::DimensionMismatch {
                expected: self.parameters.len(),
                found: full.len(),
            });
        }
        let mut scratch = Vec::new();
        Ok(self
            .curves
            .iter()
            .map(|c| {
                let mut block = vec![0.0; c.range.len()];
                c.residuals_into(full, &mut scratch, &mut block);
                block
            })
            .collect())
    }

    fn residuals_free(&self, free: &[Real]) -> Array {
        let full = self.parameters.expand_unchecked(free);
        let mut out = vec![0.0; self.residual_count];
        let mut scratch = Vec::new();
        for c in &self.curves {
            c.residuals_into(&full, &mut scratch, &mut out[c.range.clone()]);
        }
        Array::from_vec(out)
    }
}

impl CostFunction for JointObjective {
    fn values(&self, x: &Array) -> Array {
        self.residuals_free(x.as_slice())
    }

    fn jacobian(&self, x: &Array) -> Matrix {
        let f0 = self.values(x);
        forward_difference_jacobian(|p| self.values(p), x, &f0, Some(&self.constraint))
    }
}
