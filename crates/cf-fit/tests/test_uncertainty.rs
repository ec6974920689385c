//! Correlated uncertainties attached to fitted parameters.

use approx::assert_abs_diff_eq;
use cf_core::Real;
use cf_fit::{fit_curves, propagate_values, CorrelatedValue, DataSeries, FitRequest};
use cf_models::library::linear;
use cf_models::Model;

fn line_request() -> FitRequest {
    let xs: Vec<Real> = (0..12).map(Real::from).collect();
    // deterministic scatter around y = 0.5 x + 1
    let ys = xs
        .iter()
        .enumerate()
        .map(|(i, x)| 0.5 * x + 1.0 + if i % 2 == 0 { 0.05 } else { -0.05 })
        .collect();
    FitRequest::new(
        vec![linear("line", None).unwrap()],
        vec![DataSeries::new("line", xs, ys).unwrap()],
    )
    .with_guesses([("slope", 1.0), ("intercept", 0.0)])
}

#[test]
fn unidentifiable_parameter_makes_every_uncertainty_nan() {
    // the curve does not depend on b, so JᵀJ is singular
    let model = Model::new("p", ["a", "b"], |x, p| p[0] * x + 0.0 * p[1]).unwrap();
    let xs = vec![1.0, 2.0, 3.0, 4.0];
    let ys = xs.iter().map(|x| 2.0 * x + 0.01 * x * x).collect();
    let req = FitRequest::new(vec![model], vec![DataSeries::new("p", xs, ys).unwrap()])
        .with_guesses([("a", 1.0), ("b", 1.0)]);
    let result = fit_curves(&req).unwrap();

    assert!(result.covariance().is_none());
    let a = result.parameter("a").unwrap();
    let b = result.parameter("b").unwrap();
    assert!(a.std_dev().is_nan());
    assert!(b.std_dev().is_nan());
    assert!(a.sum(&b).std_dev().is_nan());
    assert!(a.product(&b).std_dev().is_nan());
    assert!(a.scaled(2.0).std_dev().is_nan());
    assert!(propagate_values(&[a.clone()], |v| v[0].sin()).std_dev().is_nan());
    assert!(result.correlation("a", "b").is_none());
    // the nominal values are still usable
    assert!(a.product(&b).nominal().is_finite());
    assert!(result.to_string().contains("nan"));
}

#[test]
fn degenerate_parameter_pair_has_no_covariance() {
    // only a + b is determined by the data
    let model = Model::new("p", ["a", "b"], |x, p| (p[0] + p[1]) * x).unwrap();
    let xs: Vec<Real> = (1..=6).map(Real::from).collect();
    let ys = xs
        .iter()
        .enumerate()
        .map(|(i, x)| 3.5 * x + if i % 2 == 0 { 0.01 } else { -0.01 })
        .collect();
    let req = FitRequest::new(vec![model], vec![DataSeries::new("p", xs, ys).unwrap()])
        .with_guesses([("a", 1.0), ("b", 2.5)]);
    let result = fit_curves(&req).unwrap();

    assert!(result.success(), "{}", result.message());
    let a = result.raw_param("a").unwrap();
    let b = result.raw_param("b").unwrap();
    assert_abs_diff_eq!(a + b, 3.5, epsilon = 1e-2);
    assert!(result.covariance().is_none());
    let a = result.parameter("a").unwrap();
    let b = result.parameter("b").unwrap();
    assert!(a.std_dev().is_nan());
    assert!(b.std_dev().is_nan());
    assert!(a.sum(b).std_dev().is_nan());
    assert!(result.correlation_matrix().is_none());
}

#[test]
fn fixed_parameters_are_exact_even_without_covariance() {
    let model = Model::new("p", ["a", "b", "c"], |x, p| p[0] * x + 0.0 * p[1] + p[2]).unwrap();
    let xs = vec![0.0, 1.0, 2.0];
    let ys = vec![1.0, 3.0, 5.0];
    let req = FitRequest::new(vec![model], vec![DataSeries::new("p", xs, ys).unwrap()])
        .with_guesses([("a", 1.0), ("b", 1.0)])
        .with_fixed("c", 1.0);
    let result = fit_curves(&req).unwrap();
    let c = result.parameter("c").unwrap();
    assert_eq!(c.std_dev(), 0.0);
    assert!(c.is_exact());
    assert!(result.parameter("a").unwrap().std_dev().is_nan());
}

#[test]
fn fitted_values_share_the_covariance() {
    let result = fit_curves(&line_request()).unwrap();
    let cov = result.covariance().unwrap();
    let slope = result.parameter("slope").unwrap();
    let intercept = result.parameter("intercept").unwrap();

    assert!(slope.shares_context(intercept));
    assert_abs_diff_eq!(slope.variance(), cov[(0, 0)], epsilon = 1e-15);
    assert_abs_diff_eq!(intercept.variance(), cov[(1, 1)], epsilon = 1e-15);
    assert_abs_diff_eq!(slope.covariance_with(intercept), cov[(0, 1)], epsilon = 1e-15);

    // slope and intercept of a line on x ≥ 0 are anti-correlated
    let rho = slope.correlation_with(intercept);
    assert!(rho < 0.0);
    assert_abs_diff_eq!(rho, result.correlation("slope", "intercept").unwrap(), epsilon = 1e-12);

    let sum = slope.sum(intercept);
    let expected = cov[(0, 0)] + cov[(1, 1)] + 2.0 * cov[(0, 1)];
    assert_abs_diff_eq!(sum.variance(), expected, epsilon = 1e-15);
    // ignoring the correlation would overstate the uncertainty
    let uncorrelated = CorrelatedValue::independent(slope.nominal(), slope.std_dev())
        .sum(&CorrelatedValue::independent(intercept.nominal(), intercept.std_dev()));
    assert!(sum.std_dev() < uncorrelated.std_dev());
}

#[test]
fn prediction_uncertainty_via_propagation() {
    let result = fit_curves(&line_request()).unwrap();
    let slope = result.parameter("slope").unwrap().clone();
    let intercept = result.parameter("intercept").unwrap().clone();
    let x0 = 20.0;
    let predicted = propagate_values(&[slope.clone(), intercept.clone()], |p| p[0] * x0 + p[1]);
    let by_hand = slope.scaled(x0).sum(&intercept);
    assert_abs_diff_eq!(predicted.nominal(), by_hand.nominal(), epsilon = 1e-12);
    assert_abs_diff_eq!(predicted.std_dev(), by_hand.std_dev(), epsilon = 1e-9);
}

#[test]
fn separate_fits_are_independent() {
    let first = fit_curves(&line_request()).unwrap();
    let second = fit_curves(&line_request()).unwrap();
    let a = first.parameter("slope").unwrap();
    let b = second.parameter("slope").unwrap();
    assert!(!a.shares_context(b));
    assert_eq!(a.covariance_with(b), 0.0);
    assert_abs_diff_eq!(
        a.difference(b).variance(),
        a.variance() + b.variance(),
        epsilon = 1e-15
    );
}
