//! Contents and rendering of `CurveFitResult`.

use approx::assert_abs_diff_eq;
use cf_core::Real;
use cf_fit::{
    fit_curves, CorrelatedValue, CurveFitResult, DataSeries, FitMethod, FitOptions, FitRequest,
};
use cf_models::library::cosine;
use cf_models::Model;

fn assert_send_sync<T: Send + Sync>() {}

fn oscillation_request() -> FitRequest {
    let model = cosine("osc", None).unwrap();
    let xs: Vec<Real> = (0..50).map(|i| i as Real * 0.05).collect();
    let truth = [0.8, 0.75, 0.3, 0.1];
    let ys = xs
        .iter()
        .enumerate()
        .map(|(i, &x)| model.evaluate(x, &truth) + 0.01 * ((i * 7 % 11) as Real - 5.0) / 5.0)
        .collect();
    FitRequest::new(vec![model], vec![DataSeries::new("osc", xs, ys).unwrap()])
        .with_guesses([("amp", 0.7), ("freq", 0.7), ("phase", 0.25)])
        .with_fixed("base", 0.1)
}

#[test]
fn result_types_are_thread_safe() {
    assert_send_sync::<CurveFitResult>();
    assert_send_sync::<CorrelatedValue>();
    assert_send_sync::<FitRequest>();
}

#[test]
fn init_params_are_the_callers_guesses() {
    let req = oscillation_request();
    let result = fit_curves(&req).unwrap();
    assert!(result.success(), "{}", result.message());

    // the optimizer moved away from the starting point...
    assert_ne!(result.raw_param("freq"), Some(0.7));
    // ...but the recorded starting values are exactly what was supplied
    assert_eq!(result.init_param("amp"), Some(0.7));
    assert_eq!(result.init_param("freq"), Some(0.7));
    assert_eq!(result.init_param("phase"), Some(0.25));
    assert_eq!(result.init_param("base"), Some(0.1));
    let names: Vec<&str> = result.init_params().iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, ["amp", "freq", "phase", "base"]);
}

#[test]
fn init_params_fall_back_to_model_defaults() {
    // phase has a model default of 0
    let req = FitRequest {
        initial_guesses: [("amp", 0.7), ("freq", 0.7)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
        ..oscillation_request()
    };
    let result = fit_curves(&req).unwrap();
    assert_eq!(result.init_param("phase"), Some(0.0));
}

#[test]
fn statistics_follow_their_definitions() {
    let result = fit_curves(&oscillation_request()).unwrap();
    let n = result.n_data() as Real;
    let k = result.n_free() as Real;
    assert_eq!(result.n_data(), 50);
    assert_eq!(result.n_free(), 3);
    assert_eq!(result.degrees_of_freedom(), 47);
    let chi = result.chi_square();
    assert_abs_diff_eq!(result.reduced_chi_square(), chi / 47.0, epsilon = 1e-15);
    let neg2_log_l = n * (chi / n).ln();
    assert_abs_diff_eq!(result.aic(), neg2_log_l + 2.0 * k, epsilon = 1e-9);
    assert_abs_diff_eq!(result.bic(), neg2_log_l + n.ln() * k, epsilon = 1e-9);
    let residual_chi: Real = result.residuals().iter().map(|r| r * r).sum();
    assert_abs_diff_eq!(residual_chi, chi, epsilon = 1e-15);

    let p = result.chi_square_p_value();
    assert!((0.0..=1.0).contains(&p));
    assert!(result.function_evaluations() > 0);
    assert!(result.iterations() > 0);
}

#[test]
fn flat_view_matches_covariance_order() {
    let result = fit_curves(&oscillation_request()).unwrap();
    assert_eq!(result.free_parameter_names(), ["amp", "freq", "phase"]);
    let flat = result.flat_values();
    assert_eq!(flat.len(), 3);
    for (name, value) in result.free_parameter_names().iter().zip(&flat) {
        assert_eq!(result.raw_param(name), Some(*value));
    }
    let cov = result.covariance().unwrap();
    assert_eq!((cov.rows(), cov.cols()), (3, 3));
    let freq = result.parameter("freq").unwrap();
    assert_abs_diff_eq!(freq.variance(), cov[(1, 1)], epsilon = 1e-15);
    assert_eq!(result.raw_params().len(), 4);

    let corr = result.correlation_matrix().unwrap();
    assert_eq!(corr[(2, 2)], 1.0);
    let expected = cov[(0, 2)] / (cov[(0, 0)] * cov[(2, 2)]).sqrt();
    assert_abs_diff_eq!(corr[(0, 2)], expected, epsilon = 1e-12);
    assert_eq!(result.correlation("phase", "amp"), Some(corr[(2, 0)]));
}

#[test]
fn fit_arguments_record_the_setup() {
    let req = oscillation_request()
        .with_method(FitMethod::NelderMead)
        .with_bounds("amp", 0.0, 2.0)
        .with_options(FitOptions::default().with_max_iterations(5000));
    let result = fit_curves(&req).unwrap();
    let args = result.fit_arguments();
    assert_eq!(args.method(), FitMethod::NelderMead);
    assert_eq!(args.options().max_iterations, Some(5000));
    assert_eq!(args.fixed(), [("base".to_string(), 0.1)]);
    assert_eq!(args.bounds()[0], ("amp".to_string(), 0.0, 2.0));
    assert_eq!(args.bounds()[1].0, "freq");
    assert_eq!(args.bounds()[1].1, 0.0);
}

#[test]
fn report_is_rendered_from_the_fields() {
    let result = fit_curves(&oscillation_request()).unwrap();
    let text = result.to_string();
    assert!(text.starts_with("CurveFitResult: success\n"));
    assert!(text.contains(" - fitting method: least_squares\n"));
    assert!(text.contains(" - curves: osc\n"));
    assert!(text.contains(" - degrees of freedom: 47\n"));
    assert!(text.contains("  * base = 0.1 (fixed)\n"));
    assert!(text.contains(" - init params:\n  * amp = 0.7\n"));

    // fit params are listed in declaration order
    let fit_section = &text[text.find(" - fit params:").unwrap()..];
    let amp = fit_section.find("* amp =").unwrap();
    let freq = fit_section.find("* freq =").unwrap();
    let phase = fit_section.find("* phase =").unwrap();
    assert!(amp < freq && freq < phase);

    // rendering is deterministic and matches fit_report(0.1)
    assert_eq!(text, result.to_string());
    assert_eq!(text, result.fit_report(0.1));
    // a zero threshold lists every correlated pair
    let all = result.fit_report(0.0);
    assert!(all.contains("(amp, freq)") || all.contains("(freq, phase)"));
    assert!(!result.fit_report(1.1).contains("correlations"));
}

#[test]
fn failed_fit_has_a_failure_banner() {
    let model = Model::new("p", ["k"], |x, p| (p[0] * x).sqrt()).unwrap();
    let req = FitRequest::new(
        vec![model],
        vec![DataSeries::new("p", vec![1.0, 2.0, 3.0], vec![1.0, 1.4, 1.7]).unwrap()],
    )
    .with_guess("k", -1.0);
    let result = fit_curves(&req).unwrap();
    assert!(!result.success());
    assert!(result.to_string().starts_with("CurveFitResult: FAILED ("));
    assert_eq!(result.init_param("k"), Some(-1.0));
}
