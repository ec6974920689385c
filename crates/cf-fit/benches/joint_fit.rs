use cf_core::Real;
use cf_fit::{fit_batch, fit_curves, DataSeries, FitMethod, FitRequest};
use cf_models::DragModelBuilder;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::{rngs::StdRng, SeedableRng};
use rand_distr::{Distribution, Normal};

fn drag_request(reps: &[u32], method: FitMethod) -> FitRequest {
    let models = DragModelBuilder::new(reps.iter().copied()).build().unwrap();
    let mut rng = StdRng::seed_from_u64(42);
    let normal = Normal::new(0.0, 0.02).unwrap();
    let xs: Vec<Real> = (0..41).map(|i| -1.0 + 0.05 * i as Real).collect();
    let truth = [-0.45, 0.5, 0.1, 0.5];
    let data = models
        .iter()
        .map(|m| {
            let ys = xs
                .iter()
                .map(|&x| m.evaluate(x, &truth) + normal.sample(&mut rng))
                .collect();
            DataSeries::new(m.name(), xs.clone(), ys).unwrap()
        })
        .collect();
    FitRequest::new(models, data)
        .with_method(method)
        .with_guesses([("amp", -0.4), ("freq", 0.5), ("beta", 0.08), ("base", 0.45)])
}

fn bench_drag_least_squares(c: &mut Criterion) {
    let req = drag_request(&[3, 5, 7], FitMethod::LeastSquares);
    c.bench_function("drag 3 curves least_squares", |b| {
        b.iter(|| fit_curves(black_box(&req)))
    });
}

fn bench_drag_nelder_mead(c: &mut Criterion) {
    let req = drag_request(&[3, 5, 7], FitMethod::NelderMead);
    c.bench_function("drag 3 curves nelder_mead", |b| {
        b.iter(|| fit_curves(black_box(&req)))
    });
}

fn bench_batch(c: &mut Criterion) {
    let requests: Vec<FitRequest> = (1..=8)
        .map(|n| drag_request(&[n, n + 2, n + 4], FitMethod::LeastSquares))
        .collect();
    c.bench_function("drag batch of 8", |b| b.iter(|| fit_batch(black_box(&requests))));
}

criterion_group!(
    benches,
    bench_drag_least_squares,
    bench_drag_nelder_mead,
    bench_batch
);
criterion_main!(benches);
