use criterion::{black_box, criterion_group, criterion_main, Bencher, BenchmarkId, Criterion};
use radresponse::*;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoroshiro128Plus as PRng;
use statrs::distribution::{Discrete, Poisson};

const BACKGROUND_RATE: f64 = 300.0;

fn block(x0: f64, y0: f64, w: f64, h: f64) -> serde_json::Value {
    serde_json::json!({
        "vertices": [[x0, y0], [x0 + w, y0], [x0 + w, y0 + h], [x0, y0 + h]],
        "material_ref": 1 + ((x0 + y0) as usize % 2),
    })
}

/// A 4x4 grid of buildings, with detectors along the streets.
fn city_deck(detector: &str) -> Deck {
    let mut solids = Vec::new();
    for i in 0..4 {
        for j in 0..4 {
            solids.push(block(10.0 + 22.0 * i as f64, 10.0 + 22.0 * j as f64, 14.0, 14.0));
        }
    }
    let detectors: Vec<_> = (0..12)
        .map(|k| {
            let x = 5.0 + 8.0 * k as f64;
            let y = if k % 2 == 0 { 5.0 } else { 95.0 };
            match detector {
                "Point" => serde_json::json!({"type": "Point", "R": [x, y], "epsilon": 0.6, "area": 0.0058, "dwell": 120.0}),
                tag => serde_json::json!({"type": tag, "R": [x, y], "dims": [0.406, 0.102, 0.051], "theta": 0.3 * k as f64, "sigma_det": 0.4, "epsilon": 0.6, "dwell": 120.0}),
            }
        })
        .collect();
    serde_json::from_value(serde_json::json!({
        "problem_type": "Simple_Problem",
        "data": {
            "domain": {
                "bbox": [[0.0, 0.0], [100.0, 0.0], [100.0, 100.0], [0.0, 100.0]],
                "solids": solids,
            },
            "interstitial_material": 0,
            "materials": {
                "0": {"number_density": 1.0, "cross_section": 1e-4},
                "1": {"number_density": 1.0, "cross_section": 0.08},
                "2": {"number_density": 1.0, "cross_section": 0.11},
            },
            "source": {"R": [30.0, 54.0], "I0": 2e9},
            "detectors": detectors,
        }
    }))
    .unwrap()
}

fn proposals(n: usize) -> Vec<(Coord, f64)> {
    let mut rng = PRng::seed_from_u64(123456u64);
    (0..n)
        .map(|_| {
            let r = Coord {
                x: rng.gen_range(0.5..99.5),
                y: rng.gen_range(0.5..99.5),
            };
            (r, rng.gen_range(2e8..2e10))
        })
        .collect()
}

fn bench_evaluate(b: &mut Bencher, input: &(SimpleProblem, Vec<(Coord, f64)>)) {
    let (problem, proposals) = input;
    let mut k = 0;
    b.iter(|| {
        let (r, intensity) = proposals[k % proposals.len()];
        k += 1;
        problem.evaluate(black_box(r), black_box(intensity))
    })
}

fn bench_jacobian(b: &mut Bencher, input: &(SimpleProblem, Vec<(Coord, f64)>)) {
    let (problem, proposals) = input;
    let mut k = 0;
    b.iter(|| {
        let (r, intensity) = proposals[k % proposals.len()];
        k += 1;
        problem.evaluate_with_jacobian(black_box(r), black_box(intensity))
    })
}

fn criterion_benchmark(c: &mut Criterion) {
    let registries = Registries::default();
    for tag in &["Point", "Oriented_Prism", "Oriented_Prism_Intrinsic"] {
        let problem = city_deck(tag).build(&registries).unwrap();
        let input = (problem.as_simple().unwrap().clone(), proposals(256));
        c.bench_with_input(BenchmarkId::new("evaluate", tag), &input, bench_evaluate);
        c.bench_with_input(BenchmarkId::new("evaluate_with_jacobian", tag), &input, bench_jacobian);
    }

    // Poisson log-likelihood of synthetic counts, as a sampler would score a proposal.
    let problem = city_deck("Point")
        .build_as(Problem::PERTURBABLE_XS, &registries)
        .unwrap();
    let perturbable = problem.as_perturbable_xs().unwrap();
    let source = *problem.source();
    let background = problem.dwell_times() * BACKGROUND_RATE;
    let counts: Vec<u64> = (perturbable.evaluate_nominal(source.position, source.intensity) + &background)
        .iter()
        .map(|&m| m.round() as u64)
        .collect();
    let proposals = proposals(256);
    let mut rng = PRng::seed_from_u64(654321u64);
    let mut k = 0;
    c.bench_function("perturbable log-likelihood", |b| {
        b.iter(|| {
            let (r, intensity) = proposals[k % proposals.len()];
            k += 1;
            let interstitial = Material::from_sigma_t(perturbable.interstitial_material().sigma_t() * rng.gen_range(0.5..1.5));
            let materials: Vec<_> = perturbable
                .materials()
                .iter()
                .map(|m| Material::from_sigma_t(m.sigma_t() * rng.gen_range(0.5..1.5)))
                .collect();
            let expected = perturbable.evaluate(r, intensity, &interstitial, &materials).unwrap() + &background;
            expected
                .iter()
                .zip(&counts)
                .map(|(&lambda, &n)| Poisson::new(lambda).map(|p| p.ln_pmf(n)).unwrap_or(f64::NEG_INFINITY))
                .sum::<f64>()
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
