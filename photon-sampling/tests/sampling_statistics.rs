//! Statistical checks of draws against the distributions they were built from.

use photon_sampling::{
    BinAxis, EnergySlicedCurveSet, FluxSurface, FluxSurfaceSampler, Grid, InverseCdf,
    PhotonDraw, SamplerConfig, SliceSelector, Spacing,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use test_helpers::{histogram, init_test_logging, ks_critical_value, ks_statistic, mean};

#[test]
fn test_power_law_draws_follow_analytic_cdf() {
    init_test_logging();

    let grid = Grid::log10(1.0, 100.0, 1000).unwrap();
    let inv = InverseCdf::from_fn(&grid, |e| e.powi(-2)).unwrap();
    let mut rng = StdRng::seed_from_u64(1);

    let n = 20_000;
    let draws: Vec<f64> = (0..n).map(|_| inv.sample(&mut rng)).collect();
    let analytic = |e: f64| ((1.0 - 1.0 / e) / (1.0 - 1.0 / 100.0)).clamp(0.0, 1.0);

    let d = ks_statistic(&draws, analytic).unwrap();
    assert!(
        d < ks_critical_value(n, 0.001),
        "KS statistic {d} exceeds critical value"
    );
}

#[test]
fn test_sliced_draws_follow_their_slice() {
    init_test_logging();

    // Slice at energy E is exponential in x with scale E/10
    let selector = SliceSelector::new(10.0, 1000.0, 3, Spacing::Log10).unwrap();
    let set = EnergySlicedCurveSet::build(selector, |e| {
        let grid = Grid::linear(0.0, 50.0, 5000)?;
        let scale = e / 10.0;
        InverseCdf::from_fn(&grid, move |x| (-x / scale).exp())
    })
    .unwrap();

    let mut rng = StdRng::seed_from_u64(9);
    for (energy, scale) in [(10.0, 1.0_f64), (100.0, 10.0)] {
        let draws: Vec<f64> = (0..20_000).map(|_| set.sample(energy, &mut rng)).collect();
        let truncation = 1.0 - (-50.0 / scale).exp();
        let expected_mean = scale - 50.0 * (-50.0 / scale).exp() / truncation;
        let m = mean(&draws).unwrap();
        assert!(
            (m - expected_mean).abs() / expected_mean < 0.03,
            "slice at {energy} MeV: mean {m}, expected {expected_mean}"
        );
    }
}

#[test]
fn test_sampled_energies_follow_surface_spectrum() {
    init_test_logging();

    // Constant-in-time spectrum with three times as many photons in the upper bin
    let times = BinAxis::uniform(0.0, 10.0, 10).unwrap();
    let energies = BinAxis::from_edges(vec![1.0, 2.0, 3.0]).unwrap();
    let surface =
        FluxSurface::from_fn(times, energies, |_, e| if e < 2.0 { 10.0 } else { 30.0 }).unwrap();
    let mut sampler =
        FluxSurfaceSampler::new(surface, SamplerConfig::default().periodic().with_seed(4))
            .unwrap();

    let mut t = 0.0;
    let mut draws = Vec::new();
    for _ in 0..8000 {
        match sampler.draw_photon(t, 1.0).unwrap() {
            PhotonDraw::Photon(photon) => {
                t = photon.time;
                draws.push(photon.energy);
            }
            PhotonDraw::Exhausted => panic!("periodic source ran out"),
        }
    }

    let counts = histogram(&draws, &[1.0, 2.0, 3.0]).unwrap();
    let upper_fraction = counts[1] as f64 / draws.len() as f64;
    assert!(
        (upper_fraction - 0.75).abs() < 0.03,
        "upper bin fraction {upper_fraction}"
    );
}
