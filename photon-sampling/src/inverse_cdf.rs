//! Inverse-transform sampling from a normalized cumulative curve.

use rand::Rng;

use crate::cdf::CdfBuilder;
use crate::error::SamplingError;
use crate::grid::{Grid, Spacing};
use crate::tabulated::{TabulatedCurve, TabulatedDistribution};

/// Maps a uniform deviate in [0, 1] to a physical value.
///
/// The lookup finds the bracketing pair `cum[i] < u <= cum[i+1]` by binary
/// search and interpolates linearly between the corresponding abscissae, in
/// log10 space when the curve was built on a log10 grid.
///
/// - `u <= cum[0]` returns `x[0]`
/// - `u >= cum[last]` returns `x[last]`
/// - a flat pair (`cum[i] == cum[i+1]`, zero density) returns the left edge `x[i]`
///
/// The output is non-decreasing in `u`.
#[derive(Debug, Clone, PartialEq)]
pub struct InverseCdf {
    curve: TabulatedCurve,
}

impl InverseCdf {
    /// Wrap a normalized cumulative curve.
    pub fn new(curve: TabulatedCurve) -> Self {
        Self { curve }
    }

    /// Build from a closed-form density on a grid.
    pub fn from_fn<F>(grid: &Grid, density: F) -> Result<Self, SamplingError>
    where
        F: Fn(f64) -> f64,
    {
        CdfBuilder::from_fn(grid, density).map(Self::new)
    }

    /// Build from a tabulated density.
    pub fn from_distribution(dist: &TabulatedDistribution) -> Result<Self, SamplingError> {
        CdfBuilder::from_distribution(dist).map(Self::new)
    }

    /// Build from histogram bin contents.
    pub fn from_histogram(edges: &[f64], contents: &[f64]) -> Result<Self, SamplingError> {
        CdfBuilder::from_histogram(edges, contents).map(Self::new)
    }

    /// Invert the curve at `u`. Non-finite or out-of-range deviates are clamped.
    ///
    /// # Arguments
    /// * `u` - Deviate in [0, 1]; NaN is treated as 0
    ///
    /// # Returns
    /// * `f64` - Value whose cumulative probability is `u`, inside `[x_min, x_max]`
    pub fn evaluate(&self, u: f64) -> f64 {
        let xs = self.curve.xs();
        let cum = self.curve.cumulative();
        let last = cum.len() - 1;

        let u = if u.is_nan() { 0.0 } else { u.clamp(0.0, 1.0) };
        if u <= cum[0] {
            return xs[0];
        }
        if u >= cum[last] {
            return xs[last];
        }

        // First index with cum[j] >= u; cum[0] < u < cum[last] puts j in 1..=last
        let j = cum.partition_point(|&c| c < u);
        let i = j - 1;
        let (c1, c2) = (cum[i], cum[j]);
        if c2 == c1 {
            return xs[i];
        }
        let t = (u - c1) / (c2 - c1);

        match self.curve.spacing() {
            Spacing::Linear => xs[i] + t * (xs[j] - xs[i]),
            Spacing::Log10 => {
                let (l1, l2) = (xs[i].log10(), xs[j].log10());
                10f64.powf(l1 + t * (l2 - l1))
            }
        }
    }

    /// Draw one value using a uniform deviate from `rng`.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.evaluate(rng.gen::<f64>())
    }

    /// Forward lookup: the cumulative probability at `x`.
    pub fn cdf(&self, x: f64) -> f64 {
        self.curve.eval(x)
    }

    pub fn curve(&self) -> &TabulatedCurve {
        &self.curve
    }

    pub fn x_min(&self) -> f64 {
        self.curve.x_min()
    }

    pub fn x_max(&self) -> f64 {
        self.curve.x_max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_boundaries_are_exact() {
        let grid = Grid::log10(10.0, 350_000.0, 1000).unwrap();
        let inv = InverseCdf::from_fn(&grid, |e| e.powf(-2.3)).unwrap();

        assert_eq!(inv.evaluate(0.0), 10.0);
        assert_eq!(inv.evaluate(1.0), 350_000.0);
        assert_eq!(inv.evaluate(-0.5), 10.0);
        assert_eq!(inv.evaluate(1.5), 350_000.0);
        assert_eq!(inv.evaluate(f64::NAN), 10.0);
    }

    #[test]
    fn test_round_trip_uniform() {
        let grid = Grid::linear(0.0, 10.0, 1000).unwrap();
        let inv = InverseCdf::from_fn(&grid, |_| 1.0).unwrap();

        for i in 0..=200 {
            let x = i as f64 * 0.05;
            let recovered = inv.evaluate(inv.cdf(x));
            assert_abs_diff_eq!(recovered, x, epsilon = grid.step());
        }
    }

    #[test]
    fn test_round_trip_log_power_law() {
        let grid = Grid::log10(1.0, 1e4, 400).unwrap();
        let inv = InverseCdf::from_fn(&grid, |e| e.powf(-1.7)).unwrap();

        for e in [1.5, 12.0, 340.0, 9000.0] {
            assert_relative_eq!(inv.evaluate(inv.cdf(e)), e, max_relative = 1e-9);
        }
    }

    #[test]
    fn test_monotonic_in_u() {
        let dist = TabulatedDistribution::from_table(
            vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0],
            vec![3.0, 0.0, 0.0, 1.0, 7.0, 0.5],
        )
        .unwrap();
        let inv = InverseCdf::from_distribution(&dist).unwrap();

        let mut previous = inv.evaluate(0.0);
        for i in 1..=10_000 {
            let x = inv.evaluate(i as f64 / 10_000.0);
            assert!(x >= previous, "inverse decreased at u = {}", i as f64 / 1e4);
            previous = x;
        }
    }

    #[test]
    fn test_flat_region_returns_left_edge() {
        // Bins [0,1) and [2,3) carry mass, [1,2) is empty
        let inv = InverseCdf::from_histogram(&[0.0, 1.0, 2.0, 3.0], &[1.0, 0.0, 1.0]).unwrap();

        // u = 0.5 sits exactly on the flat plateau from x = 1 to x = 2
        assert_eq!(inv.evaluate(0.5), 1.0);
        assert_relative_eq!(inv.evaluate(0.75), 2.5, epsilon = 1e-12);
    }

    #[test]
    fn test_two_bin_flat_histogram_statistics() {
        let inv = InverseCdf::from_histogram(&[1.0, 2.0, 3.0], &[1.0, 1.0]).unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        let draws: Vec<f64> = (0..1000).map(|_| inv.sample(&mut rng)).collect();
        let mean = draws.iter().sum::<f64>() / draws.len() as f64;
        let lower = draws.iter().filter(|&&e| e < 2.0).count();

        assert!((mean - 2.0).abs() / 2.0 < 0.02, "mean {mean} not within 2% of 2.0");
        assert!(
            (430..=570).contains(&lower),
            "lower bin holds {lower} of 1000 draws"
        );
        assert!(draws.iter().all(|&e| (1.0..=3.0).contains(&e)));
    }
}
