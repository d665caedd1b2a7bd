//! Cumulative distribution construction.
//!
//! [`CdfBuilder`] integrates a density into a [`TabulatedCurve`] normalized to
//! span exactly [0, 1]. Three inputs are supported:
//!
//! - a [`TabulatedDistribution`] of densities at arbitrary (strictly increasing) points,
//! - a closed-form density evaluated on a [`Grid`] (linear or log10 spacing),
//! - a histogram of N bin contents on N+1 edges.
//!
//! Point densities are accumulated with the trapezoid rule,
//! `cumulative[i] = cumulative[i-1] + ½(g[i-1] + g[i])·step`, where
//! `g(x) = density(x)·weight(x)` and `weight` is the Jacobian of the grid
//! spacing (`x·ln 10` on a log10 grid, so that the curve integrated in log-energy
//! still reports linear-energy probability). Histogram contents are accumulated
//! at the bin edges directly.
//!
//! Construction is deterministic: identical inputs produce bit-identical curves.

use log::debug;

use crate::error::SamplingError;
use crate::grid::{Grid, Spacing};
use crate::tabulated::{validate_axis, validate_densities, TabulatedCurve, TabulatedDistribution};

/// Trapezoid-rule integral of tabulated `ys` over `xs`.
///
/// Returns 0.0 for fewer than two points.
pub fn trap_integrate(xs: &[f64], ys: &[f64]) -> f64 {
    xs.windows(2)
        .zip(ys.windows(2))
        .map(|(x, y)| 0.5 * (y[0] + y[1]) * (x[1] - x[0]))
        .sum()
}

/// Builds normalized cumulative curves from densities.
pub struct CdfBuilder;

impl CdfBuilder {
    /// Integrate a tabulated density on its own points.
    pub fn from_distribution(dist: &TabulatedDistribution) -> Result<TabulatedCurve, SamplingError> {
        let xs = dist.xs();
        let ds = dist.densities();

        let mut cumulative = Vec::with_capacity(xs.len());
        cumulative.push(0.0);
        for i in 1..xs.len() {
            let area = 0.5 * (ds[i - 1] + ds[i]) * (xs[i] - xs[i - 1]);
            cumulative.push(cumulative[i - 1] + area);
        }

        Self::normalize(xs.to_vec(), cumulative, Spacing::Linear, "tabulated density")
    }

    /// Evaluate `density` at every grid point and integrate it.
    ///
    /// # Errors
    ///
    /// - `InvalidTable` if the density returns a negative or non-finite value
    /// - `DegenerateDistribution` if the integral is zero
    pub fn from_fn<F>(grid: &Grid, density: F) -> Result<TabulatedCurve, SamplingError>
    where
        F: Fn(f64) -> f64,
    {
        let spacing = grid.spacing();
        let xs: Vec<f64> = grid.points().collect();
        let raw: Vec<f64> = xs.iter().map(|&x| density(x)).collect();
        validate_densities(&raw)?;

        let weighted: Vec<f64> = xs
            .iter()
            .zip(raw.iter())
            .map(|(&x, &d)| d * spacing.weight(x))
            .collect();

        let step = grid.step();
        let mut cumulative = Vec::with_capacity(xs.len());
        cumulative.push(0.0);
        for i in 1..xs.len() {
            cumulative.push(cumulative[i - 1] + 0.5 * (weighted[i - 1] + weighted[i]) * step);
        }

        Self::normalize(xs, cumulative, spacing, "closed-form density")
    }

    /// Accumulate histogram `contents` at the upper edge of each bin.
    ///
    /// Draws from the resulting curve pick a bin in proportion to its content
    /// and a uniformly distributed position within that bin.
    ///
    /// # Arguments
    /// * `edges` - Strictly increasing bin edges, one more than `contents`
    /// * `contents` - Non-negative bin contents
    ///
    /// # Returns
    /// * `Ok(TabulatedCurve)` - Normalized cumulative curve at the edges
    /// * `Err(SamplingError::InvalidTable)` - Mismatched lengths or bad contents
    /// * `Err(SamplingError::DegenerateDistribution)` - All bins empty
    pub fn from_histogram(edges: &[f64], contents: &[f64]) -> Result<TabulatedCurve, SamplingError> {
        if edges.len() != contents.len() + 1 {
            return Err(SamplingError::InvalidTable(format!(
                "histogram with {} bins needs {} edges, got {}",
                contents.len(),
                contents.len() + 1,
                edges.len()
            )));
        }
        let mut cumulative = Vec::with_capacity(edges.len());
        cumulative.push(0.0);
        for (i, c) in contents.iter().enumerate() {
            cumulative.push(cumulative[i] + c);
        }
        validate_axis(edges, &cumulative)?;
        validate_densities(contents)?;

        Self::normalize(edges.to_vec(), cumulative, Spacing::Linear, "histogram")
    }

    /// Divide by the final accumulated value so the curve ends at exactly 1.0.
    fn normalize(
        xs: Vec<f64>,
        mut cumulative: Vec<f64>,
        spacing: Spacing,
        context: &str,
    ) -> Result<TabulatedCurve, SamplingError> {
        let total = cumulative[cumulative.len() - 1];
        if !total.is_finite() || total <= 0.0 {
            return Err(SamplingError::degenerate(total, context));
        }

        for value in cumulative.iter_mut() {
            *value /= total;
        }
        let last = cumulative.len() - 1;
        cumulative[last] = 1.0;

        debug!(
            "Built CDF from {context}: {} points over [{}, {}], total {total:.6e}",
            xs.len(),
            xs[0],
            xs[xs.len() - 1]
        );
        Ok(TabulatedCurve::from_normalized(xs, cumulative, spacing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    fn assert_valid_cdf(curve: &TabulatedCurve) {
        let cum = curve.cumulative();
        for i in 1..cum.len() {
            assert!(
                cum[i - 1] <= cum[i],
                "cumulative decreases at {i}: {} > {}",
                cum[i - 1],
                cum[i]
            );
        }
        assert_eq!(cum[0], 0.0);
        assert_abs_diff_eq!(cum[cum.len() - 1], 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_uniform_density_is_linear() {
        let grid = Grid::linear(0.0, 10.0, 100).unwrap();
        let curve = CdfBuilder::from_fn(&grid, |_| 1.0).unwrap();

        assert_valid_cdf(&curve);
        for sample in curve.samples() {
            assert_relative_eq!(sample.value, sample.x / 10.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_power_law_on_log_grid() {
        // dN/dE ∝ E^-2 on [1, 100]: CDF(E) = (1 - 1/E) / (1 - 1/100)
        let grid = Grid::log10(1.0, 100.0, 2000).unwrap();
        let curve = CdfBuilder::from_fn(&grid, |e| e.powi(-2)).unwrap();

        assert_valid_cdf(&curve);
        for e in [2.0, 5.0, 10.0, 50.0] {
            let expected = (1.0 - 1.0 / e) / (1.0 - 1.0 / 100.0);
            assert_relative_eq!(curve.eval(e), expected, max_relative = 1e-4);
        }
    }

    #[test]
    fn test_steep_spectrum_stays_monotonic() {
        // Ten decades of a steep power law accumulate values spanning many orders
        let grid = Grid::log10(1e-2, 1e8, 5000).unwrap();
        let curve = CdfBuilder::from_fn(&grid, |e| e.powf(-3.5)).unwrap();
        assert_valid_cdf(&curve);
    }

    #[test]
    fn test_last_value_is_exactly_one() {
        let grid = Grid::linear(0.0, 1.0, 7).unwrap();
        let curve = CdfBuilder::from_fn(&grid, |x| 0.1 + x.sin().abs()).unwrap();
        assert_eq!(curve.cumulative()[curve.len() - 1], 1.0);
    }

    #[test]
    fn test_zero_density_is_degenerate() {
        let grid = Grid::linear(0.0, 1.0, 10).unwrap();
        let result = CdfBuilder::from_fn(&grid, |_| 0.0);
        assert!(matches!(
            result,
            Err(SamplingError::DegenerateDistribution { .. })
        ));
    }

    #[test]
    fn test_overflowing_density_is_degenerate() {
        let grid = Grid::linear(0.0, 1.0, 10).unwrap();
        let result = CdfBuilder::from_fn(&grid, |_| f64::MAX);
        assert!(matches!(
            result,
            Err(SamplingError::DegenerateDistribution { .. })
        ));
    }

    #[test]
    fn test_negative_density_is_rejected() {
        let grid = Grid::linear(-1.0, 1.0, 10).unwrap();
        let result = CdfBuilder::from_fn(&grid, |x| x);
        assert!(matches!(result, Err(SamplingError::InvalidTable(_))));
    }

    #[test]
    fn test_flat_regions_are_allowed() {
        let dist = TabulatedDistribution::from_table(
            vec![0.0, 1.0, 2.0, 3.0, 4.0],
            vec![1.0, 1.0, 0.0, 0.0, 1.0],
        )
        .unwrap();
        let curve = CdfBuilder::from_distribution(&dist).unwrap();

        assert_valid_cdf(&curve);
        // No mass accumulates across the zero-density segment
        assert_eq!(curve.cumulative()[2], curve.cumulative()[3]);
    }

    #[test]
    fn test_histogram_accumulates_at_edges() {
        let curve = CdfBuilder::from_histogram(&[1.0, 2.0, 3.0], &[1.0, 1.0]).unwrap();
        assert_eq!(curve.cumulative(), &[0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_histogram_edge_count_mismatch() {
        assert!(matches!(
            CdfBuilder::from_histogram(&[1.0, 2.0], &[1.0, 1.0]),
            Err(SamplingError::InvalidTable(_))
        ));
    }

    #[test]
    fn test_empty_histogram_is_degenerate() {
        assert!(matches!(
            CdfBuilder::from_histogram(&[0.0, 1.0, 2.0], &[0.0, 0.0]),
            Err(SamplingError::DegenerateDistribution { .. })
        ));
    }

    #[test]
    fn test_construction_is_deterministic() {
        let grid = Grid::log10(10.0, 1e5, 500).unwrap();
        let density = |e: f64| e.powf(-1.5) * (-e / 3e3).exp();
        let a = CdfBuilder::from_fn(&grid, density).unwrap();
        let b = CdfBuilder::from_fn(&grid, density).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_trap_integrate() {
        let xs = [0.0, 1.0, 2.0, 3.0];
        let ys = [0.0, 1.0, 2.0, 3.0];
        assert_relative_eq!(trap_integrate(&xs, &ys), 4.5, epsilon = 1e-12);
        assert_eq!(trap_integrate(&[1.0], &[5.0]), 0.0);
    }
}
