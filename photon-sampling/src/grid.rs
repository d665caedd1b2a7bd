//! Discretization grids and binned axes.
//!
//! A [`Grid`] is the set of N+1 points on which a closed-form density is
//! evaluated before integration. Points are evenly spaced either in the
//! physical variable ([`Spacing::Linear`]) or in its base-10 logarithm
//! ([`Spacing::Log10`]); the latter is the natural choice for photon energies
//! that span several decades.
//!
//! A [`BinAxis`] is the set of bin edges of one axis of a flux surface.

use serde::{Deserialize, Serialize};

use crate::error::SamplingError;

/// Spacing of grid points along an axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Spacing {
    /// Evenly spaced in the physical variable
    #[default]
    Linear,
    /// Evenly spaced in log10 of the physical variable
    Log10,
}

impl Spacing {
    /// Map a physical value into the grid coordinate.
    pub fn to_coordinate(self, x: f64) -> f64 {
        match self {
            Spacing::Linear => x,
            Spacing::Log10 => x.log10(),
        }
    }

    /// Map a grid coordinate back to the physical value.
    pub fn from_coordinate(self, u: f64) -> f64 {
        match self {
            Spacing::Linear => u,
            Spacing::Log10 => 10f64.powf(u),
        }
    }

    /// Jacobian `dx/du` that converts a density in `x` into a density in the
    /// grid coordinate `u`.
    pub fn weight(self, x: f64) -> f64 {
        match self {
            Spacing::Linear => 1.0,
            Spacing::Log10 => x * std::f64::consts::LN_10,
        }
    }
}

fn check_bounds(min: f64, max: f64, spacing: Spacing) -> Result<(), SamplingError> {
    if !min.is_finite() || !max.is_finite() || min >= max {
        return Err(SamplingError::InvalidTable(format!(
            "axis bounds must be finite with min < max, got [{min}, {max}]"
        )));
    }
    if spacing == Spacing::Log10 && min <= 0.0 {
        return Err(SamplingError::InvalidTable(format!(
            "log10 axis requires a positive minimum, got {min}"
        )));
    }
    Ok(())
}

/// N+1 evaluation points covering `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Grid {
    min: f64,
    max: f64,
    steps: usize,
    spacing: Spacing,
}

impl Grid {
    /// Create a grid of `steps` intervals between `min` and `max`.
    ///
    /// # Errors
    ///
    /// `InvalidTable` if the bounds are not finite and ordered, `steps` is zero,
    /// or a log10 grid has a non-positive minimum.
    pub fn new(min: f64, max: f64, steps: usize, spacing: Spacing) -> Result<Self, SamplingError> {
        check_bounds(min, max, spacing)?;
        if steps == 0 {
            return Err(SamplingError::InvalidTable(
                "grid needs at least one step".to_string(),
            ));
        }
        Ok(Self {
            min,
            max,
            steps,
            spacing,
        })
    }

    pub fn linear(min: f64, max: f64, steps: usize) -> Result<Self, SamplingError> {
        Self::new(min, max, steps, Spacing::Linear)
    }

    pub fn log10(min: f64, max: f64, steps: usize) -> Result<Self, SamplingError> {
        Self::new(min, max, steps, Spacing::Log10)
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn spacing(&self) -> Spacing {
        self.spacing
    }

    /// Number of points, `steps + 1`.
    pub fn len(&self) -> usize {
        self.steps + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Step size in the grid coordinate.
    pub fn step(&self) -> f64 {
        let lo = self.spacing.to_coordinate(self.min);
        let hi = self.spacing.to_coordinate(self.max);
        (hi - lo) / self.steps as f64
    }

    /// Physical value of point `i`. The endpoints are returned exactly.
    pub fn point(&self, i: usize) -> f64 {
        if i == 0 {
            return self.min;
        }
        if i >= self.steps {
            return self.max;
        }
        let lo = self.spacing.to_coordinate(self.min);
        self.spacing.from_coordinate(lo + i as f64 * self.step())
    }

    /// Iterate all N+1 physical points in order.
    pub fn points(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.len()).map(move |i| self.point(i))
    }
}

/// Bin edges of one axis of a flux surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinAxis {
    edges: Vec<f64>,
}

impl BinAxis {
    /// Create an axis from explicit, strictly increasing edges.
    pub fn from_edges(edges: Vec<f64>) -> Result<Self, SamplingError> {
        if edges.len() < 2 {
            return Err(SamplingError::InvalidTable(format!(
                "bin axis needs at least 2 edges, got {}",
                edges.len()
            )));
        }
        if edges.iter().any(|e| !e.is_finite()) {
            return Err(SamplingError::InvalidTable(
                "bin edges must be finite".to_string(),
            ));
        }
        if edges.windows(2).any(|w| w[1] <= w[0]) {
            return Err(SamplingError::InvalidTable(
                "bin edges must be strictly increasing".to_string(),
            ));
        }
        Ok(Self { edges })
    }

    /// `n_bins` equal-width bins over `[min, max]`.
    pub fn uniform(min: f64, max: f64, n_bins: usize) -> Result<Self, SamplingError> {
        let grid = Grid::linear(min, max, n_bins)?;
        Self::from_edges(grid.points().collect())
    }

    /// `n_bins` bins evenly spaced in log10 over `[min, max]`.
    pub fn log10(min: f64, max: f64, n_bins: usize) -> Result<Self, SamplingError> {
        let grid = Grid::log10(min, max, n_bins)?;
        Self::from_edges(grid.points().collect())
    }

    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    pub fn n_bins(&self) -> usize {
        self.edges.len() - 1
    }

    pub fn min(&self) -> f64 {
        self.edges[0]
    }

    pub fn max(&self) -> f64 {
        self.edges[self.edges.len() - 1]
    }

    pub fn low_edge(&self, bin: usize) -> f64 {
        self.edges[bin]
    }

    pub fn high_edge(&self, bin: usize) -> f64 {
        self.edges[bin + 1]
    }

    pub fn center(&self, bin: usize) -> f64 {
        0.5 * (self.edges[bin] + self.edges[bin + 1])
    }

    pub fn width(&self, bin: usize) -> f64 {
        self.edges[bin + 1] - self.edges[bin]
    }

    /// Index of the bin containing `x`, clamped to the first and last bins.
    pub fn find_bin(&self, x: f64) -> usize {
        if x.is_nan() || x <= self.min() {
            return 0;
        }
        // First edge strictly greater than x, minus one
        let idx = self.edges.partition_point(|&e| e <= x);
        idx.saturating_sub(1).min(self.n_bins() - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_linear_grid_points() {
        let grid = Grid::linear(0.0, 10.0, 5).unwrap();
        let points: Vec<f64> = grid.points().collect();

        assert_eq!(points.len(), 6);
        assert_eq!(points[0], 0.0);
        assert_eq!(points[5], 10.0);
        assert_relative_eq!(points[2], 4.0, epsilon = 1e-12);
        assert_relative_eq!(grid.step(), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_log_grid_has_exact_endpoints() {
        let grid = Grid::log10(10.0, 350_000.0, 1000).unwrap();

        assert_eq!(grid.point(0), 10.0);
        assert_eq!(grid.point(1000), 350_000.0);
        assert_relative_eq!(
            grid.point(500),
            (10.0f64 * 350_000.0).sqrt(),
            max_relative = 1e-10
        );
    }

    #[test]
    fn test_grid_rejects_bad_bounds() {
        assert!(Grid::linear(1.0, 1.0, 10).is_err());
        assert!(Grid::linear(2.0, 1.0, 10).is_err());
        assert!(Grid::log10(0.0, 1.0, 10).is_err());
        assert!(Grid::linear(0.0, 1.0, 0).is_err());
        assert!(Grid::linear(0.0, f64::INFINITY, 3).is_err());
    }

    #[test]
    fn test_log_weight_is_jacobian() {
        assert_relative_eq!(
            Spacing::Log10.weight(100.0),
            100.0 * std::f64::consts::LN_10,
            epsilon = 1e-12
        );
        assert_eq!(Spacing::Linear.weight(100.0), 1.0);
    }

    #[test]
    fn test_find_bin_clamps() {
        let axis = BinAxis::uniform(0.0, 10.0, 10).unwrap();

        assert_eq!(axis.find_bin(-5.0), 0);
        assert_eq!(axis.find_bin(0.0), 0);
        assert_eq!(axis.find_bin(0.5), 0);
        assert_eq!(axis.find_bin(1.0), 1);
        assert_eq!(axis.find_bin(9.99), 9);
        assert_eq!(axis.find_bin(10.0), 9);
        assert_eq!(axis.find_bin(50.0), 9);
    }

    #[test]
    fn test_bin_geometry() {
        let axis = BinAxis::from_edges(vec![1.0, 2.0, 4.0]).unwrap();

        assert_eq!(axis.n_bins(), 2);
        assert_eq!(axis.center(1), 3.0);
        assert_eq!(axis.width(1), 2.0);
        assert_eq!(axis.low_edge(1), 2.0);
        assert_eq!(axis.high_edge(1), 4.0);
    }

    #[test]
    fn test_bin_axis_rejects_unsorted_edges() {
        assert!(BinAxis::from_edges(vec![1.0, 1.0, 2.0]).is_err());
        assert!(BinAxis::from_edges(vec![1.0]).is_err());
    }
}
