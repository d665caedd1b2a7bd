//! Tabulated density and cumulative curves.
//!
//! Two piecewise-linear tables share the same storage discipline: an ordered,
//! strictly increasing abscissa and one value per abscissa point.
//!
//! - [`TabulatedDistribution`] holds raw densities `(x, density)` as supplied by a
//!   physical model. It is evaluated by linear interpolation.
//! - [`TabulatedCurve`] holds normalized cumulative values `(x, cumulative)`. Its
//!   first value is 0 and its last value is exactly 1.0. It is only produced by
//!   [`crate::cdf::CdfBuilder`] and is immutable afterwards.
//!
//! Both tables clamp queries outside their axis to the end values.

use serde::{Deserialize, Serialize};

use crate::error::SamplingError;
use crate::grid::Spacing;

/// A single `(x, value)` pair of a tabulated curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub x: f64,
    pub value: f64,
}

/// Check the structural invariants shared by every table in this module.
pub(crate) fn validate_axis(xs: &[f64], values: &[f64]) -> Result<(), SamplingError> {
    if xs.len() != values.len() {
        return Err(SamplingError::InvalidTable(format!(
            "axis has {} points but {} values",
            xs.len(),
            values.len()
        )));
    }
    if xs.len() < 2 {
        return Err(SamplingError::InvalidTable(format!(
            "need at least 2 points, got {}",
            xs.len()
        )));
    }
    if let Some(bad) = xs.iter().position(|x| !x.is_finite()) {
        return Err(SamplingError::InvalidTable(format!(
            "non-finite axis value {} at index {bad}",
            xs[bad]
        )));
    }
    for i in 1..xs.len() {
        if xs[i] <= xs[i - 1] {
            return Err(SamplingError::InvalidTable(format!(
                "axis must be strictly increasing: x[{}] = {} <= x[{}] = {}",
                i,
                xs[i],
                i - 1,
                xs[i - 1]
            )));
        }
    }
    Ok(())
}

/// Check that every density is finite and non-negative.
pub(crate) fn validate_densities(densities: &[f64]) -> Result<(), SamplingError> {
    match densities
        .iter()
        .position(|d| !d.is_finite() || *d < 0.0)
    {
        Some(i) => Err(SamplingError::InvalidTable(format!(
            "density at index {i} is {}, must be finite and non-negative",
            densities[i]
        ))),
        None => Ok(()),
    }
}

/// Linear interpolation with clamping to the end values.
///
/// `xs` must be strictly increasing and the same length as `ys`.
pub(crate) fn interp_clamped(x: f64, xs: &[f64], ys: &[f64]) -> f64 {
    let last = xs.len() - 1;
    if x <= xs[0] {
        return ys[0];
    }
    if x >= xs[last] {
        return ys[last];
    }
    // First index with xs[idx] > x; guaranteed in 1..=last by the checks above
    let idx = xs.partition_point(|&v| v <= x);
    let (x1, x2) = (xs[idx - 1], xs[idx]);
    let (y1, y2) = (ys[idx - 1], ys[idx]);
    let t = (x - x1) / (x2 - x1);
    y1 + t * (y2 - y1)
}

/// Ordered `(x, density)` samples evaluated by linear interpolation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabulatedDistribution {
    xs: Vec<f64>,
    densities: Vec<f64>,
}

impl TabulatedDistribution {
    /// Create a distribution from matching abscissa and density tables.
    ///
    /// # Errors
    ///
    /// `InvalidTable` if the tables differ in length, hold fewer than two points,
    /// the abscissa is not strictly increasing, or any density is negative or
    /// non-finite.
    pub fn from_table(xs: Vec<f64>, densities: Vec<f64>) -> Result<Self, SamplingError> {
        validate_axis(&xs, &densities)?;
        validate_densities(&densities)?;
        Ok(Self { xs, densities })
    }

    /// Evaluate the density at `x`, clamping outside the axis.
    pub fn eval(&self, x: f64) -> f64 {
        interp_clamped(x, &self.xs, &self.densities)
    }

    pub fn xs(&self) -> &[f64] {
        &self.xs
    }

    pub fn densities(&self) -> &[f64] {
        &self.densities
    }

    pub fn len(&self) -> usize {
        self.xs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }

    pub fn x_min(&self) -> f64 {
        self.xs[0]
    }

    pub fn x_max(&self) -> f64 {
        self.xs[self.xs.len() - 1]
    }
}

/// A normalized cumulative curve.
///
/// Values are non-decreasing, start at 0 and end at exactly 1.0. The abscissa
/// stores physical values; `spacing` records the space in which the curve was
/// integrated so that interpolation between points happens in that space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabulatedCurve {
    xs: Vec<f64>,
    cumulative: Vec<f64>,
    spacing: Spacing,
}

impl TabulatedCurve {
    /// Assemble a curve from already-normalized parts. Callers guarantee the
    /// invariants; only [`crate::cdf::CdfBuilder`] constructs curves.
    pub(crate) fn from_normalized(xs: Vec<f64>, cumulative: Vec<f64>, spacing: Spacing) -> Self {
        debug_assert_eq!(xs.len(), cumulative.len());
        debug_assert!(cumulative.windows(2).all(|w| w[0] <= w[1]));
        Self {
            xs,
            cumulative,
            spacing,
        }
    }

    /// Cumulative probability at `x`, clamped to [0, 1] outside the axis.
    pub fn eval(&self, x: f64) -> f64 {
        match self.spacing {
            Spacing::Linear => interp_clamped(x, &self.xs, &self.cumulative),
            Spacing::Log10 => {
                if x <= self.xs[0] {
                    return self.cumulative[0];
                }
                let last = self.xs.len() - 1;
                if x >= self.xs[last] {
                    return self.cumulative[last];
                }
                let idx = self.xs.partition_point(|&v| v <= x);
                let (l1, l2) = (self.xs[idx - 1].log10(), self.xs[idx].log10());
                let t = (x.log10() - l1) / (l2 - l1);
                let (c1, c2) = (self.cumulative[idx - 1], self.cumulative[idx]);
                c1 + t * (c2 - c1)
            }
        }
    }

    /// Iterate the `(x, cumulative)` samples in order.
    pub fn samples(&self) -> impl Iterator<Item = Sample> + '_ {
        self.xs
            .iter()
            .zip(self.cumulative.iter())
            .map(|(&x, &value)| Sample { x, value })
    }

    pub fn xs(&self) -> &[f64] {
        &self.xs
    }

    pub fn cumulative(&self) -> &[f64] {
        &self.cumulative
    }

    pub fn spacing(&self) -> Spacing {
        self.spacing
    }

    pub fn len(&self) -> usize {
        self.xs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }

    pub fn x_min(&self) -> f64 {
        self.xs[0]
    }

    pub fn x_max(&self) -> f64 {
        self.xs[self.xs.len() - 1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_distribution_interpolates_linearly() {
        let dist = TabulatedDistribution::from_table(vec![0.0, 1.0, 3.0], vec![0.0, 2.0, 6.0])
            .unwrap();

        assert_relative_eq!(dist.eval(0.5), 1.0, epsilon = 1e-12);
        assert_relative_eq!(dist.eval(2.0), 4.0, epsilon = 1e-12);
        assert_eq!(dist.eval(1.0), 2.0);
    }

    #[test]
    fn test_distribution_clamps_outside_axis() {
        let dist = TabulatedDistribution::from_table(vec![1.0, 2.0], vec![3.0, 5.0]).unwrap();

        assert_eq!(dist.eval(-10.0), 3.0);
        assert_eq!(dist.eval(10.0), 5.0);
        assert_eq!(dist.x_min(), 1.0);
        assert_eq!(dist.x_max(), 2.0);
    }

    #[test]
    fn test_rejects_short_table() {
        assert!(matches!(
            TabulatedDistribution::from_table(vec![1.0], vec![1.0]),
            Err(SamplingError::InvalidTable(_))
        ));
    }

    #[test]
    fn test_rejects_mismatched_lengths() {
        assert!(matches!(
            TabulatedDistribution::from_table(vec![1.0, 2.0, 3.0], vec![1.0, 1.0]),
            Err(SamplingError::InvalidTable(_))
        ));
    }

    #[test]
    fn test_rejects_unsorted_axis() {
        assert!(matches!(
            TabulatedDistribution::from_table(vec![1.0, 1.0, 3.0], vec![1.0, 1.0, 1.0]),
            Err(SamplingError::InvalidTable(_))
        ));
        assert!(matches!(
            TabulatedDistribution::from_table(vec![2.0, 1.0], vec![1.0, 1.0]),
            Err(SamplingError::InvalidTable(_))
        ));
    }

    #[test]
    fn test_rejects_negative_or_nan_density() {
        assert!(matches!(
            TabulatedDistribution::from_table(vec![1.0, 2.0], vec![1.0, -0.5]),
            Err(SamplingError::InvalidTable(_))
        ));
        assert!(matches!(
            TabulatedDistribution::from_table(vec![1.0, 2.0], vec![f64::NAN, 1.0]),
            Err(SamplingError::InvalidTable(_))
        ));
    }

    #[test]
    fn test_log_curve_interpolates_in_log_space() {
        let curve = TabulatedCurve::from_normalized(
            vec![1.0, 10.0, 100.0],
            vec![0.0, 0.5, 1.0],
            Spacing::Log10,
        );

        // Halfway in log10 between 1 and 10
        assert_relative_eq!(curve.eval(10f64.sqrt()), 0.25, epsilon = 1e-12);
        assert_eq!(curve.eval(0.1), 0.0);
        assert_eq!(curve.eval(1000.0), 1.0);
    }

    #[test]
    fn test_samples_iterates_in_order() {
        let curve = TabulatedCurve::from_normalized(
            vec![0.0, 1.0, 2.0],
            vec![0.0, 0.25, 1.0],
            Spacing::Linear,
        );
        let samples: Vec<Sample> = curve.samples().collect();

        assert_eq!(samples.len(), 3);
        assert_eq!(samples[1], Sample { x: 1.0, value: 0.25 });
    }
}
