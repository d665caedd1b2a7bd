//! Energy-sliced inverse CDFs for correlated draws.
//!
//! Angular distributions of several emission models change with photon energy.
//! Rather than interpolating between two whole CDFs (which would require
//! renormalizing a blended distribution), the energy axis is cut into a fixed
//! number of slices, each carrying its own [`InverseCdf`]. A drawn energy picks
//! the nearest slice through a [`SliceSelector`].

use rand::Rng;

use crate::error::SamplingError;
use crate::grid::Spacing;
use crate::inverse_cdf::InverseCdf;

/// Nearest-slice lookup on a linear or log10 axis.
///
/// `index(v) = clamp(round((a(v) - a_min) / (a_max - a_min) · (n - 1)), 0, n - 1)`
/// where `a` is the identity for linear axes and log10 for log axes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SliceSelector {
    axis_min: f64,
    axis_max: f64,
    slice_count: usize,
    spacing: Spacing,
}

impl SliceSelector {
    /// Create a selector over the physical range `[min, max]`.
    ///
    /// # Arguments
    /// * `min`, `max` - Range of the secondary variable, `min < max`
    /// * `slice_count` - Number of slices, at least 1
    /// * `spacing` - Whether slices are spread linearly or in log10
    ///
    /// # Returns
    /// * `Ok(SliceSelector)` - Selector mapping values to slice indices
    /// * `Err(SamplingError::InvalidTable)` - No slices, an empty range or a
    ///   non-positive minimum on a log10 axis
    pub fn new(
        min: f64,
        max: f64,
        slice_count: usize,
        spacing: Spacing,
    ) -> Result<Self, SamplingError> {
        if slice_count == 0 {
            return Err(SamplingError::InvalidTable(
                "slice selector needs at least one slice".to_string(),
            ));
        }
        if !min.is_finite() || !max.is_finite() || min >= max {
            return Err(SamplingError::InvalidTable(format!(
                "slice axis bounds must be finite with min < max, got [{min}, {max}]"
            )));
        }
        if spacing == Spacing::Log10 && min <= 0.0 {
            return Err(SamplingError::InvalidTable(format!(
                "log10 slice axis requires a positive minimum, got {min}"
            )));
        }
        Ok(Self {
            axis_min: spacing.to_coordinate(min),
            axis_max: spacing.to_coordinate(max),
            slice_count,
            spacing,
        })
    }

    /// Number of slices the range is divided into.
    pub fn slice_count(&self) -> usize {
        self.slice_count
    }

    /// Index of the slice nearest to `v`.
    pub fn index(&self, v: f64) -> usize {
        if self.slice_count == 1 {
            return 0;
        }
        if v.is_nan() || (self.spacing == Spacing::Log10 && v <= 0.0) {
            return 0;
        }
        let a = self.spacing.to_coordinate(v);
        let last = (self.slice_count - 1) as f64;
        let scaled = ((a - self.axis_min) / (self.axis_max - self.axis_min) * last).round();
        scaled.clamp(0.0, last) as usize
    }

    /// Physical axis value at which slice `k` is built.
    pub fn slice_value(&self, k: usize) -> f64 {
        if self.slice_count == 1 {
            return self.spacing.from_coordinate(self.axis_min);
        }
        let frac = k.min(self.slice_count - 1) as f64 / (self.slice_count - 1) as f64;
        self.spacing
            .from_coordinate(self.axis_min + frac * (self.axis_max - self.axis_min))
    }
}

/// One [`InverseCdf`] per slice of a secondary axis, kept aligned with the
/// [`SliceSelector`] that indexes them.
#[derive(Debug, Clone)]
pub struct EnergySlicedCurveSet {
    selector: SliceSelector,
    slices: Vec<InverseCdf>,
}

impl EnergySlicedCurveSet {
    /// Build every slice by calling `build` with the slice's axis value.
    pub fn build<F>(selector: SliceSelector, mut build: F) -> Result<Self, SamplingError>
    where
        F: FnMut(f64) -> Result<InverseCdf, SamplingError>,
    {
        let slices = (0..selector.slice_count())
            .map(|k| build(selector.slice_value(k)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { selector, slices })
    }

    pub fn selector(&self) -> &SliceSelector {
        &self.selector
    }

    pub fn slice(&self, k: usize) -> &InverseCdf {
        &self.slices[k]
    }

    pub fn len(&self) -> usize {
        self.slices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    /// The slice that applies to secondary value `v`.
    pub fn slice_for(&self, v: f64) -> &InverseCdf {
        &self.slices[self.selector.index(v)]
    }

    /// Invert deviate `u` through the slice selected by `v`.
    pub fn evaluate(&self, v: f64, u: f64) -> f64 {
        self.slice_for(v).evaluate(u)
    }

    /// Draw from the slice selected by `v`.
    pub fn sample<R: Rng + ?Sized>(&self, v: f64, rng: &mut R) -> f64 {
        self.slice_for(v).sample(rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Grid;

    #[test]
    fn test_endpoints_clamp() {
        let selector = SliceSelector::new(10.0, 1e5, 100, Spacing::Log10).unwrap();

        assert_eq!(selector.index(10.0), 0);
        assert_eq!(selector.index(1.0), 0);
        assert_eq!(selector.index(0.0), 0);
        assert_eq!(selector.index(-3.0), 0);
        assert_eq!(selector.index(1e5), 99);
        assert_eq!(selector.index(1e9), 99);
    }

    #[test]
    fn test_linear_rounding() {
        let selector = SliceSelector::new(0.0, 10.0, 11, Spacing::Linear).unwrap();

        assert_eq!(selector.index(4.4), 4);
        assert_eq!(selector.index(4.6), 5);
        assert_eq!(selector.index(10.0), 10);
    }

    #[test]
    fn test_slice_values_are_aligned() {
        let selector = SliceSelector::new(10.0, 350_000.0, 100, Spacing::Log10).unwrap();
        for k in 0..100 {
            assert_eq!(selector.index(selector.slice_value(k)), k);
        }
        assert!((selector.slice_value(0) - 10.0).abs() < 1e-9);
        assert!((selector.slice_value(99) - 350_000.0).abs() / 350_000.0 < 1e-12);
    }

    #[test]
    fn test_single_slice() {
        let selector = SliceSelector::new(1.0, 2.0, 1, Spacing::Linear).unwrap();
        assert_eq!(selector.index(0.0), 0);
        assert_eq!(selector.index(1.5), 0);
        assert_eq!(selector.index(100.0), 0);
    }

    #[test]
    fn test_rejects_bad_selector() {
        assert!(SliceSelector::new(1.0, 2.0, 0, Spacing::Linear).is_err());
        assert!(SliceSelector::new(2.0, 1.0, 5, Spacing::Linear).is_err());
        assert!(SliceSelector::new(0.0, 1.0, 5, Spacing::Log10).is_err());
    }

    #[test]
    fn test_sliced_set_uses_matching_slice() {
        // Slice k is uniform on [k, k + 1]
        let selector = SliceSelector::new(0.0, 4.0, 5, Spacing::Linear).unwrap();
        let set = EnergySlicedCurveSet::build(selector, |v| {
            let grid = Grid::linear(v, v + 1.0, 10)?;
            InverseCdf::from_fn(&grid, |_| 1.0)
        })
        .unwrap();

        assert_eq!(set.len(), 5);
        assert_eq!(set.evaluate(0.1, 0.0), 0.0);
        assert_eq!(set.evaluate(2.2, 1.0), 3.0);
        assert_eq!(set.evaluate(100.0, 0.5), 4.5);
    }

    #[test]
    fn test_sliced_set_propagates_errors() {
        let selector = SliceSelector::new(0.0, 1.0, 3, Spacing::Linear).unwrap();
        let result = EnergySlicedCurveSet::build(selector, |_| {
            let grid = Grid::linear(0.0, 1.0, 4)?;
            InverseCdf::from_fn(&grid, |_| 0.0)
        });
        assert!(matches!(
            result,
            Err(SamplingError::DegenerateDistribution { .. })
        ));
    }
}
