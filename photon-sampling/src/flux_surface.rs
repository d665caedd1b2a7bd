//! Binned photon counts over time and energy.
//!
//! A [`FluxSurface`] stores the expected number of photons in every
//! `(time bin, energy bin)` cell. It is filled from a differential flux density
//! `f(t, E)` in photons · MeV⁻¹ · s⁻¹ · m⁻², evaluated at the bin centre and
//! multiplied by both bin widths, which gives photons · m⁻² per cell. Several
//! densities can be accumulated (pulse superposition) before the surface is
//! scaled once by the detector area, after which every cell holds a photon
//! count.
//!
//! Besides feeding the sampler, the surface answers the usual diagnostic
//! questions about a burst: instantaneous spectra, band-limited light curves,
//! energy fluence and T90.

use std::ops::RangeInclusive;

use log::debug;
use ndarray::{s, Array1, Array2, Axis};

use crate::error::SamplingError;
use crate::grid::BinAxis;
use crate::inverse_cdf::InverseCdf;

/// Conversion factor from MeV to erg.
pub const MEV_TO_ERG: f64 = 1.602_176_634e-6;

/// Square centimetres per square metre.
const CM2_PER_M2: f64 = 1.0e4;

/// Expected photon counts on a time × energy grid.
#[derive(Debug, Clone, PartialEq)]
pub struct FluxSurface {
    times: BinAxis,
    energies: BinAxis,
    /// Shape `(n_time_bins, n_energy_bins)`
    counts: Array2<f64>,
    area_m2: Option<f64>,
}

impl FluxSurface {
    /// An empty surface to accumulate densities into.
    pub fn zeros(times: BinAxis, energies: BinAxis) -> Self {
        let counts = Array2::zeros((times.n_bins(), energies.n_bins()));
        Self {
            times,
            energies,
            counts,
            area_m2: None,
        }
    }

    /// Fill a surface from a density `f(t, E)` evaluated at bin centres.
    pub fn from_fn<F>(times: BinAxis, energies: BinAxis, density: F) -> Result<Self, SamplingError>
    where
        F: Fn(f64, f64) -> f64,
    {
        let mut surface = Self::zeros(times, energies);
        surface.accumulate(density)?;
        Ok(surface)
    }

    /// Wrap precomputed per-cell counts (photons · m⁻²).
    pub fn from_counts(
        times: BinAxis,
        energies: BinAxis,
        counts: Array2<f64>,
    ) -> Result<Self, SamplingError> {
        let expected = (times.n_bins(), energies.n_bins());
        if counts.dim() != expected {
            return Err(SamplingError::InvalidTable(format!(
                "count grid has shape {:?}, axes need {:?}",
                counts.dim(),
                expected
            )));
        }
        if let Some(bad) = counts.iter().find(|c| !c.is_finite() || **c < 0.0) {
            return Err(SamplingError::InvalidTable(format!(
                "count grid holds {bad}, cells must be finite and non-negative"
            )));
        }
        Ok(Self {
            times,
            energies,
            counts,
            area_m2: None,
        })
    }

    /// Add the contribution of another density to every cell.
    ///
    /// # Errors
    ///
    /// `InvalidTable` if the density is negative or non-finite at any bin centre,
    /// or the surface was already scaled by a detector area. The surface is left
    /// unchanged on error.
    pub fn accumulate<F>(&mut self, density: F) -> Result<(), SamplingError>
    where
        F: Fn(f64, f64) -> f64,
    {
        if self.area_m2.is_some() {
            return Err(SamplingError::InvalidTable(
                "cannot accumulate into a surface already scaled by detector area".to_string(),
            ));
        }

        let mut contribution = Array2::<f64>::zeros(self.counts.dim());
        for ((i, j), cell) in contribution.indexed_iter_mut() {
            let t = self.times.center(i);
            let e = self.energies.center(j);
            let value = density(t, e);
            if !value.is_finite() || value < 0.0 {
                return Err(SamplingError::InvalidTable(format!(
                    "flux density at t = {t}, E = {e} is {value}"
                )));
            }
            *cell = value * self.times.width(i) * self.energies.width(j);
        }
        self.counts += &contribution;
        Ok(())
    }

    /// Remove every energy bin that starts at or above `e_cut_mev`.
    ///
    /// The bin containing the cutoff is kept whole, so the effective cutoff is
    /// rounded up to that bin's upper edge.
    ///
    /// # Arguments
    /// * `e_cut_mev` - Cutoff energy (MeV)
    ///
    /// # Returns
    /// * `Ok(usize)` - Number of energy bins removed
    /// * `Err(SamplingError::InvalidTable)` - Non-finite cutoff, or a surface
    ///   already scaled by a detector area
    pub fn cut_above(&mut self, e_cut_mev: f64) -> Result<usize, SamplingError> {
        if self.area_m2.is_some() {
            return Err(SamplingError::InvalidTable(
                "cannot cut a surface already scaled by detector area".to_string(),
            ));
        }
        if !e_cut_mev.is_finite() {
            return Err(SamplingError::InvalidTable(format!(
                "cutoff energy must be finite, got {e_cut_mev}"
            )));
        }
        let first_cut = self
            .energies
            .edges()
            .partition_point(|&e| e < e_cut_mev)
            .max(1);
        let n_bins = self.energies.n_bins();
        if first_cut >= n_bins {
            return Ok(0);
        }
        self.counts.slice_mut(s![.., first_cut..]).fill(0.0);
        debug!("Cut {} energy bins above {e_cut_mev} MeV", n_bins - first_cut);
        Ok(n_bins - first_cut)
    }

    /// Scale per-area counts to photon counts for a detector of `area_m2`.
    ///
    /// Applies exactly once per surface.
    pub fn with_detector_area(mut self, area_m2: f64) -> Result<Self, SamplingError> {
        if let Some(existing) = self.area_m2 {
            return Err(SamplingError::InvalidTable(format!(
                "surface already scaled by a {existing} m² detector"
            )));
        }
        if !area_m2.is_finite() || area_m2 <= 0.0 {
            return Err(SamplingError::InvalidTable(format!(
                "detector area must be positive, got {area_m2}"
            )));
        }
        self.counts *= area_m2;
        self.area_m2 = Some(area_m2);
        debug!(
            "Scaled {}x{} flux surface by {area_m2} m², {:.4e} photons in total",
            self.times.n_bins(),
            self.energies.n_bins(),
            self.total_counts()
        );
        Ok(self)
    }

    /// Time axis (s).
    pub fn times(&self) -> &BinAxis {
        &self.times
    }

    /// Energy axis (MeV).
    pub fn energies(&self) -> &BinAxis {
        &self.energies
    }

    /// Cell contents, photons · m⁻² until scaled by a detector area.
    pub fn counts(&self) -> &Array2<f64> {
        &self.counts
    }

    /// Detector area the counts were scaled by, 1 m² if not yet scaled.
    pub fn area_m2(&self) -> f64 {
        self.area_m2.unwrap_or(1.0)
    }

    pub fn t_min(&self) -> f64 {
        self.times.min()
    }

    pub fn t_max(&self) -> f64 {
        self.times.max()
    }

    pub fn e_min(&self) -> f64 {
        self.energies.min()
    }

    pub fn e_max(&self) -> f64 {
        self.energies.max()
    }

    /// Expected photons over the whole surface.
    pub fn total_counts(&self) -> f64 {
        self.counts.sum()
    }

    /// Counts per time bin summed over energy bins `from_e_bin..`.
    pub fn counts_above(&self, from_e_bin: usize) -> Array1<f64> {
        let from = from_e_bin.min(self.energies.n_bins() - 1);
        self.counts.slice(s![.., from..]).sum_axis(Axis(1))
    }

    /// Energy bins overlapping `[e1, e2]`.
    pub fn energy_bins(&self, e1: f64, e2: f64) -> RangeInclusive<usize> {
        let (lo, hi) = if e1 <= e2 { (e1, e2) } else { (e2, e1) };
        self.energies.find_bin(lo)..=self.energies.find_bin(hi)
    }

    /// Count rate per energy bin (photons · s⁻¹) at time `t`.
    ///
    /// Linearly interpolated between the two nearest time-bin centres and held
    /// constant before the first and after the last centre.
    pub fn spectrum_at(&self, t: f64) -> Array1<f64> {
        let n = self.times.n_bins();
        let rate = |i: usize| self.counts.row(i).to_owned() / self.times.width(i);

        if n == 1 || t <= self.times.center(0) {
            return rate(0);
        }
        if t >= self.times.center(n - 1) {
            return rate(n - 1);
        }

        let bin = self.times.find_bin(t);
        let (lo, hi) = if t >= self.times.center(bin) {
            (bin, bin + 1)
        } else {
            (bin - 1, bin)
        };
        let (c1, c2) = (self.times.center(lo), self.times.center(hi));
        let w = (t - c1) / (c2 - c1);
        rate(lo) * (1.0 - w) + rate(hi) * w
    }

    /// Count rate per time bin (photons · s⁻¹) in the energy band `[e1, e2]`.
    pub fn light_curve(&self, e1: f64, e2: f64) -> Array1<f64> {
        let bins = self.energy_bins(e1, e2);
        let band = self
            .counts
            .slice(s![.., *bins.start()..=*bins.end()])
            .sum_axis(Axis(1));
        Array1::from_iter(
            band.iter()
                .enumerate()
                .map(|(i, c)| c / self.times.width(i)),
        )
    }

    /// Counts per energy bin summed over `time_bins`, zero below `from_e_bin`.
    pub fn time_integrated_spectrum(
        &self,
        time_bins: RangeInclusive<usize>,
        from_e_bin: usize,
    ) -> Array1<f64> {
        let last_t = self.times.n_bins() - 1;
        let t_lo = (*time_bins.start()).min(last_t);
        let t_hi = (*time_bins.end()).min(last_t);
        let mut spectrum = self.counts.slice(s![t_lo..=t_hi, ..]).sum_axis(Axis(0));
        let from = from_e_bin.min(self.energies.n_bins());
        spectrum.slice_mut(s![..from]).fill(0.0);
        spectrum
    }

    /// Energy fluence (erg · cm⁻²) deposited in the band `[e1, e2]` over the
    /// whole surface.
    pub fn energy_fluence(&self, e1: f64, e2: f64) -> f64 {
        let per_bin = self.counts.sum_axis(Axis(0));
        let mev: f64 = self
            .energy_bins(e1, e2)
            .map(|j| per_bin[j] * self.energies.center(j))
            .sum();
        mev * MEV_TO_ERG / self.area_m2() / CM2_PER_M2
    }

    /// Rescale every cell so the fluence in `[e1, e2]` equals `fluence`.
    ///
    /// # Arguments
    /// * `fluence` - Target energy fluence (erg · cm⁻²)
    /// * `e1`, `e2` - Energy band (MeV)
    ///
    /// # Returns
    /// * `Ok(f64)` - The factor applied to every cell
    /// * `Err(SamplingError::InvalidTable)` - Non-positive target fluence
    /// * `Err(SamplingError::DegenerateDistribution)` - No fluence in the band to scale
    pub fn scale_to_fluence(
        &mut self,
        fluence: f64,
        e1: f64,
        e2: f64,
    ) -> Result<f64, SamplingError> {
        if !fluence.is_finite() || fluence <= 0.0 {
            return Err(SamplingError::InvalidTable(format!(
                "target fluence must be positive, got {fluence}"
            )));
        }
        let current = self.energy_fluence(e1, e2);
        if !current.is_finite() || current <= 0.0 {
            return Err(SamplingError::degenerate(
                current,
                format!("fluence in [{e1}, {e2}] MeV"),
            ));
        }
        let factor = fluence / current;
        self.counts *= factor;
        debug!("Scaled flux surface by {factor:.4e} to {fluence:.4e} erg/cm² in [{e1}, {e2}] MeV");
        Ok(factor)
    }

    /// Interval between 5 % and 95 % of the counts in `[e1, e2]`.
    ///
    /// # Returns
    /// * `Ok(f64)` - Duration in seconds
    /// * `Err(SamplingError::DegenerateDistribution)` - No counts in the band
    pub fn t90(&self, e1: f64, e2: f64) -> Result<f64, SamplingError> {
        let bins = self.energy_bins(e1, e2);
        let band = self
            .counts
            .slice(s![.., *bins.start()..=*bins.end()])
            .sum_axis(Axis(1));
        let cumulative = InverseCdf::from_histogram(self.times.edges(), &band.to_vec())?;
        Ok(cumulative.evaluate(0.95) - cumulative.evaluate(0.05))
    }
}
