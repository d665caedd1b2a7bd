//! Photon-stream generation from a [`FluxSurface`].
//!
//! The sampler walks along the cumulative expected photon count of the surface.
//! Starting from the count accumulated at the query time, it adds a random
//! probability step and inverts the cumulative curve to find the arrival time of
//! the next photon. The photon energy is then drawn from the spectrum of the
//! time bins the step crossed.
//!
//! # Temporal modes
//!
//! - [`TemporalMode::Transient`]: the surface covers the whole life of the
//!   source. Once the cumulative curve runs out the sampler reports
//!   [`PhotonDraw::Exhausted`] and `interval` returns [`NO_MORE_EVENTS`].
//! - [`TemporalMode::Periodic`]: the time axis is one base period
//!   `T = t_max - t_min` repeated forever. Query times are reduced into the base
//!   period, and a step larger than the count left in the current period skips
//!   whole periods before locating the residual in the next one.
//!
//! # States
//!
//! `Built` after construction, then `ExpiredTransient` once a transient source
//! runs out, or `PeriodicSteady` after the first periodic draw.
//!
//! # Thresholds
//!
//! Every draw takes an energy threshold. Only energy bins at and above the bin
//! containing the threshold contribute. Thresholds outside the energy axis are
//! clamped to the first or last bin. The cumulative curve and period-integrated
//! spectrum for each threshold bin are built on first use and cached.

use std::collections::HashMap;

use log::{debug, info};
use ndarray::s;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Exp1};

use crate::config::{PeriodicEnergy, ProbabilityStep, SamplerConfig, TemporalMode};
use crate::error::SamplingError;
use crate::flux_surface::FluxSurface;
use crate::inverse_cdf::InverseCdf;

/// Interval reported once a transient source has no photons left (s).
pub const NO_MORE_EVENTS: f64 = 1e10;

/// Flux reported for a transient source after its last time bin.
pub const EXPIRED_FLUX: f64 = 1e-6;

/// One photon produced by the sampler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawnPhoton {
    /// Arrival time (s)
    pub time: f64,
    /// Energy (MeV)
    pub energy: f64,
}

/// Outcome of a single draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PhotonDraw {
    Photon(DrawnPhoton),
    /// The transient source has no photons left after the query time.
    Exhausted,
}

impl PhotonDraw {
    /// The drawn photon, `None` once exhausted.
    pub fn photon(self) -> Option<DrawnPhoton> {
        match self {
            PhotonDraw::Photon(p) => Some(p),
            PhotonDraw::Exhausted => None,
        }
    }
}

/// Lifecycle of a sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerState {
    Built,
    ExpiredTransient,
    PeriodicSteady,
}

/// Cumulative expected photon count at the time-bin edges, starting at 0.
#[derive(Debug, Clone)]
pub struct ProbabilityCurve {
    total: f64,
    normalized: InverseCdf,
}

impl ProbabilityCurve {
    /// Sum the energy bins `from_e_bin..` of every time bin and accumulate.
    pub fn from_surface(surface: &FluxSurface, from_e_bin: usize) -> Result<Self, SamplingError> {
        let per_bin = surface.counts_above(from_e_bin);
        let total = per_bin.sum();
        if !total.is_finite() || total <= 0.0 {
            return Err(SamplingError::degenerate(
                total,
                format!("no photons at or above energy bin {from_e_bin}"),
            ));
        }
        let normalized = InverseCdf::from_histogram(surface.times().edges(), &per_bin.to_vec())?;
        Ok(Self { total, normalized })
    }

    /// Expected number of photons over the whole time axis.
    pub fn total(&self) -> f64 {
        self.total
    }

    /// Expected number of photons emitted up to time `t`.
    pub fn at(&self, t: f64) -> f64 {
        self.total * self.normalized.cdf(t)
    }

    /// Time at which the expected count reaches `p`.
    pub fn crossing(&self, p: f64) -> f64 {
        self.normalized.evaluate(p / self.total)
    }
}

/// Tables derived for one threshold bin.
#[derive(Debug, Clone)]
struct ThresholdTables {
    from_e_bin: usize,
    curve: ProbabilityCurve,
    /// Energy marginal over the whole time axis
    period_spectrum: InverseCdf,
}

impl ThresholdTables {
    fn build(surface: &FluxSurface, from_e_bin: usize) -> Result<Self, SamplingError> {
        let curve = ProbabilityCurve::from_surface(surface, from_e_bin)?;
        let period_spectrum = energy_marginal(surface, 0..=surface.times().n_bins() - 1, from_e_bin)?;
        debug!(
            "Built probability curve for energy bin {from_e_bin} (E >= {:.4} MeV): {:.4e} expected photons",
            surface.energies().low_edge(from_e_bin),
            curve.total()
        );
        Ok(Self {
            from_e_bin,
            curve,
            period_spectrum,
        })
    }
}

/// Histogram inverse CDF of the energy bins `from_e_bin..` summed over `time_bins`.
fn energy_marginal(
    surface: &FluxSurface,
    time_bins: std::ops::RangeInclusive<usize>,
    from_e_bin: usize,
) -> Result<InverseCdf, SamplingError> {
    let spectrum = surface.time_integrated_spectrum(time_bins, from_e_bin);
    let contents = spectrum.slice(s![from_e_bin..]).to_vec();
    InverseCdf::from_histogram(&surface.energies().edges()[from_e_bin..], &contents)
}

fn draw_step<R: Rng + ?Sized>(policy: ProbabilityStep, mode: TemporalMode, rng: &mut R) -> f64 {
    match (policy, mode) {
        (ProbabilityStep::Legacy, TemporalMode::Transient) => rng.gen_range(0.9..1.1),
        (ProbabilityStep::Legacy, TemporalMode::Periodic) => 1.0,
        (ProbabilityStep::Exponential, _) => Exp1.sample(rng),
    }
}

#[derive(Debug, Clone, Copy)]
struct SamplingState {
    state: SamplerState,
    last: Option<DrawnPhoton>,
    /// Last query time reduced into the base period
    reduced_time: Option<f64>,
}

/// Stateful photon generator over a [`FluxSurface`].
///
/// Owns its surface, its derived tables and its random generator; nothing is
/// shared between samplers.
#[derive(Debug)]
pub struct FluxSurfaceSampler {
    surface: FluxSurface,
    config: SamplerConfig,
    rng: StdRng,
    tables: HashMap<usize, ThresholdTables>,
    state: SamplingState,
}

impl FluxSurfaceSampler {
    /// Scale `surface` by the configured detector area and seed the generator.
    ///
    /// # Arguments
    /// * `surface` - Per-area counts; must not be scaled yet
    /// * `config` - Temporal mode, step policy, seed and detector area
    ///
    /// # Returns
    /// * `Ok(FluxSurfaceSampler)` - Sampler in the `Built` state
    /// * `Err(SamplingError::InvalidTable)` - Non-positive detector area or an
    ///   already scaled surface
    pub fn new(surface: FluxSurface, config: SamplerConfig) -> Result<Self, SamplingError> {
        let surface = surface.with_detector_area(config.detector_area_m2)?;
        info!(
            "{:?} sampler over t = [{}, {}] s, E = [{}, {}] MeV, {:.4e} expected photons",
            config.mode,
            surface.t_min(),
            surface.t_max(),
            surface.e_min(),
            surface.e_max(),
            surface.total_counts()
        );
        Ok(Self {
            surface,
            rng: StdRng::seed_from_u64(config.seed),
            config,
            tables: HashMap::new(),
            state: SamplingState {
                state: SamplerState::Built,
                last: None,
                reduced_time: None,
            },
        })
    }

    /// Surface being sampled, scaled by the detector area.
    pub fn surface(&self) -> &FluxSurface {
        &self.surface
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Lifecycle state after the most recent draw.
    pub fn state(&self) -> SamplerState {
        self.state.state
    }

    /// The photon produced by the most recent successful draw.
    pub fn last_photon(&self) -> Option<DrawnPhoton> {
        self.state.last
    }

    /// Last query time reduced into the base period (periodic mode only).
    pub fn reduced_time(&self) -> Option<f64> {
        self.state.reduced_time
    }

    /// Length of the base period (s).
    pub fn period(&self) -> f64 {
        self.surface.t_max() - self.surface.t_min()
    }

    /// Map `t` into `[t_min, t_max)`.
    pub fn reduce_time(&self, t: f64) -> f64 {
        let period = self.period();
        let offset = (t - self.surface.t_min()).rem_euclid(period);
        // rem_euclid can round up to the period itself for tiny negative offsets
        let offset = if offset >= period { 0.0 } else { offset };
        self.surface.t_min() + offset
    }

    /// Energy bin that a threshold falls in, clamped to the axis.
    pub fn threshold_bin(&self, e_threshold: f64) -> usize {
        let energies = self.surface.energies();
        if e_threshold < energies.min() || e_threshold > energies.max() {
            debug!(
                "Energy threshold {e_threshold} MeV outside [{}, {}], clamping",
                energies.min(),
                energies.max()
            );
        }
        energies.find_bin(e_threshold)
    }

    /// Expected photon count for threshold `e_threshold`, building it if needed.
    pub fn probability_curve(&mut self, e_threshold: f64) -> Result<&ProbabilityCurve, SamplingError> {
        let bin = self.threshold_bin(e_threshold);
        self.ensure_tables(bin)?;
        Ok(&self.tables[&bin].curve)
    }

    fn ensure_tables(&mut self, bin: usize) -> Result<(), SamplingError> {
        if !self.tables.contains_key(&bin) {
            let tables = ThresholdTables::build(&self.surface, bin)?;
            self.tables.insert(bin, tables);
        }
        Ok(())
    }

    /// Photon flux above `e_threshold` at time `t` (photons · m⁻² · s⁻¹).
    ///
    /// Transient surfaces report 0 before their first bin and
    /// [`EXPIRED_FLUX`] from their last edge on; periodic surfaces reduce `t`
    /// into the base period.
    pub fn flux(&self, t: f64, e_threshold: f64) -> f64 {
        let t = match self.config.mode {
            TemporalMode::Transient => {
                if t >= self.surface.t_max() {
                    return EXPIRED_FLUX;
                }
                if t < self.surface.t_min() {
                    return 0.0;
                }
                t
            }
            TemporalMode::Periodic => self.reduce_time(t),
        };
        let from = self.threshold_bin(e_threshold);
        let spectrum = self.surface.spectrum_at(t);
        spectrum.slice(s![from..]).sum() / self.surface.area_m2()
    }

    /// Draw the next photon after `t0` with energy at or above `e_threshold`.
    ///
    /// # Arguments
    /// * `t0` - Query time (s, surface time frame)
    /// * `e_threshold` - Minimum energy (MeV), clamped to the energy axis
    ///
    /// # Returns
    /// * `Ok(PhotonDraw::Photon)` - Photon with `time >= t0`
    /// * `Ok(PhotonDraw::Exhausted)` - Transient surface has no photons left
    /// * `Err(SamplingError::DegenerateDistribution)` - No photons above the threshold
    pub fn draw_photon(&mut self, t0: f64, e_threshold: f64) -> Result<PhotonDraw, SamplingError> {
        let bin = self.threshold_bin(e_threshold);

        let draw = match self.config.mode {
            TemporalMode::Transient if t0 > self.surface.t_max() => PhotonDraw::Exhausted,
            TemporalMode::Transient => {
                self.ensure_tables(bin)?;
                self.draw_transient(t0, bin)?
            }
            TemporalMode::Periodic => {
                self.ensure_tables(bin)?;
                self.draw_periodic(t0, bin)?
            }
        };

        match draw {
            PhotonDraw::Photon(photon) => {
                self.state.last = Some(photon);
                if self.config.mode == TemporalMode::Periodic {
                    self.state.state = SamplerState::PeriodicSteady;
                }
            }
            PhotonDraw::Exhausted => {
                if self.state.state != SamplerState::ExpiredTransient {
                    info!("Transient source exhausted at t = {t0} s");
                }
                self.state.last = None;
                self.state.state = SamplerState::ExpiredTransient;
            }
        }
        Ok(draw)
    }

    fn draw_transient(&mut self, t0: f64, bin: usize) -> Result<PhotonDraw, SamplingError> {
        let tables = &self.tables[&bin];
        let curve = &tables.curve;

        let step = draw_step(self.config.probability_step, TemporalMode::Transient, &mut self.rng);
        let target = curve.at(t0) + step;
        if target > curve.total() {
            return Ok(PhotonDraw::Exhausted);
        }
        // Crossing can land a rounding error before t0 when at(t0) dwarfs the step
        let time = curve.crossing(target).max(t0);

        let times = self.surface.times();
        let crossed = times.find_bin(t0)..=times.find_bin(time);
        let energy = match energy_marginal(&self.surface, crossed, tables.from_e_bin) {
            Ok(spectrum) => spectrum.sample(&mut self.rng),
            // Crossed bins can be empty when the step lands on a bin edge
            Err(SamplingError::DegenerateDistribution { .. }) => {
                tables.period_spectrum.sample(&mut self.rng)
            }
            Err(e) => return Err(e),
        };

        Ok(PhotonDraw::Photon(DrawnPhoton { time, energy }))
    }

    fn draw_periodic(&mut self, t0: f64, bin: usize) -> Result<PhotonDraw, SamplingError> {
        let period = self.period();
        let t_min = self.surface.t_min();
        let t_max = self.surface.t_max();
        let t_internal = self.reduce_time(t0);
        self.state.reduced_time = Some(t_internal);

        let tables = &self.tables[&bin];
        let curve = &tables.curve;
        let policy = self.config.probability_step;
        let step = draw_step(policy, TemporalMode::Periodic, &mut self.rng);

        let p_internal = curve.at(t_internal);
        let remaining = curve.total() - p_internal;

        let time = if remaining >= step {
            t0 + (curve.crossing(p_internal + step) - t_internal).max(0.0)
        } else {
            let deficit = step - remaining;
            let whole_periods = (deficit / curve.total()).floor();
            let residual = deficit - whole_periods * curve.total();
            let mut t_residual = curve.crossing(residual) - t_min;
            if policy == ProbabilityStep::Legacy {
                let times = self.surface.times();
                let half_bin = 0.5 * times.width(times.find_bin(t_min + t_residual));
                t_residual += self.rng.gen_range(-half_bin..=half_bin);
                t_residual = t_residual.clamp(0.0, period);
            }
            (t0 + (t_max - t_internal) + whole_periods * period + t_residual).max(t0)
        };

        let energy = match self.config.periodic_energy {
            PeriodicEnergy::PeriodIntegrated => tables.period_spectrum.sample(&mut self.rng),
            PeriodicEnergy::PhotonPhase => {
                let phase_bin = self.surface.times().find_bin(self.reduce_time(time));
                match energy_marginal(&self.surface, phase_bin..=phase_bin, tables.from_e_bin) {
                    Ok(spectrum) => spectrum.sample(&mut self.rng),
                    Err(SamplingError::DegenerateDistribution { .. }) => {
                        tables.period_spectrum.sample(&mut self.rng)
                    }
                    Err(e) => return Err(e),
                }
            }
        };
        Ok(PhotonDraw::Photon(DrawnPhoton { time, energy }))
    }

    /// Waiting time from `t` to the next photon above `e_threshold`, or
    /// [`NO_MORE_EVENTS`] once the source is exhausted.
    pub fn interval(&mut self, t: f64, e_threshold: f64) -> Result<f64, SamplingError> {
        Ok(match self.draw_photon(t, e_threshold)? {
            PhotonDraw::Photon(photon) => photon.time - t,
            PhotonDraw::Exhausted => NO_MORE_EVENTS,
        })
    }

    /// Energy of the photon located by the last `interval` or `draw_photon`.
    pub fn energy(&self) -> Result<f64, SamplingError> {
        match (self.last_photon(), self.state.state) {
            (Some(photon), _) => Ok(photon.energy),
            (None, SamplerState::ExpiredTransient) => Err(SamplingError::SequencingViolation(
                "energy requested after the source was exhausted".to_string(),
            )),
            (None, _) => Err(SamplingError::SequencingViolation(
                "energy requested before any photon was drawn".to_string(),
            )),
        }
    }
}
