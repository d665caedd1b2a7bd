//! Orbitally modulated microquasar emission.
//!
//! The flux follows `F · (1 + m sin(2π(φ + φ₀)))` over one binary orbit, and the
//! photon index switches between two values depending on whether the orbital
//! phase lies inside a configured window (e.g. around periastron). Photon
//! energies follow the index of the phase each photon arrives at.
//!
//! On top of the orbit, an accretion disk cycle switches the jet on and off.
//! Photons are only emitted while the jet is on.

use std::f64::consts::PI;

use log::{debug, info, warn};
use photon_sampling::{
    BinAxis, FluxSurface, FluxSurfaceSampler, PeriodicEnergy, SamplerConfig, TemporalMode,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::SourceError;
use crate::source::{Direction, Photon, PhotonSource, SurfaceSource};

const SECONDS_PER_DAY: f64 = 86_400.0;
const CM2_PER_M2: f64 = 1.0e4;

/// Redraws allowed before `interval` gives up on landing inside a jet window.
const MAX_JET_ATTEMPTS: usize = 100;

/// Disk cycle that gates the jet.
///
/// Every quantity with a `_fluct` companion is redrawn per disk cycle as
/// `x · (1 + f · (2u - 1))` with `u` uniform in [0, 1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JetCycle {
    pub disk_cycle_days: f64,
    pub disk_cycle_fluct: f64,
    /// Jet switch-on time, as a fraction of the disk cycle
    pub jet_onset: f64,
    pub jet_onset_fluct: f64,
    /// Jet-on duration as a fraction of the disk cycle; 1 is a steady jet
    pub jet_duration: f64,
    pub jet_duration_fluct: f64,
}

impl Default for JetCycle {
    fn default() -> Self {
        Self {
            disk_cycle_days: 30.0,
            disk_cycle_fluct: 0.0,
            jet_onset: 0.0,
            jet_onset_fluct: 0.0,
            jet_duration: 1.0,
            jet_duration_fluct: 0.0,
        }
    }
}

impl JetCycle {
    /// A jet that never switches off.
    pub fn is_steady(&self) -> bool {
        self.jet_duration >= 1.0
    }

    fn validate(&self) -> Result<(), SourceError> {
        if !self.disk_cycle_days.is_finite() || self.disk_cycle_days <= 0.0 {
            return Err(SourceError::InvalidParameter(format!(
                "disk cycle must be positive, got {} days",
                self.disk_cycle_days
            )));
        }
        if !(0.0..1.0).contains(&self.jet_onset) {
            return Err(SourceError::InvalidParameter(format!(
                "jet onset must lie in [0, 1), got {}",
                self.jet_onset
            )));
        }
        if !(self.jet_duration > 0.0 && self.jet_duration <= 1.0) {
            return Err(SourceError::InvalidParameter(format!(
                "jet duration must lie in (0, 1], got {}",
                self.jet_duration
            )));
        }
        for fluct in [
            self.disk_cycle_fluct,
            self.jet_onset_fluct,
            self.jet_duration_fluct,
        ] {
            if !(0.0..1.0).contains(&fluct) {
                return Err(SourceError::InvalidParameter(format!(
                    "jet cycle fluctuations must lie in [0, 1), got {fluct}"
                )));
            }
        }
        Ok(())
    }

    /// First jet window ending at or after `time`, for the given cycle length,
    /// onset and duration (all in seconds, times relative to the epoch).
    fn window_after(time: f64, cycle: f64, onset: f64, length: f64) -> JetWindow {
        let n = ((time - onset - length) / cycle).ceil();
        let start = onset + n * cycle;
        JetWindow {
            start,
            end: start + length,
        }
    }

    /// Jet window with every fluctuation at zero.
    pub fn nominal_window(&self, time: f64) -> JetWindow {
        let cycle = self.disk_cycle_days * SECONDS_PER_DAY;
        Self::window_after(time, cycle, self.jet_onset * cycle, self.jet_duration * cycle)
    }

    /// Jet window with freshly drawn fluctuations.
    fn draw_window<R: Rng + ?Sized>(&self, time: f64, rng: &mut R) -> JetWindow {
        let mut fluctuate = |fluct: f64| 1.0 + fluct * (2.0 * rng.gen::<f64>() - 1.0);
        let cycle = self.disk_cycle_days * SECONDS_PER_DAY * fluctuate(self.disk_cycle_fluct);
        let onset = self.jet_onset * fluctuate(self.jet_onset_fluct) * cycle;
        let length = (self.jet_duration * fluctuate(self.jet_duration_fluct)).min(1.0) * cycle;
        Self::window_after(time, cycle, onset, length)
    }
}

/// Span of one jet-on episode (s, relative to the orbital epoch).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JetWindow {
    pub start: f64,
    pub end: f64,
}

impl JetWindow {
    pub fn contains(&self, time: f64) -> bool {
        time >= self.start && time <= self.end
    }
}

/// Microquasar settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MicroquasarConfig {
    /// Orbit-averaged flux in `[e_min, e_max]` (photons · cm⁻² · s⁻¹)
    pub flux_cm2_s: f64,
    pub e_min_mev: f64,
    pub e_max_mev: f64,
    pub orbital_period_days: f64,
    /// Fractional modulation depth, in [0, 1]
    pub modulation: f64,
    /// Phase of the modulation, in orbits
    pub modulation_phase: f64,
    /// Time of orbital phase zero (s)
    pub epoch_s: f64,
    /// Photon index while the orbital phase is inside the window
    pub index_inside: f64,
    /// Photon index for the rest of the orbit
    pub index_outside: f64,
    pub window_min_phase: f64,
    pub window_max_phase: f64,
    pub energy_bins: usize,
    pub phase_bins: usize,
    pub galactic_l_deg: f64,
    pub galactic_b_deg: f64,
    pub jet: JetCycle,
    pub sampler: SamplerConfig,
}

impl Default for MicroquasarConfig {
    fn default() -> Self {
        Self {
            flux_cm2_s: 1.0e-6,
            e_min_mev: 100.0,
            e_max_mev: 1.0e5,
            orbital_period_days: 3.9,
            modulation: 0.5,
            modulation_phase: 0.0,
            epoch_s: 0.0,
            index_inside: 2.0,
            index_outside: 2.5,
            window_min_phase: 0.0,
            window_max_phase: 0.5,
            energy_bins: 100,
            phase_bins: 100,
            galactic_l_deg: 16.88,
            galactic_b_deg: -1.29,
            jet: JetCycle::default(),
            sampler: SamplerConfig::default()
                .periodic()
                .with_periodic_energy(PeriodicEnergy::PhotonPhase),
        }
    }
}

/// Power law `E^-γ` normalized to unit integral on `[e_min, e_max]`.
pub(crate) fn normalized_power_law(energy: f64, index: f64, e_min: f64, e_max: f64) -> f64 {
    if (index - 1.0).abs() < 1.0e-9 {
        return 1.0 / (energy * (e_max / e_min).ln());
    }
    let one_minus = 1.0 - index;
    one_minus * energy.powf(-index) / (e_max.powf(one_minus) - e_min.powf(one_minus))
}

impl MicroquasarConfig {
    /// Orbital period (s).
    pub fn period_s(&self) -> f64 {
        self.orbital_period_days * SECONDS_PER_DAY
    }

    fn validate(&self) -> Result<(), SourceError> {
        if !self.flux_cm2_s.is_finite() || self.flux_cm2_s <= 0.0 {
            return Err(SourceError::InvalidParameter(format!(
                "microquasar flux must be positive, got {}",
                self.flux_cm2_s
            )));
        }
        if !self.orbital_period_days.is_finite() || self.orbital_period_days <= 0.0 {
            return Err(SourceError::InvalidParameter(format!(
                "orbital period must be positive, got {} days",
                self.orbital_period_days
            )));
        }
        if !(0.0..=1.0).contains(&self.modulation) {
            return Err(SourceError::InvalidParameter(format!(
                "modulation depth must lie in [0, 1], got {}",
                self.modulation
            )));
        }
        if !self.e_max_mev.is_finite() || self.e_min_mev <= 0.0 || self.e_min_mev >= self.e_max_mev
        {
            return Err(SourceError::InvalidParameter(format!(
                "invalid energy range [{}, {}] MeV",
                self.e_min_mev, self.e_max_mev
            )));
        }
        self.jet.validate()
    }

    /// Orbital modulation factor at `phase`.
    pub fn modulation_at(&self, phase: f64) -> f64 {
        1.0 + self.modulation * (2.0 * PI * (phase + self.modulation_phase)).sin()
    }

    /// Photon index in effect at `phase`.
    pub fn index_at(&self, phase: f64) -> f64 {
        let phase = phase.rem_euclid(1.0);
        if phase > self.window_min_phase && phase < self.window_max_phase {
            self.index_inside
        } else {
            self.index_outside
        }
    }

    /// Differential flux at orbital `phase` and `energy`
    /// (photons · m⁻² · s⁻¹ · MeV⁻¹).
    pub fn density(&self, phase: f64, energy: f64) -> f64 {
        self.flux_cm2_s
            * CM2_PER_M2
            * self.modulation_at(phase)
            * normalized_power_law(energy, self.index_at(phase), self.e_min_mev, self.e_max_mev)
    }

    /// Build one orbit as a flux surface.
    pub fn flux_surface(&self) -> Result<FluxSurface, SourceError> {
        self.validate()?;
        let period = self.period_s();
        let phases = BinAxis::uniform(0.0, period, self.phase_bins)?;
        let energies = BinAxis::log10(self.e_min_mev, self.e_max_mev, self.energy_bins)?;
        Ok(FluxSurface::from_fn(phases, energies, |t, e| {
            self.density(t / period, e)
        })?)
    }
}

/// Periodic microquasar point source.
#[derive(Debug)]
pub struct Microquasar {
    inner: SurfaceSource,
    jet: JetCycle,
    window: Option<JetWindow>,
    rng: StdRng,
}

impl Microquasar {
    /// Build the orbit surface and its sampler.
    ///
    /// # Arguments
    /// * `config` - Orbit, spectrum and jet cycle settings. The sampler is
    ///   always run periodically with energies drawn at the photon's phase.
    ///
    /// # Returns
    /// * `Ok(Microquasar)` - Source ready to draw photons
    /// * `Err(SourceError::InvalidParameter)` - Out-of-range orbit, spectrum or jet settings
    pub fn new(config: MicroquasarConfig) -> Result<Self, SourceError> {
        let surface = config.flux_surface()?;

        let mut sampler_config = config.sampler.clone();
        if sampler_config.mode != TemporalMode::Periodic {
            warn!("Microquasar emission follows the orbit, switching sampler to periodic mode");
            sampler_config.mode = TemporalMode::Periodic;
        }
        if sampler_config.periodic_energy != PeriodicEnergy::PhotonPhase {
            warn!("Microquasar spectrum varies over the orbit, drawing energies at photon phase");
            sampler_config.periodic_energy = PeriodicEnergy::PhotonPhase;
        }
        let jet_seed = sampler_config.seed.wrapping_add(1);
        let sampler = FluxSurfaceSampler::new(surface, sampler_config)?;

        info!(
            "Microquasar with {} d orbit, {:.3e} ph/cm^2/s in [{}, {}] MeV, modulation {}",
            config.orbital_period_days,
            config.flux_cm2_s,
            config.e_min_mev,
            config.e_max_mev,
            config.modulation
        );
        if !config.jet.is_steady() {
            info!(
                "Jet on for {} of each {} d disk cycle",
                config.jet.jet_duration, config.jet.disk_cycle_days
            );
        }

        let inner = SurfaceSource::new(
            "Microquasar",
            sampler,
            config.epoch_s,
            config.e_min_mev,
            Direction::Galactic {
                l_deg: config.galactic_l_deg,
                b_deg: config.galactic_b_deg,
            },
        );
        Ok(Self {
            inner,
            jet: config.jet,
            window: None,
            rng: StdRng::seed_from_u64(jet_seed),
        })
    }

    /// Orbital phase in [0, 1) at absolute `time`.
    pub fn orbital_phase(&self, time: f64) -> f64 {
        let sampler = self.inner.sampler();
        sampler.reduce_time(time - self.inner.start_time()) / sampler.period()
    }

    /// Jet window the last photon was accepted in, in absolute time.
    /// `None` for a steady jet or before the first draw.
    pub fn jet_window(&self) -> Option<JetWindow> {
        let epoch = self.inner.start_time();
        self.window.map(|w| JetWindow {
            start: w.start + epoch,
            end: w.end + epoch,
        })
    }

    fn draw_window(&mut self, time: f64) -> JetWindow {
        let window = self.jet.draw_window(time, &mut self.rng);
        debug!("Next jet window [{:.1}, {:.1}] s", window.start, window.end);
        window
    }

    /// Draw orbital candidates until one lands while the jet is on.
    fn jet_gated_interval(&mut self, time: f64) -> Result<f64, SourceError> {
        let epoch = self.inner.start_time();
        let relative = time - epoch;
        let mut window = match self.window {
            Some(w) if relative <= w.end => w,
            _ => self.draw_window(relative),
        };

        let mut t = relative.max(window.start);
        let mut candidate = t;
        for _ in 0..MAX_JET_ATTEMPTS {
            candidate = t + self.inner.interval(t + epoch)?;
            if window.contains(candidate) {
                self.window = Some(window);
                return Ok(candidate - relative);
            }
            if candidate > window.end {
                window = self.draw_window(candidate);
                if window.contains(candidate) {
                    self.window = Some(window);
                    return Ok(candidate - relative);
                }
            }
            t = window.start;
        }
        warn!(
            "No photon inside a jet window after {MAX_JET_ATTEMPTS} attempts from t = {time} s"
        );
        self.window = Some(window);
        Ok(candidate - relative)
    }
}

impl PhotonSource for Microquasar {
    fn name(&self) -> &str {
        self.inner.name()
    }

    /// Orbital flux, zero outside the nominal jet schedule.
    fn flux(&self, time: f64) -> f64 {
        let relative = time - self.inner.start_time();
        if !self.jet.is_steady() && !self.jet.nominal_window(relative).contains(relative) {
            return 0.0;
        }
        self.inner.flux(time)
    }

    fn interval(&mut self, time: f64) -> Result<f64, SourceError> {
        if self.jet.is_steady() {
            return self.inner.interval(time);
        }
        self.jet_gated_interval(time)
    }

    fn energy(&mut self, time: f64) -> Result<f64, SourceError> {
        self.inner.energy(time)
    }

    fn dir(&mut self, energy: f64) -> Result<Direction, SourceError> {
        self.inner.dir(energy)
    }

    fn photon(&mut self, time: f64) -> Result<Option<Photon>, SourceError> {
        if self.jet.is_steady() {
            return self.inner.photon(time);
        }
        let time = time + self.jet_gated_interval(time)?;
        let energy = self.inner.energy(time)?;
        let direction = self.inner.dir(energy)?;
        Ok(Some(Photon {
            time,
            energy,
            direction,
        }))
    }
}
