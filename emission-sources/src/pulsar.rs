//! Periodic pulsar emission.
//!
//! One rotation is laid out on a phase × log-energy flux surface: a light curve
//! made of wrapped Gaussian peaks times a power law with an exponential cutoff.
//! The surface repeats every period, so the source never runs dry.

use log::{info, warn};
use photon_sampling::{
    trap_integrate, BinAxis, FluxSurface, FluxSurfaceSampler, Grid, SamplerConfig, Spacing,
    TemporalMode,
};
use serde::{Deserialize, Serialize};

use crate::error::SourceError;
use crate::source::{Direction, Photon, PhotonSource, SurfaceSource};

/// Energy above which the configured flux is quoted (MeV).
pub const FLUX_REFERENCE_MEV: f64 = 100.0;

const CM2_PER_M2: f64 = 1.0e4;
const NORMALIZATION_STEPS: usize = 2000;

/// One peak of the pulse profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PulsePeak {
    /// Phase of the maximum, in [0, 1)
    pub phase: f64,
    /// Gaussian sigma in phase units
    pub width: f64,
    pub amplitude: f64,
}

impl PulsePeak {
    fn eval(&self, phase: f64) -> f64 {
        let d = (phase - self.phase + 0.5).rem_euclid(1.0) - 0.5;
        self.amplitude * (-0.5 * (d / self.width).powi(2)).exp()
    }
}

/// Pulsar settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PulsarConfig {
    /// Phase-averaged flux above 100 MeV (photons · cm⁻² · s⁻¹)
    pub flux_cm2_s: f64,
    pub period_s: f64,
    /// Time at which the rotation phase is zero (s)
    pub epoch_s: f64,
    /// Extra phase shift applied to the profile, in rotations
    pub phase_offset: f64,
    pub peaks: Vec<PulsePeak>,
    /// Unpulsed fraction of the profile, relative to a unit-height peak
    pub background_level: f64,
    /// Photon index Γ of `E^-Γ`
    pub spectral_index: f64,
    pub cutoff_mev: f64,
    pub e_min_mev: f64,
    pub e_max_mev: f64,
    pub energy_bins: usize,
    pub phase_bins: usize,
    pub min_photon_energy_mev: f64,
    pub galactic_l_deg: f64,
    pub galactic_b_deg: f64,
    pub sampler: SamplerConfig,
}

impl Default for PulsarConfig {
    fn default() -> Self {
        Self {
            flux_cm2_s: 1.0e-6,
            period_s: 0.089,
            epoch_s: 0.0,
            phase_offset: 0.0,
            peaks: vec![
                PulsePeak {
                    phase: 0.13,
                    width: 0.02,
                    amplitude: 1.0,
                },
                PulsePeak {
                    phase: 0.56,
                    width: 0.03,
                    amplitude: 1.4,
                },
            ],
            background_level: 0.0,
            spectral_index: 1.5,
            cutoff_mev: 3000.0,
            e_min_mev: 30.0,
            e_max_mev: 3.0e5,
            energy_bins: 100,
            phase_bins: 100,
            min_photon_energy_mev: 30.0,
            galactic_l_deg: 0.0,
            galactic_b_deg: 0.0,
            sampler: SamplerConfig::default().periodic(),
        }
    }
}

impl PulsarConfig {
    fn validate(&self) -> Result<(), SourceError> {
        let positive = [
            ("flux", self.flux_cm2_s),
            ("period", self.period_s),
            ("cutoff energy", self.cutoff_mev),
            ("minimum energy", self.e_min_mev),
        ];
        for (what, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(SourceError::InvalidParameter(format!(
                    "pulsar {what} must be positive, got {value}"
                )));
            }
        }
        if self.e_max_mev <= FLUX_REFERENCE_MEV || self.e_max_mev <= self.e_min_mev {
            return Err(SourceError::InvalidParameter(format!(
                "energy range [{}, {}] MeV must extend above {FLUX_REFERENCE_MEV} MeV",
                self.e_min_mev, self.e_max_mev
            )));
        }
        if self
            .peaks
            .iter()
            .any(|p| !p.width.is_finite() || p.width <= 0.0 || p.amplitude < 0.0)
        {
            return Err(SourceError::InvalidParameter(
                "pulse peaks need a positive width and non-negative amplitude".to_string(),
            ));
        }
        if self.background_level < 0.0 {
            return Err(SourceError::InvalidParameter(format!(
                "background level must be non-negative, got {}",
                self.background_level
            )));
        }
        Ok(())
    }

    fn spectral_shape(&self, energy: f64) -> f64 {
        energy.powf(-self.spectral_index) * (-energy / self.cutoff_mev).exp()
    }

    /// Unnormalized pulse profile at rotation `phase`.
    pub fn profile(&self, phase: f64) -> f64 {
        let phase = (phase + self.phase_offset).rem_euclid(1.0);
        self.background_level + self.peaks.iter().map(|p| p.eval(phase)).sum::<f64>()
    }

    /// Spectrum normalization so the integral above 100 MeV equals the
    /// configured flux, in photons · m⁻² · s⁻¹ · MeV⁻¹.
    fn spectral_normalization(&self) -> Result<f64, SourceError> {
        let grid = Grid::log10(FLUX_REFERENCE_MEV, self.e_max_mev, NORMALIZATION_STEPS)?;
        let spacing = Spacing::Log10;
        let (xs, ys): (Vec<f64>, Vec<f64>) = grid
            .points()
            .map(|e| {
                (
                    spacing.to_coordinate(e),
                    self.spectral_shape(e) * spacing.weight(e),
                )
            })
            .unzip();
        let integral = trap_integrate(&xs, &ys);
        if !integral.is_finite() || integral <= 0.0 {
            return Err(SourceError::InvalidParameter(format!(
                "pulsar spectrum integrates to {integral} above {FLUX_REFERENCE_MEV} MeV"
            )));
        }
        Ok(self.flux_cm2_s * CM2_PER_M2 / integral)
    }

    /// Build one rotation of the pulsar as a flux surface.
    pub fn flux_surface(&self) -> Result<FluxSurface, SourceError> {
        self.validate()?;

        let phases = BinAxis::uniform(0.0, self.period_s, self.phase_bins)?;
        let energies = BinAxis::log10(self.e_min_mev, self.e_max_mev, self.energy_bins)?;

        let n = phases.n_bins();
        let mean_profile = (0..n)
            .map(|i| self.profile(phases.center(i) / self.period_s))
            .sum::<f64>()
            / n as f64;
        if !mean_profile.is_finite() || mean_profile <= 0.0 {
            return Err(SourceError::InvalidParameter(
                "pulse profile is zero at every phase".to_string(),
            ));
        }

        let k = self.spectral_normalization()?;
        let surface = FluxSurface::from_fn(phases, energies, |t, e| {
            k * self.spectral_shape(e) * self.profile(t / self.period_s) / mean_profile
        })?;
        Ok(surface)
    }
}

/// Periodic pulsar point source.
#[derive(Debug)]
pub struct Pulsar {
    inner: SurfaceSource,
}

impl Pulsar {
    /// Build one rotation as a flux surface and its periodic sampler.
    ///
    /// # Arguments
    /// * `config` - Light curve, spectrum and position. The sampler is always
    ///   run in periodic mode.
    ///
    /// # Returns
    /// * `Ok(Pulsar)` - Source ready to draw photons
    /// * `Err(SourceError)` - Invalid light curve or spectrum parameters
    pub fn new(config: PulsarConfig) -> Result<Self, SourceError> {
        let surface = config.flux_surface()?;

        let mut sampler_config = config.sampler.clone();
        if sampler_config.mode != TemporalMode::Periodic {
            warn!("Pulsar emission repeats every rotation, switching sampler to periodic mode");
            sampler_config.mode = TemporalMode::Periodic;
        }
        let sampler = FluxSurfaceSampler::new(surface, sampler_config)?;

        info!(
            "Pulsar with period {} s, {:.3e} ph/cm^2/s above {FLUX_REFERENCE_MEV} MeV, {} peaks, cutoff {} MeV",
            config.period_s,
            config.flux_cm2_s,
            config.peaks.len(),
            config.cutoff_mev
        );

        let inner = SurfaceSource::new(
            "Pulsar",
            sampler,
            config.epoch_s,
            config.min_photon_energy_mev,
            Direction::Galactic {
                l_deg: config.galactic_l_deg,
                b_deg: config.galactic_b_deg,
            },
        );
        Ok(Self { inner })
    }

    /// Rotation period (s).
    pub fn period(&self) -> f64 {
        self.inner.sampler().period()
    }

    /// Rotation phase in [0, 1) at absolute `time`.
    pub fn phase(&self, time: f64) -> f64 {
        let sampler = self.inner.sampler();
        sampler.reduce_time(time - self.inner.start_time()) / sampler.period()
    }
}

impl PhotonSource for Pulsar {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn flux(&self, time: f64) -> f64 {
        self.inner.flux(time)
    }

    fn interval(&mut self, time: f64) -> Result<f64, SourceError> {
        self.inner.interval(time)
    }

    fn energy(&mut self, time: f64) -> Result<f64, SourceError> {
        self.inner.energy(time)
    }

    fn dir(&mut self, energy: f64) -> Result<Direction, SourceError> {
        self.inner.dir(energy)
    }

    fn photon(&mut self, time: f64) -> Result<Option<Photon>, SourceError> {
        self.inner.photon(time)
    }
}
