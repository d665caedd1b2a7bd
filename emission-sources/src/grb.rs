//! Gamma-ray burst prompt emission.
//!
//! The burst is a superposition of Norris-type pulses, each with its own Band
//! spectrum, laid out on a linear-time × log-energy flux surface. The surface is
//! normalized to the requested fluence in the BATSE band (20 keV - 1 MeV) and
//! sampled as a transient source starting at `start_time_s`.
//!
//! An optional extra component adds a delayed power-law emission on its own
//! surface. Both surfaces can be cut above a maximum photon energy.

use log::{info, warn};
use photon_sampling::{
    BinAxis, FluxSurface, FluxSurfaceSampler, SamplerConfig, TemporalMode, EXPIRED_FLUX,
    NO_MORE_EVENTS,
};
use serde::{Deserialize, Serialize};

use crate::error::SourceError;
use crate::microquasar::normalized_power_law;
use crate::source::{Direction, Photon, PhotonSource, SurfaceSource};

/// Lower edge of the BATSE fluence band (MeV).
pub const BATSE_E_MIN_MEV: f64 = 0.02;
/// Upper edge of the BATSE fluence band (MeV).
pub const BATSE_E_MAX_MEV: f64 = 1.0;

/// Pivot energy of the Band function (MeV).
const BAND_PIVOT_MEV: f64 = 0.1;

/// Pulses are cut once they fall below this fraction of their peak.
const PULSE_TAIL_FRACTION: f64 = 1.0e-4;

const MIN_TIME_BINS: usize = 10;
const MAX_TIME_BINS: usize = 10_000;

/// Band et al. (1993) photon spectrum, unnormalized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandSpectrum {
    /// Low-energy photon index
    pub alpha: f64,
    /// High-energy photon index
    pub beta: f64,
    /// e-folding energy of the low-energy segment (MeV)
    pub e0_mev: f64,
}

impl BandSpectrum {
    /// Energy at which the two power-law segments join (MeV).
    pub fn break_energy(&self) -> f64 {
        (self.alpha - self.beta) * self.e0_mev
    }

    /// Photon density at `energy` (MeV), unit amplitude at the pivot.
    pub fn eval(&self, energy: f64) -> f64 {
        let x = energy / BAND_PIVOT_MEV;
        if energy <= self.break_energy() {
            x.powf(self.alpha) * (-energy / self.e0_mev).exp()
        } else {
            let ab = self.alpha - self.beta;
            (self.break_energy() / BAND_PIVOT_MEV).powf(ab) * (-ab).exp() * x.powf(self.beta)
        }
    }
}

/// A single burst pulse.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GrbPulse {
    pub peak_time_s: f64,
    pub rise_time_s: f64,
    pub decay_time_s: f64,
    /// Sharpness exponent of the pulse profile
    pub peakedness: f64,
    /// Relative height
    pub amplitude: f64,
    /// Band e-folding energy of this pulse (MeV)
    pub e0_mev: f64,
}

impl GrbPulse {
    /// `amplitude · exp(-(|t - peak| / τ)^ν)` with τ the rise time before the
    /// peak and the decay time after it.
    pub fn intensity(&self, t: f64) -> f64 {
        let tau = if t < self.peak_time_s {
            self.rise_time_s
        } else {
            self.decay_time_s
        };
        self.amplitude * (-((t - self.peak_time_s).abs() / tau).powf(self.peakedness)).exp()
    }

    /// Time after which the pulse has decayed below the tail fraction.
    pub fn end_time(&self) -> f64 {
        self.peak_time_s
            + self.decay_time_s * (-PULSE_TAIL_FRACTION.ln()).powf(1.0 / self.peakedness)
    }
}

/// Delayed high-energy emission with an `E^-γ` spectrum, flat in time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GrbExtraComponent {
    /// Start after the trigger (s)
    pub delay_s: f64,
    pub duration_s: f64,
    /// Expected photons · m⁻² above the minimum photon energy, before any cutoff
    pub photons_m2: f64,
    pub photon_index: f64,
}

impl GrbExtraComponent {
    fn validate(&self) -> Result<(), SourceError> {
        if !self.delay_s.is_finite() || self.delay_s < 0.0 {
            return Err(SourceError::InvalidParameter(format!(
                "extra component delay must be non-negative, got {}",
                self.delay_s
            )));
        }
        let positive = [self.duration_s, self.photons_m2];
        if positive.iter().any(|v| !v.is_finite() || *v <= 0.0) || !self.photon_index.is_finite()
        {
            return Err(SourceError::InvalidParameter(format!(
                "extra component has non-physical parameters: {self:?}"
            )));
        }
        Ok(())
    }
}

/// Which surface of a burst produced a photon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrbComponent {
    Prompt,
    Extra,
}

/// Gamma-ray burst settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrbConfig {
    /// Trigger time (s)
    pub start_time_s: f64,
    /// Fluence in the BATSE band (erg · cm⁻²)
    pub fluence_erg_cm2: f64,
    pub alpha: f64,
    pub beta: f64,
    pub pulses: Vec<GrbPulse>,
    pub e_min_mev: f64,
    pub e_max_mev: f64,
    pub energy_bins: usize,
    pub time_bin_width_s: f64,
    /// Lowest photon energy handed out (MeV)
    pub min_photon_energy_mev: f64,
    pub galactic_l_deg: f64,
    pub galactic_b_deg: f64,
    /// Photons above this energy are removed from every component (MeV)
    pub cutoff_mev: Option<f64>,
    pub extra: Option<GrbExtraComponent>,
    pub sampler: SamplerConfig,
}

impl Default for GrbConfig {
    fn default() -> Self {
        Self {
            start_time_s: 0.0,
            fluence_erg_cm2: 1.0e-5,
            alpha: -1.0,
            beta: -2.25,
            pulses: vec![
                GrbPulse {
                    peak_time_s: 1.0,
                    rise_time_s: 0.3,
                    decay_time_s: 0.8,
                    peakedness: 1.5,
                    amplitude: 1.0,
                    e0_mev: 0.3,
                },
                GrbPulse {
                    peak_time_s: 3.5,
                    rise_time_s: 0.5,
                    decay_time_s: 1.5,
                    peakedness: 1.2,
                    amplitude: 0.6,
                    e0_mev: 0.15,
                },
            ],
            e_min_mev: 0.01,
            e_max_mev: 1.0e5,
            energy_bins: 100,
            time_bin_width_s: 0.016,
            min_photon_energy_mev: 30.0,
            galactic_l_deg: 0.0,
            galactic_b_deg: 0.0,
            cutoff_mev: None,
            extra: None,
            sampler: SamplerConfig::default(),
        }
    }
}

impl GrbConfig {
    fn validate(&self) -> Result<(), SourceError> {
        if self.pulses.is_empty() {
            return Err(SourceError::InvalidParameter(
                "a burst needs at least one pulse".to_string(),
            ));
        }
        for (i, p) in self.pulses.iter().enumerate() {
            let positive = [p.rise_time_s, p.decay_time_s, p.peakedness, p.e0_mev];
            if positive.iter().any(|v| !v.is_finite() || *v <= 0.0)
                || !p.amplitude.is_finite()
                || p.amplitude < 0.0
                || !p.peak_time_s.is_finite()
            {
                return Err(SourceError::InvalidParameter(format!(
                    "pulse {i} has non-physical parameters: {p:?}"
                )));
            }
        }
        if self.alpha <= self.beta {
            return Err(SourceError::InvalidParameter(format!(
                "Band indices need alpha > beta, got alpha = {}, beta = {}",
                self.alpha, self.beta
            )));
        }
        if !self.fluence_erg_cm2.is_finite() || self.fluence_erg_cm2 <= 0.0 {
            return Err(SourceError::InvalidParameter(format!(
                "fluence must be positive, got {}",
                self.fluence_erg_cm2
            )));
        }
        if !self.time_bin_width_s.is_finite() || self.time_bin_width_s <= 0.0 {
            return Err(SourceError::InvalidParameter(format!(
                "time bin width must be positive, got {}",
                self.time_bin_width_s
            )));
        }
        if !(-180.0..=180.0).contains(&self.galactic_l_deg)
            || !(-90.0..=90.0).contains(&self.galactic_b_deg)
        {
            return Err(SourceError::InvalidParameter(format!(
                "galactic direction out of range: l = {}, b = {}",
                self.galactic_l_deg, self.galactic_b_deg
            )));
        }
        if let Some(cutoff) = self.cutoff_mev {
            if !cutoff.is_finite() || cutoff <= self.min_photon_energy_mev {
                return Err(SourceError::InvalidParameter(format!(
                    "cutoff {cutoff} MeV must lie above the minimum photon energy {} MeV",
                    self.min_photon_energy_mev
                )));
            }
        }
        if let Some(extra) = &self.extra {
            extra.validate()?;
            if self.min_photon_energy_mev <= 0.0 || self.min_photon_energy_mev >= self.e_max_mev {
                return Err(SourceError::InvalidParameter(format!(
                    "extra component needs a minimum photon energy inside (0, {}) MeV",
                    self.e_max_mev
                )));
            }
        }
        Ok(())
    }

    fn time_bins(&self, duration: f64) -> usize {
        ((duration / self.time_bin_width_s) as usize).clamp(MIN_TIME_BINS, MAX_TIME_BINS)
    }

    /// Band spectrum of one pulse with the burst's indices.
    fn band(&self, pulse: &GrbPulse) -> BandSpectrum {
        BandSpectrum {
            alpha: self.alpha,
            beta: self.beta,
            e0_mev: pulse.e0_mev,
        }
    }

    /// Build the prompt flux surface, normalized to the configured fluence.
    ///
    /// The cutoff is applied after normalization, so it never changes the
    /// BATSE-band fluence of bins below it.
    ///
    /// # Returns
    /// * `Ok(FluxSurface)` - Prompt counts per m², times relative to the trigger
    /// * `Err(SourceError)` - Invalid burst parameters or a burst with no
    ///   BATSE-band emission
    pub fn flux_surface(&self) -> Result<FluxSurface, SourceError> {
        self.validate()?;

        let t_final = self
            .pulses
            .iter()
            .map(GrbPulse::end_time)
            .fold(0.0, f64::max);
        let times = BinAxis::uniform(0.0, t_final, self.time_bins(t_final))?;
        let energies = BinAxis::log10(self.e_min_mev, self.e_max_mev, self.energy_bins)?;

        let mut surface = FluxSurface::zeros(times, energies);
        for pulse in &self.pulses {
            let band = self.band(pulse);
            surface.accumulate(|t, e| pulse.intensity(t) * band.eval(e))?;
        }
        surface.scale_to_fluence(self.fluence_erg_cm2, BATSE_E_MIN_MEV, BATSE_E_MAX_MEV)?;
        if let Some(cutoff) = self.cutoff_mev {
            surface.cut_above(cutoff)?;
        }
        Ok(surface)
    }

    /// Build the extra component's surface, or `None` if no extra component
    /// is configured. Times are relative to the component's own start and
    /// energies start at the minimum photon energy.
    pub fn extra_surface(&self) -> Result<Option<FluxSurface>, SourceError> {
        let Some(extra) = self.extra else {
            return Ok(None);
        };
        self.validate()?;

        let times = BinAxis::uniform(0.0, extra.duration_s, self.time_bins(extra.duration_s))?;
        let energies =
            BinAxis::log10(self.min_photon_energy_mev, self.e_max_mev, self.energy_bins)?;
        let rate = extra.photons_m2 / extra.duration_s;
        let mut surface = FluxSurface::from_fn(times, energies, |_, e| {
            rate * normalized_power_law(
                e,
                extra.photon_index,
                self.min_photon_energy_mev,
                self.e_max_mev,
            )
        })?;
        if let Some(cutoff) = self.cutoff_mev {
            surface.cut_above(cutoff)?;
        }
        Ok(Some(surface))
    }
}

/// Absolute time at which a transient surface source runs out.
fn component_end(source: &SurfaceSource) -> f64 {
    source.start_time() + source.sampler().surface().t_max()
}

/// A candidate photon drawn from one component but not yet handed out.
#[derive(Debug, Clone, Copy)]
struct PendingPhoton {
    drawn_at: f64,
    time: f64,
}

/// One emitting surface together with its undelivered candidate.
#[derive(Debug)]
struct Component {
    source: SurfaceSource,
    pending: Option<PendingPhoton>,
}

impl Component {
    fn new(source: SurfaceSource) -> Self {
        Self {
            source,
            pending: None,
        }
    }

    /// Waiting time to this component's next photon. A candidate that lies
    /// after `time` and was drawn at or before it is still the next photon.
    fn next_interval(&mut self, time: f64) -> Result<f64, SourceError> {
        if let Some(pending) = self.pending {
            if pending.drawn_at <= time && time <= pending.time {
                return Ok(pending.time - time);
            }
        }
        let dt = self.source.interval(time)?;
        self.pending = (dt < NO_MORE_EVENTS).then_some(PendingPhoton {
            drawn_at: time,
            time: time + dt,
        });
        Ok(dt)
    }
}

/// Transient gamma-ray burst source.
///
/// With an extra component, `interval` keeps one candidate per surface and
/// hands out the earlier one; the other stays pending for later calls.
/// `energy` and `dir` follow the surface the photon came from.
#[derive(Debug)]
pub struct GrbSource {
    prompt: Component,
    extra: Option<Component>,
    last_component: Option<GrbComponent>,
    t90_s: f64,
}

impl GrbSource {
    /// Build the prompt surface, the optional extra surface and their samplers.
    ///
    /// # Arguments
    /// * `config` - Burst settings. The sampler always runs in transient mode.
    ///
    /// # Returns
    /// * `Ok(GrbSource)` - Burst ready to draw photons
    /// * `Err(SourceError::InvalidParameter)` - Non-physical burst parameters
    /// * `Err(SourceError::Sampling)` - A surface with no photons to sample
    pub fn new(config: GrbConfig) -> Result<Self, SourceError> {
        let surface = config.flux_surface()?;
        let t90_s = surface.t90(BATSE_E_MIN_MEV, BATSE_E_MAX_MEV)?;
        let duration = surface.t_max();

        let mut sampler_config = config.sampler.clone();
        if sampler_config.mode != TemporalMode::Transient {
            warn!("GRB emission is transient, ignoring periodic sampler mode");
            sampler_config.mode = TemporalMode::Transient;
        }
        let sampler = FluxSurfaceSampler::new(surface, sampler_config.clone())?;
        let direction = Direction::Galactic {
            l_deg: config.galactic_l_deg,
            b_deg: config.galactic_b_deg,
        };

        let extra = match (config.extra, config.extra_surface()?) {
            (Some(extra), Some(surface)) => {
                let extra_sampler = FluxSurfaceSampler::new(
                    surface,
                    sampler_config.with_seed(config.sampler.seed.wrapping_add(1)),
                )?;
                info!(
                    "GRB extra component from t = {} s for {} s, index {}, {:.3e} photons/m^2",
                    config.start_time_s + extra.delay_s,
                    extra.duration_s,
                    extra.photon_index,
                    extra.photons_m2
                );
                Some(Component::new(SurfaceSource::new(
                    "GRB extra component",
                    extra_sampler,
                    config.start_time_s + extra.delay_s,
                    config.min_photon_energy_mev,
                    direction,
                )))
            }
            _ => None,
        };

        info!(
            "GRB at t = {} s, duration {duration:.3} s, T90 {t90_s:.3} s, fluence {:.3e} erg/cm^2, l,b = {}, {}",
            config.start_time_s,
            config.fluence_erg_cm2,
            config.galactic_l_deg,
            config.galactic_b_deg
        );

        let prompt = SurfaceSource::new(
            "GRB",
            sampler,
            config.start_time_s,
            config.min_photon_energy_mev,
            direction,
        );
        Ok(Self {
            prompt: Component::new(prompt),
            extra,
            last_component: None,
            t90_s,
        })
    }

    /// Duration containing 90 % of the prompt BATSE-band counts (s).
    pub fn t90(&self) -> f64 {
        self.t90_s
    }

    /// Trigger time (s).
    pub fn start_time(&self) -> f64 {
        self.prompt.source.start_time()
    }

    /// Time after which no component emits (s).
    pub fn end_time(&self) -> f64 {
        self.extra
            .as_ref()
            .map_or(f64::NEG_INFINITY, |e| component_end(&e.source))
            .max(component_end(&self.prompt.source))
    }

    /// Prompt emission surface, scaled by the detector area.
    pub fn surface(&self) -> &FluxSurface {
        self.prompt.source.sampler().surface()
    }

    /// Extra component surface, scaled by the detector area.
    pub fn extra_surface(&self) -> Option<&FluxSurface> {
        self.extra.as_ref().map(|e| e.source.sampler().surface())
    }

    /// Component the last drawn photon came from.
    pub fn last_component(&self) -> Option<GrbComponent> {
        self.last_component
    }

    fn component_mut(&mut self) -> &mut SurfaceSource {
        match (self.last_component, self.extra.as_mut()) {
            (Some(GrbComponent::Extra), Some(extra)) => &mut extra.source,
            _ => &mut self.prompt.source,
        }
    }
}

impl PhotonSource for GrbSource {
    fn name(&self) -> &str {
        self.prompt.source.name()
    }

    /// Summed flux of the components still emitting.
    fn flux(&self, time: f64) -> f64 {
        let Some(extra) = &self.extra else {
            return self.prompt.source.flux(time);
        };
        if time >= self.end_time() {
            return EXPIRED_FLUX;
        }
        [&self.prompt.source, &extra.source]
            .into_iter()
            .filter(|source| time < component_end(source))
            .map(|source| source.flux(time))
            .sum()
    }

    fn interval(&mut self, time: f64) -> Result<f64, SourceError> {
        let Some(extra) = self.extra.as_mut() else {
            self.last_component = Some(GrbComponent::Prompt);
            return self.prompt.source.interval(time);
        };
        let prompt_dt = self.prompt.next_interval(time)?;
        let extra_dt = extra.next_interval(time)?;
        self.prompt.source.forget_energy();
        extra.source.forget_energy();

        let (component, chosen, dt) = if prompt_dt <= extra_dt {
            (GrbComponent::Prompt, &mut self.prompt, prompt_dt)
        } else {
            (GrbComponent::Extra, extra, extra_dt)
        };
        chosen.pending = None;
        self.last_component = Some(component);
        Ok(dt)
    }

    fn energy(&mut self, time: f64) -> Result<f64, SourceError> {
        self.component_mut().energy(time)
    }

    fn dir(&mut self, energy: f64) -> Result<Direction, SourceError> {
        self.component_mut().dir(energy)
    }

    fn photon(&mut self, time: f64) -> Result<Option<Photon>, SourceError> {
        if self.extra.is_none() {
            self.last_component = Some(GrbComponent::Prompt);
            return self.prompt.source.photon(time);
        }
        let dt = self.interval(time)?;
        if dt >= NO_MORE_EVENTS {
            return Ok(None);
        }
        let time = time + dt;
        let energy = self.energy(time)?;
        let direction = self.dir(energy)?;
        Ok(Some(Photon {
            time,
            energy,
            direction,
        }))
    }
}
