//! Phenomenological model of gamma-ray emission from the Earth limb.
//!
//! The limb is a thin ring of bright atmospheric emission seen from low Earth
//! orbit at zenith angles of roughly 110-130°. The model factorizes the
//! intensity into
//!
//! - a smoothly broken power-law energy spectrum,
//! - a zenith profile with a Gaussian core at the limb peak and an
//!   energy-dependent log-parabolic tail towards the Earth centre,
//! - an azimuth profile made of a log-sine east-west modulation and a
//!   Gaussian notch, both with energy-dependent amplitudes.
//!
//! Energy is drawn first. Zenith and azimuth are then drawn from the inverse
//! CDFs of the energy slice nearest to the drawn energy.
//!
//! Emission is steady, so the waiting time between photons is exponential at
//! the rate `integral flux × detector area`.

use log::info;
use photon_sampling::{
    trap_integrate, EnergySlicedCurveSet, Grid, InverseCdf, SliceSelector, Spacing,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Exp1};
use serde::{Deserialize, Serialize};

use crate::error::SourceError;
use crate::source::{Direction, EnergyGuard, Photon, PhotonSource};

// Spectrum (intensity in MeV⁻¹ m⁻² s⁻¹ sr⁻¹ at unit normalization)
const SPECTRAL_PREFACTOR: f64 = 1.0e4 * 1.031e-1;
const SPECTRAL_INDEX_LOW: f64 = -1.532;
const SPECTRAL_INDEX_HIGH: f64 = -2.790;
const SPECTRAL_BREAK_MEV: f64 = 370.3;
const SPECTRAL_SMOOTHNESS: f64 = 0.7276;

// Zenith profile (deg). Zenith 0° points away from the Earth centre.
const ZENITH_MIN_DEG: f64 = 110.0;
const ZENITH_MAX_DEG: f64 = 130.0;
const ZENITH_PEAK_DEG: f64 = 180.0 - 68.03;
const ZENITH_WIDTH_DEG: f64 = 0.3159;

const ZENITH_SLOPE_REF_LOG_E: f64 = 3.8;
const ZENITH_SLOPE_PREFACTOR: f64 = 8.821e-3;
const ZENITH_SLOPE_INDEX: f64 = 0.7966;
const ZENITH_SLOPE_LINEAR_CORRECTION: f64 = -0.3625;

const ZENITH_CURVE_REF_LOG_E: f64 = 3.8;
const ZENITH_CURVE_CROSS_LOG_E: f64 = 2.5;
const ZENITH_CURVE_CROSS_WIDTH: f64 = 4.785e-2;
const ZENITH_CURVE_LE_PREFACTOR: f64 = 0.1333;
const ZENITH_CURVE_LE_INDEX1: f64 = 2.361;
const ZENITH_CURVE_LE_INDEX2: f64 = 0.7923;
const ZENITH_CURVE_HE_PREFACTOR: f64 = 1.256e-3;
const ZENITH_CURVE_HE_INDEX1: f64 = -1.057;
const ZENITH_CURVE_HE_INDEX2: f64 = -3.632;

// Azimuth profile (deg). Azimuth 0° is north, 90° east, looking at the Earth.
const AZIMUTH_MIN_DEG: f64 = 0.0;
const AZIMUTH_MAX_DEG: f64 = 360.0;
const AZIMUTH_LOGSINE_PHASE_DEG: f64 = 176.5;
const AZIMUTH_NOTCH_PHASE_DEG: f64 = 106.0;

/// `prefactor · E^index · exp(-E / cutoff)`
#[derive(Debug, Clone, Copy)]
struct CutoffPowerLaw {
    prefactor: f64,
    index: f64,
    cutoff_mev: f64,
}

impl CutoffPowerLaw {
    fn eval(&self, energy: f64) -> f64 {
        self.prefactor * energy.powf(self.index) * (-energy / self.cutoff_mev).exp()
    }
}

const AZIMUTH_LOGSINE: CutoffPowerLaw = CutoffPowerLaw {
    prefactor: 6.323e-2,
    index: 0.3742,
    cutoff_mev: 7.133e3,
};
const AZIMUTH_NOTCH_RATIO: CutoffPowerLaw = CutoffPowerLaw {
    prefactor: 3.628e-3,
    index: 0.8960,
    cutoff_mev: 279.6,
};
const AZIMUTH_NOTCH_WIDTH: CutoffPowerLaw = CutoffPowerLaw {
    prefactor: 0.8871,
    index: 0.7975,
    cutoff_mev: 928.3,
};

/// Differential intensity (MeV⁻¹ m⁻² s⁻¹ sr⁻¹) at unit normalization.
pub fn limb_spectrum(energy: f64) -> f64 {
    let exponent = (SPECTRAL_INDEX_LOW - SPECTRAL_INDEX_HIGH) / SPECTRAL_SMOOTHNESS;
    SPECTRAL_PREFACTOR
        * energy.powf(SPECTRAL_INDEX_LOW)
        * (1.0 + (energy / SPECTRAL_BREAK_MEV).powf(exponent)).powf(-SPECTRAL_SMOOTHNESS)
}

/// Logarithmic slope of the inner-Earth zenith tail.
fn zenith_slope(log10_energy: f64) -> f64 {
    let correction = if log10_energy > ZENITH_SLOPE_REF_LOG_E {
        1.0 + ZENITH_SLOPE_LINEAR_CORRECTION * (log10_energy - ZENITH_SLOPE_REF_LOG_E)
    } else {
        1.0
    };
    ZENITH_SLOPE_PREFACTOR * 10f64.powf(log10_energy - 1.0).powf(ZENITH_SLOPE_INDEX) * correction
}

/// Curvature of the inner-Earth zenith tail. Low- and high-energy branches are
/// blended with a tanh step around the crossing energy.
fn zenith_curve(log10_energy: f64) -> f64 {
    if log10_energy >= ZENITH_CURVE_REF_LOG_E {
        return 0.0;
    }
    let blend = ((log10_energy - ZENITH_CURVE_CROSS_LOG_E) / ZENITH_CURVE_CROSS_WIDTH).tanh();
    let dl = log10_energy - ZENITH_CURVE_REF_LOG_E;
    let dh = log10_energy - ZENITH_CURVE_CROSS_LOG_E;
    let low = ZENITH_CURVE_LE_PREFACTOR
        * 10f64.powf(ZENITH_CURVE_LE_INDEX1 * dl + ZENITH_CURVE_LE_INDEX2 * dl * dl);
    let high = ZENITH_CURVE_HE_PREFACTOR
        * 10f64.powf(ZENITH_CURVE_HE_INDEX1 * dh + ZENITH_CURVE_HE_INDEX2 * dh * dh);
    0.5 * (1.0 + blend) * low + 0.5 * (1.0 - blend) * high
}

/// Unnormalized zenith profile at `zenith_deg` for a given tail slope and
/// curvature.
///
/// Gaussian up to one width past the peak, then `exp(s·d + c·d²)` with
/// `d = peak - zenith`, matched continuously at the joint. For positive
/// curvature the tail is held flat beyond the turning point of the parabola.
fn zenith_profile(zenith_deg: f64, slope: f64, curve: f64) -> f64 {
    let peak = ZENITH_PEAK_DEG;
    let width = ZENITH_WIDTH_DEG;
    let d = peak - zenith_deg;

    if zenith_deg <= peak + width {
        return (-d * d / (2.0 * width * width)).exp();
    }

    let exponent = if curve > 0.0 && zenith_deg >= peak + 0.5 * slope / curve {
        -0.25 * slope * slope / curve
    } else {
        slope * d + curve * d * d
    };
    let joint = (-slope * width + curve * width * width).exp();
    (-0.5f64).exp() / joint * exponent.exp()
}

/// Unnormalized azimuth profile: log-sine modulation minus a Gaussian notch,
/// wrapped over one turn.
fn azimuth_profile(azimuth_deg: f64, logsine: f64, notch_ratio: f64, notch_width: f64) -> f64 {
    let modulation =
        (logsine * (std::f64::consts::PI * (azimuth_deg - AZIMUTH_LOGSINE_PHASE_DEG) / 180.0).sin())
            .exp();
    if notch_ratio <= 0.0 || notch_width <= 0.0 {
        return modulation;
    }
    let notch: f64 = [-360.0, 0.0, 360.0]
        .iter()
        .map(|wrap| {
            let d = azimuth_deg - AZIMUTH_NOTCH_PHASE_DEG + wrap;
            (-d * d / (2.0 * notch_width * notch_width)).exp()
        })
        .sum();
    modulation - notch_ratio * notch
}

/// Earth-limb model settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EarthLimbConfig {
    /// Multiplier on the fitted spectral normalization
    pub normalization: f64,
    pub e_min_mev: f64,
    pub e_max_mev: f64,
    /// Turn the Earth inside out (back-entering photons)
    pub invert_direction: bool,
    /// Integration steps of every CDF
    pub cdf_steps: usize,
    /// Energy slices of the zenith and azimuth CDFs
    pub energy_slices: usize,
    pub detector_area_m2: f64,
    pub seed: u64,
}

impl Default for EarthLimbConfig {
    fn default() -> Self {
        Self {
            normalization: 1.0,
            e_min_mev: 10.0,
            e_max_mev: 350_000.0,
            invert_direction: false,
            cdf_steps: 1000,
            energy_slices: 100,
            detector_area_m2: 1.0,
            seed: 0,
        }
    }
}

/// Attributes of the photon handed out by the last `energy` call.
#[derive(Debug, Clone, Copy)]
struct LimbPhoton {
    energy: f64,
    zenith_deg: f64,
    azimuth_deg: f64,
}

/// Steady Earth-limb source with energy-dependent arrival directions.
#[derive(Debug)]
pub struct EarthLimb {
    config: EarthLimbConfig,
    solid_angle_sr: f64,
    /// Photons · m⁻² · s⁻¹ over the limb solid angle
    integral_flux: f64,
    energy_cdf: InverseCdf,
    zenith_cdfs: EnergySlicedCurveSet,
    azimuth_cdfs: EnergySlicedCurveSet,
    rng: StdRng,
    current: Option<LimbPhoton>,
    guard: EnergyGuard,
}

impl EarthLimb {
    /// Tabulate the limb spectrum and the energy-sliced angular profiles.
    ///
    /// # Arguments
    /// * `config` - Normalization, detector area, table resolution and seed
    ///
    /// # Returns
    /// * `Ok(EarthLimb)` - Source ready to draw photons
    /// * `Err(SourceError::InvalidParameter)` - Non-positive normalization or area
    /// * `Err(SourceError::Sampling)` - Tables that cannot be built at this resolution
    pub fn new(config: EarthLimbConfig) -> Result<Self, SourceError> {
        if !config.normalization.is_finite() || config.normalization <= 0.0 {
            return Err(SourceError::InvalidParameter(format!(
                "normalization must be positive, got {}",
                config.normalization
            )));
        }
        if !config.e_max_mev.is_finite()
            || config.e_min_mev <= 0.0
            || config.e_min_mev >= config.e_max_mev
        {
            return Err(SourceError::InvalidParameter(format!(
                "energy range must satisfy 0 < e_min < e_max, got [{}, {}]",
                config.e_min_mev, config.e_max_mev
            )));
        }
        if !config.detector_area_m2.is_finite() || config.detector_area_m2 <= 0.0 {
            return Err(SourceError::InvalidParameter(format!(
                "detector area must be positive, got {}",
                config.detector_area_m2
            )));
        }

        let norm = config.normalization;
        let steps = config.cdf_steps;
        let energy_grid = Grid::log10(config.e_min_mev, config.e_max_mev, steps)?;
        let energy_cdf = InverseCdf::from_fn(&energy_grid, |e| norm * limb_spectrum(e))?;

        let log_energies: Vec<f64> = energy_grid.points().map(f64::log10).collect();
        let weighted: Vec<f64> = energy_grid
            .points()
            .map(|e| norm * limb_spectrum(e) * Spacing::Log10.weight(e))
            .collect();
        let integral_intensity = trap_integrate(&log_energies, &weighted);

        let solid_angle_sr = 2.0
            * std::f64::consts::PI
            * (ZENITH_MIN_DEG.to_radians().cos() - ZENITH_MAX_DEG.to_radians().cos());
        let integral_flux = solid_angle_sr * integral_intensity;

        let selector = SliceSelector::new(
            config.e_min_mev,
            config.e_max_mev,
            config.energy_slices,
            Spacing::Log10,
        )?;
        let zenith_grid = Grid::linear(ZENITH_MIN_DEG, ZENITH_MAX_DEG, steps)?;
        let zenith_cdfs = EnergySlicedCurveSet::build(selector, |energy| {
            let log_e = energy.log10();
            let (slope, curve) = (zenith_slope(log_e), zenith_curve(log_e));
            InverseCdf::from_fn(&zenith_grid, |z| zenith_profile(z, slope, curve))
        })?;
        let azimuth_grid = Grid::linear(AZIMUTH_MIN_DEG, AZIMUTH_MAX_DEG, steps)?;
        let azimuth_cdfs = EnergySlicedCurveSet::build(selector, |energy| {
            let logsine = AZIMUTH_LOGSINE.eval(energy);
            let ratio = AZIMUTH_NOTCH_RATIO.eval(energy);
            let width = AZIMUTH_NOTCH_WIDTH.eval(energy);
            InverseCdf::from_fn(&azimuth_grid, |a| azimuth_profile(a, logsine, ratio, width))
        })?;

        info!(
            "Earth limb created: normalization {norm}, total flux {integral_flux:.4e} m^-2 s^-1 between {} and {} MeV, {} CDF steps, {} energy slices{}",
            config.e_min_mev,
            config.e_max_mev,
            steps,
            config.energy_slices,
            if config.invert_direction { ", inverted directions" } else { "" }
        );

        Ok(Self {
            rng: StdRng::seed_from_u64(config.seed),
            config,
            solid_angle_sr,
            integral_flux,
            energy_cdf,
            zenith_cdfs,
            azimuth_cdfs,
            current: None,
            guard: EnergyGuard::default(),
        })
    }

    pub fn config(&self) -> &EarthLimbConfig {
        &self.config
    }

    /// Solid angle of the limb ring (sr).
    pub fn solid_angle(&self) -> f64 {
        self.solid_angle_sr
    }

    /// Total photon flux over the limb (photons · m⁻² · s⁻¹).
    pub fn integral_flux(&self) -> f64 {
        self.integral_flux
    }

    /// Draw energy, zenith and azimuth of one photon.
    fn calculate(&mut self) -> LimbPhoton {
        let energy = self.energy_cdf.sample(&mut self.rng);
        let zenith = self.zenith_cdfs.sample(energy, &mut self.rng);
        let azimuth = self.azimuth_cdfs.sample(energy, &mut self.rng);

        let (zenith_deg, azimuth_deg) = if self.config.invert_direction {
            let flipped = if azimuth < 180.0 {
                azimuth + 180.0
            } else {
                azimuth - 180.0
            };
            (180.0 - zenith, flipped)
        } else {
            (zenith, azimuth)
        };
        LimbPhoton {
            energy,
            zenith_deg,
            azimuth_deg,
        }
    }

    fn direction_of(photon: &LimbPhoton) -> Direction {
        Direction::Local {
            cos_zenith: photon.zenith_deg.to_radians().cos(),
            azimuth_rad: photon.azimuth_deg.to_radians(),
        }
    }

    fn waiting_time(&mut self) -> f64 {
        let rate = self.integral_flux * self.config.detector_area_m2;
        let step: f64 = Exp1.sample(&mut self.rng);
        step / rate
    }
}

impl PhotonSource for EarthLimb {
    fn name(&self) -> &str {
        "EarthLimb"
    }

    /// Mean intensity over the limb (photons · m⁻² · s⁻¹ · sr⁻¹).
    fn flux(&self, _time: f64) -> f64 {
        self.integral_flux / self.solid_angle_sr
    }

    fn interval(&mut self, _time: f64) -> Result<f64, SourceError> {
        self.guard.clear();
        Ok(self.waiting_time())
    }

    fn energy(&mut self, _time: f64) -> Result<f64, SourceError> {
        let photon = self.calculate();
        self.current = Some(photon);
        self.guard.arm(photon.energy);
        Ok(photon.energy)
    }

    fn dir(&mut self, energy: f64) -> Result<Direction, SourceError> {
        self.guard.take("EarthLimb", energy)?;
        match self.current.take() {
            Some(photon) => Ok(Self::direction_of(&photon)),
            None => Err(SourceError::sequencing(
                "EarthLimb",
                "no photon drawn for dir()",
            )),
        }
    }

    fn photon(&mut self, time: f64) -> Result<Option<Photon>, SourceError> {
        self.guard.clear();
        let dt = self.waiting_time();
        let photon = self.calculate();
        Ok(Some(Photon {
            time: time + dt,
            energy: photon.energy,
            direction: Self::direction_of(&photon),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use test_helpers::{mean, variance};

    fn small_config() -> EarthLimbConfig {
        EarthLimbConfig {
            cdf_steps: 400,
            energy_slices: 20,
            seed: 8,
            ..EarthLimbConfig::default()
        }
    }

    #[test]
    fn test_solid_angle() {
        let limb = EarthLimb::new(small_config()).unwrap();
        let expected = 2.0
            * std::f64::consts::PI
            * (110f64.to_radians().cos() - 130f64.to_radians().cos());
        assert_relative_eq!(limb.solid_angle(), expected, epsilon = 1e-12);
        assert!(limb.solid_angle() > 1.8 && limb.solid_angle() < 2.0);
    }

    #[test]
    fn test_flux_is_intensity() {
        let limb = EarthLimb::new(small_config()).unwrap();
        assert!(limb.integral_flux() > 0.0);
        assert_relative_eq!(
            limb.flux(0.0) * limb.solid_angle(),
            limb.integral_flux(),
            max_relative = 1e-12
        );
    }

    #[test]
    fn test_normalization_scales_flux() {
        let base = EarthLimb::new(small_config()).unwrap();
        let doubled = EarthLimb::new(EarthLimbConfig {
            normalization: 2.0,
            ..small_config()
        })
        .unwrap();
        assert_relative_eq!(
            doubled.integral_flux(),
            2.0 * base.integral_flux(),
            max_relative = 1e-12
        );
    }

    #[test]
    fn test_zenith_profile_is_continuous_at_joint() {
        for log_e in [1.0, 2.0, 3.0, 4.5] {
            let (slope, curve) = (zenith_slope(log_e), zenith_curve(log_e));
            let joint = ZENITH_PEAK_DEG + ZENITH_WIDTH_DEG;
            let below = zenith_profile(joint - 1e-9, slope, curve);
            let above = zenith_profile(joint + 1e-9, slope, curve);
            assert_relative_eq!(below, above, max_relative = 1e-6);
        }
    }

    #[test]
    fn test_azimuth_profile_is_positive() {
        for energy in [10.0, 100.0, 250.0, 1000.0, 1e5] {
            let (ls, nr, nw) = (
                AZIMUTH_LOGSINE.eval(energy),
                AZIMUTH_NOTCH_RATIO.eval(energy),
                AZIMUTH_NOTCH_WIDTH.eval(energy),
            );
            for i in 0..=360 {
                assert!(azimuth_profile(i as f64, ls, nr, nw) > 0.0);
            }
        }
    }

    #[test]
    fn test_photons_lie_on_the_limb() {
        let mut limb = EarthLimb::new(small_config()).unwrap();
        let (cos_lo, cos_hi) = (130f64.to_radians().cos(), 110f64.to_radians().cos());

        let mut t = 0.0;
        for _ in 0..2000 {
            let photon = limb.photon(t).unwrap().unwrap();
            assert!(photon.time >= t);
            assert!((10.0..=350_000.0).contains(&photon.energy));
            match photon.direction {
                Direction::Local {
                    cos_zenith,
                    azimuth_rad,
                } => {
                    assert!(cos_zenith >= cos_lo - 1e-12 && cos_zenith <= cos_hi + 1e-12);
                    assert!((0.0..=2.0 * std::f64::consts::PI + 1e-12).contains(&azimuth_rad));
                }
                other => panic!("unexpected frame {other:?}"),
            }
            t = photon.time;
        }
    }

    #[test]
    fn test_inverted_directions() {
        let mut limb = EarthLimb::new(EarthLimbConfig {
            invert_direction: true,
            ..small_config()
        })
        .unwrap();

        for _ in 0..500 {
            let energy = limb.energy(0.0).unwrap();
            match limb.dir(energy).unwrap() {
                Direction::Local { cos_zenith, .. } => {
                    // 180° - [110°, 130°] = [50°, 70°]
                    assert!(cos_zenith >= 70f64.to_radians().cos() - 1e-12);
                    assert!(cos_zenith <= 50f64.to_radians().cos() + 1e-12);
                }
                other => panic!("unexpected frame {other:?}"),
            }
        }
    }

    #[test]
    fn test_dir_requires_energy() {
        let mut limb = EarthLimb::new(small_config()).unwrap();
        assert!(matches!(
            limb.dir(100.0),
            Err(SourceError::SequencingViolation { .. })
        ));

        let energy = limb.energy(0.0).unwrap();
        assert!(limb.dir(energy).is_ok());
        assert!(matches!(
            limb.dir(energy),
            Err(SourceError::SequencingViolation { .. })
        ));
    }

    #[test]
    fn test_mean_interval_matches_rate() {
        let mut limb = EarthLimb::new(EarthLimbConfig {
            detector_area_m2: 0.5,
            ..small_config()
        })
        .unwrap();
        let intervals: Vec<f64> = (0..50_000).map(|_| limb.interval(0.0).unwrap()).collect();
        let expected = 1.0 / (limb.integral_flux() * 0.5);
        assert_relative_eq!(mean(&intervals).unwrap(), expected, max_relative = 0.03);
        // Exponential waiting times: variance is the squared mean
        assert_relative_eq!(
            variance(&intervals).unwrap(),
            expected * expected,
            max_relative = 0.06
        );
    }

    #[test]
    fn test_energy_fraction_below_break() {
        let mut limb = EarthLimb::new(small_config()).unwrap();

        // Reference fraction from a much finer direct integration
        let grid = Grid::log10(10.0, 350_000.0, 20_000).unwrap();
        let reference = InverseCdf::from_fn(&grid, limb_spectrum).unwrap();
        let expected = reference.cdf(SPECTRAL_BREAK_MEV);

        let n = 20_000;
        let below = (0..n)
            .filter(|_| limb.energy(0.0).unwrap() < SPECTRAL_BREAK_MEV)
            .count();
        let fraction = below as f64 / n as f64;
        assert!(
            (fraction - expected).abs() < 0.02,
            "fraction {fraction}, expected {expected}"
        );
    }

    #[test]
    fn test_rejects_bad_config() {
        assert!(EarthLimb::new(EarthLimbConfig {
            e_min_mev: 0.0,
            ..EarthLimbConfig::default()
        })
        .is_err());
        assert!(EarthLimb::new(EarthLimbConfig {
            detector_area_m2: -1.0,
            ..EarthLimbConfig::default()
        })
        .is_err());
    }
}
