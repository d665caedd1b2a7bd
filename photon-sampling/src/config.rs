//! Sampler configuration.

use serde::{Deserialize, Serialize};

/// How the emission repeats in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemporalMode {
    /// Emission has a finite lifetime; after the last time bin the source is exhausted.
    #[default]
    Transient,
    /// The time axis is one base period, repeated forever.
    Periodic,
}

/// Distribution of the cumulative-probability step between consecutive photons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbabilityStep {
    /// Transient sources step by U(0.9, 1.1); periodic sources step by exactly
    /// one expected photon with a uniform ±half-bin jitter on the residual time.
    #[default]
    Legacy,
    /// Exp(1) steps in both modes, giving Poisson arrival statistics.
    Exponential,
}

/// Spectrum that periodic photon energies are drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodicEnergy {
    /// Energy marginal integrated over the whole base period.
    #[default]
    PeriodIntegrated,
    /// Energy marginal of the time bin the photon lands in, for sources whose
    /// spectrum changes over the period.
    PhotonPhase,
}

/// Settings shared by every flux-surface sampler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Seed of the sampler's private random generator
    pub seed: u64,
    /// Effective detector area in m²
    pub detector_area_m2: f64,
    pub mode: TemporalMode,
    pub probability_step: ProbabilityStep,
    /// Ignored in transient mode, where energies always follow the crossed bins
    pub periodic_energy: PeriodicEnergy,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            detector_area_m2: 1.0,
            mode: TemporalMode::Transient,
            probability_step: ProbabilityStep::Legacy,
            periodic_energy: PeriodicEnergy::PeriodIntegrated,
        }
    }
}

impl SamplerConfig {
    pub fn periodic(mut self) -> Self {
        self.mode = TemporalMode::Periodic;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_probability_step(mut self, step: ProbabilityStep) -> Self {
        self.probability_step = step;
        self
    }

    pub fn with_periodic_energy(mut self, energy: PeriodicEnergy) -> Self {
        self.periodic_energy = energy;
        self
    }

    pub fn with_detector_area(mut self, area_m2: f64) -> Self {
        self.detector_area_m2 = area_m2;
        self
    }

    /// Save to JSON file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)
    }

    /// Load from JSON file
    pub fn load_from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sampler.json");
        let config = SamplerConfig::default()
            .periodic()
            .with_seed(42)
            .with_detector_area(0.8)
            .with_probability_step(ProbabilityStep::Exponential)
            .with_periodic_energy(PeriodicEnergy::PhotonPhase);

        config.save_to_file(&path).unwrap();
        let loaded = SamplerConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config: SamplerConfig = serde_json::from_str(r#"{ "mode": "periodic" }"#).unwrap();

        assert_eq!(config.mode, TemporalMode::Periodic);
        assert_eq!(config.probability_step, ProbabilityStep::Legacy);
        assert_eq!(config.detector_area_m2, 1.0);
        assert_eq!(config.periodic_energy, PeriodicEnergy::PeriodIntegrated);
    }

    #[test]
    fn test_malformed_file_is_invalid_data() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = SamplerConfig::load_from_file(&path).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }
}
