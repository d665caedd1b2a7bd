//! JSON-configurable source selection.

use std::path::Path;

use photon_sampling::SamplerConfig;
use serde::{Deserialize, Serialize};

use crate::earth_limb::{EarthLimb, EarthLimbConfig};
use crate::error::SourceError;
use crate::grb::{GrbConfig, GrbSource};
use crate::microquasar::{Microquasar, MicroquasarConfig};
use crate::pulsar::{Pulsar, PulsarConfig};
use crate::source::PhotonSource;

/// One emission model and its parameters.
///
/// Serialized with a `model` tag, e.g. `{"model": "pulsar", "period_s": 0.033}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum SourceConfig {
    EarthLimb(EarthLimbConfig),
    Grb(GrbConfig),
    Pulsar(PulsarConfig),
    Microquasar(MicroquasarConfig),
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self::EarthLimb(EarthLimbConfig::default())
    }
}

impl SourceConfig {
    /// Model name as used in the `model` tag.
    pub fn model(&self) -> &'static str {
        match self {
            Self::EarthLimb(_) => "earth_limb",
            Self::Grb(_) => "grb",
            Self::Pulsar(_) => "pulsar",
            Self::Microquasar(_) => "microquasar",
        }
    }

    /// Override the random seed of whichever model is selected.
    pub fn set_seed(&mut self, seed: u64) {
        match self {
            Self::EarthLimb(c) => c.seed = seed,
            Self::Grb(c) => c.sampler.seed = seed,
            Self::Pulsar(c) => c.sampler.seed = seed,
            Self::Microquasar(c) => c.sampler.seed = seed,
        }
    }

    /// Sampler settings of surface-based models.
    pub fn sampler(&self) -> Option<&SamplerConfig> {
        match self {
            Self::EarthLimb(_) => None,
            Self::Grb(c) => Some(&c.sampler),
            Self::Pulsar(c) => Some(&c.sampler),
            Self::Microquasar(c) => Some(&c.sampler),
        }
    }

    /// Construct the configured source.
    ///
    /// # Returns
    /// * `Ok(Box<dyn PhotonSource>)` - Source ready to draw photons
    /// * `Err(SourceError)` - Invalid model parameters or an empty flux surface
    pub fn build(&self) -> Result<Box<dyn PhotonSource>, SourceError> {
        Ok(match self {
            Self::EarthLimb(c) => Box::new(EarthLimb::new(c.clone())?),
            Self::Grb(c) => Box::new(GrbSource::new(c.clone())?),
            Self::Pulsar(c) => Box::new(Pulsar::new(c.clone())?),
            Self::Microquasar(c) => Box::new(Microquasar::new(c.clone())?),
        })
    }

    /// Save to JSON file
    pub fn save_to_file(&self, path: &Path) -> Result<(), SourceError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load from JSON file
    pub fn load_from_file(path: &Path) -> Result<Self, SourceError> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}
